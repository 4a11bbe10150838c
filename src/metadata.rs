//! Stack metadata: the file-backed cache an external stacking tool
//! maintains under the repository's common git directory.
//!
//! The engine never writes this file. It is modeled as an injected
//! read-only provider so nothing here leaks module-level global state and
//! tests can substitute their own source.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use once_cell::sync::OnceCell;
use serde::Deserialize;

use crate::git::{GitError, Repository};
use crate::graph::BranchRecord;
use crate::review::CachedReview;

/// Read-only view of the stacking tool's persisted state.
pub trait StackMetadataSource: Send + Sync {
    /// Cheap existence check; called from availability probes, so it must
    /// not read or parse anything.
    fn is_tracking(&self) -> bool;

    /// All raw branch records, in the order the cache lists them.
    fn branch_records(&self) -> anyhow::Result<Vec<BranchRecord>>;

    /// The cached review record for a branch, if the stacking tool has
    /// one. Freshness is the caller's concern.
    fn cached_review(&self, branch: &str) -> Option<CachedReview>;
}

/// On-disk cache schema. Unknown fields are ignored so newer stacking
/// tool versions don't break us.
#[derive(Debug, Default, Deserialize)]
struct MetadataFile {
    #[serde(default)]
    branches: Vec<BranchRecord>,
    #[serde(default)]
    reviews: HashMap<String, CachedReview>,
}

/// `StackMetadataSource` backed by the stacking tool's JSON cache at
/// `<git-common-dir>/stack/metadata.json`.
///
/// The file is parsed at most once per instance; one engine invocation
/// sees one point-in-time read.
pub struct FileMetadataSource {
    path: PathBuf,
    cache: OnceCell<Result<MetadataFile, String>>,
}

impl FileMetadataSource {
    /// Conventional cache location for a repository.
    pub fn for_repo(repo: &Repository) -> Result<Self, GitError> {
        let path = repo.git_common_dir()?.join("stack").join("metadata.json");
        Ok(Self::at(path))
    }

    /// Use an explicit cache path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            cache: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn load(&self) -> &Result<MetadataFile, String> {
        self.cache.get_or_init(|| {
            let json = fs::read_to_string(&self.path)
                .map_err(|e| format!("failed to read {}: {}", self.path.display(), e))?;
            serde_json::from_str(&json)
                .map_err(|e| format!("malformed metadata cache {}: {}", self.path.display(), e))
        })
    }
}

impl StackMetadataSource for FileMetadataSource {
    fn is_tracking(&self) -> bool {
        self.path.is_file()
    }

    fn branch_records(&self) -> anyhow::Result<Vec<BranchRecord>> {
        match self.load() {
            Ok(file) => Ok(file.branches.clone()),
            Err(msg) => Err(anyhow::anyhow!(msg.clone())).context("stack metadata unavailable"),
        }
    }

    fn cached_review(&self, branch: &str) -> Option<CachedReview> {
        match self.load() {
            Ok(file) => file.reviews.get(branch).cloned(),
            Err(msg) => {
                log::debug!("no cached review for {}: {}", branch, msg);
                None
            }
        }
    }
}
