//! Status collectors: one pluggable component per status facet.
//!
//! Every collector wraps one external collaborator and never lets a
//! failure escape: `collect()` converts any internal error into absence
//! plus a log entry naming the collector.

use std::sync::Arc;

use crate::git::{ChangeSummary, Repository};
use crate::graph::BranchGraph;
use crate::plan::{PlanFacet, read_plan};
use crate::review::{ReviewFacet, detect_review};
use crate::stack::stack_position;

use super::{StatusContext, WorkspaceIdentity};

/// How many recent commit subjects the git collector reports.
const RECENT_COMMIT_LIMIT: usize = 5;

/// Upstream tracking state for a branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamStatus {
    pub remote_ref: String,
    pub ahead: usize,
    pub behind: usize,
}

/// Version-control facet of a workspace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitFacet {
    pub branch: Option<String>,
    pub changes: ChangeSummary,
    pub recent_commits: Vec<String>,
    pub upstream: Option<UpstreamStatus>,
}

/// Stack-position facet: the chain the branch sits on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFacet {
    /// Full chain, trunk first.
    pub branches: Vec<String>,
    /// Index of the target branch within `branches`.
    pub index: usize,
    pub is_trunk: bool,
    pub is_leaf: bool,
}

/// One collected facet. The `FacetKind` discriminant enum (payload-less
/// mirror of these variants) lets the orchestrator check a result's
/// shape against the collector that produced it without downcasting.
#[derive(Debug, Clone, PartialEq, strum::EnumDiscriminants)]
#[strum_discriminants(
    name(FacetKind),
    vis(pub),
    derive(Hash, strum::IntoStaticStr),
    strum(serialize_all = "kebab-case")
)]
pub enum FacetResult {
    Git(GitFacet),
    Review(ReviewFacet),
    Stack(StackFacet),
    Plan(PlanFacet),
}

/// A pluggable producer of one status facet.
///
/// Implementations are stateless across invocations; the orchestrator
/// never retries or caches results.
pub trait StatusCollector: Send + Sync {
    /// Stable identifier, used in log messages.
    fn name(&self) -> &'static str;

    /// The facet this collector produces.
    fn kind(&self) -> FacetKind;

    /// Cheap precondition check. Must not perform expensive I/O; an
    /// unavailable collector is skipped without submission or logging.
    fn is_available(&self, ctx: &StatusContext, target: &WorkspaceIdentity) -> bool;

    /// Fallible inner collection. `Ok(None)` means the collaborator had
    /// no data (not a failure); errors are absorbed by `collect()`.
    fn try_collect(
        &self,
        ctx: &StatusContext,
        target: &WorkspaceIdentity,
    ) -> anyhow::Result<Option<FacetResult>>;

    /// Collect the facet. Never propagates a failure: any error becomes
    /// absence plus a warning naming the collector.
    fn collect(&self, ctx: &StatusContext, target: &WorkspaceIdentity) -> Option<FacetResult> {
        match self.try_collect(ctx, target) {
            Ok(Some(facet)) => Some(facet),
            Ok(None) => {
                log::debug!("{} collector has no data for {}", self.name(), target.name);
                None
            }
            Err(e) => {
                log::warn!("{} collector failed for {}: {:#}", self.name(), target.name, e);
                None
            }
        }
    }
}

/// Version-control collector: branch, change summary, recent commits,
/// upstream divergence.
pub struct GitStatusCollector;

impl StatusCollector for GitStatusCollector {
    fn name(&self) -> &'static str {
        "git"
    }

    fn kind(&self) -> FacetKind {
        FacetKind::Git
    }

    fn is_available(&self, _ctx: &StatusContext, target: &WorkspaceIdentity) -> bool {
        target.path.is_dir()
    }

    fn try_collect(
        &self,
        _ctx: &StatusContext,
        target: &WorkspaceIdentity,
    ) -> anyhow::Result<Option<FacetResult>> {
        let repo = Repository::at(&target.path);

        let branch = match &target.branch {
            Some(branch) => Some(branch.clone()),
            None => repo.current_branch()?,
        };
        let changes = repo.change_summary()?;
        let recent_commits = repo.recent_commits("HEAD", RECENT_COMMIT_LIMIT)?;

        let upstream = if let Some(branch) = &branch {
            match repo.upstream_branch(branch)? {
                Some(remote_ref) => {
                    let (ahead, behind) = repo.ahead_behind(&remote_ref, branch)?;
                    Some(UpstreamStatus {
                        remote_ref,
                        ahead,
                        behind,
                    })
                }
                None => None,
            }
        } else {
            None
        };

        Ok(Some(FacetResult::Git(GitFacet {
            branch,
            changes,
            recent_commits,
            upstream,
        })))
    }
}

/// Code-review collector. Cache-first with remote fallback; the policy
/// lives in `review::detect_review` and is invisible to the orchestrator.
pub struct ReviewCollector;

impl StatusCollector for ReviewCollector {
    fn name(&self) -> &'static str {
        "review"
    }

    fn kind(&self) -> FacetKind {
        FacetKind::Review
    }

    fn is_available(&self, _ctx: &StatusContext, target: &WorkspaceIdentity) -> bool {
        // Detached HEAD has no review.
        target.branch.is_some()
    }

    fn try_collect(
        &self,
        ctx: &StatusContext,
        target: &WorkspaceIdentity,
    ) -> anyhow::Result<Option<FacetResult>> {
        let Some(branch) = &target.branch else {
            return Ok(None);
        };
        let repo = Repository::at(&target.path);
        let head = if target.head.is_empty() {
            repo.rev_parse("HEAD")?
        } else {
            target.head.clone()
        };
        let facet = detect_review(
            &repo,
            ctx.metadata.as_ref(),
            branch,
            &head,
            ctx.config.review_cache_ttl_secs,
        )?;
        Ok(Some(FacetResult::Review(facet)))
    }
}

/// Stack-position collector: wraps stack resolution over the metadata
/// forest. Only available while stack tracking is on.
pub struct StackCollector;

impl StatusCollector for StackCollector {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn kind(&self) -> FacetKind {
        FacetKind::Stack
    }

    fn is_available(&self, ctx: &StatusContext, target: &WorkspaceIdentity) -> bool {
        ctx.config.stack_tracking && target.branch.is_some() && ctx.metadata.is_tracking()
    }

    fn try_collect(
        &self,
        ctx: &StatusContext,
        target: &WorkspaceIdentity,
    ) -> anyhow::Result<Option<FacetResult>> {
        let Some(branch) = &target.branch else {
            return Ok(None);
        };
        let records = ctx.metadata.branch_records()?;
        let graph = BranchGraph::from_records(records)?;

        // Untracked branch: valid absence, not a failure.
        let Some(position) = stack_position(&graph, branch) else {
            return Ok(None);
        };

        Ok(Some(FacetResult::Stack(StackFacet {
            branches: position.stack.branches().to_vec(),
            index: position.stack.target_index(),
            is_trunk: position.is_trunk,
            is_leaf: position.is_leaf,
        })))
    }
}

/// Annotation collector: the per-workspace plan file.
pub struct PlanCollector;

impl StatusCollector for PlanCollector {
    fn name(&self) -> &'static str {
        "plan"
    }

    fn kind(&self) -> FacetKind {
        FacetKind::Plan
    }

    fn is_available(&self, _ctx: &StatusContext, target: &WorkspaceIdentity) -> bool {
        target.path.is_dir()
    }

    fn try_collect(
        &self,
        ctx: &StatusContext,
        target: &WorkspaceIdentity,
    ) -> anyhow::Result<Option<FacetResult>> {
        let facet = read_plan(&target.path, &ctx.config.plan_filename)?;
        Ok(Some(FacetResult::Plan(facet)))
    }
}

/// The standard collector registry, in snapshot field order.
pub fn default_collectors() -> Vec<Arc<dyn StatusCollector>> {
    vec![
        Arc::new(GitStatusCollector),
        Arc::new(ReviewCollector),
        Arc::new(StackCollector),
        Arc::new(PlanCollector),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StatusConfig;
    use crate::metadata::FileMetadataSource;
    use std::path::PathBuf;

    fn context(metadata_path: PathBuf) -> StatusContext {
        StatusContext {
            metadata: Arc::new(FileMetadataSource::at(metadata_path)),
            config: StatusConfig::default(),
        }
    }

    fn identity(path: PathBuf, branch: Option<&str>) -> WorkspaceIdentity {
        WorkspaceIdentity {
            name: "ws".to_string(),
            path,
            branch: branch.map(|b| b.to_string()),
            head: "abc123".to_string(),
            is_root: false,
        }
    }

    #[test]
    fn facet_kind_mirrors_variants() {
        let facet = FacetResult::Plan(PlanFacet::default());
        assert_eq!(FacetKind::from(&facet), FacetKind::Plan);
        let name: &'static str = FacetKind::from(&facet).into();
        assert_eq!(name, "plan");
    }

    #[test]
    fn registry_kinds_are_distinct_and_ordered() {
        let kinds: Vec<FacetKind> = default_collectors().iter().map(|c| c.kind()).collect();
        assert_eq!(
            kinds,
            [
                FacetKind::Git,
                FacetKind::Review,
                FacetKind::Stack,
                FacetKind::Plan
            ]
        );
    }

    #[test]
    fn stack_collector_unavailable_without_tracking() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("absent.json"));
        let target = identity(dir.path().to_path_buf(), Some("feature"));
        // Metadata cache missing: cheap probe says unavailable.
        assert!(!StackCollector.is_available(&ctx, &target));
    }

    #[test]
    fn stack_collector_disabled_by_config() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("metadata.json");
        std::fs::write(&cache, r#"{"branches": []}"#).unwrap();
        let mut ctx = context(cache);
        ctx.config.stack_tracking = false;
        let target = identity(dir.path().to_path_buf(), Some("feature"));
        assert!(!StackCollector.is_available(&ctx, &target));
    }

    #[test]
    fn stack_collector_untracked_branch_is_absence_not_failure() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("metadata.json");
        std::fs::write(
            &cache,
            r#"{"branches": [{"name": "main", "is_trunk": true}]}"#,
        )
        .unwrap();
        let ctx = context(cache);
        let target = identity(dir.path().to_path_buf(), Some("untracked"));
        let result = StackCollector.try_collect(&ctx, &target).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn stack_collector_resolves_position() {
        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("metadata.json");
        std::fs::write(
            &cache,
            r#"{"branches": [
                {"name": "main", "children": ["a"], "is_trunk": true},
                {"name": "a", "parent": "main", "children": ["b"]},
                {"name": "b", "parent": "a", "children": []}
            ]}"#,
        )
        .unwrap();
        let ctx = context(cache);
        let target = identity(dir.path().to_path_buf(), Some("b"));

        let Some(FacetResult::Stack(facet)) = StackCollector.try_collect(&ctx, &target).unwrap()
        else {
            panic!("expected stack facet");
        };
        assert_eq!(facet.branches, ["main", "a", "b"]);
        assert_eq!(facet.index, 2);
        assert!(facet.is_leaf);
        assert!(!facet.is_trunk);
    }

    #[test]
    fn plan_collector_missing_file_is_collected_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("absent.json"));
        let target = identity(dir.path().to_path_buf(), None);

        let Some(FacetResult::Plan(facet)) = PlanCollector.try_collect(&ctx, &target).unwrap()
        else {
            panic!("expected plan facet");
        };
        // Collected-and-empty, not absent.
        assert!(!facet.file_found);
    }

    #[test]
    fn review_collector_unavailable_on_detached_head() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("absent.json"));
        let target = identity(dir.path().to_path_buf(), None);
        assert!(!ReviewCollector.is_available(&ctx, &target));
    }

    #[test]
    fn collect_absorbs_failures() {
        struct Exploding;
        impl StatusCollector for Exploding {
            fn name(&self) -> &'static str {
                "exploding"
            }
            fn kind(&self) -> FacetKind {
                FacetKind::Plan
            }
            fn is_available(&self, _: &StatusContext, _: &WorkspaceIdentity) -> bool {
                true
            }
            fn try_collect(
                &self,
                _: &StatusContext,
                _: &WorkspaceIdentity,
            ) -> anyhow::Result<Option<FacetResult>> {
                anyhow::bail!("collaborator blew up")
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let ctx = context(dir.path().join("absent.json"));
        let target = identity(dir.path().to_path_buf(), None);
        assert!(Exploding.collect(&ctx, &target).is_none());
    }
}
