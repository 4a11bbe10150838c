//! Code-review status for a branch.
//!
//! Two query channels: the stacking tool's cached review record (fast,
//! may be stale) and `gh pr view` (authoritative, slow). The fallback
//! order is internal to this module; callers just get a facet.

use std::process::Command;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::git::Repository;
use crate::metadata::StackMetadataSource;
use crate::utils::get_now;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewState {
    Open,
    Draft,
    Merged,
    Closed,
}

/// Review record as the stacking tool caches it, keyed by branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedReview {
    pub number: u64,
    pub state: ReviewState,
    #[serde(default)]
    pub url: Option<String>,
    /// Branch head the record was fetched for.
    pub head: String,
    /// Unix timestamp of the fetch.
    pub checked_at: u64,
}

/// Collected review facet. `pr: None` means the query succeeded and no
/// review exists for the branch, which is distinct from the facet being
/// absent from the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewFacet {
    pub pr: Option<ReviewInfo>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewInfo {
    pub number: u64,
    pub state: ReviewState,
    pub url: Option<String>,
    /// True when the remote review head differs from the local branch
    /// head (unpushed changes).
    pub is_stale: bool,
}

/// A cached record is trusted while the branch head is unchanged and the
/// record is younger than the TTL.
pub fn cache_is_fresh(cached: &CachedReview, head: &str, now: u64, ttl_secs: u64) -> bool {
    cached.head == head && now.saturating_sub(cached.checked_at) < ttl_secs
}

/// Resolve review status for `branch`, cache first, remote on miss.
pub fn detect_review(
    repo: &Repository,
    source: &dyn StackMetadataSource,
    branch: &str,
    head: &str,
    ttl_secs: u64,
) -> anyhow::Result<ReviewFacet> {
    let now = get_now();

    if let Some(cached) = source.cached_review(branch) {
        if cache_is_fresh(&cached, head, now, ttl_secs) {
            log::debug!(
                "using cached review for {} (age={}s, state={:?})",
                branch,
                now.saturating_sub(cached.checked_at),
                cached.state
            );
            return Ok(ReviewFacet {
                pr: Some(ReviewInfo {
                    number: cached.number,
                    state: cached.state,
                    url: cached.url,
                    is_stale: false,
                }),
            });
        }
        log::debug!(
            "review cache for {} is stale (age={}s, head_match={})",
            branch,
            now.saturating_sub(cached.checked_at),
            cached.head == head
        );
    }

    query_remote(repo, branch, head)
}

/// Shape of `gh pr view --json number,state,isDraft,url,headRefOid`.
#[derive(Debug, Deserialize)]
struct GhPullRequest {
    number: u64,
    state: String,
    #[serde(rename = "isDraft", default)]
    is_draft: bool,
    #[serde(default)]
    url: Option<String>,
    #[serde(rename = "headRefOid", default)]
    head_ref_oid: Option<String>,
}

fn query_remote(repo: &Repository, branch: &str, head: &str) -> anyhow::Result<ReviewFacet> {
    let output = non_interactive_cmd("gh")
        .args([
            "pr",
            "view",
            branch,
            "--json",
            "number,state,isDraft,url,headRefOid",
        ])
        .current_dir(repo.path())
        .output()
        .context("failed to run gh")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.to_ascii_lowercase().contains("no pull requests found") {
            return Ok(ReviewFacet { pr: None });
        }
        if is_retriable_error(&stderr) {
            bail!("review query hit a transient error: {}", stderr.trim());
        }
        bail!("gh pr view failed for {}: {}", branch, stderr.trim());
    }

    let pr: GhPullRequest = parse_json(&output.stdout, "gh pr view", branch)
        .context("unexpected gh pr view output")?;
    let state = state_from_gh(&pr.state, pr.is_draft)
        .with_context(|| format!("unknown review state '{}'", pr.state))?;
    let is_stale = pr.head_ref_oid.as_deref().is_some_and(|oid| oid != head);

    Ok(ReviewFacet {
        pr: Some(ReviewInfo {
            number: pr.number,
            state,
            url: pr.url,
            is_stale,
        }),
    })
}

/// Create a Command configured for non-interactive batch execution, so
/// `gh` never prompts, colors, or opens a browser.
fn non_interactive_cmd(program: &str) -> Command {
    let mut cmd = Command::new(program);
    cmd.env_remove("CLICOLOR_FORCE")
        .env_remove("GH_FORCE_TTY")
        .env("NO_COLOR", "1")
        .env("CLICOLOR", "0")
        .env("GH_PROMPT_DISABLED", "1");
    cmd
}

/// Parse JSON output from CLI tools.
fn parse_json<T: DeserializeOwned>(stdout: &[u8], command: &str, branch: &str) -> Option<T> {
    serde_json::from_slice(stdout)
        .map_err(|e| log::warn!("Failed to parse {} JSON for {}: {}", command, branch, e))
        .ok()
}

/// Check if stderr indicates a retriable error (rate limit, network).
fn is_retriable_error(stderr: &str) -> bool {
    let lower = stderr.to_ascii_lowercase();
    [
        "rate limit",
        "api rate",
        "403",
        "429",
        "timeout",
        "connection",
        "network",
    ]
    .iter()
    .any(|p| lower.contains(p))
}

fn state_from_gh(state: &str, is_draft: bool) -> Option<ReviewState> {
    match state.to_ascii_uppercase().as_str() {
        "OPEN" if is_draft => Some(ReviewState::Draft),
        "OPEN" => Some(ReviewState::Open),
        "MERGED" => Some(ReviewState::Merged),
        "CLOSED" => Some(ReviewState::Closed),
        _ => None,
    }
}
