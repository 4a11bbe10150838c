//! Status orchestration: parallel, timeout-bounded collection of status
//! facets into one deterministic snapshot.
//!
//! The orchestrator owns a bounded pool of worker threads for the
//! duration of one call. Collectors are mutually independent, so the
//! only ordering that matters is the snapshot's fixed field order; a
//! slow or hanging collector costs at most its timeout budget and never
//! disturbs another collector's result.

pub mod collectors;

use std::cmp;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel as chan;

use crate::config::StatusConfig;
use crate::git::{Repository, Workspace};
use crate::metadata::StackMetadataSource;
use crate::plan::PlanFacet;
use crate::review::ReviewFacet;

use self::collectors::{
    FacetKind, FacetResult, GitFacet, StackFacet, StatusCollector, default_collectors,
};

/// Collaborators and knobs shared by every collector in one call.
#[derive(Clone)]
pub struct StatusContext {
    pub metadata: Arc<dyn StackMetadataSource>,
    pub config: StatusConfig,
}

/// Identity of the workspace a snapshot describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceIdentity {
    /// Display name: the workspace directory's final path component.
    pub name: String,
    pub path: PathBuf,
    /// Bound branch; None in detached HEAD state.
    pub branch: Option<String>,
    /// Head commit id at enumeration time.
    pub head: String,
    /// True for the repository's primary workspace.
    pub is_root: bool,
}

/// A sibling workspace in the same repository. When its path is gone
/// from disk the entry is downgraded to this partial record rather than
/// failing the snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelatedWorkspace {
    pub name: String,
    pub path: PathBuf,
    pub branch: Option<String>,
    pub path_missing: bool,
}

/// Point-in-time aggregate of everything collected about a workspace.
///
/// Field order is the schema order; it never depends on which collector
/// finished first. A `None` facet means "not collected" — collectors
/// that ran and found nothing produce a populated-but-empty value
/// instead.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub workspace: WorkspaceIdentity,
    pub git: Option<GitFacet>,
    pub review: Option<ReviewFacet>,
    pub stack: Option<StackFacet>,
    pub plan: Option<PlanFacet>,
    pub related: Option<Vec<RelatedWorkspace>>,
}

/// Failure to resolve the target workspace: the only error that escapes
/// `collect_status`.
#[derive(Debug)]
pub enum SetupError {
    RepoUnavailable(String),
    NoWorkspaces,
    WorkspaceNotFound(String),
    CurrentWorkspaceUnknown,
}

impl std::fmt::Display for SetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SetupError::RepoUnavailable(msg) => write!(f, "repository unavailable: {}", msg),
            SetupError::NoWorkspaces => write!(f, "repository has no workspaces"),
            SetupError::WorkspaceNotFound(target) => {
                write!(f, "no workspace matches '{}'", target)
            }
            SetupError::CurrentWorkspaceUnknown => {
                write!(f, "current directory is not inside a workspace")
            }
        }
    }
}

impl std::error::Error for SetupError {}

/// One message from a worker back to the drain loop.
struct CollectorReply {
    kind: FacetKind,
    name: &'static str,
    facet: Option<FacetResult>,
    elapsed: Duration,
}

/// Collect the status snapshot for a workspace of the repository at
/// `repo_root`, using the standard collector registry.
///
/// `target` selects a workspace by name or bound branch; `None` means
/// the workspace containing `repo_root`.
pub fn collect_status(
    ctx: &StatusContext,
    target: Option<&str>,
    repo_root: &Path,
) -> Result<StatusSnapshot, SetupError> {
    collect_status_with(ctx, target, repo_root, &default_collectors())
}

/// `collect_status` with an explicit collector registry.
pub fn collect_status_with(
    ctx: &StatusContext,
    target: Option<&str>,
    repo_root: &Path,
    registry: &[Arc<dyn StatusCollector>],
) -> Result<StatusSnapshot, SetupError> {
    let repo = Repository::at(repo_root);

    // Step 1: one point-in-time read of the workspace listing; identity
    // resolution is the single error boundary of this call.
    let workspaces = repo
        .list_workspaces()
        .map_err(|e| SetupError::RepoUnavailable(e.to_string()))?;
    let identity = resolve_workspace(&workspaces, repo.path(), target)?;

    // Step 2: availability filter. Skipped collectors are not submitted
    // and not logged.
    let available: Vec<Arc<dyn StatusCollector>> = registry
        .iter()
        .filter(|c| c.is_available(ctx, &identity))
        .cloned()
        .collect();

    // Steps 3-5: submit, then drain under deadlines.
    let recorded = run_collectors(ctx, &identity, &available);

    // Step 6: related workspaces, from the same point-in-time listing.
    let related = related_workspaces(&workspaces, &identity);

    // Step 7: assemble in fixed schema order, independent of completion
    // order.
    let mut snapshot = StatusSnapshot {
        workspace: identity,
        git: None,
        review: None,
        stack: None,
        plan: None,
        related: Some(related),
    };
    for facet in recorded.into_values().flatten() {
        match facet {
            FacetResult::Git(facet) => snapshot.git = Some(facet),
            FacetResult::Review(facet) => snapshot.review = Some(facet),
            FacetResult::Stack(facet) => snapshot.stack = Some(facet),
            FacetResult::Plan(facet) => snapshot.plan = Some(facet),
        }
    }
    Ok(snapshot)
}

/// Submit every available collector to a bounded worker pool and await
/// results under per-collector and aggregate deadlines.
///
/// Awaits are serialized over submission order: each collector gets a
/// budget of one timeout, while results from the others are recorded as
/// they arrive. Worst case wall clock is `timeout × n`, with an explicit
/// aggregate deadline as a backstop. A collector that misses its budget
/// is recorded absent; its late result, if any, is ignored.
fn run_collectors(
    ctx: &StatusContext,
    identity: &WorkspaceIdentity,
    available: &[Arc<dyn StatusCollector>],
) -> HashMap<FacetKind, Option<FacetResult>> {
    let mut recorded: HashMap<FacetKind, Option<FacetResult>> = HashMap::new();
    if available.is_empty() {
        return recorded;
    }

    let n = available.len();
    let (work_tx, work_rx) = chan::bounded::<Arc<dyn StatusCollector>>(n);
    let (reply_tx, reply_rx) = chan::unbounded::<CollectorReply>();

    // Pool size is capped independently of the collector count. Workers
    // are detached: a hanging collect() keeps its thread, not this call.
    let workers = cmp::min(ctx.config.max_workers.max(1), n);
    for _ in 0..workers {
        let work_rx = work_rx.clone();
        let reply_tx = reply_tx.clone();
        let ctx = ctx.clone();
        let identity = identity.clone();
        std::thread::spawn(move || {
            while let Ok(collector) = work_rx.recv() {
                let started = Instant::now();
                let name = collector.name();
                let kind = collector.kind();
                let facet = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    collector.collect(&ctx, &identity)
                }))
                .unwrap_or_else(|_| {
                    log::warn!("{} collector panicked", name);
                    None
                });
                if reply_tx
                    .send(CollectorReply {
                        kind,
                        name,
                        facet,
                        elapsed: started.elapsed(),
                    })
                    .is_err()
                {
                    break;
                }
            }
        });
    }
    drop(work_rx);
    drop(reply_tx);

    for collector in available {
        // Channel holds n slots, so this never blocks.
        let _ = work_tx.send(collector.clone());
    }
    drop(work_tx);

    let timeout = ctx.config.collector_timeout();
    let submitted = Instant::now();
    let aggregate_deadline = submitted + timeout * n as u32;

    'collectors: for collector in available {
        let kind = collector.kind();
        if recorded.contains_key(&kind) {
            continue;
        }
        let slot_deadline = cmp::min(Instant::now() + timeout, aggregate_deadline);
        while !recorded.contains_key(&kind) {
            let now = Instant::now();
            if now >= slot_deadline {
                log::warn!(
                    "{} collector timed out ({:.1?} elapsed); recording absent",
                    collector.name(),
                    now.duration_since(submitted)
                );
                recorded.insert(kind, None);
                break;
            }
            match reply_rx.recv_timeout(slot_deadline - now) {
                Ok(reply) => record_reply(&mut recorded, reply),
                Err(chan::RecvTimeoutError::Timeout) => {}
                Err(chan::RecvTimeoutError::Disconnected) => break 'collectors,
            }
        }
    }

    // Workers gone with results still outstanding (a panicked worker, or
    // the drain loop broke early): record absence.
    for collector in available {
        recorded.entry(collector.kind()).or_insert_with(|| {
            log::warn!("{} collector produced no result; recording absent", collector.name());
            None
        });
    }

    recorded
}

/// Record one reply, enforcing the one-way state machine and the shape
/// check.
fn record_reply(recorded: &mut HashMap<FacetKind, Option<FacetResult>>, reply: CollectorReply) {
    if recorded.contains_key(&reply.kind) {
        // Already recorded (typically absent after a timeout).
        log::debug!("{} collector reported late; ignoring", reply.name);
        return;
    }

    let facet = reply.facet.filter(|facet| {
        let actual = FacetKind::from(facet);
        if actual == reply.kind {
            true
        } else {
            let expected: &'static str = reply.kind.into();
            let got: &'static str = actual.into();
            log::warn!(
                "{} collector returned a {} payload where {} was expected; treating as absent",
                reply.name,
                got,
                expected
            );
            false
        }
    });

    log::debug!("{} collector finished in {:.1?}", reply.name, reply.elapsed);
    recorded.insert(reply.kind, facet);
}

/// Resolve which workspace the snapshot is about.
fn resolve_workspace(
    workspaces: &[Workspace],
    repo_path: &Path,
    target: Option<&str>,
) -> Result<WorkspaceIdentity, SetupError> {
    if workspaces.is_empty() {
        return Err(SetupError::NoWorkspaces);
    }

    let index = match target {
        Some(wanted) => workspaces
            .iter()
            .position(|ws| ws.name() == wanted || ws.branch.as_deref() == Some(wanted))
            .ok_or_else(|| SetupError::WorkspaceNotFound(wanted.to_string()))?,
        None => {
            // Canonicalize both sides: the listing may use a different
            // path representation than the caller.
            let repo_canonical = dunce::canonicalize(repo_path)
                .map_err(|_| SetupError::CurrentWorkspaceUnknown)?;
            workspaces
                .iter()
                .position(|ws| {
                    dunce::canonicalize(&ws.path)
                        .is_ok_and(|ws_path| repo_canonical.starts_with(&ws_path))
                })
                .ok_or(SetupError::CurrentWorkspaceUnknown)?
        }
    };

    let selected = &workspaces[index];
    Ok(WorkspaceIdentity {
        name: selected.name(),
        path: selected.path.clone(),
        branch: selected.branch.clone(),
        head: selected.head.clone(),
        // git lists the primary workspace first.
        is_root: index == 0,
    })
}

/// Enumerate sibling workspaces, excluding the target.
fn related_workspaces(
    workspaces: &[Workspace],
    identity: &WorkspaceIdentity,
) -> Vec<RelatedWorkspace> {
    let target_canonical = dunce::canonicalize(&identity.path).ok();

    workspaces
        .iter()
        .filter(|ws| {
            match (&target_canonical, dunce::canonicalize(&ws.path).ok()) {
                (Some(target), Some(path)) => *target != path,
                // Canonicalization fails for missing paths; fall back to
                // raw comparison so stale entries still show up.
                _ => ws.path != identity.path,
            }
        })
        .map(|ws| RelatedWorkspace {
            name: ws.name(),
            branch: ws.branch.clone(),
            path_missing: !ws.path.is_dir() || ws.prunable.is_some(),
            path: ws.path.clone(),
        })
        .collect()
}
