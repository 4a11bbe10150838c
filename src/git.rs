//! Version-control collaborator: a thin wrapper over the `git` CLI.
//!
//! Everything here shells out to `git` and parses its porcelain output.
//! Parsing lives in free functions so it can be tested without a repository.

use std::path::{Path, PathBuf};
use std::process::Command;

#[derive(Debug)]
pub enum GitError {
    CommandFailed(String),
    ParseError(String),
}

impl std::fmt::Display for GitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GitError::CommandFailed(msg) => write!(f, "git command failed: {}", msg.trim()),
            GitError::ParseError(msg) => write!(f, "failed to parse git output: {}", msg),
        }
    }
}

impl std::error::Error for GitError {}

/// One entry from `git worktree list --porcelain`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    pub path: PathBuf,
    pub head: String,
    pub branch: Option<String>,
    pub bare: bool,
    pub detached: bool,
    pub prunable: Option<String>,
}

impl Workspace {
    /// Display name: the final path component, falling back to the whole
    /// path for degenerate cases like `/`.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.to_string_lossy().into_owned())
    }
}

/// Working-tree change summary parsed from `git status --porcelain`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeSummary {
    pub staged: usize,
    pub unstaged: usize,
    pub untracked: usize,
    pub conflicted: usize,
}

impl ChangeSummary {
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && self.untracked == 0 && self.conflicted == 0
    }
}

/// Repository context for git operations.
///
/// Encapsulates the directory commands run in; clones are cheap.
#[derive(Debug, Clone)]
pub struct Repository {
    path: PathBuf,
}

impl Repository {
    /// Create a repository context at the specified path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path this repository context operates on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the current branch name, or None in detached HEAD state.
    pub fn current_branch(&self) -> Result<Option<String>, GitError> {
        let stdout = self.run_command(&["branch", "--show-current"])?;
        let branch = stdout.trim();
        if branch.is_empty() {
            Ok(None)
        } else {
            Ok(Some(branch.to_string()))
        }
    }

    /// Resolve a revision to a full commit id.
    pub fn rev_parse(&self, rev: &str) -> Result<String, GitError> {
        let stdout = self.run_command(&["rev-parse", "--verify", rev])?;
        Ok(stdout.trim().to_string())
    }

    /// Get the git common directory (the shared .git directory, even from
    /// inside a linked worktree).
    pub fn git_common_dir(&self) -> Result<PathBuf, GitError> {
        let stdout = self.run_command(&["rev-parse", "--git-common-dir"])?;
        let dir = PathBuf::from(stdout.trim());
        if dir.is_absolute() {
            Ok(dir)
        } else {
            Ok(self.path.join(dir))
        }
    }

    /// List all workspaces (worktrees) attached to this repository.
    pub fn list_workspaces(&self) -> Result<Vec<Workspace>, GitError> {
        let stdout = self.run_command(&["worktree", "list", "--porcelain"])?;
        parse_workspace_list(&stdout)
    }

    /// Working-tree change summary for this context's directory.
    pub fn change_summary(&self) -> Result<ChangeSummary, GitError> {
        let stdout = self.run_command(&["status", "--porcelain"])?;
        Ok(parse_change_summary(&stdout))
    }

    /// Subject lines of the most recent commits reachable from `rev`.
    pub fn recent_commits(&self, rev: &str, limit: usize) -> Result<Vec<String>, GitError> {
        let count = limit.to_string();
        let stdout = self.run_command(&["log", "--format=%s", "-n", &count, rev])?;
        Ok(stdout.lines().map(|s| s.to_string()).collect())
    }

    /// Get the upstream tracking branch for the given branch.
    pub fn upstream_branch(&self, branch: &str) -> Result<Option<String>, GitError> {
        let result = self.run_command(&["rev-parse", "--abbrev-ref", &format!("{}@{{u}}", branch)]);
        match result {
            Ok(upstream) => {
                let trimmed = upstream.trim();
                if trimmed.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(trimmed.to_string()))
                }
            }
            // No upstream configured
            Err(_) => Ok(None),
        }
    }

    /// Count commits in base..head.
    pub fn count_commits(&self, base: &str, head: &str) -> Result<usize, GitError> {
        let range = format!("{}..{}", base, head);
        let stdout = self.run_command(&["rev-list", "--count", &range])?;
        stdout
            .trim()
            .parse()
            .map_err(|e| GitError::ParseError(format!("commit count: {}", e)))
    }

    /// Commits ahead and behind between two refs, as (ahead, behind).
    pub fn ahead_behind(&self, base: &str, head: &str) -> Result<(usize, usize), GitError> {
        let ahead = self.count_commits(base, head)?;
        let behind = self.count_commits(head, base)?;
        Ok((ahead, behind))
    }

    /// Run a git command in this repository's context and return stdout.
    pub fn run_command(&self, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        cmd.current_dir(&self.path);

        let output = cmd
            .output()
            .map_err(|e| GitError::CommandFailed(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitError::CommandFailed(stderr.to_string()));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

fn parse_workspace_list(output: &str) -> Result<Vec<Workspace>, GitError> {
    let mut workspaces = Vec::new();
    let mut current: Option<Workspace> = None;

    for line in output.lines() {
        if line.is_empty() {
            if let Some(ws) = current.take() {
                workspaces.push(ws);
            }
            continue;
        }

        let (key, value) = match line.split_once(' ') {
            Some((k, v)) => (k, Some(v)),
            None => (line, None),
        };

        match key {
            "worktree" => {
                let path = value.ok_or_else(|| {
                    GitError::ParseError("worktree line missing path".to_string())
                })?;
                current = Some(Workspace {
                    path: PathBuf::from(path),
                    head: String::new(),
                    branch: None,
                    bare: false,
                    detached: false,
                    prunable: None,
                });
            }
            "HEAD" => {
                if let Some(ref mut ws) = current {
                    ws.head = value
                        .ok_or_else(|| GitError::ParseError("HEAD line missing SHA".to_string()))?
                        .to_string();
                }
            }
            "branch" => {
                if let Some(ref mut ws) = current {
                    let branch_ref = value.ok_or_else(|| {
                        GitError::ParseError("branch line missing ref".to_string())
                    })?;
                    let branch = branch_ref
                        .strip_prefix("refs/heads/")
                        .unwrap_or(branch_ref)
                        .to_string();
                    ws.branch = Some(branch);
                }
            }
            "bare" => {
                if let Some(ref mut ws) = current {
                    ws.bare = true;
                }
            }
            "detached" => {
                if let Some(ref mut ws) = current {
                    ws.detached = true;
                }
            }
            "prunable" => {
                if let Some(ref mut ws) = current {
                    ws.prunable = Some(value.unwrap_or("").to_string());
                }
            }
            // Ignore unknown attributes for forward compatibility
            _ => {}
        }
    }

    if let Some(ws) = current {
        workspaces.push(ws);
    }

    Ok(workspaces)
}

/// Count entries per change class from porcelain v1 two-letter codes.
fn parse_change_summary(output: &str) -> ChangeSummary {
    let mut summary = ChangeSummary::default();

    for line in output.lines() {
        if line.len() < 2 {
            continue;
        }
        let bytes = line.as_bytes();
        let index_status = bytes[0] as char;
        let worktree_status = bytes[1] as char;

        if index_status == '?' && worktree_status == '?' {
            summary.untracked += 1;
            continue;
        }

        // Only U codes and AA/DD indicate actual merge conflicts.
        // AD/DA are normal staging states.
        let is_unmerged = matches!(
            (index_status, worktree_status),
            ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D')
        );
        if is_unmerged {
            summary.conflicted += 1;
            continue;
        }

        if matches!(index_status, 'A' | 'M' | 'C' | 'R' | 'D' | 'T') {
            summary.staged += 1;
        }
        if matches!(worktree_status, 'M' | 'A' | 'T' | 'D') {
            summary.unstaged += 1;
        }
    }

    summary
}
