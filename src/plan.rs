//! Per-workspace plan annotations.
//!
//! A workspace may carry a plan file (markdown, by convention `PLAN.md`
//! at the workspace root). A missing file is a valid "no plan" result,
//! not a failure.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::Context;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanFacet {
    /// False when the workspace has no plan file.
    pub file_found: bool,
    /// First heading (or first non-empty line) of the plan.
    pub headline: Option<String>,
    pub tasks_total: usize,
    pub tasks_done: usize,
}

impl PlanFacet {
    fn missing() -> Self {
        Self::default()
    }
}

/// Read the plan file for a workspace.
pub fn read_plan(workspace: &Path, filename: &str) -> anyhow::Result<PlanFacet> {
    let path = workspace.join(filename);
    let content = match fs::read_to_string(&path) {
        Ok(content) => content,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(PlanFacet::missing()),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read plan {}", path.display()));
        }
    };
    Ok(parse_plan(&content))
}

fn parse_plan(content: &str) -> PlanFacet {
    let mut facet = PlanFacet {
        file_found: true,
        ..PlanFacet::default()
    };

    for line in content.lines() {
        let trimmed = line.trim();
        if facet.headline.is_none() && !trimmed.is_empty() {
            facet.headline = Some(trimmed.trim_start_matches('#').trim().to_string());
        }
        if let Some(rest) = trimmed.strip_prefix("- [") {
            match rest.chars().next() {
                Some(' ') => facet.tasks_total += 1,
                Some('x') | Some('X') => {
                    facet.tasks_total += 1;
                    facet.tasks_done += 1;
                }
                _ => {}
            }
        }
    }

    facet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_valid_empty_result() {
        let dir = tempfile::tempdir().unwrap();
        let facet = read_plan(dir.path(), "PLAN.md").unwrap();
        assert!(!facet.file_found);
        assert!(facet.headline.is_none());
        assert_eq!(facet.tasks_total, 0);
    }

    #[test]
    fn parses_headline_and_tasks() {
        let content = "# Ship auth flow\n\
                       \n\
                       - [x] wire up login\n\
                       - [X] add session store\n\
                       - [ ] logout endpoint\n\
                       - not a task\n";
        let facet = parse_plan(content);
        assert!(facet.file_found);
        assert_eq!(facet.headline.as_deref(), Some("Ship auth flow"));
        assert_eq!(facet.tasks_total, 3);
        assert_eq!(facet.tasks_done, 2);
    }

    #[test]
    fn headline_falls_back_to_first_text_line() {
        let facet = parse_plan("\n\njust some notes\nmore notes\n");
        assert_eq!(facet.headline.as_deref(), Some("just some notes"));
    }

    #[test]
    fn empty_file_still_counts_as_found() {
        let facet = parse_plan("");
        assert!(facet.file_found);
        assert!(facet.headline.is_none());
    }

    #[test]
    fn reads_from_workspace_root() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("PLAN.md"), "# Plan\n- [ ] one\n").unwrap();
        let facet = read_plan(dir.path(), "PLAN.md").unwrap();
        assert!(facet.file_found);
        assert_eq!(facet.tasks_total, 1);
    }
}
