//! Workspace topology and status engine for stacked-branch worktree
//! workflows.
//!
//! Two paths share one branch-forest model:
//! - display: metadata records → [`graph::BranchGraph`] →
//!   [`stack::branch_stack`] / [`tree::build_tree`] → [`tree::render`];
//! - status: a collector registry fanned out by
//!   [`status::collect_status`] into a partial, deterministic
//!   [`status::StatusSnapshot`].

pub mod config;
pub mod git;
pub mod graph;
pub mod metadata;
pub mod plan;
pub mod review;
pub mod stack;
pub mod status;
pub mod tree;
pub mod utils;

pub use graph::{BranchGraph, BranchRecord, DataIntegrityError};
pub use stack::{BranchStack, branch_stack};
pub use status::{SetupError, StatusContext, StatusSnapshot, collect_status};
pub use tree::{TreeNode, build_tree, render};
