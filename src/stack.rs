//! Linear stack resolution over the branch forest.
//!
//! A stack is the single trunk-to-leaf chain a branch sits on. Upward the
//! chain is unambiguous (one parent each); downward it follows the first
//! child only, so sibling forks are deliberately ignored.

use crate::graph::BranchGraph;

/// An ordered chain of branch names, trunk first, containing the target
/// exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchStack {
    branches: Vec<String>,
    target: usize,
}

impl BranchStack {
    pub fn branches(&self) -> &[String] {
        &self.branches
    }

    pub fn target(&self) -> &str {
        &self.branches[self.target]
    }

    /// Index of the target within the chain (0 = trunk).
    pub fn target_index(&self) -> usize {
        self.target
    }

    /// Chain segment strictly above the target (trunk first).
    pub fn ancestors(&self) -> &[String] {
        &self.branches[..self.target]
    }

    /// Chain segment strictly below the target.
    pub fn descendants(&self) -> &[String] {
        &self.branches[self.target + 1..]
    }

    pub fn len(&self) -> usize {
        self.branches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }
}

/// Resolve the stack containing `target`.
///
/// Returns None when `target` is not tracked in the graph; callers treat
/// that as an untracked branch, not an error.
pub fn branch_stack(graph: &BranchGraph, target: &str) -> Option<BranchStack> {
    let node = graph.get(target)?;

    // Upward: collect ancestors until a trunk node, then reverse so the
    // trunk comes first. The graph is validated acyclic, so this
    // terminates.
    let mut ancestors = Vec::new();
    let mut current = node;
    while !current.is_trunk {
        let parent = current.parent.as_deref()?;
        ancestors.push(parent.to_string());
        current = graph.get(parent)?;
    }
    ancestors.reverse();

    let target_index = ancestors.len();
    let mut branches = ancestors;
    branches.push(target.to_string());

    // Downward: follow only the first child at each step.
    let mut cursor = target;
    while let Some(first) = graph.children_of(cursor).first() {
        branches.push(first.clone());
        cursor = first.as_str();
    }

    Some(BranchStack {
        branches,
        target: target_index,
    })
}

/// Where a branch sits within its stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackPosition {
    pub stack: BranchStack,
    pub is_trunk: bool,
    pub is_leaf: bool,
}

/// Resolve the stack plus trunk/leaf classification for `target`.
pub fn stack_position(graph: &BranchGraph, target: &str) -> Option<StackPosition> {
    let stack = branch_stack(graph, target)?;
    let node = graph.get(target)?;
    Some(StackPosition {
        is_trunk: node.is_trunk,
        is_leaf: node.children.is_empty(),
        stack,
    })
}
