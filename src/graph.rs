//! Branch forest built from the stacking tool's metadata records.
//!
//! The stacking tool persists one record per tracked branch (parent name,
//! ordered children, trunk flag). This module turns those records into an
//! immutable forest, rejecting malformed input instead of guessing.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// One raw branch record as the stacking tool persists it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchRecord {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    #[serde(default)]
    pub children: Vec<String>,
    #[serde(default)]
    pub is_trunk: bool,
    #[serde(default)]
    pub commit_id: Option<String>,
}

/// A validated node in the branch forest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BranchNode {
    pub name: String,
    /// Parent branch name. None for trunk nodes.
    pub parent: Option<String>,
    /// Child branch names, in the order the stacking tool recorded them.
    /// The order is meaningful: downward stack traversal follows the
    /// first entry.
    pub children: Vec<String>,
    pub is_trunk: bool,
    pub commit_id: Option<String>,
}

/// Malformed metadata. Always names the offending branch; never swallowed.
#[derive(Debug, PartialEq, Eq)]
pub enum DataIntegrityError {
    /// A `children` entry references a branch with no record.
    UnknownChild { branch: String, child: String },
    /// A `parent` entry references a branch with no record.
    UnknownParent { branch: String, parent: String },
    /// Two records share one name.
    DuplicateBranch(String),
    /// Walking parent pointers from this branch revisits it.
    CycleDetected(String),
}

impl std::fmt::Display for DataIntegrityError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataIntegrityError::UnknownChild { branch, child } => {
                write!(f, "branch '{}' lists unknown child '{}'", branch, child)
            }
            DataIntegrityError::UnknownParent { branch, parent } => {
                write!(f, "branch '{}' references unknown parent '{}'", branch, parent)
            }
            DataIntegrityError::DuplicateBranch(name) => {
                write!(f, "duplicate metadata record for branch '{}'", name)
            }
            DataIntegrityError::CycleDetected(name) => {
                write!(f, "branch metadata contains a cycle through '{}'", name)
            }
        }
    }
}

impl std::error::Error for DataIntegrityError {}

/// Immutable parent/children forest over tracked branches.
///
/// Built once per invocation from a point-in-time read of the metadata
/// cache; never mutated afterwards. Node order follows record order, so
/// iteration is deterministic.
#[derive(Debug, Clone, Default)]
pub struct BranchGraph {
    nodes: IndexMap<String, BranchNode>,
}

impl BranchGraph {
    /// Build and validate the forest from raw records.
    pub fn from_records(records: Vec<BranchRecord>) -> Result<Self, DataIntegrityError> {
        let mut nodes: IndexMap<String, BranchNode> = IndexMap::with_capacity(records.len());

        for record in records {
            let is_trunk = record.is_trunk || record.parent.is_none();
            let node = BranchNode {
                name: record.name.clone(),
                parent: record.parent,
                children: record.children,
                is_trunk,
                commit_id: record.commit_id,
            };
            if nodes.insert(record.name.clone(), node).is_some() {
                return Err(DataIntegrityError::DuplicateBranch(record.name));
            }
        }

        // Every referenced name must resolve to a record.
        for node in nodes.values() {
            for child in &node.children {
                if !nodes.contains_key(child) {
                    return Err(DataIntegrityError::UnknownChild {
                        branch: node.name.clone(),
                        child: child.clone(),
                    });
                }
            }
            if let Some(parent) = &node.parent
                && !nodes.contains_key(parent)
            {
                return Err(DataIntegrityError::UnknownParent {
                    branch: node.name.clone(),
                    parent: parent.clone(),
                });
            }
        }

        let graph = Self { nodes };
        if let Some(name) = graph.find_cycle() {
            return Err(DataIntegrityError::CycleDetected(name));
        }
        Ok(graph)
    }

    pub fn get(&self, name: &str) -> Option<&BranchNode> {
        self.nodes.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes, in record order.
    pub fn branches(&self) -> impl Iterator<Item = &BranchNode> {
        self.nodes.values()
    }

    /// Trunk nodes, in record order.
    pub fn trunks(&self) -> impl Iterator<Item = &BranchNode> {
        self.nodes.values().filter(|n| n.is_trunk)
    }

    /// Parent name of a branch, if it has one.
    pub fn parent_of(&self, name: &str) -> Option<&str> {
        self.nodes.get(name)?.parent.as_deref()
    }

    /// Ordered child names of a branch. Empty for leaves and unknown names.
    pub fn children_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
    }

    /// Detect a cycle in the parent chain, returning a branch on it.
    ///
    /// Walks parent pointers from every node with a visited set shared
    /// across starts and a per-walk path set.
    fn find_cycle(&self) -> Option<String> {
        use std::collections::HashSet;

        let mut visited: HashSet<&str> = HashSet::new();
        for start in self.nodes.keys() {
            if visited.contains(start.as_str()) {
                continue;
            }
            let mut path: HashSet<&str> = HashSet::new();
            let mut current = Some(start.as_str());
            while let Some(name) = current {
                if path.contains(name) {
                    return Some(name.to_string());
                }
                if visited.contains(name) {
                    break;
                }
                visited.insert(name);
                path.insert(name);
                current = self.parent_of(name);
            }
        }
        None
    }
}
