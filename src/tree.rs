//! Workspace display tree: filter the branch forest to workspace-bound
//! branches and render it with box-drawing connectors.
//!
//! Reparenting policy: when an unbound branch sits between two bound
//! ones, the bound descendant attaches to its nearest bound ancestor so
//! the tree stays visually connected. An unbound subtree with no bound
//! descendants is dropped.

use indexmap::IndexMap;

use crate::graph::BranchGraph;

/// One node of the display tree. Only branches bound to an active
/// workspace appear.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub branch: String,
    pub workspace: Option<String>,
    pub children: Vec<TreeNode>,
    pub is_current: bool,
}

/// Build the display tree for workspace-bound branches.
///
/// `bindings` maps branch name to workspace name, in workspace order.
/// Roots are bound branches with no bound ancestor, discovered from the
/// graph's trunks in record order. Pure and deterministic: identical
/// inputs produce identical trees.
pub fn build_tree(
    graph: &BranchGraph,
    bindings: &IndexMap<String, String>,
    current_branch: Option<&str>,
) -> Vec<TreeNode> {
    let mut roots = Vec::new();
    for trunk in graph.trunks() {
        attach_bound(graph, &trunk.name, bindings, current_branch, &mut roots);
    }
    roots
}

/// Append the node for `branch` if it is bound, else splice its bound
/// descendants into `out` (the reparenting step).
fn attach_bound(
    graph: &BranchGraph,
    branch: &str,
    bindings: &IndexMap<String, String>,
    current_branch: Option<&str>,
    out: &mut Vec<TreeNode>,
) {
    if let Some(workspace) = bindings.get(branch) {
        let mut children = Vec::new();
        for child in graph.children_of(branch) {
            attach_bound(graph, child, bindings, current_branch, &mut children);
        }
        out.push(TreeNode {
            branch: branch.to_string(),
            workspace: Some(workspace.clone()),
            children,
            is_current: current_branch == Some(branch),
        });
    } else {
        for child in graph.children_of(branch) {
            attach_bound(graph, child, bindings, current_branch, out);
        }
    }
}

/// Marker for the workspace the caller is in.
const CURRENT_MARKER: &str = "◉";
/// Marker for every other workspace.
const OTHER_MARKER: &str = "◯";

/// Render the display tree as structural text.
///
/// Depth-first in the builder's child order (never re-sorted). The last
/// child of a parent gets `└── `, earlier siblings `├── `, and open
/// ancestor chains continue with `│   ` guides. Pure function.
pub fn render(roots: &[TreeNode]) -> String {
    let mut out = String::new();
    for root in roots {
        write_label(root, &mut out);
        out.push('\n');
        render_children(root, "", &mut out);
    }
    out
}

fn render_children(node: &TreeNode, prefix: &str, out: &mut String) {
    let count = node.children.len();
    for (i, child) in node.children.iter().enumerate() {
        let is_last = i + 1 == count;
        out.push_str(prefix);
        out.push_str(if is_last { "└── " } else { "├── " });
        write_label(child, out);
        out.push('\n');

        let child_prefix = format!("{prefix}{}", if is_last { "    " } else { "│   " });
        render_children(child, &child_prefix, out);
    }
}

fn write_label(node: &TreeNode, out: &mut String) {
    let marker = if node.is_current {
        CURRENT_MARKER
    } else {
        OTHER_MARKER
    };
    out.push_str(marker);
    out.push(' ');
    out.push_str(&node.branch);
    if let Some(workspace) = &node.workspace {
        out.push_str(" [");
        out.push_str(workspace);
        out.push(']');
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::BranchRecord;

    fn graph(records: &[(&str, Option<&str>, &[&str], bool)]) -> BranchGraph {
        let records = records
            .iter()
            .map(|(name, parent, children, is_trunk)| BranchRecord {
                name: name.to_string(),
                parent: parent.map(|p| p.to_string()),
                children: children.iter().map(|c| c.to_string()).collect(),
                is_trunk: *is_trunk,
                commit_id: None,
            })
            .collect();
        BranchGraph::from_records(records).unwrap()
    }

    fn bindings(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
        pairs
            .iter()
            .map(|(b, w)| (b.to_string(), w.to_string()))
            .collect()
    }

    fn flatten<'a>(nodes: &'a [TreeNode], out: &mut Vec<&'a str>) {
        for node in nodes {
            out.push(&node.branch);
            flatten(&node.children, out);
        }
    }

    #[test]
    fn bound_chain_nests_fully() {
        let g = graph(&[
            ("main", None, &["a"], true),
            ("a", Some("main"), &["b"], false),
            ("b", Some("a"), &[], false),
        ]);
        let b = bindings(&[("main", "core"), ("a", "core.a"), ("b", "core.b")]);
        let roots = build_tree(&g, &b, Some("a"));

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].branch, "main");
        assert_eq!(roots[0].children[0].branch, "a");
        assert!(roots[0].children[0].is_current);
        assert_eq!(roots[0].children[0].children[0].branch, "b");
    }

    #[test]
    fn reparents_across_unbound_gap() {
        // main -> a -> b with a unbound: b attaches directly under main.
        // Pins the reparenting policy.
        let g = graph(&[
            ("main", None, &["a"], true),
            ("a", Some("main"), &["b"], false),
            ("b", Some("a"), &[], false),
        ]);
        let b = bindings(&[("main", "core"), ("b", "core.b")]);
        let roots = build_tree(&g, &b, None);

        assert_eq!(roots.len(), 1);
        assert_eq!(roots[0].branch, "main");
        assert_eq!(roots[0].children.len(), 1);
        assert_eq!(roots[0].children[0].branch, "b");
        assert!(roots[0].children[0].children.is_empty());
    }

    #[test]
    fn unbound_trunk_promotes_bound_descendants_to_roots() {
        let g = graph(&[
            ("main", None, &["a", "c"], true),
            ("a", Some("main"), &["b"], false),
            ("b", Some("a"), &[], false),
            ("c", Some("main"), &[], false),
        ]);
        let b = bindings(&[("b", "core.b"), ("c", "core.c")]);
        let roots = build_tree(&g, &b, None);

        let names: Vec<_> = roots.iter().map(|r| r.branch.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
    }

    #[test]
    fn output_only_contains_bound_branches() {
        let g = graph(&[
            ("main", None, &["a"], true),
            ("a", Some("main"), &["b"], false),
            ("b", Some("a"), &["c"], false),
            ("c", Some("b"), &[], false),
        ]);
        let b = bindings(&[("main", "core"), ("b", "core.b")]);
        let roots = build_tree(&g, &b, None);

        let mut seen = Vec::new();
        flatten(&roots, &mut seen);
        for name in &seen {
            assert!(b.contains_key(*name), "{name} has no workspace binding");
        }
        assert_eq!(seen, ["main", "b"]);
    }

    #[test]
    fn unbound_subtree_without_bound_descendants_is_dropped() {
        let g = graph(&[
            ("main", None, &["a", "x"], true),
            ("a", Some("main"), &[], false),
            ("x", Some("main"), &["y"], false),
            ("y", Some("x"), &[], false),
        ]);
        let b = bindings(&[("main", "core"), ("a", "core.a")]);
        let roots = build_tree(&g, &b, None);

        let mut seen = Vec::new();
        flatten(&roots, &mut seen);
        assert_eq!(seen, ["main", "a"]);
    }

    #[test]
    fn build_is_deterministic() {
        let g = graph(&[
            ("main", None, &["a", "b"], true),
            ("a", Some("main"), &[], false),
            ("b", Some("main"), &[], false),
        ]);
        let b = bindings(&[("main", "core"), ("a", "wa"), ("b", "wb")]);
        assert_eq!(build_tree(&g, &b, Some("b")), build_tree(&g, &b, Some("b")));
    }

    #[test]
    fn render_linear_chain() {
        let g = graph(&[
            ("main", None, &["a"], true),
            ("a", Some("main"), &["b"], false),
            ("b", Some("a"), &[], false),
        ]);
        let b = bindings(&[("main", "core"), ("a", "core.a"), ("b", "core.b")]);
        let roots = build_tree(&g, &b, Some("a"));

        let text = render(&roots);
        assert_eq!(
            text,
            "◯ main [core]\n\
             └── ◉ a [core.a]\n\
             \x20   └── ◯ b [core.b]\n"
        );
    }

    #[test]
    fn render_siblings_use_tee_and_elbow() {
        let g = graph(&[
            ("main", None, &["a", "b"], true),
            ("a", Some("main"), &["c"], false),
            ("b", Some("main"), &[], false),
            ("c", Some("a"), &[], false),
        ]);
        let b = bindings(&[
            ("main", "core"),
            ("a", "core.a"),
            ("b", "core.b"),
            ("c", "core.c"),
        ]);
        let text = render(&build_tree(&g, &b, None));

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], "◯ main [core]");
        assert_eq!(lines[1], "├── ◯ a [core.a]");
        // a is not the last child, so its subtree carries a guide.
        assert_eq!(lines[2], "│   └── ◯ c [core.c]");
        assert_eq!(lines[3], "└── ◯ b [core.b]");
    }

    #[test]
    fn render_structure_is_recoverable() {
        // Node count and nesting depth are recoverable from the
        // connector/indentation pattern alone.
        let g = graph(&[
            ("main", None, &["a", "b"], true),
            ("a", Some("main"), &["c"], false),
            ("b", Some("main"), &[], false),
            ("c", Some("a"), &[], false),
        ]);
        let b = bindings(&[
            ("main", "w0"),
            ("a", "w1"),
            ("b", "w2"),
            ("c", "w3"),
        ]);
        let text = render(&build_tree(&g, &b, None));

        let mut node_count = 0;
        let mut max_depth = 0;
        for line in text.lines() {
            node_count += 1;
            let glyph_at = line
                .chars()
                .position(|c| c == '◉' || c == '◯')
                .unwrap();
            // Each level of nesting contributes 4 columns before the marker.
            assert_eq!(glyph_at % 4, 0);
            max_depth = max_depth.max(glyph_at / 4);
        }
        assert_eq!(node_count, 4);
        assert_eq!(max_depth, 2);
    }

    #[test]
    fn render_preserves_child_order() {
        let g = graph(&[
            ("main", None, &["b", "a"], true),
            ("a", Some("main"), &[], false),
            ("b", Some("main"), &[], false),
        ]);
        let binds = bindings(&[("main", "core"), ("a", "wa"), ("b", "wb")]);
        let text = render(&build_tree(&g, &binds, None));
        let b_at = text.find("◯ b").unwrap();
        let a_at = text.find("◯ a").unwrap();
        assert!(b_at < a_at, "children must render in graph order");
    }

    #[test]
    fn render_empty_forest() {
        assert_eq!(render(&[]), "");
    }
}
