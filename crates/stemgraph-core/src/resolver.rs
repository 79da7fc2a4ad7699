//! Transitive `BUILDS_ON` resolution: flat closure and expanded tree.
//!
//! Both operations work on a [`DependencyGraph`], which may come from the
//! cached snapshot or from a subgraph fetched live from the store. Neither
//! fails: an unknown root resolves to an empty closure and a childless tree,
//! and cycles are cut rather than reported.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::graph::DependencyGraph;
use crate::model::Node;

/// UUIDs reachable from `uuid` through one or more `BUILDS_ON` edges.
///
/// The root is never part of the result, even when a cycle leads back to it.
pub fn closure(graph: &DependencyGraph, uuid: &str) -> BTreeSet<String> {
    graph
        .reachable_from(uuid)
        .into_iter()
        .filter(|node| node.uuid != uuid)
        .map(|node| node.uuid.clone())
        .collect()
}

/// Default cap on tree depth (edges from the root).
pub const DEFAULT_MAX_TREE_DEPTH: usize = 256;

/// Default cap on the number of nodes in one tree, root included.
pub const DEFAULT_MAX_TREE_NODES: usize = 10_000;

/// Bounds on how far [`tree_with_limits`] expands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeLimits {
    pub max_depth: usize,
    pub max_nodes: usize,
}

impl Default for TreeLimits {
    fn default() -> Self {
        TreeLimits {
            max_depth: DEFAULT_MAX_TREE_DEPTH,
            max_nodes: DEFAULT_MAX_TREE_NODES,
        }
    }
}

/// One node of a dependency tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyTree {
    pub uuid: String,
    /// `None` only for a root uuid the graph does not know.
    pub node: Option<Node>,
    /// Set on a node already present on the path from the root; such a node
    /// is a leaf reference and is not expanded again.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub cycle: bool,
    /// Set when some of this node's dependencies were left out because the
    /// depth or node limit was reached.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
    pub children: Vec<DependencyTree>,
}

impl DependencyTree {
    fn leaf(uuid: &str, node: Option<&Node>) -> Self {
        DependencyTree {
            uuid: uuid.to_string(),
            node: node.cloned(),
            cycle: false,
            truncated: false,
            children: Vec::new(),
        }
    }

    /// Number of tree nodes, root included.
    pub fn size(&self) -> usize {
        let mut count = 0;
        let mut pending = vec![self];
        while let Some(current) = pending.pop() {
            count += 1;
            pending.extend(&current.children);
        }
        count
    }

    /// Longest root-to-leaf edge count.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 0)];
        while let Some((current, depth)) = pending.pop() {
            deepest = deepest.max(depth);
            pending.extend(current.children.iter().map(|c| (c, depth + 1)));
        }
        deepest
    }
}

/// Expand `uuid` into its `BUILDS_ON` tree with the default limits.
pub fn tree(graph: &DependencyGraph, uuid: &str) -> DependencyTree {
    tree_with_limits(graph, uuid, TreeLimits::default())
}

/// Expand `uuid` into its `BUILDS_ON` tree.
///
/// A node reached along two different paths is expanded under each of them;
/// only a node already on the current path is cut off. Expansion stops at
/// `limits.max_depth` and once `limits.max_nodes` nodes exist; nodes whose
/// dependencies were left out carry `truncated`.
pub fn tree_with_limits(graph: &DependencyGraph, uuid: &str, limits: TreeLimits) -> DependencyTree {
    let mut arena = vec![Entry::new(DependencyTree::leaf(uuid, graph.node(uuid)))];
    let mut budget = limits.max_nodes.saturating_sub(1);
    let mut path = PathStack::default();
    let mut stack = Vec::new();

    let root_targets = graph.builds_on(uuid);
    if limits.max_depth == 0 || budget == 0 {
        arena[0].tree.truncated = !root_targets.is_empty();
    } else {
        path.push(uuid);
        stack.push(Frame::new(0, 0, root_targets));
    }

    while let Some(frame) = stack.last_mut() {
        let Some(target) = frame.targets.get(frame.next).copied() else {
            path.pop();
            stack.pop();
            continue;
        };
        frame.next += 1;
        let (parent, depth) = (frame.index, frame.depth + 1);

        if budget == 0 {
            arena[parent].tree.truncated = true;
            continue;
        }
        budget -= 1;

        let index = arena.len();
        let mut child = DependencyTree::leaf(&target.uuid, Some(target));
        arena[parent].children.push(index);

        if path.contains(&target.uuid) {
            child.cycle = true;
            arena.push(Entry::new(child));
            continue;
        }

        let targets = graph.builds_on(&target.uuid);
        if depth >= limits.max_depth {
            child.truncated = !targets.is_empty();
            arena.push(Entry::new(child));
            continue;
        }

        arena.push(Entry::new(child));
        path.push(&target.uuid);
        stack.push(Frame::new(index, depth, targets));
    }

    assemble(arena)
}

/// A tree node still waiting for its children, which sit later in the arena.
struct Entry {
    tree: DependencyTree,
    children: Vec<usize>,
}

impl Entry {
    fn new(tree: DependencyTree) -> Self {
        Entry {
            tree,
            children: Vec::new(),
        }
    }
}

struct Frame<'g> {
    index: usize,
    depth: usize,
    targets: Vec<&'g Node>,
    next: usize,
}

impl<'g> Frame<'g> {
    fn new(index: usize, depth: usize, targets: Vec<&'g Node>) -> Self {
        Frame {
            index,
            depth,
            targets,
            next: 0,
        }
    }
}

/// Link arena entries into nested trees, children before parents.
fn assemble(arena: Vec<Entry>) -> DependencyTree {
    let mut built: Vec<Option<DependencyTree>> = Vec::with_capacity(arena.len());
    let mut links = Vec::with_capacity(arena.len());
    for entry in arena {
        built.push(Some(entry.tree));
        links.push(entry.children);
    }

    for index in (0..built.len()).rev() {
        let children: Vec<DependencyTree> = links[index]
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        if let Some(tree) = built[index].as_mut() {
            tree.children = children;
        }
    }

    built
        .swap_remove(0)
        .unwrap_or_else(|| DependencyTree::leaf("", None))
}

/// The uuids between the root and the node being expanded.
#[derive(Default)]
struct PathStack {
    order: Vec<String>,
    members: HashSet<String>,
}

impl PathStack {
    fn push(&mut self, uuid: &str) {
        self.order.push(uuid.to_string());
        self.members.insert(uuid.to_string());
    }

    fn pop(&mut self) {
        if let Some(uuid) = self.order.pop() {
            self.members.remove(&uuid);
        }
    }

    fn contains(&self, uuid: &str) -> bool {
        self.members.contains(uuid)
    }
}
