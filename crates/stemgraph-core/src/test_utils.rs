//! Test utilities for STEMgraph

use crate::graph::DependencyGraph;
use crate::model::{CHALLENGE_LABEL, Edge, Node, NodeId};

/// A node whose name equals its uuid.
pub fn node(id: i64, uuid: &str) -> Node {
    named_node(id, uuid, uuid)
}

pub fn named_node(id: i64, uuid: &str, name: &str) -> Node {
    Node {
        id: NodeId(id),
        uuid: uuid.to_string(),
        name: name.to_string(),
        repo_domain: "github.com".to_string(),
        description: String::new(),
        labels: vec![CHALLENGE_LABEL.to_string()],
        placeholder: false,
    }
}

/// Build a graph from uuids and `(from, to)` BUILDS_ON pairs.
///
/// Store ids are assigned in the order the uuids are listed.
pub fn graph_of(uuids: &[&str], builds_on: &[(&str, &str)]) -> DependencyGraph {
    let nodes: Vec<Node> = uuids
        .iter()
        .enumerate()
        .map(|(i, uuid)| node(i as i64, uuid))
        .collect();
    let id_of = |uuid: &str| {
        nodes
            .iter()
            .find(|n| n.uuid == uuid)
            .map(|n| n.id)
            .unwrap_or_else(|| panic!("unknown uuid {uuid} in test graph"))
    };
    let edges: Vec<Edge> = builds_on
        .iter()
        .map(|(from, to)| Edge::builds_on(id_of(from), id_of(to)))
        .collect();
    DependencyGraph::from_parts(&nodes, &edges)
}

/// `uuids[0]` builds on `uuids[1]`, which builds on `uuids[2]`, and so on.
pub fn chain_graph(uuids: &[&str]) -> DependencyGraph {
    let pairs: Vec<(&str, &str)> = uuids.windows(2).map(|w| (w[0], w[1])).collect();
    graph_of(uuids, &pairs)
}

/// Chain `n0 -> n1 -> ... -> n{len-1}`, built without uuid lookups so long
/// chains stay cheap.
pub fn long_chain(len: usize) -> DependencyGraph {
    let nodes: Vec<Node> = (0..len as i64).map(|i| node(i, &format!("n{i}"))).collect();
    let edges: Vec<Edge> = (1..len as i64)
        .map(|i| Edge::builds_on(NodeId(i - 1), NodeId(i)))
        .collect();
    DependencyGraph::from_parts(&nodes, &edges)
}

/// `levels` stacked diamonds: `j{k}` builds on `a{k}` and `b{k}`, both of
/// which build on `j{k+1}`. The fully expanded tree of `j0` doubles per level.
pub fn diamond_ladder(levels: usize) -> DependencyGraph {
    let mut nodes = Vec::new();
    let mut edges = Vec::new();
    let join = |k: usize| NodeId((3 * k) as i64);
    for k in 0..=levels {
        nodes.push(node(join(k).0, &format!("j{k}")));
        if k == levels {
            break;
        }
        let (a, b) = (NodeId(join(k).0 + 1), NodeId(join(k).0 + 2));
        nodes.push(node(a.0, &format!("a{k}")));
        nodes.push(node(b.0, &format!("b{k}")));
        edges.extend([
            Edge::builds_on(join(k), a),
            Edge::builds_on(join(k), b),
            Edge::builds_on(a, join(k + 1)),
            Edge::builds_on(b, join(k + 1)),
        ]);
    }
    DependencyGraph::from_parts(&nodes, &edges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_graph_shape() {
        let graph = chain_graph(&["a", "b", "c"]);
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_diamond_ladder_shape() {
        let graph = diamond_ladder(3);
        assert_eq!(graph.node_count(), 10);
        assert_eq!(graph.edge_count(), 12);
    }
}
