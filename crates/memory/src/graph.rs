//! Append-only knowledge graph of subject-predicate-object triples.

use std::collections::{HashMap, VecDeque};
use tokio::sync::RwLock;

/// A subject-predicate-object triple.
#[derive(Debug, Clone)]
pub struct Triple {
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub metadata: HashMap<String, String>,
}

/// A node, created implicitly when a term is referenced as subject or
/// object.
#[derive(Debug, Clone)]
pub struct Node {
    pub id: String,
    pub label: String,
    pub properties: HashMap<String, String>,
}

/// A directed edge from subject to object, labeled by predicate.
#[derive(Debug, Clone)]
pub struct Edge {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub properties: HashMap<String, String>,
}

#[derive(Default)]
struct GraphState {
    nodes: HashMap<String, Node>,
    edges: Vec<Edge>,
    /// node -> outgoing edge indices
    adjacency: HashMap<String, Vec<usize>>,
    /// node -> incoming edge indices
    reverse_adjacency: HashMap<String, Vec<usize>>,
}

/// In-memory directed multi-graph for entity relationships.
#[derive(Default)]
pub struct KnowledgeGraph {
    state: RwLock<GraphState>,
}

impl KnowledgeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a triple, creating missing nodes, and return its
    /// deterministic id `subject-predicate-object`.
    pub async fn add_triple(&self, triple: Triple) -> String {
        let triple_id = format!("{}-{}-{}", triple.subject, triple.predicate, triple.object);

        let mut state = self.state.write().await;
        for term in [&triple.subject, &triple.object] {
            state.nodes.entry(term.clone()).or_insert_with(|| Node {
                id: term.clone(),
                label: term.clone(),
                properties: HashMap::new(),
            });
        }

        let idx = state.edges.len();
        state.edges.push(Edge {
            source: triple.subject.clone(),
            target: triple.object.clone(),
            relationship: triple.predicate,
            properties: triple.metadata,
        });
        state.adjacency.entry(triple.subject).or_default().push(idx);
        state
            .reverse_adjacency
            .entry(triple.object)
            .or_default()
            .push(idx);

        triple_id
    }

    /// BFS from `entity` over both edge directions, up to `max_hops`.
    /// Nodes reached at the hop limit are included but not expanded, each
    /// edge is traversed at most once, and `relationship_filter` (when
    /// non-empty) constrains which predicates are followed. Unknown
    /// entities yield empty results.
    pub async fn query(
        &self,
        entity: &str,
        max_hops: usize,
        relationship_filter: &str,
    ) -> (Vec<Node>, Vec<Edge>) {
        let state = self.state.read().await;
        if !state.nodes.contains_key(entity) {
            return (Vec::new(), Vec::new());
        }

        let mut visited: Vec<String> = vec![entity.to_string()];
        let mut seen_edges = vec![false; state.edges.len()];
        let mut result_edges = Vec::new();

        let mut queue: VecDeque<(String, usize)> = VecDeque::new();
        queue.push_back((entity.to_string(), 0));

        while let Some((node_id, depth)) = queue.pop_front() {
            if depth >= max_hops {
                continue;
            }

            let outgoing = state.adjacency.get(&node_id).into_iter().flatten();
            let incoming = state.reverse_adjacency.get(&node_id).into_iter().flatten();
            for &idx in outgoing.chain(incoming) {
                if seen_edges[idx] {
                    continue;
                }
                let edge = &state.edges[idx];
                if !relationship_filter.is_empty() && edge.relationship != relationship_filter {
                    continue;
                }
                seen_edges[idx] = true;
                result_edges.push(edge.clone());

                // Whichever endpoint is not the current node is the neighbor.
                let neighbor = if edge.source == node_id {
                    &edge.target
                } else {
                    &edge.source
                };
                if !visited.iter().any(|v| v == neighbor) {
                    visited.push(neighbor.clone());
                    queue.push_back((neighbor.clone(), depth + 1));
                }
            }
        }

        let result_nodes = visited
            .iter()
            .filter_map(|id| state.nodes.get(id).cloned())
            .collect();

        (result_nodes, result_edges)
    }

    /// Number of edges.
    pub async fn triples_count(&self) -> usize {
        self.state.read().await.edges.len()
    }

    /// Number of nodes.
    pub async fn nodes_count(&self) -> usize {
        self.state.read().await.nodes.len()
    }
}
