//! Pipeline graph module: payload decoding and cycle detection.
//!
//! A pipeline arrives as a list of nodes and a list of edges. It is decoded
//! once at the boundary into typed structs, turned into an adjacency mapping,
//! and checked for directed cycles.

mod cycle;
mod decode;

pub use cycle::has_cycle;
pub use decode::{build_graph, decode_payload};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::ValidationConfig;
use crate::error::Result;

/// A single pipeline node. Fields other than `id` are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
}

/// A directed edge `source -> target`. Fields other than the endpoints are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

/// Decoded request payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelinePayload {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

/// Result of checking one pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReport {
    /// Entries in `nodes`, as sent.
    pub num_nodes: usize,
    /// Entries in `edges`, as sent (duplicates included).
    pub num_edges: usize,
    pub is_dag: bool,
}

/// Decode `raw`, build its adjacency mapping and check it for cycles.
pub fn analyze(raw: &str, validation: &ValidationConfig) -> Result<PipelineReport> {
    let payload = decode_payload(raw)?;
    log::debug!(
        "Received pipeline: {} nodes, {} edges",
        payload.nodes.len(),
        payload.edges.len()
    );

    let graph = build_graph(&payload, validation)?;
    log::debug!("Graph representation: {:?}", graph.adjacency());

    Ok(PipelineReport {
        num_nodes: payload.nodes.len(),
        num_edges: payload.edges.len(),
        is_dag: !has_cycle(&graph),
    })
}

/// Adjacency mapping from node id to its out-neighbors.
///
/// Node ids are also kept in insertion order so traversal is reproducible
/// from one request to the next.
#[derive(Debug, Clone, Default)]
pub struct PipelineGraph {
    order: Vec<String>,
    adjacency: HashMap<String, Vec<String>>,
}

impl PipelineGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            order: Vec::with_capacity(nodes),
            adjacency: HashMap::with_capacity(nodes),
        }
    }

    /// Add a node with no outgoing edges. Returns false if it already existed.
    pub fn add_node(&mut self, id: &str) -> bool {
        if self.adjacency.contains_key(id) {
            return false;
        }
        self.order.push(id.to_string());
        self.adjacency.insert(id.to_string(), Vec::new());
        true
    }

    /// Append `target` to the out-neighbors of `source`.
    ///
    /// `source` must already be a node; returns false otherwise. `target` is
    /// not checked.
    pub fn add_edge(&mut self, source: &str, target: &str) -> bool {
        match self.adjacency.get_mut(source) {
            Some(neighbors) => {
                neighbors.push(target.to_string());
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.adjacency.contains_key(id)
    }

    /// Out-neighbors of `id`; empty for unknown ids.
    pub fn neighbors(&self, id: &str) -> &[String] {
        self.adjacency.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Node ids in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(Vec::len).sum()
    }

    pub fn adjacency(&self) -> &HashMap<String, Vec<String>> {
        &self.adjacency
    }
}
