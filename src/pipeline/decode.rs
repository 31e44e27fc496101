//! Payload decoding and adjacency construction.

use serde_json::error::Category;
use serde_json::Value;

use crate::config::{DanglingPolicy, ValidationConfig};
use crate::error::{DagcheckError, EdgeEndpoint, Result};
use crate::pipeline::{PipelineGraph, PipelinePayload};

/// Parse the raw JSON text of a pipeline into its typed form.
///
/// The payload, and every node and edge in it, must be a JSON object. Serde's
/// positional form (`[[["A"]], [["A", "B"]]]`) is refused.
pub fn decode_payload(raw: &str) -> Result<PipelinePayload> {
    let value: Value = serde_json::from_str(raw).map_err(malformed)?;

    let Value::Object(fields) = &value else {
        return Err(shape_error(format!(
            "expected a JSON object with \"nodes\" and \"edges\", got {}",
            kind_of(&value)
        )));
    };
    for (key, entry_fields) in [("nodes", "id"), ("edges", "source/target")] {
        if let Some(Value::Array(entries)) = fields.get(key) {
            if let Some((index, entry)) = entries.iter().enumerate().find(|(_, e)| !e.is_object()) {
                return Err(shape_error(format!(
                    "{}[{}] must be an object with {}, got {}",
                    key,
                    index,
                    entry_fields,
                    kind_of(entry)
                )));
            }
        }
    }

    serde_json::from_value(value).map_err(malformed)
}

fn malformed(e: serde_json::Error) -> DagcheckError {
    let reason = match e.classify() {
        Category::Syntax | Category::Eof => "invalid JSON",
        Category::Data | Category::Io => "unexpected payload shape",
    };
    DagcheckError::MalformedInput(format!("{}: {}", reason, e))
}

fn shape_error(detail: String) -> DagcheckError {
    DagcheckError::MalformedInput(format!("unexpected payload shape: {}", detail))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Build the adjacency mapping for a decoded payload.
///
/// Every declared node gets an (initially empty) entry; each edge appends its
/// target to the list of its source. Edges to undeclared nodes are handled
/// according to `validation.dangling_edges`.
pub fn build_graph(payload: &PipelinePayload, validation: &ValidationConfig) -> Result<PipelineGraph> {
    check_limit("nodes", payload.nodes.len(), validation.max_nodes)?;
    check_limit("edges", payload.edges.len(), validation.max_edges)?;

    let mut graph = PipelineGraph::with_capacity(payload.nodes.len());
    for node in &payload.nodes {
        if !graph.add_node(&node.id) {
            return Err(DagcheckError::DuplicateNode(node.id.clone()));
        }
    }

    // Placeholders are only created under `Tolerate`, so under `Reject` every
    // membership check below is against the declared set.
    for (index, edge) in payload.edges.iter().enumerate() {
        if !graph.contains(&edge.source) {
            match validation.dangling_edges {
                DanglingPolicy::Reject => {
                    return Err(dangling(index, EdgeEndpoint::Source, &edge.source));
                }
                DanglingPolicy::Tolerate => {
                    log::debug!("Edge {} has undeclared source '{}', adding placeholder", index, edge.source);
                    graph.add_node(&edge.source);
                }
            }
        }

        if !graph.contains(&edge.target) {
            match validation.dangling_edges {
                DanglingPolicy::Reject => {
                    return Err(dangling(index, EdgeEndpoint::Target, &edge.target));
                }
                DanglingPolicy::Tolerate => {
                    log::debug!("Edge {} has undeclared target '{}'", index, edge.target);
                }
            }
        }

        graph.add_edge(&edge.source, &edge.target);
    }

    Ok(graph)
}

fn check_limit(what: &'static str, count: usize, max: usize) -> Result<()> {
    if count > max {
        return Err(DagcheckError::LimitExceeded { what, count, max });
    }
    Ok(())
}

fn dangling(index: usize, endpoint: EdgeEndpoint, id: &str) -> DagcheckError {
    DagcheckError::DanglingReference {
        index,
        endpoint,
        id: id.to_string(),
    }
}
