use serde::Serialize;

use crate::errors::Result;
use crate::graph::{verb_stems, Link, NodeRef, RecordRef, ResultSet, Value};
use crate::types::NodeKind;

/// JSON view of a node.
#[derive(Debug, Serialize)]
pub struct NodeView {
    pub id: String,
    pub kind: &'static str,
    pub label: String,
    pub primary: bool,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub incoming: Vec<String>,
    pub outgoing: Vec<String>,
}

/// JSON view of an edge. Missing endpoints are `null`.
#[derive(Debug, Serialize)]
pub struct EdgeView {
    pub id: String,
    pub kind: &'static str,
    pub source: Option<String>,
    pub target: Option<String>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// JSON view of a whole result set.
#[derive(Debug, Serialize)]
pub struct ResultSetView {
    pub count: usize,
    pub primary: Vec<String>,
    pub nodes: Vec<NodeView>,
    pub edges: Vec<EdgeView>,
}

fn value_json(set: &ResultSet, value: &Value) -> serde_json::Value {
    let link_json = |link: &Link| match link {
        Link::Resolved(slot) => serde_json::Value::String(set.record_at(*slot).id().to_string()),
        Link::Unresolved(_) | Link::Dangling(_) => serde_json::Value::Null,
    };
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Value::from(*f),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Link(link) => link_json(link),
        Value::LinkList(links) => serde_json::Value::Array(links.iter().map(link_json).collect()),
    }
}

fn attributes_json(set: &ResultSet, record: &RecordRef<'_>) -> serde_json::Map<String, serde_json::Value> {
    record
        .attributes()
        .iter()
        .map(|(k, v)| (k.clone(), value_json(set, v)))
        .collect()
}

/// Builds the serializable view of a result set.
pub fn result_set_view(set: &ResultSet) -> ResultSetView {
    let nodes = set
        .nodes()
        .map(|node| NodeView {
            id: node.id().to_string(),
            kind: node.kind().as_str(),
            label: node.label().to_string(),
            primary: set.is_primary(&node.id()),
            attributes: attributes_json(set, &RecordRef::Node(node)),
            incoming: node.incoming_edges().map(|e| e.id().to_string()).collect(),
            outgoing: node.outgoing_edges().map(|e| e.id().to_string()).collect(),
        })
        .collect();

    let edges = set
        .edges()
        .map(|edge| EdgeView {
            id: edge.id().to_string(),
            kind: edge.kind().as_str(),
            source: edge.source().map(|n| n.id().to_string()),
            target: edge.target().map(|n| n.id().to_string()),
            attributes: attributes_json(set, &RecordRef::Edge(edge)),
        })
        .collect();

    ResultSetView {
        count: set.count(),
        primary: set.primary_results().map(|r| r.id().to_string()).collect(),
        nodes,
        edges,
    }
}

/// Formats a result set as pretty-printed JSON.
pub fn format_result_set_as_json(set: &ResultSet) -> Result<String> {
    Ok(serde_json::to_string_pretty(&result_set_view(set))?)
}

fn node_line(node: &NodeRef<'_>) -> String {
    format!("{} ({} {})", node.label(), node.kind().as_str(), node.id())
}

/// Formats a result set as an indented text listing.
///
/// Each primary node is shown with its derivation path to the root, the
/// verbs of a root by stem, and its derived words and translations.
pub fn format_result_set_as_text(set: &ResultSet) -> String {
    let mut out = String::new();

    let primary: Vec<NodeRef<'_>> = set.primary_results().filter_map(|r| r.as_node()).collect();
    if primary.is_empty() {
        out.push_str("No results.\n");
        return out;
    }

    for node in &primary {
        out.push_str(&node_line(node));
        out.push('\n');

        let path = node.path_to_root();
        if path.len() > 1 {
            let labels: Vec<&str> = path.iter().map(|n| n.label()).collect();
            out.push_str(&format!("  path: {}\n", labels.join(" <- ")));
        }

        if node.kind() == NodeKind::Root {
            for (stem, verb) in verb_stems(node) {
                out.push_str(&format!("  stem {}: {}\n", stem, node_line(&verb)));
            }
        }

        for child in node.derived_children() {
            if child.kind() != NodeKind::Verb || node.kind() != NodeKind::Root {
                out.push_str(&format!("  derived: {}\n", node_line(&child)));
            }
        }

        let translations: Vec<&str> = node
            .out_neighbors()
            .filter(|n| n.kind() == NodeKind::ForeignNode)
            .map(|n| n.label())
            .collect();
        if !translations.is_empty() {
            out.push_str(&format!("  translations: {}\n", translations.join(", ")));
        }
    }

    let nodes = set.nodes().count();
    let edges = set.edges().count();
    out.push_str(&format!(
        "\n{} primary, {} nodes, {} edges\n",
        primary.len(),
        nodes,
        edges
    ));
    out
}
