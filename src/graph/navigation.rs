use std::collections::{BTreeMap, HashSet};
use std::fmt;

use super::result_set::ResultSet;
use super::wrap::{Link, Value, WrappedEdge, WrappedNode, Wrapped};
use crate::types::*;

/// Attribute on verb derivation edges naming the verb stem (`I`..`X`).
pub const STEM: &str = "stem";

/// A node borrowed from a [`ResultSet`].
#[derive(Clone, Copy)]
pub struct NodeRef<'a> {
    set: &'a ResultSet,
    slot: usize,
    node: &'a WrappedNode,
}

/// An edge borrowed from a [`ResultSet`].
#[derive(Clone, Copy)]
pub struct EdgeRef<'a> {
    set: &'a ResultSet,
    slot: usize,
    edge: &'a WrappedEdge,
}

/// Either kind of object borrowed from a [`ResultSet`].
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RecordRef<'a> {
    Node(NodeRef<'a>),
    Edge(EdgeRef<'a>),
}

// ---------------------------------------------------------------------------
// RecordRef
// ---------------------------------------------------------------------------

impl<'a> RecordRef<'a> {
    pub(crate) fn new(set: &'a ResultSet, slot: usize) -> Self {
        match set.object(slot) {
            Wrapped::Node(node) => RecordRef::Node(NodeRef { set, slot, node }),
            Wrapped::Edge(edge) => RecordRef::Edge(EdgeRef { set, slot, edge }),
        }
    }

    pub(crate) fn slot(&self) -> usize {
        match self {
            RecordRef::Node(n) => n.slot,
            RecordRef::Edge(e) => e.slot,
        }
    }

    pub fn id(&self) -> RecordId {
        match self {
            RecordRef::Node(n) => n.id(),
            RecordRef::Edge(e) => e.id(),
        }
    }

    /// Store class name of the object.
    pub fn class(&self) -> &'static str {
        match self {
            RecordRef::Node(n) => n.kind().as_str(),
            RecordRef::Edge(e) => e.kind().as_str(),
        }
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, RecordRef::Edge(_))
    }

    pub fn as_node(&self) -> Option<NodeRef<'a>> {
        match self {
            RecordRef::Node(n) => Some(*n),
            RecordRef::Edge(_) => None,
        }
    }

    pub fn as_edge(&self) -> Option<EdgeRef<'a>> {
        match self {
            RecordRef::Edge(e) => Some(*e),
            RecordRef::Node(_) => None,
        }
    }

    pub fn attributes(&self) -> &'a BTreeMap<String, Value> {
        match self {
            RecordRef::Node(n) => n.attributes(),
            RecordRef::Edge(e) => e.attributes(),
        }
    }

    pub fn attribute(&self, key: &str) -> Option<&'a Value> {
        self.attributes().get(key)
    }
}

impl fmt::Debug for RecordRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordRef::Node(n) => fmt::Debug::fmt(n, f),
            RecordRef::Edge(e) => fmt::Debug::fmt(e, f),
        }
    }
}

/// Follows a link attribute to the object it names, if that object is part of
/// the result set.
fn follow<'a>(set: &'a ResultSet, value: Option<&'a Value>) -> Option<RecordRef<'a>> {
    match value? {
        Value::Link(Link::Resolved(slot)) => Some(set.record_at(*slot)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// NodeRef
// ---------------------------------------------------------------------------

impl<'a> NodeRef<'a> {
    pub fn id(&self) -> RecordId {
        self.node.id
    }

    pub fn kind(&self) -> NodeKind {
        self.node.kind
    }

    /// The node's label; every wrapped node has one.
    pub fn label(&self) -> &'a str {
        self.node
            .attributes
            .get(LABEL)
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn unvocalized_label(&self) -> Option<&'a str> {
        self.attribute(UNVOCALIZED_LABEL).and_then(Value::as_str)
    }

    pub fn attributes(&self) -> &'a BTreeMap<String, Value> {
        &self.node.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&'a Value> {
        self.node.attributes.get(key)
    }

    /// The object a link attribute points at.
    pub fn linked(&self, key: &str) -> Option<RecordRef<'a>> {
        follow(self.set, self.attribute(key))
    }

    pub fn incoming_edges(&self) -> impl Iterator<Item = EdgeRef<'a>> + 'a {
        let (set, node) = (self.set, self.node);
        node.incoming.iter().filter_map(move |slot| set.record_at(*slot).as_edge())
    }

    pub fn outgoing_edges(&self) -> impl Iterator<Item = EdgeRef<'a>> + 'a {
        let (set, node) = (self.set, self.node);
        node.outgoing.iter().filter_map(move |slot| set.record_at(*slot).as_edge())
    }

    pub fn both_edges(&self) -> impl Iterator<Item = EdgeRef<'a>> + 'a {
        self.incoming_edges().chain(self.outgoing_edges())
    }

    /// Sources of incoming edges that are part of the result set.
    pub fn in_neighbors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.incoming_edges().filter_map(|e| e.source())
    }

    /// Targets of outgoing edges that are part of the result set.
    pub fn out_neighbors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.outgoing_edges().filter_map(|e| e.target())
    }

    pub fn both_neighbors(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.in_neighbors().chain(self.out_neighbors())
    }

    /// `true` if no edge of the result set touches this node.
    pub fn is_orphan(&self) -> bool {
        self.node.incoming.is_empty() && self.node.outgoing.is_empty()
    }

    /// The node this one was derived from, if that node was fetched.
    pub fn derivation_parent(&self) -> Option<NodeRef<'a>> {
        self.incoming_edges()
            .find(|e| e.kind().is_derivation())
            .and_then(|e| e.source())
    }

    /// Nodes directly derived from this one.
    pub fn derived_children(&self) -> impl Iterator<Item = NodeRef<'a>> + 'a {
        self.outgoing_edges()
            .filter(|e| e.kind().is_derivation())
            .filter_map(|e| e.target())
    }

    /// All derivation descendants matching `pred`, depth first.
    pub fn derived_descendants<P>(&self, pred: P) -> Vec<NodeRef<'a>>
    where
        P: Fn(&NodeRef<'a>) -> bool,
    {
        let mut found = Vec::new();
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(self.slot);
        let mut stack: Vec<NodeRef<'a>> = self.derived_children().collect();
        stack.reverse();

        while let Some(node) = stack.pop() {
            if !visited.insert(node.slot) {
                continue;
            }
            if pred(&node) {
                found.push(node);
            }
            let mut children: Vec<NodeRef<'a>> = node.derived_children().collect();
            children.reverse();
            stack.extend(children);
        }

        found
    }

    /// This node followed by its derivation ancestors, up to the first root
    /// or the first ancestor missing from the result set.
    pub fn path_to_root(&self) -> Vec<NodeRef<'a>> {
        let mut path = vec![*self];
        let mut visited: HashSet<usize> = HashSet::new();
        visited.insert(self.slot);

        let mut current = *self;
        while current.kind() != NodeKind::Root {
            match current.derivation_parent() {
                Some(parent) if visited.insert(parent.slot) => {
                    path.push(parent);
                    current = parent;
                }
                _ => break,
            }
        }

        path
    }
}

impl PartialEq for NodeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.set, other.set) && self.slot == other.slot
    }
}

impl Eq for NodeRef<'_> {}

impl fmt::Debug for NodeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("label", &self.label())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// EdgeRef
// ---------------------------------------------------------------------------

impl<'a> EdgeRef<'a> {
    pub fn id(&self) -> RecordId {
        self.edge.id
    }

    pub fn kind(&self) -> EdgeKind {
        self.edge.kind
    }

    pub fn attributes(&self) -> &'a BTreeMap<String, Value> {
        &self.edge.attributes
    }

    pub fn attribute(&self, key: &str) -> Option<&'a Value> {
        self.edge.attributes.get(key)
    }

    /// Source node, or `None` if it was not part of the batch.
    pub fn source(&self) -> Option<NodeRef<'a>> {
        self.endpoint(self.edge.source)
    }

    /// Target node, or `None` if it was not part of the batch.
    pub fn target(&self) -> Option<NodeRef<'a>> {
        self.endpoint(self.edge.target)
    }

    /// Id the source link named, whether or not it resolved.
    pub fn source_id(&self) -> RecordId {
        self.endpoint_id(self.edge.source)
    }

    /// Id the target link named, whether or not it resolved.
    pub fn target_id(&self) -> RecordId {
        self.endpoint_id(self.edge.target)
    }

    /// The endpoint opposite to `node`; `None` if `node` is not an endpoint
    /// or the other side is missing.
    pub fn other_side(&self, node: &NodeRef<'a>) -> Option<NodeRef<'a>> {
        let (source, target) = (self.source(), self.target());
        if source.as_ref() == Some(node) {
            target
        } else if target.as_ref() == Some(node) {
            source
        } else {
            None
        }
    }

    /// Verb stem of a verb derivation edge, as an integer 1..=10.
    pub fn stem(&self) -> Option<u8> {
        self.attribute(STEM)
            .and_then(Value::as_str)
            .and_then(roman_stem_to_int)
    }

    fn endpoint(&self, link: Link) -> Option<NodeRef<'a>> {
        link.slot().and_then(|slot| self.set.record_at(slot).as_node())
    }

    fn endpoint_id(&self, link: Link) -> RecordId {
        match link {
            Link::Unresolved(id) | Link::Dangling(id) => id,
            Link::Resolved(slot) => self.set.object(slot).id(),
        }
    }
}

impl PartialEq for EdgeRef<'_> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self.set, other.set) && self.slot == other.slot
    }
}

impl Eq for EdgeRef<'_> {}

impl fmt::Debug for EdgeRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeRef")
            .field("id", &self.id())
            .field("kind", &self.kind())
            .field("source", &self.source_id())
            .field("target", &self.target_id())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Derivation helpers
// ---------------------------------------------------------------------------

/// Parses a Roman-numeral verb stem (`I`..`X`).
pub fn roman_stem_to_int(stem: &str) -> Option<u8> {
    match stem.trim() {
        "I" => Some(1),
        "II" => Some(2),
        "III" => Some(3),
        "IV" => Some(4),
        "V" => Some(5),
        "VI" => Some(6),
        "VII" => Some(7),
        "VIII" => Some(8),
        "IX" => Some(9),
        "X" => Some(10),
        _ => None,
    }
}

/// Verbs derived from `root`, paired with their stem and sorted by it.
///
/// Verbs whose edge carries no recognizable stem sort first with stem 0.
pub fn verb_stems<'a>(root: &NodeRef<'a>) -> Vec<(u8, NodeRef<'a>)> {
    let mut stems: Vec<(u8, NodeRef<'a>)> = root
        .outgoing_edges()
        .filter(|e| e.kind() == EdgeKind::VerbDerivation)
        .filter_map(|e| {
            let verb = e.target()?;
            (verb.kind() == NodeKind::Verb).then(|| (e.stem().unwrap_or(0), verb))
        })
        .collect();
    stems.sort_by_key(|(stem, verb)| (*stem, verb.id()));
    stems
}
