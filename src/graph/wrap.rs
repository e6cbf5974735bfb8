use std::collections::BTreeMap;

use crate::errors::{Result, ShabakaError};
use crate::types::*;
use crate::vocalization::strip_tashkeel;

/// A reference from one wrapped object to another.
///
/// Freshly wrapped records only hold `Unresolved` links; link resolution turns
/// each into `Resolved` (an arena slot of the owning result set) or `Dangling`
/// when the referenced record is not part of the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Unresolved(RecordId),
    Resolved(usize),
    Dangling(RecordId),
}

impl Link {
    /// Arena slot of the referenced object, if it is present.
    pub fn slot(&self) -> Option<usize> {
        match self {
            Link::Resolved(slot) => Some(*slot),
            Link::Unresolved(_) | Link::Dangling(_) => None,
        }
    }
}

/// A normalized attribute value of a wrapped object.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Link(Link),
    LinkList(Vec<Link>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }
}

/// A node record after wrapping.
#[derive(Debug, Clone)]
pub struct WrappedNode {
    pub id: RecordId,
    pub kind: NodeKind,
    pub attributes: BTreeMap<String, Value>,
    pub(crate) incoming: Vec<usize>,
    pub(crate) outgoing: Vec<usize>,
}

impl WrappedNode {
    /// Arena slots of the edges ending at this node.
    pub fn incoming_slots(&self) -> &[usize] {
        &self.incoming
    }

    /// Arena slots of the edges starting at this node.
    pub fn outgoing_slots(&self) -> &[usize] {
        &self.outgoing
    }
}

/// An edge record after wrapping.
#[derive(Debug, Clone)]
pub struct WrappedEdge {
    pub id: RecordId,
    pub kind: EdgeKind,
    pub attributes: BTreeMap<String, Value>,
    pub(crate) source: Link,
    pub(crate) target: Link,
}

impl WrappedEdge {
    pub fn source(&self) -> Link {
        self.source
    }

    pub fn target(&self) -> Link {
        self.target
    }
}

/// A raw record classified as either a node or an edge.
#[derive(Debug, Clone)]
pub enum Wrapped {
    Node(WrappedNode),
    Edge(WrappedEdge),
}

impl Wrapped {
    pub fn id(&self) -> RecordId {
        match self {
            Wrapped::Node(n) => n.id,
            Wrapped::Edge(e) => e.id,
        }
    }

    pub fn is_edge(&self) -> bool {
        matches!(self, Wrapped::Edge(_))
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        match self {
            Wrapped::Node(n) => &n.attributes,
            Wrapped::Edge(e) => &e.attributes,
        }
    }

    pub(crate) fn attributes_mut(&mut self) -> &mut BTreeMap<String, Value> {
        match self {
            Wrapped::Node(n) => &mut n.attributes,
            Wrapped::Edge(e) => &mut e.attributes,
        }
    }
}

/// Classifies a raw record as a node or an edge and normalizes its attributes.
///
/// A record whose `out` and `in` attributes are both links is an edge; every
/// other record is a node. Node records lose the store's `in_*`/`out_*`
/// adjacency bags, since adjacency is rebuilt by link resolution, and Arabic
/// nodes missing an `unvocalized_label` get one derived from `label`.
pub fn wrap(raw: &RawRecord) -> Result<Wrapped> {
    let id = RecordId::parse(&raw.id)?;

    let endpoints = match (raw.get(SOURCE_FIELD), raw.get(TARGET_FIELD)) {
        (Some(RawValue::Link(source)), Some(RawValue::Link(target))) => Some((source, target)),
        _ => None,
    };

    match endpoints {
        Some((source, target)) => {
            let kind = EdgeKind::from_str(&raw.class).ok_or_else(|| malformed(
                raw,
                format!("record links two records but '{}' is not an edge class", raw.class),
            ))?;
            let mut attributes = BTreeMap::new();
            for (key, value) in &raw.attributes {
                if key == SOURCE_FIELD || key == TARGET_FIELD {
                    continue;
                }
                attributes.insert(key.clone(), convert_value(raw, key, value)?);
            }
            Ok(Wrapped::Edge(WrappedEdge {
                id,
                kind,
                attributes,
                source: Link::Unresolved(parse_link(raw, SOURCE_FIELD, source)?),
                target: Link::Unresolved(parse_link(raw, TARGET_FIELD, target)?),
            }))
        }
        None => {
            let kind = NodeKind::from_str(&raw.class).ok_or_else(|| {
                malformed(raw, format!("'{}' is not a node class", raw.class))
            })?;
            let mut attributes = BTreeMap::new();
            for (key, value) in &raw.attributes {
                if is_adjacency_bag(key) {
                    continue;
                }
                attributes.insert(key.clone(), convert_value(raw, key, value)?);
            }

            let label = match attributes.get(LABEL) {
                Some(Value::String(label)) => label.clone(),
                Some(_) => return Err(malformed(raw, "label is not a string".to_string())),
                None => return Err(malformed(raw, "node has no label".to_string())),
            };
            if kind.is_arabic() && !attributes.contains_key(UNVOCALIZED_LABEL) {
                attributes.insert(
                    UNVOCALIZED_LABEL.to_string(),
                    Value::String(strip_tashkeel(&label)),
                );
            }

            Ok(Wrapped::Node(WrappedNode {
                id,
                kind,
                attributes,
                incoming: Vec::new(),
                outgoing: Vec::new(),
            }))
        }
    }
}

/// Extracts the id of the real record an index artifact points at.
///
/// The artifact must carry exactly one link attribute.
pub fn artifact_target(raw: &RawRecord) -> Result<RecordId> {
    let mut links = raw.attributes.iter().filter_map(|(key, value)| match value {
        RawValue::Link(link) => Some((key, link)),
        _ => None,
    });
    match (links.next(), links.next()) {
        (Some((key, link)), None) => parse_link(raw, key, link),
        (None, _) => Err(malformed(raw, "index artifact has no link".to_string())),
        (Some(_), Some(_)) => Err(malformed(
            raw,
            "index artifact has more than one link".to_string(),
        )),
    }
}

fn is_adjacency_bag(key: &str) -> bool {
    key.starts_with("in_") || key.starts_with("out_")
}

fn convert_value(raw: &RawRecord, key: &str, value: &RawValue) -> Result<Value> {
    Ok(match value {
        RawValue::Null => Value::Null,
        RawValue::Bool(b) => Value::Bool(*b),
        RawValue::Int(i) => Value::Int(*i),
        RawValue::Float(f) => Value::Float(*f),
        RawValue::String(s) => Value::String(s.clone()),
        RawValue::Link(link) => Value::Link(Link::Unresolved(parse_link(raw, key, link)?)),
        RawValue::LinkList(links) => Value::LinkList(
            links
                .iter()
                .map(|link| parse_link(raw, key, link).map(Link::Unresolved))
                .collect::<Result<Vec<_>>>()?,
        ),
    })
}

fn parse_link(raw: &RawRecord, key: &str, link: &str) -> Result<RecordId> {
    RecordId::parse(link)
        .map_err(|_| malformed(raw, format!("attribute '{key}' holds invalid link '{link}'")))
}

fn malformed(raw: &RawRecord, message: String) -> ShabakaError {
    ShabakaError::MalformedRecord {
        message,
        id: raw.id.clone(),
    }
}
