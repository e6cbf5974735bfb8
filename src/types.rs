use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{Result, ShabakaError};

/// Attribute holding the display label of every node.
pub const LABEL: &str = "label";

/// Attribute holding the diacritic-free label of Arabic nodes.
pub const UNVOCALIZED_LABEL: &str = "unvocalized_label";

/// Link attribute of an edge record pointing at its source node.
pub const SOURCE_FIELD: &str = "out";

/// Link attribute of an edge record pointing at its target node.
pub const TARGET_FIELD: &str = "in";

/// Link attribute of an index artifact pointing at the record that was hit.
pub const ARTIFACT_LINK_FIELD: &str = "rid";

/// JSON key marking an object as a link (`{"@link": "#12:3"}`).
pub const JSON_LINK_KEY: &str = "@link";

// ---------------------------------------------------------------------------
// Record ids
// ---------------------------------------------------------------------------

/// Store-assigned record identifier of the form `#cluster:position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    pub cluster: i32,
    pub position: i64,
}

impl RecordId {
    /// Id the store gives to index-lookup entries that are not graph objects.
    pub const INDEX_SENTINEL: RecordId = RecordId {
        cluster: -1,
        position: -1,
    };

    pub fn new(cluster: i32, position: i64) -> Self {
        Self { cluster, position }
    }

    /// Parses `#12:34` or `12:34`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || ShabakaError::InvalidRecordId { id: s.to_string() };
        let body = s.trim().strip_prefix('#').unwrap_or(s.trim());
        let (cluster, position) = body.split_once(':').ok_or_else(invalid)?;
        Ok(Self {
            cluster: cluster.parse().map_err(|_| invalid())?,
            position: position.parse().map_err(|_| invalid())?,
        })
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

impl FromStr for RecordId {
    type Err = ShabakaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for RecordId {
    type Error = ShabakaError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> Self {
        id.to_string()
    }
}

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Kinds of nodes in the word graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Root,
    Verb,
    Noun,
    Particle,
    ForeignNode,
}

#[allow(clippy::should_implement_trait)]
impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::Root,
        NodeKind::Verb,
        NodeKind::Noun,
        NodeKind::Particle,
        NodeKind::ForeignNode,
    ];

    /// Returns the store class name of this node kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Root => "Root",
            NodeKind::Verb => "Verb",
            NodeKind::Noun => "Noun",
            NodeKind::Particle => "Particle",
            NodeKind::ForeignNode => "ForeignNode",
        }
    }

    /// Parses a class name (or its lowercase cluster name), returning `None`
    /// for unrecognized values.
    pub fn from_str(s: &str) -> Option<NodeKind> {
        match s {
            "Root" | "root" => Some(NodeKind::Root),
            "Verb" | "verb" => Some(NodeKind::Verb),
            "Noun" | "noun" => Some(NodeKind::Noun),
            "Particle" | "particle" => Some(NodeKind::Particle),
            "ForeignNode" | "foreignnode" => Some(NodeKind::ForeignNode),
            _ => None,
        }
    }

    /// Arabic-bearing kinds carry an `unvocalized_label`.
    pub fn is_arabic(&self) -> bool {
        !matches!(self, NodeKind::ForeignNode)
    }
}

/// Kinds of edges in the word graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    VerbDerivation,
    NounDerivation,
    ParticleDerivation,
    Information,
    Collocation,
}

#[allow(clippy::should_implement_trait)]
impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::VerbDerivation,
        EdgeKind::NounDerivation,
        EdgeKind::ParticleDerivation,
        EdgeKind::Information,
        EdgeKind::Collocation,
    ];

    /// Returns the store class name of this edge kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::VerbDerivation => "VerbDerivationEdge",
            EdgeKind::NounDerivation => "NounDerivationEdge",
            EdgeKind::ParticleDerivation => "ParticleDerivationEdge",
            EdgeKind::Information => "InformationEdge",
            EdgeKind::Collocation => "CollocationEdge",
        }
    }

    /// Parses a class name (or its lowercase cluster name), returning `None`
    /// for unrecognized values.
    pub fn from_str(s: &str) -> Option<EdgeKind> {
        match s {
            "VerbDerivationEdge" | "verbderivationedge" => Some(EdgeKind::VerbDerivation),
            "NounDerivationEdge" | "nounderivationedge" => Some(EdgeKind::NounDerivation),
            "ParticleDerivationEdge" | "particlederivationedge" => {
                Some(EdgeKind::ParticleDerivation)
            }
            "InformationEdge" | "informationedge" => Some(EdgeKind::Information),
            "CollocationEdge" | "collocationedge" => Some(EdgeKind::Collocation),
            _ => None,
        }
    }

    /// Derivation edges form the root-to-word forest.
    pub fn is_derivation(&self) -> bool {
        matches!(
            self,
            EdgeKind::VerbDerivation | EdgeKind::NounDerivation | EdgeKind::ParticleDerivation
        )
    }

    /// The derivation edge kind that leads to a node of the given kind.
    pub fn derivation_for(kind: NodeKind) -> Option<EdgeKind> {
        match kind {
            NodeKind::Verb => Some(EdgeKind::VerbDerivation),
            NodeKind::Noun => Some(EdgeKind::NounDerivation),
            NodeKind::Particle => Some(EdgeKind::ParticleDerivation),
            NodeKind::Root | NodeKind::ForeignNode => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw records
// ---------------------------------------------------------------------------

/// An attribute value as delivered by the store.
///
/// Links are opaque references to other records and are only parsed when the
/// record is wrapped.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Link(String),
    LinkList(Vec<String>),
}

impl RawValue {
    pub fn link(id: RecordId) -> Self {
        RawValue::Link(id.to_string())
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            RawValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts a JSON value, recognizing `{"@link": ...}` objects as links.
    pub fn from_json(value: &Value) -> Result<Self> {
        let malformed = |message: &str| ShabakaError::MalformedRecord {
            message: message.to_string(),
            id: String::new(),
        };
        match value {
            Value::Null => Ok(RawValue::Null),
            Value::Bool(b) => Ok(RawValue::Bool(*b)),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(RawValue::Int(i)),
                None => n
                    .as_f64()
                    .map(RawValue::Float)
                    .ok_or_else(|| malformed("unrepresentable number")),
            },
            Value::String(s) => Ok(RawValue::String(s.clone())),
            Value::Object(_) => json_link(value)
                .map(RawValue::Link)
                .ok_or_else(|| malformed("nested objects are not supported")),
            Value::Array(items) => {
                let mut links = Vec::with_capacity(items.len());
                for item in items {
                    links.push(json_link(item).ok_or_else(|| malformed("lists may only hold links"))?);
                }
                Ok(RawValue::LinkList(links))
            }
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            RawValue::Null => Value::Null,
            RawValue::Bool(b) => Value::Bool(*b),
            RawValue::Int(i) => Value::from(*i),
            RawValue::Float(f) => Value::from(*f),
            RawValue::String(s) => Value::String(s.clone()),
            RawValue::Link(l) => link_json(l),
            RawValue::LinkList(ls) => Value::Array(ls.iter().map(|l| link_json(l)).collect()),
        }
    }
}

fn json_link(value: &Value) -> Option<String> {
    let obj = value.as_object()?;
    if obj.len() != 1 {
        return None;
    }
    obj.get(JSON_LINK_KEY)?.as_str().map(str::to_string)
}

fn link_json(link: &str) -> Value {
    let mut obj = Map::new();
    obj.insert(JSON_LINK_KEY.to_string(), Value::String(link.to_string()));
    Value::Object(obj)
}

/// A flat record as returned by the store, before wrapping.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub id: String,
    pub class: String,
    pub attributes: BTreeMap<String, RawValue>,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, class: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            class: class.into(),
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter.
    pub fn with(mut self, key: &str, value: RawValue) -> Self {
        self.attributes.insert(key.to_string(), value);
        self
    }

    pub fn with_str(self, key: &str, value: &str) -> Self {
        self.with(key, RawValue::String(value.to_string()))
    }

    pub fn with_link(self, key: &str, id: RecordId) -> Self {
        self.with(key, RawValue::link(id))
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.attributes.get(key)
    }

    /// Parses the record's id, if well-formed.
    pub fn record_id(&self) -> Option<RecordId> {
        RecordId::parse(&self.id).ok()
    }

    /// Builds a record from the store's JSON attribute document.
    pub fn from_json(id: &str, class: &str, attributes: &Value) -> Result<Self> {
        let obj = attributes
            .as_object()
            .ok_or_else(|| ShabakaError::MalformedRecord {
                message: "attributes must be a JSON object".to_string(),
                id: id.to_string(),
            })?;
        let mut record = RawRecord::new(id, class);
        for (key, value) in obj {
            let value = RawValue::from_json(value).map_err(|e| match e {
                ShabakaError::MalformedRecord { message, .. } => ShabakaError::MalformedRecord {
                    message: format!("attribute '{key}': {message}"),
                    id: id.to_string(),
                },
                other => other,
            })?;
            record.attributes.insert(key.clone(), value);
        }
        Ok(record)
    }

    /// Serializes the attribute map to the store's JSON document form.
    pub fn attributes_json(&self) -> Value {
        Value::Object(
            self.attributes
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Depth specification telling the store how many hops to inline per result.
///
/// Only the uniform `*:N` form is supported; `*:0` disables expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FetchPlan {
    pub depth: u32,
}

impl FetchPlan {
    pub const NONE: FetchPlan = FetchPlan { depth: 0 };

    pub fn depth(depth: u32) -> Self {
        Self { depth }
    }

    pub fn parse(spec: &str) -> Result<Self> {
        let invalid = || ShabakaError::InvalidFetchPlan {
            spec: spec.to_string(),
        };
        let depth = spec.trim().strip_prefix("*:").ok_or_else(invalid)?;
        Ok(Self {
            depth: depth.parse().map_err(|_| invalid())?,
        })
    }

    pub fn expands(&self) -> bool {
        self.depth > 0
    }
}

impl Default for FetchPlan {
    fn default() -> Self {
        Self { depth: 1 }
    }
}

impl fmt::Display for FetchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "*:{}", self.depth)
    }
}

impl FromStr for FetchPlan {
    type Err = ShabakaError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FetchPlan {
    type Error = ShabakaError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<FetchPlan> for String {
    fn from(plan: FetchPlan) -> Self {
        plan.to_string()
    }
}

/// Label indexes maintained by the store over Arabic nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LabelIndex {
    Label,
    UnvocalizedLabel,
}

impl LabelIndex {
    /// Index name in the store's query language.
    pub fn index_name(&self) -> &'static str {
        match self {
            LabelIndex::Label => "ArabicNode.label",
            LabelIndex::UnvocalizedLabel => "ArabicNode.unvocalized_label",
        }
    }

    /// The attribute the index is built over.
    pub fn attribute(&self) -> &'static str {
        match self {
            LabelIndex::Label => LABEL,
            LabelIndex::UnvocalizedLabel => UNVOCALIZED_LABEL,
        }
    }
}
