//! Store contract and the SQLite-backed reference store.
//!
//! The search layer only talks to a [`GraphStore`]: it hands over a [`Query`]
//! and receives flat records split into direct hits and expansion. How the
//! store evaluates the query is its own business; [`Database`] is the
//! implementation shipped with the crate.

mod connection;
mod queries;

pub use connection::Database;

use crate::errors::Result;
use crate::types::*;

/// What a query selects before any expansion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// Index lookup. The direct records are index artifacts pointing at the
    /// hits, not the hits themselves.
    Index { index: LabelIndex, key: String },
    /// Index lookup dereferenced to the records that were hit.
    IndexTargets { index: LabelIndex, key: String },
    /// Records by explicit id.
    Records(Vec<RecordId>),
    /// Nodes with an information edge to a foreign node of the given label.
    ForeignOrigins { label: String },
}

/// A fully specified store query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
    pub selector: Selector,
    /// Also return the derivation subgraph around every hit, without
    /// entering foreign nodes.
    pub expand_subgraph: bool,
    /// Maximum number of direct hits.
    pub limit: usize,
    pub fetch_plan: FetchPlan,
}

impl Query {
    pub fn new(selector: Selector) -> Self {
        Self {
            selector,
            expand_subgraph: false,
            limit: 100,
            fetch_plan: FetchPlan::NONE,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_fetch_plan(mut self, fetch_plan: FetchPlan) -> Self {
        self.fetch_plan = fetch_plan;
        self
    }

    pub fn with_subgraph(mut self, expand_subgraph: bool) -> Self {
        self.expand_subgraph = expand_subgraph;
        self
    }

    /// Renders the query in the graph store's SQL dialect.
    pub fn to_sql(&self) -> String {
        let select = match &self.selector {
            Selector::Index { index, key } => format!(
                "SELECT FROM index:{} WHERE key = '{}'",
                index.index_name(),
                quote(key)
            ),
            Selector::IndexTargets { index, key } => format!(
                "SELECT expand(rid) FROM index:{} WHERE key = '{}'",
                index.index_name(),
                quote(key)
            ),
            Selector::Records(ids) => {
                let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
                format!("SELECT FROM [{}]", ids.join(", "))
            }
            Selector::ForeignOrigins { label } => format!(
                "SELECT expand(in('{}')) FROM {} WHERE label = '{}'",
                EdgeKind::Information.as_str(),
                NodeKind::ForeignNode.as_str(),
                quote(label)
            ),
        };

        let select = if self.expand_subgraph {
            format!(
                "SELECT FROM (TRAVERSE both() FROM ({select}) WHILE @class <> '{}')",
                NodeKind::ForeignNode.as_str()
            )
        } else {
            select
        };

        format!("{select} LIMIT {} FETCHPLAN {}", self.limit, self.fetch_plan)
    }
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// Records returned by one query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedRecords {
    /// The selector's hits, at most `limit` of them.
    pub direct: Vec<RawRecord>,
    /// Records pulled in by subgraph traversal or the fetch plan.
    pub expanded: Vec<RawRecord>,
}

/// A graph store that can evaluate [`Query`]s.
///
/// Implementations must be shareable across threads; each call is an
/// independent request.
pub trait GraphStore: Send + Sync {
    /// Evaluates a query. A failure here is fatal for the request.
    fn execute(&self, query: &Query) -> Result<FetchedRecords>;

    /// Recognizes index-lookup entries that are not graph objects.
    fn is_index_artifact(&self, record: &RawRecord) -> bool {
        record.record_id() == Some(RecordId::INDEX_SENTINEL)
    }
}

impl<S: GraphStore + ?Sized> GraphStore for std::sync::Arc<S> {
    fn execute(&self, query: &Query) -> Result<FetchedRecords> {
        (**self).execute(query)
    }

    fn is_index_artifact(&self, record: &RawRecord) -> bool {
        (**self).is_index_artifact(record)
    }
}
