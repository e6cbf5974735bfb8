use std::collections::{BTreeMap, HashSet, VecDeque};

use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, warn};

use super::connection::Database;
use super::{FetchedRecords, GraphStore, Query, Selector};
use crate::errors::{Result, ShabakaError};
use crate::types::*;
use crate::vocalization::{is_arabic_string, normalize_ligature, strip_tashkeel, strip_tatweel};

/// Builds a `map_err` adapter that wraps a rusqlite error with context.
fn store_err(operation: &'static str, what: &'static str) -> impl Fn(rusqlite::Error) -> ShabakaError {
    move |e| ShabakaError::Store {
        message: format!("failed to {what}: {e}"),
        operation: operation.to_string(),
    }
}

/// Cluster holding the records of a class.
fn cluster_of(class: &str) -> Option<i32> {
    let cluster = match class {
        "Root" => 11,
        "Verb" => 12,
        "Noun" => 13,
        "Particle" => 14,
        "ForeignNode" => 15,
        "VerbDerivationEdge" => 21,
        "NounDerivationEdge" => 22,
        "ParticleDerivationEdge" => 23,
        "InformationEdge" => 24,
        "CollocationEdge" => 25,
        _ => return None,
    };
    Some(cluster)
}

/// Classes covered by the `ArabicNode.*` label indexes.
const ARABIC_CLASSES: &str = "('Root', 'Verb', 'Noun', 'Particle')";

// ---------------------------------------------------------------------------
// Record materialization
// ---------------------------------------------------------------------------

struct RecordRow {
    rid: String,
    class: String,
    source: Option<String>,
    target: Option<String>,
    attributes: String,
}

fn row_to_record_row(row: &rusqlite::Row) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        rid: row.get("rid")?,
        class: row.get("class")?,
        source: row.get("source")?,
        target: row.get("target")?,
        attributes: row.get("attributes")?,
    })
}

/// Loads one record in the shape the store hands out: edges carry `out`/`in`
/// links, nodes carry `out_<EdgeClass>`/`in_<EdgeClass>` link bags.
fn load_record(conn: &Connection, rid: &str) -> Result<Option<RawRecord>> {
    let row = conn
        .query_row(
            "SELECT rid, class, source, target, attributes FROM records WHERE rid = ?1",
            params![rid],
            row_to_record_row,
        )
        .optional()
        .map_err(store_err("load_record", "read record"))?;

    let Some(row) = row else {
        return Ok(None);
    };

    let attributes: serde_json::Value = serde_json::from_str(&row.attributes)?;
    let mut record = RawRecord::from_json(&row.rid, &row.class, &attributes)?;

    match (row.source, row.target) {
        (Some(source), Some(target)) => {
            record.attributes.insert(SOURCE_FIELD.to_string(), RawValue::Link(source));
            record.attributes.insert(TARGET_FIELD.to_string(), RawValue::Link(target));
        }
        _ => {
            for (bag, column) in [("out", "source"), ("in", "target")] {
                for (class, links) in adjacent_edges(conn, &row.rid, column)? {
                    record
                        .attributes
                        .insert(format!("{bag}_{class}"), RawValue::LinkList(links));
                }
            }
        }
    }

    Ok(Some(record))
}

/// Like [`load_record`], but logs and skips records whose stored attribute
/// document cannot be decoded.
fn load_or_skip(conn: &Connection, rid: &str) -> Result<Option<RawRecord>> {
    match load_record(conn, rid) {
        Err(e @ (ShabakaError::Json(_) | ShabakaError::MalformedRecord { .. })) => {
            warn!(record_id = %rid, error = %e, "skipping undecodable record");
            Ok(None)
        }
        other => other,
    }
}

/// Edge ids touching `rid` through `column`, grouped by edge class.
fn adjacent_edges(conn: &Connection, rid: &str, column: &str) -> Result<BTreeMap<String, Vec<String>>> {
    let sql = format!("SELECT rid, class FROM records WHERE {column} = ?1 ORDER BY cluster, position");
    let mut stmt = conn
        .prepare_cached(&sql)
        .map_err(store_err("adjacent_edges", "prepare query"))?;
    let rows = stmt
        .query_map(params![rid], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })
        .map_err(store_err("adjacent_edges", "query edges"))?;

    let mut bags: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for row in rows {
        let (edge, class) = row.map_err(store_err("adjacent_edges", "read edge row"))?;
        bags.entry(class).or_default().push(edge);
    }
    Ok(bags)
}

/// Runs a single-column `rid` query.
fn query_rids(conn: &Connection, sql: &str, key: &str, limit: usize) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare_cached(sql)
        .map_err(store_err("execute", "prepare query"))?;
    let rows = stmt
        .query_map(params![key, limit as i64], |row| row.get::<_, String>(0))
        .map_err(store_err("execute", "run query"))?;

    let mut rids = Vec::new();
    for row in rows {
        rids.push(row.map_err(store_err("execute", "read row"))?);
    }
    Ok(rids)
}

/// All link targets of a raw record, in attribute order.
fn links_of(record: &RawRecord) -> Vec<&str> {
    let mut links = Vec::new();
    for value in record.attributes.values() {
        match value {
            RawValue::Link(link) => links.push(link.as_str()),
            RawValue::LinkList(list) => links.extend(list.iter().map(String::as_str)),
            _ => {}
        }
    }
    links
}

fn index_artifact(key: &str, target: &str) -> RawRecord {
    RawRecord::new(RecordId::INDEX_SENTINEL.to_string(), "")
        .with_str("key", key)
        .with(ARTIFACT_LINK_FIELD, RawValue::Link(target.to_string()))
}

// ---------------------------------------------------------------------------
// Query execution
// ---------------------------------------------------------------------------

/// Collects expansion records, remembering what has already been emitted.
struct Expansion<'c> {
    conn: &'c Connection,
    seen: HashSet<String>,
    records: Vec<RawRecord>,
}

impl<'c> Expansion<'c> {
    /// Loads and emits `rid` unless already seen. Undecodable records are
    /// logged and skipped.
    fn emit(&mut self, rid: &str) -> Result<Option<RawRecord>> {
        if !self.seen.insert(rid.to_string()) {
            return Ok(None);
        }
        let record = load_or_skip(self.conn, rid)?;
        if let Some(record) = &record {
            self.records.push(record.clone());
        }
        Ok(record)
    }
}

fn select_direct(conn: &Connection, query: &Query) -> Result<Vec<RawRecord>> {
    let hits = match &query.selector {
        Selector::Index { index, key } | Selector::IndexTargets { index, key } => {
            let sql = format!(
                "SELECT rid FROM records WHERE class IN {ARABIC_CLASSES} AND {} = ?1
                 ORDER BY cluster, position LIMIT ?2",
                index.attribute()
            );
            let rids = query_rids(conn, &sql, key, query.limit)?;
            if matches!(query.selector, Selector::Index { .. }) {
                return Ok(rids.iter().map(|rid| index_artifact(key, rid)).collect());
            }
            rids
        }
        Selector::Records(ids) => ids.iter().take(query.limit).map(|id| id.to_string()).collect(),
        Selector::ForeignOrigins { label } => query_rids(
            conn,
            "SELECT DISTINCT e.source FROM records e
             JOIN records f ON f.rid = e.target
             WHERE e.class = 'InformationEdge' AND f.class = 'ForeignNode' AND f.label = ?1
             ORDER BY e.source LIMIT ?2",
            label,
            query.limit,
        )?,
    };

    let mut direct = Vec::with_capacity(hits.len());
    let mut seen = HashSet::new();
    for rid in hits {
        if !seen.insert(rid.clone()) {
            continue;
        }
        if let Some(record) = load_or_skip(conn, &rid)? {
            direct.push(record);
        }
    }
    Ok(direct)
}

/// Walks the derivation subgraph around `seeds` in both directions without
/// entering foreign nodes, emitting every reached node and traversed edge.
fn traverse_subgraph(expansion: &mut Expansion<'_>, seeds: Vec<String>) -> Result<()> {
    let mut queue: VecDeque<String> = seeds.into_iter().collect();
    let mut visited: HashSet<String> = queue.iter().cloned().collect();

    let conn = expansion.conn;
    while let Some(rid) = queue.pop_front() {
        let mut stmt = conn
            .prepare_cached(
                "SELECT e.rid, CASE WHEN e.source = ?1 THEN e.target ELSE e.source END AS other
                 FROM records e JOIN records n
                   ON n.rid = CASE WHEN e.source = ?1 THEN e.target ELSE e.source END
                 WHERE (e.source = ?1 OR e.target = ?1) AND n.class <> 'ForeignNode'
                 ORDER BY e.cluster, e.position",
            )
            .map_err(store_err("traverse_subgraph", "prepare query"))?;
        let rows = stmt
            .query_map(params![rid], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(store_err("traverse_subgraph", "query neighbours"))?;
        let mut neighbours = Vec::new();
        for row in rows {
            neighbours.push(row.map_err(store_err("traverse_subgraph", "read row"))?);
        }
        drop(stmt);

        for (edge, other) in neighbours {
            expansion.emit(&edge)?;
            if visited.insert(other.clone()) {
                expansion.emit(&other)?;
                queue.push_back(other);
            }
        }
    }
    Ok(())
}

/// Follows links `depth` hops out of `frontier`, emitting every new record.
fn apply_fetch_plan(expansion: &mut Expansion<'_>, frontier: Vec<RawRecord>, depth: u32) -> Result<()> {
    let mut frontier = frontier;
    for _ in 0..depth {
        let mut next = Vec::new();
        for record in &frontier {
            for link in links_of(record) {
                if let Some(loaded) = expansion.emit(link)? {
                    next.push(loaded);
                }
            }
        }
        if next.is_empty() {
            break;
        }
        frontier = next;
    }
    Ok(())
}

fn execute_query(conn: &Connection, query: &Query) -> Result<FetchedRecords> {
    let direct = select_direct(conn, query)?;

    let mut expansion = Expansion {
        conn,
        seen: direct
            .iter()
            .filter(|r| r.record_id() != Some(RecordId::INDEX_SENTINEL))
            .map(|r| r.id.clone())
            .collect(),
        records: Vec::new(),
    };

    if query.expand_subgraph {
        let mut seeds = Vec::new();
        for record in &direct {
            if record.record_id() == Some(RecordId::INDEX_SENTINEL) {
                if let Some(RawValue::Link(target)) = record.get(ARTIFACT_LINK_FIELD) {
                    expansion.emit(target)?;
                    seeds.push(target.clone());
                }
            } else if record.class != NodeKind::ForeignNode.as_str() {
                seeds.push(record.id.clone());
            }
        }
        traverse_subgraph(&mut expansion, seeds)?;
    }

    if query.fetch_plan.expands() {
        let mut frontier = direct.clone();
        frontier.extend(expansion.records.iter().cloned());
        apply_fetch_plan(&mut expansion, frontier, query.fetch_plan.depth)?;
    }

    Ok(FetchedRecords {
        direct,
        expanded: expansion.records,
    })
}

impl GraphStore for Database {
    fn execute(&self, query: &Query) -> Result<FetchedRecords> {
        debug!(sql = %query.to_sql(), "executing query");
        let conn = self.conn()?;
        let fetched = execute_query(&conn, query)?;
        debug!(
            direct = fetched.direct.len(),
            expanded = fetched.expanded.len(),
            "query returned"
        );
        Ok(fetched)
    }
}

// ---------------------------------------------------------------------------
// Record creation
// ---------------------------------------------------------------------------

fn next_position(conn: &Connection, cluster: i32) -> Result<i64> {
    conn.query_row(
        "SELECT COALESCE(MAX(position) + 1, 0) FROM records WHERE cluster = ?1",
        params![cluster],
        |row| row.get(0),
    )
    .map_err(store_err("insert_record", "allocate position"))
}

fn class_of(conn: &Connection, rid: &RecordId) -> Result<Option<String>> {
    conn.query_row(
        "SELECT class FROM records WHERE rid = ?1",
        params![rid.to_string()],
        |row| row.get(0),
    )
    .optional()
    .map_err(store_err("class_of", "read record class"))
}

fn insert_record(
    conn: &Connection,
    class: &str,
    endpoints: Option<(RecordId, RecordId)>,
    attributes: &BTreeMap<String, RawValue>,
) -> Result<RecordId> {
    let cluster = cluster_of(class).ok_or_else(|| ShabakaError::Store {
        message: format!("unknown class '{class}'"),
        operation: "insert_record".to_string(),
    })?;
    let id = RecordId::new(cluster, next_position(conn, cluster)?);

    let mut record = RawRecord::new(id.to_string(), class);
    record.attributes = attributes.clone();
    let label = record.get(LABEL).and_then(RawValue::as_str).map(str::to_string);
    let unvocalized = record
        .get(UNVOCALIZED_LABEL)
        .and_then(RawValue::as_str)
        .map(str::to_string);

    conn.execute(
        "INSERT INTO records
            (rid, cluster, position, class, label, unvocalized_label, source, target, attributes)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            id.to_string(),
            id.cluster,
            id.position,
            class,
            label,
            unvocalized,
            endpoints.map(|(s, _)| s.to_string()),
            endpoints.map(|(_, t)| t.to_string()),
            record.attributes_json().to_string(),
        ],
    )
    .map_err(store_err("insert_record", "insert record"))?;

    Ok(id)
}

fn insert_edge(
    conn: &Connection,
    kind: EdgeKind,
    source: RecordId,
    target: RecordId,
    attributes: &BTreeMap<String, RawValue>,
) -> Result<RecordId> {
    let endpoint_err = |message: String| ShabakaError::Store {
        message,
        operation: "create_edge".to_string(),
    };

    let source_class = class_of(conn, &source)?
        .ok_or_else(|| endpoint_err(format!("source {source} does not exist")))?;
    let target_class = class_of(conn, &target)?
        .ok_or_else(|| endpoint_err(format!("target {target} does not exist")))?;
    if NodeKind::from_str(&source_class).is_none() || NodeKind::from_str(&target_class).is_none() {
        return Err(endpoint_err("edges may only connect nodes".to_string()));
    }

    if kind.is_derivation() {
        if target_class == NodeKind::Root.as_str() {
            return Err(endpoint_err(format!("root {target} cannot be derived")));
        }
        let derivations: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM records WHERE target = ?1 AND class IN
                    ('VerbDerivationEdge', 'NounDerivationEdge', 'ParticleDerivationEdge')",
                params![target.to_string()],
                |row| row.get(0),
            )
            .map_err(store_err("create_edge", "count derivations"))?;
        if derivations > 0 {
            return Err(endpoint_err(format!("{target} is already derived from another node")));
        }
    }

    insert_record(conn, kind.as_str(), Some((source, target)), attributes)
}

impl Database {
    /// Creates a node of the given kind with `label` and extra attributes.
    pub fn create_node(
        &self,
        kind: NodeKind,
        label: &str,
        attributes: BTreeMap<String, RawValue>,
    ) -> Result<RecordId> {
        let mut attributes = attributes;
        attributes.insert(LABEL.to_string(), RawValue::String(label.to_string()));
        let conn = self.conn()?;
        insert_record(&conn, kind.as_str(), None, &attributes)
    }

    /// Creates an edge between two existing nodes.
    ///
    /// A node can be the target of at most one derivation edge, and roots of
    /// none.
    pub fn create_edge(
        &self,
        kind: EdgeKind,
        source: RecordId,
        target: RecordId,
        attributes: BTreeMap<String, RawValue>,
    ) -> Result<RecordId> {
        let conn = self.conn()?;
        insert_edge(&conn, kind, source, target, &attributes)
    }

    /// Creates an Arabic node after normalizing its label.
    ///
    /// Tatweel is stripped and lam-alef ligatures are spelled out; labels that
    /// are not Arabic are rejected. `unvocalized_label` is filled in unless
    /// given.
    pub fn create_arabic_node(
        &self,
        kind: NodeKind,
        label: &str,
        attributes: BTreeMap<String, RawValue>,
    ) -> Result<RecordId> {
        let label = normalize_arabic_label(label)?;
        let mut attributes = attributes;
        attributes
            .entry(UNVOCALIZED_LABEL.to_string())
            .or_insert_with(|| RawValue::String(strip_tashkeel(&label)));
        self.create_node(kind, &label, attributes)
    }

    /// Creates an Arabic node and the derivation edge leading to it from
    /// `origin`, in one transaction. Returns `(node, edge)`.
    pub fn create_derived_node(
        &self,
        kind: NodeKind,
        label: &str,
        origin: RecordId,
        node_attributes: BTreeMap<String, RawValue>,
        edge_attributes: BTreeMap<String, RawValue>,
    ) -> Result<(RecordId, RecordId)> {
        let edge_kind = EdgeKind::derivation_for(kind).ok_or_else(|| ShabakaError::Store {
            message: format!("{} nodes are not derived", kind.as_str()),
            operation: "create_derived_node".to_string(),
        })?;

        let label = normalize_arabic_label(label)?;
        let mut node_attributes = node_attributes;
        node_attributes.insert(LABEL.to_string(), RawValue::String(label.clone()));
        node_attributes
            .entry(UNVOCALIZED_LABEL.to_string())
            .or_insert_with(|| RawValue::String(strip_tashkeel(&label)));

        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(store_err("create_derived_node", "begin transaction"))?;
        let node = insert_record(&tx, kind.as_str(), None, &node_attributes)?;
        let edge = insert_edge(&tx, edge_kind, origin, node, &edge_attributes)?;
        tx.commit()
            .map_err(store_err("create_derived_node", "commit transaction"))?;

        Ok((node, edge))
    }

    pub fn add_root_node(&self, label: &str) -> Result<RecordId> {
        self.create_arabic_node(NodeKind::Root, label, BTreeMap::new())
    }

    /// Adds a verb derived from `derived_from`; the stem (`I`..`X`) is kept
    /// on the derivation edge.
    pub fn add_verb_node(&self, label: &str, stem: &str, derived_from: RecordId) -> Result<RecordId> {
        let mut edge_attributes = BTreeMap::new();
        edge_attributes.insert("stem".to_string(), RawValue::String(stem.to_string()));
        let (node, _) =
            self.create_derived_node(NodeKind::Verb, label, derived_from, BTreeMap::new(), edge_attributes)?;
        Ok(node)
    }

    pub fn add_noun_node(&self, label: &str, derived_from: RecordId) -> Result<RecordId> {
        let (node, _) =
            self.create_derived_node(NodeKind::Noun, label, derived_from, BTreeMap::new(), BTreeMap::new())?;
        Ok(node)
    }

    pub fn add_particle_node(&self, label: &str, derived_from: RecordId) -> Result<RecordId> {
        let (node, _) = self.create_derived_node(
            NodeKind::Particle,
            label,
            derived_from,
            BTreeMap::new(),
            BTreeMap::new(),
        )?;
        Ok(node)
    }

    /// Adds a translation of `derived_from` and the information edge to it.
    pub fn add_foreign_node(&self, label: &str, language: &str, derived_from: RecordId) -> Result<RecordId> {
        let mut attributes = BTreeMap::new();
        attributes.insert("language".to_string(), RawValue::String(language.to_string()));
        attributes.insert(LABEL.to_string(), RawValue::String(label.to_string()));

        let conn = self.conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(store_err("add_foreign_node", "begin transaction"))?;
        let node = insert_record(&tx, NodeKind::ForeignNode.as_str(), None, &attributes)?;
        insert_edge(&tx, EdgeKind::Information, derived_from, node, &BTreeMap::new())?;
        tx.commit()
            .map_err(store_err("add_foreign_node", "commit transaction"))?;

        Ok(node)
    }

    /// Retrieves a record by id in the shape queries return it.
    pub fn get_record(&self, id: &RecordId) -> Result<Option<RawRecord>> {
        let conn = self.conn()?;
        load_record(&conn, &id.to_string())
    }

    pub fn count_records(&self) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))
            .map_err(store_err("count_records", "count records"))?;
        Ok(count as u64)
    }

    /// Overwrites the stored attribute document of a record verbatim.
    ///
    /// No validation is applied; used to repair or inspect records by hand.
    pub fn set_raw_attributes(&self, id: &RecordId, attributes_json: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE records SET attributes = ?2 WHERE rid = ?1",
            params![id.to_string(), attributes_json],
        )
        .map_err(store_err("set_raw_attributes", "update record"))?;
        Ok(())
    }
}

/// Strips tatweel, spells out ligatures and checks the result is Arabic.
pub fn normalize_arabic_label(label: &str) -> Result<String> {
    let label = normalize_ligature(&strip_tatweel(label.trim()));
    if !is_arabic_string(&label) {
        return Err(ShabakaError::NotArabic { label });
    }
    Ok(label)
}
