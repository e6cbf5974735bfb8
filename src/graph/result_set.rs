use std::collections::HashMap;

use tracing::{debug, warn};

use super::navigation::{EdgeRef, NodeRef, RecordRef};
use super::wrap::{artifact_target, wrap, Wrapped};
use crate::resolution::{LinkResolution, LinkResolver};
use crate::types::{RawRecord, RecordId};

/// A batch of wrapped store records, deduplicated by id and linked into a
/// navigable graph.
///
/// Objects live in an arena owned by the result set; nodes and edges refer to
/// each other by arena slot, and the borrowed views ([`NodeRef`], [`EdgeRef`])
/// turn those slots back into objects. Every accessor returns a fresh
/// iterator, so the same result set can be walked by any number of consumers.
#[derive(Debug, Clone, Default)]
pub struct ResultSet {
    objects: Vec<Wrapped>,
    by_id: HashMap<RecordId, usize>,
    /// Parallel to `objects`.
    primary: Vec<bool>,
    resolution: LinkResolution,
}

impl ResultSet {
    /// A result set holding nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a result set from the direct hits of a query and the records
    /// the store pulled in by expansion.
    ///
    /// `is_primary` is evaluated once per id, on the raw record that produced
    /// the object, and decides whether the object is a primary result.
    pub fn new<P>(direct: Vec<RawRecord>, expanded: Vec<RawRecord>, is_primary: P) -> Self
    where
        P: Fn(&RawRecord) -> bool,
    {
        Self::with_index_artifacts(direct, expanded, |_| false, is_primary)
    }

    /// Like [`ResultSet::new`], additionally recognizing index artifacts.
    ///
    /// Artifacts are not materialized; the record each one points at becomes
    /// a primary result if it is part of the batch.
    pub fn with_index_artifacts<A, P>(
        direct: Vec<RawRecord>,
        expanded: Vec<RawRecord>,
        is_artifact: A,
        is_primary: P,
    ) -> Self
    where
        A: Fn(&RawRecord) -> bool,
        P: Fn(&RawRecord) -> bool,
    {
        let mut objects: Vec<Wrapped> = Vec::new();
        let mut by_id: HashMap<RecordId, usize> = HashMap::new();
        let mut primary: Vec<bool> = Vec::new();
        let mut artifact_targets: Vec<RecordId> = Vec::new();

        // Pass 1: wrap everything.
        for raw in direct.iter().chain(expanded.iter()) {
            if is_artifact(raw) {
                match artifact_target(raw) {
                    Ok(target) => artifact_targets.push(target),
                    Err(e) => warn!(record_id = %raw.id, error = %e, "skipping index artifact"),
                }
                continue;
            }

            if let Some(id) = raw.record_id() {
                if by_id.contains_key(&id) {
                    continue;
                }
            }

            match wrap(raw) {
                Ok(wrapped) => {
                    by_id.insert(wrapped.id(), objects.len());
                    primary.push(is_primary(raw));
                    objects.push(wrapped);
                }
                Err(e) => warn!(record_id = %raw.id, error = %e, "skipping malformed record"),
            }
        }

        // Pass 2: links and adjacency.
        let resolution = LinkResolver::new(&objects, &by_id).resolve_all(&mut objects);

        for target in &artifact_targets {
            match by_id.get(target) {
                Some(&slot) => primary[slot] = true,
                None => warn!(record_id = %target, "index artifact target not in batch"),
            }
        }

        debug!(
            objects = objects.len(),
            primary = primary.iter().filter(|p| **p).count(),
            artifacts = artifact_targets.len(),
            resolved_links = resolution.resolved,
            dangling_links = resolution.dangling,
            "assembled result set"
        );

        Self {
            objects,
            by_id,
            primary,
            resolution,
        }
    }

    /// Number of distinct objects.
    pub fn count(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Link statistics of the construction pass.
    pub fn resolution(&self) -> LinkResolution {
        self.resolution
    }

    pub fn contains(&self, id: &RecordId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Looks up an object by id.
    pub fn get(&self, id: &RecordId) -> Option<RecordRef<'_>> {
        self.by_id.get(id).map(|slot| self.record_at(*slot))
    }

    /// Looks up a node by id; `None` if absent or an edge.
    pub fn node(&self, id: &RecordId) -> Option<NodeRef<'_>> {
        self.get(id).and_then(|r| r.as_node())
    }

    /// Looks up an edge by id; `None` if absent or a node.
    pub fn edge(&self, id: &RecordId) -> Option<EdgeRef<'_>> {
        self.get(id).and_then(|r| r.as_edge())
    }

    pub fn is_primary(&self, id: &RecordId) -> bool {
        self.by_id.get(id).is_some_and(|slot| self.primary[*slot])
    }

    pub fn all_results(&self) -> impl Iterator<Item = RecordRef<'_>> + '_ {
        (0..self.objects.len()).map(move |slot| self.record_at(slot))
    }

    /// Objects matched directly by the query.
    pub fn primary_results(&self) -> impl Iterator<Item = RecordRef<'_>> + '_ {
        self.all_results().filter(move |r| self.primary[r.slot()])
    }

    /// Objects present only because of expansion.
    pub fn secondary_results(&self) -> impl Iterator<Item = RecordRef<'_>> + '_ {
        self.all_results().filter(move |r| !self.primary[r.slot()])
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeRef<'_>> + '_ {
        self.all_results().filter_map(|r| r.as_node())
    }

    pub fn edges(&self) -> impl Iterator<Item = EdgeRef<'_>> + '_ {
        self.all_results().filter_map(|r| r.as_edge())
    }

    /// A primary result if there is one, otherwise any result.
    pub fn first_result(&self) -> Option<RecordRef<'_>> {
        self.primary_results()
            .next()
            .or_else(|| self.all_results().next())
    }

    pub(crate) fn object(&self, slot: usize) -> &Wrapped {
        &self.objects[slot]
    }

    pub(crate) fn record_at(&self, slot: usize) -> RecordRef<'_> {
        RecordRef::new(self, slot)
    }
}
