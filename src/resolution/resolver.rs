use std::collections::HashMap;

use tracing::warn;

use crate::graph::wrap::{Link, Value, Wrapped};
use crate::types::RecordId;

/// Summary of one resolution pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkResolution {
    /// Links that now point at an object of the batch.
    pub resolved: usize,
    /// Links whose target is not part of the batch.
    pub dangling: usize,
    /// Edges attached to at least one endpoint.
    pub attached_edges: usize,
}

/// Resolves the links of a wrapped batch against the batch's id index.
///
/// Must run after every record of the batch has been wrapped: an edge may
/// reference a node that appears later in input order.
pub struct LinkResolver<'a> {
    by_id: &'a HashMap<RecordId, usize>,
    /// Which arena slots hold nodes; edge endpoints may only resolve to these.
    is_node: Vec<bool>,
}

impl<'a> LinkResolver<'a> {
    pub fn new(objects: &[Wrapped], by_id: &'a HashMap<RecordId, usize>) -> Self {
        Self {
            by_id,
            is_node: objects.iter().map(|o| !o.is_edge()).collect(),
        }
    }

    /// Resolves every link of every object and backfills node adjacency.
    ///
    /// Each edge whose source resolves is appended to that node's outgoing
    /// list, and each edge whose target resolves to the target's incoming
    /// list. Nothing else writes adjacency lists. Links resolved by an
    /// earlier pass are left alone, so a repeated pass changes nothing.
    pub fn resolve_all(&self, objects: &mut [Wrapped]) -> LinkResolution {
        let mut stats = LinkResolution::default();
        let mut attachments: Vec<(usize, Option<usize>, Option<usize>)> = Vec::new();

        for (slot, object) in objects.iter_mut().enumerate() {
            for value in object.attributes_mut().values_mut() {
                match value {
                    Value::Link(link) => *link = self.resolve(*link, &mut stats),
                    Value::LinkList(links) => {
                        for link in links.iter_mut() {
                            *link = self.resolve(*link, &mut stats);
                        }
                    }
                    _ => {}
                }
            }

            if let Wrapped::Edge(edge) = object {
                let (before_source, before_target) = (edge.source, edge.target);
                edge.source = self.resolve_endpoint(edge.id, edge.source, &mut stats);
                edge.target = self.resolve_endpoint(edge.id, edge.target, &mut stats);
                let source = newly_resolved(before_source, edge.source);
                let target = newly_resolved(before_target, edge.target);
                if source.is_some() || target.is_some() {
                    attachments.push((slot, source, target));
                }
            }
        }

        stats.attached_edges = attachments.len();
        for (edge_slot, source, target) in attachments {
            if let Some(source) = source {
                if let Wrapped::Node(node) = &mut objects[source] {
                    node.outgoing.push(edge_slot);
                }
            }
            if let Some(target) = target {
                if let Wrapped::Node(node) = &mut objects[target] {
                    node.incoming.push(edge_slot);
                }
            }
        }

        stats
    }

    fn resolve(&self, link: Link, stats: &mut LinkResolution) -> Link {
        match link {
            Link::Unresolved(id) => match self.by_id.get(&id) {
                Some(slot) => {
                    stats.resolved += 1;
                    Link::Resolved(*slot)
                }
                None => {
                    stats.dangling += 1;
                    Link::Dangling(id)
                }
            },
            already => already,
        }
    }

    /// Like `resolve`, but an endpoint naming another edge is left dangling.
    fn resolve_endpoint(&self, edge_id: RecordId, link: Link, stats: &mut LinkResolution) -> Link {
        match link {
            Link::Unresolved(id) => match self.by_id.get(&id) {
                Some(&slot) if self.is_node[slot] => {
                    stats.resolved += 1;
                    Link::Resolved(slot)
                }
                Some(_) => {
                    warn!(edge_id = %edge_id, endpoint = %id, "edge endpoint is not a node");
                    stats.dangling += 1;
                    Link::Dangling(id)
                }
                None => {
                    stats.dangling += 1;
                    Link::Dangling(id)
                }
            },
            already => already,
        }
    }
}

/// Slot of an endpoint that this pass turned from unresolved into resolved.
fn newly_resolved(before: Link, after: Link) -> Option<usize> {
    match before {
        Link::Unresolved(_) => after.slot(),
        Link::Resolved(_) | Link::Dangling(_) => None,
    }
}
