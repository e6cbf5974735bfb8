/// Link resolution module.
///
/// Rewrites the raw cross-record references of a wrapped batch into arena
/// slots and rebuilds node adjacency from edge endpoints.
mod resolver;

pub use resolver::{LinkResolution, LinkResolver};
