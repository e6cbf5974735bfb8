/// Classification and normalization of single store records.
pub mod wrap;

/// The deduplicated, linked batch of wrapped records.
pub mod result_set;

/// Borrowed node/edge views and derivation-tree walks.
pub mod navigation;

pub use navigation::{roman_stem_to_int, verb_stems, EdgeRef, NodeRef, RecordRef, STEM};
pub use result_set::ResultSet;
pub use wrap::{artifact_target, wrap, Link, Value, Wrapped, WrappedEdge, WrappedNode};
