//! Index layer - inverted indexes over node and edge ordinals
//!
//! Four posting-list indexes are built at the end of ingestion:
//! - edges by label: label id -> edge ordinals
//! - sources by label: label id -> source node ordinals of kept edges
//! - destinations by label: label id -> destination node ordinals
//! - nodes by property: (name id, folded value id) -> node ordinals

pub mod posting;

pub use posting::{
    DirectoryEntry, LabelKey, PairSpool, PostingCursor, PostingIndex, PostingKey, PostingSummary,
    PropertyKey, build_posting_index,
};

/// Index keyed by label id
pub type LabelIndex = PostingIndex<LabelKey>;

/// Index keyed by (property name id, property value id)
pub type PropertyIndex = PostingIndex<PropertyKey>;
