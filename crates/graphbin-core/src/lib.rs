//! graphbin core - write-once binary property-graph store
//!
//! This crate converts pipe-delimited property-graph rows (PGDF) into an
//! immutable directory of binary files and reads them back:
//! - Varint codec and the canonical byte comparator
//! - String tables for node and edge identifiers (arrival + lexicographic indexes)
//! - Rank-ordered dictionaries for labels, property names and property values
//! - Delta + varint posting lists with binary-searchable directories
//! - A nine-phase ingestion pipeline with explicit phase ordering
//! - Point lookups and label/property iteration over memory-mapped files
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │   Loader (PGDF rows -> nine-phase pipeline) │
//! └──────────────┬──────────────────────────────┘
//!                │ writes
//! ┌──────────────┴──────────────────────────────┐
//! │  Catalog (dictionaries)  Index (postings)   │
//! └──────────────┬──────────────────────────────┘
//!                │
//! ┌──────────────┴──────────────────────────────┐
//! │  Storage (id tables, records, mmap files)   │
//! └──────────────┬──────────────────────────────┘
//!                │ reads
//! ┌──────────────┴──────────────────────────────┐
//! │           Query (GraphReader)               │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use graphbin_core::{GraphReader, IngestConfig, PgdfFiles, ingest};
//!
//! # fn main() -> graphbin_core::Result<()> {
//! let source = PgdfFiles::new("nodes.pgdf", "edges.pgdf");
//! let stats = ingest(&source, "out", &IngestConfig::default())?;
//! println!("{} nodes, {} edges", stats.nodes_stored, stats.edges_stored);
//!
//! let graph = GraphReader::open("out")?;
//! if let Some(node) = graph.node_by_id("n1")? {
//!     println!("label={} props={:?}", node.label, node.properties);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod index;
pub mod loader;
pub mod query;
pub mod storage;

pub use catalog::{Catalog, Dictionary, fold_value};
pub use codec::derive_edge_id;
pub use config::IngestConfig;
pub use error::{Error, Result};
pub use index::PostingCursor;
pub use loader::{
    EdgeRow, InMemoryRows, IngestContext, IngestPhase, IngestStats, NodeRow, PgdfFiles, RowSource,
    ingest,
};
pub use query::{EdgeView, GraphReader, NodeView};
