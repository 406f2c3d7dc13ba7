//! Ingestion - turns PGDF row streams into a finished binary store
//!
//! Ingestion runs nine strictly ordered phases over an [`IngestContext`]:
//!
//! 1. [`NodesPass1`](IngestPhase::NodesPass1) - node ids, staging records, pending strings
//! 2. [`FinishNodesPass1`](IngestPhase::FinishNodesPass1) - node arrival index
//! 3. [`BuildNodesIdLex`](IngestPhase::BuildNodesIdLex) - node lexicographic index
//! 4. [`EdgesLabelScan`](IngestPhase::EdgesLabelScan) - edge labels
//! 5. [`BuildDictionaries`](IngestPhase::BuildDictionaries) - labels, names, values
//! 6. [`MaterializeNodesRec`](IngestPhase::MaterializeNodesRec) - node records
//! 7. [`EdgesPass2`](IngestPhase::EdgesPass2) - edge ids, edge records, label pairs
//! 8. [`FinishEdges`](IngestPhase::FinishEdges) - edge arrival and lexicographic indexes
//! 9. [`BuildIndexes`](IngestPhase::BuildIndexes) - posting lists and directories
//!
//! [`ingest`] runs them all. Rows with data-quality problems are skipped and
//! counted in [`IngestStats`]; I/O and consistency failures abort.

pub mod pgdf;
pub mod pipeline;
pub mod source;
pub mod staging;

pub use pgdf::{EdgeRow, NodeRow, ScanSummary};
pub use pipeline::IngestContext;
pub use source::{InMemoryRows, PgdfFiles, RowSource};

use crate::Result;
use crate::config::IngestConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Ingestion phases, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IngestPhase {
    /// Stream node rows once
    NodesPass1,
    /// Write the node arrival index
    FinishNodesPass1,
    /// Write the node lexicographic index
    BuildNodesIdLex,
    /// Collect edge labels
    EdgesLabelScan,
    /// Write the three dictionaries
    BuildDictionaries,
    /// Write node records from the staging file
    MaterializeNodesRec,
    /// Stream edge rows a second time
    EdgesPass2,
    /// Write the edge identifier indexes
    FinishEdges,
    /// Write the posting-list indexes
    BuildIndexes,
}

impl IngestPhase {
    /// Every phase in execution order
    pub const ALL: [IngestPhase; 9] = [
        IngestPhase::NodesPass1,
        IngestPhase::FinishNodesPass1,
        IngestPhase::BuildNodesIdLex,
        IngestPhase::EdgesLabelScan,
        IngestPhase::BuildDictionaries,
        IngestPhase::MaterializeNodesRec,
        IngestPhase::EdgesPass2,
        IngestPhase::FinishEdges,
        IngestPhase::BuildIndexes,
    ];

    /// Phase that must have completed before this one may start
    pub fn predecessor(self) -> Option<IngestPhase> {
        let index = Self::ALL.iter().position(|&p| p == self)?;
        index.checked_sub(1).map(|i| Self::ALL[i])
    }
}

impl fmt::Display for IngestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IngestPhase::NodesPass1 => "NodesPass1",
            IngestPhase::FinishNodesPass1 => "FinishNodesPass1",
            IngestPhase::BuildNodesIdLex => "BuildNodesIdLex",
            IngestPhase::EdgesLabelScan => "EdgesLabelScan",
            IngestPhase::BuildDictionaries => "BuildDictionaries",
            IngestPhase::MaterializeNodesRec => "MaterializeNodesRec",
            IngestPhase::EdgesPass2 => "EdgesPass2",
            IngestPhase::FinishEdges => "FinishEdges",
            IngestPhase::BuildIndexes => "BuildIndexes",
        };
        f.write_str(name)
    }
}

/// Counters of one ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestStats {
    /// Nodes written to the store
    pub nodes_stored: u64,
    /// Node rows without an id or label
    pub node_rows_malformed: u64,
    /// Node rows whose id was already stored
    pub duplicate_node_ids: u64,
    /// Edges written to the store
    pub edges_stored: u64,
    /// Edge rows whose direction is not forward
    pub edges_non_forward: u64,
    /// Edge rows with an empty label or endpoint
    pub edges_missing_fields: u64,
    /// Edge rows whose endpoint is not a stored node
    pub edges_dangling: u64,
    /// Edge rows whose (possibly derived) id was already stored
    pub duplicate_edge_ids: u64,
    /// Distinct labels
    pub labels: usize,
    /// Distinct property names
    pub property_names: usize,
    /// Distinct case-folded property values
    pub property_values: usize,
    /// Keys of the edges-by-label index
    pub edges_by_label_keys: usize,
    /// Keys of the sources-by-label index
    pub sources_by_label_keys: usize,
    /// Keys of the destinations-by-label index
    pub destinations_by_label_keys: usize,
    /// Keys of the nodes-by-property index
    pub nodes_by_property_keys: usize,
    /// Wall-clock duration of the run
    pub elapsed_ms: u64,
}

impl IngestStats {
    /// Edge rows dropped for any data-quality reason
    pub fn edges_skipped(&self) -> u64 {
        self.edges_non_forward + self.edges_missing_fields + self.edges_dangling + self.duplicate_edge_ids
    }

    /// Node rows dropped for any data-quality reason
    pub fn nodes_skipped(&self) -> u64 {
        self.node_rows_malformed + self.duplicate_node_ids
    }
}

/// Run every phase against `source`, writing the store into `out_dir`
pub fn ingest<S, P>(source: &S, out_dir: P, config: &IngestConfig) -> Result<IngestStats>
where
    S: RowSource + ?Sized,
    P: AsRef<Path>,
{
    let mut ctx = IngestContext::create(out_dir, config.clone())?;
    ctx.nodes_pass1(source)?;
    ctx.finish_nodes_pass1()?;
    ctx.build_nodes_id_lex()?;
    ctx.edges_label_scan(source)?;
    ctx.build_dictionaries()?;
    ctx.materialize_nodes_rec()?;
    ctx.edges_pass2(source)?;
    ctx.finish_edges()?;
    ctx.build_indexes()?;
    ctx.finish()
}
