//! Row sources feeding the ingestion pipeline

use super::pgdf::{EdgeRow, NodeRow, ScanSummary, read_edges, read_nodes};
use crate::config::DEFAULT_BUFFER_CAPACITY;
use crate::{Error, Result};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Push-style supplier of node and edge rows
///
/// The pipeline scans nodes once and edges twice, so `for_each_edge` must
/// replay the same rows in the same order on every call.
pub trait RowSource {
    /// Hand every node row to `on_row`, stopping at the first error
    fn for_each_node(&self, on_row: &mut dyn FnMut(&NodeRow) -> Result<()>)
    -> Result<ScanSummary>;

    /// Hand every edge row to `on_row`, stopping at the first error
    fn for_each_edge(&self, on_row: &mut dyn FnMut(&EdgeRow) -> Result<()>)
    -> Result<ScanSummary>;
}

/// A node file and an edge file in PGDF
#[derive(Debug, Clone)]
pub struct PgdfFiles {
    nodes: PathBuf,
    edges: PathBuf,
    buffer_capacity: usize,
}

impl PgdfFiles {
    /// Source reading `nodes` and `edges`
    pub fn new<N: AsRef<Path>, E: AsRef<Path>>(nodes: N, edges: E) -> Self {
        Self {
            nodes: nodes.as_ref().to_path_buf(),
            edges: edges.as_ref().to_path_buf(),
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }

    /// Override the read buffer size
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity.max(1);
        self
    }

    fn open(&self, path: &Path) -> Result<BufReader<File>> {
        let file = File::open(path)
            .map_err(|e| Error::input(format!("cannot open {}: {}", path.display(), e)))?;
        Ok(BufReader::with_capacity(self.buffer_capacity, file))
    }
}

impl RowSource for PgdfFiles {
    fn for_each_node(
        &self,
        on_row: &mut dyn FnMut(&NodeRow) -> Result<()>,
    ) -> Result<ScanSummary> {
        read_nodes(self.open(&self.nodes)?, on_row).map_err(|e| with_path(e, &self.nodes))
    }

    fn for_each_edge(
        &self,
        on_row: &mut dyn FnMut(&EdgeRow) -> Result<()>,
    ) -> Result<ScanSummary> {
        read_edges(self.open(&self.edges)?, on_row).map_err(|e| with_path(e, &self.edges))
    }
}

fn with_path(error: Error, path: &Path) -> Error {
    match error {
        Error::Input(msg) => Error::input(format!("{}: {}", path.display(), msg)),
        other => other,
    }
}

/// Rows held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRows {
    /// Node rows in arrival order
    pub nodes: Vec<NodeRow>,
    /// Edge rows in arrival order
    pub edges: Vec<EdgeRow>,
}

impl InMemoryRows {
    /// Source over the given rows
    pub fn new(nodes: Vec<NodeRow>, edges: Vec<EdgeRow>) -> Self {
        Self { nodes, edges }
    }
}

impl RowSource for InMemoryRows {
    fn for_each_node(
        &self,
        on_row: &mut dyn FnMut(&NodeRow) -> Result<()>,
    ) -> Result<ScanSummary> {
        for row in &self.nodes {
            on_row(row)?;
        }
        Ok(ScanSummary {
            emitted: self.nodes.len() as u64,
            dropped: 0,
        })
    }

    fn for_each_edge(
        &self,
        on_row: &mut dyn FnMut(&EdgeRow) -> Result<()>,
    ) -> Result<ScanSummary> {
        for row in &self.edges {
            on_row(row)?;
        }
        Ok(ScanSummary {
            emitted: self.edges.len() as u64,
            dropped: 0,
        })
    }
}
