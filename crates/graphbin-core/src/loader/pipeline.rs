//! Ingestion pipeline context

use super::pgdf::{EdgeRow, NodeRow};
use super::source::RowSource;
use super::staging::{StagingWriter, StringSpool};
use super::{IngestPhase, IngestStats};
use crate::catalog::{Catalog, Dictionary, fold_value, write_dictionary};
use crate::codec::encode_unsigned;
use crate::config::IngestConfig;
use crate::index::{LabelKey, PairSpool, PropertyKey, build_posting_index};
use crate::storage::ident::{IdentTableWriter, StringTable};
use crate::storage::records::RecordWriter;
use crate::storage::{DictionaryKind, EntityKind, IndexKind, StoreLayout};
use crate::{Error, Result};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Instant;

/// Bounded string -> dictionary id cache; once full, further ids are not cached
struct LookupCache {
    ids: HashMap<String, u32>,
    capacity: usize,
}

impl LookupCache {
    fn new(capacity: usize) -> Self {
        Self {
            ids: HashMap::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    fn resolve(&mut self, dictionary: &Dictionary, value: &str) -> Result<Option<u32>> {
        if let Some(&id) = self.ids.get(value) {
            return Ok(Some(id));
        }
        let id = dictionary.string_to_id(value)?;
        if let Some(id) = id {
            if self.ids.len() < self.capacity {
                self.ids.insert(value.to_string(), id);
            }
        }
        Ok(id)
    }
}

/// Resolve a string the pipeline itself put into `dictionary`
fn require_id(
    cache: Option<&mut LookupCache>,
    dictionary: &Dictionary,
    value: &str,
) -> Result<u32> {
    let id = match cache {
        Some(cache) => cache.resolve(dictionary, value)?,
        None => dictionary.string_to_id(value)?,
    };
    id.ok_or_else(|| {
        Error::consistency(format!(
            "{value:?} is missing from the {:?} dictionary",
            dictionary.kind()
        ))
    })
}

fn slot<'a, T>(value: &'a mut Option<T>, what: &str) -> Result<&'a mut T> {
    value
        .as_mut()
        .ok_or_else(|| Error::pipeline(format!("{what} is not available")))
}

fn take<T>(value: &mut Option<T>, what: &str) -> Result<T> {
    value
        .take()
        .ok_or_else(|| Error::pipeline(format!("{what} is not available")))
}

/// Labels and property names awaiting the dictionary build
#[derive(Default)]
struct PendingStrings {
    labels: HashSet<String>,
    property_names: HashSet<String>,
}

impl PendingStrings {
    fn add_label(&mut self, label: &str) {
        if !self.labels.contains(label) {
            self.labels.insert(label.to_string());
        }
    }

    fn add_property_name(&mut self, name: &str) {
        if !self.property_names.contains(name) {
            self.property_names.insert(name.to_string());
        }
    }
}

/// Per-row work of the first node pass
struct NodeSink<'a> {
    ids: &'a mut IdentTableWriter,
    staging: &'a mut StagingWriter,
    values: &'a mut StringSpool,
    pending: &'a mut PendingStrings,
    stats: &'a mut IngestStats,
}

impl NodeSink<'_> {
    fn accept(&mut self, row: &NodeRow) -> Result<()> {
        if row.id.is_empty() || row.label.is_empty() {
            self.stats.node_rows_malformed += 1;
            tracing::debug!("Skipping node row without id or label: {:?}", row.id);
            return Ok(());
        }
        let Some(ordinal) = self.ids.append(&row.id)? else {
            self.stats.duplicate_node_ids += 1;
            tracing::debug!("Skipping duplicate node id {:?}", row.id);
            return Ok(());
        };

        // One value per name: the last one wins, kept at the first position.
        let mut folded: Vec<(&str, String)> = Vec::with_capacity(row.properties.len());
        for (name, value) in &row.properties {
            let value = fold_value(value);
            match folded.iter_mut().find(|(n, _)| *n == name.as_str()) {
                Some(slot) => slot.1 = value,
                None => folded.push((name.as_str(), value)),
            }
        }
        let pairs: Vec<(&str, &str)> = folded
            .iter()
            .map(|(name, value)| (*name, value.as_str()))
            .collect();
        self.staging.write(ordinal, &row.label, &pairs)?;

        self.pending.add_label(&row.label);
        for (name, value) in pairs {
            self.pending.add_property_name(name);
            self.values.push(value)?;
        }
        self.stats.nodes_stored += 1;
        Ok(())
    }
}

/// Label pair spools filled by the second edge pass
struct LabelSpools {
    edges: PairSpool<LabelKey>,
    sources: PairSpool<LabelKey>,
    destinations: PairSpool<LabelKey>,
}

/// Per-row work of the second edge pass
struct EdgeSink<'a> {
    catalog: &'a Catalog,
    nodes: &'a StringTable,
    label_cache: Option<&'a mut LookupCache>,
    stats: &'a mut IngestStats,
    ids: IdentTableWriter,
    records: RecordWriter,
    spools: LabelSpools,
    scratch: Vec<u8>,
}

impl EdgeSink<'_> {
    fn accept(&mut self, row: &EdgeRow) -> Result<()> {
        if row.is_incomplete() {
            self.stats.edges_missing_fields += 1;
            tracing::debug!("Skipping edge row with empty label or endpoint: {:?}", row);
            return Ok(());
        }
        if !row.is_forward() {
            self.stats.edges_non_forward += 1;
            tracing::debug!(
                "Skipping edge {} -> {} with direction {:?}",
                row.source,
                row.target,
                row.direction
            );
            return Ok(());
        }
        let source = self.nodes.lookup(&row.source)?;
        let target = self.nodes.lookup(&row.target)?;
        let (Some(source), Some(target)) = (source, target) else {
            self.stats.edges_dangling += 1;
            tracing::debug!(
                "Skipping edge {} -> {}: endpoint is not a stored node",
                row.source,
                row.target
            );
            return Ok(());
        };

        let label = require_id(
            self.label_cache.as_deref_mut(),
            self.catalog.labels(),
            &row.label,
        )?;
        let id = row.resolved_id();
        let Some(ordinal) = self.ids.append(&id)? else {
            self.stats.duplicate_edge_ids += 1;
            tracing::debug!("Skipping duplicate edge id {:?}", id);
            return Ok(());
        };

        self.scratch.clear();
        encode_unsigned(u64::from(label), &mut self.scratch);
        encode_unsigned(u64::from(source), &mut self.scratch);
        encode_unsigned(u64::from(target), &mut self.scratch);
        let record = self.records.append(&self.scratch)?;
        if record != ordinal {
            return Err(Error::consistency(format!(
                "edge {id:?} has identifier ordinal {ordinal} but record ordinal {record}"
            )));
        }

        self.spools.edges.push(label, ordinal)?;
        self.spools.sources.push(label, source)?;
        self.spools.destinations.push(label, target)?;
        self.stats.edges_stored += 1;
        Ok(())
    }
}

/// Owns all staging state of one ingestion run
///
/// Each phase method checks that the previous phase completed; calling one
/// out of order returns [`Error::Pipeline`]. After a phase fails the context
/// refuses every further phase, and the output directory must be rebuilt
/// from scratch.
pub struct IngestContext {
    layout: StoreLayout,
    config: IngestConfig,
    completed: Option<IngestPhase>,
    failed: bool,
    started: Instant,
    stats: IngestStats,

    pending: PendingStrings,
    node_ids: Option<IdentTableWriter>,
    staging: Option<StagingWriter>,
    values: Option<StringSpool>,
    node_table: Option<StringTable>,
    catalog: Option<Catalog>,
    label_cache: Option<LookupCache>,
    name_cache: Option<LookupCache>,
    property_pairs: Option<PairSpool<PropertyKey>>,
    edge_ids: Option<IdentTableWriter>,
    label_pairs: Option<LabelSpools>,
}

impl IngestContext {
    /// Prepare a run writing into `out_dir`, creating the directory if needed
    pub fn create<P: AsRef<Path>>(out_dir: P, config: IngestConfig) -> Result<Self> {
        let root = out_dir.as_ref();
        std::fs::create_dir_all(root).map_err(|e| {
            Error::storage(format!(
                "cannot create output directory {}: {}",
                root.display(),
                e
            ))
        })?;

        let layout = StoreLayout::new(root);
        let cap = config.buffer();
        let node_ids = IdentTableWriter::create(layout.ident(EntityKind::Nodes), cap)?;
        let staging = StagingWriter::new(config.staging_file("nodes")?, cap);
        let values = StringSpool::new(config.staging_file("propvals")?, cap);
        let (label_cache, name_cache) = match config.lookup_cache_capacity {
            0 => (None, None),
            n => (Some(LookupCache::new(n)), Some(LookupCache::new(n))),
        };

        tracing::info!("Ingesting into {}", root.display());
        Ok(Self {
            layout,
            config,
            completed: None,
            failed: false,
            started: Instant::now(),
            stats: IngestStats::default(),
            pending: PendingStrings::default(),
            node_ids: Some(node_ids),
            staging: Some(staging),
            values: Some(values),
            node_table: None,
            catalog: None,
            label_cache,
            name_cache,
            property_pairs: None,
            edge_ids: None,
            label_pairs: None,
        })
    }

    /// Output layout
    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Last phase that completed
    pub fn completed_phase(&self) -> Option<IngestPhase> {
        self.completed
    }

    /// Counters so far
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    fn enter(&mut self, phase: IngestPhase) -> Result<()> {
        if self.failed {
            return Err(Error::pipeline(format!(
                "{phase} cannot run: an earlier phase failed"
            )));
        }
        if self.completed != phase.predecessor() {
            let last = self
                .completed
                .map_or_else(|| "start".to_string(), |p| p.to_string());
            return Err(Error::pipeline(format!("{phase} cannot run after {last}")));
        }
        self.failed = true;
        tracing::debug!("Phase {} started", phase);
        Ok(())
    }

    fn leave(&mut self, phase: IngestPhase) {
        self.completed = Some(phase);
        self.failed = false;
    }

    /// Phase 1: stream node rows, assigning arrival ordinals and staging records
    pub fn nodes_pass1<S: RowSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        self.enter(IngestPhase::NodesPass1)?;

        let mut sink = NodeSink {
            ids: slot(&mut self.node_ids, "node identifier writer")?,
            staging: slot(&mut self.staging, "node staging file")?,
            values: slot(&mut self.values, "property value spool")?,
            pending: &mut self.pending,
            stats: &mut self.stats,
        };
        let summary = source.for_each_node(&mut |row| sink.accept(row))?;
        self.stats.node_rows_malformed += summary.dropped;

        if self.stats.nodes_skipped() > 0 {
            tracing::warn!(
                "Skipped {} malformed node rows and {} duplicate node ids",
                self.stats.node_rows_malformed,
                self.stats.duplicate_node_ids
            );
        }
        tracing::info!(
            "NodesPass1: {} nodes, {} labels, {} property names",
            self.stats.nodes_stored,
            self.pending.labels.len(),
            self.pending.property_names.len()
        );
        self.leave(IngestPhase::NodesPass1);
        Ok(())
    }

    /// Phase 2: write the node arrival index and flush the staging file
    pub fn finish_nodes_pass1(&mut self) -> Result<()> {
        self.enter(IngestPhase::FinishNodesPass1)?;
        slot(&mut self.node_ids, "node identifier writer")?.finish_arrival()?;
        slot(&mut self.staging, "node staging file")?.flush()?;
        tracing::info!("FinishNodesPass1: arrival index written");
        self.leave(IngestPhase::FinishNodesPass1);
        Ok(())
    }

    /// Phase 3: write the node lexicographic index and open it for endpoint lookups
    pub fn build_nodes_id_lex(&mut self) -> Result<()> {
        self.enter(IngestPhase::BuildNodesIdLex)?;
        let count = take(&mut self.node_ids, "node identifier writer")?.build_lex()?;
        self.node_table = Some(StringTable::open(&self.layout.ident(EntityKind::Nodes))?);
        tracing::info!("BuildNodesIdLex: {} node ids sorted", count);
        self.leave(IngestPhase::BuildNodesIdLex);
        Ok(())
    }

    /// Phase 4: collect every non-empty edge label
    pub fn edges_label_scan<S: RowSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        self.enter(IngestPhase::EdgesLabelScan)?;
        let pending = &mut self.pending;
        let summary = source.for_each_edge(&mut |row| {
            if !row.label.is_empty() {
                pending.add_label(&row.label);
            }
            Ok(())
        })?;
        tracing::info!(
            "EdgesLabelScan: {} edge rows, {} labels pending",
            summary.emitted,
            self.pending.labels.len()
        );
        self.leave(IngestPhase::EdgesLabelScan);
        Ok(())
    }

    /// Phase 5: write the label, property-name and property-value dictionaries
    pub fn build_dictionaries(&mut self) -> Result<()> {
        self.enter(IngestPhase::BuildDictionaries)?;
        let cap = self.config.buffer();

        let values = take(&mut self.values, "property value spool")?.drain(cap)?;
        let labels: Vec<String> = std::mem::take(&mut self.pending.labels).into_iter().collect();
        let names: Vec<String> = std::mem::take(&mut self.pending.property_names)
            .into_iter()
            .collect();

        let layout = &self.layout;
        self.stats.labels = write_dictionary(&layout.dictionary(DictionaryKind::Labels), labels, cap)?;
        self.stats.property_names =
            write_dictionary(&layout.dictionary(DictionaryKind::PropertyNames), names, cap)?;
        self.stats.property_values =
            write_dictionary(&layout.dictionary(DictionaryKind::PropertyValues), values, cap)?;
        self.catalog = Some(Catalog::open(layout)?);

        tracing::info!(
            "BuildDictionaries: {} labels, {} property names, {} property values",
            self.stats.labels,
            self.stats.property_names,
            self.stats.property_values
        );
        self.leave(IngestPhase::BuildDictionaries);
        Ok(())
    }

    /// Phase 6: rewrite staged nodes as varint records with dictionary ids
    pub fn materialize_nodes_rec(&mut self) -> Result<()> {
        self.enter(IngestPhase::MaterializeNodesRec)?;
        let cap = self.config.buffer();

        let mut staged = take(&mut self.staging, "node staging file")?.into_reader(cap)?;
        let catalog = self
            .catalog
            .as_ref()
            .ok_or_else(|| Error::pipeline("catalog is not available"))?;
        let mut records = RecordWriter::create(&self.layout.records(EntityKind::Nodes), cap)?;
        let mut properties =
            PairSpool::<PropertyKey>::new(self.config.staging_file("nodesByProp")?, cap);

        let mut record = Vec::new();
        while let Some(node) = staged.next_node()? {
            if node.ordinal != records.len() {
                return Err(Error::consistency(format!(
                    "staged node {} arrived at position {}",
                    node.ordinal,
                    records.len()
                )));
            }
            let label = require_id(self.label_cache.as_mut(), catalog.labels(), &node.label)?;

            record.clear();
            encode_unsigned(u64::from(label), &mut record);
            encode_unsigned(node.properties.len() as u64, &mut record);
            for (name, value) in &node.properties {
                let name = require_id(self.name_cache.as_mut(), catalog.property_names(), name)?;
                let value = require_id(None, catalog.property_values(), value)?;
                encode_unsigned(u64::from(name), &mut record);
                encode_unsigned(u64::from(value), &mut record);
                properties.push(PropertyKey { name, value }, node.ordinal)?;
            }
            records.append(&record)?;
        }
        staged.close()?;

        let written = records.finish()?;
        if u64::from(written) != self.stats.nodes_stored {
            return Err(Error::consistency(format!(
                "materialized {} node records but staged {}",
                written, self.stats.nodes_stored
            )));
        }
        tracing::info!(
            "MaterializeNodesRec: {} node records, {} property entries",
            written,
            properties.len()
        );
        self.property_pairs = Some(properties);
        self.leave(IngestPhase::MaterializeNodesRec);
        Ok(())
    }

    /// Phase 7: stream edge rows again, writing edge ids, records and label pairs
    pub fn edges_pass2<S: RowSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        self.enter(IngestPhase::EdgesPass2)?;
        let cap = self.config.buffer();
        let spool = |name: &str| -> Result<PairSpool<LabelKey>> {
            Ok(PairSpool::new(self.config.staging_file(name)?, cap))
        };
        let spools = LabelSpools {
            edges: spool("edgesByLabel")?,
            sources: spool("srcByLabel")?,
            destinations: spool("dstByLabel")?,
        };

        let mut sink = EdgeSink {
            catalog: self
                .catalog
                .as_ref()
                .ok_or_else(|| Error::pipeline("catalog is not available"))?,
            nodes: self
                .node_table
                .as_ref()
                .ok_or_else(|| Error::pipeline("node identifier table is not available"))?,
            label_cache: self.label_cache.as_mut(),
            stats: &mut self.stats,
            ids: IdentTableWriter::create(self.layout.ident(EntityKind::Edges), cap)?,
            records: RecordWriter::create(&self.layout.records(EntityKind::Edges), cap)?,
            spools,
            scratch: Vec::new(),
        };
        let summary = source.for_each_edge(&mut |row| sink.accept(row))?;
        let EdgeSink {
            ids,
            records,
            spools,
            ..
        } = sink;
        records.finish()?;

        self.stats.edges_missing_fields += summary.dropped;
        if self.stats.edges_skipped() > 0 {
            tracing::warn!(
                "Skipped edges: {} non-forward, {} missing fields, {} dangling, {} duplicate ids",
                self.stats.edges_non_forward,
                self.stats.edges_missing_fields,
                self.stats.edges_dangling,
                self.stats.duplicate_edge_ids
            );
        }
        tracing::info!("EdgesPass2: {} edges stored", self.stats.edges_stored);
        self.edge_ids = Some(ids);
        self.label_pairs = Some(spools);
        self.leave(IngestPhase::EdgesPass2);
        Ok(())
    }

    /// Phase 8: write the edge arrival and lexicographic indexes
    pub fn finish_edges(&mut self) -> Result<()> {
        self.enter(IngestPhase::FinishEdges)?;
        let mut ids = take(&mut self.edge_ids, "edge identifier writer")?;
        ids.finish_arrival()?;
        let count = ids.build_lex()?;
        tracing::info!("FinishEdges: {} edge ids indexed", count);
        self.leave(IngestPhase::FinishEdges);
        Ok(())
    }

    /// Phase 9: group the spooled pairs into posting lists and directories
    pub fn build_indexes(&mut self) -> Result<()> {
        self.enter(IngestPhase::BuildIndexes)?;
        let cap = self.config.buffer();
        let labels = take(&mut self.label_pairs, "label pair spools")?;
        let properties = take(&mut self.property_pairs, "property pair spool")?;
        let layout = &self.layout;

        self.stats.edges_by_label_keys =
            build_posting_index(labels.edges, &layout.index(IndexKind::EdgesByLabel), cap)?.keys;
        self.stats.sources_by_label_keys =
            build_posting_index(labels.sources, &layout.index(IndexKind::SourcesByLabel), cap)?
                .keys;
        self.stats.destinations_by_label_keys = build_posting_index(
            labels.destinations,
            &layout.index(IndexKind::DestinationsByLabel),
            cap,
        )?
        .keys;
        self.stats.nodes_by_property_keys =
            build_posting_index(properties, &layout.index(IndexKind::NodesByProperty), cap)?.keys;

        self.stats.elapsed_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::info!(
            "BuildIndexes: {} edge labels, {} property keys; ingestion finished in {} ms",
            self.stats.edges_by_label_keys,
            self.stats.nodes_by_property_keys,
            self.stats.elapsed_ms
        );
        self.leave(IngestPhase::BuildIndexes);
        Ok(())
    }

    /// Counters of a completed run
    pub fn finish(self) -> Result<IngestStats> {
        if self.completed != Some(IngestPhase::BuildIndexes) {
            let last = self
                .completed
                .map_or_else(|| "start".to_string(), |p| p.to_string());
            return Err(Error::pipeline(format!(
                "ingestion is incomplete: last completed phase is {last}"
            )));
        }
        Ok(self.stats)
    }
}
