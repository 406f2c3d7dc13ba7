//! Query layer - read-only access to a finished store
//!
//! Every file is memory-mapped once by [`GraphReader::open`]. Point lookups
//! binary-search the lexicographic identifier index and decode one record;
//! label and property iteration resolve the key through the dictionaries,
//! find its directory entry and decode a single posting list lazily.

use crate::catalog::{Catalog, Dictionary, fold_value};
use crate::index::{LabelIndex, PostingCursor, PropertyIndex, PropertyKey};
use crate::storage::ident::StringTable;
use crate::storage::records::RecordTable;
use crate::storage::{EntityKind, IndexKind, StoreLayout};
use crate::{Error, Result};
use serde::{Serialize, Serializer};
use std::path::Path;

/// A decoded node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeView {
    /// External node id
    pub id: String,
    /// Arrival ordinal
    pub ordinal: u32,
    /// Node label
    pub label: String,
    /// (name, case-folded value) pairs in input order; serialized as a map
    #[serde(serialize_with = "serialize_properties")]
    pub properties: Vec<(String, String)>,
}

fn serialize_properties<S: Serializer>(
    properties: &[(String, String)],
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.collect_map(properties.iter().map(|(name, value)| (name, value)))
}

impl NodeView {
    /// Value of the first property named `name`
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// A decoded edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EdgeView {
    /// External edge id (explicit or derived)
    pub id: String,
    /// Arrival ordinal
    pub ordinal: u32,
    /// Edge label
    pub label: String,
    /// Source node id
    pub source: String,
    /// Destination node id
    pub target: String,
}

/// Read-only view over a store directory
pub struct GraphReader {
    layout: StoreLayout,
    catalog: Catalog,
    node_ids: StringTable,
    edge_ids: StringTable,
    node_records: RecordTable,
    edge_records: RecordTable,
    edges_by_label: LabelIndex,
    sources_by_label: LabelIndex,
    destinations_by_label: LabelIndex,
    nodes_by_property: PropertyIndex,
}

impl GraphReader {
    /// Map every file of the store in `dir`
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let layout = StoreLayout::new(dir);
        if !layout.root().is_dir() {
            return Err(Error::storage(format!(
                "store directory {} does not exist",
                layout.root().display()
            )));
        }

        let reader = Self {
            catalog: Catalog::open(&layout)?,
            node_ids: StringTable::open(&layout.ident(EntityKind::Nodes))?,
            edge_ids: StringTable::open(&layout.ident(EntityKind::Edges))?,
            node_records: RecordTable::open(&layout.records(EntityKind::Nodes))?,
            edge_records: RecordTable::open(&layout.records(EntityKind::Edges))?,
            edges_by_label: LabelIndex::open(&layout.index(IndexKind::EdgesByLabel))?,
            sources_by_label: LabelIndex::open(&layout.index(IndexKind::SourcesByLabel))?,
            destinations_by_label: LabelIndex::open(&layout.index(IndexKind::DestinationsByLabel))?,
            nodes_by_property: PropertyIndex::open(&layout.index(IndexKind::NodesByProperty))?,
            layout,
        };

        for (kind, ids, records) in [
            (EntityKind::Nodes, &reader.node_ids, &reader.node_records),
            (EntityKind::Edges, &reader.edge_ids, &reader.edge_records),
        ] {
            if ids.len() != records.len() {
                return Err(Error::corrupt(format!(
                    "{:?}: {} identifiers but {} records",
                    kind,
                    ids.len(),
                    records.len()
                )));
            }
        }
        tracing::debug!(
            "Opened store {} ({} nodes, {} edges)",
            reader.layout.root().display(),
            reader.node_count(),
            reader.edge_count()
        );
        Ok(reader)
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        self.layout.root()
    }

    /// Number of stored nodes
    pub fn node_count(&self) -> usize {
        self.node_ids.len()
    }

    /// Number of stored edges
    pub fn edge_count(&self) -> usize {
        self.edge_ids.len()
    }

    /// Label dictionary
    pub fn labels(&self) -> &Dictionary {
        self.catalog.labels()
    }

    /// Property-name dictionary
    pub fn property_names(&self) -> &Dictionary {
        self.catalog.property_names()
    }

    /// Property-value dictionary
    pub fn property_values(&self) -> &Dictionary {
        self.catalog.property_values()
    }

    /// All three dictionaries
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Arrival ordinal of a node id
    pub fn node_ordinal(&self, id: &str) -> Result<Option<u32>> {
        self.node_ids.lookup(id)
    }

    /// Arrival ordinal of an edge id
    pub fn edge_ordinal(&self, id: &str) -> Result<Option<u32>> {
        self.edge_ids.lookup(id)
    }

    /// External id of the node at `ordinal`
    pub fn node_id(&self, ordinal: u32) -> Result<&str> {
        self.node_ids.get(ordinal)
    }

    /// External id of the edge at `ordinal`
    pub fn edge_id(&self, ordinal: u32) -> Result<&str> {
        self.edge_ids.get(ordinal)
    }

    /// Look up a node by external id
    pub fn node_by_id(&self, id: &str) -> Result<Option<NodeView>> {
        match self.node_ids.lookup(id)? {
            Some(ordinal) => self.node(ordinal).map(Some),
            None => Ok(None),
        }
    }

    /// Decode the node at `ordinal`
    pub fn node(&self, ordinal: u32) -> Result<NodeView> {
        let mut record = self.node_records.decoder(ordinal)?;
        let label = self.labels().id_to_string(record.next_u32()?)?.to_string();
        let count = record.next_u32()?;

        let mut properties = Vec::with_capacity(count.min(256) as usize);
        for _ in 0..count {
            let name = self.property_names().id_to_string(record.next_u32()?)?;
            let value = self.property_values().id_to_string(record.next_u32()?)?;
            properties.push((name.to_string(), value.to_string()));
        }

        Ok(NodeView {
            id: self.node_ids.get(ordinal)?.to_string(),
            ordinal,
            label,
            properties,
        })
    }

    /// Look up an edge by external id
    pub fn edge_by_id(&self, id: &str) -> Result<Option<EdgeView>> {
        match self.edge_ids.lookup(id)? {
            Some(ordinal) => self.edge(ordinal).map(Some),
            None => Ok(None),
        }
    }

    /// Decode the edge at `ordinal`
    pub fn edge(&self, ordinal: u32) -> Result<EdgeView> {
        let mut record = self.edge_records.decoder(ordinal)?;
        let label = self.labels().id_to_string(record.next_u32()?)?;
        let source = self.node_ids.get(record.next_u32()?)?;
        let target = self.node_ids.get(record.next_u32()?)?;

        Ok(EdgeView {
            id: self.edge_ids.get(ordinal)?.to_string(),
            ordinal,
            label: label.to_string(),
            source: source.to_string(),
            target: target.to_string(),
        })
    }

    /// Ordinals of edges carrying `label`
    pub fn edges_by_label(&self, label: &str) -> Result<PostingCursor<'_>> {
        self.label_cursor(&self.edges_by_label, label)
    }

    /// Ordinals of nodes that are the source of an edge carrying `label`
    pub fn sources_by_label(&self, label: &str) -> Result<PostingCursor<'_>> {
        self.label_cursor(&self.sources_by_label, label)
    }

    /// Ordinals of nodes that are the destination of an edge carrying `label`
    pub fn destinations_by_label(&self, label: &str) -> Result<PostingCursor<'_>> {
        self.label_cursor(&self.destinations_by_label, label)
    }

    /// Ordinals of nodes whose property `name` equals `value` after case folding
    pub fn nodes_by_property(&self, name: &str, value: &str) -> Result<PostingCursor<'_>> {
        let Some(name) = self.property_names().string_to_id(name)? else {
            return Ok(PostingCursor::empty());
        };
        let Some(value) = self.property_values().string_to_id(&fold_value(value))? else {
            return Ok(PostingCursor::empty());
        };
        self.nodes_by_property.cursor(PropertyKey { name, value })
    }

    fn label_cursor<'a>(&'a self, index: &'a LabelIndex, label: &str) -> Result<PostingCursor<'a>> {
        match self.labels().string_to_id(label)? {
            Some(id) => index.cursor(id),
            None => Ok(PostingCursor::empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IngestConfig;
    use crate::loader::{EdgeRow, InMemoryRows, NodeRow, ingest};
    use tempfile::TempDir;

    fn store(nodes: Vec<NodeRow>, edges: Vec<EdgeRow>) -> (TempDir, GraphReader) {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("store");
        let config = IngestConfig {
            temp_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        ingest(&InMemoryRows::new(nodes, edges), &out, &config).unwrap();
        let reader = GraphReader::open(&out).unwrap();
        (dir, reader)
    }

    fn collect(cursor: PostingCursor<'_>) -> Vec<u32> {
        cursor.collect::<Result<Vec<_>>>().unwrap()
    }

    #[test]
    fn test_node_by_id() {
        let (_dir, reader) = store(
            vec![
                NodeRow::new("n1", "Person")
                    .with_property("name", "Ada")
                    .with_property("city", "LONDON"),
                NodeRow::new("n2", "City"),
            ],
            vec![],
        );
        let node = reader.node_by_id("n1").unwrap().unwrap();
        assert_eq!(node.label, "Person");
        assert_eq!(node.ordinal, 0);
        assert_eq!(
            node.properties,
            vec![
                ("name".to_string(), "ada".to_string()),
                ("city".to_string(), "london".to_string())
            ]
        );
        assert_eq!(node.property("city"), Some("london"));
        assert!(reader.node_by_id("n3").unwrap().is_none());
        assert!(reader.node_by_id("N1").unwrap().is_none());
    }

    #[test]
    fn test_node_json_keeps_property_order() {
        let (_dir, reader) = store(
            vec![
                NodeRow::new("n1", "Person")
                    .with_property("zeta", "Z")
                    .with_property("alpha", "A"),
            ],
            vec![],
        );
        let node = reader.node_by_id("n1").unwrap().unwrap();
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(
            json,
            r#"{"id":"n1","ordinal":0,"label":"Person","properties":{"zeta":"z","alpha":"a"}}"#
        );
    }

    #[test]
    fn test_edge_by_id_and_label_cursors() {
        let (_dir, reader) = store(
            vec![
                NodeRow::new("a", "P"),
                NodeRow::new("b", "P"),
                NodeRow::new("c", "P"),
            ],
            vec![
                EdgeRow::new("a", "KNOWS", "b").with_id("e1"),
                EdgeRow::new("c", "KNOWS", "a"),
                EdgeRow::new("b", "LIKES", "c"),
            ],
        );
        let edge = reader.edge_by_id("e1").unwrap().unwrap();
        assert_eq!(
            (edge.label.as_str(), edge.source.as_str(), edge.target.as_str()),
            ("KNOWS", "a", "b")
        );

        let derived = crate::codec::derive_edge_id("c", "KNOWS", "a");
        assert_eq!(reader.edge_by_id(&derived).unwrap().unwrap().ordinal, 1);

        assert_eq!(collect(reader.edges_by_label("KNOWS").unwrap()), vec![0, 1]);
        assert_eq!(collect(reader.sources_by_label("KNOWS").unwrap()), vec![0, 2]);
        assert_eq!(collect(reader.destinations_by_label("KNOWS").unwrap()), vec![0, 1]);
        assert_eq!(collect(reader.edges_by_label("LIKES").unwrap()), vec![2]);
        assert!(collect(reader.edges_by_label("HATES").unwrap()).is_empty());
        assert!(collect(reader.edges_by_label("P").unwrap()).is_empty());
        assert_eq!(reader.edge_id(2).unwrap(), crate::codec::derive_edge_id("b", "LIKES", "c"));
    }

    #[test]
    fn test_nodes_by_property_folds_value() {
        let (_dir, reader) = store(
            vec![
                NodeRow::new("n1", "P").with_property("name", "Ada"),
                NodeRow::new("n2", "P").with_property("name", "ADA"),
                NodeRow::new("n3", "P").with_property("name", "Bob"),
            ],
            vec![],
        );
        assert_eq!(collect(reader.nodes_by_property("name", "aDa").unwrap()), vec![0, 1]);
        assert!(collect(reader.nodes_by_property("Name", "ada").unwrap()).is_empty());
        assert!(collect(reader.nodes_by_property("name", "eve").unwrap()).is_empty());
    }

    #[test]
    fn test_open_missing_store() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            GraphReader::open(dir.path().join("nope")),
            Err(Error::Storage(_))
        ));
        assert!(GraphReader::open(dir.path()).is_err());
    }
}
