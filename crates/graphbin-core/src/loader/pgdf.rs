//! PGDF row reader
//!
//! PGDF is line-oriented, pipe-delimited text. A line starting with `@` is
//! a header naming the columns of the data lines that follow it:
//!
//! ```text
//! @id|@label|name|age
//! n1|Person|Ada|36
//!
//! @id|@label|@dir|@out|@in
//! e1|KNOWS|T|n1|n2
//! ```
//!
//! Node files reserve `@id` and `@label`; every other column is a property.
//! Edge files reserve `@id` (optional), `@label`, `@dir`, `@out` and `@in`.

use crate::codec::derive_edge_id;
use crate::{Error, Result};
use std::borrow::Cow;
use std::io::BufRead;

/// Direction marker of an explicitly directed edge
pub const FORWARD: &str = "T";

/// One node row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    /// External node identifier
    pub id: String,
    /// Node label
    pub label: String,
    /// Properties in header order, values as written
    pub properties: Vec<(String, String)>,
}

impl NodeRow {
    /// Row without properties
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property; a repeated name replaces the value in place
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_property(name.into(), value.into());
        self
    }

    fn set_property(&mut self, name: String, value: String) {
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.properties.push((name, value)),
        }
    }
}

/// One edge row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRow {
    /// External edge identifier; derived from the endpoints when absent
    pub id: Option<String>,
    /// Edge label
    pub label: String,
    /// Direction marker, [`FORWARD`] unless stated otherwise
    pub direction: String,
    /// Source node id (`@out`)
    pub source: String,
    /// Destination node id (`@in`)
    pub target: String,
}

impl EdgeRow {
    /// Forward edge without an explicit id
    pub fn new(
        source: impl Into<String>,
        label: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            label: label.into(),
            direction: FORWARD.to_string(),
            source: source.into(),
            target: target.into(),
        }
    }

    /// Set the explicit edge id
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set the direction marker
    pub fn with_direction(mut self, direction: impl Into<String>) -> Self {
        self.direction = direction.into();
        self
    }

    /// True when the edge is explicitly directed
    pub fn is_forward(&self) -> bool {
        self.direction.eq_ignore_ascii_case(FORWARD)
    }

    /// True when label or an endpoint is empty
    pub fn is_incomplete(&self) -> bool {
        self.label.is_empty() || self.source.is_empty() || self.target.is_empty()
    }

    /// The explicit id, or the id derived from `(source, label, target)`
    pub fn resolved_id(&self) -> Cow<'_, str> {
        match self.id.as_deref() {
            Some(id) if !id.is_empty() => Cow::Borrowed(id),
            _ => Cow::Owned(derive_edge_id(&self.source, &self.label, &self.target)),
        }
    }
}

/// Rows seen by one scan of a source
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    /// Rows handed to the callback
    pub emitted: u64,
    /// Data lines dropped as malformed
    pub dropped: u64,
}

/// Stream node rows from PGDF text
pub fn read_nodes<R: BufRead>(
    reader: R,
    on_row: &mut dyn FnMut(&NodeRow) -> Result<()>,
) -> Result<ScanSummary> {
    scan_lines(reader, |header, fields| {
        let mut row = NodeRow::new(String::new(), String::new());
        for (column, value) in header.iter().zip(fields) {
            match column.as_str() {
                "@id" => row.id = value.trim().to_string(),
                "@label" => row.label = value.trim().to_string(),
                _ => row.set_property(column.clone(), (*value).to_string()),
            }
        }
        if row.id.is_empty() || row.label.is_empty() {
            return Ok(false);
        }
        on_row(&row)?;
        Ok(true)
    })
}

/// Stream edge rows from PGDF text
pub fn read_edges<R: BufRead>(
    reader: R,
    on_row: &mut dyn FnMut(&EdgeRow) -> Result<()>,
) -> Result<ScanSummary> {
    scan_lines(reader, |header, fields| {
        let field = |name: &str| -> Option<String> {
            header
                .iter()
                .zip(fields)
                .rev()
                .find(|(column, _)| *column == name)
                .map(|(_, value)| value.trim().to_string())
        };

        let row = EdgeRow {
            id: field("@id").filter(|id| !id.is_empty()),
            label: field("@label").unwrap_or_default(),
            direction: field("@dir").unwrap_or_else(|| FORWARD.to_string()),
            source: field("@out").unwrap_or_default(),
            target: field("@in").unwrap_or_default(),
        };
        if row.is_incomplete() {
            return Ok(false);
        }
        on_row(&row)?;
        Ok(true)
    })
}

/// Walk the lines of a PGDF document, handing each data line to `on_record`
/// together with the header in force. The callback reports whether the line
/// produced a row.
fn scan_lines<R, F>(mut reader: R, mut on_record: F) -> Result<ScanSummary>
where
    R: BufRead,
    F: FnMut(&[String], &[&str]) -> Result<bool>,
{
    let mut summary = ScanSummary::default();
    let mut header: Option<Vec<String>> = None;
    let mut line = String::new();
    let mut line_no = 0u64;

    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| Error::input(format!("line {}: {}", line_no + 1, e)))?;
        if read == 0 {
            break;
        }
        line_no += 1;

        let text = line.strip_suffix('\n').unwrap_or(&line);
        let text = text.strip_suffix('\r').unwrap_or(text);
        if text.trim().is_empty() {
            continue;
        }
        if text.starts_with('@') {
            header = Some(parse_header(text));
            continue;
        }
        let Some(columns) = header.as_deref() else {
            continue;
        };

        let fields: Vec<&str> = text.split('|').collect();
        if on_record(columns, &fields)? {
            summary.emitted += 1;
        } else {
            summary.dropped += 1;
        }
    }

    Ok(summary)
}

fn parse_header(text: &str) -> Vec<String> {
    let mut columns: Vec<String> = text.split('|').map(|c| c.trim().to_string()).collect();
    while columns.last().is_some_and(|c| c.is_empty()) {
        columns.pop();
    }
    columns
}
