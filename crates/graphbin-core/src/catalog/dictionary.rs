//! Dictionary encoding
//!
//! A dictionary assigns every distinct string its rank in byte order, so id
//! 0 is the smallest string. The files use the string-table shape from
//! [`crate::storage::ident`]; because ids are ranks, `.ord2pos` and `.lex`
//! list the same entries in the same order.

use crate::codec::compare_utf8;
use crate::storage::ident::{Span, StringTable, write_arrival_index, write_lex_index};
use crate::storage::{DictionaryKind, StringTablePaths, checked_u32};
use crate::Result;
use std::fs::File;
use std::io::{BufWriter, Write};

/// Sort, deduplicate and write `values` as a dictionary; returns the number of entries
pub fn write_dictionary(
    paths: &StringTablePaths,
    mut values: Vec<String>,
    buffer_capacity: usize,
) -> Result<usize> {
    values.sort_unstable_by(|a, b| compare_utf8(a.as_bytes(), b.as_bytes()));
    values.dedup();

    let mut blob = Vec::with_capacity(values.iter().map(String::len).sum());
    let mut spans = Vec::with_capacity(values.len());
    for value in &values {
        spans.push(Span {
            offset: checked_u32(blob.len() as u64, "dictionary blob offset")?,
            len: checked_u32(value.len() as u64, "dictionary entry length")?,
        });
        blob.extend_from_slice(value.as_bytes());
    }

    let mut out = BufWriter::with_capacity(buffer_capacity, File::create(&paths.blob)?);
    out.write_all(&blob)?;
    out.flush()?;

    write_arrival_index(&paths.ord2pos, &spans, buffer_capacity)?;
    write_lex_index(&paths.lex, &blob, &spans, buffer_capacity)?;
    Ok(values.len())
}

/// Read side of one dictionary
pub struct Dictionary {
    kind: DictionaryKind,
    table: StringTable,
}

impl Dictionary {
    /// Map a dictionary's files
    pub fn open(kind: DictionaryKind, paths: &StringTablePaths) -> Result<Self> {
        Ok(Self {
            kind,
            table: StringTable::open(paths)?,
        })
    }

    /// Which dictionary this is
    pub fn kind(&self) -> DictionaryKind {
        self.kind
    }

    /// Id of `value`, by binary search; `None` when not a member
    pub fn string_to_id(&self, value: &str) -> Result<Option<u32>> {
        self.table.lookup(value)
    }

    /// String with id `id`, by direct fixed-width lookup
    pub fn id_to_string(&self, id: u32) -> Result<&str> {
        self.table.get(id)
    }

    /// Number of distinct strings
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// True for an empty dictionary
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}
