//! String tables: identifier tables and the storage shape of dictionaries.
//!
//! A table is three files:
//! - `.str`: UTF-8 bytes, concatenated in ordinal order
//! - `.ord2pos`: `(u32 offset, u32 length)` indexed by ordinal
//! - `.lex`: `(u32 offset, u32 length, u32 ordinal)` sorted by the bytes
//!   they point at, using [`compare_utf8`]
//!
//! String -> ordinal is a binary search over `.lex`; ordinal -> string is a
//! direct fixed-width read of `.ord2pos`.

use super::{MappedFile, StringTablePaths, checked_u32, write_u32};
use crate::codec::compare_utf8;
use crate::{Error, Result};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Width of one `.ord2pos` entry
pub const ORD2POS_ENTRY_SIZE: usize = 8;

/// Width of one `.lex` entry
pub const LEX_ENTRY_SIZE: usize = 12;

/// Location of one string inside a `.str` blob
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    /// Byte offset into the blob
    pub offset: u32,
    /// Byte length
    pub len: u32,
}

impl Span {
    fn range(self) -> std::ops::Range<usize> {
        let start = self.offset as usize;
        start..start + self.len as usize
    }
}

/// Append-only writer for an identifier table
///
/// Identifiers are assigned dense arrival ordinals. A repeated identifier is
/// rejected so every ordinal maps to a distinct string.
pub struct IdentTableWriter {
    paths: StringTablePaths,
    blob: BufWriter<File>,
    spans: Vec<Span>,
    seen: HashSet<Box<str>>,
    next_offset: u64,
    buffer_capacity: usize,
}

impl IdentTableWriter {
    /// Create (truncating) the `.str` blob
    pub fn create(paths: StringTablePaths, buffer_capacity: usize) -> Result<Self> {
        let blob = BufWriter::with_capacity(buffer_capacity, File::create(&paths.blob)?);
        Ok(Self {
            paths,
            blob,
            spans: Vec::new(),
            seen: HashSet::new(),
            next_offset: 0,
            buffer_capacity,
        })
    }

    /// Append an identifier, returning its ordinal, or `None` if it was already present
    pub fn append(&mut self, id: &str) -> Result<Option<u32>> {
        if self.seen.contains(id) {
            return Ok(None);
        }
        let ordinal = checked_u32(self.spans.len() as u64, "identifier ordinal")?;
        let offset = checked_u32(self.next_offset, "identifier blob offset")?;
        let len = checked_u32(id.len() as u64, "identifier length")?;

        self.blob.write_all(id.as_bytes())?;
        self.spans.push(Span { offset, len });
        self.seen.insert(id.into());
        self.next_offset += id.len() as u64;
        Ok(Some(ordinal))
    }

    /// Number of identifiers appended so far
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// True when nothing has been appended
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Flush the blob and write the arrival index
    pub fn finish_arrival(&mut self) -> Result<()> {
        self.blob.flush()?;
        write_arrival_index(&self.paths.ord2pos, &self.spans, self.buffer_capacity)
    }

    /// Build the lexicographic index, consuming the writer
    ///
    /// Loads the whole blob back into memory, so peak memory is bounded by
    /// the total identifier bytes. The duplicate check in [`append`](Self::append)
    /// holds a second copy of every identifier until the writer is consumed.
    pub fn build_lex(self) -> Result<usize> {
        let Self {
            paths,
            blob,
            spans,
            buffer_capacity,
            ..
        } = self;
        drop(blob.into_inner().map_err(|e| e.into_error())?);

        let bytes = std::fs::read(&paths.blob)?;
        write_lex_index(&paths.lex, &bytes, &spans, buffer_capacity)?;
        Ok(spans.len())
    }
}

/// Write `(offset, length)` per ordinal
pub fn write_arrival_index(path: &Path, spans: &[Span], buffer_capacity: usize) -> Result<()> {
    let mut out = BufWriter::with_capacity(buffer_capacity, File::create(path)?);
    for span in spans {
        write_u32(&mut out, span.offset)?;
        write_u32(&mut out, span.len)?;
    }
    out.flush()?;
    Ok(())
}

/// Write `(offset, length, ordinal)` for every span, sorted by the bytes each
/// span covers in `blob`
///
/// Equal strings keep ascending ordinal order so the output is deterministic.
pub fn write_lex_index(
    path: &Path,
    blob: &[u8],
    spans: &[Span],
    buffer_capacity: usize,
) -> Result<()> {
    if let Some(bad) = spans.iter().find(|s| s.range().end > blob.len()) {
        return Err(Error::corrupt(format!(
            "span {:?} lies outside a {}-byte string blob",
            bad,
            blob.len()
        )));
    }

    let mut ordinals: Vec<u32> = (0..checked_u32(spans.len() as u64, "table size")?).collect();
    ordinals.sort_unstable_by(|&a, &b| {
        let sa = &blob[spans[a as usize].range()];
        let sb = &blob[spans[b as usize].range()];
        compare_utf8(sa, sb).then(a.cmp(&b))
    });

    let mut out = BufWriter::with_capacity(buffer_capacity, File::create(path)?);
    for ordinal in ordinals {
        let span = spans[ordinal as usize];
        write_u32(&mut out, span.offset)?;
        write_u32(&mut out, span.len)?;
        write_u32(&mut out, ordinal)?;
    }
    out.flush()?;
    Ok(())
}

/// Read side of a string table
pub struct StringTable {
    blob: MappedFile,
    ord2pos: MappedFile,
    lex: MappedFile,
    len: usize,
}

impl StringTable {
    /// Map the three files of a table and check their sizes agree
    pub fn open(paths: &StringTablePaths) -> Result<Self> {
        let blob = MappedFile::open(&paths.blob)?;
        let ord2pos = MappedFile::open(&paths.ord2pos)?;
        let lex = MappedFile::open(&paths.lex)?;

        let len = ord2pos.entry_count(ORD2POS_ENTRY_SIZE)?;
        let lex_len = lex.entry_count(LEX_ENTRY_SIZE)?;
        if len != lex_len {
            return Err(Error::corrupt(format!(
                "{} has {} entries but {} has {}",
                ord2pos.path().display(),
                len,
                lex.path().display(),
                lex_len
            )));
        }

        Ok(Self {
            blob,
            ord2pos,
            lex,
            len,
        })
    }

    /// Number of strings
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for an empty table
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// String stored at `ordinal`
    pub fn get(&self, ordinal: u32) -> Result<&str> {
        let index = ordinal as usize;
        if index >= self.len {
            return Err(Error::corrupt(format!(
                "ordinal {} out of range for {} ({} entries)",
                ordinal,
                self.ord2pos.path().display(),
                self.len
            )));
        }
        let base = index * ORD2POS_ENTRY_SIZE;
        let span = Span {
            offset: self.ord2pos.read_u32(base)?,
            len: self.ord2pos.read_u32(base + 4)?,
        };
        self.span_str(span)
    }

    /// Ordinal of `value`, or `None` when absent
    pub fn lookup(&self, value: &str) -> Result<Option<u32>> {
        let target = value.as_bytes();
        let (mut lo, mut hi) = (0usize, self.len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let (span, ordinal) = self.lex_entry(mid)?;
            let current = self.blob.slice(span.offset as usize, span.len as usize)?;
            match compare_utf8(current, target) {
                Ordering::Equal => return Ok(Some(ordinal)),
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    fn lex_entry(&self, position: usize) -> Result<(Span, u32)> {
        let base = position * LEX_ENTRY_SIZE;
        let span = Span {
            offset: self.lex.read_u32(base)?,
            len: self.lex.read_u32(base + 4)?,
        };
        Ok((span, self.lex.read_u32(base + 8)?))
    }

    fn span_str(&self, span: Span) -> Result<&str> {
        let bytes = self.blob.slice(span.offset as usize, span.len as usize)?;
        std::str::from_utf8(bytes).map_err(|e| {
            Error::corrupt(format!(
                "invalid UTF-8 in {} at offset {}: {}",
                self.blob.path().display(),
                span.offset,
                e
            ))
        })
    }
}
