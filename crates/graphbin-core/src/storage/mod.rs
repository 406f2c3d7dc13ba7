//! Storage layer - file layout and fixed-width primitives
//!
//! A finished store is a directory of immutable files:
//! - `<entity>.id.str` / `.id.ord2pos` / `.id.lex`: identifier tables for
//!   `nodes` and `edges` (see [`ident`])
//! - `<entity>.rec` / `<entity>.off`: varint records and their u64 offsets
//! - `dict.<kind>.str` / `.lex` / `.ord2pos`: dictionaries, same shape as
//!   the identifier tables
//! - `idx.<name>.pl` / `.dir`: posting lists and their directories
//!
//! Every fixed-width integer is little-endian.

pub mod ident;
pub mod records;

use crate::{Error, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Entity kinds that own an identifier table and a record file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    /// Graph nodes
    Nodes,
    /// Graph edges
    Edges,
}

impl EntityKind {
    fn prefix(self) -> &'static str {
        match self {
            EntityKind::Nodes => "nodes",
            EntityKind::Edges => "edges",
        }
    }
}

/// The three independent dictionaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DictionaryKind {
    /// Node and edge labels
    Labels,
    /// Property names
    PropertyNames,
    /// Case-folded property values
    PropertyValues,
}

impl DictionaryKind {
    fn file_stem(self) -> &'static str {
        match self {
            DictionaryKind::Labels => "labels",
            DictionaryKind::PropertyNames => "propname",
            DictionaryKind::PropertyValues => "propval",
        }
    }
}

/// The four inverted indexes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// label id -> edge ordinals
    EdgesByLabel,
    /// label id -> source node ordinals
    SourcesByLabel,
    /// label id -> destination node ordinals
    DestinationsByLabel,
    /// (property name id, property value id) -> node ordinals
    NodesByProperty,
}

impl IndexKind {
    fn file_stem(self) -> &'static str {
        match self {
            IndexKind::EdgesByLabel => "edgesByLabel",
            IndexKind::SourcesByLabel => "srcByLabel",
            IndexKind::DestinationsByLabel => "dstByLabel",
            IndexKind::NodesByProperty => "nodesByProp",
        }
    }
}

/// Paths of one string table (identifier table or dictionary)
#[derive(Debug, Clone)]
pub struct StringTablePaths {
    /// Concatenated UTF-8 bytes
    pub blob: PathBuf,
    /// (u32 offset, u32 length) per ordinal
    pub ord2pos: PathBuf,
    /// (u32 offset, u32 length, u32 ordinal) sorted by content
    pub lex: PathBuf,
}

/// Paths of one record file pair
#[derive(Debug, Clone)]
pub struct RecordPaths {
    /// Concatenated varint records
    pub records: PathBuf,
    /// u64 byte offset per ordinal
    pub offsets: PathBuf,
}

/// Paths of one posting-list index
#[derive(Debug, Clone)]
pub struct IndexPaths {
    /// Delta + varint posting lists
    pub postings: PathBuf,
    /// Fixed-width directory sorted by key
    pub directory: PathBuf,
}

/// Resolves every file name of a store rooted at one directory
#[derive(Debug, Clone)]
pub struct StoreLayout {
    root: PathBuf,
}

impl StoreLayout {
    /// Layout rooted at `root`; nothing is touched on disk
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Store directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Identifier table of an entity kind
    pub fn ident(&self, kind: EntityKind) -> StringTablePaths {
        let p = kind.prefix();
        StringTablePaths {
            blob: self.root.join(format!("{p}.id.str")),
            ord2pos: self.root.join(format!("{p}.id.ord2pos")),
            lex: self.root.join(format!("{p}.id.lex")),
        }
    }

    /// Record blob and offset table of an entity kind
    pub fn records(&self, kind: EntityKind) -> RecordPaths {
        let p = kind.prefix();
        RecordPaths {
            records: self.root.join(format!("{p}.rec")),
            offsets: self.root.join(format!("{p}.off")),
        }
    }

    /// Dictionary files
    pub fn dictionary(&self, kind: DictionaryKind) -> StringTablePaths {
        let s = kind.file_stem();
        StringTablePaths {
            blob: self.root.join(format!("dict.{s}.str")),
            ord2pos: self.root.join(format!("dict.{s}.ord2pos")),
            lex: self.root.join(format!("dict.{s}.lex")),
        }
    }

    /// Posting list and directory of an index
    pub fn index(&self, kind: IndexKind) -> IndexPaths {
        let s = kind.file_stem();
        IndexPaths {
            postings: self.root.join(format!("idx.{s}.pl")),
            directory: self.root.join(format!("idx.{s}.dir")),
        }
    }
}

/// Read-only memory-mapped store file
///
/// Zero-length files are kept unmapped and read as an empty slice.
pub struct MappedFile {
    path: PathBuf,
    mmap: Option<Mmap>,
}

impl MappedFile {
    /// Map an existing file
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)
            .map_err(|e| Error::storage(format!("failed to open {}: {}", path.display(), e)))?;
        let len = file.metadata()?.len();

        let mmap = if len == 0 {
            None
        } else {
            // SAFETY: store files are never modified once ingestion has finished.
            Some(unsafe { Mmap::map(&file)? })
        };

        Ok(Self { path, mmap })
    }

    /// Whole file contents
    pub fn bytes(&self) -> &[u8] {
        self.mmap.as_deref().unwrap_or(&[])
    }

    /// File length in bytes
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    /// True for a zero-length file
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Path the file was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Bounds-checked slice
    pub fn slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let end = offset.checked_add(len).filter(|&end| end <= self.len());
        match end {
            Some(end) => Ok(&self.bytes()[offset..end]),
            None => Err(Error::corrupt(format!(
                "read beyond end of {}: offset={}, len={}, file_size={}",
                self.path.display(),
                offset,
                len,
                self.len()
            ))),
        }
    }

    /// Little-endian u32 at `offset`
    pub fn read_u32(&self, offset: usize) -> Result<u32> {
        let b = self.slice(offset, 4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Little-endian u64 at `offset`
    pub fn read_u64(&self, offset: usize) -> Result<u64> {
        let b = self.slice(offset, 8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(b);
        Ok(u64::from_le_bytes(buf))
    }

    /// Number of `width`-byte entries; fails if the file is not a whole multiple
    pub fn entry_count(&self, width: usize) -> Result<usize> {
        if self.len() % width != 0 {
            return Err(Error::corrupt(format!(
                "{} has length {} which is not a multiple of its {}-byte entries",
                self.path.display(),
                self.len(),
                width
            )));
        }
        Ok(self.len() / width)
    }
}

/// Write a little-endian u32
pub(crate) fn write_u32<W: Write>(out: &mut W, value: u32) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Write a little-endian u64
pub(crate) fn write_u64<W: Write>(out: &mut W, value: u64) -> Result<()> {
    out.write_all(&value.to_le_bytes())?;
    Ok(())
}

/// Narrow a size or offset to the u32 fields of the on-disk layout
pub(crate) fn checked_u32(value: u64, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| Error::storage(format!("{what} {value} exceeds the u32 range of the layout")))
}
