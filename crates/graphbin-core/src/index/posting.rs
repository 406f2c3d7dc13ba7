//! Posting-list indexes
//!
//! Built from a spool of `(key, member)` pairs. Members of each key are
//! sorted ascending and deduplicated, then written to `.pl` as the first
//! value followed by successive deltas, all varint-encoded. The `.dir` file
//! holds one fixed-width entry per key, sorted by key:
//!
//! ```text
//! key (4 or 8 bytes) | u64 offset into .pl | u32 member count
//! ```

use crate::codec::{read_unsigned, write_unsigned};
use crate::storage::{IndexPaths, MappedFile, write_u32, write_u64};
use crate::{Error, Result};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::marker::PhantomData;
use std::path::Path;
use tempfile::NamedTempFile;

/// Fixed-width key of a posting-list directory
pub trait PostingKey: Copy + Ord + fmt::Debug {
    /// Encoded width in bytes
    const WIDTH: usize;

    /// Append the little-endian encoding
    fn write_to<W: Write>(&self, out: &mut W) -> Result<()>;

    /// Decode from exactly [`Self::WIDTH`] bytes
    fn read_from(bytes: &[u8]) -> Self;
}

/// Key of the label indexes: a label dictionary id
pub type LabelKey = u32;

impl PostingKey for LabelKey {
    const WIDTH: usize = 4;

    fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_u32(out, *self)
    }

    fn read_from(bytes: &[u8]) -> Self {
        u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Key of the property index: (property name id, property value id)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PropertyKey {
    /// Property-name dictionary id
    pub name: u32,
    /// Property-value dictionary id
    pub value: u32,
}

impl PostingKey for PropertyKey {
    const WIDTH: usize = 8;

    fn write_to<W: Write>(&self, out: &mut W) -> Result<()> {
        write_u32(out, self.name)?;
        write_u32(out, self.value)
    }

    fn read_from(bytes: &[u8]) -> Self {
        Self {
            name: LabelKey::read_from(&bytes[0..4]),
            value: LabelKey::read_from(&bytes[4..8]),
        }
    }
}

/// Disk-backed queue of `(key, member)` pairs awaiting indexing
pub struct PairSpool<K: PostingKey> {
    out: BufWriter<NamedTempFile>,
    pairs: u64,
    _key: PhantomData<K>,
}

impl<K: PostingKey> PairSpool<K> {
    /// Spool into an already-created staging file
    pub fn new(file: NamedTempFile, buffer_capacity: usize) -> Self {
        Self {
            out: BufWriter::with_capacity(buffer_capacity, file),
            pairs: 0,
            _key: PhantomData,
        }
    }

    /// Queue one pair
    pub fn push(&mut self, key: K, member: u32) -> Result<()> {
        key.write_to(&mut self.out)?;
        write_u32(&mut self.out, member)?;
        self.pairs += 1;
        Ok(())
    }

    /// Pairs queued so far
    pub fn len(&self) -> u64 {
        self.pairs
    }

    /// True when nothing was queued
    pub fn is_empty(&self) -> bool {
        self.pairs == 0
    }

    fn into_file(self) -> Result<NamedTempFile> {
        self.out.into_inner().map_err(|e| Error::Io(e.into_error()))
    }
}

/// Outcome of building one index
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PostingSummary {
    /// Directory entries written
    pub keys: usize,
    /// Members written across all lists
    pub members: usize,
}

/// Group a spool by key and write `.pl` + `.dir`; the spool file is deleted afterwards
///
/// Grouping happens in memory, so peak memory is proportional to the
/// number of spooled pairs.
// TODO: spill sorted runs and k-way merge them once the spool outgrows memory.
pub fn build_posting_index<K: PostingKey>(
    spool: PairSpool<K>,
    paths: &IndexPaths,
    buffer_capacity: usize,
) -> Result<PostingSummary> {
    let file = spool.into_file()?;
    let mut pairs = read_pairs::<K>(file.path())?;
    file.close()?;

    pairs.sort_unstable();
    pairs.dedup();
    write_postings(&pairs, paths, buffer_capacity)
}

fn read_pairs<K: PostingKey>(path: &Path) -> Result<Vec<(K, u32)>> {
    let bytes = std::fs::read(path)?;
    let width = K::WIDTH + 4;
    if bytes.len() % width != 0 {
        return Err(Error::corrupt(format!(
            "pair spool {} ends mid-entry ({} bytes, {}-byte pairs)",
            path.display(),
            bytes.len(),
            width
        )));
    }
    Ok(bytes
        .chunks_exact(width)
        .map(|chunk| {
            let key = K::read_from(&chunk[..K::WIDTH]);
            let member = LabelKey::read_from(&chunk[K::WIDTH..]);
            (key, member)
        })
        .collect())
}

/// Write sorted, deduplicated pairs as posting lists and a directory
fn write_postings<K: PostingKey>(
    pairs: &[(K, u32)],
    paths: &IndexPaths,
    buffer_capacity: usize,
) -> Result<PostingSummary> {
    let mut pl = BufWriter::with_capacity(buffer_capacity, File::create(&paths.postings)?);
    let mut dir = BufWriter::with_capacity(buffer_capacity, File::create(&paths.directory)?);

    let mut summary = PostingSummary::default();
    let mut offset = 0u64;

    for group in pairs.chunk_by(|a, b| a.0 == b.0) {
        let key = group[0].0;
        let start = offset;

        let mut prev = group[0].1;
        offset += write_unsigned(&mut pl, u64::from(prev))? as u64;
        for &(_, member) in &group[1..] {
            offset += write_unsigned(&mut pl, u64::from(member - prev))? as u64;
            prev = member;
        }

        let count = u32::try_from(group.len())
            .map_err(|_| Error::storage(format!("posting list for {key:?} exceeds u32 members")))?;
        key.write_to(&mut dir)?;
        write_u64(&mut dir, start)?;
        write_u32(&mut dir, count)?;

        summary.keys += 1;
        summary.members += group.len();
    }

    pl.flush()?;
    dir.flush()?;
    Ok(summary)
}

/// Directory entry of one key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Byte offset of the list in `.pl`
    pub offset: u64,
    /// Number of members
    pub count: u32,
}

/// Read side of a posting-list index
pub struct PostingIndex<K: PostingKey> {
    postings: MappedFile,
    directory: MappedFile,
    keys: usize,
    _key: PhantomData<K>,
}

impl<K: PostingKey> PostingIndex<K> {
    const ENTRY_SIZE: usize = K::WIDTH + 12;

    /// Map an index's files
    pub fn open(paths: &IndexPaths) -> Result<Self> {
        let postings = MappedFile::open(&paths.postings)?;
        let directory = MappedFile::open(&paths.directory)?;
        let keys = directory.entry_count(Self::ENTRY_SIZE)?;
        Ok(Self {
            postings,
            directory,
            keys,
            _key: PhantomData,
        })
    }

    /// Number of keys with a posting list
    pub fn key_count(&self) -> usize {
        self.keys
    }

    /// Binary search the directory for `key`
    pub fn entry(&self, key: K) -> Result<Option<DirectoryEntry>> {
        let (mut lo, mut hi) = (0usize, self.keys);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            let base = mid * Self::ENTRY_SIZE;
            let current = K::read_from(self.directory.slice(base, K::WIDTH)?);
            match current.cmp(&key) {
                std::cmp::Ordering::Equal => {
                    return Ok(Some(DirectoryEntry {
                        offset: self.directory.read_u64(base + K::WIDTH)?,
                        count: self.directory.read_u32(base + K::WIDTH + 8)?,
                    }));
                }
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
            }
        }
        Ok(None)
    }

    /// Members of `key`, ascending; empty when the key is absent
    pub fn cursor(&self, key: K) -> Result<PostingCursor<'_>> {
        match self.entry(key)? {
            None => Ok(PostingCursor::empty()),
            Some(entry) => {
                let start = usize::try_from(entry.offset)
                    .ok()
                    .filter(|&start| start <= self.postings.len())
                    .ok_or_else(|| {
                        Error::corrupt(format!(
                            "posting offset {} beyond {} ({} bytes)",
                            entry.offset,
                            self.postings.path().display(),
                            self.postings.len()
                        ))
                    })?;
                Ok(PostingCursor::new(
                    &self.postings.bytes()[start..],
                    entry.count,
                ))
            }
        }
    }
}

/// Forward-only decoder over one posting list
///
/// Yields exactly the directory's member count. A decode failure is yielded
/// once and ends the iteration.
#[derive(Debug, Clone)]
pub struct PostingCursor<'a> {
    bytes: &'a [u8],
    pos: usize,
    remaining: u32,
    prev: Option<u32>,
}

impl<'a> PostingCursor<'a> {
    /// Cursor over `count` members encoded at the start of `bytes`
    pub fn new(bytes: &'a [u8], count: u32) -> Self {
        Self {
            bytes,
            pos: 0,
            remaining: count,
            prev: None,
        }
    }

    /// Cursor yielding nothing
    pub fn empty() -> Self {
        Self::new(&[], 0)
    }

    /// Members not yet yielded
    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    fn decode_next(&mut self) -> Result<u32> {
        let raw = read_unsigned(self.bytes, &mut self.pos)?;
        let value = match self.prev {
            None => raw,
            Some(prev) => u64::from(prev) + raw,
        };
        let value = u32::try_from(value)
            .map_err(|_| Error::corrupt(format!("posting member {value} exceeds u32")))?;
        if self.prev.is_some() && raw == 0 {
            return Err(Error::corrupt("posting list repeats a member"));
        }
        self.prev = Some(value);
        Ok(value)
    }
}

impl Iterator for PostingCursor<'_> {
    type Item = Result<u32>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        match self.decode_next() {
            Ok(value) => {
                self.remaining -= 1;
                Some(Ok(value))
            }
            Err(e) => {
                self.remaining = 0;
                Some(Err(e))
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining as usize))
    }
}
