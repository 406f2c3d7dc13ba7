//! Staging files passed between pipeline phases
//!
//! Both formats are little-endian and length-prefixed:
//! - node staging: `u32 ordinal | str label | u32 count | (str name, str value)*`
//! - string spool: `str*`
//!
//! where `str` is `u32 byte length | UTF-8 bytes`.

use crate::storage::{checked_u32, write_u32};
use crate::{Error, Result};
use std::io::{BufRead, BufReader, BufWriter, Read, Write};
use tempfile::NamedTempFile;

/// One node as written by the first node pass, before dictionaries exist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedNode {
    /// Arrival ordinal
    pub ordinal: u32,
    /// Label string
    pub label: String,
    /// (name, case-folded value) pairs
    pub properties: Vec<(String, String)>,
}

/// Appends staged nodes to a temporary file
pub struct StagingWriter {
    out: BufWriter<NamedTempFile>,
    count: u64,
}

impl StagingWriter {
    /// Stage into `file`
    pub fn new(file: NamedTempFile, buffer_capacity: usize) -> Self {
        Self {
            out: BufWriter::with_capacity(buffer_capacity, file),
            count: 0,
        }
    }

    /// Append one node
    pub fn write(&mut self, ordinal: u32, label: &str, properties: &[(&str, &str)]) -> Result<()> {
        write_u32(&mut self.out, ordinal)?;
        write_str(&mut self.out, label)?;
        write_u32(&mut self.out, checked_u32(properties.len() as u64, "property count")?)?;
        for (name, value) in properties {
            write_str(&mut self.out, name)?;
            write_str(&mut self.out, value)?;
        }
        self.count += 1;
        Ok(())
    }

    /// Nodes staged so far
    pub fn len(&self) -> u64 {
        self.count
    }

    /// True when nothing was staged
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flush buffered bytes to the file
    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Flush and hand back the file for reading
    pub fn into_reader(self, buffer_capacity: usize) -> Result<StagingReader> {
        let file = self.out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        let input = BufReader::with_capacity(buffer_capacity, file.reopen()?);
        Ok(StagingReader { file, input })
    }
}

/// Reads staged nodes back in write order; the file is deleted on [`StagingReader::close`] or drop
pub struct StagingReader {
    file: NamedTempFile,
    input: BufReader<std::fs::File>,
}

impl StagingReader {
    /// Next staged node, or `None` at end of file
    pub fn next_node(&mut self) -> Result<Option<StagedNode>> {
        if self.input.fill_buf()?.is_empty() {
            return Ok(None);
        }
        let ordinal = read_u32(&mut self.input)?;
        let label = read_str(&mut self.input)?;
        let count = read_u32(&mut self.input)?;
        let mut properties = Vec::with_capacity(count.min(1024) as usize);
        for _ in 0..count {
            let name = read_str(&mut self.input)?;
            let value = read_str(&mut self.input)?;
            properties.push((name, value));
        }
        Ok(Some(StagedNode {
            ordinal,
            label,
            properties,
        }))
    }

    /// Delete the staging file
    pub fn close(self) -> Result<()> {
        drop(self.input);
        self.file.close()?;
        Ok(())
    }
}

/// Temporary list of strings, one entry per occurrence
pub struct StringSpool {
    out: BufWriter<NamedTempFile>,
    count: u64,
}

impl StringSpool {
    /// Spool into `file`
    pub fn new(file: NamedTempFile, buffer_capacity: usize) -> Self {
        Self {
            out: BufWriter::with_capacity(buffer_capacity, file),
            count: 0,
        }
    }

    /// Append one string
    pub fn push(&mut self, value: &str) -> Result<()> {
        write_str(&mut self.out, value)?;
        self.count += 1;
        Ok(())
    }

    /// Entries spooled so far
    pub fn len(&self) -> u64 {
        self.count
    }

    /// True when nothing was spooled
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Read every entry back and delete the file
    pub fn drain(self, buffer_capacity: usize) -> Result<Vec<String>> {
        let file = self.out.into_inner().map_err(|e| Error::Io(e.into_error()))?;
        let mut input = BufReader::with_capacity(buffer_capacity, file.reopen()?);
        let mut values = Vec::with_capacity(self.count.min(1 << 20) as usize);
        while !input.fill_buf()?.is_empty() {
            values.push(read_str(&mut input)?);
        }
        drop(input);
        file.close()?;
        Ok(values)
    }
}

fn write_str<W: Write>(out: &mut W, value: &str) -> Result<()> {
    write_u32(out, checked_u32(value.len() as u64, "staged string length")?)?;
    out.write_all(value.as_bytes())?;
    Ok(())
}

fn read_u32<R: Read>(input: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    input
        .read_exact(&mut buf)
        .map_err(|e| Error::corrupt(format!("truncated staging file: {e}")))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_str<R: Read>(input: &mut R) -> Result<String> {
    let len = read_u32(input)? as usize;
    let mut bytes = vec![0u8; len];
    input
        .read_exact(&mut bytes)
        .map_err(|e| Error::corrupt(format!("truncated staging file: {e}")))?;
    String::from_utf8(bytes).map_err(|e| Error::corrupt(format!("invalid UTF-8 in staging file: {e}")))
}
