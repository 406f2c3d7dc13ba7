//! Record files: a blob of varint records plus a u64 offset per ordinal

use super::{MappedFile, RecordPaths, checked_u32, write_u64};
use crate::codec::read_unsigned;
use crate::{Error, Result};
use std::fs::File;
use std::io::{BufWriter, Write};

/// Width of one `.off` entry
pub const OFFSET_ENTRY_SIZE: usize = 8;

/// Appends records in ordinal order
pub struct RecordWriter {
    records: BufWriter<File>,
    offsets: BufWriter<File>,
    next_offset: u64,
    count: u32,
}

impl RecordWriter {
    /// Create (truncating) both files
    pub fn create(paths: &RecordPaths, buffer_capacity: usize) -> Result<Self> {
        Ok(Self {
            records: BufWriter::with_capacity(buffer_capacity, File::create(&paths.records)?),
            offsets: BufWriter::with_capacity(buffer_capacity, File::create(&paths.offsets)?),
            next_offset: 0,
            count: 0,
        })
    }

    /// Append one encoded record, returning its ordinal
    pub fn append(&mut self, record: &[u8]) -> Result<u32> {
        let ordinal = self.count;
        write_u64(&mut self.offsets, self.next_offset)?;
        self.records.write_all(record)?;
        self.next_offset += record.len() as u64;
        self.count = checked_u32(u64::from(self.count) + 1, "record count")?;
        Ok(ordinal)
    }

    /// Records appended so far
    pub fn len(&self) -> u32 {
        self.count
    }

    /// True when nothing was appended
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Flush both files
    pub fn finish(mut self) -> Result<u32> {
        self.records.flush()?;
        self.offsets.flush()?;
        Ok(self.count)
    }
}

/// Read side of a record file pair
pub struct RecordTable {
    records: MappedFile,
    offsets: MappedFile,
    len: usize,
}

impl RecordTable {
    /// Map both files
    pub fn open(paths: &RecordPaths) -> Result<Self> {
        let records = MappedFile::open(&paths.records)?;
        let offsets = MappedFile::open(&paths.offsets)?;
        let len = offsets.entry_count(OFFSET_ENTRY_SIZE)?;
        Ok(Self {
            records,
            offsets,
            len,
        })
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when there are no records
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Bytes of the record at `ordinal`, bounded by the next record's offset
    pub fn record(&self, ordinal: u32) -> Result<&[u8]> {
        let index = ordinal as usize;
        if index >= self.len {
            return Err(Error::corrupt(format!(
                "record {} out of range for {} ({} records)",
                ordinal,
                self.offsets.path().display(),
                self.len
            )));
        }
        let start = self.offset(index)?;
        let end = if index + 1 < self.len {
            self.offset(index + 1)?
        } else {
            self.records.len()
        };
        if end < start {
            return Err(Error::corrupt(format!(
                "record {} of {} ends before it starts",
                ordinal,
                self.records.path().display()
            )));
        }
        self.records.slice(start, end - start)
    }

    /// Decoder positioned at the start of a record
    pub fn decoder(&self, ordinal: u32) -> Result<RecordDecoder<'_>> {
        Ok(RecordDecoder {
            bytes: self.record(ordinal)?,
            pos: 0,
        })
    }

    fn offset(&self, index: usize) -> Result<usize> {
        let raw = self.offsets.read_u64(index * OFFSET_ENTRY_SIZE)?;
        usize::try_from(raw).map_err(|_| Error::corrupt(format!("record offset {raw} overflows")))
    }
}

/// Sequential varint reader over one record
pub struct RecordDecoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl RecordDecoder<'_> {
    /// Next field as u64
    pub fn next_u64(&mut self) -> Result<u64> {
        read_unsigned(self.bytes, &mut self.pos)
    }

    /// Next field, which must fit a u32 id or ordinal
    pub fn next_u32(&mut self) -> Result<u32> {
        let value = self.next_u64()?;
        u32::try_from(value).map_err(|_| Error::corrupt(format!("record field {value} exceeds u32")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_unsigned;
    use crate::storage::{EntityKind, StoreLayout};
    use tempfile::TempDir;

    fn encode(fields: &[u64]) -> Vec<u8> {
        let mut buf = Vec::new();
        for &f in fields {
            encode_unsigned(f, &mut buf);
        }
        buf
    }

    #[test]
    fn test_write_and_decode_records() {
        let dir = TempDir::new().unwrap();
        let paths = StoreLayout::new(dir.path()).records(EntityKind::Edges);
        let mut writer = RecordWriter::create(&paths, 32).unwrap();
        assert_eq!(writer.append(&encode(&[3, 0, 1])).unwrap(), 0);
        assert_eq!(writer.append(&encode(&[1, 70_000, 2])).unwrap(), 1);
        assert_eq!(writer.finish().unwrap(), 2);

        let offsets = std::fs::read(&paths.offsets).unwrap();
        assert_eq!(&offsets[8..16], &3u64.to_le_bytes());

        let table = RecordTable::open(&paths).unwrap();
        assert_eq!(table.len(), 2);
        let mut d = table.decoder(1).unwrap();
        assert_eq!(d.next_u32().unwrap(), 1);
        assert_eq!(d.next_u32().unwrap(), 70_000);
        assert_eq!(d.next_u32().unwrap(), 2);
        assert!(d.next_u32().is_err());
    }

    #[test]
    fn test_out_of_range_record() {
        let dir = TempDir::new().unwrap();
        let paths = StoreLayout::new(dir.path()).records(EntityKind::Nodes);
        RecordWriter::create(&paths, 32).unwrap().finish().unwrap();
        let table = RecordTable::open(&paths).unwrap();
        assert!(table.is_empty());
        assert!(matches!(table.record(0), Err(Error::Corrupt(_))));
    }
}
