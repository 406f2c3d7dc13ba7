//! Byte-level codecs shared by every store file.
//!
//! - Unsigned LEB128 varints (7 bits per byte, low group first, continuation
//!   bit on every byte but the last)
//! - The canonical byte comparator that orders dictionaries and
//!   lexicographic indexes
//! - The deterministic edge id derivation used when an edge row carries no
//!   `@id`

use crate::error::{Error, Result};
use std::cmp::Ordering;
use std::io::{self, Write};

/// A u64 never needs more than 10 groups of 7 bits.
pub const MAX_VARINT_BYTES: usize = 10;

/// Append the varint encoding of `value` to `buf`.
pub fn encode_unsigned(mut value: u64, buf: &mut Vec<u8>) {
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

/// Write the varint encoding of `value`, returning the number of bytes written.
pub fn write_unsigned<W: Write>(out: &mut W, value: u64) -> io::Result<usize> {
    let mut scratch = [0u8; MAX_VARINT_BYTES];
    let mut value = value;
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            scratch[len] = byte;
            len += 1;
            break;
        }
        scratch[len] = byte | 0x80;
        len += 1;
    }
    out.write_all(&scratch[..len])?;
    Ok(len)
}

/// Number of bytes [`encode_unsigned`] emits for `value`.
pub fn encoded_len(mut value: u64) -> usize {
    let mut n = 1;
    while value >= 0x80 {
        value >>= 7;
        n += 1;
    }
    n
}

/// Decode one varint from `bytes` starting at `*pos`, advancing `*pos` past it.
///
/// Fails with [`Error::Corrupt`] when the input ends before a terminating
/// byte or the encoding runs past [`MAX_VARINT_BYTES`].
pub fn read_unsigned(bytes: &[u8], pos: &mut usize) -> Result<u64> {
    let mut result: u64 = 0;
    let mut shift = 0u32;
    let mut i = *pos;

    for _ in 0..MAX_VARINT_BYTES {
        let Some(&byte) = bytes.get(i) else {
            return Err(Error::corrupt(format!(
                "varint truncated at byte {} (buffer length {})",
                i,
                bytes.len()
            )));
        };
        i += 1;
        // The tenth group carries only bit 63.
        if shift == 63 && byte & 0x7E != 0 {
            return Err(Error::corrupt(format!(
                "varint starting at byte {} overflows u64",
                *pos
            )));
        }
        result |= u64::from(byte & 0x7F) << shift;
        if byte & 0x80 == 0 {
            *pos = i;
            return Ok(result);
        }
        shift += 7;
    }

    Err(Error::corrupt(format!(
        "varint starting at byte {} exceeds {} bytes",
        *pos, MAX_VARINT_BYTES
    )))
}

/// Bytewise unsigned comparison, ties broken by length.
///
/// This is the ordering of every dictionary and lexicographic index. It is
/// not a Unicode collation.
pub fn compare_utf8(a: &[u8], b: &[u8]) -> Ordering {
    let common = a.len().min(b.len());
    for i in 0..common {
        match a[i].cmp(&b[i]) {
            Ordering::Equal => continue,
            other => return other,
        }
    }
    a.len().cmp(&b.len())
}

const EDGE_ID_SEED: u64 = 1_125_899_906_842_597;
const EDGE_ID_MULTIPLIER: u64 = 1_315_423_911;

/// Derive the id of an edge row that carries none.
///
/// Hashes the UTF-16 code units of `source|label|destination` with
/// `x = (x * 1315423911) ^ unit` in wrapping 64-bit arithmetic and formats
/// the result as an unsigned decimal. Other backends reading the same input
/// produce the same ids, so the function must not change.
pub fn derive_edge_id(source: &str, label: &str, destination: &str) -> String {
    let mut x = EDGE_ID_SEED;
    let parts = [source, "|", label, "|", destination];
    for unit in parts.iter().flat_map(|part| part.encode_utf16()) {
        x = x.wrapping_mul(EDGE_ID_MULTIPLIER) ^ u64::from(unit);
    }
    x.to_string()
}
