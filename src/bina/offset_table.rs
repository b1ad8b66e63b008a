//! Compressed pointer-location table written in the BINA footer.
//!
//! Each entry is the distance from the previous pointer (the first from the
//! data base) in 4-byte units, prefixed by its own size:
//!
//! ```text
//! 01xxxxxx                              6-bit delta
//! 10xxxxxx xxxxxxxx                     14-bit delta
//! 11xxxxxx xxxxxxxx xxxxxxxx xxxxxxxx   30-bit delta
//! ```
//!
//! Multi-byte entries are big-endian regardless of file byte order. The table
//! is zero padded to 4 bytes and a zero byte terminates it.

use crate::util::{Error, Result};

const MAX_6BIT: u64 = 0x3F;
const MAX_14BIT: u64 = 0x3FFF;
const MAX_30BIT: u64 = 0x3FFF_FFFF;

/// Encode sorted base-relative pointer positions.
pub fn encode_offset_table(positions: &[u64]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(positions.len() + 4);
    let mut prev = 0u64;
    for &pos in positions {
        let delta = pos
            .checked_sub(prev)
            .ok_or_else(|| Error::invalid("offset table positions not sorted"))?;
        if delta % 4 != 0 {
            return Err(Error::invalid(format!("pointer at {pos:#x} is not 4-byte aligned")));
        }
        let units = delta >> 2;
        if units <= MAX_6BIT {
            out.push(0x40 | units as u8);
        } else if units <= MAX_14BIT {
            out.extend_from_slice(&(0x8000 | units as u16).to_be_bytes());
        } else if units <= MAX_30BIT {
            out.extend_from_slice(&(0xC000_0000 | units as u32).to_be_bytes());
        } else {
            return Err(Error::invalid(format!("pointer delta {delta:#x} too large")));
        }
        prev = pos;
    }
    while out.len() % 4 != 0 {
        out.push(0);
    }
    Ok(out)
}

/// Decode a table back into base-relative pointer positions.
pub fn decode_offset_table(bytes: &[u8]) -> Result<Vec<u64>> {
    let mut positions = Vec::new();
    let mut pos = 0u64;
    let mut i = 0usize;
    while i < bytes.len() {
        let b = bytes[i];
        let (units, size) = match b >> 6 {
            0 => break,
            1 => ((b & 0x3F) as u64, 1),
            2 => {
                let raw = bytes
                    .get(i..i + 2)
                    .ok_or_else(|| Error::invalid("truncated offset table entry"))?;
                ((u16::from_be_bytes([raw[0], raw[1]]) & 0x3FFF) as u64, 2)
            }
            _ => {
                let raw = bytes
                    .get(i..i + 4)
                    .ok_or_else(|| Error::invalid("truncated offset table entry"))?;
                ((u32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) & 0x3FFF_FFFF) as u64, 4)
            }
        };
        pos += units * 4;
        positions.push(pos);
        i += size;
    }
    Ok(positions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_widths() -> Result<()> {
        let table = encode_offset_table(&[8, 8 + 0x100, 8 + 0x100 + 0x40000])?;
        assert_eq!(table[0], 0x42);
        assert_eq!(&table[1..3], &[0x80, 0x40]);
        assert_eq!(&table[3..7], &[0xC0, 0x01, 0x00, 0x00]);
        assert_eq!(table.len(), 8);
        assert_eq!(decode_offset_table(&table)?, vec![8, 0x108, 0x40108]);
        Ok(())
    }

    #[test]
    fn test_misaligned_pointer_rejected() {
        assert!(encode_offset_table(&[6]).is_err());
    }

    #[test]
    fn test_empty_table() -> Result<()> {
        assert!(encode_offset_table(&[])?.is_empty());
        assert!(decode_offset_table(&[0, 0, 0, 0])?.is_empty());
        Ok(())
    }
}
