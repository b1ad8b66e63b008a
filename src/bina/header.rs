//! BINA container headers.
//!
//! V1 (0x20 bytes, data base 0x20):
//! ```text
//! 0x00 u32  file size
//! 0x04 u32  offset table offset (relative to base)
//! 0x08 u32  offset table length
//! 0x0C u32  unknown1
//! 0x10 u16  unknown flag 1
//! 0x12 u16  footer magic flag (string table offset trails the offset table)
//! 0x14 u16  unknown flag 2
//! 0x16 u8   version '1'
//! 0x17 u8   endian 'B' / 'L'
//! 0x18 [4]  "BINA"
//! 0x1C u32  0
//! ```
//!
//! V2 (0x40 bytes, data base 0x40):
//! ```text
//! 0x00 [4]  "BINA"
//! 0x04 [3]  version "210"
//! 0x07 u8   endian 'B' / 'L'
//! 0x08 u32  file size
//! 0x0C u16  node count
//! 0x0E u16  unknown1
//! 0x10 [4]  "DATA"
//! 0x14 u32  data node length
//! 0x18 u32  string table offset (relative to base)
//! 0x1C u32  string table length
//! 0x20 u32  offset table length
//! 0x24 u16  additional data length (0x18)
//! 0x26 u16  padding
//! 0x28 [24] additional data
//! ```
//!
//! Both footers hold the string table followed by the offset table.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::offset_table::encode_offset_table;
use crate::stream::{SetReader, SetWriter};
use crate::util::{Endian, Error, PointerWidth, Result};

pub const BINA_SIGNATURE: &[u8; 4] = b"BINA";
pub const DATA_SIGNATURE: &[u8; 4] = b"DATA";
pub const V1_HEADER_SIZE: u64 = 0x20;
pub const V2_HEADER_SIZE: u64 = 0x40;
const V2_NODE_OFFSET: u64 = 0x10;
const V2_ADDITIONAL_LEN: u16 = 0x18;

/// Fields of a V1 header that are not derived from the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaV1Header {
    pub endian: Endian,
    pub unknown1: u32,
    pub unknown_flag1: u16,
    pub footer_magic: bool,
    pub unknown_flag2: u16,
}

/// Fields of a V2 header that are not derived from the payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaV2Header {
    pub endian: Endian,
    pub version: [u8; 3],
    pub node_count: u16,
    pub unknown1: u16,
}

/// Parsed BINA header, kept on the set so a save can echo it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaHeader {
    V1(BinaV1Header),
    V2(BinaV2Header),
}

impl BinaHeader {
    pub fn v1(endian: Endian) -> Self {
        Self::V1(BinaV1Header {
            endian,
            unknown1: 0,
            unknown_flag1: 0,
            footer_magic: false,
            unknown_flag2: 0,
        })
    }

    pub fn v2(endian: Endian) -> Self {
        Self::V2(BinaV2Header {
            endian,
            version: *b"210",
            node_count: 1,
            unknown1: 0,
        })
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        match self {
            Self::V1(h) => h.endian,
            Self::V2(h) => h.endian,
        }
    }

    /// Absolute position every stored offset is relative to.
    #[inline]
    pub fn data_offset(&self) -> u64 {
        match self {
            Self::V1(_) => V1_HEADER_SIZE,
            Self::V2(_) => V2_HEADER_SIZE,
        }
    }

    /// Whether `data` starts with a V1 or V2 BINA header.
    pub fn detect(data: &[u8]) -> bool {
        data.starts_with(BINA_SIGNATURE)
            || data.get(0x18..0x1C).is_some_and(|s| s == BINA_SIGNATURE)
    }

    /// Parse the header and return a reader positioned at the data base.
    pub fn read(data: &[u8]) -> Result<(Self, SetReader<'_>)> {
        if data.starts_with(BINA_SIGNATURE) {
            Self::read_v2(data)
        } else if data.get(0x18..0x1C).is_some_and(|s| s == BINA_SIGNATURE) {
            Self::read_v1(data)
        } else {
            let found = data.get(..4).unwrap_or(data);
            Err(Error::InvalidSignature {
                expected: "BINA".into(),
                found: String::from_utf8_lossy(found).into_owned(),
            })
        }
    }

    fn endian_at(data: &[u8], pos: usize) -> Result<Endian> {
        let marker = *data.get(pos).ok_or(Error::OutOfBounds {
            offset: pos as u64,
            len: data.len() as u64,
        })?;
        Endian::from_marker(marker)
            .ok_or_else(|| Error::invalid(format!("unknown endian marker {:#04x}", marker)))
    }

    fn read_v1(data: &[u8]) -> Result<(Self, SetReader<'_>)> {
        let endian = Self::endian_at(data, 0x17)?;
        if data[0x16] != b'1' {
            return Err(Error::UnsupportedVersion(format!("BINA v1 '{}'", data[0x16] as char)));
        }
        let mut r = SetReader::new(data, endian);
        let file_size = r.read_u32()?;
        let _offset_table_offset = r.read_u32()?;
        let _offset_table_len = r.read_u32()?;
        let unknown1 = r.read_u32()?;
        let unknown_flag1 = r.read_u16()?;
        let footer_flag = r.read_u16()?;
        let unknown_flag2 = r.read_u16()?;
        check_file_size(file_size, data.len());

        let header = Self::V1(BinaV1Header {
            endian,
            unknown1,
            unknown_flag1,
            footer_magic: footer_flag != 0,
            unknown_flag2,
        });
        r.seek(V1_HEADER_SIZE)?;
        r.set_base(V1_HEADER_SIZE);
        debug!(?endian, file_size, "read BINA v1 header");
        Ok((header, r))
    }

    fn read_v2(data: &[u8]) -> Result<(Self, SetReader<'_>)> {
        if (data.len() as u64) < V2_HEADER_SIZE {
            return Err(Error::OutOfBounds {
                offset: V2_HEADER_SIZE,
                len: data.len() as u64,
            });
        }
        let endian = Self::endian_at(data, 0x07)?;
        let version = [data[4], data[5], data[6]];
        if version[0] != b'2' {
            return Err(Error::UnsupportedVersion(format!(
                "BINA v{}",
                String::from_utf8_lossy(&version)
            )));
        }
        let mut r = SetReader::new(data, endian);
        r.seek(0x08)?;
        let file_size = r.read_u32()?;
        let node_count = r.read_u16()?;
        let unknown1 = r.read_u16()?;
        check_file_size(file_size, data.len());

        let node_sig = r.read_bytes(4)?;
        if node_sig != DATA_SIGNATURE {
            return Err(Error::InvalidSignature {
                expected: "DATA".into(),
                found: String::from_utf8_lossy(&node_sig).into_owned(),
            });
        }
        let _data_len = r.read_u32()?;
        let _string_table_offset = r.read_u32()?;
        let _string_table_len = r.read_u32()?;
        let _offset_table_len = r.read_u32()?;
        let additional_len = r.read_u16()?;
        let base = V2_NODE_OFFSET + 0x18 + additional_len as u64;

        let header = Self::V2(BinaV2Header {
            endian,
            version,
            node_count,
            unknown1,
        });
        r.seek(base)?;
        r.set_base(base);
        debug!(?endian, file_size, base, "read BINA v2 header");
        Ok((header, r))
    }

    /// Absolute position where the footer of `data` begins: the string table
    /// for v2, the offset table for v1.
    pub fn payload_end(&self, data: &[u8]) -> Result<u64> {
        let mut r = SetReader::new(data, self.endian());
        let field = match self {
            Self::V1(_) => 0x04,
            Self::V2(_) => 0x18,
        };
        r.seek(field)?;
        Ok(self.data_offset() + r.read_u32()? as u64)
    }

    /// Start a file: reserve the header and position the writer at the data base.
    pub fn begin(&self, pointer: PointerWidth) -> SetWriter {
        let mut w = SetWriter::new(self.endian(), pointer);
        w.write_nulls(self.data_offset() as usize);
        w.set_base(self.data_offset());
        w
    }

    /// Close a file: emit the footer, patch the header and resolve every offset.
    ///
    /// Consumes the writer, so the footer and offset patching happen once.
    pub fn finish(&self, mut w: SetWriter) -> Result<Vec<u8>> {
        let base = self.data_offset();
        w.seek_end();
        w.fix_padding(4);

        let (string_start, string_len) = w.write_string_table()?;
        w.finalize()?;

        let positions: Vec<u64> = w.offset_positions().into_iter().map(|p| p - base).collect();
        let table = encode_offset_table(&positions)?;
        let table_start = w.pos();
        w.write_bytes(&table);

        match self {
            Self::V1(h) => {
                if h.footer_magic {
                    w.write_u32((string_start - base) as u32);
                }
                let file_size = w.len() as u32;
                w.patch_u32_at(0x00, file_size);
                w.patch_u32_at(0x04, (table_start - base) as u32);
                w.patch_u32_at(0x08, table.len() as u32);
                w.patch_u32_at(0x0C, h.unknown1);
                w.patch_u16_at(0x10, h.unknown_flag1);
                w.patch_u16_at(0x12, h.footer_magic as u16);
                w.patch_u16_at(0x14, h.unknown_flag2);
                w.patch_bytes_at(0x16, &[b'1', h.endian.marker()]);
                w.patch_bytes_at(0x18, BINA_SIGNATURE);
                w.patch_u32_at(0x1C, 0);
            }
            Self::V2(h) => {
                let file_size = w.len() as u32;
                w.patch_bytes_at(0x00, BINA_SIGNATURE);
                w.patch_bytes_at(0x04, &h.version);
                w.patch_bytes_at(0x07, &[h.endian.marker()]);
                w.patch_u32_at(0x08, file_size);
                w.patch_u16_at(0x0C, h.node_count);
                w.patch_u16_at(0x0E, h.unknown1);
                w.patch_bytes_at(0x10, DATA_SIGNATURE);
                w.patch_u32_at(0x14, file_size - V2_NODE_OFFSET as u32);
                w.patch_u32_at(0x18, (string_start - base) as u32);
                w.patch_u32_at(0x1C, string_len as u32);
                w.patch_u32_at(0x20, table.len() as u32);
                w.patch_u16_at(0x24, V2_ADDITIONAL_LEN);
                w.patch_u16_at(0x26, 0);
            }
        }
        debug!(size = w.len(), pointers = positions.len(), "finished BINA file");
        Ok(w.into_inner())
    }
}

fn check_file_size(declared: u32, actual: usize) {
    if declared as usize != actual {
        warn!(declared, actual, "BINA file size does not match buffer length");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bina::decode_offset_table;

    fn sample(header: BinaHeader, pointer: PointerWidth) -> Result<Vec<u8>> {
        let mut w = header.begin(pointer);
        w.add_offset("name")?;
        w.add_offset("body")?;
        w.fill_in_offset("body")?;
        w.write_u32(0x1234);
        w.add_string("name", "Ring")?;
        header.finish(w)
    }

    #[test]
    fn test_v1_big_endian_layout() -> Result<()> {
        let header = BinaHeader::v1(Endian::Big);
        let bytes = sample(header, PointerWidth::U32)?;
        assert_eq!(&bytes[0x18..0x1C], b"BINA");
        assert_eq!(bytes[0x16], b'1');
        assert_eq!(bytes[0x17], b'B');
        assert_eq!(&bytes[0..4], &(bytes.len() as u32).to_be_bytes());
        // body points right after the two pointers
        assert_eq!(&bytes[0x24..0x28], &8u32.to_be_bytes());

        let (parsed, mut r) = BinaHeader::read(&bytes)?;
        assert_eq!(parsed, header);
        assert_eq!(r.pos(), 0x20);
        let name = r.read_u32()? as u64;
        assert_eq!(r.read_cstring_at(name)?, "Ring");
        Ok(())
    }

    #[test]
    fn test_v1_offset_table() -> Result<()> {
        let bytes = sample(BinaHeader::v1(Endian::Little), PointerWidth::U32)?;
        let table_offset = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
        let table_len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let start = 0x20 + table_offset;
        let positions = decode_offset_table(&bytes[start..start + table_len])?;
        assert_eq!(positions, vec![0, 4]);
        Ok(())
    }

    #[test]
    fn test_v1_footer_magic() -> Result<()> {
        let header = BinaHeader::V1(BinaV1Header {
            footer_magic: true,
            ..match BinaHeader::v1(Endian::Little) {
                BinaHeader::V1(h) => h,
                BinaHeader::V2(_) => unreachable!(),
            }
        });
        let bytes = sample(header, PointerWidth::U32)?;
        let n = bytes.len();
        let trailer = u32::from_le_bytes([bytes[n - 4], bytes[n - 3], bytes[n - 2], bytes[n - 1]]);
        // string table starts after the 12 payload bytes
        assert_eq!(trailer, 12);
        assert_eq!(BinaHeader::read(&bytes)?.0, header);
        Ok(())
    }

    #[test]
    fn test_v2_little_endian_u64() -> Result<()> {
        let header = BinaHeader::v2(Endian::Little);
        let bytes = sample(header, PointerWidth::U64)?;
        assert_eq!(&bytes[0..8], b"BINA210L");
        assert_eq!(&bytes[0x10..0x14], b"DATA");
        assert_eq!(&bytes[0x40..0x48], &20u64.to_le_bytes());
        assert_eq!(&bytes[0x48..0x50], &16u64.to_le_bytes());
        let st = u32::from_le_bytes([bytes[0x18], bytes[0x19], bytes[0x1A], bytes[0x1B]]);
        assert_eq!(st, 20);

        let (parsed, r) = BinaHeader::read(&bytes)?;
        assert_eq!(parsed, header);
        assert_eq!(r.base(), 0x40);
        assert_eq!(parsed.payload_end(&bytes)?, 0x40 + 20);
        Ok(())
    }

    #[test]
    fn test_rejects_unknown_container() {
        assert!(matches!(
            BinaHeader::read(&[0u8; 0x40]),
            Err(Error::InvalidSignature { .. })
        ));
        assert!(!BinaHeader::detect(b"SOBJ"));
    }

    #[test]
    fn test_rejects_unknown_version() {
        let mut bytes = vec![0u8; 0x40];
        bytes[..8].copy_from_slice(b"BINA310L");
        assert!(matches!(BinaHeader::read(&bytes), Err(Error::UnsupportedVersion(_))));
    }
}
