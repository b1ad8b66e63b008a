//! Seekable cursor over a set file.
//!
//! Offsets stored in files are relative to a base (the start of the payload
//! after a BINA header), positions are absolute. Every read is bounds checked;
//! running past the end is [`Error::OutOfBounds`].

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::align_up;
use crate::model::{DataType, ObjectReference, Parameter};
use crate::util::{Endian, Error, PointerWidth, Quat, Result, Vec2, Vec3, Vec4};

macro_rules! read_endian {
    ($self:ident, $size:expr, $read:ident) => {{
        let endian = $self.endian;
        let bytes = $self.take($size)?;
        Ok(match endian {
            Endian::Little => LittleEndian::$read(bytes),
            Endian::Big => BigEndian::$read(bytes),
        })
    }};
}

/// Read cursor with endianness, pointer width and a base offset.
pub struct SetReader<'a> {
    data: &'a [u8],
    pos: usize,
    base: usize,
    endian: Endian,
    pointer: PointerWidth,
}

impl<'a> SetReader<'a> {
    pub fn new(data: &'a [u8], endian: Endian) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
            endian,
            pointer: PointerWidth::U32,
        }
    }

    pub fn with_pointer_width(mut self, pointer: PointerWidth) -> Self {
        self.pointer = pointer;
        self
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer
    }

    /// Set the position that stored offsets are relative to.
    #[inline]
    pub fn set_base(&mut self, base: u64) {
        self.base = base as usize;
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base as u64
    }

    /// Current absolute position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whole underlying buffer.
    #[inline]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Move to an absolute position. The end of the stream is a valid position.
    pub fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.len() {
            return Err(Error::OutOfBounds { offset: pos, len: self.len() });
        }
        self.pos = pos as usize;
        Ok(())
    }

    /// Absolute position of a base-relative offset read from the file.
    pub fn absolute(&self, offset: u64) -> Result<u64> {
        (self.base as u64)
            .checked_add(offset)
            .ok_or(Error::OutOfBounds { offset, len: self.len() })
    }

    /// Move to an offset relative to the base.
    pub fn jump_to(&mut self, offset: u64) -> Result<()> {
        self.seek(self.absolute(offset)?)
    }

    pub fn jump_ahead(&mut self, count: u64) -> Result<()> {
        let pos = (self.pos as u64)
            .checked_add(count)
            .ok_or(Error::OutOfBounds { offset: count, len: self.len() })?;
        self.seek(pos)
    }

    /// Run `f` at a base-relative offset, then restore the current position.
    pub fn with_jump<T>(&mut self, offset: u64, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let saved = self.pos;
        self.jump_to(offset)?;
        let result = f(self);
        self.pos = saved;
        result
    }

    /// Skip to the next multiple of `align`.
    pub fn fix_padding(&mut self, align: usize) -> Result<()> {
        self.seek(align_up(self.pos as u64, align as u64))
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = match self.pos.checked_add(count) {
            Some(end) if end <= self.data.len() => end,
            _ => {
                return Err(Error::OutOfBounds {
                    offset: (self.pos as u64).saturating_add(count as u64),
                    len: self.len(),
                })
            }
        };
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        Ok(self.take(count)?.to_vec())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        read_endian!(self, 2, read_u16)
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        read_endian!(self, 2, read_i16)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        read_endian!(self, 4, read_u32)
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        read_endian!(self, 4, read_i32)
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        read_endian!(self, 8, read_u64)
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        read_endian!(self, 4, read_f32)
    }

    pub fn read_vec2(&mut self) -> Result<Vec2> {
        Ok(Vec2::new(self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec3(&mut self) -> Result<Vec3> {
        Ok(Vec3::new(self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    pub fn read_vec4(&mut self) -> Result<Vec4> {
        Ok(Vec4::new(self.read_f32()?, self.read_f32()?, self.read_f32()?, self.read_f32()?))
    }

    /// Quaternion stored as `x, y, z, w`.
    pub fn read_quat(&mut self) -> Result<Quat> {
        Ok(Quat::from_vec4(self.read_vec4()?))
    }

    /// Read a pointer of the configured width.
    pub fn read_offset(&mut self) -> Result<u64> {
        match self.pointer {
            PointerWidth::U32 => Ok(self.read_u32()? as u64),
            PointerWidth::U64 => self.read_u64(),
        }
    }

    /// Read a 4-character signature. Big-endian streams store it reversed.
    pub fn read_signature(&mut self) -> Result<[u8; 4]> {
        let mut sig = [0u8; 4];
        sig.copy_from_slice(self.take(4)?);
        if self.endian == Endian::Big {
            sig.reverse();
        }
        Ok(sig)
    }

    /// Read a signature and fail unless it equals `expected`.
    pub fn expect_signature(&mut self, expected: &[u8; 4]) -> Result<()> {
        let found = self.read_signature()?;
        if &found != expected {
            return Err(Error::InvalidSignature {
                expected: String::from_utf8_lossy(expected).into_owned(),
                found: String::from_utf8_lossy(&found).into_owned(),
            });
        }
        Ok(())
    }

    /// Read a null-terminated string at the cursor.
    pub fn read_cstring(&mut self) -> Result<String> {
        let rest = &self.data[self.pos..];
        let len = rest.iter().position(|&b| b == 0).ok_or_else(|| Error::OutOfBounds {
            offset: self.len(),
            len: self.len(),
        })?;
        let bytes = self.take(len + 1)?;
        Ok(String::from_utf8(bytes[..len].to_vec())?)
    }

    /// Read a null-terminated string at a base-relative offset.
    pub fn read_cstring_at(&mut self, offset: u64) -> Result<String> {
        self.with_jump(offset, |r| r.read_cstring())
    }

    /// Read an inline value whose size is fixed by its type.
    pub fn read_scalar(&mut self, data_type: DataType, format: &'static str) -> Result<Parameter> {
        Ok(match data_type {
            DataType::Bool => Parameter::Bool(self.read_u8()? != 0),
            DataType::Byte => Parameter::Byte(self.read_u8()?),
            DataType::I16 => Parameter::I16(self.read_i16()?),
            DataType::U16 => Parameter::U16(self.read_u16()?),
            DataType::I32 => Parameter::I32(self.read_i32()?),
            DataType::U32 => Parameter::U32(self.read_u32()?),
            DataType::F32 => Parameter::F32(self.read_f32()?),
            DataType::Vector2 => Parameter::Vector2(self.read_vec2()?),
            DataType::Vector3 => Parameter::Vector3(self.read_vec3()?),
            DataType::Vector4 => Parameter::Vector4(self.read_vec4()?),
            DataType::Quaternion => Parameter::Quaternion(self.read_quat()?),
            DataType::ObjectReference => Parameter::ObjectReference(self.read_object_reference()?),
            other => {
                return Err(Error::UnsupportedType {
                    format,
                    data_type: other.to_string(),
                })
            }
        })
    }

    pub fn read_object_reference(&mut self) -> Result<ObjectReference> {
        Ok(ObjectReference::new(self.read_u16()?, self.read_u16()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endian_reads() -> Result<()> {
        let bytes = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(SetReader::new(&bytes, Endian::Little).read_u32()?, 0x04030201);
        assert_eq!(SetReader::new(&bytes, Endian::Big).read_u32()?, 0x01020304);
        Ok(())
    }

    #[test]
    fn test_out_of_bounds() {
        let bytes = [0u8; 6];
        let mut r = SetReader::new(&bytes, Endian::Little);
        assert!(r.read_u32().is_ok());
        assert!(matches!(r.read_u32(), Err(Error::OutOfBounds { offset: 8, len: 6 })));
        assert!(matches!(r.jump_to(7), Err(Error::OutOfBounds { .. })));
        assert!(r.seek(6).is_ok());
    }

    #[test]
    fn test_offset_overflow_is_out_of_bounds() -> Result<()> {
        let bytes = [0u8; 8];
        let mut r = SetReader::new(&bytes, Endian::Little);
        r.set_base(4);
        assert!(matches!(r.jump_to(u64::MAX), Err(Error::OutOfBounds { .. })));
        assert!(matches!(r.absolute(u64::MAX - 1), Err(Error::OutOfBounds { .. })));
        r.jump_to(0)?;
        assert!(matches!(r.jump_ahead(u64::MAX), Err(Error::OutOfBounds { .. })));
        assert!(matches!(r.read_bytes(usize::MAX), Err(Error::OutOfBounds { .. })));
        assert_eq!(r.pos(), 4);
        Ok(())
    }

    #[test]
    fn test_with_jump_restores_position() -> Result<()> {
        let bytes = b"\x00\x00\x00\x00abc\0";
        let mut r = SetReader::new(bytes, Endian::Little);
        r.jump_ahead(2)?;
        assert_eq!(r.read_cstring_at(4)?, "abc");
        assert_eq!(r.pos(), 2);
        Ok(())
    }

    #[test]
    fn test_base_relative_jump() -> Result<()> {
        let bytes = [0, 0, 0, 0, 0x2A];
        let mut r = SetReader::new(&bytes, Endian::Little);
        r.set_base(4);
        r.jump_to(0)?;
        assert_eq!(r.read_u8()?, 0x2A);
        Ok(())
    }

    #[test]
    fn test_signature_reversed_on_big_endian() -> Result<()> {
        let mut r = SetReader::new(b"JBOS", Endian::Big);
        assert_eq!(&r.read_signature()?, b"SOBJ");
        let mut r = SetReader::new(b"SOBJ", Endian::Little);
        assert!(r.expect_signature(b"SOBJ").is_ok());
        let mut r = SetReader::new(b"SOBJ", Endian::Big);
        assert!(matches!(r.expect_signature(b"SOBJ"), Err(Error::InvalidSignature { .. })));
        Ok(())
    }

    #[test]
    fn test_fix_padding() -> Result<()> {
        let bytes = [0u8; 32];
        let mut r = SetReader::new(&bytes, Endian::Little);
        r.jump_ahead(3)?;
        r.fix_padding(4)?;
        assert_eq!(r.pos(), 4);
        r.fix_padding(4)?;
        assert_eq!(r.pos(), 4);
        r.fix_padding(16)?;
        assert_eq!(r.pos(), 16);
        Ok(())
    }

    #[test]
    fn test_unterminated_string() {
        let mut r = SetReader::new(b"abc", Endian::Little);
        assert!(r.read_cstring().is_err());
    }
}
