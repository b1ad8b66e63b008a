//! Growable write buffer with deferred offset patching.
//!
//! Pointers are written in two passes. [`SetWriter::add_offset`] reserves a
//! zeroed slot under a label and records `(label, position, width)` in a side
//! table; [`SetWriter::fill_in_offset`] records where the label points once
//! that position is known. [`SetWriter::finalize`] walks the side table once
//! and writes `target - base` into every slot. Strings go through a pool that
//! deduplicates by content and resolves their labels when the string table is
//! emitted.

use std::collections::HashMap;

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use super::align_up;
use crate::model::{ObjectReference, Parameter};
use crate::util::{Endian, Error, PointerWidth, Quat, Result, Vec2, Vec3, Vec4};

macro_rules! write_endian {
    ($self:ident, $size:expr, $write:ident, $value:expr) => {{
        let mut bytes = [0u8; $size];
        match $self.endian {
            Endian::Little => LittleEndian::$write(&mut bytes, $value),
            Endian::Big => BigEndian::$write(&mut bytes, $value),
        }
        $self.write_bytes(&bytes);
    }};
}

/// Reserved pointer slot.
#[derive(Debug, Clone)]
struct Placeholder {
    label: String,
    pos: usize,
    width: PointerWidth,
}

/// Content-deduplicated string table.
#[derive(Debug, Default)]
struct StringPool {
    entries: Vec<(String, Vec<String>)>,
    index: HashMap<String, usize>,
}

impl StringPool {
    fn push(&mut self, value: &str, label: String) {
        match self.index.get(value) {
            Some(&i) => self.entries[i].1.push(label),
            None => {
                self.index.insert(value.to_string(), self.entries.len());
                self.entries.push((value.to_string(), vec![label]));
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Write cursor over an in-memory buffer.
pub struct SetWriter {
    buf: Vec<u8>,
    pos: usize,
    base: u64,
    endian: Endian,
    pointer: PointerWidth,
    placeholders: Vec<Placeholder>,
    labels: HashMap<String, usize>,
    targets: HashMap<String, u64>,
    strings: StringPool,
    finalized: bool,
}

impl SetWriter {
    pub fn new(endian: Endian, pointer: PointerWidth) -> Self {
        Self {
            buf: Vec::new(),
            pos: 0,
            base: 0,
            endian,
            pointer,
            placeholders: Vec::new(),
            labels: HashMap::new(),
            targets: HashMap::new(),
            strings: StringPool::default(),
            finalized: false,
        }
    }

    #[inline]
    pub fn endian(&self) -> Endian {
        self.endian
    }

    #[inline]
    pub fn pointer_width(&self) -> PointerWidth {
        self.pointer
    }

    /// Set the position that written offsets are relative to.
    #[inline]
    pub fn set_base(&mut self, base: u64) {
        self.base = base;
    }

    #[inline]
    pub fn base(&self) -> u64 {
        self.base
    }

    /// Current absolute position.
    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos as u64
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.buf.len() as u64
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Move to an absolute position, growing the buffer with zeros if needed.
    pub fn seek(&mut self, pos: u64) {
        let pos = pos as usize;
        if pos > self.buf.len() {
            self.buf.resize(pos, 0);
        }
        self.pos = pos;
    }

    /// Move to the end of everything written so far.
    pub fn seek_end(&mut self) {
        self.pos = self.buf.len();
    }

    /// Write bytes at the cursor, overwriting or extending the buffer.
    pub fn write_bytes(&mut self, data: &[u8]) {
        let end = self.pos + data.len();
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].copy_from_slice(data);
        self.pos = end;
    }

    pub fn write_nulls(&mut self, count: usize) {
        let end = self.pos + count;
        if end > self.buf.len() {
            self.buf.resize(end, 0);
        }
        self.buf[self.pos..end].fill(0);
        self.pos = end;
    }

    /// Pad with zeros to the next multiple of `align`.
    pub fn fix_padding(&mut self, align: usize) {
        let end = align_up(self.pos as u64, align as u64) as usize;
        self.write_nulls(end - self.pos);
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bytes(&[value]);
    }

    pub fn write_u16(&mut self, value: u16) {
        write_endian!(self, 2, write_u16, value);
    }

    pub fn write_i16(&mut self, value: i16) {
        write_endian!(self, 2, write_i16, value);
    }

    pub fn write_u32(&mut self, value: u32) {
        write_endian!(self, 4, write_u32, value);
    }

    pub fn write_i32(&mut self, value: i32) {
        write_endian!(self, 4, write_i32, value);
    }

    pub fn write_u64(&mut self, value: u64) {
        write_endian!(self, 8, write_u64, value);
    }

    pub fn write_f32(&mut self, value: f32) {
        write_endian!(self, 4, write_f32, value);
    }

    pub fn write_vec2(&mut self, v: Vec2) {
        self.write_f32(v.x);
        self.write_f32(v.y);
    }

    pub fn write_vec3(&mut self, v: Vec3) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
    }

    pub fn write_vec4(&mut self, v: Vec4) {
        self.write_f32(v.x);
        self.write_f32(v.y);
        self.write_f32(v.z);
        self.write_f32(v.w);
    }

    /// Quaternion stored as `x, y, z, w`.
    pub fn write_quat(&mut self, q: Quat) {
        self.write_vec4(Vec4::from(q));
    }

    pub fn write_object_reference(&mut self, r: ObjectReference) {
        self.write_u16(r.id);
        self.write_u16(r.group_id);
    }

    /// Write a 4-character signature. Big-endian streams store it reversed.
    pub fn write_signature(&mut self, sig: &[u8; 4]) {
        let mut bytes = *sig;
        if self.endian == Endian::Big {
            bytes.reverse();
        }
        self.write_bytes(&bytes);
    }

    /// Overwrite a u32 at an absolute position without moving the cursor.
    pub fn patch_u32_at(&mut self, pos: u64, value: u32) {
        let saved = self.pos;
        self.seek(pos);
        self.write_u32(value);
        self.pos = saved;
    }

    /// Overwrite a u16 at an absolute position without moving the cursor.
    pub fn patch_u16_at(&mut self, pos: u64, value: u16) {
        let saved = self.pos;
        self.seek(pos);
        self.write_u16(value);
        self.pos = saved;
    }

    /// Overwrite raw bytes at an absolute position without moving the cursor.
    pub fn patch_bytes_at(&mut self, pos: u64, data: &[u8]) {
        let saved = self.pos;
        self.seek(pos);
        self.write_bytes(data);
        self.pos = saved;
    }

    /// Write an inline value whose size is fixed by its type.
    pub fn write_scalar(&mut self, value: &Parameter, format: &'static str) -> Result<()> {
        match value {
            Parameter::Bool(v) => self.write_u8(*v as u8),
            Parameter::Byte(v) => self.write_u8(*v),
            Parameter::I16(v) => self.write_i16(*v),
            Parameter::U16(v) => self.write_u16(*v),
            Parameter::I32(v) => self.write_i32(*v),
            Parameter::U32(v) => self.write_u32(*v),
            Parameter::F32(v) => self.write_f32(*v),
            Parameter::Vector2(v) => self.write_vec2(*v),
            Parameter::Vector3(v) => self.write_vec3(*v),
            Parameter::Vector4(v) => self.write_vec4(*v),
            Parameter::Quaternion(q) => self.write_quat(*q),
            Parameter::ObjectReference(r) => self.write_object_reference(*r),
            other => {
                return Err(Error::UnsupportedType {
                    format,
                    data_type: other.data_type().to_string(),
                })
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Deferred offsets
    // ------------------------------------------------------------------

    /// Reserve a pointer slot at the cursor under `label`.
    pub fn add_offset(&mut self, label: impl Into<String>) -> Result<()> {
        let label = label.into();
        if self.labels.contains_key(&label) {
            return Err(Error::DuplicateOffset(label));
        }
        self.labels.insert(label.clone(), self.placeholders.len());
        self.placeholders.push(Placeholder {
            label,
            pos: self.pos,
            width: self.pointer,
        });
        self.write_nulls(self.pointer.bytes());
        Ok(())
    }

    /// Reserve `count` consecutive slots labelled `{prefix}{index}`.
    pub fn add_offset_table(&mut self, prefix: &str, count: usize) -> Result<()> {
        for i in 0..count {
            self.add_offset(format!("{prefix}{i}"))?;
        }
        Ok(())
    }

    /// Point `label` at the current position.
    pub fn fill_in_offset(&mut self, label: &str) -> Result<()> {
        let pos = self.pos();
        self.fill_in_offset_at(label, pos)
    }

    /// Align the cursor to `align`, then point `label` at it.
    pub fn fill_in_offset_aligned(&mut self, label: &str, align: usize) -> Result<()> {
        self.fix_padding(align);
        self.fill_in_offset(label)
    }

    /// Point `label` at an absolute position.
    pub fn fill_in_offset_at(&mut self, label: &str, pos: u64) -> Result<()> {
        if !self.labels.contains_key(label) {
            return Err(Error::UnresolvedOffset(label.to_string()));
        }
        if self.targets.insert(label.to_string(), pos).is_some() {
            return Err(Error::DuplicateOffset(label.to_string()));
        }
        Ok(())
    }

    /// Reserve a pointer slot to `value` in the string table.
    pub fn add_string(&mut self, label: impl Into<String>, value: &str) -> Result<()> {
        let label = label.into();
        self.add_offset(label.clone())?;
        self.strings.push(value, label);
        Ok(())
    }

    /// Whether any strings are waiting for the string table.
    #[inline]
    pub fn has_strings(&self) -> bool {
        !self.strings.is_empty()
    }

    /// Emit pooled strings at the cursor and resolve their labels.
    ///
    /// Returns `(start, length)` of the table; the length includes padding to 4.
    pub fn write_string_table(&mut self) -> Result<(u64, u64)> {
        let start = self.pos();
        let entries = std::mem::take(&mut self.strings.entries);
        self.strings.index.clear();
        for (value, labels) in entries {
            let pos = self.pos();
            for label in labels {
                self.fill_in_offset_at(&label, pos)?;
            }
            self.write_bytes(value.as_bytes());
            self.write_u8(0);
        }
        self.fix_padding(4);
        Ok((start, self.pos() - start))
    }

    /// Absolute positions of every pointer slot, sorted.
    pub fn offset_positions(&self) -> Vec<u64> {
        let mut positions: Vec<u64> = self.placeholders.iter().map(|p| p.pos as u64).collect();
        positions.sort_unstable();
        positions
    }

    /// Patch every reserved slot with `target - base`.
    ///
    /// Runs once; a label that was never filled in is an error.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Err(Error::other("writer already finalized"));
        }
        if let Some((_, labels)) = self.strings.entries.first() {
            return Err(Error::UnresolvedOffset(labels[0].clone()));
        }
        let saved = self.pos;
        let placeholders = std::mem::take(&mut self.placeholders);
        for ph in &placeholders {
            let target = self
                .targets
                .get(&ph.label)
                .copied()
                .ok_or_else(|| Error::UnresolvedOffset(ph.label.clone()))?;
            let value = target.checked_sub(self.base).ok_or_else(|| {
                Error::invalid(format!("offset {} points before the base", ph.label))
            })?;
            self.pos = ph.pos;
            match ph.width {
                PointerWidth::U32 => {
                    let value = u32::try_from(value)
                        .map_err(|_| Error::invalid(format!("offset {} exceeds 32 bits", ph.label)))?;
                    self.write_u32(value);
                }
                PointerWidth::U64 => self.write_u64(value),
            }
        }
        self.placeholders = placeholders;
        self.pos = saved;
        self.finalized = true;
        Ok(())
    }

    /// Written bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }
}
