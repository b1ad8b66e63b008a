//! Tag-prefixed offset layout (".set").
//!
//! Payload after a big-endian BINA v1 header:
//! ```text
//! 0x00 [12] zero
//! 0x0C ptr  set name
//! 0x10 u32  object count
//! 0x14 ptr  object records
//! 0x18 u32  group count
//! 0x1C ptr  group table
//! ```
//! Object record (0x40 bytes):
//! ```text
//! 0x00 ptr  object name
//! 0x04 ptr  object type
//! 0x08 [16] reserved
//! 0x18 vec3 position
//! 0x24 u32  zero
//! 0x28 quat rotation (x, y, z, w)
//! 0x38 u32  parameter count
//! 0x3C ptr  parameter records
//! ```
//! Each parameter record is 0x14 bytes: a u32 type tag, then the value. A
//! record with an unknown tag loads as the raw 0x14 bytes and saves verbatim.
//!
//! The group table is carried through as raw bytes. Pointers inside it are not
//! relocated when the set is saved again.

use std::collections::HashMap;

use tracing::{debug, trace};

use super::{container_header, Diagnostics, LoadOptions, Loaded, SetCodec, SetFormat, Warning};
use crate::bina::BinaHeader;
use crate::model::{CustomKey, Parameter, RawGroupTable, SetData, SetObject, Transform};
use crate::stream::{SetReader, SetWriter};
use crate::template::Templates;
use crate::util::{Endian, Error, PointerWidth, Result};

const FORMAT: &str = "sonic06";
const OBJECT_SIZE: u64 = 0x40;
const PARAM_SIZE: u64 = 0x14;
const RESERVED_SIZE: usize = 16;

/// Type tag of a self-describing parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum ParamTag {
    Bool = 0,
    I32 = 1,
    F32 = 2,
    String = 3,
    Vector3 = 4,
    U32 = 6,
}

impl ParamTag {
    pub fn from_u32(tag: u32) -> Option<Self> {
        match tag {
            0 => Some(Self::Bool),
            1 => Some(Self::I32),
            2 => Some(Self::F32),
            3 => Some(Self::String),
            4 => Some(Self::Vector3),
            6 => Some(Self::U32),
            _ => None,
        }
    }

    /// Tag for a value, if the format can store it.
    pub fn of(value: &Parameter) -> Option<Self> {
        match value {
            Parameter::Bool(_) => Some(Self::Bool),
            Parameter::I32(_) => Some(Self::I32),
            Parameter::F32(_) => Some(Self::F32),
            Parameter::String(_) => Some(Self::String),
            Parameter::Vector3(_) => Some(Self::Vector3),
            Parameter::U32(_) => Some(Self::U32),
            _ => None,
        }
    }
}

/// Codec for the tag-prefixed layout. Templates are not needed to decode.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sonic06Codec;

fn read_string(r: &mut SetReader<'_>, ptr: u64) -> Result<String> {
    if ptr == 0 {
        Ok(String::new())
    } else {
        r.read_cstring_at(ptr)
    }
}

/// Read one parameter record. A record with an unknown tag is kept whole as
/// [`Parameter::Bytes`] so later parameters keep their indices.
fn read_param(r: &mut SetReader<'_>, index: usize, diag: &mut Diagnostics) -> Result<Parameter> {
    let start = r.pos();
    let tag = r.read_u32()?;
    let Some(kind) = ParamTag::from_u32(tag) else {
        diag.warn(Warning::UnknownParamTag { index, tag });
        r.seek(start)?;
        return Ok(Parameter::Bytes(r.read_bytes(PARAM_SIZE as usize)?));
    };
    Ok(match kind {
        ParamTag::Bool => Parameter::Bool(r.read_u32()? != 0),
        ParamTag::I32 => Parameter::I32(r.read_i32()?),
        ParamTag::F32 => Parameter::F32(r.read_f32()?),
        ParamTag::String => {
            let ptr = r.read_u32()? as u64;
            let _count = r.read_u32()?;
            Parameter::String(read_string(r, ptr)?)
        }
        ParamTag::Vector3 => Parameter::Vector3(r.read_vec3()?),
        ParamTag::U32 => Parameter::U32(r.read_u32()?),
    })
}

fn read_object(r: &mut SetReader<'_>, index: usize, diag: &mut Diagnostics) -> Result<SetObject> {
    let name_ptr = r.read_u32()? as u64;
    let type_ptr = r.read_u32()? as u64;
    let reserved = r.read_bytes(RESERVED_SIZE)?;
    let position = r.read_vec3()?;
    diag.check(index, "padding", 0, r.read_u32()? as u64);
    let rotation = r.read_quat()?;
    let param_count = r.read_u32()?;
    let params_ptr = r.read_u32()? as u64;

    let name = read_string(r, name_ptr)?;
    let object_type = read_string(r, type_ptr)?;
    let mut obj = SetObject::new(object_type, index as u32)
        .with_transform(Transform::new(position, rotation))
        .with_custom(CustomKey::Name, Parameter::String(name));
    if reserved.iter().any(|&b| b != 0) {
        obj.custom_data.insert(CustomKey::Reserved, Parameter::Bytes(reserved));
    }

    for i in 0..param_count as u64 {
        let param = r.with_jump(params_ptr + i * PARAM_SIZE, |r| read_param(r, index, diag))?;
        obj.parameters.push(param);
    }
    trace!(index, object_type = %obj.object_type, params = obj.parameters.len(), "read object");
    Ok(obj)
}

fn write_param(w: &mut SetWriter, value: &Parameter, label: &str) -> Result<()> {
    let start = w.pos();
    if let Parameter::Bytes(record) = value {
        if record.len() as u64 == PARAM_SIZE {
            w.write_bytes(record);
            return Ok(());
        }
    }
    let tag = ParamTag::of(value).ok_or_else(|| Error::UnsupportedType {
        format: FORMAT,
        data_type: value.data_type().to_string(),
    })?;
    w.write_u32(tag as u32);
    match value {
        Parameter::Bool(v) => w.write_u32(*v as u32),
        Parameter::String(s) => {
            if s.is_empty() {
                w.write_u32(0);
            } else {
                w.add_string(label, s)?;
            }
            w.write_u32(1);
        }
        other => w.write_scalar(other, FORMAT)?,
    }
    w.seek(start + PARAM_SIZE);
    Ok(())
}

impl SetCodec for Sonic06Codec {
    fn format(&self) -> SetFormat {
        SetFormat::Sonic06
    }

    fn load(&self, data: &[u8], _templates: Option<&Templates>, options: &LoadOptions) -> Result<Loaded> {
        let (header, mut r) = BinaHeader::read(data)?;
        let payload_end = header.payload_end(data)?;
        let mut diag = Diagnostics::default();

        r.jump_ahead(12)?;
        let name_ptr = r.read_u32()? as u64;
        let object_count = r.read_u32()?;
        let objects_ptr = r.read_u32()? as u64;
        let group_count = r.read_u32()?;
        let groups_ptr = r.read_u32()? as u64;

        let mut set = SetData::new(read_string(&mut r, name_ptr)?);
        set.header = Some(header);

        // Strings trail the group table, so the lowest string after it ends the raw bytes
        let mut string_targets = vec![name_ptr];
        for index in 0..object_count as usize {
            let offset = objects_ptr + index as u64 * OBJECT_SIZE;
            let result = r.with_jump(offset, |r| {
                let obj = read_object(r, index, &mut diag)?;
                let (name, ty) = r.with_jump(offset, |r| Ok((r.read_u32()? as u64, r.read_u32()? as u64)))?;
                Ok((obj, [name, ty]))
            });
            if let Some((obj, strings)) = diag.recover(options.policy, index, result)? {
                set.push(obj);
                string_targets.extend(strings);
            }
        }

        if group_count > 0 || groups_ptr != 0 {
            let start = r.base() + groups_ptr;
            let end = string_targets
                .iter()
                .map(|&p| r.base() + p)
                .filter(|&p| p > start)
                .fold(payload_end, u64::min);
            let bytes = r.with_jump(groups_ptr, |r| r.read_bytes(end.saturating_sub(start) as usize))?;
            set.group_table = Some(RawGroupTable { count: group_count, bytes });
        }

        debug!(objects = set.len(), groups = group_count, "loaded Sonic '06 set");
        Ok(diag.finish(set))
    }

    fn save(&self, set: &SetData) -> Result<Vec<u8>> {
        let header = container_header(set, BinaHeader::v1(Endian::Big));
        let mut w = header.begin(PointerWidth::U32);

        w.write_nulls(12);
        if set.name.is_empty() {
            w.write_u32(0);
        } else {
            w.add_string("set.name", &set.name)?;
        }
        w.write_u32(set.len() as u32);
        if set.is_empty() {
            w.write_u32(0);
        } else {
            w.add_offset("objects")?;
        }
        match &set.group_table {
            Some(groups) => {
                w.write_u32(groups.count);
                w.add_offset("groups")?;
            }
            None => {
                w.write_u32(0);
                w.write_u32(0);
            }
        }

        if !set.is_empty() {
            w.fill_in_offset_aligned("objects", 4)?;
        }
        let mut counters: HashMap<&str, usize> = HashMap::new();
        for (i, obj) in set.objects.iter().enumerate() {
            let counter = counters.entry(obj.object_type.as_str()).or_insert(0);
            let name = match obj.name() {
                Some(name) => name.to_string(),
                None => format!("{}{}", obj.object_type, counter),
            };
            *counter += 1;

            w.add_string(format!("obj{i}.name"), &name)?;
            w.add_string(format!("obj{i}.type"), &obj.object_type)?;
            let mut reserved = [0u8; RESERVED_SIZE];
            if let Some(bytes) = obj.custom(&CustomKey::Reserved).and_then(Parameter::as_bytes) {
                let n = bytes.len().min(RESERVED_SIZE);
                reserved[..n].copy_from_slice(&bytes[..n]);
            }
            w.write_bytes(&reserved);
            w.write_vec3(obj.transform.position);
            w.write_u32(0);
            w.write_quat(obj.transform.rotation);
            w.write_u32(obj.parameters.len() as u32);
            if obj.parameters.is_empty() {
                w.write_u32(0);
            } else {
                w.add_offset(format!("obj{i}.params"))?;
            }
        }

        for (i, obj) in set.objects.iter().enumerate() {
            if obj.parameters.is_empty() {
                continue;
            }
            w.fill_in_offset_aligned(&format!("obj{i}.params"), 4)?;
            for (j, param) in obj.parameters.iter().enumerate() {
                write_param(&mut w, param, &format!("obj{i}.p{j}"))?;
            }
        }

        if let Some(groups) = &set.group_table {
            w.fill_in_offset_aligned("groups", 4)?;
            w.write_bytes(&groups.bytes);
        }

        debug!(objects = set.len(), "saved Sonic '06 set");
        header.finish(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::{quat_from_euler, Vec3};

    fn object(ty: &str, name: &str) -> SetObject {
        SetObject::new(ty, 0)
            .with_transform(Transform::new(
                Vec3::new(100.0, 0.0, -50.0),
                quat_from_euler(Vec3::new(0.0, 1.0, 0.0)),
            ))
            .with_custom(CustomKey::Name, Parameter::String(name.into()))
    }

    fn sample() -> SetData {
        let mut set = SetData::new("test_stage");
        set.push(object("ring", "ring0").with_parameters(vec![
            Parameter::Bool(true),
            Parameter::I32(-4),
            Parameter::F32(0.25),
            Parameter::String("sound_ring".into()),
            Parameter::Vector3(Vec3::new(1.0, 2.0, 3.0)),
            Parameter::U32(77),
        ]));
        let mut spring = object("spring", "spring_a");
        spring.object_id = 1;
        spring.custom_data.insert(CustomKey::Reserved, Parameter::Bytes(vec![0xFF; 16]));
        set.push(spring);
        set
    }

    #[test]
    fn test_roundtrip() -> Result<()> {
        let set = sample();
        let bytes = Sonic06Codec.save(&set)?;
        assert_eq!(&bytes[0x18..0x1C], b"BINA");
        assert_eq!(bytes[0x17], b'B');

        let loaded = Sonic06Codec.load(&bytes, None, &LoadOptions::default())?;
        assert_eq!(loaded.set.name, "test_stage");
        assert_eq!(loaded.set.objects, set.objects);
        assert!(loaded.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_synthesized_names() -> Result<()> {
        let mut set = SetData::new("names");
        set.push(SetObject::new("ring", 0));
        set.push(SetObject::new("spring", 1));
        set.push(SetObject::new("ring", 2));
        let loaded = Sonic06Codec.load(&Sonic06Codec.save(&set)?, None, &LoadOptions::default())?;
        let names: Vec<_> = loaded.set.objects.iter().filter_map(SetObject::name).collect();
        assert_eq!(names, ["ring0", "spring0", "ring1"]);
        Ok(())
    }

    #[test]
    fn test_param_record_stride() -> Result<()> {
        let bytes = Sonic06Codec.save(&sample())?;
        let (_, mut r) = BinaHeader::read(&bytes)?;
        r.jump_to(0x14)?;
        let objects = r.read_u32()? as u64;
        r.jump_to(objects + 0x3C)?;
        let params = r.read_u32()? as u64;
        for (i, tag) in [0u32, 1, 2, 3, 4, 6].into_iter().enumerate() {
            r.jump_to(params + i as u64 * PARAM_SIZE)?;
            assert_eq!(r.read_u32()?, tag);
        }
        Ok(())
    }

    #[test]
    fn test_unknown_tag_skipped() -> Result<()> {
        let mut bytes = Sonic06Codec.save(&sample())?;
        let (_, mut r) = BinaHeader::read(&bytes)?;
        r.jump_to(0x14)?;
        let objects = r.read_u32()? as u64;
        r.jump_to(objects + 0x3C)?;
        let params = (r.base() + r.read_u32()? as u64) as usize;
        // Retag the I32 record
        bytes[params + 0x14..params + 0x18].copy_from_slice(&9u32.to_be_bytes());

        let loaded = Sonic06Codec.load(&bytes, None, &LoadOptions::default())?;
        let params = &loaded.set.objects[0].parameters;
        assert_eq!(params.len(), 6);
        assert_eq!(params[0], sample().objects[0].parameters[0]);
        assert_eq!(params[2], sample().objects[0].parameters[2]);
        let Parameter::Bytes(record) = &params[1] else {
            panic!("expected raw record, got {:?}", params[1]);
        };
        assert_eq!(record.len(), PARAM_SIZE as usize);
        assert_eq!(&record[..4], &9u32.to_be_bytes());
        assert!(matches!(
            loaded.warnings.as_slice(),
            [Warning::UnknownParamTag { index: 0, tag: 9 }]
        ));

        // The raw record is written back in place
        assert_eq!(Sonic06Codec.save(&loaded.set)?, bytes);
        Ok(())
    }

    #[test]
    fn test_group_table_carried() -> Result<()> {
        let mut set = sample();
        set.group_table = Some(RawGroupTable {
            count: 2,
            bytes: vec![0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 1],
        });
        let bytes = Sonic06Codec.save(&set)?;
        let loaded = Sonic06Codec.load(&bytes, None, &LoadOptions::default())?;
        assert_eq!(loaded.set.group_table, set.group_table);
        Ok(())
    }

    #[test]
    fn test_unsupported_param() {
        let mut set = SetData::new("bad");
        set.push(SetObject::new("ring", 0).with_parameters(vec![Parameter::U16(1)]));
        assert!(matches!(Sonic06Codec.save(&set), Err(Error::UnsupportedType { .. })));
    }
}
