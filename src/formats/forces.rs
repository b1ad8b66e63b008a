//! Pointer-based variable-length layout (".gedit").
//!
//! Every pointer and count is 64 bits wide. Payload after the BINA v2 header:
//! ```text
//! 0x00 [16] zero
//! 0x10 ptr  object table
//! 0x18 u64  object count
//! 0x20 u64  object count (duplicate)
//! 0x28 u64  zero
//! ```
//! Object record (16-byte aligned):
//! ```text
//! 0x00 u64  zero
//! 0x08 ptr  type name
//! 0x10 ptr  object name
//! 0x18 u16  id, u16 group id, u16 parent id, u16 parent group id
//! 0x20 vec3 position, vec3 rotation (Euler radians)
//! 0x38 vec3 child position offset, vec3 child rotation offset
//! 0x50 ptr  extra parameter table
//! 0x58 u64  extra count, u64 extra count (duplicate)
//! 0x68 u64  zero
//! 0x70 ptr  template parameters
//! ```
//! An extra parameter is `{u64 zero, name ptr, u64 length, data ptr}`; the
//! bytes are interpreted by name.

use tracing::{debug, trace};

use super::{
    container_header, custom_f32, custom_u16, custom_u32, custom_vec3, require_templates, Diagnostics,
    LoadOptions, Loaded, SetCodec, SetFormat, Warning,
};
use crate::bina::BinaHeader;
use crate::model::{CustomKey, DataType, ObjectReference, ParamGroup, Parameter, SetData, SetObject, Transform};
use crate::stream::{SetReader, SetWriter};
use crate::template::{TemplateParam, Templates};
use crate::util::{quat_from_euler, quat_to_euler, Endian, Error, PointerWidth, Result, Vec3};

const FORMAT: &str = "forces";
const DEFAULT_GROUP_PADDING: u32 = 16;
const OBJECT_ALIGN: usize = 16;

/// Extra parameter holding the spawn range as two floats.
pub const RANGE_SPAWNING: &str = "RangeSpawning";

/// Alignment applied before a parameter of `data_type`.
pub fn alignment(data_type: DataType) -> usize {
    match data_type {
        DataType::Bool | DataType::Byte | DataType::Group | DataType::Bytes => 1,
        DataType::I16 | DataType::U16 => 2,
        DataType::I32 | DataType::U32 | DataType::F32 | DataType::ObjectReference => 4,
        DataType::Vector2 | DataType::String | DataType::U32Array | DataType::ObjectReferenceArray => 8,
        DataType::Vector3 | DataType::Vector4 | DataType::Quaternion => 16,
    }
}

/// Codec for the pointer-based layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct ForcesCodec;

enum ExtraValue {
    Range(f32, f32),
    Raw(Vec<u8>),
}

enum DeferredData {
    References(Vec<ObjectReference>),
    Words(Vec<u32>),
}

struct Deferred {
    label: String,
    data: DeferredData,
}

// ----------------------------------------------------------------------
// Read
// ----------------------------------------------------------------------

fn read_object(
    r: &mut SetReader<'_>,
    index: usize,
    templates: &Templates,
    diag: &mut Diagnostics,
) -> Result<Option<SetObject>> {
    diag.check(index, "padding", 0, r.read_u64()?);
    let type_ptr = r.read_offset()?;
    let name_ptr = r.read_offset()?;
    let object_type = r.read_cstring_at(type_ptr)?;
    let name = if name_ptr == 0 { String::new() } else { r.read_cstring_at(name_ptr)? };

    let id = r.read_u16()?;
    let group_id = r.read_u16()?;
    let parent_id = r.read_u16()?;
    let parent_group_id = r.read_u16()?;
    let position = r.read_vec3()?;
    let rotation = r.read_vec3()?;
    let child_pos = r.read_vec3()?;
    let child_rot = r.read_vec3()?;

    let extras_ptr = r.read_offset()?;
    let extras_count = r.read_u64()?;
    let extras_dup = r.read_u64()?;
    if extras_count != extras_dup {
        diag.warn(Warning::CountMismatch {
            what: format!("object {index} extra parameters"),
            first: extras_count,
            second: extras_dup,
        });
    }
    diag.check(index, "padding", 0, r.read_u64()?);
    let params_ptr = r.read_offset()?;

    let Some(template) = templates.get(&object_type) else {
        diag.warn(Warning::MissingTemplate {
            index,
            object_type,
            offset: Some(r.absolute(params_ptr)?),
        });
        return Ok(None);
    };

    let mut obj = SetObject::new(&object_type, id as u32)
        .with_transform(Transform::new(position, quat_from_euler(rotation)));
    if !name.is_empty() {
        obj.custom_data.insert(CustomKey::Name, Parameter::String(name));
    }
    for (key, value) in [
        (CustomKey::GroupId, group_id),
        (CustomKey::ParentId, parent_id),
        (CustomKey::ParentGroupId, parent_group_id),
    ] {
        if value != 0 {
            obj.custom_data.insert(key, Parameter::U16(value));
        }
    }
    if child_pos != Vec3::ZERO {
        obj.custom_data.insert(CustomKey::ChildPosOffset, Parameter::Vector3(child_pos));
    }
    if child_rot != Vec3::ZERO {
        obj.custom_data.insert(CustomKey::ChildRotOffset, Parameter::Vector3(child_rot));
    }

    if extras_count > 0 {
        r.jump_to(extras_ptr)?;
        for _ in 0..extras_count {
            diag.check(index, "extra padding", 0, r.read_u64()?);
            let name_ptr = r.read_offset()?;
            let len = r.read_u64()?;
            let data_ptr = r.read_offset()?;
            let name = r.read_cstring_at(name_ptr)?;
            if name == RANGE_SPAWNING && len == 8 {
                let (range_in, range_out) = r.with_jump(data_ptr, |r| Ok((r.read_f32()?, r.read_f32()?)))?;
                obj.custom_data.insert(CustomKey::RangeIn, Parameter::F32(range_in));
                obj.custom_data.insert(CustomKey::RangeOut, Parameter::F32(range_out));
            } else {
                let len = usize::try_from(len).map_err(|_| Error::OutOfBounds { offset: len, len: r.len() })?;
                let data = r.with_jump(data_ptr, |r| r.read_bytes(len))?;
                obj.custom_data.insert(CustomKey::Extra(name), Parameter::Bytes(data));
            }
        }
    }

    r.jump_to(params_ptr)?;
    let start = r.pos();
    obj.parameters = template
        .parameters
        .iter()
        .map(|p| read_param(r, p, index, diag))
        .collect::<Result<_>>()?;
    let consumed = r.pos() - start;
    if let Some(declared) = template.raw_byte_length() {
        if declared as u64 > consumed {
            obj.custom_data.insert(CustomKey::RawByteLength, Parameter::U32(declared));
        }
    }
    trace!(index, object_type = %object_type, id, params = obj.parameters.len(), "read object");
    Ok(Some(obj))
}

fn read_param(r: &mut SetReader<'_>, param: &TemplateParam, index: usize, diag: &mut Diagnostics) -> Result<Parameter> {
    let data_type = param.data_type;
    r.fix_padding(alignment(data_type))?;
    Ok(match data_type {
        DataType::String => {
            let ptr = r.read_offset()?;
            diag.check(index, "string padding", 0, r.read_u64()?);
            if ptr == 0 {
                Parameter::String(String::new())
            } else {
                Parameter::String(r.read_cstring_at(ptr)?)
            }
        }
        DataType::ObjectReferenceArray => {
            let (ptr, len) = read_array_header(r, index, &param.name, diag)?;
            let refs = if len == 0 {
                Vec::new()
            } else {
                r.with_jump(ptr, |r| (0..len).map(|_| r.read_object_reference()).collect::<Result<Vec<_>>>())?
            };
            Parameter::ObjectReferenceArray(refs)
        }
        DataType::U32Array => {
            let (ptr, len) = read_array_header(r, index, &param.name, diag)?;
            let values = if len == 0 {
                Vec::new()
            } else {
                r.with_jump(ptr, |r| (0..len).map(|_| r.read_u32()).collect::<Result<Vec<_>>>())?
            };
            Parameter::U32Array(values)
        }
        DataType::Group => {
            let params = param
                .children
                .iter()
                .map(|c| read_param(r, c, index, diag))
                .collect::<Result<_>>()?;
            r.fix_padding(param.padding.unwrap_or(DEFAULT_GROUP_PADDING) as usize)?;
            Parameter::Group(ParamGroup::new(params, param.padding))
        }
        DataType::Bytes => {
            return Err(Error::UnsupportedType {
                format: FORMAT,
                data_type: data_type.to_string(),
            })
        }
        scalar => r.read_scalar(scalar, FORMAT)?,
    })
}

fn read_array_header(r: &mut SetReader<'_>, index: usize, name: &str, diag: &mut Diagnostics) -> Result<(u64, u64)> {
    let ptr = r.read_offset()?;
    let len = r.read_u64()?;
    let dup = r.read_u64()?;
    if len != dup {
        diag.warn(Warning::CountMismatch {
            what: format!("object {index} parameter {name}"),
            first: len,
            second: dup,
        });
    }
    Ok((ptr, len))
}

// ----------------------------------------------------------------------
// Write
// ----------------------------------------------------------------------

/// Extra parameters for `obj`: everything in its custom data that is not a
/// fixed field of the object record.
fn collect_extras(obj: &SetObject) -> Vec<(String, ExtraValue)> {
    let mut extras = Vec::new();
    if obj.custom(&CustomKey::RangeIn).is_some() || obj.custom(&CustomKey::RangeOut).is_some() {
        extras.push((
            RANGE_SPAWNING.to_string(),
            ExtraValue::Range(
                custom_f32(obj, CustomKey::RangeIn, 0.0),
                custom_f32(obj, CustomKey::RangeOut, 0.0),
            ),
        ));
    }
    for (key, value) in &obj.custom_data {
        match key {
            CustomKey::Name
            | CustomKey::GroupId
            | CustomKey::ParentId
            | CustomKey::ParentGroupId
            | CustomKey::ChildPosOffset
            | CustomKey::ChildRotOffset
            | CustomKey::RawByteLength
            | CustomKey::RangeIn
            | CustomKey::RangeOut => {}
            CustomKey::Extra(name) => match value.as_bytes() {
                Some(bytes) => extras.push((name.clone(), ExtraValue::Raw(bytes.to_vec()))),
                None => debug!(name = %name, data_type = %value.data_type(), "extra parameter is not raw bytes, skipped"),
            },
            CustomKey::Parent
            | CustomKey::RawParamData
            | CustomKey::LocalPosition
            | CustomKey::LocalRotation
            | CustomKey::ChildLocalTransforms
            | CustomKey::LinkId
            | CustomKey::RenderDistance
            | CustomKey::Unknown(_)
            | CustomKey::Reserved => debug!(%key, "custom data has no slot in this format, skipped"),
        }
    }
    extras
}

fn write_object(w: &mut SetWriter, index: usize, obj: &SetObject) -> Result<()> {
    let label = format!("obj{index}");
    let id = u16::try_from(obj.object_id)
        .map_err(|_| Error::invalid(format!("object id {} does not fit in 16 bits", obj.object_id)))?;
    let extras = collect_extras(obj);

    w.fill_in_offset_aligned(&label, OBJECT_ALIGN)?;
    w.write_u64(0);
    w.add_string(format!("{label}.type"), &obj.object_type)?;
    match obj.name() {
        Some(name) if !name.is_empty() => w.add_string(format!("{label}.name"), name)?,
        _ => w.write_u64(0),
    }
    w.write_u16(id);
    w.write_u16(custom_u16(obj, CustomKey::GroupId, 0));
    w.write_u16(custom_u16(obj, CustomKey::ParentId, 0));
    w.write_u16(custom_u16(obj, CustomKey::ParentGroupId, 0));
    w.write_vec3(obj.transform.position);
    w.write_vec3(quat_to_euler(obj.transform.rotation));
    w.write_vec3(custom_vec3(obj, CustomKey::ChildPosOffset));
    w.write_vec3(custom_vec3(obj, CustomKey::ChildRotOffset));

    if extras.is_empty() {
        w.write_u64(0);
    } else {
        w.add_offset(format!("{label}.extras"))?;
    }
    w.write_u64(extras.len() as u64);
    w.write_u64(extras.len() as u64);
    w.write_u64(0);
    w.add_offset(format!("{label}.params"))?;

    if !extras.is_empty() {
        w.fill_in_offset_aligned(&format!("{label}.extras"), 8)?;
        for (i, (name, value)) in extras.iter().enumerate() {
            let len = match value {
                ExtraValue::Range(..) => 8,
                ExtraValue::Raw(bytes) => bytes.len(),
            };
            w.write_u64(0);
            w.add_string(format!("{label}.extra{i}.name"), name)?;
            w.write_u64(len as u64);
            w.add_offset(format!("{label}.extra{i}.data"))?;
        }
        for (i, (_, value)) in extras.iter().enumerate() {
            w.fill_in_offset_aligned(&format!("{label}.extra{i}.data"), 8)?;
            match value {
                ExtraValue::Range(range_in, range_out) => {
                    w.write_f32(*range_in);
                    w.write_f32(*range_out);
                }
                ExtraValue::Raw(bytes) => w.write_bytes(bytes),
            }
        }
    }

    w.fill_in_offset_aligned(&format!("{label}.params"), OBJECT_ALIGN)?;
    let start = w.pos();
    let mut deferred = Vec::new();
    for (i, param) in obj.parameters.iter().enumerate() {
        write_param(w, param, &format!("{label}.p{i}"), &mut deferred)?;
    }
    let declared = custom_u32(obj, CustomKey::RawByteLength, 0) as u64;
    let written = w.pos() - start;
    if declared > written {
        w.write_nulls((declared - written) as usize);
    }

    for item in deferred {
        w.fill_in_offset_aligned(&item.label, 8)?;
        match item.data {
            DeferredData::References(refs) => refs.into_iter().for_each(|r| w.write_object_reference(r)),
            DeferredData::Words(values) => values.into_iter().for_each(|v| w.write_u32(v)),
        }
    }
    Ok(())
}

fn write_param(w: &mut SetWriter, value: &Parameter, label: &str, deferred: &mut Vec<Deferred>) -> Result<()> {
    w.fix_padding(alignment(value.data_type()));
    match value {
        Parameter::String(s) => {
            if s.is_empty() {
                w.write_u64(0);
            } else {
                w.add_string(label, s)?;
            }
            w.write_u64(0);
        }
        Parameter::ObjectReferenceArray(refs) => {
            write_array_header(w, label, refs.len())?;
            if !refs.is_empty() {
                deferred.push(Deferred {
                    label: label.to_string(),
                    data: DeferredData::References(refs.clone()),
                });
            }
        }
        Parameter::U32Array(values) => {
            write_array_header(w, label, values.len())?;
            if !values.is_empty() {
                deferred.push(Deferred {
                    label: label.to_string(),
                    data: DeferredData::Words(values.clone()),
                });
            }
        }
        Parameter::Group(group) => {
            for (i, p) in group.params.iter().enumerate() {
                write_param(w, p, &format!("{label}.{i}"), deferred)?;
            }
            w.fix_padding(group.padding.unwrap_or(DEFAULT_GROUP_PADDING) as usize);
        }
        other => w.write_scalar(other, FORMAT)?,
    }
    Ok(())
}

fn write_array_header(w: &mut SetWriter, label: &str, len: usize) -> Result<()> {
    if len == 0 {
        w.write_u64(0);
    } else {
        w.add_offset(label)?;
    }
    w.write_u64(len as u64);
    w.write_u64(len as u64);
    Ok(())
}

impl SetCodec for ForcesCodec {
    fn format(&self) -> SetFormat {
        SetFormat::Forces
    }

    fn load(&self, data: &[u8], templates: Option<&Templates>, options: &LoadOptions) -> Result<Loaded> {
        let templates = require_templates(templates, FORMAT)?;
        let (header, r) = BinaHeader::read(data)?;
        let mut r = r.with_pointer_width(PointerWidth::U64);
        let mut diag = Diagnostics::default();

        r.jump_ahead(16)?;
        let object_table = r.read_offset()?;
        let count = r.read_u64()?;
        let dup = r.read_u64()?;
        if count != dup {
            diag.warn(Warning::CountMismatch {
                what: "object table".into(),
                first: count,
                second: dup,
            });
        }

        let offsets: Vec<u64> = r.with_jump(object_table, |r| (0..count).map(|_| r.read_offset()).collect())?;
        let mut objects = Vec::with_capacity(offsets.len());
        for (index, &offset) in offsets.iter().enumerate() {
            let result = r.with_jump(offset, |r| read_object(r, index, templates, &mut diag));
            if let Some(Some(obj)) = diag.recover(options.policy, index, result)? {
                objects.push(obj);
            }
        }

        debug!(objects = objects.len(), declared = count, "loaded Forces set");
        Ok(diag.finish(SetData {
            objects,
            header: Some(header),
            ..Default::default()
        }))
    }

    fn save(&self, set: &SetData) -> Result<Vec<u8>> {
        let header = container_header(set, BinaHeader::v2(Endian::Little));
        let mut w = header.begin(PointerWidth::U64);

        w.write_nulls(16);
        w.add_offset("objects")?;
        w.write_u64(set.len() as u64);
        w.write_u64(set.len() as u64);
        w.write_u64(0);

        w.fill_in_offset_aligned("objects", OBJECT_ALIGN)?;
        w.add_offset_table("obj", set.len())?;
        for (index, obj) in set.objects.iter().enumerate() {
            write_object(&mut w, index, obj)?;
        }

        debug!(objects = set.len(), "saved Forces set");
        header.finish(w)
    }
}
