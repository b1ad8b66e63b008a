//! Type-grouped indexed layout ("SOBJ").
//!
//! Payload after the BINA header:
//! ```text
//! 0x00 "SOBJ" (reversed on big-endian)
//! 0x04 u32  version (1)
//! 0x08 u32  object type count
//! 0x0C ptr  object type table
//! 0x10 u32  padding
//! 0x14 ptr  object offset table
//! 0x18 u32  object count
//! 0x1C u32  padding
//! 0x20 u32  total transform count
//! ```
//! The object offset table holds one pointer per object, by index. Each type
//! entry is `{name ptr, count, index table ptr}`; index tables are u16 object
//! indices. Objects are written grouped by type, then every transform block.
//!
//! Object record:
//! ```text
//! u32  unknown1 << 16 | id          (split after an endian-aware u32 read)
//! u32  unknown2
//! u32  unknown3
//! f32  unknown4
//! f32  range in
//! f32  range out
//! u32  parent index                 (Lost World)
//! ptr  transforms
//! u32  transform count
//! u32  reserved
//! u32  reserved, u32 reserved       (Lost World)
//! ...  template parameters
//! ```
//! A transform record is position and Euler rotation in radians; Lost World
//! adds a local position and local rotation pair.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::{
    container_header, custom_f32, custom_u16, custom_u32, custom_vec3, require_templates, Diagnostics,
    LoadOptions, Loaded, SetCodec, SetFormat, Warning,
};
use crate::bina::BinaHeader;
use crate::model::{CustomKey, DataType, ParamGroup, Parameter, SetData, SetObject, Transform};
use crate::stream::{SetReader, SetWriter};
use crate::template::{SetObjectType, TemplateParam, Templates};
use crate::util::{quat_from_euler, quat_to_euler, Endian, Error, PointerWidth, Result, Vec3};

const FORMAT: &str = "sobj";
const SIGNATURE: &[u8; 4] = b"SOBJ";
const VERSION: u32 = 1;
const DEFAULT_GROUP_PADDING: u32 = 4;

/// Game variant of the indexed layout.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SobjVariant {
    Colors,
    LostWorld,
}

impl SobjVariant {
    fn has_parent(self) -> bool {
        self == Self::LostWorld
    }

    fn has_local_transform(self) -> bool {
        self == Self::LostWorld
    }

    /// Position of the transform pointer inside an object record.
    fn transform_field(self) -> u64 {
        if self.has_parent() {
            0x1C
        } else {
            0x18
        }
    }

    fn default_header(self) -> BinaHeader {
        match self {
            Self::Colors => BinaHeader::v1(Endian::Big),
            Self::LostWorld => BinaHeader::v2(Endian::Little),
        }
    }

    /// Alignment applied before a parameter of `data_type`.
    ///
    /// Lost World aligns vector and rotation parameters to 16 bytes.
    pub fn alignment(self, data_type: DataType) -> usize {
        match data_type {
            DataType::Bool | DataType::Byte | DataType::Group => 1,
            DataType::I16 | DataType::U16 => 2,
            DataType::Vector3 | DataType::Vector4 | DataType::Quaternion if self == Self::LostWorld => 16,
            _ => 4,
        }
    }
}

/// Custom data every decoded object carries, at its default values.
pub fn default_custom_data(variant: SobjVariant) -> BTreeMap<CustomKey, Parameter> {
    let mut custom = BTreeMap::from([
        (CustomKey::Unknown(1), Parameter::U16(0)),
        (CustomKey::Unknown(2), Parameter::U32(0)),
        (CustomKey::Unknown(3), Parameter::U32(0)),
        (CustomKey::Unknown(4), Parameter::F32(0.0)),
        (CustomKey::RangeIn, Parameter::F32(0.0)),
        (CustomKey::RangeOut, Parameter::F32(0.0)),
    ]);
    if variant.has_parent() {
        custom.insert(CustomKey::Parent, Parameter::U32(0));
    }
    custom
}

/// Codec for both indexed variants.
#[derive(Clone, Copy, Debug)]
pub struct SobjCodec {
    variant: SobjVariant,
}

/// Array payload written after an object's parameter block.
struct DeferredArray {
    label: String,
    values: Vec<u32>,
}

impl SobjCodec {
    pub fn new(variant: SobjVariant) -> Self {
        Self { variant }
    }

    #[inline]
    pub fn variant(&self) -> SobjVariant {
        self.variant
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    fn read_object(
        &self,
        r: &mut SetReader<'_>,
        index: usize,
        object_type: &str,
        template: Option<&SetObjectType>,
        boundaries: &[u64],
        diag: &mut Diagnostics,
    ) -> Result<SetObject> {
        let packed = r.read_u32()?;
        let unknown1 = (packed >> 16) as u16;
        let id = packed & 0xFFFF;
        let unknown2 = r.read_u32()?;
        let unknown3 = r.read_u32()?;
        let unknown4 = r.read_f32()?;
        let range_in = r.read_f32()?;
        let range_out = r.read_f32()?;
        let parent = if self.variant.has_parent() { Some(r.read_u32()?) } else { None };
        let transforms_ptr = r.read_u32()? as u64;
        let transform_count = r.read_u32()?;
        diag.check(index, "reserved1", 0, r.read_u32()? as u64);
        if self.variant.has_parent() {
            diag.check(index, "reserved2", 0, r.read_u32()? as u64);
            diag.check(index, "reserved3", 0, r.read_u32()? as u64);
        }

        let mut obj = SetObject::new(object_type, id);
        obj.custom_data.insert(CustomKey::Unknown(1), Parameter::U16(unknown1));
        obj.custom_data.insert(CustomKey::Unknown(2), Parameter::U32(unknown2));
        obj.custom_data.insert(CustomKey::Unknown(3), Parameter::U32(unknown3));
        obj.custom_data.insert(CustomKey::Unknown(4), Parameter::F32(unknown4));
        obj.custom_data.insert(CustomKey::RangeIn, Parameter::F32(range_in));
        obj.custom_data.insert(CustomKey::RangeOut, Parameter::F32(range_out));
        if let Some(parent) = parent {
            obj.custom_data.insert(CustomKey::Parent, Parameter::U32(parent));
        }

        let param_start = r.pos();
        match template {
            Some(template) => {
                obj.parameters = template
                    .parameters
                    .iter()
                    .map(|p| self.read_param(r, p, index, diag))
                    .collect::<Result<_>>()?;
                if let Some(declared) = template.raw_byte_length() {
                    let consumed = r.pos() - param_start;
                    if (declared as u64) > consumed {
                        let leftover = r.read_bytes((declared as u64 - consumed) as usize)?;
                        obj.custom_data.insert(CustomKey::RawParamData, Parameter::Bytes(leftover));
                    }
                }
            }
            None => {
                diag.warn(Warning::MissingTemplate {
                    index,
                    object_type: object_type.to_string(),
                    offset: Some(param_start),
                });
                let end = boundaries.iter().copied().find(|&b| b > param_start);
                if let Some(end) = end {
                    let raw = r.read_bytes((end - param_start) as usize)?;
                    obj.custom_data.insert(CustomKey::RawParamData, Parameter::Bytes(raw));
                }
            }
        }

        r.jump_to(transforms_ptr)?;
        let mut child_locals = Vec::new();
        for i in 0..transform_count {
            let position = r.read_vec3()?;
            let rotation = quat_from_euler(r.read_vec3()?);
            let transform = Transform::new(position, rotation);
            if self.variant.has_local_transform() {
                let local_pos = r.read_vec3()?;
                let local_rot = r.read_vec3()?;
                if i == 0 {
                    if local_pos != Vec3::ZERO {
                        obj.custom_data.insert(CustomKey::LocalPosition, Parameter::Vector3(local_pos));
                    }
                    if local_rot != Vec3::ZERO {
                        obj.custom_data.insert(CustomKey::LocalRotation, Parameter::Vector3(local_rot));
                    }
                } else {
                    child_locals.extend([Parameter::Vector3(local_pos), Parameter::Vector3(local_rot)]);
                }
            }
            if i == 0 {
                obj.transform = transform;
            } else {
                obj.children.push(transform);
            }
        }
        if child_locals.iter().any(|p| p.as_vec3() != Some(Vec3::ZERO)) {
            obj.custom_data.insert(
                CustomKey::ChildLocalTransforms,
                Parameter::Group(ParamGroup::new(child_locals, None)),
            );
        }
        trace!(index, object_type, id, children = obj.children.len(), "read object");
        Ok(obj)
    }

    fn read_param(
        &self,
        r: &mut SetReader<'_>,
        param: &TemplateParam,
        index: usize,
        diag: &mut Diagnostics,
    ) -> Result<Parameter> {
        let data_type = param.data_type;
        r.fix_padding(self.variant.alignment(data_type))?;
        Ok(match data_type {
            DataType::String => {
                let ptr = r.read_u32()? as u64;
                diag.check(index, "string padding", 0, r.read_u32()? as u64);
                if ptr == 0 {
                    Parameter::String(String::new())
                } else {
                    Parameter::String(r.read_cstring_at(ptr)?)
                }
            }
            DataType::U32Array => {
                let ptr = r.read_u32()? as u64;
                let len = r.read_u32()?;
                let dup = r.read_u32()?;
                if len != dup {
                    diag.warn(Warning::CountMismatch {
                        what: format!("object {index} parameter {}", param.name),
                        first: len as u64,
                        second: dup as u64,
                    });
                }
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
                    .map(|c| self.read_param(r, c, index, diag))
                    .collect::<Result<_>>()?;
                r.fix_padding(param.padding.unwrap_or(DEFAULT_GROUP_PADDING) as usize)?;
                Parameter::Group(ParamGroup::new(params, param.padding))
            }
            DataType::Bytes | DataType::ObjectReferenceArray => {
                return Err(Error::UnsupportedType {
                    format: FORMAT,
                    data_type: data_type.to_string(),
                })
            }
            scalar => r.read_scalar(scalar, FORMAT)?,
        })
    }

    // ------------------------------------------------------------------
    // Write
    // ------------------------------------------------------------------

    fn write_object(&self, w: &mut SetWriter, index: usize, obj: &SetObject) -> Result<()> {
        let label = format!("obj{index}");
        w.fill_in_offset_aligned(&label, 4)?;

        let id = u16::try_from(obj.object_id)
            .map_err(|_| Error::invalid(format!("object id {} does not fit in 16 bits", obj.object_id)))?;
        let unknown1 = custom_u16(obj, CustomKey::Unknown(1), 0);
        w.write_u32((unknown1 as u32) << 16 | id as u32);
        w.write_u32(custom_u32(obj, CustomKey::Unknown(2), 0));
        w.write_u32(custom_u32(obj, CustomKey::Unknown(3), 0));
        w.write_f32(custom_f32(obj, CustomKey::Unknown(4), 0.0));
        w.write_f32(custom_f32(obj, CustomKey::RangeIn, 0.0));
        w.write_f32(custom_f32(obj, CustomKey::RangeOut, 0.0));
        if self.variant.has_parent() {
            w.write_u32(custom_u32(obj, CustomKey::Parent, 0));
        }
        w.add_offset(format!("{label}.transforms"))?;
        w.write_u32(obj.transform_count() as u32);
        w.write_u32(0);
        if self.variant.has_parent() {
            w.write_u32(0);
            w.write_u32(0);
        }

        let mut deferred = Vec::new();
        for (i, param) in obj.parameters.iter().enumerate() {
            self.write_param(w, param, &format!("{label}.p{i}"), &mut deferred)?;
        }
        if let Some(raw) = obj.custom(&CustomKey::RawParamData).and_then(Parameter::as_bytes) {
            w.write_bytes(raw);
        }
        for array in deferred {
            w.fill_in_offset_aligned(&array.label, 4)?;
            for value in array.values {
                w.write_u32(value);
            }
        }
        Ok(())
    }

    fn write_param(
        &self,
        w: &mut SetWriter,
        value: &Parameter,
        label: &str,
        deferred: &mut Vec<DeferredArray>,
    ) -> Result<()> {
        w.fix_padding(self.variant.alignment(value.data_type()));
        match value {
            Parameter::String(s) => {
                if s.is_empty() {
                    w.write_u32(0);
                } else {
                    w.add_string(label, s)?;
                }
                w.write_u32(0);
            }
            Parameter::U32Array(values) => {
                if values.is_empty() {
                    w.write_u32(0);
                } else {
                    w.add_offset(label)?;
                    deferred.push(DeferredArray {
                        label: label.to_string(),
                        values: values.clone(),
                    });
                }
                w.write_u32(values.len() as u32);
                w.write_u32(values.len() as u32);
            }
            Parameter::Group(group) => {
                for (i, p) in group.params.iter().enumerate() {
                    self.write_param(w, p, &format!("{label}.{i}"), deferred)?;
                }
                w.fix_padding(group.padding.unwrap_or(DEFAULT_GROUP_PADDING) as usize);
            }
            other => w.write_scalar(other, FORMAT)?,
        }
        Ok(())
    }

    fn write_transforms(&self, w: &mut SetWriter, index: usize, obj: &SetObject) -> Result<()> {
        w.fill_in_offset_aligned(&format!("obj{index}.transforms"), 4)?;
        w.write_vec3(obj.transform.position);
        w.write_vec3(quat_to_euler(obj.transform.rotation));
        if self.variant.has_local_transform() {
            w.write_vec3(custom_vec3(obj, CustomKey::LocalPosition));
            w.write_vec3(custom_vec3(obj, CustomKey::LocalRotation));
        }
        let child_locals: &[Parameter] = match obj.custom(&CustomKey::ChildLocalTransforms) {
            Some(Parameter::Group(group)) => group.params.as_slice(),
            _ => &[],
        };
        let local = |i: usize| child_locals.get(i).and_then(Parameter::as_vec3).unwrap_or(Vec3::ZERO);
        for (i, child) in obj.children.iter().enumerate() {
            w.write_vec3(child.position);
            w.write_vec3(quat_to_euler(child.rotation));
            if self.variant.has_local_transform() {
                w.write_vec3(local(2 * i));
                w.write_vec3(local(2 * i + 1));
            }
        }
        Ok(())
    }
}

impl SetCodec for SobjCodec {
    fn format(&self) -> SetFormat {
        match self.variant {
            SobjVariant::Colors => SetFormat::Colors,
            SobjVariant::LostWorld => SetFormat::LostWorld,
        }
    }

    fn load(&self, data: &[u8], templates: Option<&Templates>, options: &LoadOptions) -> Result<Loaded> {
        let templates = require_templates(templates, FORMAT)?;
        let (header, mut r) = BinaHeader::read(data)?;
        let mut diag = Diagnostics::default();

        r.expect_signature(SIGNATURE)?;
        let version = r.read_u32()?;
        if version != VERSION {
            return Err(Error::UnsupportedVersion(format!("SOBJ v{version}")));
        }
        let type_count = r.read_u32()?;
        let type_table = r.read_u32()? as u64;
        let _padding = r.read_u32()?;
        let object_table = r.read_u32()? as u64;
        let object_count = r.read_u32()?;
        let _padding = r.read_u32()?;
        let transform_total = r.read_u32()?;

        let object_offsets: Vec<u64> = r.with_jump(object_table, |r| {
            (0..object_count).map(|_| r.read_u32().map(u64::from)).collect()
        })?;

        let mut types = Vec::new();
        r.jump_to(type_table)?;
        for _ in 0..type_count {
            let name_ptr = r.read_u32()? as u64;
            let count = r.read_u32()?;
            let indices_ptr = r.read_u32()? as u64;
            let name = r.read_cstring_at(name_ptr)?;
            let indices: Vec<u16> =
                r.with_jump(indices_ptr, |r| (0..count).map(|_| r.read_u16()).collect())?;
            types.push((name, indices));
        }

        let grouped: u64 = types.iter().map(|(_, i)| i.len() as u64).sum();
        if grouped != object_count as u64 {
            diag.warn(Warning::CountMismatch {
                what: "object type table".into(),
                first: object_count as u64,
                second: grouped,
            });
        }

        // Object and transform starts bound the raw bytes kept for objects without a template.
        let base = r.base();
        let mut boundaries = Vec::with_capacity(object_offsets.len() * 2);
        let mut transform_sum = 0u64;
        for &offset in &object_offsets {
            boundaries.push(base + offset);
            let (ptr, count) = r.with_jump(offset + self.variant.transform_field(), |r| {
                Ok((r.read_u32()? as u64, r.read_u32()? as u64))
            })?;
            boundaries.push(base + ptr);
            transform_sum += count;
        }
        boundaries.sort_unstable();
        if transform_sum != transform_total as u64 {
            diag.warn(Warning::CountMismatch {
                what: "transform count".into(),
                first: transform_total as u64,
                second: transform_sum,
            });
        }

        let mut slots: Vec<Option<SetObject>> = vec![None; object_offsets.len()];
        for (object_type, indices) in &types {
            let template = templates.get(object_type);
            for &index in indices {
                let index = index as usize;
                let offset = *object_offsets
                    .get(index)
                    .ok_or_else(|| Error::invalid(format!("object index {index} out of range")))?;
                let result = r.with_jump(offset, |r| {
                    self.read_object(r, index, object_type, template, &boundaries, &mut diag)
                });
                if let Some(obj) = diag.recover(options.policy, index, result)? {
                    slots[index] = Some(obj);
                }
            }
        }

        let set = SetData {
            objects: slots.into_iter().flatten().collect(),
            header: Some(header),
            ..Default::default()
        };
        debug!(objects = set.len(), types = types.len(), "loaded SOBJ set");
        Ok(diag.finish(set))
    }

    fn save(&self, set: &SetData) -> Result<Vec<u8>> {
        let header = container_header(set, self.variant.default_header());
        let mut w = header.begin(PointerWidth::U32);
        let groups = set.group_by_type();
        let transform_total: usize = set.objects.iter().map(SetObject::transform_count).sum();

        w.write_signature(SIGNATURE);
        w.write_u32(VERSION);
        w.write_u32(groups.len() as u32);
        w.add_offset("types")?;
        w.write_u32(0);
        w.add_offset("objects")?;
        w.write_u32(set.len() as u32);
        w.write_u32(0);
        w.write_u32(transform_total as u32);

        w.fill_in_offset_aligned("objects", 4)?;
        w.add_offset_table("obj", set.len())?;

        w.fill_in_offset_aligned("types", 4)?;
        for (i, (name, indices)) in groups.iter().enumerate() {
            w.add_string(format!("type{i}.name"), name)?;
            w.write_u32(indices.len() as u32);
            w.add_offset(format!("type{i}.indices"))?;
        }
        for (i, (_, indices)) in groups.iter().enumerate() {
            w.fill_in_offset_aligned(&format!("type{i}.indices"), 4)?;
            for &index in indices {
                let index = u16::try_from(index)
                    .map_err(|_| Error::CapacityExceeded { count: set.len(), max: u16::MAX as usize + 1 })?;
                w.write_u16(index);
            }
        }

        for (_, indices) in &groups {
            for &index in indices {
                self.write_object(&mut w, index, &set.objects[index])?;
            }
        }
        for (_, indices) in &groups {
            for &index in indices {
                self.write_transforms(&mut w, index, &set.objects[index])?;
            }
        }

        debug!(objects = set.len(), types = groups.len(), "saved SOBJ set");
        header.finish(w)
    }
}
