//! Fixed-slot layout.
//!
//! A big-endian raw file without a container header. 2048 slots of 0x30
//! bytes hold placement and type; a second region of 0x24-byte entries holds
//! template parameters, addressed by the misc index stored in each slot.
//!
//! Slot:
//! ```text
//! 0x00 vec3     position
//! 0x0C i32 x3   rotation, binary angle units (angle * 180 / 32768 degrees)
//! 0x18 [4]      00 09 00 09
//! 0x1C [12]     zero
//! 0x28 u8       object list
//! 0x29 u8       object type
//! 0x2A u8       link id
//! 0x2B u8       render distance
//! 0x2C u16      zero
//! 0x2E u16      misc index
//! ```
//! Misc entry `k` starts at `0x18000 + k * 0x24` with `{list, type, u16 0}`
//! followed by 0x20 bytes of parameters. Entry 0 is a reserved null entry.
//! The slot index is the object id, and slot `i` points at misc entry `i + 1`.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::{custom_u8, require_templates, Diagnostics, LoadOptions, Loaded, SetCodec, SetFormat, Warning};
use crate::model::{CustomKey, DataType, ParamGroup, Parameter, SetData, SetObject, Transform};
use crate::stream::{SetReader, SetWriter};
use crate::template::{TemplateParam, Templates};
use crate::util::{quat_from_bams, quat_to_bams, Endian, Error, PointerWidth, Result};

const FORMAT: &str = "heroes";

/// Number of object slots.
pub const MAX_OBJECTS: usize = 2048;
pub const SLOT_SIZE: u64 = 0x30;
/// Start of the misc parameter region.
pub const MISC_OFFSET: u64 = SLOT_SIZE * MAX_OBJECTS as u64;
pub const MISC_ENTRY_SIZE: u64 = 0x24;
const MISC_HEADER_SIZE: u64 = 4;
/// Parameter bytes available in one misc entry.
pub const MISC_PARAM_SIZE: usize = (MISC_ENTRY_SIZE - MISC_HEADER_SIZE) as usize;
const UNKNOWN_PAIR: [u8; 4] = [0x00, 0x09, 0x00, 0x09];
const DEFAULT_GROUP_PADDING: u32 = 4;

/// Custom data every decoded object carries, at its default values.
pub fn default_custom_data() -> BTreeMap<CustomKey, Parameter> {
    BTreeMap::from([
        (CustomKey::LinkId, Parameter::Byte(0)),
        (CustomKey::RenderDistance, Parameter::Byte(0)),
    ])
}

/// Split a `"{list:02x}-{type:02x}"` type name.
pub fn parse_type_name(name: &str) -> Result<(u8, u8)> {
    let invalid = || Error::InvalidTypeName(name.to_string());
    let (list, ty) = name.split_once('-').ok_or_else(invalid)?;
    let list = u8::from_str_radix(list, 16).map_err(|_| invalid())?;
    let ty = u8::from_str_radix(ty, 16).map_err(|_| invalid())?;
    Ok((list, ty))
}

pub fn type_name(list: u8, ty: u8) -> String {
    format!("{list:02x}-{ty:02x}")
}

fn alignment(data_type: DataType) -> usize {
    match data_type {
        DataType::Bool | DataType::Byte | DataType::Group => 1,
        DataType::I16 | DataType::U16 => 2,
        _ => 4,
    }
}

fn read_param(r: &mut SetReader<'_>, param: &TemplateParam) -> Result<Parameter> {
    r.fix_padding(alignment(param.data_type))?;
    match param.data_type {
        DataType::Group => {
            let params = param.children.iter().map(|c| read_param(r, c)).collect::<Result<_>>()?;
            r.fix_padding(param.padding.unwrap_or(DEFAULT_GROUP_PADDING) as usize)?;
            Ok(Parameter::Group(ParamGroup::new(params, param.padding)))
        }
        scalar => r.read_scalar(scalar, FORMAT),
    }
}

fn write_param(w: &mut SetWriter, value: &Parameter) -> Result<()> {
    w.fix_padding(alignment(value.data_type()));
    match value {
        Parameter::Group(group) => {
            for p in &group.params {
                write_param(w, p)?;
            }
            w.fix_padding(group.padding.unwrap_or(DEFAULT_GROUP_PADDING) as usize);
            Ok(())
        }
        other => w.write_scalar(other, FORMAT),
    }
}

/// Codec for the fixed-slot layout.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeroesCodec;

impl HeroesCodec {
    fn read_slot(
        r: &mut SetReader<'_>,
        slot: usize,
        templates: &Templates,
        diag: &mut Diagnostics,
    ) -> Result<Option<SetObject>> {
        let start = slot as u64 * SLOT_SIZE;
        r.seek(start + 0x28)?;
        let list = r.read_u8()?;
        let ty = r.read_u8()?;
        if list == 0 && ty == 0 {
            return Ok(None);
        }
        let link_id = r.read_u8()?;
        let render_distance = r.read_u8()?;
        diag.check(slot, "slot padding", 0, r.read_u16()? as u64);
        let misc_index = r.read_u16()? as u64;

        let object_type = type_name(list, ty);
        let Some(template) = templates.get(&object_type) else {
            diag.warn(Warning::MissingTemplate {
                index: slot,
                object_type,
                offset: Some(MISC_OFFSET + misc_index * MISC_ENTRY_SIZE + MISC_HEADER_SIZE),
            });
            return Ok(None);
        };

        r.seek(start)?;
        let position = r.read_vec3()?;
        let rotation = quat_from_bams([r.read_i32()?, r.read_i32()?, r.read_i32()?]);
        let pair = r.read_bytes(4)?;
        if pair != UNKNOWN_PAIR {
            diag.check(
                slot,
                "unknown pair",
                u32::from_be_bytes(UNKNOWN_PAIR) as u64,
                u32::from_be_bytes([pair[0], pair[1], pair[2], pair[3]]) as u64,
            );
        }

        let mut obj = SetObject::new(&object_type, slot as u32)
            .with_transform(Transform::new(position, rotation))
            .with_custom(CustomKey::LinkId, Parameter::Byte(link_id))
            .with_custom(CustomKey::RenderDistance, Parameter::Byte(render_distance));

        let entry = MISC_OFFSET + misc_index * MISC_ENTRY_SIZE;
        r.seek(entry + MISC_HEADER_SIZE)?;
        let params_start = r.pos();
        obj.parameters = template.parameters.iter().map(|p| read_param(r, p)).collect::<Result<_>>()?;
        let used = (r.pos() - params_start) as usize;
        if used > MISC_PARAM_SIZE {
            return Err(Error::ParamOverflow {
                object_type,
                len: used,
                max: MISC_PARAM_SIZE,
            });
        }
        trace!(slot, object_type = %obj.object_type, misc_index, "read slot");
        Ok(Some(obj))
    }
}

impl SetCodec for HeroesCodec {
    fn format(&self) -> SetFormat {
        SetFormat::Heroes
    }

    fn load(&self, data: &[u8], templates: Option<&Templates>, options: &LoadOptions) -> Result<Loaded> {
        let templates = require_templates(templates, FORMAT)?;
        if (data.len() as u64) < MISC_OFFSET {
            return Err(Error::OutOfBounds {
                offset: MISC_OFFSET,
                len: data.len() as u64,
            });
        }
        let mut r = SetReader::new(data, Endian::Big);
        let mut diag = Diagnostics::default();
        let mut objects = Vec::new();
        for slot in 0..MAX_OBJECTS {
            let result = Self::read_slot(&mut r, slot, templates, &mut diag);
            if let Some(Some(obj)) = diag.recover(options.policy, slot, result)? {
                objects.push(obj);
            }
        }
        debug!(objects = objects.len(), "loaded Heroes set");
        Ok(diag.finish(SetData {
            objects,
            ..Default::default()
        }))
    }

    fn save(&self, set: &SetData) -> Result<Vec<u8>> {
        if set.len() > MAX_OBJECTS {
            return Err(Error::CapacityExceeded {
                count: set.len(),
                max: MAX_OBJECTS,
            });
        }
        let types = set
            .objects
            .iter()
            .map(|o| parse_type_name(&o.object_type))
            .collect::<Result<Vec<_>>>()?;
        let mut taken = vec![false; MAX_OBJECTS];
        for obj in &set.objects {
            let slot = obj.object_id as usize;
            if slot >= MAX_OBJECTS {
                return Err(Error::InvalidObjectId {
                    id: obj.object_id,
                    max: MAX_OBJECTS as u32 - 1,
                });
            }
            if std::mem::replace(&mut taken[slot], true) {
                return Err(Error::DuplicateObjectId(obj.object_id));
            }
        }

        let mut w = SetWriter::new(Endian::Big, PointerWidth::U32);
        for (obj, &(list, ty)) in set.objects.iter().zip(&types) {
            let slot = obj.object_id as u64;
            w.seek(slot * SLOT_SIZE);
            w.write_vec3(obj.transform.position);
            for angle in quat_to_bams(obj.transform.rotation) {
                w.write_i32(angle);
            }
            w.write_bytes(&UNKNOWN_PAIR);
            w.write_nulls(0x0C);
            w.write_u8(list);
            w.write_u8(ty);
            w.write_u8(custom_u8(obj, CustomKey::LinkId, 0));
            w.write_u8(custom_u8(obj, CustomKey::RenderDistance, 0));
            w.write_u16(0);
            w.write_u16(slot as u16 + 1);
        }

        // Empty slots stay zero; misc entry 0 is the reserved null entry
        w.seek(MISC_OFFSET + MISC_ENTRY_SIZE);
        for (obj, &(list, ty)) in set.objects.iter().zip(&types) {
            let entry = MISC_OFFSET + (obj.object_id as u64 + 1) * MISC_ENTRY_SIZE;
            w.seek(entry);
            w.write_u8(list);
            w.write_u8(ty);
            w.write_u16(0);
            for param in &obj.parameters {
                write_param(&mut w, param)?;
            }
            let used = (w.pos() - entry - MISC_HEADER_SIZE) as usize;
            if used > MISC_PARAM_SIZE {
                return Err(Error::ParamOverflow {
                    object_type: obj.object_type.clone(),
                    len: used,
                    max: MISC_PARAM_SIZE,
                });
            }
            w.seek(entry + MISC_ENTRY_SIZE);
        }

        debug!(objects = set.len(), size = w.len(), "saved Heroes set");
        Ok(w.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::SetObjectType;
    use crate::util::{quat_from_euler, Vec3};

    fn templates() -> Templates {
        Templates::new()
            .with(
                "00-03",
                SetObjectType::new(vec![
                    TemplateParam::new("Speed", DataType::F32),
                    TemplateParam::new("Count", DataType::U16),
                    TemplateParam::new("Flag", DataType::Bool),
                ]),
            )
            .with(
                "01-1a",
                SetObjectType::new(vec![TemplateParam::new("Target", DataType::Vector3)]),
            )
    }

    fn spring(slot: u32) -> SetObject {
        SetObject::new("00-03", slot)
            .with_transform(Transform::from_position(Vec3::new(slot as f32, 20.0, -5.0)))
            .with_parameters(vec![Parameter::F32(2.5), Parameter::U16(slot as u16), Parameter::Bool(true)])
            .with_custom(CustomKey::LinkId, Parameter::Byte(3))
            .with_custom(CustomKey::RenderDistance, Parameter::Byte(20))
    }

    #[test]
    fn test_type_names() -> Result<()> {
        assert_eq!(parse_type_name("01-1a")?, (0x01, 0x1A));
        assert_eq!(parse_type_name("01-1A")?, (0x01, 0x1A));
        assert_eq!(type_name(0x0B, 0x02), "0b-02");
        assert!(matches!(parse_type_name("Ring"), Err(Error::InvalidTypeName(_))));
        Ok(())
    }

    #[test]
    fn test_roundtrip() -> Result<()> {
        let mut set = SetData::default();
        set.push(spring(0));
        let mut target = SetObject::new("01-1a", 1).with_parameters(vec![Parameter::Vector3(Vec3::new(1.0, 2.0, 3.0))]);
        target.custom_data = default_custom_data();
        set.push(target);

        let bytes = HeroesCodec.save(&set)?;
        assert_eq!(bytes.len() as u64, MISC_OFFSET + 3 * MISC_ENTRY_SIZE);
        // Slot 0 points at misc entry 1; entry 0 is null
        assert_eq!(&bytes[0x2E..0x30], &[0, 1]);
        assert!(bytes[MISC_OFFSET as usize..(MISC_OFFSET + MISC_ENTRY_SIZE) as usize]
            .iter()
            .all(|&b| b == 0));
        assert_eq!(&bytes[0x18..0x1C], &UNKNOWN_PAIR);

        let loaded = HeroesCodec.load(&bytes, Some(&templates()), &LoadOptions::default())?;
        assert_eq!(loaded.set.objects, set.objects);
        assert!(loaded.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_rotation_in_binary_angles() -> Result<()> {
        let rotation = quat_from_euler(Vec3::new(0.0, std::f32::consts::FRAC_PI_4, 0.0));
        let mut set = SetData::default();
        set.push(spring(0).with_transform(Transform::new(Vec3::ZERO, rotation)));
        let bytes = HeroesCodec.save(&set)?;
        // 45 degrees is 8192 units
        assert_eq!(&bytes[0x10..0x14], &8192i32.to_be_bytes());

        let loaded = HeroesCodec.load(&bytes, Some(&templates()), &LoadOptions::default())?;
        assert!(loaded.set.objects[0].transform.rotation.abs_diff_eq(rotation, 1e-4));
        Ok(())
    }

    #[test]
    fn test_unknown_type_skipped() -> Result<()> {
        let mut set = SetData::default();
        set.push(spring(0));
        set.push(SetObject::new("0f-0f", 1));
        set.push(spring(2));
        let bytes = HeroesCodec.save(&set)?;
        let loaded = HeroesCodec.load(&bytes, Some(&templates()), &LoadOptions::default())?;
        assert_eq!(loaded.set.len(), 2);
        assert_eq!(loaded.set.objects[1].object_id, 2);
        assert!(matches!(
            loaded.warnings.as_slice(),
            [Warning::MissingTemplate { index: 1, .. }]
        ));
        Ok(())
    }

    #[test]
    fn test_sparse_ids_keep_their_slots() -> Result<()> {
        let mut set = SetData::default();
        set.push(spring(5));
        set.push(spring(2047));
        set.push(spring(9));

        let bytes = HeroesCodec.save(&set)?;
        assert_eq!(bytes.len() as u64, MISC_OFFSET + 2049 * MISC_ENTRY_SIZE);
        assert!(bytes[..5 * SLOT_SIZE as usize].iter().all(|&b| b == 0));
        let slot9 = 9 * SLOT_SIZE as usize;
        assert_eq!(&bytes[slot9 + 0x2E..slot9 + 0x30], &[0, 10]);

        let loaded = HeroesCodec.load(&bytes, Some(&templates()), &LoadOptions::default())?;
        let ids: Vec<u32> = loaded.set.objects.iter().map(|o| o.object_id).collect();
        assert_eq!(ids, [5, 9, 2047]);
        assert_eq!(loaded.set.objects[1], spring(9));
        assert_eq!(loaded.set.objects[2], spring(2047));

        // A second pass keeps every object where it was
        assert_eq!(HeroesCodec.save(&loaded.set)?, bytes);
        Ok(())
    }

    #[test]
    fn test_invalid_ids_rejected() {
        let mut set = SetData::default();
        set.push(spring(MAX_OBJECTS as u32));
        assert!(matches!(
            HeroesCodec.save(&set),
            Err(Error::InvalidObjectId { id: 2048, max: 2047 })
        ));

        let mut set = SetData::default();
        set.push(spring(3));
        set.push(spring(3));
        assert!(matches!(HeroesCodec.save(&set), Err(Error::DuplicateObjectId(3))));
    }

    #[test]
    fn test_param_overflow() {
        let mut set = SetData::default();
        set.push(SetObject::new("00-03", 0).with_parameters(vec![Parameter::Vector4(Default::default()); 3]));
        assert!(matches!(HeroesCodec.save(&set), Err(Error::ParamOverflow { len: 48, .. })));
    }

    #[test]
    fn test_capacity() {
        let mut set = SetData::default();
        for i in 0..=MAX_OBJECTS as u32 {
            set.push(SetObject::new("00-03", i));
        }
        assert!(matches!(
            HeroesCodec.save(&set),
            Err(Error::CapacityExceeded { count: 2049, max: 2048 })
        ));
    }

    #[test]
    fn test_truncated_file() {
        let result = HeroesCodec.load(&[0u8; 64], Some(&templates()), &LoadOptions::default());
        assert!(matches!(result, Err(Error::OutOfBounds { .. })));
    }
}
