//! Integration tests for JSON export/import of sets loaded from binary files.

use setdata::formats::{self, heroes, sobj, LoadOptions, SetFormat, SobjVariant};
use setdata::interchange::{export_file, from_json, import_file, to_json};
use setdata::model::RawGroupTable;
use setdata::prelude::*;

use tempfile::NamedTempFile;

fn sonic06_set() -> SetData {
    let mut set = SetData::new("kdv_b");
    set.push(
        SetObject::new("eventbox", 0)
            .with_transform(Transform::new(Vec3::new(5.0, 0.0, -5.0), Quat::from_rotation_z(0.5)))
            .with_parameters(vec![Parameter::Vector3(Vec3::new(2.0, 2.0, 2.0)), Parameter::String("ev001".into())])
            .with_custom(CustomKey::Name, Parameter::String("eventbox0".into()))
            .with_custom(CustomKey::Reserved, Parameter::Bytes((0u8..16).collect())),
    );
    set.group_table = Some(RawGroupTable { count: 1, bytes: vec![0, 0, 0, 0x10, 0, 0, 0, 0] });
    set
}

#[test]
fn test_export_import_file() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    let set = sonic06_set();
    export_file(path, &set, true).expect("Failed to export");
    let imported = import_file(path).expect("Failed to import");
    assert_eq!(imported, set);
}

#[test]
fn test_binary_json_binary() {
    let set = sonic06_set();
    let bytes = formats::save(SetFormat::Sonic06, &set).expect("Failed to save");
    let loaded = formats::load(SetFormat::Sonic06, &bytes, None, &LoadOptions::default())
        .expect("Failed to load")
        .set;

    // The echoed header survives the JSON hop, so the file is rebuilt exactly
    let json = to_json(&loaded, false).expect("Failed to serialize");
    let restored = from_json(&json).expect("Failed to parse");
    assert_eq!(restored, loaded);
    assert!(restored.header.is_some());
    assert_eq!(formats::save(SetFormat::Sonic06, &restored).expect("Failed to re-save"), bytes);
}

#[test]
fn test_heroes_custom_data_in_json() {
    let mut obj = SetObject::new("00-03", 0).with_parameters(vec![Parameter::F32(1.0)]);
    obj.custom_data = heroes::default_custom_data();
    let mut set = SetData::new("stg");
    set.push(obj);

    let json = to_json(&set, true).expect("Failed to serialize");
    assert!(json.contains("\"LinkID\""));
    assert!(json.contains("\"RenderDistance\""));
    assert_eq!(from_json(&json).expect("Failed to parse"), set);
}

#[test]
fn test_import_missing_file() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let result = import_file(dir.path().join("missing.json"));
    assert!(matches!(result, Err(Error::FileNotFound(_))));
}

#[test]
fn test_nan_reserved_float_survives_json() {
    let templates = Templates::new().with(
        "Ring",
        SetObjectType::new(vec![TemplateParam::new("Speed", DataType::F32)]),
    );
    let mut obj = SetObject::new("Ring", 0).with_parameters(vec![Parameter::F32(f32::INFINITY)]);
    obj.custom_data = sobj::default_custom_data(SobjVariant::Colors);
    obj.custom_data.insert(CustomKey::Unknown(4), Parameter::F32(f32::from_bits(0xFFC0_0001)));
    let mut set = SetData::new("colors");
    set.push(obj);

    let bytes = formats::save(SetFormat::Colors, &set).expect("Failed to save");
    let loaded = formats::load(SetFormat::Colors, &bytes, Some(&templates), &LoadOptions::default())
        .expect("Failed to load")
        .set;

    let json = to_json(&loaded, true).expect("Failed to serialize");
    assert!(json.contains("0xffc00001"));
    let restored = from_json(&json).expect("Failed to parse");
    let unknown4 = restored.objects[0].custom(&CustomKey::Unknown(4)).and_then(Parameter::as_f32);
    assert_eq!(unknown4.map(f32::to_bits), Some(0xFFC0_0001));
    assert_eq!(formats::save(SetFormat::Colors, &restored).expect("Failed to re-save"), bytes);
}

#[test]
fn test_extra_named_like_fixed_key_survives_json() {
    let mut set = SetData::new("extras");
    set.push(
        SetObject::new("Ring", 0)
            .with_custom(CustomKey::Extra("Parent".into()), Parameter::Bytes(vec![1, 2, 3, 4]))
            .with_custom(CustomKey::Parent, Parameter::U32(2)),
    );
    let restored = from_json(&to_json(&set, false).expect("Failed to serialize")).expect("Failed to parse");
    assert_eq!(restored, set);
}
