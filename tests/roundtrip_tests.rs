//! Integration tests for saving set files to disk and reading them back.

use setdata::bina::BinaHeader;
use setdata::formats::{heroes, sobj, load_file, save_file, LoadOptions, SetFormat, SobjVariant, Warning};
use setdata::prelude::*;

use tempfile::NamedTempFile;

fn templates() -> Templates {
    Templates::new()
        .with(
            "Ring",
            SetObjectType::new(vec![
                TemplateParam::new("Speed", DataType::F32).with_default(Parameter::F32(1.0)),
                TemplateParam::new("Active", DataType::Bool),
                TemplateParam::new("Offset", DataType::Vector3),
            ]),
        )
        .with(
            "Switch",
            SetObjectType::new(vec![
                TemplateParam::new("Targets", DataType::ObjectReferenceArray),
                TemplateParam::new("Delay", DataType::F32),
            ]),
        )
}

fn ring(id: u32, x: f32) -> SetObject {
    SetObject::new("Ring", id)
        .with_transform(Transform::from_position(Vec3::new(x, 10.0, -3.0)))
        .with_parameters(vec![Parameter::F32(2.5), Parameter::Bool(true), Parameter::Vector3(Vec3::Z)])
}

#[test]
fn test_lost_world_file_roundtrip() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    let mut set = SetData::new("ring_line");
    for i in 0..3 {
        let mut obj = ring(i, i as f32 * 4.0);
        obj.custom_data = sobj::default_custom_data(SobjVariant::LostWorld);
        set.push(obj);
    }

    save_file(SetFormat::LostWorld, path, &set).expect("Failed to save");
    let loaded = load_file(SetFormat::LostWorld, path, Some(&templates()), &LoadOptions::default())
        .expect("Failed to load");

    assert_eq!(loaded.set.objects, set.objects);
    assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);

    // Re-saving the loaded set reproduces the file
    let again = setdata::formats::save(SetFormat::LostWorld, &loaded.set).expect("Failed to re-save");
    assert_eq!(again, std::fs::read(path).expect("Failed to read file"));
}

#[test]
fn test_colors_header_is_big_endian_v1() {
    let mut set = SetData::new("colors");
    let mut obj = ring(0, 0.0);
    obj.custom_data = sobj::default_custom_data(SobjVariant::Colors);
    set.push(obj);

    let bytes = setdata::formats::save(SetFormat::Colors, &set).expect("Failed to save");
    let (header, _) = BinaHeader::read(&bytes).expect("Failed to read header");
    assert!(matches!(header, BinaHeader::V1(_)));
    assert_eq!(header.endian(), Endian::Big);
}

#[test]
fn test_forces_reference_array_roundtrip() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    let targets = vec![ObjectReference::new(1, 0), ObjectReference::new(2, 0), ObjectReference::new(5, 7)];
    let mut set = SetData::new("switches");
    set.push(
        SetObject::new("Switch", 4)
            .with_parameters(vec![Parameter::ObjectReferenceArray(targets.clone()), Parameter::F32(0.5)])
            .with_custom(CustomKey::Name, Parameter::String("Switch_A".into())),
    );
    save_file(SetFormat::Forces, path, &set).expect("Failed to save");

    let loaded = load_file(SetFormat::Forces, path, Some(&templates()), &LoadOptions::default())
        .expect("Failed to load");
    assert_eq!(loaded.set.objects.len(), 1);
    assert_eq!(loaded.set.objects[0].parameters[0], Parameter::ObjectReferenceArray(targets));
    assert_eq!(loaded.set.objects[0].name(), Some("Switch_A"));
    assert_eq!(loaded.set.objects, set.objects);
}

#[test]
fn test_forces_missing_template_dropped() {
    let mut set = SetData::new("mixed");
    set.push(ring(0, 0.0));
    set.push(SetObject::new("Unknown", 1).with_parameters(vec![Parameter::U32(7)]));
    set.push(ring(2, 8.0));
    let bytes = setdata::formats::save(SetFormat::Forces, &set).expect("Failed to save");

    let loaded = setdata::formats::load(SetFormat::Forces, &bytes, Some(&templates()), &LoadOptions::default())
        .expect("Failed to load");
    let ids: Vec<u32> = loaded.set.objects.iter().map(|o| o.object_id).collect();
    assert_eq!(ids, [0, 2]);
    assert!(matches!(
        loaded.warnings.as_slice(),
        [Warning::MissingTemplate { index: 1, offset: Some(_), .. }]
    ));
}

#[test]
fn test_missing_templates_rejected() {
    for format in [SetFormat::Colors, SetFormat::LostWorld, SetFormat::Forces, SetFormat::Heroes] {
        let result = setdata::formats::load(format, &[0u8; 64], None, &LoadOptions::default());
        assert!(matches!(result, Err(Error::MissingTemplates(_))), "{format}");
    }
}

fn heroes_templates() -> Templates {
    Templates::new().with(
        "00-03",
        SetObjectType::new(vec![TemplateParam::new("Speed", DataType::F32)]),
    )
}

fn heroes_set(count: usize) -> SetData {
    let mut set = SetData::new("stg0100");
    for i in 0..count {
        let mut obj = SetObject::new("00-03", i as u32)
            .with_transform(Transform::from_position(Vec3::new(i as f32, 0.0, 0.0)))
            .with_parameters(vec![Parameter::F32(i as f32 * 0.5)]);
        obj.custom_data = heroes::default_custom_data();
        set.push(obj);
    }
    set
}

#[test]
fn test_heroes_full_capacity() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    let set = heroes_set(heroes::MAX_OBJECTS);
    save_file(SetFormat::Heroes, path, &set).expect("Failed to save");
    let loaded = load_file(SetFormat::Heroes, path, Some(&heroes_templates()), &LoadOptions::default())
        .expect("Failed to load");
    assert_eq!(loaded.set.len(), heroes::MAX_OBJECTS);
    assert_eq!(loaded.set.objects, set.objects);
}

#[test]
fn test_heroes_over_capacity() {
    let result = setdata::formats::save(SetFormat::Heroes, &heroes_set(heroes::MAX_OBJECTS + 1));
    assert!(matches!(result, Err(Error::CapacityExceeded { count: 2049, max: 2048 })));
}

#[test]
fn test_sonic06_roundtrip_without_templates() {
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    let mut set = SetData::new("wvo_a");
    set.push(
        SetObject::new("dashpanel", 0)
            .with_transform(Transform::from_position(Vec3::new(0.0, 0.0, 100.0)))
            .with_parameters(vec![Parameter::F32(30.0), Parameter::String("se_dash".into()), Parameter::U32(2)])
            .with_custom(CustomKey::Name, Parameter::String("dashpanel0".into())),
    );
    set.push(
        SetObject::new("ring", 1)
            .with_parameters(vec![Parameter::Bool(false), Parameter::I32(-1), Parameter::Vector3(Vec3::ONE)])
            .with_custom(CustomKey::Name, Parameter::String("ring0".into())),
    );
    save_file(SetFormat::Sonic06, path, &set).expect("Failed to save");

    let loaded = load_file(SetFormat::Sonic06, path, None, &LoadOptions::default()).expect("Failed to load");
    assert_eq!(loaded.set.name, "wvo_a");
    assert_eq!(loaded.set.objects, set.objects);
}

#[test]
fn test_unnamed_set_takes_file_stem() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("stage_a.set");

    let mut set = SetData::default();
    set.push(SetObject::new("ring", 0).with_custom(CustomKey::Name, Parameter::String("ring0".into())));
    save_file(SetFormat::Sonic06, &path, &set).expect("Failed to save");

    let loaded = load_file(SetFormat::Sonic06, &path, None, &LoadOptions::default()).expect("Failed to load");
    assert_eq!(loaded.set.name, "stage_a");
}

#[test]
fn test_colors_to_forces_conversion() {
    let mut set = SetData::new("convert");
    let mut obj = ring(3, 1.0);
    obj.custom_data = sobj::default_custom_data(SobjVariant::Colors);
    set.push(obj);

    let colors = setdata::formats::save(SetFormat::Colors, &set).expect("Failed to save Colors");
    let mut loaded = setdata::formats::load(SetFormat::Colors, &colors, Some(&templates()), &LoadOptions::default())
        .expect("Failed to load Colors")
        .set;
    loaded.header = None;

    let forces = setdata::formats::save(SetFormat::Forces, &loaded).expect("Failed to save Forces");
    let converted = setdata::formats::load(SetFormat::Forces, &forces, Some(&templates()), &LoadOptions::default())
        .expect("Failed to load Forces")
        .set;
    assert_eq!(converted.len(), 1);
    assert_eq!(converted.objects[0].object_id, 3);
    assert_eq!(converted.objects[0].transform.position, set.objects[0].transform.position);
    assert_eq!(converted.objects[0].parameters, set.objects[0].parameters);
}
