//! Parameter values and their data types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::{Quat, Vec2, Vec3, Vec4};

/// Logical type of a parameter slot.
///
/// Templates declare one per slot; codecs pick the binary representation
/// (size, alignment, indirection) from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Bool,
    Byte,
    I16,
    U16,
    I32,
    U32,
    F32,
    Vector2,
    Vector3,
    Vector4,
    Quaternion,
    String,
    Bytes,
    U32Array,
    ObjectReference,
    ObjectReferenceArray,
    Group,
}

impl DataType {
    /// Returns the name of this type as used in template files.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::F32 => "f32",
            Self::Vector2 => "vector2",
            Self::Vector3 => "vector3",
            Self::Vector4 => "vector4",
            Self::Quaternion => "quaternion",
            Self::String => "string",
            Self::Bytes => "bytes",
            Self::U32Array => "u32_array",
            Self::ObjectReference => "object_reference",
            Self::ObjectReferenceArray => "object_reference_array",
            Self::Group => "group",
        }
    }

    /// Zero value for this type. Groups start empty.
    pub fn zero_value(self) -> Parameter {
        match self {
            Self::Bool => Parameter::Bool(false),
            Self::Byte => Parameter::Byte(0),
            Self::I16 => Parameter::I16(0),
            Self::U16 => Parameter::U16(0),
            Self::I32 => Parameter::I32(0),
            Self::U32 => Parameter::U32(0),
            Self::F32 => Parameter::F32(0.0),
            Self::Vector2 => Parameter::Vector2(Vec2::ZERO),
            Self::Vector3 => Parameter::Vector3(Vec3::ZERO),
            Self::Vector4 => Parameter::Vector4(Vec4::ZERO),
            Self::Quaternion => Parameter::Quaternion(Quat::IDENTITY),
            Self::String => Parameter::String(String::new()),
            Self::Bytes => Parameter::Bytes(Vec::new()),
            Self::U32Array => Parameter::U32Array(Vec::new()),
            Self::ObjectReference => Parameter::ObjectReference(ObjectReference::default()),
            Self::ObjectReferenceArray => Parameter::ObjectReferenceArray(Vec::new()),
            Self::Group => Parameter::Group(ParamGroup::default()),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Weak `{id, group}` lookup key pointing at another object.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectReference {
    pub id: u16,
    pub group_id: u16,
}

impl ObjectReference {
    pub const fn new(id: u16, group_id: u16) -> Self {
        Self { id, group_id }
    }
}

/// Nested, self-aligning list of parameters stored inline in one slot.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ParamGroup {
    pub params: Vec<Parameter>,
    /// Alignment applied after the group; formats use their own default when `None`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub padding: Option<u32>,
}

impl ParamGroup {
    pub fn new(params: Vec<Parameter>, padding: Option<u32>) -> Self {
        Self { params, padding }
    }
}

/// One parameter value.
///
/// Float components serialize bit-exactly, so reserved words read as floats
/// survive interchange even when they hold NaN patterns.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Parameter {
    Bool(bool),
    Byte(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    F32(#[serde(with = "super::exact::float")] f32),
    Vector2(#[serde(with = "super::exact::vec2")] Vec2),
    Vector3(#[serde(with = "super::exact::vec3")] Vec3),
    Vector4(#[serde(with = "super::exact::vec4")] Vec4),
    Quaternion(#[serde(with = "super::exact::quat")] Quat),
    String(String),
    Bytes(Vec<u8>),
    U32Array(Vec<u32>),
    ObjectReference(ObjectReference),
    ObjectReferenceArray(Vec<ObjectReference>),
    Group(ParamGroup),
}

impl Parameter {
    /// Logical type of this value.
    pub const fn data_type(&self) -> DataType {
        match self {
            Self::Bool(_) => DataType::Bool,
            Self::Byte(_) => DataType::Byte,
            Self::I16(_) => DataType::I16,
            Self::U16(_) => DataType::U16,
            Self::I32(_) => DataType::I32,
            Self::U32(_) => DataType::U32,
            Self::F32(_) => DataType::F32,
            Self::Vector2(_) => DataType::Vector2,
            Self::Vector3(_) => DataType::Vector3,
            Self::Vector4(_) => DataType::Vector4,
            Self::Quaternion(_) => DataType::Quaternion,
            Self::String(_) => DataType::String,
            Self::Bytes(_) => DataType::Bytes,
            Self::U32Array(_) => DataType::U32Array,
            Self::ObjectReference(_) => DataType::ObjectReference,
            Self::ObjectReferenceArray(_) => DataType::ObjectReferenceArray,
            Self::Group(_) => DataType::Group,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            Self::F32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Self::U16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Self::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> Option<u8> {
        match self {
            Self::Byte(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_vec3(&self) -> Option<Vec3> {
        match self {
            Self::Vector3(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }
}
