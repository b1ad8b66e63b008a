//! Float serialization that keeps every bit pattern.
//!
//! Finite values are plain numbers. NaN and the infinities, which JSON cannot
//! represent, are written as their IEEE bits in a hex string (`"0x7fc00000"`).
//! Vectors keep the `[x, y, z]` layout glam uses.

use std::fmt;

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// `f32` wrapper with the exact encoding.
#[derive(Clone, Copy, Debug)]
pub(super) struct ExactF32(pub f32);

impl Serialize for ExactF32 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if self.0.is_finite() {
            serializer.serialize_f32(self.0)
        } else {
            serializer.serialize_str(&format!("{:#010x}", self.0.to_bits()))
        }
    }
}

impl<'de> Deserialize<'de> for ExactF32 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ExactF32Visitor;

        impl<'de> Visitor<'de> for ExactF32Visitor {
            type Value = ExactF32;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a number or a hex bit pattern")
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
                Ok(ExactF32(v as f32))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                Ok(ExactF32(v as f32))
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                Ok(ExactF32(v as f32))
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.strip_prefix("0x")
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .map(|bits| ExactF32(f32::from_bits(bits)))
                    .ok_or_else(|| E::custom(format!("invalid float bit pattern: {v}")))
            }
        }

        deserializer.deserialize_any(ExactF32Visitor)
    }
}

pub(super) mod float {
    use super::*;

    pub fn serialize<S: Serializer>(value: &f32, serializer: S) -> Result<S::Ok, S::Error> {
        ExactF32(*value).serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f32, D::Error> {
        Ok(ExactF32::deserialize(deserializer)?.0)
    }
}

macro_rules! exact_vector {
    ($name:ident, $ty:ty, $n:literal) => {
        pub(super) mod $name {
            use super::*;

            pub fn serialize<S: Serializer>(value: &$ty, serializer: S) -> Result<S::Ok, S::Error> {
                value.to_array().map(ExactF32).serialize(serializer)
            }

            pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<$ty, D::Error> {
                let values = <[ExactF32; $n]>::deserialize(deserializer)?;
                Ok(<$ty>::from_array(values.map(|v| v.0)))
            }
        }
    };
}

exact_vector!(vec2, crate::util::Vec2, 2);
exact_vector!(vec3, crate::util::Vec3, 3);
exact_vector!(vec4, crate::util::Vec4, 4);
exact_vector!(quat, crate::util::Quat, 4);
