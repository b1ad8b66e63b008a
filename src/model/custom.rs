//! Typed keys for format-specific object fields.
//!
//! Fields with no template slot (parent ids, spawn ranges, reserved words kept
//! for round-trip fidelity) live in [`SetObject::custom_data`](super::SetObject)
//! under one of these keys. The set of keys is closed so each codec decides with
//! an exhaustive `match` which ones it stores as fixed fields.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Marks an [`CustomKey::Extra`] name that would otherwise read back as a fixed key.
const EXTRA_PREFIX: &str = "Extra:";

/// Key of a custom data entry.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CustomKey {
    /// Object display name.
    Name,
    GroupId,
    ParentId,
    ParentGroupId,
    /// Parent object index (indexed format, Lost World variant).
    Parent,
    ChildPosOffset,
    ChildRotOffset,
    RangeIn,
    RangeOut,
    /// Parameter block length hint that differs from the decoded length.
    RawByteLength,
    /// Parameter bytes not covered by the template.
    RawParamData,
    LocalPosition,
    LocalRotation,
    /// Local position and rotation of every child, as a group of
    /// `Vector3` pairs in child order.
    ChildLocalTransforms,
    LinkId,
    RenderDistance,
    /// Numbered reserved field whose meaning is unknown.
    Unknown(u8),
    /// Reserved block preserved verbatim.
    Reserved,
    /// Named side-channel parameter with no fixed slot.
    Extra(String),
}

impl CustomKey {
    /// Name used in interchange files and logs.
    pub fn as_name(&self) -> String {
        match self {
            Self::Name => "Name".into(),
            Self::GroupId => "GroupID".into(),
            Self::ParentId => "ParentID".into(),
            Self::ParentGroupId => "ParentGroupID".into(),
            Self::Parent => "Parent".into(),
            Self::ChildPosOffset => "ChildPosOffset".into(),
            Self::ChildRotOffset => "ChildRotOffset".into(),
            Self::RangeIn => "RangeIn".into(),
            Self::RangeOut => "RangeOut".into(),
            Self::RawByteLength => "RawByteLength".into(),
            Self::RawParamData => "RawParamData".into(),
            Self::LocalPosition => "LocalPosition".into(),
            Self::LocalRotation => "LocalRotation".into(),
            Self::ChildLocalTransforms => "ChildLocalTransforms".into(),
            Self::LinkId => "LinkID".into(),
            Self::RenderDistance => "RenderDistance".into(),
            Self::Unknown(n) => format!("Unknown{n}"),
            Self::Reserved => "Reserved".into(),
            Self::Extra(name) if name.starts_with(EXTRA_PREFIX) || Self::fixed(name).is_some() => {
                format!("{EXTRA_PREFIX}{name}")
            }
            Self::Extra(name) => name.clone(),
        }
    }

    /// Parse a key name. Names that match no fixed key become [`CustomKey::Extra`].
    pub fn from_name(name: &str) -> Self {
        if let Some(extra) = name.strip_prefix(EXTRA_PREFIX) {
            return Self::Extra(extra.to_string());
        }
        Self::fixed(name).unwrap_or_else(|| Self::Extra(name.to_string()))
    }

    fn fixed(name: &str) -> Option<Self> {
        Some(match name {
            "Name" => Self::Name,
            "GroupID" => Self::GroupId,
            "ParentID" => Self::ParentId,
            "ParentGroupID" => Self::ParentGroupId,
            "Parent" => Self::Parent,
            "ChildPosOffset" => Self::ChildPosOffset,
            "ChildRotOffset" => Self::ChildRotOffset,
            "RangeIn" => Self::RangeIn,
            "RangeOut" => Self::RangeOut,
            "RawByteLength" => Self::RawByteLength,
            "RawParamData" => Self::RawParamData,
            "LocalPosition" => Self::LocalPosition,
            "LocalRotation" => Self::LocalRotation,
            "ChildLocalTransforms" => Self::ChildLocalTransforms,
            "LinkID" => Self::LinkId,
            "RenderDistance" => Self::RenderDistance,
            "Reserved" => Self::Reserved,
            other => return other.strip_prefix("Unknown").and_then(|n| n.parse::<u8>().ok()).map(Self::Unknown),
        })
    }
}

impl fmt::Display for CustomKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_name())
    }
}

impl FromStr for CustomKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::from_name(s))
    }
}

impl Serialize for CustomKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_name())
    }
}

impl<'de> Deserialize<'de> for CustomKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_name(&name))
    }
}
