//! Per-game set file codecs.
//!
//! Every codec implements [`SetCodec`]; the caller picks one by game through
//! [`SetFormat`]. Loading returns the decoded set together with the non-fatal
//! [`Warning`]s met on the way, which are also emitted through `tracing`.
//!
//! | Format | Container | Byte order | Pointers |
//! | --- | --- | --- | --- |
//! | [`SetFormat::Colors`] | BINA v1 | big | 32-bit |
//! | [`SetFormat::LostWorld`] | BINA v2 | little | 32-bit |
//! | [`SetFormat::Forces`] | BINA v2 | little | 64-bit |
//! | [`SetFormat::Heroes`] | none, fixed size | big | none |
//! | [`SetFormat::Sonic06`] | BINA v1 | big | 32-bit |

pub mod forces;
pub mod heroes;
pub mod s06;
pub mod sobj;

use std::fmt;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

use memmap2::Mmap;
use serde::{Deserialize, Serialize};
use tracing::{info_span, warn};

use crate::bina::BinaHeader;
use crate::model::{CustomKey, SetData, SetObject};
use crate::template::Templates;
use crate::util::{Error, Result, Vec3};

pub use forces::ForcesCodec;
pub use heroes::HeroesCodec;
pub use s06::Sonic06Codec;
pub use sobj::{SobjCodec, SobjVariant};

/// Game family whose set layout a file uses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetFormat {
    /// Type-grouped indexed layout without parents or local transforms.
    Colors,
    /// Type-grouped indexed layout with parents and local transforms.
    LostWorld,
    /// Pointer-based variable-length layout.
    Forces,
    /// Fixed-slot layout.
    Heroes,
    /// Tag-prefixed offset layout.
    Sonic06,
}

impl SetFormat {
    pub const ALL: [SetFormat; 5] = [
        Self::Colors,
        Self::LostWorld,
        Self::Forces,
        Self::Heroes,
        Self::Sonic06,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Colors => "colors",
            Self::LostWorld => "lost_world",
            Self::Forces => "forces",
            Self::Heroes => "heroes",
            Self::Sonic06 => "sonic06",
        }
    }

    /// Conventional file extension.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Colors | Self::LostWorld => "orc",
            Self::Forces => "gedit",
            Self::Heroes => "bin",
            Self::Sonic06 => "set",
        }
    }

    /// Whether loading needs a template dictionary.
    pub fn requires_templates(self) -> bool {
        !matches!(self, Self::Sonic06)
    }

    /// Codec for this format.
    pub fn codec(self) -> Box<dyn SetCodec> {
        match self {
            Self::Colors => Box::new(SobjCodec::new(SobjVariant::Colors)),
            Self::LostWorld => Box::new(SobjCodec::new(SobjVariant::LostWorld)),
            Self::Forces => Box::new(ForcesCodec),
            Self::Heroes => Box::new(HeroesCodec),
            Self::Sonic06 => Box::new(Sonic06Codec),
        }
    }
}

impl fmt::Display for SetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SetFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let key = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match key.as_str() {
            "colors" | "gens" | "generations" => Ok(Self::Colors),
            "lost_world" | "lostworld" | "lw" => Ok(Self::LostWorld),
            "forces" | "gedit" => Ok(Self::Forces),
            "heroes" | "shadow" => Ok(Self::Heroes),
            "sonic06" | "s06" | "06" => Ok(Self::Sonic06),
            _ => Err(Error::other(format!("unknown set format '{s}'"))),
        }
    }
}

/// What to do when one object fails to decode.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecodePolicy {
    /// Abort the whole load.
    #[default]
    Strict,
    /// Record a warning and continue with the next object.
    BestEffort,
}

/// Load-time settings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub policy: DecodePolicy,
}

impl LoadOptions {
    pub fn best_effort() -> Self {
        Self { policy: DecodePolicy::BestEffort }
    }
}

/// Non-fatal condition met during a load.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Warning {
    /// Object type absent from the template dictionary.
    #[error("no template for object type '{object_type}' (object {index}{})", fmt_offset(.offset))]
    MissingTemplate {
        index: usize,
        object_type: String,
        /// Absolute file offset of the undecoded parameter block.
        offset: Option<u64>,
    },

    /// Reserved or duplicated field holding an unexpected value.
    #[error("object {index}: field {field} expected {expected:#x}, found {found:#x}")]
    UnexpectedValue {
        index: usize,
        field: &'static str,
        expected: u64,
        found: u64,
    },

    /// Two redundant counts disagree; the first is used.
    #[error("{what}: count {first} disagrees with duplicate {second}")]
    CountMismatch { what: String, first: u64, second: u64 },

    /// Self-describing parameter with an unknown type tag.
    #[error("object {index}: unknown parameter tag {tag}")]
    UnknownParamTag { index: usize, tag: u32 },

    /// Object skipped under [`DecodePolicy::BestEffort`].
    #[error("object {index} failed to decode: {message}")]
    ObjectDecodeFailed { index: usize, message: String },
}

fn fmt_offset(offset: &Option<u64>) -> String {
    offset.map(|o| format!(", parameters at {o:#x}")).unwrap_or_default()
}

/// Result of a load.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Loaded {
    pub set: SetData,
    pub warnings: Vec<Warning>,
}

/// Collects warnings for one load and mirrors each one to the log.
#[derive(Debug, Default)]
pub(crate) struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    pub fn warn(&mut self, warning: Warning) {
        warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Warn when a reserved field is not `expected`.
    pub fn check(&mut self, index: usize, field: &'static str, expected: u64, found: u64) {
        if found != expected {
            self.warn(Warning::UnexpectedValue { index, field, expected, found });
        }
    }

    /// Apply `policy` to the outcome of decoding object `index`.
    ///
    /// Returns `Ok(None)` when the failure was recorded and the object skipped.
    pub fn recover<T>(&mut self, policy: DecodePolicy, index: usize, result: Result<T>) -> Result<Option<T>> {
        match (result, policy) {
            (Ok(value), _) => Ok(Some(value)),
            (Err(e), DecodePolicy::Strict) => Err(e),
            (Err(e), DecodePolicy::BestEffort) => {
                self.warn(Warning::ObjectDecodeFailed { index, message: e.to_string() });
                Ok(None)
            }
        }
    }

    pub fn finish(self, set: SetData) -> Loaded {
        Loaded { set, warnings: self.warnings }
    }
}

/// Load and save capability shared by every format.
pub trait SetCodec {
    fn format(&self) -> SetFormat;

    /// Decode a whole file.
    fn load(&self, data: &[u8], templates: Option<&Templates>, options: &LoadOptions) -> Result<Loaded>;

    /// Encode a whole set.
    fn save(&self, set: &SetData) -> Result<Vec<u8>>;
}

/// Require a template dictionary for formats that cannot decode without one.
pub(crate) fn require_templates<'t>(
    templates: Option<&'t Templates>,
    format: &'static str,
) -> Result<&'t Templates> {
    templates.ok_or(Error::MissingTemplates(format))
}

/// Header echoed from a loaded set when it has the container version this
/// format writes, otherwise `default`.
pub(crate) fn container_header(set: &SetData, default: BinaHeader) -> BinaHeader {
    match (set.header, default) {
        (Some(h @ BinaHeader::V1(_)), BinaHeader::V1(_)) | (Some(h @ BinaHeader::V2(_)), BinaHeader::V2(_)) => h,
        _ => default,
    }
}

pub(crate) fn custom_u8(obj: &SetObject, key: CustomKey, default: u8) -> u8 {
    obj.custom(&key).and_then(|p| p.as_u8()).unwrap_or(default)
}

pub(crate) fn custom_u16(obj: &SetObject, key: CustomKey, default: u16) -> u16 {
    obj.custom(&key).and_then(|p| p.as_u16()).unwrap_or(default)
}

pub(crate) fn custom_u32(obj: &SetObject, key: CustomKey, default: u32) -> u32 {
    obj.custom(&key).and_then(|p| p.as_u32()).unwrap_or(default)
}

pub(crate) fn custom_f32(obj: &SetObject, key: CustomKey, default: f32) -> f32 {
    obj.custom(&key).and_then(|p| p.as_f32()).unwrap_or(default)
}

pub(crate) fn custom_vec3(obj: &SetObject, key: CustomKey) -> Vec3 {
    obj.custom(&key).and_then(|p| p.as_vec3()).unwrap_or(Vec3::ZERO)
}

/// Decode a file from memory.
pub fn load(format: SetFormat, data: &[u8], templates: Option<&Templates>, options: &LoadOptions) -> Result<Loaded> {
    let _span = info_span!("load", %format, size = data.len()).entered();
    format.codec().load(data, templates, options)
}

/// Encode a set to memory.
pub fn save(format: SetFormat, set: &SetData) -> Result<Vec<u8>> {
    let _span = info_span!("save", %format, objects = set.len()).entered();
    format.codec().save(set)
}

/// Memory-map and decode a file. The set is named after the file stem.
pub fn load_file(
    format: SetFormat,
    path: impl AsRef<Path>,
    templates: Option<&Templates>,
    options: &LoadOptions,
) -> Result<Loaded> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })?;
    let size = file.metadata()?.len();
    let mut loaded = if size == 0 {
        load(format, &[], templates, options)?
    } else {
        // Safety: the file is opened read-only and the mapping does not outlive this call
        let mmap = unsafe { Mmap::map(&file) }?;
        load(format, &mmap, templates, options)?
    };
    if loaded.set.name.is_empty() {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
            loaded.set.name = stem.to_string();
        }
    }
    Ok(loaded)
}

/// Encode a set and write it to `path`.
pub fn save_file(format: SetFormat, path: impl AsRef<Path>, set: &SetData) -> Result<()> {
    let bytes = save(format, set)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_names() -> Result<()> {
        for format in SetFormat::ALL {
            assert_eq!(format.name().parse::<SetFormat>()?, format);
            assert_eq!(format.codec().format(), format);
        }
        assert_eq!("Lost World".parse::<SetFormat>()?, SetFormat::LostWorld);
        assert!("xml".parse::<SetFormat>().is_err());
        Ok(())
    }

    #[test]
    fn test_recover_policy() {
        let mut diag = Diagnostics::default();
        let failed: Result<u32> = Err(Error::invalid("bad"));
        assert!(diag.recover(DecodePolicy::Strict, 0, failed).is_err());

        let failed: Result<u32> = Err(Error::invalid("bad"));
        assert!(matches!(diag.recover(DecodePolicy::BestEffort, 3, failed), Ok(None)));
        let loaded = diag.finish(SetData::default());
        assert!(matches!(
            loaded.warnings.as_slice(),
            [Warning::ObjectDecodeFailed { index: 3, .. }]
        ));
    }

    #[test]
    fn test_warning_display() {
        let w = Warning::MissingTemplate {
            index: 2,
            object_type: "Ring".into(),
            offset: Some(0x1F0),
        };
        assert_eq!(w.to_string(), "no template for object type 'Ring' (object 2, parameters at 0x1f0)");
    }

    #[test]
    fn test_missing_templates_is_error() {
        for format in [SetFormat::Colors, SetFormat::Forces, SetFormat::Heroes] {
            let result = load(format, &[0u8; 0x40], None, &LoadOptions::default());
            assert!(matches!(result, Err(Error::MissingTemplates(_))));
        }
    }

    #[test]
    fn test_load_file_not_found() {
        let result = load_file(SetFormat::Forces, "/nonexistent/x.gedit", None, &LoadOptions::default());
        assert!(matches!(result, Err(Error::FileNotFound(_))));
    }
}
