//! # setdata
//!
//! Readers and writers for the object placement ("set") files of several
//! Sonic titles, sharing one in-memory object model.
//!
//! ## Modules
//!
//! - [`util`] - Errors, byte order and angle helpers
//! - [`model`] - Sets, objects, transforms and parameter values
//! - [`template`] - Per-type parameter schemas used to decode binary layouts
//! - [`stream`] - Binary reader and two-pass writer
//! - [`bina`] - BINA container header, footer and offset table
//! - [`formats`] - Per-game codecs behind the [`formats::SetCodec`] trait
//! - [`interchange`] - JSON export and import of whole sets
//!
//! ## Example
//!
//! ```ignore
//! use setdata::prelude::*;
//!
//! let templates = Templates::load("templates/forces.json")?;
//! let loaded = load_file(SetFormat::Forces, "w1a01_obj_area01.gedit", Some(&templates), &LoadOptions::default())?;
//! for obj in &loaded.set.objects {
//!     println!("{} #{}", obj.object_type, obj.object_id);
//! }
//! save_file(SetFormat::Forces, "out.gedit", &loaded.set)?;
//! ```

pub mod util;
pub mod model;
pub mod template;
pub mod stream;
pub mod bina;
pub mod formats;
pub mod interchange;

// Re-export commonly used types
pub use util::{Error, Result};
pub use model::{SetData, SetObject, Parameter};
pub use formats::{SetFormat, SetCodec, LoadOptions, Loaded};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::util::{Endian, Error, Result, Quat, Vec3};
    pub use crate::model::{CustomKey, DataType, ObjectReference, ParamGroup, Parameter, SetData, SetObject, Transform};
    pub use crate::template::{SetObjectType, TemplateParam, Templates};
    pub use crate::formats::{load, load_file, save, save_file, DecodePolicy, LoadOptions, Loaded, SetCodec, SetFormat, Warning};
}
