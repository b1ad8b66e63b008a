//! Utility types shared by every codec.
//!
//! - [`Error`] / [`Result`] - Error handling
//! - [`Endian`] / [`PointerWidth`] - Runtime byte layout selection
//! - Math type re-exports from glam plus angle conversions

mod endian;
mod error;
mod math;

pub use endian::*;
pub use error::*;
pub use math::*;
