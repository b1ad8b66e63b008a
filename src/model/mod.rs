//! In-memory object model shared by every codec.
//!
//! A [`SetData`] is an ordered list of [`SetObject`]s. Each object carries a
//! type name, an id, its [`Transform`], optional child transforms, template
//! ordered [`Parameter`]s and format-specific custom data keyed by
//! [`CustomKey`].

mod custom;
mod exact;
mod object;
mod param;
mod set;

pub use custom::*;
pub use object::*;
pub use param::*;
pub use set::*;
