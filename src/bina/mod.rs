//! BINA container: the header and footer wrapped around SOBJ, Forces and
//! Sonic '06 payloads.
//!
//! A payload codec calls [`BinaHeader::begin`] to get a writer positioned at
//! the data base, writes its body with deferred offsets, then hands the writer
//! to [`BinaHeader::finish`], which appends the string table and the
//! compressed pointer table and patches the header fields.

mod header;
mod offset_table;

pub use header::*;
pub use offset_table::*;
