//! Error types for set data codecs.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for set data operations.
#[derive(Error, Debug)]
pub enum Error {
    /// File does not exist or cannot be accessed
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Signature bytes did not match the expected value
    #[error("Invalid signature: expected {expected:?}, found {found:?}")]
    InvalidSignature { expected: String, found: String },

    /// Container or payload version the codec does not understand
    #[error("Unsupported version: {0}")]
    UnsupportedVersion(String),

    /// Read or jump past the end of the stream
    #[error("Offset {offset:#x} out of bounds (stream length {len:#x})")]
    OutOfBounds { offset: u64, len: u64 },

    /// An offset placeholder was never filled in, or filled in without being added
    #[error("Unresolved offset placeholder: {0}")]
    UnresolvedOffset(String),

    /// The same placeholder label was added twice
    #[error("Duplicate offset placeholder: {0}")]
    DuplicateOffset(String),

    /// Template dictionary is required by this format but was not supplied
    #[error("{0} requires an object template dictionary")]
    MissingTemplates(&'static str),

    /// Format has a hard object limit
    #[error("Too many objects: {count} (format maximum is {max})")]
    CapacityExceeded { count: usize, max: usize },

    /// Object id does not fit the format's id range
    #[error("Object id {id} out of range (format maximum is {max})")]
    InvalidObjectId { id: u32, max: u32 },

    /// Two objects share an id where the id addresses a storage slot
    #[error("Duplicate object id: {0}")]
    DuplicateObjectId(u32),

    /// Parameter type has no representation in this format
    #[error("{format} cannot encode parameters of type {data_type}")]
    UnsupportedType { format: &'static str, data_type: String },

    /// Parameters do not fit into a fixed-size parameter entry
    #[error("Parameters of {object_type} need {len} bytes (entry holds {max})")]
    ParamOverflow { object_type: String, len: usize, max: usize },

    /// Object type name cannot be mapped onto the format's type encoding
    #[error("Invalid object type name: {0}")]
    InvalidTypeName(String),

    /// Invalid data structure in file
    #[error("Invalid file structure: {0}")]
    InvalidStructure(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// UTF-8 conversion error
    #[error("Invalid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Interchange or template JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create an "other" error from a string.
    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Create an invalid structure error.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidStructure(msg.into())
    }
}

/// Result type alias for set data operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = Error::CapacityExceeded { count: 2049, max: 2048 };
        assert!(e.to_string().contains("2049"));
        assert!(e.to_string().contains("2048"));

        let e = Error::OutOfBounds { offset: 0x40, len: 0x10 };
        assert!(e.to_string().contains("0x40"));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
