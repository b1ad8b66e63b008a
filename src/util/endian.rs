//! Byte order and pointer width selection.

use serde::{Deserialize, Serialize};

/// Byte order of a set file. Console builds are big-endian, PC builds little-endian.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Endian {
    #[default]
    Little,
    Big,
}

impl Endian {
    /// Marker character stored in BINA headers.
    pub const fn marker(self) -> u8 {
        match self {
            Self::Little => b'L',
            Self::Big => b'B',
        }
    }

    /// Parse a BINA endian marker.
    pub const fn from_marker(marker: u8) -> Option<Self> {
        match marker {
            b'L' => Some(Self::Little),
            b'B' => Some(Self::Big),
            _ => None,
        }
    }
}

/// Size of a file pointer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PointerWidth {
    #[default]
    U32,
    U64,
}

impl PointerWidth {
    /// Number of bytes a pointer occupies.
    #[inline]
    pub const fn bytes(self) -> usize {
        match self {
            Self::U32 => 4,
            Self::U64 => 8,
        }
    }
}
