//! Binary stream primitives shared by every binary codec.
//!
//! [`SetReader`] is a bounds-checked cursor with base-relative jumps,
//! [`SetWriter`] a growable buffer with two-pass offset patching and a
//! deduplicated string pool. Both pick byte order and pointer width at runtime.

mod reader;
mod writer;

pub use reader::*;
pub use writer::*;

/// Round `value` up to a multiple of `align`.
#[inline]
pub const fn align_up(value: u64, align: u64) -> u64 {
    if align <= 1 {
        value
    } else {
        value.div_ceil(align) * align
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 16), 0);
        assert_eq!(align_up(1, 4), 4);
        assert_eq!(align_up(16, 16), 16);
        assert_eq!(align_up(17, 8), 24);
        assert_eq!(align_up(5, 1), 5);
    }
}
