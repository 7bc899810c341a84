//! Data quality bit masks for resultants and pixels.

use bitflags::bitflags;

bitflags! {
    /// Data quality flags (32 bits), shared by per-resultant and per-pixel masks.
    ///
    /// Bit values follow the usual up-the-ramp pipeline convention so masks can
    /// be exchanged with the calling pipeline unchanged. Unknown bits set by the
    /// caller are retained.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DqFlags: u32 {
        /// Resultant or pixel must not be used
        const DO_NOT_USE = 1 << 0;
        /// Resultant is saturated
        const SATURATED = 1 << 1;
        /// Jump detected at this resultant (first resultant after the jump)
        const JUMP_DET = 1 << 2;
        /// No segment of the pixel could be fit
        const NO_VALID_RAMP = 1 << 24;
    }
}

impl DqFlags {
    /// Convert a raw mask from the calling pipeline, keeping unknown bits.
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_retain(bits)
    }

    /// True when the resultant carries no flag at all and may start or extend a ramp.
    pub fn is_good(self) -> bool {
        self.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jump_bit_value() {
        assert_eq!(DqFlags::JUMP_DET.bits(), 4);
    }

    #[test]
    fn test_unknown_bits_retained() {
        let flags = DqFlags::from_raw(0x100 | 4);
        assert!(flags.contains(DqFlags::JUMP_DET));
        assert_eq!(flags.bits(), 0x104);
        assert!(!flags.is_good());
        assert!(DqFlags::from_raw(0).is_good());
    }
}
