//! Bits of the F register and the lookups shared by the ALU.

/// Sign: bit 7 of the result.
pub const SF: u8 = 0x80;
/// Zero.
pub const ZF: u8 = 0x40;
/// Undocumented copy of result bit 5.
pub const YF: u8 = 0x20;
/// Half-carry out of bit 3 (bit 11 for 16-bit adds).
pub const HF: u8 = 0x10;
/// Undocumented copy of result bit 3.
pub const XF: u8 = 0x08;
/// Parity or overflow, depending on the instruction.
pub const PF: u8 = 0x04;
/// Last operation was a subtraction.
pub const NF: u8 = 0x02;
/// Carry out of bit 7 (bit 15 for 16-bit adds).
pub const CF: u8 = 0x01;

/// True for an even number of set bits.
#[must_use]
pub const fn parity(value: u8) -> bool {
    value.count_ones() % 2 == 0
}

/// S, Z, Y and X for an 8-bit result.
#[must_use]
pub const fn sz53(value: u8) -> u8 {
    let zero = if value == 0 { ZF } else { 0 };
    (value & (SF | YF | XF)) | zero
}

/// [`sz53`] plus parity in P/V.
#[must_use]
pub const fn sz53p(value: u8) -> u8 {
    if parity(value) {
        sz53(value) | PF
    } else {
        sz53(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sz53_copies_undocumented_bits() {
        assert_eq!(sz53(0x00), ZF);
        assert_eq!(sz53(0x80), SF);
        assert_eq!(sz53(0x28), YF | XF);
        assert_eq!(sz53(0xFF), SF | YF | XF);
    }

    #[test]
    fn parity_is_even_bit_count() {
        assert!(parity(0x00));
        assert!(parity(0x03));
        assert!(!parity(0x01));
        assert_eq!(sz53p(0x00), ZF | PF);
        assert_eq!(sz53p(0x01), 0);
    }
}
