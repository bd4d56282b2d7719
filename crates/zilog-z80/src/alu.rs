//! Arithmetic and logic unit.
//!
//! Every operation is a pure function of its inputs returning the new
//! value and a complete F byte. Callers merge in any flags the
//! instruction preserves.

use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, sz53, sz53p};

/// Value and F byte produced by an ALU operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluResult {
    pub value: u8,
    pub flags: u8,
}

impl AluResult {
    const fn new(value: u8, flags: u8) -> Self {
        Self { value, flags }
    }
}

/// `ADD`/`ADC`.
#[must_use]
pub const fn add8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = carry as u16;
    let wide = a as u16 + b as u16 + c;
    let value = wide as u8;
    let mut flags = sz53(value);
    if (a & 0x0F) as u16 + (b & 0x0F) as u16 + c > 0x0F {
        flags |= HF;
    }
    if (a ^ b) & 0x80 == 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if wide > 0xFF {
        flags |= CF;
    }
    AluResult::new(value, flags)
}

/// `SUB`/`SBC`.
#[must_use]
pub const fn sub8(a: u8, b: u8, carry: bool) -> AluResult {
    let c = carry as u16;
    let value = a.wrapping_sub(b).wrapping_sub(carry as u8);
    let mut flags = sz53(value) | NF;
    if ((a & 0x0F) as u16) < (b & 0x0F) as u16 + c {
        flags |= HF;
    }
    if (a ^ b) & 0x80 != 0 && (a ^ value) & 0x80 != 0 {
        flags |= PF;
    }
    if (a as u16) < b as u16 + c {
        flags |= CF;
    }
    AluResult::new(value, flags)
}

/// `CP`: a subtraction whose X/Y come from the operand.
#[must_use]
pub const fn cp8(a: u8, b: u8) -> AluResult {
    let diff = sub8(a, b, false);
    AluResult::new(a, (diff.flags & !(YF | XF)) | (b & (YF | XF)))
}

#[must_use]
pub const fn and8(a: u8, b: u8) -> AluResult {
    let value = a & b;
    AluResult::new(value, sz53p(value) | HF)
}

#[must_use]
pub const fn or8(a: u8, b: u8) -> AluResult {
    let value = a | b;
    AluResult::new(value, sz53p(value))
}

#[must_use]
pub const fn xor8(a: u8, b: u8) -> AluResult {
    let value = a ^ b;
    AluResult::new(value, sz53p(value))
}

/// `INC`. Carry is not produced; callers keep the old one.
#[must_use]
pub const fn inc8(a: u8) -> AluResult {
    let value = a.wrapping_add(1);
    let mut flags = sz53(value);
    if a & 0x0F == 0x0F {
        flags |= HF;
    }
    if a == 0x7F {
        flags |= PF;
    }
    AluResult::new(value, flags)
}

/// `DEC`. Carry is not produced; callers keep the old one.
#[must_use]
pub const fn dec8(a: u8) -> AluResult {
    let value = a.wrapping_sub(1);
    let mut flags = sz53(value) | NF;
    if a & 0x0F == 0 {
        flags |= HF;
    }
    if a == 0x80 {
        flags |= PF;
    }
    AluResult::new(value, flags)
}

/// The eight CB-prefixed rotate and shift operations, in encoding order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shift {
    Rlc,
    Rrc,
    Rl,
    Rr,
    Sla,
    Sra,
    /// Undocumented: shift left, filling bit 0 with one.
    Sll,
    Srl,
}

/// Apply a CB-prefixed rotate or shift. Flags are S, Z, parity and the
/// bit shifted out.
#[must_use]
pub const fn shift8(op: Shift, a: u8, carry: bool) -> AluResult {
    let (value, out) = match op {
        Shift::Rlc => (a.rotate_left(1), a & 0x80 != 0),
        Shift::Rrc => (a.rotate_right(1), a & 0x01 != 0),
        Shift::Rl => ((a << 1) | carry as u8, a & 0x80 != 0),
        Shift::Rr => ((a >> 1) | ((carry as u8) << 7), a & 0x01 != 0),
        Shift::Sla => (a << 1, a & 0x80 != 0),
        Shift::Sra => ((a >> 1) | (a & 0x80), a & 0x01 != 0),
        Shift::Sll => ((a << 1) | 0x01, a & 0x80 != 0),
        Shift::Srl => (a >> 1, a & 0x01 != 0),
    };
    AluResult::new(value, sz53p(value) | if out { CF } else { 0 })
}

/// Accumulator rotates (`RLCA`, `RRCA`, `RLA`, `RRA`). S, Z and P/V are
/// preserved from `f`.
#[must_use]
pub const fn rotate_a(op: Shift, a: u8, f: u8) -> AluResult {
    let full = shift8(op, a, f & CF != 0);
    let flags = (f & (SF | ZF | PF)) | (full.value & (YF | XF)) | (full.flags & CF);
    AluResult::new(full.value, flags)
}

/// `DAA`: decimal-adjust A after a BCD add or subtract.
#[must_use]
pub const fn daa(a: u8, f: u8) -> AluResult {
    let subtract = f & NF != 0;
    let mut correction = 0u8;
    let mut carry = f & CF != 0;
    if f & HF != 0 || a & 0x0F > 9 {
        correction |= 0x06;
    }
    if carry || a > 0x99 {
        correction |= 0x60;
        carry = true;
    }
    let value = if subtract {
        a.wrapping_sub(correction)
    } else {
        a.wrapping_add(correction)
    };
    let half = if subtract {
        f & HF != 0 && a & 0x0F < 6
    } else {
        a & 0x0F > 9
    };
    let mut flags = sz53p(value) | (f & NF);
    if half {
        flags |= HF;
    }
    if carry {
        flags |= CF;
    }
    AluResult::new(value, flags)
}

/// 16-bit `ADD`. Only H, C, X and Y are produced; S, Z and P/V come
/// from the caller.
#[must_use]
pub const fn add16(a: u16, b: u16) -> (u16, u8) {
    let wide = a as u32 + b as u32;
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (YF | XF);
    if (a & 0x0FFF) + (b & 0x0FFF) > 0x0FFF {
        flags |= HF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

/// 16-bit `ADC`: every flag.
#[must_use]
pub const fn adc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = carry as u32;
    let wide = a as u32 + b as u32 + c;
    let value = wide as u16;
    let mut flags = ((value >> 8) as u8) & (SF | YF | XF);
    if value == 0 {
        flags |= ZF;
    }
    if (a & 0x0FFF) as u32 + (b & 0x0FFF) as u32 + c > 0x0FFF {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 == 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if wide > 0xFFFF {
        flags |= CF;
    }
    (value, flags)
}

/// 16-bit `SBC`: every flag.
#[must_use]
pub const fn sbc16(a: u16, b: u16, carry: bool) -> (u16, u8) {
    let c = carry as u32;
    let value = a.wrapping_sub(b).wrapping_sub(carry as u16);
    let mut flags = (((value >> 8) as u8) & (SF | YF | XF)) | NF;
    if value == 0 {
        flags |= ZF;
    }
    if ((a & 0x0FFF) as u32) < (b & 0x0FFF) as u32 + c {
        flags |= HF;
    }
    if (a ^ b) & 0x8000 != 0 && (a ^ value) & 0x8000 != 0 {
        flags |= PF;
    }
    if (a as u32) < b as u32 + c {
        flags |= CF;
    }
    (value, flags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn add_overflow_and_half_carry() {
        let r = add8(0x7F, 0x01, false);
        assert_eq!(r.value, 0x80);
        assert_eq!(r.flags & (SF | HF | PF | CF), SF | HF | PF);

        let r = add8(0xFF, 0x01, false);
        assert_eq!(r.value, 0);
        assert_eq!(r.flags & (ZF | HF | CF), ZF | HF | CF);
    }

    #[test]
    fn sub_borrow() {
        let r = sub8(0x00, 0x01, false);
        assert_eq!(r.value, 0xFF);
        assert_eq!(r.flags & (SF | HF | NF | CF), SF | HF | NF | CF);

        let r = sub8(0x80, 0x01, false);
        assert_eq!(r.flags & PF, PF);
    }

    #[test]
    fn cp_takes_xy_from_operand() {
        let r = cp8(0x00, 0x28);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & (YF | XF), YF | XF);
    }

    #[test]
    fn inc_dec_edges() {
        assert_eq!(inc8(0x7F).flags & PF, PF);
        assert_eq!(inc8(0x0F).flags & HF, HF);
        assert_eq!(dec8(0x80).flags & PF, PF);
        assert_eq!(dec8(0x01).flags & ZF, ZF);
    }

    #[test]
    fn shifts() {
        assert_eq!(shift8(Shift::Rlc, 0x81, false).value, 0x03);
        assert_eq!(shift8(Shift::Rlc, 0x81, false).flags & CF, CF);
        assert_eq!(shift8(Shift::Rr, 0x01, true).value, 0x80);
        assert_eq!(shift8(Shift::Sra, 0x81, false).value, 0xC0);
        assert_eq!(shift8(Shift::Sll, 0x00, false).value, 0x01);
        assert_eq!(shift8(Shift::Srl, 0x80, false).value, 0x40);
    }

    #[test]
    fn rotate_a_keeps_szp() {
        let r = rotate_a(Shift::Rlc, 0x80, SF | ZF | PF);
        assert_eq!(r.value, 0x01);
        assert_eq!(r.flags, SF | ZF | PF | CF);
    }

    #[test]
    fn daa_after_bcd_add() {
        // 0x15 + 0x27 = 0x3C, adjusted to 0x42.
        let sum = add8(0x15, 0x27, false);
        let r = daa(sum.value, sum.flags);
        assert_eq!(r.value, 0x42);
        assert_eq!(r.flags & CF, 0);

        // 0x99 + 0x01 = 0x9A, adjusted to 0x00 with carry.
        let sum = add8(0x99, 0x01, false);
        let r = daa(sum.value, sum.flags);
        assert_eq!(r.value, 0x00);
        assert_eq!(r.flags & (ZF | CF), ZF | CF);
    }

    #[test]
    fn daa_after_bcd_subtract() {
        // 0x42 - 0x15 = 0x2D, adjusted to 0x27.
        let diff = sub8(0x42, 0x15, false);
        let r = daa(diff.value, diff.flags);
        assert_eq!(r.value, 0x27);
    }

    #[test]
    fn sixteen_bit_carries() {
        assert_eq!(add16(0x0FFF, 0x0001), (0x1000, HF));
        assert_eq!(add16(0xFFFF, 0x0001).1 & CF, CF);
        let (v, f) = adc16(0x0001, 0x0002, true);
        assert_eq!(v, 0x0004);
        assert_eq!(f & (ZF | CF), 0);
        let (v, f) = sbc16(0x0000, 0x0000, true);
        assert_eq!(v, 0xFFFF);
        assert_eq!(f & (SF | NF | CF), SF | NF | CF);
    }

    proptest! {
        #[test]
        fn add_then_sub_restores(a in any::<u8>(), b in any::<u8>()) {
            let sum = add8(a, b, false);
            prop_assert_eq!(sub8(sum.value, b, false).value, a);
        }

        #[test]
        fn carry_matches_wide_arithmetic(a in any::<u8>(), b in any::<u8>(), c in any::<bool>()) {
            let wide = u16::from(a) + u16::from(b) + u16::from(c);
            prop_assert_eq!(add8(a, b, c).flags & CF != 0, wide > 0xFF);
            let borrow = u16::from(a) < u16::from(b) + u16::from(c);
            prop_assert_eq!(sub8(a, b, c).flags & CF != 0, borrow);
        }

        #[test]
        fn zero_flag_tracks_value(a in any::<u8>(), b in any::<u8>()) {
            for r in [and8(a, b), or8(a, b), xor8(a, b), sub8(a, b, false)] {
                prop_assert_eq!(r.flags & ZF != 0, r.value == 0);
            }
        }
    }
}
