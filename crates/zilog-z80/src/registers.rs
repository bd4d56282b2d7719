//! Z80 register file.

use crate::decode::{Condition, Reg8, Reg16};
use crate::flags::{CF, PF, SF, ZF};

/// Programmer-visible registers plus the internal WZ latch and the
/// interrupt flip-flops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Registers {
    pub a: u8,
    pub f: u8,
    pub b: u8,
    pub c: u8,
    pub d: u8,
    pub e: u8,
    pub h: u8,
    pub l: u8,

    /// Shadow AF'.
    pub af_alt: u16,
    /// Shadow BC'.
    pub bc_alt: u16,
    /// Shadow DE'.
    pub de_alt: u16,
    /// Shadow HL'.
    pub hl_alt: u16,

    pub ix: u16,
    pub iy: u16,
    pub sp: u16,
    pub pc: u16,
    /// Interrupt vector base.
    pub i: u8,
    /// Memory refresh counter. Only the low seven bits count.
    pub r: u8,

    /// Internal address latch (MEMPTR). Leaks into X/Y of `BIT n,(HL)`.
    pub wz: u16,

    pub iff1: bool,
    pub iff2: bool,
    /// Interrupt mode 0, 1 or 2.
    pub im: u8,
}

impl Registers {
    /// Register contents after RESET.
    ///
    /// PC, I, R, both flip-flops and the interrupt mode clear; AF and SP
    /// come up as all ones.
    #[must_use]
    pub fn after_reset() -> Self {
        Self {
            a: 0xFF,
            f: 0xFF,
            sp: 0xFFFF,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn af(&self) -> u16 {
        u16::from_be_bytes([self.a, self.f])
    }

    #[must_use]
    pub const fn bc(&self) -> u16 {
        u16::from_be_bytes([self.b, self.c])
    }

    #[must_use]
    pub const fn de(&self) -> u16 {
        u16::from_be_bytes([self.d, self.e])
    }

    #[must_use]
    pub const fn hl(&self) -> u16 {
        u16::from_be_bytes([self.h, self.l])
    }

    pub fn set_af(&mut self, value: u16) {
        [self.a, self.f] = value.to_be_bytes();
    }

    pub fn set_bc(&mut self, value: u16) {
        [self.b, self.c] = value.to_be_bytes();
    }

    pub fn set_de(&mut self, value: u16) {
        [self.d, self.e] = value.to_be_bytes();
    }

    pub fn set_hl(&mut self, value: u16) {
        [self.h, self.l] = value.to_be_bytes();
    }

    /// Bump the refresh counter, leaving bit 7 alone.
    pub fn increment_r(&mut self) {
        self.r = (self.r & 0x80) | (self.r.wrapping_add(1) & 0x7F);
    }

    #[must_use]
    pub const fn flag(&self, mask: u8) -> bool {
        self.f & mask != 0
    }

    #[must_use]
    pub const fn reg8(&self, reg: Reg8) -> u8 {
        match reg {
            Reg8::A => self.a,
            Reg8::B => self.b,
            Reg8::C => self.c,
            Reg8::D => self.d,
            Reg8::E => self.e,
            Reg8::H => self.h,
            Reg8::L => self.l,
            Reg8::IXH => (self.ix >> 8) as u8,
            Reg8::IXL => self.ix as u8,
            Reg8::IYH => (self.iy >> 8) as u8,
            Reg8::IYL => self.iy as u8,
            Reg8::I => self.i,
            Reg8::R => self.r,
        }
    }

    pub fn set_reg8(&mut self, reg: Reg8, value: u8) {
        match reg {
            Reg8::A => self.a = value,
            Reg8::B => self.b = value,
            Reg8::C => self.c = value,
            Reg8::D => self.d = value,
            Reg8::E => self.e = value,
            Reg8::H => self.h = value,
            Reg8::L => self.l = value,
            Reg8::IXH => self.ix = (self.ix & 0x00FF) | (u16::from(value) << 8),
            Reg8::IXL => self.ix = (self.ix & 0xFF00) | u16::from(value),
            Reg8::IYH => self.iy = (self.iy & 0x00FF) | (u16::from(value) << 8),
            Reg8::IYL => self.iy = (self.iy & 0xFF00) | u16::from(value),
            Reg8::I => self.i = value,
            Reg8::R => self.r = value,
        }
    }

    #[must_use]
    pub const fn reg16(&self, reg: Reg16) -> u16 {
        match reg {
            Reg16::AF => self.af(),
            Reg16::AFAlt => self.af_alt,
            Reg16::BC => self.bc(),
            Reg16::DE => self.de(),
            Reg16::HL => self.hl(),
            Reg16::SP => self.sp,
            Reg16::IX => self.ix,
            Reg16::IY => self.iy,
        }
    }

    pub fn set_reg16(&mut self, reg: Reg16, value: u16) {
        match reg {
            Reg16::AF => self.set_af(value),
            Reg16::AFAlt => self.af_alt = value,
            Reg16::BC => self.set_bc(value),
            Reg16::DE => self.set_de(value),
            Reg16::HL => self.set_hl(value),
            Reg16::SP => self.sp = value,
            Reg16::IX => self.ix = value,
            Reg16::IY => self.iy = value,
        }
    }

    /// Evaluate a branch condition against F.
    #[must_use]
    pub const fn condition(&self, condition: Condition) -> bool {
        match condition {
            Condition::NZ => !self.flag(ZF),
            Condition::Z => self.flag(ZF),
            Condition::NC => !self.flag(CF),
            Condition::C => self.flag(CF),
            Condition::PO => !self.flag(PF),
            Condition::PE => self.flag(PF),
            Condition::P => !self.flag(SF),
            Condition::M => self.flag(SF),
        }
    }

    /// `EXX`: swap BC, DE and HL with their shadows.
    pub fn exchange_shadow_set(&mut self) {
        let (bc, de, hl) = (self.bc(), self.de(), self.hl());
        self.set_bc(self.bc_alt);
        self.set_de(self.de_alt);
        self.set_hl(self.hl_alt);
        self.bc_alt = bc;
        self.de_alt = de;
        self.hl_alt = hl;
    }

    /// `EX AF,AF'`.
    pub fn exchange_af(&mut self) {
        let af = self.af();
        self.set_af(self.af_alt);
        self.af_alt = af;
    }
}
