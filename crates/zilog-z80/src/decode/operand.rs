//! Operands as they appear in instruction text and opcode fields.

use std::fmt;

/// 8-bit registers, including the undocumented index halves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg8 {
    A,
    B,
    C,
    D,
    E,
    H,
    L,
    IXH,
    IXL,
    IYH,
    IYL,
    I,
    R,
}

impl Reg8 {
    /// Three-bit field code (`r` in the Zilog tables).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::B => 0,
            Self::C => 1,
            Self::D => 2,
            Self::E => 3,
            Self::H | Self::IXH | Self::IYH => 4,
            Self::L | Self::IXL | Self::IYL => 5,
            Self::A => 7,
            Self::I | Self::R => 0,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
            Self::H => "H",
            Self::L => "L",
            Self::IXH => "IXH",
            Self::IXL => "IXL",
            Self::IYH => "IYH",
            Self::IYL => "IYL",
            Self::I => "I",
            Self::R => "R",
        }
    }
}

/// 16-bit register pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg16 {
    AF,
    /// The shadow AF', only named by `EX AF,AF'`.
    AFAlt,
    BC,
    DE,
    HL,
    SP,
    IX,
    IY,
}

impl Reg16 {
    /// Two-bit field code (`rr`/`qq` in the Zilog tables).
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::BC => 0,
            Self::DE => 1,
            Self::HL | Self::IX | Self::IY => 2,
            Self::SP | Self::AF | Self::AFAlt => 3,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AF => "AF",
            Self::AFAlt => "AF'",
            Self::BC => "BC",
            Self::DE => "DE",
            Self::HL => "HL",
            Self::SP => "SP",
            Self::IX => "IX",
            Self::IY => "IY",
        }
    }
}

/// Index register used by a DD or FD prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Index {
    IX,
    IY,
}

impl Index {
    #[must_use]
    pub const fn reg16(self) -> Reg16 {
        match self {
            Self::IX => Reg16::IX,
            Self::IY => Reg16::IY,
        }
    }

    #[must_use]
    pub const fn high(self) -> Reg8 {
        match self {
            Self::IX => Reg8::IXH,
            Self::IY => Reg8::IYH,
        }
    }

    #[must_use]
    pub const fn low(self) -> Reg8 {
        match self {
            Self::IX => Reg8::IXL,
            Self::IY => Reg8::IYL,
        }
    }
}

/// Branch conditions, in field order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    NZ,
    Z,
    NC,
    C,
    PO,
    PE,
    P,
    M,
}

impl Condition {
    #[must_use]
    pub const fn code(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::NZ => "NZ",
            Self::Z => "Z",
            Self::NC => "NC",
            Self::C => "C",
            Self::PO => "PO",
            Self::PE => "PE",
            Self::P => "P",
            Self::M => "M",
        }
    }
}

/// One operand position of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operand {
    Reg8(Reg8),
    Reg16(Reg16),
    /// Memory addressed by a register pair: `(HL)`, `(SP)`, `(IX)`.
    Indirect(Reg16),
    /// `(IX+d)` / `(IY+d)`.
    Indexed(Index),
    /// `n`
    Immediate8,
    /// `nn`
    Immediate16,
    /// `(nn)`
    Absolute,
    /// `(n)`: port number from the instruction, A on the high lines.
    Port,
    /// `(C)`: port number in BC.
    PortC,
    /// `e`: signed jump offset.
    Relative,
    Condition(Condition),
    Bit(u8),
    /// `RST` target address.
    Restart(u8),
    /// `IM` mode number.
    Mode(u8),
    /// Literal zero of `OUT (C),0`.
    Zero,
    /// The F register as the target of `IN F,(C)`.
    Flags,
}

impl Operand {
    /// Value this operand contributes to an opcode field.
    #[must_use]
    pub const fn field_code(self) -> u8 {
        match self {
            Self::Reg8(r) => r.code(),
            Self::Reg16(rr) => rr.code(),
            Self::Condition(c) => c.code(),
            Self::Bit(b) => b,
            Self::Restart(address) => address >> 3,
            Self::Mode(0) => 0,
            Self::Mode(1) => 2,
            Self::Mode(_) => 3,
            _ => 0,
        }
    }

    /// Operand names a memory location rather than a register or constant.
    #[must_use]
    pub const fn is_memory(self) -> bool {
        matches!(self, Self::Indirect(_) | Self::Indexed(_) | Self::Absolute)
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reg8(r) => f.write_str(r.name()),
            Self::Reg16(rr) => f.write_str(rr.name()),
            Self::Indirect(rr) => write!(f, "({})", rr.name()),
            Self::Indexed(x) => write!(f, "({}+d)", x.reg16().name()),
            Self::Immediate8 => f.write_str("n"),
            Self::Immediate16 => f.write_str("nn"),
            Self::Absolute => f.write_str("(nn)"),
            Self::Port => f.write_str("(n)"),
            Self::PortC => f.write_str("(C)"),
            Self::Relative => f.write_str("e"),
            Self::Condition(c) => f.write_str(c.name()),
            Self::Bit(b) => write!(f, "{b}"),
            Self::Restart(address) => write!(f, "{address:02X}H"),
            Self::Mode(m) => write!(f, "{m}"),
            Self::Zero => f.write_str("0"),
            Self::Flags => f.write_str("F"),
        }
    }
}
