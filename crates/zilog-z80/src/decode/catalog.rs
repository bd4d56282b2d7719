//! The instruction set as data.
//!
//! Each [`InstructionType`] is one logical operation; each of its
//! [`ParametersVariant`]s is one addressing-mode combination with an
//! opcode pattern, a byte size and a timing template. The opcode tables
//! are generated from this catalog.

use std::fmt;

use super::TableId;
use super::operand::{Condition, Index, Operand, Reg8, Reg16};
use super::timing::{ExecutionVariant, timing};

/// Instruction mnemonics, plus the CPU-synthesised internal operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mnemonic {
    Adc,
    Add,
    And,
    Bit,
    Call,
    Ccf,
    Cp,
    Cpd,
    Cpdr,
    Cpi,
    Cpir,
    Cpl,
    Daa,
    Dec,
    Di,
    Djnz,
    Ei,
    Ex,
    Exx,
    Halt,
    Im,
    In,
    Inc,
    Ind,
    Indr,
    Ini,
    Inir,
    Jp,
    Jr,
    Ld,
    Ldd,
    Lddr,
    Ldi,
    Ldir,
    Neg,
    Nop,
    Or,
    Otdr,
    Otir,
    Out,
    Outd,
    Outi,
    Pop,
    Push,
    Res,
    Ret,
    Reti,
    Retn,
    Rl,
    Rla,
    Rlc,
    Rlca,
    Rld,
    Rr,
    Rra,
    Rrc,
    Rrca,
    Rrd,
    Rst,
    Sbc,
    Scf,
    Set,
    Sla,
    Sll,
    Sra,
    Srl,
    Sub,
    Xor,
    // === Internal ===
    /// Non-maskable interrupt entry.
    Nmi,
    /// Maskable interrupt acknowledge (modes 1 and 2).
    Int,
    /// Opcode fetch repeated while halted.
    HaltNop,
}

impl Mnemonic {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Adc => "ADC",
            Self::Add => "ADD",
            Self::And => "AND",
            Self::Bit => "BIT",
            Self::Call => "CALL",
            Self::Ccf => "CCF",
            Self::Cp => "CP",
            Self::Cpd => "CPD",
            Self::Cpdr => "CPDR",
            Self::Cpi => "CPI",
            Self::Cpir => "CPIR",
            Self::Cpl => "CPL",
            Self::Daa => "DAA",
            Self::Dec => "DEC",
            Self::Di => "DI",
            Self::Djnz => "DJNZ",
            Self::Ei => "EI",
            Self::Ex => "EX",
            Self::Exx => "EXX",
            Self::Halt => "HALT",
            Self::Im => "IM",
            Self::In => "IN",
            Self::Inc => "INC",
            Self::Ind => "IND",
            Self::Indr => "INDR",
            Self::Ini => "INI",
            Self::Inir => "INIR",
            Self::Jp => "JP",
            Self::Jr => "JR",
            Self::Ld => "LD",
            Self::Ldd => "LDD",
            Self::Lddr => "LDDR",
            Self::Ldi => "LDI",
            Self::Ldir => "LDIR",
            Self::Neg => "NEG",
            Self::Nop => "NOP",
            Self::Or => "OR",
            Self::Otdr => "OTDR",
            Self::Otir => "OTIR",
            Self::Out => "OUT",
            Self::Outd => "OUTD",
            Self::Outi => "OUTI",
            Self::Pop => "POP",
            Self::Push => "PUSH",
            Self::Res => "RES",
            Self::Ret => "RET",
            Self::Reti => "RETI",
            Self::Retn => "RETN",
            Self::Rl => "RL",
            Self::Rla => "RLA",
            Self::Rlc => "RLC",
            Self::Rlca => "RLCA",
            Self::Rld => "RLD",
            Self::Rr => "RR",
            Self::Rra => "RRA",
            Self::Rrc => "RRC",
            Self::Rrca => "RRCA",
            Self::Rrd => "RRD",
            Self::Rst => "RST",
            Self::Sbc => "SBC",
            Self::Scf => "SCF",
            Self::Set => "SET",
            Self::Sla => "SLA",
            Self::Sll => "SLL",
            Self::Sra => "SRA",
            Self::Srl => "SRL",
            Self::Sub => "SUB",
            Self::Xor => "XOR",
            Self::Nmi => "NMI",
            Self::Int => "INT",
            Self::HaltNop => "HALT-NOP",
        }
    }

    /// Synthesised by the CPU rather than fetched.
    #[must_use]
    pub const fn is_internal(self) -> bool {
        matches!(self, Self::Nmi | Self::Int | Self::HaltNop)
    }
}

impl fmt::Display for Mnemonic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One parameter position of a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Always this operand; contributes nothing to the opcode.
    Fixed(Operand),
    /// One of `operands`, whose field code is shifted into the opcode.
    Field {
        operands: &'static [Operand],
        shift: u8,
    },
}

impl Slot {
    #[must_use]
    pub fn operands(&self) -> &[Operand] {
        match self {
            Self::Fixed(operand) => std::slice::from_ref(operand),
            Self::Field { operands, .. } => operands,
        }
    }
}

/// Opcodes that decode to a variant without being part of its pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplicates {
    None,
    /// `(mirror, primary)`: the mirror byte behaves exactly like the
    /// primary byte.
    Mirrors(&'static [(u8, u8)]),
    /// The low three opcode bits are ignored.
    IgnoredLowBits,
    /// Every byte of the table nothing else claims.
    FillUnused,
}

/// One addressing-mode combination of an instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParametersVariant {
    /// `None` for internal operations.
    pub table: Option<TableId>,
    /// Opcode with every field zero.
    pub opcode: u8,
    pub slots: Vec<Slot>,
    /// Bytes including prefixes, displacement and immediates.
    pub size: u8,
    pub undocumented: bool,
    pub timing: ExecutionVariant,
    pub duplicates: Duplicates,
}

impl ParametersVariant {
    fn new(table: TableId, opcode: u8, size: u8, timing: ExecutionVariant) -> Self {
        Self {
            table: Some(table),
            opcode,
            slots: Vec::new(),
            size,
            undocumented: false,
            timing,
            duplicates: Duplicates::None,
        }
    }

    fn internal(timing: ExecutionVariant) -> Self {
        Self {
            table: None,
            opcode: 0,
            slots: Vec::new(),
            size: 0,
            undocumented: false,
            timing,
            duplicates: Duplicates::None,
        }
    }

    fn fixed(mut self, operand: Operand) -> Self {
        self.slots.push(Slot::Fixed(operand));
        self
    }

    fn field(mut self, operands: &'static [Operand], shift: u8) -> Self {
        self.slots.push(Slot::Field { operands, shift });
        self
    }

    fn undocumented(mut self) -> Self {
        self.undocumented = true;
        self
    }

    fn duplicates(mut self, duplicates: Duplicates) -> Self {
        self.duplicates = duplicates;
        self
    }

    /// Number of distinct opcodes the pattern produces.
    #[must_use]
    pub fn opcode_count(&self) -> usize {
        self.slots.iter().map(|s| s.operands().len()).product()
    }

    /// Every `(opcode, operands)` the pattern produces, in field order.
    #[must_use]
    pub fn encodings(&self) -> Vec<(u8, [Option<Operand>; 3])> {
        let mut out = vec![(self.opcode, [None; 3])];
        for (position, slot) in self.slots.iter().enumerate() {
            let mut next = Vec::with_capacity(out.len() * slot.operands().len());
            for (opcode, operands) in &out {
                for &operand in slot.operands() {
                    let mut operands = *operands;
                    operands[position] = Some(operand);
                    let opcode = match slot {
                        Slot::Fixed(_) => *opcode,
                        Slot::Field { shift, .. } => *opcode | (operand.field_code() << shift),
                    };
                    next.push((opcode, operands));
                }
            }
            out = next;
        }
        out
    }
}

/// One logical operation and all its addressing modes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionType {
    pub mnemonic: Mnemonic,
    pub variants: Vec<ParametersVariant>,
}

impl InstructionType {
    /// At least one variant appears in the Zilog manual.
    #[must_use]
    pub fn documented(&self) -> bool {
        self.variants.iter().any(|v| !v.undocumented)
    }

    #[must_use]
    pub const fn internal(&self) -> bool {
        self.mnemonic.is_internal()
    }
}

// === Operand lists ===

const A: Operand = Operand::Reg8(Reg8::A);
const B: Operand = Operand::Reg8(Reg8::B);
const C: Operand = Operand::Reg8(Reg8::C);
const D: Operand = Operand::Reg8(Reg8::D);
const E: Operand = Operand::Reg8(Reg8::E);
const H: Operand = Operand::Reg8(Reg8::H);
const L: Operand = Operand::Reg8(Reg8::L);
const I: Operand = Operand::Reg8(Reg8::I);
const R: Operand = Operand::Reg8(Reg8::R);
const BC: Operand = Operand::Reg16(Reg16::BC);
const DE: Operand = Operand::Reg16(Reg16::DE);
const HL: Operand = Operand::Reg16(Reg16::HL);
const SP: Operand = Operand::Reg16(Reg16::SP);
const AF: Operand = Operand::Reg16(Reg16::AF);
const AT_HL: Operand = Operand::Indirect(Reg16::HL);
const N: Operand = Operand::Immediate8;
const NN: Operand = Operand::Immediate16;
const AT_NN: Operand = Operand::Absolute;

const REG8: &[Operand] = &[B, C, D, E, H, L, A];
const REG8_UNINDEXED: &[Operand] = &[B, C, D, E, A];
const PAIRS: &[Operand] = &[BC, DE, HL, SP];
const STACK_PAIRS: &[Operand] = &[BC, DE, HL, AF];
const IX_PAIRS: &[Operand] = &[BC, DE, Operand::Reg16(Reg16::IX), SP];
const IY_PAIRS: &[Operand] = &[BC, DE, Operand::Reg16(Reg16::IY), SP];
const IX_HALVES: &[Operand] = &[Operand::Reg8(Reg8::IXH), Operand::Reg8(Reg8::IXL)];
const IY_HALVES: &[Operand] = &[Operand::Reg8(Reg8::IYH), Operand::Reg8(Reg8::IYL)];
const CONDITIONS: &[Operand] = &[
    Operand::Condition(Condition::NZ),
    Operand::Condition(Condition::Z),
    Operand::Condition(Condition::NC),
    Operand::Condition(Condition::C),
    Operand::Condition(Condition::PO),
    Operand::Condition(Condition::PE),
    Operand::Condition(Condition::P),
    Operand::Condition(Condition::M),
];
const JR_CONDITIONS: &[Operand] = &[
    Operand::Condition(Condition::NZ),
    Operand::Condition(Condition::Z),
    Operand::Condition(Condition::NC),
    Operand::Condition(Condition::C),
];
const BITS: &[Operand] = &[
    Operand::Bit(0),
    Operand::Bit(1),
    Operand::Bit(2),
    Operand::Bit(3),
    Operand::Bit(4),
    Operand::Bit(5),
    Operand::Bit(6),
    Operand::Bit(7),
];
const RESTARTS: &[Operand] = &[
    Operand::Restart(0x00),
    Operand::Restart(0x08),
    Operand::Restart(0x10),
    Operand::Restart(0x18),
    Operand::Restart(0x20),
    Operand::Restart(0x28),
    Operand::Restart(0x30),
    Operand::Restart(0x38),
];
const MODES: &[Operand] = &[Operand::Mode(0), Operand::Mode(1), Operand::Mode(2)];

const fn index_pairs(x: Index) -> &'static [Operand] {
    match x {
        Index::IX => IX_PAIRS,
        Index::IY => IY_PAIRS,
    }
}

const fn index_halves(x: Index) -> &'static [Operand] {
    match x {
        Index::IX => IX_HALVES,
        Index::IY => IY_HALVES,
    }
}

// === Timing templates ===

const T4: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4 => 4));
const T6: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 6 => 6));
const IMM8: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Od 3 => 7));
const MEM_READ: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Mr 3 => 7));
const MEM_WRITE: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Mw 3 => 7));
const IMM8_TO_MEM: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Od 3, Mw 3 => 10));
const IMM16: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Odl 3, Odh 3 => 10));
const LOAD16_ABS: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Odl 3, Odh 3, Mrl 3, Mrh 3 => 16));
const STORE16_ABS: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Odl 3, Odh 3, Mwl 3, Mwh 3 => 16));
const LOAD8_ABS: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Odl 3, Odh 3, Mr 3 => 13));
const STORE8_ABS: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Odl 3, Odh 3, Mw 3 => 13));
const ADD16: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Cpu 4, Cpu 3 => 11));
const READ_MODIFY_WRITE: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Mr 4, Mw 3 => 11));
const JR: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Od 3, Cpu 5 => 12));
const JR_CC: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 4, Od 3 => 7),
    timing!(Ocf 4, Od 3, Cpu 5 => 12),
);
const DJNZ: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 5, Od 3 => 8),
    timing!(Ocf 5, Od 3, Cpu 5 => 13),
);
const CALL: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Odl 3, Odh 4, Swh 3, Swl 3 => 17));
const CALL_CC: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 4, Odl 3, Odh 3 => 10),
    timing!(Ocf 4, Odl 3, Odh 4, Swh 3, Swl 3 => 17),
);
const POP: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Srl 3, Srh 3 => 10));
const RET_CC: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 5 => 5),
    timing!(Ocf 5, Srl 3, Srh 3 => 11),
);
const PUSH: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 5, Swh 3, Swl 3 => 11));
const EX_SP: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Srl 3, Srh 4, Swh 3, Swl 5 => 19));
const PORT_IN_N: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Od 3, Pr 4 => 11));
const PORT_OUT_N: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Od 3, Pw 4 => 11));

const PREFIXED: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4 => 8));
const CB_MEM: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Mr 4, Mw 3 => 15));
const CB_BIT_MEM: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Mr 4 => 12));

const PORT_IN_C: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Pr 4 => 12));
const PORT_OUT_C: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Pw 4 => 12));
const PREFIXED_ADD16: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Cpu 4, Cpu 3 => 15));
const PREFIXED_IMM16: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Odl 3, Odh 3 => 14));
const PREFIXED_LOAD16_ABS: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Odl 3, Odh 3, Mrl 3, Mrh 3 => 20));
const PREFIXED_STORE16_ABS: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Odl 3, Odh 3, Mwl 3, Mwh 3 => 20));
const PREFIXED_POP: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Srl 3, Srh 3 => 14));
const LD_IR: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Ocf 5 => 9));
const RXD: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Mr 3, Cpu 4, Mw 3 => 18));
const BLOCK_LOAD: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Mr 3, Mw 5 => 16));
const BLOCK_LOAD_REPEAT: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 4, Ocf 4, Mr 3, Mw 5 => 16),
    timing!(Ocf 4, Ocf 4, Mr 3, Mw 5, Cpu 5 => 21),
);
const BLOCK_COMPARE: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Mr 3, Cpu 5 => 16));
const BLOCK_COMPARE_REPEAT: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 4, Ocf 4, Mr 3, Cpu 5 => 16),
    timing!(Ocf 4, Ocf 4, Mr 3, Cpu 5, Cpu 5 => 21),
);
const BLOCK_IN: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 5, Pr 4, Mw 3 => 16));
const BLOCK_IN_REPEAT: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 4, Ocf 5, Pr 4, Mw 3 => 16),
    timing!(Ocf 4, Ocf 5, Pr 4, Mw 3, Cpu 5 => 21),
);
const BLOCK_OUT: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 5, Mr 3, Pw 4 => 16));
const BLOCK_OUT_REPEAT: ExecutionVariant = ExecutionVariant::conditional(
    timing!(Ocf 4, Ocf 5, Mr 3, Pw 4 => 16),
    timing!(Ocf 4, Ocf 5, Mr 3, Pw 4, Cpu 5 => 21),
);

const INDEX_INC16: ExecutionVariant = ExecutionVariant::fixed(timing!(Ocf 4, Ocf 6 => 10));
const INDEX_HALF_IMM: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3 => 11));
const INDEX_RMW: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3, Cpu 5, Mr 4, Mw 3 => 23));
const INDEX_STORE_IMM: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3, Od 5, Mw 3 => 19));
const INDEX_READ: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3, Cpu 5, Mr 3 => 19));
const INDEX_WRITE: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3, Cpu 5, Mw 3 => 19));
const INDEX_PUSH: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 5, Swh 3, Swl 3 => 15));
const INDEX_EX_SP: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Srl 3, Srh 4, Swh 3, Swl 5 => 23));
const INDEX_BIT_RMW: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3, Ocf 5, Mr 4, Mw 3 => 23));
const INDEX_BIT_TEST: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 4, Ocf 4, Od 3, Ocf 5, Mr 4 => 20));

/// NMI entry and the mode 1 acknowledge: a 5 T-state fetch, then push PC.
pub(crate) const INTERRUPT_PUSH: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 5, Swh 3, Swl 3 => 11));
/// Mode 2 acknowledge: push PC, then read the vector table entry.
pub(crate) const INTERRUPT_VECTOR: ExecutionVariant =
    ExecutionVariant::fixed(timing!(Ocf 5, Swh 3, Swl 3, Mrl 3, Mrh 3 => 17));

// === Catalog ===

#[derive(Default)]
struct Builder {
    types: Vec<InstructionType>,
}

impl Builder {
    fn add(&mut self, mnemonic: Mnemonic, variant: ParametersVariant) {
        match self.types.iter_mut().find(|t| t.mnemonic == mnemonic) {
            Some(existing) => existing.variants.push(variant),
            None => self.types.push(InstructionType {
                mnemonic,
                variants: vec![variant],
            }),
        }
    }
}

fn v(table: TableId, opcode: u8, size: u8, timing: ExecutionVariant) -> ParametersVariant {
    ParametersVariant::new(table, opcode, size, timing)
}

/// Build every instruction type. Called once by the table builder.
pub(crate) fn build() -> Vec<InstructionType> {
    let mut b = Builder::default();
    unprefixed(&mut b);
    bit_ops(&mut b);
    extended(&mut b);
    indexed(&mut b, TableId::Dd, Index::IX);
    indexed(&mut b, TableId::Fd, Index::IY);
    indexed_bit_ops(&mut b, TableId::DdCb, Index::IX);
    indexed_bit_ops(&mut b, TableId::FdCb, Index::IY);
    internal(&mut b);
    b.types
}

/// 8-bit ALU operations in field order, with whether the text names A.
const ALU_OPS: [(Mnemonic, bool); 8] = [
    (Mnemonic::Add, true),
    (Mnemonic::Adc, true),
    (Mnemonic::Sub, false),
    (Mnemonic::Sbc, true),
    (Mnemonic::And, false),
    (Mnemonic::Xor, false),
    (Mnemonic::Or, false),
    (Mnemonic::Cp, false),
];

/// CB-page rotates and shifts in field order.
const SHIFT_OPS: [(Mnemonic, bool); 8] = [
    (Mnemonic::Rlc, false),
    (Mnemonic::Rrc, false),
    (Mnemonic::Rl, false),
    (Mnemonic::Rr, false),
    (Mnemonic::Sla, false),
    (Mnemonic::Sra, false),
    (Mnemonic::Sll, true),
    (Mnemonic::Srl, false),
];

fn with_accumulator(variant: ParametersVariant, names_a: bool) -> ParametersVariant {
    if names_a { variant.fixed(A) } else { variant }
}

fn unprefixed(b: &mut Builder) {
    use Mnemonic as M;
    use TableId::Main;

    b.add(M::Nop, v(Main, 0x00, 1, T4));

    // 8-bit loads
    b.add(M::Ld, v(Main, 0x40, 1, T4).field(REG8, 3).field(REG8, 0));
    b.add(M::Ld, v(Main, 0x06, 2, IMM8).field(REG8, 3).fixed(N));
    b.add(M::Ld, v(Main, 0x46, 1, MEM_READ).field(REG8, 3).fixed(AT_HL));
    b.add(M::Ld, v(Main, 0x70, 1, MEM_WRITE).fixed(AT_HL).field(REG8, 0));
    b.add(M::Ld, v(Main, 0x36, 2, IMM8_TO_MEM).fixed(AT_HL).fixed(N));
    b.add(M::Ld, v(Main, 0x0A, 1, MEM_READ).fixed(A).fixed(Operand::Indirect(Reg16::BC)));
    b.add(M::Ld, v(Main, 0x1A, 1, MEM_READ).fixed(A).fixed(Operand::Indirect(Reg16::DE)));
    b.add(M::Ld, v(Main, 0x02, 1, MEM_WRITE).fixed(Operand::Indirect(Reg16::BC)).fixed(A));
    b.add(M::Ld, v(Main, 0x12, 1, MEM_WRITE).fixed(Operand::Indirect(Reg16::DE)).fixed(A));
    b.add(M::Ld, v(Main, 0x3A, 3, LOAD8_ABS).fixed(A).fixed(AT_NN));
    b.add(M::Ld, v(Main, 0x32, 3, STORE8_ABS).fixed(AT_NN).fixed(A));

    // 16-bit loads
    b.add(M::Ld, v(Main, 0x01, 3, IMM16).field(PAIRS, 4).fixed(NN));
    b.add(M::Ld, v(Main, 0x2A, 3, LOAD16_ABS).fixed(HL).fixed(AT_NN));
    b.add(M::Ld, v(Main, 0x22, 3, STORE16_ABS).fixed(AT_NN).fixed(HL));
    b.add(M::Ld, v(Main, 0xF9, 1, T6).fixed(SP).fixed(HL));
    b.add(M::Push, v(Main, 0xC5, 1, PUSH).field(STACK_PAIRS, 4));
    b.add(M::Pop, v(Main, 0xC1, 1, POP).field(STACK_PAIRS, 4));

    // Exchanges
    b.add(M::Ex, v(Main, 0xEB, 1, T4).fixed(DE).fixed(HL));
    b.add(M::Ex, v(Main, 0x08, 1, T4).fixed(AF).fixed(Operand::Reg16(Reg16::AFAlt)));
    b.add(M::Ex, v(Main, 0xE3, 1, EX_SP).fixed(Operand::Indirect(Reg16::SP)).fixed(HL));
    b.add(M::Exx, v(Main, 0xD9, 1, T4));

    // 8-bit arithmetic and logic
    for (i, (mnemonic, names_a)) in ALU_OPS.into_iter().enumerate() {
        let row = 0x80 | ((i as u8) << 3);
        let imm = 0xC6 | ((i as u8) << 3);
        b.add(mnemonic, with_accumulator(v(Main, row, 1, T4), names_a).field(REG8, 0));
        b.add(mnemonic, with_accumulator(v(Main, row | 6, 1, MEM_READ), names_a).fixed(AT_HL));
        b.add(mnemonic, with_accumulator(v(Main, imm, 2, IMM8), names_a).fixed(N));
    }
    b.add(M::Inc, v(Main, 0x04, 1, T4).field(REG8, 3));
    b.add(M::Inc, v(Main, 0x34, 1, READ_MODIFY_WRITE).fixed(AT_HL));
    b.add(M::Inc, v(Main, 0x03, 1, T6).field(PAIRS, 4));
    b.add(M::Dec, v(Main, 0x05, 1, T4).field(REG8, 3));
    b.add(M::Dec, v(Main, 0x35, 1, READ_MODIFY_WRITE).fixed(AT_HL));
    b.add(M::Dec, v(Main, 0x0B, 1, T6).field(PAIRS, 4));
    b.add(M::Add, v(Main, 0x09, 1, ADD16).fixed(HL).field(PAIRS, 4));

    // Accumulator and flag operations
    b.add(M::Rlca, v(Main, 0x07, 1, T4));
    b.add(M::Rrca, v(Main, 0x0F, 1, T4));
    b.add(M::Rla, v(Main, 0x17, 1, T4));
    b.add(M::Rra, v(Main, 0x1F, 1, T4));
    b.add(M::Daa, v(Main, 0x27, 1, T4));
    b.add(M::Cpl, v(Main, 0x2F, 1, T4));
    b.add(M::Scf, v(Main, 0x37, 1, T4));
    b.add(M::Ccf, v(Main, 0x3F, 1, T4));

    // Control
    b.add(M::Halt, v(Main, 0x76, 1, T4));
    b.add(M::Di, v(Main, 0xF3, 1, T4));
    b.add(M::Ei, v(Main, 0xFB, 1, T4));
    b.add(M::Jp, v(Main, 0xC3, 3, IMM16).fixed(NN));
    b.add(M::Jp, v(Main, 0xC2, 3, IMM16).field(CONDITIONS, 3).fixed(NN));
    b.add(M::Jp, v(Main, 0xE9, 1, T4).fixed(AT_HL));
    b.add(M::Jr, v(Main, 0x18, 2, JR).fixed(Operand::Relative));
    b.add(M::Jr, v(Main, 0x20, 2, JR_CC).field(JR_CONDITIONS, 3).fixed(Operand::Relative));
    b.add(M::Djnz, v(Main, 0x10, 2, DJNZ).fixed(Operand::Relative));
    b.add(M::Call, v(Main, 0xCD, 3, CALL).fixed(NN));
    b.add(M::Call, v(Main, 0xC4, 3, CALL_CC).field(CONDITIONS, 3).fixed(NN));
    b.add(M::Ret, v(Main, 0xC9, 1, POP));
    b.add(M::Ret, v(Main, 0xC0, 1, RET_CC).field(CONDITIONS, 3));
    b.add(M::Rst, v(Main, 0xC7, 1, PUSH).field(RESTARTS, 3));

    // Ports
    b.add(M::In, v(Main, 0xDB, 2, PORT_IN_N).fixed(A).fixed(Operand::Port));
    b.add(M::Out, v(Main, 0xD3, 2, PORT_OUT_N).fixed(Operand::Port).fixed(A));
}

fn bit_ops(b: &mut Builder) {
    use TableId::Cb;

    for (i, (mnemonic, undocumented)) in SHIFT_OPS.into_iter().enumerate() {
        let row = (i as u8) << 3;
        let mut reg = v(Cb, row, 2, PREFIXED).field(REG8, 0);
        let mut mem = v(Cb, row | 6, 2, CB_MEM).fixed(AT_HL);
        if undocumented {
            reg = reg.undocumented();
            mem = mem.undocumented();
        }
        b.add(mnemonic, reg);
        b.add(mnemonic, mem);
    }
    b.add(Mnemonic::Bit, v(Cb, 0x40, 2, PREFIXED).field(BITS, 3).field(REG8, 0));
    b.add(Mnemonic::Bit, v(Cb, 0x46, 2, CB_BIT_MEM).field(BITS, 3).fixed(AT_HL));
    b.add(Mnemonic::Res, v(Cb, 0x80, 2, PREFIXED).field(BITS, 3).field(REG8, 0));
    b.add(Mnemonic::Res, v(Cb, 0x86, 2, CB_MEM).field(BITS, 3).fixed(AT_HL));
    b.add(Mnemonic::Set, v(Cb, 0xC0, 2, PREFIXED).field(BITS, 3).field(REG8, 0));
    b.add(Mnemonic::Set, v(Cb, 0xC6, 2, CB_MEM).field(BITS, 3).fixed(AT_HL));
}

/// Opcodes on the ED page that repeat another ED opcode.
const NEG_MIRRORS: &[(u8, u8)] = &[
    (0x4C, 0x44),
    (0x54, 0x44),
    (0x5C, 0x44),
    (0x64, 0x44),
    (0x6C, 0x44),
    (0x74, 0x44),
    (0x7C, 0x44),
];
const RETN_MIRRORS: &[(u8, u8)] = &[
    (0x55, 0x45),
    (0x5D, 0x45),
    (0x65, 0x45),
    (0x6D, 0x45),
    (0x75, 0x45),
    (0x7D, 0x45),
];
const IM_MIRRORS: &[(u8, u8)] = &[
    (0x4E, 0x46),
    (0x66, 0x46),
    (0x6E, 0x46),
    (0x76, 0x56),
    (0x7E, 0x5E),
];

fn extended(b: &mut Builder) {
    use Mnemonic as M;
    use TableId::Ed;

    b.add(M::In, v(Ed, 0x40, 2, PORT_IN_C).field(REG8, 3).fixed(Operand::PortC));
    b.add(
        M::In,
        v(Ed, 0x70, 2, PORT_IN_C)
            .fixed(Operand::Flags)
            .fixed(Operand::PortC)
            .undocumented(),
    );
    b.add(M::Out, v(Ed, 0x41, 2, PORT_OUT_C).fixed(Operand::PortC).field(REG8, 3));
    b.add(
        M::Out,
        v(Ed, 0x71, 2, PORT_OUT_C)
            .fixed(Operand::PortC)
            .fixed(Operand::Zero)
            .undocumented(),
    );
    b.add(M::Sbc, v(Ed, 0x42, 2, PREFIXED_ADD16).fixed(HL).field(PAIRS, 4));
    b.add(M::Adc, v(Ed, 0x4A, 2, PREFIXED_ADD16).fixed(HL).field(PAIRS, 4));
    b.add(M::Ld, v(Ed, 0x43, 4, PREFIXED_STORE16_ABS).fixed(AT_NN).field(PAIRS, 4));
    b.add(M::Ld, v(Ed, 0x4B, 4, PREFIXED_LOAD16_ABS).field(PAIRS, 4).fixed(AT_NN));
    b.add(M::Neg, v(Ed, 0x44, 2, PREFIXED).duplicates(Duplicates::Mirrors(NEG_MIRRORS)));
    b.add(M::Retn, v(Ed, 0x45, 2, PREFIXED_POP).duplicates(Duplicates::Mirrors(RETN_MIRRORS)));
    b.add(M::Reti, v(Ed, 0x4D, 2, PREFIXED_POP));
    b.add(
        M::Im,
        v(Ed, 0x46, 2, PREFIXED)
            .field(MODES, 3)
            .duplicates(Duplicates::Mirrors(IM_MIRRORS)),
    );
    b.add(M::Ld, v(Ed, 0x47, 2, LD_IR).fixed(I).fixed(A));
    b.add(M::Ld, v(Ed, 0x4F, 2, LD_IR).fixed(R).fixed(A));
    b.add(M::Ld, v(Ed, 0x57, 2, LD_IR).fixed(A).fixed(I));
    b.add(M::Ld, v(Ed, 0x5F, 2, LD_IR).fixed(A).fixed(R));
    b.add(M::Rrd, v(Ed, 0x67, 2, RXD));
    b.add(M::Rld, v(Ed, 0x6F, 2, RXD));

    b.add(M::Ldi, v(Ed, 0xA0, 2, BLOCK_LOAD));
    b.add(M::Cpi, v(Ed, 0xA1, 2, BLOCK_COMPARE));
    b.add(M::Ini, v(Ed, 0xA2, 2, BLOCK_IN));
    b.add(M::Outi, v(Ed, 0xA3, 2, BLOCK_OUT));
    b.add(M::Ldd, v(Ed, 0xA8, 2, BLOCK_LOAD));
    b.add(M::Cpd, v(Ed, 0xA9, 2, BLOCK_COMPARE));
    b.add(M::Ind, v(Ed, 0xAA, 2, BLOCK_IN));
    b.add(M::Outd, v(Ed, 0xAB, 2, BLOCK_OUT));
    b.add(M::Ldir, v(Ed, 0xB0, 2, BLOCK_LOAD_REPEAT));
    b.add(M::Cpir, v(Ed, 0xB1, 2, BLOCK_COMPARE_REPEAT));
    b.add(M::Inir, v(Ed, 0xB2, 2, BLOCK_IN_REPEAT));
    b.add(M::Otir, v(Ed, 0xB3, 2, BLOCK_OUT_REPEAT));
    b.add(M::Lddr, v(Ed, 0xB8, 2, BLOCK_LOAD_REPEAT));
    b.add(M::Cpdr, v(Ed, 0xB9, 2, BLOCK_COMPARE_REPEAT));
    b.add(M::Indr, v(Ed, 0xBA, 2, BLOCK_IN_REPEAT));
    b.add(M::Otdr, v(Ed, 0xBB, 2, BLOCK_OUT_REPEAT));

    // Every ED byte not listed above is a two-byte no-op.
    b.add(
        M::Nop,
        v(Ed, 0x00, 2, PREFIXED)
            .undocumented()
            .duplicates(Duplicates::FillUnused),
    );
}

/// The DD or FD page: instructions where the prefix replaces HL with an
/// index register. Every other byte is handled by the table builder.
fn indexed(b: &mut Builder, table: TableId, x: Index) {
    use Mnemonic as M;

    let xx = Operand::Reg16(x.reg16());
    let at_xd = Operand::Indexed(x);
    let halves = index_halves(x);

    b.add(M::Add, v(table, 0x09, 2, PREFIXED_ADD16).fixed(xx).field(index_pairs(x), 4));
    b.add(M::Ld, v(table, 0x21, 4, PREFIXED_IMM16).fixed(xx).fixed(NN));
    b.add(M::Ld, v(table, 0x22, 4, PREFIXED_STORE16_ABS).fixed(AT_NN).fixed(xx));
    b.add(M::Ld, v(table, 0x2A, 4, PREFIXED_LOAD16_ABS).fixed(xx).fixed(AT_NN));
    b.add(M::Inc, v(table, 0x23, 2, INDEX_INC16).fixed(xx));
    b.add(M::Dec, v(table, 0x2B, 2, INDEX_INC16).fixed(xx));
    b.add(M::Inc, v(table, 0x04, 2, PREFIXED).field(halves, 3).undocumented());
    b.add(M::Dec, v(table, 0x05, 2, PREFIXED).field(halves, 3).undocumented());
    b.add(M::Ld, v(table, 0x06, 3, INDEX_HALF_IMM).field(halves, 3).fixed(N).undocumented());
    b.add(M::Inc, v(table, 0x34, 3, INDEX_RMW).fixed(at_xd));
    b.add(M::Dec, v(table, 0x35, 3, INDEX_RMW).fixed(at_xd));
    b.add(M::Ld, v(table, 0x36, 4, INDEX_STORE_IMM).fixed(at_xd).fixed(N));

    b.add(
        M::Ld,
        v(table, 0x40, 2, PREFIXED)
            .field(REG8_UNINDEXED, 3)
            .field(halves, 0)
            .undocumented(),
    );
    b.add(
        M::Ld,
        v(table, 0x40, 2, PREFIXED)
            .field(halves, 3)
            .field(REG8_UNINDEXED, 0)
            .undocumented(),
    );
    b.add(
        M::Ld,
        v(table, 0x40, 2, PREFIXED)
            .field(halves, 3)
            .field(halves, 0)
            .undocumented(),
    );
    b.add(M::Ld, v(table, 0x46, 3, INDEX_READ).field(REG8, 3).fixed(at_xd));
    b.add(M::Ld, v(table, 0x70, 3, INDEX_WRITE).fixed(at_xd).field(REG8, 0));

    for (i, (mnemonic, names_a)) in ALU_OPS.into_iter().enumerate() {
        let row = 0x80 | ((i as u8) << 3);
        b.add(
            mnemonic,
            with_accumulator(v(table, row, 2, PREFIXED), names_a)
                .field(halves, 0)
                .undocumented(),
        );
        b.add(
            mnemonic,
            with_accumulator(v(table, row | 6, 3, INDEX_READ), names_a).fixed(at_xd),
        );
    }

    b.add(M::Pop, v(table, 0xE1, 2, PREFIXED_POP).fixed(xx));
    b.add(M::Push, v(table, 0xE5, 2, INDEX_PUSH).fixed(xx));
    b.add(M::Ex, v(table, 0xE3, 2, INDEX_EX_SP).fixed(Operand::Indirect(Reg16::SP)).fixed(xx));
    b.add(M::Jp, v(table, 0xE9, 2, PREFIXED).fixed(Operand::Indirect(x.reg16())));
    b.add(M::Ld, v(table, 0xF9, 2, INDEX_INC16).fixed(SP).fixed(xx));
}

/// The DDCB or FDCB page.
fn indexed_bit_ops(b: &mut Builder, table: TableId, x: Index) {
    use Mnemonic as M;

    let at_xd = Operand::Indexed(x);
    for (i, (mnemonic, undocumented)) in SHIFT_OPS.into_iter().enumerate() {
        let row = (i as u8) << 3;
        let mut mem = v(table, row | 6, 4, INDEX_BIT_RMW).fixed(at_xd);
        if undocumented {
            mem = mem.undocumented();
        }
        b.add(mnemonic, mem);
        b.add(
            mnemonic,
            v(table, row, 4, INDEX_BIT_RMW)
                .fixed(at_xd)
                .field(REG8, 0)
                .undocumented(),
        );
    }
    b.add(
        M::Bit,
        v(table, 0x46, 4, INDEX_BIT_TEST)
            .field(BITS, 3)
            .fixed(at_xd)
            .duplicates(Duplicates::IgnoredLowBits),
    );
    for (mnemonic, row) in [(M::Res, 0x80), (M::Set, 0xC0)] {
        b.add(mnemonic, v(table, row | 6, 4, INDEX_BIT_RMW).field(BITS, 3).fixed(at_xd));
        b.add(
            mnemonic,
            v(table, row, 4, INDEX_BIT_RMW)
                .field(BITS, 3)
                .fixed(at_xd)
                .field(REG8, 0)
                .undocumented(),
        );
    }
}

fn internal(b: &mut Builder) {
    b.add(Mnemonic::Nmi, ParametersVariant::internal(INTERRUPT_PUSH));
    b.add(Mnemonic::Int, ParametersVariant::internal(INTERRUPT_PUSH).fixed(Operand::Mode(1)));
    b.add(Mnemonic::Int, ParametersVariant::internal(INTERRUPT_VECTOR).fixed(Operand::Mode(2)));
    b.add(Mnemonic::HaltNop, ParametersVariant::internal(T4));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ld_r_r_expands_to_49_opcodes() {
        let types = build();
        let ld = types.iter().find(|t| t.mnemonic == Mnemonic::Ld).expect("LD");
        let rr = &ld.variants[0];
        assert_eq!(rr.opcode_count(), 49);
        let encodings = rr.encodings();
        assert_eq!(encodings[0].0, 0x40);
        assert_eq!(encodings.last().map(|e| e.0), Some(0x7F));
        assert!(!encodings.iter().any(|(op, _)| *op == 0x76));
    }

    #[test]
    fn restart_field_matches_target() {
        let types = build();
        let rst = types.iter().find(|t| t.mnemonic == Mnemonic::Rst).expect("RST");
        let codes: Vec<u8> = rst.variants[0].encodings().iter().map(|e| e.0).collect();
        assert_eq!(codes, vec![0xC7, 0xCF, 0xD7, 0xDF, 0xE7, 0xEF, 0xF7, 0xFF]);
    }

    #[test]
    fn sll_is_undocumented_but_rlc_is_not() {
        let types = build();
        let sll = types.iter().find(|t| t.mnemonic == Mnemonic::Sll).expect("SLL");
        let rlc = types.iter().find(|t| t.mnemonic == Mnemonic::Rlc).expect("RLC");
        assert!(!sll.documented());
        assert!(rlc.documented());
    }

    #[test]
    fn internal_types_have_no_table() {
        let types = build();
        for t in types.iter().filter(|t| t.internal()) {
            assert!(t.variants.iter().all(|v| v.table.is_none()));
        }
    }
}
