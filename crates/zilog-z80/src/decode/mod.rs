//! Opcode decoding.
//!
//! Seven 256-entry tables map an opcode byte to an [`InstructionCode`].
//! The tables are generated once from the instruction [`catalog`] and
//! shared by every CPU.

pub mod catalog;
mod operand;
mod tables;
pub(crate) mod timing;

use std::fmt;

pub use catalog::{Duplicates, InstructionType, Mnemonic, ParametersVariant, Slot};
pub use operand::{Condition, Index, Operand, Reg8, Reg16};
pub use tables::{DecodeTables, TableError, tables};
pub use timing::{ExecutionVariant, MachineCycle, MachineCycleType, Timing, TimingError};

/// One of the seven opcode tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TableId {
    Main,
    Cb,
    Dd,
    Ed,
    Fd,
    DdCb,
    FdCb,
}

impl TableId {
    pub const ALL: [Self; 7] = [
        Self::Main,
        Self::Cb,
        Self::Dd,
        Self::Ed,
        Self::Fd,
        Self::DdCb,
        Self::FdCb,
    ];

    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Prefix bytes that select this table.
    #[must_use]
    pub const fn prefix(self) -> &'static [u8] {
        match self {
            Self::Main => &[],
            Self::Cb => &[0xCB],
            Self::Dd => &[0xDD],
            Self::Ed => &[0xED],
            Self::Fd => &[0xFD],
            Self::DdCb => &[0xDD, 0xCB],
            Self::FdCb => &[0xFD, 0xCB],
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Main => "main",
            Self::Cb => "CB",
            Self::Dd => "DD",
            Self::Ed => "ED",
            Self::Fd => "FD",
            Self::DdCb => "DDCB",
            Self::FdCb => "FDCB",
        })
    }
}

/// What the engine does after fetching a byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeAction {
    /// The byte completes the opcode.
    Execute,
    /// The byte is a prefix; fetch another opcode from the given table.
    FetchNext(TableId),
    /// Read a displacement, then the final opcode byte from the table.
    FetchDisplacementThenOpcode(TableId),
    /// The prefix has no effect on this byte: it is decoded again in the
    /// given table and the prefix fetch counts as a 4 T-state no-op.
    Redecode(TableId),
}

/// CPU-synthesised operations that have no opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InternalOp {
    /// Push PC and jump to 0x0066.
    Nmi,
    /// Mode 1 acknowledge: push PC and jump to 0x0038.
    IntMode1,
    /// Mode 2 acknowledge: push PC and load it from the vector table.
    IntMode2,
    /// Idle fetch while halted.
    HaltNop,
}

/// One table entry: a concrete opcode with its operands resolved.
///
/// For prefix entries the identity fields describe the no-op the prefix
/// fetch amounts to; only `action` matters to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionCode {
    /// `None` for internal operations.
    pub table: Option<TableId>,
    pub opcode: u8,
    pub action: DecodeAction,
    /// Index into [`DecodeTables::instruction_types`].
    pub type_id: usize,
    /// Index into the type's variants.
    pub variant: usize,
    pub mnemonic: Mnemonic,
    pub operands: [Option<Operand>; 3],
    /// Bytes including prefixes.
    pub size: u8,
    pub timing: ExecutionVariant,
    pub undocumented: bool,
    /// Reached through a mirror or an ignored field rather than the
    /// variant's own opcode pattern.
    pub duplicate: bool,
}

impl InstructionCode {
    pub fn operands(&self) -> impl Iterator<Item = Operand> + '_ {
        self.operands.iter().flatten().copied()
    }

    /// First operand matching `pred`.
    pub fn find_operand(&self, pred: impl Fn(Operand) -> bool) -> Option<Operand> {
        self.operands().find(|&op| pred(op))
    }

    /// Index register of an `(IX+d)`/`(IY+d)` operand.
    #[must_use]
    pub fn indexed(&self) -> Option<Index> {
        self.operands().find_map(|op| match op {
            Operand::Indexed(x) => Some(x),
            _ => None,
        })
    }

    #[must_use]
    pub fn has_operand(&self, operand: Operand) -> bool {
        self.operands().any(|op| op == operand)
    }
}

impl fmt::Display for InstructionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.action != DecodeAction::Execute {
            return write!(f, "prefix {:02X}", self.opcode);
        }
        write!(f, "{}", self.mnemonic)?;
        for (i, operand) in self.operands().enumerate() {
            f.write_str(if i == 0 { " " } else { "," })?;
            write!(f, "{operand}")?;
        }
        Ok(())
    }
}
