use std::sync::LazyLock;

use thiserror::Error;

use super::catalog::{self, Duplicates, InstructionType, Mnemonic};
use super::timing::{ExecutionVariant, TimingError};
use super::{DecodeAction, InstructionCode, InternalOp, TableId};

static TABLES: LazyLock<DecodeTables> = LazyLock::new(DecodeTables::build);

/// Process-wide decode tables, built on first use.
#[must_use]
pub fn tables() -> &'static DecodeTables {
    &TABLES
}

/// A catalog entry the table generator could not place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TableError {
    #[error("{table} {opcode:02X} is claimed by both {first} and {second}")]
    Conflict {
        table: TableId,
        opcode: u8,
        first: Mnemonic,
        second: Mnemonic,
    },
    #[error("{table} {opcode:02X} decodes to nothing")]
    Missing { table: TableId, opcode: u8 },
    #[error("{mnemonic} variant {variant}: {source}")]
    Timing {
        mnemonic: Mnemonic,
        variant: usize,
        source: TimingError,
    },
}

pub struct DecodeTables {
    types: Vec<InstructionType>,
    opcodes: [Box<[InstructionCode]>; 7],
    internal: [InstructionCode; 4],
    problems: Vec<TableError>,
}

impl DecodeTables {
    fn build() -> Self {
        let types = catalog::build();
        let mut problems = Vec::new();
        let mut slots: [Vec<Option<InstructionCode>>; 7] = std::array::from_fn(|_| vec![None; 256]);

        for (type_id, ty) in types.iter().enumerate() {
            for (variant, params) in ty.variants.iter().enumerate() {
                if let Err(source) = params.timing.validate() {
                    problems.push(TableError::Timing {
                        mnemonic: ty.mnemonic,
                        variant,
                        source,
                    });
                }
                let Some(table) = params.table else { continue };
                for (opcode, operands) in params.encodings() {
                    let code = InstructionCode {
                        table: Some(table),
                        opcode,
                        action: DecodeAction::Execute,
                        type_id,
                        variant,
                        mnemonic: ty.mnemonic,
                        operands,
                        size: params.size,
                        timing: params.timing,
                        undocumented: params.undocumented,
                        duplicate: false,
                    };
                    place(&mut slots[table.index()], code, &mut problems);
                }
            }
        }

        // Mirrors and ignored fields only fill bytes no pattern claims.
        for ty in &types {
            for params in &ty.variants {
                let Some(table) = params.table else { continue };
                let slots = &mut slots[table.index()];
                match params.duplicates {
                    Duplicates::None | Duplicates::FillUnused => {}
                    Duplicates::Mirrors(pairs) => {
                        for &(mirror, primary) in pairs {
                            if let Some(code) = slots[primary as usize] {
                                let copy = InstructionCode {
                                    opcode: mirror,
                                    duplicate: true,
                                    ..code
                                };
                                place(slots, copy, &mut problems);
                            }
                        }
                    }
                    Duplicates::IgnoredLowBits => {
                        for (opcode, _) in params.encodings() {
                            let Some(code) = slots[opcode as usize] else { continue };
                            for low in 0..8 {
                                let alias = (opcode & !7) | low;
                                if slots[alias as usize].is_none() {
                                    slots[alias as usize] = Some(InstructionCode {
                                        opcode: alias,
                                        duplicate: true,
                                        ..code
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }

        for ty in &types {
            for params in ty.variants.iter().filter(|p| p.duplicates == Duplicates::FillUnused) {
                let Some(table) = params.table else { continue };
                let slots = &mut slots[table.index()];
                let Some(primary) = slots[params.opcode as usize] else { continue };
                for (opcode, slot) in slots.iter_mut().enumerate() {
                    if slot.is_none() {
                        *slot = Some(InstructionCode {
                            opcode: opcode as u8,
                            duplicate: true,
                            ..primary
                        });
                    }
                }
            }
        }

        let nop = find_code(&slots, TableId::Main, 0x00);
        let prefix = |table: TableId, opcode: u8, action: DecodeAction| InstructionCode {
            table: Some(table),
            opcode,
            action,
            ..nop
        };
        let main = &mut slots[TableId::Main.index()];
        main[0xCB] = Some(prefix(TableId::Main, 0xCB, DecodeAction::FetchNext(TableId::Cb)));
        main[0xDD] = Some(prefix(TableId::Main, 0xDD, DecodeAction::FetchNext(TableId::Dd)));
        main[0xED] = Some(prefix(TableId::Main, 0xED, DecodeAction::FetchNext(TableId::Ed)));
        main[0xFD] = Some(prefix(TableId::Main, 0xFD, DecodeAction::FetchNext(TableId::Fd)));
        for (table, bits) in [(TableId::Dd, TableId::DdCb), (TableId::Fd, TableId::FdCb)] {
            let page = &mut slots[table.index()];
            page[0xCB] = Some(prefix(
                table,
                0xCB,
                DecodeAction::FetchDisplacementThenOpcode(bits),
            ));
            for (opcode, slot) in page.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = Some(prefix(
                        table,
                        opcode as u8,
                        DecodeAction::Redecode(TableId::Main),
                    ));
                }
            }
        }

        let opcodes = std::array::from_fn(|i| {
            let table = TableId::ALL[i];
            slots[i]
                .iter()
                .enumerate()
                .map(|(opcode, slot)| {
                    slot.unwrap_or_else(|| {
                        problems.push(TableError::Missing {
                            table,
                            opcode: opcode as u8,
                        });
                        InstructionCode {
                            table: Some(table),
                            opcode: opcode as u8,
                            ..nop
                        }
                    })
                })
                .collect()
        });

        let internal_code = |mnemonic: Mnemonic, variant: usize| {
            types
                .iter()
                .enumerate()
                .find(|(_, t)| t.mnemonic == mnemonic)
                .and_then(|(type_id, t)| {
                    t.variants.get(variant).map(|params| InstructionCode {
                        table: None,
                        opcode: 0,
                        action: DecodeAction::Execute,
                        type_id,
                        variant,
                        mnemonic,
                        operands: [
                            params.slots.first().and_then(|s| s.operands().first().copied()),
                            None,
                            None,
                        ],
                        size: 0,
                        timing: params.timing,
                        undocumented: false,
                        duplicate: false,
                    })
                })
                .unwrap_or(nop)
        };
        let internal = [
            internal_code(Mnemonic::Nmi, 0),
            internal_code(Mnemonic::Int, 0),
            internal_code(Mnemonic::Int, 1),
            internal_code(Mnemonic::HaltNop, 0),
        ];

        Self {
            types,
            opcodes,
            internal,
            problems,
        }
    }

    /// Entry for `opcode` in `table`.
    #[inline]
    #[must_use]
    pub fn decode(&self, table: TableId, opcode: u8) -> &InstructionCode {
        &self.opcodes[table.index()][opcode as usize]
    }

    /// Every entry of one table, indexed by opcode.
    #[must_use]
    pub fn table(&self, table: TableId) -> &[InstructionCode] {
        &self.opcodes[table.index()]
    }

    #[must_use]
    pub fn instruction_types(&self) -> &[InstructionType] {
        &self.types
    }

    /// Timing of a (type, variant) pair.
    #[must_use]
    pub fn execution_variant(&self, type_id: usize, variant: usize) -> Option<&ExecutionVariant> {
        self.types
            .get(type_id)
            .and_then(|t| t.variants.get(variant))
            .map(|p| &p.timing)
    }

    #[must_use]
    pub fn internal(&self, op: InternalOp) -> &InstructionCode {
        match op {
            InternalOp::Nmi => &self.internal[0],
            InternalOp::IntMode1 => &self.internal[1],
            InternalOp::IntMode2 => &self.internal[2],
            InternalOp::HaltNop => &self.internal[3],
        }
    }

    /// Report the first problem found while generating the tables.
    pub fn validate(&self) -> Result<(), TableError> {
        match self.problems.first() {
            Some(problem) => Err(problem.clone()),
            None => Ok(()),
        }
    }
}

fn place(slots: &mut [Option<InstructionCode>], code: InstructionCode, problems: &mut Vec<TableError>) {
    let slot = &mut slots[code.opcode as usize];
    match slot {
        Some(existing) => problems.push(TableError::Conflict {
            table: code.table.unwrap_or(TableId::Main),
            opcode: code.opcode,
            first: existing.mnemonic,
            second: code.mnemonic,
        }),
        None => *slot = Some(code),
    }
}

fn find_code(slots: &[Vec<Option<InstructionCode>>; 7], table: TableId, opcode: u8) -> InstructionCode {
    slots[table.index()][opcode as usize].unwrap_or(InstructionCode {
        table: Some(table),
        opcode,
        action: DecodeAction::Execute,
        type_id: 0,
        variant: 0,
        mnemonic: Mnemonic::Nop,
        operands: [None; 3],
        size: 1,
        timing: ExecutionVariant::fixed(super::timing::timing!(Ocf 4 => 4)),
        undocumented: false,
        duplicate: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_build_cleanly() {
        assert_eq!(tables().validate(), Ok(()));
    }

    #[test]
    fn prefixes_chain() {
        let t = tables();
        assert_eq!(t.decode(TableId::Main, 0xED).action, DecodeAction::FetchNext(TableId::Ed));
        assert_eq!(
            t.decode(TableId::Fd, 0xCB).action,
            DecodeAction::FetchDisplacementThenOpcode(TableId::FdCb)
        );
        assert_eq!(t.decode(TableId::Dd, 0x00).action, DecodeAction::Redecode(TableId::Main));
        assert_eq!(t.decode(TableId::Dd, 0xDD).action, DecodeAction::Redecode(TableId::Main));
    }

    #[test]
    fn mirrors_copy_their_primary() {
        let t = tables();
        let neg = t.decode(TableId::Ed, 0x7C);
        assert_eq!(neg.mnemonic, Mnemonic::Neg);
        assert!(neg.duplicate);
        let im = t.decode(TableId::Ed, 0x76);
        assert_eq!(im.to_string(), "IM 1");
    }

    #[test]
    fn internal_codes_have_interrupt_timings() {
        let t = tables();
        assert_eq!(t.internal(InternalOp::Nmi).timing.primary.t_states, 11);
        assert_eq!(t.internal(InternalOp::IntMode2).timing.primary.t_states, 17);
        assert_eq!(t.internal(InternalOp::HaltNop).timing.primary.t_states, 4);
    }
}
