//! Machine cycles and the timing templates built from them.

use std::fmt;

use thiserror::Error;

/// Kind of bus transaction a machine cycle performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineCycleType {
    /// Opcode fetch (M1).
    Ocf,
    /// Operand read at PC: one byte.
    Od,
    /// Operand read at PC: low byte of a 16-bit operand.
    Odl,
    /// Operand read at PC: high byte.
    Odh,
    /// Memory read at the address latch.
    Mr,
    Mrl,
    Mrh,
    /// Memory write at the address latch.
    Mw,
    Mwl,
    Mwh,
    /// Stack read (pop), low byte first.
    Srl,
    Srh,
    /// Stack write (push), high byte first.
    Swh,
    Swl,
    /// Port read.
    Pr,
    /// Port write.
    Pw,
    /// Internal operation, no bus activity.
    Cpu,
}

impl MachineCycleType {
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Ocf => "OCF",
            Self::Od => "OD",
            Self::Odl => "ODL",
            Self::Odh => "ODH",
            Self::Mr => "MR",
            Self::Mrl => "MRL",
            Self::Mrh => "MRH",
            Self::Mw => "MW",
            Self::Mwl => "MWL",
            Self::Mwh => "MWH",
            Self::Srl => "SRL",
            Self::Srh => "SRH",
            Self::Swh => "SWH",
            Self::Swl => "SWL",
            Self::Pr => "PR",
            Self::Pw => "PW",
            Self::Cpu => "CPU",
        }
    }

    /// The cycle that must directly follow this one, for the first half of
    /// a 16-bit transfer.
    #[must_use]
    pub const fn required_successor(self) -> Option<Self> {
        match self {
            Self::Odl => Some(Self::Odh),
            Self::Mrl => Some(Self::Mrh),
            Self::Mwl => Some(Self::Mwh),
            Self::Srl => Some(Self::Srh),
            Self::Swh => Some(Self::Swl),
            _ => None,
        }
    }

    /// Reads an operand byte from the instruction stream.
    #[must_use]
    pub const fn is_operand_read(self) -> bool {
        matches!(self, Self::Od | Self::Odl | Self::Odh)
    }
}

impl fmt::Display for MachineCycleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One machine cycle of a template: its kind and baseline length before
/// any wait states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MachineCycle {
    pub kind: MachineCycleType,
    pub t_states: u8,
}

impl MachineCycle {
    #[must_use]
    pub const fn new(kind: MachineCycleType, t_states: u8) -> Self {
        Self { kind, t_states }
    }
}

impl fmt::Display for MachineCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.kind, self.t_states)
    }
}

/// An ordered cycle list with its declared total.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    pub cycles: &'static [MachineCycle],
    pub t_states: u8,
}

/// Timing of one addressing-mode variant.
///
/// Conditional jumps, calls and returns and the repeating block
/// instructions carry an alternate used when the condition holds or the
/// instruction repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionVariant {
    pub primary: Timing,
    pub alternate: Option<Timing>,
}

impl ExecutionVariant {
    #[must_use]
    pub const fn fixed(primary: Timing) -> Self {
        Self {
            primary,
            alternate: None,
        }
    }

    #[must_use]
    pub const fn conditional(primary: Timing, alternate: Timing) -> Self {
        Self {
            primary,
            alternate: Some(alternate),
        }
    }

    /// Cycle list to run; `condition_met` selects the alternate if any.
    #[must_use]
    pub const fn cycles(&self, condition_met: bool) -> &'static [MachineCycle] {
        match self.alternate {
            Some(alternate) if condition_met => alternate.cycles,
            _ => self.primary.cycles,
        }
    }

    /// Check both timings against the sequencing rules.
    pub fn validate(&self) -> Result<(), TimingError> {
        self.primary.validate()?;
        if let Some(alternate) = self.alternate {
            alternate.validate()?;
        }
        Ok(())
    }
}

/// A timing template that breaks a sequencing rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimingError {
    #[error("timing has no cycles")]
    Empty,
    #[error("timing starts with {0} instead of OCF")]
    FirstCycleNotFetch(MachineCycleType),
    #[error("OCF at position {0} does not follow an OD")]
    MisplacedFetch(usize),
    #[error("{kind} at position {position} is not followed by {expected}")]
    Unpaired {
        position: usize,
        kind: MachineCycleType,
        expected: MachineCycleType,
    },
    #[error("{kind} at position {position} lasts {t_states} T-states")]
    BadDuration {
        position: usize,
        kind: MachineCycleType,
        t_states: u8,
    },
    #[error("declared {declared} T-states but cycles sum to {actual}")]
    TotalMismatch { declared: u8, actual: u32 },
}

impl Timing {
    /// Check the sequencing and duration rules every template obeys.
    pub fn validate(&self) -> Result<(), TimingError> {
        use MachineCycleType::{Ocf, Od, Pr, Pw};

        let first = self.cycles.first().ok_or(TimingError::Empty)?;
        if first.kind != Ocf {
            return Err(TimingError::FirstCycleNotFetch(first.kind));
        }

        for (position, cycle) in self.cycles.iter().enumerate() {
            if cycle.kind == Ocf && position > 1 && self.cycles[position - 1].kind != Od {
                return Err(TimingError::MisplacedFetch(position));
            }

            if let Some(expected) = cycle.kind.required_successor() {
                let next = self.cycles.get(position + 1).map(|c| c.kind);
                if next != Some(expected) {
                    return Err(TimingError::Unpaired {
                        position,
                        kind: cycle.kind,
                        expected,
                    });
                }
            }

            let minimum = if matches!(cycle.kind, Ocf | Pr | Pw) { 4 } else { 3 };
            if !(minimum..=6).contains(&cycle.t_states) {
                return Err(TimingError::BadDuration {
                    position,
                    kind: cycle.kind,
                    t_states: cycle.t_states,
                });
            }
        }

        let actual: u32 = self.cycles.iter().map(|c| u32::from(c.t_states)).sum();
        if actual != u32::from(self.t_states) {
            return Err(TimingError::TotalMismatch {
                declared: self.t_states,
                actual,
            });
        }
        Ok(())
    }
}

impl fmt::Display for Timing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, cycle) in self.cycles.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{cycle}")?;
        }
        write!(f, " = {}", self.t_states)
    }
}

/// `timing!(Ocf 4, Od 3 => 7)`
macro_rules! timing {
    ($($kind:ident $t:literal),+ => $total:literal) => {
        $crate::decode::timing::Timing {
            cycles: const {
                &[$($crate::decode::timing::MachineCycle::new(
                    $crate::decode::timing::MachineCycleType::$kind,
                    $t,
                )),+]
            },
            t_states: $total,
        }
    };
}

pub(crate) use timing;
