//! Two-level signal lines.

use core::ops::Not;

/// Logic level of a single line.
///
/// Control lines on the boards modelled here are active-low, so
/// [`SignalState::ASSERTED`] is `Low`. Every output starts released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SignalState {
    Low,
    #[default]
    High,
}

impl SignalState {
    /// Level of an active-low line that is being driven.
    pub const ASSERTED: Self = Self::Low;
    /// Level of an active-low line that is idle.
    pub const RELEASED: Self = Self::High;

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High)
    }

    #[must_use]
    pub const fn is_low(self) -> bool {
        matches!(self, Self::Low)
    }

    /// True when an active-low line is driven.
    #[must_use]
    pub const fn is_asserted(self) -> bool {
        self.is_low()
    }

    /// Active-low level for a boolean "asserted" flag.
    #[must_use]
    pub const fn active_low(asserted: bool) -> Self {
        if asserted { Self::Low } else { Self::High }
    }

    /// Wired-AND of two open-drain outputs: low if either pulls low.
    #[must_use]
    pub const fn wired_and(self, other: Self) -> Self {
        if self.is_low() || other.is_low() {
            Self::Low
        } else {
            Self::High
        }
    }
}

impl Not for SignalState {
    type Output = Self;

    fn not(self) -> Self {
        match self {
            Self::Low => Self::High,
            Self::High => Self::Low,
        }
    }
}

impl From<bool> for SignalState {
    /// `true` maps to `High`.
    fn from(high: bool) -> Self {
        if high { Self::High } else { Self::Low }
    }
}
