//! Read-only inspection of component state.
//!
//! Debuggers and tests look inside components through string paths.
//! Queries never change what the component does next.

use std::fmt;

/// A dynamically-typed value returned by a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Bool(bool),
    U8(u8),
    U16(u16),
    U64(u64),
    /// Signal level, rendered as `LOW`/`HIGH`.
    Level(crate::SignalState),
    String(String),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Bool(v) => write!(f, "{v}"),
            Value::U8(v) => write!(f, "{v:#04X}"),
            Value::U16(v) => write!(f, "{v:#06X}"),
            Value::U64(v) => write!(f, "{v}"),
            Value::Level(crate::SignalState::Low) => f.write_str("LOW"),
            Value::Level(crate::SignalState::High) => f.write_str("HIGH"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<u8> for Value {
    fn from(v: u8) -> Self {
        Value::U8(v)
    }
}

impl From<u16> for Value {
    fn from(v: u16) -> Self {
        Value::U16(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::U64(v)
    }
}

impl From<crate::SignalState> for Value {
    fn from(v: crate::SignalState) -> Self {
        Value::Level(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// A component whose state can be inspected.
pub trait Observable {
    /// Query one property by dotted path, e.g. `pc`, `flags.z`,
    /// `pins.m1`. Returns `None` for unknown paths.
    fn query(&self, path: &str) -> Option<Value>;

    /// Every path `query` understands.
    fn query_paths(&self) -> &'static [&'static str];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SignalState;

    #[test]
    fn display_formats() {
        assert_eq!(Value::U8(0x0A).to_string(), "0x0A");
        assert_eq!(Value::U16(0x1234).to_string(), "0x1234");
        assert_eq!(Value::Level(SignalState::Low).to_string(), "LOW");
        assert_eq!(Value::from(true).to_string(), "true");
    }
}
