//! Core types for pin-level emulation.
//!
//! A board is a set of components joined by signal lines and shared
//! buses. One clock drives them all: every half-period it flips level and
//! notifies the wiring, which steps each component in a fixed order.

mod bus;
mod clock;
mod observable;
mod signal;
mod ticks;

pub use bus::{AddressBus, Bus, BusConnector, BusValue, DataBus};
pub use clock::{Clock, ClockWiring};
pub use observable::{Observable, Value};
pub use signal::SignalState;
pub use ticks::Ticks;
