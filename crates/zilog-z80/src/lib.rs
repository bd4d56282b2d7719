//! Pin-level, cycle-accurate Zilog Z80.
//!
//! The CPU advances one half-T-state per clock edge. Every instruction is
//! split into the machine cycles of its timing template and every cycle
//! drives and samples the package pins at the half-T-states the Zilog
//! timing diagrams give. Memory and I/O devices sit on shared
//! [`emu_core`] buses and answer the strobes on the same edge.
//!
//! [`Z80System`] wires a CPU, a [`Memory`] and an [`IoDevice`] to one
//! clock and is the usual entry point.

mod alu;
mod config;
mod cpu;
pub mod decode;
mod events;
mod exit;
mod flags;
mod io;
mod memory;
mod pins;
mod program;
mod registers;
mod system;

pub use alu::{AluResult, Shift};
pub use config::{ConfigError, RomRange, SystemConfig};
pub use cpu::Z80;
pub use events::{
    EventHooks, EventKinds, InstructionOrigin, InternalState, LifecycleEvent, Observer, ObserverId,
    OpcodeBytes,
};
pub use exit::{
    AddressReached, ExitCondition, ExitConditionId, Halted, InstructionCountReached, Predicate,
    StopReason, TStatesElapsed,
};
pub use flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
pub use io::{InterruptSource, IoDevice, NoDevice, PortLatch, Pulse};
pub use memory::{Memory, MemorySlave};
pub use pins::{InputLevels, InputPin, Z80Pins};
pub use program::{LoadError, ProgramImage};
pub use registers::Registers;
pub use system::Z80System;

/// Pure ALU operations, for property tests and tools.
pub mod ops {
    pub use crate::alu::{
        adc16, add8, add16, and8, cp8, daa, dec8, inc8, or8, rotate_a, sbc16, shift8, sub8, xor8,
    };
}
