//! Control pins of the Z80 package.
//!
//! Every control line is active-low. Outputs are driven by the CPU and
//! sampled by memory and devices after each CPU step; inputs are
//! composed by the board before the CPU step from the host's levels and
//! the outputs of every attached component.

use emu_core::{SignalState, Value};

/// Level of every control pin, as seen after the CPU's last step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Z80Pins {
    // === Outputs ===
    /// Opcode fetch or interrupt acknowledge.
    pub m1: SignalState,
    pub mreq: SignalState,
    pub iorq: SignalState,
    pub rd: SignalState,
    pub wr: SignalState,
    /// Address bus carries a refresh address.
    pub rfsh: SignalState,
    pub halt: SignalState,
    pub busack: SignalState,

    // === Inputs ===
    pub wait: SignalState,
    pub int: SignalState,
    pub nmi: SignalState,
    pub reset: SignalState,
    pub busreq: SignalState,
}

impl Default for Z80Pins {
    fn default() -> Self {
        let idle = SignalState::RELEASED;
        Self {
            m1: idle,
            mreq: idle,
            iorq: idle,
            rd: idle,
            wr: idle,
            rfsh: idle,
            halt: idle,
            busack: idle,
            wait: idle,
            int: idle,
            nmi: idle,
            reset: idle,
            busreq: idle,
        }
    }
}

/// Inputs the host (or a device) can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputPin {
    Wait,
    Int,
    Nmi,
    Reset,
    Busreq,
}

/// One level per input pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InputLevels {
    pub wait: SignalState,
    pub int: SignalState,
    pub nmi: SignalState,
    pub reset: SignalState,
    pub busreq: SignalState,
}

impl InputLevels {
    pub fn set(&mut self, pin: InputPin, level: SignalState) {
        match pin {
            InputPin::Wait => self.wait = level,
            InputPin::Int => self.int = level,
            InputPin::Nmi => self.nmi = level,
            InputPin::Reset => self.reset = level,
            InputPin::Busreq => self.busreq = level,
        }
    }

    #[must_use]
    pub const fn get(&self, pin: InputPin) -> SignalState {
        match pin {
            InputPin::Wait => self.wait,
            InputPin::Int => self.int,
            InputPin::Nmi => self.nmi,
            InputPin::Reset => self.reset,
            InputPin::Busreq => self.busreq,
        }
    }
}

impl Z80Pins {
    /// Latch new input levels; outputs are untouched.
    pub fn apply_inputs(&mut self, inputs: InputLevels) {
        self.wait = inputs.wait;
        self.int = inputs.int;
        self.nmi = inputs.nmi;
        self.reset = inputs.reset;
        self.busreq = inputs.busreq;
    }

    /// Release every bus-control output (M1, MREQ, IORQ, RD, WR, RFSH).
    /// HALT and BUSACK are left as they are.
    pub fn release_bus_controls(&mut self) {
        let idle = SignalState::RELEASED;
        self.m1 = idle;
        self.mreq = idle;
        self.iorq = idle;
        self.rd = idle;
        self.wr = idle;
        self.rfsh = idle;
    }

    /// Memory request for an ordinary read or write, not a refresh.
    #[must_use]
    pub const fn memory_request(&self) -> bool {
        self.mreq.is_asserted() && !self.rfsh.is_asserted()
    }

    /// I/O request to a port. An interrupt acknowledge (IORQ with M1) is
    /// not a port access.
    #[must_use]
    pub const fn io_request(&self) -> bool {
        self.iorq.is_asserted() && !self.m1.is_asserted()
    }

    /// Interrupt acknowledge: M1 and IORQ together.
    #[must_use]
    pub const fn interrupt_acknowledge(&self) -> bool {
        self.iorq.is_asserted() && self.m1.is_asserted()
    }

    pub(crate) fn query(&self, pin: &str) -> Option<Value> {
        let level = match pin {
            "m1" => self.m1,
            "mreq" => self.mreq,
            "iorq" => self.iorq,
            "rd" => self.rd,
            "wr" => self.wr,
            "rfsh" => self.rfsh,
            "halt" => self.halt,
            "busack" => self.busack,
            "wait" => self.wait,
            "int" => self.int,
            "nmi" => self.nmi,
            "reset" => self.reset,
            "busreq" => self.busreq,
            _ => return None,
        };
        Some(Value::Level(level))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn everything_starts_released() {
        let pins = Z80Pins::default();
        assert!(!pins.memory_request());
        assert!(!pins.io_request());
        assert!(!pins.interrupt_acknowledge());
        assert_eq!(pins.halt, SignalState::RELEASED);
    }

    #[test]
    fn refresh_is_not_a_memory_request() {
        let pins = Z80Pins {
            mreq: SignalState::ASSERTED,
            rfsh: SignalState::ASSERTED,
            ..Z80Pins::default()
        };
        assert!(!pins.memory_request());
    }

    #[test]
    fn acknowledge_is_not_a_port_access() {
        let pins = Z80Pins {
            m1: SignalState::ASSERTED,
            iorq: SignalState::ASSERTED,
            ..Z80Pins::default()
        };
        assert!(pins.interrupt_acknowledge());
        assert!(!pins.io_request());
    }

    #[test]
    fn input_levels_round_trip_by_pin() {
        let mut inputs = InputLevels::default();
        inputs.set(InputPin::Nmi, SignalState::ASSERTED);
        assert_eq!(inputs.get(InputPin::Nmi), SignalState::Low);
        assert_eq!(inputs.get(InputPin::Int), SignalState::High);
    }
}
