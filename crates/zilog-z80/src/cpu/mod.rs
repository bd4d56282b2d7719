//! The machine-cycle engine.
//!
//! [`Z80::step`] consumes one clock edge. Every instruction is a list of
//! machine cycles taken from its timing template, and every cycle is a
//! sequence of half-T-states: even indices fall on rising edges, odd
//! indices on falling edges. Pins and buses are driven and sampled at the
//! half-T-states the Zilog timing diagrams give.

mod cycles;
mod execute;
mod interrupts;

use emu_core::{BusConnector, Observable, SignalState, Value};

use crate::decode::{InstructionCode, MachineCycle, MachineCycleType, TableId};
use crate::events::{
    EventHooks, EventKinds, InstructionOrigin, InternalState, LifecycleEvent, Observer, ObserverId,
    OpcodeBytes,
};
use crate::exit::{ExitCondition, ExitConditionId, StopReason};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF};
use crate::pins::{InputLevels, Z80Pins};
use crate::registers::Registers;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Waiting for the first rising edge after power-on or reset.
    PowerOn,
    Running,
    /// BUSACK asserted; another master owns the buses.
    BusReleased,
    Reset,
}

/// What comes next while the opcode is still being assembled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chain {
    Fetch,
    Displacement,
    OpcodeAfterDisplacement,
}

/// Bus pattern of the active cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pattern {
    Fetch,
    /// Interrupt acknowledge: M1 with IORQ instead of MREQ.
    Acknowledge,
    /// Fourth byte of a DDCB/FDCB opcode: a plain read at PC.
    OpcodeRead,
    Read,
    Write,
    PortRead,
    PortWrite,
    Internal,
}

/// Points at which instruction semantics run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExecPoint {
    /// The opcode has just been decoded.
    Decoded,
    /// A cycle of this kind has just completed.
    After(MachineCycleType),
}

/// A Zilog Z80 attached to an address and a data bus.
pub struct Z80 {
    regs: Registers,
    pins: Z80Pins,
    address: BusConnector<u16>,
    data: BusConnector<u8>,
    hooks: EventHooks,
    phase: Phase,

    // === Current instruction ===
    origin: InstructionOrigin,
    opcode: OpcodeBytes,
    instruction: Option<&'static InstructionCode>,
    table: TableId,
    chain: Chain,
    cycles: &'static [MachineCycle],
    condition_met: bool,
    position: usize,

    // === Current cycle ===
    kind: MachineCycleType,
    pattern: Pattern,
    /// Baseline T-states before waits.
    length: u8,
    /// Half-T-state to run on the next edge.
    half: u8,
    /// Half-T-state run on the last edge.
    last_half: u8,
    cycle_halves: u32,
    wait_states: u8,
    auto_waits: u8,
    from_device: bool,

    // === Latches ===
    fetched: u8,
    displacement: Option<i8>,
    addr: u16,
    port: u16,
    imm_lo: u8,
    imm_hi: u8,
    data_lo: u8,
    data_hi: u8,
    out_lo: u8,
    out_hi: u8,

    // === Interrupts ===
    nmi_pending: bool,
    nmi_seen: bool,
    int_blocked: bool,
    halted: bool,
    /// An instruction ended on a stopping edge; the next instruction is
    /// chosen on the following edge.
    boundary_pending: bool,

    // === Counters ===
    instruction_counter: u64,
    half_t_states: u64,
}

impl Z80 {
    /// A CPU at power-on. It starts fetching at 0x0000 on the first
    /// rising edge.
    #[must_use]
    pub fn new(address: BusConnector<u16>, data: BusConnector<u8>) -> Self {
        Self {
            regs: Registers::after_reset(),
            pins: Z80Pins::default(),
            address,
            data,
            hooks: EventHooks::default(),
            phase: Phase::PowerOn,
            origin: InstructionOrigin::None,
            opcode: OpcodeBytes::default(),
            instruction: None,
            table: TableId::Main,
            chain: Chain::Fetch,
            cycles: &[],
            condition_met: false,
            position: 0,
            kind: MachineCycleType::Ocf,
            pattern: Pattern::Fetch,
            length: 4,
            half: 0,
            last_half: 0,
            cycle_halves: 0,
            wait_states: 0,
            auto_waits: 0,
            from_device: false,
            fetched: 0,
            displacement: None,
            addr: 0,
            port: 0,
            imm_lo: 0,
            imm_hi: 0,
            data_lo: 0,
            data_hi: 0,
            out_lo: 0,
            out_hi: 0,
            nmi_pending: false,
            nmi_seen: false,
            int_blocked: false,
            halted: false,
            boundary_pending: false,
            instruction_counter: 0,
            half_t_states: 0,
        }
    }

    /// Advance one half-T-state. `level` is the clock level after the
    /// edge; `inputs` are the composed levels of the input pins.
    pub fn step(&mut self, level: SignalState, inputs: InputLevels) {
        let rising = level.is_high();
        self.pins.apply_inputs(inputs);
        self.half_t_states += 1;
        self.latch_nmi();

        if self.pins.reset.is_asserted() {
            self.hold_reset();
            self.emit(LifecycleEvent::HalfTState);
            return;
        }
        if self.phase == Phase::Reset {
            self.leave_reset();
        }

        match self.phase {
            Phase::PowerOn => {
                if !rising {
                    self.emit(LifecycleEvent::HalfTState);
                    return;
                }
                self.phase = Phase::Running;
                self.resolve_next_instruction();
                self.emit(LifecycleEvent::InstructionStart);
            }
            Phase::BusReleased => {
                if !rising || self.pins.busreq.is_asserted() {
                    self.emit(LifecycleEvent::HalfTState);
                    return;
                }
                self.return_bus();
            }
            Phase::Running | Phase::Reset => {}
        }

        if self.boundary_pending {
            self.boundary_pending = false;
            self.resolve_next_instruction();
            self.emit(LifecycleEvent::InstructionStart);
        }

        if self.half == 0 {
            if self.pins.busreq.is_asserted() {
                self.release_bus();
                self.emit(LifecycleEvent::HalfTState);
                return;
            }
            self.emit(LifecycleEvent::CycleStart);
        }

        if self.run_half() && self.complete_cycle() {
            self.instruction_counter += 1;
            self.emit(LifecycleEvent::InstructionEnd);
            if self.hooks.is_stopping() {
                self.boundary_pending = true;
            } else {
                self.resolve_next_instruction();
                self.emit(LifecycleEvent::InstructionStart);
            }
        }
        self.emit(LifecycleEvent::HalfTState);
    }

    #[inline]
    fn emit(&mut self, event: LifecycleEvent) {
        if self.hooks.wants(event) {
            let state = self.state();
            self.hooks.dispatch(&state, event);
        }
    }

    /// Snapshot for observers and tests.
    #[must_use]
    pub fn state(&self) -> InternalState {
        let running = self.phase == Phase::Running;
        InternalState {
            instruction_counter: self.instruction_counter,
            origin: self.origin,
            opcode: self.opcode,
            instruction: self.instruction,
            cycle_index: u8::try_from(self.position).unwrap_or(u8::MAX),
            cycle_type: running.then_some(self.kind),
            cycle_t_states: u8::try_from(self.cycle_halves / 2).unwrap_or(u8::MAX),
            half_t_state: self.last_half,
            wait_states: self.wait_states,
            t_states: self.half_t_states / 2,
            half_t_states: self.half_t_states,
            halted: self.halted,
            bus_released: self.phase == Phase::BusReleased,
            in_reset: self.phase == Phase::Reset,
        }
    }

    // === Host access ===

    #[must_use]
    pub const fn registers(&self) -> &Registers {
        &self.regs
    }

    /// Registers for host setup between ticks.
    pub fn registers_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    #[must_use]
    pub const fn pins(&self) -> &Z80Pins {
        &self.pins
    }

    #[must_use]
    pub const fn is_halted(&self) -> bool {
        self.halted
    }

    /// Instructions completed since power-on.
    #[must_use]
    pub const fn instruction_counter(&self) -> u64 {
        self.instruction_counter
    }

    /// Clock edges seen since power-on.
    #[must_use]
    pub const fn half_t_states(&self) -> u64 {
        self.half_t_states
    }

    pub fn observe(&mut self, kinds: EventKinds, observer: Observer) -> ObserverId {
        self.hooks.observe(kinds, observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.hooks.remove_observer(id)
    }

    pub fn add_exit_condition(&mut self, condition: Box<dyn ExitCondition>) -> ExitConditionId {
        self.hooks.add_exit_condition(condition)
    }

    pub fn remove_exit_condition(&mut self, id: ExitConditionId) -> bool {
        self.hooks.remove_exit_condition(id)
    }

    #[must_use]
    pub fn exit_condition_count(&self) -> usize {
        self.hooks.exit_condition_count()
    }

    /// The stop recorded since the last call, if any.
    pub fn take_stop(&mut self) -> Option<StopReason> {
        self.hooks.take_stop()
    }
}

const QUERY_PATHS: &[&str] = &[
    "pc", "sp", "a", "f", "b", "c", "d", "e", "h", "l", "af", "bc", "de", "hl", "ix", "iy", "i",
    "r", "wz", "af'", "bc'", "de'", "hl'", "iff1", "iff2", "im", "halted", "flags.s", "flags.z",
    "flags.y", "flags.h", "flags.x", "flags.p", "flags.n", "flags.c", "pins.m1", "pins.mreq",
    "pins.iorq", "pins.rd", "pins.wr", "pins.rfsh", "pins.halt", "pins.busack", "pins.wait",
    "pins.int", "pins.nmi", "pins.reset", "pins.busreq", "address", "data", "instructions",
    "t_states", "cycle", "instruction",
];

impl Observable for Z80 {
    fn query(&self, path: &str) -> Option<Value> {
        let r = &self.regs;
        if let Some(pin) = path.strip_prefix("pins.") {
            return self.pins.query(pin);
        }
        if let Some(flag) = path.strip_prefix("flags.") {
            let mask = match flag {
                "s" => SF,
                "z" => ZF,
                "y" => YF,
                "h" => HF,
                "x" => XF,
                "p" => PF,
                "n" => NF,
                "c" => CF,
                _ => return None,
            };
            return Some(r.flag(mask).into());
        }
        let value = match path {
            "pc" => r.pc.into(),
            "sp" => r.sp.into(),
            "a" => r.a.into(),
            "f" => r.f.into(),
            "b" => r.b.into(),
            "c" => r.c.into(),
            "d" => r.d.into(),
            "e" => r.e.into(),
            "h" => r.h.into(),
            "l" => r.l.into(),
            "af" => r.af().into(),
            "bc" => r.bc().into(),
            "de" => r.de().into(),
            "hl" => r.hl().into(),
            "ix" => r.ix.into(),
            "iy" => r.iy.into(),
            "i" => r.i.into(),
            "r" => r.r.into(),
            "wz" => r.wz.into(),
            "af'" => r.af_alt.into(),
            "bc'" => r.bc_alt.into(),
            "de'" => r.de_alt.into(),
            "hl'" => r.hl_alt.into(),
            "iff1" => r.iff1.into(),
            "iff2" => r.iff2.into(),
            "im" => r.im.into(),
            "halted" => self.halted.into(),
            "address" => self.address.read().into(),
            "data" => self.data.read().into(),
            "instructions" => self.instruction_counter.into(),
            "t_states" => (self.half_t_states / 2).into(),
            "cycle" => Value::String(format!("{}{}", self.kind, self.length)),
            "instruction" => Value::String(
                self.instruction
                    .map_or_else(|| "-".to_owned(), ToString::to_string),
            ),
            _ => return None,
        };
        Some(value)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        QUERY_PATHS
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Bus;

    use super::*;

    fn cpu() -> Z80 {
        let address = Bus::new(0xFFFF);
        let data = Bus::new(0xFF);
        Z80::new(BusConnector::new(&address), BusConnector::new(&data))
    }

    #[test]
    fn power_on_registers() {
        let cpu = cpu();
        assert_eq!(cpu.query("pc"), Some(Value::U16(0)));
        assert_eq!(cpu.query("sp"), Some(Value::U16(0xFFFF)));
        assert_eq!(cpu.query("af"), Some(Value::U16(0xFFFF)));
        assert_eq!(cpu.query("pins.m1"), Some(Value::Level(SignalState::High)));
        assert_eq!(cpu.query("flags.c"), Some(Value::Bool(true)));
        assert_eq!(cpu.query("nonsense"), None);
    }

    #[test]
    fn every_advertised_path_answers() {
        let cpu = cpu();
        for path in cpu.query_paths() {
            assert!(cpu.query(path).is_some(), "{path}");
        }
    }

    #[test]
    fn first_rising_edge_starts_a_fetch() {
        let mut cpu = cpu();
        cpu.step(SignalState::High, InputLevels::default());
        assert!(cpu.pins().m1.is_asserted());
        assert_eq!(cpu.state().cycle_type, Some(MachineCycleType::Ocf));
        cpu.step(SignalState::Low, InputLevels::default());
        assert!(cpu.pins().mreq.is_asserted());
        assert!(cpu.pins().rd.is_asserted());
    }
}
