//! Instruction boundaries: RESET, bus arbitration, NMI, INT and HALT.

use emu_core::SignalState;
use tracing::{debug, trace};

use super::{Chain, Phase, Z80};
use crate::decode::{self, InternalOp, MachineCycleType, TableId};
use crate::events::InstructionOrigin;
use crate::registers::Registers;

impl Z80 {
    /// NMI is edge-triggered: remember a HIGH to LOW transition whenever it
    /// happens.
    pub(super) fn latch_nmi(&mut self) {
        let asserted = self.pins.nmi.is_asserted();
        if asserted && !self.nmi_seen {
            self.nmi_pending = true;
        }
        self.nmi_seen = asserted;
    }

    /// RESET is asserted: drop whatever was in progress and hold.
    pub(super) fn hold_reset(&mut self) {
        if self.phase != super::Phase::Reset {
            debug!(pc = self.regs.pc, "reset");
            self.phase = Phase::Reset;
        }
        self.regs = Registers::after_reset();
        self.pins.release_bus_controls();
        self.pins.halt = SignalState::RELEASED;
        self.pins.busack = SignalState::RELEASED;
        self.address.release();
        self.data.release();
        self.halted = false;
        self.boundary_pending = false;
        self.nmi_pending = false;
        self.int_blocked = false;
        self.origin = InstructionOrigin::None;
        self.instruction = None;
        self.opcode.clear();
    }

    pub(super) fn leave_reset(&mut self) {
        trace!("reset released");
        self.phase = Phase::PowerOn;
    }

    /// Grant the buses to another master at a cycle boundary.
    pub(super) fn release_bus(&mut self) {
        debug!(pc = self.regs.pc, "bus released");
        self.phase = Phase::BusReleased;
        self.pins.release_bus_controls();
        self.pins.busack = SignalState::ASSERTED;
        self.address.release();
        self.data.release();
    }

    pub(super) fn return_bus(&mut self) {
        debug!(pc = self.regs.pc, "bus returned");
        self.phase = Phase::Running;
        self.pins.busack = SignalState::RELEASED;
    }

    fn leave_halt(&mut self) {
        if self.halted {
            self.halted = false;
            self.pins.halt = SignalState::RELEASED;
        }
    }

    /// HALT executed: fetch no-ops until an interrupt.
    pub(super) fn enter_halt(&mut self) {
        trace!(pc = self.regs.pc, "halted");
        self.halted = true;
        self.pins.halt = SignalState::ASSERTED;
    }

    /// Choose what runs next: NMI, then INT, then the HALT no-op, then a
    /// fetch at PC.
    pub(super) fn resolve_next_instruction(&mut self) {
        let int_blocked = std::mem::take(&mut self.int_blocked);
        self.opcode.clear();
        self.displacement = None;
        self.table = TableId::Main;
        self.chain = Chain::Fetch;
        self.position = 0;
        self.instruction = None;
        self.cycles = &[];
        self.condition_met = false;

        if std::mem::take(&mut self.nmi_pending) {
            debug!(pc = self.regs.pc, "NMI accepted");
            self.leave_halt();
            self.regs.iff1 = false;
            self.start_internal(InternalOp::Nmi);
        } else if self.pins.int.is_asserted() && self.regs.iff1 && !int_blocked {
            debug!(pc = self.regs.pc, mode = self.regs.im, "INT accepted");
            self.leave_halt();
            self.regs.iff1 = false;
            self.regs.iff2 = false;
            match self.regs.im {
                0 => {
                    self.origin = InstructionOrigin::Device;
                    self.begin_cycle(MachineCycleType::Ocf, 4);
                }
                1 => self.start_internal(InternalOp::IntMode1),
                _ => self.start_internal(InternalOp::IntMode2),
            }
        } else if self.halted {
            self.start_internal(InternalOp::HaltNop);
        } else {
            self.origin = InstructionOrigin::Memory {
                address: self.regs.pc,
            };
            self.begin_cycle(MachineCycleType::Ocf, 4);
        }
    }

    fn start_internal(&mut self, op: InternalOp) {
        let code = decode::tables().internal(op);
        self.origin = InstructionOrigin::Internal(op);
        self.instruction = Some(code);
        self.cycles = code.timing.primary.cycles;
        let length = self.cycles.first().map_or(4, |cycle| cycle.t_states);
        self.begin_cycle(MachineCycleType::Ocf, length);
    }
}
