//! Half-T-state behaviour of each machine cycle, and cycle sequencing.

use emu_core::SignalState;

use super::{Chain, ExecPoint, Pattern, Z80};
use crate::decode::{
    self, DecodeAction, Index, InstructionCode, InternalOp, MachineCycleType, Operand,
};
use crate::events::{InstructionOrigin, LifecycleEvent};

const ON: SignalState = SignalState::ASSERTED;
const OFF: SignalState = SignalState::RELEASED;

/// Result of one half-T-state.
enum Half {
    Continue,
    /// WAIT (or an automatic wait) held the cycle: run the previous
    /// half-T-state again.
    Wait,
}

impl Z80 {
    /// Set up `kind` as the active cycle, to start on the next rising edge.
    pub(super) fn begin_cycle(&mut self, kind: MachineCycleType, length: u8) {
        use MachineCycleType as M;

        self.kind = kind;
        self.length = length;
        self.half = 0;
        self.cycle_halves = 0;
        self.wait_states = 0;
        self.auto_waits = 0;
        self.pattern = match kind {
            M::Ocf if self.chain == Chain::OpcodeAfterDisplacement => Pattern::OpcodeRead,
            M::Ocf if self.position == 0 && self.acknowledging() => {
                self.auto_waits = 2;
                Pattern::Acknowledge
            }
            M::Ocf => Pattern::Fetch,
            M::Od | M::Odl | M::Odh | M::Mr | M::Mrl | M::Mrh | M::Srl | M::Srh => Pattern::Read,
            M::Mw | M::Mwl | M::Mwh | M::Swh | M::Swl => Pattern::Write,
            M::Pr => Pattern::PortRead,
            M::Pw => Pattern::PortWrite,
            M::Cpu => Pattern::Internal,
        };
        self.from_device = self.origin == InstructionOrigin::Device
            && (kind == M::Ocf || kind.is_operand_read());
    }

    fn acknowledging(&self) -> bool {
        matches!(
            self.origin,
            InstructionOrigin::Device
                | InstructionOrigin::Internal(InternalOp::IntMode1 | InternalOp::IntMode2)
        )
    }

    /// Run the pending half-T-state. Returns true when it was the last one
    /// of the cycle.
    pub(super) fn run_half(&mut self) -> bool {
        let h = self.half;
        self.last_half = h;
        self.cycle_halves += 1;

        let outcome = match self.pattern {
            Pattern::Fetch | Pattern::Acknowledge => self.fetch_half(h),
            Pattern::OpcodeRead | Pattern::Read => self.read_half(h),
            Pattern::Write => self.write_half(h),
            Pattern::PortRead => self.port_read_half(h),
            Pattern::PortWrite => self.port_write_half(h),
            Pattern::Internal => {
                if h == 0 {
                    self.release_refresh();
                }
                Half::Continue
            }
        };

        if let Half::Wait = outcome {
            self.half = h - 1;
            self.wait_states = self.wait_states.saturating_add(1);
            return false;
        }
        if u32::from(h) + 1 >= 2 * u32::from(self.length) {
            return true;
        }
        self.half = h + 1;
        false
    }

    fn release_refresh(&mut self) {
        if self.pins.rfsh.is_asserted() {
            self.pins.rfsh = OFF;
        }
    }

    fn sample_wait(&self) -> Half {
        if self.pins.wait.is_asserted() {
            Half::Wait
        } else {
            Half::Continue
        }
    }

    // === OCF ===

    fn fetch_half(&mut self, h: u8) -> Half {
        let acknowledge = self.pattern == Pattern::Acknowledge;
        match h {
            0 => {
                self.release_refresh();
                self.address.write(self.regs.pc);
                self.pins.m1 = ON;
            }
            1 if !acknowledge => {
                if !self.from_device {
                    self.pins.mreq = ON;
                }
                self.pins.rd = ON;
            }
            3 => {
                if self.auto_waits > 0 {
                    if self.auto_waits == 2 {
                        self.pins.iorq = ON;
                    }
                    self.auto_waits -= 1;
                    return Half::Wait;
                }
                return self.sample_wait();
            }
            4 => {
                let byte = self.data.read();
                self.pins.mreq = OFF;
                self.pins.rd = OFF;
                self.pins.m1 = OFF;
                self.pins.iorq = OFF;
                self.pins.rfsh = ON;
                self.address
                    .write(u16::from_be_bytes([self.regs.i, self.regs.r]));
                self.regs.increment_r();
                self.take_opcode_byte(byte);
            }
            5 => self.pins.mreq = ON,
            7 => self.pins.mreq = OFF,
            8 => self.pins.rfsh = OFF,
            _ => {}
        }
        Half::Continue
    }

    /// Handle the byte an OCF sampled.
    fn take_opcode_byte(&mut self, byte: u8) {
        if self.instruction.is_some() {
            // Internal operation: the byte is only a vector, if anything.
            self.fetched = byte;
            self.execute(ExecPoint::Decoded);
            self.length = self.template_length();
            return;
        }
        if matches!(self.origin, InstructionOrigin::Memory { .. }) {
            self.regs.pc = self.regs.pc.wrapping_add(1);
        }
        self.dispatch(byte);
    }

    // === Memory read ===

    fn read_half(&mut self, h: u8) -> Half {
        use MachineCycleType as M;

        match h {
            0 => {
                self.release_refresh();
                let address = match self.kind {
                    M::Mr | M::Mrl => self.addr,
                    M::Mrh => self.addr.wrapping_add(1),
                    M::Srl | M::Srh => self.regs.sp,
                    _ => self.regs.pc,
                };
                self.address.write(address);
            }
            1 => {
                if !self.from_device {
                    self.pins.mreq = ON;
                }
                self.pins.rd = ON;
            }
            3 => return self.sample_wait(),
            5 => {
                let byte = self.data.read();
                self.pins.mreq = OFF;
                self.pins.rd = OFF;
                match self.kind {
                    M::Srl | M::Srh => self.regs.sp = self.regs.sp.wrapping_add(1),
                    M::Ocf | M::Od | M::Odl | M::Odh
                        if matches!(self.origin, InstructionOrigin::Memory { .. }) =>
                    {
                        self.regs.pc = self.regs.pc.wrapping_add(1);
                    }
                    _ => {}
                }
                if self.pattern == Pattern::OpcodeRead {
                    self.dispatch(byte);
                } else {
                    self.fetched = byte;
                }
            }
            _ => {}
        }
        Half::Continue
    }

    // === Memory write ===

    fn write_half(&mut self, h: u8) -> Half {
        use MachineCycleType as M;

        match h {
            0 => {
                self.release_refresh();
                let address = match self.kind {
                    M::Swh | M::Swl => {
                        self.regs.sp = self.regs.sp.wrapping_sub(1);
                        self.regs.sp
                    }
                    M::Mwh => self.addr.wrapping_add(1),
                    _ => self.addr,
                };
                self.address.write(address);
            }
            1 => {
                self.pins.mreq = ON;
                let value = match self.kind {
                    M::Mwh | M::Swh => self.out_hi,
                    _ => self.out_lo,
                };
                self.data.write(value);
            }
            3 => {
                if let Half::Wait = self.sample_wait() {
                    return Half::Wait;
                }
                self.pins.wr = ON;
            }
            5 => {
                self.pins.mreq = OFF;
                self.pins.wr = OFF;
                self.data.release();
            }
            _ => {}
        }
        Half::Continue
    }

    // === Port read and write ===

    fn port_read_half(&mut self, h: u8) -> Half {
        match h {
            0 => {
                self.release_refresh();
                self.address.write(self.port);
            }
            2 => {
                self.pins.iorq = ON;
                self.pins.rd = ON;
            }
            5 => return self.sample_wait(),
            7 => {
                self.fetched = self.data.read();
                self.pins.iorq = OFF;
                self.pins.rd = OFF;
            }
            _ => {}
        }
        Half::Continue
    }

    fn port_write_half(&mut self, h: u8) -> Half {
        match h {
            0 => {
                self.release_refresh();
                self.address.write(self.port);
            }
            1 => self.data.write(self.out_lo),
            2 => {
                self.pins.iorq = ON;
                self.pins.wr = ON;
            }
            5 => return self.sample_wait(),
            7 => {
                self.pins.iorq = OFF;
                self.pins.wr = OFF;
                self.data.release();
            }
            _ => {}
        }
        Half::Continue
    }

    // === Decode and sequencing ===

    /// Look the byte up in the current table and follow the prefix chain.
    fn dispatch(&mut self, byte: u8) {
        self.opcode.push(byte);
        let tables = decode::tables();
        let mut table = self.table;
        loop {
            let code = tables.decode(table, byte);
            match code.action {
                DecodeAction::Redecode(next) => {
                    table = next;
                    self.position = 0;
                }
                DecodeAction::FetchNext(next) => {
                    self.table = next;
                    self.chain = Chain::Fetch;
                    return;
                }
                DecodeAction::FetchDisplacementThenOpcode(next) => {
                    self.table = next;
                    self.chain = Chain::Displacement;
                    return;
                }
                DecodeAction::Execute => {
                    self.begin_execution(code);
                    return;
                }
            }
        }
    }

    fn begin_execution(&mut self, code: &'static InstructionCode) {
        self.instruction = Some(code);
        self.cycles = code.timing.primary.cycles;
        self.condition_met = false;
        // DDCB/FDCB: the displacement came before the opcode.
        if let (Some(x), Some(d)) = (code.indexed(), self.displacement) {
            self.set_indexed_address(x, d);
        }
        self.execute(ExecPoint::Decoded);
        self.length = self.template_length();
    }

    pub(super) fn set_indexed_address(&mut self, x: Index, d: i8) {
        let base = self.regs.reg16(x.reg16());
        self.addr = base.wrapping_add(d as u16);
        self.regs.wz = self.addr;
    }

    fn template_length(&self) -> u8 {
        self.cycles
            .get(self.position)
            .map_or(self.length, |cycle| cycle.t_states)
    }

    /// Switch to the alternate timing (branch taken, block repeats).
    pub(super) fn take_alternate(&mut self, met: bool) {
        self.condition_met = met;
        if let Some(code) = self.instruction {
            self.cycles = code.timing.cycles(met);
        }
    }

    /// Latch what the finished cycle read and run the instruction's
    /// semantics for it.
    fn latch_cycle_result(&mut self) {
        use MachineCycleType as M;

        let byte = self.fetched;
        let Some(code) = self.instruction else {
            if self.kind == M::Od {
                self.displacement = Some(byte as i8);
                self.chain = Chain::OpcodeAfterDisplacement;
            }
            return;
        };
        match self.kind {
            M::Ocf => return,
            M::Od => match code.indexed() {
                Some(x) if self.displacement.is_none() => {
                    self.displacement = Some(byte as i8);
                    self.set_indexed_address(x, byte as i8);
                    return;
                }
                _ => self.imm_lo = byte,
            },
            M::Odl => self.imm_lo = byte,
            M::Odh => {
                self.imm_hi = byte;
                if code.has_operand(Operand::Absolute) {
                    self.addr = u16::from_le_bytes([self.imm_lo, self.imm_hi]);
                }
            }
            M::Mr | M::Mrl | M::Srl | M::Pr => self.data_lo = byte,
            M::Mrh | M::Srh => self.data_hi = byte,
            M::Mw | M::Mwl | M::Mwh | M::Swh | M::Swl | M::Pw | M::Cpu => {}
        }
        self.execute(ExecPoint::After(self.kind));
    }

    /// Close the active cycle and set up the next. Returns true when the
    /// instruction is complete.
    pub(super) fn complete_cycle(&mut self) -> bool {
        self.latch_cycle_result();
        self.emit(LifecycleEvent::CycleEnd);
        self.position += 1;

        if self.instruction.is_some() {
            return match self.cycles.get(self.position) {
                Some(&next) => {
                    self.begin_cycle(next.kind, next.t_states);
                    false
                }
                None => true,
            };
        }
        match self.chain {
            Chain::Fetch => self.begin_cycle(MachineCycleType::Ocf, 4),
            Chain::Displacement => self.begin_cycle(MachineCycleType::Od, 3),
            Chain::OpcodeAfterDisplacement => self.begin_cycle(MachineCycleType::Ocf, 3),
        }
        false
    }
}
