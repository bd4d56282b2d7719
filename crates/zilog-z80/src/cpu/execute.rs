//! Instruction semantics.
//!
//! `execute` runs once when the opcode is decoded and again after every
//! machine cycle of the instruction. Each instruction acts at the points
//! where its inputs exist: register operands at decode, immediates after
//! the operand read, memory after the read cycle. Anything to be written
//! is placed in the output latches before its write cycle starts.

#![allow(clippy::too_many_lines)]
#![allow(clippy::match_same_arms)]

use super::{ExecPoint, Z80};
use crate::alu::{self, AluResult, Shift};
use crate::decode::{InstructionCode, MachineCycleType as M, Mnemonic as Mn, Operand, Reg8, Reg16};
use crate::flags::{CF, HF, NF, PF, SF, XF, YF, ZF, parity, sz53, sz53p};

const DECODED: ExecPoint = ExecPoint::Decoded;

impl Z80 {
    pub(super) fn execute(&mut self, at: ExecPoint) {
        let Some(code) = self.instruction else {
            return;
        };
        if at == DECODED {
            if let Some(Operand::Indirect(rr @ (Reg16::BC | Reg16::DE | Reg16::HL))) =
                code.find_operand(Operand::is_memory)
            {
                self.addr = self.regs.reg16(rr);
            }
        }

        match code.mnemonic {
            Mn::Nop | Mn::HaltNop => {}
            Mn::Ld => self.load(code, at),
            Mn::Push => {
                if let (DECODED, Some(Operand::Reg16(rr))) = (at, code.operands[0]) {
                    self.stage16(self.regs.reg16(rr));
                }
            }
            Mn::Pop => {
                if let (ExecPoint::After(M::Srh), Some(Operand::Reg16(rr))) = (at, code.operands[0])
                {
                    self.regs.set_reg16(rr, self.data16());
                }
            }
            Mn::Ex => self.exchange(code, at),
            Mn::Exx => {
                if at == DECODED {
                    self.regs.exchange_shadow_set();
                }
            }

            Mn::Add | Mn::Adc | Mn::Sbc
                if matches!(code.operands[0], Some(Operand::Reg16(_))) =>
            {
                self.alu16(code, at);
            }
            Mn::Add | Mn::Adc | Mn::Sub | Mn::Sbc | Mn::And | Mn::Xor | Mn::Or | Mn::Cp => {
                self.alu8(code, at);
            }
            Mn::Inc | Mn::Dec => self.inc_dec(code, at),

            Mn::Rlca | Mn::Rrca | Mn::Rla | Mn::Rra | Mn::Daa | Mn::Cpl | Mn::Scf | Mn::Ccf
            | Mn::Neg => {
                if at == DECODED {
                    self.accumulator(code.mnemonic);
                }
            }

            Mn::Halt => {
                if at == DECODED {
                    self.enter_halt();
                }
            }
            Mn::Di | Mn::Ei => {
                if at == DECODED {
                    let enable = code.mnemonic == Mn::Ei;
                    self.regs.iff1 = enable;
                    self.regs.iff2 = enable;
                    self.int_blocked = enable;
                }
            }
            Mn::Im => {
                if let (DECODED, Some(Operand::Mode(mode))) = (at, code.operands[0]) {
                    self.regs.im = mode;
                }
            }

            Mn::Jp => self.jump(code, at),
            Mn::Jr | Mn::Djnz => self.jump_relative(code, at),
            Mn::Call => self.call(code, at),
            Mn::Ret | Mn::Reti | Mn::Retn => self.ret(code, at),
            Mn::Rst => match at {
                DECODED => self.stage16(self.regs.pc),
                ExecPoint::After(M::Swl) => {
                    if let Some(Operand::Restart(target)) = code.operands[0] {
                        self.regs.pc = u16::from(target);
                        self.regs.wz = self.regs.pc;
                    }
                }
                _ => {}
            },

            Mn::In => self.port_in(code, at),
            Mn::Out => self.port_out(code, at),

            Mn::Rlc => self.shift(code, at, Shift::Rlc),
            Mn::Rrc => self.shift(code, at, Shift::Rrc),
            Mn::Rl => self.shift(code, at, Shift::Rl),
            Mn::Rr => self.shift(code, at, Shift::Rr),
            Mn::Sla => self.shift(code, at, Shift::Sla),
            Mn::Sra => self.shift(code, at, Shift::Sra),
            Mn::Sll => self.shift(code, at, Shift::Sll),
            Mn::Srl => self.shift(code, at, Shift::Srl),
            Mn::Bit | Mn::Res | Mn::Set => self.bit(code, at),
            Mn::Rrd | Mn::Rld => self.rotate_decimal(code.mnemonic, at),

            Mn::Ldi | Mn::Ldd | Mn::Ldir | Mn::Lddr => self.block_load(code.mnemonic, at),
            Mn::Cpi | Mn::Cpd | Mn::Cpir | Mn::Cpdr => self.block_compare(code.mnemonic, at),
            Mn::Ini | Mn::Ind | Mn::Inir | Mn::Indr => self.block_in(code.mnemonic, at),
            Mn::Outi | Mn::Outd | Mn::Otir | Mn::Otdr => self.block_out(code.mnemonic, at),

            Mn::Nmi | Mn::Int => self.interrupt_entry(code, at),
        }
    }

    // === Operand access ===

    /// When an 8-bit source operand has its value.
    fn ready_at(src: Operand) -> ExecPoint {
        match src {
            Operand::Immediate8 => ExecPoint::After(M::Od),
            Operand::Port | Operand::PortC => ExecPoint::After(M::Pr),
            op if op.is_memory() => ExecPoint::After(M::Mr),
            _ => DECODED,
        }
    }

    fn read8(&self, src: Operand) -> u8 {
        match src {
            Operand::Reg8(r) => self.regs.reg8(r),
            Operand::Immediate8 => self.imm_lo,
            Operand::Zero => 0,
            _ => self.data_lo,
        }
    }

    fn write8(&mut self, dst: Operand, value: u8) {
        match dst {
            Operand::Reg8(r) => self.regs.set_reg8(r, value),
            _ => self.out_lo = value,
        }
    }

    const fn imm16(&self) -> u16 {
        u16::from_le_bytes([self.imm_lo, self.imm_hi])
    }

    const fn data16(&self) -> u16 {
        u16::from_le_bytes([self.data_lo, self.data_hi])
    }

    /// Latch a word for a MWL/MWH or SWH/SWL pair.
    fn stage16(&mut self, value: u16) {
        [self.out_lo, self.out_hi] = value.to_le_bytes();
    }

    // === Loads and exchanges ===

    fn load(&mut self, code: &InstructionCode, at: ExecPoint) {
        let [Some(dst), Some(src), _] = code.operands else {
            return;
        };
        match (dst, src) {
            (Operand::Reg16(rr), Operand::Immediate16) => {
                if at == ExecPoint::After(M::Odh) {
                    self.regs.set_reg16(rr, self.imm16());
                }
            }
            (Operand::Reg16(rr), Operand::Absolute) => {
                if at == ExecPoint::After(M::Mrh) {
                    self.regs.set_reg16(rr, self.data16());
                    self.regs.wz = self.addr.wrapping_add(1);
                }
            }
            (Operand::Absolute, Operand::Reg16(rr)) => {
                if at == ExecPoint::After(M::Odh) {
                    self.stage16(self.regs.reg16(rr));
                    self.regs.wz = self.addr.wrapping_add(1);
                }
            }
            (Operand::Reg16(to), Operand::Reg16(from)) => {
                if at == DECODED {
                    self.regs.set_reg16(to, self.regs.reg16(from));
                }
            }
            (Operand::Reg8(Reg8::A), Operand::Reg8(ir @ (Reg8::I | Reg8::R))) => {
                if at == DECODED {
                    let value = self.regs.reg8(ir);
                    self.regs.a = value;
                    let p = if self.regs.iff2 { PF } else { 0 };
                    self.regs.f = (self.regs.f & CF) | sz53(value) | p;
                }
            }
            (Operand::Absolute, Operand::Reg8(Reg8::A)) => {
                if at == ExecPoint::After(M::Odh) {
                    self.out_lo = self.regs.a;
                    self.regs.wz =
                        u16::from_be_bytes([self.regs.a, self.addr.wrapping_add(1) as u8]);
                }
            }
            (Operand::Indirect(Reg16::BC | Reg16::DE), Operand::Reg8(Reg8::A)) => {
                if at == DECODED {
                    self.out_lo = self.regs.a;
                    self.regs.wz =
                        u16::from_be_bytes([self.regs.a, self.addr.wrapping_add(1) as u8]);
                }
            }
            (Operand::Reg8(Reg8::A), Operand::Absolute | Operand::Indirect(Reg16::BC | Reg16::DE)) => {
                if at == ExecPoint::After(M::Mr) {
                    self.regs.a = self.data_lo;
                    self.regs.wz = self.addr.wrapping_add(1);
                }
            }
            _ => {
                if at == Self::ready_at(src) {
                    let value = self.read8(src);
                    self.write8(dst, value);
                }
            }
        }
    }

    fn exchange(&mut self, code: &InstructionCode, at: ExecPoint) {
        match code.operands {
            [Some(Operand::Reg16(Reg16::DE)), Some(Operand::Reg16(Reg16::HL)), _] => {
                if at == DECODED {
                    let de = self.regs.de();
                    self.regs.set_de(self.regs.hl());
                    self.regs.set_hl(de);
                }
            }
            [Some(Operand::Reg16(Reg16::AF)), ..] => {
                if at == DECODED {
                    self.regs.exchange_af();
                }
            }
            [Some(Operand::Indirect(Reg16::SP)), Some(Operand::Reg16(rr)), _] => match at {
                ExecPoint::After(M::Srh) => self.stage16(self.regs.reg16(rr)),
                ExecPoint::After(M::Swl) => {
                    let value = self.data16();
                    self.regs.set_reg16(rr, value);
                    self.regs.wz = value;
                }
                _ => {}
            },
            _ => {}
        }
    }

    // === Arithmetic ===

    fn alu8(&mut self, code: &InstructionCode, at: ExecPoint) {
        let Some(src) = code.operands().last() else {
            return;
        };
        if at != Self::ready_at(src) {
            return;
        }
        let a = self.regs.a;
        let b = self.read8(src);
        let carry = self.regs.flag(CF);
        let result = match code.mnemonic {
            Mn::Add => alu::add8(a, b, false),
            Mn::Adc => alu::add8(a, b, carry),
            Mn::Sub => alu::sub8(a, b, false),
            Mn::Sbc => alu::sub8(a, b, carry),
            Mn::And => alu::and8(a, b),
            Mn::Xor => alu::xor8(a, b),
            Mn::Or => alu::or8(a, b),
            _ => alu::cp8(a, b),
        };
        if code.mnemonic != Mn::Cp {
            self.regs.a = result.value;
        }
        self.regs.f = result.flags;
    }

    fn alu16(&mut self, code: &InstructionCode, at: ExecPoint) {
        let (DECODED, [Some(Operand::Reg16(dst)), Some(Operand::Reg16(src)), _]) =
            (at, code.operands)
        else {
            return;
        };
        let a = self.regs.reg16(dst);
        let b = self.regs.reg16(src);
        let carry = self.regs.flag(CF);
        let (value, flags) = match code.mnemonic {
            Mn::Adc => alu::adc16(a, b, carry),
            Mn::Sbc => alu::sbc16(a, b, carry),
            _ => {
                let (value, flags) = alu::add16(a, b);
                (value, (self.regs.f & (SF | ZF | PF)) | flags)
            }
        };
        self.regs.wz = a.wrapping_add(1);
        self.regs.set_reg16(dst, value);
        self.regs.f = flags;
    }

    fn inc_dec(&mut self, code: &InstructionCode, at: ExecPoint) {
        let Some(target) = code.operands[0] else {
            return;
        };
        let step = |value: u8| -> AluResult {
            if code.mnemonic == Mn::Inc {
                alu::inc8(value)
            } else {
                alu::dec8(value)
            }
        };
        match target {
            Operand::Reg16(rr) => {
                if at == DECODED {
                    let value = self.regs.reg16(rr);
                    let value = if code.mnemonic == Mn::Inc {
                        value.wrapping_add(1)
                    } else {
                        value.wrapping_sub(1)
                    };
                    self.regs.set_reg16(rr, value);
                }
            }
            Operand::Reg8(r) => {
                if at == DECODED {
                    let result = step(self.regs.reg8(r));
                    self.regs.set_reg8(r, result.value);
                    self.regs.f = result.flags | (self.regs.f & CF);
                }
            }
            _ => {
                if at == ExecPoint::After(M::Mr) {
                    let result = step(self.data_lo);
                    self.out_lo = result.value;
                    self.regs.f = result.flags | (self.regs.f & CF);
                }
            }
        }
    }

    fn accumulator(&mut self, mnemonic: Mn) {
        let r = &mut self.regs;
        let kept = r.f & (SF | ZF | PF);
        let result = match mnemonic {
            Mn::Rlca => alu::rotate_a(Shift::Rlc, r.a, r.f),
            Mn::Rrca => alu::rotate_a(Shift::Rrc, r.a, r.f),
            Mn::Rla => alu::rotate_a(Shift::Rl, r.a, r.f),
            Mn::Rra => alu::rotate_a(Shift::Rr, r.a, r.f),
            Mn::Daa => alu::daa(r.a, r.f),
            Mn::Neg => alu::sub8(0, r.a, false),
            Mn::Cpl => {
                let value = !r.a;
                AluResult {
                    value,
                    flags: (r.f & (SF | ZF | PF | CF)) | HF | NF | (value & (YF | XF)),
                }
            }
            Mn::Scf => AluResult {
                value: r.a,
                flags: kept | CF | (r.a & (YF | XF)),
            },
            Mn::Ccf => {
                let carried = if r.f & CF != 0 { HF } else { CF };
                AluResult {
                    value: r.a,
                    flags: kept | carried | (r.a & (YF | XF)),
                }
            }
            _ => return,
        };
        r.a = result.value;
        r.f = result.flags;
    }

    // === Control flow ===

    fn jump(&mut self, code: &InstructionCode, at: ExecPoint) {
        match code.operands[0] {
            Some(Operand::Indirect(rr)) => {
                if at == DECODED {
                    self.regs.pc = self.regs.reg16(rr);
                }
            }
            first => {
                if at == ExecPoint::After(M::Odh) {
                    let target = self.imm16();
                    self.regs.wz = target;
                    let taken = match first {
                        Some(Operand::Condition(cc)) => self.regs.condition(cc),
                        _ => true,
                    };
                    if taken {
                        self.regs.pc = target;
                    }
                }
            }
        }
    }

    fn jump_relative(&mut self, code: &InstructionCode, at: ExecPoint) {
        match at {
            DECODED => {
                let taken = match code.operands[0] {
                    Some(Operand::Condition(cc)) => self.regs.condition(cc),
                    _ if code.mnemonic == Mn::Djnz => {
                        self.regs.b = self.regs.b.wrapping_sub(1);
                        self.regs.b != 0
                    }
                    _ => true,
                };
                self.take_alternate(taken);
            }
            ExecPoint::After(M::Od) if self.condition_met => {
                let offset = self.imm_lo as i8;
                self.regs.pc = self.regs.pc.wrapping_add(offset as u16);
                self.regs.wz = self.regs.pc;
            }
            _ => {}
        }
    }

    fn call(&mut self, code: &InstructionCode, at: ExecPoint) {
        match at {
            DECODED => {
                let taken = match code.operands[0] {
                    Some(Operand::Condition(cc)) => self.regs.condition(cc),
                    _ => true,
                };
                self.take_alternate(taken);
            }
            ExecPoint::After(M::Odh) => {
                self.regs.wz = self.imm16();
                self.stage16(self.regs.pc);
            }
            ExecPoint::After(M::Swl) => self.regs.pc = self.regs.wz,
            _ => {}
        }
    }

    fn ret(&mut self, code: &InstructionCode, at: ExecPoint) {
        match at {
            DECODED => {
                let taken = match code.operands[0] {
                    Some(Operand::Condition(cc)) => self.regs.condition(cc),
                    _ => true,
                };
                self.take_alternate(taken);
            }
            ExecPoint::After(M::Srh) => {
                self.regs.pc = self.data16();
                self.regs.wz = self.regs.pc;
                if code.mnemonic != Mn::Ret {
                    self.regs.iff1 = self.regs.iff2;
                }
            }
            _ => {}
        }
    }

    // === Ports ===

    fn port_in(&mut self, code: &InstructionCode, at: ExecPoint) {
        match (code.operands[0], code.operands[1], at) {
            (_, Some(Operand::Port), ExecPoint::After(M::Od)) => {
                self.port = u16::from_be_bytes([self.regs.a, self.imm_lo]);
                self.regs.wz = self.port.wrapping_add(1);
            }
            (Some(dst), Some(Operand::Port), ExecPoint::After(M::Pr)) => {
                self.write8(dst, self.data_lo);
            }
            (_, Some(Operand::PortC), DECODED) => {
                self.port = self.regs.bc();
                self.regs.wz = self.port.wrapping_add(1);
            }
            (Some(dst), Some(Operand::PortC), ExecPoint::After(M::Pr)) => {
                let value = self.data_lo;
                if let Operand::Reg8(r) = dst {
                    self.regs.set_reg8(r, value);
                }
                self.regs.f = (self.regs.f & CF) | sz53p(value);
            }
            _ => {}
        }
    }

    fn port_out(&mut self, code: &InstructionCode, at: ExecPoint) {
        match (code.operands[0], code.operands[1], at) {
            (Some(Operand::Port), Some(_), ExecPoint::After(M::Od)) => {
                let (a, n) = (self.regs.a, self.imm_lo);
                self.port = u16::from_be_bytes([a, n]);
                self.out_lo = a;
                self.regs.wz = u16::from_be_bytes([a, n.wrapping_add(1)]);
            }
            (Some(Operand::PortC), Some(src), DECODED) => {
                self.port = self.regs.bc();
                self.out_lo = self.read8(src);
                self.regs.wz = self.port.wrapping_add(1);
            }
            _ => {}
        }
    }

    // === Bit operations ===

    fn shift(&mut self, code: &InstructionCode, at: ExecPoint, op: Shift) {
        let carry = self.regs.flag(CF);
        match code.operands[0] {
            Some(Operand::Reg8(r)) => {
                if at == DECODED {
                    let result = alu::shift8(op, self.regs.reg8(r), carry);
                    self.regs.set_reg8(r, result.value);
                    self.regs.f = result.flags;
                }
            }
            Some(_) => {
                if at == ExecPoint::After(M::Mr) {
                    let result = alu::shift8(op, self.data_lo, carry);
                    self.out_lo = result.value;
                    self.regs.f = result.flags;
                    if let Some(Operand::Reg8(copy)) = code.operands[1] {
                        self.regs.set_reg8(copy, result.value);
                    }
                }
            }
            None => {}
        }
    }

    fn bit(&mut self, code: &InstructionCode, at: ExecPoint) {
        let [Some(Operand::Bit(bit)), Some(target), copy] = code.operands else {
            return;
        };
        let (value, xy) = match target {
            Operand::Reg8(r) if at == DECODED => {
                let value = self.regs.reg8(r);
                (value, value)
            }
            Operand::Reg8(_) => return,
            _ if at == ExecPoint::After(M::Mr) => (self.data_lo, (self.regs.wz >> 8) as u8),
            _ => return,
        };
        let mask = 1u8 << bit;
        let result = match code.mnemonic {
            Mn::Bit => {
                let set = value & mask != 0;
                let mut f = (self.regs.f & CF) | HF | (xy & (YF | XF));
                if !set {
                    f |= ZF | PF;
                }
                if set && bit == 7 {
                    f |= SF;
                }
                self.regs.f = f;
                return;
            }
            Mn::Res => value & !mask,
            _ => value | mask,
        };
        self.write8(target, result);
        if let Some(Operand::Reg8(copy)) = copy {
            self.regs.set_reg8(copy, result);
        }
    }

    /// `RRD`/`RLD`: rotate a BCD digit between A and (HL).
    fn rotate_decimal(&mut self, mnemonic: Mn, at: ExecPoint) {
        match at {
            DECODED => self.addr = self.regs.hl(),
            ExecPoint::After(M::Mr) => {
                let (a, m) = (self.regs.a, self.data_lo);
                let (memory, digit) = if mnemonic == Mn::Rrd {
                    ((a << 4) | (m >> 4), m & 0x0F)
                } else {
                    ((m << 4) | (a & 0x0F), m >> 4)
                };
                self.regs.a = (a & 0xF0) | digit;
                self.out_lo = memory;
                self.regs.f = (self.regs.f & CF) | sz53p(self.regs.a);
                self.regs.wz = self.addr.wrapping_add(1);
            }
            _ => {}
        }
    }

    // === Block transfers ===

    fn repeat_block(&mut self, again: bool) {
        self.take_alternate(again);
        if again {
            self.regs.pc = self.regs.pc.wrapping_sub(2);
            self.regs.wz = self.regs.pc.wrapping_add(1);
        }
    }

    fn block_load(&mut self, mnemonic: Mn, at: ExecPoint) {
        match at {
            DECODED => self.addr = self.regs.hl(),
            ExecPoint::After(M::Mr) => {
                self.out_lo = self.data_lo;
                self.addr = self.regs.de();
            }
            ExecPoint::After(M::Mw) => {
                let delta = step_for(mnemonic);
                let r = &mut self.regs;
                r.set_hl(r.hl().wrapping_add(delta));
                r.set_de(r.de().wrapping_add(delta));
                r.set_bc(r.bc().wrapping_sub(1));
                let n = self.data_lo.wrapping_add(r.a);
                let p = if r.bc() != 0 { PF } else { 0 };
                r.f = (r.f & (SF | ZF | CF)) | (n & XF) | ((n << 4) & YF) | p;
                if is_repeating(mnemonic) {
                    self.repeat_block(self.regs.bc() != 0);
                }
            }
            _ => {}
        }
    }

    fn block_compare(&mut self, mnemonic: Mn, at: ExecPoint) {
        match at {
            DECODED => self.addr = self.regs.hl(),
            ExecPoint::After(M::Mr) => {
                let delta = step_for(mnemonic);
                let r = &mut self.regs;
                let diff = alu::sub8(r.a, self.data_lo, false);
                r.set_hl(r.hl().wrapping_add(delta));
                r.set_bc(r.bc().wrapping_sub(1));
                r.wz = r.wz.wrapping_add(delta);
                let n = diff.value.wrapping_sub(u8::from(diff.flags & HF != 0));
                let p = if r.bc() != 0 { PF } else { 0 };
                r.f = (diff.flags & (SF | ZF | HF))
                    | NF
                    | (r.f & CF)
                    | (n & XF)
                    | ((n << 4) & YF)
                    | p;
                if is_repeating(mnemonic) {
                    self.repeat_block(self.regs.bc() != 0 && diff.value != 0);
                }
            }
            _ => {}
        }
    }

    fn block_in(&mut self, mnemonic: Mn, at: ExecPoint) {
        let delta = step_for(mnemonic);
        match at {
            DECODED => {
                self.port = self.regs.bc();
                self.regs.wz = self.port.wrapping_add(delta);
            }
            ExecPoint::After(M::Pr) => {
                let value = self.data_lo;
                self.out_lo = value;
                self.addr = self.regs.hl();
                self.regs.b = self.regs.b.wrapping_sub(1);
                let k = u16::from(value) + u16::from(self.regs.c.wrapping_add(delta as u8));
                self.regs.f = self.block_io_flags(value, k);
            }
            ExecPoint::After(M::Mw) => {
                self.regs.set_hl(self.regs.hl().wrapping_add(delta));
                if is_repeating(mnemonic) {
                    self.repeat_block(self.regs.b != 0);
                }
            }
            _ => {}
        }
    }

    fn block_out(&mut self, mnemonic: Mn, at: ExecPoint) {
        let delta = step_for(mnemonic);
        match at {
            DECODED => self.addr = self.regs.hl(),
            ExecPoint::After(M::Mr) => {
                let value = self.data_lo;
                self.regs.b = self.regs.b.wrapping_sub(1);
                self.port = self.regs.bc();
                self.out_lo = value;
                self.regs.set_hl(self.regs.hl().wrapping_add(delta));
                self.regs.wz = self.port.wrapping_add(delta);
                let k = u16::from(value) + u16::from(self.regs.l);
                self.regs.f = self.block_io_flags(value, k);
            }
            ExecPoint::After(M::Pw) => {
                if is_repeating(mnemonic) {
                    self.repeat_block(self.regs.b != 0);
                }
            }
            _ => {}
        }
    }

    /// Flags of INI/OUTI and friends, after B has been decremented.
    const fn block_io_flags(&self, value: u8, k: u16) -> u8 {
        let b = self.regs.b;
        let mut f = sz53(b);
        if value & 0x80 != 0 {
            f |= NF;
        }
        if k > 0xFF {
            f |= HF | CF;
        }
        if parity((k as u8 & 0x07) ^ b) {
            f |= PF;
        }
        f
    }

    // === Interrupt entry ===

    fn interrupt_entry(&mut self, code: &InstructionCode, at: ExecPoint) {
        let vectored = code.has_operand(Operand::Mode(2));
        match at {
            DECODED => {
                self.stage16(self.regs.pc);
                if vectored {
                    self.addr = u16::from_be_bytes([self.regs.i, self.fetched]);
                }
            }
            ExecPoint::After(M::Swl) if !vectored => {
                self.regs.pc = if code.mnemonic == Mn::Nmi { 0x0066 } else { 0x0038 };
                self.regs.wz = self.regs.pc;
            }
            ExecPoint::After(M::Mrh) => {
                self.regs.pc = self.data16();
                self.regs.wz = self.regs.pc;
            }
            _ => {}
        }
    }
}

/// Address step of a block instruction: +1, or -1 for the decrementing
/// forms.
const fn step_for(mnemonic: Mn) -> u16 {
    match mnemonic {
        Mn::Ldd | Mn::Lddr | Mn::Cpd | Mn::Cpdr | Mn::Ind | Mn::Indr | Mn::Outd | Mn::Otdr => {
            0xFFFF
        }
        _ => 1,
    }
}

const fn is_repeating(mnemonic: Mn) -> bool {
    matches!(
        mnemonic,
        Mn::Ldir | Mn::Lddr | Mn::Cpir | Mn::Cpdr | Mn::Inir | Mn::Indr | Mn::Otir | Mn::Otdr
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decrementing_block_forms_step_down() {
        assert_eq!(5u16.wrapping_add(step_for(Mn::Lddr)), 4);
        assert_eq!(5u16.wrapping_add(step_for(Mn::Outi)), 6);
        assert!(is_repeating(Mn::Otdr));
        assert!(!is_repeating(Mn::Cpi));
    }

    #[test]
    fn memory_sources_wait_for_the_read() {
        assert_eq!(Z80::ready_at(Operand::Immediate8), ExecPoint::After(M::Od));
        assert_eq!(
            Z80::ready_at(Operand::Indirect(Reg16::HL)),
            ExecPoint::After(M::Mr)
        );
        assert_eq!(Z80::ready_at(Operand::Reg8(Reg8::B)), DECODED);
        assert_eq!(Z80::ready_at(Operand::PortC), ExecPoint::After(M::Pr));
    }
}
