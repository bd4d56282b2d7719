//! Single instructions run to completion on a default system, checked for
//! their effect and their length in T-states.

use std::cell::RefCell;
use std::rc::Rc;

use emu_core::SignalState;
use zilog_z80::{
    CF, EventKinds, Halted, InputPin, InterruptSource, IoDevice, LifecycleEvent, NF, PF,
    PortLatch, ProgramImage, SF, SystemConfig, ZF, Z80System,
};

fn load<D: IoDevice>(system: &mut Z80System<D>, address: u16, bytes: &[u8]) {
    system
        .load(&ProgramImage::new(address, bytes.to_vec()))
        .expect("program fits");
}

/// Record the length of every instruction that ends.
fn lengths<D: IoDevice>(system: &mut Z80System<D>) -> Rc<RefCell<Vec<u64>>> {
    let lengths = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&lengths);
    let mut previous = 0;
    system.observe(
        EventKinds::INSTRUCTION_END,
        Box::new(move |state, event| {
            if event == LifecycleEvent::InstructionEnd {
                sink.borrow_mut().push(state.t_states - previous);
                previous = state.t_states;
            }
        }),
    );
    lengths
}

/// Run until HALT and return the lengths of the instructions before it.
fn run_to_halt<D: IoDevice>(system: &mut Z80System<D>) -> Vec<u64> {
    let lengths = lengths(system);
    let halted = system.add_exit_condition(Box::new(Halted));
    let stop = system.run();
    assert_eq!(stop.condition, halted);
    let mut lengths = lengths.borrow().clone();
    assert_eq!(lengths.pop(), Some(4), "HALT");
    lengths
}

fn run(program: &[u8]) -> (Z80System, Vec<u64>) {
    let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
    load(&mut system, 0, program);
    let lengths = run_to_halt(&mut system);
    (system, lengths)
}

#[test]
fn adc_hl_takes_carry_and_fifteen_t_states() {
    let (system, lengths) = run(&[
        0x01, 0x01, 0x00, // LD BC,1
        0x21, 0x03, 0x00, // LD HL,3
        0x37, // SCF
        0xED, 0x4A, // ADC HL,BC
        0x76,
    ]);
    assert_eq!(system.registers().hl(), 5);
    assert!(!system.registers().flag(CF));
    assert!(!system.registers().flag(ZF));
    assert_eq!(lengths, [10, 10, 4, 15]);
}

#[test]
fn ldir_repeats_until_bc_is_zero() {
    let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
    load(&mut system, 0x1000, &[1, 2, 3]);
    load(
        &mut system,
        0,
        &[
            0x21, 0x00, 0x10, // LD HL,1000h
            0x11, 0x00, 0x20, // LD DE,2000h
            0x01, 0x03, 0x00, // LD BC,3
            0xED, 0xB0, // LDIR
            0x76,
        ],
    );
    let lengths = run_to_halt(&mut system);

    assert_eq!(system.memory().slice(0x2000, 3), [1, 2, 3]);
    let registers = system.registers();
    assert_eq!(registers.bc(), 0);
    assert_eq!(registers.hl(), 0x1003);
    assert_eq!(registers.de(), 0x2003);
    assert!(!registers.flag(PF));
    assert_eq!(lengths, [10, 10, 10, 21, 21, 16]);
}

#[test]
fn djnz_loops_b_times() {
    let (system, lengths) = run(&[
        0x06, 0x03, // LD B,3
        0x10, 0xFE, // DJNZ $
        0x76,
    ]);
    assert_eq!(system.registers().b, 0);
    assert_eq!(lengths, [7, 13, 13, 8]);
}

#[test]
fn jr_conditions() {
    let (system, lengths) = run(&[
        0xAF, // XOR A
        0x28, 0x01, // JR Z,+1
        0x00, 0x76,
    ]);
    assert_eq!(system.registers().pc, 5);
    assert_eq!(lengths, [4, 12]);

    // A comes out of reset as FFh, so OR A leaves Z clear.
    let (system, lengths) = run(&[
        0xB7, // OR A
        0x28, 0x01, // JR Z,+1
        0x76, 0x76,
    ]);
    assert_eq!(system.registers().pc, 4);
    assert_eq!(lengths, [4, 7]);
}

#[test]
fn call_and_ret() {
    let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
    load(
        &mut system,
        0,
        &[
            0x31, 0x00, 0x80, // LD SP,8000h
            0xCD, 0x10, 0x00, // CALL 0010h
            0x76,
        ],
    );
    load(&mut system, 0x10, &[0x3E, 0x42, 0xC9]); // LD A,42h; RET
    let lengths = run_to_halt(&mut system);

    assert_eq!(system.registers().a, 0x42);
    assert_eq!(system.registers().sp, 0x8000);
    assert_eq!(system.memory().slice(0x7FFE, 2), [0x06, 0x00]);
    assert_eq!(lengths, [10, 17, 7, 10]);
}

#[test]
fn indexed_memory_operations() {
    let (system, lengths) = run(&[
        0xDD, 0x21, 0x00, 0x10, // LD IX,1000h
        0xDD, 0x36, 0x05, 0x77, // LD (IX+5),77h
        0xDD, 0x34, 0x05, // INC (IX+5)
        0xDD, 0x7E, 0x05, // LD A,(IX+5)
        0x76,
    ]);
    assert_eq!(system.registers().ix, 0x1000);
    assert_eq!(system.memory().peek(0x1005), 0x78);
    assert_eq!(system.registers().a, 0x78);
    assert_eq!(lengths, [14, 19, 23, 19]);
}

#[test]
fn negative_displacement() {
    let (system, _) = run(&[
        0xFD, 0x21, 0x10, 0x10, // LD IY,1010h
        0xFD, 0x36, 0xF0, 0x5A, // LD (IY-10h),5Ah
        0x76,
    ]);
    assert_eq!(system.memory().peek(0x1000), 0x5A);
}

#[test]
fn index_bit_operations_and_register_copy() {
    let (system, lengths) = run(&[
        0xDD, 0x21, 0x00, 0x10, // LD IX,1000h
        0xDD, 0xCB, 0x02, 0xDE, // SET 3,(IX+2)
        0xDD, 0xCB, 0x02, 0xC0, // SET 0,(IX+2),B
        0xDD, 0xCB, 0x02, 0x46, // BIT 0,(IX+2)
        0x76,
    ]);
    assert_eq!(system.memory().peek(0x1002), 0x09);
    assert_eq!(system.registers().b, 0x09);
    assert!(!system.registers().flag(ZF));
    assert_eq!(lengths, [14, 23, 23, 20]);
}

#[test]
fn bit_test_on_hl() {
    let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
    system.memory_mut().poke(0x1000, 0x80);
    load(
        &mut system,
        0,
        &[
            0x21, 0x00, 0x10, // LD HL,1000h
            0xCB, 0x7E, // BIT 7,(HL)
            0x76,
        ],
    );
    let lengths = run_to_halt(&mut system);
    assert!(!system.registers().flag(ZF));
    assert_eq!(lengths, [10, 12]);
}

#[test]
fn ignored_prefix_is_part_of_one_instruction() {
    let (system, lengths) = run(&[0xDD, 0x00, 0x76]);
    assert_eq!(lengths, [8]);
    assert_eq!(system.registers().pc, 3);
}

#[test]
fn undefined_ed_opcode_is_a_long_nop() {
    let (system, lengths) = run(&[0xED, 0x00, 0x76]);
    assert_eq!(lengths, [8]);
    assert_eq!(system.registers().a, 0xFF);
}

#[test]
fn daa_corrects_bcd_addition() {
    let (system, lengths) = run(&[
        0x3E, 0x15, // LD A,15h
        0xC6, 0x27, // ADD A,27h
        0x27, // DAA
        0x76,
    ]);
    assert_eq!(system.registers().a, 0x42);
    assert!(!system.registers().flag(CF));
    assert_eq!(lengths, [7, 7, 4]);
}

#[test]
fn neg_sets_carry_and_subtract() {
    let (system, _) = run(&[
        0x3E, 0x01, // LD A,1
        0xED, 0x44, // NEG
        0x76,
    ]);
    assert_eq!(system.registers().a, 0xFF);
    assert!(system.registers().flag(CF));
    assert!(system.registers().flag(NF));
    assert!(system.registers().flag(SF));
}

#[test]
fn exchanges_swap_register_sets() {
    let (system, _) = run(&[
        0x3E, 0x11, // LD A,11h
        0x08, // EX AF,AF'
        0x3E, 0x22, // LD A,22h
        0x08, // EX AF,AF'
        0x01, 0x34, 0x12, // LD BC,1234h
        0xD9, // EXX
        0x01, 0x78, 0x56, // LD BC,5678h
        0xD9, // EXX
        0x76,
    ]);
    let registers = system.registers();
    assert_eq!(registers.a, 0x11);
    assert_eq!(registers.af_alt >> 8, 0x22);
    assert_eq!(registers.bc(), 0x1234);
    assert_eq!(registers.bc_alt, 0x5678);
}

#[test]
fn ld_a_i_copies_iff2_into_parity() {
    let (system, lengths) = run(&[
        0xFB, // EI
        0xED, 0x57, // LD A,I
        0x76,
    ]);
    assert_eq!(system.registers().a, 0);
    assert!(system.registers().flag(PF));
    assert!(system.registers().flag(ZF));
    assert_eq!(lengths, [4, 9]);
}

#[test]
fn port_input_and_output_through_bc() {
    let mut system = Z80System::with_device(&SystemConfig::default(), PortLatch::new)
        .expect("default config");
    system.device_mut().set(0x34, 0x80);
    load(
        &mut system,
        0,
        &[
            0x01, 0x34, 0x12, // LD BC,1234h
            0xED, 0x78, // IN A,(C)
            0xED, 0x79, // OUT (C),A
            0x76,
        ],
    );
    let lengths = run_to_halt(&mut system);

    assert_eq!(system.registers().a, 0x80);
    assert!(system.registers().flag(SF));
    assert_eq!(system.device().writes(), [(0x1234, 0x80)]);
    assert_eq!(lengths, [10, 12, 12]);
}

#[test]
fn mode_0_defaults_to_rst_38() {
    let mut system = Z80System::with_device(&SystemConfig::default(), |address, data| {
        InterruptSource::new(address, data).int_until_acknowledged(0)
    })
    .expect("default config");
    load(
        &mut system,
        0,
        &[
            0x31, 0x00, 0x80, // LD SP,8000h
            0xFB, // EI
            0x00, 0x00, 0x00,
        ],
    );
    let handler = system.add_breakpoint(0x0038);
    let stop = system.run();

    assert_eq!(stop.condition, handler);
    assert_eq!(system.device().acknowledges(), 1);
    assert!(!system.registers().iff1);
    assert_eq!(system.memory().slice(0x7FFE, 2), [0x05, 0x00]);
}

#[test]
fn mode_0_executes_a_call_from_the_device() {
    let mut system = Z80System::with_device(&SystemConfig::default(), |address, data| {
        InterruptSource::new(address, data)
            .int_until_acknowledged(0)
            .acknowledge_bytes([0xCD, 0x00, 0x04])
    })
    .expect("default config");
    load(
        &mut system,
        0,
        &[
            0x31, 0x00, 0x80, // LD SP,8000h
            0xFB, // EI
            0x00, 0x00, 0x00,
        ],
    );
    let handler = system.add_breakpoint(0x0400);
    let stop = system.run();

    assert_eq!(stop.condition, handler);
    assert_eq!(system.registers().sp, 0x7FFE);
    assert_eq!(system.memory().slice(0x7FFE, 2), [0x05, 0x00]);
}

#[test]
fn reset_restores_power_on_registers() {
    let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
    load(
        &mut system,
        0,
        &[
            0x3E, 0x12, // LD A,12h
            0xED, 0x5E, // IM 2
            0xFB, // EI
            0x00,
        ],
    );
    system.step_instructions(3);
    assert_eq!(system.registers().a, 0x12);
    assert!(system.registers().iff1);

    system.set_input(InputPin::Reset, SignalState::ASSERTED);
    system.step_t_states(3);
    assert!(system.state().in_reset);

    system.set_input(InputPin::Reset, SignalState::RELEASED);
    let registers = system.registers();
    assert_eq!(registers.af(), 0xFFFF);
    assert_eq!(registers.sp, 0xFFFF);
    assert_eq!(registers.pc, 0);
    assert_eq!(registers.im, 0);
    assert!(!registers.iff1 && !registers.iff2);

    // Execution starts over at 0000h.
    system.step_instructions(1);
    assert!(!system.state().in_reset);
    assert_eq!(system.registers().a, 0x12);
    assert_eq!(system.registers().pc, 2);
}
