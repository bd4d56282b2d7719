//! A Z80, its memory and its I/O devices on one clock.
//!
//! The board delivers every clock edge to the CPU first, then to memory,
//! then to the I/O devices. Input pins are composed before the CPU step
//! from the host's levels and the outputs every component left on the
//! previous edge, so a device asserting WAIT or INT is seen one edge later,
//! as on real hardware.

use std::ops::ControlFlow;
use std::rc::Rc;

use emu_core::{
    AddressBus, Bus, BusConnector, Clock, ClockWiring, DataBus, Observable, SignalState, Value,
};
use tracing::{debug, trace};

use crate::config::{ConfigError, SystemConfig};
use crate::cpu::Z80;
use crate::events::{EventKinds, InternalState, Observer, ObserverId};
use crate::exit::{
    AddressReached, ExitCondition, ExitConditionId, InstructionCountReached, StopReason,
    TStatesElapsed,
};
use crate::io::{IoDevice, NoDevice};
use crate::memory::{Memory, MemorySlave};
use crate::pins::{InputLevels, InputPin};
use crate::program::{LoadError, ProgramImage};
use crate::registers::Registers;

/// Address lines float high with nothing driving them.
const ADDRESS_FLOAT: u16 = 0xFFFF;
/// Data lines float high too: an unanswered read sees 0xFF.
const DATA_FLOAT: u8 = 0xFF;

/// Everything the clock fans out to.
struct Board<D> {
    cpu: Z80,
    memory: Memory,
    devices: D,
    host: InputLevels,
}

impl<D: IoDevice> Board<D> {
    fn inputs(&self) -> InputLevels {
        let host = self.host;
        InputLevels {
            wait: host
                .wait
                .wired_and(self.memory.wait())
                .wired_and(self.devices.wait()),
            int: host.int.wired_and(self.devices.int()),
            nmi: host.nmi.wired_and(self.devices.nmi()),
            reset: host.reset,
            busreq: host.busreq,
        }
    }
}

impl<D: IoDevice> ClockWiring for Board<D> {
    type Stop = StopReason;

    #[inline]
    fn on_clock_edge(&mut self, level: SignalState) -> ControlFlow<StopReason> {
        let inputs = self.inputs();
        self.cpu.step(level, inputs);
        let pins = *self.cpu.pins();
        self.memory.on_clock_edge(level, &pins);
        self.devices.on_clock_edge(level, &pins);
        match self.cpu.take_stop() {
            Some(stop) => ControlFlow::Break(stop),
            None => ControlFlow::Continue(()),
        }
    }
}

/// A complete Z80 system driven from the host.
///
/// Nothing runs until the host ticks the clock. Stepping stops at the
/// first exit condition that trips; breakpoints are exit conditions too.
pub struct Z80System<D: IoDevice = NoDevice> {
    clock: Clock<Board<D>>,
    address_bus: Rc<AddressBus>,
    data_bus: Rc<DataBus>,
    /// Loaded images that carry a line map, oldest first.
    images: Vec<ProgramImage>,
}

impl Z80System<NoDevice> {
    /// A CPU and memory with no I/O devices.
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        Self::with_device(config, |_, _| NoDevice)
    }
}

impl<D: IoDevice> Z80System<D> {
    /// Build a system, attaching the device `attach` returns to the
    /// address and data buses it is handed.
    pub fn with_device<F>(config: &SystemConfig, attach: F) -> Result<Self, ConfigError>
    where
        F: FnOnce(BusConnector<u16>, BusConnector<u8>) -> D,
    {
        config.validate()?;

        let address_bus = Bus::new(ADDRESS_FLOAT);
        let data_bus = Bus::new(DATA_FLOAT);

        let cpu = Z80::new(
            BusConnector::new(&address_bus),
            BusConnector::new(&data_bus),
        );
        let memory = Memory::new(
            BusConnector::truncated(&address_bus, config.address_lines()),
            BusConnector::new(&data_bus),
            config.memory_size,
        )
        .with_rom(config.rom)
        .with_wait_states(config.wait_states);
        let devices = attach(
            BusConnector::new(&address_bus),
            BusConnector::new(&data_bus),
        );

        debug!(
            frequency_hz = config.frequency_hz,
            memory_size = config.memory_size,
            wait_states = config.wait_states,
            "Z80 system built"
        );

        let board = Board {
            cpu,
            memory,
            devices,
            host: InputLevels::default(),
        };
        Ok(Self {
            clock: Clock::new(board, config.frequency_hz),
            address_bus,
            data_bus,
            images: Vec::new(),
        })
    }

    // === Program and breakpoints ===

    /// Copy a program into memory and remember its line map.
    pub fn load(&mut self, image: &ProgramImage) -> Result<(), LoadError> {
        self.clock.wiring_mut().memory.load(image)?;
        if image.lines().next().is_some() {
            self.images.push(image.clone());
        }
        Ok(())
    }

    /// Stop when an instruction fetched from `address` is about to start.
    pub fn add_breakpoint(&mut self, address: u16) -> ExitConditionId {
        trace!(address, "breakpoint added");
        self.add_exit_condition(Box::new(AddressReached(address)))
    }

    /// Break on the first instruction of a source line of a loaded image.
    /// The most recently loaded image that maps the line wins.
    pub fn add_line_breakpoint(&mut self, line: u32) -> Result<ExitConditionId, LoadError> {
        let address = self
            .images
            .iter()
            .rev()
            .find_map(|image| image.address_of_line(line).ok())
            .ok_or(LoadError::UnknownLine(line))?;
        Ok(self.add_breakpoint(address))
    }

    pub fn remove_breakpoint(&mut self, id: ExitConditionId) -> bool {
        self.remove_exit_condition(id)
    }

    pub fn add_exit_condition(&mut self, condition: Box<dyn ExitCondition>) -> ExitConditionId {
        self.cpu_mut().add_exit_condition(condition)
    }

    pub fn remove_exit_condition(&mut self, id: ExitConditionId) -> bool {
        self.cpu_mut().remove_exit_condition(id)
    }

    pub fn observe(&mut self, kinds: EventKinds, observer: Observer) -> ObserverId {
        self.cpu_mut().observe(kinds, observer)
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        self.cpu_mut().remove_observer(id)
    }

    // === Stepping ===

    /// One clock edge.
    pub fn half_tick(&mut self) -> ControlFlow<StopReason> {
        self.clock.half_tick()
    }

    /// One T-state, or the rest of it after a stop on a rising edge.
    pub fn tick(&mut self) -> ControlFlow<StopReason> {
        self.clock.tick()
    }

    /// Tick until an exit condition trips. With none registered this
    /// never returns.
    pub fn run(&mut self) -> StopReason {
        self.clock.tick_until_exit_condition()
    }

    /// Run until `count` more instructions complete, or an earlier exit
    /// condition trips. A count of zero runs one instruction.
    pub fn step_instructions(&mut self, count: u64) -> StopReason {
        let target = self.cpu().instruction_counter() + count.max(1);
        self.run_with(Box::new(InstructionCountReached(target)))
    }

    /// Run `count` more T-states, or until an earlier exit condition trips.
    pub fn step_t_states(&mut self, count: u64) -> StopReason {
        let target = self.cpu().half_t_states() / 2 + count.max(1);
        self.run_with(Box::new(TStatesElapsed(target)))
    }

    fn run_with(&mut self, condition: Box<dyn ExitCondition>) -> StopReason {
        let id = self.add_exit_condition(condition);
        let stop = self.run();
        self.remove_exit_condition(id);
        stop
    }

    // === Host pins ===

    /// Drive an input pin from the host. The CPU sees it from the next
    /// clock edge.
    pub fn set_input(&mut self, pin: InputPin, level: SignalState) {
        trace!(?pin, ?level, "host input");
        self.clock.wiring_mut().host.set(pin, level);
    }

    #[must_use]
    pub fn input(&self, pin: InputPin) -> SignalState {
        self.clock.wiring().host.get(pin)
    }

    // === Readback ===

    #[must_use]
    pub fn cpu(&self) -> &Z80 {
        &self.clock.wiring().cpu
    }

    pub fn cpu_mut(&mut self) -> &mut Z80 {
        &mut self.clock.wiring_mut().cpu
    }

    #[must_use]
    pub fn registers(&self) -> &Registers {
        self.cpu().registers()
    }

    pub fn registers_mut(&mut self) -> &mut Registers {
        self.cpu_mut().registers_mut()
    }

    #[must_use]
    pub fn state(&self) -> InternalState {
        self.cpu().state()
    }

    #[must_use]
    pub fn memory(&self) -> &Memory {
        &self.clock.wiring().memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.clock.wiring_mut().memory
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.clock.wiring().devices
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.clock.wiring_mut().devices
    }

    /// Value currently on the address bus.
    #[must_use]
    pub fn address_bus(&self) -> u16 {
        self.address_bus.value()
    }

    /// Value currently on the data bus.
    #[must_use]
    pub fn data_bus(&self) -> u8 {
        self.data_bus.value()
    }

    #[must_use]
    pub fn clock_level(&self) -> SignalState {
        self.clock.level()
    }

    /// Emulated time since power-on, at the configured frequency.
    #[must_use]
    pub fn elapsed_nanos(&self) -> u128 {
        self.clock.elapsed_nanos()
    }
}

impl<D: IoDevice> Observable for Z80System<D> {
    fn query(&self, path: &str) -> Option<Value> {
        self.cpu().query(path)
    }

    fn query_paths(&self) -> &'static [&'static str] {
        self.cpu().query_paths()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exit::Halted;
    use crate::io::PortLatch;

    fn system(program: &[u8]) -> Z80System {
        let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
        system
            .load(&ProgramImage::new(0, program.to_vec()))
            .expect("program fits");
        system
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SystemConfig::default().with_memory_size(1000);
        assert_eq!(
            Z80System::new(&config).err(),
            Some(ConfigError::MemorySize(1000))
        );
    }

    #[test]
    fn steps_whole_instructions() {
        // LD A,0x42 ; LD B,A ; HALT
        let mut system = system(&[0x3E, 0x42, 0x47, 0x76]);
        let stop = system.step_instructions(2);
        assert_eq!(stop.state.instruction_counter, 2);
        assert_eq!(stop.state.opcode.as_slice(), [0x47]);
        assert_eq!(system.registers().b, 0x42);
        assert_eq!(system.registers().pc, 3);
        assert_eq!(system.state().t_states, 11);
        assert_eq!(system.cpu().exit_condition_count(), 0);
    }

    #[test]
    fn stop_leaves_the_next_instruction_unchosen() {
        use crate::events::InstructionOrigin;

        // IM 1 ; EI ; NOP ; NOP ; HALT
        let mut system = system(&[0xED, 0x56, 0xFB, 0x00, 0x00, 0x76]);
        system.set_input(InputPin::Int, SignalState::ASSERTED);
        let stop = system.step_instructions(3);
        assert_eq!(stop.state.origin, InstructionOrigin::Memory { address: 3 });
        assert_eq!(system.state().origin, InstructionOrigin::Memory { address: 3 });
        assert!(system.registers().iff1);

        system.set_input(InputPin::Int, SignalState::RELEASED);
        system.step_instructions(1);
        assert_eq!(system.state().origin, InstructionOrigin::Memory { address: 4 });
        assert!(system.registers().iff1);
        assert_eq!(system.registers().sp, 0xFFFF);
        assert_eq!(system.registers().pc, 5);
    }

    #[test]
    fn steps_t_states() {
        let mut system = system(&[0x00, 0x00, 0x00]);
        system.step_t_states(6);
        assert_eq!(system.state().t_states, 6);
        system.step_t_states(2);
        assert_eq!(system.state().t_states, 8);
        assert_eq!(system.state().instruction_counter, 2);
    }

    #[test]
    fn breakpoint_by_address_and_line() {
        let image = ProgramImage::new(0, [0x00, 0x00, 0x3C, 0x76])
            .with_line(1, 0)
            .with_line(3, 2);
        let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
        system.load(&image).expect("program fits");

        let id = system.add_line_breakpoint(3).expect("line 3 is mapped");
        let stop = system.run();
        assert_eq!(stop.condition, id);
        assert_eq!(stop.state.address(), Some(2));
        assert!(system.remove_breakpoint(id));

        assert_eq!(
            system.add_line_breakpoint(2),
            Err(LoadError::UnknownLine(2))
        );

        system.add_exit_condition(Box::new(Halted));
        system.run();
        assert_eq!(system.registers().a, 0x00);
        assert!(system.cpu().is_halted());
    }

    #[test]
    fn latest_image_maps_a_line() {
        let mut system = Z80System::new(&SystemConfig::default()).expect("default config");
        system
            .load(&ProgramImage::new(0, [0x00, 0x00, 0x00]).with_line(7, 1))
            .expect("program fits");
        system
            .load(&ProgramImage::new(0x10, [0x00]).with_line(7, 0x10))
            .expect("program fits");
        system
            .load(&ProgramImage::new(0x20, [0x76]))
            .expect("program fits");

        let id = system.add_line_breakpoint(7).expect("line 7 is mapped");
        system.registers_mut().pc = 0x10;
        let stop = system.run();
        assert_eq!(stop.condition, id);
        assert_eq!(stop.state.address(), Some(0x10));
    }

    #[test]
    fn rom_is_not_writable_from_the_cpu() {
        // LD A,0x99 ; LD (0x0010),A ; HALT
        let config = SystemConfig::default().with_rom(0, 0x100);
        let mut system = Z80System::new(&config).expect("valid config");
        system
            .load(&ProgramImage::new(0, [0x3E, 0x99, 0x32, 0x10, 0x00, 0x76]))
            .expect("program fits");
        system.add_exit_condition(Box::new(Halted));
        system.run();
        assert_eq!(system.memory().peek(0x0010), 0x00);
    }

    #[test]
    fn port_latch_sees_out_and_answers_in() {
        // LD A,0x5A ; OUT (0xFE),A ; IN A,(0x10) ; HALT
        let mut system = Z80System::with_device(&SystemConfig::default(), PortLatch::new)
            .expect("default config");
        system
            .load(&ProgramImage::new(
                0,
                [0x3E, 0x5A, 0xD3, 0xFE, 0xDB, 0x10, 0x76],
            ))
            .expect("program fits");
        system.device_mut().set(0x10, 0x33);
        system.add_exit_condition(Box::new(Halted));
        system.run();
        assert_eq!(system.device().writes(), &[(0x5AFE, 0x5A)]);
        assert_eq!(system.registers().a, 0x33);
    }

    #[test]
    fn busreq_parks_the_cpu() {
        let mut system = system(&[0x00; 16]);
        system.step_t_states(4);
        system.set_input(InputPin::Busreq, SignalState::ASSERTED);
        system.step_t_states(10);
        assert!(system.state().bus_released);
        assert!(system.cpu().pins().busack.is_asserted());
        let pc = system.registers().pc;
        system.step_t_states(10);
        assert_eq!(system.registers().pc, pc);

        system.set_input(InputPin::Busreq, SignalState::RELEASED);
        system.step_t_states(10);
        assert!(!system.state().bus_released);
        assert!(system.registers().pc > pc);
    }

    #[test]
    fn observable_delegates_to_the_cpu() {
        let mut system = system(&[0x3E, 0x07, 0x76]);
        system.step_instructions(1);
        assert_eq!(system.query("a"), Some(Value::U8(0x07)));
        assert_eq!(system.query("pc"), Some(Value::U16(2)));
        assert!(system.elapsed_nanos() > 0);
    }
}
