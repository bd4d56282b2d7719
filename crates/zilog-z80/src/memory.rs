//! Memory on the Z80 buses.

use emu_core::{BusConnector, SignalState};
use tracing::debug;

use crate::config::RomRange;
use crate::pins::Z80Pins;
use crate::program::{LoadError, ProgramImage};

/// A memory slave, stepped after the CPU on every clock edge.
///
/// MREQ without RFSH selects it; RD and WR choose the direction. It must
/// answer on the edge the strobe appears and may hold WAIT to stretch the
/// access.
pub trait MemorySlave {
    fn on_clock_edge(&mut self, level: SignalState, pins: &Z80Pins);

    /// Level this slave drives onto WAIT.
    fn wait(&self) -> SignalState {
        SignalState::RELEASED
    }
}

/// RAM with an optional read-only window and a fixed number of wait
/// states per access.
pub struct Memory {
    bytes: Box<[u8]>,
    address: BusConnector<u16>,
    data: BusConnector<u8>,
    rom: Option<RomRange>,
    wait_states: u8,

    selected: bool,
    driving: bool,
    /// Rising edges seen since the access began.
    rising_edges: u8,
    wait: SignalState,
}

impl Memory {
    /// `size` bytes decoded from the low address lines the connector
    /// sees. Larger addresses mirror.
    #[must_use]
    pub fn new(address: BusConnector<u16>, data: BusConnector<u8>, size: usize) -> Self {
        Self {
            bytes: vec![0; size].into_boxed_slice(),
            address,
            data,
            rom: None,
            wait_states: 0,
            selected: false,
            driving: false,
            rising_edges: 0,
            wait: SignalState::RELEASED,
        }
    }

    #[must_use]
    pub const fn with_rom(mut self, rom: Option<RomRange>) -> Self {
        self.rom = rom;
        self
    }

    #[must_use]
    pub const fn with_wait_states(mut self, wait_states: u8) -> Self {
        self.wait_states = wait_states;
        self
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Host read; mirrors like a bus read.
    #[must_use]
    pub fn peek(&self, address: u16) -> u8 {
        self.bytes[self.index(address)]
    }

    /// Host write. Ignores the ROM window.
    pub fn poke(&mut self, address: u16, value: u8) {
        let index = self.index(address);
        self.bytes[index] = value;
    }

    #[must_use]
    pub fn slice(&self, start: u16, len: usize) -> &[u8] {
        let start = self.index(start);
        let end = (start + len).min(self.bytes.len());
        &self.bytes[start..end]
    }

    /// Copy an image in. The ROM window is writable from the host.
    pub fn load(&mut self, image: &ProgramImage) -> Result<(), LoadError> {
        image.check(self.bytes.len())?;
        let start = image.load_address() as usize;
        self.bytes[start..image.end()].copy_from_slice(image.bytes());
        debug!(
            load_address = image.load_address(),
            len = image.bytes().len(),
            "program loaded"
        );
        Ok(())
    }

    fn index(&self, address: u16) -> usize {
        address as usize & (self.bytes.len() - 1)
    }

    fn is_rom(&self, index: usize) -> bool {
        self.rom.is_some_and(|rom| rom.contains(index))
    }
}

impl MemorySlave for Memory {
    fn on_clock_edge(&mut self, level: SignalState, pins: &Z80Pins) {
        let selected = pins.memory_request();
        if selected && !self.selected {
            self.rising_edges = 0;
        }
        if selected && level.is_high() {
            self.rising_edges = self.rising_edges.saturating_add(1);
        }
        self.selected = selected;
        self.wait = SignalState::active_low(
            selected && self.wait_states > 0 && self.rising_edges <= self.wait_states,
        );

        let index = self.index(self.address.read());
        if selected && pins.rd.is_asserted() {
            self.data.write(self.bytes[index]);
            self.driving = true;
        } else if self.driving {
            self.data.release();
            self.driving = false;
        }
        if selected && pins.wr.is_asserted() && !self.is_rom(index) {
            self.bytes[index] = self.data.read();
        }
    }

    fn wait(&self) -> SignalState {
        self.wait
    }
}
