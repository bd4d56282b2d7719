//! I/O devices on the Z80 buses.

use std::ops::RangeInclusive;

use emu_core::{BusConnector, SignalState};

use crate::pins::{InputPin, Z80Pins};

/// A port-mapped device, stepped after memory on every clock edge.
///
/// IORQ without M1 selects a port; RD and WR choose the direction and the
/// low address byte names the port. IORQ with M1 is an interrupt
/// acknowledge, during which an interrupting device places its vector or
/// opcode on the data bus.
pub trait IoDevice {
    fn on_clock_edge(&mut self, level: SignalState, pins: &Z80Pins);

    fn int(&self) -> SignalState {
        SignalState::RELEASED
    }

    fn nmi(&self) -> SignalState {
        SignalState::RELEASED
    }

    fn wait(&self) -> SignalState {
        SignalState::RELEASED
    }
}

/// Nothing attached. Port reads see the floating data bus.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDevice;

impl IoDevice for NoDevice {
    fn on_clock_edge(&mut self, _level: SignalState, _pins: &Z80Pins) {}
}

/// Two devices on the same buses. Their outputs are wire-ANDed.
impl<A: IoDevice, B: IoDevice> IoDevice for (A, B) {
    fn on_clock_edge(&mut self, level: SignalState, pins: &Z80Pins) {
        self.0.on_clock_edge(level, pins);
        self.1.on_clock_edge(level, pins);
    }

    fn int(&self) -> SignalState {
        self.0.int().wired_and(self.1.int())
    }

    fn nmi(&self) -> SignalState {
        self.0.nmi().wired_and(self.1.nmi())
    }

    fn wait(&self) -> SignalState {
        self.0.wait().wired_and(self.1.wait())
    }
}

// === Port latch ===

/// A bank of 256 byte registers addressed by the low byte of the port
/// address.
pub struct PortLatch {
    address: BusConnector<u16>,
    data: BusConnector<u8>,
    ports: RangeInclusive<u8>,
    registers: [u8; 256],
    writes: Vec<(u16, u8)>,
    driving: bool,
    writing: bool,
}

impl PortLatch {
    /// Answers every port.
    #[must_use]
    pub fn new(address: BusConnector<u16>, data: BusConnector<u8>) -> Self {
        Self {
            address,
            data,
            ports: 0..=0xFF,
            registers: [0; 256],
            writes: Vec::new(),
            driving: false,
            writing: false,
        }
    }

    /// Answer only ports in `ports`.
    #[must_use]
    pub fn with_ports(mut self, ports: RangeInclusive<u8>) -> Self {
        self.ports = ports;
        self
    }

    #[must_use]
    pub const fn get(&self, port: u8) -> u8 {
        self.registers[port as usize]
    }

    pub fn set(&mut self, port: u8, value: u8) {
        self.registers[port as usize] = value;
    }

    /// Port writes seen since the last [`take_writes`](Self::take_writes),
    /// with the full address the CPU drove. The log grows until drained.
    #[must_use]
    pub fn writes(&self) -> &[(u16, u8)] {
        &self.writes
    }

    /// Drain the write log.
    pub fn take_writes(&mut self) -> Vec<(u16, u8)> {
        std::mem::take(&mut self.writes)
    }

    fn selected(&self, pins: &Z80Pins) -> Option<(u16, u8)> {
        if !pins.io_request() {
            return None;
        }
        let address = self.address.read();
        let port = address as u8;
        self.ports.contains(&port).then_some((address, port))
    }
}

impl IoDevice for PortLatch {
    fn on_clock_edge(&mut self, _level: SignalState, pins: &Z80Pins) {
        let selected = self.selected(pins);

        match selected {
            Some((_, port)) if pins.rd.is_asserted() => {
                self.data.write(self.registers[port as usize]);
                self.driving = true;
            }
            _ if self.driving => {
                self.data.release();
                self.driving = false;
            }
            _ => {}
        }

        let writing = selected.is_some() && pins.wr.is_asserted();
        if writing && !self.writing {
            if let Some((address, port)) = selected {
                let value = self.data.read();
                self.registers[port as usize] = value;
                self.writes.push((address, value));
            }
        }
        self.writing = writing;
    }
}

// === Scripted interrupt source ===

/// One scripted assertion of an input pin.
///
/// `at` counts T-states from power-on: the first rising edge starts
/// T-state 0. The pin is asserted for `duration` T-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub pin: InputPin,
    pub at: u64,
    pub duration: u64,
}

impl Pulse {
    const fn covers(&self, t_state: u64) -> bool {
        t_state >= self.at && t_state < self.at.saturating_add(self.duration)
    }
}

#[derive(Debug, Clone, Copy)]
struct Scripted {
    pulse: Pulse,
    /// An INT pulse ends when the CPU acknowledges it.
    acknowledged: bool,
}

/// Drives INT, NMI and WAIT from a script and answers interrupt
/// acknowledges with a fixed byte sequence.
///
/// In mode 2 the first byte is the vector. In mode 0 the bytes form the
/// instruction: the first is taken during the acknowledge and the rest by
/// the reads that follow it.
pub struct InterruptSource {
    data: BusConnector<u8>,
    pulses: Vec<Scripted>,
    acknowledge_bytes: Vec<u8>,

    rising_edges: u64,
    acknowledging: bool,
    /// Next acknowledge byte to supply; zero when not supplying.
    cursor: usize,
    driving: bool,
    acknowledges: u32,

    int: SignalState,
    nmi: SignalState,
    wait: SignalState,
}

impl InterruptSource {
    /// The address bus is not decoded; the connector only fixes the wiring.
    #[must_use]
    pub fn new(_address: BusConnector<u16>, data: BusConnector<u8>) -> Self {
        Self {
            data,
            pulses: Vec::new(),
            acknowledge_bytes: vec![0xFF],
            rising_edges: 0,
            acknowledging: false,
            cursor: 0,
            driving: false,
            acknowledges: 0,
            int: SignalState::RELEASED,
            nmi: SignalState::RELEASED,
            wait: SignalState::RELEASED,
        }
    }

    /// Add a pulse. RESET and BUSREQ are host pins and are ignored here.
    #[must_use]
    pub fn pulse(mut self, pulse: Pulse) -> Self {
        self.pulses.push(Scripted {
            pulse,
            acknowledged: false,
        });
        self
    }

    #[must_use]
    pub fn nmi_pulse(self, at: u64, duration: u64) -> Self {
        self.pulse(Pulse {
            pin: InputPin::Nmi,
            at,
            duration,
        })
    }

    /// Assert INT from T-state `at` until the CPU acknowledges it.
    #[must_use]
    pub fn int_until_acknowledged(self, at: u64) -> Self {
        self.pulse(Pulse {
            pin: InputPin::Int,
            at,
            duration: u64::MAX,
        })
    }

    /// Bytes placed on the data bus during an acknowledge. The default is
    /// a single 0xFF, which is RST 38h in mode 0.
    #[must_use]
    pub fn acknowledge_bytes(mut self, bytes: impl Into<Vec<u8>>) -> Self {
        let bytes = bytes.into();
        if !bytes.is_empty() {
            self.acknowledge_bytes = bytes;
        }
        self
    }

    /// Interrupt acknowledges seen so far.
    #[must_use]
    pub const fn acknowledges(&self) -> u32 {
        self.acknowledges
    }

    fn level_of(&self, pin: InputPin, t_state: u64) -> SignalState {
        SignalState::active_low(self.pulses.iter().any(|scripted| {
            scripted.pulse.pin == pin && !scripted.acknowledged && scripted.pulse.covers(t_state)
        }))
    }

    fn drive(&mut self, byte: u8) {
        self.data.write(byte);
        self.driving = true;
    }

    fn stop_driving(&mut self) {
        if self.driving {
            self.data.release();
            self.driving = false;
        }
    }
}

impl IoDevice for InterruptSource {
    fn on_clock_edge(&mut self, level: SignalState, pins: &Z80Pins) {
        if level.is_high() {
            self.rising_edges += 1;
        }

        let acknowledge = pins.interrupt_acknowledge();
        let device_read =
            pins.rd.is_asserted() && !pins.mreq.is_asserted() && !pins.iorq.is_asserted();

        if acknowledge {
            if !self.acknowledging {
                self.acknowledges += 1;
                for scripted in &mut self.pulses {
                    if scripted.pulse.pin == InputPin::Int {
                        scripted.acknowledged = true;
                    }
                }
            }
            self.acknowledging = true;
            self.drive(self.acknowledge_bytes[0]);
        } else if self.acknowledging {
            self.acknowledging = false;
            self.cursor = 1;
            self.stop_driving();
        } else if self.cursor > 0 && device_read {
            match self.acknowledge_bytes.get(self.cursor) {
                Some(&byte) => self.drive(byte),
                None => self.cursor = 0,
            }
        } else if self.driving {
            self.cursor += 1;
            if self.cursor >= self.acknowledge_bytes.len() {
                self.cursor = 0;
            }
            self.stop_driving();
        } else if pins.m1.is_asserted() && pins.mreq.is_asserted() {
            // Back to fetching from memory.
            self.cursor = 0;
        }

        let t_state = self.rising_edges.saturating_sub(1);
        self.int = self.level_of(InputPin::Int, t_state);
        self.nmi = self.level_of(InputPin::Nmi, t_state);
        self.wait = self.level_of(InputPin::Wait, t_state);
    }

    fn int(&self) -> SignalState {
        self.int
    }

    fn nmi(&self) -> SignalState {
        self.nmi
    }

    fn wait(&self) -> SignalState {
        self.wait
    }
}

#[cfg(test)]
mod tests {
    use emu_core::Bus;

    use super::*;

    const ON: SignalState = SignalState::ASSERTED;

    fn buses() -> (BusConnector<u16>, BusConnector<u8>) {
        (
            BusConnector::new(&Bus::new(0xFFFF)),
            BusConnector::new(&Bus::new(0xFF)),
        )
    }

    fn port_pins(rd: bool, wr: bool) -> Z80Pins {
        Z80Pins {
            iorq: ON,
            rd: SignalState::active_low(rd),
            wr: SignalState::active_low(wr),
            ..Z80Pins::default()
        }
    }

    #[test]
    fn latch_stores_writes_once_per_strobe() {
        let (address, data) = buses();
        let mut latch = PortLatch::new(address.clone(), data.clone());
        address.write(0x12FE);
        data.write(0x07);
        let pins = port_pins(false, true);
        latch.on_clock_edge(SignalState::Low, &pins);
        latch.on_clock_edge(SignalState::High, &pins);
        latch.on_clock_edge(SignalState::Low, &Z80Pins::default());
        assert_eq!(latch.get(0xFE), 0x07);
        assert_eq!(latch.writes(), &[(0x12FE, 0x07)]);

        assert_eq!(latch.take_writes(), [(0x12FE, 0x07)]);
        assert!(latch.writes().is_empty());
        latch.on_clock_edge(SignalState::Low, &pins);
        assert_eq!(latch.take_writes(), [(0x12FE, 0x07)]);
    }

    #[test]
    fn latch_drives_reads_and_ignores_other_ports() {
        let (address, data) = buses();
        let mut latch = PortLatch::new(address.clone(), data.clone()).with_ports(0x10..=0x1F);
        latch.set(0x10, 0x55);
        latch.set(0x20, 0x66);

        address.write(0x0010);
        latch.on_clock_edge(SignalState::High, &port_pins(true, false));
        assert_eq!(data.read(), 0x55);
        latch.on_clock_edge(SignalState::Low, &Z80Pins::default());
        assert_eq!(data.read(), 0xFF);

        address.write(0x0020);
        latch.on_clock_edge(SignalState::High, &port_pins(true, false));
        assert_eq!(data.read(), 0xFF);
    }

    #[test]
    fn acknowledge_is_not_a_port_read() {
        let (address, data) = buses();
        let mut latch = PortLatch::new(address, data.clone());
        latch.set(0x00, 0x42);
        let pins = Z80Pins {
            m1: ON,
            iorq: ON,
            ..Z80Pins::default()
        };
        latch.on_clock_edge(SignalState::Low, &pins);
        assert_eq!(data.read(), 0xFF);
    }

    #[test]
    fn pulses_follow_the_t_state_count() {
        let (address, data) = buses();
        let mut source = InterruptSource::new(address, data).nmi_pulse(2, 2);
        let idle = Z80Pins::default();
        let mut seen = Vec::new();
        for _ in 0..5 {
            source.on_clock_edge(SignalState::High, &idle);
            seen.push(source.nmi().is_asserted());
            source.on_clock_edge(SignalState::Low, &idle);
        }
        assert_eq!(seen, [false, false, true, true, false]);
    }

    #[test]
    fn int_is_released_by_the_acknowledge() {
        let (address, data) = buses();
        let mut source = InterruptSource::new(address, data.clone())
            .int_until_acknowledged(0)
            .acknowledge_bytes([0x08]);
        source.on_clock_edge(SignalState::High, &Z80Pins::default());
        assert!(source.int().is_asserted());

        let acknowledge = Z80Pins {
            m1: ON,
            iorq: ON,
            ..Z80Pins::default()
        };
        source.on_clock_edge(SignalState::Low, &acknowledge);
        assert_eq!(data.read(), 0x08);
        assert!(!source.int().is_asserted());
        assert_eq!(source.acknowledges(), 1);

        source.on_clock_edge(SignalState::High, &Z80Pins::default());
        assert_eq!(data.read(), 0xFF);
    }

    #[test]
    fn mode_zero_bytes_follow_the_acknowledge() {
        let (address, data) = buses();
        let mut source = InterruptSource::new(address, data.clone())
            .acknowledge_bytes([0xCD, 0x34, 0x12]);
        let acknowledge = Z80Pins {
            m1: ON,
            iorq: ON,
            ..Z80Pins::default()
        };
        let device_read = Z80Pins {
            rd: ON,
            ..Z80Pins::default()
        };
        let idle = Z80Pins::default();

        source.on_clock_edge(SignalState::Low, &acknowledge);
        assert_eq!(data.read(), 0xCD);
        source.on_clock_edge(SignalState::High, &idle);

        source.on_clock_edge(SignalState::Low, &device_read);
        assert_eq!(data.read(), 0x34);
        source.on_clock_edge(SignalState::High, &idle);

        source.on_clock_edge(SignalState::Low, &device_read);
        assert_eq!(data.read(), 0x12);
        source.on_clock_edge(SignalState::High, &idle);
        assert_eq!(data.read(), 0xFF);
    }

    #[test]
    fn pair_wire_ands_outputs() {
        let (address, data) = buses();
        let mut pair = (
            NoDevice,
            InterruptSource::new(address, data).nmi_pulse(0, 1),
        );
        pair.on_clock_edge(SignalState::High, &Z80Pins::default());
        assert!(pair.nmi().is_asserted());
        assert!(!pair.int().is_asserted());
    }
}
