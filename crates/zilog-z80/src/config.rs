//! Board configuration.

use thiserror::Error;

/// Z80 clock of most 1980s home computers.
pub const DEFAULT_FREQUENCY_HZ: u64 = 3_500_000;
/// The full 16-bit address space.
pub const DEFAULT_MEMORY_SIZE: usize = 0x1_0000;
/// Most wait states a memory may insert per access.
pub const MAX_WAIT_STATES: u8 = 16;

/// A read-only window of memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RomRange {
    pub start: u16,
    pub len: usize,
}

impl RomRange {
    #[must_use]
    pub const fn new(start: u16, len: usize) -> Self {
        Self { start, len }
    }

    #[must_use]
    pub const fn contains(&self, address: usize) -> bool {
        address >= self.start as usize && address < self.start as usize + self.len
    }
}

/// What to build a [`Z80System`](crate::Z80System) from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SystemConfig {
    /// Nominal clock, used only to convert ticks into time.
    pub frequency_hz: u64,
    /// Bytes of memory. A power of two; smaller sizes mirror through the
    /// address space.
    pub memory_size: usize,
    pub rom: Option<RomRange>,
    /// Wait states the memory inserts into every access.
    pub wait_states: u8,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            frequency_hz: DEFAULT_FREQUENCY_HZ,
            memory_size: DEFAULT_MEMORY_SIZE,
            rom: None,
            wait_states: 0,
        }
    }
}

impl SystemConfig {
    #[must_use]
    pub const fn with_frequency(mut self, hz: u64) -> Self {
        self.frequency_hz = hz;
        self
    }

    #[must_use]
    pub const fn with_memory_size(mut self, bytes: usize) -> Self {
        self.memory_size = bytes;
        self
    }

    #[must_use]
    pub const fn with_rom(mut self, start: u16, len: usize) -> Self {
        self.rom = Some(RomRange::new(start, len));
        self
    }

    #[must_use]
    pub const fn with_wait_states(mut self, wait_states: u8) -> Self {
        self.wait_states = wait_states;
        self
    }

    /// Address lines the memory decodes.
    #[must_use]
    pub const fn address_lines(&self) -> u32 {
        self.memory_size.trailing_zeros()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frequency_hz == 0 {
            return Err(ConfigError::ZeroFrequency);
        }
        if !self.memory_size.is_power_of_two()
            || !(0x400..=DEFAULT_MEMORY_SIZE).contains(&self.memory_size)
        {
            return Err(ConfigError::MemorySize(self.memory_size));
        }
        if let Some(rom) = self.rom {
            if rom.len == 0 || rom.start as usize + rom.len > self.memory_size {
                return Err(ConfigError::RomOutsideMemory {
                    start: rom.start,
                    len: rom.len,
                    memory_size: self.memory_size,
                });
            }
        }
        if self.wait_states > MAX_WAIT_STATES {
            return Err(ConfigError::TooManyWaitStates(self.wait_states));
        }
        Ok(())
    }
}

/// A [`SystemConfig`] that cannot be built.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("clock frequency must be non-zero")]
    ZeroFrequency,
    #[error("memory size {0:#x} is not a power of two between 1 KiB and 64 KiB")]
    MemorySize(usize),
    #[error("ROM at {start:#06x} ({len} bytes) does not fit in {memory_size:#x} bytes of memory")]
    RomOutsideMemory {
        start: u16,
        len: usize,
        memory_size: usize,
    },
    #[error("{0} wait states exceeds the maximum of {max}", max = MAX_WAIT_STATES)]
    TooManyWaitStates(u8),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let config = SystemConfig::default();
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.frequency_hz, 3_500_000);
        assert_eq!(config.address_lines(), 16);
    }

    #[test]
    fn rejects_odd_memory_sizes() {
        let config = SystemConfig::default().with_memory_size(3000);
        assert_eq!(config.validate(), Err(ConfigError::MemorySize(3000)));
        let config = SystemConfig::default().with_memory_size(0x200);
        assert!(config.validate().is_err());
    }

    #[test]
    fn rom_must_fit() {
        let config = SystemConfig::default()
            .with_memory_size(0x4000)
            .with_rom(0x2000, 0x4000);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::RomOutsideMemory { start: 0x2000, .. })
        ));
        let config = SystemConfig::default().with_rom(0, 0x4000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn frequency_must_be_nonzero() {
        let config = SystemConfig::default().with_frequency(0);
        assert_eq!(config.validate(), Err(ConfigError::ZeroFrequency));
        let config = SystemConfig::default().with_frequency(4_000_000);
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn wait_states_are_bounded() {
        let config = SystemConfig::default().with_wait_states(17);
        assert_eq!(config.validate(), Err(ConfigError::TooManyWaitStates(17)));
    }

    #[test]
    fn errors_render() {
        let text = ConfigError::MemorySize(3000).to_string();
        assert!(text.contains("0xbb8"), "{text}");
    }
}
