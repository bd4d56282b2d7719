//! Program images handed to the loader.

use std::collections::BTreeMap;

use thiserror::Error;

/// A flat byte image, its load address and an optional map from source
/// lines to addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgramImage {
    load_address: u16,
    bytes: Vec<u8>,
    lines: BTreeMap<u32, u16>,
}

impl ProgramImage {
    #[must_use]
    pub fn new(load_address: u16, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            load_address,
            bytes: bytes.into(),
            lines: BTreeMap::new(),
        }
    }

    /// Record that source `line` assembled to `address`.
    #[must_use]
    pub fn with_line(mut self, line: u32, address: u16) -> Self {
        self.lines.insert(line, address);
        self
    }

    #[must_use]
    pub const fn load_address(&self) -> u16 {
        self.load_address
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// One past the last byte, which may be 0x10000.
    #[must_use]
    pub fn end(&self) -> usize {
        self.load_address as usize + self.bytes.len()
    }

    pub fn address_of_line(&self, line: u32) -> Result<u16, LoadError> {
        self.lines
            .get(&line)
            .copied()
            .ok_or(LoadError::UnknownLine(line))
    }

    pub fn lines(&self) -> impl Iterator<Item = (u32, u16)> + '_ {
        self.lines.iter().map(|(&line, &address)| (line, address))
    }

    /// Check the image against a memory of `memory_size` bytes.
    pub fn check(&self, memory_size: usize) -> Result<(), LoadError> {
        if self.bytes.is_empty() {
            return Err(LoadError::Empty);
        }
        if self.end() > memory_size {
            return Err(LoadError::DoesNotFit {
                load_address: self.load_address,
                len: self.bytes.len(),
                memory_size,
            });
        }
        let span = self.load_address as usize..self.end();
        if let Some((&line, &address)) = self
            .lines
            .iter()
            .find(|&(_, &address)| !span.contains(&(address as usize)))
        {
            return Err(LoadError::LineOutsideImage { line, address });
        }
        Ok(())
    }
}

/// A program that cannot be loaded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("program image is empty")]
    Empty,
    #[error("{len} bytes at {load_address:#06x} do not fit in {memory_size:#x} bytes of memory")]
    DoesNotFit {
        load_address: u16,
        len: usize,
        memory_size: usize,
    },
    #[error("line {line} maps to {address:#06x}, outside the image")]
    LineOutsideImage { line: u32, address: u16 },
    #[error("no address recorded for line {0}")]
    UnknownLine(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_may_end_at_the_top_of_memory() {
        let image = ProgramImage::new(0xFFFE, [0x00, 0x76]);
        assert_eq!(image.end(), 0x1_0000);
        assert_eq!(image.check(0x1_0000), Ok(()));
    }

    #[test]
    fn oversized_image_is_rejected() {
        let image = ProgramImage::new(0x3FFF, [0x00, 0x00]);
        assert_eq!(
            image.check(0x4000),
            Err(LoadError::DoesNotFit {
                load_address: 0x3FFF,
                len: 2,
                memory_size: 0x4000
            })
        );
    }

    #[test]
    fn empty_image_is_rejected() {
        assert_eq!(ProgramImage::new(0, Vec::new()).check(0x1_0000), Err(LoadError::Empty));
    }

    #[test]
    fn line_map() {
        let image = ProgramImage::new(0x8000, [0x3E, 0x01, 0x76])
            .with_line(10, 0x8000)
            .with_line(11, 0x8002);
        assert_eq!(image.address_of_line(11), Ok(0x8002));
        assert_eq!(image.address_of_line(12), Err(LoadError::UnknownLine(12)));
        assert_eq!(image.lines().count(), 2);
        assert_eq!(image.check(0x1_0000), Ok(()));

        let stray = image.with_line(99, 0x9000);
        assert_eq!(
            stray.check(0x1_0000),
            Err(LoadError::LineOutsideImage {
                line: 99,
                address: 0x9000
            })
        );
    }
}
