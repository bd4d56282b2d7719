//! Shared multi-bit buses and the connectors components hold on them.
//!
//! A bus is a single wire bundle with one current value. Every component
//! that drives or samples it holds a [`BusConnector`]; connectors are the
//! only way to reach a bus, so a component can never be left unwired.

use core::cell::Cell;
use core::fmt::Debug;
use core::ops::BitAnd;
use std::rc::Rc;

/// Integer types that can travel on a bus.
pub trait BusValue: Copy + Eq + Debug + BitAnd<Output = Self> {
    /// Number of lines in a full-width bus of this type.
    const WIDTH: u32;

    /// Mask keeping the low `width` lines.
    fn low_lines(width: u32) -> Self;
}

impl BusValue for u8 {
    const WIDTH: u32 = 8;

    fn low_lines(width: u32) -> Self {
        if width >= Self::WIDTH {
            Self::MAX
        } else {
            (1u8 << width) - 1
        }
    }
}

impl BusValue for u16 {
    const WIDTH: u32 = 16;

    fn low_lines(width: u32) -> Self {
        if width >= Self::WIDTH {
            Self::MAX
        } else {
            (1u16 << width) - 1
        }
    }
}

/// A bundle of lines carrying one value.
///
/// When nobody drives the bus it floats to the value given at
/// construction (pulled-up lines read as all ones on most boards).
#[derive(Debug)]
pub struct Bus<T: BusValue> {
    value: Cell<T>,
    floating: T,
}

/// 16-line address bus.
pub type AddressBus = Bus<u16>;
/// 8-line data bus.
pub type DataBus = Bus<u8>;

impl<T: BusValue> Bus<T> {
    /// Create a bus that floats to `floating` when released.
    #[must_use]
    pub fn new(floating: T) -> Rc<Self> {
        Rc::new(Self {
            value: Cell::new(floating),
            floating,
        })
    }

    /// Current value on the lines.
    #[must_use]
    pub fn value(&self) -> T {
        self.value.get()
    }

    /// Overwrite the value on the lines. The last writer wins.
    pub fn set_value(&self, value: T) {
        self.value.set(value);
    }

    /// Let the lines float back to their default.
    pub fn release_value(&self) {
        self.value.set(self.floating);
    }
}

/// One component's attachment to a bus.
///
/// A connector may see fewer lines than the bus carries (partial address
/// decoding); reads through such a connector are masked to its width.
#[derive(Debug, Clone)]
pub struct BusConnector<T: BusValue> {
    bus: Rc<Bus<T>>,
    mask: T,
}

impl<T: BusValue> BusConnector<T> {
    /// Attach to every line of `bus`.
    #[must_use]
    pub fn new(bus: &Rc<Bus<T>>) -> Self {
        Self::truncated(bus, T::WIDTH)
    }

    /// Attach to the low `width` lines of `bus` only.
    #[must_use]
    pub fn truncated(bus: &Rc<Bus<T>>, width: u32) -> Self {
        Self {
            bus: Rc::clone(bus),
            mask: T::low_lines(width),
        }
    }

    /// Sample the bus through this connector's lines.
    #[must_use]
    pub fn read(&self) -> T {
        self.bus.value.get() & self.mask
    }

    /// Drive `value` onto the bus.
    pub fn write(&self, value: T) {
        self.bus.set_value(value);
    }

    /// Stop driving; the bus returns to its floating value.
    pub fn release(&self) {
        self.bus.release_value();
    }

    /// Mask applied to reads.
    #[must_use]
    pub fn mask(&self) -> T {
        self.mask
    }

    /// True if `other` is attached to the same bus.
    #[must_use]
    pub fn shares_bus_with(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.bus, &other.bus)
    }
}
