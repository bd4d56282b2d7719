//! The board clock.
//!
//! The clock owns the board wiring and flips level every half-period.
//! Each flip is one half-tick; a tick is a full LOW to HIGH to LOW
//! period. The wiring decides which components see each edge and in what
//! order, and reports through [`ControlFlow`] when stepping must stop.

use core::ops::ControlFlow;

use crate::{SignalState, Ticks};

/// Static fan-out from the clock to the components on a board.
pub trait ClockWiring {
    /// Why stepping stopped.
    type Stop;

    /// Deliver one clock edge. `level` is the level after the flip, so
    /// `High` is a rising edge.
    fn on_clock_edge(&mut self, level: SignalState) -> ControlFlow<Self::Stop>;
}

/// Half-period clock driving a board.
#[derive(Debug)]
pub struct Clock<W> {
    level: SignalState,
    half_ticks: u64,
    frequency_hz: u64,
    wiring: W,
}

impl<W: ClockWiring> Clock<W> {
    /// Create a clock at rest (LOW) driving `wiring`.
    #[must_use]
    pub const fn new(wiring: W, frequency_hz: u64) -> Self {
        Self {
            level: SignalState::Low,
            half_ticks: 0,
            frequency_hz,
            wiring,
        }
    }

    /// Flip the level once and notify the wiring.
    pub fn half_tick(&mut self) -> ControlFlow<W::Stop> {
        self.level = !self.level;
        self.half_ticks += 1;
        self.wiring.on_clock_edge(self.level)
    }

    /// Run to the end of the current period.
    ///
    /// From rest this is a rising then a falling edge. If a previous stop
    /// left the clock HIGH, only the falling edge remains.
    pub fn tick(&mut self) -> ControlFlow<W::Stop> {
        if self.level.is_low() {
            self.half_tick()?;
        }
        self.half_tick()
    }

    /// Tick until the wiring reports a stop.
    pub fn tick_until_exit_condition(&mut self) -> W::Stop {
        loop {
            if let ControlFlow::Break(stop) = self.tick() {
                return stop;
            }
        }
    }

    /// Current clock level.
    #[must_use]
    pub const fn level(&self) -> SignalState {
        self.level
    }

    /// Edges delivered since construction.
    #[must_use]
    pub const fn half_ticks(&self) -> u64 {
        self.half_ticks
    }

    /// Rising edges delivered since construction.
    #[must_use]
    pub const fn ticks(&self) -> Ticks {
        Ticks::new(self.half_ticks.div_ceil(2))
    }

    #[must_use]
    pub const fn frequency_hz(&self) -> u64 {
        self.frequency_hz
    }

    /// Emulated time elapsed, in nanoseconds.
    #[must_use]
    pub const fn elapsed_nanos(&self) -> u128 {
        if self.frequency_hz == 0 {
            0
        } else {
            self.ticks().get() as u128 * 1_000_000_000 / self.frequency_hz as u128
        }
    }

    #[must_use]
    pub const fn wiring(&self) -> &W {
        &self.wiring
    }

    pub const fn wiring_mut(&mut self) -> &mut W {
        &mut self.wiring
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records edges and stops after a fixed number of them.
    struct Recorder {
        edges: Vec<SignalState>,
        stop_after: usize,
    }

    impl ClockWiring for Recorder {
        type Stop = usize;

        fn on_clock_edge(&mut self, level: SignalState) -> ControlFlow<usize> {
            self.edges.push(level);
            if self.edges.len() == self.stop_after {
                ControlFlow::Break(self.edges.len())
            } else {
                ControlFlow::Continue(())
            }
        }
    }

    fn recorder(stop_after: usize) -> Clock<Recorder> {
        Clock::new(
            Recorder {
                edges: Vec::new(),
                stop_after,
            },
            3_500_000,
        )
    }

    #[test]
    fn tick_is_rising_then_falling() {
        let mut clock = recorder(usize::MAX);
        assert!(clock.tick().is_continue());
        assert_eq!(
            clock.wiring().edges,
            vec![SignalState::High, SignalState::Low]
        );
        assert_eq!(clock.level(), SignalState::Low);
        assert_eq!(clock.ticks(), Ticks::new(1));
    }

    #[test]
    fn stop_on_rising_edge_leaves_clock_high() {
        let mut clock = recorder(3);
        assert!(clock.tick().is_continue());
        assert_eq!(clock.tick(), ControlFlow::Break(3));
        assert_eq!(clock.level(), SignalState::High);

        // The next tick only finishes the interrupted period.
        assert!(clock.tick().is_continue());
        assert_eq!(clock.half_ticks(), 4);
        assert_eq!(clock.level(), SignalState::Low);
    }

    #[test]
    fn tick_until_exit_condition_returns_stop() {
        let mut clock = recorder(10);
        assert_eq!(clock.tick_until_exit_condition(), 10);
        assert_eq!(clock.ticks(), Ticks::new(5));
    }

    #[test]
    fn elapsed_time_follows_frequency() {
        let mut clock = Clock::new(
            Recorder {
                edges: Vec::new(),
                stop_after: usize::MAX,
            },
            1_000_000,
        );
        for _ in 0..4 {
            let _ = clock.tick();
        }
        assert_eq!(clock.elapsed_nanos(), 4_000);
    }
}
