//! Stop predicates for the drive loop.

use std::fmt;

use crate::events::{EventKinds, InternalState, LifecycleEvent};

/// A predicate the drive loop checks on the events it subscribes to.
pub trait ExitCondition {
    fn events(&self) -> EventKinds;

    fn is_met(&self, state: &InternalState, event: LifecycleEvent) -> bool;

    /// Short text for logs.
    fn describe(&self) -> String {
        "custom condition".to_owned()
    }
}

/// Handle for a registered exit condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExitConditionId(u64);

impl ExitConditionId {
    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ExitConditionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Why the drive loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopReason {
    pub condition: ExitConditionId,
    pub event: LifecycleEvent,
    /// State at the event that tripped the condition.
    pub state: InternalState,
}

/// An instruction fetched from `address` is about to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressReached(pub u16);

impl ExitCondition for AddressReached {
    fn events(&self) -> EventKinds {
        EventKinds::INSTRUCTION_START
    }

    fn is_met(&self, state: &InternalState, _event: LifecycleEvent) -> bool {
        state.address() == Some(self.0)
    }

    fn describe(&self) -> String {
        format!("address {:04X}", self.0)
    }
}

/// The instruction counter reached an absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionCountReached(pub u64);

impl ExitCondition for InstructionCountReached {
    fn events(&self) -> EventKinds {
        EventKinds::INSTRUCTION_END
    }

    fn is_met(&self, state: &InternalState, _event: LifecycleEvent) -> bool {
        state.instruction_counter >= self.0
    }

    fn describe(&self) -> String {
        format!("{} instructions", self.0)
    }
}

/// The T-state counter reached an absolute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TStatesElapsed(pub u64);

impl ExitCondition for TStatesElapsed {
    fn events(&self) -> EventKinds {
        EventKinds::HALF_T_STATE
    }

    fn is_met(&self, state: &InternalState, _event: LifecycleEvent) -> bool {
        state.half_t_states >= self.0.saturating_mul(2)
    }

    fn describe(&self) -> String {
        format!("{}T", self.0)
    }
}

/// The CPU entered HALT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Halted;

impl ExitCondition for Halted {
    fn events(&self) -> EventKinds {
        EventKinds::INSTRUCTION_START
    }

    fn is_met(&self, state: &InternalState, _event: LifecycleEvent) -> bool {
        state.halted
    }

    fn describe(&self) -> String {
        "halted".to_owned()
    }
}

/// Any closure over the state.
pub struct Predicate<F> {
    events: EventKinds,
    predicate: F,
}

impl<F> Predicate<F>
where
    F: Fn(&InternalState, LifecycleEvent) -> bool,
{
    pub const fn new(events: EventKinds, predicate: F) -> Self {
        Self { events, predicate }
    }
}

impl<F> ExitCondition for Predicate<F>
where
    F: Fn(&InternalState, LifecycleEvent) -> bool,
{
    fn events(&self) -> EventKinds {
        self.events
    }

    fn is_met(&self, state: &InternalState, event: LifecycleEvent) -> bool {
        (self.predicate)(state, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{InstructionOrigin, OpcodeBytes};

    fn at(address: u16, half_t_states: u64) -> InternalState {
        InternalState {
            instruction_counter: 0,
            origin: InstructionOrigin::Memory { address },
            opcode: OpcodeBytes::default(),
            instruction: None,
            cycle_index: 0,
            cycle_type: None,
            cycle_t_states: 0,
            half_t_state: 0,
            wait_states: 0,
            t_states: half_t_states / 2,
            half_t_states,
            halted: false,
            bus_released: false,
            in_reset: false,
        }
    }

    #[test]
    fn address_matches_memory_origin_only() {
        let cond = AddressReached(0x0066);
        assert!(cond.is_met(&at(0x0066, 0), LifecycleEvent::InstructionStart));
        assert!(!cond.is_met(&at(0x0067, 0), LifecycleEvent::InstructionStart));
    }

    #[test]
    fn t_states_trip_on_the_completing_edge() {
        let cond = TStatesElapsed(3);
        assert!(!cond.is_met(&at(0, 5), LifecycleEvent::HalfTState));
        assert!(cond.is_met(&at(0, 6), LifecycleEvent::HalfTState));
    }

    #[test]
    fn predicate_wraps_a_closure() {
        let cond = Predicate::new(EventKinds::CYCLE_END, |s: &InternalState, _| s.t_states > 10);
        assert_eq!(cond.events(), EventKinds::CYCLE_END);
        assert!(cond.is_met(&at(0, 22), LifecycleEvent::CycleEnd));
    }
}
