//! Lifecycle events and the observer list.

use bitflags::bitflags;
use tracing::debug;

use crate::decode::{InstructionCode, InternalOp, MachineCycleType};
use crate::exit::{ExitCondition, ExitConditionId, StopReason};

/// Points in the engine's progress that observers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LifecycleEvent {
    /// After every clock edge.
    HalfTState,
    CycleStart,
    CycleEnd,
    InstructionStart,
    InstructionEnd,
}

impl LifecycleEvent {
    #[must_use]
    pub const fn kind(self) -> EventKinds {
        match self {
            Self::HalfTState => EventKinds::HALF_T_STATE,
            Self::CycleStart => EventKinds::CYCLE_START,
            Self::CycleEnd => EventKinds::CYCLE_END,
            Self::InstructionStart => EventKinds::INSTRUCTION_START,
            Self::InstructionEnd => EventKinds::INSTRUCTION_END,
        }
    }
}

bitflags! {
    /// A set of [`LifecycleEvent`] kinds.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EventKinds: u8 {
        const HALF_T_STATE = 1 << 0;
        const CYCLE_START = 1 << 1;
        const CYCLE_END = 1 << 2;
        const INSTRUCTION_START = 1 << 3;
        const INSTRUCTION_END = 1 << 4;
    }
}

/// Where the current instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum InstructionOrigin {
    /// Fetched from memory starting at `address`.
    Memory { address: u16 },
    /// Synthesised by the CPU.
    Internal(InternalOp),
    /// Supplied on the data bus by an interrupting device (mode 0).
    Device,
    /// No instruction yet: power-on, reset or the bus is released.
    None,
}

/// Opcode bytes of the current instruction, prefixes included.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpcodeBytes {
    bytes: [u8; 4],
    len: u8,
}

impl OpcodeBytes {
    pub(crate) fn push(&mut self, byte: u8) {
        if let Some(slot) = self.bytes.get_mut(self.len as usize) {
            *slot = byte;
            self.len += 1;
        }
    }

    pub(crate) fn clear(&mut self) {
        self.len = 0;
    }

    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

/// Read-only snapshot handed to observers and exit conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InternalState {
    /// Instructions completed since power-on.
    pub instruction_counter: u64,
    pub origin: InstructionOrigin,
    pub opcode: OpcodeBytes,
    /// `None` until the opcode is decoded.
    pub instruction: Option<&'static InstructionCode>,
    /// Position of the current cycle in the instruction's template.
    pub cycle_index: u8,
    pub cycle_type: Option<MachineCycleType>,
    /// T-states spent in the current cycle so far, waits included.
    pub cycle_t_states: u8,
    /// Half-T-state index within the cycle of the last edge.
    pub half_t_state: u8,
    /// Wait T-states inserted into the current cycle.
    pub wait_states: u8,
    pub t_states: u64,
    pub half_t_states: u64,
    pub halted: bool,
    pub bus_released: bool,
    pub in_reset: bool,
}

impl InternalState {
    /// Address of the current instruction if it came from memory.
    #[must_use]
    pub const fn address(&self) -> Option<u16> {
        match self.origin {
            InstructionOrigin::Memory { address } => Some(address),
            _ => None,
        }
    }
}

/// Observer callback.
pub type Observer = Box<dyn FnMut(&InternalState, LifecycleEvent)>;

/// Identifier returned when registering an observer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

/// Observers and exit conditions owned by one CPU.
///
/// Both lists are consulted in registration order, and only for event
/// kinds somebody subscribed to.
#[derive(Default)]
pub struct EventHooks {
    observers: Vec<(ObserverId, EventKinds, Observer)>,
    conditions: Vec<(ExitConditionId, Box<dyn ExitCondition>)>,
    observed: EventKinds,
    watched: EventKinds,
    tripped: Option<StopReason>,
    next_id: u64,
}

impl EventHooks {
    /// Someone listens for this event.
    #[inline]
    #[must_use]
    pub fn wants(&self, event: LifecycleEvent) -> bool {
        self.observed.union(self.watched).contains(event.kind())
    }

    pub fn observe(&mut self, kinds: EventKinds, observer: Observer) -> ObserverId {
        let id = ObserverId(self.bump());
        self.observers.push((id, kinds, observer));
        self.observed |= kinds;
        id
    }

    pub fn remove_observer(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(other, _, _)| *other != id);
        self.observed = self
            .observers
            .iter()
            .fold(EventKinds::empty(), |acc, (_, kinds, _)| acc | *kinds);
        self.observers.len() != before
    }

    pub fn add_exit_condition(&mut self, condition: Box<dyn ExitCondition>) -> ExitConditionId {
        let id = ExitConditionId::new(self.bump());
        self.watched |= condition.events();
        self.conditions.push((id, condition));
        id
    }

    pub fn remove_exit_condition(&mut self, id: ExitConditionId) -> bool {
        let before = self.conditions.len();
        self.conditions.retain(|(other, _)| *other != id);
        self.watched = self
            .conditions
            .iter()
            .fold(EventKinds::empty(), |acc, (_, c)| acc | c.events());
        self.conditions.len() != before
    }

    #[must_use]
    pub fn exit_condition_count(&self) -> usize {
        self.conditions.len()
    }

    /// Deliver an event to observers, then test exit conditions. The first
    /// condition to trip is kept until [`take_stop`](Self::take_stop).
    pub fn dispatch(&mut self, state: &InternalState, event: LifecycleEvent) {
        let kind = event.kind();
        if self.observed.contains(kind) {
            for (_, kinds, observer) in &mut self.observers {
                if kinds.contains(kind) {
                    observer(state, event);
                }
            }
        }
        if self.tripped.is_none() && self.watched.contains(kind) {
            let hit = self
                .conditions
                .iter()
                .find(|(_, c)| c.events().contains(kind) && c.is_met(state, event));
            if let Some((id, condition)) = hit {
                debug!(
                    condition = ?id,
                    ?event,
                    t_states = state.t_states,
                    "exit condition met: {}",
                    condition.describe()
                );
                self.tripped = Some(StopReason {
                    condition: *id,
                    event,
                    state: *state,
                });
            }
        }
    }

    /// A condition tripped and has not been collected yet.
    #[must_use]
    pub const fn is_stopping(&self) -> bool {
        self.tripped.is_some()
    }

    pub fn take_stop(&mut self) -> Option<StopReason> {
        self.tripped.take()
    }

    fn bump(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::exit::InstructionCountReached;

    fn state(instructions: u64) -> InternalState {
        InternalState {
            instruction_counter: instructions,
            origin: InstructionOrigin::None,
            opcode: OpcodeBytes::default(),
            instruction: None,
            cycle_index: 0,
            cycle_type: None,
            cycle_t_states: 0,
            half_t_state: 0,
            wait_states: 0,
            t_states: 0,
            half_t_states: 0,
            halted: false,
            bus_released: false,
            in_reset: false,
        }
    }

    #[test]
    fn observers_only_see_subscribed_kinds() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let mut hooks = EventHooks::default();
        hooks.observe(
            EventKinds::CYCLE_END,
            Box::new(move |_, event| sink.borrow_mut().push(event)),
        );
        assert!(!hooks.wants(LifecycleEvent::HalfTState));
        hooks.dispatch(&state(0), LifecycleEvent::CycleStart);
        hooks.dispatch(&state(0), LifecycleEvent::CycleEnd);
        assert_eq!(*seen.borrow(), vec![LifecycleEvent::CycleEnd]);
    }

    #[test]
    fn first_trip_is_kept() {
        let mut hooks = EventHooks::default();
        let first = hooks.add_exit_condition(Box::new(InstructionCountReached(1)));
        let _second = hooks.add_exit_condition(Box::new(InstructionCountReached(2)));
        hooks.dispatch(&state(1), LifecycleEvent::InstructionEnd);
        hooks.dispatch(&state(2), LifecycleEvent::InstructionEnd);
        let stop = hooks.take_stop().expect("tripped");
        assert_eq!(stop.condition, first);
        assert!(hooks.take_stop().is_none());
    }

    #[test]
    fn removing_a_condition_unsubscribes_its_kinds() {
        let mut hooks = EventHooks::default();
        let id = hooks.add_exit_condition(Box::new(InstructionCountReached(1)));
        assert!(hooks.wants(LifecycleEvent::InstructionEnd));
        assert!(hooks.remove_exit_condition(id));
        assert!(!hooks.wants(LifecycleEvent::InstructionEnd));
        assert!(!hooks.remove_exit_condition(id));
    }
}
