//! State registry - the static catalog of the console's states
//!
//! Each state descriptor carries its numeric id, the master's hardware value
//! slots and events, and the tablet's local values and events. The registry
//! is assembled from literals at compile time and never changes.

mod states;
mod types;

pub use states::{ArmEvent, MasterEvent, MasterValue, MotionMachineEvent, StateId, TabletEvent};
pub use types::{DataType, HardwareValue, LocalEvent, LocalValue, TypedValue, ValueError};

/// Build identifier reported by firmware generated from this table
pub const BUILD_ID: u32 = 0x1946_5309;

/// A named tablet-side value slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamedLocalValue {
    pub name: &'static str,
    pub value: LocalValue,
}

/// Values and events handled by the master board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MasterSide {
    pub values: &'static [MasterValue],
    pub events: &'static [MasterEvent],
}

/// Values and events handled by the tablet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TabletSide {
    pub values: &'static [NamedLocalValue],
    pub events: &'static [TabletEvent],
}

/// One operating mode of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateDescriptor {
    pub state: StateId,
    pub master: MasterSide,
    pub tablet: TabletSide,
}

impl StateDescriptor {
    const fn for_state(state: StateId) -> Self {
        Self {
            state,
            master: MasterSide {
                values: MasterValue::for_state(state),
                events: MasterEvent::for_state(state),
            },
            tablet: TabletSide {
                values: &[],
                events: TabletEvent::for_state(state),
            },
        }
    }

    pub const fn id(&self) -> u8 {
        self.state.id()
    }

    pub const fn name(&self) -> &'static str {
        self.state.name()
    }

    pub fn master_value(&self, name: &str) -> Option<MasterValue> {
        self.master.values.iter().copied().find(|v| v.name() == name)
    }

    pub fn master_event(&self, name: &str) -> Option<MasterEvent> {
        self.master.events.iter().copied().find(|e| e.name() == name)
    }

    /// Resolve the name and type of a value reported by the master
    ///
    /// Tablet values are searched first, then the master's own slots, both
    /// addressed by their position in the state's list.
    pub fn reported_value(&self, index: u8) -> Option<(&'static str, DataType)> {
        let index = usize::from(index);
        if let Some(local) = self.tablet.values.get(index) {
            return Some((local.name, local.value.data_type()));
        }
        self.master
            .values
            .get(index)
            .map(|value| (value.name(), value.data_type()))
    }
}

pub const IDLE: StateDescriptor = StateDescriptor::for_state(StateId::Idle);
pub const MOTIONMACHINE: StateDescriptor = StateDescriptor::for_state(StateId::MotionMachine);
pub const ARM: StateDescriptor = StateDescriptor::for_state(StateId::Arm);

/// Every state, ordered so that position equals id
pub const STATES: [StateDescriptor; 3] = [IDLE, MOTIONMACHINE, ARM];

/// Handle to the ordered state list handed to the manager
#[derive(Debug, Clone, Copy)]
pub struct StateRegistry {
    states: &'static [StateDescriptor],
}

impl StateRegistry {
    /// The registry for this console
    pub const fn standard() -> Self {
        Self { states: &STATES }
    }

    pub fn states(&self) -> &'static [StateDescriptor] {
        self.states
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn by_id(&self, id: u8) -> Option<&'static StateDescriptor> {
        self.states.get(usize::from(id))
    }

    pub fn by_name(&self, name: &str) -> Option<&'static StateDescriptor> {
        self.states.iter().find(|desc| desc.name() == name)
    }

    pub fn get(&self, state: StateId) -> &'static StateDescriptor {
        &self.states[usize::from(state.id())]
    }

    /// The `STATES` mapping: symbolic name to descriptor, in id order
    pub fn named(&self) -> impl Iterator<Item = (&'static str, &'static StateDescriptor)> {
        self.states.iter().map(|desc| (desc.name(), desc))
    }
}

impl Default for StateRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_ids_match_list_position() {
        let registry = StateRegistry::standard();
        for (position, desc) in registry.states().iter().enumerate() {
            assert_eq!(usize::from(desc.id()), position);
        }
        assert_eq!(IDLE.id(), 0);
        assert_eq!(MOTIONMACHINE.id(), 1);
        assert_eq!(ARM.id(), 2);
    }

    #[test]
    fn test_named_mapping_keys() {
        let registry = StateRegistry::standard();
        let keys: BTreeSet<_> = registry.named().map(|(name, _)| name).collect();
        let expected: BTreeSet<_> = ["IDLE", "MOTIONMACHINE", "ARM"].into_iter().collect();
        assert_eq!(keys, expected);

        for (name, desc) in registry.named() {
            assert_eq!(StateId::from_name(name).map(StateId::id), Some(desc.id()));
        }
    }

    #[test]
    fn test_lookup() {
        let registry = StateRegistry::standard();
        assert_eq!(registry.by_name("ARM"), Some(&ARM));
        assert_eq!(registry.by_id(1), Some(&MOTIONMACHINE));
        assert_eq!(registry.by_id(7), None);
        assert_eq!(registry.by_name("PARK"), None);
        assert_eq!(registry.get(StateId::Idle), &IDLE);
    }

    #[test]
    fn test_descriptor_contents() {
        assert!(IDLE.master.values.is_empty());
        assert!(IDLE.master.events.is_empty());
        assert!(IDLE.tablet.events.is_empty());

        assert_eq!(MOTIONMACHINE.master_value("stepperPosition"), Some(MasterValue::StepperPosition));
        assert_eq!(
            MOTIONMACHINE.master_event("stopSteps").map(MasterEvent::index),
            Some(4)
        );
        assert_eq!(ARM.master_event("moveArm").map(MasterEvent::index), Some(7));
        assert_eq!(ARM.tablet.events, &[TabletEvent::ArmFinishedAction]);
        assert!(ARM.tablet.values.is_empty());
    }

    #[test]
    fn test_reported_value_falls_back_to_master_slots() {
        assert_eq!(ARM.reported_value(0), Some(("rotations", DataType::U32)));
        assert_eq!(ARM.reported_value(1), None);
        assert_eq!(IDLE.reported_value(0), None);
    }

    #[test]
    fn test_reported_value_prefers_tablet_values() {
        static TABLET_VALUES: [NamedLocalValue; 1] = [NamedLocalValue {
            name: "armTarget",
            value: LocalValue::new(0, DataType::I16),
        }];
        let desc = StateDescriptor {
            tablet: TabletSide {
                values: &TABLET_VALUES,
                events: ARM.tablet.events,
            },
            ..ARM
        };

        assert_eq!(desc.reported_value(0), Some(("armTarget", DataType::I16)));
        assert_eq!(desc.reported_value(1), None);
    }
}
