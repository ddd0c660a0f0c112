//! Closed enumerations of the console's states, events and values
//!
//! Each state's master events and values form a fixed set, so they are
//! modelled as enums. Indices are the wire codes the firmware dispatches on.

use std::fmt;

use super::types::{DataType, HardwareValue, LocalEvent};

/// Operating mode of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum StateId {
    Idle = 0,
    MotionMachine = 1,
    Arm = 2,
}

impl StateId {
    /// All states in id order
    pub const ALL: [StateId; 3] = [StateId::Idle, StateId::MotionMachine, StateId::Arm];

    pub const fn id(self) -> u8 {
        self as u8
    }

    /// Symbolic name (e.g. `MOTIONMACHINE`)
    pub const fn name(self) -> &'static str {
        match self {
            StateId::Idle => "IDLE",
            StateId::MotionMachine => "MOTIONMACHINE",
            StateId::Arm => "ARM",
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.get(usize::from(id)).copied()
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.name() == name)
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Master events of the `MOTIONMACHINE` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MotionMachineEvent {
    MoveLiftUp = 0,
    MoveToBottom = 1,
    SetLiftToZero = 2,
    RunSteps = 3,
    StopSteps = 4,
}

impl MotionMachineEvent {
    pub const fn name(self) -> &'static str {
        match self {
            MotionMachineEvent::MoveLiftUp => "moveLiftUp",
            MotionMachineEvent::MoveToBottom => "moveToBottom",
            MotionMachineEvent::SetLiftToZero => "setLiftToZero",
            MotionMachineEvent::RunSteps => "runSteps",
            MotionMachineEvent::StopSteps => "stopSteps",
        }
    }
}

/// Master events of the `ARM` state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ArmEvent {
    MoveFromTallToShort = 0,
    MoveFromShortToTall = 1,
    DisableElectromagnet = 2,
    EnableElectromagnet = 3,
    LowerArm = 4,
    RaiseArm = 5,
    ResetArmPosition = 6,
    MoveArm = 7,
}

impl ArmEvent {
    pub const fn name(self) -> &'static str {
        match self {
            ArmEvent::MoveFromTallToShort => "moveFromTallToShort",
            ArmEvent::MoveFromShortToTall => "moveFromShortToTall",
            ArmEvent::DisableElectromagnet => "disableElectromagnet",
            ArmEvent::EnableElectromagnet => "enableElectromagnet",
            ArmEvent::LowerArm => "lowerArm",
            ArmEvent::RaiseArm => "raiseArm",
            ArmEvent::ResetArmPosition => "resetArmPosition",
            ArmEvent::MoveArm => "moveArm",
        }
    }
}

/// An event the master can perform, tagged with its owning state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterEvent {
    MotionMachine(MotionMachineEvent),
    Arm(ArmEvent),
}

/// Dispatch table, in wire-index order per state
const MOTION_MACHINE_EVENTS: &[MasterEvent] = &[
    MasterEvent::MotionMachine(MotionMachineEvent::MoveLiftUp),
    MasterEvent::MotionMachine(MotionMachineEvent::MoveToBottom),
    MasterEvent::MotionMachine(MotionMachineEvent::SetLiftToZero),
    MasterEvent::MotionMachine(MotionMachineEvent::RunSteps),
    MasterEvent::MotionMachine(MotionMachineEvent::StopSteps),
];

const ARM_EVENTS: &[MasterEvent] = &[
    MasterEvent::Arm(ArmEvent::MoveFromTallToShort),
    MasterEvent::Arm(ArmEvent::MoveFromShortToTall),
    MasterEvent::Arm(ArmEvent::DisableElectromagnet),
    MasterEvent::Arm(ArmEvent::EnableElectromagnet),
    MasterEvent::Arm(ArmEvent::LowerArm),
    MasterEvent::Arm(ArmEvent::RaiseArm),
    MasterEvent::Arm(ArmEvent::ResetArmPosition),
    MasterEvent::Arm(ArmEvent::MoveArm),
];

impl MasterEvent {
    pub const fn state(self) -> StateId {
        match self {
            MasterEvent::MotionMachine(_) => StateId::MotionMachine,
            MasterEvent::Arm(_) => StateId::Arm,
        }
    }

    /// Event index within the owning state
    pub const fn index(self) -> u8 {
        match self {
            MasterEvent::MotionMachine(event) => event as u8,
            MasterEvent::Arm(event) => event as u8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MasterEvent::MotionMachine(event) => event.name(),
            MasterEvent::Arm(event) => event.name(),
        }
    }

    /// Events of a state, in index order
    pub const fn for_state(state: StateId) -> &'static [MasterEvent] {
        match state {
            StateId::Idle => &[],
            StateId::MotionMachine => MOTION_MACHINE_EVENTS,
            StateId::Arm => ARM_EVENTS,
        }
    }

    /// Every master event of every state
    pub fn all() -> impl Iterator<Item = MasterEvent> {
        StateId::ALL
            .into_iter()
            .flat_map(|state| Self::for_state(state).iter().copied())
    }

    pub fn from_name(state: StateId, name: &str) -> Option<Self> {
        Self::for_state(state)
            .iter()
            .copied()
            .find(|event| event.name() == name)
    }
}

impl From<MotionMachineEvent> for MasterEvent {
    fn from(event: MotionMachineEvent) -> Self {
        MasterEvent::MotionMachine(event)
    }
}

impl From<ArmEvent> for MasterEvent {
    fn from(event: ArmEvent) -> Self {
        MasterEvent::Arm(event)
    }
}

impl fmt::Display for MasterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.state(), self.name())
    }
}

/// A hardware value slot owned by the master
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MasterValue {
    StepperPosition,
    Rotations,
}

impl MasterValue {
    pub const fn state(self) -> StateId {
        match self {
            MasterValue::StepperPosition => StateId::MotionMachine,
            MasterValue::Rotations => StateId::Arm,
        }
    }

    /// Position of the value within its state's value list (wire index)
    pub const fn index(self) -> u8 {
        match self {
            MasterValue::StepperPosition | MasterValue::Rotations => 0,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            MasterValue::StepperPosition => "stepperPosition",
            MasterValue::Rotations => "rotations",
        }
    }

    pub const fn slot(self) -> HardwareValue {
        match self {
            MasterValue::StepperPosition => HardwareValue::new(1, 0, DataType::U32),
            MasterValue::Rotations => HardwareValue::new(2, 0, DataType::U32),
        }
    }

    pub const fn data_type(self) -> DataType {
        self.slot().data_type()
    }

    pub const fn for_state(state: StateId) -> &'static [MasterValue] {
        match state {
            StateId::Idle => &[],
            StateId::MotionMachine => &[MasterValue::StepperPosition],
            StateId::Arm => &[MasterValue::Rotations],
        }
    }

    pub fn from_name(state: StateId, name: &str) -> Option<Self> {
        Self::for_state(state)
            .iter()
            .copied()
            .find(|value| value.name() == name)
    }
}

/// A tablet-local event, inert data consumed by the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TabletEvent {
    MotionMachineFinishedAction,
    ArmFinishedAction,
}

impl TabletEvent {
    pub const fn state(self) -> StateId {
        match self {
            TabletEvent::MotionMachineFinishedAction => StateId::MotionMachine,
            TabletEvent::ArmFinishedAction => StateId::Arm,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            TabletEvent::MotionMachineFinishedAction | TabletEvent::ArmFinishedAction => {
                "finishedAction"
            }
        }
    }

    pub const fn local_event(self) -> LocalEvent {
        match self {
            TabletEvent::MotionMachineFinishedAction => LocalEvent::new(1, 0),
            TabletEvent::ArmFinishedAction => LocalEvent::new(2, 0),
        }
    }

    pub const fn for_state(state: StateId) -> &'static [TabletEvent] {
        match state {
            StateId::Idle => &[],
            StateId::MotionMachine => &[TabletEvent::MotionMachineFinishedAction],
            StateId::Arm => &[TabletEvent::ArmFinishedAction],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_ids_are_dense() {
        for (position, state) in StateId::ALL.into_iter().enumerate() {
            assert_eq!(usize::from(state.id()), position);
            assert_eq!(StateId::from_id(state.id()), Some(state));
            assert_eq!(StateId::from_name(state.name()), Some(state));
        }
        assert_eq!(StateId::from_id(3), None);
        assert_eq!(StateId::from_name("arm"), None);
    }

    #[test]
    fn test_event_indices_contiguous_from_zero() {
        for state in StateId::ALL {
            for (position, event) in MasterEvent::for_state(state).iter().enumerate() {
                assert_eq!(usize::from(event.index()), position);
                assert_eq!(event.state(), state);
            }
        }
        assert_eq!(MasterEvent::for_state(StateId::Idle).len(), 0);
        assert_eq!(MasterEvent::for_state(StateId::MotionMachine).len(), 5);
        assert_eq!(MasterEvent::for_state(StateId::Arm).len(), 8);
    }

    #[test]
    fn test_event_lookup_by_name_is_scoped_to_state() {
        assert_eq!(
            MasterEvent::from_name(StateId::Arm, "enableElectromagnet"),
            Some(MasterEvent::Arm(ArmEvent::EnableElectromagnet))
        );
        assert_eq!(MasterEvent::from_name(StateId::MotionMachine, "moveArm"), None);
        assert_eq!(MasterEvent::all().count(), 13);
    }

    #[test]
    fn test_values() {
        let slot = MasterValue::StepperPosition.slot();
        assert_eq!(slot.address(), 1);
        assert_eq!(slot.default_value(), 0);
        assert_eq!(slot.data_type(), DataType::U32);

        assert_eq!(MasterValue::Rotations.slot().address(), 2);
        assert_eq!(MasterValue::from_name(StateId::Arm, "rotations"), Some(MasterValue::Rotations));
        assert_eq!(MasterValue::from_name(StateId::Idle, "rotations"), None);
    }

    #[test]
    fn test_tablet_events() {
        assert_eq!(TabletEvent::ArmFinishedAction.local_event(), LocalEvent::new(2, 0));
        assert_eq!(
            TabletEvent::MotionMachineFinishedAction.local_event(),
            LocalEvent::new(1, 0)
        );
        assert!(TabletEvent::for_state(StateId::Idle).is_empty());
    }
}
