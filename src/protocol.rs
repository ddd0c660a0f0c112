//! Master board wire protocol
//!
//! Host-to-master commands are a one-byte opcode followed by fixed fields.
//! The master reports values back as `0x02, state, index, <payload>`, where the
//! payload length is the size of the addressed value's data type.

use std::fmt;
use tracing::{trace, warn};

use crate::registry::{
    DataType, MasterEvent, MasterValue, StateId, StateRegistry, TypedValue, ValueError,
};

pub const OP_SET_STATE: u8 = 0x00;
pub const OP_EVENT: u8 = 0x01;
pub const OP_VALUE: u8 = 0x02;
pub const OP_HELLO: u8 = 0x05;
pub const OP_QUERY_STATE: u8 = 0x06;

/// Command sent from the host to the master
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Switch the master into another state
    SetState { state: u8 },

    /// Ask the master to run an event of a state
    Event { state: u8, event: u8 },

    /// Write a value slot: state, value index, little-endian payload
    SetValue { state: u8, value: u8, payload: Vec<u8> },

    /// Handshake opener; answered with an echo and the build id
    Hello,

    /// Ask for the current state; answered with an echo and the state id
    QueryState,
}

impl Command {
    pub fn set_state(state: StateId) -> Self {
        Command::SetState { state: state.id() }
    }

    pub fn event(event: MasterEvent) -> Self {
        Command::Event {
            state: event.state().id(),
            event: event.index(),
        }
    }

    /// Build a value write, parsing `text` according to the slot's type
    pub fn set_value(value: MasterValue, text: &str) -> Result<Self, ValueError> {
        let payload = value.data_type().parse(text)?;
        Ok(Command::SetValue {
            state: value.state().id(),
            value: value.index(),
            payload,
        })
    }

    /// Encode the command to wire bytes
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Command::SetState { state } => vec![OP_SET_STATE, *state],
            Command::Event { state, event } => vec![OP_EVENT, *state, *event],
            Command::SetValue { state, value, payload } => {
                let mut bytes = Vec::with_capacity(3 + payload.len());
                bytes.extend_from_slice(&[OP_VALUE, *state, *value]);
                bytes.extend_from_slice(payload);
                bytes
            }
            Command::Hello => vec![OP_HELLO],
            Command::QueryState => vec![OP_QUERY_STATE],
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetState { state } => write!(f, "SetState(state={})", state),
            Command::Event { state, event } => write!(f, "Event(state={}, event={})", state, event),
            Command::SetValue { state, value, payload } => write!(
                f,
                "SetValue(state={}, value={}, payload=[{}])",
                state,
                value,
                format_hex(payload)
            ),
            Command::Hello => write!(f, "Hello"),
            Command::QueryState => write!(f, "QueryState"),
        }
    }
}

/// A value reported by the master
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueReport {
    pub state: StateId,
    pub index: u8,
    pub name: &'static str,
    pub value: TypedValue,
}

impl fmt::Display for ValueReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Initial,
    AwaitState,
    AwaitIndex,
    AwaitPayload {
        state: StateId,
        name: &'static str,
        ty: DataType,
    },
}

/// Incremental decoder for value reports
///
/// Bytes are pushed one at a time as they arrive from the link. Anything that
/// does not start a value report is dropped, and a report addressing an
/// unknown state or value resets the decoder.
#[derive(Debug)]
pub struct ReportDecoder {
    registry: StateRegistry,
    stage: Stage,
    buf: Vec<u8>,
}

impl ReportDecoder {
    pub fn new(registry: StateRegistry) -> Self {
        Self {
            registry,
            stage: Stage::Initial,
            buf: Vec::with_capacity(8),
        }
    }

    /// Bytes held for the report in progress
    pub fn pending(&self) -> &[u8] {
        &self.buf
    }

    fn reset(&mut self) {
        self.stage = Stage::Initial;
        self.buf.clear();
    }

    /// Feed one byte; returns a report once its payload is complete
    pub fn push(&mut self, byte: u8) -> Option<ValueReport> {
        self.buf.push(byte);

        match self.stage {
            Stage::Initial => {
                if byte == OP_VALUE {
                    self.stage = Stage::AwaitState;
                } else {
                    trace!("Dropping unexpected byte {:02X}", byte);
                    self.reset();
                }
                None
            }
            Stage::AwaitState => {
                self.stage = Stage::AwaitIndex;
                None
            }
            Stage::AwaitIndex => {
                let state_id = self.buf[1];
                let resolved = self
                    .registry
                    .by_id(state_id)
                    .and_then(|desc| desc.reported_value(byte).map(|(name, ty)| (desc.state, name, ty)));

                match resolved {
                    Some((state, name, ty)) => {
                        self.stage = Stage::AwaitPayload { state, name, ty };
                    }
                    None => {
                        warn!(
                            "Value report for unknown slot (state {}, index {}), resyncing",
                            state_id, byte
                        );
                        self.reset();
                    }
                }
                None
            }
            Stage::AwaitPayload { state, name, ty } => {
                if self.buf.len() - 3 < ty.size() {
                    return None;
                }

                let index = self.buf[2];
                let decoded = ty.decode(&self.buf[3..]);
                self.reset();

                match decoded {
                    Ok(value) => Some(ValueReport {
                        state,
                        index,
                        name,
                        value,
                    }),
                    Err(e) => {
                        warn!("Failed to decode value report for {}: {}", name, e);
                        None
                    }
                }
            }
        }
    }
}

/// Format bytes as space-separated hex
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
