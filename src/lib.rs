//! AMIB console - state registry and debug console for the AMIB master board
//!
//! The registry describes the machine's states: the master board's value slots
//! and events and the tablet's events. The rest of the crate speaks the master's
//! serial protocol and drives it from an interactive console.

pub mod config;
pub mod console;
pub mod discovery;
pub mod link;
pub mod manager;
pub mod protocol;
pub mod registry;
pub mod serial;

pub use manager::{trigger, Controller, EventSink, Manager};
pub use registry::{StateDescriptor, StateId, StateRegistry, ARM, BUILD_ID, IDLE, MOTIONMACHINE, STATES};
