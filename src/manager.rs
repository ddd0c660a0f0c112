//! Event dispatch and the link-backed manager
//!
//! Master events are fired through a single generic [`trigger`] function that
//! forwards `(event index, state id)` to an [`EventSink`]. The [`Manager`] is
//! the sink used at runtime: it owns the ordered state list and queues frames
//! onto the serial link.

use parking_lot::Mutex;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::link::{handshake, Link, LinkError};
use crate::protocol::{Command, ValueReport};
use crate::registry::{MasterEvent, MasterValue, StateDescriptor, StateId, StateRegistry, ValueError};

/// Collaborator that receives event requests
///
/// Fire-and-forget: implementations own any failure policy.
pub trait EventSink {
    fn send_event(&self, event_index: u8, state_id: u8);
}

impl<T: EventSink + ?Sized> EventSink for &T {
    fn send_event(&self, event_index: u8, state_id: u8) {
        (**self).send_event(event_index, state_id)
    }
}

impl<T: EventSink + ?Sized> EventSink for std::sync::Arc<T> {
    fn send_event(&self, event_index: u8, state_id: u8) {
        (**self).send_event(event_index, state_id)
    }
}

/// Fire a master event: exactly one `send_event(index, state)` call
pub fn trigger<S: EventSink + ?Sized>(sink: &S, event: MasterEvent) {
    sink.send_event(event.index(), event.state().id());
}

impl MasterEvent {
    pub fn trigger<S: EventSink + ?Sized>(self, sink: &S) {
        trigger(sink, self)
    }
}

/// Everything the debug console needs from the master side
pub trait Controller: EventSink + Send + Sync {
    /// State the master is currently in, as far as we know
    fn current_state(&self) -> StateId;

    /// Switch the master into `state`
    fn set_state(&self, state: StateId) -> Result<(), LinkError>;

    /// Queue a raw command
    fn submit(&self, command: Command) -> Result<(), LinkError>;
}

/// Errors from manager operations that take user input
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Value(#[from] ValueError),

    #[error(transparent)]
    Link(#[from] LinkError),
}

/// Link options taken from the application config
#[derive(Debug, Clone, Copy)]
pub struct LinkOptions {
    pub build_id: u32,
    pub report_buffer: usize,
}

/// Tracks the master's state and forwards requests over the link
pub struct Manager {
    registry: StateRegistry,
    link: Link,
    current: Mutex<StateId>,
}

impl Manager {
    /// Wrap a running link; `initial` is the state reported at handshake
    pub fn new(registry: StateRegistry, link: Link, initial: StateId) -> Self {
        Self {
            registry,
            link,
            current: Mutex::new(initial),
        }
    }

    /// Handshake with the master over `reader`/`writer` and start the link
    pub async fn connect<R, W>(
        mut reader: R,
        mut writer: W,
        registry: StateRegistry,
        options: LinkOptions,
    ) -> Result<Self, LinkError>
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let hs = handshake(&mut reader, &mut writer, options.build_id).await?;
        let link = Link::spawn(reader, writer, registry, options.report_buffer);
        info!("Manager ready with {} states, master in {}", registry.len(), hs.state);
        Ok(Self::new(registry, link, hs.state))
    }

    pub fn registry(&self) -> StateRegistry {
        self.registry
    }

    pub fn current_descriptor(&self) -> &'static StateDescriptor {
        self.registry.get(self.current_state())
    }

    /// Write a master value, parsing `text` per the slot's type
    pub fn set_value(&self, value: MasterValue, text: &str) -> Result<(), ManagerError> {
        let command = Command::set_value(value, text)?;
        self.submit(command)?;
        Ok(())
    }

    pub fn take_report_receiver(&mut self) -> Option<mpsc::Receiver<ValueReport>> {
        self.link.take_report_receiver()
    }

    pub async fn shutdown(self) {
        self.link.shutdown().await;
    }
}

impl EventSink for Manager {
    fn send_event(&self, event_index: u8, state_id: u8) {
        if let Err(e) = self.submit(Command::Event {
            state: state_id,
            event: event_index,
        }) {
            warn!("Dropping event {} for state {}: {}", event_index, state_id, e);
        }
    }
}

impl Controller for Manager {
    fn current_state(&self) -> StateId {
        *self.current.lock()
    }

    fn set_state(&self, state: StateId) -> Result<(), LinkError> {
        self.submit(Command::set_state(state))?;
        *self.current.lock() = state;
        debug!("Master state set to {}", state);
        Ok(())
    }

    fn submit(&self, command: Command) -> Result<(), LinkError> {
        self.link.send(command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{ArmEvent, MotionMachineEvent, BUILD_ID};
    use std::cell::RefCell;
    use tokio::io::{duplex, split, AsyncReadExt, AsyncWriteExt};

    #[derive(Default)]
    struct RecordingSink {
        calls: RefCell<Vec<(u8, u8)>>,
    }

    impl EventSink for RecordingSink {
        fn send_event(&self, event_index: u8, state_id: u8) {
            self.calls.borrow_mut().push((event_index, state_id));
        }
    }

    #[test]
    fn test_trigger_calls_sink_once() {
        let sink = RecordingSink::default();
        MasterEvent::from(ArmEvent::EnableElectromagnet).trigger(&sink);
        assert_eq!(*sink.calls.borrow(), vec![(3, 2)]);
    }

    #[test]
    fn test_every_event_dispatches_its_literal_pair() {
        for event in MasterEvent::all() {
            let sink = RecordingSink::default();
            trigger(&sink, event);
            assert_eq!(*sink.calls.borrow(), vec![(event.index(), event.state().id())]);
        }

        let sink = RecordingSink::default();
        trigger(&sink, MotionMachineEvent::RunSteps.into());
        trigger(&sink, ArmEvent::MoveArm.into());
        assert_eq!(*sink.calls.borrow(), vec![(3, 1), (7, 2)]);
    }

    #[tokio::test]
    async fn test_manager_connect_and_dispatch() {
        let (host, mut master) = duplex(128);
        let fake = tokio::spawn(async move {
            assert_eq!(master.read_u8().await.unwrap(), 0x05);
            master.write_u8(0x05).await.unwrap();
            master.write_u32_le(BUILD_ID).await.unwrap();
            assert_eq!(master.read_u8().await.unwrap(), 0x06);
            master.write_u8(0x06).await.unwrap();
            master.write_u8(0).await.unwrap();

            let mut frames = [0u8; 5 + 7];
            master.read_exact(&mut frames).await.unwrap();
            frames
        });

        let (rd, wr) = split(host);
        let options = LinkOptions { build_id: BUILD_ID, report_buffer: 4 };
        let manager = Manager::connect(rd, wr, StateRegistry::standard(), options)
            .await
            .unwrap();
        assert_eq!(manager.current_state(), StateId::Idle);

        manager.set_state(StateId::Arm).unwrap();
        assert_eq!(manager.current_state(), StateId::Arm);
        assert_eq!(manager.current_descriptor().name(), "ARM");

        MasterEvent::from(ArmEvent::LowerArm).trigger(&manager);
        manager.set_value(MasterValue::Rotations, "25").unwrap();
        assert!(matches!(
            manager.set_value(MasterValue::Rotations, "lots"),
            Err(ManagerError::Value(_))
        ));

        let frames = fake.await.unwrap();
        assert_eq!(
            frames,
            [0x00, 2, 0x01, 2, 4, 0x02, 2, 0, 25, 0, 0, 0]
        );

        manager.shutdown().await;
    }
}
