//! Serial link to the master board
//!
//! Performs the build-id handshake, then runs a writer task that drains the
//! command queue and a reader task that decodes value reports.

use std::io;

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::protocol::{format_hex, Command, ReportDecoder, ValueReport, OP_HELLO, OP_QUERY_STATE};
use crate::registry::{StateId, StateRegistry};

/// Errors raised by the link
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("I/O error on link: {0}")]
    Io(#[from] io::Error),

    #[error("communications error: expected echo {expected:#04x}, got {got:#04x}")]
    EchoMismatch { expected: u8, got: u8 },

    #[error("mismatching build IDs: expected {expected:#010x} but got {got:#010x}")]
    BuildIdMismatch { expected: u32, got: u32 },

    #[error("master reported unknown state {0}")]
    UnknownState(u8),

    #[error("link closed")]
    Closed,

    #[error("Master AMIB not connected: {0}")]
    NotConnected(String),
}

/// Process exit code for a top-level error
///
/// 3 for a build mismatch, 2 for other link failures, 1 for everything else.
/// Context layers added with `anyhow` are looked through.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<LinkError>() {
        Some(LinkError::BuildIdMismatch { .. }) => 3,
        Some(_) => 2,
        None => 1,
    }
}

/// What the master told us during the handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub build_id: u32,
    pub state: StateId,
}

fn map_eof(err: io::Error) -> LinkError {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        LinkError::Closed
    } else {
        LinkError::Io(err)
    }
}

async fn read_byte<R: AsyncRead + Unpin>(reader: &mut R) -> Result<u8, LinkError> {
    reader.read_u8().await.map_err(map_eof)
}

async fn expect_echo<R, W>(reader: &mut R, writer: &mut W, op: u8) -> Result<(), LinkError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer.write_all(&[op]).await?;
    writer.flush().await?;

    let got = read_byte(reader).await?;
    if got != op {
        return Err(LinkError::EchoMismatch { expected: op, got });
    }
    Ok(())
}

/// Run the handshake: check the build id, then read the master's state
pub async fn handshake<R, W>(
    reader: &mut R,
    writer: &mut W,
    expected_build_id: u32,
) -> Result<Handshake, LinkError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    expect_echo(reader, writer, OP_HELLO).await?;
    let build_id = reader.read_u32_le().await.map_err(map_eof)?;
    debug!("Master build ID: {:#010x}", build_id);

    if build_id != expected_build_id {
        return Err(LinkError::BuildIdMismatch {
            expected: expected_build_id,
            got: build_id,
        });
    }

    expect_echo(reader, writer, OP_QUERY_STATE).await?;
    let state_id = read_byte(reader).await?;
    let state = StateId::from_id(state_id).ok_or(LinkError::UnknownState(state_id))?;

    info!("Handshake complete (build {:#010x}, state {})", build_id, state);
    Ok(Handshake { build_id, state })
}

/// Running link: command queue in, value reports out
pub struct Link {
    commands: mpsc::UnboundedSender<Command>,
    reports: Option<mpsc::Receiver<ValueReport>>,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl Link {
    /// Spawn the reader and writer tasks over an already-handshaken stream
    pub fn spawn<R, W>(reader: R, writer: W, registry: StateRegistry, report_buffer: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (report_tx, report_rx) = mpsc::channel(report_buffer.max(1));

        let writer = tokio::spawn(write_loop(writer, cmd_rx));
        let reader = tokio::spawn(read_loop(reader, registry, report_tx));

        Self {
            commands: cmd_tx,
            reports: Some(report_rx),
            writer,
            reader,
        }
    }

    /// Queue a command for the writer task
    pub fn send(&self, command: Command) -> Result<(), LinkError> {
        self.commands.send(command).map_err(|_| LinkError::Closed)
    }

    /// Take the value report receiver (only once)
    pub fn take_report_receiver(&mut self) -> Option<mpsc::Receiver<ValueReport>> {
        self.reports.take()
    }

    /// Flush queued commands and stop both tasks
    pub async fn shutdown(self) {
        let Link {
            commands,
            writer,
            reader,
            ..
        } = self;

        drop(commands);
        if let Err(e) = writer.await {
            warn!("Link writer task ended abnormally: {}", e);
        }
        reader.abort();
        debug!("Link shut down");
    }
}

async fn write_loop<W>(mut writer: W, mut rx: mpsc::UnboundedReceiver<Command>)
where
    W: AsyncWrite + Unpin,
{
    while let Some(command) = rx.recv().await {
        let bytes = command.encode();
        debug!("📤 {} [{}]", command, format_hex(&bytes));

        if let Err(e) = writer.write_all(&bytes).await {
            error!("Failed to write to master: {}", e);
            break;
        }
        if let Err(e) = writer.flush().await {
            error!("Failed to flush link: {}", e);
            break;
        }
    }
}

async fn read_loop<R>(mut reader: R, registry: StateRegistry, tx: mpsc::Sender<ValueReport>)
where
    R: AsyncRead + Unpin,
{
    let mut decoder = ReportDecoder::new(registry);
    let mut buf = [0u8; 64];

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => {
                info!("Master closed the link");
                return;
            }
            Ok(n) => n,
            Err(e) => {
                warn!("Failed to read from master: {}", e);
                return;
            }
        };

        debug!("📥 [{}]", format_hex(&buf[..n]));
        for &byte in &buf[..n] {
            if let Some(report) = decoder.push(byte) {
                if tx.send(report).await.is_err() {
                    debug!("Report receiver dropped, stopping reader");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{TypedValue, BUILD_ID};
    use tokio::io::{duplex, split};

    async fn fake_master(mut io: tokio::io::DuplexStream, build_id: u32, state: u8) -> tokio::io::DuplexStream {
        assert_eq!(io.read_u8().await.unwrap(), OP_HELLO);
        io.write_u8(OP_HELLO).await.unwrap();
        io.write_u32_le(build_id).await.unwrap();
        assert_eq!(io.read_u8().await.unwrap(), OP_QUERY_STATE);
        io.write_u8(OP_QUERY_STATE).await.unwrap();
        io.write_u8(state).await.unwrap();
        io
    }

    #[test]
    fn test_exit_codes_through_context() {
        use anyhow::Context;

        let mismatch: Result<(), LinkError> = Err(LinkError::BuildIdMismatch {
            expected: BUILD_ID,
            got: 1,
        });
        let err = mismatch.context("Handshake with master failed").unwrap_err();
        assert_eq!(exit_code(&err), 3);

        let err = anyhow::Error::from(LinkError::NotConnected("no device".into()))
            .context("Looking for master")
            .context("Startup failed");
        assert_eq!(exit_code(&err), 2);

        let io: Result<(), io::Error> = Err(io::Error::from(io::ErrorKind::NotFound));
        let err = io
            .map_err(LinkError::from)
            .context("Failed to open /dev/ttyACM0")
            .unwrap_err();
        assert_eq!(exit_code(&err), 2);

        assert_eq!(exit_code(&anyhow::anyhow!("Invalid config file")), 1);
    }

    #[tokio::test]
    async fn test_handshake_success() {
        let (host, master) = duplex(64);
        let master = tokio::spawn(fake_master(master, BUILD_ID, 2));

        let (mut rd, mut wr) = split(host);
        let hs = handshake(&mut rd, &mut wr, BUILD_ID).await.unwrap();
        assert_eq!(hs, Handshake { build_id: BUILD_ID, state: StateId::Arm });
        master.await.unwrap();
    }

    #[tokio::test]
    async fn test_handshake_build_id_mismatch() {
        let (host, mut master) = duplex(64);
        tokio::spawn(async move {
            let _ = master.read_u8().await;
            master.write_u8(OP_HELLO).await.unwrap();
            master.write_u32_le(0xDEAD_BEEF).await.unwrap();
            // keep the pipe open until the host gives up
            let _ = master.read_u8().await;
        });

        let (mut rd, mut wr) = split(host);
        let err = handshake(&mut rd, &mut wr, BUILD_ID).await.unwrap_err();
        assert!(matches!(
            err,
            LinkError::BuildIdMismatch { expected: BUILD_ID, got: 0xDEAD_BEEF }
        ));
        assert_eq!(
            err.to_string(),
            "mismatching build IDs: expected 0x19465309 but got 0xdeadbeef"
        );
    }

    #[tokio::test]
    async fn test_handshake_bad_echo() {
        let (host, mut master) = duplex(64);
        tokio::spawn(async move {
            let _ = master.read_u8().await;
            master.write_u8(0x42).await.unwrap();
            let _ = master.read_u8().await;
        });

        let (mut rd, mut wr) = split(host);
        let err = handshake(&mut rd, &mut wr, BUILD_ID).await.unwrap_err();
        assert!(matches!(err, LinkError::EchoMismatch { expected: OP_HELLO, got: 0x42 }));
    }

    #[tokio::test]
    async fn test_handshake_closed_stream() {
        let (host, master) = duplex(64);
        drop(master);

        let (mut rd, mut wr) = split(host);
        let err = handshake(&mut rd, &mut wr, BUILD_ID).await.unwrap_err();
        assert!(matches!(err, LinkError::Closed | LinkError::Io(_)));
    }

    #[tokio::test]
    async fn test_handshake_unknown_state() {
        let (host, master) = duplex(64);
        tokio::spawn(fake_master(master, BUILD_ID, 9));

        let (mut rd, mut wr) = split(host);
        let err = handshake(&mut rd, &mut wr, BUILD_ID).await.unwrap_err();
        assert!(matches!(err, LinkError::UnknownState(9)));
    }

    #[tokio::test]
    async fn test_link_writes_commands_and_reads_reports() {
        let (host, mut master) = duplex(64);
        let (rd, wr) = split(host);
        let mut link = Link::spawn(rd, wr, StateRegistry::standard(), 8);
        let mut reports = link.take_report_receiver().unwrap();
        assert!(link.take_report_receiver().is_none());

        link.send(Command::SetState { state: 1 }).unwrap();
        link.send(Command::Event { state: 1, event: 4 }).unwrap();

        let mut written = [0u8; 5];
        master.read_exact(&mut written).await.unwrap();
        assert_eq!(written, [0x00, 1, 0x01, 1, 4]);

        master.write_all(&[0x02, 1, 0, 0x10, 0, 0, 0]).await.unwrap();
        let report = reports.recv().await.unwrap();
        assert_eq!(report.name, "stepperPosition");
        assert_eq!(report.value, TypedValue::Int(16));

        link.shutdown().await;
    }
}
