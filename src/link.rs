//! The device link: the abstraction over a physical or proxied
//! connection to the microcontroller.
//!
//! Each link runs one task owning the transport. Commands arrive over a
//! channel, so all transport writes are serialized through that single
//! task; concurrent writers can never interleave bytes mid-frame.
//! Whatever the device reports is broadcast as [`LinkEvent`]s, in the
//! order the transport delivered it.

use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::{broadcast, mpsc};
use tokio_util::codec::FramedRead;
use tracing::{debug, info_span, trace, warn, Instrument};

use crate::error::Error;
use crate::pin::{DigitalState, PinEvent, PinId};
use crate::protocol::{self, codec::FrameCodec, FRAME_DIVIDER};

/// A mock link backed by an in-memory transport. The far end is handed
/// to the caller, standing in for the device in tests.
pub mod mock;

/// A device link behind a remote proxy server.
pub mod remote;

/// A device link on a local serial port.
pub mod serial;

/// Something the device link reports while connected.
#[derive(Debug, Clone)]
pub enum LinkEvent {
    /// A raw device protocol frame, divider stripped.
    Frame(Vec<u8>),

    /// A frame which parsed as a pin state change.
    /// The raw frame is broadcast separately as [`LinkEvent::Frame`].
    PinChange(PinEvent),
}

#[derive(Debug)]
enum Command {
    Write(Vec<u8>),
    Disconnect,
}

/// A clonable handle to one device link.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    name: String,
    commands: mpsc::UnboundedSender<Command>,
    events: broadcast::Sender<LinkEvent>,
}

impl LinkHandle {
    /// Start a link over the given transport.
    pub(crate) fn start<T>(name: &str, transport: T) -> Self
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(1024);

        let span = info_span!("link", %name);
        tokio::spawn(run_link(transport, commands_rx, events_tx.clone()).instrument(span));

        Self {
            name: name.to_string(),
            commands: commands_tx,
            events: events_tx,
        }
    }

    /// The port name this link was opened on.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subscribe to what the device reports.
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.events.subscribe()
    }

    /// Whether the link task is still around.
    pub fn is_connected(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Resolves once the link task has gone away.
    pub async fn closed(&self) {
        self.commands.closed().await
    }

    /// Switch a digital pin high or low.
    pub fn send_power_pin_switch(&self, pin: PinId, state: DigitalState) -> Result<(), Error> {
        self.send(Command::Write(framed(protocol::power_pin_switch(
            pin, state,
        ))))
    }

    /// Set an analog pin intensity.
    pub fn send_power_pin_intensity(&self, pin: PinId, intensity: i32) -> Result<(), Error> {
        self.send(Command::Write(framed(protocol::power_pin_intensity(
            pin, intensity,
        ))))
    }

    /// Put bytes on the transport verbatim.
    ///
    /// This is the relay path: whatever a remote peer sends is forwarded
    /// as-is, dividers included.
    pub fn write(&self, bytes: Vec<u8>) -> Result<(), Error> {
        self.send(Command::Write(bytes))
    }

    /// Tear the link down. A no-op if it is already gone.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    fn send(&self, command: Command) -> Result<(), Error> {
        self.commands.send(command).map_err(|_| Error::LinkClosed)
    }
}

fn framed(mut frame: Vec<u8>) -> Vec<u8> {
    frame.push(FRAME_DIVIDER);
    frame
}

async fn run_link<T>(
    transport: T,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: broadcast::Sender<LinkEvent>,
) where
    T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (read_half, mut write_half) = tokio::io::split(transport);
    let mut frames = FramedRead::new(read_half, FrameCodec::default());

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Write(bytes)) => {
                    if let Err(e) = write_transport(&mut write_half, &bytes).await {
                        warn!(?e, "Transport write failed, closing link");
                        break;
                    }
                }
                Some(Command::Disconnect) | None => {
                    debug!("Link told to disconnect");
                    break;
                }
            },
            frame = frames.next() => match frame {
                Some(Ok(frame)) => {
                    trace!(len = frame.len(), "Frame from device");

                    if let Some(event) = protocol::parse_event(&frame) {
                        let _ = events.send(LinkEvent::PinChange(event));
                    }

                    // Relay observers get the frame verbatim, parseable or not.
                    let _ = events.send(LinkEvent::Frame(frame));
                }
                Some(Err(e)) => {
                    warn!(?e, "Transport read failed, closing link");
                    break;
                }
                None => {
                    debug!("Transport EOF, closing link");
                    break;
                }
            },
        }
    }
}

async fn write_transport<W>(write_half: &mut W, bytes: &[u8]) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    write_half.write_all(bytes).await?;
    write_half.flush().await
}
