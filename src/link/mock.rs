//! A mock link, useful to test bridge and proxy functionality without
//! actual serial ports.
//!
//! The link side behaves exactly like any other link; the device side
//! is handed to the caller, which plays the microcontroller.

use futures::{SinkExt, StreamExt};
use tokio::io::DuplexStream;
use tokio_util::codec::Framed;

use super::LinkHandle;
use crate::protocol::codec::FrameCodec;

/// The device side of a mock link.
///
/// Frames emitted here show up as if they came from the wire; frames
/// the link writes show up here.
pub struct MockDevice {
    framed: Framed<DuplexStream, FrameCodec>,
}

/// Start a mock link, returning the handle plus the device side.
pub fn start(name: &str) -> (LinkHandle, MockDevice) {
    let (link_side, device_side) = tokio::io::duplex(4096);

    let handle = LinkHandle::start(name, link_side);
    let device = MockDevice {
        framed: Framed::new(device_side, FrameCodec::default()),
    };

    (handle, device)
}

impl MockDevice {
    /// Emit a frame as if the device produced it.
    pub async fn emit(&mut self, frame: &[u8]) {
        self.framed
            .send(frame.to_vec())
            .await
            .expect("Mock transport should be alive");
    }

    /// The next frame the link wrote towards the device.
    /// `None` when the link side has gone away.
    pub async fn next_frame(&mut self) -> Option<Vec<u8>> {
        match self.framed.next().await? {
            Ok(frame) => Some(frame),
            Err(_) => None,
        }
    }
}
