//! The serial port backend: a link over a local tty.

use tokio_serial::SerialPortBuilderExt;
use tracing::{info, warn};

use super::LinkHandle;
use crate::error::Error;

/// The baud rate used when the caller does not care.
pub const DEFAULT_BAUD: u32 = 115_200;

/// Names of the serial ports present on this host.
/// An enumeration failure is reported as "no ports".
pub fn available_ports() -> Vec<String> {
    match tokio_serial::available_ports() {
        Ok(ports) => ports.into_iter().map(|port| port.port_name).collect(),
        Err(e) => {
            warn!(?e, "Could not enumerate serial ports");
            Vec::new()
        }
    }
}

/// Open a serial link on the given port and baud.
pub fn open(path: &str, baud: u32) -> Result<LinkHandle, Error> {
    let stream = tokio_serial::new(path, baud)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .open_native_async()
        .map_err(|source| Error::SerialOpen {
            path: path.to_string(),
            source,
        })?;

    info!(%path, %baud, "Serial port opened");

    Ok(LinkHandle::start(path, stream))
}
