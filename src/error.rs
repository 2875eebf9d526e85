use std::io;

use thiserror::Error;

/// Errors that may occur in this library.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying transport I/O failed.
    #[error("Underlying I/O problem")]
    Io(#[from] io::Error),

    /// Opening a serial port failed.
    #[error("Could not open serial port `{path}`")]
    SerialOpen {
        /// The port that was asked for.
        path: String,

        /// What the serial layer said.
        #[source]
        source: tokio_serial::Error,
    },

    /// There is no port with the requested name.
    #[error("No such port `{0}`")]
    NoSuchPort(String),

    /// No port available at all.
    #[error("No port found")]
    NoPortFound,

    /// The remote proxy rejected our connect request.
    #[error("Proxy replied `{0}` to the connect request")]
    ConnectRefused(String),

    /// The device link is gone; its writer task has stopped.
    #[error("The device link is closed")]
    LinkClosed,

    /// The MQTT client could not take a request.
    #[error("Mqtt client problem")]
    Mqtt(#[from] rumqttc::ClientError),
}
