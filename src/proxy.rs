//! The proxy server: exposes local device links over TCP so a bridge on
//! another host can use this host's ports.

use std::time::Duration;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::error::Error;

pub mod registry;
pub mod wire;

mod connection;

use connection::Connection;
use registry::Registry;

/// The TCP port the server listens on unless told otherwise.
pub const DEFAULT_PORT: u16 = 4478;

/// A TCP server mediating access to the links in a [`Registry`].
pub struct Server {
    registry: Registry,
    settle_delay: Duration,
    shutdown: CancellationToken,
}

impl Server {
    /// A server over the given registry.
    ///
    /// Cancelling `shutdown` stops the server; a client sending the stop
    /// command cancels the same token.
    pub fn new(registry: Registry, settle_delay: Duration, shutdown: CancellationToken) -> Self {
        Self {
            registry,
            settle_delay,
            shutdown,
        }
    }

    /// Serve on the given TCP port until shut down.
    pub async fn run_on_port(self, port: u16) -> Result<(), Error> {
        self.run(port, None).await
    }

    /// Serve on any available TCP port until shut down.
    ///
    /// The chosen port is sent on the provided channel.
    pub async fn run_any_port(
        self,
        port_reply: tokio::sync::oneshot::Sender<u16>,
    ) -> Result<(), Error> {
        self.run(0, Some(port_reply)).await
    }

    async fn run(
        self,
        port: u16,
        port_reply: Option<tokio::sync::oneshot::Sender<u16>>,
    ) -> Result<(), Error> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        let port = listener.local_addr()?.port();
        info!(%port, "Proxy server up");

        if let Some(port_reply) = port_reply {
            port_reply
                .send(port)
                .expect("The port listener should not be dropped");
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(accepted) => accepted,
                        Err(e) => {
                            warn!(?e, "Accept failed");
                            continue;
                        }
                    };

                    info!(%peer, "Client connected");
                    let connection = Connection::new(
                        stream,
                        self.registry.clone(),
                        self.shutdown.clone(),
                        self.settle_delay,
                    );

                    let span = info_span!("connection", %peer);
                    tokio::spawn(connection.run().instrument(span));
                }
                () = self.shutdown.cancelled() => {
                    info!("Proxy server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
