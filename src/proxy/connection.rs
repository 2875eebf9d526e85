//! One accepted proxy client.
//!
//! Starts out line based, answering handshake commands. After a
//! successful connect the same socket switches to relaying raw device
//! bytes in both directions until either side goes away.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::registry::Registry;
use super::wire::{CONNECT, GET_PORT_LIST, KO, NUMBER_OF_PORTS, OK, STOP_SERVER};
use crate::link::{LinkEvent, LinkHandle};
use crate::protocol::FRAME_DIVIDER;

pub(crate) struct Connection {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
    registry: Registry,
    server_shutdown: CancellationToken,
    settle_delay: Duration,
    link: Option<LinkHandle>,
    closed: bool,
    torn_down: bool,
}

impl Connection {
    pub(crate) fn new(
        stream: TcpStream,
        registry: Registry,
        server_shutdown: CancellationToken,
        settle_delay: Duration,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();

        Self {
            reader: BufReader::new(read_half),
            writer: write_half,
            registry,
            server_shutdown,
            settle_delay,
            link: None,
            closed: false,
            torn_down: false,
        }
    }

    pub(crate) async fn run(mut self) {
        if let Err(e) = self.serve().await {
            debug!(?e, "Connection ended with an error");
        }

        self.close().await;
        info!("Connection closed");
    }

    async fn serve(&mut self) -> Result<(), std::io::Error> {
        let shutdown = self.server_shutdown.clone();

        while !self.closed && self.link.is_none() {
            let line = tokio::select! {
                line = self.read_line() => line?,
                () = shutdown.cancelled() => {
                    debug!("Server shutting down, dropping idle connection");
                    return Ok(());
                }
            };

            let Some(line) = line else {
                return Ok(());
            };

            self.process_command(&line).await?;
        }

        if self.link.is_some() {
            self.relay().await?;
        }

        Ok(())
    }

    async fn process_command(&mut self, line: &str) -> Result<(), std::io::Error> {
        match line {
            STOP_SERVER => {
                info!("Stop request received");
                self.server_shutdown.cancel();
                self.closed = true;
            }
            GET_PORT_LIST => {
                let ports = self.registry.port_list();

                let mut reply = format!("{NUMBER_OF_PORTS}{}\n", ports.len());
                for port in ports {
                    reply.push_str(&port);
                    reply.push('\n');
                }

                self.writer.write_all(reply.as_bytes()).await?;
                self.writer.flush().await?;
            }
            CONNECT => {
                let port = self.read_line().await?;
                let baud = self.read_line().await?;
                let (Some(port), Some(baud)) = (port, baud) else {
                    self.closed = true;
                    return Ok(());
                };

                let link = baud
                    .parse()
                    .ok()
                    .and_then(|baud| self.registry.connect(&port, baud).ok());

                // The transport may emit transient noise right after
                // opening. Let it pass before acknowledging.
                tokio::time::sleep(self.settle_delay).await;

                match link {
                    Some(link) => {
                        // Attach before acknowledging: should the reply
                        // write fail, teardown still releases the link.
                        self.link = Some(link);

                        self.writer.write_all(OK.as_bytes()).await?;
                        self.writer.write_all(&[FRAME_DIVIDER]).await?;
                        self.writer.flush().await?;

                        info!(%port, "Client attached to link");
                    }
                    None => {
                        debug!(%port, %baud, "Connect refused");
                        self.writer.write_all(KO.as_bytes()).await?;
                        self.writer.write_all(&[FRAME_DIVIDER]).await?;
                        self.writer.flush().await?;
                    }
                }
            }
            unknown => {
                debug!(%unknown, "Ignoring unknown command");
            }
        }

        Ok(())
    }

    /// Shuffle bytes between the socket and the link until one of them
    /// closes, or the server shuts down.
    async fn relay(&mut self) -> Result<(), std::io::Error> {
        let link = self.link.clone().expect("Relay requires a link");
        let mut events = link.events();

        let mut buf = [0u8; 1024];
        loop {
            tokio::select! {
                read = self.reader.read(&mut buf) => {
                    let n = read?;
                    if n == 0 {
                        debug!("Client EOF");
                        break;
                    }

                    // Client bytes go to the device verbatim, dividers
                    // included.
                    if link.write(buf[..n].to_vec()).is_err() {
                        debug!("Link gone, ending relay");
                        break;
                    }
                }
                event = events.recv() => match event {
                    Ok(LinkEvent::Frame(frame)) => {
                        self.writer.write_all(&frame).await?;
                        self.writer.write_all(&[FRAME_DIVIDER]).await?;
                        self.writer.flush().await?;
                    }
                    Ok(LinkEvent::PinChange(_)) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "Relay fell behind, device frames dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Link gone, ending relay");
                        break;
                    }
                },
                () = self.server_shutdown.cancelled() => {
                    debug!("Server shutting down, ending relay");
                    break;
                }
            }
        }

        Ok(())
    }

    /// Give the link back and close the socket. Idempotent.
    pub(crate) async fn close(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        // Detach from the link before touching the socket, so no event
        // is delivered to a dead writer.
        if let Some(link) = self.link.take() {
            self.registry.disconnect(link.name());
        }

        let _ = self.writer.shutdown().await;
    }

    async fn read_line(&mut self) -> Result<Option<String>, std::io::Error> {
        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            return Ok(None);
        }

        Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
    }
}
