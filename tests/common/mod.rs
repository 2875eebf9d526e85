#![allow(dead_code)]

use std::time::Duration;

use color_eyre::Result;
use pinbridge::link::mock::MockDevice;
use pinbridge::proxy::registry::Registry;
use pinbridge::proxy::Server;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// A proxy server over mock ports, on some free TCP port.
pub struct TestProxy {
    pub port: u16,
    pub devices: mpsc::UnboundedReceiver<(String, MockDevice)>,
    pub shutdown: CancellationToken,
}

/// Start a proxy server whose registry offers the given mock ports.
/// The settle delay is kept short so tests stay fast.
pub async fn start_proxy(ports: &[&str]) -> Result<TestProxy> {
    let (registry, devices) = Registry::mock(ports);
    let shutdown = CancellationToken::new();
    let server = Server::new(registry, Duration::from_millis(10), shutdown.clone());

    let (port_tx, port_rx) = oneshot::channel();
    tokio::spawn(async move { server.run_any_port(port_tx).await });

    let port = port_rx
        .await
        .expect("Server should reply with allocated port");
    info!("Proxy server up on port {port}");

    Ok(TestProxy {
        port,
        devices,
        shutdown,
    })
}

/// A line-oriented client socket connected to the proxy.
pub struct TestClient {
    pub reader: BufReader<OwnedReadHalf>,
    pub writer: OwnedWriteHalf,
}

pub async fn connect(port: u16) -> Result<TestClient> {
    let stream = TcpStream::connect(("127.0.0.1", port)).await?;
    let (read_half, write_half) = stream.into_split();

    Ok(TestClient {
        reader: BufReader::new(read_half),
        writer: write_half,
    })
}

impl TestClient {
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await?;

        Ok(())
    }

    pub async fn receive_line(&mut self) -> Result<String> {
        let mut line = String::new();
        timeout(Duration::from_secs(5), self.reader.read_line(&mut line)).await??;

        Ok(line.trim_end_matches(['\r', '\n']).to_string())
    }
}
