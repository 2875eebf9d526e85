//! The remote backend: a device link living behind a proxy server.
//!
//! Performs the line-based handshake as a client, then keeps the socket
//! as the frame transport. Device-originated bytes flow back through
//! the same link event path a local serial link would use.

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::LinkHandle;
use crate::error::Error;
use crate::proxy::wire::{CONNECT, GET_PORT_LIST, NUMBER_OF_PORTS, OK};

/// Connect to a proxy server and open a device link there.
///
/// When `port` is `None`, the first port the server reports is used.
pub async fn connect(
    host: &str,
    proxy_port: u16,
    port: Option<&str>,
    baud: u32,
) -> Result<LinkHandle, Error> {
    let stream = TcpStream::connect((host, proxy_port)).await?;
    let (read_half, mut write_half) = stream.into_split();

    // Buffering must survive the handshake: bytes the server sends right
    // after `OK` land in this reader and belong to the relay.
    let mut reader = BufReader::new(read_half);

    let port = match port {
        Some(port) => port.to_string(),
        None => first_remote_port(&mut reader, &mut write_half).await?,
    };

    debug!(%port, %baud, "Requesting remote connect");
    write_half
        .write_all(format!("{CONNECT}\n{port}\n{baud}\n").as_bytes())
        .await?;

    let reply = read_line(&mut reader).await?;
    if reply != OK {
        return Err(Error::ConnectRefused(reply));
    }

    info!(%port, "Remote link established");

    Ok(LinkHandle::start(
        &port,
        tokio::io::join(reader, write_half),
    ))
}

async fn first_remote_port<R, W>(reader: &mut R, writer: &mut W) -> Result<String, Error>
where
    R: AsyncBufReadExt + Unpin,
    W: AsyncWriteExt + Unpin,
{
    writer
        .write_all(format!("{GET_PORT_LIST}\n").as_bytes())
        .await?;

    let count: usize = read_line(reader)
        .await?
        .strip_prefix(NUMBER_OF_PORTS)
        .and_then(|count| count.parse().ok())
        .ok_or(Error::NoPortFound)?;

    let mut first = None;
    for _ in 0..count {
        let port = read_line(reader).await?;
        first.get_or_insert(port);
    }

    first.ok_or(Error::NoPortFound)
}

async fn read_line<R>(reader: &mut R) -> Result<String, Error>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    reader.read_line(&mut line).await?;

    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}
