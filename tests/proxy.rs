mod common;

use std::time::Duration;

use color_eyre::Result;
use pinbridge::error::Error;
use pinbridge::link::remote;
use pinbridge::proxy::wire;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;

use common::{connect, start_proxy};

#[tokio::test]
async fn port_list_with_no_ports() -> Result<()> {
    let proxy = start_proxy(&[]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line(wire::GET_PORT_LIST).await?;
    assert_eq!(client.receive_line().await?, "NUMBER_OF_PORTS0");

    // Still in command mode, and no stray lines followed the count.
    client.send_line(wire::GET_PORT_LIST).await?;
    assert_eq!(client.receive_line().await?, "NUMBER_OF_PORTS0");

    Ok(())
}

#[tokio::test]
async fn port_list_names_every_port() -> Result<()> {
    let proxy = start_proxy(&["mock0", "mock1"]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line(wire::GET_PORT_LIST).await?;
    assert_eq!(client.receive_line().await?, "NUMBER_OF_PORTS2");
    assert_eq!(client.receive_line().await?, "mock0");
    assert_eq!(client.receive_line().await?, "mock1");

    Ok(())
}

#[tokio::test]
async fn connect_then_relay_both_ways() -> Result<()> {
    let mut proxy = start_proxy(&["mock0"]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line(wire::CONNECT).await?;
    client.send_line("mock0").await?;
    client.send_line("9600").await?;
    assert_eq!(client.receive_line().await?, wire::OK);

    let (name, mut device) = proxy.devices.recv().await.expect("A link was opened");
    assert_eq!(name, "mock0");

    // Client bytes reach the device verbatim.
    client.writer.write_all(b"alp://ppsw/4/1\n").await?;
    client.writer.flush().await?;
    assert_eq!(device.next_frame().await.unwrap(), b"alp://ppsw/4/1");

    // Device frames come back as lines on the socket.
    device.emit(b"alp://dred/2/1").await;
    assert_eq!(client.receive_line().await?, "alp://dred/2/1");

    Ok(())
}

#[tokio::test]
async fn bad_port_gets_ko_and_another_chance() -> Result<()> {
    let proxy = start_proxy(&["mock0"]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line(wire::CONNECT).await?;
    client.send_line("not-a-port").await?;
    client.send_line("9600").await?;
    assert_eq!(client.receive_line().await?, wire::KO);

    // The connection stays open, a corrected attempt succeeds.
    client.send_line(wire::CONNECT).await?;
    client.send_line("mock0").await?;
    client.send_line("9600").await?;
    assert_eq!(client.receive_line().await?, wire::OK);

    Ok(())
}

#[tokio::test]
async fn bad_baud_gets_ko() -> Result<()> {
    let proxy = start_proxy(&["mock0"]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line(wire::CONNECT).await?;
    client.send_line("mock0").await?;
    client.send_line("fast-please").await?;
    assert_eq!(client.receive_line().await?, wire::KO);

    Ok(())
}

#[tokio::test]
async fn unknown_commands_are_ignored() -> Result<()> {
    let proxy = start_proxy(&["mock0"]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line("make-me-a-sandwich").await?;

    // The connection shrugged it off.
    client.send_line(wire::GET_PORT_LIST).await?;
    assert_eq!(client.receive_line().await?, "NUMBER_OF_PORTS1");
    assert_eq!(client.receive_line().await?, "mock0");

    Ok(())
}

#[tokio::test]
async fn stop_command_shuts_the_server_down() -> Result<()> {
    let proxy = start_proxy(&[]).await?;
    let mut client = connect(proxy.port).await?;

    client.send_line(wire::STOP_SERVER).await?;

    timeout(Duration::from_secs(5), proxy.shutdown.cancelled()).await?;

    Ok(())
}

#[tokio::test]
async fn shutdown_closes_idle_connections() -> Result<()> {
    let proxy = start_proxy(&["mock0"]).await?;
    let mut client = connect(proxy.port).await?;

    // The client never sends anything; cancelling the server must still
    // close it rather than leaving it waiting for a command.
    proxy.shutdown.cancel();

    // EOF shows up as an empty read.
    assert_eq!(client.receive_line().await?, "");

    Ok(())
}

#[tokio::test]
async fn remote_link_round_trip() -> Result<()> {
    let mut proxy = start_proxy(&["mock0"]).await?;

    // No port given: the first one the server reports is used.
    let link = remote::connect("127.0.0.1", proxy.port, None, 9600).await?;
    assert_eq!(link.name(), "mock0");

    let (_, mut device) = proxy.devices.recv().await.expect("A link was opened");

    link.send_power_pin_intensity(pinbridge::pin::PinId::analog(3), 128)?;
    assert_eq!(device.next_frame().await.unwrap(), b"alp://ppin/3/128");

    let mut events = link.events();
    device.emit(b"alp://ared/3/77").await;

    let event = timeout(Duration::from_secs(5), events.recv()).await??;
    let pinbridge::link::LinkEvent::PinChange(change) = event else {
        panic!("Expected a pin change, got {event:?}");
    };
    assert_eq!(change.pin, pinbridge::pin::PinId::analog(3));
    assert_eq!(change.value, 77);

    Ok(())
}

#[tokio::test]
async fn remote_link_refused_for_unknown_port() -> Result<()> {
    let proxy = start_proxy(&["mock0"]).await?;

    let refused = remote::connect("127.0.0.1", proxy.port, Some("mock9"), 9600).await;
    assert!(matches!(refused, Err(Error::ConnectRefused(_))));

    Ok(())
}
