use clap::Parser;
use color_eyre::Result;
use pinbridge::{
    bridge::Bridge,
    cli,
    config::{Config, LinkLocation},
    error::Error,
    link::{remote, serial, LinkHandle},
    logging, mqtt,
    pin::PinId,
    proxy::{registry::Registry, Server},
    topic::TopicSpec,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = cli::Cli::parse();

    if let Some(cli::Commands::ConfigExample) = cli.command {
        let c = Config::example();
        println!("{}", c.serialize_pretty());
        return Ok(());
    }

    logging::init().await;

    let mut config = if let Some(config_path) = &cli.config {
        debug!(?config_path, "Config from path");
        Config::new_from_path(config_path)
    } else {
        debug!("Default config");
        Config::default()
    };
    apply_overrides(&mut config, &cli);

    let shutdown = CancellationToken::new();

    let signalled = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Ctrl-C, quitting");
            signalled.cancel();
        }
    });

    match cli.command {
        Some(cli::Commands::Proxy) => run_proxy(config, shutdown).await?,
        Some(cli::Commands::Bridge) | None => run_bridge(config, shutdown).await?,
        Some(cli::Commands::ConfigExample) => unreachable!("Handled above"),
    }

    Ok(())
}

fn apply_overrides(config: &mut Config, cli: &cli::Cli) {
    if !cli.digital_pins.is_empty() {
        config.digital_pins = cli.digital_pins.clone();
    }
    if !cli.analog_pins.is_empty() {
        config.analog_pins = cli.analog_pins.clone();
    }
    if let Some(tolerance) = cli.tolerance {
        config.analog_tolerance = tolerance;
    }

    if let Some(remote) = &cli.remote {
        let (host, port) = match remote.rsplit_once(':') {
            Some((host, port)) => (
                host.to_string(),
                port.parse().unwrap_or(pinbridge::proxy::DEFAULT_PORT),
            ),
            None => (remote.clone(), pinbridge::proxy::DEFAULT_PORT),
        };

        config.link = LinkLocation::Remote {
            host,
            port,
            device_port: None,
            baud: serial::DEFAULT_BAUD,
        };
    }
}

async fn run_proxy(config: Config, shutdown: CancellationToken) -> Result<(), Error> {
    let server = Server::new(Registry::serial(), config.settle_delay(), shutdown);

    server.run_on_port(config.proxy_port).await
}

async fn run_bridge(config: Config, shutdown: CancellationToken) -> Result<(), Error> {
    let link = connect_link(&config).await?;

    let (publications_tx, publications_rx) = mpsc::unbounded_channel();
    let mut bridge = Bridge::new(TopicSpec::new(&config.base_topic), link, publications_tx);

    for &pin in &config.digital_pins {
        bridge.enable_pin_change_forwarding(PinId::digital(pin));
    }
    for &pin in &config.analog_pins {
        bridge.enable_pin_change_forwarding_with_tolerance(
            PinId::analog(pin),
            config.analog_tolerance,
        );
    }

    let service = mqtt::Service::new(&config, bridge, publications_rx, shutdown);

    service.run().await
}

async fn connect_link(config: &Config) -> Result<LinkHandle, Error> {
    match &config.link {
        LinkLocation::Serial { port, baud } => {
            let port = match port {
                Some(port) => port.clone(),
                None => serial::available_ports()
                    .into_iter()
                    .next()
                    .ok_or(Error::NoPortFound)?,
            };

            serial::open(&port, *baud)
        }
        LinkLocation::Remote {
            host,
            port,
            device_port,
            baud,
        } => remote::connect(host, *port, device_port.as_deref(), *baud).await,
    }
}
