use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// The command line interface for the pin bridge.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Digital pins to publish state changes for, overriding the
    /// configuration file
    #[arg(short, long = "digital", value_delimiter = ',')]
    pub digital_pins: Vec<u32>,

    /// Analog pins to publish state changes for, overriding the
    /// configuration file
    #[arg(short, long = "analog", value_delimiter = ',')]
    pub analog_pins: Vec<u32>,

    /// Publish an analog change only when it differs from the last
    /// published value by more than this, overriding the configuration
    /// file
    #[arg(long)]
    pub tolerance: Option<i32>,

    /// Use a device link behind a remote proxy server,
    /// given as `host` or `host:port`
    #[arg(long)]
    pub remote: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Bridge a device link to an MQTT broker (the default).
    Bridge,

    /// Serve this host's serial ports to remote bridges.
    Proxy,

    /// Show an example of a configuration file's contents.
    ConfigExample,
}
