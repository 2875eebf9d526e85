//! Configuration, read from a RON file.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::link::serial;
use crate::proxy;

/// The topic namespace used when none is configured.
pub const DEFAULT_TOPIC: &str = "home/devices/ardulink/";

/// The settle delay (in milliseconds) the proxy uses when none is
/// configured. Matches the historical one second.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 1_000;

/// The analog tolerance used when none is configured: changes of a
/// single step are treated as noise.
pub const DEFAULT_ANALOG_TOLERANCE: i32 = 1;

/// Which broker to talk to, and as whom.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Broker {
    /// Broker host name or address.
    pub host: String,

    /// Broker port.
    pub port: u16,

    /// The client id presented to the broker.
    pub client_id: String,

    /// When set, `true`/`false` is published (retained) here on
    /// connect/disconnect, with `false` also registered as the last
    /// will.
    pub status_topic: Option<String>,
}

impl Default for Broker {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: "pinbridge".into(),
            status_topic: None,
        }
    }
}

/// Where the device link lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LinkLocation {
    /// A serial port on this host.
    /// With no port given, the first one found is used.
    Serial {
        /// Path such as "/dev/ttyACM0" or "COM3".
        port: Option<String>,

        /// Baud rate for the port.
        baud: u32,
    },

    /// A port on another host, reached through its proxy server.
    Remote {
        /// The proxy host.
        host: String,

        /// The proxy TCP port.
        port: u16,

        /// The device port on the remote host.
        /// With none given, the first port the proxy reports is used.
        device_port: Option<String>,

        /// Baud rate for the remote port.
        baud: u32,
    },
}

impl Default for LinkLocation {
    fn default() -> Self {
        Self::Serial {
            port: None,
            baud: serial::DEFAULT_BAUD,
        }
    }
}

/// The configuration used for running the bridge or the proxy server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The topic namespace to bridge under.
    pub base_topic: String,

    /// The broker to bridge against.
    pub broker: Broker,

    /// Digital pins whose state changes are published.
    pub digital_pins: Vec<u32>,

    /// Analog pins whose state changes are published.
    pub analog_pins: Vec<u32>,

    /// An analog change is only published when it differs from the last
    /// published value by more than this.
    pub analog_tolerance: i32,

    /// Where the device link lives.
    pub link: LinkLocation,

    /// TCP port the proxy server listens on.
    pub proxy_port: u16,

    /// How long the proxy waits after opening a port before replying,
    /// in milliseconds.
    pub settle_delay_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_topic: DEFAULT_TOPIC.into(),
            broker: Broker::default(),
            digital_pins: Vec::new(),
            analog_pins: Vec::new(),
            analog_tolerance: DEFAULT_ANALOG_TOLERANCE,
            link: LinkLocation::default(),
            proxy_port: proxy::DEFAULT_PORT,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl Config {
    fn ron() -> ron::Options {
        ron::Options::default()
            .with_default_extension(ron::extensions::Extensions::IMPLICIT_SOME)
            .with_default_extension(ron::extensions::Extensions::UNWRAP_NEWTYPES)
    }

    /// Deserialize a .ron file's contents.
    /// Panics if the input is not valid .ron.
    pub fn deserialize(input: &str) -> Self {
        Self::ron().from_str::<Config>(input).unwrap()
    }

    /// An example configuration with some fields filled in.
    pub fn example() -> Self {
        Self {
            broker: Broker {
                host: "broker.local".into(),
                status_topic: Some("home/devices/ardulink/connection".into()),
                ..Default::default()
            },
            digital_pins: vec![2, 3],
            analog_pins: vec![0],
            link: LinkLocation::Serial {
                port: Some("/dev/ttyACM0".into()),
                baud: serial::DEFAULT_BAUD,
            },
            ..Default::default()
        }
    }

    /// Serialize the configuration in a "pretty" (i.e. non-compact) fashion.
    pub fn serialize_pretty(&self) -> String {
        Self::ron()
            .to_string_pretty(self, ron::ser::PrettyConfig::default())
            .unwrap()
    }

    /// Setup a new configuration from a RON file.
    pub fn new_from_path<P: AsRef<Path>>(p: P) -> Self {
        let s = std::fs::read_to_string(p).unwrap();

        Self::deserialize(&s)
    }

    /// The proxy settle delay as a [`Duration`].
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}
