#![deny(missing_docs)]

//! Bridges a microcontroller's serial line protocol to an MQTT broker,
//! and exposes local device links over TCP so remote processes can use
//! them as if they were local.
//!
//! Inbound pub/sub messages are matched against the configured topic
//! namespace and turned into pin commands on the device link.
//! Pin state changes the device reports are published back out.
//!
//! The proxy server speaks a small line-based handshake (list ports,
//! connect) before turning into a transparent byte relay in both
//! directions. The bridge can drive a device behind such a proxy
//! instead of a local serial port.

/// The bidirectional translator between pub/sub messages and the device link.
pub mod bridge;

/// The command line interface.
pub mod cli;

/// Relates to config files.
pub mod config;

/// Possible errors in this library.
pub mod error;

/// Device links: serial, remote (proxied), and mock.
pub mod link;

/// Logging/tracing setup.
pub mod logging;

/// Keeps the broker connection alive and routes messages through the bridge.
pub mod mqtt;

/// Pins and pin events.
pub mod pin;

/// The textual device frame protocol.
pub mod protocol;

/// The TCP proxy server and its wire vocabulary.
pub mod proxy;

/// The pub/sub topic namespace.
pub mod topic;
