//! Shared bookkeeping of which device links the proxy server holds open.
//!
//! Several clients may ask for the same port. The registry opens the
//! link once and hands the same handle out, counting users; the link is
//! torn down when the last user disconnects.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::error::Error;
use crate::link::{mock, serial, LinkHandle};

struct Entry {
    link: LinkHandle,
    users: usize,
}

enum Ports {
    /// Real serial ports on this host.
    Serial,

    /// A fixed set of named mock ports. Each opened device side is
    /// pushed to the channel so tests can play the microcontroller.
    Mock {
        names: Vec<String>,
        devices: mpsc::UnboundedSender<(String, mock::MockDevice)>,
    },
}

/// Opens, shares and closes device links on behalf of proxy clients.
#[derive(Clone)]
pub struct Registry {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    ports: Arc<Ports>,
}

impl Registry {
    /// A registry over the real serial ports of this host.
    pub fn serial() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ports: Arc::new(Ports::Serial),
        }
    }

    /// A registry over mock ports with the given names.
    ///
    /// The device side of every link opened through this registry
    /// arrives on the returned receiver, tagged with the port name.
    pub fn mock(
        names: &[&str],
    ) -> (Self, mpsc::UnboundedReceiver<(String, mock::MockDevice)>) {
        let (devices_tx, devices_rx) = mpsc::unbounded_channel();

        let registry = Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            ports: Arc::new(Ports::Mock {
                names: names.iter().map(|name| name.to_string()).collect(),
                devices: devices_tx,
            }),
        };

        (registry, devices_rx)
    }

    /// The port names this registry can open.
    pub fn port_list(&self) -> Vec<String> {
        match &*self.ports {
            Ports::Serial => serial::available_ports(),
            Ports::Mock { names, .. } => names.clone(),
        }
    }

    /// Get a link on `port`, opening it if no one holds it yet.
    pub(crate) fn connect(&self, port: &str, baud: u32) -> Result<LinkHandle, Error> {
        let mut entries = self.entries.lock().unwrap();

        if let Some(entry) = entries.get_mut(port) {
            entry.users += 1;
            debug!(%port, users = entry.users, "Sharing already open link");
            return Ok(entry.link.clone());
        }

        let link = self.open(port, baud)?;
        info!(%port, %baud, "Link opened for proxy use");

        entries.insert(
            port.to_string(),
            Entry {
                link: link.clone(),
                users: 1,
            },
        );

        Ok(link)
    }

    /// Drop one user of `port`, closing the link when none remain.
    pub(crate) fn disconnect(&self, port: &str) {
        let mut entries = self.entries.lock().unwrap();

        let Some(entry) = entries.get_mut(port) else {
            return;
        };

        entry.users -= 1;
        if entry.users > 0 {
            debug!(%port, users = entry.users, "Link still in use");
            return;
        }

        if let Some(entry) = entries.remove(port) {
            info!(%port, "Last user gone, closing link");
            entry.link.disconnect();
        }
    }

    /// How many links are currently held open.
    pub fn active_links(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    fn open(&self, port: &str, baud: u32) -> Result<LinkHandle, Error> {
        match &*self.ports {
            Ports::Serial => serial::open(port, baud),
            Ports::Mock { names, devices } => {
                if !names.iter().any(|name| name == port) {
                    return Err(Error::NoSuchPort(port.to_string()));
                }

                let (link, device) = mock::start(port);
                let _ = devices.send((port.to_string(), device));
                Ok(link)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn links_are_shared_and_refcounted() {
        let (registry, _devices) = Registry::mock(&["mock0"]);

        let first = registry.connect("mock0", 9600).unwrap();
        let second = registry.connect("mock0", 9600).unwrap();
        assert_eq!(registry.active_links(), 1);

        registry.disconnect("mock0");
        assert_eq!(registry.active_links(), 1);
        assert!(first.is_connected());

        registry.disconnect("mock0");
        assert_eq!(registry.active_links(), 0);

        // The link task shuts down once the registry lets go.
        second.closed().await;
        assert!(!second.is_connected());
    }

    #[tokio::test]
    async fn unknown_ports_are_refused() {
        let (registry, _devices) = Registry::mock(&["mock0"]);

        assert!(matches!(
            registry.connect("mock1", 9600),
            Err(Error::NoSuchPort(_))
        ));
        assert_eq!(registry.active_links(), 0);

        // Disconnecting something never connected is a no-op.
        registry.disconnect("mock1");
        assert_eq!(registry.active_links(), 0);
    }
}
