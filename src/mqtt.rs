//! The broker side of the bridge.
//!
//! One task owns the client and its event loop: inbound publishes are
//! fed to the [`Bridge`], outbound publications drained from a channel,
//! and broker loss survived by polling again after a fixed backoff.
//! rumqttc re-establishes the session on the next poll, so the retry
//! loop is just a sleep.

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bridge::{Bridge, Publication};
use crate::config::Config;
use crate::error::Error;
use crate::topic::TopicSpec;

/// How long to wait after losing the broker before polling again.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

/// Runs the broker connection and the bridge attached to it.
pub struct Service {
    client: AsyncClient,
    event_loop: EventLoop,
    bridge: Bridge,
    publications: mpsc::UnboundedReceiver<Publication>,
    filter: String,
    status_topic: Option<String>,
    shutdown: CancellationToken,
    connected: bool,
    connected_once: bool,
}

impl Service {
    /// Set up a broker connection per `config`, bridging through
    /// `bridge` and draining outbound messages from `publications`.
    ///
    /// Nothing talks to the broker until [`Service::run`].
    pub fn new(
        config: &Config,
        bridge: Bridge,
        publications: mpsc::UnboundedReceiver<Publication>,
        shutdown: CancellationToken,
    ) -> Self {
        let broker = &config.broker;

        let mut options = MqttOptions::new(&broker.client_id, &broker.host, broker.port);
        options.set_keep_alive(Duration::from_secs(5));

        if let Some(status_topic) = &broker.status_topic {
            // Should the process die uncleanly, the broker reports us
            // offline on our behalf.
            options.set_last_will(LastWill::new(
                status_topic,
                "false",
                QoS::AtLeastOnce,
                true,
            ));
        }

        let (client, event_loop) = AsyncClient::new(options, 100);
        let filter = TopicSpec::new(&config.base_topic).subscription_filter();

        Self {
            client,
            event_loop,
            bridge,
            publications,
            filter,
            status_topic: broker.status_topic.clone(),
            shutdown,
            connected: false,
            connected_once: false,
        }
    }

    /// Drive the connection until shut down.
    pub async fn run(mut self) -> Result<(), Error> {
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => {
                    info!("Shutting down broker connection");
                    self.close().await?;
                    return Ok(());
                }

                publication = self.publications.recv() => {
                    let Some(publication) = publication else {
                        // The bridge holds a sender for as long as we
                        // hold the bridge.
                        continue;
                    };

                    self.forward_publication(publication);
                }

                event = self.event_loop.poll() => match event {
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("Broker connected");
                        self.connected = true;
                        self.connected_once = true;

                        if let Err(e) = self.client.try_subscribe(&self.filter, QoS::AtMostOnce) {
                            warn!(?e, "Subscribe failed");
                        }
                        self.publish_status(true);
                    }
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let payload = String::from_utf8_lossy(&publish.payload);
                        debug!(topic = %publish.topic, %payload, "Inbound message");

                        self.bridge.handle_inbound(&publish.topic, &payload);
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(?e, "Broker connection lost, retrying");
                        self.connected = false;
                        tokio::time::sleep(RECONNECT_BACKOFF).await;
                    }
                },
            }
        }
    }

    /// Hand an outbound publication to the client.
    ///
    /// Events during an outage are dropped, not queued, so the broker
    /// never sees a backlog of stale pin states after a reconnect.
    /// Returns whether the publication went out.
    fn forward_publication(&self, publication: Publication) -> bool {
        if !self.connected {
            debug!(topic = %publication.topic, "Broker offline, publication dropped");
            return false;
        }

        if let Err(e) = self.client.try_publish(
            publication.topic,
            QoS::AtMostOnce,
            false,
            publication.payload,
        ) {
            warn!(?e, "Publish dropped");
            return false;
        }

        true
    }

    /// Publish `true`/`false` on the status topic, retained. A no-op if
    /// no status topic is configured.
    fn publish_status(&self, online: bool) {
        let Some(status_topic) = &self.status_topic else {
            return;
        };

        let payload = if online { "true" } else { "false" };
        if let Err(e) = self
            .client
            .try_publish(status_topic, QoS::AtLeastOnce, true, payload)
        {
            warn!(?e, "Status publish dropped");
        }
    }

    /// Leave the broker tidily: unsubscribe, report offline, disconnect.
    ///
    /// Tolerates never having connected at all.
    async fn close(&mut self) -> Result<(), Error> {
        self.bridge.shutdown();

        if !self.connected_once {
            debug!("Never connected, nothing to tear down");
            return Ok(());
        }

        self.client.unsubscribe(&self.filter).await?;
        self.publish_status(false);
        self.client.disconnect().await?;

        // The requests above only sit in a queue until the event loop
        // runs. Poll it until the disconnect goes through.
        for _ in 0..8 {
            if self.event_loop.poll().await.is_err() {
                break;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::mock;

    #[tokio::test]
    async fn shutdown_without_connection_is_a_no_op() {
        let config = Config {
            broker: crate::config::Broker {
                // Nothing listens here.
                port: 1,
                ..Default::default()
            },
            ..Default::default()
        };

        let (link, _device) = mock::start("mock0");
        let (publications_tx, publications_rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(TopicSpec::new(&config.base_topic), link, publications_tx);

        let shutdown = CancellationToken::new();
        let service = Service::new(&config, bridge, publications_rx, shutdown.clone());

        // Cancelled before the first poll: run must come back clean
        // without ever reaching for the broker.
        shutdown.cancel();
        service.run().await.unwrap();
    }

    #[tokio::test]
    async fn outage_publications_are_dropped_not_queued() {
        let config = Config::default();

        let (link, _device) = mock::start("mock0");
        let (publications_tx, publications_rx) = mpsc::unbounded_channel();
        let bridge = Bridge::new(TopicSpec::new(&config.base_topic), link, publications_tx);

        let mut service = Service::new(
            &config,
            bridge,
            publications_rx,
            CancellationToken::new(),
        );

        let publication = || Publication {
            topic: "home/devices/ardulink/D2/value/get".into(),
            payload: "1".into(),
        };

        // No broker yet: nothing may reach the client, not even its
        // request queue.
        assert!(!service.forward_publication(publication()));

        // Connected: the client takes it (delivery is its business).
        service.connected = true;
        assert!(service.forward_publication(publication()));
    }
}
