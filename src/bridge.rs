//! The bidirectional bridge between pub/sub messages and the device link.
//!
//! This is a best-effort bridge, not a validating gateway: anything
//! malformed on the inbound side is dropped without side effects, and
//! no error ever crosses this boundary.

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{debug, info_span, trace, Instrument};

use crate::link::{LinkEvent, LinkHandle};
use crate::pin::{DigitalState, PinId, PinKind};
use crate::topic::{parse_lenient_bool, TopicSpec};

/// An outbound message for the publish sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    /// The topic to publish on.
    pub topic: String,

    /// The payload: the stringified pin value.
    pub payload: String,
}

/// Translates between the topic namespace and device link calls.
pub struct Bridge {
    topics: TopicSpec,
    link: LinkHandle,
    publisher: mpsc::UnboundedSender<Publication>,
    forwarders: Vec<JoinHandle<()>>,
}

impl Bridge {
    /// A bridge over `link`, pushing outbound messages into `publisher`.
    pub fn new(
        topics: TopicSpec,
        link: LinkHandle,
        publisher: mpsc::UnboundedSender<Publication>,
    ) -> Self {
        Self {
            topics,
            link,
            publisher,
            forwarders: Vec::new(),
        }
    }

    /// Handle one inbound pub/sub message.
    ///
    /// The digital write pattern is tried first, then the analog one;
    /// the first pattern that matches wins and fires at most one device
    /// command. Anything else is silently dropped.
    pub fn handle_inbound(&self, topic: &str, payload: &str) {
        if !self.handle_digital(topic, payload) {
            self.handle_analog(topic, payload);
        }
    }

    fn handle_digital(&self, topic: &str, payload: &str) -> bool {
        let Some(pin) = self.topics.match_write(PinKind::Digital, topic) else {
            return false;
        };

        let state = if parse_lenient_bool(payload) {
            DigitalState::High
        } else {
            DigitalState::Low
        };

        trace!(%pin, ?state, "Digital write");
        if self.link.send_power_pin_switch(pin, state).is_err() {
            debug!(%pin, "Link closed, digital write dropped");
        }

        true
    }

    fn handle_analog(&self, topic: &str, payload: &str) -> bool {
        let Some(pin) = self.topics.match_write(PinKind::Analog, topic) else {
            return false;
        };

        // A non-integer intensity is dropped, not an error.
        let Ok(intensity) = payload.parse::<i32>() else {
            return false;
        };

        trace!(%pin, intensity, "Analog write");
        if self.link.send_power_pin_intensity(pin, intensity).is_err() {
            debug!(%pin, "Link closed, analog write dropped");
        }

        true
    }

    /// Publish the state of `pin` whenever the device reports a change.
    ///
    /// Filtering is exact: events for any other pin on the same link
    /// never reach this subscription.
    pub fn enable_pin_change_forwarding(&mut self, pin: PinId) {
        self.forward(pin, None);
    }

    /// Like [`Bridge::enable_pin_change_forwarding`], but a change is
    /// only published when it differs from the last published value by
    /// more than `tolerance`. The first value always goes out.
    ///
    /// Keeps chatty analog pins from flooding the broker with noise.
    pub fn enable_pin_change_forwarding_with_tolerance(&mut self, pin: PinId, tolerance: i32) {
        self.forward(pin, Some(tolerance));
    }

    fn forward(&mut self, pin: PinId, tolerance: Option<i32>) {
        let events = self.link.events();
        let topic = self.topics.read_topic(pin);
        let publisher = self.publisher.clone();

        let span = info_span!("forward", %pin);
        self.forwarders.push(tokio::spawn(
            forward_pin_changes(pin, topic, tolerance, events, publisher).instrument(span),
        ));
    }

    /// Stop all forwarding subscriptions.
    pub fn shutdown(&mut self) {
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn forward_pin_changes(
    pin: PinId,
    topic: String,
    tolerance: Option<i32>,
    mut events: broadcast::Receiver<LinkEvent>,
    publisher: mpsc::UnboundedSender<Publication>,
) {
    let mut last_published: Option<i32> = None;

    loop {
        match events.recv().await {
            Ok(LinkEvent::PinChange(event)) if event.pin == pin => {
                trace!(value = event.value, "Pin changed");

                if let (Some(tolerance), Some(last)) = (tolerance, last_published) {
                    if (event.value - last).abs() <= tolerance {
                        trace!(value = event.value, last, "Within tolerance, not published");
                        continue;
                    }
                }
                last_published = Some(event.value);

                let publication = Publication {
                    topic: topic.clone(),
                    payload: event.value.to_string(),
                };
                if publisher.send(publication).is_err() {
                    break;
                }
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                debug!(missed, "Forwarder fell behind, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }

    debug!("Forwarding stopped");
}
