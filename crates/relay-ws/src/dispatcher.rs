//! Inbound frame dispatch.
//!
//! Decodes each text frame as a tagged `StreamMessage` and fans price
//! updates out to subscribers synchronously, in registration order. A
//! subscriber panic is caught and logged so it cannot stop dispatch to the
//! remaining subscribers or future frames. Undecodable frames are dropped.

use crate::message::StreamMessage;
use parking_lot::RwLock;
use relay_core::PriceUpdate;
use relay_telemetry::Metrics;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::{debug, error, info, warn};

/// Price-update callback.
pub type PriceSubscriber = Box<dyn Fn(&PriceUpdate) + Send + Sync>;

/// What the connection loop should do after a frame was processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Nothing further; keep reading.
    Handled,
    /// The server asked for a fresh credential on the live socket.
    ReauthRequired,
}

/// Ordered subscriber fan-out for decoded price updates.
#[derive(Default)]
pub struct EventDispatcher {
    subscribers: RwLock<Vec<PriceSubscriber>>,
}

impl EventDispatcher {
    /// Create a dispatcher with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. Invocation order is registration order.
    pub fn subscribe(&self, subscriber: impl Fn(&PriceUpdate) + Send + Sync + 'static) {
        self.subscribers.write().push(Box::new(subscriber));
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Process one inbound text frame.
    pub fn dispatch(&self, text: &str) -> DispatchOutcome {
        let message: StreamMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Dropping undecodable frame");
                Metrics::frame_dropped();
                return DispatchOutcome::Handled;
            }
        };

        match message {
            StreamMessage::AuthRequired => {
                info!("Stream requested reauthentication");
                DispatchOutcome::ReauthRequired
            }
            StreamMessage::PriceUpdated { data } => {
                let update = data.into_update();
                Metrics::price_event();
                debug!(sku = %update.sku, buy = %update.buy, sell = %update.sell, "Price updated");

                let subscribers = self.subscribers.read();
                for (index, subscriber) in subscribers.iter().enumerate() {
                    if catch_unwind(AssertUnwindSafe(|| subscriber(&update))).is_err() {
                        error!(subscriber = index, sku = %update.sku, "Subscriber panicked");
                    }
                }
                DispatchOutcome::Handled
            }
            StreamMessage::Unknown => {
                debug!("Ignoring unrecognized frame");
                DispatchOutcome::Handled
            }
        }
    }
}
