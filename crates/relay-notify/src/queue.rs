//! Coalescing delivery queue.
//!
//! Payloads are keyed by sku. A key not yet pending is appended in arrival
//! order; re-enqueueing a pending key overwrites its payload in place
//! without changing its delivery position. A single drain loop (guarded by
//! a boolean cleared only when the queue empties) delivers the oldest key
//! to every destination, waits for all attempts to settle, removes the
//! entry regardless of outcome, and moves on. When more keys are pending
//! than the configured threshold, each delivery is preceded by a fixed
//! pause to stay under the destinations' rate limits.
//!
//! `enqueue` never blocks and never surfaces errors; delivery failures are
//! logged and swallowed.

use crate::webhook::{DeliverySink, Webhook};
use parking_lot::Mutex;
use relay_core::Sku;
use relay_telemetry::Metrics;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Queue throttling configuration.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Pending-key count above which deliveries are paused.
    pub pause_threshold: usize,
    /// Pause inserted before a delivery while above the threshold.
    pub pause: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            pause_threshold: 5,
            pause: Duration::from_millis(500),
        }
    }
}

#[derive(Default)]
struct QueueInner {
    order: VecDeque<Sku>,
    pending: HashMap<Sku, Webhook>,
    draining: bool,
}

/// Order-preserving, coalescing fan-out queue.
pub struct DeliveryQueue {
    urls: Vec<String>,
    sink: Arc<dyn DeliverySink>,
    config: QueueConfig,
    inner: Mutex<QueueInner>,
}

impl DeliveryQueue {
    /// Create a queue delivering to the given destination URLs.
    pub fn new(urls: Vec<String>, sink: Arc<dyn DeliverySink>, config: QueueConfig) -> Arc<Self> {
        Arc::new(Self {
            urls,
            sink,
            config,
            inner: Mutex::new(QueueInner::default()),
        })
    }

    /// Insert or overwrite the payload for a key.
    ///
    /// Starts a drain if none is active. Never blocks the caller.
    pub fn enqueue(self: &Arc<Self>, sku: Sku, payload: Webhook) {
        let start_drain = {
            let mut inner = self.inner.lock();
            if inner.pending.insert(sku.clone(), payload).is_none() {
                inner.order.push_back(sku);
            }
            Metrics::queue_depth(inner.pending.len() as i64);
            if inner.draining {
                false
            } else {
                inner.draining = true;
                true
            }
        };

        if start_drain {
            let queue = Arc::clone(self);
            tokio::spawn(async move { queue.drain().await });
        }
    }

    /// Number of pending keys.
    pub fn depth(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Whether a drain loop is currently active.
    pub fn is_draining(&self) -> bool {
        self.inner.lock().draining
    }

    /// Single-flight drain loop.
    async fn drain(self: Arc<Self>) {
        loop {
            let (sku, payload, depth) = {
                let mut inner = self.inner.lock();
                let Some(sku) = inner.order.front().cloned() else {
                    inner.draining = false;
                    debug!("Delivery queue drained");
                    return;
                };
                // order and pending move together; a key at the front is
                // always pending.
                let Some(payload) = inner.pending.get(&sku).cloned() else {
                    inner.order.pop_front();
                    continue;
                };
                (sku, payload, inner.pending.len())
            };

            // Evaluated fresh for each key, not once per drain.
            if depth > self.config.pause_threshold {
                debug!(depth, "Queue above pause threshold, throttling");
                tokio::time::sleep(self.config.pause).await;
            }

            let sink = self.sink.as_ref();
            let attempts = self.urls.iter().enumerate().map(|(index, url)| {
                let payload = &payload;
                async move { (index, sink.deliver(url, payload).await) }
            });
            let results = futures_util::future::join_all(attempts).await;

            for (index, result) in results {
                match result {
                    Ok(()) => {
                        Metrics::webhook_delivered(index);
                        info!(sku = %sku, destination = index, "Delivered price update");
                    }
                    Err(e) => {
                        Metrics::webhook_failed(index);
                        warn!(sku = %sku, destination = index, error = %e, "Webhook delivery failed");
                    }
                }
            }

            // Removed regardless of outcome; delivery attempts are not
            // retried.
            let mut inner = self.inner.lock();
            inner.pending.remove(&sku);
            if inner.order.front() == Some(&sku) {
                inner.order.pop_front();
            }
            Metrics::queue_depth(inner.pending.len() as i64);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{NotifyError, NotifyResult};
    use futures_util::future::BoxFuture;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::time::Instant;

    /// Sink recording every delivery with its timing, with optional scripted
    /// failures and an active-drain counter.
    struct RecordingSink {
        deliveries: Mutex<Vec<(String, String, Instant)>>,
        active: AtomicUsize,
        max_active: AtomicUsize,
        fail_all: bool,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                deliveries: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                fail_all: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                deliveries: Mutex::new(Vec::new()),
                active: AtomicUsize::new(0),
                max_active: AtomicUsize::new(0),
                fail_all: true,
            })
        }

        fn delivered(&self) -> Vec<(String, String)> {
            self.deliveries
                .lock()
                .iter()
                .map(|(url, content, _)| (url.clone(), content.clone()))
                .collect()
        }

        fn delivery_times(&self) -> Vec<Instant> {
            self.deliveries.lock().iter().map(|(_, _, at)| *at).collect()
        }
    }

    impl DeliverySink for RecordingSink {
        fn deliver<'a>(
            &'a self,
            url: &'a str,
            payload: &'a Webhook,
        ) -> BoxFuture<'a, NotifyResult<()>> {
            Box::pin(async move {
                let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.max_active.fetch_max(active, Ordering::SeqCst);
                // Hold the slot across a suspension point so overlapping
                // drains would be observable.
                tokio::task::yield_now().await;
                self.deliveries.lock().push((
                    url.to_string(),
                    payload.content.clone().unwrap_or_default(),
                    Instant::now(),
                ));
                self.active.fetch_sub(1, Ordering::SeqCst);
                if self.fail_all {
                    Err(NotifyError::Delivery { status: 429 })
                } else {
                    Ok(())
                }
            })
        }
    }

    fn payload(tag: &str) -> Webhook {
        Webhook {
            content: Some(tag.to_string()),
            ..Webhook::default()
        }
    }

    async fn settle(queue: &Arc<DeliveryQueue>) {
        // Paused clock: sleeping (instead of spinning) lets the runtime
        // auto-advance time past the drain's throttle pauses.
        while queue.is_draining() {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_coalescing_delivers_latest_payload_once() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        queue.enqueue(Sku::new("200;6"), payload("p1"));
        queue.enqueue(Sku::new("200;6"), payload("p2"));
        settle(&queue).await;

        let delivered = sink.delivered();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].1, "p2");
        assert_eq!(queue.depth(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delivery_order_matches_first_enqueue_order() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        queue.enqueue(Sku::new("1;6"), payload("a"));
        queue.enqueue(Sku::new("2;6"), payload("b"));
        queue.enqueue(Sku::new("3;6"), payload("c"));
        // Re-enqueueing a pending key must not change its position
        queue.enqueue(Sku::new("1;6"), payload("a2"));
        settle(&queue).await;

        let contents: Vec<String> = sink.delivered().into_iter().map(|(_, c)| c).collect();
        assert_eq!(contents, ["a2", "b", "c"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_drain_at_a_time() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        for i in 0..4 {
            queue.enqueue(Sku::new(format!("{i};6")), payload(&format!("p{i}")));
        }
        settle(&queue).await;

        // One destination and one drain: deliveries never overlap
        assert_eq!(sink.max_active.load(Ordering::SeqCst), 1);
        assert_eq!(sink.delivered().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_all_destinations_receive_each_key() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec![
                "https://hook.example/a".to_string(),
                "https://hook.example/b".to_string(),
            ],
            sink.clone(),
            QueueConfig::default(),
        );

        queue.enqueue(Sku::new("200;6"), payload("p"));
        settle(&queue).await;

        let mut urls: Vec<String> = sink.delivered().into_iter().map(|(url, _)| url).collect();
        urls.sort();
        assert_eq!(urls, ["https://hook.example/a", "https://hook.example/b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_delivery_removes_entry_and_continues() {
        let sink = RecordingSink::failing();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        queue.enqueue(Sku::new("1;6"), payload("a"));
        queue.enqueue(Sku::new("2;6"), payload("b"));
        settle(&queue).await;

        // Both attempted exactly once despite failures; nothing retried
        let contents: Vec<String> = sink.delivered().into_iter().map(|(_, c)| c).collect();
        assert_eq!(contents, ["a", "b"]);
        assert_eq!(queue.depth(), 0);
        assert!(!queue.is_draining());
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_pause_at_or_below_threshold() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        let started = Instant::now();
        for i in 0..5 {
            queue.enqueue(Sku::new(format!("{i};6")), payload(&format!("p{i}")));
        }
        settle(&queue).await;

        assert_eq!(sink.delivered().len(), 5);
        // No delivery ran above the threshold, so no throttle pause happened
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_applies_beyond_threshold() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        let started = Instant::now();
        for i in 0..6 {
            queue.enqueue(Sku::new(format!("{i};6")), payload(&format!("p{i}")));
        }
        settle(&queue).await;

        assert_eq!(sink.delivered().len(), 6);
        // Exactly one delivery ran while more than 5 keys were pending, so
        // exactly one 500ms pause was inserted.
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(1000));

        // And it was the over-threshold delivery that got pushed back
        let times = sink.delivery_times();
        assert!(times[0] - started >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_enqueue_after_drain_restarts() {
        let sink = RecordingSink::new();
        let queue = DeliveryQueue::new(
            vec!["https://hook.example/a".to_string()],
            sink.clone(),
            QueueConfig::default(),
        );

        queue.enqueue(Sku::new("1;6"), payload("a"));
        settle(&queue).await;
        assert!(!queue.is_draining());

        queue.enqueue(Sku::new("2;6"), payload("b"));
        settle(&queue).await;

        let contents: Vec<String> = sink.delivered().into_iter().map(|(_, c)| c).collect();
        assert_eq!(contents, ["a", "b"]);
    }
}
