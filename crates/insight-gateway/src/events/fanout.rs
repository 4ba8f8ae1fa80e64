//! Event fan-out manager.
//!
//! Owns the subscription registry and delivers node notifications (`block`,
//! `tx`) to every registered subscriber exactly once per publish.
//!
//! Registry mutations take the write lock once per operation. Publishing
//! snapshots the subscriber list under the read lock and delivers outside
//! it, so subscribers may subscribe or unsubscribe from inside `receive`
//! without deadlocking; such changes apply from the next publish.

use crate::domain::network::Network;
use crate::domain::transaction::{DecodeError, InvTransaction, RawTransaction};
use crate::middleware::metrics::GatewayMetrics;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Subscription group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventCategory {
    /// New blocks and transactions
    Inv,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Inv => "inv",
        }
    }

    /// Event names published in this category
    pub fn events(&self) -> &'static [&'static str] {
        match self {
            EventCategory::Inv => &["tx", "block"],
        }
    }
}

/// A published notification
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Lowercase hex block hash
    Block(String),
    /// Decoded transaction view
    Tx(InvTransaction),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::Block(_) => "block",
            Event::Tx(_) => "tx",
        }
    }

    pub fn category(&self) -> EventCategory {
        EventCategory::Inv
    }

    /// JSON payload as delivered to remote consumers
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Event::Block(hash) => serde_json::Value::String(hash.clone()),
            Event::Tx(tx) => serde_json::to_value(tx).unwrap_or_default(),
        }
    }
}

/// Per-subscriber delivery failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("subscriber channel closed")]
    Closed,
    #[error("subscriber queue full")]
    Full,
    #[error("subscriber rejected event: {0}")]
    Rejected(String),
    #[error("subscriber panicked")]
    Panicked,
}

/// Anything that can receive a named event.
///
/// Identity is the allocation behind the `Arc`: registering the same `Arc`
/// twice is a no-op, two separate allocations are two subscribers.
pub trait Subscriber: Send + Sync {
    fn receive(&self, event: &Event) -> Result<(), DeliveryError>;

    /// Label used in logs
    fn label(&self) -> &str {
        "subscriber"
    }
}

fn same_subscriber(a: &Arc<dyn Subscriber>, b: &Arc<dyn Subscriber>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Event descriptor advertised to remote consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishedEvents {
    pub name: &'static str,
    pub events: Vec<&'static str>,
}

/// Outcome of one publish
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    pub delivered: usize,
    pub failed: usize,
}

/// Subscription registry and publish protocol
pub struct EventFanOut {
    network: Network,
    registry: RwLock<HashMap<EventCategory, Vec<Arc<dyn Subscriber>>>>,
    metrics: Option<Arc<GatewayMetrics>>,
}

impl EventFanOut {
    pub fn new(network: Network) -> Self {
        Self {
            network,
            registry: RwLock::new(HashMap::new()),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GatewayMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Register `subscriber` for `category`. Returns `false` if it was
    /// already registered.
    pub fn subscribe(&self, category: EventCategory, subscriber: Arc<dyn Subscriber>) -> bool {
        let mut registry = self.registry.write();
        let list = registry.entry(category).or_default();
        if list.iter().any(|s| same_subscriber(s, &subscriber)) {
            return false;
        }
        debug!(category = category.as_str(), subscriber = subscriber.label(), "subscribed");
        list.push(subscriber);
        true
    }

    /// Remove `subscriber` from `category`. Returns `false` if it was not
    /// registered.
    pub fn unsubscribe(&self, category: EventCategory, subscriber: &Arc<dyn Subscriber>) -> bool {
        let mut registry = self.registry.write();
        let Some(list) = registry.get_mut(&category) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| !same_subscriber(s, subscriber));
        let removed = list.len() != before;
        if removed {
            debug!(category = category.as_str(), subscriber = subscriber.label(), "unsubscribed");
        }
        removed
    }

    pub fn subscriber_count(&self, category: EventCategory) -> usize {
        self.registry
            .read()
            .get(&category)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Deliver `event` to every subscriber of `category`, in registration
    /// order. A failing or panicking subscriber does not stop delivery to
    /// the rest.
    pub fn publish(&self, category: EventCategory, event: &Event) -> DeliveryReport {
        let snapshot: Vec<Arc<dyn Subscriber>> = self
            .registry
            .read()
            .get(&category)
            .cloned()
            .unwrap_or_default();

        let mut report = DeliveryReport::default();
        for subscriber in &snapshot {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscriber.receive(event)))
                .unwrap_or(Err(DeliveryError::Panicked));

            match outcome {
                Ok(()) => report.delivered += 1,
                Err(error) => {
                    report.failed += 1;
                    warn!(
                        subscriber = subscriber.label(),
                        event = event.name(),
                        error = %error,
                        "event delivery failed"
                    );
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_event(report.delivered as u64, report.failed as u64);
        }
        debug!(
            event = event.name(),
            delivered = report.delivered,
            failed = report.failed,
            "event published"
        );
        report
    }

    /// New block notification; only the hex hash is published
    pub fn on_block(&self, hash: &[u8]) -> DeliveryReport {
        let event = Event::Block(hex::encode(hash));
        self.publish(EventCategory::Inv, &event)
    }

    /// New transaction notification. The raw bytes are decoded once and the
    /// transformed view is published.
    pub fn on_transaction(&self, raw: &[u8]) -> Result<DeliveryReport, DecodeError> {
        let tx = RawTransaction::decode(raw).map_err(|e| {
            warn!(error = %e, len = raw.len(), "dropping undecodable transaction");
            e
        })?;
        let event = Event::Tx(InvTransaction::from_transaction(&tx, self.network));
        Ok(self.publish(EventCategory::Inv, &event))
    }

    /// Events this manager publishes, per category
    pub fn publish_events(&self) -> Vec<PublishedEvents> {
        [EventCategory::Inv]
            .into_iter()
            .map(|category| PublishedEvents {
                name: category.as_str(),
                events: category.events().to_vec(),
            })
            .collect()
    }
}

impl std::fmt::Debug for EventFanOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventFanOut")
            .field("network", &self.network)
            .field("inv_subscribers", &self.subscriber_count(EventCategory::Inv))
            .finish()
    }
}

/// Subscriber that forwards events into a bounded tokio channel
#[derive(Debug)]
pub struct ChannelSubscriber {
    label: String,
    tx: mpsc::Sender<Event>,
}

impl ChannelSubscriber {
    pub fn new(label: impl Into<String>, capacity: usize) -> (Arc<Self>, mpsc::Receiver<Event>) {
        let (tx, rx) = mpsc::channel(capacity);
        let subscriber = Arc::new(Self {
            label: label.into(),
            tx,
        });
        (subscriber, rx)
    }
}

impl Subscriber for ChannelSubscriber {
    fn receive(&self, event: &Event) -> Result<(), DeliveryError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    fn label(&self) -> &str {
        &self.label
    }
}
