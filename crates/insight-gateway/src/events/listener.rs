//! Pump from the node's notification stream into the fan-out manager.

use crate::events::fanout::EventFanOut;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Raw notification from the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Hash of a newly connected block
    Block(Vec<u8>),
    /// Serialized transaction seen by the node
    Transaction(Vec<u8>),
}

impl NodeEvent {
    fn kind(&self) -> &'static str {
        match self {
            NodeEvent::Block(_) => "block",
            NodeEvent::Transaction(_) => "tx",
        }
    }
}

/// Consumes [`NodeEvent`]s and publishes them
pub struct NodeEventListener {
    fanout: Arc<EventFanOut>,
    receiver: mpsc::Receiver<NodeEvent>,
}

impl NodeEventListener {
    pub fn new(fanout: Arc<EventFanOut>, receiver: mpsc::Receiver<NodeEvent>) -> Self {
        Self { fanout, receiver }
    }

    /// Channel sender plus a listener bound to it
    pub fn channel(fanout: Arc<EventFanOut>, capacity: usize) -> (mpsc::Sender<NodeEvent>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self::new(fanout, rx))
    }

    /// Run until every sender is dropped
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            let kind = event.kind();
            // one bad notification must not end the pump
            if catch_unwind(AssertUnwindSafe(|| self.handle(event))).is_err() {
                error!(event = kind, "node event handler panicked, event skipped");
            }
        }
        info!("node event stream closed, stopping listener");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    fn handle(&self, event: NodeEvent) {
        match event {
            NodeEvent::Block(hash) => {
                self.fanout.on_block(&hash);
            }
            NodeEvent::Transaction(raw) => {
                // decode failures are logged by the manager
                if self.fanout.on_transaction(&raw).is_err() {
                    debug!("transaction notification skipped");
                }
            }
        }
    }
}
