//! Node notification source backed by RPC polling.
//!
//! Each round compares the chain tip and the mempool with what the previous
//! round saw and forwards the differences as [`NodeEvent`]s. The first round
//! only records a baseline, so a restart does not replay the whole mempool.

use crate::events::listener::NodeEvent;
use crate::rpc::{NodeRpc, RpcError};
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Why a poll round stopped early
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("node event listener closed")]
    Closed,
}

/// Polls the node and feeds a [`NodeEventListener`](crate::events::NodeEventListener)
pub struct NodePoller {
    rpc: Arc<dyn NodeRpc>,
    sender: mpsc::Sender<NodeEvent>,
    interval: Duration,
    tip: Option<String>,
    mempool: Option<HashSet<String>>,
}

impl NodePoller {
    pub fn new(rpc: Arc<dyn NodeRpc>, sender: mpsc::Sender<NodeEvent>, interval: Duration) -> Self {
        Self {
            rpc,
            sender,
            interval,
            tip: None,
            mempool: None,
        }
    }

    /// One comparison round. Returns how many notifications were forwarded.
    pub async fn poll_once(&mut self) -> Result<usize, PollError> {
        let mut sent = 0;

        let tip = self.best_block_hash().await?;
        match self.tip.as_deref() {
            Some(previous) if previous != tip => {
                let hash = hex::decode(&tip)
                    .map_err(|e| RpcError::Decode(format!("getbestblockhash: {e}")))?;
                self.forward(NodeEvent::Block(hash)).await?;
                sent += 1;
            }
            _ => {}
        }
        self.tip = Some(tip);

        let current = self.mempool_txids().await?;
        if let Some(seen) = &self.mempool {
            let fresh: Vec<&String> = current.iter().filter(|id| !seen.contains(*id)).collect();
            for txid in fresh {
                let Some(raw) = self.raw_transaction(txid).await else {
                    continue;
                };
                self.forward(NodeEvent::Transaction(raw)).await?;
                sent += 1;
            }
        }
        self.mempool = Some(current);

        Ok(sent)
    }

    /// Poll every interval until the listener goes away
    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval = ?self.interval, "node event poller started");

        loop {
            ticker.tick().await;
            if self.sender.is_closed() {
                break;
            }
            match self.poll_once().await {
                Ok(0) => {}
                Ok(sent) => debug!(sent, "node notifications forwarded"),
                Err(PollError::Closed) => break,
                Err(PollError::Rpc(e)) => warn!(error = %e, "node poll failed"),
            }
        }
        info!("node event listener gone, stopping poller");
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn forward(&self, event: NodeEvent) -> Result<(), PollError> {
        self.sender.send(event).await.map_err(|_| PollError::Closed)
    }

    async fn best_block_hash(&self) -> Result<String, RpcError> {
        match self.rpc.call("getbestblockhash", vec![]).await? {
            Value::String(hash) => Ok(hash),
            other => Err(RpcError::Decode(format!(
                "getbestblockhash: expected string, got {other}"
            ))),
        }
    }

    async fn mempool_txids(&self) -> Result<HashSet<String>, RpcError> {
        let ids = self.rpc.call("getrawmempool", vec![]).await?;
        let ids = ids
            .as_array()
            .ok_or_else(|| RpcError::Decode("getrawmempool: expected array".into()))?;
        Ok(ids
            .iter()
            .filter_map(|id| id.as_str().map(str::to_string))
            .collect())
    }

    /// Transactions can leave the mempool between calls; those are skipped
    async fn raw_transaction(&self, txid: &str) -> Option<Vec<u8>> {
        let raw = match self
            .rpc
            .call("getrawtransaction", vec![json!(txid), json!(false)])
            .await
        {
            Ok(Value::String(raw)) => raw,
            Ok(_) => {
                debug!(txid, "getrawtransaction returned a non-string result");
                return None;
            }
            Err(e) => {
                debug!(txid, error = %e, "mempool transaction unavailable");
                return None;
            }
        };
        hex::decode(raw)
            .map_err(|e| debug!(txid, error = %e, "mempool transaction is not hex"))
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::testing::MockNode;

    const TIP_A: &str = "000000000019d6689c085ae165831e934ff763ae46a2a6c172b3f1b60a8ce26f";
    const TIP_B: &str = "00000000839a8e6886ab5951d76f411475428afc90947ee320161bbf18eb6048";

    fn node(tip: &str, mempool: Value) -> Arc<MockNode> {
        let node = Arc::new(MockNode::default());
        node.returns("getbestblockhash", json!(tip))
            .returns("getrawmempool", mempool);
        node.on("getrawtransaction", |params| match params[0].as_str() {
            Some("gone") => Err(RpcError::Node {
                code: -5,
                message: "No such mempool transaction".into(),
            }),
            Some(txid) => Ok(json!(format!("beef{}", &txid[..2]))),
            None => Ok(Value::Null),
        });
        node
    }

    #[tokio::test]
    async fn test_first_round_is_baseline() {
        let node = node(TIP_A, json!(["aa"]));
        let (tx, mut rx) = mpsc::channel(8);
        let mut poller = NodePoller::new(node, tx, Duration::from_secs(1));

        assert_eq!(poller.poll_once().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_forwards_new_tip_and_mempool_entries() {
        let node = node(TIP_A, json!(["aa"]));
        let (tx, mut rx) = mpsc::channel(8);
        let mut poller = NodePoller::new(node.clone(), tx, Duration::from_secs(1));
        poller.poll_once().await.unwrap();

        node.returns("getbestblockhash", json!(TIP_B))
            .returns("getrawmempool", json!(["aa", "cc", "gone"]));
        assert_eq!(poller.poll_once().await.unwrap(), 2);

        assert_eq!(
            rx.recv().await,
            Some(NodeEvent::Block(hex::decode(TIP_B).unwrap()))
        );
        assert_eq!(
            rx.recv().await,
            Some(NodeEvent::Transaction(vec![0xbe, 0xef, 0xcc]))
        );

        // nothing changed since the last round
        assert_eq!(poller.poll_once().await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_rpc_failure_is_reported() {
        let node = Arc::new(MockNode::default());
        let (tx, _rx) = mpsc::channel(8);
        let mut poller = NodePoller::new(node, tx, Duration::from_secs(1));
        assert!(matches!(
            poller.poll_once().await,
            Err(PollError::Rpc(RpcError::Transport(_)))
        ));
    }

    #[tokio::test]
    async fn test_stops_when_listener_is_gone() {
        let node = node(TIP_A, json!([]));
        let (tx, rx) = mpsc::channel(8);
        let mut poller = NodePoller::new(node.clone(), tx, Duration::from_secs(1));
        poller.poll_once().await.unwrap();

        drop(rx);
        node.returns("getbestblockhash", json!(TIP_B));
        assert!(matches!(poller.poll_once().await, Err(PollError::Closed)));

        let handle = poller.spawn();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
