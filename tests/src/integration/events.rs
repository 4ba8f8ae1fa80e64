//! # Event Fan-Out Flows
//!
//! Node notifications pumped through the listener into the fan-out manager:
//!
//! 1. **Block**: raw hash bytes → lowercase hex → every inv subscriber once
//! 2. **Transaction**: raw bytes → decoded once → transformed view
//! 3. **Isolation**: a closed subscriber does not stop delivery to the rest

#[cfg(test)]
mod tests {
    use insight_gateway::domain::Network;
    use insight_gateway::events::{
        ChannelSubscriber, DeliveryError, Event, EventCategory, EventFanOut, NodeEvent,
        NodeEventListener, Subscriber,
    };
    use insight_gateway::GatewayMetrics;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    // =============================================================================
    // TEST FIXTURES
    // =============================================================================

    /// Block 170 spend: the first bitcoin transaction between two parties
    const TX_170: &str = "0100000001c997a5e56e104102fa209c6a852dd90660a20b2d9c352423edce25857fcd3704000000004847304402204e45e16932b8af514961a1d3a1a25fdf3f4f7732e9d624c6c61548ab5fb8cd410220181522ec8eca07de4860a4acdd12909d831cc56cbbac4622082221a8768d1d0901ffffffff0200ca9a3b00000000434104ae1a62fe09c5f51b13905f07f06b99a2f7159b2225f374cd378d71302fa28414e7aab37397f554a7df5f142c21c1b7303b8a0626f1baded5c72a704f7e6cd84cac00286bee0000000043410411db93e1dcdb8a016b49840f8c53bc1eb68a382e97b1482ecad7b148a6909a5cb2e0eaddfb84ccf9744464f82e160bfa9b8b64f9d4c03f999b8643f656b412a3ac00000000";
    const TX_170_ID: &str = "f4184fc596403b9d638783cf57adfe4c75c605f6356fbc91338530e9831e9e16";

    struct Refusing;

    impl Subscriber for Refusing {
        fn receive(&self, _event: &Event) -> Result<(), DeliveryError> {
            Err(DeliveryError::Rejected("socket gone".into()))
        }
    }

    async fn next(rx: &mut tokio::sync::mpsc::Receiver<Event>) -> Event {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("event within timeout")
            .expect("channel open")
    }

    // =============================================================================
    // INTEGRATION TESTS: NODE EVENTS → FAN-OUT
    // =============================================================================

    #[tokio::test]
    async fn test_node_events_reach_every_subscriber_once() {
        let metrics = Arc::new(GatewayMetrics::new());
        let fanout =
            Arc::new(EventFanOut::new(Network::Livenet).with_metrics(Arc::clone(&metrics)));

        let (first, mut first_rx) = ChannelSubscriber::new("first", 8);
        let (second, mut second_rx) = ChannelSubscriber::new("second", 8);
        let first: Arc<dyn Subscriber> = first;
        assert!(fanout.subscribe(EventCategory::Inv, Arc::clone(&first)));
        assert!(!fanout.subscribe(EventCategory::Inv, Arc::clone(&first)));
        assert!(fanout.subscribe(EventCategory::Inv, second));
        assert!(fanout.subscribe(EventCategory::Inv, Arc::new(Refusing)));

        let (sender, listener) = NodeEventListener::channel(Arc::clone(&fanout), 8);
        let pump = listener.spawn();

        let block_hash = [0xabu8; 32];
        sender.send(NodeEvent::Block(block_hash.to_vec())).await.unwrap();
        sender
            .send(NodeEvent::Transaction(hex::decode(TX_170).unwrap()))
            .await
            .unwrap();
        drop(sender);
        pump.await.unwrap();

        for rx in [&mut first_rx, &mut second_rx] {
            assert_eq!(next(rx).await, Event::Block("ab".repeat(32)));
            match next(rx).await {
                Event::Tx(tx) => {
                    assert_eq!(tx.txid, TX_170_ID);
                    assert_eq!(tx.value_out, 50.0);
                    assert!(!tx.is_rbf);
                }
                other => panic!("expected tx event, got {other:?}"),
            }
            // exactly once: nothing else queued
            assert!(rx.try_recv().is_err());
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.events_published, 2);
        assert_eq!(snapshot.deliveries, 4);
        assert_eq!(snapshot.delivery_failures, 2);
    }

    #[tokio::test]
    async fn test_unsubscribed_listener_gets_nothing() {
        let fanout = Arc::new(EventFanOut::new(Network::Livenet));
        let (sub, mut rx) = ChannelSubscriber::new("gone", 4);
        let sub: Arc<dyn Subscriber> = sub;

        assert!(!fanout.unsubscribe(EventCategory::Inv, &sub));
        fanout.subscribe(EventCategory::Inv, Arc::clone(&sub));
        assert!(fanout.unsubscribe(EventCategory::Inv, &sub));

        let report = fanout.on_block(&[0x01; 32]);
        assert_eq!(report.delivered, 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_undecodable_transaction_is_dropped() {
        let fanout = Arc::new(EventFanOut::new(Network::Livenet));
        let (sub, mut rx) = ChannelSubscriber::new("sub", 4);
        fanout.subscribe(EventCategory::Inv, sub);

        let (sender, listener) = NodeEventListener::channel(Arc::clone(&fanout), 4);
        let pump = listener.spawn();
        sender.send(NodeEvent::Transaction(vec![0x01, 0x00])).await.unwrap();
        sender.send(NodeEvent::Block(vec![0x2a])).await.unwrap();
        drop(sender);
        pump.await.unwrap();

        assert_eq!(next(&mut rx).await, Event::Block("2a".into()));
        assert!(rx.try_recv().is_err());
    }
}
