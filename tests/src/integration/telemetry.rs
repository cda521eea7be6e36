//! Prometheus export after real traffic.

#[cfg(test)]
mod tests {
    use crate::integration::support::{context, eventually};
    use shared_net::LoopbackNetwork;
    use shared_types::msgs::Int32;
    use shared_types::AdvertiseMessageOptions;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use transport_node::Node;
    use transport_telemetry::{encode_metrics, register_metrics};

    #[tokio::test]
    async fn test_metrics_export_after_traffic() {
        // Only one registration per process succeeds
        let _handle = register_metrics().ok();

        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Node::new(&ctx);

        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        assert!(node.subscribe::<Int32, _>("/metered", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let handle = node.advertise::<Int32>("/metered", AdvertiseMessageOptions::new());
        assert!(handle.publish(&Int32 { data: 1 }));
        eventually("delivery", || received.load(Ordering::SeqCst) == 1).await;

        let exported = encode_metrics().expect("encode");
        assert!(exported.contains("tp_bus_messages_published_total"));
        assert!(exported.contains("tp_bus_messages_delivered_total"));
        assert!(exported.contains("tp_node_active_nodes"));
        assert!(exported.contains("tp_discovery_messages_sent_total"));
    }
}
