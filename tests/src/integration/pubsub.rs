//! Publish/subscribe delivery between nodes and processes.

#[cfg(test)]
mod tests {
    use crate::integration::support::{context, eventually, settle};
    use parking_lot::Mutex;
    use shared_net::LoopbackNetwork;
    use shared_types::msgs::{make_time, Header, Int32, Time, Twist, Vector3d};
    use shared_types::{AdvertiseMessageOptions, SubscribeOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Weak};
    use std::time::Duration;
    use transport_node::{MessageInfo, Node};

    type Seen<M> = Arc<Mutex<Vec<M>>>;

    fn collector<M: Clone + Send + 'static>() -> (Seen<M>, impl Fn(&M) + Send + Sync + 'static) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |msg: &M| sink.lock().push(msg.clone()))
    }

    #[tokio::test]
    async fn test_twist_crosses_processes() {
        let hub = LoopbackNetwork::new();
        let publisher_ctx = context(&hub, "alpha");
        let subscriber_ctx = context(&hub, "beta");
        let publisher = Node::new(&publisher_ctx);
        let subscriber = Node::new(&subscriber_ctx);

        let (seen, callback) = collector::<Twist>();
        assert!(subscriber.subscribe::<Twist, _>("/cmd_vel", callback));
        let handle = publisher.advertise::<Twist>("/cmd_vel", AdvertiseMessageOptions::new());
        assert!(handle.valid());
        eventually("remote connection", || handle.has_connections()).await;

        let twist = Twist {
            header: Header {
                stamp: make_time(),
                frame_id: "base_link".into(),
            },
            linear: Vector3d { x: 1.0, y: 0.0, z: 0.0 },
            angular: Vector3d { x: 0.0, y: 0.0, z: 0.5 },
        };
        assert!(handle.publish(&twist));

        eventually("twist delivery", || !seen.lock().is_empty()).await;
        let received = seen.lock()[0].clone();
        assert_eq!(received.header.stamp, Time { sec: 11, nsec: 25 });
        assert_eq!(received, twist);
    }

    #[tokio::test]
    async fn test_delivery_preserves_publish_order() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let node = Node::new(&ctx);
        let remote = Node::new(&remote_ctx);

        let (remote_seen, remote_cb) = collector::<Int32>();
        assert!(remote.subscribe::<Int32, _>("/seq", remote_cb));
        let handle = node.advertise::<Int32>("/seq", AdvertiseMessageOptions::new());
        eventually("remote connection", || handle.has_connections()).await;

        let (local_seen, local_cb) = collector::<Int32>();
        assert!(node.subscribe::<Int32, _>("/seq", local_cb));

        for data in 1..=3 {
            assert!(handle.publish(&Int32 { data }));
        }

        eventually("local delivery", || local_seen.lock().len() == 3).await;
        eventually("remote delivery", || remote_seen.lock().len() == 3).await;
        let expected: Vec<i32> = vec![1, 2, 3];
        assert_eq!(local_seen.lock().iter().map(|m| m.data).collect::<Vec<_>>(), expected);
        assert_eq!(remote_seen.lock().iter().map(|m| m.data).collect::<Vec<_>>(), expected);
    }

    #[tokio::test]
    async fn test_message_info_reports_origin() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let node = Node::new(&ctx);
        let remote = Node::new(&remote_ctx);

        let infos: Arc<Mutex<Vec<(bool, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let recorder = |sink: Arc<Mutex<Vec<(bool, String)>>>| {
            move |_: &Int32, info: &MessageInfo| {
                sink.lock().push((info.intra_process(), info.topic().to_string()));
            }
        };

        assert!(remote.subscribe_with_info::<Int32, _>(
            "/origin",
            recorder(infos.clone()),
            &SubscribeOptions::new(),
        ));
        let handle = node.advertise::<Int32>("/origin", AdvertiseMessageOptions::new());
        eventually("remote connection", || handle.has_connections()).await;
        assert!(node.subscribe_with_info::<Int32, _>(
            "/origin",
            recorder(infos.clone()),
            &SubscribeOptions::new(),
        ));

        assert!(handle.publish(&Int32 { data: 0 }));
        eventually("both deliveries", || infos.lock().len() == 2).await;

        let infos = infos.lock();
        assert!(infos.iter().any(|(intra, _)| *intra));
        assert!(infos.iter().any(|(intra, _)| !*intra));
        assert!(infos.iter().all(|(_, topic)| topic == "/origin"));
    }

    #[tokio::test]
    async fn test_publisher_throttle_caps_rate() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Node::new(&ctx);

        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        assert!(node.subscribe::<Int32, _>("/fast", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let handle = node.advertise::<Int32>(
            "/fast",
            AdvertiseMessageOptions::new().with_msgs_per_sec(10),
        );

        for data in 0..50 {
            // Throttled payloads still report success
            assert!(handle.publish(&Int32 { data }));
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        settle(50).await;

        let delivered = received.load(Ordering::SeqCst);
        assert!(delivered >= 1, "nothing delivered");
        assert!(delivered <= 7, "throttle let {delivered} through");
        assert!(handle.throttle_drops() > 0);
        assert_eq!(handle.throttle_drops() as usize + delivered, 50);
    }

    #[tokio::test]
    async fn test_subscriber_throttle_is_per_handler() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Node::new(&ctx);

        let slow = Arc::new(AtomicUsize::new(0));
        let fast = Arc::new(AtomicUsize::new(0));
        let slow_counter = slow.clone();
        let fast_counter = fast.clone();
        assert!(node.subscribe_with_options::<Int32, _>(
            "/burst",
            move |_| {
                slow_counter.fetch_add(1, Ordering::SeqCst);
            },
            &SubscribeOptions::new().with_msgs_per_sec(1),
        ));
        assert!(node.subscribe::<Int32, _>("/burst", move |_| {
            fast_counter.fetch_add(1, Ordering::SeqCst);
        }));

        let handle = node.advertise::<Int32>("/burst", AdvertiseMessageOptions::new());
        for data in 0..10 {
            assert!(handle.publish(&Int32 { data }));
        }

        eventually("unthrottled handler", || fast.load(Ordering::SeqCst) == 10).await;
        assert_eq!(slow.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.messages().stats().throttle_drops, 9);
    }

    #[tokio::test]
    async fn test_unsubscribe_is_final_and_idempotent() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Node::new(&ctx);

        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        assert!(node.subscribe::<Int32, _>("/once", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        let handle = node.advertise::<Int32>("/once", AdvertiseMessageOptions::new());

        assert!(handle.publish(&Int32 { data: 1 }));
        eventually("first delivery", || received.load(Ordering::SeqCst) == 1).await;

        assert!(node.unsubscribe("/once"));
        assert!(!node.unsubscribe("/once"));
        assert!(!node.subscribed_topics().contains_str("/once"));
        assert!(!handle.has_connections());

        assert!(handle.publish(&Int32 { data: 2 }));
        settle(100).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unsubscribe_from_inside_callback() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Arc::new(Node::new(&ctx));

        let received = Arc::new(AtomicUsize::new(0));
        let counter = received.clone();
        let weak: Weak<Node> = Arc::downgrade(&node);
        assert!(node.subscribe::<Int32, _>("/self_cancel", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(node) = weak.upgrade() {
                node.unsubscribe("/self_cancel");
            }
        }));

        let handle = node.advertise::<Int32>("/self_cancel", AdvertiseMessageOptions::new());
        for data in 0..5 {
            assert!(handle.publish(&Int32 { data }));
        }
        eventually("first delivery", || received.load(Ordering::SeqCst) >= 1).await;
        settle(100).await;

        assert_eq!(received.load(Ordering::SeqCst), 1);
        assert!(node.subscribed_topics().is_empty());
    }

    #[tokio::test]
    async fn test_late_subscriber_receives_later_messages() {
        let hub = LoopbackNetwork::new();
        let publisher_ctx = context(&hub, "alpha");
        let subscriber_ctx = context(&hub, "beta");
        let publisher = Node::new(&publisher_ctx);
        let handle = publisher.advertise::<Int32>("/late", AdvertiseMessageOptions::new());
        assert!(!handle.has_connections());

        // The subscriber's process starts after the advertisement went out
        settle(100).await;
        let subscriber = Node::new(&subscriber_ctx);
        let (seen, callback) = collector::<Int32>();
        assert!(subscriber.subscribe::<Int32, _>("/late", callback));

        eventually("connection to late subscriber", || handle.has_connections()).await;
        assert!(handle.publish(&Int32 { data: 7 }));
        eventually("delivery", || seen.lock().first().map(|m| m.data) == Some(7)).await;
    }
}
