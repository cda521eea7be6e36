//! Discovery between simulated processes: scope, withdrawal and expiry.

#[cfg(test)]
mod tests {
    use crate::integration::support::{context, eventually, settle};
    use shared_net::LoopbackNetwork;
    use shared_types::msgs::{Boolean, Int32, StringMsg};
    use shared_types::{
        AdvertiseMessageOptions, AdvertiseServiceOptions, Endpoint, NodeOptions, Scope,
    };
    use transport_node::Node;

    fn scoped(scope: Scope) -> AdvertiseMessageOptions {
        AdvertiseMessageOptions::new().with_scope(scope)
    }

    #[tokio::test]
    async fn test_process_scope_stays_in_process() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let other_ctx = context(&hub, "alpha");
        let node = Node::new(&ctx);
        let sibling = Node::new(&ctx);
        let other = Node::new(&other_ctx);

        let handle = node.advertise::<Int32>("/private", scoped(Scope::Process));
        assert!(handle.valid());
        assert!(sibling.topic_list().contains_str("/private"));

        settle(200).await;
        assert!(!other.topic_list().contains_str("/private"));
        assert!(other.topic_info("/private").is_empty());
    }

    #[tokio::test]
    async fn test_host_scope_stays_on_host() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let same_host_ctx = context(&hub, "alpha");
        let other_host_ctx = context(&hub, "beta");
        let node = Node::new(&ctx);
        let same_host = Node::new(&same_host_ctx);
        let other_host = Node::new(&other_host_ctx);

        let _handle = node.advertise::<Int32>("/local_only", scoped(Scope::Host));

        eventually("same-host discovery", || {
            same_host.topic_list().contains_str("/local_only")
        })
        .await;
        settle(150).await;
        assert!(!other_host.topic_list().contains_str("/local_only"));
    }

    #[tokio::test]
    async fn test_all_scope_crosses_hosts() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let node = Node::new(&ctx);
        let remote = Node::new(&remote_ctx);

        let _handle = node.advertise::<StringMsg>("/everywhere", scoped(Scope::All));

        eventually("cross-host discovery", || {
            remote.topic_list().contains_str("/everywhere")
        })
        .await;
        let info = remote.topic_info("/everywhere");
        assert_eq!(info.len(), 1);
        assert_eq!(info.as_slice()[0].msg_type_name(), "tp.msgs.StringMsg");
        assert_eq!(info.as_slice()[0].publisher().nuuid(), node.nuuid());
    }

    #[tokio::test]
    async fn test_two_nodes_on_one_topic_are_both_listed() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let first = Node::new(&ctx);
        let second = Node::new(&ctx);
        let remote = Node::new(&remote_ctx);

        assert!(first.advertise::<Int32>("/shared", AdvertiseMessageOptions::new()).valid());
        assert!(second.advertise::<Int32>("/shared", AdvertiseMessageOptions::new()).valid());
        // The same node cannot advertise a topic twice
        assert!(!first.advertise::<Int32>("/shared", AdvertiseMessageOptions::new()).valid());

        eventually("both publishers", || remote.topic_info("/shared").len() == 2).await;
        assert_eq!(remote.topic_list().len(), 1);
    }

    #[tokio::test]
    async fn test_remote_unadvertise_is_seen() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let node = Node::new(&ctx);
        let remote = Node::new(&remote_ctx);

        let handle = node.advertise::<Boolean>("/flag", AdvertiseMessageOptions::new());
        eventually("advertisement", || remote.topic_list().contains_str("/flag")).await;

        assert!(node.unadvertise("/flag"));
        assert!(!handle.valid());
        eventually("withdrawal", || !remote.topic_list().contains_str("/flag")).await;
    }

    #[tokio::test]
    async fn test_silent_process_expires_and_returns() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let node = Node::new(&ctx);
        let remote = Node::new(&remote_ctx);

        let _handle = node.advertise::<Int32>("/pulse", AdvertiseMessageOptions::new());
        eventually("advertisement", || remote.topic_list().contains_str("/pulse")).await;

        hub.set_reachable(ctx.addr(), false);
        eventually("expiry", || !remote.topic_list().contains_str("/pulse")).await;
        assert!(remote_ctx.discovery().stats().expirations >= 1);

        // Periodic re-advertising brings it back once traffic flows again
        hub.set_reachable(ctx.addr(), true);
        eventually("rediscovery", || remote.topic_list().contains_str("/pulse")).await;
    }

    #[tokio::test]
    async fn test_dropping_last_node_says_goodbye() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");
        let remote = Node::new(&remote_ctx);

        let node = Node::new(&ctx);
        let _handle = node.advertise::<Int32>("/short_lived", AdvertiseMessageOptions::new());
        assert!(node.advertise_service::<Int32, Int32, _>(
            "/echo",
            |req: &Int32| (*req, true),
            AdvertiseServiceOptions::new(),
        ));
        eventually("advertisements", || {
            remote.topic_list().contains_str("/short_lived")
                && remote.service_list().contains_str("/echo")
        })
        .await;

        drop(node);
        assert_eq!(ctx.node_count(), 0);
        eventually("goodbye", || {
            remote.topic_list().is_empty() && remote.service_list().is_empty()
        })
        .await;
    }

    #[tokio::test]
    async fn test_partitions_do_not_mix_across_processes() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");

        let mut options = NodeOptions::new();
        assert!(options.set_partition("red"));
        let red = Node::with_options(&ctx, options.clone());
        let remote_red = Node::with_options(&remote_ctx, options);
        let remote_default = Node::new(&remote_ctx);

        let _handle = red.advertise::<Int32>("/status", AdvertiseMessageOptions::new());
        eventually("same partition", || remote_red.topic_list().contains_str("/status")).await;
        assert!(!remote_default.topic_list().contains_str("/status"));
    }

    #[tokio::test]
    async fn test_namespace_prefixes_advertised_names() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let remote_ctx = context(&hub, "beta");

        let mut options = NodeOptions::new();
        assert!(options.set_namespace("robot"));
        let node = Node::with_options(&ctx, options);
        let remote = Node::new(&remote_ctx);

        let _relative = node.advertise::<Int32>("odom", AdvertiseMessageOptions::new());
        let _absolute = node.advertise::<Int32>("/clock", AdvertiseMessageOptions::new());
        eventually("namespaced topics", || remote.topic_list().len() == 2).await;
        assert!(remote.topic_list().contains_str("/robot/odom"));
        assert!(remote.topic_list().contains_str("/clock"));
    }
}
