//! Service requests between simulated processes.

#[cfg(test)]
mod tests {
    use crate::integration::support::{context, eventually, within};
    use shared_net::LoopbackNetwork;
    use shared_types::msgs::{Boolean, Int32, StringMsg};
    use shared_types::AdvertiseServiceOptions;
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use transport_node::{Node, ServiceOutcome};

    fn echo(node: &Node, service: &str) {
        assert!(node.advertise_service::<StringMsg, StringMsg, _>(
            service,
            |req: &StringMsg| (req.clone(), true),
            AdvertiseServiceOptions::new(),
        ));
    }

    #[tokio::test]
    async fn test_unknown_service_has_no_responder() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Node::new(&ctx);

        let started = Instant::now();
        let outcome: ServiceOutcome<Int32> = node
            .request("/nobody_home", &Int32 { data: 1 }, Some(Duration::from_secs(1)))
            .await;

        assert_eq!(outcome, ServiceOutcome::NoResponder);
        assert!(!outcome.executed());
        assert!(started.elapsed() < Duration::from_millis(150));
        assert_eq!(ctx.services().stats().no_responder, 1);
    }

    #[tokio::test]
    async fn test_round_trip_across_processes() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Node::new(&requester_ctx);

        echo(&responder, "/echo");
        eventually("service discovery", || requester.service_list().contains_str("/echo")).await;

        let request = StringMsg { data: "ping".into() };
        let outcome: ServiceOutcome<StringMsg> = requester.request("/echo", &request, None).await;

        assert!(outcome.executed());
        assert!(outcome.result());
        assert_eq!(outcome.reply(), Some(&request));
        assert_eq!(responder_ctx.services().stats().served, 1);
    }

    #[tokio::test]
    async fn test_handler_failure_flag_is_reported() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Node::new(&requester_ctx);

        assert!(responder.advertise_service::<Int32, Boolean, _>(
            "/is_even",
            |req: &Int32| (Boolean { data: req.data % 2 == 0 }, req.data >= 0),
            AdvertiseServiceOptions::new(),
        ));
        eventually("service discovery", || !requester.service_info("/is_even").is_empty()).await;

        let accepted: ServiceOutcome<Boolean> =
            requester.request("/is_even", &Int32 { data: 4 }, None).await;
        assert_eq!(
            accepted,
            ServiceOutcome::Replied {
                reply: Boolean { data: true },
                result: true
            }
        );

        let rejected: ServiceOutcome<Boolean> =
            requester.request("/is_even", &Int32 { data: -3 }, None).await;
        assert!(rejected.executed());
        assert!(!rejected.result());
        assert_eq!(rejected.into_reply(), Some(Boolean { data: false }));
    }

    #[tokio::test]
    async fn test_wrong_types_find_no_responder() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Node::new(&requester_ctx);

        echo(&responder, "/echo");
        eventually("service discovery", || requester.service_list().contains_str("/echo")).await;

        let outcome: ServiceOutcome<StringMsg> =
            requester.request("/echo", &Int32 { data: 1 }, None).await;
        assert_eq!(outcome, ServiceOutcome::NoResponder);
        assert_eq!(responder_ctx.services().stats().served, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_slow_responder_times_out() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Node::new(&requester_ctx);

        assert!(responder.advertise_service::<Int32, Int32, _>(
            "/slow",
            |req: &Int32| {
                std::thread::sleep(Duration::from_millis(300));
                (*req, true)
            },
            AdvertiseServiceOptions::new(),
        ));
        eventually("service discovery", || requester.service_list().contains_str("/slow")).await;

        let outcome: ServiceOutcome<Int32> = requester
            .request("/slow", &Int32 { data: 1 }, Some(Duration::from_millis(100)))
            .await;
        assert_eq!(outcome, ServiceOutcome::TimedOut);
        assert!(!outcome.executed());

        // The late reply finds nothing waiting for it
        eventually("late reply", || responder_ctx.services().stats().served == 1).await;
        assert_eq!(requester_ctx.services().stats().pending, 0);
        assert_eq!(requester_ctx.services().stats().timed_out, 1);
    }

    #[tokio::test]
    async fn test_responders_are_used_round_robin() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let first = Node::new(&responder_ctx);
        let second = Node::new(&responder_ctx);
        let requester = Node::new(&requester_ctx);

        for (node, id) in [(&first, 1), (&second, 2)] {
            assert!(node.advertise_service::<Int32, Int32, _>(
                "/who",
                move |_: &Int32| (Int32 { data: id }, true),
                AdvertiseServiceOptions::new(),
            ));
        }
        eventually("both responders", || requester.service_info("/who").len() == 2).await;

        let mut answers: HashMap<i32, usize> = HashMap::new();
        let mut previous = None;
        for _ in 0..4 {
            let outcome: ServiceOutcome<Int32> =
                requester.request("/who", &Int32 { data: 0 }, None).await;
            let id = outcome.into_reply().map(|r| r.data).expect("reply");
            assert_ne!(previous, Some(id), "same responder twice in a row");
            previous = Some(id);
            *answers.entry(id).or_default() += 1;
        }
        assert_eq!(answers.get(&1), Some(&2));
        assert_eq!(answers.get(&2), Some(&2));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_request_from_blocking_pool() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Arc::new(Node::new(&requester_ctx));

        echo(&responder, "/echo");
        eventually("service discovery", || requester.service_list().contains_str("/echo")).await;

        let caller = requester.clone();
        let outcome = within(
            "blocking request",
            tokio::task::spawn_blocking(move || {
                caller.request_blocking::<StringMsg, StringMsg>(
                    "/echo",
                    &StringMsg { data: "blocking".into() },
                    None,
                )
            }),
        )
        .await
        .expect("blocking task");

        assert_eq!(outcome.into_reply().map(|r| r.data), Some("blocking".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_request_from_plain_thread() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let node = Arc::new(Node::new(&ctx));

        echo(&node, "/echo");

        let caller = node.clone();
        let thread = std::thread::spawn(move || {
            caller.request_blocking::<StringMsg, StringMsg>(
                "/echo",
                &StringMsg { data: "thread".into() },
                None,
            )
        });
        let outcome = within("plain thread", tokio::task::spawn_blocking(move || thread.join()))
            .await
            .expect("join task")
            .expect("request thread");

        assert!(outcome.result());
        assert_eq!(outcome.into_reply().map(|r| r.data), Some("thread".to_string()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_blocking_request_inside_service_handler_is_refused() {
        let hub = LoopbackNetwork::new();
        let server_ctx = context(&hub, "alpha");
        let client_ctx = context(&hub, "beta");
        let server = Arc::new(Node::new(&server_ctx));
        let client = Node::new(&client_ctx);

        assert!(server.advertise_service::<Int32, Int32, _>(
            "/inner",
            |req: &Int32| (Int32 { data: req.data + 1 }, true),
            AdvertiseServiceOptions::new(),
        ));
        let nested = Arc::downgrade(&server);
        assert!(server.advertise_service::<Int32, Int32, _>(
            "/outer",
            move |req: &Int32| {
                let Some(node) = nested.upgrade() else {
                    return (Int32::default(), false);
                };
                let inner: ServiceOutcome<Int32> = node.request_blocking(
                    "/inner",
                    req,
                    Some(Duration::from_millis(300)),
                );
                let code = match inner {
                    ServiceOutcome::NoResponder => 1,
                    ServiceOutcome::TimedOut => -1,
                    _ => 0,
                };
                (Int32 { data: code }, true)
            },
            AdvertiseServiceOptions::new(),
        ));
        eventually("service discovery", || client.service_list().contains_str("/outer")).await;

        let started = Instant::now();
        let outcome: ServiceOutcome<Int32> = client
            .request("/outer", &Int32 { data: 1 }, Some(Duration::from_secs(2)))
            .await;

        assert_eq!(outcome.into_reply(), Some(Int32 { data: 1 }));
        assert!(started.elapsed() < Duration::from_millis(250));

        // The dispatcher is still free to serve ordinary requests
        let direct: ServiceOutcome<Int32> = client
            .request("/inner", &Int32 { data: 4 }, Some(Duration::from_secs(1)))
            .await;
        assert_eq!(direct.into_reply(), Some(Int32 { data: 5 }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_shutting_down_requester_cancels_pending_request() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Arc::new(Node::new(&requester_ctx));

        assert!(responder.advertise_service::<Int32, Int32, _>(
            "/slow",
            |req: &Int32| {
                std::thread::sleep(Duration::from_millis(300));
                (*req, true)
            },
            AdvertiseServiceOptions::new(),
        ));
        eventually("service discovery", || requester.service_list().contains_str("/slow")).await;

        let caller = requester.clone();
        let pending = tokio::spawn(async move {
            caller
                .request::<Int32, Int32>("/slow", &Int32 { data: 1 }, Some(Duration::from_secs(2)))
                .await
        });
        eventually("request in flight", || requester_ctx.services().stats().pending == 1).await;

        let started = Instant::now();
        requester.shutdown();
        let outcome = within("cancelled request", pending).await.expect("request task");

        assert_eq!(outcome, ServiceOutcome::NoResponder);
        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(requester_ctx.services().stats().pending, 0);
    }

    #[tokio::test]
    async fn test_request_started_before_shutdown_fails_fast() {
        let hub = LoopbackNetwork::new();
        let ctx = context(&hub, "alpha");
        let responder = Node::new(&ctx);
        let requester = Node::new(&ctx);
        echo(&responder, "/echo");

        // The request task cannot run before shutdown on this runtime
        let (tx, rx) = tokio::sync::oneshot::channel();
        assert!(requester.request_with_callback::<StringMsg, StringMsg, _>(
            "/echo",
            &StringMsg { data: "late".into() },
            Some(Duration::from_secs(2)),
            move |outcome| {
                let _ = tx.send(outcome);
            },
        ));
        requester.shutdown();

        let started = Instant::now();
        let outcome = within("cancelled callback", rx).await.expect("callback ran");
        assert_eq!(outcome, ServiceOutcome::NoResponder);
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(ctx.services().stats().pending, 0);
        assert_eq!(ctx.services().stats().served, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lost_responder_process_fails_request() {
        let hub = LoopbackNetwork::new();
        let responder_ctx = context(&hub, "alpha");
        let requester_ctx = context(&hub, "beta");
        let responder = Node::new(&responder_ctx);
        let requester = Node::new(&requester_ctx);

        assert!(responder.advertise_service::<Int32, Int32, _>(
            "/vanishing",
            |req: &Int32| {
                std::thread::sleep(Duration::from_millis(300));
                (*req, true)
            },
            AdvertiseServiceOptions::new(),
        ));
        eventually("service discovery", || {
            requester.service_list().contains_str("/vanishing")
        })
        .await;

        let request = requester.request::<Int32, Int32>(
            "/vanishing",
            &Int32 { data: 1 },
            Some(Duration::from_secs(2)),
        );
        let cut = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            hub.set_reachable(responder_ctx.addr(), false);
        };
        let (outcome, ()) = within("lost responder", async { tokio::join!(request, cut) }).await;

        assert_eq!(outcome, ServiceOutcome::NoResponder);
        assert!(!requester.service_list().contains_str("/vanishing"));
    }
}
