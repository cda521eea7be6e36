//! # Handler Table
//!
//! Registered subscriber callbacks, keyed by fully qualified topic.
//!
//! ## Cancellation
//!
//! Each handler carries a gate: an `active` flag plus an invocation lock
//! held for the duration of every call. Cancelling clears the flag and, when
//! called from outside a callback, then takes the lock once, so it returns
//! only after any in-flight invocation has finished. Dispatch checks the flag
//! under the lock, so no invocation starts after cancellation returns.
//!
//! Cancelling from inside a callback (same thread) only clears the flag;
//! waiting there would deadlock on the running invocation.

use dashmap::DashMap;
use parking_lot::Mutex;
use shared_types::topic::decompose;
use shared_types::{NodeUuid, SubscribeOptions, Throttle, TransportError};
use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

thread_local! {
    static IN_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// True while the current thread is running a subscriber callback.
#[must_use]
pub fn in_dispatch() -> bool {
    IN_DISPATCH.with(Cell::get)
}

/// Marks the current thread as running a dispatcher callback until dropped.
///
/// Service handlers hold one too, so a blocking request from inside any
/// callback is refused instead of stalling the dispatcher.
#[must_use = "the flag is cleared when the guard is dropped"]
pub struct DispatchFlag {
    previous: bool,
}

impl DispatchFlag {
    pub fn set() -> Self {
        Self {
            previous: IN_DISPATCH.with(|f| f.replace(true)),
        }
    }
}

impl Drop for DispatchFlag {
    fn drop(&mut self) {
        IN_DISPATCH.with(|f| f.set(self.previous));
    }
}

/// Raw subscriber callback: payload bytes plus delivery metadata.
pub type RawHandler = Arc<dyn Fn(&[u8], &MessageInfo) -> Result<(), TransportError> + Send + Sync>;

/// Identifies one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Metadata handed to subscriber callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    topic: String,
    partition: String,
    msg_type_name: String,
    publisher: NodeUuid,
    intra_process: bool,
}

impl MessageInfo {
    #[must_use]
    pub fn new(
        fully_qualified: &str,
        msg_type_name: impl Into<String>,
        publisher: NodeUuid,
        intra_process: bool,
    ) -> Self {
        let (partition, topic) = decompose(fully_qualified).unwrap_or(("", fully_qualified));
        Self {
            topic: topic.to_string(),
            partition: partition.to_string(),
            msg_type_name: msg_type_name.into(),
            publisher,
            intra_process,
        }
    }

    /// Topic name without the partition prefix.
    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }

    #[must_use]
    pub fn partition(&self) -> &str {
        &self.partition
    }

    #[must_use]
    pub fn msg_type_name(&self) -> &str {
        &self.msg_type_name
    }

    /// Node that published the payload.
    #[must_use]
    pub fn publisher(&self) -> NodeUuid {
        self.publisher
    }

    /// Published by a node in this process.
    #[must_use]
    pub fn intra_process(&self) -> bool {
        self.intra_process
    }
}

struct Gate {
    active: AtomicBool,
    running: Mutex<()>,
}

struct HandlerEntry {
    id: SubscriptionId,
    nuuid: NodeUuid,
    handler: RawHandler,
    throttle: Option<Throttle>,
    gate: Gate,
}

impl HandlerEntry {
    fn cancel(&self) {
        self.gate.active.store(false, Ordering::Release);
        if !in_dispatch() {
            drop(self.gate.running.lock());
        }
    }
}

/// Result of dispatching one payload.
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// Handlers invoked successfully.
    pub delivered: usize,
    /// Handlers skipped by their subscriber-side throttle.
    pub throttled: usize,
    /// Errors returned by handlers (decode failures, type mismatches).
    pub failures: Vec<TransportError>,
}

/// Registered handlers per topic.
#[derive(Default)]
pub struct HandlerTable {
    topics: DashMap<String, Vec<Arc<HandlerEntry>>>,
    next_id: AtomicU64,
}

impl HandlerTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Returns its id and whether it is the first one
    /// on `topic`.
    pub fn insert(
        &self,
        topic: &str,
        nuuid: NodeUuid,
        handler: RawHandler,
        options: &SubscribeOptions,
    ) -> (SubscriptionId, bool) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let entry = Arc::new(HandlerEntry {
            id,
            nuuid,
            handler,
            throttle: Throttle::from_rate(options.msgs_per_sec()),
            gate: Gate {
                active: AtomicBool::new(true),
                running: Mutex::new(()),
            },
        });

        let mut handlers = self.topics.entry(topic.to_string()).or_default();
        let first = handlers.is_empty();
        handlers.push(entry);
        (id, first)
    }

    fn remove_matching(&self, topic: &str, pred: impl Fn(&HandlerEntry) -> bool) -> (usize, bool) {
        let removed: Vec<Arc<HandlerEntry>> = match self.topics.get_mut(topic) {
            Some(mut handlers) => {
                let (gone, kept): (Vec<_>, Vec<_>) = handlers.drain(..).partition(|e| pred(e));
                *handlers = kept;
                gone
            }
            None => return (0, false),
        };
        let emptied = self
            .topics
            .remove_if(topic, |_, handlers| handlers.is_empty())
            .is_some();

        // Wait for in-flight calls outside the shard lock.
        for entry in &removed {
            entry.cancel();
        }
        (removed.len(), emptied && !removed.is_empty())
    }

    /// Remove every handler `nuuid` registered on `topic`.
    ///
    /// Returns the number removed and whether the topic has no handlers left.
    pub fn remove_node_topic(&self, topic: &str, nuuid: NodeUuid) -> (usize, bool) {
        self.remove_matching(topic, |e| e.nuuid == nuuid)
    }

    /// Remove one handler by id.
    pub fn remove_id(&self, topic: &str, id: SubscriptionId) -> (usize, bool) {
        self.remove_matching(topic, |e| e.id == id)
    }

    /// Remove every handler of `nuuid`. Returns topics left without handlers.
    pub fn remove_node(&self, nuuid: NodeUuid) -> Vec<String> {
        self.topics_for_node(nuuid)
            .into_iter()
            .filter(|topic| self.remove_node_topic(topic, nuuid).1)
            .collect()
    }

    /// At least one handler is registered on `topic`.
    #[must_use]
    pub fn has_active(&self, topic: &str) -> bool {
        self.topics.get(topic).is_some_and(|handlers| {
            handlers
                .iter()
                .any(|e| e.gate.active.load(Ordering::Acquire))
        })
    }

    /// Topics `nuuid` subscribes to, sorted.
    #[must_use]
    pub fn topics_for_node(&self, nuuid: NodeUuid) -> Vec<String> {
        let mut topics: Vec<String> = self
            .topics
            .iter()
            .filter(|handlers| handlers.iter().any(|e| e.nuuid == nuuid))
            .map(|handlers| handlers.key().clone())
            .collect();
        topics.sort();
        topics
    }

    /// Invoke every active handler on `topic`, in registration order.
    pub fn dispatch(&self, topic: &str, payload: &[u8], info: &MessageInfo) -> DispatchOutcome {
        let entries: Vec<Arc<HandlerEntry>> = match self.topics.get(topic) {
            Some(handlers) => handlers.clone(),
            None => return DispatchOutcome::default(),
        };

        let mut outcome = DispatchOutcome::default();
        for entry in entries {
            let _running = entry.gate.running.lock();
            if !entry.gate.active.load(Ordering::Acquire) {
                continue;
            }
            if let Some(throttle) = &entry.throttle {
                if !throttle.try_accept() {
                    outcome.throttled += 1;
                    continue;
                }
            }

            let result = {
                let _flag = DispatchFlag::set();
                (entry.handler)(payload, info)
            };
            match result {
                Ok(()) => outcome.delivered += 1,
                Err(e) => outcome.failures.push(e),
            }
        }
        outcome
    }
}
