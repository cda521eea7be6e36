//! # Options
//!
//! Capability options attached to advertisements and subscriptions.

use serde::{Deserialize, Serialize};

/// Visibility restriction on an advertised endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Scope {
    /// Visible only inside the advertising process.
    Process,
    /// Visible to processes on the same host.
    Host,
    /// Visible to every reachable process.
    #[default]
    All,
}

impl Scope {
    /// Whether an endpoint with this scope may be seen by a peer.
    ///
    /// `same_process` implies `same_host`.
    #[must_use]
    pub fn permits(self, same_process: bool, same_host: bool) -> bool {
        match self {
            Scope::Process => same_process,
            Scope::Host => same_host || same_process,
            Scope::All => true,
        }
    }
}

/// Base advertise options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertiseOptions {
    scope: Scope,
}

impl AdvertiseOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.scope = scope;
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }
}

/// Options for advertising a topic.
///
/// `msgs_per_sec == None` means unthrottled. Setting the rate to zero clears it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertiseMessageOptions {
    base: AdvertiseOptions,
    msgs_per_sec: Option<u64>,
}

impl AdvertiseMessageOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.base.scope()
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.base.set_scope(scope);
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.base.set_scope(scope);
        self
    }

    /// True when a publish rate limit is set.
    #[must_use]
    pub fn throttled(&self) -> bool {
        self.msgs_per_sec.is_some()
    }

    #[must_use]
    pub fn msgs_per_sec(&self) -> Option<u64> {
        self.msgs_per_sec
    }

    pub fn set_msgs_per_sec(&mut self, rate: u64) {
        self.msgs_per_sec = (rate > 0).then_some(rate);
    }

    #[must_use]
    pub fn with_msgs_per_sec(mut self, rate: u64) -> Self {
        self.set_msgs_per_sec(rate);
        self
    }

    /// The scope-only part of these options.
    #[must_use]
    pub fn base(&self) -> AdvertiseOptions {
        self.base
    }
}

/// Options for advertising a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AdvertiseServiceOptions {
    base: AdvertiseOptions,
}

impl AdvertiseServiceOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn scope(&self) -> Scope {
        self.base.scope()
    }

    pub fn set_scope(&mut self, scope: Scope) {
        self.base.set_scope(scope);
    }

    #[must_use]
    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.base.set_scope(scope);
        self
    }

    #[must_use]
    pub fn base(&self) -> AdvertiseOptions {
        self.base
    }
}

/// Options for a subscription. A rate limits callbacks on the receiving side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubscribeOptions {
    msgs_per_sec: Option<u64>,
}

impl SubscribeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn throttled(&self) -> bool {
        self.msgs_per_sec.is_some()
    }

    #[must_use]
    pub fn msgs_per_sec(&self) -> Option<u64> {
        self.msgs_per_sec
    }

    pub fn set_msgs_per_sec(&mut self, rate: u64) {
        self.msgs_per_sec = (rate > 0).then_some(rate);
    }

    #[must_use]
    pub fn with_msgs_per_sec(mut self, rate: u64) -> Self {
        self.set_msgs_per_sec(rate);
        self
    }
}

/// Per-node naming options.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeOptions {
    namespace: String,
    partition: Option<String>,
}

impl NodeOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Namespace prefixed to relative topic names.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns false and leaves the namespace untouched if it is invalid.
    pub fn set_namespace(&mut self, namespace: &str) -> bool {
        if !crate::topic::is_valid_namespace(namespace) {
            return false;
        }
        self.namespace = namespace.to_string();
        true
    }

    /// Explicit partition, overriding the context default.
    #[must_use]
    pub fn partition(&self) -> Option<&str> {
        self.partition.as_deref()
    }

    /// Returns false and leaves the partition untouched if it is invalid.
    pub fn set_partition(&mut self, partition: &str) -> bool {
        if !crate::topic::is_valid_partition(partition) {
            return false;
        }
        self.partition = Some(partition.to_string());
        true
    }
}
