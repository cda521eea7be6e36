//! # Shared Bus - Topic Message Bus
//!
//! Moves published payloads from publisher handles to subscriber callbacks,
//! inside one process and across processes.
//!
//! ## Delivery Paths
//!
//! ```text
//! ┌──────────────┐  publish()   ┌──────────────┐  local frame   ┌────────────┐
//! │  Publisher   │ ───────────▶ │ Message Bus  │ ─────────────▶ │ Dispatcher │
//! │   handle     │              │              │                └─────┬──────┘
//! └──────────────┘              └──────┬───────┘                      │
//!                                      │ send_to (connected peers)    ▼
//!                                      ▼                        ┌────────────┐
//!                               ┌──────────────┐  on_publish()  │  Handler   │
//!                               │ Remote bus   │ ─────────────▶ │   table    │
//!                               └──────────────┘                └────────────┘
//! ```
//!
//! ## Guarantees
//!
//! - **Edge FIFO:** payloads from one publisher reach one subscriber in
//!   publish order. Local frames share one dispatcher queue; remote frames
//!   carry sequence numbers and stale ones are dropped.
//! - **Cancellation:** after `unsubscribe` returns, no removed handler is
//!   invoked again.
//! - **Best effort:** send failures are logged and counted, never raised.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod connections;
pub mod handlers;
pub mod publisher;
pub mod sequence;
pub mod subscriber;

// Re-export main types
pub use connections::{ConnectionTable, RemoteSubscriber};
pub use handlers::{
    in_dispatch, DispatchFlag, DispatchOutcome, HandlerTable, MessageInfo, RawHandler,
    SubscriptionId,
};
pub use publisher::{BusStats, LocalSender, MessageBus};
pub use sequence::{SequenceError, SequenceTracker};
