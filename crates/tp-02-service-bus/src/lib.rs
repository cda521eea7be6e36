//! # Service Bus
//!
//! Request/reply between nodes, in one process or across processes.
//!
//! ## Request Lifecycle
//!
//! 1. The caller hands over the discovery snapshot for the service
//! 2. A responder is selected round-robin among type-compatible candidates
//! 3. The request is registered in the [`PendingRequestStore`] and sent
//! 4. The responder's dispatcher runs the handler and answers
//! 5. The response completes the pending entry, or the timeout fires
//!
//! Requests to responders in the same process travel over the local frame
//! queue, so handlers always run on the dispatcher, never on the caller.
//!
//! ## Outcomes
//!
//! | Outcome | `executed()` | Cause |
//! |---------|--------------|-------|
//! | `Replied` | true | A handler ran; `result()` is its flag |
//! | `TimedOut` | false | No response before the deadline |
//! | `NoResponder` | false | No candidate, send failed, handler withdrawn, node or process gone |

#![allow(clippy::missing_const_for_fn)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod outcome;
pub mod pending;
pub mod requester;
pub mod responder;
pub mod responders;
pub mod selection;

pub use outcome::ServiceOutcome;
pub use pending::{PendingRequestStore, PendingStats, ServiceReply};
pub use requester::{ServiceBus, ServiceStats};
pub use responders::{Responder, ResponderTable, ServiceHandler};
pub use selection::RoundRobin;
