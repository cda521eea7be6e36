//! # Topic Transport Test Suite
//!
//! Cross-crate scenarios that need more than one crate, or more than one
//! simulated process, to exercise.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── support.rs     # Contexts on a loopback hub, polling helpers
//!     ├── pubsub.rs      # Delivery, ordering, throttling, unsubscribe
//!     ├── discovery.rs   # Scope, duplicates, withdrawal, expiry
//!     ├── services.rs    # Request outcomes, selection, cancellation
//!     └── telemetry.rs   # Metrics exported after traffic
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p tp-tests
//! cargo test -p tp-tests integration::services::
//!
//! # Benchmarks
//! cargo bench -p tp-tests
//! ```

pub mod integration;
