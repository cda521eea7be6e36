//! # Adapters
//!
//! Concrete implementations of the driven ports.

pub mod network;
pub mod time;

pub use network::FrameSink;
pub use time::{ControllableTimeSource, SystemTimeSource};
