//! Multi-process scenarios on a loopback hub.
//!
//! Every `TransportContext` bound to the same `LoopbackNetwork` behaves as
//! a separate process; the host name passed at bind time decides which
//! scopes reach it.

#[cfg(test)]
mod support;

mod discovery;
mod pubsub;
mod services;
mod telemetry;
