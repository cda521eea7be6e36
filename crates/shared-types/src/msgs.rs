//! # Built-in Messages
//!
//! A small message set used by demos and tests.

use crate::message::{Message, MessageFactory};
use serde::{Deserialize, Serialize};

/// Seconds and nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Time {
    pub sec: i64,
    pub nsec: i32,
}

impl Message for Time {
    const TYPE_NAME: &'static str = "tp.msgs.Time";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Header {
    pub stamp: Time,
    pub frame_id: String,
}

impl Message for Header {
    const TYPE_NAME: &'static str = "tp.msgs.Header";
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3d {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Message for Vector3d {
    const TYPE_NAME: &'static str = "tp.msgs.Vector3d";
}

/// Linear and angular velocity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Twist {
    pub header: Header,
    pub linear: Vector3d,
    pub angular: Vector3d,
}

impl Message for Twist {
    const TYPE_NAME: &'static str = "tp.msgs.Twist";
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StringMsg {
    pub data: String,
}

impl Message for StringMsg {
    const TYPE_NAME: &'static str = "tp.msgs.StringMsg";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Int32 {
    pub data: i32,
}

impl Message for Int32 {
    const TYPE_NAME: &'static str = "tp.msgs.Int32";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Boolean {
    pub data: bool,
}

impl Message for Boolean {
    const TYPE_NAME: &'static str = "tp.msgs.Boolean";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Empty;

impl Message for Empty {
    const TYPE_NAME: &'static str = "tp.msgs.Empty";
}

/// Register every built-in type.
pub fn register_builtin(factory: &MessageFactory) {
    factory.register::<Time>();
    factory.register::<Header>();
    factory.register::<Vector3d>();
    factory.register::<Twist>();
    factory.register::<StringMsg>();
    factory.register::<Int32>();
    factory.register::<Boolean>();
    factory.register::<Empty>();
}

/// A `Time` stamped with 11 s, 25 ns. Pairs with [`take_time`].
#[must_use]
pub fn make_time() -> Time {
    Time { sec: 11, nsec: 25 }
}

/// Consume a `Time`, returning its total nanoseconds.
#[must_use]
pub fn take_time(time: Time) -> i128 {
    i128::from(time.sec) * 1_000_000_000 + i128::from(time.nsec)
}
