//! # Message Codec
//!
//! The buses treat payloads as opaque bytes. Typed messages enter and leave
//! through the [`Message`] trait; callers that only know a type name at
//! runtime go through [`MessageFactory`].

use crate::errors::CodecError;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::collections::HashMap;
use std::fmt;

/// A typed message with a stable type name.
pub trait Message: Serialize + DeserializeOwned + fmt::Debug + Send + Sync + 'static {
    /// Name advertised alongside the topic, e.g. `tp.msgs.Twist`.
    const TYPE_NAME: &'static str;

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        bincode::serialize(self).map_err(|e| CodecError::Encode {
            type_name: Self::TYPE_NAME.to_string(),
            reason: e.to_string(),
        })
    }

    fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        bincode::deserialize(bytes).map_err(|e| CodecError::Decode {
            type_name: Self::TYPE_NAME.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Object-safe view of a [`Message`].
pub trait DynMessage: fmt::Debug + Send + Sync {
    fn type_name(&self) -> &'static str;

    fn to_bytes(&self) -> Result<Vec<u8>, CodecError>;

    fn as_any(&self) -> &dyn Any;
}

impl<M: Message> DynMessage for M {
    fn type_name(&self) -> &'static str {
        M::TYPE_NAME
    }

    fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        self.encode()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<'a> dyn DynMessage + 'a {
    /// Downcast to a concrete message type.
    #[must_use]
    pub fn downcast_ref<M: Message>(&self) -> Option<&M> {
        self.as_any().downcast_ref::<M>()
    }
}

type Constructor = fn() -> Box<dyn DynMessage>;
type Decoder = fn(&[u8]) -> Result<Box<dyn DynMessage>, CodecError>;

#[derive(Clone, Copy)]
struct FactoryEntry {
    construct: Constructor,
    decode: Decoder,
}

fn construct<M: Message + Default>() -> Box<dyn DynMessage> {
    Box::new(M::default())
}

fn decode_boxed<M: Message>(bytes: &[u8]) -> Result<Box<dyn DynMessage>, CodecError> {
    M::decode(bytes).map(|msg| Box::new(msg) as Box<dyn DynMessage>)
}

/// Runtime registry from type name to constructor and decoder.
#[derive(Default)]
pub struct MessageFactory {
    entries: RwLock<HashMap<String, FactoryEntry>>,
}

impl MessageFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory pre-loaded with the built-in message set.
    #[must_use]
    pub fn with_builtin() -> Self {
        let factory = Self::new();
        crate::msgs::register_builtin(&factory);
        factory
    }

    /// Register `M` under `M::TYPE_NAME`. Re-registering replaces the entry.
    pub fn register<M: Message + Default>(&self) {
        self.entries.write().insert(
            M::TYPE_NAME.to_string(),
            FactoryEntry {
                construct: construct::<M>,
                decode: decode_boxed::<M>,
            },
        );
    }

    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.read().contains_key(type_name)
    }

    /// A default-valued instance, or `None` for an unknown type.
    #[must_use]
    pub fn new_message(&self, type_name: &str) -> Option<Box<dyn DynMessage>> {
        let entry = self.entries.read().get(type_name).copied()?;
        Some((entry.construct)())
    }

    /// Decode `bytes` as `type_name`.
    pub fn decode(&self, type_name: &str, bytes: &[u8]) -> Result<Box<dyn DynMessage>, CodecError> {
        let entry = self
            .entries
            .read()
            .get(type_name)
            .copied()
            .ok_or_else(|| CodecError::UnknownType(type_name.to_string()))?;
        (entry.decode)(bytes)
    }

    /// Registered type names, sorted.
    #[must_use]
    pub fn type_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageFactory")
            .field("types", &self.type_names())
            .finish()
    }
}
