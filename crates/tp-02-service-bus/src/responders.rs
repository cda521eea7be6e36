//! Local responder table.
//!
//! Keyed by fully qualified service name, then by owning node. A node
//! offers at most one handler per service.

use dashmap::DashMap;
use shared_types::{NodeUuid, ProcessUuid, Scope, TransportError};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handles one encoded request and returns the encoded reply plus the
/// success flag carried back to the requester.
pub type ServiceHandler = Arc<dyn Fn(&[u8]) -> (Vec<u8>, bool) + Send + Sync>;

/// One local responder.
#[derive(Clone)]
pub struct Responder {
    pub handler: ServiceHandler,
    pub req_type_name: String,
    pub rep_type_name: String,
    pub scope: Scope,
}

impl Responder {
    /// True if this responder accepts the given request/reply pair.
    pub fn accepts(&self, req_type_name: &str, rep_type_name: &str) -> bool {
        self.req_type_name == req_type_name && self.rep_type_name == rep_type_name
    }
}

impl std::fmt::Debug for Responder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Responder")
            .field("req_type_name", &self.req_type_name)
            .field("rep_type_name", &self.rep_type_name)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Responders registered by the nodes of this process.
#[derive(Debug, Default)]
pub struct ResponderTable {
    services: DashMap<String, BTreeMap<NodeUuid, Responder>>,
}

impl ResponderTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `responder` for `(service, nuuid)`.
    ///
    /// # Errors
    ///
    /// `DuplicateRegistration` if the node already answers this service.
    pub fn insert(
        &self,
        service: &str,
        puuid: ProcessUuid,
        nuuid: NodeUuid,
        responder: Responder,
    ) -> Result<(), TransportError> {
        let mut entry = self.services.entry(service.to_string()).or_default();
        if entry.contains_key(&nuuid) {
            return Err(TransportError::DuplicateRegistration {
                topic: service.to_string(),
                puuid,
                nuuid,
            });
        }
        entry.insert(nuuid, responder);
        Ok(())
    }

    pub fn remove(&self, service: &str, nuuid: NodeUuid) -> bool {
        let Some(mut entry) = self.services.get_mut(service) else {
            return false;
        };
        let removed = entry.remove(&nuuid).is_some();
        let empty = entry.is_empty();
        drop(entry);
        if empty {
            self.services.remove_if(service, |_, nodes| nodes.is_empty());
        }
        removed
    }

    /// Drop every responder of a node. Returns the services it offered.
    pub fn remove_node(&self, nuuid: NodeUuid) -> Vec<String> {
        let mut services = Vec::new();
        self.services.retain(|service, nodes| {
            if nodes.remove(&nuuid).is_some() {
                services.push(service.clone());
            }
            !nodes.is_empty()
        });
        services.sort();
        services
    }

    /// Clone of the responder so the caller can run it without holding a lock.
    pub fn get(&self, service: &str, nuuid: NodeUuid) -> Option<Responder> {
        self.services
            .get(service)
            .and_then(|nodes| nodes.get(&nuuid).cloned())
    }

    /// Services offered by `nuuid`, sorted.
    pub fn services_for_node(&self, nuuid: NodeUuid) -> Vec<String> {
        let mut services: Vec<String> = self
            .services
            .iter()
            .filter(|entry| entry.value().contains_key(&nuuid))
            .map(|entry| entry.key().clone())
            .collect();
        services.sort();
        services
    }

    pub fn len(&self) -> usize {
        self.services.iter().map(|entry| entry.value().len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
