//! Responder selection.
//!
//! Candidates are filtered by request and reply type, ordered by
//! `(process uuid, node uuid)` and picked round-robin with one cursor per
//! fully qualified service name. Two requesters in the same process
//! therefore alternate over the same sequence; requesters in different
//! processes keep independent cursors.

use dashmap::DashMap;
use shared_types::{Endpoint, ServicePublisher};

/// Per-service round-robin cursors.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursors: DashMap<String, usize>,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pick the next responder for `service` able to take `req_type_name`
    /// and produce `rep_type_name`. `None` when nothing matches.
    pub fn select(
        &self,
        service: &str,
        req_type_name: &str,
        rep_type_name: &str,
        candidates: Vec<ServicePublisher>,
    ) -> Option<ServicePublisher> {
        let mut matching: Vec<ServicePublisher> = candidates
            .into_iter()
            .filter(|p| p.req_type_name() == req_type_name && p.rep_type_name() == rep_type_name)
            .collect();
        if matching.is_empty() {
            return None;
        }
        matching.sort_by_key(|p| p.key());

        let mut cursor = self.cursors.entry(service.to_string()).or_insert(0);
        let index = *cursor % matching.len();
        *cursor = cursor.wrapping_add(1);
        drop(cursor);

        Some(matching.swap_remove(index))
    }
}
