use crate::service::{DiscoveryService, Tracked};
use shared_types::{DiscoveryMessage, Endpoint, Scope};
use std::sync::atomic::Ordering;
use std::time::Duration;
use tracing::{debug, info, warn};
use transport_telemetry::metrics::{DISCOVERY_EXPIRATIONS, DISCOVERY_KNOWN_PUBLISHERS};

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Local advertisements re-broadcast.
    pub rebroadcast: usize,
    /// Remote records expired.
    pub expired: usize,
    /// Silent processes dropped.
    pub lost_peers: usize,
    /// At least one broadcast failed.
    pub failed: bool,
}

impl DiscoveryService {
    /// Periodic maintenance.
    ///
    /// Call from a timer task every [`next_sweep_delay`](Self::next_sweep_delay):
    /// - re-broadcast local advertisements within their scope
    /// - send a heartbeat
    /// - expire remote records and processes silent for longer than
    ///   `silence_multiplier` heartbeats
    pub fn sweep(&self) -> SweepReport {
        let mut report = SweepReport::default();

        let announcements: Vec<(Scope, DiscoveryMessage)> = self
            .messages
            .local_publishers()
            .iter()
            .map(|p| (p.scope(), p.discovery()))
            .chain(
                self.services
                    .local_publishers()
                    .iter()
                    .map(|p| (p.scope(), p.discovery())),
            )
            .filter(|(scope, _)| *scope != Scope::Process)
            .collect();

        for (scope, msg) in &announcements {
            if self.send(*scope, msg) {
                report.rebroadcast += 1;
            } else {
                report.failed = true;
            }
        }

        let heartbeat = DiscoveryMessage::Heartbeat {
            addr: self.addr.clone(),
        };
        if !self.send(Scope::All, &heartbeat) {
            report.failed = true;
        }

        let now = self.now();
        let timeout = self.config.silence_timeout();
        for puuid in self.peers.take_silent(now, timeout) {
            info!(puuid = %puuid, "[discovery] peer fell silent");
            report.expired += self.drop_process(puuid);
            report.lost_peers += 1;
        }
        report.expired += self.expire_records::<shared_types::MessagePublisher>(timeout);
        report.expired += self.expire_records::<shared_types::ServicePublisher>(timeout);

        if report.expired > 0 {
            self.counters
                .expirations
                .fetch_add(report.expired as u64, Ordering::Relaxed);
            DISCOVERY_EXPIRATIONS.inc_by(report.expired as f64);
        }

        if report.failed {
            let failures = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            warn!(
                failures,
                delay_ms = self.config.backoff(failures).as_millis() as u64,
                "[discovery] sweep broadcast failed, backing off"
            );
        } else {
            self.consecutive_failures.store(0, Ordering::Relaxed);
        }

        debug!(?report, "[discovery] sweep");
        report
    }

    fn expire_records<P: Tracked>(&self, timeout: Duration) -> usize {
        let expired = P::store(self).expire(self.now(), timeout);
        let count = expired.len();
        DISCOVERY_KNOWN_PUBLISHERS.sub(count as f64);
        for entry in expired {
            debug!(topic = %entry.publisher.topic(), "[discovery] remote publisher expired");
            self.notify(entry.publisher.removed());
        }
        count
    }

    /// Delay until the next sweep: the heartbeat interval, doubled for each
    /// consecutive failed sweep and capped at `max_backoff`.
    #[must_use]
    pub fn next_sweep_delay(&self) -> Duration {
        self.config
            .backoff(self.consecutive_failures.load(Ordering::Relaxed))
    }

    /// Withdraw every local publisher and tell peers this process is gone.
    ///
    /// Returns the number of local publishers removed.
    pub fn shutdown(&self) -> usize {
        let removed = self.messages.clear_local().len() + self.services.clear_local().len();
        self.send(Scope::All, &DiscoveryMessage::Bye);
        info!(puuid = %self.puuid, removed, "[discovery] shut down");
        removed
    }
}
