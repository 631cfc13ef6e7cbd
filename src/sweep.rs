use crate::client::{Fetch, ProbeOutcome};
use crate::liveness::is_live;
use crate::probe::probe;
use crate::select_stream_or_shutdown::{select_stream_or_shutdown, GenericBoxedStream, Next};
use crate::store::Registrar;
use futures_util::stream::{self, StreamExt};
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

/// Every address of `local`'s /24 on `local`'s port, ascending, without `local` itself.
pub fn candidates(local: SocketAddrV4) -> Vec<SocketAddrV4> {
    let [a, b, c, _] = local.ip().octets();
    (0..=255u8)
        .map(|i| SocketAddrV4::new(Ipv4Addr::new(a, b, c, i), local.port()))
        .filter(|candidate| *candidate != local)
        .collect()
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct SweepSummary {
    pub probed: usize,
    /// Candidates that answered the join with 201.
    pub accepted: Vec<SocketAddrV4>,
    /// Accepted candidates that were not members before this sweep.
    pub registered: usize,
    pub failures: usize,
    pub cancelled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SweepReport {
    /// The local discovery service did not answer; nothing was probed.
    ServiceDown,
    Finished(SweepSummary),
}

pub struct Sweeper {
    fetch: Arc<dyn Fetch>,
    registrar: Arc<dyn Registrar>,
    local: SocketAddrV4,
    concurrency: usize,
}

impl Sweeper {
    pub fn new(
        fetch: Arc<dyn Fetch>,
        registrar: Arc<dyn Registrar>,
        local: SocketAddrV4,
        concurrency: usize,
    ) -> Self {
        Self {
            fetch,
            registrar,
            local,
            concurrency: concurrency.max(1),
        }
    }

    pub async fn sweep(&self, shutdown: &Notify) -> SweepReport {
        if !is_live(self.fetch.as_ref(), &self.local.to_string()).await {
            warn!("Discovery service at {} is not running", self.local);
            return SweepReport::ServiceDown;
        }

        let candidates = candidates(self.local);
        info!(
            "Sweeping {} candidates around {} ({} at a time)",
            candidates.len(),
            self.local,
            self.concurrency
        );

        let fetch = self.fetch.clone();
        let mut results: GenericBoxedStream<(SocketAddrV4, ProbeOutcome)> = Box::pin(
            stream::iter(candidates)
                .map(move |candidate| {
                    let fetch = fetch.clone();
                    async move { (candidate, probe(fetch.as_ref(), candidate).await) }
                })
                .buffer_unordered(self.concurrency),
        );

        let mut summary = SweepSummary::default();
        loop {
            match select_stream_or_shutdown(results.as_mut(), shutdown).await {
                Next::Item((candidate, outcome)) => {
                    summary.probed += 1;
                    self.record(candidate, outcome, &mut summary).await;
                }
                Next::Ended => break,
                Next::Shutdown => {
                    warn!("Sweep interrupted after {} probes", summary.probed);
                    summary.cancelled = true;
                    break;
                }
            }
        }

        info!(
            "Sweep finished: {} probed, {} accepted, {} new",
            summary.probed,
            summary.accepted.len(),
            summary.registered
        );
        SweepReport::Finished(summary)
    }

    async fn record(
        &self,
        candidate: SocketAddrV4,
        outcome: ProbeOutcome,
        summary: &mut SweepSummary,
    ) {
        if let Some(payload) = announcement(&outcome) {
            info!("{} (HTTP {}): {}", candidate, outcome.status(), payload);
        }

        if !outcome.is_accepted() {
            return;
        }

        summary.accepted.push(candidate);
        match self.registrar.register(&candidate.to_string()).await {
            Ok(true) => {
                info!("Registered active peer {}", candidate);
                summary.registered += 1;
            }
            Ok(false) => debug!("{} is already a member", candidate),
            Err(e) => {
                error!("Failed to register {}: {}", candidate, e);
                summary.failures += 1;
            }
        }
    }
}

/// The payload a probe result prints, transport errors included. Empty bodies print nothing.
pub fn announcement(outcome: &ProbeOutcome) -> Option<String> {
    let payload = outcome.payload();
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}
