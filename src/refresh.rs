//! Generation-guarded recomputation of visit statistics.
//!
//! Every refresh request takes a [`RefreshTicket`] stamped with the next
//! generation number. A result is published only if its ticket is still the
//! newest one when it finishes, so when requests overlap the last request
//! wins, whatever order the computations complete in.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use log::{debug, info, warn};

use crate::aggregate::{compute_visit_stats, ReferenceData, VisitStats};
use crate::error::Result;
use crate::source::{PingSource, Subscription};
use crate::{Ping, VisitConfig};

/// Proof of a refresh request, stamped with its generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshTicket {
    generation: u64,
}

impl RefreshTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// What happened to a refresh.
#[derive(Debug, Clone)]
pub enum RefreshOutcome {
    /// This refresh's statistics are now the latest.
    Published(Arc<VisitStats>),
    /// A newer request was made first; the result was discarded.
    Superseded,
}

impl RefreshOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, RefreshOutcome::Published(_))
    }
}

/// Holder of the latest published statistics.
#[derive(Debug, Default)]
pub struct StatsRefresher {
    generation: AtomicU64,
    published: Mutex<Option<(u64, Arc<VisitStats>)>>,
}

impl StatsRefresher {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> MutexGuard<'_, Option<(u64, Arc<VisitStats>)>> {
        self.published
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a request. Any ticket issued earlier becomes stale.
    pub fn begin(&self) -> RefreshTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RefreshTicket { generation }
    }

    /// Whether no newer request has started since `ticket` was issued.
    pub fn is_current(&self, ticket: &RefreshTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.generation
    }

    /// Publish `stats` if `ticket` is still current.
    ///
    /// The check and the store happen under the same lock, so a stale result
    /// can never overwrite a newer one.
    pub fn publish(&self, ticket: RefreshTicket, stats: VisitStats) -> RefreshOutcome {
        let mut slot = self.slot();
        if !self.is_current(&ticket) {
            debug!(
                "[StatsRefresher] Discarding generation {} (current {})",
                ticket.generation,
                self.generation.load(Ordering::SeqCst)
            );
            return RefreshOutcome::Superseded;
        }
        let stats = Arc::new(stats);
        *slot = Some((ticket.generation, Arc::clone(&stats)));
        RefreshOutcome::Published(stats)
    }

    /// Latest published statistics, if any.
    pub fn latest(&self) -> Option<Arc<VisitStats>> {
        self.slot().as_ref().map(|(_, stats)| Arc::clone(stats))
    }

    /// Generation of the latest published statistics.
    pub fn published_generation(&self) -> Option<u64> {
        self.slot().as_ref().map(|(generation, _)| *generation)
    }

    /// Synchronous refresh from an in-hand snapshot.
    pub fn recompute(
        &self,
        pings: &[Ping],
        reference: &ReferenceData,
        config: &VisitConfig,
    ) -> RefreshOutcome {
        let ticket = self.begin();
        let stats = compute_visit_stats(pings, reference, config);
        self.publish(ticket, stats)
    }

    /// Asynchronous refresh.
    ///
    /// Staleness is checked after each await. A run overtaken by a newer
    /// request stops early and returns [`RefreshOutcome::Superseded`]. A ping
    /// source that fails counts as empty.
    pub async fn refresh<P, R>(&self, pings: P, reference: R, config: &VisitConfig) -> RefreshOutcome
    where
        P: Future<Output = Result<Vec<Ping>>>,
        R: Future<Output = Arc<ReferenceData>>,
    {
        let ticket = self.begin();
        let start = Instant::now();

        let pings = pings.await.unwrap_or_else(|e| {
            warn!("[StatsRefresher] Ping source failed, using empty history: {}", e);
            Vec::new()
        });
        if !self.is_current(&ticket) {
            return RefreshOutcome::Superseded;
        }

        let reference = reference.await;
        if !self.is_current(&ticket) {
            return RefreshOutcome::Superseded;
        }

        let stats = compute_visit_stats(&pings, &reference, config);
        let outcome = self.publish(ticket, stats);
        if outcome.is_published() {
            info!(
                "[StatsRefresher] Published generation {} in {:?}",
                ticket.generation,
                start.elapsed()
            );
        }
        outcome
    }

    /// Recompute whenever `source` reports a change.
    ///
    /// Holds only weak references to the refresher and the source, so
    /// watching keeps neither alive. Drop the subscription to stop.
    pub fn watch<S>(
        self: &Arc<Self>,
        source: &Arc<S>,
        reference: Arc<ReferenceData>,
        config: VisitConfig,
    ) -> Subscription
    where
        S: PingSource + 'static,
    {
        let refresher = Arc::downgrade(self);
        let weak_source = Arc::downgrade(source);
        source.subscribe(Arc::new(move || {
            let (Some(refresher), Some(source)) = (refresher.upgrade(), weak_source.upgrade()) else {
                return;
            };
            let pings = source.get_all().unwrap_or_else(|e| {
                warn!("[StatsRefresher] Ping source failed, using empty history: {}", e);
                Vec::new()
            });
            refresher.recompute(&pings, &reference, &config);
        }))
    }
}
