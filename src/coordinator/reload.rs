//! Bootstrap and hot reload.
//!
//! A reload builds a complete snapshot off to the side, carries over the
//! ledger entries of every point that still exists, and publishes the
//! result with one atomic store. Readers see the old snapshot or the new
//! one, never a mix.
//!
//! At most one load runs at a time. A trigger that arrives while another
//! load is running is dropped with a warning rather than queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;

use crate::config::MapConfig;
use crate::{Error, Result};
use super::MapCoordinator;

/// What a reload did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReloadOutcome {
    /// A new snapshot is live.
    Installed {
        generation: u64,
        points: usize,
        /// Ledger entries carried over from the previous snapshot.
        carried: usize,
        /// Points that disappeared.
        dropped: usize,
    },
    /// Sources are byte-identical to the live snapshot's; nothing changed.
    Unchanged,
    /// The build produced no points; the previous snapshot stays live.
    Empty,
    /// Another load was running; this trigger was dropped.
    Busy,
    /// The source failed; the previous snapshot stays live.
    Failed(String),
}

impl ReloadOutcome {
    pub fn is_installed(&self) -> bool {
        matches!(self, ReloadOutcome::Installed { .. })
    }
}

/// Holds the reload flag for the lifetime of one load.
struct ReloadGuard<'a>(&'a AtomicBool);

impl<'a> ReloadGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl MapCoordinator {
    /// First load. Installs whatever the sources hold, even if a snapshot is
    /// already live. Fails if the source fails or yields no points.
    pub async fn bootstrap(&self) -> Result<()> {
        match self.load(true).await? {
            ReloadOutcome::Installed { .. } => Ok(()),
            ReloadOutcome::Empty => Err(Error::EmptyTopology),
            ReloadOutcome::Busy => Err(Error::Source("another map load is in progress".into())),
            other => Err(Error::Source(format!("unexpected bootstrap outcome: {other:?}"))),
        }
    }

    /// Rebuild and install if any floor's source changed.
    ///
    /// Never fails; problems are logged and reported in the outcome while
    /// the previous snapshot stays live.
    pub async fn reload(&self) -> ReloadOutcome {
        self.load_logged(false).await
    }

    /// Run [`reload`](Self::reload) on the tokio runtime.
    pub fn reload_async(self: &Arc<Self>) -> JoinHandle<ReloadOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.reload().await })
    }

    /// Replace the fallback configuration and rebuild.
    ///
    /// The configuration is fingerprinted alongside the floor documents. A
    /// rebuild that loses to a running load is not lost: the next
    /// [`reload`](Self::reload) sees the changed configuration and installs.
    pub fn apply_config(self: &Arc<Self>, config: MapConfig) -> JoinHandle<ReloadOutcome> {
        self.config().store(Arc::new(config));
        tracing::info!("map configuration replaced; rebuilding topology");
        let this = Arc::clone(self);
        tokio::spawn(async move { this.load_logged(false).await })
    }

    /// Generation of the live snapshot; 0 before the first install.
    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Snapshots installed since construction.
    pub fn install_count(&self) -> u64 {
        self.installs.load(Ordering::Acquire)
    }

    pub fn is_reloading(&self) -> bool {
        self.reloading.load(Ordering::Acquire)
    }

    async fn load_logged(&self, force: bool) -> ReloadOutcome {
        match self.load(force).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!(error = %e, "map reload failed; keeping the current topology");
                ReloadOutcome::Failed(e.to_string())
            }
        }
    }

    async fn load(&self, force: bool) -> Result<ReloadOutcome> {
        let Some(_guard) = ReloadGuard::try_acquire(&self.reloading) else {
            tracing::warn!("map reload already in progress; trigger ignored");
            return Ok(ReloadOutcome::Busy);
        };

        let report = self.builder.build().await?;
        let mut next = report.snapshot;
        if next.is_empty() {
            tracing::error!(failed_floors = report.failed_floors.len(), "map build is empty; keeping the current topology");
            return Ok(ReloadOutcome::Empty);
        }

        let live = self.current.load_full();
        if !force && next.same_sources(&live) {
            tracing::info!("map sources unchanged; reload skipped");
            return Ok(ReloadOutcome::Unchanged);
        }

        let stats = next.adopt_ledger(&live);
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        next.generation = generation;
        let points = next.point_count();
        let fingerprints: Vec<String> = next
            .fingerprints()
            .iter()
            .map(|(floor, fp)| format!("{floor}:{fp}"))
            .collect();

        self.current.store(Arc::new(next));
        self.installs.fetch_add(1, Ordering::AcqRel);
        let pruned = self.devices.prune(&stats.dropped);

        tracing::info!(
            generation,
            points,
            carried = stats.carried,
            fresh = stats.fresh,
            dropped = stats.dropped.len(),
            pruned,
            fingerprints = ?fingerprints,
            "topology snapshot installed"
        );

        Ok(ReloadOutcome::Installed {
            generation,
            points,
            carried: stats.carried,
            dropped: stats.dropped.len(),
        })
    }
}
