//! # Map Coordinator
//!
//! The one long-lived, mutable object of the crate. It owns
//!
//! - the live [`TopologySnapshot`] behind an `ArcSwap`, replaced whole on reload;
//! - the [`DeviceIndex`], which outlives every snapshot;
//! - the occupancy event channel behind [`MapCoordinator::subscribe`];
//! - the builder, its source and the shared configuration handle.
//!
//! Every public operation loads the current snapshot once and works on that
//! snapshot only, so a concurrent reload is never observed half-way.
//! Operations answer with `bool`, `Option` or a collection; unknown keys are
//! a normal outcome, not an error. Only [`MapCoordinator::bootstrap`] fails.
//!
//! | Concern | Module |
//! |---------|--------|
//! | Point, edge and neighbour lookups | `query` |
//! | Acquire / release / path reservation | `occupancy` |
//! | Bootstrap and hot reload | `reload` |
//! | Holder → held entries | `device_index` |
//!
//! ## Limitations
//!
//! - A caller still holding a pre-reload snapshot (or an entry taken from
//!   one) can lock a point that the reload removed by calling the entry
//!   directly. Such a lock lives only in the orphaned entry. Coordinator
//!   operations and [`PathReservation`](crate::tx::PathReservation) always
//!   resolve through the live snapshot.

pub mod device_index;
pub mod occupancy;
pub mod query;
pub mod reload;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64};

use arc_swap::ArcSwap;
use tokio::sync::broadcast;

use crate::config::ConfigHandle;
use crate::ledger::events::{OccupancyEvent, OccupancyEvents};
use crate::snapshot::{SnapshotBuilder, TopologySnapshot};
use crate::storage::{self, MapSource};
use crate::Result;

pub use device_index::DeviceIndex;
pub use reload::ReloadOutcome;

pub struct MapCoordinator {
    current: ArcSwap<TopologySnapshot>,
    builder: SnapshotBuilder,
    devices: DeviceIndex,
    events: OccupancyEvents,
    reloading: AtomicBool,
    generation: AtomicU64,
    installs: AtomicU64,
}

impl MapCoordinator {
    /// A coordinator serving an empty topology until the first load.
    pub fn new(source: Arc<dyn MapSource>, config: ConfigHandle) -> Self {
        Self {
            current: ArcSwap::from_pointee(TopologySnapshot::empty()),
            builder: SnapshotBuilder::new(source, config),
            devices: DeviceIndex::new(),
            events: OccupancyEvents::default(),
            reloading: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            installs: AtomicU64::new(0),
        }
    }

    /// Source chosen by `rcs_map.source_type`.
    pub fn from_config(config: ConfigHandle) -> Result<Self> {
        let source = storage::source_from_config(&config)?;
        Ok(Self::new(source, config))
    }

    /// The live snapshot. Hold it only as long as one consistent view is needed.
    pub fn snapshot(&self) -> Arc<TopologySnapshot> {
        self.current.load_full()
    }

    pub fn config(&self) -> &ConfigHandle {
        self.builder.config()
    }

    pub fn devices(&self) -> &DeviceIndex {
        &self.devices
    }

    /// Stream of occupancy changes made through this coordinator.
    ///
    /// Only actual changes are sent. A receiver that falls more than
    /// [`DEFAULT_CAPACITY`](crate::ledger::events::DEFAULT_CAPACITY) events
    /// behind gets `RecvError::Lagged` and skips ahead.
    pub fn subscribe(&self) -> broadcast::Receiver<OccupancyEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for MapCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snap = self.current.load();
        f.debug_struct("MapCoordinator")
            .field("source", &self.builder.source().name())
            .field("generation", &snap.generation())
            .field("points", &snap.point_count())
            .field("holders", &self.devices.len())
            .field("subscribers", &self.events.subscriber_count())
            .finish()
    }
}
