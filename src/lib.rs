//! # fleet-topology: Navigation Graph and Occupancy Ledger for AGV Fleets
//!
//! A versioned multi-floor navigation graph plus a per-point occupancy
//! ledger. Concurrent planners ask "can I reserve this point or path right
//! now" and get correct, rollback-safe answers, while the whole graph can be
//! rebuilt and swapped in without losing a single in-flight lock.
//!
//! ## Design Principles
//!
//! 1. **Immutable topology, mutable cells**: a `TopologySnapshot` never
//!    changes after it is built; only its `LedgerEntry` cells do
//! 2. **Two kinds of keys**: `PointKey` is the stable business key,
//!    `GraphIndex` is valid for one snapshot only and cannot be persisted
//! 3. **One owner**: `MapCoordinator` holds the live snapshot and the
//!    device index; there are no process-wide statics
//! 4. **Guarded rollback**: a path reservation releases what it acquired
//!    when dropped, even on an early return or a panic
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fleet_topology::{config, HolderId, MapConfig, MapCoordinator, MemorySource, OccupancyKind, PointKey};
//!
//! # async fn example() -> fleet_topology::Result<()> {
//! let source = MemorySource::new().with_floor(1, r#"{"point": [
//!     {"id": 1, "x": 0, "y": 0, "targets": [{"id": 2, "distance": 1000}]},
//!     {"id": 2, "x": 1000, "y": 0}
//! ]}"#);
//! let coord = MapCoordinator::new(Arc::new(source), config::handle(MapConfig::default()));
//! coord.bootstrap().await?;
//!
//! let agv = HolderId::from("AGV_01");
//! let path = [PointKey::new(1, 1), PointKey::new(1, 2)];
//! if coord.try_occupy_path(&agv, &path, OccupancyKind::Task) {
//!     // drive ...
//!     coord.release_path(&agv, &path, OccupancyKind::Task);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Map Sources
//!
//! | Source | `rcs_map.source_type` | Description |
//! |--------|-----------------------|-------------|
//! | File | `file` (default) | One JSON document per floor on disk |
//! | Memory | n/a | In-process documents, for tests and embedding |

// ============================================================================
// Modules
// ============================================================================

pub mod model;
pub mod ledger;
pub mod storage;
pub mod index;
pub mod snapshot;
pub mod config;
pub mod coordinator;
pub mod tx;

// ============================================================================
// Re-exports: Model
// ============================================================================

pub use model::{
    FloorId, PointId, PointKey, GraphIndex, Point, Target, CurveType,
    Direction, OccupancyKind, KindSet, HolderId,
};

// ============================================================================
// Re-exports: Ledger, Storage, Snapshot
// ============================================================================

pub use ledger::{Acquire, HolderObserver, LedgerEntry};
pub use ledger::events::{OccupancyChange, OccupancyEvent, OccupancyEvents};
pub use storage::{MapSource, FileSource, MemorySource};
pub use snapshot::{BuildReport, Fingerprint, SnapshotBuilder, TopologySnapshot};

// ============================================================================
// Re-exports: Coordination
// ============================================================================

pub use config::{ConfigHandle, MapConfig};
pub use coordinator::{DeviceIndex, MapCoordinator, ReloadOutcome};
pub use tx::{PathReservation, TxState};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error: {0}")]
    Parse(#[from] model::ParsePointKeyError),

    #[error("Map source error: {0}")]
    Source(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Topology is empty: no floor produced any point")]
    EmptyTopology,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
