//! # Topology Model
//!
//! Plain value types for the navigation graph: points, the targets that
//! label edges, segment geometry, and occupancy kinds.
//!
//! Design rule: no locks, no I/O, no snapshot references here.

pub mod point;
pub mod target;
pub mod geometry;
pub mod occupancy;

pub use point::{ActionParam, FloorId, GraphIndex, ParsePointKeyError, Point, PointFlags, PointId, PointKey};
pub use target::{ControlPoint, CurveType, Direction, Target, BRIDGE_WEIGHT};
pub use geometry::Polyline;
pub use occupancy::{HolderId, KindSet, OccupancyKind};
