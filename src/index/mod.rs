//! Index management.
//!
//! Snapshots keep one [`SpatialIndex`] per floor for coordinate lookups
//! such as "which point is closest to where the vehicle reported itself".

pub mod spatial;

pub use spatial::{Envelope, SpatialIndex};
