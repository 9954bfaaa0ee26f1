//! Occupancy change notifications.
//!
//! Every ledger mutation that actually changes an entry is published on a
//! `tokio::sync::broadcast` channel after the entry lock is released.
//! Re-acquiring a held kind or releasing a kind that was not held publishes
//! nothing. Slow receivers lag and miss events; they never block a writer.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::model::{HolderId, KindSet, OccupancyKind, PointKey};

/// Default number of buffered events per receiver.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyChange {
    Occupied,
    Released,
}

/// One kind gained or lost by one holder at one point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OccupancyEvent {
    pub key: PointKey,
    pub holder: HolderId,
    pub kind: OccupancyKind,
    pub change: OccupancyChange,
}

/// Publisher side of the occupancy event stream.
pub struct OccupancyEvents {
    sender: broadcast::Sender<OccupancyEvent>,
}

impl OccupancyEvents {
    /// `capacity` is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<OccupancyEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }

    pub fn publish(&self, event: OccupancyEvent) {
        // send only fails when nobody listens
        if self.sender.send(event).is_err() {
            tracing::trace!("no occupancy subscribers");
        }
    }

    pub fn occupied(&self, key: PointKey, holder: &HolderId, kind: OccupancyKind) {
        if self.subscriber_count() == 0 {
            return;
        }
        self.publish(OccupancyEvent {
            key,
            holder: holder.clone(),
            kind,
            change: OccupancyChange::Occupied,
        });
    }

    /// One event per kind in `kinds`.
    pub fn released(&self, key: PointKey, holder: &HolderId, kinds: KindSet) {
        if kinds.is_empty() || self.subscriber_count() == 0 {
            return;
        }
        for kind in kinds.iter() {
            self.publish(OccupancyEvent {
                key,
                holder: holder.clone(),
                kind,
                change: OccupancyChange::Released,
            });
        }
    }
}

impl Default for OccupancyEvents {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for OccupancyEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OccupancyEvents")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
