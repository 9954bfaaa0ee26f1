//! Occupancy transactions.
//!
//! Single-point operations are linearizable per point: they run entirely
//! under that point's ledger entry lock. Multi-point operations get no
//! cross-point atomicity from the ledger; path reservation provides its own
//! all-or-nothing behaviour through [`PathReservation`].
//!
//! Every change is published to [`MapCoordinator::subscribe`] receivers
//! after the entry call returns.

use std::sync::Arc;

use crate::ledger::{Acquire, LedgerEntry};
use crate::model::{HolderId, KindSet, OccupancyKind, PointKey};
use crate::tx::PathReservation;
use super::MapCoordinator;

impl MapCoordinator {
    // ========================================================================
    // Single point
    // ========================================================================

    /// Acquire `kind` at `key` unless another holder has it there.
    /// Re-acquiring one's own kind succeeds without changing anything.
    pub fn try_occupy(&self, holder: &HolderId, key: PointKey, kind: OccupancyKind) -> bool {
        let Some(entry) = self.entry_or_warn(key, holder) else {
            return false;
        };
        let outcome = entry.try_occupy(holder, kind, &self.devices);
        tracing::trace!(%holder, point = %key, %kind, ?outcome, "try_occupy");
        match outcome {
            Acquire::Acquired => self.settle(&entry, holder, kind),
            Acquire::AlreadyHeld => true,
            Acquire::Contended { .. } => false,
        }
    }

    /// Returns whether the ledger changed.
    pub fn release(&self, holder: &HolderId, key: PointKey, kind: OccupancyKind) -> bool {
        let Some(entry) = self.current.load().ledger_entry(key).cloned() else {
            return false;
        };
        let changed = entry.release(holder, kind, &self.devices);
        if changed {
            self.events.released(key, holder, KindSet::EMPTY.with(kind));
        }
        changed
    }

    /// Record `kind` for `holder` even if another holder has it.
    /// Operator override. False only when the point is unknown.
    pub fn force_occupy(&self, holder: &HolderId, key: PointKey, kind: OccupancyKind) -> bool {
        let Some(entry) = self.entry_or_warn(key, holder) else {
            return false;
        };
        if let Some(other) = entry.holder_of(kind).filter(|h| h != holder) {
            tracing::warn!(%holder, point = %key, %kind, displaced = %other, "forced occupancy over another holder");
        }
        if entry.force_occupy(holder, kind, &self.devices) {
            self.settle(&entry, holder, kind)
        } else {
            true
        }
    }

    /// Keep a lock just recorded at `entry` if the entry is still live and
    /// announce it; otherwise a reload removed the point, so undo it.
    fn settle(&self, entry: &Arc<LedgerEntry>, holder: &HolderId, kind: OccupancyKind) -> bool {
        if !self.current.load().owns_entry(entry) {
            entry.release(holder, kind, &self.devices);
            tracing::debug!(%holder, point = %entry.key(), %kind, "point removed by a concurrent reload");
            return false;
        }
        self.events.occupied(entry.key(), holder, kind);
        true
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Start an explicit reservation for `holder` and `kind` on the live
    /// snapshot. Locks taken through it are released again unless it is
    /// committed.
    pub fn reserve(&self, holder: &HolderId, kind: OccupancyKind) -> PathReservation<'_> {
        PathReservation::begin(&self.current, holder.clone(), kind, &self.devices, &self.events)
    }

    /// Lock every point in order, or none of them.
    ///
    /// Stops at the first point that is unknown or held by someone else and
    /// releases, newest first, every lock this call took. Locks the holder
    /// already had are left alone. An empty path fails.
    pub fn try_occupy_path(&self, holder: &HolderId, path: &[PointKey], kind: OccupancyKind) -> bool {
        if path.is_empty() {
            return false;
        }
        let mut reservation = self.reserve(holder, kind);
        for (step, key) in path.iter().enumerate() {
            if !reservation.acquire(*key) {
                tracing::debug!(%holder, %kind, point = %key, step, len = path.len(), "path reservation failed");
                return false;
            }
        }
        reservation.commit();
        true
    }

    /// Release `kind` at every listed point. True if any point changed.
    pub fn release_path(&self, holder: &HolderId, path: &[PointKey], kind: OccupancyKind) -> bool {
        let snap = self.current.load();
        let mut changed = false;
        for key in path {
            let Some(entry) = snap.ledger_entry(*key) else {
                continue;
            };
            if entry.release(holder, kind, &self.devices) {
                self.events.released(*key, holder, KindSet::EMPTY.with(kind));
                changed = true;
            }
        }
        changed
    }

    // ========================================================================
    // Resting position
    // ========================================================================

    /// Move `holder`'s resting lock to `key`.
    ///
    /// `kind` must be a resting kind (park or offline). The holder's other
    /// resting locks are read first, then `kind` is acquired at `key`, and
    /// only if that succeeds are the earlier ones released. On the same
    /// point only the other resting kind is dropped. A failed acquire
    /// leaves everything as it was.
    pub fn update_park_occupy(&self, holder: &HolderId, key: PointKey, kind: OccupancyKind) -> bool {
        if !kind.is_resting() {
            tracing::warn!(%holder, point = %key, %kind, "not a resting kind");
            return false;
        }
        let Some(target) = self.entry_or_warn(key, holder) else {
            return false;
        };
        if target.holds(holder, kind) {
            return true;
        }

        let previous = self.resting_locks(holder);

        match target.try_occupy(holder, kind, &self.devices) {
            Acquire::Acquired => {
                if !self.settle(&target, holder, kind) {
                    return false;
                }
            }
            Acquire::AlreadyHeld => {}
            Acquire::Contended { .. } => {
                tracing::debug!(%holder, point = %key, %kind, "resting position taken");
                return false;
            }
        }

        for (entry, kinds) in previous {
            let release = if Arc::ptr_eq(&entry, &target) {
                kinds.without(kind)
            } else {
                kinds
            };
            let removed = entry.release_kinds(holder, release, &self.devices);
            self.events.released(entry.key(), holder, removed);
        }
        true
    }

    /// Entries where `holder` has a resting kind, with those kinds.
    fn resting_locks(&self, holder: &HolderId) -> Vec<(Arc<LedgerEntry>, KindSet)> {
        self.devices
            .entries(holder)
            .into_iter()
            .filter_map(|entry| {
                let kinds = entry.kinds_of(holder).intersect(OccupancyKind::RESTING);
                (!kinds.is_empty()).then_some((entry, kinds))
            })
            .collect()
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Anyone holds anything at `key`.
    pub fn is_blocked(&self, key: PointKey) -> bool {
        self.current
            .load()
            .ledger_entry(key)
            .is_some_and(|e| e.is_blocked())
    }

    pub fn contains_kind(&self, key: PointKey, kind: OccupancyKind) -> bool {
        self.current
            .load()
            .ledger_entry(key)
            .is_some_and(|e| e.contains_kind(kind))
    }

    pub fn ledger_entry(&self, key: PointKey) -> Option<Arc<LedgerEntry>> {
        self.current.load().ledger_entry(key).cloned()
    }

    /// Entries `holder` holds anything at, ordered by key.
    pub fn held_points(&self, holder: &HolderId) -> Vec<Arc<LedgerEntry>> {
        self.devices.entries(holder)
    }

    pub fn held_kinds(&self, holder: &HolderId, key: PointKey) -> KindSet {
        self.current
            .load()
            .ledger_entry(key)
            .map(|e| e.kinds_of(holder))
            .unwrap_or_default()
    }

    // ========================================================================
    // Bulk release
    // ========================================================================

    /// Drop everything `holder` holds. Returns the number of points released.
    pub fn release_all(&self, holder: &HolderId) -> usize {
        let released = self
            .devices
            .entries(holder)
            .iter()
            .filter(|entry| {
                let removed = entry.release_holder(holder, &self.devices);
                self.events.released(entry.key(), holder, removed);
                !removed.is_empty()
            })
            .count();
        if released > 0 {
            tracing::info!(%holder, released, "released all occupancy");
        }
        released
    }

    /// Drop `holder`'s park and offline locks everywhere.
    pub fn release_resting(&self, holder: &HolderId) -> usize {
        self.devices
            .entries(holder)
            .iter()
            .filter(|entry| {
                let removed = entry.release_kinds(holder, OccupancyKind::RESTING, &self.devices);
                self.events.released(entry.key(), holder, removed);
                !removed.is_empty()
            })
            .count()
    }

    fn entry_or_warn(&self, key: PointKey, holder: &HolderId) -> Option<Arc<LedgerEntry>> {
        let entry = self.current.load().ledger_entry(key).cloned();
        if entry.is_none() {
            tracing::warn!(%holder, point = %key, "no such point");
        }
        entry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{self, MapConfig};
    use crate::ledger::events::{OccupancyChange, OccupancyEvent};
    use crate::storage::MemorySource;
    use tokio::sync::broadcast;
    use crate::model::OccupancyKind::*;

    const FLOOR: &str = r#"{"point": [{"id": 1}, {"id": 2}, {"id": 3}, {"id": 4}]}"#;

    async fn coordinator() -> MapCoordinator {
        let source = Arc::new(MemorySource::new().with_floor(1, FLOOR));
        let coord = MapCoordinator::new(source, config::handle(MapConfig::default()));
        coord.bootstrap().await.unwrap();
        coord
    }

    fn k(id: u32) -> PointKey {
        PointKey::new(1, id)
    }

    #[tokio::test]
    async fn test_acquire_release_and_device_index() {
        let coord = coordinator().await;
        let h = HolderId::from("AGV_1");
        assert!(coord.try_occupy(&h, k(1), Task));
        assert!(coord.try_occupy(&h, k(1), Task));
        assert_eq!(coord.held_kinds(&h, k(1)).len(), 1);
        assert_eq!(coord.held_points(&h).len(), 1);

        assert!(coord.release(&h, k(1), Task));
        assert!(!coord.release(&h, k(1), Task));
        assert!(coord.held_points(&h).is_empty());
        assert!(!coord.is_blocked(k(1)));
    }

    #[tokio::test]
    async fn test_unknown_point_is_not_an_error() {
        let coord = coordinator().await;
        let h = HolderId::from("AGV_1");
        assert!(!coord.try_occupy(&h, k(99), Task));
        assert!(!coord.release(&h, k(99), Task));
        assert!(!coord.force_occupy(&h, k(99), Task));
        assert!(!coord.is_blocked(k(99)));
        assert!(coord.ledger_entry(k(99)).is_none());
    }

    #[tokio::test]
    async fn test_path_rollback_keeps_pre_held() {
        let coord = coordinator().await;
        let (a, b) = (HolderId::from("A"), HolderId::from("B"));
        assert!(coord.try_occupy(&a, k(2), Task));
        assert!(coord.try_occupy(&b, k(3), Task));

        assert!(!coord.try_occupy_path(&a, &[k(1), k(2), k(3), k(4)], Task));
        assert!(!coord.contains_kind(k(1), Task));
        assert!(coord.held_kinds(&a, k(2)).contains(Task));
        assert!(!coord.held_kinds(&a, k(4)).contains(Task));

        assert!(!coord.try_occupy_path(&a, &[], Task));
    }

    #[tokio::test]
    async fn test_path_success_and_release() {
        let coord = coordinator().await;
        let h = HolderId::from("A");
        let path = [k(1), k(2), k(3)];
        assert!(coord.try_occupy_path(&h, &path, Distance));
        assert_eq!(coord.held_points(&h).len(), 3);
        assert!(coord.release_path(&h, &path, Distance));
        assert!(!coord.release_path(&h, &path, Distance));
        assert!(coord.held_points(&h).is_empty());
    }

    #[tokio::test]
    async fn test_park_transition() {
        let coord = coordinator().await;
        let h = HolderId::from("AGV_1");
        assert!(coord.try_occupy(&h, k(1), Park));
        assert!(coord.try_occupy(&h, k(1), Task));

        assert!(coord.update_park_occupy(&h, k(2), Park));
        assert!(!coord.held_kinds(&h, k(1)).contains(Park));
        assert!(coord.held_kinds(&h, k(1)).contains(Task));
        assert!(coord.held_kinds(&h, k(2)).contains(Park));

        // Same point: switch kind.
        assert!(coord.update_park_occupy(&h, k(2), Offline));
        assert_eq!(coord.held_kinds(&h, k(2)), KindSet::EMPTY.with(Offline));

        // Fast path.
        assert!(coord.update_park_occupy(&h, k(2), Offline));
        assert!(!coord.update_park_occupy(&h, k(3), Manual));
    }

    #[tokio::test]
    async fn test_park_transition_failure_keeps_old_lock() {
        let coord = coordinator().await;
        let (a, b) = (HolderId::from("A"), HolderId::from("B"));
        assert!(coord.try_occupy(&a, k(1), Park));
        assert!(coord.try_occupy(&b, k(2), Park));

        assert!(!coord.update_park_occupy(&a, k(2), Park));
        assert!(coord.held_kinds(&a, k(1)).contains(Park));
        assert!(coord.held_kinds(&a, k(2)).is_empty());
    }

    #[tokio::test]
    async fn test_force_and_bulk_release() {
        let coord = coordinator().await;
        let (a, b) = (HolderId::from("A"), HolderId::from("B"));
        assert!(coord.try_occupy(&a, k(1), Manual));
        assert!(coord.force_occupy(&b, k(1), Manual));
        assert!(coord.try_occupy(&b, k(2), Park));
        assert!(coord.try_occupy(&b, k(3), Offline));
        assert!(coord.try_occupy(&b, k(3), Task));

        assert_eq!(coord.release_resting(&b), 2);
        assert_eq!(coord.held_kinds(&b, k(3)), KindSet::EMPTY.with(Task));
        assert_eq!(coord.release_all(&b), 2);
        assert!(coord.held_points(&b).is_empty());
        assert!(coord.contains_kind(k(1), Manual));
    }

    fn drain(rx: &mut broadcast::Receiver<OccupancyEvent>) -> Vec<(PointKey, OccupancyKind, OccupancyChange)> {
        std::iter::from_fn(|| rx.try_recv().ok())
            .map(|e| (e.key, e.kind, e.change))
            .collect()
    }

    #[tokio::test]
    async fn test_events_only_on_change() {
        let coord = coordinator().await;
        let mut rx = coord.subscribe();
        let (a, b) = (HolderId::from("A"), HolderId::from("B"));

        assert!(coord.try_occupy(&a, k(1), Task));
        assert!(coord.try_occupy(&a, k(1), Task));
        assert!(!coord.try_occupy(&b, k(1), Task));
        assert!(coord.release(&a, k(1), Task));
        assert!(!coord.release(&a, k(1), Task));

        assert_eq!(
            drain(&mut rx),
            vec![(k(1), Task, OccupancyChange::Occupied), (k(1), Task, OccupancyChange::Released)]
        );
    }

    #[tokio::test]
    async fn test_events_for_park_move_and_bulk_release() {
        let coord = coordinator().await;
        let h = HolderId::from("AGV_1");
        assert!(coord.try_occupy(&h, k(1), Park));
        assert!(coord.try_occupy(&h, k(3), Task));

        let mut rx = coord.subscribe();
        assert!(coord.update_park_occupy(&h, k(2), Park));
        assert_eq!(coord.release_all(&h), 2);

        let events = drain(&mut rx);
        assert_eq!(
            events[..2],
            [(k(2), Park, OccupancyChange::Occupied), (k(1), Park, OccupancyChange::Released)]
        );
        let mut rest = events[2..].to_vec();
        rest.sort();
        assert_eq!(
            rest,
            vec![(k(2), Park, OccupancyChange::Released), (k(3), Task, OccupancyChange::Released)]
        );
    }

    #[tokio::test]
    async fn test_explicit_reservation() {
        let coord = coordinator().await;
        let h = HolderId::from("A");
        let mut tx = coord.reserve(&h, Choose);
        assert!(tx.acquire(k(1)));
        assert!(tx.acquire(k(4)));
        assert_eq!(tx.rollback(), 2);
        assert!(coord.held_points(&h).is_empty());
    }
}
