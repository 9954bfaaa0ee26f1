//! # Occupancy Ledger
//!
//! One [`LedgerEntry`] per point records which holders hold which kinds
//! there. Entries are created by the snapshot builder and shared as
//! `Arc<LedgerEntry>`; the same instance is carried into every later
//! snapshot that still contains the point, so a lock taken before a reload
//! is still the lock after it.
//!
//! ## Synchronization
//!
//! - Each entry has its own mutex. No lock ever spans two entries.
//! - `blocked` mirrors "has any holder" for lock-free reads.
//! - A [`HolderObserver`] is notified *inside* the entry lock whenever a
//!   holder appears at or disappears from the entry, which keeps the
//!   coordinator's reverse index in step with the entry. Observers must not
//!   call back into any ledger entry.
//! - Change notifications for subscribers ([`events`]) are published by the
//!   caller after the entry call returns, never under the entry lock.

pub mod events;

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::model::{HolderId, KindSet, OccupancyKind, PointKey};

/// Receives holder membership changes for ledger entries.
pub trait HolderObserver {
    /// `holder` now holds at least one kind at `entry`.
    fn attached(&self, holder: &HolderId, entry: &Arc<LedgerEntry>);
    /// `holder` no longer holds anything at `key`.
    fn detached(&self, holder: &HolderId, key: PointKey);
}

/// Observer that ignores everything.
impl HolderObserver for () {
    fn attached(&self, _holder: &HolderId, _entry: &Arc<LedgerEntry>) {}
    fn detached(&self, _holder: &HolderId, _key: PointKey) {}
}

/// Outcome of a single-point acquire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Acquire {
    /// Newly recorded.
    Acquired,
    /// The holder already had this kind here; nothing changed.
    AlreadyHeld,
    /// Another holder has this kind here.
    Contended { holder: HolderId },
}

impl Acquire {
    pub fn is_success(&self) -> bool {
        !matches!(self, Acquire::Contended { .. })
    }
}

type Holders = SmallVec<[(HolderId, KindSet); 2]>;

/// Per-point occupancy record.
pub struct LedgerEntry {
    key: PointKey,
    holders: Mutex<Holders>,
    blocked: AtomicBool,
}

impl LedgerEntry {
    pub fn new(key: PointKey) -> Self {
        Self {
            key,
            holders: Mutex::new(SmallVec::new()),
            blocked: AtomicBool::new(false),
        }
    }

    pub fn key(&self) -> PointKey {
        self.key
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Acquire `kind` for `holder` unless another holder already has it.
    ///
    /// A holder that already has `kind` gets `AlreadyHeld` even when a forced
    /// entry put a second holder on the same kind.
    pub fn try_occupy(
        self: &Arc<Self>,
        holder: &HolderId,
        kind: OccupancyKind,
        observer: &dyn HolderObserver,
    ) -> Acquire {
        let mut holders = self.holders.lock();

        if holders.iter().any(|(h, kinds)| h == holder && kinds.contains(kind)) {
            return Acquire::AlreadyHeld;
        }
        if let Some((other, _)) = holders
            .iter()
            .find(|(h, kinds)| h != holder && kinds.contains(kind))
        {
            return Acquire::Contended { holder: other.clone() };
        }

        if self.insert_locked(&mut holders, holder, kind, observer) {
            Acquire::Acquired
        } else {
            Acquire::AlreadyHeld
        }
    }

    /// Record `kind` for `holder` regardless of other holders.
    ///
    /// Operator override; returns true if the kind was newly recorded.
    pub fn force_occupy(
        self: &Arc<Self>,
        holder: &HolderId,
        kind: OccupancyKind,
        observer: &dyn HolderObserver,
    ) -> bool {
        let mut holders = self.holders.lock();
        self.insert_locked(&mut holders, holder, kind, observer)
    }

    /// Drop `kind` for `holder`. Returns whether anything changed.
    pub fn release(
        &self,
        holder: &HolderId,
        kind: OccupancyKind,
        observer: &dyn HolderObserver,
    ) -> bool {
        !self
            .release_kinds(holder, KindSet::EMPTY.with(kind), observer)
            .is_empty()
    }

    /// Drop every kind in `kinds` for `holder`. Returns the kinds actually removed.
    pub fn release_kinds(
        &self,
        holder: &HolderId,
        kinds: KindSet,
        observer: &dyn HolderObserver,
    ) -> KindSet {
        let mut holders = self.holders.lock();
        let Some(pos) = holders.iter().position(|(h, _)| h == holder) else {
            return KindSet::EMPTY;
        };

        let held = holders[pos].1;
        let removed = held.intersect(kinds);
        if removed.is_empty() {
            return removed;
        }

        let remaining = KindSet::from_iter(held.iter().filter(|k| !removed.contains(*k)));
        if remaining.is_empty() {
            holders.remove(pos);
        } else {
            holders[pos].1 = remaining;
        }
        self.blocked.store(!holders.is_empty(), Ordering::Release);
        if remaining.is_empty() {
            observer.detached(holder, self.key);
        }
        removed
    }

    /// Drop everything `holder` has here. Returns the kinds removed.
    pub fn release_holder(&self, holder: &HolderId, observer: &dyn HolderObserver) -> KindSet {
        self.release_kinds(holder, KindSet::from_iter(OccupancyKind::ALL), observer)
    }

    fn insert_locked(
        self: &Arc<Self>,
        holders: &mut Holders,
        holder: &HolderId,
        kind: OccupancyKind,
        observer: &dyn HolderObserver,
    ) -> bool {
        let inserted = match holders.iter_mut().find(|(h, _)| h == holder) {
            Some((_, kinds)) => kinds.insert(kind),
            None => {
                holders.push((holder.clone(), KindSet::EMPTY.with(kind)));
                observer.attached(holder, self);
                true
            }
        };
        self.blocked.store(true, Ordering::Release);
        inserted
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Any holder present. Lock-free.
    pub fn is_blocked(&self) -> bool {
        self.blocked.load(Ordering::Acquire)
    }

    pub fn contains_kind(&self, kind: OccupancyKind) -> bool {
        self.is_blocked() && self.holders.lock().iter().any(|(_, k)| k.contains(kind))
    }

    /// Who holds `kind` here, if anyone.
    pub fn holder_of(&self, kind: OccupancyKind) -> Option<HolderId> {
        self.holders
            .lock()
            .iter()
            .find(|(_, k)| k.contains(kind))
            .map(|(h, _)| h.clone())
    }

    pub fn kinds_of(&self, holder: &HolderId) -> KindSet {
        self.holders
            .lock()
            .iter()
            .find(|(h, _)| h == holder)
            .map(|(_, k)| *k)
            .unwrap_or_default()
    }

    pub fn holds(&self, holder: &HolderId, kind: OccupancyKind) -> bool {
        self.kinds_of(holder).contains(kind)
    }

    pub fn is_held_by(&self, holder: &HolderId) -> bool {
        !self.kinds_of(holder).is_empty()
    }

    /// Copy of the current holder table.
    pub fn holders(&self) -> Vec<(HolderId, KindSet)> {
        self.holders.lock().to_vec()
    }
}

impl fmt::Debug for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LedgerEntry")
            .field("key", &self.key)
            .field("holders", &*self.holders.lock())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
