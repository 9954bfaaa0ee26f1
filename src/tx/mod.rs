//! Path reservation scope.
//!
//! A [`PathReservation`] collects the locks taken for one holder and one
//! kind, point by point. If it is dropped without [`commit`], every lock it
//! newly took is released again in reverse order. Locks the holder already
//! had before the reservation began are never touched.
//!
//! Each step resolves its point through the live snapshot, not the one that
//! was current when the reservation began. A lock that lands on an entry a
//! concurrent reload has just removed is released again and the step fails.
//!
//! Rollback runs from `Drop`, so it also runs while a panic unwinds through
//! the caller. Each release step is isolated with `catch_unwind`; a step
//! that panics is logged and the remaining steps still run.
//!
//! [`commit`]: PathReservation::commit

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::ledger::events::OccupancyEvents;
use crate::ledger::{Acquire, HolderObserver, LedgerEntry};
use crate::model::{HolderId, KindSet, OccupancyKind, PointKey};
use crate::snapshot::TopologySnapshot;

/// Reservation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    Open,
    Committed,
    RolledBack,
}

/// All-or-nothing reservation of several points under one kind.
pub struct PathReservation<'c> {
    live: &'c ArcSwap<TopologySnapshot>,
    holder: HolderId,
    kind: OccupancyKind,
    observer: &'c dyn HolderObserver,
    events: &'c OccupancyEvents,
    /// Entries newly acquired by this reservation, in acquisition order.
    acquired: Vec<Arc<LedgerEntry>>,
    state: TxState,
}

impl<'c> PathReservation<'c> {
    pub(crate) fn begin(
        live: &'c ArcSwap<TopologySnapshot>,
        holder: HolderId,
        kind: OccupancyKind,
        observer: &'c dyn HolderObserver,
        events: &'c OccupancyEvents,
    ) -> Self {
        Self {
            live,
            holder,
            kind,
            observer,
            events,
            acquired: Vec::new(),
            state: TxState::Open,
        }
    }

    pub fn holder(&self) -> &HolderId {
        &self.holder
    }

    pub fn kind(&self) -> OccupancyKind {
        self.kind
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    /// Points newly locked so far, in order.
    pub fn acquired(&self) -> Vec<PointKey> {
        self.acquired.iter().map(|e| e.key()).collect()
    }

    /// Lock one more point. False when the point is unknown or another
    /// holder has the kind there; the reservation stays open either way.
    pub fn acquire(&mut self, key: PointKey) -> bool {
        if self.state != TxState::Open {
            return false;
        }
        let Some(entry) = self.live.load().ledger_entry(key).cloned() else {
            tracing::debug!(holder = %self.holder, point = %key, "reservation: unknown point");
            return false;
        };
        match entry.try_occupy(&self.holder, self.kind, self.observer) {
            Acquire::Acquired => {
                if !self.is_live(&entry) {
                    entry.release(&self.holder, self.kind, self.observer);
                    tracing::debug!(holder = %self.holder, point = %key, "reservation: point removed by reload");
                    return false;
                }
                self.events.occupied(key, &self.holder, self.kind);
                self.acquired.push(entry);
                true
            }
            Acquire::AlreadyHeld => self.is_live(&entry),
            Acquire::Contended { holder } => {
                tracing::debug!(
                    holder = %self.holder,
                    point = %key,
                    kind = %self.kind,
                    owner = %holder,
                    "reservation: point contended"
                );
                false
            }
        }
    }

    /// Keep every lock taken. Returns how many points were newly locked.
    pub fn commit(mut self) -> usize {
        self.state = TxState::Committed;
        self.acquired.len()
    }

    /// Release every newly taken lock now. Returns how many were released.
    pub fn rollback(mut self) -> usize {
        self.unwind()
    }

    fn is_live(&self, entry: &Arc<LedgerEntry>) -> bool {
        self.live.load().owns_entry(entry)
    }

    fn unwind(&mut self) -> usize {
        self.state = TxState::RolledBack;
        let mut released = 0;
        while let Some(entry) = self.acquired.pop() {
            let step = panic::catch_unwind(AssertUnwindSafe(|| {
                entry.release(&self.holder, self.kind, self.observer)
            }));
            match step {
                Ok(true) => {
                    released += 1;
                    self.events.released(entry.key(), &self.holder, KindSet::EMPTY.with(self.kind));
                }
                Ok(false) => {
                    tracing::warn!(
                        holder = %self.holder,
                        point = %entry.key(),
                        kind = %self.kind,
                        "rollback: lock already gone"
                    );
                }
                Err(payload) => {
                    tracing::error!(
                        holder = %self.holder,
                        point = %entry.key(),
                        kind = %self.kind,
                        panic = panic_message(payload.as_ref()),
                        "CRITICAL: rollback step panicked; point may stay locked"
                    );
                }
            }
        }
        released
    }
}

impl Drop for PathReservation<'_> {
    fn drop(&mut self) {
        if self.state == TxState::Open && !self.acquired.is_empty() {
            let released = self.unwind();
            tracing::debug!(holder = %self.holder, kind = %self.kind, released, "reservation rolled back");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic>"
    }
}
