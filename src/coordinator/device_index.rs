//! Reverse index: holder → ledger entries it currently holds anything at.
//!
//! Kept current by the ledger itself: the coordinator passes this index as
//! the [`HolderObserver`] on every mutation, and the entry reports the
//! first attach and last detach of a holder while still holding its own
//! lock.
//!
//! ## Lock order
//!
//! Entry lock, then shard lock. Nothing in this module touches a ledger
//! entry while a shard guard is alive; readers copy the entry list out
//! first.

use std::sync::Arc;

use dashmap::DashMap;
use hashbrown::HashMap;

use crate::ledger::{HolderObserver, LedgerEntry};
use crate::model::{HolderId, PointKey};

#[derive(Default)]
pub struct DeviceIndex {
    holders: DashMap<HolderId, HashMap<PointKey, Arc<LedgerEntry>>>,
}

impl DeviceIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries `holder` is attached to, ordered by key.
    pub fn entries(&self, holder: &HolderId) -> Vec<Arc<LedgerEntry>> {
        let mut entries: Vec<_> = match self.holders.get(holder) {
            Some(held) => held.values().cloned().collect(),
            None => return Vec::new(),
        };
        entries.sort_by_key(|e| e.key());
        entries
    }

    pub fn keys(&self, holder: &HolderId) -> Vec<PointKey> {
        self.entries(holder).iter().map(|e| e.key()).collect()
    }

    pub fn contains(&self, holder: &HolderId, key: PointKey) -> bool {
        self.holders
            .get(holder)
            .is_some_and(|held| held.contains_key(&key))
    }

    pub fn holders(&self) -> Vec<HolderId> {
        let mut holders: Vec<_> = self.holders.iter().map(|e| e.key().clone()).collect();
        holders.sort();
        holders
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Forget points that no longer exist. Returns how many references were dropped.
    pub fn prune(&self, removed: &[PointKey]) -> usize {
        if removed.is_empty() {
            return 0;
        }
        let mut pruned = 0;
        for mut held in self.holders.iter_mut() {
            for key in removed {
                if held.value_mut().remove(key).is_some() {
                    tracing::warn!(holder = %held.key(), point = %key, "dropping lock on removed point");
                    pruned += 1;
                }
            }
        }
        self.holders.retain(|_, held| !held.is_empty());
        pruned
    }
}

impl std::fmt::Debug for DeviceIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Keys only: formatting an entry would take its lock under a shard guard.
        let mut map = f.debug_map();
        for held in self.holders.iter() {
            map.entry(held.key(), &held.value().keys().collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl HolderObserver for DeviceIndex {
    fn attached(&self, holder: &HolderId, entry: &Arc<LedgerEntry>) {
        self.holders
            .entry(holder.clone())
            .or_default()
            .insert(entry.key(), Arc::clone(entry));
    }

    fn detached(&self, holder: &HolderId, key: PointKey) {
        let now_empty = match self.holders.get_mut(holder) {
            Some(mut held) => {
                held.remove(&key);
                held.is_empty()
            }
            None => false,
        };
        if now_empty {
            self.holders.remove_if(holder, |_, held| held.is_empty());
        }
    }
}
