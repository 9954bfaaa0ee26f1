//! # Topology Snapshot
//!
//! One immutable build of the navigation graph: vertices, edges, the
//! business-key lookup, per-floor spatial indices, business collections and
//! per-floor fingerprints, plus one [`LedgerEntry`] per point.
//!
//! Nothing here changes after the builder hands the snapshot over, with
//! two exceptions:
//!
//! - ledger entries are interior-mutable and change through occupancy calls;
//! - [`TopologySnapshot::adopt_ledger`] swaps entries for the previous
//!   snapshot's instances, and only runs before the snapshot is published.

pub mod builder;
pub mod fingerprint;
pub mod raw;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use hashbrown::HashMap;

use crate::index::SpatialIndex;
use crate::ledger::LedgerEntry;
use crate::model::{FloorId, GraphIndex, Point, PointKey};
use crate::storage::{Digraph, Edge};

pub use builder::{BuildReport, SnapshotBuilder};
pub use fingerprint::Fingerprint;

/// Points grouped under a business code.
pub type PointGroups = BTreeMap<String, Vec<Arc<Point>>>;

/// Derived business point collections. A floor only appears in a map when
/// its collection is non-empty.
#[derive(Debug, Default)]
pub struct BusinessCollections {
    pub charge: BTreeMap<FloorId, Vec<Arc<Point>>>,
    pub standby: BTreeMap<FloorId, Vec<Arc<Point>>>,
    pub standby_shield: BTreeMap<FloorId, Vec<Arc<Point>>>,
    /// floor → area code → member points
    pub control_areas: BTreeMap<FloorId, PointGroups>,
    /// floor → trigger point → points blocked while the trigger is occupied
    pub control_points: BTreeMap<FloorId, BTreeMap<PointKey, Vec<Arc<Point>>>>,
    /// floor → group code → points
    pub avoidance: BTreeMap<FloorId, PointGroups>,
    /// floor → alias → point
    pub action_params: BTreeMap<FloorId, BTreeMap<String, Arc<Point>>>,
}

impl BusinessCollections {
    pub fn charge_points(&self, floor: FloorId) -> &[Arc<Point>] {
        self.charge.get(&floor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn standby_points(&self, floor: FloorId) -> &[Arc<Point>] {
        self.standby.get(&floor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn standby_shield_points(&self, floor: FloorId) -> &[Arc<Point>] {
        self.standby_shield.get(&floor).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn control_area(&self, floor: FloorId, code: &str) -> &[Arc<Point>] {
        self.control_areas
            .get(&floor)
            .and_then(|areas| areas.get(code))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn controlled_by(&self, trigger: PointKey) -> &[Arc<Point>] {
        self.control_points
            .get(&trigger.floor)
            .and_then(|m| m.get(&trigger))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn avoidance_group(&self, floor: FloorId, code: &str) -> &[Arc<Point>] {
        self.avoidance
            .get(&floor)
            .and_then(|groups| groups.get(code))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn action_point(&self, floor: FloorId, alias: &str) -> Option<&Arc<Point>> {
        self.action_params.get(&floor)?.get(alias)
    }
}

/// Result of carrying ledger entries over from the previous snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationStats {
    /// Keys present in both snapshots; the old entry was kept.
    pub carried: usize,
    /// Keys only in the new snapshot.
    pub fresh: usize,
    /// Keys only in the old snapshot, now gone.
    pub dropped: Vec<PointKey>,
}

/// One complete, versioned build of the topology.
#[derive(Debug)]
pub struct TopologySnapshot {
    pub(crate) generation: u64,
    built_at: DateTime<Utc>,
    graph: Digraph,
    key_to_index: HashMap<PointKey, GraphIndex>,
    ledger: HashMap<PointKey, Arc<LedgerEntry>>,
    spatial: BTreeMap<FloorId, SpatialIndex>,
    fingerprints: BTreeMap<FloorId, Fingerprint>,
    /// Fallback configuration the collections and bridges were built with.
    config_fingerprint: Option<Fingerprint>,
    collections: BusinessCollections,
}

impl TopologySnapshot {
    /// A snapshot with no floors, used before the first load.
    pub fn empty() -> Self {
        Self {
            generation: 0,
            built_at: Utc::now(),
            graph: Digraph::default(),
            key_to_index: HashMap::new(),
            ledger: HashMap::new(),
            spatial: BTreeMap::new(),
            fingerprints: BTreeMap::new(),
            config_fingerprint: None,
            collections: BusinessCollections::default(),
        }
    }

    pub(crate) fn assemble(
        graph: Digraph,
        key_to_index: HashMap<PointKey, GraphIndex>,
        spatial: BTreeMap<FloorId, SpatialIndex>,
        fingerprints: BTreeMap<FloorId, Fingerprint>,
        config_fingerprint: Fingerprint,
        collections: BusinessCollections,
    ) -> Self {
        let ledger = key_to_index
            .keys()
            .map(|key| (*key, Arc::new(LedgerEntry::new(*key))))
            .collect();
        Self {
            generation: 0,
            built_at: Utc::now(),
            graph,
            key_to_index,
            ledger,
            spatial,
            fingerprints,
            config_fingerprint: Some(config_fingerprint),
            collections,
        }
    }

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Install sequence number; 0 until the coordinator publishes it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn point_count(&self) -> usize {
        self.graph.vertex_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    pub fn floors(&self) -> impl Iterator<Item = FloorId> + '_ {
        self.spatial.keys().copied()
    }

    pub fn fingerprints(&self) -> &BTreeMap<FloorId, Fingerprint> {
        &self.fingerprints
    }

    pub fn config_fingerprint(&self) -> Option<Fingerprint> {
        self.config_fingerprint
    }

    /// True when both snapshots were built from byte-identical floor
    /// documents and the same fallback configuration.
    pub fn same_sources(&self, other: &TopologySnapshot) -> bool {
        self.fingerprints == other.fingerprints && self.config_fingerprint == other.config_fingerprint
    }

    pub fn collections(&self) -> &BusinessCollections {
        &self.collections
    }

    // ========================================================================
    // Graph lookups
    // ========================================================================

    pub fn graph(&self) -> &Digraph {
        &self.graph
    }

    pub fn graph_index(&self, key: PointKey) -> Option<GraphIndex> {
        self.key_to_index.get(&key).copied()
    }

    pub fn contains(&self, key: PointKey) -> bool {
        self.key_to_index.contains_key(&key)
    }

    pub fn point(&self, key: PointKey) -> Option<&Arc<Point>> {
        self.graph.vertex(self.graph_index(key)?)
    }

    pub fn points(&self) -> impl Iterator<Item = &Arc<Point>> {
        self.graph.vertices()
    }

    /// Outgoing edges of `key`, bridges included.
    pub fn outgoing(&self, key: PointKey) -> &[Edge] {
        match self.graph_index(key) {
            Some(u) => self.graph.edges_from(u),
            None => &[],
        }
    }

    pub fn edge(&self, from: PointKey, to: PointKey) -> Option<&Edge> {
        self.graph.edge(self.graph_index(from)?, self.graph_index(to)?)
    }

    pub fn spatial(&self, floor: FloorId) -> Option<&SpatialIndex> {
        self.spatial.get(&floor)
    }

    // ========================================================================
    // Ledger
    // ========================================================================

    pub fn ledger_entry(&self, key: PointKey) -> Option<&Arc<LedgerEntry>> {
        self.ledger.get(&key)
    }

    /// `entry` is this snapshot's entry for its key, not an orphan.
    pub fn owns_entry(&self, entry: &Arc<LedgerEntry>) -> bool {
        self.ledger
            .get(&entry.key())
            .is_some_and(|own| Arc::ptr_eq(own, entry))
    }

    pub fn ledger(&self) -> impl Iterator<Item = &Arc<LedgerEntry>> {
        self.ledger.values()
    }

    /// Replace this snapshot's entries with `previous`'s instances for every
    /// key both contain. Entries for removed keys are not carried.
    pub fn adopt_ledger(&mut self, previous: &TopologySnapshot) -> MigrationStats {
        let mut stats = MigrationStats::default();
        for (key, entry) in self.ledger.iter_mut() {
            match previous.ledger.get(key) {
                Some(old) => {
                    *entry = Arc::clone(old);
                    stats.carried += 1;
                }
                None => stats.fresh += 1,
            }
        }

        for (key, old) in &previous.ledger {
            if self.ledger.contains_key(key) {
                continue;
            }
            if old.is_blocked() {
                tracing::warn!(
                    point = %key,
                    holders = ?old.holders(),
                    "point removed by reload while occupied; its locks are orphaned"
                );
            }
            stats.dropped.push(*key);
        }
        stats.dropped.sort_unstable();
        stats
    }
}
