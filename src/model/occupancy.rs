//! Occupancy kinds and holder identity.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Category under which a point is occupied.
///
/// Each kind has independent exclusion: two holders may not hold the same
/// kind at the same point, but different kinds coexist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OccupancyKind {
    /// Route reserved by a running task.
    Task,
    /// Safety-distance buffer around a vehicle.
    Distance,
    ControlArea,
    ControlPoint,
    /// Operator lock.
    Manual,
    /// Vehicle resting here while online.
    Park,
    Equipment,
    Choose,
    /// Vehicle resting here while offline.
    Offline,
    Config,
    Blocked,
}

impl OccupancyKind {
    pub const ALL: [OccupancyKind; 11] = [
        OccupancyKind::Task,
        OccupancyKind::Distance,
        OccupancyKind::ControlArea,
        OccupancyKind::ControlPoint,
        OccupancyKind::Manual,
        OccupancyKind::Park,
        OccupancyKind::Equipment,
        OccupancyKind::Choose,
        OccupancyKind::Offline,
        OccupancyKind::Config,
        OccupancyKind::Blocked,
    ];

    /// Kinds that mark where a vehicle is parked. They substitute for each
    /// other as the vehicle goes on and offline.
    pub const RESTING: KindSet = KindSet::EMPTY
        .with(OccupancyKind::Park)
        .with(OccupancyKind::Offline);

    pub const fn code(self) -> u8 {
        match self {
            OccupancyKind::Task => 0,
            OccupancyKind::Distance => 1,
            OccupancyKind::ControlArea => 2,
            OccupancyKind::ControlPoint => 3,
            OccupancyKind::Manual => 4,
            OccupancyKind::Park => 5,
            OccupancyKind::Equipment => 6,
            OccupancyKind::Choose => 7,
            OccupancyKind::Offline => 8,
            OccupancyKind::Config => 9,
            OccupancyKind::Blocked => 10,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(code as usize).copied()
    }

    pub fn is_resting(self) -> bool {
        Self::RESTING.contains(self)
    }
}

impl fmt::Display for OccupancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OccupancyKind::Task => "task",
            OccupancyKind::Distance => "distance",
            OccupancyKind::ControlArea => "control_area",
            OccupancyKind::ControlPoint => "control_point",
            OccupancyKind::Manual => "manual",
            OccupancyKind::Park => "park",
            OccupancyKind::Equipment => "equipment",
            OccupancyKind::Choose => "choose",
            OccupancyKind::Offline => "offline",
            OccupancyKind::Config => "config",
            OccupancyKind::Blocked => "blocked",
        };
        f.write_str(name)
    }
}

/// Compact set of occupancy kinds.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct KindSet(u16);

impl KindSet {
    pub const EMPTY: KindSet = KindSet(0);

    pub const fn with(self, kind: OccupancyKind) -> Self {
        KindSet(self.0 | (1 << kind.code()))
    }

    pub const fn contains(self, kind: OccupancyKind) -> bool {
        self.0 & (1 << kind.code()) != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    /// Returns true if the kind was newly added.
    pub fn insert(&mut self, kind: OccupancyKind) -> bool {
        let had = self.contains(kind);
        self.0 |= 1 << kind.code();
        !had
    }

    /// Returns true if the kind was present.
    pub fn remove(&mut self, kind: OccupancyKind) -> bool {
        let had = self.contains(kind);
        self.0 &= !(1 << kind.code());
        had
    }

    pub const fn intersect(self, other: KindSet) -> KindSet {
        KindSet(self.0 & other.0)
    }

    pub const fn without(self, kind: OccupancyKind) -> KindSet {
        KindSet(self.0 & !(1 << kind.code()))
    }

    pub fn iter(self) -> impl Iterator<Item = OccupancyKind> {
        OccupancyKind::ALL.into_iter().filter(move |k| self.contains(*k))
    }
}

impl FromIterator<OccupancyKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = OccupancyKind>>(iter: I) -> Self {
        iter.into_iter().fold(KindSet::EMPTY, KindSet::with)
    }
}

impl fmt::Debug for KindSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// Identifier of whoever holds an occupancy: a vehicle or a task.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(Arc<str>);

impl HolderId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(Arc::from(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HolderId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for HolderId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Debug for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", &*self.0)
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
