//! Navigable vertex on one floor.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::Target;

/// Map layer identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FloorId(pub u32);

impl fmt::Display for FloorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Point identifier, unique only within its floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PointId(pub u32);

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable business key of a point: `(floor, id)`.
///
/// This is the only identifier that may be stored by callers. It survives
/// reloads; a [`GraphIndex`] does not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointKey {
    pub floor: FloorId,
    pub id: PointId,
}

impl PointKey {
    pub const fn new(floor: u32, id: u32) -> Self {
        Self { floor: FloorId(floor), id: PointId(id) }
    }
}

impl fmt::Display for PointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.floor, self.id)
    }
}

/// Error returned when a textual point key is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid point key {0:?}: expected `floor_id` or `floor-id`")]
pub struct ParsePointKeyError(pub String);

/// Accepts both the display form (`1_20`) and the configuration form (`1-20`).
impl FromStr for PointKey {
    type Err = ParsePointKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePointKeyError(s.to_string());
        let (floor, id) = s
            .trim()
            .split_once(['_', '-'])
            .ok_or_else(err)?;
        let floor = floor.trim().parse().map_err(|_| err())?;
        let id = id.trim().parse().map_err(|_| err())?;
        Ok(Self::new(floor, id))
    }
}

/// Dense vertex position inside one snapshot's graph.
///
/// Only valid for the snapshot that produced it. Deliberately not
/// serializable and not constructible outside the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GraphIndex(u32);

impl GraphIndex {
    pub(crate) fn new(index: usize) -> Self {
        Self(index as u32)
    }

    pub(crate) fn slot(self) -> usize {
        self.0 as usize
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for GraphIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Per-point action parameter attached by the map editor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionParam {
    pub name: String,
    pub act_type: i32,
    pub task_type: i32,
    pub pallet_type: i32,
    pub index: i32,
    pub task_act: i32,
    pub task_param: String,
}

/// Role flags a point may carry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointFlags {
    pub standby: bool,
    pub charge: bool,
    pub loading: bool,
    pub unloading: bool,
    pub door: bool,
}

/// A navigable vertex.
#[derive(Debug, Clone)]
pub struct Point {
    pub key: PointKey,
    pub name: Option<String>,
    /// Physical floor number as written by the editor; may differ from `key.floor`.
    pub level: i32,
    pub x: i32,
    pub y: i32,
    pub area_code: Option<String>,
    pub action_params: Vec<ActionParam>,
    pub flags: PointFlags,
    pub(crate) graph_index: GraphIndex,
    /// Outgoing connections whose destination resolved in this snapshot.
    pub targets: Vec<Arc<Target>>,
}

impl Point {
    pub fn floor(&self) -> FloorId {
        self.key.floor
    }

    pub fn id(&self) -> PointId {
        self.key.id
    }

    /// Position in the owning snapshot's graph.
    pub fn graph_index(&self) -> GraphIndex {
        self.graph_index
    }

    /// Straight-line distance to another point, rounded to whole millimetres.
    pub fn distance_to(&self, other: &Point) -> u32 {
        super::geometry::distance(self.x, self.y, other.x, other.y)
    }
}

impl PartialEq for Point {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Point {}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.key.floor, self.key.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_parses_both_separators() {
        assert_eq!("1_20".parse::<PointKey>().unwrap(), PointKey::new(1, 20));
        assert_eq!("2-30".parse::<PointKey>().unwrap(), PointKey::new(2, 30));
        assert_eq!(" 3 - 4 ".parse::<PointKey>().unwrap(), PointKey::new(3, 4));
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert!("".parse::<PointKey>().is_err());
        assert!("12".parse::<PointKey>().is_err());
        assert!("a_b".parse::<PointKey>().is_err());
    }

    #[test]
    fn test_key_display_round_trips() {
        let key = PointKey::new(7, 101);
        assert_eq!(key.to_string(), "7_101");
        assert_eq!(key.to_string().parse::<PointKey>().unwrap(), key);
    }
}
