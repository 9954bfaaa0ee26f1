//! Raw per-floor map document as written by the map editor.
//!
//! ```json
//! {
//!   "point": [
//!     { "id": 10, "x": 0, "y": 0, "standby": true,
//!       "targets": [{ "id": 20, "type": 1, "distance": 5 }],
//!       "control_point": [20] }
//!   ],
//!   "charge": [10],
//!   "standby": [],
//!   "standby_shield": [],
//!   "control": [{ "C1": [10, 20] }],
//!   "avoidance": [{ "A1": [20] }],
//!   "action_param_index": [{ "dock": 10 }]
//! }
//! ```
//!
//! Every field is optional. Unknown fields are ignored.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::model::{ActionParam, ControlPoint, PointId};
use crate::Result;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawFloor {
    pub point: Vec<RawPoint>,
    pub charge: Vec<PointId>,
    pub standby: Vec<PointId>,
    pub standby_shield: Vec<PointId>,
    /// `[{ code: [ids] }]`
    pub control: Vec<BTreeMap<String, Vec<PointId>>>,
    /// `[{ code: [ids] }]`
    pub avoidance: Vec<BTreeMap<String, Vec<PointId>>>,
    /// `[{ alias: id }]`
    pub action_param_index: Vec<BTreeMap<String, PointId>>,
}

impl RawFloor {
    pub fn parse(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawPoint {
    pub id: PointId,
    #[serde(default)]
    pub name: Option<String>,
    /// Owning floor as recorded by the editor. Ignored; the document's floor wins.
    #[serde(default)]
    pub map_id: Option<u32>,
    #[serde(default)]
    pub floor: i32,
    #[serde(default)]
    pub x: i32,
    #[serde(default)]
    pub y: i32,
    #[serde(default)]
    pub area_code: Option<String>,
    #[serde(default)]
    pub action_param: Option<Vec<ActionParam>>,
    #[serde(default)]
    pub standby: bool,
    #[serde(default)]
    pub charge: bool,
    #[serde(default)]
    pub loading: bool,
    #[serde(default)]
    pub unloading: bool,
    #[serde(default)]
    pub door: bool,
    #[serde(default)]
    pub targets: Option<Vec<RawTarget>>,
    /// Points blocked while a vehicle stands here.
    #[serde(default)]
    pub control_point: Option<Vec<PointId>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawTarget {
    /// Destination point on the same floor.
    pub id: PointId,
    #[serde(default, rename = "type")]
    pub curve: i32,
    #[serde(default)]
    pub dir: i32,
    #[serde(default)]
    pub speed: i32,
    #[serde(default)]
    pub ctl_1: Option<ControlPoint>,
    #[serde(default)]
    pub ctl_2: Option<ControlPoint>,
    #[serde(default)]
    pub distance: u32,
}
