//! Fallback map configuration.
//!
//! The YAML document supplements the raw floor definitions: business point
//! lists used when a floor's own definition leaves them empty, the
//! cross-floor bridge table, and where the raw floors come from.
//!
//! ```yaml
//! rcs_map:
//!   source_type: file
//!   source_file:
//!     1: maps/floor1.json
//! bridge_point:
//!   B1: { origin: "1-20", destin: "2-30", bidirectional: true }
//! standby_point: { 1: [10, 20] }
//! charge_point: { 1: [30] }
//! control_area: { 1: { C1: { 1: [10, 20] } } }
//! control_point: { 1: { 10: { 1: [20] } } }
//! avoidance_point: { 1: { A1: [10] } }
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize};

use crate::model::{FloorId, PointId, PointKey};
use crate::Result;

/// Shared, atomically replaceable configuration.
pub type ConfigHandle = Arc<ArcSwap<MapConfig>>;

/// Wrap a configuration for sharing between the source, builder and coordinator.
pub fn handle(config: MapConfig) -> ConfigHandle {
    Arc::new(ArcSwap::from_pointee(config))
}

/// Where raw floor definitions are read from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// `file` is the only built-in kind.
    pub source_type: String,
    pub source_file: BTreeMap<FloorId, PathBuf>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            source_type: "file".to_string(),
            source_file: BTreeMap::new(),
        }
    }
}

/// A synthetic cross-floor connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// `floor-id`
    pub origin: String,
    /// `floor-id`
    #[serde(alias = "destination")]
    pub destin: String,
    /// Absent means both directions. Accepts booleans or `"true"`/`"false"`.
    #[serde(default, deserialize_with = "lenient_bool")]
    pub bidirectional: Option<bool>,
}

impl BridgeConfig {
    pub fn origin_key(&self) -> Option<PointKey> {
        self.origin.parse().ok()
    }

    pub fn destin_key(&self) -> Option<PointKey> {
        self.destin.parse().ok()
    }

    pub fn is_bidirectional(&self) -> bool {
        self.bidirectional.unwrap_or(true)
    }
}

/// The whole fallback document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub rcs_map: SourceConfig,
    pub bridge_point: BTreeMap<String, BridgeConfig>,
    pub standby_point: BTreeMap<FloorId, Vec<PointId>>,
    pub standby_shield_point: BTreeMap<FloorId, Vec<PointId>>,
    pub charge_point: BTreeMap<FloorId, Vec<PointId>>,
    /// floor → area code → floor → points
    pub control_area: BTreeMap<FloorId, BTreeMap<String, BTreeMap<FloorId, Vec<PointId>>>>,
    /// floor → trigger point → floor → blocked points
    pub control_point: BTreeMap<FloorId, BTreeMap<PointId, BTreeMap<FloorId, Vec<PointId>>>>,
    /// floor → group code → points
    pub avoidance_point: BTreeMap<FloorId, BTreeMap<String, Vec<PointId>>>,
}

impl MapConfig {
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> std::result::Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    struct LenientBool;

    impl<'de> Visitor<'de> for LenientBool {
        type Value = Option<bool>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a boolean or \"true\"/\"false\"")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> std::result::Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Self::Value, E> {
            match v.trim().to_ascii_lowercase().as_str() {
                "" => Ok(None),
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                other => Err(E::invalid_value(de::Unexpected::Str(other), &self)),
            }
        }

        fn visit_none<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: de::Error>(self) -> std::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_some<D: Deserializer<'de>>(self, d: D) -> std::result::Result<Self::Value, D::Error> {
            d.deserialize_any(LenientBool)
        }
    }

    deserializer.deserialize_any(LenientBool)
}
