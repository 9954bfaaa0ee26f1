//! End-to-end snapshot building from files on disk and YAML configuration.

use std::sync::Arc;

use fleet_topology::model::CurveType;
use fleet_topology::{config, FloorId, MapConfig, MapCoordinator, MemorySource, PointKey};
use pretty_assertions::assert_eq;

const FLOOR_1: &str = r#"{
    "point": [
        {"id": 10, "x": 0, "y": 0, "map_id": 7,
         "targets": [
            {"id": 20, "type": 2, "ctl_1": {"x": 500, "y": 500}, "distance": 800},
            {"id": 99, "distance": 10}
         ],
         "control_point": [20, 404]},
        {"id": 20, "x": 1000, "y": 0, "charge": true, "targets": [{"id": 10, "type": 1}]},
        {"id": 20, "x": 7777, "y": 7777},
        {"id": 30, "x": 2000, "y": 0, "action_param": [{"name": "lift", "act_type": 1}]}
    ],
    "charge": [20],
    "control": [{"C1": [10, 20]}, {"EMPTY": [404]}],
    "action_param_index": [{"dock": 30}]
}"#;

const FLOOR_2: &str = r#"{"point": [{"id": 1, "x": 0, "y": 0}]}"#;

// ============================================================================
// 1. Files and YAML from disk
// ============================================================================

#[tokio::test]
async fn test_bootstrap_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let f1 = dir.path().join("floor1.json");
    let f2 = dir.path().join("floor2.json");
    std::fs::write(&f1, FLOOR_1).unwrap();
    std::fs::write(&f2, FLOOR_2).unwrap();

    let yaml = format!(
        r#"
rcs_map:
  source_type: file
  source_file:
    1: {}
    2: {}
    3: {}
standby_point:
  1: [30, 31]
  2: [1]
"#,
        f1.display(),
        f2.display(),
        dir.path().join("missing.json").display(),
    );
    let yaml_path = dir.path().join("map.yaml");
    std::fs::write(&yaml_path, yaml).unwrap();

    let cfg = MapConfig::from_path(&yaml_path).unwrap();
    let coord = MapCoordinator::from_config(config::handle(cfg)).unwrap();
    coord.bootstrap().await.unwrap();

    let snap = coord.snapshot();
    assert_eq!(snap.floors().collect::<Vec<_>>(), vec![FloorId(1), FloorId(2)]);
    assert_eq!(snap.point_count(), 4);
    let standby: Vec<PointKey> = snap
        .collections()
        .standby_points(FloorId(1))
        .iter()
        .map(|p| p.key)
        .collect();
    assert_eq!(standby, vec![PointKey::new(1, 30)]);
}

#[tokio::test]
async fn test_unknown_source_type_is_config_error() {
    let cfg = MapConfig::from_yaml_str("rcs_map:\n  source_type: ftp\n").unwrap();
    let err = MapCoordinator::from_config(config::handle(cfg)).unwrap_err();
    assert!(matches!(err, fleet_topology::Error::Config(_)));
}

// ============================================================================
// 2. Document details
// ============================================================================

async fn floor_one() -> MapCoordinator {
    let source = MemorySource::new().with_floor(1, FLOOR_1).with_floor(2, FLOOR_2);
    let coord = MapCoordinator::new(Arc::new(source), config::handle(MapConfig::default()));
    coord.bootstrap().await.unwrap();
    coord
}

#[tokio::test]
async fn test_points_and_edges() {
    let coord = floor_one().await;

    // First definition of a duplicate id wins; the recorded map id is ignored.
    let p20 = coord.point(PointKey::new(1, 20)).unwrap();
    assert_eq!((p20.x, p20.y), (1000, 0));
    assert!(p20.flags.charge);
    assert_eq!(coord.point(PointKey::new(1, 10)).unwrap().key.floor, FloorId(1));

    // Unresolvable target 99 is dropped; the curve keeps its sampled geometry.
    let out = coord.outgoing_targets(PointKey::new(1, 10));
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].curve, CurveType::QuadraticBezier);
    assert!(out[0].geometry.coords().len() > 2);

    // Zero distance falls back to weight 1.
    let back = coord.edge(PointKey::new(1, 20), PointKey::new(1, 10)).unwrap();
    assert_eq!(back.weight, 1.0);
    assert_eq!(back.label.geometry.coords().len(), 2);

    // No bridges: floors are disconnected.
    assert!(coord.edge(PointKey::new(1, 10), PointKey::new(2, 1)).is_none());
}

#[tokio::test]
async fn test_business_collections() {
    let coord = floor_one().await;
    let snap = coord.snapshot();
    let c = snap.collections();

    assert_eq!(c.charge_points(FloorId(1)).len(), 1);
    assert!(c.charge_points(FloorId(2)).is_empty());

    let area: Vec<u32> = c.control_area(FloorId(1), "C1").iter().map(|p| p.id().0).collect();
    assert_eq!(area, vec![10, 20]);
    assert!(c.control_area(FloorId(1), "EMPTY").is_empty());

    let blocked: Vec<u32> = c
        .controlled_by(PointKey::new(1, 10))
        .iter()
        .map(|p| p.id().0)
        .collect();
    assert_eq!(blocked, vec![20]);

    assert_eq!(c.action_point(FloorId(1), "dock").unwrap().id().0, 30);
    assert!(c.action_point(FloorId(1), "nowhere").is_none());
    assert_eq!(coord.point(PointKey::new(1, 30)).unwrap().action_params.len(), 1);
}

#[tokio::test]
async fn test_spatial_queries() {
    let coord = floor_one().await;
    assert_eq!(coord.nearest_point(FloorId(1), 1900, 100).unwrap().id().0, 30);
    assert_eq!(coord.nearest_point(FloorId(2), 9999, 9999).unwrap().id().0, 1);
    assert!(coord.nearest_point(FloorId(5), 0, 0).is_none());
}
