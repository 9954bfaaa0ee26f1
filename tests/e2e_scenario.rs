//! End-to-end: two floors joined by a configured bridge.
//!
//! Each test builds the topology from in-memory documents through
//! `MapCoordinator::bootstrap()` and then works only through the coordinator.

use std::collections::BTreeMap;
use std::sync::Arc;

use fleet_topology::config::{self, BridgeConfig};
use fleet_topology::model::BRIDGE_WEIGHT;
use fleet_topology::{FloorId, HolderId, MapConfig, MapCoordinator, MemorySource, OccupancyKind, PointKey};
use pretty_assertions::assert_eq;

const FLOOR_1: &str = r#"{"point": [
    {"id": 10, "x": 0,    "y": 0, "targets": [{"id": 20, "distance": 5}]},
    {"id": 20, "x": 5000, "y": 0, "targets": [{"id": 10, "distance": 5}]}
]}"#;

const FLOOR_2: &str = r#"{"point": [{"id": 30, "x": 5000, "y": 0}]}"#;

fn bridged_config() -> MapConfig {
    let mut bridges = BTreeMap::new();
    bridges.insert(
        "B1".to_string(),
        BridgeConfig { origin: "1-20".into(), destin: "2-30".into(), bidirectional: None },
    );
    MapConfig { bridge_point: bridges, ..MapConfig::default() }
}

async fn coordinator() -> MapCoordinator {
    let source = MemorySource::new().with_floor(1, FLOOR_1).with_floor(2, FLOOR_2);
    let coord = MapCoordinator::new(Arc::new(source), config::handle(bridged_config()));
    coord.bootstrap().await.unwrap();
    coord
}

fn sorted_ids(points: &[Arc<fleet_topology::Point>]) -> Vec<u32> {
    let mut ids: Vec<u32> = points.iter().map(|p| p.id().0).collect();
    ids.sort_unstable();
    ids
}

// ============================================================================
// 1. Same-floor edges carry the document distance
// ============================================================================

#[tokio::test]
async fn test_same_floor_edge_weight() {
    let coord = coordinator().await;
    let edge = coord.edge(PointKey::new(1, 10), PointKey::new(1, 20)).unwrap();
    assert_eq!(edge.weight, 5.0);
    assert!(!edge.label.bridge);
}

// ============================================================================
// 2. Bridge edges in both directions
// ============================================================================

#[tokio::test]
async fn test_bridge_edges_both_directions() {
    let coord = coordinator().await;
    let up = coord.edge(PointKey::new(1, 20), PointKey::new(2, 30)).unwrap();
    let down = coord.edge(PointKey::new(2, 30), PointKey::new(1, 20)).unwrap();
    assert_eq!(up.weight, BRIDGE_WEIGHT);
    assert_eq!(down.weight, BRIDGE_WEIGHT);
    assert!(up.label.bridge && down.label.bridge);
    assert_eq!(down.label.to, PointKey::new(1, 20));

    // Bridges show up among the outgoing targets.
    let outgoing: Vec<PointKey> = coord
        .outgoing_targets(PointKey::new(1, 20))
        .iter()
        .map(|t| t.to)
        .collect();
    assert!(outgoing.contains(&PointKey::new(2, 30)));
    assert!(outgoing.contains(&PointKey::new(1, 10)));
}

// ============================================================================
// 3. One-hop neighbourhood
// ============================================================================

#[tokio::test]
async fn test_nearby_one_hop() {
    let coord = coordinator().await;
    assert_eq!(sorted_ids(&coord.find_nearby_points(PointKey::new(1, 10), 1)), vec![10, 20]);
    // Two hops reach across the bridge.
    assert_eq!(sorted_ids(&coord.find_nearby_points(PointKey::new(1, 10), 2)), vec![10, 20, 30]);
}

// ============================================================================
// 4. Park moves across floors
// ============================================================================

#[tokio::test]
async fn test_park_moves_across_bridge() {
    let coord = coordinator().await;
    let h = HolderId::from("AGV_7");
    let from: PointKey = "1_20".parse().unwrap();
    let to = coord.point(PointKey::new(2, 30)).unwrap().key;

    assert!(coord.try_occupy(&h, from, OccupancyKind::Park));
    assert!(coord.update_park_occupy(&h, to, OccupancyKind::Park));

    assert!(!coord.held_kinds(&h, from).contains(OccupancyKind::Park));
    assert!(coord.held_kinds(&h, to).contains(OccupancyKind::Park));
    assert!(!coord.is_blocked(from));
    let held: Vec<PointKey> = coord.held_points(&h).iter().map(|e| e.key()).collect();
    assert_eq!(held, vec![to]);
}

// ============================================================================
// 5. Bridges only from config; one-way when asked
// ============================================================================

#[tokio::test]
async fn test_one_way_bridge_from_yaml() {
    let yaml = r#"
bridge_point:
  B1:
    origin: "1-20"
    destin: "2-30"
    bidirectional: "false"
"#;
    let cfg = MapConfig::from_yaml_str(yaml).unwrap();
    let source = MemorySource::new().with_floor(1, FLOOR_1).with_floor(2, FLOOR_2);
    let coord = MapCoordinator::new(Arc::new(source), config::handle(cfg));
    coord.bootstrap().await.unwrap();

    assert!(coord.edge(PointKey::new(1, 20), PointKey::new(2, 30)).is_some());
    assert!(coord.edge(PointKey::new(2, 30), PointKey::new(1, 20)).is_none());
    assert_eq!(coord.snapshot().floors().collect::<Vec<_>>(), vec![FloorId(1), FloorId(2)]);
}
