//! End-to-end hot reload: lock migration, removed points, fingerprint
//! short-circuit and configuration refresh.

use std::sync::Arc;

use fleet_topology::model::PointId;
use fleet_topology::{
    config, FloorId, HolderId, MapConfig, MapCoordinator, MemorySource, OccupancyKind, PointKey,
    ReloadOutcome,
};
use pretty_assertions::assert_eq;

const V1: &str = r#"{"point": [
    {"id": 1, "x": 0,    "y": 0, "targets": [{"id": 2, "distance": 100}]},
    {"id": 2, "x": 1000, "y": 0, "targets": [{"id": 3, "distance": 100}]},
    {"id": 3, "x": 2000, "y": 0}
]}"#;

/// Point 2 rewired, point 3 gone, point 4 new.
const V2: &str = r#"{"point": [
    {"id": 1, "x": 0,    "y": 0},
    {"id": 2, "x": 1000, "y": 0, "targets": [{"id": 1, "distance": 100}, {"id": 4, "distance": 50}]},
    {"id": 4, "x": 1000, "y": 900}
]}"#;

async fn setup() -> (Arc<MemorySource>, Arc<MapCoordinator>) {
    let source = Arc::new(MemorySource::new().with_floor(1, V1));
    let coord = MapCoordinator::new(source.clone(), config::handle(MapConfig::default()));
    coord.bootstrap().await.unwrap();
    (source, Arc::new(coord))
}

// ============================================================================
// 1. Live locks survive a rebuild
// ============================================================================

#[tokio::test]
async fn test_reload_preserves_live_locks() {
    let (source, coord) = setup().await;
    let h = HolderId::from("AGV_1");
    assert!(coord.try_occupy(&h, PointKey::new(1, 2), OccupancyKind::Task));
    let before = coord.ledger_entry(PointKey::new(1, 2)).unwrap();

    source.set_floor(FloorId(1), V2);
    let outcome = coord.reload().await;
    assert_eq!(
        outcome,
        ReloadOutcome::Installed { generation: 2, points: 3, carried: 2, dropped: 1 }
    );

    // Same entry, still held, new edges in place.
    let after = coord.ledger_entry(PointKey::new(1, 2)).unwrap();
    assert!(Arc::ptr_eq(&before, &after));
    assert!(coord.held_kinds(&h, PointKey::new(1, 2)).contains(OccupancyKind::Task));
    assert!(coord.edge(PointKey::new(1, 2), PointKey::new(1, 4)).is_some());
    assert!(coord.edge(PointKey::new(1, 2), PointKey::new(1, 3)).is_none());

    // Another holder is still excluded without any re-acquire.
    assert!(!coord.try_occupy(&HolderId::from("AGV_2"), PointKey::new(1, 2), OccupancyKind::Task));
    assert!(coord.release(&h, PointKey::new(1, 2), OccupancyKind::Task));
}

// ============================================================================
// 2. Removed points disappear with their locks
// ============================================================================

#[tokio::test]
async fn test_reload_drops_removed_points() {
    let (source, coord) = setup().await;
    let h = HolderId::from("AGV_1");
    assert!(coord.try_occupy(&h, PointKey::new(1, 3), OccupancyKind::Park));

    source.set_floor(FloorId(1), V2);
    assert!(coord.reload().await.is_installed());

    let gone = PointKey::new(1, 3);
    assert!(coord.point(gone).is_none());
    assert!(coord.ledger_entry(gone).is_none());
    assert!(!coord.is_blocked(gone));
    assert!(!coord.try_occupy(&h, gone, OccupancyKind::Park));
    assert!(coord.held_points(&h).is_empty());

    // New point is lockable straight away.
    assert!(coord.update_park_occupy(&h, PointKey::new(1, 4), OccupancyKind::Park));
}

#[tokio::test]
async fn test_open_reservation_cannot_lock_removed_point() {
    let (source, coord) = setup().await;
    let h = HolderId::from("AGV_1");
    let mut reservation = coord.reserve(&h, OccupancyKind::Task);
    assert!(reservation.acquire(PointKey::new(1, 1)));

    source.set_floor(FloorId(1), V2);
    assert!(coord.reload().await.is_installed());

    let gone = PointKey::new(1, 3);
    assert!(!reservation.acquire(gone));
    assert!(reservation.acquire(PointKey::new(1, 4)));
    assert_eq!(reservation.commit(), 2);

    let held: Vec<PointKey> = coord.held_points(&h).iter().map(|e| e.key()).collect();
    assert_eq!(held, vec![PointKey::new(1, 1), PointKey::new(1, 4)]);
    assert!(!coord.devices().contains(&h, gone));
}

// ============================================================================
// 3. Identical sources install nothing
// ============================================================================

#[tokio::test]
async fn test_fingerprint_short_circuit() {
    let (source, coord) = setup().await;
    let first = coord.snapshot();
    assert_eq!(coord.install_count(), 1);

    assert_eq!(coord.reload().await, ReloadOutcome::Unchanged);
    source.set_floor(FloorId(1), V1);
    assert_eq!(coord.reload().await, ReloadOutcome::Unchanged);

    assert!(Arc::ptr_eq(&first, &coord.snapshot()));
    assert_eq!(coord.install_count(), 1);
    assert_eq!(coord.generation(), 1);
}

#[tokio::test]
async fn test_new_floor_triggers_install() {
    let (source, coord) = setup().await;
    source.set_floor(FloorId(2), r#"{"point": [{"id": 1}]}"#);
    assert!(coord.reload_async().await.unwrap().is_installed());
    assert!(coord.point(PointKey::new(2, 1)).is_some());
    assert_eq!(coord.snapshot().fingerprints().len(), 2);
}

// ============================================================================
// 4. Failed builds leave the live snapshot alone
// ============================================================================

#[tokio::test]
async fn test_broken_floor_keeps_others() {
    let (source, coord) = setup().await;
    source.set_floor(FloorId(2), "this is not json");
    // Floor 2 fails to parse; floor 1 is unchanged; the new fingerprint
    // for floor 2 still makes the build count as a change.
    assert!(coord.reload().await.is_installed());
    assert!(coord.point(PointKey::new(1, 1)).is_some());
    assert!(coord.point(PointKey::new(2, 1)).is_none());
}

#[tokio::test]
async fn test_empty_build_is_rejected() {
    let (source, coord) = setup().await;
    source.clear();
    assert_eq!(coord.reload().await, ReloadOutcome::Empty);
    assert_eq!(coord.snapshot().point_count(), 3);
}

// ============================================================================
// 5. Configuration refresh
// ============================================================================

#[tokio::test]
async fn test_apply_config_rebuilds_collections() {
    let (_, coord) = setup().await;
    let h = HolderId::from("AGV_1");
    assert!(coord.try_occupy(&h, PointKey::new(1, 1), OccupancyKind::Task));
    assert!(coord.snapshot().collections().charge_points(FloorId(1)).is_empty());

    let mut cfg = MapConfig::default();
    cfg.charge_point.insert(FloorId(1), vec![PointId(3), PointId(99)]);
    let outcome = coord.apply_config(cfg).await.unwrap();
    assert!(outcome.is_installed());

    let snap = coord.snapshot();
    let charge: Vec<PointKey> = snap
        .collections()
        .charge_points(FloorId(1))
        .iter()
        .map(|p| p.key)
        .collect();
    assert_eq!(charge, vec![PointKey::new(1, 3)]);
    assert!(coord.held_kinds(&h, PointKey::new(1, 1)).contains(OccupancyKind::Task));
    assert_eq!(coord.generation(), 2);
}

#[tokio::test]
async fn test_config_change_racing_a_reload_is_not_lost() {
    let (_, coord) = setup().await;
    let mut cfg = MapConfig::default();
    cfg.charge_point.insert(FloorId(1), vec![PointId(2)]);

    let racing = coord.reload_async();
    let applied = coord.apply_config(cfg);
    let outcomes = [racing.await.unwrap(), applied.await.unwrap()];
    assert!(outcomes.iter().filter(|o| o.is_installed()).count() <= 1);

    // Whichever load lost the race, a later reload sees the new configuration.
    coord.reload().await;
    assert_eq!(coord.snapshot().collections().charge_points(FloorId(1)).len(), 1);
    assert_eq!(coord.reload().await, ReloadOutcome::Unchanged);
}
