//! Snapshot builder: raw floor documents + fallback configuration → snapshot.
//!
//! The builder keeps no state between builds. Per-floor problems never
//! abort a build: a floor that fails to parse is skipped, and references
//! that do not resolve (edge targets, bridge endpoints, business ids) are
//! left out.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;

use hashbrown::HashMap;

use crate::config::{ConfigHandle, MapConfig};
use crate::index::SpatialIndex;
use crate::model::{
    geometry, CurveType, FloorId, GraphIndex, Point, PointFlags, PointId, PointKey, Polyline,
    Target, BRIDGE_WEIGHT,
};
use crate::storage::{Digraph, MapSource};
use crate::Result;

use super::raw::{RawFloor, RawPoint};
use super::{BusinessCollections, Fingerprint, TopologySnapshot};

/// Snapshot plus what went wrong along the way.
#[derive(Debug)]
pub struct BuildReport {
    pub snapshot: TopologySnapshot,
    /// Floors whose document could not be parsed, with the reason.
    pub failed_floors: Vec<(FloorId, String)>,
    /// Editor targets whose destination is not on the map.
    pub skipped_targets: usize,
    /// Bridge edges added, counting each direction.
    pub bridge_edges: usize,
}

/// Builds snapshots from a [`MapSource`] and the shared configuration.
pub struct SnapshotBuilder {
    source: Arc<dyn MapSource>,
    config: ConfigHandle,
}

impl SnapshotBuilder {
    pub fn new(source: Arc<dyn MapSource>, config: ConfigHandle) -> Self {
        Self { source, config }
    }

    pub fn source(&self) -> &Arc<dyn MapSource> {
        &self.source
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    /// Load every floor from the source and assemble a new snapshot.
    ///
    /// Only a failing source is an error. An empty snapshot is returned as
    /// is; deciding whether that is acceptable is up to the caller.
    pub async fn build(&self) -> Result<BuildReport> {
        let started = Instant::now();
        let raw = self.source.load_raw().await?;
        let config = self.config.load_full();
        let report = assemble(raw, &config);

        tracing::info!(
            source = self.source.name(),
            floors = report.snapshot.fingerprints().len(),
            points = report.snapshot.point_count(),
            edges = report.snapshot.graph().edge_count(),
            failed = report.failed_floors.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "topology snapshot built"
        );
        Ok(report)
    }
}

// ============================================================================
// Assembly
// ============================================================================

/// One parsed floor before graph indices exist.
struct StagedFloor {
    floor: FloorId,
    points: Vec<RawPoint>,
    charge: Vec<PointId>,
    standby: Vec<PointId>,
    standby_shield: Vec<PointId>,
    control_areas: BTreeMap<String, Vec<PointId>>,
    control_points: BTreeMap<PointId, Vec<PointId>>,
    avoidance: BTreeMap<String, Vec<PointId>>,
    action_params: BTreeMap<String, PointId>,
}

/// Build a snapshot from already-loaded floor documents.
pub fn assemble(raw: BTreeMap<FloorId, String>, config: &MapConfig) -> BuildReport {
    let mut fingerprints = BTreeMap::new();
    let mut failed_floors = Vec::new();
    let mut staged = Vec::with_capacity(raw.len());

    for (floor, text) in &raw {
        // Fingerprint before parsing so fixing a broken floor counts as a change.
        fingerprints.insert(*floor, Fingerprint::of(text));
        match RawFloor::parse(text) {
            Ok(doc) => staged.push(stage_floor(*floor, doc, config)),
            Err(e) => {
                tracing::error!(%floor, error = %e, "failed to parse floor definition; floor skipped");
                failed_floors.push((*floor, e.to_string()));
            }
        }
    }

    // Dense indices in discovery order, floors ascending.
    let total: usize = staged.iter().map(|f| f.points.len()).sum();
    let mut key_to_index: HashMap<PointKey, GraphIndex> = HashMap::with_capacity(total);
    let mut coords: HashMap<PointKey, (i32, i32)> = HashMap::with_capacity(total);
    for floor in &staged {
        for p in &floor.points {
            let key = PointKey { floor: floor.floor, id: p.id };
            key_to_index.insert(key, GraphIndex::new(key_to_index.len()));
            coords.insert(key, (p.x, p.y));
        }
    }

    // Vertices, each carrying its resolved targets.
    let mut graph = Digraph::with_capacity(total);
    let mut skipped_targets = 0;
    for floor in &staged {
        for raw_point in &floor.points {
            let key = PointKey { floor: floor.floor, id: raw_point.id };
            let from = (raw_point.x, raw_point.y);
            let mut targets = Vec::new();
            for t in raw_point.targets.iter().flatten() {
                let to = PointKey { floor: floor.floor, id: t.id };
                let Some(&to_xy) = coords.get(&to) else {
                    tracing::debug!(from = %key, to = %to, "target not on map; edge skipped");
                    skipped_targets += 1;
                    continue;
                };
                let curve = CurveType::from_code(t.curve);
                targets.push(Arc::new(Target {
                    from: key,
                    to,
                    curve,
                    dir: t.dir,
                    speed: t.speed,
                    ctl_1: t.ctl_1,
                    ctl_2: t.ctl_2,
                    distance: t.distance,
                    bridge: false,
                    geometry: geometry::segment(from, to_xy, curve, t.ctl_1, t.ctl_2),
                }));
            }
            let index = GraphIndex::new(graph.vertex_count());
            graph.push_vertex(Arc::new(to_point(key, raw_point, index, targets)));
        }
    }

    // Editor edges.
    let edges: Vec<(GraphIndex, Arc<Target>)> = graph
        .vertices()
        .flat_map(|p| p.targets.iter().map(move |t| (p.graph_index(), Arc::clone(t))))
        .collect();
    for (u, target) in edges {
        if let Some(&v) = key_to_index.get(&target.to) {
            graph.add_edge(u, v, target.weight(), target);
        }
    }

    let bridge_edges = add_bridges(&mut graph, &key_to_index, config);

    // Spatial indices.
    let mut by_floor: BTreeMap<FloorId, Vec<Arc<Point>>> = BTreeMap::new();
    for p in graph.vertices() {
        by_floor.entry(p.floor()).or_default().push(Arc::clone(p));
    }
    let spatial = by_floor
        .into_iter()
        .map(|(floor, points)| (floor, SpatialIndex::build(points)))
        .collect();

    let collections = resolve_collections(&staged, &graph, &key_to_index);
    let snapshot = TopologySnapshot::assemble(
        graph,
        key_to_index,
        spatial,
        fingerprints,
        config_fingerprint(config),
        collections,
    );

    BuildReport {
        snapshot,
        failed_floors,
        skipped_targets,
        bridge_edges,
    }
}

/// Hash of the configuration as the builder sees it. Map keys are ordered,
/// so equal configurations serialize identically.
fn config_fingerprint(config: &MapConfig) -> Fingerprint {
    match serde_json::to_vec(config) {
        Ok(bytes) => Fingerprint::of(bytes),
        Err(e) => {
            tracing::warn!(error = %e, "configuration not serializable; fingerprinting its debug form");
            Fingerprint::of(format!("{config:?}"))
        }
    }
}

fn to_point(key: PointKey, raw: &RawPoint, index: GraphIndex, targets: Vec<Arc<Target>>) -> Point {
    Point {
        key,
        name: raw.name.clone(),
        level: raw.floor,
        x: raw.x,
        y: raw.y,
        area_code: raw.area_code.clone(),
        action_params: raw.action_param.clone().unwrap_or_default(),
        flags: PointFlags {
            standby: raw.standby,
            charge: raw.charge,
            loading: raw.loading,
            unloading: raw.unloading,
            door: raw.door,
        },
        graph_index: index,
        targets,
    }
}

/// Dedupe points and pick each business collection's source for one floor.
fn stage_floor(floor: FloorId, doc: RawFloor, config: &MapConfig) -> StagedFloor {
    let mut ids = BTreeSet::new();
    let mut points = Vec::with_capacity(doc.point.len());
    for p in doc.point {
        if let Some(recorded) = p.map_id {
            if recorded != floor.0 {
                tracing::debug!(%floor, point = %p.id, recorded, "point floor re-stamped");
            }
        }
        if ids.insert(p.id) {
            points.push(p);
        } else {
            tracing::warn!(%floor, point = %p.id, "duplicate point id; keeping the first definition");
        }
    }

    let simple = |from_doc: Vec<PointId>, fallback: &BTreeMap<FloorId, Vec<PointId>>| {
        let chosen = if from_doc.is_empty() {
            fallback.get(&floor).cloned().unwrap_or_default()
        } else {
            from_doc
        };
        retain_known(chosen, &ids)
    };
    let charge = simple(doc.charge, &config.charge_point);
    let standby = simple(doc.standby, &config.standby_point);
    let standby_shield = simple(doc.standby_shield, &config.standby_shield_point);

    let mut control_areas = groups_from_doc(doc.control, &ids);
    if control_areas.is_empty() {
        if let Some(areas) = config.control_area.get(&floor) {
            for (code, per_floor) in areas {
                let members = retain_known(per_floor.get(&floor).cloned().unwrap_or_default(), &ids);
                if !members.is_empty() {
                    control_areas.insert(code.clone(), members);
                }
            }
        }
    }

    let mut avoidance = groups_from_doc(doc.avoidance, &ids);
    if avoidance.is_empty() {
        if let Some(groups) = config.avoidance_point.get(&floor) {
            for (code, members) in groups {
                let members = retain_known(members.clone(), &ids);
                if !members.is_empty() {
                    avoidance.insert(code.clone(), members);
                }
            }
        }
    }

    let mut control_points = BTreeMap::new();
    for p in &points {
        if let Some(blocked) = &p.control_point {
            let blocked = retain_known(blocked.clone(), &ids);
            if !blocked.is_empty() {
                control_points.insert(p.id, blocked);
            }
        }
    }
    if control_points.is_empty() {
        if let Some(triggers) = config.control_point.get(&floor) {
            for (trigger, per_floor) in triggers {
                if !ids.contains(trigger) {
                    continue;
                }
                let blocked = retain_known(per_floor.get(&floor).cloned().unwrap_or_default(), &ids);
                if !blocked.is_empty() {
                    control_points.insert(*trigger, blocked);
                }
            }
        }
    }

    let mut action_params = BTreeMap::new();
    for group in doc.action_param_index {
        for (alias, id) in group {
            if ids.contains(&id) {
                action_params.insert(alias, id);
            }
        }
    }

    StagedFloor {
        floor,
        points,
        charge,
        standby,
        standby_shield,
        control_areas,
        control_points,
        avoidance,
        action_params,
    }
}

fn retain_known(mut ids: Vec<PointId>, known: &BTreeSet<PointId>) -> Vec<PointId> {
    ids.retain(|id| known.contains(id));
    ids
}

fn groups_from_doc(
    groups: Vec<BTreeMap<String, Vec<PointId>>>,
    known: &BTreeSet<PointId>,
) -> BTreeMap<String, Vec<PointId>> {
    let mut out = BTreeMap::new();
    for group in groups {
        for (code, members) in group {
            let members = retain_known(members, known);
            if !members.is_empty() {
                out.insert(code, members);
            }
        }
    }
    out
}

fn add_bridges(
    graph: &mut Digraph,
    key_to_index: &HashMap<PointKey, GraphIndex>,
    config: &MapConfig,
) -> usize {
    let mut added = 0;
    for (name, bridge) in &config.bridge_point {
        let (Some(origin), Some(destin)) = (bridge.origin_key(), bridge.destin_key()) else {
            tracing::warn!(bridge = %name, origin = %bridge.origin, destin = %bridge.destin, "malformed bridge endpoint");
            continue;
        };
        let endpoints = key_to_index
            .get(&origin)
            .zip(key_to_index.get(&destin))
            .and_then(|(&u, &v)| Some((u, v, graph.vertex(u).cloned()?, graph.vertex(v).cloned()?)));
        let Some((u, v, a, b)) = endpoints else {
            tracing::warn!(bridge = %name, %origin, %destin, "bridge endpoint not on map; bridge skipped");
            continue;
        };

        graph.add_edge(u, v, BRIDGE_WEIGHT, bridge_target(&a, &b));
        added += 1;

        if bridge.is_bidirectional() {
            let backward = bridge_target(&b, &a);
            graph.add_edge(v, u, BRIDGE_WEIGHT, backward);
            added += 1;
        }
    }
    added
}

/// Straight, high-weight connection; each direction gets its own geometry.
fn bridge_target(from: &Point, to: &Point) -> Arc<Target> {
    Arc::new(Target {
        from: from.key,
        to: to.key,
        curve: CurveType::Straight,
        dir: 0,
        speed: 0,
        ctl_1: None,
        ctl_2: None,
        distance: BRIDGE_WEIGHT as u32,
        bridge: true,
        geometry: Polyline::straight((from.x, from.y), (to.x, to.y)),
    })
}

fn resolve_collections(
    staged: &[StagedFloor],
    graph: &Digraph,
    key_to_index: &HashMap<PointKey, GraphIndex>,
) -> BusinessCollections {
    let mut out = BusinessCollections::default();
    for floor in staged {
        let f = floor.floor;
        let lookup = |id: &PointId| -> Option<Arc<Point>> {
            let index = key_to_index.get(&PointKey { floor: f, id: *id })?;
            graph.vertex(*index).cloned()
        };
        let resolve = |ids: &[PointId]| -> Vec<Arc<Point>> { ids.iter().filter_map(lookup).collect() };
        let resolve_groups = |groups: &BTreeMap<String, Vec<PointId>>| {
            groups
                .iter()
                .map(|(code, ids)| (code.clone(), resolve(ids)))
                .filter(|(_, points)| !points.is_empty())
                .collect::<BTreeMap<_, _>>()
        };

        insert_non_empty(&mut out.charge, f, resolve(&floor.charge));
        insert_non_empty(&mut out.standby, f, resolve(&floor.standby));
        insert_non_empty(&mut out.standby_shield, f, resolve(&floor.standby_shield));

        let areas = resolve_groups(&floor.control_areas);
        if !areas.is_empty() {
            out.control_areas.insert(f, areas);
        }
        let avoidance = resolve_groups(&floor.avoidance);
        if !avoidance.is_empty() {
            out.avoidance.insert(f, avoidance);
        }

        let controls: BTreeMap<_, _> = floor
            .control_points
            .iter()
            .map(|(trigger, blocked)| (PointKey { floor: f, id: *trigger }, resolve(blocked)))
            .filter(|(_, blocked)| !blocked.is_empty())
            .collect();
        if !controls.is_empty() {
            out.control_points.insert(f, controls);
        }

        let aliases: BTreeMap<_, _> = floor
            .action_params
            .iter()
            .filter_map(|(alias, id)| Some((alias.clone(), lookup(id)?)))
            .collect();
        if !aliases.is_empty() {
            out.action_params.insert(f, aliases);
        }
    }
    out
}

fn insert_non_empty<V>(map: &mut BTreeMap<FloorId, Vec<V>>, floor: FloorId, values: Vec<V>) {
    if !values.is_empty() {
        map.insert(floor, values);
    }
}

// ============================================================================
// Tests
// ============================================================================
