//! Graph lookups by business key.
//!
//! Every lookup translates `PointKey`s through the current snapshot before
//! touching the graph. Unknown keys yield `None` or an empty list.

use std::collections::VecDeque;
use std::sync::Arc;

use hashbrown::HashSet;

use crate::index::Envelope;
use crate::model::{Direction, FloorId, GraphIndex, Point, PointId, PointKey, Target};
use crate::storage::Edge;
use super::MapCoordinator;

impl MapCoordinator {
    pub fn point(&self, key: PointKey) -> Option<Arc<Point>> {
        self.current.load().point(key).cloned()
    }

    /// Labels of every outgoing edge, bridges included.
    pub fn outgoing_targets(&self, key: PointKey) -> Vec<Arc<Target>> {
        self.current
            .load()
            .outgoing(key)
            .iter()
            .map(|e| Arc::clone(&e.label))
            .collect()
    }

    /// Same-floor edge label `from → to`.
    pub fn target(&self, floor: FloorId, from: PointId, to: PointId) -> Option<Arc<Target>> {
        self.edge(PointKey { floor, id: from }, PointKey { floor, id: to })
            .map(|e| e.label)
    }

    /// Edge `from → to`, across floors if a bridge connects them.
    pub fn edge(&self, from: PointKey, to: PointKey) -> Option<Edge> {
        self.current.load().edge(from, to).cloned()
    }

    /// Breadth-first search over successors and predecessors, ignoring
    /// occupancy.
    ///
    /// The start point is included. Points first reached at hop `tiers` are
    /// included but not expanded. Order is breadth-first; within a hop it
    /// follows adjacency order and is not stable across rebuilds.
    pub fn find_nearby_points(&self, start: PointKey, tiers: usize) -> Vec<Arc<Point>> {
        let snap = self.current.load();
        let Some(origin) = snap.graph_index(start) else {
            return Vec::new();
        };
        let graph = snap.graph();

        let mut visited: HashSet<GraphIndex> = HashSet::new();
        let mut queue: VecDeque<(GraphIndex, usize)> = VecDeque::new();
        let mut found = Vec::new();

        visited.insert(origin);
        queue.push_back((origin, 0));
        found.extend(graph.vertex(origin).cloned());

        while let Some((node, hop)) = queue.pop_front() {
            if hop >= tiers {
                continue;
            }
            for next in graph.successors(node).chain(graph.predecessors(node)) {
                if visited.insert(next) {
                    found.extend(graph.vertex(next).cloned());
                    queue.push_back((next, hop + 1));
                }
            }
        }
        found
    }

    /// Adjacent points, each listed once.
    pub fn neighbors(&self, key: PointKey, direction: Direction) -> Vec<Arc<Point>> {
        let snap = self.current.load();
        let Some(u) = snap.graph_index(key) else {
            return Vec::new();
        };
        let graph = snap.graph();
        let mut seen = HashSet::new();
        graph
            .neighbors(u, direction)
            .into_iter()
            .filter(|v| seen.insert(*v))
            .filter_map(|v| graph.vertex(v).cloned())
            .collect()
    }

    /// Point on `floor` closest to `(x, y)`.
    pub fn nearest_point(&self, floor: FloorId, x: i32, y: i32) -> Option<Arc<Point>> {
        self.current.load().spatial(floor)?.nearest(x, y)
    }

    pub fn points_within(&self, floor: FloorId, window: Envelope) -> Vec<Arc<Point>> {
        self.current
            .load()
            .spatial(floor)
            .map(|index| index.query(window))
            .unwrap_or_default()
    }
}
