//! Per-floor point index over integer millimetre coordinates.
//!
//! Backed by an R-tree (via `rstar`), bulk-loaded once per snapshot.
//! Coordinates are widened to `i64` so squared distances cannot overflow.
//!
//! ## Limitations
//!
//! - Built once per snapshot, no incremental insert.

use std::iter;
use std::sync::Arc;

use rstar::{PointDistance, RTree, RTreeObject, AABB};
use serde::{Deserialize, Serialize};

use crate::model::Point;

/// Axis-aligned query window, bounds inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub min_x: i32,
    pub min_y: i32,
    pub max_x: i32,
    pub max_y: i32,
}

impl Envelope {
    /// Normalises swapped corners.
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            min_x: x1.min(x2),
            min_y: y1.min(y2),
            max_x: x1.max(x2),
            max_y: y1.max(y2),
        }
    }

    /// Square window of half-width `radius` around `(x, y)`.
    pub fn around(x: i32, y: i32, radius: i32) -> Self {
        let r = radius.abs();
        Self::new(x.saturating_sub(r), y.saturating_sub(r), x.saturating_add(r), y.saturating_add(r))
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    fn to_aabb(self) -> AABB<[i64; 2]> {
        AABB::from_corners(
            [i64::from(self.min_x), i64::from(self.min_y)],
            [i64::from(self.max_x), i64::from(self.max_y)],
        )
    }
}

/// Tree entry: one point at its position.
#[derive(Debug, Clone)]
struct Located(Arc<Point>);

impl Located {
    fn position(&self) -> [i64; 2] {
        [i64::from(self.0.x), i64::from(self.0.y)]
    }

    fn order_key(&self) -> (i32, i32, crate::model::PointKey) {
        (self.0.x, self.0.y, self.0.key)
    }
}

impl RTreeObject for Located {
    type Envelope = AABB<[i64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point(self.position())
    }
}

impl PointDistance for Located {
    fn distance_2(&self, query_point: &[i64; 2]) -> i64 {
        let [x, y] = self.position();
        let (dx, dy) = (x - query_point[0], y - query_point[1]);
        dx * dx + dy * dy
    }
}

#[derive(Default)]
pub struct SpatialIndex {
    tree: RTree<Located>,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("points", &self.tree.size())
            .finish_non_exhaustive()
    }
}

impl SpatialIndex {
    pub fn build(points: impl IntoIterator<Item = Arc<Point>>) -> Self {
        let entries: Vec<Located> = points.into_iter().map(Located).collect();
        Self { tree: RTree::bulk_load(entries) }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// Points inside `window`, in ascending `(x, y)` order.
    pub fn query(&self, window: Envelope) -> Vec<Arc<Point>> {
        let mut hits: Vec<&Located> = self.tree.locate_in_envelope(&window.to_aabb()).collect();
        hits.sort_by_key(|l| l.order_key());
        hits.into_iter().map(|l| Arc::clone(&l.0)).collect()
    }

    /// Closest point to `(x, y)`. Ties go to the lower `(x, y)`.
    pub fn nearest(&self, x: i32, y: i32) -> Option<Arc<Point>> {
        let query_point = [i64::from(x), i64::from(y)];
        let mut candidates = self.tree.nearest_neighbor_iter_with_distance_2(&query_point);
        let (first, best) = candidates.next()?;
        candidates
            .take_while(|(_, d)| *d == best)
            .map(|(l, _)| l)
            .chain(iter::once(first))
            .min_by_key(|l| l.order_key())
            .map(|l| Arc::clone(&l.0))
    }
}
