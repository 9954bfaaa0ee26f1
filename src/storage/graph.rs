//! Directed, labelled graph over dense vertex indices.
//!
//! Vertices are `Arc<Point>`, edges carry an `Arc<Target>` label and a
//! weight. The graph is assembled once by the snapshot builder and is
//! read-only afterwards.
//!
//! ## Limitations
//!
//! - **At most one edge per ordered pair**: adding `u → v` again replaces
//!   the previous weight and label.
//! - **No removal**: topology changes go through a full rebuild.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::model::{Direction, GraphIndex, Point, Target};

/// One outgoing edge.
#[derive(Debug, Clone)]
pub struct Edge {
    pub to: GraphIndex,
    pub weight: f64,
    pub label: Arc<Target>,
}

/// Adjacency-list digraph.
#[derive(Debug, Default)]
pub struct Digraph {
    vertices: Vec<Arc<Point>>,
    outgoing: Vec<SmallVec<[Edge; 4]>>,
    /// vertex → predecessors
    incoming: Vec<SmallVec<[GraphIndex; 4]>>,
    edge_count: usize,
}

impl Digraph {
    pub fn with_capacity(vertices: usize) -> Self {
        Self {
            vertices: Vec::with_capacity(vertices),
            outgoing: Vec::with_capacity(vertices),
            incoming: Vec::with_capacity(vertices),
            edge_count: 0,
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Append a vertex. Its index must equal the point's graph index.
    pub(crate) fn push_vertex(&mut self, point: Arc<Point>) -> GraphIndex {
        let index = GraphIndex::new(self.vertices.len());
        debug_assert_eq!(point.graph_index(), index);
        self.vertices.push(point);
        self.outgoing.push(SmallVec::new());
        self.incoming.push(SmallVec::new());
        index
    }

    /// Insert or replace the edge `u → v`.
    pub(crate) fn add_edge(&mut self, u: GraphIndex, v: GraphIndex, weight: f64, label: Arc<Target>) {
        let out = &mut self.outgoing[u.slot()];
        if let Some(edge) = out.iter_mut().find(|e| e.to == v) {
            edge.weight = weight;
            edge.label = label;
            return;
        }
        out.push(Edge { to: v, weight, label });
        self.incoming[v.slot()].push(u);
        self.edge_count += 1;
    }

    // ========================================================================
    // Reads
    // ========================================================================

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex(&self, index: GraphIndex) -> Option<&Arc<Point>> {
        self.vertices.get(index.slot())
    }

    pub fn vertices(&self) -> impl Iterator<Item = &Arc<Point>> {
        self.vertices.iter()
    }

    pub fn edges_from(&self, u: GraphIndex) -> &[Edge] {
        self.outgoing.get(u.slot()).map(|e| e.as_slice()).unwrap_or(&[])
    }

    pub fn edge(&self, u: GraphIndex, v: GraphIndex) -> Option<&Edge> {
        self.edges_from(u).iter().find(|e| e.to == v)
    }

    pub fn successors(&self, u: GraphIndex) -> impl Iterator<Item = GraphIndex> + '_ {
        self.edges_from(u).iter().map(|e| e.to)
    }

    pub fn predecessors(&self, v: GraphIndex) -> impl Iterator<Item = GraphIndex> + '_ {
        self.incoming
            .get(v.slot())
            .map(|p| p.as_slice())
            .unwrap_or(&[])
            .iter()
            .copied()
    }

    /// Adjacent vertices in the given direction. `Both` may yield a vertex
    /// twice when edges run both ways.
    pub fn neighbors(&self, u: GraphIndex, dir: Direction) -> Vec<GraphIndex> {
        match dir {
            Direction::Outgoing => self.successors(u).collect(),
            Direction::Incoming => self.predecessors(u).collect(),
            Direction::Both => self.successors(u).chain(self.predecessors(u)).collect(),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
