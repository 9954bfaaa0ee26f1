//! Segment geometry. Coordinates are millimetres.

use super::{ControlPoint, CurveType};

/// A sampled 2D line string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Polyline {
    coords: Vec<(f64, f64)>,
}

impl Polyline {
    pub fn straight(from: (i32, i32), to: (i32, i32)) -> Self {
        Self {
            coords: vec![
                (f64::from(from.0), f64::from(from.1)),
                (f64::from(to.0), f64::from(to.1)),
            ],
        }
    }

    pub fn coords(&self) -> &[(f64, f64)] {
        &self.coords
    }
}

/// Euclidean distance rounded to the nearest millimetre.
pub fn distance(x1: i32, y1: i32, x2: i32, y2: i32) -> u32 {
    if x1 == x2 && y1 == y2 {
        return 0;
    }
    let dx = f64::from(x1) - f64::from(x2);
    let dy = f64::from(y1) - f64::from(y2);
    (dx * dx + dy * dy).sqrt().round() as u32
}

/// Builds the segment shape for an edge.
///
/// Bézier curves need their control points; when they are missing the
/// segment degrades to a straight line.
pub fn segment(
    from: (i32, i32),
    to: (i32, i32),
    curve: CurveType,
    ctl_1: Option<ControlPoint>,
    ctl_2: Option<ControlPoint>,
) -> Polyline {
    match (curve, ctl_1, ctl_2) {
        (c, Some(c1), _) if c.is_quadratic() => quadratic(from, to, c1),
        (c, Some(c1), Some(c2)) if c.is_cubic() => cubic(from, to, c1, c2),
        _ => Polyline::straight(from, to),
    }
}

/// Sample count grows with chord length, clamped to 10..=100.
fn sample_count(from: (i32, i32), to: (i32, i32)) -> usize {
    let chord = f64::from(distance(from.0, from.1, to.0, to.1));
    ((chord / 10.0) as usize).clamp(10, 100)
}

fn quadratic(from: (i32, i32), to: (i32, i32), c1: ControlPoint) -> Polyline {
    let (p0, p1, p2) = (as_f(from), as_f((c1.x, c1.y)), as_f(to));
    let n = sample_count(from, to);
    let coords = (0..=n)
        .map(|i| {
            let t = i as f64 / n as f64;
            let mt = 1.0 - t;
            (
                mt * mt * p0.0 + 2.0 * mt * t * p1.0 + t * t * p2.0,
                mt * mt * p0.1 + 2.0 * mt * t * p1.1 + t * t * p2.1,
            )
        })
        .collect();
    Polyline { coords }
}

fn cubic(from: (i32, i32), to: (i32, i32), c1: ControlPoint, c2: ControlPoint) -> Polyline {
    let (p0, p1, p2, p3) = (as_f(from), as_f((c1.x, c1.y)), as_f((c2.x, c2.y)), as_f(to));
    let n = sample_count(from, to);
    let coords = (0..=n)
        .map(|i| {
            let t = i as f64 / n as f64;
            let mt = 1.0 - t;
            let (mt2, t2) = (mt * mt, t * t);
            (
                mt2 * mt * p0.0 + 3.0 * mt2 * t * p1.0 + 3.0 * mt * t2 * p2.0 + t2 * t * p3.0,
                mt2 * mt * p0.1 + 3.0 * mt2 * t * p1.1 + 3.0 * mt * t2 * p2.1 + t2 * t * p3.1,
            )
        })
        .collect();
    Polyline { coords }
}

fn as_f(p: (i32, i32)) -> (f64, f64) {
    (f64::from(p.0), f64::from(p.1))
}
