//! Target: the label on a directed edge between two points.

use serde::{Deserialize, Serialize};

use super::{Polyline, PointKey};

/// Weight given to synthetic cross-floor edges so routing only crosses
/// floors when it has to.
pub const BRIDGE_WEIGHT: f64 = 500_000.0;

/// Segment shape between two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurveType {
    Unknown,
    /// Forward/backward straight line.
    Straight,
    QuadraticBezier,
    CubicBezier,
    /// Sideways straight line.
    StraightConnect,
    QuadraticBezierConnect,
    CubicBezierConnect,
}

impl CurveType {
    /// Editor code → curve type. Unrecognised codes fall back to `Straight`.
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => CurveType::Unknown,
            1 => CurveType::Straight,
            2 => CurveType::QuadraticBezier,
            3 => CurveType::CubicBezier,
            4 => CurveType::StraightConnect,
            5 => CurveType::QuadraticBezierConnect,
            6 => CurveType::CubicBezierConnect,
            _ => CurveType::Straight,
        }
    }

    pub fn code(self) -> i32 {
        match self {
            CurveType::Unknown => 0,
            CurveType::Straight => 1,
            CurveType::QuadraticBezier => 2,
            CurveType::CubicBezier => 3,
            CurveType::StraightConnect => 4,
            CurveType::QuadraticBezierConnect => 5,
            CurveType::CubicBezierConnect => 6,
        }
    }

    pub fn is_quadratic(self) -> bool {
        matches!(self, CurveType::QuadraticBezier | CurveType::QuadraticBezierConnect)
    }

    pub fn is_cubic(self) -> bool {
        matches!(self, CurveType::CubicBezier | CurveType::CubicBezierConnect)
    }
}

/// Bézier control point.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlPoint {
    pub x: i32,
    pub y: i32,
}

/// Traversal direction for neighbour queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A directed connection from one point to another.
#[derive(Debug, Clone, PartialEq)]
pub struct Target {
    pub from: PointKey,
    pub to: PointKey,
    pub curve: CurveType,
    pub dir: i32,
    pub speed: i32,
    pub ctl_1: Option<ControlPoint>,
    pub ctl_2: Option<ControlPoint>,
    /// Editor distance in millimetres; zero when the editor left it blank.
    pub distance: u32,
    /// Synthetic cross-floor connection.
    pub bridge: bool,
    pub geometry: Polyline,
}

impl Target {
    /// Routing cost of this edge.
    pub fn weight(&self) -> f64 {
        if self.bridge {
            BRIDGE_WEIGHT
        } else if self.distance > 0 {
            f64::from(self.distance)
        } else {
            1.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_curve_codes() {
        for code in 0..=6 {
            assert_eq!(CurveType::from_code(code).code(), code);
        }
        assert_eq!(CurveType::from_code(42), CurveType::Straight);
        assert_eq!(CurveType::from_code(-1), CurveType::Straight);
    }

    #[test]
    fn test_weight_defaults_to_one() {
        let t = Target {
            from: PointKey::new(1, 1),
            to: PointKey::new(1, 2),
            curve: CurveType::Straight,
            dir: 0,
            speed: 0,
            ctl_1: None,
            ctl_2: None,
            distance: 0,
            bridge: false,
            geometry: Polyline::default(),
        };
        assert_eq!(t.weight(), 1.0);
        assert_eq!(Target { distance: 5, ..t.clone() }.weight(), 5.0);
        assert_eq!(Target { bridge: true, ..t }.weight(), BRIDGE_WEIGHT);
    }
}
