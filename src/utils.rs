//! Geometry and bookkeeping helpers shared across the validators.

use std::collections::HashSet;
use std::f64::consts::PI;
use std::sync::{Mutex, OnceLock};

use nalgebra::{Point2, Vector2};

/// Global set of warned messages (for warn_once).
static WARNED_MESSAGES: OnceLock<Mutex<HashSet<String>>> = OnceLock::new();

/// Emit a warning message only once per process.
///
/// Subsequent calls with the same message are ignored.
pub fn warn_once(message: &str) {
    let warned = WARNED_MESSAGES.get_or_init(|| Mutex::new(HashSet::new()));
    let Ok(mut guard) = warned.lock() else {
        return;
    };
    if guard.insert(message.to_string()) {
        tracing::warn!("{}", message);
    }
}

/// Wrap an angle to (-pi, pi].
pub fn wrap_angle(angle: f64) -> f64 {
    let mut wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped += 2.0 * PI;
    }
    wrapped
}

/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

/// Interpolate between two angles along the shortest arc.
pub fn lerp_angle(a: f64, b: f64, t: f64) -> f64 {
    wrap_angle(a + wrap_angle(b - a) * t)
}

/// Ratio of two counts; `None` when the denominator is zero.
pub fn ratio(numerator: usize, denominator: usize) -> Option<f64> {
    if denominator == 0 {
        None
    } else {
        Some(numerator as f64 / denominator as f64)
    }
}

/// Distance from a point to the segment `a`-`b`.
pub fn point_segment_distance(p: &Point2<f64>, a: &Point2<f64>, b: &Point2<f64>) -> f64 {
    let ab: Vector2<f64> = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// Even-odd point-in-polygon test.
pub fn polygon_contains(polygon: &[Point2<f64>], p: &Point2<f64>) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (pi, pj) = (&polygon[i], &polygon[j]);
        if (pi.y > p.y) != (pj.y > p.y) {
            let x_cross = (pj.x - pi.x) * (p.y - pi.y) / (pj.y - pi.y) + pi.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Minimum distance from the origin to a closed polygon (0 if the origin is inside).
pub fn polygon_distance_to_origin(polygon: &[Point2<f64>]) -> f64 {
    let origin = Point2::origin();
    match polygon.len() {
        0 => f64::INFINITY,
        1 => polygon[0].coords.norm(),
        n => {
            if polygon_contains(polygon, &origin) {
                return 0.0;
            }
            (0..n)
                .map(|i| point_segment_distance(&origin, &polygon[i], &polygon[(i + 1) % n]))
                .fold(f64::INFINITY, f64::min)
        }
    }
}
