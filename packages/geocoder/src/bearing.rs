//! Compass bearing helpers over projected (x = east, y = north) coordinates.

use geo::{Coord, Point};

/// Bearing from `from` to `to` in degrees clockwise from north, in
/// `[0, 360)`. `None` when the points coincide.
#[must_use]
pub fn bearing_between(from: Coord<f64>, to: Coord<f64>) -> Option<f64> {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    Some(dx.atan2(dy).to_degrees().rem_euclid(360.0))
}

/// Smallest angle between two bearings, in `[0, 180]`.
#[must_use]
pub fn angular_deviation(a: f64, b: f64) -> f64 {
    let diff = (a - b).rem_euclid(360.0);
    diff.min(360.0 - diff)
}

/// Initial bearing of a polyline: from its first coordinate to the first
/// coordinate that differs from it.
#[must_use]
pub fn initial_bearing(path: &[Coord<f64>]) -> Option<f64> {
    let (first, rest) = path.split_first()?;
    rest.iter().find_map(|c| bearing_between(*first, *c))
}

/// Point `distance` units from `origin` along `bearing`.
#[must_use]
pub fn offset(origin: Point<f64>, bearing: f64, distance: f64) -> Point<f64> {
    let rad = bearing.to_radians();
    Point::new(
        distance.mul_add(rad.sin(), origin.x()),
        distance.mul_add(rad.cos(), origin.y()),
    )
}

/// Walks `distance` units along a polyline from its first coordinate,
/// stopping at the last coordinate if the polyline is shorter.
#[must_use]
pub fn walk(path: &[Coord<f64>], distance: f64) -> Option<Point<f64>> {
    let first = *path.first()?;
    let mut remaining = distance.max(0.0);

    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        let step = (b.x - a.x).hypot(b.y - a.y);
        if step == 0.0 {
            continue;
        }
        if remaining <= step {
            let t = remaining / step;
            return Some(Point::new(
                t.mul_add(b.x - a.x, a.x),
                t.mul_add(b.y - a.y, a.y),
            ));
        }
        remaining -= step;
    }

    Some(path.last().copied().unwrap_or(first).into())
}
