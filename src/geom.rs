// Copyright (c) 2017-2021 Fabian Schuiki

//! Geometry primitives.
//!
//! This module implements the coordinate and rectangle types used by the
//! scan, the two distance measures, and the construction of the query
//! envelopes around an observation.

/// Mean Earth radius in meters, as used by the haversine distance.
pub const EARTH_RADIUS: f64 = 6_371_009.0;

/// A coordinate pair.
///
/// For cartesian trajectories `x` and `y` are plane coordinates. For
/// geographic trajectories `x` is the latitude and `y` the longitude, both
/// in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coord {
    pub x: f64,
    pub y: f64,
}

impl Coord {
    /// Create a new coordinate pair.
    pub fn new(x: f64, y: f64) -> Self {
        Coord { x, y }
    }
}

/// An axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub xmin: f64,
    pub xmax: f64,
    pub ymin: f64,
    pub ymax: f64,
}

impl Rect {
    /// Create a rectangle spanning two corner coordinates.
    pub fn new(p1: Coord, p2: Coord) -> Self {
        let mut rect = Rect {
            xmin: p1.x,
            xmax: p2.x,
            ymin: p1.y,
            ymax: p2.y,
        };
        rect.normalize();
        rect
    }

    /// Create a degenerate rectangle covering a single coordinate.
    pub fn around(c: Coord) -> Self {
        Rect::new(c, c)
    }

    /// Swap the extents such that min <= max on both axes.
    pub fn normalize(&mut self) {
        if self.xmin > self.xmax {
            std::mem::swap(&mut self.xmin, &mut self.xmax);
        }
        if self.ymin > self.ymax {
            std::mem::swap(&mut self.ymin, &mut self.ymax);
        }
    }

    /// Inflate the rectangle by `width` on all sides.
    pub fn buffer(mut self, width: f64) -> Self {
        self.grow(width);
        self
    }

    /// Inflate the rectangle by `delta` on all sides, in place.
    pub fn grow(&mut self, delta: f64) {
        self.xmin -= delta;
        self.xmax += delta;
        self.ymin -= delta;
        self.ymax += delta;
    }

    /// Check whether this rectangle intersects another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.xmin.max(other.xmin) <= self.xmax.min(other.xmax)
            && self.ymin.max(other.ymin) <= self.ymax.min(other.ymax)
    }

    /// Check whether this rectangle fully contains another.
    pub fn contains(&self, other: &Rect) -> bool {
        other.xmin >= self.xmin
            && other.xmax <= self.xmax
            && other.ymin >= self.ymin
            && other.ymax <= self.ymax
    }

    /// Check whether a coordinate lies inside this rectangle.
    pub fn contains_point(&self, p: Coord) -> bool {
        self.xmin <= p.x && p.x <= self.xmax && self.ymin <= p.y && p.y <= self.ymax
    }

    /// Extend the rectangle to cover a coordinate.
    pub fn combine_extent_with(&mut self, x: f64, y: f64) {
        self.xmin = self.xmin.min(x);
        self.xmax = self.xmax.max(x);
        self.ymin = self.ymin.min(y);
        self.ymax = self.ymax.max(y);
    }

    /// Extend the rectangle to cover another rectangle.
    pub fn combine_extent_with_rect(&mut self, other: &Rect) {
        self.xmin = self.xmin.min(other.xmin);
        self.xmax = self.xmax.max(other.xmax);
        self.ymin = self.ymin.min(other.ymin);
        self.ymax = self.ymax.max(other.ymax);
    }
}

/// The distance measure of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Distance {
    /// Plane coordinates, plain euclidean distance.
    Euclidean,
    /// Latitude and longitude in degrees, great-circle distance in meters.
    Haversine,
}

impl Distance {
    /// Select the distance measure for a trajectory.
    pub fn for_cartesian(cartesian: bool) -> Self {
        if cartesian {
            Distance::Euclidean
        } else {
            Distance::Haversine
        }
    }

    /// Measure the distance between two coordinates.
    pub fn measure(self, a: Coord, b: Coord) -> f64 {
        match self {
            Distance::Euclidean => euclidean(a, b),
            Distance::Haversine => haversine(a.x, a.y, b.x, b.y),
        }
    }
}

/// Euclidean distance between two plane coordinates.
pub fn euclidean(a: Coord, b: Coord) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Great-circle distance in meters between two latitude/longitude pairs in
/// degrees.
pub fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * a.sqrt().asin() * EARTH_RADIUS
}

/// The query envelope around an observation.
///
/// The outer rectangle over-approximates the eps-ball and bounds the
/// candidate gathering; candidates inside the inner rectangle skip the exact
/// distance check. Geographic envelopes are built from a conservative
/// meters-to-degrees conversion and carry no inner rectangle, so every
/// candidate is confirmed by the haversine distance.
#[derive(Debug, Clone, Copy)]
pub struct Envelope {
    pub outer: Rect,
    pub inner: Option<Rect>,
}

impl Envelope {
    /// Build the envelope around `center` for a neighborhood radius `eps`.
    pub fn around(center: Coord, eps: f64, distance: Distance) -> Self {
        match distance {
            Distance::Euclidean => Envelope {
                outer: Rect::around(center).buffer(eps + 1.0),
                inner: Some(Rect::around(center).buffer(eps * 0.7)),
            },
            Distance::Haversine => {
                // Degrees of latitude spanning eps+1 meters; longitude
                // degrees shrink with the cosine of the latitude, clamped
                // away from the poles.
                let dlat = ((eps + 1.0) / EARTH_RADIUS).to_degrees();
                let coslat = center.x.to_radians().cos().abs().max(0.01);
                let dlon = (dlat / coslat).min(180.0);
                Envelope {
                    outer: Rect {
                        xmin: center.x - dlat,
                        xmax: center.x + dlat,
                        ymin: center.y - dlon,
                        ymax: center.y + dlon,
                    },
                    inner: None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rect_normalizes_inverted_corners() {
        let r = Rect::new(Coord::new(4.0, -1.0), Coord::new(1.0, 3.0));
        assert_eq!(r.xmin, 1.0);
        assert_eq!(r.xmax, 4.0);
        assert_eq!(r.ymin, -1.0);
        assert_eq!(r.ymax, 3.0);
    }

    #[test]
    fn rect_buffer_and_contains() {
        let r = Rect::around(Coord::new(0.0, 0.0)).buffer(2.0);
        assert!(r.contains_point(Coord::new(1.5, -1.5)));
        assert!(!r.contains_point(Coord::new(2.5, 0.0)));
        assert!(r.contains(&Rect::around(Coord::new(1.0, 1.0))));
    }

    #[test]
    fn rect_intersects() {
        let a = Rect::new(Coord::new(0.0, 0.0), Coord::new(2.0, 2.0));
        let b = Rect::new(Coord::new(2.0, 2.0), Coord::new(3.0, 3.0));
        let c = Rect::new(Coord::new(2.1, 2.1), Coord::new(3.0, 3.0));
        assert!(a.intersects(&b));
        assert!(b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn rect_combines_extents() {
        let mut r = Rect::around(Coord::new(0.0, 0.0));
        r.combine_extent_with(3.0, -2.0);
        r.combine_extent_with_rect(&Rect::around(Coord::new(-1.0, 5.0)));
        assert_eq!(r.xmin, -1.0);
        assert_eq!(r.xmax, 3.0);
        assert_eq!(r.ymin, -2.0);
        assert_eq!(r.ymax, 5.0);
    }

    #[test]
    fn euclidean_distance() {
        let d = euclidean(Coord::new(0.0, 0.0), Coord::new(3.0, 4.0));
        assert!((d - 5.0).abs() < 1e-12);
    }

    #[test]
    fn haversine_one_millidegree_at_equator() {
        let d = haversine(0.0, 0.0, 0.0, 0.001);
        assert!((d - 111.19).abs() < 0.05, "got {}", d);
    }

    #[test]
    fn geographic_envelope_covers_the_eps_ball() {
        let center = Coord::new(0.0, 0.0);
        let other = Coord::new(0.0, 0.001);
        let wide = Envelope::around(center, 200.0, Distance::Haversine);
        let narrow = Envelope::around(center, 50.0, Distance::Haversine);
        assert!(wide.outer.contains_point(other));
        assert!(!narrow.outer.contains_point(other));
        assert!(wide.inner.is_none());
    }
}
