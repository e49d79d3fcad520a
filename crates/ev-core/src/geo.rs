//! Planar geometry used by stages, spawn areas, and the walkable area.
//!
//! Coordinates are metres in a local Cartesian frame, stored as `f64`.
//! Polygons are simple rings (first point not repeated) with optional holes;
//! ring orientation is irrelevant to every query here.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreError, CoreResult};

// ── Point ─────────────────────────────────────────────────────────────────────

/// A 2-D position or direction.
#[derive(Copy, Clone, Debug, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance.
    #[inline]
    pub fn distance(self, other: Point) -> f64 {
        (self - other).norm()
    }

    #[inline]
    pub fn distance_sq(self, other: Point) -> f64 {
        let d = self - other;
        d.dot(d)
    }

    #[inline]
    pub fn dot(self, other: Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near-)zero vector.
    pub fn normalized(self) -> Option<Point> {
        let n = self.norm();
        (n > f64::EPSILON).then(|| Point::new(self.x / n, self.y / n))
    }

    #[inline]
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    #[inline]
    pub fn as_array(self) -> [f64; 2] {
        [self.x, self.y]
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Point::new(x, y)
    }
}

impl From<Point> for [f64; 2] {
    fn from(p: Point) -> Self {
        p.as_array()
    }
}

impl std::ops::Add for Point {
    type Output = Point;
    #[inline]
    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;
    #[inline]
    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Point {
    type Output = Point;
    #[inline]
    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

// ── Polygon ───────────────────────────────────────────────────────────────────

/// A simple polygon with optional holes (obstacles in the walkable area).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub exterior: Vec<Point>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub holes: Vec<Vec<Point>>,
}

impl Polygon {
    /// Build a hole-free polygon, rejecting degenerate or non-finite rings.
    pub fn new(exterior: Vec<Point>) -> CoreResult<Self> {
        check_ring(&exterior)?;
        Ok(Self { exterior, holes: Vec::new() })
    }

    /// Build a polygon with holes.
    pub fn with_holes(exterior: Vec<Point>, holes: Vec<Vec<Point>>) -> CoreResult<Self> {
        check_ring(&exterior)?;
        for hole in &holes {
            check_ring(hole)?;
        }
        Ok(Self { exterior, holes })
    }

    /// Axis-aligned rectangle.
    pub fn rectangle(min: Point, max: Point) -> Self {
        Self {
            exterior: vec![
                Point::new(min.x, min.y),
                Point::new(max.x, min.y),
                Point::new(max.x, max.y),
                Point::new(min.x, max.y),
            ],
            holes: Vec::new(),
        }
    }

    /// `true` if `p` lies inside the exterior ring and outside every hole.
    /// Points exactly on an edge may land on either side.
    pub fn contains(&self, p: Point) -> bool {
        ring_contains(&self.exterior, p) && !self.holes.iter().any(|h| ring_contains(h, p))
    }

    /// Distance from `p` to the nearest boundary edge (exterior or hole).
    pub fn boundary_distance(&self, p: Point) -> f64 {
        std::iter::once(&self.exterior)
            .chain(self.holes.iter())
            .map(|ring| ring_distance(ring, p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Distance from `p` to the polygon area; zero when `p` is inside.
    pub fn distance(&self, p: Point) -> f64 {
        if self.contains(p) { 0.0 } else { self.boundary_distance(p) }
    }

    /// `(min, max)` corners of the exterior's bounding box.
    pub fn bbox(&self) -> (Point, Point) {
        let mut min = Point::new(f64::INFINITY, f64::INFINITY);
        let mut max = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
        for p in &self.exterior {
            min.x = min.x.min(p.x);
            min.y = min.y.min(p.y);
            max.x = max.x.max(p.x);
            max.y = max.y.max(p.y);
        }
        (min, max)
    }

    /// Area (shoelace) of the exterior minus the holes.
    pub fn area(&self) -> f64 {
        ring_signed_area(&self.exterior).abs()
            - self.holes.iter().map(|h| ring_signed_area(h).abs()).sum::<f64>()
    }

    /// Centroid of the exterior ring.  Falls back to the vertex mean for
    /// zero-area rings.
    pub fn centroid(&self) -> Point {
        let ring = &self.exterior;
        let a = ring_signed_area(ring);
        if a.abs() < f64::EPSILON {
            let n = ring.len().max(1) as f64;
            let sum = ring.iter().fold(Point::default(), |acc, &p| acc + p);
            return sum * (1.0 / n);
        }
        let (mut cx, mut cy) = (0.0, 0.0);
        for (p, q) in edges(ring) {
            let cross = p.x * q.y - q.x * p.y;
            cx += (p.x + q.x) * cross;
            cy += (p.y + q.y) * cross;
        }
        Point::new(cx / (6.0 * a), cy / (6.0 * a))
    }

    /// Render as a WKT `POLYGON` (rings closed, holes after the exterior).
    pub fn to_wkt(&self) -> String {
        let ring_wkt = |ring: &[Point]| {
            let mut parts: Vec<String> = ring.iter().map(|p| format!("{} {}", p.x, p.y)).collect();
            if let Some(first) = ring.first() {
                parts.push(format!("{} {}", first.x, first.y));
            }
            format!("({})", parts.join(", "))
        };
        let rings: Vec<String> = std::iter::once(self.exterior.as_slice())
            .chain(self.holes.iter().map(Vec::as_slice))
            .map(ring_wkt)
            .collect();
        format!("POLYGON ({})", rings.join(", "))
    }
}

// ── Ring helpers ──────────────────────────────────────────────────────────────

fn check_ring(ring: &[Point]) -> CoreResult<()> {
    if ring.len() < 3 {
        return Err(CoreError::DegeneratePolygon(ring.len()));
    }
    if let Some((index, p)) = ring.iter().enumerate().find(|(_, p)| !p.is_finite()) {
        return Err(CoreError::NonFiniteCoordinate { index, x: p.x, y: p.y });
    }
    Ok(())
}

/// Consecutive `(p, q)` pairs including the closing edge.
fn edges(ring: &[Point]) -> impl Iterator<Item = (Point, Point)> + '_ {
    ring.iter()
        .copied()
        .zip(ring.iter().copied().cycle().skip(1))
        .take(ring.len())
}

/// Even-odd ray casting.
fn ring_contains(ring: &[Point], p: Point) -> bool {
    let mut inside = false;
    for (a, b) in edges(ring) {
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = a.x + (p.y - a.y) * (b.x - a.x) / (b.y - a.y);
            if p.x < x_cross {
                inside = !inside;
            }
        }
    }
    inside
}

fn ring_distance(ring: &[Point], p: Point) -> f64 {
    edges(ring)
        .map(|(a, b)| segment_distance(a, b, p))
        .fold(f64::INFINITY, f64::min)
}

fn segment_distance(a: Point, b: Point, p: Point) -> f64 {
    let ab = b - a;
    let len_sq = ab.dot(ab);
    if len_sq <= f64::EPSILON {
        return p.distance(a);
    }
    let t = ((p - a).dot(ab) / len_sq).clamp(0.0, 1.0);
    p.distance(a + ab * t)
}

fn ring_signed_area(ring: &[Point]) -> f64 {
    0.5 * edges(ring).map(|(p, q)| p.x * q.y - q.x * p.y).sum::<f64>()
}
