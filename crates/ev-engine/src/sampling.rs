//! Start-position sampling.
//!
//! Both samplers take a list of regions and only return points inside all
//! of them, at least `wall_distance` from every region boundary and at least
//! `agent_spacing` from each other.  Passing `[source area, walkable area]`
//! samples the intersection without computing it.
//!
//! | Sampler                     | Used for           | Spacing | Wall distance |
//! |-----------------------------|--------------------|---------|---------------|
//! | [`distribute_by_number`]    | immediate sources  | 0.4 m   | 0.2 m         |
//! | [`distribute_until_filled`] | flow source pools  | 0.3 m   | 0.15 m        |

use rstar::RTree;

use ev_core::{Point, Polygon, SimRng};

use crate::SamplingError;

/// Random draws allowed per requested agent before giving up.
const MAX_ATTEMPTS_PER_AGENT: usize = 1_000;

/// Smallest grid pitch `distribute_until_filled` will use.
const MIN_SPACING: f64 = 0.01;

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum SampleCount {
    /// Exactly this many positions, or an error.
    Number(usize),
    /// As many positions as fit.
    UntilFilled,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SamplingSpec {
    pub count:         SampleCount,
    pub agent_spacing: f64,
    pub wall_distance: f64,
}

impl SamplingSpec {
    pub const fn with_count(self, n: usize) -> Self {
        Self { count: SampleCount::Number(n), ..self }
    }
}

/// Spacing for agents placed before the first step.  Set the count with
/// [`SamplingSpec::with_count`].
pub const IMMEDIATE_SAMPLING: SamplingSpec = SamplingSpec {
    count:         SampleCount::Number(0),
    agent_spacing: 0.4,
    wall_distance: 0.2,
};

/// Spacing for the reusable candidate pool of a flow source.
pub const FLOW_SAMPLING: SamplingSpec = SamplingSpec {
    count:         SampleCount::UntilFilled,
    agent_spacing: 0.3,
    wall_distance: 0.15,
};

// ── Samplers ──────────────────────────────────────────────────────────────────

/// Rejection-sample `n` positions.
///
/// Fails with [`SamplingError::EmptyArea`] if no admissible point was ever
/// drawn, or [`SamplingError::TooCrowded`] if spacing ran out first.
pub fn distribute_by_number(
    regions: &[&Polygon],
    n: usize,
    spec: &SamplingSpec,
    seed: u64,
) -> Result<Vec<Point>, SamplingError> {
    if n == 0 {
        return Ok(Vec::new());
    }
    let Some((min, max)) = common_bounds(regions) else {
        return Err(empty(spec));
    };

    let mut rng = SimRng::new(seed);
    let mut taken: RTree<[f64; 2]> = RTree::new();
    let mut positions = Vec::with_capacity(n);
    let spacing_sq = spec.agent_spacing * spec.agent_spacing;
    let mut any_admissible = false;

    for _ in 0..n.saturating_mul(MAX_ATTEMPTS_PER_AGENT) {
        if positions.len() == n {
            break;
        }
        let p = Point::new(rng.gen_range(min.x..=max.x), rng.gen_range(min.y..=max.y));
        if !admissible(regions, p, spec.wall_distance) {
            continue;
        }
        any_admissible = true;
        if taken.locate_within_distance(p.as_array(), spacing_sq).next().is_some() {
            continue;
        }
        taken.insert(p.as_array());
        positions.push(p);
    }

    match positions.len() {
        placed if placed == n => Ok(positions),
        _ if !any_admissible => Err(empty(spec)),
        placed => Err(SamplingError::TooCrowded { placed, requested: n }),
    }
}

/// Fill the regions with a hexagonal grid of pitch `agent_spacing`.
///
/// The grid origin is shifted by a seeded random offset so different seeds
/// produce different pools.  Points come out row by row; callers that want
/// a random order shuffle them.
pub fn distribute_until_filled(
    regions: &[&Polygon],
    spec: &SamplingSpec,
    seed: u64,
) -> Result<Vec<Point>, SamplingError> {
    let Some((min, max)) = common_bounds(regions) else {
        return Err(empty(spec));
    };

    let spacing = spec.agent_spacing.max(MIN_SPACING);
    let row_height = spacing * 3f64.sqrt() / 2.0;
    let mut rng = SimRng::new(seed);
    let origin = Point::new(
        min.x + rng.gen_range(0.0..spacing),
        min.y + rng.gen_range(0.0..row_height),
    );

    let mut positions = Vec::new();
    let mut y = origin.y;
    let mut row = 0u64;
    while y <= max.y {
        let mut x = origin.x + if row % 2 == 1 { spacing / 2.0 } else { 0.0 };
        while x <= max.x {
            let p = Point::new(x, y);
            if admissible(regions, p, spec.wall_distance) {
                positions.push(p);
            }
            x += spacing;
        }
        y += row_height;
        row += 1;
    }

    if positions.is_empty() {
        return Err(empty(spec));
    }
    Ok(positions)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn admissible(regions: &[&Polygon], p: Point, wall_distance: f64) -> bool {
    regions
        .iter()
        .all(|r| r.contains(p) && r.boundary_distance(p) >= wall_distance)
}

/// Intersection of the regions' bounding boxes, `None` if it is empty.
fn common_bounds(regions: &[&Polygon]) -> Option<(Point, Point)> {
    let mut min = Point::new(f64::NEG_INFINITY, f64::NEG_INFINITY);
    let mut max = Point::new(f64::INFINITY, f64::INFINITY);
    for r in regions {
        let (lo, hi) = r.bbox();
        min = Point::new(min.x.max(lo.x), min.y.max(lo.y));
        max = Point::new(max.x.min(hi.x), max.y.min(hi.y));
    }
    (min.is_finite() && max.is_finite() && min.x <= max.x && min.y <= max.y).then_some((min, max))
}

fn empty(spec: &SamplingSpec) -> SamplingError {
    SamplingError::EmptyArea { spacing: spec.agent_spacing, wall_distance: spec.wall_distance }
}
