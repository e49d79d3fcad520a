//! Agent allocation over weighted variants.
//!
//! | Function            | Used for                                  | Guarantee                |
//! |---------------------|-------------------------------------------|--------------------------|
//! | [`allocate_static`] | a batch of N agents placed before step 0  | Σ counts == N exactly    |
//! | [`select_weighted`] | one agent injected by a flow source       | P(k) = w_k / Σw          |

use ev_core::SimRng;

use crate::{RoutingError, RoutingResult};

/// Split `n` agents across variants with weights `weights`.
///
/// Every variant gets `floor(n · w_k / Σw)` except the last one with a
/// positive weight, which takes the remainder.  A zero-weight variant never
/// receives agents unless every weight is zero, in which case the last
/// variant takes all `n`.  Returns an empty `Vec` for an empty weight list.
pub fn allocate_static(n: usize, weights: &[f64]) -> Vec<usize> {
    if weights.is_empty() {
        return Vec::new();
    }
    let total: f64 = weights.iter().sum();
    let remainder_at = weights.iter().rposition(|&w| w > 0.0).unwrap_or(weights.len() - 1);

    let mut counts = vec![0; weights.len()];
    let mut assigned = 0usize;
    for (k, &w) in weights.iter().enumerate() {
        if k == remainder_at {
            continue;
        }
        let share = if total > 0.0 { (n as f64 * w / total).floor() as usize } else { 0 };
        let share = share.min(n - assigned);
        counts[k] = share;
        assigned += share;
    }
    counts[remainder_at] = n - assigned;
    counts
}

/// Pick one variant index with probability proportional to its weight.
///
/// Draws `u ∈ [0, Σw)` and returns the first index whose cumulative weight
/// reaches `u`.  Falls back to index 0 when rounding leaves no match or the
/// weights sum to zero.
pub fn select_weighted(weights: &[f64], rng: &mut SimRng) -> RoutingResult<usize> {
    if weights.is_empty() {
        return Err(RoutingError::EmptyWeights);
    }
    let total: f64 = weights.iter().sum();
    if !(total.is_finite() && total > 0.0) {
        return Ok(0);
    }

    let u = rng.gen_range(0.0..total);
    let mut cumulative = 0.0;
    for (i, &w) in weights.iter().enumerate() {
        cumulative += w;
        if cumulative >= u {
            return Ok(i);
        }
    }
    Ok(0)
}
