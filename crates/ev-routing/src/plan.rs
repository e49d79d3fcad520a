//! Variants of every journey, grouped by the spawn source they start from.

use ev_config::ValidatedConfig;

use crate::resolver::Resolver;
use crate::variant::{CycleTruncation, JourneyVariant};
use crate::RoutingResult;

/// Resolved routing for a whole configuration.
///
/// A variant is attached to every distribution its journey names, so a
/// source shared by two journeys draws from both variant sets (total weight
/// 200).  Weighted selection normalises by the actual sum.
#[derive(Clone, Debug, Default)]
pub struct RoutingPlan {
    variants:    Vec<JourneyVariant>,
    /// `by_source[d]` = indices into `variants` for distribution `d`.
    by_source:   Vec<Vec<usize>>,
    truncations: Vec<CycleTruncation>,
}

impl RoutingPlan {
    /// Resolve every journey of `config`.
    pub fn build(config: &ValidatedConfig, resolver: &Resolver) -> RoutingResult<Self> {
        let mut plan = RoutingPlan {
            variants:    Vec::new(),
            by_source:   vec![Vec::new(); config.distributions.len()],
            truncations: Vec::new(),
        };

        for journey in 0..config.journeys.len() {
            let resolution = resolver.resolve_journey(config, journey)?;
            plan.truncations.extend(resolution.truncations);
            for variant in resolution.variants {
                let index = plan.variants.len();
                for dist in config.journeys[journey].distributions() {
                    if !plan.by_source[dist].contains(&index) {
                        plan.by_source[dist].push(index);
                    }
                }
                plan.variants.push(variant);
            }
        }
        Ok(plan)
    }

    /// Every variant, in journey then expansion order.
    #[inline]
    pub fn variants(&self) -> &[JourneyVariant] {
        &self.variants
    }

    /// Indices into [`variants`](Self::variants) for `dist`.  Empty for
    /// sources no journey names (including the implicit whole-area source).
    pub fn source_variant_indices(&self, dist: usize) -> &[usize] {
        self.by_source.get(dist).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Cycle truncations reported while resolving (always empty under
    /// `CyclePolicy::Reject`).
    #[inline]
    pub fn truncations(&self) -> &[CycleTruncation] {
        &self.truncations
    }
}
