//! `ScenarioPlan`: everything a run needs that does not depend on its seed.

use ev_config::{Distribution, Scenario, ValidatedConfig};
use ev_core::{Polygon, RunParameters};
use ev_routing::{Resolver, RoutingPlan};

use crate::SimResult;

/// A validated scenario with its routing resolved once for all runs.
///
/// Built synchronously before any run starts, so configuration and routing
/// errors reach the caller directly.  Shared read-only by every worker of a
/// batch.
#[derive(Clone, Debug)]
pub struct ScenarioPlan {
    pub walkable: Polygon,
    pub config:   ValidatedConfig,
    pub params:   RunParameters,
    pub routing:  RoutingPlan,
    /// Declared distributions, or the implicit whole-area source.
    sources:      Vec<Distribution>,
}

impl ScenarioPlan {
    /// Resolve routing for an already validated configuration.
    pub fn new(
        walkable: Polygon,
        config:   ValidatedConfig,
        params:   RunParameters,
        resolver: &Resolver,
    ) -> SimResult<Self> {
        let routing = RoutingPlan::build(&config, resolver)?;
        let sources = if config.distributions.is_empty() {
            vec![Distribution::covering(walkable.clone())]
        } else {
            config.distributions.clone()
        };
        Ok(Self { walkable, config, params, routing, sources })
    }

    /// Validate `scenario` and resolve its routing.
    pub fn from_scenario(scenario: &Scenario, resolver: &Resolver) -> SimResult<Self> {
        let (walkable, config, params) = scenario.validate()?;
        Self::new(walkable, config, params, resolver)
    }

    /// Spawn sources in declaration order.
    #[inline]
    pub fn sources(&self) -> &[Distribution] {
        &self.sources
    }

    /// `true` if the configuration declared no distribution.
    pub fn uses_implicit_source(&self) -> bool {
        self.config.distributions.is_empty()
    }

    /// Agents every source would produce if all were placed.
    pub fn expected_agents(&self) -> u64 {
        self.sources.iter().map(|d| u64::from(d.number)).sum()
    }

    #[inline]
    pub fn runs(&self) -> usize {
        self.params.number_of_simulations as usize
    }
}
