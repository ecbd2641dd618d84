mod config;
mod rules;

pub use config::MatchingConfig;

use serde::{Deserialize, Serialize};

use super::domain::{Property, Provider, ServiceTypeId};

/// One eligible provider with the signals downstream ordering and display
/// care about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchCandidate {
    pub provider: Provider,
    pub distance_miles: f64,
    pub score: f64,
}

/// Filters the provider pool down to those allowed to see a booking and
/// ranks them. Read-only over the snapshots it is handed.
#[derive(Debug, Clone)]
pub struct EligibilityMatcher {
    config: MatchingConfig,
}

impl EligibilityMatcher {
    pub fn new(config: MatchingConfig) -> Self {
        Self { config }
    }

    /// Hard-filter and rank the given providers for a booking's service
    /// type and property. An empty result is a normal outcome; the booking
    /// simply stays awaiting a match.
    ///
    /// Ordering is ascending distance ("closest first"), ties broken by
    /// provider id so identical inputs always produce identical output.
    pub fn find_eligible(
        &self,
        service_type_id: &ServiceTypeId,
        property: &Property,
        providers: &[Provider],
    ) -> Vec<MatchCandidate> {
        let mut candidates: Vec<MatchCandidate> = providers
            .iter()
            .filter_map(|provider| {
                rules::hard_filter(provider, service_type_id, property).map(|distance| {
                    MatchCandidate {
                        distance_miles: distance,
                        score: rules::match_score(&self.config, provider, distance),
                        provider: provider.clone(),
                    }
                })
            })
            .collect();

        candidates.sort_by(|a, b| {
            a.distance_miles
                .total_cmp(&b.distance_miles)
                .then_with(|| a.provider.id.cmp(&b.provider.id))
        });

        candidates
    }

    /// Re-run the hard filters for a single provider, e.g. at accept time
    /// when eligibility may have changed since broadcast. Returns the
    /// distance when the provider still qualifies.
    pub fn eligible_distance(
        &self,
        provider: &Provider,
        service_type_id: &ServiceTypeId,
        property: &Property,
    ) -> Option<f64> {
        rules::hard_filter(provider, service_type_id, property)
    }

    pub fn is_eligible(
        &self,
        provider: &Provider,
        service_type_id: &ServiceTypeId,
        property: &Property,
    ) -> bool {
        self.eligible_distance(provider, service_type_id, property)
            .is_some()
    }
}
