use serde::{Deserialize, Serialize};

/// Tunable weights for the soft ranking of eligible providers. The hard
/// filters are not configurable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    pub rating_weight: f64,
    pub proximity_weight: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            rating_weight: 0.6,
            proximity_weight: 0.4,
        }
    }
}
