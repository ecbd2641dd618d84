use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Pricing dials supplied by the host as reference data.
///
/// Metro multipliers are keyed by city name; lookups normalize case and
/// surrounding whitespace, and unknown cities fall back to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingConfig {
    pub tax_rate_bps: u32,
    pub pet_surcharge_cents: u32,
    pub metro_multipliers: BTreeMap<String, f64>,
}

impl PricingConfig {
    pub fn multiplier_for(&self, city: &str) -> f64 {
        let normalized = city.trim().to_ascii_lowercase();
        self.metro_multipliers
            .get(&normalized)
            .copied()
            .unwrap_or(1.0)
    }

    /// Demo configuration used by the CLI quote command and tests.
    pub fn standard() -> Self {
        let mut metro_multipliers = BTreeMap::new();
        metro_multipliers.insert("san francisco".to_string(), 1.25);
        metro_multipliers.insert("new york".to_string(), 1.3);
        metro_multipliers.insert("austin".to_string(), 1.1);
        metro_multipliers.insert("des moines".to_string(), 1.0);

        Self {
            tax_rate_bps: 800,
            pet_surcharge_cents: 2_000,
            metro_multipliers,
        }
    }
}
