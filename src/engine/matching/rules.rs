use super::super::domain::{Property, Provider, ProviderStatus, ServiceTypeId};
use super::super::geo::{self, GeoPoint};
use super::config::MatchingConfig;

const MAX_RATING: f64 = 5.0;

/// Apply the hard eligibility filters; returns the provider's distance to
/// the property when all of them pass. Failing a hard filter excludes the
/// provider outright, it is never a score penalty.
pub(crate) fn hard_filter(
    provider: &Provider,
    service_type_id: &ServiceTypeId,
    property: &Property,
) -> Option<f64> {
    if provider.status != ProviderStatus::Active {
        return None;
    }

    if !provider.service_type_ids.contains(service_type_id) {
        return None;
    }

    let distance = geo::distance_miles(
        GeoPoint {
            lat: property.address.lat,
            lng: property.address.lng,
        },
        GeoPoint {
            lat: provider.base_lat,
            lng: provider.base_lng,
        },
    );

    if distance > provider.service_radius_miles {
        return None;
    }

    Some(distance)
}

/// Weighted rating/proximity score. Non-increasing in distance,
/// non-decreasing in rating, and fully deterministic for identical inputs.
pub(crate) fn match_score(config: &MatchingConfig, provider: &Provider, distance: f64) -> f64 {
    let rating_part = (provider.rating as f64 / MAX_RATING).clamp(0.0, 1.0);
    let proximity_part = if provider.service_radius_miles > 0.0 {
        (1.0 - distance / provider.service_radius_miles).clamp(0.0, 1.0)
    } else {
        0.0
    };

    config.rating_weight * rating_part + config.proximity_weight * proximity_part
}
