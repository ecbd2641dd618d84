use super::common::*;
use crate::engine::domain::{AddOnId, Discount, PromoLine, ServiceTypeId};
use crate::engine::pricing::{PricingEngine, PromoError, QuoteError, ServiceCatalog};

#[test]
fn worked_example_without_add_ons() {
    let engine = pricing_engine();

    let breakdown = engine
        .quote(
            &property(),
            &ServiceTypeId("standard".to_string()),
            &[],
            None,
            now(),
        )
        .expect("quote prices");

    assert_eq!(breakdown.base_cents, 20_000);
    assert_eq!(breakdown.subtotal_cents, 20_000);
    assert_eq!(breakdown.tax_cents, 1_600);
    assert_eq!(breakdown.discount_cents, 0);
    assert_eq!(breakdown.total_cents, 21_600);
}

#[test]
fn worked_example_with_flat_add_on() {
    let engine = pricing_engine();

    let breakdown = engine
        .quote(
            &property(),
            &ServiceTypeId("standard".to_string()),
            &[AddOnId("inside_fridge".to_string())],
            None,
            now(),
        )
        .expect("quote prices");

    // Flat $25 add-on is charged as listed, not rounded.
    assert_eq!(breakdown.subtotal_cents, 22_500);
    assert_eq!(breakdown.tax_cents, 1_800);
    assert_eq!(breakdown.total_cents, 24_300);
}

#[test]
fn quote_is_deterministic_for_identical_inputs() {
    let engine = pricing_engine();
    let add_ons = [
        AddOnId("inside_fridge".to_string()),
        AddOnId("windows".to_string()),
    ];

    let first = engine
        .quote(
            &property_with(1_437, "San Francisco", true),
            &ServiceTypeId("deep".to_string()),
            &add_ons,
            None,
            now(),
        )
        .expect("first quote");
    let second = engine
        .quote(
            &property_with(1_437, "San Francisco", true),
            &ServiceTypeId("deep".to_string()),
            &add_ons,
            None,
            now(),
        )
        .expect("second quote");

    assert_eq!(first, second);
}

#[test]
fn base_price_obeys_rounding_law() {
    let engine = pricing_engine();

    for sqft in [1, 73, 999, 1_437, 2_000, 3_205, 10_001] {
        for service in ["standard", "deep", "move_out"] {
            let breakdown = engine
                .quote(
                    &property_with(sqft, "Des Moines", false),
                    &ServiceTypeId(service.to_string()),
                    &[],
                    None,
                    now(),
                )
                .expect("quote prices");

            let rate = engine
                .catalog()
                .service_type(&ServiceTypeId(service.to_string()))
                .expect("service in catalog")
                .rate_cents_per_sqft;
            let raw = sqft as u64 * rate as u64;

            assert_eq!(
                breakdown.base_cents % 1_000,
                0,
                "base must be a multiple of $10 for {sqft} sqft {service}"
            );
            assert!(
                breakdown.base_cents as u64 >= raw,
                "rounded base must never undercut the raw price"
            );
        }
    }
}

#[test]
fn metro_multiplier_scales_base_and_unknown_city_defaults() {
    let engine = pricing_engine();

    let scaled = engine
        .quote(
            &property_with(2_000, "San Francisco", false),
            &ServiceTypeId("standard".to_string()),
            &[],
            None,
            now(),
        )
        .expect("quote prices");
    assert_eq!(scaled.metro_multiplier, 1.25);
    assert_eq!(scaled.base_cents, 25_000);

    let unknown = engine
        .quote(
            &property_with(2_000, "Nowhereville", false),
            &ServiceTypeId("standard".to_string()),
            &[],
            None,
            now(),
        )
        .expect("quote prices");
    assert_eq!(unknown.metro_multiplier, 1.0);
    assert_eq!(unknown.base_cents, 20_000);
}

#[test]
fn city_lookup_ignores_case_and_whitespace() {
    let engine = pricing_engine();

    let breakdown = engine
        .quote(
            &property_with(2_000, "  SAN FRANCISCO ", false),
            &ServiceTypeId("standard".to_string()),
            &[],
            None,
            now(),
        )
        .expect("quote prices");

    assert_eq!(breakdown.metro_multiplier, 1.25);
}

#[test]
fn pet_surcharge_applies_before_rounding() {
    let engine = pricing_engine();

    let breakdown = engine
        .quote(
            &property_with(1_990, "Des Moines", true),
            &ServiceTypeId("standard".to_string()),
            &[],
            None,
            now(),
        )
        .expect("quote prices");

    // 1990 * 10 + 2000 = 21900, ceiled to 22000.
    assert_eq!(breakdown.pet_surcharge_cents, 2_000);
    assert_eq!(breakdown.base_cents, 22_000);
}

#[test]
fn rate_based_add_on_rounds_up_independently() {
    let engine = pricing_engine();

    let breakdown = engine
        .quote(
            &property_with(1_950, "Des Moines", false),
            &ServiceTypeId("standard".to_string()),
            &[AddOnId("windows".to_string())],
            None,
            now(),
        )
        .expect("quote prices");

    // Base 1950 * 10c = 19500 ceils to $200; windows 1950 * 2c = 3900
    // ceils to $40 on its own.
    let windows = &breakdown.add_ons[0];
    assert_eq!(windows.amount_cents, 4_000);
    assert_eq!(breakdown.base_cents, 20_000);
    assert_eq!(breakdown.subtotal_cents, 24_000);
}

#[test]
fn rejects_unknown_reference_data_and_missing_sqft() {
    let engine = pricing_engine();

    match engine.quote(
        &property(),
        &ServiceTypeId("carpet-shampoo".to_string()),
        &[],
        None,
        now(),
    ) {
        Err(QuoteError::UnknownServiceType(id)) => assert_eq!(id.0, "carpet-shampoo"),
        other => panic!("expected unknown service type, got {other:?}"),
    }

    match engine.quote(
        &property(),
        &ServiceTypeId("standard".to_string()),
        &[AddOnId("chimney".to_string())],
        None,
        now(),
    ) {
        Err(QuoteError::UnknownAddOn(id)) => assert_eq!(id.0, "chimney"),
        other => panic!("expected unknown add-on, got {other:?}"),
    }

    match engine.quote(
        &property_with(0, "Des Moines", false),
        &ServiceTypeId("standard".to_string()),
        &[],
        None,
        now(),
    ) {
        Err(QuoteError::InvalidProperty(_)) => {}
        other => panic!("expected invalid property, got {other:?}"),
    }
}

#[test]
fn percentage_promo_discounts_subtotal_not_tax() {
    let engine = pricing_engine();
    let promo = promo("WELCOME10");

    let breakdown = engine
        .quote(
            &property(),
            &ServiceTypeId("standard".to_string()),
            &[],
            Some(&promo),
            now(),
        )
        .expect("quote prices");

    // Tax stays computed on the undiscounted subtotal.
    assert_eq!(breakdown.tax_cents, 1_600);
    assert_eq!(breakdown.discount_cents, 2_000);
    assert_eq!(breakdown.total_cents, 20_000 + 1_600 - 2_000);
    assert!(matches!(
        breakdown.promo,
        Some(PromoLine::Applied { .. })
    ));
}

#[test]
fn valid_promo_below_minimum_does_not_reduce_total() {
    let engine = pricing_engine();
    let mut promo = promo("BIGSPEND");
    promo.minimum_order_cents = 50_000;

    let breakdown = engine
        .quote(
            &property(),
            &ServiceTypeId("standard".to_string()),
            &[],
            Some(&promo),
            now(),
        )
        .expect("quote prices");

    assert_eq!(breakdown.discount_cents, 0);
    assert_eq!(breakdown.total_cents, 21_600);
    match breakdown.promo {
        Some(PromoLine::BelowMinimum {
            minimum_order_cents,
            ..
        }) => assert_eq!(minimum_order_cents, 50_000),
        other => panic!("expected below-minimum promo line, got {other:?}"),
    }
}

#[test]
fn oversized_flat_discount_floors_total_at_zero() {
    let engine = pricing_engine();
    let mut promo = promo("COMPED");
    promo.discount = Discount::FlatCents(5_000_000);
    promo.minimum_order_cents = 0;

    let breakdown = engine
        .quote(
            &property(),
            &ServiceTypeId("standard".to_string()),
            &[],
            Some(&promo),
            now(),
        )
        .expect("quote prices");

    assert_eq!(breakdown.total_cents, 0);
}

#[test]
fn expired_and_exhausted_codes_fail_the_quote() {
    let engine = pricing_engine();

    let mut expired = promo("LASTYEAR");
    expired.expires_at = now() - chrono::Duration::days(1);
    match engine.quote(
        &property(),
        &ServiceTypeId("standard".to_string()),
        &[],
        Some(&expired),
        now(),
    ) {
        Err(QuoteError::Promo(PromoError::Expired { code, .. })) => {
            assert_eq!(code, "LASTYEAR");
        }
        other => panic!("expected expired promo, got {other:?}"),
    }

    let mut exhausted = promo("POPULAR");
    exhausted.max_uses = 5;
    exhausted.used = 5;
    match engine.quote(
        &property(),
        &ServiceTypeId("standard".to_string()),
        &[],
        Some(&exhausted),
        now(),
    ) {
        Err(QuoteError::Promo(PromoError::Exhausted(code))) => assert_eq!(code, "POPULAR"),
        other => panic!("expected exhausted promo, got {other:?}"),
    }
}

#[test]
fn quote_has_no_side_effects_on_the_promo_snapshot() {
    let engine = pricing_engine();
    let promo = promo("WELCOME10");

    engine
        .quote(
            &property(),
            &ServiceTypeId("standard".to_string()),
            &[],
            Some(&promo),
            now(),
        )
        .expect("quote prices");

    assert_eq!(promo.used, 0, "quote must never consume a redemption");
}

#[test]
fn catalog_round_trips_service_and_add_on_lookups() {
    let catalog = ServiceCatalog::standard();

    assert!(catalog
        .service_type(&ServiceTypeId("move_out".to_string()))
        .is_some());
    assert!(catalog.add_on(&AddOnId("laundry".to_string())).is_some());
    assert!(catalog
        .service_type(&ServiceTypeId("gutters".to_string()))
        .is_none());

    let _ = PricingEngine::new(catalog, pricing_config());
}
