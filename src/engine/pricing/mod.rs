mod config;
pub mod promo;

pub use config::PricingConfig;
pub use promo::PromoError;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{
    AddOn, AddOnId, AddOnLine, AddOnPricing, PriceBreakdown, PromoCode, PromoLine, Property,
    ServiceType, ServiceTypeId,
};

/// Base prices and add-on lines are always rounded up to the next multiple
/// of ten dollars. Product decision carried over from the marketplace.
const ROUNDING_STEP_CENTS: u64 = 1_000;

/// Reference data the pricing engine quotes against, supplied by the host.
#[derive(Debug, Clone)]
pub struct ServiceCatalog {
    service_types: BTreeMap<ServiceTypeId, ServiceType>,
    add_ons: BTreeMap<AddOnId, AddOn>,
}

impl ServiceCatalog {
    pub fn new(service_types: Vec<ServiceType>, add_ons: Vec<AddOn>) -> Self {
        Self {
            service_types: service_types
                .into_iter()
                .map(|service| (service.id.clone(), service))
                .collect(),
            add_ons: add_ons
                .into_iter()
                .map(|add_on| (add_on.id.clone(), add_on))
                .collect(),
        }
    }

    pub fn service_type(&self, id: &ServiceTypeId) -> Option<&ServiceType> {
        self.service_types.get(id)
    }

    pub fn add_on(&self, id: &AddOnId) -> Option<&AddOn> {
        self.add_ons.get(id)
    }

    /// Demo catalog used by the CLI quote command and tests.
    pub fn standard() -> Self {
        Self::new(
            vec![
                ServiceType {
                    id: ServiceTypeId("standard".to_string()),
                    rate_cents_per_sqft: 10,
                    description: "Standard clean".to_string(),
                    included_tasks: vec![
                        "Dusting".to_string(),
                        "Vacuuming".to_string(),
                        "Bathrooms".to_string(),
                        "Kitchen surfaces".to_string(),
                    ],
                },
                ServiceType {
                    id: ServiceTypeId("deep".to_string()),
                    rate_cents_per_sqft: 18,
                    description: "Deep clean".to_string(),
                    included_tasks: vec![
                        "Everything in standard".to_string(),
                        "Baseboards".to_string(),
                        "Inside appliances".to_string(),
                    ],
                },
                ServiceType {
                    id: ServiceTypeId("move_out".to_string()),
                    rate_cents_per_sqft: 22,
                    description: "Move-out clean".to_string(),
                    included_tasks: vec![
                        "Everything in deep".to_string(),
                        "Inside cabinets".to_string(),
                        "Wall spot treatment".to_string(),
                    ],
                },
            ],
            vec![
                AddOn {
                    id: AddOnId("inside_fridge".to_string()),
                    description: "Inside fridge".to_string(),
                    pricing: AddOnPricing::FlatCents(2_500),
                },
                AddOn {
                    id: AddOnId("inside_oven".to_string()),
                    description: "Inside oven".to_string(),
                    pricing: AddOnPricing::FlatCents(2_500),
                },
                AddOn {
                    id: AddOnId("windows".to_string()),
                    description: "Interior windows".to_string(),
                    pricing: AddOnPricing::PerSquareFootCents(2),
                },
                AddOn {
                    id: AddOnId("laundry".to_string()),
                    description: "Laundry and fold".to_string(),
                    pricing: AddOnPricing::FlatCents(3_500),
                },
            ],
        )
    }
}

/// Rejections raised while computing a quote.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuoteError {
    #[error("unknown service type '{}'", .0 .0)]
    UnknownServiceType(ServiceTypeId),
    #[error("unknown add-on '{}'", .0 .0)]
    UnknownAddOn(AddOnId),
    #[error("invalid property: {0}")]
    InvalidProperty(String),
    #[error(transparent)]
    Promo(#[from] PromoError),
}

/// Stateless quote computation over catalog and config snapshots.
///
/// Deterministic for identical inputs and free of side effects; safe for
/// unlimited concurrent callers.
#[derive(Debug, Clone)]
pub struct PricingEngine {
    catalog: ServiceCatalog,
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(catalog: ServiceCatalog, config: PricingConfig) -> Self {
        Self { catalog, config }
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub fn catalog(&self) -> &ServiceCatalog {
        &self.catalog
    }

    pub fn quote(
        &self,
        property: &Property,
        service_type_id: &ServiceTypeId,
        add_on_ids: &[AddOnId],
        promo: Option<&PromoCode>,
        now: DateTime<Utc>,
    ) -> Result<PriceBreakdown, QuoteError> {
        if property.square_feet == 0 {
            return Err(QuoteError::InvalidProperty(
                "square footage is missing".to_string(),
            ));
        }

        let service = self
            .catalog
            .service_type(service_type_id)
            .ok_or_else(|| QuoteError::UnknownServiceType(service_type_id.clone()))?;

        let multiplier = self.config.multiplier_for(&property.address.city);
        let raw_base =
            (property.square_feet as u64 * service.rate_cents_per_sqft as u64) as f64 * multiplier;
        let mut base_cents = raw_base.ceil() as u64;

        let pet_surcharge_cents = if property.has_pets {
            self.config.pet_surcharge_cents
        } else {
            0
        };
        base_cents += pet_surcharge_cents as u64;

        let base_cents = ceil_to_rounding_step(base_cents);

        let mut add_ons = Vec::with_capacity(add_on_ids.len());
        let mut add_on_total: u64 = 0;
        for add_on_id in add_on_ids {
            let add_on = self
                .catalog
                .add_on(add_on_id)
                .ok_or_else(|| QuoteError::UnknownAddOn(add_on_id.clone()))?;

            // Flat prices are charged as listed; computed per-sqft amounts
            // get the same $10 ceiling as the base price.
            let amount = match add_on.pricing {
                AddOnPricing::FlatCents(cents) => cents,
                AddOnPricing::PerSquareFootCents(rate) => {
                    ceil_to_rounding_step(property.square_feet as u64 * rate as u64)
                }
            };
            add_on_total += amount as u64;
            add_ons.push(AddOnLine {
                add_on_id: add_on_id.clone(),
                amount_cents: amount,
            });
        }

        let subtotal = (base_cents as u64 + add_on_total).min(u32::MAX as u64) as u32;
        let tax_cents = tax_on(subtotal, self.config.tax_rate_bps);

        let promo_line = match promo {
            Some(promo) => {
                promo::validate(promo, now)?;
                Some(promo::apply(promo, subtotal))
            }
            None => None,
        };
        let discount_cents = match &promo_line {
            Some(PromoLine::Applied { discount_cents, .. }) => *discount_cents,
            _ => 0,
        };

        // Tax is charged on the undiscounted subtotal; the discount comes
        // off afterwards, floored at zero.
        let total_cents = (subtotal as u64 + tax_cents as u64)
            .saturating_sub(discount_cents as u64)
            .min(u32::MAX as u64) as u32;

        Ok(PriceBreakdown {
            service_type_id: service_type_id.clone(),
            metro_multiplier: multiplier,
            pet_surcharge_cents,
            base_cents,
            add_ons,
            subtotal_cents: subtotal,
            tax_cents,
            discount_cents,
            total_cents,
            promo: promo_line,
        })
    }
}

fn ceil_to_rounding_step(cents: u64) -> u32 {
    let stepped = cents.div_ceil(ROUNDING_STEP_CENTS) * ROUNDING_STEP_CENTS;
    stepped.min(u32::MAX as u64) as u32
}

fn tax_on(subtotal_cents: u32, tax_rate_bps: u32) -> u32 {
    let raw = subtotal_cents as u64 * tax_rate_bps as u64;
    (((raw + 5_000) / 10_000).min(u32::MAX as u64)) as u32
}
