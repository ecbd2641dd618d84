use chrono::{DateTime, Utc};

use super::super::domain::{Discount, PromoCode, PromoLine};

/// Rejections raised when a promo code cannot be honored at all.
///
/// A valid code whose minimum-order threshold is unmet is not one of these:
/// that outcome is recorded on the breakdown as a `PromoLine::BelowMinimum`
/// instead of failing the quote.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PromoError {
    #[error("promo code '{0}' not found")]
    NotFound(String),
    #[error("promo code '{code}' expired at {expired_at}")]
    Expired {
        code: String,
        expired_at: DateTime<Utc>,
    },
    #[error("promo code '{0}' has no redemptions left")]
    Exhausted(String),
}

/// Read-only validity check. The use count is only ever incremented by the
/// store's atomic redeem at booking commit.
pub fn validate(promo: &PromoCode, now: DateTime<Utc>) -> Result<(), PromoError> {
    if now > promo.expires_at {
        return Err(PromoError::Expired {
            code: promo.code.clone(),
            expired_at: promo.expires_at,
        });
    }

    if promo.used >= promo.max_uses {
        return Err(PromoError::Exhausted(promo.code.clone()));
    }

    Ok(())
}

/// Resolve a validated code against a subtotal, producing the breakdown
/// line. Discounts are computed on the pre-tax subtotal.
pub fn apply(promo: &PromoCode, subtotal_cents: u32) -> PromoLine {
    if subtotal_cents < promo.minimum_order_cents {
        return PromoLine::BelowMinimum {
            code: promo.code.clone(),
            minimum_order_cents: promo.minimum_order_cents,
        };
    }

    PromoLine::Applied {
        code: promo.code.clone(),
        discount_cents: discount_cents(promo, subtotal_cents),
    }
}

fn discount_cents(promo: &PromoCode, subtotal_cents: u32) -> u32 {
    match promo.discount {
        Discount::Percentage(pct) => {
            let raw = (subtotal_cents as u64) * (pct as u64);
            (((raw + 50) / 100).min(u32::MAX as u64)) as u32
        }
        Discount::FlatCents(cents) => cents,
    }
}
