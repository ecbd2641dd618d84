use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for bookings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct BookingId(pub String);

/// Identifier wrapper for customers placing bookings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CustomerId(pub String);

/// Identifier wrapper for customer properties.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PropertyId(pub String);

/// Identifier wrapper for service providers (cleaners).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProviderId(pub String);

/// Identifier wrapper for catalog service types.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceTypeId(pub String);

/// Identifier wrapper for catalog add-ons.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AddOnId(pub String);

/// Street address with the coordinates used for provider matching.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub lat: f64,
    pub lng: f64,
}

/// Customer property snapshot referenced by quotes and bookings.
///
/// Address edits on the live record never flow back into an already priced
/// booking; pricing operates on the snapshot it was handed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub id: PropertyId,
    pub owner_id: CustomerId,
    pub square_feet: u32,
    pub bedrooms: u8,
    pub bathrooms: u8,
    pub has_pets: bool,
    pub address: Address,
}

/// Static catalog entry describing a cleaning service tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceType {
    pub id: ServiceTypeId,
    pub rate_cents_per_sqft: u32,
    pub description: String,
    pub included_tasks: Vec<String>,
}

/// How an add-on is priced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AddOnPricing {
    FlatCents(u32),
    PerSquareFootCents(u32),
}

/// Static catalog entry for an optional extra task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOn {
    pub id: AddOnId,
    pub description: String,
    pub pricing: AddOnPricing,
}

/// Discount carried by a promotional code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Discount {
    Percentage(u8),
    FlatCents(u32),
}

/// Promotional code record. `used` is incremented exactly once per
/// successful redemption at booking commit, never at quote time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromoCode {
    pub code: String,
    pub discount: Discount,
    pub minimum_order_cents: u32,
    pub expires_at: DateTime<Utc>,
    pub max_uses: u32,
    pub used: u32,
}

/// Account standing of a provider; only active providers participate in
/// matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProviderStatus {
    Active,
    Pending,
    Suspended,
}

impl ProviderStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ProviderStatus::Active => "active",
            ProviderStatus::Pending => "pending",
            ProviderStatus::Suspended => "suspended",
        }
    }
}

/// Service provider profile used for eligibility checks and ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub user_id: String,
    pub status: ProviderStatus,
    pub base_lat: f64,
    pub base_lng: f64,
    pub service_radius_miles: f64,
    pub service_type_ids: Vec<ServiceTypeId>,
    pub rating: f32,
}

/// The three shift units a provider's day is divided into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftSlot {
    Morning,
    Afternoon,
    Evening,
}

impl ShiftSlot {
    pub const ALL: [ShiftSlot; 3] = [ShiftSlot::Morning, ShiftSlot::Afternoon, ShiftSlot::Evening];

    pub const fn label(self) -> &'static str {
        match self {
            ShiftSlot::Morning => "morning",
            ShiftSlot::Afternoon => "afternoon",
            ShiftSlot::Evening => "evening",
        }
    }
}

/// A (date, shift) pair a customer is willing to be served in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub date: NaiveDate,
    pub slot: ShiftSlot,
}

/// Key addressing one unit of provider capacity.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotKey {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    pub slot: ShiftSlot,
}

/// Status of an availability slot. `Booked` is derived state: it is set
/// exclusively by the acceptance commit and always references the booking
/// that claimed it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotStatus {
    Available,
    Blocked,
    Booked { booking_id: BookingId },
}

impl SlotStatus {
    pub const fn label(&self) -> &'static str {
        match self {
            SlotStatus::Available => "available",
            SlotStatus::Blocked => "blocked",
            SlotStatus::Booked { .. } => "booked",
        }
    }
}

/// Single line of the priced breakdown attributable to one add-on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddOnLine {
    pub add_on_id: AddOnId,
    pub amount_cents: u32,
}

/// Outcome of applying a promo code to a quote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PromoLine {
    Applied {
        code: String,
        discount_cents: u32,
    },
    /// The code itself was valid but the subtotal missed its minimum-order
    /// threshold, so no discount applies.
    BelowMinimum {
        code: String,
        minimum_order_cents: u32,
    },
}

impl PromoLine {
    pub fn code(&self) -> &str {
        match self {
            PromoLine::Applied { code, .. } | PromoLine::BelowMinimum { code, .. } => code,
        }
    }
}

/// Priced breakdown snapshotted onto the booking at creation. This is a
/// financial record: it is never recomputed after the booking exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub service_type_id: ServiceTypeId,
    pub metro_multiplier: f64,
    pub pet_surcharge_cents: u32,
    pub base_cents: u32,
    pub add_ons: Vec<AddOnLine>,
    pub subtotal_cents: u32,
    pub tax_cents: u32,
    pub discount_cents: u32,
    pub total_cents: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promo: Option<PromoLine>,
}

/// Lifecycle states of a booking from placement through approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Placed,
    AwaitingMatch,
    Matched,
    OnTheWay,
    Arrived,
    InProgress,
    CompletedPendingApproval,
    Approved,
    Disputed,
    Cancelled,
}

impl BookingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            BookingStatus::Placed => "placed",
            BookingStatus::AwaitingMatch => "awaiting_match",
            BookingStatus::Matched => "matched",
            BookingStatus::OnTheWay => "on_the_way",
            BookingStatus::Arrived => "arrived",
            BookingStatus::InProgress => "in_progress",
            BookingStatus::CompletedPendingApproval => "completed_pending_approval",
            BookingStatus::Approved => "approved",
            BookingStatus::Disputed => "disputed",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// Terminal states admit no further transitions. Dispute resolution is
    /// a back-office flow outside this engine, so `Disputed` is terminal
    /// here.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Approved | BookingStatus::Disputed | BookingStatus::Cancelled
        )
    }

    /// Legal edges of the booking state machine.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        match (self, next) {
            (Placed, AwaitingMatch)
            | (AwaitingMatch, Matched)
            | (Matched, OnTheWay)
            | (OnTheWay, Arrived)
            | (Arrived, InProgress)
            | (InProgress, CompletedPendingApproval)
            | (CompletedPendingApproval, Approved)
            | (CompletedPendingApproval, Disputed) => true,
            (current, Cancelled) => !current.is_terminal(),
            _ => false,
        }
    }
}

/// Attempted illegal state transition.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("illegal booking transition {} -> {}", from.label(), to.label())]
pub struct TransitionError {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

/// A customer's request for service at a property, with candidate slots and
/// the pricing snapshot taken at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    pub id: BookingId,
    pub customer_id: CustomerId,
    pub property_id: PropertyId,
    pub service_type_id: ServiceTypeId,
    pub add_on_ids: Vec<AddOnId>,
    pub candidate_slots: Vec<CandidateSlot>,
    pub notes: Option<String>,
    pub pricing: PriceBreakdown,
    pub promo_code: Option<String>,
    pub assigned_provider_id: Option<ProviderId>,
    pub scheduled_slot: Option<CandidateSlot>,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub matched_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Booking {
    /// Apply one legal state transition, stamping the lifecycle timestamps
    /// as the booking moves through them.
    pub fn transition(
        &mut self,
        next: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }

        match next {
            BookingStatus::Matched => self.matched_at = Some(at),
            BookingStatus::InProgress => self.started_at = Some(at),
            BookingStatus::CompletedPendingApproval => self.completed_at = Some(at),
            _ => {}
        }

        self.status = next;
        Ok(())
    }

    pub fn is_candidate(&self, slot: &CandidateSlot) -> bool {
        self.candidate_slots.contains(slot)
    }
}
