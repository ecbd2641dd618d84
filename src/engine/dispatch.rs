use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::availability::{AvailabilityError, AvailabilityLedger, AvailabilityPolicy};
use super::domain::{
    AddOnId, Booking, BookingId, BookingStatus, CandidateSlot, CustomerId, PriceBreakdown,
    PromoLine, PropertyId, ProviderId, ServiceTypeId, ShiftSlot, TransitionError,
};
use super::matching::{EligibilityMatcher, MatchingConfig};
use super::pricing::{PricingEngine, PromoError, QuoteError};
use super::store::{
    CommitError, FulfillmentStore, MatchNotice, NotificationSink, OfferNotice, ProviderDirectory,
    RedeemError, StoreError,
};

/// Price preview request; resolves snapshots but writes nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuoteRequest {
    pub property_id: PropertyId,
    pub service_type_id: ServiceTypeId,
    #[serde(default)]
    pub add_on_ids: Vec<AddOnId>,
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// A customer's booking placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingRequest {
    pub customer_id: CustomerId,
    pub property_id: PropertyId,
    pub service_type_id: ServiceTypeId,
    #[serde(default)]
    pub add_on_ids: Vec<AddOnId>,
    pub candidate_slots: Vec<CandidateSlot>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub promo_code: Option<String>,
    /// Opaque pre-validated payment authorization handle. The engine only
    /// requires its presence; charge capture happens elsewhere.
    pub payment_authorization: String,
}

/// Job-execution progress events that drive the tail of the booking state
/// machine. Emitted by the field workflow, consumed here for their effect
/// on booking state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobEvent {
    EnRoute,
    Arrived,
    Started,
    Completed,
    Approved,
    Disputed,
}

impl JobEvent {
    const fn target_status(self) -> BookingStatus {
        match self {
            JobEvent::EnRoute => BookingStatus::OnTheWay,
            JobEvent::Arrived => BookingStatus::Arrived,
            JobEvent::Started => BookingStatus::InProgress,
            JobEvent::Completed => BookingStatus::CompletedPendingApproval,
            JobEvent::Approved => BookingStatus::Approved,
            JobEvent::Disputed => BookingStatus::Disputed,
        }
    }
}

/// One ranked provider in a broadcast view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EligibleProviderView {
    pub provider_id: ProviderId,
    pub distance_miles: f64,
    pub score: f64,
    pub rating: f32,
}

/// Ephemeral broadcast result. Offers are derived views, never persisted:
/// acceptance acts on the booking and the availability slot directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferView {
    pub booking_id: BookingId,
    pub candidate_slots: Vec<CandidateSlot>,
    pub eligible: Vec<EligibleProviderView>,
    /// Advisory "expires in N minutes" affordance; not an engine lock.
    pub expires_at: DateTime<Utc>,
}

/// One awaiting-match booking as a specific provider sees it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOfferView {
    pub booking_id: BookingId,
    pub service_type_id: ServiceTypeId,
    pub city: String,
    pub distance_miles: f64,
    /// Candidate slots the provider actually has open.
    pub open_slots: Vec<CandidateSlot>,
    pub total_cents: u32,
    pub expires_at: DateTime<Utc>,
}

/// Sanitized booking status for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct BookingView {
    pub booking_id: BookingId,
    pub status: &'static str,
    pub total_cents: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_provider_id: Option<ProviderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_slot: Option<CandidateSlot>,
    pub pricing: PriceBreakdown,
}

impl From<&Booking> for BookingView {
    fn from(booking: &Booking) -> Self {
        Self {
            booking_id: booking.id.clone(),
            status: booking.status.label(),
            total_cents: booking.pricing.total_cents,
            assigned_provider_id: booking.assigned_provider_id.clone(),
            scheduled_slot: booking.scheduled_slot,
            pricing: booking.pricing.clone(),
        }
    }
}

/// Error raised while placing or quoting a booking.
#[derive(Debug, thiserror::Error)]
pub enum PlaceError {
    #[error("unknown property '{}'", .0 .0)]
    UnknownProperty(PropertyId),
    #[error("at least one candidate date/slot is required")]
    NoCandidateSlots,
    #[error("payment authorization is required")]
    MissingPaymentAuthorization,
    #[error(transparent)]
    Quote(#[from] QuoteError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<RedeemError> for PlaceError {
    fn from(err: RedeemError) -> Self {
        match err {
            RedeemError::Promo(promo) => PlaceError::Quote(QuoteError::Promo(promo)),
            RedeemError::Store(store) => PlaceError::Store(store),
        }
    }
}

/// Error raised while broadcasting a booking to providers.
#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("booking not found")]
    NotFound,
    #[error("booking status '{}' cannot be broadcast", status.label())]
    NotBroadcastable { status: BookingStatus },
    #[error("unknown property '{}'", .0 .0)]
    UnknownProperty(PropertyId),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error raised while building a provider's offer feed.
#[derive(Debug, thiserror::Error)]
pub enum OfferFeedError {
    #[error("unknown provider '{}'", .0 .0)]
    UnknownProvider(ProviderId),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Availability(#[from] AvailabilityError),
}

/// Error raised by an acceptance attempt. Every variant is terminal for
/// that attempt; callers refresh their offer list rather than retry.
#[derive(Debug, thiserror::Error)]
pub enum AcceptError {
    #[error("booking not found")]
    NotFound,
    #[error("booking was already matched to a provider")]
    AlreadyMatched,
    #[error("booking status '{}' does not accept offers", status.label())]
    NotAcceptable { status: BookingStatus },
    #[error("chosen date/slot is not one of the booking's candidates")]
    InvalidSelection,
    #[error("provider is no longer eligible for this booking")]
    NoLongerEligible,
    #[error("unknown provider '{}'", .0 .0)]
    UnknownProvider(ProviderId),
    #[error("provider slot on {date} ({}) is not available", slot.label())]
    SlotUnavailable { date: NaiveDate, slot: ShiftSlot },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Error raised while recording a job-execution progress event.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("booking not found")]
    NotFound,
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

static BOOKING_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_booking_id() -> BookingId {
    let id = BOOKING_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    BookingId(format!("bkg-{id:06}"))
}

/// Orchestrates the offer lifecycle: placement, broadcast, acceptance,
/// cancellation, and job progress, composing the pricing engine, the
/// matcher, the availability ledger, storage, and notifications.
pub struct OfferDispatcher<S, D, N> {
    store: Arc<S>,
    directory: Arc<D>,
    notifier: Arc<N>,
    pricing: PricingEngine,
    matcher: EligibilityMatcher,
    availability: AvailabilityLedger<S>,
    offer_expiry_minutes: u32,
}

impl<S, D, N> OfferDispatcher<S, D, N>
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    pub fn new(
        store: Arc<S>,
        directory: Arc<D>,
        notifier: Arc<N>,
        pricing: PricingEngine,
        matching: MatchingConfig,
        availability: AvailabilityPolicy,
        offer_expiry_minutes: u32,
    ) -> Self {
        let ledger = AvailabilityLedger::new(store.clone(), availability);
        Self {
            store,
            directory,
            notifier,
            pricing,
            matcher: EligibilityMatcher::new(matching),
            availability: ledger,
            offer_expiry_minutes,
        }
    }

    pub fn availability(&self) -> &AvailabilityLedger<S> {
        &self.availability
    }

    pub fn pricing(&self) -> &PricingEngine {
        &self.pricing
    }

    pub fn booking(&self, booking_id: &BookingId) -> Result<Option<Booking>, StoreError> {
        self.store.fetch_booking(booking_id)
    }

    /// Stateless price preview over current reference-data snapshots.
    pub fn quote(
        &self,
        request: &QuoteRequest,
        now: DateTime<Utc>,
    ) -> Result<PriceBreakdown, PlaceError> {
        let property = self
            .directory
            .property(&request.property_id)?
            .ok_or_else(|| PlaceError::UnknownProperty(request.property_id.clone()))?;

        let promo = match &request.promo_code {
            Some(code) => Some(
                self.store
                    .fetch_promo(code)?
                    .ok_or_else(|| QuoteError::Promo(PromoError::NotFound(code.clone())))?,
            ),
            None => None,
        };

        let breakdown = self.pricing.quote(
            &property,
            &request.service_type_id,
            &request.add_on_ids,
            promo.as_ref(),
            now,
        )?;
        Ok(breakdown)
    }

    /// Price and persist a new booking. The breakdown is snapshotted onto
    /// the record; an applied promo is redeemed atomically before insert.
    pub fn place(
        &self,
        request: BookingRequest,
        now: DateTime<Utc>,
    ) -> Result<Booking, PlaceError> {
        if request.payment_authorization.trim().is_empty() {
            return Err(PlaceError::MissingPaymentAuthorization);
        }
        if request.candidate_slots.is_empty() {
            return Err(PlaceError::NoCandidateSlots);
        }

        let property = self
            .directory
            .property(&request.property_id)?
            .ok_or_else(|| PlaceError::UnknownProperty(request.property_id.clone()))?;

        let promo = match &request.promo_code {
            Some(code) => Some(
                self.store
                    .fetch_promo(code)?
                    .ok_or_else(|| QuoteError::Promo(PromoError::NotFound(code.clone())))?,
            ),
            None => None,
        };

        let pricing = self.pricing.quote(
            &property,
            &request.service_type_id,
            &request.add_on_ids,
            promo.as_ref(),
            now,
        )?;

        // A below-minimum promo line carries no discount and consumes no
        // redemption.
        let applied_code = match &pricing.promo {
            Some(PromoLine::Applied { code, .. }) => Some(code.clone()),
            _ => None,
        };
        if let Some(code) = &applied_code {
            self.store.redeem_promo(code, now)?;
        }

        let booking = Booking {
            id: next_booking_id(),
            customer_id: request.customer_id,
            property_id: request.property_id,
            service_type_id: request.service_type_id,
            add_on_ids: request.add_on_ids,
            candidate_slots: request.candidate_slots,
            notes: request.notes,
            pricing,
            promo_code: applied_code,
            assigned_provider_id: None,
            scheduled_slot: None,
            status: BookingStatus::Placed,
            created_at: now,
            matched_at: None,
            started_at: None,
            completed_at: None,
        };

        let stored = self.store.insert_booking(booking)?;
        info!(
            booking_id = %stored.id.0,
            total_cents = stored.pricing.total_cents,
            "booking placed"
        );
        Ok(stored)
    }

    /// Open a placed booking to its eligible providers and signal them.
    /// Re-broadcasting an awaiting-match booking recomputes the view.
    pub fn broadcast(
        &self,
        booking_id: &BookingId,
        now: DateTime<Utc>,
    ) -> Result<OfferView, BroadcastError> {
        let mut booking = self
            .store
            .fetch_booking(booking_id)?
            .ok_or(BroadcastError::NotFound)?;

        match booking.status {
            BookingStatus::Placed => {
                booking
                    .transition(BookingStatus::AwaitingMatch, now)
                    .map_err(|err| BroadcastError::NotBroadcastable { status: err.from })?;
                self.store.update_booking(booking.clone())?;
            }
            BookingStatus::AwaitingMatch => {}
            status => return Err(BroadcastError::NotBroadcastable { status }),
        }

        let property = self
            .directory
            .property(&booking.property_id)?
            .ok_or_else(|| BroadcastError::UnknownProperty(booking.property_id.clone()))?;
        let providers = self.directory.active_providers()?;
        let candidates =
            self.matcher
                .find_eligible(&booking.service_type_id, &property, &providers);

        let view = OfferView {
            booking_id: booking.id.clone(),
            candidate_slots: booking.candidate_slots.clone(),
            eligible: candidates
                .iter()
                .map(|candidate| EligibleProviderView {
                    provider_id: candidate.provider.id.clone(),
                    distance_miles: candidate.distance_miles,
                    score: candidate.score,
                    rating: candidate.provider.rating,
                })
                .collect(),
            expires_at: now + Duration::minutes(self.offer_expiry_minutes as i64),
        };

        if view.eligible.is_empty() {
            info!(booking_id = %booking.id.0, "no eligible providers; booking stays awaiting match");
            return Ok(view);
        }

        let notice = OfferNotice {
            booking_id: booking.id.clone(),
            provider_ids: view
                .eligible
                .iter()
                .map(|provider| provider.provider_id.clone())
                .collect(),
            expires_at: view.expires_at,
        };
        if let Err(err) = self.notifier.offer_broadcast(notice) {
            warn!(booking_id = %booking.id.0, error = %err, "offer broadcast notification failed");
        }

        info!(
            booking_id = %booking.id.0,
            eligible = view.eligible.len(),
            "booking broadcast to providers"
        );
        Ok(view)
    }

    /// The awaiting-match bookings a provider may currently see: hard
    /// filters re-checked at view time, dismissed offers hidden, candidate
    /// slots narrowed to ones the provider has open.
    pub fn offers_for(
        &self,
        provider_id: &ProviderId,
        now: DateTime<Utc>,
    ) -> Result<Vec<ProviderOfferView>, OfferFeedError> {
        let provider = self
            .directory
            .provider(provider_id)?
            .ok_or_else(|| OfferFeedError::UnknownProvider(provider_id.clone()))?;
        let dismissed = self.store.dismissals(provider_id)?;
        let today = now.date_naive();

        let mut feed = Vec::new();
        for booking in self.store.awaiting_match()? {
            if dismissed.contains(&booking.id) {
                continue;
            }

            let Some(property) = self.directory.property(&booking.property_id)? else {
                warn!(booking_id = %booking.id.0, "booking references missing property; skipping");
                continue;
            };

            let Some(distance) =
                self.matcher
                    .eligible_distance(&provider, &booking.service_type_id, &property)
            else {
                continue;
            };

            let mut open_slots = Vec::new();
            for candidate in &booking.candidate_slots {
                if self
                    .availability
                    .is_open(provider_id, candidate.date, candidate.slot, today)?
                {
                    open_slots.push(*candidate);
                }
            }
            if open_slots.is_empty() {
                continue;
            }

            feed.push(ProviderOfferView {
                booking_id: booking.id.clone(),
                service_type_id: booking.service_type_id.clone(),
                city: property.address.city.clone(),
                distance_miles: distance,
                open_slots,
                total_cents: booking.pricing.total_cents,
                expires_at: now + Duration::minutes(self.offer_expiry_minutes as i64),
            });
        }

        Ok(feed)
    }

    /// A provider claims a booking for one of its candidate slots.
    ///
    /// Validation happens up front; the state change itself is a single
    /// atomic commit in the store, so concurrent acceptances serialize
    /// there and every loser gets a terminal error with no partial writes.
    pub fn accept(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        chosen: CandidateSlot,
        now: DateTime<Utc>,
    ) -> Result<Booking, AcceptError> {
        let booking = self
            .store
            .fetch_booking(booking_id)?
            .ok_or(AcceptError::NotFound)?;

        match booking.status {
            BookingStatus::AwaitingMatch => {}
            BookingStatus::Matched => return Err(AcceptError::AlreadyMatched),
            status => return Err(AcceptError::NotAcceptable { status }),
        }

        if !booking.is_candidate(&chosen) {
            return Err(AcceptError::InvalidSelection);
        }

        // Eligibility is re-checked at accept time, not just at broadcast:
        // the provider may have been suspended or moved since.
        let provider = self
            .directory
            .provider(provider_id)?
            .ok_or_else(|| AcceptError::UnknownProvider(provider_id.clone()))?;
        let property = self
            .directory
            .property(&booking.property_id)?
            .ok_or(AcceptError::NoLongerEligible)?;
        if !self
            .matcher
            .is_eligible(&provider, &booking.service_type_id, &property)
        {
            return Err(AcceptError::NoLongerEligible);
        }

        let matched = self
            .store
            .commit_acceptance(booking_id, provider_id, chosen, now)
            .map_err(|err| match err {
                CommitError::BookingNotFound => AcceptError::NotFound,
                CommitError::StatusConflict {
                    status: BookingStatus::Matched,
                } => AcceptError::AlreadyMatched,
                CommitError::StatusConflict { status } => AcceptError::NotAcceptable { status },
                CommitError::SlotConflict { date, slot, .. } => {
                    AcceptError::SlotUnavailable { date, slot }
                }
                CommitError::Store(store) => AcceptError::Store(store),
            })?;

        info!(
            booking_id = %matched.id.0,
            provider_id = %provider_id.0,
            date = %chosen.date,
            slot = chosen.slot.label(),
            "booking matched"
        );

        let providers = match self.directory.active_providers() {
            Ok(providers) => providers,
            Err(err) => {
                warn!(error = %err, "could not snapshot providers for loser notice");
                Vec::new()
            }
        };
        let losers: Vec<ProviderId> = self
            .matcher
            .find_eligible(&matched.service_type_id, &property, &providers)
            .into_iter()
            .map(|candidate| candidate.provider.id)
            .filter(|id| id != provider_id)
            .collect();

        let notice = MatchNotice {
            booking_id: matched.id.clone(),
            customer_id: matched.customer_id.clone(),
            provider_id: provider_id.clone(),
            losing_provider_ids: losers,
        };
        if let Err(err) = self.notifier.match_confirmed(notice) {
            warn!(booking_id = %matched.id.0, error = %err, "match confirmation notification failed");
        }

        Ok(matched)
    }

    /// A provider hides an offer from its own feed. Purely a local
    /// preference: booking state is untouched and other providers still
    /// see the offer.
    pub fn decline(
        &self,
        provider_id: &ProviderId,
        booking_id: &BookingId,
    ) -> Result<(), StoreError> {
        self.store.record_dismissal(provider_id, booking_id)?;
        info!(
            booking_id = %booking_id.0,
            provider_id = %provider_id.0,
            "offer dismissed from provider feed"
        );
        Ok(())
    }

    /// Cancel from any non-terminal state, releasing a booked slot back to
    /// `available` in the same atomic unit.
    pub fn cancel(
        &self,
        booking_id: &BookingId,
        now: DateTime<Utc>,
    ) -> Result<Booking, CommitError> {
        let cancelled = self.store.cancel_booking(booking_id, now)?;
        info!(booking_id = %cancelled.id.0, "booking cancelled");
        Ok(cancelled)
    }

    /// Record a job-execution progress event against the state machine.
    pub fn record_event(
        &self,
        booking_id: &BookingId,
        event: JobEvent,
        now: DateTime<Utc>,
    ) -> Result<Booking, ProgressError> {
        let mut booking = self
            .store
            .fetch_booking(booking_id)?
            .ok_or(ProgressError::NotFound)?;

        booking.transition(event.target_status(), now)?;
        self.store.update_booking(booking.clone())?;

        info!(
            booking_id = %booking.id.0,
            status = booking.status.label(),
            "booking progress recorded"
        );
        Ok(booking)
    }
}
