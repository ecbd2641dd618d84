use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    Booking, BookingId, BookingStatus, CandidateSlot, CustomerId, PromoCode, Property, PropertyId,
    Provider, ProviderId, ProviderStatus, ShiftSlot, SlotKey, SlotStatus,
};
use super::pricing::promo::{self, PromoError};

/// Error enumeration for storage failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failures of the conditional commit operations. `StatusConflict` and
/// `SlotConflict` are the observable outcomes of losing a race; neither
/// leaves any partial mutation behind.
#[derive(Debug, thiserror::Error)]
pub enum CommitError {
    #[error("booking not found")]
    BookingNotFound,
    #[error("booking status '{}' does not allow this operation", status.label())]
    StatusConflict { status: BookingStatus },
    #[error("slot on {date} ({}) is {}", slot.label(), status.label())]
    SlotConflict {
        date: NaiveDate,
        slot: ShiftSlot,
        status: SlotStatus,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Failures of the atomic promo redemption.
#[derive(Debug, thiserror::Error)]
pub enum RedeemError {
    #[error(transparent)]
    Promo(#[from] PromoError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Durable storage contract for bookings, availability slots, promo codes,
/// and per-provider offer dismissals.
///
/// Each method is individually atomic. The three conditional operations
/// (`commit_acceptance`, `cancel_booking`, `redeem_promo`) are the
/// serialization points the engine's invariants hang off of:
/// implementations must apply each as one isolated unit or not at all.
pub trait FulfillmentStore: Send + Sync {
    fn insert_booking(&self, booking: Booking) -> Result<Booking, StoreError>;
    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError>;
    fn update_booking(&self, booking: Booking) -> Result<(), StoreError>;
    /// Snapshot of bookings currently broadcast and unmatched.
    fn awaiting_match(&self) -> Result<Vec<Booking>, StoreError>;

    fn slot_status(&self, key: &SlotKey) -> Result<SlotStatus, StoreError>;
    /// Raw slot write used by the availability ledger after it has applied
    /// its own rules. Never use this to mark slots booked.
    fn put_slot_status(&self, key: SlotKey, status: SlotStatus) -> Result<(), StoreError>;

    fn fetch_promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError>;
    fn upsert_promo(&self, promo: PromoCode) -> Result<(), StoreError>;
    /// Atomic validate-and-increment of a promo's use count; concurrent
    /// redemptions can never push `used` past `max_uses`.
    fn redeem_promo(&self, code: &str, now: DateTime<Utc>) -> Result<PromoCode, RedeemError>;

    fn record_dismissal(
        &self,
        provider_id: &ProviderId,
        booking_id: &BookingId,
    ) -> Result<(), StoreError>;
    fn dismissals(&self, provider_id: &ProviderId) -> Result<BTreeSet<BookingId>, StoreError>;

    /// The acceptance commit: compare-and-swap the booking from
    /// `awaiting_match` to `matched` guarded together with the provider's
    /// slot from `available` to `booked`, as a single atomic unit. At most
    /// one call ever succeeds per booking.
    fn commit_acceptance(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        chosen: CandidateSlot,
        at: DateTime<Utc>,
    ) -> Result<Booking, CommitError>;

    /// Cancel a booking from any non-terminal state, releasing a slot it
    /// had booked back to `available` in the same atomic unit.
    fn cancel_booking(&self, booking_id: &BookingId, at: DateTime<Utc>)
        -> Result<Booking, CommitError>;
}

/// Read access to the provider and property records owned by the
/// surrounding platform. Matching works from the snapshot this returns.
pub trait ProviderDirectory: Send + Sync {
    fn property(&self, id: &PropertyId) -> Result<Option<Property>, StoreError>;
    fn provider(&self, id: &ProviderId) -> Result<Option<Provider>, StoreError>;
    fn active_providers(&self) -> Result<Vec<Provider>, StoreError>;
}

/// "New job available" broadcast payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferNotice {
    pub booking_id: BookingId,
    pub provider_ids: Vec<ProviderId>,
    /// Advisory display deadline; nothing in the engine enforces it.
    pub expires_at: DateTime<Utc>,
}

/// "Job confirmed" payload sent to the customer and the providers who did
/// not win the booking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchNotice {
    pub booking_id: BookingId,
    pub customer_id: CustomerId,
    pub provider_id: ProviderId,
    pub losing_provider_ids: Vec<ProviderId>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget delivery hooks. Failures are logged by the dispatcher
/// and never fail the engine operation that triggered them.
pub trait NotificationSink: Send + Sync {
    fn offer_broadcast(&self, notice: OfferNotice) -> Result<(), NotifyError>;
    fn match_confirmed(&self, notice: MatchNotice) -> Result<(), NotifyError>;
}

/// Sink that logs notices instead of delivering them. Stands in for a real
/// push transport in the demo server and local development.
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn offer_broadcast(&self, notice: OfferNotice) -> Result<(), NotifyError> {
        tracing::info!(
            booking_id = %notice.booking_id.0,
            providers = notice.provider_ids.len(),
            "new job available"
        );
        Ok(())
    }

    fn match_confirmed(&self, notice: MatchNotice) -> Result<(), NotifyError> {
        tracing::info!(
            booking_id = %notice.booking_id.0,
            provider_id = %notice.provider_id.0,
            losers = notice.losing_provider_ids.len(),
            "job confirmed"
        );
        Ok(())
    }
}

#[derive(Default)]
struct MemoryState {
    bookings: HashMap<BookingId, Booking>,
    slots: HashMap<SlotKey, SlotStatus>,
    promos: HashMap<String, PromoCode>,
    dismissals: HashMap<ProviderId, BTreeSet<BookingId>>,
}

/// Mutex-guarded reference store. A single lock covers every operation, so
/// the conditional commits are trivially atomic and isolated.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("store mutex poisoned".to_string()))
    }
}

impl FulfillmentStore for MemoryStore {
    fn insert_booking(&self, booking: Booking) -> Result<Booking, StoreError> {
        let mut state = self.lock()?;
        if state.bookings.contains_key(&booking.id) {
            return Err(StoreError::Conflict);
        }
        state.bookings.insert(booking.id.clone(), booking.clone());
        Ok(booking)
    }

    fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, StoreError> {
        let state = self.lock()?;
        Ok(state.bookings.get(id).cloned())
    }

    fn update_booking(&self, booking: Booking) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        if !state.bookings.contains_key(&booking.id) {
            return Err(StoreError::NotFound);
        }
        state.bookings.insert(booking.id.clone(), booking);
        Ok(())
    }

    fn awaiting_match(&self) -> Result<Vec<Booking>, StoreError> {
        let state = self.lock()?;
        let mut awaiting: Vec<Booking> = state
            .bookings
            .values()
            .filter(|booking| booking.status == BookingStatus::AwaitingMatch)
            .cloned()
            .collect();
        awaiting.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(awaiting)
    }

    fn slot_status(&self, key: &SlotKey) -> Result<SlotStatus, StoreError> {
        let state = self.lock()?;
        Ok(state
            .slots
            .get(key)
            .cloned()
            .unwrap_or(SlotStatus::Available))
    }

    fn put_slot_status(&self, key: SlotKey, status: SlotStatus) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.slots.insert(key, status);
        Ok(())
    }

    fn fetch_promo(&self, code: &str) -> Result<Option<PromoCode>, StoreError> {
        let state = self.lock()?;
        Ok(state.promos.get(code).cloned())
    }

    fn upsert_promo(&self, promo: PromoCode) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.promos.insert(promo.code.clone(), promo);
        Ok(())
    }

    fn redeem_promo(&self, code: &str, now: DateTime<Utc>) -> Result<PromoCode, RedeemError> {
        let mut state = self.lock()?;
        let record = state
            .promos
            .get_mut(code)
            .ok_or_else(|| PromoError::NotFound(code.to_string()))?;

        promo::validate(record, now)?;
        record.used += 1;
        Ok(record.clone())
    }

    fn record_dismissal(
        &self,
        provider_id: &ProviderId,
        booking_id: &BookingId,
    ) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state
            .dismissals
            .entry(provider_id.clone())
            .or_default()
            .insert(booking_id.clone());
        Ok(())
    }

    fn dismissals(&self, provider_id: &ProviderId) -> Result<BTreeSet<BookingId>, StoreError> {
        let state = self.lock()?;
        Ok(state.dismissals.get(provider_id).cloned().unwrap_or_default())
    }

    fn commit_acceptance(
        &self,
        booking_id: &BookingId,
        provider_id: &ProviderId,
        chosen: CandidateSlot,
        at: DateTime<Utc>,
    ) -> Result<Booking, CommitError> {
        let mut state = self.lock()?;

        let booking = state
            .bookings
            .get(booking_id)
            .ok_or(CommitError::BookingNotFound)?;
        if booking.status != BookingStatus::AwaitingMatch {
            return Err(CommitError::StatusConflict {
                status: booking.status,
            });
        }

        let key = SlotKey {
            provider_id: provider_id.clone(),
            date: chosen.date,
            slot: chosen.slot,
        };
        let slot = state
            .slots
            .get(&key)
            .cloned()
            .unwrap_or(SlotStatus::Available);
        if slot != SlotStatus::Available {
            return Err(CommitError::SlotConflict {
                date: chosen.date,
                slot: chosen.slot,
                status: slot,
            });
        }

        // Both guards held under the one lock; apply the pair.
        let booking = state
            .bookings
            .get_mut(booking_id)
            .ok_or(CommitError::BookingNotFound)?;
        booking
            .transition(BookingStatus::Matched, at)
            .map_err(|err| CommitError::StatusConflict { status: err.from })?;
        booking.assigned_provider_id = Some(provider_id.clone());
        booking.scheduled_slot = Some(chosen);
        let committed = booking.clone();

        state.slots.insert(
            key,
            SlotStatus::Booked {
                booking_id: booking_id.clone(),
            },
        );

        Ok(committed)
    }

    fn cancel_booking(
        &self,
        booking_id: &BookingId,
        at: DateTime<Utc>,
    ) -> Result<Booking, CommitError> {
        let mut state = self.lock()?;

        let booking = state
            .bookings
            .get_mut(booking_id)
            .ok_or(CommitError::BookingNotFound)?;
        booking
            .transition(BookingStatus::Cancelled, at)
            .map_err(|err| CommitError::StatusConflict { status: err.from })?;

        let booked_key = match (&booking.assigned_provider_id, booking.scheduled_slot) {
            (Some(provider_id), Some(chosen)) => Some(SlotKey {
                provider_id: provider_id.clone(),
                date: chosen.date,
                slot: chosen.slot,
            }),
            _ => None,
        };
        let cancelled = booking.clone();

        if let Some(key) = booked_key {
            let owned_by_booking = matches!(
                state.slots.get(&key),
                Some(SlotStatus::Booked { booking_id: owner }) if owner == booking_id
            );
            if owned_by_booking {
                state.slots.insert(key, SlotStatus::Available);
            }
        }

        Ok(cancelled)
    }
}

#[derive(Default)]
struct DirectoryState {
    properties: HashMap<PropertyId, Property>,
    providers: HashMap<ProviderId, Provider>,
}

/// In-memory directory of the platform-owned provider and property
/// records, for tests and the demo server.
#[derive(Default)]
pub struct MemoryDirectory {
    state: Mutex<DirectoryState>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_property(&self, property: Property) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.properties.insert(property.id.clone(), property);
        Ok(())
    }

    pub fn upsert_provider(&self, provider: Provider) -> Result<(), StoreError> {
        let mut state = self.lock()?;
        state.providers.insert(provider.id.clone(), provider);
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, DirectoryState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("directory mutex poisoned".to_string()))
    }
}

impl ProviderDirectory for MemoryDirectory {
    fn property(&self, id: &PropertyId) -> Result<Option<Property>, StoreError> {
        let state = self.lock()?;
        Ok(state.properties.get(id).cloned())
    }

    fn provider(&self, id: &ProviderId) -> Result<Option<Provider>, StoreError> {
        let state = self.lock()?;
        Ok(state.providers.get(id).cloned())
    }

    fn active_providers(&self) -> Result<Vec<Provider>, StoreError> {
        let state = self.lock()?;
        let mut active: Vec<Provider> = state
            .providers
            .values()
            .filter(|provider| provider.status == ProviderStatus::Active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(active)
    }
}
