use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::engine::availability::AvailabilityPolicy;
use crate::engine::dispatch::{BookingRequest, OfferDispatcher};
use crate::engine::domain::{
    AddOnLine, Address, Booking, BookingId, BookingStatus, CandidateSlot, CustomerId, Discount,
    PriceBreakdown, PromoCode, Property, PropertyId, Provider, ProviderId, ProviderStatus,
    ServiceTypeId, ShiftSlot,
};
use crate::engine::matching::MatchingConfig;
use crate::engine::pricing::{PricingConfig, PricingEngine, ServiceCatalog};
use crate::engine::store::{
    FulfillmentStore, MatchNotice, MemoryDirectory, MemoryStore, NotificationSink, NotifyError,
    OfferNotice,
};

/// The engine is handed explicit instants everywhere; tests capture a
/// single `now()` wherever instant equality matters.
pub(super) fn now() -> DateTime<Utc> {
    Utc::now()
}

pub(super) fn today() -> NaiveDate {
    now().date_naive()
}

pub(super) fn date(offset_days: i64) -> NaiveDate {
    today() + Duration::days(offset_days)
}

pub(super) fn pricing_config() -> PricingConfig {
    PricingConfig::standard()
}

pub(super) fn pricing_engine() -> PricingEngine {
    PricingEngine::new(ServiceCatalog::standard(), pricing_config())
}

pub(super) fn property() -> Property {
    property_with(2_000, "Des Moines", false)
}

pub(super) fn property_with(square_feet: u32, city: &str, has_pets: bool) -> Property {
    Property {
        id: PropertyId("prop-1".to_string()),
        owner_id: CustomerId("cust-1".to_string()),
        square_feet,
        bedrooms: 3,
        bathrooms: 2,
        has_pets,
        address: Address {
            street: "819 High St".to_string(),
            city: city.to_string(),
            state: "IA".to_string(),
            zip: "50309".to_string(),
            lat: 41.5868,
            lng: -93.6250,
        },
    }
}

/// Provider colocated with the test property; tests adjust fields to push
/// it out of range, off the service, or off active status.
pub(super) fn provider(id: &str) -> Provider {
    provider_at(id, 41.5868, -93.6250)
}

pub(super) fn provider_at(id: &str, lat: f64, lng: f64) -> Provider {
    Provider {
        id: ProviderId(id.to_string()),
        user_id: format!("user-{id}"),
        status: ProviderStatus::Active,
        base_lat: lat,
        base_lng: lng,
        service_radius_miles: 15.0,
        service_type_ids: vec![
            ServiceTypeId("standard".to_string()),
            ServiceTypeId("deep".to_string()),
        ],
        rating: 4.8,
    }
}

pub(super) fn promo(code: &str) -> PromoCode {
    PromoCode {
        code: code.to_string(),
        discount: Discount::Percentage(10),
        minimum_order_cents: 10_000,
        expires_at: now() + Duration::days(30),
        max_uses: 100,
        used: 0,
    }
}

pub(super) fn candidate_slots() -> Vec<CandidateSlot> {
    vec![
        CandidateSlot {
            date: date(3),
            slot: ShiftSlot::Morning,
        },
        CandidateSlot {
            date: date(4),
            slot: ShiftSlot::Afternoon,
        },
    ]
}

pub(super) fn booking_request() -> BookingRequest {
    BookingRequest {
        customer_id: CustomerId("cust-1".to_string()),
        property_id: PropertyId("prop-1".to_string()),
        service_type_id: ServiceTypeId("standard".to_string()),
        add_on_ids: Vec::new(),
        candidate_slots: candidate_slots(),
        notes: None,
        promo_code: None,
        payment_authorization: "auth-token-1".to_string(),
    }
}

/// Hand-built breakdown for state-machine tests that never touch pricing.
pub(super) fn breakdown() -> PriceBreakdown {
    PriceBreakdown {
        service_type_id: ServiceTypeId("standard".to_string()),
        metro_multiplier: 1.0,
        pet_surcharge_cents: 0,
        base_cents: 20_000,
        add_ons: Vec::<AddOnLine>::new(),
        subtotal_cents: 20_000,
        tax_cents: 1_600,
        discount_cents: 0,
        total_cents: 21_600,
        promo: None,
    }
}

pub(super) fn booking_in(status: BookingStatus) -> Booking {
    Booking {
        id: BookingId("bkg-test-1".to_string()),
        customer_id: CustomerId("cust-1".to_string()),
        property_id: PropertyId("prop-1".to_string()),
        service_type_id: ServiceTypeId("standard".to_string()),
        add_on_ids: Vec::new(),
        candidate_slots: candidate_slots(),
        notes: None,
        pricing: breakdown(),
        promo_code: None,
        assigned_provider_id: None,
        scheduled_slot: None,
        status,
        created_at: now(),
        matched_at: None,
        started_at: None,
        completed_at: None,
    }
}

#[derive(Default)]
pub(super) struct RecordingSink {
    offers: Mutex<Vec<OfferNotice>>,
    matches: Mutex<Vec<MatchNotice>>,
}

impl RecordingSink {
    pub(super) fn offers(&self) -> Vec<OfferNotice> {
        self.offers.lock().expect("sink mutex poisoned").clone()
    }

    pub(super) fn matches(&self) -> Vec<MatchNotice> {
        self.matches.lock().expect("sink mutex poisoned").clone()
    }
}

impl NotificationSink for RecordingSink {
    fn offer_broadcast(&self, notice: OfferNotice) -> Result<(), NotifyError> {
        self.offers
            .lock()
            .expect("sink mutex poisoned")
            .push(notice);
        Ok(())
    }

    fn match_confirmed(&self, notice: MatchNotice) -> Result<(), NotifyError> {
        self.matches
            .lock()
            .expect("sink mutex poisoned")
            .push(notice);
        Ok(())
    }
}

/// Sink whose transport is always down, for best-effort assertions.
pub(super) struct FailingSink;

impl NotificationSink for FailingSink {
    fn offer_broadcast(&self, _notice: OfferNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway offline".to_string()))
    }

    fn match_confirmed(&self, _notice: MatchNotice) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("push gateway offline".to_string()))
    }
}

pub(super) type TestDispatcher = OfferDispatcher<MemoryStore, MemoryDirectory, RecordingSink>;

pub(super) fn build_dispatcher() -> (
    Arc<TestDispatcher>,
    Arc<MemoryStore>,
    Arc<MemoryDirectory>,
    Arc<RecordingSink>,
) {
    let store = Arc::new(MemoryStore::new());
    let directory = Arc::new(MemoryDirectory::new());
    let sink = Arc::new(RecordingSink::default());

    directory
        .upsert_property(property())
        .expect("seed property");
    directory
        .upsert_provider(provider("cleaner-a"))
        .expect("seed provider a");
    directory
        .upsert_provider(provider("cleaner-b"))
        .expect("seed provider b");

    let dispatcher = Arc::new(build_with_sink(
        store.clone(),
        directory.clone(),
        sink.clone(),
    ));
    (dispatcher, store, directory, sink)
}

pub(super) fn build_with_sink<N: NotificationSink + 'static>(
    store: Arc<MemoryStore>,
    directory: Arc<MemoryDirectory>,
    sink: Arc<N>,
) -> OfferDispatcher<MemoryStore, MemoryDirectory, N> {
    OfferDispatcher::new(
        store,
        directory,
        sink,
        pricing_engine(),
        MatchingConfig::default(),
        AvailabilityPolicy::default(),
        30,
    )
}

/// Place and broadcast a default booking, returning the awaiting-match
/// record.
pub(super) fn broadcast_booking(dispatcher: &TestDispatcher, store: &MemoryStore) -> Booking {
    let placed = dispatcher
        .place(booking_request(), now())
        .expect("booking places");
    dispatcher
        .broadcast(&placed.id, now())
        .expect("booking broadcasts");
    store
        .fetch_booking(&placed.id)
        .expect("fetch succeeds")
        .expect("booking present")
}
