//! Booking fulfillment core: pricing, eligibility matching, the offer
//! lifecycle, and provider availability.
//!
//! Components are layered leaf-first: pure pricing and matching engines,
//! the availability ledger, and the `OfferDispatcher` facade that owns the
//! concurrency-critical acceptance path over the storage traits.

pub mod availability;
pub mod dispatch;
pub mod domain;
pub mod geo;
pub mod matching;
pub mod pricing;
pub mod router;
pub mod store;

#[cfg(test)]
mod tests;

pub use availability::{
    AvailabilityError, AvailabilityLedger, AvailabilityPolicy, BulkToggleOutcome, CalendarEntry,
    SkippedSlot, SlotToggle,
};
pub use dispatch::{
    AcceptError, BookingRequest, BookingView, BroadcastError, EligibleProviderView, JobEvent,
    OfferDispatcher, OfferFeedError, OfferView, PlaceError, ProgressError, ProviderOfferView,
    QuoteRequest,
};
pub use domain::{
    AddOn, AddOnId, AddOnLine, AddOnPricing, Address, Booking, BookingId, BookingStatus,
    CandidateSlot, CustomerId, Discount, PriceBreakdown, PromoCode, PromoLine, Property,
    PropertyId, Provider, ProviderId, ProviderStatus, ServiceType, ServiceTypeId, ShiftSlot,
    SlotKey, SlotStatus, TransitionError,
};
pub use matching::{EligibilityMatcher, MatchCandidate, MatchingConfig};
pub use pricing::{PricingConfig, PricingEngine, PromoError, QuoteError, ServiceCatalog};
pub use router::fulfillment_router;
pub use store::{
    CommitError, FulfillmentStore, MatchNotice, MemoryDirectory, MemoryStore, NotificationSink,
    NotifyError, OfferNotice, ProviderDirectory, RedeemError, StoreError, TracingNotifier,
};
