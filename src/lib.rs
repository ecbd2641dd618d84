//! Booking fulfillment engine for a residential cleaning marketplace:
//! pricing, provider eligibility matching, the offer lifecycle, and
//! availability bookkeeping, with an axum HTTP surface on top.

pub mod config;
pub mod engine;
pub mod error;
pub mod telemetry;
