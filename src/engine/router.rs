use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Router,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use serde_json::json;

use super::availability::{AvailabilityError, SlotToggle};
use super::dispatch::{
    AcceptError, BookingRequest, BookingView, BroadcastError, JobEvent, OfferDispatcher,
    OfferFeedError, PlaceError, ProgressError, QuoteRequest,
};
use super::domain::{BookingId, CandidateSlot, ProviderId, ShiftSlot};
use super::store::{
    CommitError, FulfillmentStore, NotificationSink, ProviderDirectory, StoreError,
};

/// Router builder exposing the fulfillment engine over HTTP.
pub fn fulfillment_router<S, D, N>(dispatcher: Arc<OfferDispatcher<S, D, N>>) -> Router
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    Router::new()
        .route("/api/v1/quotes", post(quote_handler::<S, D, N>))
        .route("/api/v1/bookings", post(place_handler::<S, D, N>))
        .route(
            "/api/v1/bookings/:booking_id",
            get(booking_handler::<S, D, N>),
        )
        .route(
            "/api/v1/bookings/:booking_id/broadcast",
            post(broadcast_handler::<S, D, N>),
        )
        .route(
            "/api/v1/bookings/:booking_id/accept",
            post(accept_handler::<S, D, N>),
        )
        .route(
            "/api/v1/bookings/:booking_id/cancel",
            post(cancel_handler::<S, D, N>),
        )
        .route(
            "/api/v1/bookings/:booking_id/events",
            post(progress_handler::<S, D, N>),
        )
        .route(
            "/api/v1/providers/:provider_id/offers",
            get(offers_handler::<S, D, N>),
        )
        .route(
            "/api/v1/providers/:provider_id/offers/:booking_id/decline",
            post(decline_handler::<S, D, N>),
        )
        .route(
            "/api/v1/providers/:provider_id/availability",
            put(availability_handler::<S, D, N>),
        )
        .with_state(dispatcher)
}

fn error_payload(status: StatusCode, message: String) -> Response {
    (status, axum::Json(json!({ "error": message }))).into_response()
}

pub(crate) async fn quote_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    axum::Json(request): axum::Json<QuoteRequest>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    match dispatcher.quote(&request, Utc::now()) {
        Ok(breakdown) => (StatusCode::OK, axum::Json(breakdown)).into_response(),
        Err(err) => place_error_response(err),
    }
}

pub(crate) async fn place_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    axum::Json(request): axum::Json<BookingRequest>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    match dispatcher.place(request, Utc::now()) {
        Ok(booking) => {
            (StatusCode::ACCEPTED, axum::Json(BookingView::from(&booking))).into_response()
        }
        Err(err) => place_error_response(err),
    }
}

fn place_error_response(err: PlaceError) -> Response {
    match err {
        PlaceError::Store(inner) => store_error_response(inner),
        other => error_payload(StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    }
}

pub(crate) async fn booking_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(booking_id): Path<String>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = BookingId(booking_id);
    match dispatcher.booking(&id) {
        Ok(Some(booking)) => (StatusCode::OK, axum::Json(BookingView::from(&booking))).into_response(),
        Ok(None) => error_payload(
            StatusCode::NOT_FOUND,
            format!("booking '{}' not found", id.0),
        ),
        Err(err) => store_error_response(err),
    }
}

pub(crate) async fn broadcast_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(booking_id): Path<String>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = BookingId(booking_id);
    match dispatcher.broadcast(&id, Utc::now()) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(BroadcastError::NotFound) => {
            error_payload(StatusCode::NOT_FOUND, "booking not found".to_string())
        }
        Err(err @ BroadcastError::NotBroadcastable { .. }) => {
            error_payload(StatusCode::CONFLICT, err.to_string())
        }
        Err(err @ BroadcastError::UnknownProperty(_)) => {
            error_payload(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(BroadcastError::Store(inner)) => store_error_response(inner),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct AcceptRequest {
    pub(crate) provider_id: String,
    pub(crate) date: NaiveDate,
    pub(crate) slot: ShiftSlot,
}

pub(crate) async fn accept_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<AcceptRequest>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = BookingId(booking_id);
    let provider_id = ProviderId(request.provider_id);
    let chosen = CandidateSlot {
        date: request.date,
        slot: request.slot,
    };

    match dispatcher.accept(&id, &provider_id, chosen, Utc::now()) {
        Ok(booking) => (StatusCode::OK, axum::Json(BookingView::from(&booking))).into_response(),
        Err(err @ (AcceptError::AlreadyMatched | AcceptError::SlotUnavailable { .. })) => {
            error_payload(StatusCode::CONFLICT, err.to_string())
        }
        Err(err @ (AcceptError::NotFound | AcceptError::UnknownProvider(_))) => {
            error_payload(StatusCode::NOT_FOUND, err.to_string())
        }
        Err(AcceptError::Store(inner)) => store_error_response(inner),
        Err(other) => error_payload(StatusCode::UNPROCESSABLE_ENTITY, other.to_string()),
    }
}

pub(crate) async fn cancel_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(booking_id): Path<String>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = BookingId(booking_id);
    match dispatcher.cancel(&id, Utc::now()) {
        Ok(booking) => (StatusCode::OK, axum::Json(BookingView::from(&booking))).into_response(),
        Err(CommitError::BookingNotFound) => {
            error_payload(StatusCode::NOT_FOUND, "booking not found".to_string())
        }
        Err(err @ CommitError::StatusConflict { .. }) => {
            error_payload(StatusCode::CONFLICT, err.to_string())
        }
        Err(CommitError::Store(inner)) => store_error_response(inner),
        Err(other) => error_payload(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ProgressRequest {
    pub(crate) event: JobEvent,
}

pub(crate) async fn progress_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(booking_id): Path<String>,
    axum::Json(request): axum::Json<ProgressRequest>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = BookingId(booking_id);
    match dispatcher.record_event(&id, request.event, Utc::now()) {
        Ok(booking) => (StatusCode::OK, axum::Json(BookingView::from(&booking))).into_response(),
        Err(ProgressError::NotFound) => {
            error_payload(StatusCode::NOT_FOUND, "booking not found".to_string())
        }
        Err(err @ ProgressError::Transition(_)) => {
            error_payload(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        Err(ProgressError::Store(inner)) => store_error_response(inner),
    }
}

pub(crate) async fn offers_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(provider_id): Path<String>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = ProviderId(provider_id);
    match dispatcher.offers_for(&id, Utc::now()) {
        Ok(feed) => (StatusCode::OK, axum::Json(feed)).into_response(),
        Err(err @ OfferFeedError::UnknownProvider(_)) => {
            error_payload(StatusCode::NOT_FOUND, err.to_string())
        }
        Err(OfferFeedError::Store(inner)) => store_error_response(inner),
        Err(err @ OfferFeedError::Availability(_)) => {
            error_payload(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

pub(crate) async fn decline_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path((provider_id, booking_id)): Path<(String, String)>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    match dispatcher.decline(&ProviderId(provider_id), &BookingId(booking_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// Single-slot toggle when `slot` is present, otherwise a bulk toggle
/// covering every shift of `days` consecutive dates.
#[derive(Debug, Deserialize)]
pub(crate) struct AvailabilityRequest {
    pub(crate) date: NaiveDate,
    #[serde(default)]
    pub(crate) slot: Option<ShiftSlot>,
    #[serde(default)]
    pub(crate) days: Option<u32>,
    pub(crate) status: SlotToggle,
}

pub(crate) async fn availability_handler<S, D, N>(
    State(dispatcher): State<Arc<OfferDispatcher<S, D, N>>>,
    Path(provider_id): Path<String>,
    axum::Json(request): axum::Json<AvailabilityRequest>,
) -> Response
where
    S: FulfillmentStore + 'static,
    D: ProviderDirectory + 'static,
    N: NotificationSink + 'static,
{
    let id = ProviderId(provider_id);
    let today = Utc::now().date_naive();
    let ledger = dispatcher.availability();

    match request.slot {
        Some(slot) => {
            match ledger.set_status(&id, request.date, slot, request.status, today) {
                Ok(()) => (
                    StatusCode::OK,
                    axum::Json(json!({ "applied": 1, "skipped_booked": [] })),
                )
                    .into_response(),
                Err(err) => availability_error_response(err),
            }
        }
        None => {
            let days = request.days.unwrap_or(1);
            match ledger.set_range(&id, request.date, days, request.status, today) {
                Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
                Err(err) => availability_error_response(err),
            }
        }
    }
}

fn availability_error_response(err: AvailabilityError) -> Response {
    match err {
        AvailabilityError::CannotModifyBookedSlot { .. } => {
            error_payload(StatusCode::CONFLICT, err.to_string())
        }
        AvailabilityError::PastDate(_) | AvailabilityError::OutOfHorizon { .. } => {
            error_payload(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        AvailabilityError::Store(inner) => store_error_response(inner),
    }
}

fn store_error_response(err: StoreError) -> Response {
    let status = match err {
        StoreError::Conflict => StatusCode::CONFLICT,
        StoreError::NotFound => StatusCode::NOT_FOUND,
        StoreError::Unavailable(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_payload(status, err.to_string())
}
