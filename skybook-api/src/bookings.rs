use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use skybook_booking::intake::{BookingRequest, IntakeReceipt};
use skybook_booking::models::{Booking, ContactInfo, FlightDetails, Passenger};
use skybook_booking::BookingError;
use skybook_core::money;
use skybook_core::provider::TravelDocument;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct CreateBookingResponse {
    pub success: bool,
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub pnr: Option<String>,
    pub payment_deadline: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct PricingView {
    pub currency: String,
    pub total_amount: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

/// Read model for a booking. Card data never leaves the store through this
/// view; the effective status folds payment-deadline expiry in at read time.
#[derive(Debug, Serialize)]
pub struct BookingView {
    pub id: Uuid,
    pub booking_reference: String,
    pub offer_id: String,
    pub status: String,
    pub contact: ContactInfo,
    pub passengers: Vec<Passenger>,
    pub flight_details: FlightDetails,
    pub pricing: PricingView,
    pub duffel_order_id: Option<String>,
    pub pnr: Option<String>,
    pub documents: Vec<TravelDocument>,
    pub retry_count: u32,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub price_expiry: Option<DateTime<Utc>>,
    pub is_live_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingView {
    pub fn from_booking(booking: Booking) -> Self {
        let status = booking.effective_status(Utc::now()).to_string();
        Self {
            id: booking.id,
            booking_reference: booking.booking_reference,
            offer_id: booking.offer_id,
            status,
            contact: booking.contact,
            passengers: booking.passengers,
            flight_details: booking.flight_details,
            pricing: PricingView {
                currency: booking.pricing.currency,
                total_amount: money::format_minor(booking.pricing.total),
                base_amount: booking.pricing.base.map(money::format_minor),
                markup: booking.pricing.markup.map(money::format_minor),
            },
            duffel_order_id: booking.duffel_order_id,
            pnr: booking.pnr,
            documents: booking.documents,
            retry_count: booking.retry_count,
            payment_deadline: booking.payment_deadline,
            price_expiry: booking.price_expiry,
            is_live_mode: booking.is_live_mode,
            created_at: booking.created_at,
            updated_at: booking.updated_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    20
}

#[derive(Debug, Serialize)]
pub struct BookingListResponse {
    pub bookings: Vec<BookingView>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{id}", get(get_booking))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings
/// Run the order intake: validate offer and passengers, persist the
/// provisional row, create the remote hold.
async fn create_booking(
    State(state): State<AppState>,
    Json(req): Json<BookingRequest>,
) -> Result<Json<CreateBookingResponse>, AppError> {
    let receipt: IntakeReceipt = state.intake.create_booking(req).await?;
    state.metrics.bookings_created.inc();

    tracing::info!(
        booking_id = %receipt.booking_id,
        reference = %receipt.booking_reference,
        "Booking created"
    );

    Ok(Json(CreateBookingResponse {
        success: true,
        booking_id: receipt.booking_id,
        booking_reference: receipt.booking_reference,
        pnr: receipt.pnr,
        payment_deadline: receipt.payment_deadline,
    }))
}

/// GET /v1/bookings/{id}
/// Detail read; passes through reconciliation for in-flight bookings.
async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
) -> Result<Json<BookingView>, AppError> {
    let booking = state
        .store
        .get(booking_id)
        .await
        .map_err(BookingError::from)?
        .ok_or(BookingError::NotFound(booking_id))?;

    let booking = state.reconciler.sync_one(booking).await;
    state.metrics.reconciliation_runs.inc();

    Ok(Json(BookingView::from_booking(booking)))
}

/// GET /v1/bookings?page&limit
/// List read; reconciles the page with bounded fan-out.
async fn list_bookings(
    State(state): State<AppState>,
    Query(pagination): Query<Pagination>,
) -> Result<Json<BookingListResponse>, AppError> {
    let (bookings, total) = state
        .store
        .list(pagination.page, pagination.limit)
        .await
        .map_err(BookingError::from)?;

    let bookings = state.reconciler.sync_page(bookings).await;
    state.metrics.reconciliation_runs.inc();

    Ok(Json(BookingListResponse {
        bookings: bookings.into_iter().map(BookingView::from_booking).collect(),
        total,
        page: pagination.page,
        limit: pagination.limit,
    }))
}
