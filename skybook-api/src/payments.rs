use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use skybook_booking::issue::{IssueOutcome, PaymentMethodChoice};
use skybook_booking::tokenize::TokenizeOutcome;
use skybook_booking::BookingError;
use skybook_shared::pii::Masked;
use uuid::Uuid;

use crate::error::AppError;
use crate::state::AppState;

// ============================================================================
// Request Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct TokenizeCardBody {
    pub cvv: Masked<String>,
}

#[derive(Debug, Deserialize)]
pub struct IssueTicketBody {
    pub payment_method: PaymentMethodChoice,
    pub cvv: Option<Masked<String>>,
}

// ============================================================================
// Routes
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{id}/card-token", post(tokenize_card))
        .route("/v1/bookings/{id}/issue", post(issue_ticket))
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /v1/bookings/{id}/card-token
/// Tokenize the card on file and decide whether a 3DS challenge is needed.
async fn tokenize_card(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<TokenizeCardBody>,
) -> Result<Json<TokenizeOutcome>, AppError> {
    let outcome = state.gate.tokenize(booking_id, body.cvv.expose()).await?;
    Ok(Json(outcome))
}

/// POST /v1/bookings/{id}/issue
/// Execute the charge and sync the issued travel documents.
async fn issue_ticket(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Json(body): Json<IssueTicketBody>,
) -> Result<Json<IssueOutcome>, AppError> {
    let cvv = body.cvv.as_ref().map(|c| c.expose().as_str());

    match state.issuer.issue(booking_id, body.payment_method, cvv).await {
        Ok(outcome) => {
            if outcome.status == skybook_booking::models::BookingStatus::Issued {
                state.metrics.tickets_issued.inc();
            }
            Ok(Json(outcome))
        }
        Err(err) => {
            if matches!(err, BookingError::PaymentFailed(_)) {
                state.metrics.payments_failed.inc();
            }
            Err(err.into())
        }
    }
}
