use axum::{
    extract::{Path, State},
    routing::post,
    Extension, Json, Router,
};
use serde::Deserialize;
use skybook_booking::models::BookingStatus;
use skybook_booking::BookingError;
use uuid::Uuid;

use crate::bookings::BookingView;
use crate::error::AppError;
use crate::middleware::auth::{admin_auth_middleware, AdminClaims};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ForceStatusRequest {
    pub status: BookingStatus,
    /// Mandatory audit note explaining the override.
    pub note: String,
}

pub fn routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/v1/admin/bookings/{id}/status", post(force_status))
        .layer(axum::middleware::from_fn_with_state(
            state,
            admin_auth_middleware,
        ))
}

/// POST /v1/admin/bookings/{id}/status
/// Admin override: the one path allowed to move a booking against the state
/// machine, always recorded in the audit trail.
async fn force_status(
    State(state): State<AppState>,
    Extension(claims): Extension<AdminClaims>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<ForceStatusRequest>,
) -> Result<Json<BookingView>, AppError> {
    if req.note.trim().is_empty() {
        return Err(BookingError::Validation("An audit note is required".to_string()).into());
    }

    let mut booking = state
        .store
        .get(booking_id)
        .await
        .map_err(BookingError::from)?
        .ok_or(BookingError::NotFound(booking_id))?;

    let previous = booking.status;
    booking.force_status(req.status, &claims.sub, &req.note);
    state.store.update(&booking).await.map_err(BookingError::from)?;

    tracing::info!(
        booking_id = %booking_id,
        admin = %claims.sub,
        from = %previous,
        to = %req.status,
        "Admin status override"
    );

    Ok(Json(BookingView::from_booking(booking)))
}
