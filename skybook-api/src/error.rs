use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use skybook_booking::repository::StoreError;
use skybook_booking::BookingError;

#[derive(Debug)]
pub enum AppError {
    Booking(BookingError),
    AuthenticationError(String),
    AuthorizationError(String),
    NotFoundError(String),
    InternalServerError(String),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        AppError::Booking(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Booking(BookingError::Store(err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            AppError::Booking(err) => booking_response(err),
            AppError::AuthenticationError(msg) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg)
            }
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}

/// The caller always sees a stable code and a human message; storage and
/// decryption internals are logged server-side and surfaced generically.
fn booking_response(err: BookingError) -> (StatusCode, &'static str, String) {
    let code = err.code();
    match &err {
        BookingError::OfferExpired => (StatusCode::GONE, code, err.to_string()),
        BookingError::InstantPaymentRequired => {
            (StatusCode::UNPROCESSABLE_ENTITY, code, err.to_string())
        }
        BookingError::Validation(_) => (StatusCode::BAD_REQUEST, code, err.to_string()),
        BookingError::DuplicateReference(_) => (StatusCode::CONFLICT, code, err.to_string()),
        BookingError::NotFound(_) => (StatusCode::NOT_FOUND, code, err.to_string()),
        BookingError::CardDataMissing(_) => (StatusCode::BAD_REQUEST, code, err.to_string()),
        BookingError::DecryptionFailed => (
            StatusCode::INTERNAL_SERVER_ERROR,
            code,
            "Unable to process stored payment data".to_string(),
        ),
        BookingError::VaultFeatureUnavailable => (StatusCode::BAD_GATEWAY, code, err.to_string()),
        BookingError::TokenizationFailed(_) => (StatusCode::BAD_GATEWAY, code, err.to_string()),
        BookingError::IntentCreationFailed(_) => (StatusCode::BAD_GATEWAY, code, err.to_string()),
        BookingError::PaymentFailed(_) => (StatusCode::PAYMENT_REQUIRED, code, err.to_string()),
        BookingError::RetryLimitExceeded => (StatusCode::CONFLICT, code, err.to_string()),
        BookingError::TooManyRequests => (StatusCode::TOO_MANY_REQUESTS, code, err.to_string()),
        BookingError::Provider(e) => {
            tracing::error!("Provider error surfaced to caller: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                code,
                "The booking provider rejected the request".to_string(),
            )
        }
        BookingError::Store(e) => {
            tracing::error!("Storage error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                code,
                "Internal server error".to_string(),
            )
        }
    }
}
