use axum::{
    extract::{ConnectInfo, Request, State},
    http::Method,
    middleware::Next,
    response::{IntoResponse, Response},
};
use skybook_booking::BookingError;
use std::net::SocketAddr;

use crate::error::AppError;
use crate::state::AppState;

/// Per-endpoint-class abuse guard, keyed by client IP. Payment-side endpoints
/// (tokenize, issue) get the tight cap; booking creation the looser one. The
/// check runs before any business logic. When no connect-info is available
/// the caller is keyed as "unknown" rather than rejected.
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Response {
    let path = req.uri().path();

    let class = if path.contains("/card-token") || path.ends_with("/issue") {
        Some(("payment", state.rules.payment_per_minute))
    } else if path == "/v1/bookings" && req.method() == Method::POST {
        Some(("booking", state.rules.booking_per_minute))
    } else {
        None
    };

    if let Some((class, limit)) = class {
        let ip = req
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let key = format!("{}:{}", class, ip);

        if !state.limiter.check(&key, limit) {
            tracing::warn!(%key, "Rate limit exceeded");
            return AppError::from(BookingError::TooManyRequests).into_response();
        }
    }

    next.run(req).await
}
