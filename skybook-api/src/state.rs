use crate::metrics::Metrics;
use skybook_booking::intake::OrderIntake;
use skybook_booking::issue::TicketIssuer;
use skybook_booking::rate_limit::RateLimiter;
use skybook_booking::reconcile::ReconciliationSync;
use skybook_booking::repository::BookingStore;
use skybook_booking::tokenize::TokenizationGate;
use std::sync::Arc;

#[derive(Clone)]
pub struct AuthConfig {
    pub secret: String,
    pub expiration: u64,
}

#[derive(Clone)]
pub struct RateRules {
    pub booking_per_minute: u32,
    pub payment_per_minute: u32,
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BookingStore>,
    pub intake: Arc<OrderIntake>,
    pub gate: Arc<TokenizationGate>,
    pub issuer: Arc<TicketIssuer>,
    pub reconciler: Arc<ReconciliationSync>,
    pub limiter: Arc<RateLimiter>,
    pub auth: AuthConfig,
    pub rules: RateRules,
    pub metrics: Arc<Metrics>,
}
