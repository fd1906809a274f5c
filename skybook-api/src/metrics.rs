use axum::extract::State;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub tickets_issued: IntCounter,
    pub payments_failed: IntCounter,
    pub reconciliation_runs: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_created = IntCounter::new(
            "skybook_bookings_created_total",
            "Bookings successfully held with the provider",
        )
        .expect("counter definition");
        let tickets_issued = IntCounter::new(
            "skybook_tickets_issued_total",
            "Bookings that reached ISSUED",
        )
        .expect("counter definition");
        let payments_failed = IntCounter::new(
            "skybook_payments_failed_total",
            "Failed payment attempts recorded against the retry ceiling",
        )
        .expect("counter definition");
        let reconciliation_runs = IntCounter::new(
            "skybook_reconciliation_runs_total",
            "Read-path reconciliation passes",
        )
        .expect("counter definition");

        registry
            .register(Box::new(bookings_created.clone()))
            .expect("counter registration");
        registry
            .register(Box::new(tickets_issued.clone()))
            .expect("counter registration");
        registry
            .register(Box::new(payments_failed.clone()))
            .expect("counter registration");
        registry
            .register(Box::new(reconciliation_runs.clone()))
            .expect("counter registration");

        Self {
            registry,
            bookings_created,
            tickets_issued,
            payments_failed,
            reconciliation_runs,
        }
    }

    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("Failed to encode metrics: {}", e);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// GET /metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.metrics.render()
}
