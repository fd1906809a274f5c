use async_trait::async_trait;
use skybook_shared::models::events::BookingConfirmedEvent;

/// Outbound port for the fire-and-forget booking confirmation. Callers treat
/// delivery as best-effort: a failure is logged and must never fail the
/// booking itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn booking_confirmed(
        &self,
        event: &BookingConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
