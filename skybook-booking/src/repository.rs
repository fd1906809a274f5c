use crate::models::Booking;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Booking reference already exists: {0}")]
    Duplicate(String),

    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Port for the booking store. The unique index on `booking_reference` is the
/// actual uniqueness guarantee behind the reference generator; a conflict
/// surfaces as `Duplicate` so the intake can retry with a fresh reference.
#[async_trait]
pub trait BookingStore: Send + Sync {
    async fn create(&self, booking: &Booking) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError>;

    async fn update(&self, booking: &Booking) -> Result<(), StoreError>;

    /// Newest-first page plus the total row count.
    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Booking>, u64), StoreError>;
}
