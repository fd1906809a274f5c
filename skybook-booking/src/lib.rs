pub mod intake;
pub mod issue;
pub mod mock;
pub mod models;
pub mod passenger;
pub mod rate_limit;
pub mod reconcile;
pub mod reference;
pub mod repository;
pub mod tokenize;
pub mod vault;

use skybook_core::provider::ProviderError;
use uuid::Uuid;

/// Engine-level error taxonomy. Terminal user-facing conditions are never
/// retried automatically; payment failures are bounded by the per-booking
/// retry ceiling.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("The selected offer is no longer available")]
    OfferExpired,

    #[error("The selected offer requires instant payment and cannot be held")]
    InstantPaymentRequired,

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Booking reference already exists: {0}")]
    DuplicateReference(String),

    #[error("Booking not found: {0}")]
    NotFound(Uuid),

    #[error("No card data on file for booking {0}")]
    CardDataMissing(Uuid),

    #[error("Stored card data could not be decrypted")]
    DecryptionFailed,

    #[error("Card payments are not enabled for this provider account")]
    VaultFeatureUnavailable,

    #[error("Card tokenization failed: {0}")]
    TokenizationFailed(String),

    #[error("Payment intent creation failed: {0}")]
    IntentCreationFailed(String),

    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    #[error("Payment attempt limit reached, please contact support")]
    RetryLimitExceeded,

    #[error("Too many requests")]
    TooManyRequests,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Store(#[from] repository::StoreError),
}

impl BookingError {
    /// Stable machine-readable code surfaced at the API boundary.
    pub fn code(&self) -> &'static str {
        match self {
            BookingError::OfferExpired => "OFFER_EXPIRED",
            BookingError::InstantPaymentRequired => "INSTANT_PAYMENT_REQUIRED",
            BookingError::Validation(_) => "VALIDATION_ERROR",
            BookingError::DuplicateReference(_) => "DUPLICATE_REFERENCE",
            BookingError::NotFound(_) => "NOT_FOUND",
            BookingError::CardDataMissing(_) => "CARD_DATA_MISSING",
            BookingError::DecryptionFailed => "DECRYPTION_FAILED",
            BookingError::VaultFeatureUnavailable => "VAULT_FEATURE_UNAVAILABLE",
            BookingError::TokenizationFailed(_) => "TOKENIZATION_FAILED",
            BookingError::IntentCreationFailed(_) => "INTENT_CREATION_FAILED",
            BookingError::PaymentFailed(_) => "PAYMENT_FAILED",
            BookingError::RetryLimitExceeded => "RETRY_LIMIT_EXCEEDED",
            BookingError::TooManyRequests => "TOO_MANY_REQUESTS",
            BookingError::Provider(_) => "PROVIDER_ERROR",
            BookingError::Store(_) => "INTERNAL_ERROR",
        }
    }
}
