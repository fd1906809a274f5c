use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Provider error codes
// ============================================================================

pub const CODE_OFFER_NO_LONGER_AVAILABLE: &str = "offer_no_longer_available";
pub const CODE_INSTANT_PAYMENT_REQUIRED: &str = "instant_payment_required";
pub const CODE_CARD_PAYMENTS_NOT_ENABLED: &str = "card_payments_not_enabled";

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider rejected the request ({code}): {message}")]
    Api { code: String, message: String },

    #[error("Provider transport failure: {0}")]
    Transport(String),

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("Provider request timed out")]
    Timeout,
}

impl ProviderError {
    /// The stable provider error code, if the provider returned one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ProviderError::Api { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

// ============================================================================
// Offer
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Offer {
    pub id: String,
    pub total_amount: String,
    pub total_currency: String,
    pub expires_at: Option<DateTime<Utc>>,
    pub payment_requirements: OfferPaymentRequirements,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OfferPaymentRequirements {
    #[serde(default)]
    pub requires_instant_payment: bool,
    pub payment_required_by: Option<DateTime<Utc>>,
    pub price_guarantee_expires_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Order
// ============================================================================

/// One passenger as sent to the provider when creating an order. Titles are
/// always derived at submission time; `infant_ref` points at the index of the
/// lap infant attached to an adult.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassengerPayload {
    pub title: String,
    pub given_name: String,
    pub family_name: String,
    pub gender: String,
    pub born_on: NaiveDate,
    #[serde(rename = "type")]
    pub passenger_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infant_ref: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub offer_id: String,
    pub passengers: Vec<PassengerPayload>,
    /// Pay-later hold; the order is created without immediate payment.
    pub hold: bool,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TravelDocument {
    pub unique_identifier: String,
    #[serde(rename = "type")]
    pub document_type: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderPaymentStatus {
    #[serde(default)]
    pub awaiting_payment: bool,
    pub payment_required_by: Option<DateTime<Utc>>,
    pub price_guarantee_expires_at: Option<DateTime<Utc>>,
}

/// The authoritative remote order. `total_amount` is the provider's own cost
/// for the itinerary; the customer-facing price (and therefore the markup)
/// lives on the local booking only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteOrder {
    pub id: String,
    /// Airline booking reference (PNR).
    pub booking_reference: Option<String>,
    pub total_amount: String,
    pub total_currency: String,
    #[serde(default)]
    pub live_mode: bool,
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub documents: Vec<TravelDocument>,
    #[serde(default)]
    pub payment_status: OrderPaymentStatus,
}

// ============================================================================
// Card tokenization / payment intents
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TokenizeCardRequest {
    pub number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub cvc: String,
    pub cardholder_name: String,
    /// Single-use unless explicitly marked reusable.
    pub multi_use: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardToken {
    pub id: String,
    #[serde(default)]
    pub live_mode: bool,
    pub brand: Option<String>,
    pub last_4_digits: Option<String>,
    #[serde(default)]
    pub three_d_secure_required: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentIntentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String,
    pub amount: String,
    pub currency: String,
    pub status: PaymentIntentStatus,
    /// Token handed to the client SDK to render the 3DS challenge.
    pub client_token: Option<String>,
}

// ============================================================================
// Payment execution
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentMethod {
    Balance,
    Card {
        number: String,
        expiry_month: String,
        expiry_year: String,
        cardholder_name: String,
        cvc: String,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: String,
    pub currency: String,
    pub method: PaymentMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub amount: String,
    pub currency: String,
}

// ============================================================================
// Port
// ============================================================================

/// Outbound port to the flight-inventory/booking provider. All calls carry
/// bearer-token authentication at the adapter; issuance-side calls are
/// idempotency-sensitive at the call site and must not be re-invoked blindly.
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// Re-fetch a fare offer to confirm it is still purchasable.
    async fn get_offer(&self, offer_id: &str) -> Result<Offer, ProviderError>;

    /// Create a held (pay-later) order for the given offer and passengers.
    async fn create_order(&self, req: &CreateOrderRequest) -> Result<RemoteOrder, ProviderError>;

    /// Retrieve the authoritative order state.
    async fn get_order(&self, order_id: &str) -> Result<RemoteOrder, ProviderError>;

    /// Exchange raw card data for a vault token.
    async fn tokenize_card(&self, req: &TokenizeCardRequest) -> Result<CardToken, ProviderError>;

    async fn create_payment_intent(
        &self,
        amount: &str,
        currency: &str,
    ) -> Result<PaymentIntent, ProviderError>;

    async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProviderError>;

    /// Confirm an intent with a card token. For 3DS cards the provider is
    /// expected to fail this call with a requires-action signal.
    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        card_token: &str,
    ) -> Result<PaymentIntent, ProviderError>;

    /// Execute a charge against a held order.
    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentRecord, ProviderError>;
}
