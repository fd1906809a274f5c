use crate::repository::BookingStore;
use crate::vault::CardVault;
use crate::BookingError;
use serde::Serialize;
use skybook_core::money;
use skybook_core::provider::{
    CODE_CARD_PAYMENTS_NOT_ENABLED, PaymentIntentStatus, ProviderApi, ProviderError,
    TokenizeCardRequest,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
pub enum TokenizeAction {
    #[serde(rename = "PROCEED_TO_PAY")]
    ProceedToPay,
    #[serde(rename = "SHOW_3DS_CHALLENGE")]
    Show3dsChallenge,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenizeOutcome {
    pub action: TokenizeAction,
    pub card_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub challenge_client_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_intent_id: Option<String>,
}

/// Decrypts the card on file, tokenizes it with the provider's card vault and
/// decides whether the client must complete a 3-D-Secure challenge before the
/// charge may run. The CVV is supplied per call and never stored.
pub struct TokenizationGate {
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn BookingStore>,
    vault: CardVault,
    /// Tokenization is synchronous from the customer's perspective, so the
    /// vault call gets an explicit short timeout.
    tokenize_timeout: Duration,
}

impl TokenizationGate {
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        store: Arc<dyn BookingStore>,
        vault: CardVault,
        tokenize_timeout: Duration,
    ) -> Self {
        Self {
            provider,
            store,
            vault,
            tokenize_timeout,
        }
    }

    pub async fn tokenize(
        &self,
        booking_id: Uuid,
        cvv: &str,
    ) -> Result<TokenizeOutcome, BookingError> {
        let booking = self
            .store
            .get(booking_id)
            .await?
            .ok_or(BookingError::NotFound(booking_id))?;

        let payment_info = booking
            .payment_info
            .as_ref()
            .ok_or(BookingError::CardDataMissing(booking_id))?;

        // An empty decryption result for a stored value means corrupt
        // ciphertext or a key mismatch. That is fatal and surfaced as such,
        // never silently treated as "no card on file".
        let number = self.vault.decrypt(payment_info.card_number.expose());
        if number.is_empty() {
            tracing::error!(booking_id = %booking_id, "Stored card data failed to decrypt");
            return Err(BookingError::DecryptionFailed);
        }

        let (expiry_month, expiry_year) = split_expiry(&payment_info.expiry_date)?;
        let token_req = TokenizeCardRequest {
            number,
            expiry_month,
            expiry_year,
            cvc: cvv.to_string(),
            cardholder_name: payment_info.card_name.clone(),
            multi_use: false,
        };

        let token = match tokio::time::timeout(
            self.tokenize_timeout,
            self.provider.tokenize_card(&token_req),
        )
        .await
        {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => return Err(map_tokenize_error(e)),
            Err(_) => {
                return Err(BookingError::TokenizationFailed(
                    "card vault request timed out".to_string(),
                ))
            }
        };

        if !token.three_d_secure_required {
            return Ok(TokenizeOutcome {
                action: TokenizeAction::ProceedToPay,
                card_token: token.id,
                challenge_client_token: None,
                payment_intent_id: None,
            });
        }

        // 3DS path: create an intent for the booking's charge amount and try
        // to confirm it with the token.
        let amount = money::format_minor(booking.pricing.total);
        let intent = self
            .provider
            .create_payment_intent(&amount, &booking.pricing.currency)
            .await
            .map_err(|e| BookingError::IntentCreationFailed(e.to_string()))?;

        match self
            .provider
            .confirm_payment_intent(&intent.id, &token.id)
            .await
        {
            Ok(confirmed) if confirmed.status == PaymentIntentStatus::RequiresAction => {
                Ok(TokenizeOutcome {
                    action: TokenizeAction::Show3dsChallenge,
                    card_token: token.id,
                    challenge_client_token: confirmed.client_token,
                    payment_intent_id: Some(confirmed.id),
                })
            }
            Ok(_) => Ok(TokenizeOutcome {
                action: TokenizeAction::ProceedToPay,
                card_token: token.id,
                challenge_client_token: None,
                payment_intent_id: Some(intent.id),
            }),
            Err(e) => {
                // A confirmation error is the expected 3DS signal. Re-fetch
                // the intent; only a pending challenge turns this into a
                // client-side action.
                let refreshed = self
                    .provider
                    .get_payment_intent(&intent.id)
                    .await
                    .map_err(|ge| BookingError::IntentCreationFailed(ge.to_string()))?;

                if refreshed.status == PaymentIntentStatus::RequiresAction {
                    Ok(TokenizeOutcome {
                        action: TokenizeAction::Show3dsChallenge,
                        card_token: token.id,
                        challenge_client_token: refreshed.client_token,
                        payment_intent_id: Some(refreshed.id),
                    })
                } else {
                    Err(BookingError::IntentCreationFailed(e.to_string()))
                }
            }
        }
    }
}

fn map_tokenize_error(err: ProviderError) -> BookingError {
    match err.code() {
        Some(CODE_CARD_PAYMENTS_NOT_ENABLED) => BookingError::VaultFeatureUnavailable,
        _ => BookingError::TokenizationFailed(err.to_string()),
    }
}

/// "MM/YY" (or "MM/YYYY") into month and year parts.
fn split_expiry(raw: &str) -> Result<(String, String), BookingError> {
    match raw.split_once('/') {
        Some((month, year)) if !month.is_empty() && !year.is_empty() => {
            Ok((month.trim().to_string(), year.trim().to_string()))
        }
        _ => Err(BookingError::Validation(format!(
            "Invalid card expiry date: {}",
            raw
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{InMemoryBookingStore, MockProvider};
    use crate::models::{
        Booking, BookingStatus, ContactInfo, FlightDetails, FlightType, PaymentInfo, Pricing,
    };
    use chrono::Utc;
    use skybook_shared::pii::Masked;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn vault() -> CardVault {
        CardVault::new(TEST_KEY).unwrap()
    }

    async fn held_booking(store: &InMemoryBookingStore, card_ciphertext: Option<String>) -> Uuid {
        let payment_info = card_ciphertext.map(|ct| PaymentInfo {
            card_name: "Ada Yilmaz".to_string(),
            card_number: Masked::new(ct),
            expiry_date: "11/29".to_string(),
            billing_address: None,
        });
        let mut booking = Booking::new(
            "SKY-260806-4821".to_string(),
            "off_1".to_string(),
            ContactInfo {
                email: "lead@example.com".to_string(),
                phone: "+14155550101".to_string(),
            },
            vec![],
            FlightDetails {
                airline: "Turkish Airlines".to_string(),
                flight_number: "TK1979".to_string(),
                route: "IST-JFK".to_string(),
                departure_date: Utc::now(),
                arrival_date: Utc::now(),
                duration: "10h 35m".to_string(),
                flight_type: FlightType::OneWay,
                logo_url: None,
            },
            Pricing {
                currency: "USD".to_string(),
                total: 50000,
                base: Some(43000),
                markup: Some(7000),
            },
            payment_info,
        );
        booking.duffel_order_id = Some("ord_1".to_string());
        booking.transition(BookingStatus::Held).unwrap();
        store.create(&booking).await.unwrap();
        booking.id
    }

    fn gate(provider: Arc<MockProvider>, store: Arc<InMemoryBookingStore>) -> TokenizationGate {
        TokenizationGate::new(provider, store, vault(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn plain_card_proceeds_to_pay() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&store, Some(vault().encrypt("4242424242424242"))).await;

        let outcome = gate(provider, store).tokenize(id, "123").await.unwrap();
        assert_eq!(outcome.action, TokenizeAction::ProceedToPay);
        assert!(outcome.card_token.starts_with("tok_"));
        assert!(outcome.challenge_client_token.is_none());
    }

    #[tokio::test]
    async fn three_ds_card_returns_challenge() {
        let provider = Arc::new(MockProvider::new());
        *provider.token_requires_3ds.lock().unwrap() = true;
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&store, Some(vault().encrypt("4242424242424242"))).await;

        let outcome = gate(provider, store).tokenize(id, "123").await.unwrap();
        assert_eq!(outcome.action, TokenizeAction::Show3dsChallenge);
        assert!(outcome.challenge_client_token.is_some());
        assert!(outcome.payment_intent_id.is_some());
    }

    #[tokio::test]
    async fn missing_card_is_distinct_from_decryption_failure() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&store, None).await;

        let err = gate(provider, store).tokenize(id, "123").await.unwrap_err();
        assert!(matches!(err, BookingError::CardDataMissing(_)));
    }

    #[tokio::test]
    async fn corrupt_ciphertext_is_fatal() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&store, Some("aabb:ccdd".to_string())).await;

        let err = gate(provider, store).tokenize(id, "123").await.unwrap_err();
        assert!(matches!(err, BookingError::DecryptionFailed));
    }

    #[tokio::test]
    async fn missing_card_feature_is_actionable() {
        let provider = Arc::new(MockProvider::new());
        *provider.fail_tokenize.lock().unwrap() = Some(ProviderError::Api {
            code: CODE_CARD_PAYMENTS_NOT_ENABLED.to_string(),
            message: "Account is not enabled for card payments".to_string(),
        });
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&store, Some(vault().encrypt("4242424242424242"))).await;

        let err = gate(provider, store).tokenize(id, "123").await.unwrap_err();
        assert!(matches!(err, BookingError::VaultFeatureUnavailable));
    }

    #[tokio::test]
    async fn generic_vault_failure_maps_to_tokenization_failed() {
        let provider = Arc::new(MockProvider::new());
        *provider.fail_tokenize.lock().unwrap() =
            Some(ProviderError::Transport("connection reset".to_string()));
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&store, Some(vault().encrypt("4242424242424242"))).await;

        let err = gate(provider, store).tokenize(id, "123").await.unwrap_err();
        assert!(matches!(err, BookingError::TokenizationFailed(_)));
    }

    #[test]
    fn expiry_split() {
        assert_eq!(
            split_expiry("11/29").unwrap(),
            ("11".to_string(), "29".to_string())
        );
        assert!(split_expiry("1129").is_err());
        assert!(split_expiry("/29").is_err());
    }
}
