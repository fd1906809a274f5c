use crate::models::{Booking, BookingStatus, MAX_PAYMENT_ATTEMPTS};
use crate::repository::BookingStore;
use crate::vault::CardVault;
use crate::BookingError;
use serde::{Deserialize, Serialize};
use skybook_core::provider::{
    PaymentMethod, PaymentRequest, ProviderApi, RemoteOrder, TravelDocument,
};
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethodChoice {
    Balance,
    Card,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssueOutcome {
    pub status: BookingStatus,
    pub pnr: Option<String>,
    pub documents: Vec<TravelDocument>,
}

/// Executes the charge against a held order, bounded by the per-booking retry
/// ceiling. Double-charge protection rests on re-checking the remote order's
/// documents before charging, not on a lock.
pub struct TicketIssuer {
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn BookingStore>,
    vault: CardVault,
}

impl TicketIssuer {
    pub fn new(provider: Arc<dyn ProviderApi>, store: Arc<dyn BookingStore>, vault: CardVault) -> Self {
        Self {
            provider,
            store,
            vault,
        }
    }

    pub async fn issue(
        &self,
        booking_id: Uuid,
        method: PaymentMethodChoice,
        cvv: Option<&str>,
    ) -> Result<IssueOutcome, BookingError> {
        let mut booking = self
            .store
            .get(booking_id)
            .await?
            .ok_or(BookingError::NotFound(booking_id))?;

        // 1. Retry ceiling: past the limit, no provider call is made at all.
        if booking.retry_count >= MAX_PAYMENT_ATTEMPTS {
            return Err(BookingError::RetryLimitExceeded);
        }

        let order_id = booking
            .duffel_order_id
            .clone()
            .ok_or_else(|| BookingError::Validation("Booking has no remote order".to_string()))?;

        // 2. Fetch the authoritative order.
        let order = match self.provider.get_order(&order_id).await {
            Ok(order) => order,
            Err(e) => {
                let reason = e.to_string();
                self.record_failure(&mut booking, &reason).await?;
                return Err(BookingError::PaymentFailed(reason));
            }
        };

        // 3. The remote order died out-of-band: sync and stop.
        if order.cancelled_at.is_some() {
            if booking.status != BookingStatus::Cancelled {
                if let Err(t) = booking.transition(BookingStatus::Cancelled) {
                    tracing::error!(booking_id = %booking.id, error = %t, "Cancel sync rejected");
                }
                booking.push_note("system", "Remote order was cancelled before issuance");
                self.store.update(&booking).await?;
            }
            return Ok(IssueOutcome {
                status: BookingStatus::Cancelled,
                pnr: booking.pnr,
                documents: Vec::new(),
            });
        }

        // 4. Documents already issued (e.g. through a side channel): treat as
        //    idempotent success and never charge again.
        if !order.documents.is_empty() {
            booking.mark_issued(order.documents.clone(), order.booking_reference.clone());
            self.store.update(&booking).await?;
            return Ok(IssueOutcome {
                status: BookingStatus::Issued,
                pnr: booking.pnr,
                documents: booking.documents,
            });
        }

        // 5. Build the payment sized to the remote order's exact outstanding
        //    amount, never the locally cached customer price.
        let payment_method = match method {
            PaymentMethodChoice::Balance => PaymentMethod::Balance,
            PaymentMethodChoice::Card => self.card_payment_method(&booking, cvv)?,
        };
        let payment_req = PaymentRequest {
            order_id: order.id.clone(),
            amount: order.total_amount.clone(),
            currency: order.total_currency.clone(),
            method: payment_method,
        };

        if let Err(e) = self.provider.create_payment(&payment_req).await {
            let reason = e.to_string();
            self.record_failure(&mut booking, &reason).await?;
            return Err(BookingError::PaymentFailed(reason));
        }

        // 6. Re-fetch for the authoritative documents and PNR.
        let issued: RemoteOrder = match self.provider.get_order(&order_id).await {
            Ok(order) => order,
            Err(e) => {
                // The charge landed but the refresh did not; the next attempt
                // will find the documents and sync idempotently.
                let reason = format!("Order refresh after payment failed: {}", e);
                self.record_failure(&mut booking, &reason).await?;
                return Err(BookingError::PaymentFailed(reason));
            }
        };

        booking.mark_issued(issued.documents.clone(), issued.booking_reference.clone());
        self.store.update(&booking).await?;

        tracing::info!(booking_id = %booking.id, reference = %booking.booking_reference, "Tickets issued");

        Ok(IssueOutcome {
            status: BookingStatus::Issued,
            pnr: booking.pnr,
            documents: booking.documents,
        })
    }

    fn card_payment_method(
        &self,
        booking: &Booking,
        cvv: Option<&str>,
    ) -> Result<PaymentMethod, BookingError> {
        let cvv = cvv.ok_or_else(|| {
            BookingError::Validation("CVV is required for card payments".to_string())
        })?;
        let payment_info = booking
            .payment_info
            .as_ref()
            .ok_or(BookingError::CardDataMissing(booking.id))?;

        let number = self.vault.decrypt(payment_info.card_number.expose());
        if number.is_empty() {
            tracing::error!(booking_id = %booking.id, "Stored card data failed to decrypt");
            return Err(BookingError::DecryptionFailed);
        }

        let (expiry_month, expiry_year) =
            payment_info.expiry_date.split_once('/').ok_or_else(|| {
                BookingError::Validation(format!(
                    "Invalid card expiry date: {}",
                    payment_info.expiry_date
                ))
            })?;

        Ok(PaymentMethod::Card {
            number,
            expiry_month: expiry_month.trim().to_string(),
            expiry_year: expiry_year.trim().to_string(),
            cardholder_name: payment_info.card_name.clone(),
            cvc: cvv.to_string(),
        })
    }

    async fn record_failure(
        &self,
        booking: &mut Booking,
        reason: &str,
    ) -> Result<(), BookingError> {
        booking.record_payment_failure(reason);
        self.store.update(booking).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{InMemoryBookingStore, MockProvider};
    use crate::models::{ContactInfo, FlightDetails, FlightType, PaymentInfo, Pricing};
    use chrono::Utc;
    use skybook_core::provider::ProviderError;
    use skybook_shared::pii::Masked;
    use std::sync::atomic::Ordering;

    const TEST_KEY: &str = "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f";

    fn vault() -> CardVault {
        CardVault::new(TEST_KEY).unwrap()
    }

    /// Seed a held booking plus its matching remote order.
    async fn held_booking(provider: &MockProvider, store: &InMemoryBookingStore) -> Uuid {
        provider.seed_offer("off_1", "430.00", "USD");
        let order = provider
            .create_order(&skybook_core::provider::CreateOrderRequest {
                offer_id: "off_1".to_string(),
                passengers: vec![],
                hold: true,
                metadata: serde_json::json!({}),
            })
            .await
            .unwrap();

        let mut booking = Booking::new(
            "SKY-260806-7211".to_string(),
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
            Some(PaymentInfo {
                card_name: "Ada Yilmaz".to_string(),
                card_number: Masked::new(vault().encrypt("4242424242424242")),
                expiry_date: "11/29".to_string(),
                billing_address: None,
            }),
        );
        booking.duffel_order_id = Some(order.id);
        booking.pnr = order.booking_reference;
        booking.transition(BookingStatus::Held).unwrap();
        store.create(&booking).await.unwrap();
        booking.id
    }

    fn issuer(provider: Arc<MockProvider>, store: Arc<InMemoryBookingStore>) -> TicketIssuer {
        TicketIssuer::new(provider, store, vault())
    }

    #[tokio::test]
    async fn balance_payment_issues_and_resets_retries() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;

        // Simulate one earlier failed attempt.
        let mut booking = store.get(id).await.unwrap().unwrap();
        booking.record_payment_failure("card declined");
        store.update(&booking).await.unwrap();

        let outcome = issuer(provider.clone(), store.clone())
            .issue(id, PaymentMethodChoice::Balance, None)
            .await
            .unwrap();

        assert_eq!(outcome.status, BookingStatus::Issued);
        assert!(!outcome.documents.is_empty());
        assert_eq!(provider.payment_calls.load(Ordering::SeqCst), 1);

        let booking = store.get(id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Issued);
        assert_eq!(booking.retry_count, 0);
        assert!(!booking.documents.is_empty());
    }

    #[tokio::test]
    async fn already_issued_order_is_idempotent_success() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;
        let issuer = issuer(provider.clone(), store.clone());

        let first = issuer.issue(id, PaymentMethodChoice::Balance, None).await.unwrap();
        assert_eq!(provider.payment_calls.load(Ordering::SeqCst), 1);

        // Second call finds the documents on the remote order and must not
        // charge again.
        let booking = store.get(id).await.unwrap().unwrap();
        let mut reheld = booking.clone();
        reheld.status = BookingStatus::Held;
        reheld.documents.clear();
        store.update(&reheld).await.unwrap();

        let second = issuer.issue(id, PaymentMethodChoice::Balance, None).await.unwrap();
        assert_eq!(provider.payment_calls.load(Ordering::SeqCst), 1);
        assert_eq!(second.status, BookingStatus::Issued);
        assert_eq!(
            first.documents[0].unique_identifier,
            second.documents[0].unique_identifier
        );
    }

    #[tokio::test]
    async fn retry_ceiling_blocks_before_any_provider_call() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;

        let mut booking = store.get(id).await.unwrap().unwrap();
        booking.retry_count = 3;
        store.update(&booking).await.unwrap();

        let calls_before = provider.order_get_calls.load(Ordering::SeqCst);
        let err = issuer(provider.clone(), store)
            .issue(id, PaymentMethodChoice::Balance, None)
            .await
            .unwrap_err();

        assert!(matches!(err, BookingError::RetryLimitExceeded));
        assert_eq!(provider.order_get_calls.load(Ordering::SeqCst), calls_before);
        assert_eq!(provider.payment_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn payment_failure_increments_retry_and_keeps_booking_held() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;
        *provider.fail_payment.lock().unwrap() =
            Some(ProviderError::Transport("insufficient balance".to_string()));

        let err = issuer(provider.clone(), store.clone())
            .issue(id, PaymentMethodChoice::Balance, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::PaymentFailed(_)));

        let booking = store.get(id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Held);
        assert_eq!(booking.retry_count, 1);
        assert!(booking.last_retry_at.is_some());
        assert!(booking
            .admin_notes
            .iter()
            .any(|n| n.note.contains("Payment attempt 1 failed")));
    }

    #[tokio::test]
    async fn remote_cancellation_syncs_local_state() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;

        let booking = store.get(id).await.unwrap().unwrap();
        let order_id = booking.duffel_order_id.clone().unwrap();
        provider
            .orders
            .lock()
            .unwrap()
            .get_mut(&order_id)
            .unwrap()
            .cancelled_at = Some(Utc::now());

        let outcome = issuer(provider.clone(), store.clone())
            .issue(id, PaymentMethodChoice::Balance, None)
            .await
            .unwrap();

        assert_eq!(outcome.status, BookingStatus::Cancelled);
        assert_eq!(provider.payment_calls.load(Ordering::SeqCst), 0);
        let booking = store.get(id).await.unwrap().unwrap();
        assert_eq!(booking.status, BookingStatus::Cancelled);
    }

    #[tokio::test]
    async fn card_payment_requires_cvv() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;

        let err = issuer(provider, store)
            .issue(id, PaymentMethodChoice::Card, None)
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[tokio::test]
    async fn card_payment_uses_remote_amount() {
        let provider = Arc::new(MockProvider::new());
        let store = Arc::new(InMemoryBookingStore::new());
        let id = held_booking(&provider, &store).await;

        let outcome = issuer(provider.clone(), store.clone())
            .issue(id, PaymentMethodChoice::Card, Some("123"))
            .await
            .unwrap();
        assert_eq!(outcome.status, BookingStatus::Issued);
        assert_eq!(provider.payment_calls.load(Ordering::SeqCst), 1);
    }
}
