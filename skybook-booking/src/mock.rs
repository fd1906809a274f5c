//! In-memory implementations of the engine's ports, used by the test suite
//! and by local development without provider credentials.

use crate::models::Booking;
use crate::repository::{BookingStore, StoreError};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use skybook_core::notify::Notifier;
use skybook_core::provider::{
    CardToken, CreateOrderRequest, Offer, OrderPaymentStatus, PaymentIntent, PaymentIntentStatus,
    PaymentRecord, PaymentRequest, ProviderApi, ProviderError, RemoteOrder, TokenizeCardRequest,
    TravelDocument,
};
use skybook_shared::models::events::BookingConfirmedEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use uuid::Uuid;

// ============================================================================
// Provider mock
// ============================================================================

#[derive(Default)]
pub struct MockProvider {
    pub offers: Mutex<HashMap<String, Offer>>,
    pub orders: Mutex<HashMap<String, RemoteOrder>>,
    intents: Mutex<HashMap<String, PaymentIntent>>,

    /// Forced failures; cleared by the test when no longer wanted.
    pub fail_order_create: Mutex<Option<ProviderError>>,
    pub fail_order_get: Mutex<Option<ProviderError>>,
    pub fail_payment: Mutex<Option<ProviderError>>,
    pub fail_tokenize: Mutex<Option<ProviderError>>,

    pub token_requires_3ds: Mutex<bool>,
    /// Documents the remote order gains once a payment lands.
    pub documents_on_payment: Mutex<Vec<TravelDocument>>,

    pub order_get_calls: AtomicUsize,
    pub payment_calls: AtomicUsize,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a purchasable pay-later offer.
    pub fn seed_offer(&self, id: &str, total_amount: &str, currency: &str) {
        self.offers.lock().unwrap().insert(
            id.to_string(),
            Offer {
                id: id.to_string(),
                total_amount: total_amount.to_string(),
                total_currency: currency.to_string(),
                expires_at: Some(Utc::now() + Duration::minutes(20)),
                payment_requirements: Default::default(),
            },
        );
    }

    pub fn seed_instant_payment_offer(&self, id: &str) {
        self.seed_offer(id, "430.00", "USD");
        if let Some(offer) = self.offers.lock().unwrap().get_mut(id) {
            offer.payment_requirements.requires_instant_payment = true;
        }
    }

    pub fn default_documents() -> Vec<TravelDocument> {
        vec![TravelDocument {
            unique_identifier: "235-1234567890".to_string(),
            document_type: "electronic_ticket".to_string(),
        }]
    }
}

#[async_trait]
impl ProviderApi for MockProvider {
    async fn get_offer(&self, offer_id: &str) -> Result<Offer, ProviderError> {
        self.offers
            .lock()
            .unwrap()
            .get(offer_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                code: skybook_core::provider::CODE_OFFER_NO_LONGER_AVAILABLE.to_string(),
                message: format!("Offer {} is no longer available", offer_id),
            })
    }

    async fn create_order(&self, req: &CreateOrderRequest) -> Result<RemoteOrder, ProviderError> {
        if let Some(err) = self.fail_order_create.lock().unwrap().clone() {
            return Err(err);
        }

        let offer = self.get_offer(&req.offer_id).await?;
        let order = RemoteOrder {
            id: format!("ord_{}", Uuid::new_v4().simple()),
            booking_reference: Some("SRZQXF".to_string()),
            total_amount: offer.total_amount.clone(),
            total_currency: offer.total_currency.clone(),
            live_mode: false,
            cancelled_at: None,
            documents: Vec::new(),
            payment_status: OrderPaymentStatus {
                awaiting_payment: true,
                payment_required_by: Some(Utc::now() + Duration::hours(72)),
                price_guarantee_expires_at: Some(Utc::now() + Duration::hours(24)),
            },
        };
        self.orders
            .lock()
            .unwrap()
            .insert(order.id.clone(), order.clone());
        Ok(order)
    }

    async fn get_order(&self, order_id: &str) -> Result<RemoteOrder, ProviderError> {
        self.order_get_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_order_get.lock().unwrap().clone() {
            return Err(err);
        }
        self.orders
            .lock()
            .unwrap()
            .get(order_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                code: "not_found".to_string(),
                message: format!("Order {} not found", order_id),
            })
    }

    async fn tokenize_card(&self, _req: &TokenizeCardRequest) -> Result<CardToken, ProviderError> {
        if let Some(err) = self.fail_tokenize.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(CardToken {
            id: format!("tok_{}", Uuid::new_v4().simple()),
            live_mode: false,
            brand: Some("visa".to_string()),
            last_4_digits: Some("4242".to_string()),
            three_d_secure_required: *self.token_requires_3ds.lock().unwrap(),
        })
    }

    async fn create_payment_intent(
        &self,
        amount: &str,
        currency: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        let intent = PaymentIntent {
            id: format!("pit_{}", Uuid::new_v4().simple()),
            amount: amount.to_string(),
            currency: currency.to_string(),
            status: PaymentIntentStatus::RequiresPaymentMethod,
            client_token: Some("eyJjbGllbnRfdG9rZW4ifQ".to_string()),
        };
        self.intents
            .lock()
            .unwrap()
            .insert(intent.id.clone(), intent.clone());
        Ok(intent)
    }

    async fn get_payment_intent(&self, intent_id: &str) -> Result<PaymentIntent, ProviderError> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .cloned()
            .ok_or_else(|| ProviderError::Api {
                code: "not_found".to_string(),
                message: format!("Payment intent {} not found", intent_id),
            })
    }

    async fn confirm_payment_intent(
        &self,
        intent_id: &str,
        _card_token: &str,
    ) -> Result<PaymentIntent, ProviderError> {
        let mut intents = self.intents.lock().unwrap();
        let intent = intents.get_mut(intent_id).ok_or_else(|| ProviderError::Api {
            code: "not_found".to_string(),
            message: format!("Payment intent {} not found", intent_id),
        })?;

        if *self.token_requires_3ds.lock().unwrap() {
            // 3DS cards fail confirmation with a requires-action signal; the
            // refreshed intent carries the challenge token.
            intent.status = PaymentIntentStatus::RequiresAction;
            return Err(ProviderError::Api {
                code: "requires_action".to_string(),
                message: "Cardholder verification required".to_string(),
            });
        }

        intent.status = PaymentIntentStatus::Succeeded;
        Ok(intent.clone())
    }

    async fn create_payment(&self, req: &PaymentRequest) -> Result<PaymentRecord, ProviderError> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.fail_payment.lock().unwrap().clone() {
            return Err(err);
        }

        let mut orders = self.orders.lock().unwrap();
        let order = orders.get_mut(&req.order_id).ok_or_else(|| ProviderError::Api {
            code: "not_found".to_string(),
            message: format!("Order {} not found", req.order_id),
        })?;
        order.documents = self.documents_on_payment.lock().unwrap().clone();
        if order.documents.is_empty() {
            order.documents = Self::default_documents();
        }
        order.payment_status.awaiting_payment = false;

        Ok(PaymentRecord {
            id: format!("pay_{}", Uuid::new_v4().simple()),
            amount: req.amount.clone(),
            currency: req.currency.clone(),
        })
    }
}

// ============================================================================
// Store mock
// ============================================================================

#[derive(Default)]
pub struct InMemoryBookingStore {
    bookings: Mutex<HashMap<Uuid, Booking>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.bookings.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn create(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.lock().unwrap();
        if bookings
            .values()
            .any(|b| b.booking_reference == booking.booking_reference)
        {
            return Err(StoreError::Duplicate(booking.booking_reference.clone()));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.lock().unwrap().get(&id).cloned())
    }

    async fn update(&self, booking: &Booking) -> Result<(), StoreError> {
        let mut bookings = self.bookings.lock().unwrap();
        if !bookings.contains_key(&booking.id) {
            return Err(StoreError::NotFound(booking.id));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Booking>, u64), StoreError> {
        let bookings = self.bookings.lock().unwrap();
        let total = bookings.len() as u64;

        let mut all: Vec<Booking> = bookings.values().cloned().collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let page = page.max(1);
        let offset = ((page - 1) * limit) as usize;
        let slice = all.into_iter().skip(offset).take(limit as usize).collect();
        Ok((slice, total))
    }
}

// ============================================================================
// Notifier mock
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<BookingConfirmedEvent>>,
    pub fail: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn booking_confirmed(
        &self,
        event: &BookingConfirmedEvent,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if *self.fail.lock().unwrap() {
            return Err("notification channel down".into());
        }
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
