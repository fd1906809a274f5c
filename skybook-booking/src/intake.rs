use crate::models::{
    Booking, BookingStatus, ContactInfo, FlightDetails, PassengerType, PaymentInfo, Pricing,
};
use crate::passenger;
use crate::reference::ReferenceGenerator;
use crate::repository::{BookingStore, StoreError};
use crate::vault::CardVault;
use crate::BookingError;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use skybook_core::money;
use skybook_core::notify::Notifier;
use skybook_core::provider::{
    CODE_INSTANT_PAYMENT_REQUIRED, CODE_OFFER_NO_LONGER_AVAILABLE, CreateOrderRequest, ProviderApi,
    ProviderError,
};
use skybook_shared::models::events::BookingConfirmedEvent;
use skybook_shared::pii::Masked;
use std::sync::Arc;
use uuid::Uuid;

/// Fresh references tried before giving up on a store-level collision.
const MAX_REFERENCE_ATTEMPTS: u32 = 3;

/// Card fields as submitted by the customer. The CVV is transient: it is
/// accepted here so the payload shape is complete, but the intake never
/// persists or forwards it. Payment attempts supply their own.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub card_name: String,
    pub card_number: Masked<String>,
    pub expiry_date: String,
    pub cvv: Masked<String>,
    pub billing_address: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingRequest {
    pub currency: String,
    /// Customer-facing total as a decimal string, e.g. "500.00".
    pub total_amount: String,
}

#[derive(Debug, Deserialize)]
pub struct BookingRequest {
    pub offer_id: String,
    pub contact: ContactInfo,
    pub passengers: Vec<crate::models::Passenger>,
    pub payment: CardDetails,
    pub flight_details: FlightDetails,
    pub pricing: PricingRequest,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct IntakeReceipt {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub pnr: Option<String>,
    pub payment_deadline: Option<DateTime<Utc>>,
}

/// Orchestrates a booking attempt: validate offer → persist provisional row →
/// create the remote held order → persist remote identifiers and markup →
/// best-effort confirmation notification.
pub struct OrderIntake {
    provider: Arc<dyn ProviderApi>,
    store: Arc<dyn BookingStore>,
    notifier: Arc<dyn Notifier>,
    vault: CardVault,
    references: ReferenceGenerator,
}

impl OrderIntake {
    pub fn new(
        provider: Arc<dyn ProviderApi>,
        store: Arc<dyn BookingStore>,
        notifier: Arc<dyn Notifier>,
        vault: CardVault,
        references: ReferenceGenerator,
    ) -> Self {
        Self {
            provider,
            store,
            notifier,
            vault,
            references,
        }
    }

    pub async fn create_booking(&self, req: BookingRequest) -> Result<IntakeReceipt, BookingError> {
        // 1. Re-validate the offer immediately before booking. A fetch failure
        //    and a vanished offer are the same terminal condition.
        let offer = match self.provider.get_offer(&req.offer_id).await {
            Ok(offer) => offer,
            Err(e) => {
                tracing::warn!(offer_id = %req.offer_id, error = %e, "Offer validation failed");
                return Err(BookingError::OfferExpired);
            }
        };
        if offer.payment_requirements.requires_instant_payment {
            return Err(BookingError::InstantPaymentRequired);
        }

        // 2. Passenger composition is checked before any remote order exists.
        passenger::validate_composition(&req.passengers)?;

        let total_minor = money::parse_minor(&req.pricing.total_amount)
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        // 3. Encrypt the card and persist the provisional PROCESSING row. This
        //    happens before the remote call so a provider outage still leaves
        //    a traceable, failed-state record.
        let encrypted_card = self.vault.encrypt(req.payment.card_number.expose());
        let payment_info = PaymentInfo {
            card_name: req.payment.card_name.clone(),
            card_number: Masked::new(encrypted_card),
            expiry_date: req.payment.expiry_date.clone(),
            billing_address: req.payment.billing_address.clone(),
        };

        let mut booking = Booking::new(
            self.references.generate(),
            req.offer_id.clone(),
            req.contact,
            req.passengers,
            req.flight_details,
            Pricing {
                currency: req.pricing.currency.clone(),
                total: total_minor,
                base: None,
                markup: None,
            },
            Some(payment_info),
        );

        let mut attempts = 1;
        loop {
            match self.store.create(&booking).await {
                Ok(()) => break,
                Err(StoreError::Duplicate(reference)) => {
                    if attempts >= MAX_REFERENCE_ATTEMPTS {
                        return Err(BookingError::DuplicateReference(reference));
                    }
                    attempts += 1;
                    booking.booking_reference = self.references.generate();
                }
                Err(e) => return Err(e.into()),
            }
        }

        // 4/5/6. Derived titles, normalized phones and positional infant
        //        pairing all happen inside the payload builder.
        let payloads =
            passenger::build_payloads(&booking.passengers, &booking.contact, Utc::now().date_naive());

        // 7. Create the held ("pay later") order.
        let order_req = CreateOrderRequest {
            offer_id: booking.offer_id.clone(),
            passengers: payloads,
            hold: true,
            metadata: serde_json::json!({ "booking_reference": booking.booking_reference }),
        };

        let order = match self.provider.create_order(&order_req).await {
            Ok(order) => order,
            Err(e) => {
                let reason = e.to_string();
                let mapped = map_provider_rejection(e);
                if let Err(t) = booking.transition(BookingStatus::Failed) {
                    tracing::error!(booking_id = %booking.id, error = %t, "Unexpected transition failure");
                }
                booking.push_note("system", &format!("Remote order creation failed: {}", reason));
                if let Err(store_err) = self.store.update(&booking).await {
                    tracing::error!(booking_id = %booking.id, error = %store_err, "Failed to record order failure");
                }
                return Err(mapped);
            }
        };

        // Markup is recomputed from the provider's confirmed cost, never
        // accepted from the caller after the fact.
        match money::parse_minor(&order.total_amount) {
            Ok(base_minor) => {
                booking.pricing.base = Some(base_minor);
                booking.pricing.markup = Some(total_minor - base_minor);
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Unparseable provider amount, markup left unset");
            }
        }

        booking.duffel_order_id = Some(order.id.clone());
        booking.pnr = order.booking_reference.clone();
        booking.payment_deadline = order.payment_status.payment_required_by;
        booking.price_expiry = order.payment_status.price_guarantee_expires_at;
        booking.is_live_mode = order.live_mode;
        booking.documents = order.documents.clone();
        booking
            .transition(BookingStatus::Held)
            .map_err(|e| BookingError::Validation(e.to_string()))?;

        self.store.update(&booking).await?;

        // 8. Confirmation notification is best-effort: a failure is logged and
        //    swallowed, it must never fail the booking.
        let event = self.confirmation_event(&booking);
        if let Err(e) = self.notifier.booking_confirmed(&event).await {
            tracing::warn!(booking_id = %booking.id, error = %e, "Confirmation notification failed");
        }

        Ok(IntakeReceipt {
            booking_id: booking.id,
            booking_reference: booking.booking_reference,
            pnr: booking.pnr,
            payment_deadline: booking.payment_deadline,
        })
    }

    fn confirmation_event(&self, booking: &Booking) -> BookingConfirmedEvent {
        let lead_passenger = booking
            .passengers
            .iter()
            .find(|p| p.passenger_type == PassengerType::Adult)
            .or_else(|| booking.passengers.first())
            .map(|p| format!("{} {}", p.given_name, p.family_name))
            .unwrap_or_default();

        BookingConfirmedEvent {
            booking_id: booking.id,
            booking_reference: booking.booking_reference.clone(),
            pnr: booking.pnr.clone(),
            passenger_name: lead_passenger,
            contact_email: booking.contact.email.clone(),
            total_amount: money::format_minor(booking.pricing.total),
            currency: booking.pricing.currency.clone(),
            flight_summary: format!(
                "{} {} {}",
                booking.flight_details.airline,
                booking.flight_details.flight_number,
                booking.flight_details.route
            ),
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Known provider rejections map to the same terminal categories as offer
/// validation; everything else surfaces as a provider error.
fn map_provider_rejection(err: ProviderError) -> BookingError {
    match err.code() {
        Some(CODE_OFFER_NO_LONGER_AVAILABLE) => BookingError::OfferExpired,
        Some(CODE_INSTANT_PAYMENT_REQUIRED) => BookingError::InstantPaymentRequired,
        _ => BookingError::Provider(err),
    }
}
