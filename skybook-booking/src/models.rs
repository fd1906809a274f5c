use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use skybook_core::provider::TravelDocument;
use skybook_shared::pii::Masked;
use uuid::Uuid;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    Processing,
    Held,
    Issued,
    Cancelled,
    Failed,
    Expired,
}

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Issued
                | BookingStatus::Cancelled
                | BookingStatus::Failed
                | BookingStatus::Expired
        )
    }

    /// Forward-only transitions. `PROCESSING` may also move straight to
    /// `CANCELLED` when reconciliation finds the remote order dead before the
    /// hold was ever recorded locally.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        match self {
            BookingStatus::Processing => matches!(
                next,
                BookingStatus::Held | BookingStatus::Failed | BookingStatus::Cancelled
            ),
            BookingStatus::Held => {
                matches!(next, BookingStatus::Issued | BookingStatus::Cancelled)
            }
            _ => false,
        }
    }
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Processing => "PROCESSING",
            BookingStatus::Held => "HELD",
            BookingStatus::Issued => "ISSUED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Failed => "FAILED",
            BookingStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PassengerType {
    Adult,
    Child,
    Infant,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Gender {
    #[serde(rename = "m")]
    Male,
    #[serde(rename = "f")]
    Female,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    #[serde(rename = "type")]
    pub passenger_type: PassengerType,
    pub given_name: String,
    pub family_name: String,
    pub gender: Gender,
    pub date_of_birth: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_country: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub passport_expiry: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FlightType {
    OneWay,
    RoundTrip,
    MultiCity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlightDetails {
    pub airline: String,
    pub flight_number: String,
    pub route: String,
    pub departure_date: DateTime<Utc>,
    pub arrival_date: DateTime<Utc>,
    pub duration: String,
    pub flight_type: FlightType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
}

/// Customer-facing pricing in minor units. `markup` and `base` are computed
/// from the remote order's confirmed cost at intake, never supplied by the
/// caller after the fact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pricing {
    pub currency: String,
    pub total: i64,
    pub base: Option<i64>,
    pub markup: Option<i64>,
}

/// Card-on-file. The number is AES-256-CBC ciphertext (`iv:ciphertext` hex);
/// the CVV is never persisted anywhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentInfo {
    pub card_name: String,
    pub card_number: Masked<String>,
    pub expiry_date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub billing_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminNote {
    pub at: DateTime<Utc>,
    pub author: String,
    pub note: String,
}

/// The single source of local truth for a booking attempt. Created in
/// `PROCESSING` before the remote order call so a provider outage always
/// leaves a traceable record; never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub booking_reference: String,
    pub offer_id: String,
    pub contact: ContactInfo,
    pub passengers: Vec<Passenger>,
    pub flight_details: FlightDetails,
    pub pricing: Pricing,
    pub payment_info: Option<PaymentInfo>,
    pub duffel_order_id: Option<String>,
    pub pnr: Option<String>,
    pub documents: Vec<TravelDocument>,
    pub status: BookingStatus,
    pub retry_count: u32,
    pub last_retry_at: Option<DateTime<Utc>>,
    pub admin_notes: Vec<AdminNote>,
    pub payment_deadline: Option<DateTime<Utc>>,
    pub price_expiry: Option<DateTime<Utc>>,
    pub is_live_mode: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub const MAX_PAYMENT_ATTEMPTS: u32 = 3;

#[derive(Debug, thiserror::Error)]
#[error("Invalid state transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: BookingStatus,
    pub to: BookingStatus,
}

impl Booking {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        booking_reference: String,
        offer_id: String,
        contact: ContactInfo,
        passengers: Vec<Passenger>,
        flight_details: FlightDetails,
        pricing: Pricing,
        payment_info: Option<PaymentInfo>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            booking_reference,
            offer_id,
            contact,
            passengers,
            flight_details,
            pricing,
            payment_info,
            duffel_order_id: None,
            pnr: None,
            documents: Vec::new(),
            status: BookingStatus::Processing,
            retry_count: 0,
            last_retry_at: None,
            admin_notes: Vec::new(),
            payment_deadline: None,
            price_expiry: None,
            is_live_mode: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Engine-path status change; rejects anything the state machine forbids.
    pub fn transition(&mut self, next: BookingStatus) -> Result<(), InvalidTransition> {
        if !self.status.can_transition_to(next) {
            return Err(InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Admin override: any transition, but always with an audit note.
    pub fn force_status(&mut self, next: BookingStatus, author: &str, note: &str) {
        let from = self.status;
        self.status = next;
        self.push_note(author, &format!("Status forced {} -> {}: {}", from, next, note));
    }

    pub fn push_note(&mut self, author: &str, note: &str) {
        self.admin_notes.push(AdminNote {
            at: Utc::now(),
            author: author.to_string(),
            note: note.to_string(),
        });
        self.updated_at = Utc::now();
    }

    /// Status as presented on the read path: a held booking whose payment
    /// deadline has passed reads as `EXPIRED` without being rewritten.
    pub fn effective_status(&self, now: DateTime<Utc>) -> BookingStatus {
        if self.status == BookingStatus::Held {
            if let Some(deadline) = self.payment_deadline {
                if now > deadline {
                    return BookingStatus::Expired;
                }
            }
        }
        self.status
    }

    /// Record a failed payment attempt against the retry ceiling.
    pub fn record_payment_failure(&mut self, reason: &str) {
        self.retry_count += 1;
        self.last_retry_at = Some(Utc::now());
        self.push_note(
            "system",
            &format!("Payment attempt {} failed: {}", self.retry_count, reason),
        );
    }

    /// Issuance success: copy authoritative documents and PNR in, reset the
    /// retry counter. Upholds: documents non-empty iff status is ISSUED.
    pub fn mark_issued(&mut self, documents: Vec<TravelDocument>, pnr: Option<String>) {
        self.documents = documents;
        if pnr.is_some() {
            self.pnr = pnr;
        }
        self.status = BookingStatus::Issued;
        self.retry_count = 0;
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn sample_booking() -> Booking {
        Booking::new(
            "SKY-260806-1234".to_string(),
            "off_0000A3vUda8dKRtKSTZgNS".to_string(),
            ContactInfo {
                email: "traveller@example.com".to_string(),
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
                base: None,
                markup: None,
            },
            None,
        )
    }

    #[test]
    fn lifecycle_transitions() {
        let mut booking = sample_booking();
        assert_eq!(booking.status, BookingStatus::Processing);

        booking.transition(BookingStatus::Held).unwrap();
        booking.transition(BookingStatus::Issued).unwrap();
        assert!(booking.status.is_terminal());

        // Terminal states never regress on the engine path.
        assert!(booking.transition(BookingStatus::Held).is_err());
        assert!(booking.transition(BookingStatus::Cancelled).is_err());
    }

    #[test]
    fn processing_cannot_jump_to_issued() {
        let mut booking = sample_booking();
        assert!(booking.transition(BookingStatus::Issued).is_err());
        booking.transition(BookingStatus::Failed).unwrap();
    }

    #[test]
    fn admin_override_records_note() {
        let mut booking = sample_booking();
        booking.transition(BookingStatus::Held).unwrap();
        booking.transition(BookingStatus::Cancelled).unwrap();

        booking.force_status(BookingStatus::Held, "ops@example.com", "airline reinstated");
        assert_eq!(booking.status, BookingStatus::Held);
        assert_eq!(booking.admin_notes.len(), 1);
        assert!(booking.admin_notes[0].note.contains("airline reinstated"));
    }

    #[test]
    fn expired_is_derived_not_written() {
        let mut booking = sample_booking();
        booking.transition(BookingStatus::Held).unwrap();
        booking.payment_deadline = Some(Utc::now() - Duration::hours(1));

        assert_eq!(booking.effective_status(Utc::now()), BookingStatus::Expired);
        // The persisted status is untouched.
        assert_eq!(booking.status, BookingStatus::Held);
    }

    #[test]
    fn issued_resets_retry_counter() {
        let mut booking = sample_booking();
        booking.transition(BookingStatus::Held).unwrap();
        booking.record_payment_failure("card declined");
        booking.record_payment_failure("card declined");
        assert_eq!(booking.retry_count, 2);

        booking.mark_issued(
            vec![TravelDocument {
                unique_identifier: "235-1234567890".to_string(),
                document_type: "electronic_ticket".to_string(),
            }],
            Some("ABCDEF".to_string()),
        );
        assert_eq!(booking.retry_count, 0);
        assert_eq!(booking.status, BookingStatus::Issued);
        assert!(!booking.documents.is_empty());
    }
}
