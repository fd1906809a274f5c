use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use skybook_booking::models::{Booking, BookingStatus};
use skybook_booking::repository::{BookingStore, StoreError};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

pub struct PgBookingStore {
    pool: PgPool,
}

impl PgBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn backend(e: sqlx::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Backend(e.to_string()))
}

fn parse_status(raw: &str) -> Result<BookingStatus, StoreError> {
    serde_json::from_value(Value::String(raw.to_string()))
        .map_err(|_| StoreError::Backend(format!("Unknown booking status: {}", raw)))
}

fn status_str(status: BookingStatus) -> String {
    status.to_string()
}

fn row_to_booking(row: &PgRow) -> Result<Booking, StoreError> {
    let status: String = row.try_get("status").map_err(backend)?;
    let retry_count: i32 = row.try_get("retry_count").map_err(backend)?;

    Ok(Booking {
        id: row.try_get("id").map_err(backend)?,
        booking_reference: row.try_get("booking_reference").map_err(backend)?,
        offer_id: row.try_get("offer_id").map_err(backend)?,
        contact: decode(row.try_get::<Value, _>("contact").map_err(backend)?)?,
        passengers: decode(row.try_get::<Value, _>("passengers").map_err(backend)?)?,
        flight_details: decode(row.try_get::<Value, _>("flight_details").map_err(backend)?)?,
        pricing: decode(row.try_get::<Value, _>("pricing").map_err(backend)?)?,
        payment_info: decode(
            row.try_get::<Option<Value>, _>("payment_info")
                .map_err(backend)?
                .unwrap_or(Value::Null),
        )?,
        duffel_order_id: row.try_get("duffel_order_id").map_err(backend)?,
        pnr: row.try_get("pnr").map_err(backend)?,
        documents: decode(row.try_get::<Value, _>("documents").map_err(backend)?)?,
        status: parse_status(&status)?,
        retry_count: retry_count.max(0) as u32,
        last_retry_at: row.try_get("last_retry_at").map_err(backend)?,
        admin_notes: decode(row.try_get::<Value, _>("admin_notes").map_err(backend)?)?,
        payment_deadline: row.try_get("payment_deadline").map_err(backend)?,
        price_expiry: row.try_get("price_expiry").map_err(backend)?,
        is_live_mode: row.try_get("is_live_mode").map_err(backend)?,
        created_at: row.try_get("created_at").map_err(backend)?,
        updated_at: row.try_get("updated_at").map_err(backend)?,
    })
}

const SELECT_COLUMNS: &str = "id, booking_reference, offer_id, contact, passengers, \
     flight_details, pricing, payment_info, duffel_order_id, pnr, documents, status, \
     retry_count, last_retry_at, admin_notes, payment_deadline, price_expiry, \
     is_live_mode, created_at, updated_at";

#[async_trait]
impl BookingStore for PgBookingStore {
    async fn create(&self, booking: &Booking) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            INSERT INTO bookings (
                id, booking_reference, offer_id, contact, passengers, flight_details,
                pricing, payment_info, duffel_order_id, pnr, documents, status,
                retry_count, last_retry_at, admin_notes, payment_deadline, price_expiry,
                is_live_mode, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.booking_reference)
        .bind(&booking.offer_id)
        .bind(encode(&booking.contact)?)
        .bind(encode(&booking.passengers)?)
        .bind(encode(&booking.flight_details)?)
        .bind(encode(&booking.pricing)?)
        .bind(encode(&booking.payment_info)?)
        .bind(&booking.duffel_order_id)
        .bind(&booking.pnr)
        .bind(encode(&booking.documents)?)
        .bind(status_str(booking.status))
        .bind(booking.retry_count as i32)
        .bind(booking.last_retry_at)
        .bind(encode(&booking.admin_notes)?)
        .bind(booking.payment_deadline)
        .bind(booking.price_expiry)
        .bind(booking.is_live_mode)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Err(StoreError::Duplicate(booking.booking_reference.clone()))
            }
            Err(e) => Err(backend(e)),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Booking>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(backend)?;

        row.as_ref().map(row_to_booking).transpose()
    }

    async fn update(&self, booking: &Booking) -> Result<(), StoreError> {
        let updated_at: DateTime<Utc> = booking.updated_at;
        let result = sqlx::query(
            r#"
            UPDATE bookings SET
                contact = $2, passengers = $3, flight_details = $4, pricing = $5,
                payment_info = $6, duffel_order_id = $7, pnr = $8, documents = $9,
                status = $10, retry_count = $11, last_retry_at = $12, admin_notes = $13,
                payment_deadline = $14, price_expiry = $15, is_live_mode = $16,
                updated_at = $17
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(encode(&booking.contact)?)
        .bind(encode(&booking.passengers)?)
        .bind(encode(&booking.flight_details)?)
        .bind(encode(&booking.pricing)?)
        .bind(encode(&booking.payment_info)?)
        .bind(&booking.duffel_order_id)
        .bind(&booking.pnr)
        .bind(encode(&booking.documents)?)
        .bind(status_str(booking.status))
        .bind(booking.retry_count as i32)
        .bind(booking.last_retry_at)
        .bind(encode(&booking.admin_notes)?)
        .bind(booking.payment_deadline)
        .bind(booking.price_expiry)
        .bind(booking.is_live_mode)
        .bind(updated_at)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(booking.id));
        }
        Ok(())
    }

    async fn list(&self, page: u32, limit: u32) -> Result<(Vec<Booking>, u64), StoreError> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = ((page - 1) * limit) as i64;

        let count_row = sqlx::query("SELECT COUNT(*) AS total FROM bookings")
            .fetch_one(&self.pool)
            .await
            .map_err(backend)?;
        let total: i64 = count_row.try_get("total").map_err(backend)?;

        let rows = sqlx::query(&format!(
            "SELECT {} FROM bookings ORDER BY created_at DESC LIMIT $1 OFFSET $2",
            SELECT_COLUMNS
        ))
        .bind(limit as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        let bookings = rows
            .iter()
            .map(row_to_booking)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((bookings, total.max(0) as u64))
    }
}
