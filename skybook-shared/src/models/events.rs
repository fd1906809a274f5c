use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub booking_reference: String,
    pub pnr: Option<String>,
    pub passenger_name: String,
    pub contact_email: String,
    pub total_amount: String,
    pub currency: String,
    pub flight_summary: String,
    pub timestamp: i64,
}
