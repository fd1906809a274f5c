pub mod app_config;
pub mod booking_repo;
pub mod database;
pub mod duffel;
pub mod events;

pub use booking_repo::PgBookingStore;
pub use database::DbClient;
pub use duffel::DuffelClient;
pub use events::EventProducer;
