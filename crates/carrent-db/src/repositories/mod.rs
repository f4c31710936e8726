//! Repository implementations
//!
//! Concrete implementations of the read-side traits defined in carrent-core,
//! using sqlx for PostgreSQL access.

pub mod booking_repo;
pub mod event_repo;
pub(crate) mod rows;
pub mod user_repo;
pub mod vehicle_repo;

pub use booking_repo::PgBookingRepository;
pub use event_repo::PgEventLog;
pub use user_repo::PgUserDirectory;
pub use vehicle_repo::PgVehicleRepository;
