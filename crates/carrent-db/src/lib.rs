//! Carrent Database Layer
//!
//! PostgreSQL access for the booking core:
//!
//! - Connection pool management and migrations with sqlx
//! - Read repositories for vehicles, bookings, payments and users
//! - A transactional unit of work with vehicle row locks
//! - An in-memory marketplace implementing the same traits, used by tests

pub mod memory;
pub mod pool;
pub mod repositories;
pub mod unit_of_work;

pub use memory::InMemoryMarketplace;
pub use pool::{create_pool, run_migrations};
pub use repositories::*;
pub use unit_of_work::{PgTransactionManager, PgUnitOfWork};

// Re-export commonly used types
pub use carrent_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
