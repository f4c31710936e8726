//! Vehicle repository implementation
//!
//! The vehicle catalogue is owned by the listing service; the booking core
//! only reads it.

use super::rows::{VehicleRow, VEHICLE_COLUMNS};
use carrent_core::{models::Vehicle, traits::VehicleRepository, AppError, AppResult};
use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of VehicleRepository
pub struct PgVehicleRepository {
    pool: PgPool,
}

impl PgVehicleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VehicleRepository for PgVehicleRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<Vehicle>> {
        debug!("Finding vehicle by id: {}", id);

        let sql = format!("SELECT {} FROM vehicles WHERE id = $1", VEHICLE_COLUMNS);
        let row = sqlx::query_as::<_, VehicleRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error finding vehicle {}: {}", id, e);
                AppError::Database(format!("Failed to find vehicle: {}", e))
            })?;

        row.map(Vehicle::try_from).transpose()
    }
}
