//! Unit of work against a live PostgreSQL
//!
//! Run with: DATABASE_URL=postgresql://... cargo test -p carrent-db -- --ignored

use carrent_core::models::{BookingStatus, DateRange, NewBooking, PaymentMethod, PaymentStatus};
use carrent_core::traits::TransactionManager;
use carrent_core::AppError;
use carrent_db::{run_migrations, PgPool, PgTransactionManager};
use chrono::{NaiveDate, Utc};
use rust_decimal_macros::dec;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let pool = PgPool::connect(&url).await.unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}

/// Fresh owner and vehicle so runs never collide
async fn seed_vehicle(pool: &PgPool) -> (i64, i64) {
    let suffix = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, full_name, role) VALUES ($1, 'Test Owner', 'owner') RETURNING id",
    )
    .bind(format!("owner-{}@example.test", suffix))
    .fetch_one(pool)
    .await
    .unwrap();

    let vehicle_id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO vehicles (owner_id, make, model, daily_rate, status, location)
        VALUES ($1, 'Toyota', 'Corolla', $2, 'published', 'Depot')
        RETURNING id
        "#,
    )
    .bind(user_id)
    .bind(dec!(100))
    .fetch_one(pool)
    .await
    .unwrap();

    (user_id, vehicle_id)
}

fn pending(renter_id: i64, vehicle_id: i64, start: u32, end: u32) -> NewBooking {
    NewBooking {
        renter_id,
        vehicle_id,
        range: DateRange::new(
            NaiveDate::from_ymd_opt(2030, 3, start).unwrap(),
            NaiveDate::from_ymd_opt(2030, 3, end).unwrap(),
        ),
        total_amount: dec!(356.40),
        status: BookingStatus::Pending,
        payment_method: PaymentMethod::Cash,
        payment_status: PaymentStatus::Unpaid,
        pickup_location: "Depot".to_string(),
        dropoff_location: "Depot".to_string(),
        special_requests: None,
    }
}

#[tokio::test]
#[ignore]
async fn test_exclusion_constraint_reports_overlap() {
    let pool = pool().await;
    let (user_id, vehicle_id) = seed_vehicle(&pool).await;
    let transactions = PgTransactionManager::new(pool.clone());

    let mut uow = transactions.begin().await.unwrap();
    uow.lock_vehicle(vehicle_id).await.unwrap();
    uow.insert_booking(&pending(user_id, vehicle_id, 10, 15))
        .await
        .unwrap();
    uow.commit().await.unwrap();

    // Shares March 15 with the committed booking
    let mut uow = transactions.begin().await.unwrap();
    let err = uow
        .insert_booking(&pending(user_id, vehicle_id, 15, 20))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::BookingOverlap(id) if id == vehicle_id));
    uow.rollback().await.unwrap();

    let mut uow = transactions.begin().await.unwrap();
    let overlapping = uow
        .list_overlapping_bookings(
            vehicle_id,
            DateRange::new(
                NaiveDate::from_ymd_opt(2030, 3, 16).unwrap(),
                NaiveDate::from_ymd_opt(2030, 3, 20).unwrap(),
            ),
        )
        .await
        .unwrap();
    assert!(overlapping.is_empty());
    uow.rollback().await.unwrap();
}

#[tokio::test]
#[ignore]
async fn test_rollback_discards_booking() {
    let pool = pool().await;
    let (user_id, vehicle_id) = seed_vehicle(&pool).await;
    let transactions = PgTransactionManager::new(pool.clone());

    let mut uow = transactions.begin().await.unwrap();
    let booking = uow
        .insert_booking(&pending(user_id, vehicle_id, 1, 3))
        .await
        .unwrap();
    uow.rollback().await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bookings WHERE id = $1")
        .bind(booking.id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}
