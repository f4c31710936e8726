//! Carrent booking core server
//!
//! Serves the booking API and runs the lifecycle task that moves confirmed
//! bookings to ongoing and ongoing bookings to completed.

use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use carrent_api::configure_routes;
use carrent_auth::JwtService;
use carrent_core::config::AppConfig;
use carrent_core::traits::EventSink;
use carrent_db::{
    create_pool, run_migrations, PgBookingRepository, PgEventLog, PgTransactionManager,
    PgUserDirectory, PgVehicleRepository,
};
use carrent_queue::RedisNotificationQueue;
use carrent_services::{
    gateway_from_config, AvailabilityChecker, BookingService, BookingServiceSettings,
    FanoutEventSink, LifecycleService, NotificationDispatcher, TracingEventSink,
};
use chrono::Utc;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize tracing/logging
fn init_tracing() {
    let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "carrent={lvl},carrent_api={lvl},carrent_services={lvl},carrent_db={lvl},carrent_queue={lvl},actix_web=info,sqlx=warn",
            lvl = log_level
        ))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true),
        )
        .init();
}

/// Advance due bookings every `interval`
fn spawn_lifecycle(lifecycle: LifecycleService, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            match lifecycle.advance(Utc::now().date_naive()).await {
                Ok(report) => info!(
                    started = report.started,
                    completed = report.completed,
                    skipped = report.skipped,
                    "Lifecycle pass finished"
                ),
                Err(e) => warn!(error = %e, "Lifecycle pass failed"),
            }
        }
    });
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Starting Carrent booking core v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load()?;

    info!("Connecting to database...");
    let pool = create_pool(&config.database).await?;
    if config.database.run_migrations {
        run_migrations(&pool).await?;
    }
    info!(
        max_connections = config.database.max_connections,
        "Database connection established"
    );

    let queue = RedisNotificationQueue::new(&config.redis.url, &config.redis.notification_queue)
        .await?;
    queue.ping().await?;
    info!(queue = %config.redis.notification_queue, "Notification queue connected");

    let gateway = gateway_from_config(&config.payment_gateway)?;

    let transactions = Arc::new(PgTransactionManager::new(pool.clone()));
    let bookings = Arc::new(PgBookingRepository::new(pool.clone()));
    let vehicles = Arc::new(PgVehicleRepository::new(pool.clone()));
    let directory = Arc::new(PgUserDirectory::new(pool.clone()));
    let events: Arc<dyn EventSink> = Arc::new(
        FanoutEventSink::new(Vec::new())
            .with(Arc::new(TracingEventSink))
            .with(Arc::new(PgEventLog::new(pool.clone()))),
    );

    let booking_service = web::Data::new(BookingService::new(
        transactions.clone(),
        bookings.clone(),
        vehicles,
        gateway,
        events.clone(),
        NotificationDispatcher::new(Arc::new(queue), directory),
        BookingServiceSettings::from_config(&config.booking),
    ));
    let checker = web::Data::new(AvailabilityChecker::new(transactions.clone()));

    spawn_lifecycle(
        LifecycleService::new(transactions, bookings, events),
        Duration::from_secs(config.booking.lifecycle_interval_secs.max(1)),
    );

    let jwt_service = web::Data::new(JwtService::new(
        &config.auth.jwt_secret,
        config.auth.jwt_expiration_minutes * 60,
    ));

    let cors_origins = env::var("CORS_ORIGINS")
        .unwrap_or_else(|_| "http://localhost:3000,http://127.0.0.1:3000".to_string());

    let bind_addr = config.server_addr();
    info!(
        "Starting HTTP server on {} with {} workers",
        bind_addr, config.server.workers
    );

    HttpServer::new(move || {
        let cors_origins_inner = cors_origins.clone();
        let cors = Cors::default()
            .allowed_origin_fn(move |origin, _req_head| {
                origin
                    .to_str()
                    .map(|o| cors_origins_inner.split(',').any(|allowed| allowed.trim() == o))
                    .unwrap_or(false)
            })
            .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
            .allowed_headers(vec![header::AUTHORIZATION, header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(booking_service.clone())
            .app_data(checker.clone())
            .app_data(jwt_service.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.server.workers)
    .client_request_timeout(Duration::from_secs(config.server.timeout_secs))
    .bind(&bind_addr)?
    .run()
    .await?;

    Ok(())
}
