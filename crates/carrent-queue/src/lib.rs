//! Redis notification outbox for Carrent
//!
//! The booking core never delivers email, SMS or push messages itself. It pushes
//! JSON [`NotificationMessage`]s onto a Redis list that external delivery workers
//! consume with `BLPOP`.
//!
//! # Example
//!
//! ```no_run
//! use carrent_core::models::NotificationKind;
//! use carrent_core::traits::Notifier;
//! use carrent_queue::RedisNotificationQueue;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let queue = RedisNotificationQueue::new("redis://127.0.0.1:6379", "notifications:outbox").await?;
//!     queue
//!         .notify(42, NotificationKind::BookingConfirmed, json!({ "booking_id": 1 }))
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod keys;
pub mod message;

pub use message::NotificationMessage;

use async_trait::async_trait;
use carrent_core::error::AppError;
use carrent_core::models::NotificationKind;
use carrent_core::traits::Notifier;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use serde_json::Value as JsonValue;
use tracing::{debug, error, instrument};

/// Notification outbox backed by a Redis list
///
/// Cloning is cheap; clones share the multiplexed connection.
#[derive(Clone)]
pub struct RedisNotificationQueue {
    manager: ConnectionManager,
    queue: String,
}

impl RedisNotificationQueue {
    /// Connect to Redis and target the given outbox list
    ///
    /// # Errors
    ///
    /// Returns `AppError::Queue` if the URL is invalid or the connection fails
    pub async fn new(url: &str, queue: &str) -> Result<Self, AppError> {
        debug!("Connecting to Redis at {}", url);

        let client = Client::open(url).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            AppError::Queue(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to establish Redis connection: {}", e);
            AppError::Queue(format!("Connection failed: {}", e))
        })?;

        debug!("Redis connection established successfully");
        Ok(Self {
            manager,
            queue: queue.to_string(),
        })
    }

    /// Ping the Redis server to check connectivity
    pub async fn ping(&self) -> Result<(), AppError> {
        let mut conn = self.manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis ping failed: {}", e);
                AppError::Queue(format!("Ping failed: {}", e))
            })?;
        Ok(())
    }

    /// Number of messages waiting for delivery
    pub async fn depth(&self) -> Result<i64, AppError> {
        let mut conn = self.manager.clone();
        conn.llen(&self.queue).await.map_err(|e| {
            error!("Failed to read outbox length: {}", e);
            AppError::Queue(format!("LLEN failed: {}", e))
        })
    }

    /// Push a prepared message onto the outbox
    pub async fn enqueue(&self, message: &NotificationMessage) -> Result<(), AppError> {
        let body = serde_json::to_string(message)?;
        let counter = keys::user_counter_key(message.user_id);

        let mut conn = self.manager.clone();
        let _: () = redis::pipe()
            .atomic()
            .rpush(&self.queue, body)
            .ignore()
            .incr(&counter, 1)
            .ignore()
            .expire(&counter, keys::USER_COUNTER_TTL_SECS)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Failed to enqueue notification {}: {}", message.id, e);
                AppError::Queue(format!("Failed to enqueue notification: {}", e))
            })?;

        debug!(
            "Queued {} notification {} for user {}",
            message.kind, message.id, message.user_id
        );
        Ok(())
    }
}

#[async_trait]
impl Notifier for RedisNotificationQueue {
    #[instrument(skip(self, payload), fields(queue = %self.queue))]
    async fn notify(
        &self,
        user_id: i64,
        kind: NotificationKind,
        payload: JsonValue,
    ) -> Result<(), AppError> {
        self.enqueue(&NotificationMessage::new(user_id, kind, payload))
            .await
    }
}
