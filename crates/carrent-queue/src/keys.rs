//! Redis key names used by the notification outbox
//!
//! # Key Patterns
//!
//! - `notifications:outbox` - default list consumed by delivery workers
//! - `notifications:user:{user_id}` - per-user counter of queued messages
//!
//! # Example
//!
//! ```
//! use carrent_queue::keys;
//!
//! assert_eq!(keys::user_counter_key(42), "notifications:user:42");
//! ```

/// Default outbox list
pub const DEFAULT_OUTBOX: &str = "notifications:outbox";

/// Prefix for per-user queued message counters
///
/// Format: `notifications:user:{user_id}`
pub const USER_COUNTER_PREFIX: &str = "notifications:user";

/// Counters expire after a week without new messages
pub const USER_COUNTER_TTL_SECS: i64 = 7 * 24 * 3600;

pub fn user_counter_key(user_id: i64) -> String {
    format!("{}:{}", USER_COUNTER_PREFIX, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_counter_key() {
        assert_eq!(user_counter_key(7), "notifications:user:7");
    }
}
