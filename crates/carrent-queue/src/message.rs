//! Wire format of queued notifications

use carrent_core::models::NotificationKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

/// One message on the outbox list
///
/// Delivery workers pick the channel (email, SMS, push) and template from
/// `kind`; `payload` carries the template variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: Uuid,
    pub user_id: i64,
    pub kind: NotificationKind,
    pub payload: JsonValue,
    pub queued_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn new(user_id: i64, kind: NotificationKind, payload: JsonValue) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            kind,
            payload,
            queued_at: Utc::now(),
        }
    }
}
