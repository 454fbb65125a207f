use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "notification_type", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    PaymentVerified,
    PaymentRejected,
    ApplicationUpdate,
    General,
    DeadlineReminder,
    ApplicationSubmitted,
}

/// A persisted, user-visible message. Independent of any delivery channel:
/// the row exists even when the best-effort email never went out.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub user_id: i32,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub clicked: bool,
    pub metadata: Value,
    pub created_at: DateTime<Utc>,
}

/// One row per admin bulk send, with the delivery counters observed at send
/// time. A scheduled broadcast is recorded with zero counters and is never
/// picked up later; there is no background executor.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Broadcast {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub message: String,
    pub recipients: Value,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub channels: Value,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub total: i32,
    pub successful: i32,
    pub failed: i32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct DeliveryStats {
    pub total: i32,
    pub successful: i32,
    pub failed: i32,
}
