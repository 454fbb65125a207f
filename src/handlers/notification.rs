use actix_web::web::{Data, Json, Path, Query};
use chrono::{DateTime, Utc};
use itertools::Itertools;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::{query, query_as, query_scalar, PgPool};
use uuid::Uuid;

use crate::context::{AdminInfo, UserInfo};
use crate::error::Error;
use crate::mailer::{Mailer, OutgoingMail};
use crate::models::notification::{Broadcast, DeliveryStats, Notification, NotificationType};
use crate::request::Pagination;
use crate::resolver::{parse_targets, RecipientResolver, RecipientTarget};
use crate::response::UpdateResponse;

/// Inserts one user-facing notification row. Shared by the verification
/// workflow and the admin broadcast path.
pub async fn create_notification(db: &PgPool, user_id: i32, kind: NotificationType, title: &str, message: &str, metadata: Value) -> Result<String, Error> {
    let id = Uuid::new_v4().to_string();
    query("INSERT INTO notifications (id, user_id, notification_type, title, message, is_read, clicked, metadata, created_at) VALUES ($1, $2, $3, $4, $5, FALSE, FALSE, $6, $7)")
        .bind(&id)
        .bind(user_id)
        .bind(kind)
        .bind(title)
        .bind(message)
        .bind(metadata)
        .bind(Utc::now())
        .execute(&mut db.acquire().await?)
        .await?;
    Ok(id)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    #[serde(rename = "type")]
    pub notification_type: Option<NotificationType>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub recipients: Option<Vec<String>>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub channels: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastData {
    pub notification: Broadcast,
    pub message: String,
    pub user_notifications_created: i32,
    pub delivery_stats: DeliveryStats,
}

#[derive(Debug, Serialize)]
pub struct BroadcastResponse {
    pub success: bool,
    pub data: BroadcastData,
}

/// Admin bulk send. Recipients mix literal user ids and symbolic group
/// tokens; groups are resolved through the injected resolver and the merged
/// id set is deduplicated before delivery. A scheduledFor timestamp is
/// recorded as-is and nothing is sent; there is no background executor that
/// would pick it up later.
pub async fn broadcast<M: Mailer, R: RecipientResolver>(
    admin: AdminInfo,
    Json(req): Json<BroadcastRequest>,
    db: Data<PgPool>,
    mailer: Data<M>,
    resolver: Data<R>,
) -> Result<Json<BroadcastResponse>, Error> {
    let title = req
        .title
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| Error::Validation("title is required".into()))?;
    let message = req
        .message
        .filter(|m| !m.trim().is_empty())
        .ok_or_else(|| Error::Validation("message is required".into()))?;
    let recipients_raw = req
        .recipients
        .filter(|r| !r.is_empty())
        .ok_or_else(|| Error::Validation("recipients is required".into()))?;
    let targets = parse_targets(&recipients_raw)?;
    let kind = req.notification_type.unwrap_or(NotificationType::General);
    let channels = req.channels.unwrap_or_else(|| vec!["in_app".to_string()]);
    let email_enabled = channels.iter().any(|c| c == "email");

    let mut user_ids = Vec::new();
    for target in targets {
        match target {
            RecipientTarget::User(id) => user_ids.push(id),
            RecipientTarget::Group(group) => user_ids.extend(resolver.resolve(group).await?),
        }
    }
    let user_ids: Vec<i32> = user_ids.into_iter().unique().collect();

    let broadcast_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    query(
        "INSERT INTO broadcasts (id, notification_type, title, message, recipients, scheduled_for, channels, created_by, created_at, total, successful, failed)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 0, 0, 0)",
    )
    .bind(&broadcast_id)
    .bind(kind)
    .bind(&title)
    .bind(&message)
    .bind(json!(recipients_raw))
    .bind(req.scheduled_for)
    .bind(json!(channels))
    .bind(&admin.0.nickname)
    .bind(now)
    .execute(&mut db.acquire().await?)
    .await?;

    let stats = if req.scheduled_for.is_some() {
        DeliveryStats { total: 0, successful: 0, failed: 0 }
    } else {
        let mut stats = DeliveryStats {
            total: user_ids.len() as i32,
            successful: 0,
            failed: 0,
        };
        for user_id in &user_ids {
            let metadata = json!({ "broadcastId": broadcast_id });
            match create_notification(&db, *user_id, kind, &title, &message, metadata).await {
                Ok(_) => stats.successful += 1,
                Err(e) => {
                    warn!("broadcast {}: failed to notify user {}: {}", broadcast_id, user_id, e);
                    stats.failed += 1;
                }
            }
            if email_enabled {
                if let Err(e) = send_broadcast_mail(&db, &**mailer, *user_id, &title, &message).await {
                    warn!("broadcast {}: failed to email user {}: {}", broadcast_id, user_id, e);
                }
            }
        }
        // Counter update is best-effort; the per-user rows already exist.
        if let Err(e) = query("UPDATE broadcasts SET total = $1, successful = $2, failed = $3 WHERE id = $4")
            .bind(stats.total)
            .bind(stats.successful)
            .bind(stats.failed)
            .bind(&broadcast_id)
            .execute(&mut db.acquire().await?)
            .await
        {
            warn!("broadcast {}: failed to record delivery stats: {}", broadcast_id, e);
        }
        stats
    };

    let notification: Broadcast = query_as("SELECT * FROM broadcasts WHERE id = $1")
        .bind(&broadcast_id)
        .fetch_one(&mut db.acquire().await?)
        .await?;
    let summary = if req.scheduled_for.is_some() {
        "Notification recorded for scheduled delivery".to_string()
    } else {
        format!("Notification sent to {} of {} recipients", stats.successful, stats.total)
    };
    Ok(Json(BroadcastResponse {
        success: true,
        data: BroadcastData {
            notification,
            message: summary,
            user_notifications_created: stats.successful,
            delivery_stats: stats,
        },
    }))
}

async fn send_broadcast_mail<M: Mailer + ?Sized>(db: &PgPool, mailer: &M, user_id: i32, title: &str, message: &str) -> Result<(), Error> {
    let to: String = query_scalar("SELECT email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut db.acquire().await?)
        .await?;
    mailer
        .send(OutgoingMail {
            to,
            subject: title.to_owned(),
            body: message.to_owned(),
        })
        .await
}

#[derive(Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastStats {
    pub total_broadcasts: i64,
    pub total_recipients: i64,
    pub delivery_success_rate: f64,
    pub open_rate: f64,
    pub click_rate: f64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastList {
    pub success: bool,
    pub notifications: Vec<Broadcast>,
    pub stats: BroadcastStats,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

pub fn rate(part: i64, whole: i64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Raw counters behind the admin stats: broadcast totals from `broadcasts`,
/// read/click counters from the per-user `notifications` rows.
#[derive(Debug, Clone, Copy)]
pub struct StatCounters {
    pub broadcasts: i64,
    pub recipients: i64,
    pub delivered: i64,
    pub created: i64,
    pub read: i64,
    pub clicked: i64,
}

pub fn aggregate_stats(c: StatCounters) -> BroadcastStats {
    BroadcastStats {
        total_broadcasts: c.broadcasts,
        total_recipients: c.recipients,
        delivery_success_rate: rate(c.delivered, c.recipients),
        open_rate: rate(c.read, c.created),
        click_rate: rate(c.clicked, c.created),
    }
}

pub async fn broadcast_list(_admin: AdminInfo, Query(page): Query<Pagination>, db: Data<PgPool>) -> Result<Json<BroadcastList>, Error> {
    let mut conn = db.acquire().await?;
    let total: i64 = query_scalar("SELECT COUNT(*) FROM broadcasts").fetch_one(&mut conn).await?;
    let notifications: Vec<Broadcast> = query_as("SELECT * FROM broadcasts ORDER BY created_at DESC LIMIT $1 OFFSET $2")
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut conn)
        .await?;
    let (recipients, delivered): (i64, i64) = query_as("SELECT COALESCE(SUM(total), 0), COALESCE(SUM(successful), 0) FROM broadcasts")
        .fetch_one(&mut conn)
        .await?;
    let (created, read, clicked): (i64, i64, i64) =
        query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE is_read), COUNT(*) FILTER (WHERE clicked) FROM notifications")
            .fetch_one(&mut conn)
            .await?;
    Ok(Json(BroadcastList {
        success: true,
        notifications,
        stats: aggregate_stats(StatCounters {
            broadcasts: total,
            recipients,
            delivered,
            created,
            read,
            clicked,
        }),
        total,
        offset: page.offset(),
        limit: page.limit(),
    }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationList {
    pub success: bool,
    pub notifications: Vec<Notification>,
    pub unread: i64,
    pub total: i64,
}

pub async fn list_own(user: UserInfo, Query(page): Query<Pagination>, db: Data<PgPool>) -> Result<Json<NotificationList>, Error> {
    let mut conn = db.acquire().await?;
    let (total, unread): (i64, i64) = query_as("SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read) FROM notifications WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&mut conn)
        .await?;
    let notifications: Vec<Notification> = query_as("SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(user.id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut conn)
        .await?;
    Ok(Json(NotificationList {
        success: true,
        notifications,
        unread,
        total,
    }))
}

pub async fn mark_read(user: UserInfo, notification_id: Path<(String,)>, db: Data<PgPool>) -> Result<Json<UpdateResponse>, Error> {
    let notification_id = notification_id.into_inner().0;
    let res = query("UPDATE notifications SET is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(&notification_id)
        .bind(user.id)
        .execute(&mut db.acquire().await?)
        .await?;
    if res.rows_affected() == 0 {
        return Err(Error::NotFound("notification".into()));
    }
    Ok(Json(UpdateResponse::new(res.rows_affected())))
}

/// Records that the user followed the notification through to its target.
/// A click implies the notification was opened.
pub async fn mark_clicked(user: UserInfo, notification_id: Path<(String,)>, db: Data<PgPool>) -> Result<Json<UpdateResponse>, Error> {
    let notification_id = notification_id.into_inner().0;
    let res = query("UPDATE notifications SET clicked = TRUE, is_read = TRUE WHERE id = $1 AND user_id = $2")
        .bind(&notification_id)
        .bind(user.id)
        .execute(&mut db.acquire().await?)
        .await?;
    if res.rows_affected() == 0 {
        return Err(Error::NotFound("notification".into()));
    }
    Ok(Json(UpdateResponse::new(res.rows_affected())))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_rate_guards_division_by_zero() {
        assert_eq!(rate(5, 0), 0.0);
        assert_eq!(rate(3, 4), 0.75);
    }

    #[test]
    fn test_aggregate_stats_includes_click_rate() {
        let stats = aggregate_stats(StatCounters {
            broadcasts: 2,
            recipients: 10,
            delivered: 8,
            created: 8,
            read: 4,
            clicked: 2,
        });
        assert_eq!(stats.total_broadcasts, 2);
        assert_eq!(stats.delivery_success_rate, 0.8);
        assert_eq!(stats.open_rate, 0.5);
        assert_eq!(stats.click_rate, 0.25);
    }

    #[test]
    fn test_aggregate_stats_empty() {
        let stats = aggregate_stats(StatCounters {
            broadcasts: 0,
            recipients: 0,
            delivered: 0,
            created: 0,
            read: 0,
            clicked: 0,
        });
        assert_eq!(stats.delivery_success_rate, 0.0);
        assert_eq!(stats.open_rate, 0.0);
        assert_eq!(stats.click_rate, 0.0);
    }
}
