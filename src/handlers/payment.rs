use actix_web::web::{Data, Json, Path, Query};
use chrono::{DateTime, Utc};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{query, query_as, query_scalar, PgPool};
use uuid::Uuid;

use crate::context::AdminInfo;
use crate::effects::SideEffects;
use crate::error::Error;
use crate::handlers::notification::create_notification;
use crate::mailer::{Mailer, OutgoingMail};
use crate::models::application::{student_summary, Application, PaymentStatus};
use crate::models::verification::{VerificationLogEntry, VerificationStatus};
use crate::request::Pagination;
use crate::response::List;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub application_id: Option<String>,
    pub status: Option<String>,
    pub admin_notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub success: bool,
    pub message: String,
    pub application_id: String,
    pub status: VerificationStatus,
    pub verified_by: String,
    pub timestamp: DateTime<Utc>,
}

/// Student-facing message for a verification decision. A rejection embeds the
/// admin's notes so the student knows what to fix.
pub fn notification_content(status: VerificationStatus, program_name: &str, notes: Option<&str>) -> (String, String) {
    match status {
        VerificationStatus::Verified => (
            "Payment Verified".into(),
            format!(
                "Your application fee payment for {} has been verified. Your application has been submitted.",
                program_name
            ),
        ),
        VerificationStatus::Rejected => {
            let mut message = format!("Your application fee payment for {} could not be verified.", program_name);
            if let Some(notes) = notes.map(str::trim).filter(|n| !n.is_empty()) {
                message.push_str(&format!(" Reason: {}.", notes));
            }
            message.push_str(" Please submit a new proof of payment or contact support.");
            ("Payment Rejected".into(), message)
        }
    }
}

/// Checks required fields before anything touches the database. Returns the
/// application id, the parsed decision and the notes.
fn validate(req: VerifyRequest) -> Result<(String, VerificationStatus, Option<String>), Error> {
    let VerifyRequest {
        application_id,
        status,
        admin_notes,
    } = req;
    let application_id = application_id
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| Error::Validation("applicationId is required".into()))?;
    let raw_status = status.ok_or_else(|| Error::Validation("status is required".into()))?;
    let status = VerificationStatus::parse(&raw_status)
        .ok_or_else(|| Error::Validation(format!("status must be \"verified\" or \"rejected\", got \"{}\"", raw_status)))?;
    Ok((application_id, status, admin_notes))
}

/// Records the admin's decision on a claimed payment.
///
/// The application update is the only write that can fail this request. The
/// student notification, the email and the audit log entry run afterwards as
/// independent best-effort steps; a second decision on the same application is
/// accepted and simply appends another audit row.
pub async fn verify<M: Mailer>(admin: AdminInfo, Json(req): Json<VerifyRequest>, db: Data<PgPool>, mailer: Data<M>) -> Result<Json<VerifyResponse>, Error> {
    let (application_id, status, admin_notes) = validate(req)?;
    let verified_by = admin.0.nickname;

    let app: Application = query_as("SELECT * FROM applications WHERE id = $1")
        .bind(&application_id)
        .fetch_optional(&mut db.acquire().await?)
        .await?
        .ok_or_else(|| Error::NotFound("application".into()))?;

    let (payment_status, application_status) = status.transition();
    let now = Utc::now();
    query(
        "UPDATE applications
         SET payment_status = $1, application_status = $2, verified_at = $3, verified_by = $4, verification_notes = $5, updated_at = $3
         WHERE id = $6",
    )
    .bind(payment_status)
    .bind(application_status)
    .bind(now)
    .bind(&verified_by)
    .bind(&admin_notes)
    .bind(&app.id)
    .execute(&mut db.acquire().await?)
    .await?;

    // The decision is committed. Everything below must not fail the request.
    let (title, message) = notification_content(status, &app.program_name, admin_notes.as_deref());
    let mut effects = SideEffects::new();
    effects
        .run("notification", async {
            create_notification(
                &db,
                app.user_id,
                status.notification_type(),
                &title,
                &message,
                json!({ "applicationId": app.id, "verificationStatus": status.as_str() }),
            )
            .await
            .map(|_| ())
        })
        .await;
    effects
        .run("email", async {
            let to = match student_summary(&app.personal_details).student_email {
                Some(email) => email,
                None => {
                    query_scalar("SELECT email FROM users WHERE id = $1")
                        .bind(app.user_id)
                        .fetch_one(&mut db.acquire().await?)
                        .await?
                }
            };
            mailer
                .send(OutgoingMail {
                    to,
                    subject: title.clone(),
                    body: message.clone(),
                })
                .await
        })
        .await;
    effects
        .run("audit_log", async {
            query("INSERT INTO verification_logs (id, application_id, verification_status, verified_by, notes, created_at) VALUES ($1, $2, $3, $4, $5, $6)")
                .bind(Uuid::new_v4().to_string())
                .bind(&app.id)
                .bind(status)
                .bind(&verified_by)
                .bind(&admin_notes)
                .bind(now)
                .execute(&mut db.acquire().await?)
                .await
                .map(|_| ())
                .map_err(Error::from)
        })
        .await;
    let failed = effects.failed_steps();
    if !failed.is_empty() {
        warn!("payment verification for {} committed, but side effects failed: {:?}", app.id, failed);
    }

    Ok(Json(VerifyResponse {
        success: true,
        message: format!("Payment {}", status.as_str()),
        application_id: app.id,
        status,
        verified_by,
        timestamp: now,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentEntry {
    pub application_id: String,
    pub user_id: i32,
    pub student_name: String,
    pub student_email: Option<String>,
    pub student_phone: Option<String>,
    pub institution_id: String,
    pub program_name: String,
    pub payment_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub total_amount: f64,
    pub payment_status: PaymentStatus,
    pub submitted_at: DateTime<Utc>,
}

impl From<Application> for PaymentEntry {
    fn from(app: Application) -> Self {
        let summary = student_summary(&app.personal_details);
        PaymentEntry {
            application_id: app.id,
            user_id: app.user_id,
            student_name: summary.student_name,
            student_email: summary.student_email,
            student_phone: summary.student_phone,
            institution_id: app.institution_id,
            program_name: app.program_name,
            payment_reference: app.payment_reference,
            payment_date: app.payment_date,
            total_amount: app.total_amount,
            payment_status: app.payment_status,
            submitted_at: app.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentList {
    pub success: bool,
    pub applications: Vec<PaymentEntry>,
    pub total: i64,
    pub offset: i64,
    pub limit: i64,
}

pub async fn list(_admin: AdminInfo, Query(q): Query<ListQuery>, db: Data<PgPool>) -> Result<Json<PaymentList>, Error> {
    let status = match q.status.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => PaymentStatus::parse(raw).ok_or_else(|| Error::Validation(format!("unknown payment status: {}", raw)))?,
        None => PaymentStatus::PendingVerification,
    };
    let page = Pagination { limit: q.limit, offset: q.offset };
    let mut conn = db.acquire().await?;
    let total: i64 = query_scalar("SELECT COUNT(*) FROM applications WHERE payment_status = $1")
        .bind(status)
        .fetch_one(&mut conn)
        .await?;
    let apps: Vec<Application> = query_as("SELECT * FROM applications WHERE payment_status = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut conn)
        .await?;
    Ok(Json(PaymentList {
        success: true,
        applications: apps.into_iter().map(PaymentEntry::from).collect(),
        total,
        offset: page.offset(),
        limit: page.limit(),
    }))
}

/// Audit trail for one application, newest decision first. Re-verification
/// shows up here as multiple rows.
pub async fn logs(_admin: AdminInfo, application_id: Path<(String,)>, db: Data<PgPool>) -> Result<Json<List<VerificationLogEntry>>, Error> {
    let application_id = application_id.into_inner().0;
    let mut conn = db.acquire().await?;
    let exists: bool = query_scalar("SELECT EXISTS(SELECT id FROM applications WHERE id = $1)")
        .bind(&application_id)
        .fetch_one(&mut conn)
        .await?;
    if !exists {
        return Err(Error::NotFound("application".into()));
    }
    let entries: Vec<VerificationLogEntry> = query_as("SELECT * FROM verification_logs WHERE application_id = $1 ORDER BY created_at DESC")
        .bind(&application_id)
        .fetch_all(&mut conn)
        .await?;
    let total = entries.len() as i64;
    Ok(Json(List::new(entries, total)))
}

#[cfg(test)]
mod test {
    use super::*;

    fn request(application_id: Option<&str>, status: Option<&str>, notes: Option<&str>) -> VerifyRequest {
        VerifyRequest {
            application_id: application_id.map(str::to_owned),
            status: status.map(str::to_owned),
            admin_notes: notes.map(str::to_owned),
        }
    }

    fn validation_message(res: Result<(String, VerificationStatus, Option<String>), Error>) -> String {
        match res {
            Err(Error::Validation(msg)) => msg,
            other => panic!("expected validation error, got {:?}", other.map(|v| v.0)),
        }
    }

    #[test]
    fn test_validate_accepts_well_formed_request() {
        let (id, status, notes) = validate(request(Some("A1"), Some("verified"), Some("matches bank statement"))).unwrap();
        assert_eq!(id, "A1");
        assert_eq!(status, VerificationStatus::Verified);
        assert_eq!(notes.as_deref(), Some("matches bank statement"));
    }

    #[test]
    fn test_validate_missing_application_id() {
        let msg = validation_message(validate(request(None, Some("verified"), None)));
        assert!(msg.contains("applicationId"));
    }

    #[test]
    fn test_validate_blank_application_id() {
        let msg = validation_message(validate(request(Some("   "), Some("rejected"), None)));
        assert!(msg.contains("applicationId"));
    }

    #[test]
    fn test_validate_missing_status() {
        let msg = validation_message(validate(request(Some("A1"), None, None)));
        assert!(msg.contains("status"));
    }

    #[test]
    fn test_validate_unknown_status() {
        let msg = validation_message(validate(request(Some("A1"), Some("approved"), None)));
        assert!(msg.contains("approved"));
    }

    #[test]
    fn test_verified_content_mentions_program() {
        let (title, message) = notification_content(VerificationStatus::Verified, "BSc Computer Science", None);
        assert_eq!(title, "Payment Verified");
        assert!(message.contains("BSc Computer Science"));
        assert!(message.contains("submitted"));
    }

    #[test]
    fn test_rejected_content_embeds_notes() {
        let (title, message) = notification_content(VerificationStatus::Rejected, "BCom Accounting", Some("card declined"));
        assert_eq!(title, "Payment Rejected");
        assert!(message.contains("card declined"));
    }

    #[test]
    fn test_rejected_content_without_notes() {
        let (_, message) = notification_content(VerificationStatus::Rejected, "BCom Accounting", None);
        assert!(!message.contains("Reason"));
        assert!(message.contains("could not be verified"));
    }

    #[test]
    fn test_blank_notes_ignored() {
        let (_, message) = notification_content(VerificationStatus::Rejected, "BCom Accounting", Some("   "));
        assert!(!message.contains("Reason"));
    }
}
