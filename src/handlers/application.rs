use actix_web::web::{Data, Json, Query};
use chrono::Utc;
use serde::Deserialize;
use serde_json::Value;
use sqlx::{query, query_as, query_scalar, PgPool};
use uuid::Uuid;

use crate::context::UserInfo;
use crate::error::Error;
use crate::models::application::{Application, ApplicationStatus, PaymentStatus};
use crate::request::Pagination;
use crate::response::{CreateResponse, List};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationCreation {
    pub institution_id: String,
    pub program_name: String,
    pub personal_details: Value,
    pub payment_reference: Option<String>,
    pub total_amount: f64,
}

/// Student submits an application with a claimed payment reference. The
/// payment stays pending until an admin verifies it.
pub async fn create(user: UserInfo, Json(data): Json<ApplicationCreation>, db: Data<PgPool>) -> Result<Json<CreateResponse>, Error> {
    if data.institution_id.trim().is_empty() || data.program_name.trim().is_empty() {
        return Err(Error::Validation("institutionId and programName are required".into()));
    }
    if !data.total_amount.is_finite() || data.total_amount < 0.0 {
        return Err(Error::Validation("totalAmount must be a non-negative number".into()));
    }
    let id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let payment_date = data.payment_reference.as_ref().map(|_| now);
    query(
        "INSERT INTO applications
         (id, user_id, institution_id, program_name, personal_details, payment_status, application_status, payment_reference, payment_date, total_amount, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $11)",
    )
    .bind(&id)
    .bind(user.id)
    .bind(&data.institution_id)
    .bind(&data.program_name)
    .bind(&data.personal_details)
    .bind(PaymentStatus::PendingVerification)
    .bind(ApplicationStatus::Draft)
    .bind(&data.payment_reference)
    .bind(payment_date)
    .bind(data.total_amount)
    .bind(now)
    .execute(&mut db.acquire().await?)
    .await?;
    Ok(Json(CreateResponse { id }))
}

pub async fn list(user: UserInfo, Query(page): Query<Pagination>, db: Data<PgPool>) -> Result<Json<List<Application>>, Error> {
    let mut conn = db.acquire().await?;
    let total: i64 = query_scalar("SELECT COUNT(*) FROM applications WHERE user_id = $1")
        .bind(user.id)
        .fetch_one(&mut conn)
        .await?;
    let apps: Vec<Application> = query_as("SELECT * FROM applications WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3")
        .bind(user.id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(&mut conn)
        .await?;
    Ok(Json(List::new(apps, total)))
}
