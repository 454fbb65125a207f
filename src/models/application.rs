use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    PendingVerification,
    Completed,
    Failed,
}

impl PaymentStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "pending_verification" => Some(PaymentStatus::PendingVerification),
            "completed" => Some(PaymentStatus::Completed),
            "failed" => Some(PaymentStatus::Failed),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "application_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Draft,
    Submitted,
    PaymentFailed,
}

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub user_id: i32,
    pub institution_id: String,
    pub program_name: String,
    pub personal_details: Value,
    pub payment_status: PaymentStatus,
    pub application_status: ApplicationStatus,
    pub payment_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub total_amount: f64,
    pub verified_at: Option<DateTime<Utc>>,
    pub verified_by: Option<String>,
    pub verification_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Contact fields pulled out of the semi-structured personal-details blob
/// captured during profile creation. The blob comes from a form and its key
/// names drifted over time, so lookups try the known spellings.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentSummary {
    pub student_name: String,
    pub student_email: Option<String>,
    pub student_phone: Option<String>,
}

fn first_string(details: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|k| details.get(k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_owned)
}

pub fn student_summary(details: &Value) -> StudentSummary {
    let name = first_string(details, &["fullName", "full_name", "name"]).or_else(|| {
        let first = first_string(details, &["firstName", "first_name"]);
        let last = first_string(details, &["lastName", "last_name", "surname"]);
        match (first, last) {
            (Some(f), Some(l)) => Some(format!("{} {}", f, l)),
            (Some(f), None) => Some(f),
            (None, Some(l)) => Some(l),
            (None, None) => None,
        }
    });
    StudentSummary {
        student_name: name.unwrap_or_else(|| "Unknown".into()),
        student_email: first_string(details, &["email", "emailAddress", "email_address"]),
        student_phone: first_string(details, &["phone", "phoneNumber", "phone_number", "contactNumber"]),
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_summary_from_split_name() {
        let details = json!({"firstName": "Thabo", "lastName": "Nkosi", "email": "thabo@example.co.za", "phone": "+27821234567"});
        let s = student_summary(&details);
        assert_eq!(s.student_name, "Thabo Nkosi");
        assert_eq!(s.student_email.as_deref(), Some("thabo@example.co.za"));
        assert_eq!(s.student_phone.as_deref(), Some("+27821234567"));
    }

    #[test]
    fn test_summary_prefers_full_name() {
        let details = json!({"fullName": "Lerato Dlamini", "firstName": "Lerato"});
        assert_eq!(student_summary(&details).student_name, "Lerato Dlamini");
    }

    #[test]
    fn test_summary_snake_case_keys() {
        let details = json!({"first_name": "Sipho", "surname": "Zulu", "phone_number": "0731112222"});
        let s = student_summary(&details);
        assert_eq!(s.student_name, "Sipho Zulu");
        assert_eq!(s.student_phone.as_deref(), Some("0731112222"));
    }

    #[test]
    fn test_summary_empty_blob() {
        let s = student_summary(&json!({}));
        assert_eq!(s.student_name, "Unknown");
        assert!(s.student_email.is_none());
        assert!(s.student_phone.is_none());
    }

    #[test]
    fn test_blank_strings_skipped() {
        let details = json!({"name": "   ", "firstName": "Zanele"});
        assert_eq!(student_summary(&details).student_name, "Zanele");
    }

    #[test]
    fn test_payment_status_parse() {
        assert_eq!(PaymentStatus::parse("pending_verification"), Some(PaymentStatus::PendingVerification));
        assert_eq!(PaymentStatus::parse("completed"), Some(PaymentStatus::Completed));
        assert_eq!(PaymentStatus::parse("refunded"), None);
    }
}
