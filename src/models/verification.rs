use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::application::{ApplicationStatus, PaymentStatus};
use crate::models::notification::NotificationType;

/// The admin's decision on a claimed payment. Only two values are accepted on
/// the wire; anything else is a validation error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "verification_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    /// The pair of statuses an application moves to once the decision lands.
    pub fn transition(&self) -> (PaymentStatus, ApplicationStatus) {
        match self {
            VerificationStatus::Verified => (PaymentStatus::Completed, ApplicationStatus::Submitted),
            VerificationStatus::Rejected => (PaymentStatus::Failed, ApplicationStatus::PaymentFailed),
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            VerificationStatus::Verified => NotificationType::PaymentVerified,
            VerificationStatus::Rejected => NotificationType::PaymentRejected,
        }
    }
}

/// Append-only audit record. One row per admin decision, never updated and
/// never deleted. Re-verifying the same application appends a second row.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VerificationLogEntry {
    pub id: String,
    pub application_id: String,
    pub verification_status: VerificationStatus,
    pub verified_by: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_accepts_only_two_values() {
        assert_eq!(VerificationStatus::parse("verified"), Some(VerificationStatus::Verified));
        assert_eq!(VerificationStatus::parse("rejected"), Some(VerificationStatus::Rejected));
        assert_eq!(VerificationStatus::parse("approved"), None);
        assert_eq!(VerificationStatus::parse("VERIFIED"), None);
        assert_eq!(VerificationStatus::parse(""), None);
    }

    #[test]
    fn test_verified_transition() {
        let (pay, app) = VerificationStatus::Verified.transition();
        assert_eq!(pay, PaymentStatus::Completed);
        assert_eq!(app, ApplicationStatus::Submitted);
    }

    #[test]
    fn test_rejected_transition() {
        let (pay, app) = VerificationStatus::Rejected.transition();
        assert_eq!(pay, PaymentStatus::Failed);
        assert_eq!(app, ApplicationStatus::PaymentFailed);
    }

    #[test]
    fn test_notification_types() {
        assert_eq!(VerificationStatus::Verified.notification_type(), NotificationType::PaymentVerified);
        assert_eq!(VerificationStatus::Rejected.notification_type(), NotificationType::PaymentRejected);
    }
}
