use futures_util::future::BoxFuture;
use sqlx::{query_scalar, PgPool};

use crate::error::Error;

/// Symbolic recipient groups accepted by the admin broadcast endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientGroup {
    AllUsers,
    PendingPayments,
    VerifiedPayments,
    IncompleteProfiles,
}

impl RecipientGroup {
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "all_users" => Some(RecipientGroup::AllUsers),
            "pending_payments" => Some(RecipientGroup::PendingPayments),
            "verified_payments" => Some(RecipientGroup::VerifiedPayments),
            "incomplete_profiles" => Some(RecipientGroup::IncompleteProfiles),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipientTarget {
    User(i32),
    Group(RecipientGroup),
}

/// Parses the raw recipients list of a broadcast request. Numeric entries are
/// literal user ids, everything else must be a known group token.
pub fn parse_targets(raw: &[String]) -> Result<Vec<RecipientTarget>, Error> {
    raw.iter()
        .map(|entry| {
            if let Ok(id) = entry.parse::<i32>() {
                return Ok(RecipientTarget::User(id));
            }
            RecipientGroup::parse(entry)
                .map(RecipientTarget::Group)
                .ok_or_else(|| Error::Validation(format!("unknown recipient token: {}", entry)))
        })
        .collect()
}

/// Resolves a recipient group to concrete user ids. Group membership lives in
/// the user-management side of the schema, so the dispatcher only ever sees
/// the resolved ids.
pub trait RecipientResolver: 'static {
    fn resolve(&self, group: RecipientGroup) -> BoxFuture<'static, Result<Vec<i32>, Error>>;
}

#[derive(Clone)]
pub struct PgRecipientResolver {
    pool: PgPool,
}

impl PgRecipientResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecipientResolver for PgRecipientResolver {
    fn resolve(&self, group: RecipientGroup) -> BoxFuture<'static, Result<Vec<i32>, Error>> {
        let pool = self.pool.clone();
        Box::pin(async move {
            let ids: Vec<i32> = match group {
                RecipientGroup::AllUsers => {
                    query_scalar("SELECT id FROM users WHERE role = 'student'")
                        .fetch_all(&pool)
                        .await?
                }
                RecipientGroup::PendingPayments => {
                    query_scalar(
                        "SELECT DISTINCT user_id FROM applications WHERE payment_status = 'pending_verification'",
                    )
                    .fetch_all(&pool)
                    .await?
                }
                RecipientGroup::VerifiedPayments => {
                    query_scalar("SELECT DISTINCT user_id FROM applications WHERE payment_status = 'completed'")
                        .fetch_all(&pool)
                        .await?
                }
                RecipientGroup::IncompleteProfiles => {
                    query_scalar(
                        "SELECT u.id FROM users AS u
                         LEFT JOIN applications AS a ON u.id = a.user_id
                         WHERE u.role = 'student' AND a.id IS NULL",
                    )
                    .fetch_all(&pool)
                    .await?
                }
            };
            Ok(ids)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_targets_mixed() {
        let raw = vec!["12".to_string(), "all_users".to_string(), "7".to_string()];
        let targets = parse_targets(&raw).unwrap();
        assert_eq!(
            targets,
            vec![
                RecipientTarget::User(12),
                RecipientTarget::Group(RecipientGroup::AllUsers),
                RecipientTarget::User(7),
            ]
        );
    }

    #[test]
    fn test_parse_targets_unknown_token() {
        let raw = vec!["everyone".to_string()];
        match parse_targets(&raw) {
            Err(Error::Validation(msg)) => assert!(msg.contains("everyone")),
            other => panic!("expected validation error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_parse_group_tokens() {
        assert_eq!(RecipientGroup::parse("pending_payments"), Some(RecipientGroup::PendingPayments));
        assert_eq!(RecipientGroup::parse("incomplete_profiles"), Some(RecipientGroup::IncompleteProfiles));
        assert_eq!(RecipientGroup::parse("admins"), None);
    }
}
