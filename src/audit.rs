use chrono::Utc;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

const UNKNOWN_USER_ID: &str = "unknown";
const FALLBACK_USER_NAME: &str = "Admin";

/// Who performed a mutating operation. Missing identity never blocks the
/// operation; placeholders are substituted instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub user_name: String,
}

impl Actor {
    pub fn resolve(user_id: Option<String>, user_name: Option<String>) -> Self {
        let clean = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            user_id: clean(user_id).unwrap_or_else(|| UNKNOWN_USER_ID.to_string()),
            user_name: clean(user_name).unwrap_or_else(|| FALLBACK_USER_NAME.to_string()),
        }
    }
}

/// Records an activity entry. Failures are logged and swallowed: the
/// operation being described has already happened.
pub async fn log_activity(pool: &PgPool, actor: &Actor, action: &str, message: &str) {
    info!(
        audit.action = %action,
        audit.user_id = %actor.user_id,
        audit.user_name = %actor.user_name,
        "{message}"
    );

    let result = sqlx::query(
        r#"
        INSERT INTO assessment_tracker.activity_log
        (id, user_id, user_name, action, message, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(&actor.user_id)
    .bind(&actor.user_name)
    .bind(action)
    .bind(message)
    .bind(Utc::now())
    .execute(pool)
    .await;

    if let Err(err) = result {
        warn!(error = %err, audit.action = %action, "failed to write activity log entry");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_gets_placeholders() {
        let actor = Actor::resolve(None, Some("   ".to_string()));
        assert_eq!(actor.user_id, "unknown");
        assert_eq!(actor.user_name, "Admin");
    }

    #[test]
    fn provided_identity_is_kept() {
        let actor = Actor::resolve(Some("u-42".to_string()), Some("Sam Okafor".to_string()));
        assert_eq!(
            actor,
            Actor {
                user_id: "u-42".to_string(),
                user_name: "Sam Okafor".to_string(),
            }
        );
    }
}
