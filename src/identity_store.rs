use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use tracing::{debug, instrument};

/// A registered user
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    /// Unique user ID
    pub id: i64,
    /// Display name
    pub name: String,
    /// Opaque bearer credential, unique per user
    pub api_key: String,
    /// Role label ("user" unless set otherwise)
    pub role: String,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Minimal user view used in follower/following lists
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, PartialEq, Eq)]
pub struct UserSummary {
    pub id: i64,
    pub name: String,
}

/// A user together with eagerly loaded follow edges
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    /// Users following this user, ordered by id
    pub followers: Vec<UserSummary>,
    /// Users this user follows, ordered by id
    pub following: Vec<UserSummary>,
}

/// Store for users, API keys, and follow edges
pub struct IdentityStore {
    pool: PgPool,
}

impl IdentityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve an API key to a user. Absence is `None`, not an error.
    pub async fn find_user_by_api_key(&self, api_key: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, api_key, role, created_at
            FROM users
            WHERE api_key = $1
            "#,
        )
        .bind(api_key)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query user by API key")?;

        Ok(user)
    }

    /// Create a user with the given name and API key
    #[instrument(skip(self, api_key))]
    pub async fn create_user(&self, name: &str, api_key: &str) -> Result<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, api_key)
            VALUES ($1, $2)
            RETURNING id, name, api_key, role, created_at
            "#,
        )
        .bind(name)
        .bind(api_key)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert user")?;

        debug!(user_id = user.id, "User created");

        Ok(user)
    }

    /// Build a profile view with both follow edge sets loaded.
    /// The PK join keeps each list deduplicated; ordering is by user id.
    pub async fn user_profile(&self, user: &User) -> Result<UserProfile> {
        let followers = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.name
            FROM users u
            JOIN followers f ON u.id = f.follower_id
            WHERE f.followed_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query followers")?;

        let following = sqlx::query_as::<_, UserSummary>(
            r#"
            SELECT u.id, u.name
            FROM users u
            JOIN followers f ON u.id = f.followed_id
            WHERE f.follower_id = $1
            ORDER BY u.id
            "#,
        )
        .bind(user.id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query following")?;

        Ok(UserProfile {
            id: user.id,
            name: user.name.clone(),
            followers,
            following,
        })
    }

    /// Check that a user id exists
    pub async fn user_exists(&self, user_id: i64) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to query user by id")?;

        Ok(row.is_some())
    }

    /// Insert a follow edge. Idempotent: re-following affects zero rows.
    /// Returns whether a new edge was created.
    #[instrument(skip(self))]
    pub async fn create_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO followers (follower_id, followed_id)
            VALUES ($1, $2)
            ON CONFLICT (follower_id, followed_id) DO NOTHING
            "#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await
        .context("Failed to insert follow edge")?;

        Ok(result.rows_affected() > 0)
    }

    /// Remove a follow edge. Returns whether an edge existed.
    #[instrument(skip(self))]
    pub async fn delete_follow(&self, follower_id: i64, followed_id: i64) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM followers
            WHERE follower_id = $1 AND followed_id = $2
            "#,
        )
        .bind(follower_id)
        .bind(followed_id)
        .execute(&self.pool)
        .await
        .context("Failed to delete follow edge")?;

        Ok(result.rows_affected() > 0)
    }

    /// Get the connection pool (for health checks)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_summary_equality() {
        let a = UserSummary {
            id: 1,
            name: "test_user".to_string(),
        };
        let b = UserSummary {
            id: 1,
            name: "test_user".to_string(),
        };
        assert_eq!(a, b);
    }

    #[test]
    fn test_profile_serializes_edge_lists() {
        let profile = UserProfile {
            id: 1,
            name: "test_user".to_string(),
            followers: vec![],
            following: vec![UserSummary {
                id: 2,
                name: "other".to_string(),
            }],
        };

        let value = serde_json::to_value(&profile).unwrap();
        assert_eq!(value["followers"], serde_json::json!([]));
        assert_eq!(value["following"][0]["id"], 2);
    }
}
