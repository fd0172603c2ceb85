use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, PgConnection};
use tracing::{debug, instrument};

/// A tweet row. The author is fixed at creation and never changes.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tweet {
    /// Unique tweet ID, creation-ordered
    pub id: i64,
    /// Body text, at most 280 code points
    pub tweet_data: String,
    /// Owning user
    pub user_id: i64,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Store for tweet rows
pub struct TweetStore {
    pool: PgPool,
}

impl TweetStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a tweet on the caller's connection so the insert joins the
    /// authoring transaction. RETURNING makes the new id available before
    /// media attachment.
    pub async fn create_tweet(
        &self,
        conn: &mut PgConnection,
        author_id: i64,
        body: &str,
    ) -> Result<Tweet> {
        let tweet = sqlx::query_as::<_, Tweet>(
            r#"
            INSERT INTO tweets (tweet_data, user_id)
            VALUES ($1, $2)
            RETURNING id, tweet_data, user_id, created_at
            "#,
        )
        .bind(body)
        .bind(author_id)
        .fetch_one(&mut *conn)
        .await
        .context("Failed to insert tweet")?;

        debug!(tweet_id = tweet.id, user_id = author_id, "Tweet row created");

        Ok(tweet)
    }

    /// Get a tweet by id
    pub async fn get_tweet_by_id(&self, tweet_id: i64) -> Result<Option<Tweet>> {
        let tweet = sqlx::query_as::<_, Tweet>(
            r#"
            SELECT id, tweet_data, user_id, created_at
            FROM tweets
            WHERE id = $1
            "#,
        )
        .bind(tweet_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query tweet")?;

        Ok(tweet)
    }

    /// Authorization-scoped lookup: returns the tweet only when it is owned
    /// by `user_id`. A tweet owned by someone else comes back as `None`,
    /// identical to a nonexistent id, so callers cannot probe for other
    /// users' tweets.
    pub async fn get_tweet_owned_by(&self, user_id: i64, tweet_id: i64) -> Result<Option<Tweet>> {
        let tweet = sqlx::query_as::<_, Tweet>(
            r#"
            SELECT id, tweet_data, user_id, created_at
            FROM tweets
            WHERE id = $1 AND user_id = $2
            "#,
        )
        .bind(tweet_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query owned tweet")?;

        Ok(tweet)
    }

    /// Delete a tweet row on the caller's connection. Media rows must be
    /// deleted first within the same transaction; the FK has no cascade.
    #[instrument(skip(self, conn))]
    pub async fn delete_tweet(&self, conn: &mut PgConnection, tweet_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM tweets WHERE id = $1")
            .bind(tweet_id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete tweet")?;

        debug!(tweet_id, "Tweet row deleted");

        Ok(())
    }

    /// Get the connection pool (for sharing with workflows)
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tweet_serializes_expected_fields() {
        let tweet = Tweet {
            id: 1,
            tweet_data: "data test.".to_string(),
            user_id: 1,
            created_at: Utc::now(),
        };

        let value = serde_json::to_value(&tweet).unwrap();
        assert_eq!(value["id"], 1);
        assert_eq!(value["tweet_data"], "data test.");
        assert_eq!(value["user_id"], 1);
    }
}
