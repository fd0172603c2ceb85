use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use sqlx::{FromRow, PgConnection};
use tracing::{debug, instrument};

/// An uploaded media asset
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Media {
    /// Unique media ID
    pub id: i64,
    /// Storage path relative to the service working directory
    pub path: String,
    /// Owning tweet, NULL while the media is pending association
    pub tweet_id: Option<i64>,
    /// When the record was created
    pub created_at: DateTime<Utc>,
}

/// Store for media rows. File contents live on disk and are managed by
/// [`crate::media_files::MediaFiles`]; this store only tracks paths and
/// the tweet association.
pub struct MediaStore {
    pool: PgPool,
}

impl MediaStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert an unattached media row for a file already written to disk
    #[instrument(skip(self))]
    pub async fn create_media(&self, path: &str) -> Result<Media> {
        let media = sqlx::query_as::<_, Media>(
            r#"
            INSERT INTO media (path)
            VALUES ($1)
            RETURNING id, path, tweet_id, created_at
            "#,
        )
        .bind(path)
        .fetch_one(&self.pool)
        .await
        .context("Failed to insert media row")?;

        debug!(media_id = media.id, path = %media.path, "Media row created");

        Ok(media)
    }

    /// Bulk-attach unattached media rows to a tweet.
    ///
    /// Permissive by design: ids that do not exist, or that are already
    /// attached to some tweet, affect zero rows and are not reported as
    /// errors. Returns the number of rows actually updated. Runs on the
    /// caller's connection so it can join the authoring transaction.
    pub async fn attach_media_to_tweet(
        &self,
        conn: &mut PgConnection,
        media_ids: &[i64],
        tweet_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            UPDATE media
            SET tweet_id = $1
            WHERE id = ANY($2) AND tweet_id IS NULL
            "#,
        )
        .bind(tweet_id)
        .bind(media_ids)
        .execute(&mut *conn)
        .await
        .context("Failed to attach media to tweet")?;

        Ok(result.rows_affected())
    }

    /// List the media attached to a tweet, ordered by id
    pub async fn list_media_for_tweet(&self, tweet_id: i64) -> Result<Vec<Media>> {
        let media = sqlx::query_as::<_, Media>(
            r#"
            SELECT id, path, tweet_id, created_at
            FROM media
            WHERE tweet_id = $1
            ORDER BY id
            "#,
        )
        .bind(tweet_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list media for tweet")?;

        Ok(media)
    }

    /// Delete all media rows attached to a tweet. Row deletion only; the
    /// caller removes the backing files. Returns the number of rows deleted.
    pub async fn delete_media_for_tweet(
        &self,
        conn: &mut PgConnection,
        tweet_id: i64,
    ) -> Result<u64> {
        let result = sqlx::query("DELETE FROM media WHERE tweet_id = $1")
            .bind(tweet_id)
            .execute(&mut *conn)
            .await
            .context("Failed to delete media rows")?;

        Ok(result.rows_affected())
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
    fn test_media_starts_unattached() {
        let media = Media {
            id: 1,
            path: "static/media/550e8400.jpg".to_string(),
            tweet_id: None,
            created_at: Utc::now(),
        };

        assert!(media.tweet_id.is_none());
    }
}
