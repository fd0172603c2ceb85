//! Tweet authoring and lifecycle workflows.
//!
//! Each mutating workflow resolves the caller's API key, then performs its
//! store writes inside one transaction acquired from the shared pool, so a
//! request either commits everything or persists nothing. The filesystem is
//! touched outside the transaction: during upload (before the row insert)
//! and during deletion (best effort, before the row deletes).

use crate::error::ApiError;
use crate::identity_store::{IdentityStore, User, UserProfile};
use crate::media_files::MediaFiles;
use crate::media_store::{Media, MediaStore};
use crate::tweet_store::{Tweet, TweetStore};
use anyhow::Context;
use sqlx::postgres::PgPool;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Maximum tweet body length in code points
pub const MAX_TWEET_CHARS: usize = 280;

/// Orchestrates authentication, tweet creation/deletion, and media upload
/// over the stores.
pub struct TweetWorkflow {
    identity: Arc<IdentityStore>,
    tweets: Arc<TweetStore>,
    media: Arc<MediaStore>,
    files: Arc<MediaFiles>,
    pool: PgPool,
}

impl TweetWorkflow {
    pub fn new(
        identity: Arc<IdentityStore>,
        tweets: Arc<TweetStore>,
        media: Arc<MediaStore>,
        files: Arc<MediaFiles>,
        pool: PgPool,
    ) -> Self {
        Self {
            identity,
            tweets,
            media,
            files,
            pool,
        }
    }

    /// Resolve an API key to a user. An unknown key surfaces as `NotFound`,
    /// matching the behavior callers observe on every authenticated route.
    pub async fn authenticate(&self, api_key: &str) -> Result<User, ApiError> {
        self.identity
            .find_user_by_api_key(api_key)
            .await?
            .ok_or_else(|| ApiError::NotFound("user not found".to_string()))
    }

    /// Load the caller's profile with follow edge sets
    pub async fn user_profile(&self, api_key: &str) -> Result<UserProfile, ApiError> {
        let user = self.authenticate(api_key).await?;
        Ok(self.identity.user_profile(&user).await?)
    }

    /// Create a tweet, attaching previously uploaded media in the same
    /// transaction.
    ///
    /// Media attachment is best effort: ids that do not exist or are
    /// already attached elsewhere are silently skipped. There is no dedup
    /// key, so identical submissions create distinct tweets.
    #[instrument(skip(self, api_key, body), fields(media_count = media_ids.len()))]
    pub async fn publish_tweet(
        &self,
        api_key: &str,
        body: &str,
        media_ids: &[i64],
    ) -> Result<i64, ApiError> {
        let user = self.authenticate(api_key).await?;
        validate_tweet_body(body)?;

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin authoring transaction")?;

        let tweet = self.tweets.create_tweet(&mut tx, user.id, body).await?;

        if !media_ids.is_empty() {
            let attached = self
                .media
                .attach_media_to_tweet(&mut tx, media_ids, tweet.id)
                .await?;

            debug!(
                tweet_id = tweet.id,
                requested = media_ids.len(),
                attached,
                "Media attached to tweet"
            );
        }

        tx.commit()
            .await
            .context("Failed to commit authoring transaction")?;

        info!(tweet_id = tweet.id, user_id = user.id, "Tweet published");
        metrics::counter!("chirp.tweets.created").increment(1);

        Ok(tweet.id)
    }

    /// Store an uploaded file and record an unattached media row.
    ///
    /// The file write and the row insert are two separate steps, not one
    /// transaction; a crash between them can orphan the file or leave a row
    /// pointing at nothing. Known gap, kept as-is.
    #[instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn upload_media(
        &self,
        original_name: Option<&str>,
        data: &[u8],
    ) -> Result<i64, ApiError> {
        let original_name = original_name
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ApiError::InvalidInput("file has no filename".to_string()))?;

        let path = self.files.store(original_name, data).await?;
        let media = self.media.create_media(&path).await?;

        info!(media_id = media.id, path = %media.path, "Media uploaded");
        metrics::counter!("chirp.media.uploaded").increment(1);

        Ok(media.id)
    }

    /// Load a tweet with its attached media
    pub async fn get_tweet(&self, tweet_id: i64) -> Result<(Tweet, Vec<Media>), ApiError> {
        let tweet = self
            .tweets
            .get_tweet_by_id(tweet_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("tweet not found".to_string()))?;

        let media = self.media.list_media_for_tweet(tweet.id).await?;

        Ok((tweet, media))
    }

    /// Delete a tweet the caller owns, together with its media rows and
    /// their backing files.
    ///
    /// A nonexistent tweet and a tweet owned by someone else produce the
    /// same error, so existence of other users' tweets never leaks. File
    /// removal happens before the row deletes and is best effort: the
    /// must-deliver outcome is store consistency, and a missing or
    /// undeletable file only earns a warning.
    #[instrument(skip(self, api_key))]
    pub async fn delete_tweet(&self, api_key: &str, tweet_id: i64) -> Result<(), ApiError> {
        let user = self.authenticate(api_key).await?;

        let tweet = self
            .tweets
            .get_tweet_owned_by(user.id, tweet_id)
            .await?
            .ok_or_else(|| {
                ApiError::Forbidden("tweet not found or not owned by caller".to_string())
            })?;

        let media = self.media.list_media_for_tweet(tweet.id).await?;

        for item in &media {
            if self.files.exists(&item.path).await {
                if !self.files.remove(&item.path).await {
                    warn!(media_id = item.id, path = %item.path, "Leaving media file behind");
                }
            }
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin deletion transaction")?;

        let removed_rows = self.media.delete_media_for_tweet(&mut tx, tweet.id).await?;
        self.tweets.delete_tweet(&mut tx, tweet.id).await?;

        tx.commit()
            .await
            .context("Failed to commit deletion transaction")?;

        info!(
            tweet_id = tweet.id,
            user_id = user.id,
            media_rows = removed_rows,
            "Tweet deleted"
        );
        metrics::counter!("chirp.tweets.deleted").increment(1);

        Ok(())
    }

    /// Follow another user. Re-following is a no-op; the target must exist.
    pub async fn follow(&self, api_key: &str, target_id: i64) -> Result<(), ApiError> {
        let user = self.authenticate(api_key).await?;

        if !self.identity.user_exists(target_id).await? {
            return Err(ApiError::NotFound("user not found".to_string()));
        }

        self.identity.create_follow(user.id, target_id).await?;

        Ok(())
    }

    /// Remove a follow edge. Removing an absent edge is a no-op.
    pub async fn unfollow(&self, api_key: &str, target_id: i64) -> Result<(), ApiError> {
        let user = self.authenticate(api_key).await?;

        if !self.identity.user_exists(target_id).await? {
            return Err(ApiError::NotFound("user not found".to_string()));
        }

        self.identity.delete_follow(user.id, target_id).await?;

        Ok(())
    }
}

/// Reject tweet bodies over the length bound
pub fn validate_tweet_body(body: &str) -> Result<(), ApiError> {
    if body.chars().count() > MAX_TWEET_CHARS {
        return Err(ApiError::InvalidInput(format!(
            "tweet body exceeds {} characters",
            MAX_TWEET_CHARS
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_at_limit_is_accepted() {
        let body = "x".repeat(MAX_TWEET_CHARS);
        assert!(validate_tweet_body(&body).is_ok());
    }

    #[test]
    fn test_body_over_limit_is_rejected() {
        let body = "x".repeat(MAX_TWEET_CHARS + 1);
        let err = validate_tweet_body(&body).unwrap_err();
        assert!(matches!(err, ApiError::InvalidInput(_)));
    }

    #[test]
    fn test_body_limit_counts_code_points_not_bytes() {
        // 280 multibyte characters are within the limit even though the
        // byte length is far beyond 280.
        let body = "ф".repeat(MAX_TWEET_CHARS);
        assert!(body.len() > MAX_TWEET_CHARS);
        assert!(validate_tweet_body(&body).is_ok());
    }

    #[test]
    fn test_empty_body_is_accepted() {
        assert!(validate_tweet_body("").is_ok());
    }
}
