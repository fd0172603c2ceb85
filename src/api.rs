use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::identity_store::{IdentityStore, UserProfile};
use crate::media_files::content_type_for_path;
use crate::media_store::Media;
use crate::workflow::TweetWorkflow;
use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, HeaderMap, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::path::{Component, PathBuf};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<TweetWorkflow>,
    pub identity: Arc<IdentityStore>,
    pub static_dir: PathBuf,
    pub max_upload_bytes: usize,
}

/// Request body for tweet creation
#[derive(Debug, Deserialize)]
pub struct CreateTweetRequest {
    /// Tweet body text
    pub tweet_data: String,
    /// Previously uploaded, unattached media ids
    #[serde(default)]
    pub tweet_media_ids: Vec<i64>,
}

/// Response for tweet creation
#[derive(Debug, Serialize)]
pub struct CreateTweetResponse {
    pub result: bool,
    pub tweet_id: i64,
}

/// Response for the profile endpoint
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub result: bool,
    pub user: UserProfile,
}

/// Media view in tweet responses
#[derive(Debug, Serialize)]
pub struct MediaView {
    pub id: i64,
    pub path: String,
}

impl From<Media> for MediaView {
    fn from(m: Media) -> Self {
        Self {
            id: m.id,
            path: m.path,
        }
    }
}

/// Tweet view with its attached media
#[derive(Debug, Serialize)]
pub struct TweetView {
    pub id: i64,
    pub tweet_data: String,
    pub author_id: i64,
    pub media: Vec<MediaView>,
}

/// Response for the tweet read endpoint
#[derive(Debug, Serialize)]
pub struct TweetResponse {
    pub result: bool,
    pub tweet: TweetView,
}

/// Response for media upload
#[derive(Debug, Serialize)]
pub struct UploadMediaResponse {
    pub media_id: i64,
}

/// Request body for user registration
#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub name: String,
    /// Client-chosen API key; generated when omitted
    pub api_key: Option<String>,
}

/// Response for user registration
#[derive(Debug, Serialize)]
pub struct RegisterUserResponse {
    pub response: String,
    pub api_key: String,
}

/// Plain success response
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub result: bool,
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/api/users/me", get(get_me))
        .route(
            "/api/users/:user_id/follow",
            post(follow_user).delete(unfollow_user),
        )
        .route("/api/tweets", post(create_tweet))
        .route("/api/tweets/:tweet_id", get(get_tweet).delete(delete_tweet))
        .route("/api/medias", post(upload_media))
        .route("/api/user", post(register_user))
        .fallback(serve_frontend)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Extract the caller's API key from the `api-key` header
fn api_key(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get("api-key")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::InvalidInput("missing api-key header".to_string()))
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "chirp-service"
    }))
}

/// Readiness check endpoint
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match sqlx::query("SELECT 1").fetch_one(state.identity.pool()).await {
        Ok(_) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "ready",
                "database": "connected"
            })),
        ),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({
                "status": "not_ready",
                "database": "disconnected",
                "error": e.to_string()
            })),
        ),
    }
}

/// Get the caller's own profile with follower/following lists
#[instrument(skip(state, headers))]
async fn get_me(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ProfileResponse>, ApiError> {
    let key = api_key(&headers)?;
    let user = state.workflow.user_profile(key).await?;

    Ok(Json(ProfileResponse { result: true, user }))
}

/// Create a tweet, attaching any referenced media
#[instrument(skip(state, headers, request))]
async fn create_tweet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CreateTweetRequest>,
) -> Result<(StatusCode, Json<CreateTweetResponse>), ApiError> {
    let key = api_key(&headers)?;
    let tweet_id = state
        .workflow
        .publish_tweet(key, &request.tweet_data, &request.tweet_media_ids)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateTweetResponse {
            result: true,
            tweet_id,
        }),
    ))
}

/// Get a tweet with its media
#[instrument(skip(state))]
async fn get_tweet(
    State(state): State<AppState>,
    Path(tweet_id): Path<i64>,
) -> Result<Json<TweetResponse>, ApiError> {
    let (tweet, media) = state.workflow.get_tweet(tweet_id).await?;

    Ok(Json(TweetResponse {
        result: true,
        tweet: TweetView {
            id: tweet.id,
            tweet_data: tweet.tweet_data,
            author_id: tweet.user_id,
            media: media.into_iter().map(Into::into).collect(),
        },
    }))
}

/// Delete a tweet the caller owns, with its media rows and files
#[instrument(skip(state, headers))]
async fn delete_tweet(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tweet_id): Path<i64>,
) -> Result<Json<ResultResponse>, ApiError> {
    let key = api_key(&headers)?;
    state.workflow.delete_tweet(key, tweet_id).await?;

    Ok(Json(ResultResponse { result: true }))
}

/// Accept a multipart file upload and record an unattached media row
#[instrument(skip(state, multipart))]
async fn upload_media(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadMediaResponse>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::InvalidInput(format!("malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field.file_name().map(str::to_owned);
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::InvalidInput(format!("failed to read upload: {}", e)))?;

        let media_id = state
            .workflow
            .upload_media(filename.as_deref(), &data)
            .await?;

        return Ok(Json(UploadMediaResponse { media_id }));
    }

    Err(ApiError::InvalidInput(
        "multipart body has no file part".to_string(),
    ))
}

/// Register a new user
#[instrument(skip(state, request))]
async fn register_user(
    State(state): State<AppState>,
    Json(request): Json<RegisterUserRequest>,
) -> Result<(StatusCode, Json<RegisterUserResponse>), ApiError> {
    if request.name.is_empty() {
        return Err(ApiError::InvalidInput("name must not be empty".to_string()));
    }

    let key = request
        .api_key
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let user = state
        .identity
        .create_user(&request.name, &key)
        .await
        .map_err(ApiError::Internal)?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterUserResponse {
            response: "user successfully created".to_string(),
            api_key: user.api_key,
        }),
    ))
}

/// Follow the user in the path
#[instrument(skip(state, headers))]
async fn follow_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<ResultResponse>), ApiError> {
    let key = api_key(&headers)?;
    state.workflow.follow(key, user_id).await?;

    Ok((StatusCode::CREATED, Json(ResultResponse { result: true })))
}

/// Remove a follow edge to the user in the path
#[instrument(skip(state, headers))]
async fn unfollow_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(user_id): Path<i64>,
) -> Result<Json<ResultResponse>, ApiError> {
    let key = api_key(&headers)?;
    state.workflow.unfollow(key, user_id).await?;

    Ok(Json(ResultResponse { result: true }))
}

/// Catch-all: unmatched `/api/*` is a JSON 404; anything else is served
/// from the static directory, falling back to the SPA index.
async fn serve_frontend(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    if path.starts_with("api/") {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "result": false,
                "error": "API route not found"
            })),
        )
            .into_response();
    }

    if let Some(candidate) = resolve_static_path(&state.static_dir, path) {
        if let Ok(bytes) = tokio::fs::read(&candidate).await {
            let content_type = content_type_for_path(&candidate);
            return ([(header::CONTENT_TYPE, content_type)], bytes).into_response();
        }
    }

    let index = state.static_dir.join("index.html");
    match tokio::fs::read(&index).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
            bytes,
        )
            .into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Join a request path onto the static dir, rejecting traversal components
fn resolve_static_path(static_dir: &std::path::Path, request_path: &str) -> Option<PathBuf> {
    if request_path.is_empty() {
        return None;
    }

    let relative = PathBuf::from(request_path);
    if relative
        .components()
        .any(|c| !matches!(c, Component::Normal(_)))
    {
        return None;
    }

    Some(static_dir.join(relative))
}

/// Start the HTTP API server
pub async fn start_api_server(state: AppState, config: &ApiConfig) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .await
        .context("API server error")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_tweet_request_media_ids_default_empty() {
        let request: CreateTweetRequest =
            serde_json::from_str(r#"{"tweet_data": "data test."}"#).unwrap();
        assert_eq!(request.tweet_data, "data test.");
        assert!(request.tweet_media_ids.is_empty());
    }

    #[test]
    fn test_create_tweet_response_shape() {
        let response = CreateTweetResponse {
            result: true,
            tweet_id: 1,
        };
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, serde_json::json!({"result": true, "tweet_id": 1}));
    }

    #[test]
    fn test_upload_response_shape() {
        let value = serde_json::to_value(UploadMediaResponse { media_id: 1 }).unwrap();
        assert_eq!(value, serde_json::json!({"media_id": 1}));
    }

    #[test]
    fn test_api_key_header_extraction() {
        let mut headers = HeaderMap::new();
        assert!(api_key(&headers).is_err());

        headers.insert("api-key", "test".parse().unwrap());
        assert_eq!(api_key(&headers).unwrap(), "test");
    }

    #[test]
    fn test_resolve_static_path_rejects_traversal() {
        let dir = std::path::Path::new("/srv/static");
        assert!(resolve_static_path(dir, "../etc/passwd").is_none());
        assert!(resolve_static_path(dir, "/etc/passwd").is_none());
        assert!(resolve_static_path(dir, "").is_none());

        let ok = resolve_static_path(dir, "js/app.js").unwrap();
        assert_eq!(ok, PathBuf::from("/srv/static/js/app.js"));
    }
}
