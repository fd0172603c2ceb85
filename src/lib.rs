//! Chirp Service
//!
//! Minimal social-media backend: tweet posting, media upload, follow
//! relationships, and API-key authentication over an HTTP JSON interface,
//! backed by PostgreSQL.
//!
//! ## Features
//!
//! - **Tweet Authoring**: create tweets and attach previously uploaded
//!   media in one atomic transaction
//! - **Tweet Deletion**: ownership-checked removal of a tweet, its media
//!   rows, and their on-disk files
//! - **Media Upload**: collision-free on-disk storage with random names,
//!   indexed by an unattached media row
//! - **Identity**: API-key resolution, registration, and follow edges
//!
//! ## Architecture
//!
//! ```text
//! HTTP (axum)                 Filesystem                PostgreSQL
//! ┌──────────────┐           ┌──────────────┐          ┌──────────────┐
//! │ api          │           │ media dir    │          │ users        │
//! │ handlers     │──────────▶│  {uuid}.{ext}│          │ tweets       │
//! └──────────────┘           └──────────────┘          │ media        │
//!        │                          ▲                  │ followers    │
//!        ▼                          │                  └──────────────┘
//! ┌──────────────┐           ┌──────────────┐                 ▲
//! │ TweetWorkflow│──────────▶│ MediaFiles   │                 │
//! └──────────────┘           └──────────────┘                 │
//!        │                                                    │
//!        ▼                                                    │
//! ┌──────────────────────────────────────────┐                │
//! │ IdentityStore / TweetStore / MediaStore  │────────────────┘
//! └──────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod error;
pub mod identity_store;
pub mod media_files;
pub mod media_store;
pub mod tweet_store;
pub mod workflow;

pub use api::{create_router, start_api_server, AppState};
pub use config::Config;
pub use error::ApiError;
pub use identity_store::{IdentityStore, User, UserProfile, UserSummary};
pub use media_files::MediaFiles;
pub use media_store::{Media, MediaStore};
pub use tweet_store::{Tweet, TweetStore};
pub use workflow::{TweetWorkflow, MAX_TWEET_CHARS};
