use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub mod client;

/// A user profile as served by the upstream data API, with follow stats
/// resolved for the requesting viewer. Transient view-state only; nothing
/// here is persisted by this service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    /// Accounts created through some providers have no display name yet;
    /// such profiles render as not found.
    pub name: Option<String>,
    pub image: Option<String>,
    pub tweets_count: i64,
    pub followers_count: i64,
    pub follows_count: i64,
    /// Whether the current viewer follows this user.
    pub is_following: bool,
}

/// Author info embedded in a feed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TweetAuthor {
    pub id: Uuid,
    pub name: String,
    pub image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tweet {
    pub id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub like_count: i64,
    pub author: TweetAuthor,
}

/// One page of a user's feed. The cursor is opaque; `None` means the feed
/// is exhausted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedPage {
    pub tweets: Vec<Tweet>,
    pub next_cursor: Option<String>,
}

/// Result of a follow toggle: whether a follow was added (true) or
/// removed (false).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ToggleFollow {
    pub added_follow: bool,
}
