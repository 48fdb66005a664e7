use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::api::{FeedPage, Tweet};

pub mod handler;
pub mod view;

pub const DEFAULT_FEED_LIMIT: i64 = 20;

/// Feed pages accumulated in fetch order, the way the page consumes them:
/// rendering flattens every page's tweets into one list, and the last
/// page's cursor drives the next load-more call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfiniteFeed {
    pub pages: Vec<FeedPage>,
}

impl InfiniteFeed {
    pub fn push_page(&mut self, page: FeedPage) {
        self.pages.push(page);
    }

    pub fn tweets(&self) -> impl Iterator<Item = &Tweet> {
        self.pages.iter().flat_map(|page| page.tweets.iter())
    }

    pub fn next_cursor(&self) -> Option<&str> {
        self.pages.last()?.next_cursor.as_deref()
    }

    #[allow(dead_code)]
    pub fn has_more(&self) -> bool {
        self.next_cursor().is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.tweets().next().is_none()
    }
}

/// Query parameters for feed pagination
#[derive(Debug, Deserialize, Validate)]
pub struct FeedQuery {
    pub cursor: Option<String>,
    #[validate(range(min = 1, max = 100, message = "limit must be between 1 and 100"))]
    pub limit: Option<i64>,
}
