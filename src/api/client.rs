use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use uuid::Uuid;

use crate::api::{FeedPage, Profile, ToggleFollow};

/// Port to the remote data API. Handlers depend on this trait rather than a
/// concrete transport so tests can substitute an in-memory implementation.
/// Retry, deduplication and upstream caching are the remote client's own
/// concern and are not reimplemented here.
#[async_trait]
pub trait ProfileApi: Send + Sync {
    /// Fetch a profile by id. `Ok(None)` means the upstream does not know
    /// the user.
    async fn profile_by_id(&self, id: Uuid, viewer_token: Option<&str>)
        -> Result<Option<Profile>>;

    /// Toggle the viewer's follow of `user_id`.
    async fn toggle_follow(&self, user_id: Uuid, viewer_token: &str) -> Result<ToggleFollow>;

    /// Fetch one page of a user's feed, starting from an opaque cursor.
    async fn profile_feed(
        &self,
        user_id: Uuid,
        cursor: Option<&str>,
        limit: i64,
        viewer_token: Option<&str>,
    ) -> Result<FeedPage>;
}

/// HTTP implementation talking to the sharex data API.
pub struct HttpProfileApi {
    base_url: String,
    client: Client,
}

impl HttpProfileApi {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn apply_auth(request: RequestBuilder, viewer_token: Option<&str>) -> RequestBuilder {
        match viewer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

#[async_trait]
impl ProfileApi for HttpProfileApi {
    async fn profile_by_id(
        &self,
        id: Uuid,
        viewer_token: Option<&str>,
    ) -> Result<Option<Profile>> {
        let url = self.api_url(&format!("profile/{}", id));
        let response = Self::apply_auth(self.client.get(&url), viewer_token)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let profile = response
            .error_for_status()?
            .json::<Profile>()
            .await
            .context("decoding profile response")?;

        Ok(Some(profile))
    }

    async fn toggle_follow(&self, user_id: Uuid, viewer_token: &str) -> Result<ToggleFollow> {
        let url = self.api_url(&format!("profile/{}/follow", user_id));
        let response = self
            .client
            .post(&url)
            .bearer_auth(viewer_token)
            .send()
            .await
            .with_context(|| format!("POST {}", url))?;

        let toggle = response
            .error_for_status()?
            .json::<ToggleFollow>()
            .await
            .context("decoding toggle-follow response")?;

        Ok(toggle)
    }

    async fn profile_feed(
        &self,
        user_id: Uuid,
        cursor: Option<&str>,
        limit: i64,
        viewer_token: Option<&str>,
    ) -> Result<FeedPage> {
        let url = self.api_url(&format!("profile/{}/tweets", user_id));
        let mut request = self.client.get(&url).query(&[("limit", limit)]);
        if let Some(cursor) = cursor {
            request = request.query(&[("cursor", cursor)]);
        }

        let response = Self::apply_auth(request, viewer_token)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;

        let page = response
            .error_for_status()?
            .json::<FeedPage>()
            .await
            .context("decoding feed response")?;

        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_joins_without_doubled_slashes() {
        let api = HttpProfileApi::new("http://upstream.test/api/");
        assert_eq!(
            api.api_url("/profile/abc"),
            "http://upstream.test/api/profile/abc"
        );
    }
}
