use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    api::Profile,
    cache::QueryKey,
    error::AppError,
    profiles::{view, FeedQuery, InfiniteFeed, DEFAULT_FEED_LIMIT},
    response::ApiResponse,
    session::Session,
    SharedApi, SharedCache,
};

/// Landing page, also the redirect target for profile routes without an id.
pub async fn home() -> Html<String> {
    Html(view::home_page())
}

/// GET /profiles (no id): nothing to resolve, send the viewer home.
pub async fn profiles_index() -> Redirect {
    Redirect::to("/")
}

/// Cached profile lookup. Upstream misses are not cached, so an account
/// created after a miss is picked up on the next request.
async fn fetch_profile(
    api: &SharedApi,
    cache: &SharedCache,
    id: Uuid,
    viewer: Option<Uuid>,
    viewer_token: Option<&str>,
) -> Result<Option<Profile>, AppError> {
    let key = QueryKey::profile_by_id(id, viewer);

    if let Some(profile) = cache.get::<Profile>(&key).await {
        return Ok(Some(profile));
    }

    match api.profile_by_id(id, viewer_token).await {
        Ok(Some(profile)) => {
            cache.insert(key, &profile).await;
            Ok(Some(profile))
        }
        Ok(None) => Ok(None),
        Err(err) => {
            tracing::error!("profile fetch for {} failed: {:?}", id, err);
            Err(AppError::BadGateway(
                "Profile service unavailable".to_string(),
            ))
        }
    }
}

fn not_found_response() -> Response {
    (StatusCode::NOT_FOUND, Html(view::not_found_page())).into_response()
}

/// GET /profiles/:id
///
/// Resolves the route parameter, pre-fetches the profile into the query
/// cache, ensures the first feed page is loaded, and renders the document
/// with a dehydrated cache payload for the hydrating client. Unknown ids
/// are resolved on demand; there is no pre-built path set.
pub async fn profile_page(
    State(api): State<SharedApi>,
    State(cache): State<SharedCache>,
    session: Option<Session>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let viewer = session.as_ref().map(|s| s.user_id);
    let token = session.as_ref().map(|s| s.token.clone());

    let profile = match fetch_profile(&api, &cache, id, viewer, token.as_deref()).await? {
        Some(profile) => profile,
        None => return Ok(not_found_response()),
    };

    // A profile without a display name renders as not found rather than a
    // half-empty page.
    let name = match profile.name.clone() {
        Some(name) => name,
        None => return Ok(not_found_response()),
    };

    let feed_key = QueryKey::profile_feed(id, viewer);
    let feed_result = cache
        .fetch(feed_key.clone(), || async {
            let page = api
                .profile_feed(id, None, DEFAULT_FEED_LIMIT, token.as_deref())
                .await?;
            let mut feed = InfiniteFeed::default();
            feed.push_page(page);
            Ok(feed)
        })
        .await;

    // A feed failure surfaces through the list's own error indicator; the
    // rest of the page still renders.
    let (feed, feed_error) = match feed_result {
        Ok(feed) => (Some(feed), false),
        Err(err) => {
            tracing::error!("feed fetch for {} failed: {:?}", id, err);
            (None, true)
        }
    };

    let profile_key = QueryKey::profile_by_id(id, viewer);
    let state = cache.dehydrate(&[profile_key, feed_key]).await;

    let html = view::profile_page(
        &profile,
        &name,
        feed.as_ref(),
        feed_error,
        session.as_ref(),
        &state,
    );
    Ok(Html(html).into_response())
}

/// GET /api/profile/:id
pub async fn get_profile(
    State(api): State<SharedApi>,
    State(cache): State<SharedCache>,
    session: Option<Session>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let viewer = session.as_ref().map(|s| s.user_id);
    let token = session.as_ref().map(|s| s.token.clone());

    let profile = fetch_profile(&api, &cache, id, viewer, token.as_deref())
        .await?
        .ok_or(AppError::NotFound("Profile not found".to_string()))?;

    Ok(ApiResponse::success(profile))
}

/// GET /api/profile/:id/feed
///
/// Fetches the next feed page from upstream and appends it to the viewer's
/// accumulated feed, so a later page render sees the same flattened list
/// the client built up.
pub async fn get_profile_feed(
    State(api): State<SharedApi>,
    State(cache): State<SharedCache>,
    session: Option<Session>,
    Path(id): Path<Uuid>,
    Query(query): Query<FeedQuery>,
) -> Result<impl IntoResponse, AppError> {
    query
        .validate()
        .map_err(|e| AppError::UnprocessableEntity(e.to_string()))?;

    let viewer = session.as_ref().map(|s| s.user_id);
    let token = session.as_ref().map(|s| s.token.clone());
    let limit = query.limit.unwrap_or(DEFAULT_FEED_LIMIT);

    let page = api
        .profile_feed(id, query.cursor.as_deref(), limit, token.as_deref())
        .await
        .map_err(|err| {
            tracing::error!("feed fetch for {} failed: {:?}", id, err);
            AppError::BadGateway("Feed service unavailable".to_string())
        })?;

    let feed_key = QueryKey::profile_feed(id, viewer);
    let appended = {
        let page = page.clone();
        cache
            .patch::<InfiniteFeed>(&feed_key, |mut feed| {
                feed.push_page(page);
                feed
            })
            .await
    };
    if !appended {
        let mut feed = InfiniteFeed::default();
        feed.push_page(page.clone());
        cache.insert(feed_key, &feed).await;
    }

    Ok(ApiResponse::success(page))
}

/// POST /api/profile/:id/follow
pub async fn toggle_follow(
    State(api): State<SharedApi>,
    State(cache): State<SharedCache>,
    session: Session,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    // Can't follow yourself
    if session.user_id == id {
        return Err(AppError::UnprocessableEntity(
            "You cannot follow yourself".to_string(),
        ));
    }

    let toggle = api.toggle_follow(id, &session.token).await.map_err(|err| {
        tracing::error!("follow toggle for {} failed: {:?}", id, err);
        AppError::BadGateway("Follow service unavailable".to_string())
    })?;

    // Patch the cached profile in place instead of re-fetching: the follow
    // flag takes the toggle direction and the follower count moves by
    // exactly one the same way.
    let key = QueryKey::profile_by_id(id, Some(session.user_id));
    let delta: i64 = if toggle.added_follow { 1 } else { -1 };
    let patched = cache
        .patch::<Profile>(&key, |mut profile| {
            profile.is_following = toggle.added_follow;
            profile.followers_count += delta;
            profile
        })
        .await;

    tracing::debug!(
        "follow toggled for {}: added={} cache_patched={}",
        id,
        toggle.added_follow,
        patched
    );

    Ok(ApiResponse::success(toggle))
}
