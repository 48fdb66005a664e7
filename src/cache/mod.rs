use std::collections::HashMap;
use std::fmt;
use std::future::Future;

use anyhow::Result;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Signature of a cached query: the operation name plus its parameters.
///
/// The cache is in-process and shared across requests, so any query whose
/// result depends on who is asking carries the viewer id in its signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    op: &'static str,
    params: String,
}

impl QueryKey {
    pub fn profile_by_id(id: Uuid, viewer: Option<Uuid>) -> Self {
        Self {
            op: "profile.getById",
            params: format!("{}:viewer={}", id, viewer_param(viewer)),
        }
    }

    pub fn profile_feed(user_id: Uuid, viewer: Option<Uuid>) -> Self {
        Self {
            op: "tweet.infiniteProfileFeed",
            params: format!("{}:viewer={}", user_id, viewer_param(viewer)),
        }
    }
}

fn viewer_param(viewer: Option<Uuid>) -> String {
    match viewer {
        Some(id) => id.to_string(),
        None => "anon".to_string(),
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.op, self.params)
    }
}

/// One cache entry serialized for client bootstrap.
#[derive(Debug, Serialize)]
pub struct DehydratedQuery {
    pub key: String,
    pub data: Value,
}

/// The cache payload embedded in the rendered page, mirroring the entries
/// the server used so a hydrating client starts from the same state.
#[derive(Debug, Serialize)]
pub struct DehydratedState {
    pub queries: Vec<DehydratedQuery>,
}

/// Explicit query cache: get-or-load reads, an explicit patch operation for
/// post-mutation updates, and a change stream for subscribers. Values are
/// stored as JSON so one map serves every query shape.
pub struct QueryCache {
    entries: RwLock<HashMap<QueryKey, Value>>,
    changes: broadcast::Sender<QueryKey>,
}

impl QueryCache {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(64);
        Self {
            entries: RwLock::new(HashMap::new()),
            changes,
        }
    }

    /// Returns the cached value for `key`, or runs `load` and caches its
    /// result. Failed loads cache nothing.
    pub async fn fetch<T, F, Fut>(&self, key: QueryKey, load: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if let Some(cached) = self.get(&key).await {
            return Ok(cached);
        }

        let value = load().await?;
        self.insert(key, &value).await;
        Ok(value)
    }

    pub async fn get<T>(&self, key: &QueryKey) -> Option<T>
    where
        T: DeserializeOwned,
    {
        let entries = self.entries.read().await;
        let value = entries.get(key)?.clone();
        serde_json::from_value(value).ok()
    }

    pub async fn insert<T>(&self, key: QueryKey, value: &T)
    where
        T: Serialize,
    {
        let json = match serde_json::to_value(value) {
            Ok(json) => json,
            Err(err) => {
                tracing::error!("failed to serialize cache entry for {}: {:?}", key, err);
                return;
            }
        };

        self.entries.write().await.insert(key.clone(), json);
        let _ = self.changes.send(key);
    }

    /// Applies `f` to the cached value for `key`, if present. Returns
    /// whether a patch happened. Entries that fail to decode are left
    /// untouched.
    pub async fn patch<T>(&self, key: &QueryKey, f: impl FnOnce(T) -> T) -> bool
    where
        T: Serialize + DeserializeOwned,
    {
        let mut entries = self.entries.write().await;

        let Some(current) = entries
            .get(key)
            .and_then(|value| serde_json::from_value::<T>(value.clone()).ok())
        else {
            return false;
        };

        let patched = f(current);
        match serde_json::to_value(&patched) {
            Ok(json) => {
                entries.insert(key.clone(), json);
                drop(entries);
                let _ = self.changes.send(key.clone());
                true
            }
            Err(err) => {
                tracing::error!("failed to serialize patched entry for {}: {:?}", key, err);
                false
            }
        }
    }

    #[allow(dead_code)]
    pub async fn invalidate(&self, key: &QueryKey) {
        if self.entries.write().await.remove(key).is_some() {
            let _ = self.changes.send(key.clone());
        }
    }

    /// Change stream: receives the key of every entry inserted, patched or
    /// invalidated after the call.
    #[allow(dead_code)]
    pub fn subscribe(&self) -> broadcast::Receiver<QueryKey> {
        self.changes.subscribe()
    }

    /// Serializes the named entries for client bootstrap. Keys with no
    /// cached entry are skipped.
    pub async fn dehydrate(&self, keys: &[QueryKey]) -> DehydratedState {
        let entries = self.entries.read().await;
        let queries = keys
            .iter()
            .filter_map(|key| {
                entries.get(key).map(|value| DehydratedQuery {
                    key: key.to_string(),
                    data: value.clone(),
                })
            })
            .collect();

        DehydratedState { queries }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Profile;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_profile() -> Profile {
        Profile {
            id: Uuid::new_v4(),
            name: Some("casey".to_string()),
            image: None,
            tweets_count: 3,
            followers_count: 10,
            follows_count: 2,
            is_following: false,
        }
    }

    #[tokio::test]
    async fn fetch_loads_once_and_serves_from_cache() {
        let cache = QueryCache::new();
        let profile = sample_profile();
        let key = QueryKey::profile_by_id(profile.id, None);
        let loads = AtomicUsize::new(0);

        for _ in 0..3 {
            let fetched: Profile = cache
                .fetch(key.clone(), || async {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(profile.clone())
                })
                .await
                .unwrap();
            assert_eq!(fetched.followers_count, 10);
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failed_load_caches_nothing() {
        let cache = QueryCache::new();
        let key = QueryKey::profile_by_id(Uuid::new_v4(), None);

        let result: Result<Profile> = cache
            .fetch(key.clone(), || async { Err(anyhow::anyhow!("upstream down")) })
            .await;

        assert!(result.is_err());
        assert!(cache.get::<Profile>(&key).await.is_none());
    }

    #[tokio::test]
    async fn patch_rewrites_entry_and_notifies_subscribers() {
        let cache = QueryCache::new();
        let profile = sample_profile();
        let key = QueryKey::profile_by_id(profile.id, None);
        cache.insert(key.clone(), &profile).await;

        let mut changes = cache.subscribe();

        let patched = cache
            .patch::<Profile>(&key, |mut p| {
                p.is_following = true;
                p.followers_count += 1;
                p
            })
            .await;
        assert!(patched);

        let updated: Profile = cache.get(&key).await.unwrap();
        assert!(updated.is_following);
        assert_eq!(updated.followers_count, 11);

        assert_eq!(changes.recv().await.unwrap(), key);
    }

    #[tokio::test]
    async fn patch_on_missing_entry_is_a_noop() {
        let cache = QueryCache::new();
        let key = QueryKey::profile_by_id(Uuid::new_v4(), None);

        let patched = cache.patch::<Profile>(&key, |p| p).await;

        assert!(!patched);
    }

    #[tokio::test]
    async fn dehydrate_includes_only_present_entries() {
        let cache = QueryCache::new();
        let profile = sample_profile();
        let present = QueryKey::profile_by_id(profile.id, None);
        let absent = QueryKey::profile_feed(profile.id, None);
        cache.insert(present.clone(), &profile).await;

        let state = cache.dehydrate(&[present.clone(), absent]).await;

        assert_eq!(state.queries.len(), 1);
        assert_eq!(state.queries[0].key, present.to_string());
        assert_eq!(state.queries[0].data["followers_count"], 10);
    }

    #[tokio::test]
    async fn keys_separate_viewers() {
        let id = Uuid::new_v4();
        let anon = QueryKey::profile_by_id(id, None);
        let viewer = QueryKey::profile_by_id(id, Some(Uuid::new_v4()));

        assert_ne!(anon, viewer);
    }
}
