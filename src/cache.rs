//! Two-tier response cache: in-process TTL map plus an optional external
//! store. Cache unavailability degrades to always-miss and never errors
//! the caller.

use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// External cache collaborator. Both operations are fire-and-forget
/// tolerant: a failing store behaves like an empty one.
pub trait ExternalStore: Send + Sync {
    fn get(&self, key: &str) -> Option<Value>;
    fn set(&self, key: &str, value: Value, ttl: Duration);
}

struct LocalEntry {
    value: Value,
    expires_at: Instant,
}

/// In-process tier first, external tier second.
pub struct CacheManager {
    local: Mutex<HashMap<String, LocalEntry>>,
    external: Option<Box<dyn ExternalStore>>,
    default_ttl: Duration,
}

impl CacheManager {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            local: Mutex::new(HashMap::new()),
            external: None,
            default_ttl,
        }
    }

    pub fn with_external(mut self, store: Box<dyn ExternalStore>) -> Self {
        self.external = Some(store);
        self
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        {
            let mut local = self.local.lock().await;
            if let Some(entry) = local.get(key) {
                if entry.expires_at > Instant::now() {
                    debug!(key, "local cache hit");
                    return Some(entry.value.clone());
                }
                local.remove(key);
            }
        }

        if let Some(store) = &self.external {
            if let Some(value) = store.get(key) {
                debug!(key, "external cache hit");
                // Promote to the local tier.
                self.local.lock().await.insert(
                    key.to_string(),
                    LocalEntry {
                        value: value.clone(),
                        expires_at: Instant::now() + self.default_ttl,
                    },
                );
                return Some(value);
            }
        }

        None
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Option<Duration>) {
        let ttl = ttl.unwrap_or(self.default_ttl);
        self.local.lock().await.insert(
            key.to_string(),
            LocalEntry {
                value: value.clone(),
                expires_at: Instant::now() + ttl,
            },
        );

        if let Some(store) = &self.external {
            store.set(key, value, ttl);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;

    #[tokio::test]
    async fn test_local_set_get() {
        let cache = CacheManager::new(Duration::from_secs(60));
        cache.set("acct:travelgram", json!({"score": 71}), None).await;
        assert_eq!(
            cache.get("acct:travelgram").await,
            Some(json!({"score": 71}))
        );
        assert_eq!(cache.get("acct:other").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expiry() {
        let cache = CacheManager::new(Duration::from_secs(10));
        cache.set("k", json!(1), Some(Duration::from_secs(5))).await;
        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(cache.get("k").await, None);
    }

    struct FlakyStore {
        inner: StdMutex<HashMap<String, Value>>,
        available: bool,
    }

    impl ExternalStore for FlakyStore {
        fn get(&self, key: &str) -> Option<Value> {
            if !self.available {
                return None;
            }
            self.inner.lock().unwrap().get(key).cloned()
        }

        fn set(&self, key: &str, value: Value, _ttl: Duration) {
            if self.available {
                self.inner.lock().unwrap().insert(key.to_string(), value);
            }
        }
    }

    #[tokio::test]
    async fn test_unavailable_external_degrades_to_miss() {
        let cache = CacheManager::new(Duration::from_secs(60)).with_external(Box::new(
            FlakyStore {
                inner: StdMutex::new(HashMap::new()),
                available: false,
            },
        ));
        cache.set("k", json!("v"), None).await;
        // Local tier still works even though the external store drops writes.
        assert_eq!(cache.get("k").await, Some(json!("v")));
        assert_eq!(cache.get("unseen").await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_external_hit_promotes_to_local() {
        let store = FlakyStore {
            inner: StdMutex::new(HashMap::new()),
            available: true,
        };
        store.set("warm", json!(42), Duration::from_secs(60));

        let cache = CacheManager::new(Duration::from_secs(60)).with_external(Box::new(store));
        assert_eq!(cache.get("warm").await, Some(json!(42)));
    }
}
