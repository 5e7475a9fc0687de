//! Backing key/value store, supervisor side

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::error::StorageError;

/// Store keyed by `(installation_id, key)` with optional per-entry TTL.
/// This is the trusted half of the storage proxy: workers never touch it
/// directly, and concurrent executions of different installations never see
/// each other's keys.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn get(
        &self,
        installation_id: &str,
        key: &str,
    ) -> Result<Option<JsonValue>, StorageError>;

    async fn set(
        &self,
        installation_id: &str,
        key: &str,
        value: JsonValue,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError>;

    async fn delete(&self, installation_id: &str, key: &str) -> Result<(), StorageError>;
}

struct StoredEntry {
    value: JsonValue,
    expires_at: Option<Instant>,
}

impl StoredEntry {
    fn is_expired(&self) -> bool {
        self.expires_at
            .is_some_and(|expires_at| Instant::now() > expires_at)
    }
}

/// In-memory store. Expired entries are dropped on read; `cleanup_expired`
/// sweeps the rest.
pub struct InMemoryStorage {
    entries: RwLock<HashMap<(String, String), StoredEntry>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Remove every expired entry, returning how many were dropped
    pub fn cleanup_expired(&self) -> usize {
        let mut entries = self.entries.write();
        let expired: Vec<(String, String)> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired())
            .map(|(key, _)| key.clone())
            .collect();

        let count = expired.len();
        for key in expired {
            entries.remove(&key);
        }
        count
    }

    /// Count of live (non-expired) entries
    pub fn len(&self) -> usize {
        let entries = self.entries.read();
        entries.values().filter(|entry| !entry.is_expired()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for InMemoryStorage {
    async fn get(
        &self,
        installation_id: &str,
        key: &str,
    ) -> Result<Option<JsonValue>, StorageError> {
        let full_key = (installation_id.to_string(), key.to_string());
        let mut entries = self.entries.write();
        match entries.get_mut(&full_key) {
            Some(entry) => {
                if entry.is_expired() {
                    entries.remove(&full_key);
                    Ok(None)
                } else {
                    Ok(Some(entry.value.clone()))
                }
            }
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        installation_id: &str,
        key: &str,
        value: JsonValue,
        ttl: Option<Duration>,
    ) -> Result<(), StorageError> {
        let full_key = (installation_id.to_string(), key.to_string());
        let entry = StoredEntry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().insert(full_key, entry);
        Ok(())
    }

    async fn delete(&self, installation_id: &str, key: &str) -> Result<(), StorageError> {
        let full_key = (installation_id.to_string(), key.to_string());
        self.entries.write().remove(&full_key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryStorage::new();

        assert_eq!(store.get("install-1", "k").await.unwrap(), None);

        store.set("install-1", "k", json!(5), None).await.unwrap();
        assert_eq!(store.get("install-1", "k").await.unwrap(), Some(json!(5)));

        store.delete("install-1", "k").await.unwrap();
        assert_eq!(store.get("install-1", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_keys_are_scoped_by_installation() {
        let store = InMemoryStorage::new();

        store.set("install-1", "k", json!("a"), None).await.unwrap();
        store.set("install-2", "k", json!("b"), None).await.unwrap();

        assert_eq!(
            store.get("install-1", "k").await.unwrap(),
            Some(json!("a"))
        );
        assert_eq!(
            store.get("install-2", "k").await.unwrap(),
            Some(json!("b"))
        );
    }

    #[tokio::test]
    async fn test_ttl_expiration() {
        let store = InMemoryStorage::new();

        store
            .set("install-1", "k", json!(1), Some(Duration::from_millis(50)))
            .await
            .unwrap();
        assert_eq!(store.get("install-1", "k").await.unwrap(), Some(json!(1)));

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(store.get("install-1", "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_cleanup_expired() {
        let store = InMemoryStorage::new();

        for i in 0..3 {
            store
                .set(
                    "install-1",
                    &format!("k{}", i),
                    json!(i),
                    Some(Duration::from_millis(30)),
                )
                .await
                .unwrap();
        }
        store.set("install-1", "keep", json!(9), None).await.unwrap();
        assert_eq!(store.len(), 4);

        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(store.cleanup_expired(), 3);
        assert_eq!(store.len(), 1);
        assert!(!store.is_empty());
    }
}
