//! Persistent Storage Abstraction
//!
//! Key-value storage owned by the host. The registry is persisted through it as
//! one serialized document per user.

use async_trait::async_trait;

use crate::error::Result;

/// Key-value settings storage trait
///
/// Abstracts platform-specific persistent storage:
/// - Desktop: config files or OS-specific preferences
/// - Mobile: UserDefaults / SharedPreferences
/// - Web: localStorage / IndexedDB
///
/// Each `set_*` call must be atomic: a reader never observes a partially
/// written value.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn save_preference(store: &dyn SettingsStore) -> Result<()> {
///     store.set_bool("default_public_playlists", true).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a string value
    async fn set_string(&self, key: &str, value: &str) -> Result<()>;

    /// Retrieve a string value
    async fn get_string(&self, key: &str) -> Result<Option<String>>;

    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()> {
        self.set_string(key, if value { "true" } else { "false" })
            .await
    }

    /// Retrieve a boolean value
    async fn get_bool(&self, key: &str) -> Result<Option<bool>> {
        Ok(self
            .get_string(key)
            .await?
            .map(|value| value.eq_ignore_ascii_case("true")))
    }

    /// Delete a setting
    async fn delete(&self, key: &str) -> Result<()>;

    /// Check if a setting exists
    async fn has_key(&self, key: &str) -> Result<bool> {
        Ok(self.get_string(key).await?.is_some())
    }

    /// List all setting keys
    async fn list_keys(&self) -> Result<Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        values: Mutex<HashMap<String, String>>,
    }

    #[async_trait]
    impl SettingsStore for MemoryStore {
        async fn set_string(&self, key: &str, value: &str) -> Result<()> {
            self.values
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn get_string(&self, key: &str) -> Result<Option<String>> {
            Ok(self.values.lock().unwrap().get(key).cloned())
        }

        async fn delete(&self, key: &str) -> Result<()> {
            self.values.lock().unwrap().remove(key);
            Ok(())
        }

        async fn list_keys(&self) -> Result<Vec<String>> {
            Ok(self.values.lock().unwrap().keys().cloned().collect())
        }
    }

    #[tokio::test]
    async fn test_bool_defaults_round_through_strings() {
        let store = MemoryStore::default();
        store.set_bool("public", true).await.unwrap();

        assert_eq!(store.get_string("public").await.unwrap(), Some("true".into()));
        assert_eq!(store.get_bool("public").await.unwrap(), Some(true));
        assert!(store.has_key("public").await.unwrap());

        store.delete("public").await.unwrap();
        assert_eq!(store.get_bool("public").await.unwrap(), None);
    }
}
