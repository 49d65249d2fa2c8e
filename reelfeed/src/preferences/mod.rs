//! Durable user preferences.
//!
//! The feed reads and writes a handful of string values through the
//! [`PreferenceStore`] get/set contract. A missing value means "use the
//! default"; a store error is logged and treated the same way, so a broken
//! preference file never stops the feed.
//!
//! | Key | Meaning | Default |
//! |-----|---------|---------|
//! | `feed.last_position` | last confirmed active position | 0 |
//! | `feed.last_item_id` | id of the item at that position | none |
//! | `feed.muted` | mute preference for the playing item | `true` |

mod ini_store;

use std::collections::HashMap;

use thiserror::Error;

use crate::feed::ItemId;

pub use ini_store::IniPreferenceStore;

/// Last confirmed active position.
pub const KEY_LAST_POSITION: &str = "feed.last_position";

/// Id of the item at the last confirmed position.
pub const KEY_LAST_ITEM_ID: &str = "feed.last_item_id";

/// Mute preference.
pub const KEY_MUTED: &str = "feed.muted";

/// Errors from a preference store.
#[derive(Debug, Error)]
pub enum PreferenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preference file: {0}")]
    Parse(String),

    #[error("Invalid preference key '{0}' (expected section.key)")]
    InvalidKey(String),
}

/// Minimal key/value preference storage.
pub trait PreferenceStore: Send {
    /// Stored value for `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError>;

    /// Store `value` under `key`.
    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError>;
}

/// Non-persistent store.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferenceStore {
    values: HashMap<String, String>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate a value.
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.values.insert(key.to_string(), value.into());
        self
    }
}

impl PreferenceStore for MemoryPreferenceStore {
    fn get(&self, key: &str) -> Result<Option<String>, PreferenceError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), PreferenceError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Position saved by a previous session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SavedPosition {
    pub position: Option<usize>,
    pub item_id: Option<ItemId>,
}

/// Read a value, logging and discarding store errors.
fn read(store: &dyn PreferenceStore, key: &str) -> Option<String> {
    match store.get(key) {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key, error = %e, "Failed to read preference, using default");
            None
        }
    }
}

/// Saved position and item id; unparseable values count as absent.
pub fn load_saved_position(store: &dyn PreferenceStore) -> SavedPosition {
    SavedPosition {
        position: read(store, KEY_LAST_POSITION).and_then(|v| v.trim().parse().ok()),
        item_id: read(store, KEY_LAST_ITEM_ID)
            .filter(|v| !v.is_empty())
            .map(ItemId::new),
    }
}

/// Mute preference, muted unless explicitly `false`.
pub fn load_muted(store: &dyn PreferenceStore) -> bool {
    match read(store, KEY_MUTED).as_deref().map(str::trim) {
        Some("false") | Some("0") => false,
        _ => true,
    }
}

/// Write a value, logging store errors.
pub fn write(store: &mut dyn PreferenceStore, key: &str, value: &str) {
    if let Err(e) = store.set(key, value) {
        tracing::warn!(key, error = %e, "Failed to persist preference");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct BrokenStore;

    impl PreferenceStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, PreferenceError> {
            Err(PreferenceError::Parse("corrupt".into()))
        }

        fn set(&mut self, _key: &str, _value: &str) -> Result<(), PreferenceError> {
            Err(PreferenceError::Io(std::io::Error::other("read-only")))
        }
    }

    #[test]
    fn test_defaults_when_absent() {
        let store = MemoryPreferenceStore::new();
        assert_eq!(load_saved_position(&store), SavedPosition::default());
        assert!(load_muted(&store));
    }

    #[test]
    fn test_saved_position_parsed() {
        let store = MemoryPreferenceStore::new()
            .with(KEY_LAST_POSITION, "12")
            .with(KEY_LAST_ITEM_ID, "abc");
        let saved = load_saved_position(&store);
        assert_eq!(saved.position, Some(12));
        assert_eq!(saved.item_id, Some(ItemId::new("abc")));
    }

    #[test]
    fn test_garbage_position_ignored() {
        let store = MemoryPreferenceStore::new().with(KEY_LAST_POSITION, "twelve");
        assert_eq!(load_saved_position(&store).position, None);
    }

    #[test]
    fn test_muted_false() {
        let store = MemoryPreferenceStore::new().with(KEY_MUTED, "false");
        assert!(!load_muted(&store));
    }

    #[test]
    fn test_broken_store_falls_back() {
        let mut store = BrokenStore;
        assert!(load_muted(&store));
        assert_eq!(load_saved_position(&store), SavedPosition::default());
        write(&mut store, KEY_MUTED, "true");
    }
}
