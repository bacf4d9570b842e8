//! Cross-widget persisted state.
//!
//! Widgets persist user choices (row limits, selected APIs, the date-time
//! range picker's sync flag) under well-known keys. The store is a single
//! shared map from key to JSON value where the last writer wins; typed access
//! goes through serde.

pub mod drilldown;
pub mod params;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;

pub use drilldown::DrillDown;
pub use params::{DateTimeRangeParams, ErrorAnalysisParams, LimitParams};

/// Row limit used when none (or a non-positive one) is stored.
pub const DEFAULT_LIMIT: i64 = 5;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("Stored value under '{key}' has an unexpected shape: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Value for '{key}' cannot be stored: {source}")]
    Encode {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Cloneable handle over the shared key/value map.
#[derive(Debug, Clone, Default)]
pub struct GlobalStateStore {
    inner: Arc<RwLock<HashMap<String, serde_json::Value>>>,
}

impl GlobalStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // A panic while holding the lock cannot leave the map half-written, so
    // poisoning is ignored.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, serde_json::Value>> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, serde_json::Value>> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get_raw(&self, key: &str) -> Option<serde_json::Value> {
        self.read().get(key).cloned()
    }

    pub fn set_raw(&self, key: impl Into<String>, value: serde_json::Value) {
        self.write().insert(key.into(), value);
    }

    /// Typed read. `Ok(None)` when the key is unset.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StateError> {
        match self.get_raw(key) {
            None => Ok(None),
            Some(raw) => serde_json::from_value(raw)
                .map(Some)
                .map_err(|source| StateError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Typed read that falls back to `T::default()` when the key is unset or
    /// holds something of another shape.
    pub fn get_or_default<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        match self.get(key) {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!("[GlobalStateStore] {}; using defaults", e);
                T::default()
            }
        }
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StateError> {
        let raw = serde_json::to_value(value).map_err(|source| StateError::Encode {
            key: key.to_string(),
            source,
        })?;
        self.set_raw(key, raw);
        Ok(())
    }

    /// Read-modify-write of a typed entry under one write lock.
    pub fn update<T, F>(&self, key: &str, f: F) -> Result<T, StateError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnOnce(&mut T),
    {
        let mut map = self.write();
        let mut value: T = match map.get(key) {
            None => T::default(),
            Some(raw) => {
                serde_json::from_value(raw.clone()).map_err(|source| StateError::Decode {
                    key: key.to_string(),
                    source,
                })?
            }
        };
        f(&mut value);
        let raw = serde_json::to_value(&value).map_err(|source| StateError::Encode {
            key: key.to_string(),
            source,
        })?;
        map.insert(key.to_string(), raw);
        Ok(value)
    }

    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.write().remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().contains_key(key)
    }

    pub fn snapshot(&self) -> HashMap<String, serde_json::Value> {
        self.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Counter {
        n: i64,
    }

    #[test]
    fn test_typed_round_trip() {
        let store = GlobalStateStore::new();
        assert_eq!(store.get::<Counter>("c").unwrap(), None);
        store.set("c", &Counter { n: 3 }).unwrap();
        assert_eq!(store.get::<Counter>("c").unwrap(), Some(Counter { n: 3 }));
    }

    #[test]
    fn test_clones_share_state_and_last_writer_wins() {
        let a = GlobalStateStore::new();
        let b = a.clone();
        a.set("k", &1).unwrap();
        b.set("k", &2).unwrap();
        assert_eq!(a.get::<i64>("k").unwrap(), Some(2));
    }

    #[test]
    fn test_decode_error_names_key() {
        let store = GlobalStateStore::new();
        store.set_raw("c", serde_json::json!("text"));
        let err = store.get::<Counter>("c").unwrap_err();
        assert!(err.to_string().contains("'c'"));
        assert_eq!(store.get_or_default::<Counter>("c"), Counter::default());
    }

    #[test]
    fn test_update_starts_from_default() {
        let store = GlobalStateStore::new();
        let out = store.update("c", |c: &mut Counter| c.n += 2).unwrap();
        assert_eq!(out, Counter { n: 2 });
        store.update("c", |c: &mut Counter| c.n *= 10).unwrap();
        assert_eq!(store.get::<Counter>("c").unwrap(), Some(Counter { n: 20 }));
    }

    #[test]
    fn test_remove_and_snapshot() {
        let store = GlobalStateStore::new();
        store.set("a", &1).unwrap();
        store.set("b", &2).unwrap();
        assert_eq!(store.remove("a"), Some(serde_json::json!(1)));
        let snap = store.snapshot();
        assert_eq!(snap.len(), 1);
        assert!(snap.contains_key("b"));
    }
}
