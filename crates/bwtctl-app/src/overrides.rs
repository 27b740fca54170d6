//! In-memory runtime override layer
//!
//! Overrides take precedence over persisted settings and are never written
//! to disk. They disappear with the process.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::host::OverrideKey;

#[derive(Debug, Default)]
pub struct OverrideLayer {
    values: Mutex<BTreeMap<OverrideKey, toml::Value>>,
}

impl OverrideLayer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: OverrideKey) -> Option<toml::Value> {
        self.lock().get(&key).cloned()
    }

    /// Set an override, returning the value it replaced
    pub fn set(&self, key: OverrideKey, value: toml::Value) -> Option<toml::Value> {
        self.lock().insert(key, value)
    }

    pub fn remove(&self, key: OverrideKey) -> Option<toml::Value> {
        self.lock().remove(&key)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<OverrideKey, toml::Value>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get_remove() {
        let layer = OverrideLayer::new();
        assert!(layer.get(OverrideKey::Server).is_none());

        assert!(layer
            .set(OverrideKey::Server, toml::Value::from("a:1:t"))
            .is_none());
        let previous = layer.set(OverrideKey::Server, toml::Value::from("b:2:t"));
        assert_eq!(previous, Some(toml::Value::from("a:1:t")));
        assert_eq!(layer.get(OverrideKey::Server), Some(toml::Value::from("b:2:t")));

        assert!(layer.remove(OverrideKey::Server).is_some());
        assert!(layer.get(OverrideKey::Server).is_none());
        assert!(layer.is_empty());
    }
}
