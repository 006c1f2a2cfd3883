//! Durable key-value store behind the workbench tree's UI state.
//!
//! Two kinds of values live here, each as JSON text under its own key: the expanded folder set
//! of every workspace section, and the tree configuration overrides.

use std::{cell::RefCell, collections::HashMap, future::Future, pin::Pin, rc::Rc};

use serde::{de::DeserializeOwned, Serialize};

/// Key prefix for persisted expanded-folder sets; the scope key is appended.
pub const EXPANSION_PREFS_KEY_PREFIX: &str = "workbench.tree.expanded.v1";
/// Key holding the serialized tree configuration overrides.
pub const TREE_CONFIG_PREFS_KEY: &str = "workbench.tree.config.v1";

/// Object-safe boxed future used by [`PrefsStore`] async methods.
pub type PrefsStoreFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Storage for expanded-folder sets and configuration overrides.
///
/// Writes arrive debounced from the expansion layer, so implementations may be slow but must
/// keep the last written value per key.
pub trait PrefsStore {
    /// Loads the raw JSON stored under `key`, `None` when nothing was written yet.
    fn load_pref<'a>(
        &'a self,
        key: &'a str,
    ) -> PrefsStoreFuture<'a, Result<Option<String>, String>>;

    /// Replaces the raw JSON under `key`.
    fn save_pref<'a>(
        &'a self,
        key: &'a str,
        raw_json: &'a str,
    ) -> PrefsStoreFuture<'a, Result<(), String>>;

    /// Removes `key`; the next load falls back to defaults.
    fn delete_pref<'a>(&'a self, key: &'a str) -> PrefsStoreFuture<'a, Result<(), String>>;
}

#[derive(Debug, Clone, Copy, Default)]
/// Store for hosts without durable storage: nothing is restored and configuration stays at
/// its defaults.
pub struct NoopPrefsStore;

impl PrefsStore for NoopPrefsStore {
    fn load_pref<'a>(
        &'a self,
        _key: &'a str,
    ) -> PrefsStoreFuture<'a, Result<Option<String>, String>> {
        Box::pin(async { Ok(None) })
    }

    fn save_pref<'a>(
        &'a self,
        _key: &'a str,
        _raw_json: &'a str,
    ) -> PrefsStoreFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }

    fn delete_pref<'a>(&'a self, _key: &'a str) -> PrefsStoreFuture<'a, Result<(), String>> {
        Box::pin(async { Ok(()) })
    }
}

#[derive(Debug, Default)]
struct MemoryPrefsInner {
    values: HashMap<String, String>,
    saves: usize,
    fail_saves: bool,
}

#[derive(Debug, Clone, Default)]
/// In-memory store that counts writes, used to observe the expansion debounce in tests.
pub struct MemoryPrefsStore {
    inner: Rc<RefCell<MemoryPrefsInner>>,
}

impl MemoryPrefsStore {
    /// Returns the raw value stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.inner.borrow().values.get(key).cloned()
    }

    /// Returns the number of successful `save_pref` calls.
    pub fn save_count(&self) -> usize {
        self.inner.borrow().saves
    }

    /// Makes every subsequent save fail until reset.
    pub fn set_fail_saves(&self, fail: bool) {
        self.inner.borrow_mut().fail_saves = fail;
    }
}

impl PrefsStore for MemoryPrefsStore {
    fn load_pref<'a>(
        &'a self,
        key: &'a str,
    ) -> PrefsStoreFuture<'a, Result<Option<String>, String>> {
        Box::pin(async move { Ok(self.inner.borrow().values.get(key).cloned()) })
    }

    fn save_pref<'a>(
        &'a self,
        key: &'a str,
        raw_json: &'a str,
    ) -> PrefsStoreFuture<'a, Result<(), String>> {
        Box::pin(async move {
            let mut inner = self.inner.borrow_mut();
            if inner.fail_saves {
                return Err(format!("prefs store rejected write for `{key}`"));
            }
            inner.values.insert(key.to_string(), raw_json.to_string());
            inner.saves += 1;
            Ok(())
        })
    }

    fn delete_pref<'a>(&'a self, key: &'a str) -> PrefsStoreFuture<'a, Result<(), String>> {
        Box::pin(async move {
            self.inner.borrow_mut().values.remove(key);
            Ok(())
        })
    }
}

/// Reads an expanded set or configuration value stored under `key`.
///
/// # Errors
///
/// Returns an error when the store fails or the stored text is not valid JSON for `T`.
pub async fn load_pref_with<S: PrefsStore + ?Sized, T: DeserializeOwned>(
    store: &S,
    key: &str,
) -> Result<Option<T>, String> {
    let Some(raw) = store.load_pref(key).await? else {
        return Ok(None);
    };
    let value = serde_json::from_str(&raw).map_err(|e| e.to_string())?;
    Ok(Some(value))
}

/// Writes an expanded set or configuration value under `key`.
///
/// # Errors
///
/// Returns an error when serialization or the store write fails.
pub async fn save_pref_with<S: PrefsStore + ?Sized, T: Serialize>(
    store: &S,
    key: &str,
    value: &T,
) -> Result<(), String> {
    let raw = serde_json::to_string(value).map_err(|e| e.to_string())?;
    store.save_pref(key, &raw).await
}
