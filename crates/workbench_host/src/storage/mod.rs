//! Preference storage contracts and adapters.

mod prefs;

pub use prefs::{
    load_pref_with, save_pref_with, MemoryPrefsStore, NoopPrefsStore, PrefsStore, PrefsStoreFuture,
    EXPANSION_PREFS_KEY_PREFIX, TREE_CONFIG_PREFS_KEY,
};
