//! Tunables for validation, exploration and persistence.

use serde::{Deserialize, Serialize};
use tracing::warn;
use workbench_host::{load_pref_with, PrefsStore, TREE_CONFIG_PREFS_KEY};

/// Default maximum nesting level (root children are level 1).
pub const DEFAULT_MAX_DEPTH: u32 = 4;
/// Default number of frontier folders examined per validation tick.
pub const DEFAULT_EXPLORE_PER_TICK: usize = 16;
/// Default number of exploration prefetches allowed per drag session.
pub const DEFAULT_PREFETCH_BUDGET: usize = 8;
/// Default minimum spacing between two prefetch requests.
pub const DEFAULT_PREFETCH_INTERVAL_MS: u64 = 150;
/// Default quiet period before expanded-folder sets are written.
pub const DEFAULT_EXPANSION_DEBOUNCE_MS: u64 = 300;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
/// Tree engine configuration.
pub struct TreeConfig {
    /// Deepest level any node may occupy.
    pub max_depth: u32,
    /// Frontier entries drained per `can_drop` call.
    pub explore_per_tick: usize,
    /// Exploration prefetches allowed per drag session.
    pub prefetch_budget: usize,
    /// Minimum milliseconds between two prefetch requests.
    pub prefetch_interval_ms: u64,
    /// Milliseconds of quiet before an expansion change is persisted.
    pub expansion_debounce_ms: u64,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            explore_per_tick: DEFAULT_EXPLORE_PER_TICK,
            prefetch_budget: DEFAULT_PREFETCH_BUDGET,
            prefetch_interval_ms: DEFAULT_PREFETCH_INTERVAL_MS,
            expansion_debounce_ms: DEFAULT_EXPANSION_DEBOUNCE_MS,
        }
    }
}

/// Loads configuration overrides from `prefs`, falling back to defaults.
///
/// Missing fields take their defaults; an unreadable or malformed value yields the full default.
pub async fn load_tree_config<S: PrefsStore + ?Sized>(prefs: &S) -> TreeConfig {
    match load_pref_with::<S, TreeConfig>(prefs, TREE_CONFIG_PREFS_KEY).await {
        Ok(Some(config)) => config,
        Ok(None) => TreeConfig::default(),
        Err(err) => {
            warn!(error = %err, "tree config load failed, using defaults");
            TreeConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;
    use pretty_assertions::assert_eq;
    use workbench_host::MemoryPrefsStore;

    use super::*;

    #[test]
    fn partial_overrides_keep_other_defaults() {
        let prefs = MemoryPrefsStore::default();
        block_on(prefs.save_pref(TREE_CONFIG_PREFS_KEY, r#"{"max_depth":6}"#)).expect("save");

        let config = block_on(load_tree_config(&prefs));
        assert_eq!(config.max_depth, 6);
        assert_eq!(config.prefetch_budget, DEFAULT_PREFETCH_BUDGET);
    }

    #[test]
    fn malformed_or_missing_config_falls_back_to_defaults() {
        let prefs = MemoryPrefsStore::default();
        assert_eq!(block_on(load_tree_config(&prefs)), TreeConfig::default());

        block_on(prefs.save_pref(TREE_CONFIG_PREFS_KEY, "[1,2")).expect("save");
        assert_eq!(block_on(load_tree_config(&prefs)), TreeConfig::default());
    }
}
