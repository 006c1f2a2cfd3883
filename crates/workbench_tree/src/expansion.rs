//! Durable per-scope expanded-folder sets with debounced writes and one-shot restoration.

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    fmt,
    rc::Rc,
};

use tracing::{debug, warn};
use workbench_host::{
    load_pref_with, save_pref_with, NodeId, PrefsStore, SectionId, TreeViewAdapter,
    EXPANSION_PREFS_KEY_PREFIX,
};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
/// Composite key (workspace + section root) an expanded set is stored under.
pub struct ExpansionScope {
    /// Workspace the tree belongs to.
    pub workspace: String,
    /// Section rendered by the tree.
    pub section: SectionId,
}

impl ExpansionScope {
    /// Builds a scope.
    pub fn new(workspace: impl Into<String>, section: SectionId) -> Self {
        Self {
            workspace: workspace.into(),
            section,
        }
    }

    /// Returns the preference key this scope is persisted under.
    pub fn prefs_key(&self) -> String {
        format!("{EXPANSION_PREFS_KEY_PREFIX}.{}.{}", self.workspace, self.section)
    }
}

impl fmt::Display for ExpansionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.section)
    }
}

/// Deduplicates and sorts expanded ids.
pub fn normalize_expanded<I: IntoIterator<Item = NodeId>>(ids: I) -> Vec<NodeId> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Progress of expansion restoration for one scope.
pub enum RestoreStatus {
    /// No restoration target was registered.
    NotStarted,
    /// The target was pushed but the adapter does not reflect it yet.
    Applying,
    /// The adapter matched the target; restoration will not run again.
    Complete,
}

#[derive(Debug, Clone)]
enum RestoreState {
    Pending(Vec<NodeId>),
    Complete,
}

#[derive(Debug, Clone)]
struct PendingWrite {
    due_at_ms: u64,
    ids: Vec<NodeId>,
}

/// Read-through, debounced write-through store of expanded folder ids.
pub struct ExpansionPersistence {
    prefs: Rc<dyn PrefsStore>,
    debounce_ms: u64,
    cache: HashMap<ExpansionScope, Vec<NodeId>>,
    pending: BTreeMap<ExpansionScope, PendingWrite>,
    restore: HashMap<ExpansionScope, RestoreState>,
}

impl fmt::Debug for ExpansionPersistence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpansionPersistence")
            .field("debounce_ms", &self.debounce_ms)
            .field("cache", &self.cache)
            .field("pending", &self.pending.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl ExpansionPersistence {
    /// Creates a persistence layer writing through `prefs`.
    pub fn new(prefs: Rc<dyn PrefsStore>, debounce_ms: u64) -> Self {
        Self {
            prefs,
            debounce_ms,
            cache: HashMap::new(),
            pending: BTreeMap::new(),
            restore: HashMap::new(),
        }
    }

    /// Returns the expanded ids for `scope`, reading the durable store on a cache miss.
    ///
    /// Unreadable values are treated as "nothing expanded".
    pub async fn load(&mut self, scope: &ExpansionScope) -> Vec<NodeId> {
        if let Some(ids) = self.cache.get(scope) {
            return ids.clone();
        }
        let ids = match load_pref_with::<dyn PrefsStore, Vec<NodeId>>(
            self.prefs.as_ref(),
            &scope.prefs_key(),
        )
        .await
        {
            Ok(ids) => normalize_expanded(ids.unwrap_or_default()),
            Err(err) => {
                warn!(scope = %scope, error = %err, "expanded folders load failed");
                Vec::new()
            }
        };
        self.cache.insert(scope.clone(), ids.clone());
        ids
    }

    /// Returns the cached expanded ids for `scope`.
    pub fn cached(&self, scope: &ExpansionScope) -> Option<&[NodeId]> {
        self.cache.get(scope).map(Vec::as_slice)
    }

    /// Replaces the expanded set of `scope` and schedules a debounced write.
    pub fn set_expanded<I: IntoIterator<Item = NodeId>>(
        &mut self,
        scope: &ExpansionScope,
        ids: I,
        now_ms: u64,
    ) -> Vec<NodeId> {
        let ids = normalize_expanded(ids);
        if self.cache.get(scope) == Some(&ids) {
            return ids;
        }
        self.cache.insert(scope.clone(), ids.clone());
        self.pending.insert(
            scope.clone(),
            PendingWrite {
                due_at_ms: now_ms.saturating_add(self.debounce_ms),
                ids: ids.clone(),
            },
        );
        ids
    }

    /// Adds or removes one folder from the expanded set of `scope`.
    pub fn toggle(
        &mut self,
        scope: &ExpansionScope,
        folder: &NodeId,
        expanded: bool,
        now_ms: u64,
    ) -> Vec<NodeId> {
        let mut ids: BTreeSet<NodeId> = self
            .cache
            .get(scope)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default();
        if expanded {
            ids.insert(folder.clone());
        } else {
            ids.remove(folder);
        }
        self.set_expanded(scope, ids, now_ms)
    }

    /// Returns the earliest time a pending write becomes due.
    pub fn next_flush_at(&self) -> Option<u64> {
        self.pending.values().map(|write| write.due_at_ms).min()
    }

    /// Writes every scope whose debounce window elapsed. Returns the number of scopes written.
    ///
    /// A failed write stays pending and is retried one debounce window later.
    pub async fn flush_due(&mut self, now_ms: u64) -> usize {
        let due: Vec<ExpansionScope> = self
            .pending
            .iter()
            .filter(|(_, write)| write.due_at_ms <= now_ms)
            .map(|(scope, _)| scope.clone())
            .collect();
        self.write_scopes(due, now_ms).await
    }

    /// Writes every pending scope immediately.
    pub async fn flush_all(&mut self, now_ms: u64) -> usize {
        let all: Vec<ExpansionScope> = self.pending.keys().cloned().collect();
        self.write_scopes(all, now_ms).await
    }

    /// Drops the read cache so the next [`load`](Self::load) hits the durable store.
    ///
    /// Pending writes are kept.
    pub fn invalidate_cache(&mut self) {
        self.cache.clear();
    }

    /// Registers `target` as the restoration target of `scope`, once per scope.
    pub fn begin_restore(&mut self, scope: &ExpansionScope, target: Vec<NodeId>) {
        self.restore
            .entry(scope.clone())
            .or_insert_with(|| RestoreState::Pending(normalize_expanded(target)));
    }

    /// Drives restoration of `scope` against the adapter; call on every render.
    ///
    /// The target is set directly on the adapter (never toggled) until the adapter reports the
    /// same set, after which the scope is complete and later renders leave user changes alone.
    pub fn apply_restore(
        &mut self,
        scope: &ExpansionScope,
        view: &dyn TreeViewAdapter,
    ) -> RestoreStatus {
        let target = match self.restore.get(scope) {
            None => return RestoreStatus::NotStarted,
            Some(RestoreState::Complete) => return RestoreStatus::Complete,
            Some(RestoreState::Pending(target)) => target.clone(),
        };

        if normalize_expanded(view.expanded_items()) == target {
            debug!(scope = %scope, folders = target.len(), "expanded folders restored");
            self.restore.insert(scope.clone(), RestoreState::Complete);
            return RestoreStatus::Complete;
        }
        view.set_expanded_items(&target);
        RestoreStatus::Applying
    }

    /// Returns the restoration progress of `scope`.
    pub fn restore_status(&self, scope: &ExpansionScope) -> RestoreStatus {
        match self.restore.get(scope) {
            None => RestoreStatus::NotStarted,
            Some(RestoreState::Pending(_)) => RestoreStatus::Applying,
            Some(RestoreState::Complete) => RestoreStatus::Complete,
        }
    }

    async fn write_scopes(&mut self, scopes: Vec<ExpansionScope>, now_ms: u64) -> usize {
        let mut written = 0;
        for scope in scopes {
            let Some(write) = self.pending.remove(&scope) else {
                continue;
            };
            match save_pref_with(self.prefs.as_ref(), &scope.prefs_key(), &write.ids).await {
                Ok(()) => written += 1,
                Err(err) => {
                    warn!(scope = %scope, error = %err, "expanded folders write failed");
                    self.pending.entry(scope).or_insert(PendingWrite {
                        due_at_ms: now_ms.saturating_add(self.debounce_ms),
                        ids: write.ids,
                    });
                }
            }
        }
        written
    }
}
