//! Host-domain contracts for the query workbench tree.
//!
//! This crate is the boundary between the tree engine and its external collaborators: the
//! remote tree backend, the third-party tree-rendering adapter, durable preference storage and
//! the clock. Every contract comes with a no-op adapter and an in-memory adapter used by tests
//! and offline composition.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod backend;
pub mod storage;
pub mod time;
pub mod view;

pub use backend::memory::{BackendOp, MemoryTreeBackend, DEFAULT_FILE_EXT};
pub use backend::service::{NoopTreeBackend, TreeBackend, TreeBackendFuture};
pub use backend::types::{
    compare_siblings, normalize_ext, normalize_label, Node, NodeId, NodeKind, RenameResult,
    SectionId,
};
pub use storage::{
    load_pref_with, save_pref_with, MemoryPrefsStore, NoopPrefsStore, PrefsStore, PrefsStoreFuture,
    EXPANSION_PREFS_KEY_PREFIX, TREE_CONFIG_PREFS_KEY,
};
pub use time::{unix_time_ms_now, Clock, ManualClock, SystemClock};
pub use view::{NoopTreeView, RecordingTreeView, TreeViewAdapter, ViewOp};
