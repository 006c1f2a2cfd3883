//! Hierarchical namespace engine behind the query workbench tree.
//!
//! The [`NodeStore`] is the authoritative, partially loaded copy of the tree. Drag-and-drop
//! validation, inline drafts and expansion persistence mutate or read it, and the
//! [`bridge`] pushes every change into the rendering adapter, which never observes the store on
//! its own. [`Workbench`] wires these pieces to the host services.

#![warn(missing_docs, rustdoc::broken_intra_doc_links)]

pub mod bridge;
pub mod config;
pub mod draft;
pub mod drag;
pub mod effects;
pub mod expansion;
pub mod host;
pub mod invalidation;
pub mod store;
pub mod workbench;

pub use config::{load_tree_config, TreeConfig};
pub use draft::{CommitOutcome, CreateRequest, DraftKind, DraftNode, DraftOutcome};
pub use drag::{DragSession, DropTarget, DropVerdict, RejectReason};
pub use effects::{TreeEffect, TreeOperation, TreeUpdate};
pub use expansion::{ExpansionPersistence, ExpansionScope, RestoreStatus};
pub use host::WorkbenchHost;
pub use invalidation::{InvalidationBatch, InvalidationQueue};
pub use store::{Children, NodeStore, StoreError};
pub use workbench::{
    DropOutcome, MoveRequest, PrefetchPump, RenameError, RenameOutcome, RenameRequest, Selection,
    Workbench,
};
