//! Rendering-adapter contracts and lightweight test adapters.

mod adapter;

pub use adapter::{NoopTreeView, RecordingTreeView, TreeViewAdapter, ViewOp};
