//! Side effects the surrounding UI executes after a workbench operation.

use serde::{Deserialize, Serialize};
use workbench_host::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Backend-facing operation names used in failure reports.
pub enum TreeOperation {
    /// Creating a folder from a draft.
    CreateFolder,
    /// Creating a file from a draft.
    CreateFile,
    /// Moving a node after a drop.
    Move,
    /// Renaming a node.
    Rename,
    /// Loading a folder listing.
    LoadChildren,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// UI side effect requested by the tree engine.
pub enum TreeEffect {
    /// Open the document behind a freshly created file.
    OpenDocument {
        /// Tree node of the file.
        node_id: NodeId,
        /// Backend identity of the document.
        mount_id: Option<String>,
    },
    /// Move keyboard focus into the inline name input of a row.
    FocusRenameInput(NodeId),
    /// Scroll a row into view.
    ScrollTo(NodeId),
    /// Show a non-fatal failure notice.
    OperationFailed {
        /// Operation that failed.
        operation: TreeOperation,
        /// Row the operation was about.
        node_id: NodeId,
        /// Backend or loader message.
        message: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Outcome of one workbench operation plus the effects it requests.
pub struct TreeUpdate<T> {
    /// Operation-specific result.
    pub outcome: T,
    /// Effects in the order they should run.
    pub effects: Vec<TreeEffect>,
}

impl<T> TreeUpdate<T> {
    /// Wraps an outcome without effects.
    pub fn new(outcome: T) -> Self {
        Self {
            outcome,
            effects: Vec::new(),
        }
    }

    /// Appends an effect.
    pub fn with_effect(mut self, effect: TreeEffect) -> Self {
        self.effects.push(effect);
        self
    }
}
