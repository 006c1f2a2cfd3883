//! Inline-create draft nodes: placement, naming, commit and cancel.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use workbench_host::{Node, NodeId, NodeKind, SectionId};

use crate::{
    drag::DRAFT_ID_PREFIX,
    store::{NodeStore, StoreError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// What a draft will become.
pub enum DraftKind {
    /// A folder.
    Folder,
    /// A file, optionally bound to an existing data document.
    File {
        /// Document the file should point at; `None` creates a fresh one.
        data_document_id: Option<String>,
    },
}

impl DraftKind {
    /// Returns the node kind the draft renders as.
    pub fn node_kind(&self) -> NodeKind {
        match self {
            Self::Folder => NodeKind::Folder,
            Self::File { .. } => NodeKind::File,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// The single uncommitted node being named by the user.
pub struct DraftNode {
    /// Client-only id (prefixed with `draft:`).
    pub node_id: NodeId,
    /// Parent the draft was inserted under.
    pub parent_id: NodeId,
    /// Section of the parent.
    pub section: SectionId,
    /// Folder or file.
    pub kind: DraftKind,
    /// Current contents of the name input.
    pub name: String,
    /// A create request is in flight.
    pub is_submitting: bool,
}

impl DraftNode {
    /// Returns `true` when the user typed something other than whitespace.
    pub fn has_input(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a create-draft request.
pub enum DraftOutcome {
    /// A new draft was inserted.
    Created(NodeId),
    /// An existing draft with input (or in flight) was selected instead.
    Refocused(NodeId),
    /// The draft would land deeper than the maximum depth.
    DepthLimit,
    /// The section was never registered.
    UnknownSection,
    /// The destination's children could not be loaded.
    LoadFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of committing a draft.
pub enum CommitOutcome {
    /// Nothing happened (no such draft, empty name, or already submitting).
    Ignored,
    /// The backend created the node, which replaced the draft.
    Committed(NodeId),
    /// The backend refused; the draft stays editable.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Backend create call prepared from a draft.
pub struct CreateRequest {
    /// Draft being committed.
    pub draft_id: NodeId,
    /// Section to create in.
    pub section: SectionId,
    /// Parent container (possibly a section root).
    pub parent: NodeId,
    /// Trimmed final name.
    pub name: String,
    /// Folder or file.
    pub kind: DraftKind,
}

impl CreateRequest {
    /// Returns the parent argument for the backend (`None` for a section root).
    pub fn backend_parent(&self) -> Option<&NodeId> {
        (!self.parent.is_section_root()).then_some(&self.parent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Anchor {
    FirstChild,
    FolderBoundary,
    After(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Where a new draft goes, computed from the selection before the destination is loaded.
pub struct DraftPlacement {
    /// Container receiving the draft.
    pub parent: NodeId,
    anchor: Anchor,
}

impl DraftPlacement {
    /// Plans the placement of a new `kind` draft in `section`.
    ///
    /// `selected` is the selected node when the tree section has focus.
    pub fn plan(
        store: &NodeStore,
        section: &SectionId,
        selected: Option<&NodeId>,
        kind: NodeKind,
    ) -> Self {
        let root = NodeId::section_root(section);
        let selected = selected
            .and_then(|id| store.node(id))
            .filter(|node| &node.section == section);

        match selected {
            Some(node) if node.is_folder() => Self {
                parent: node.node_id.clone(),
                anchor: match kind {
                    NodeKind::Folder => Anchor::FirstChild,
                    NodeKind::File => Anchor::FolderBoundary,
                },
            },
            Some(node) => Self {
                parent: node.parent_key(),
                anchor: Anchor::After(node.node_id.clone()),
            },
            None => Self {
                parent: root,
                anchor: Anchor::FolderBoundary,
            },
        }
    }

    /// Returns the insertion index against the (now loaded) destination listing.
    pub fn index(&self, store: &NodeStore) -> usize {
        match &self.anchor {
            Anchor::FirstChild => 0,
            Anchor::FolderBoundary => store.folder_boundary(&self.parent),
            Anchor::After(sibling) => store
                .index_of(&self.parent, sibling)
                .map_or_else(|| store.folder_boundary(&self.parent), |index| index + 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What an existing draft means for a new create request.
pub enum ExistingDraft {
    /// No draft exists.
    None,
    /// The draft has input or is submitting and must be kept.
    Keep(NodeId),
    /// An empty draft was discarded from under `parent`.
    Discarded {
        /// Parent the discarded draft was removed from.
        parent: NodeId,
    },
}

#[derive(Debug, Clone, Default)]
/// Owner of the (at most one) draft node.
pub struct DraftManager {
    current: Option<DraftNode>,
    next_seq: u64,
}

impl DraftManager {
    /// Returns the live draft.
    pub fn current(&self) -> Option<&DraftNode> {
        self.current.as_ref()
    }

    fn current_mut(&mut self, node_id: &NodeId) -> Option<&mut DraftNode> {
        self.current
            .as_mut()
            .filter(|draft| &draft.node_id == node_id)
    }

    /// Keeps a draft with input, otherwise silently discards it.
    pub fn resolve_existing(&mut self, store: &mut NodeStore) -> ExistingDraft {
        let Some(draft) = self.current.as_ref() else {
            return ExistingDraft::None;
        };
        if draft.is_submitting || draft.has_input() {
            return ExistingDraft::Keep(draft.node_id.clone());
        }
        let parent = draft.parent_id.clone();
        self.discard(store);
        ExistingDraft::Discarded { parent }
    }

    /// Inserts a fresh draft under `parent` at `index`.
    ///
    /// Callers resolve any existing draft first; a leftover one is discarded here.
    pub fn insert(
        &mut self,
        store: &mut NodeStore,
        section: &SectionId,
        parent: &NodeId,
        index: usize,
        kind: DraftKind,
    ) -> Result<NodeId, StoreError> {
        if self.current.is_some() {
            self.discard(store);
        }
        self.next_seq += 1;
        let node_id = NodeId(format!("{DRAFT_ID_PREFIX}{}", self.next_seq));
        let parent_node_id = (!parent.is_section_root()).then(|| parent.clone());
        let node = match &kind {
            DraftKind::Folder => Node::folder(node_id.clone(), parent_node_id, section.clone(), "", 0),
            DraftKind::File { .. } => {
                Node::file(node_id.clone(), parent_node_id, section.clone(), "", "", 0)
            }
        };
        store.insert_child_at_index(parent, node, index)?;
        debug!(draft = %node_id, parent = %parent, index, "draft inserted");

        self.current = Some(DraftNode {
            node_id: node_id.clone(),
            parent_id: parent.clone(),
            section: section.clone(),
            kind,
            name: String::new(),
            is_submitting: false,
        });
        Ok(node_id)
    }

    /// Replaces the name buffer. Ignored while submitting. Returns `true` when applied.
    pub fn set_name(&mut self, node_id: &NodeId, name: &str) -> bool {
        match self.current_mut(node_id) {
            Some(draft) if !draft.is_submitting => {
                draft.name = name.to_string();
                true
            }
            _ => false,
        }
    }

    /// Marks the draft submitting and returns the create call to issue.
    ///
    /// Returns `None` for an unknown draft, an empty trimmed name, or a draft already in flight.
    pub fn begin_commit(&mut self, node_id: &NodeId, final_name: &str) -> Option<CreateRequest> {
        let name = final_name.trim();
        if name.is_empty() {
            return None;
        }
        let draft = self.current_mut(node_id)?;
        if draft.is_submitting {
            return None;
        }
        draft.name = name.to_string();
        draft.is_submitting = true;
        Some(CreateRequest {
            draft_id: draft.node_id.clone(),
            section: draft.section.clone(),
            parent: draft.parent_id.clone(),
            name: name.to_string(),
            kind: draft.kind.clone(),
        })
    }

    /// Applies the backend answer to a create call.
    ///
    /// On success the draft row is replaced by `created` at its sorted position. On failure the
    /// draft stays in place with its name and becomes editable again.
    pub fn finish_commit(
        &mut self,
        store: &mut NodeStore,
        request: &CreateRequest,
        result: Result<Node, String>,
    ) -> CommitOutcome {
        match result {
            Ok(created) => {
                if self
                    .current
                    .as_ref()
                    .is_some_and(|draft| draft.node_id == request.draft_id)
                {
                    self.current = None;
                }
                let _ = store.remove_node(&request.parent, &request.draft_id);
                let node_id = created.node_id.clone();
                if let Err(err) = store.insert_child_sorted(&request.parent, created) {
                    warn!(node = %node_id, error = %err, "created node could not be placed");
                }
                CommitOutcome::Committed(node_id)
            }
            Err(message) => {
                if let Some(draft) = self.current_mut(&request.draft_id) {
                    draft.is_submitting = false;
                }
                CommitOutcome::Failed(message)
            }
        }
    }

    /// Removes the draft without a backend call. Rejected while submitting.
    ///
    /// Returns the parent the draft was removed from.
    pub fn cancel(&mut self, store: &mut NodeStore, node_id: &NodeId) -> Option<NodeId> {
        let draft = self.current.as_ref()?;
        if &draft.node_id != node_id || draft.is_submitting {
            return None;
        }
        let parent = draft.parent_id.clone();
        self.discard(store);
        Some(parent)
    }

    /// Cancels the draft only when it is empty and idle (blur / escape).
    pub fn dismiss_if_empty(&mut self, store: &mut NodeStore, node_id: &NodeId) -> Option<NodeId> {
        let empty = self
            .current
            .as_ref()
            .is_some_and(|draft| &draft.node_id == node_id && !draft.has_input());
        if empty {
            self.cancel(store, node_id)
        } else {
            None
        }
    }

    fn discard(&mut self, store: &mut NodeStore) {
        if let Some(draft) = self.current.take() {
            let _ = store.remove_node(&draft.parent_id, &draft.node_id);
            debug!(draft = %draft.node_id, "draft discarded");
        }
    }
}
