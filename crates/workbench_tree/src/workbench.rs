//! Controller wiring the node store, drafts, drag validation, expansion and rendering adapters.
//!
//! Every operation runs to completion on `&mut self`. Operations that need a backend round trip
//! come in two flavors: a single `async fn`, and a `prepare`/`complete` pair for hosts that must
//! release the workbench while the call is in flight.

use std::{collections::HashMap, rc::Rc};

use thiserror::Error;
use tracing::{debug, info, warn};
use workbench_host::{
    normalize_ext, normalize_label, Node, NodeId, RenameResult, SectionId, TreeViewAdapter,
};

use crate::{
    bridge,
    config::{load_tree_config, TreeConfig},
    draft::{
        CommitOutcome, CreateRequest, DraftKind, DraftManager, DraftNode, DraftOutcome,
        DraftPlacement, ExistingDraft,
    },
    drag::{
        is_draft_id, resolve_target, DragSession, DropTarget, DropVerdict, PrefetchCache,
        PrefetchPoll, PrefetchQueue, PrefetchRequest, RejectReason, ValidationContext,
    },
    effects::{TreeEffect, TreeOperation, TreeUpdate},
    expansion::{ExpansionPersistence, ExpansionScope, RestoreStatus},
    host::WorkbenchHost,
    invalidation::InvalidationBatch,
    store::NodeStore,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Selection and keyboard focus across the tree sections.
pub struct Selection {
    /// Selected row, if any.
    pub selected: Option<NodeId>,
    /// Section whose tree currently has focus.
    pub focused_section: Option<SectionId>,
}

impl Selection {
    /// Returns the selected row when `section` has focus.
    pub fn selected_in(&self, section: &SectionId) -> Option<&NodeId> {
        if self.focused_section.as_ref() == Some(section) {
            self.selected.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Backend move call prepared from a validated drop.
pub struct MoveRequest {
    /// Drag gesture the drop belongs to.
    pub session_id: String,
    /// Node being moved.
    pub node_id: NodeId,
    /// Section of the node.
    pub section: SectionId,
    /// Current parent (possibly a section root).
    pub from_parent: NodeId,
    /// Destination parent (possibly a section root).
    pub to_parent: NodeId,
}

impl MoveRequest {
    /// Returns the parent argument for the backend (`None` for a section root).
    pub fn backend_parent(&self) -> Option<&NodeId> {
        (!self.to_parent.is_section_root()).then_some(&self.to_parent)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a drop.
pub enum DropOutcome {
    /// Client-side validation refused the drop; no request was made.
    Rejected(RejectReason),
    /// The backend applied the move and the store followed.
    Moved {
        /// Moved node.
        node_id: NodeId,
        /// New parent (possibly a section root).
        parent: NodeId,
    },
    /// The backend refused; the store is unchanged.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of one prefetch pump.
pub enum PrefetchPump {
    /// Nothing queued.
    Idle,
    /// A request is queued but must wait.
    Throttled {
        /// Milliseconds until the next request may start.
        retry_in_ms: u64,
    },
    /// The listing of this folder was fetched and cached.
    Fetched(NodeId),
    /// The listing of this folder could not be fetched.
    Failed(NodeId),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Client-side rename refusals.
pub enum RenameError {
    /// The node is not in the store.
    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),
    /// Drafts are named through commit.
    #[error("`{0}` is an uncommitted draft")]
    Draft(NodeId),
    /// The trimmed name is empty.
    #[error("name must not be empty")]
    EmptyName,
    /// A same-kind sibling already uses the name.
    #[error("an entry named `{0}` already exists")]
    DuplicateName(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Backend rename call prepared from user input.
pub struct RenameRequest {
    /// Node being renamed.
    pub node_id: NodeId,
    /// Parent the node is listed under.
    pub parent: NodeId,
    /// Trimmed new name.
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Result of a rename.
pub enum RenameOutcome {
    /// Refused before any request.
    Rejected(RenameError),
    /// The backend renamed the node and the store followed.
    Renamed(NodeId),
    /// The backend refused; the store is unchanged.
    Failed(String),
}

/// Query workbench tree engine.
pub struct Workbench {
    host: WorkbenchHost,
    config: TreeConfig,
    workspace: String,
    store: NodeStore,
    views: HashMap<SectionId, Rc<dyn TreeViewAdapter>>,
    selection: Selection,
    drafts: DraftManager,
    drag: Option<DragSession>,
    prefetch_queue: PrefetchQueue,
    prefetch_cache: PrefetchCache,
    expansion: ExpansionPersistence,
}

impl Workbench {
    /// Creates a workbench for `workspace` with explicit configuration.
    pub fn new(host: WorkbenchHost, config: TreeConfig, workspace: impl Into<String>) -> Self {
        let expansion = ExpansionPersistence::new(host.prefs_store(), config.expansion_debounce_ms);
        Self {
            prefetch_queue: PrefetchQueue::new(config.prefetch_interval_ms),
            host,
            config,
            workspace: workspace.into(),
            store: NodeStore::default(),
            views: HashMap::new(),
            selection: Selection::default(),
            drafts: DraftManager::default(),
            drag: None,
            prefetch_cache: PrefetchCache::default(),
            expansion,
        }
    }

    /// Creates a workbench whose configuration is read from the host preference store.
    pub async fn load(host: WorkbenchHost, workspace: impl Into<String>) -> Self {
        let config = load_tree_config(host.prefs_store().as_ref()).await;
        Self::new(host, config, workspace)
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Returns the authoritative tree.
    pub fn store(&self) -> &NodeStore {
        &self.store
    }

    /// Returns the selection state.
    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Returns the live draft.
    pub fn draft(&self) -> Option<&DraftNode> {
        self.drafts.current()
    }

    /// Returns the active drag session.
    pub fn drag_session(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    /// Returns the listings fetched during drags.
    pub fn prefetch_cache(&self) -> &PrefetchCache {
        &self.prefetch_cache
    }

    /// Returns the number of prefetches waiting for their turn.
    pub fn pending_prefetches(&self) -> usize {
        self.prefetch_queue.len()
    }

    /// Returns the expansion scope of `section` in this workspace.
    pub fn scope(&self, section: &SectionId) -> ExpansionScope {
        ExpansionScope::new(self.workspace.clone(), section.clone())
    }

    /// Registers a section and the adapter rendering it. Returns the section root id.
    pub fn add_section(&mut self, section: SectionId, view: Rc<dyn TreeViewAdapter>) -> NodeId {
        self.views.insert(section.clone(), view);
        self.store.add_section(section)
    }

    /// Selects a row (focusing its section), or clears the selection.
    pub fn select(&mut self, node_id: Option<NodeId>) {
        for (section, view) in &self.views {
            let selected: Vec<NodeId> = node_id
                .iter()
                .filter(|id| self.store.section_of(id) == Some(section))
                .cloned()
                .collect();
            view.set_selected_items(&selected);
        }
        if let Some(section) = node_id.as_ref().and_then(|id| self.store.section_of(id)) {
            self.selection.focused_section = Some(section.clone());
        }
        self.selection.selected = node_id;
    }

    /// Moves keyboard focus to a section's tree, or away from every tree.
    pub fn focus_section(&mut self, section: Option<SectionId>) {
        self.selection.focused_section = section;
    }

    /// Pushes pending store invalidations into the adapters.
    pub fn sync_view(&mut self) -> InvalidationBatch {
        let views: Vec<&dyn TreeViewAdapter> = self.views.values().map(|view| view.as_ref()).collect();
        bridge::sync(&mut self.store, &views)
    }

    /// Loads the children of `parent` unless already known.
    ///
    /// A listing prefetched during a drag is consumed before asking the backend. The adapter's
    /// child-order cache is primed directly.
    pub async fn ensure_children_loaded(&mut self, parent: &NodeId) -> Result<(), String> {
        if self.store.children(parent).is_known() {
            return Ok(());
        }
        if !self.store.is_container(parent) {
            return Err(format!("`{parent}` is not a loaded folder"));
        }
        let Some(section) = self.store.section_of(parent).cloned() else {
            return Err(format!("`{parent}` is not a loaded folder"));
        };

        let nodes = match self.prefetch_cache.take(parent) {
            Some(nodes) => nodes,
            None => {
                let backend = self.host.backend();
                let backend_parent = (!parent.is_section_root()).then(|| parent.clone());
                match backend
                    .fetch_node_children(&section, backend_parent.as_ref())
                    .await
                {
                    Ok(nodes) => nodes,
                    Err(err) => {
                        warn!(parent = %parent, error = %err, "children load failed");
                        return Err(err);
                    }
                }
            }
        };

        self.store
            .load_children(parent, nodes)
            .map_err(|err| err.to_string())?;
        if let Some(view) = self.view_of(parent) {
            bridge::prime_children(&mut self.store, view.as_ref(), parent);
        }
        if let Some(session) = self.drag.as_mut() {
            session.on_children_available(parent);
        }
        self.sync_view();
        Ok(())
    }

    /// Starts an inline folder draft in `section`.
    pub async fn create_folder_draft(&mut self, section: &SectionId) -> TreeUpdate<DraftOutcome> {
        self.create_draft(section, DraftKind::Folder).await
    }

    /// Starts an inline file draft in `section`.
    pub async fn create_file_draft(
        &mut self,
        section: &SectionId,
        data_document_id: Option<String>,
    ) -> TreeUpdate<DraftOutcome> {
        self.create_draft(section, DraftKind::File { data_document_id })
            .await
    }

    async fn create_draft(&mut self, section: &SectionId, kind: DraftKind) -> TreeUpdate<DraftOutcome> {
        if !self.store.is_root(&NodeId::section_root(section)) {
            return TreeUpdate::new(DraftOutcome::UnknownSection);
        }

        match self.drafts.resolve_existing(&mut self.store) {
            ExistingDraft::Keep(id) => {
                self.select(Some(id.clone()));
                return TreeUpdate::new(DraftOutcome::Refocused(id.clone()))
                    .with_effect(TreeEffect::FocusRenameInput(id));
            }
            ExistingDraft::Discarded { parent } => {
                self.forget_removed_selection();
                self.after_mutation(&[parent]);
            }
            ExistingDraft::None => {}
        }

        let placement = DraftPlacement::plan(
            &self.store,
            section,
            self.selection.selected_in(section),
            kind.node_kind(),
        );
        let parent = placement.parent.clone();
        let parent_level = self.store.level_of(&parent).unwrap_or_default();
        if parent_level + 1 > self.config.max_depth {
            debug!(parent = %parent, level = parent_level + 1, "draft refused by depth limit");
            return TreeUpdate::new(DraftOutcome::DepthLimit);
        }

        if let Err(message) = self.ensure_children_loaded(&parent).await {
            return TreeUpdate::new(DraftOutcome::LoadFailed(message.clone())).with_effect(
                TreeEffect::OperationFailed {
                    operation: TreeOperation::LoadChildren,
                    node_id: parent,
                    message,
                },
            );
        }
        if !parent.is_section_root() {
            self.apply_expanded(&parent, true).await;
        }

        let index = placement.index(&self.store);
        let id = match self
            .drafts
            .insert(&mut self.store, section, &parent, index, kind)
        {
            Ok(id) => id,
            Err(err) => return TreeUpdate::new(DraftOutcome::LoadFailed(err.to_string())),
        };
        self.after_mutation(&[parent]);
        self.select(Some(id.clone()));
        TreeUpdate::new(DraftOutcome::Created(id.clone()))
            .with_effect(TreeEffect::FocusRenameInput(id.clone()))
            .with_effect(TreeEffect::ScrollTo(id))
    }

    /// Edits the draft name buffer. Ignored while the draft is submitting.
    pub fn set_draft_name(&mut self, node_id: &NodeId, name: &str) -> bool {
        self.drafts.set_name(node_id, name)
    }

    /// Marks the draft submitting and returns the create call to issue.
    pub fn begin_commit(&mut self, node_id: &NodeId, final_name: &str) -> Option<CreateRequest> {
        self.drafts.begin_commit(node_id, final_name)
    }

    /// Applies the backend answer to a create call.
    pub fn finish_commit(
        &mut self,
        request: &CreateRequest,
        result: Result<Node, String>,
    ) -> TreeUpdate<CommitOutcome> {
        let mount_id = result.as_ref().ok().and_then(|node| node.mount_id.clone());
        let outcome = self.drafts.finish_commit(&mut self.store, request, result);
        let operation = match request.kind {
            DraftKind::Folder => TreeOperation::CreateFolder,
            DraftKind::File { .. } => TreeOperation::CreateFile,
        };

        match &outcome {
            CommitOutcome::Committed(node_id) => {
                info!(node = %node_id, parent = %request.parent, name = %request.name, "node created");
                self.after_mutation(&[request.parent.clone()]);
                self.select(Some(node_id.clone()));
                let mut update =
                    TreeUpdate::new(outcome.clone()).with_effect(TreeEffect::ScrollTo(node_id.clone()));
                if operation == TreeOperation::CreateFile {
                    update = update.with_effect(TreeEffect::OpenDocument {
                        node_id: node_id.clone(),
                        mount_id,
                    });
                }
                update
            }
            CommitOutcome::Failed(message) => {
                warn!(draft = %request.draft_id, error = %message, "create failed");
                TreeUpdate::new(outcome.clone())
                    .with_effect(TreeEffect::OperationFailed {
                        operation,
                        node_id: request.draft_id.clone(),
                        message: message.clone(),
                    })
                    .with_effect(TreeEffect::FocusRenameInput(request.draft_id.clone()))
            }
            CommitOutcome::Ignored => TreeUpdate::new(CommitOutcome::Ignored),
        }
    }

    /// Commits the draft under `final_name` through the backend.
    pub async fn commit_draft(
        &mut self,
        node_id: &NodeId,
        final_name: &str,
    ) -> TreeUpdate<CommitOutcome> {
        let Some(request) = self.begin_commit(node_id, final_name) else {
            return TreeUpdate::new(CommitOutcome::Ignored);
        };
        let backend = self.host.backend();
        let result = match &request.kind {
            DraftKind::Folder => {
                backend
                    .create_folder(&request.section, request.backend_parent(), &request.name)
                    .await
            }
            DraftKind::File { data_document_id } => {
                backend
                    .create_file(
                        &request.section,
                        data_document_id.as_deref(),
                        &request.name,
                        request.backend_parent(),
                    )
                    .await
            }
        };
        self.finish_commit(&request, result)
    }

    /// Removes the draft without a backend call. Rejected while submitting.
    pub fn cancel_draft(&mut self, node_id: &NodeId) -> bool {
        let Some(parent) = self.drafts.cancel(&mut self.store, node_id) else {
            return false;
        };
        self.forget_removed_selection();
        self.after_mutation(&[parent]);
        true
    }

    /// Cancels the draft only when its name is empty (blur / escape).
    pub fn dismiss_draft_if_empty(&mut self, node_id: &NodeId) -> bool {
        let Some(parent) = self.drafts.dismiss_if_empty(&mut self.store, node_id) else {
            return false;
        };
        self.forget_removed_selection();
        self.after_mutation(&[parent]);
        true
    }

    /// Starts (or continues) the drag gesture `session_id` for `node_id`.
    ///
    /// A different session id discards all state of the previous gesture. Drafts and unknown
    /// nodes cannot be dragged.
    pub fn begin_drag(&mut self, session_id: &str, node_id: &NodeId) -> bool {
        if self
            .drag
            .as_ref()
            .is_some_and(|session| session.id() == session_id && &session.dragged().node_id == node_id)
        {
            return true;
        }
        self.end_drag();
        if is_draft_id(node_id) {
            return false;
        }
        let Some(node) = self.store.node(node_id).cloned() else {
            return false;
        };
        debug!(session = session_id, node = %node_id, "drag started");
        self.drag = Some(DragSession::new(session_id, node));
        true
    }

    /// Validates a drop target for the active gesture and reports why it fails.
    pub fn evaluate_drop(&mut self, target: &DropTarget) -> DropVerdict {
        let Some(session) = self.drag.as_mut() else {
            return DropVerdict::Reject(RejectReason::UnknownNode);
        };
        let mut ctx = ValidationContext {
            store: &self.store,
            cache: &self.prefetch_cache,
            queue: &mut self.prefetch_queue,
            config: &self.config,
        };
        let verdict = session.evaluate(target, &mut ctx);
        if let DropVerdict::Reject(reason) = verdict {
            debug!(session = session.id(), ?target, ?reason, "drop rejected");
        }
        verdict
    }

    /// Returns `true` when the active gesture may drop on `target`.
    pub fn can_drop(&mut self, target: &DropTarget) -> bool {
        self.evaluate_drop(target).is_allowed()
    }

    /// Validates the drop and returns the move call to issue.
    pub fn prepare_drop(&mut self, target: &DropTarget) -> Result<MoveRequest, RejectReason> {
        if let DropVerdict::Reject(reason) = self.evaluate_drop(target) {
            return Err(reason);
        }
        let (session_id, dragged_id) = self
            .drag
            .as_ref()
            .map(|session| (session.id().to_string(), session.dragged().node_id.clone()))
            .ok_or(RejectReason::UnknownNode)?;
        let dragged = self
            .store
            .node(&dragged_id)
            .cloned()
            .ok_or(RejectReason::UnknownNode)?;
        let resolved = resolve_target(&self.store, &dragged, target)?;
        let to_parent = resolved
            .parent
            .ok_or(resolved.rejection.unwrap_or(RejectReason::InvalidTarget))?;
        let from_parent = dragged.parent_key();
        if from_parent == to_parent {
            return Err(RejectReason::SameParent);
        }
        Ok(MoveRequest {
            session_id,
            node_id: dragged.node_id,
            section: dragged.section,
            from_parent,
            to_parent,
        })
    }

    /// Applies the backend answer to a move call and ends the gesture it belongs to.
    ///
    /// A gesture started while the move was in flight stays active.
    pub fn complete_drop(
        &mut self,
        request: &MoveRequest,
        result: Result<(), String>,
    ) -> TreeUpdate<DropOutcome> {
        if self
            .drag
            .as_ref()
            .is_some_and(|session| session.id() == request.session_id)
        {
            self.end_drag();
        }
        if let Err(message) = result {
            warn!(node = %request.node_id, to = %request.to_parent, error = %message, "move failed");
            return TreeUpdate::new(DropOutcome::Failed(message.clone())).with_effect(
                TreeEffect::OperationFailed {
                    operation: TreeOperation::Move,
                    node_id: request.node_id.clone(),
                    message,
                },
            );
        }

        if let Err(err) = self.store.move_node(&request.node_id, &request.to_parent) {
            // destination no longer known locally; the node leaves the local tree
            warn!(node = %request.node_id, error = %err, "moved node dropped from local tree");
            if let Err(err) = self.store.remove_node(&request.from_parent, &request.node_id) {
                warn!(node = %request.node_id, error = %err, "moved node already gone");
            }
        }
        info!(node = %request.node_id, from = %request.from_parent, to = %request.to_parent, "node moved");
        self.after_mutation(&[request.from_parent.clone(), request.to_parent.clone()]);
        TreeUpdate::new(DropOutcome::Moved {
            node_id: request.node_id.clone(),
            parent: request.to_parent.clone(),
        })
    }

    /// Drops on `target`: validates, issues one move call, and applies the result.
    pub async fn on_drop(&mut self, target: &DropTarget) -> TreeUpdate<DropOutcome> {
        let request = match self.prepare_drop(target) {
            Ok(request) => request,
            Err(reason) => {
                self.end_drag();
                return TreeUpdate::new(DropOutcome::Rejected(reason));
            }
        };
        let backend = self.host.backend();
        let result = backend
            .move_node(&request.node_id, request.backend_parent())
            .await;
        self.complete_drop(&request, result)
    }

    /// Ends the gesture (drop, cancel or drag end), discarding all session state.
    pub fn end_drag(&mut self) {
        if let Some(session) = self.drag.take() {
            debug!(session = session.id(), "drag ended");
        }
        self.prefetch_queue.clear_pending();
    }

    /// Releases the next prefetch when the throttle allows it.
    pub fn next_prefetch(&mut self) -> PrefetchPoll {
        let poll = self.prefetch_queue.poll(self.host.now_ms());
        if let PrefetchPoll::Ready(request) = &poll {
            self.prefetch_cache.issue(&request.folder);
        }
        poll
    }

    /// Stores a prefetched listing. Returns `true` on success.
    ///
    /// Results are cached even when the session that asked for them is gone. A listing of a
    /// folder that was mutated locally after the request went out is discarded.
    pub fn complete_prefetch(
        &mut self,
        request: &PrefetchRequest,
        result: Result<Vec<Node>, String>,
    ) -> bool {
        self.prefetch_queue.complete(&request.folder);
        match result {
            Ok(nodes) => {
                debug!(folder = %request.folder, children = nodes.len(), "listing prefetched");
                if self.store.children(&request.folder).is_known() {
                    self.prefetch_cache.abandon(&request.folder);
                } else if !self.prefetch_cache.accept(request.folder.clone(), nodes) {
                    debug!(folder = %request.folder, "stale listing discarded");
                    return true;
                }
                if let Some(session) = self.drag.as_mut() {
                    session.on_children_available(&request.folder);
                }
                true
            }
            Err(err) => {
                self.prefetch_cache.abandon(&request.folder);
                warn!(folder = %request.folder, error = %err, "prefetch failed");
                false
            }
        }
    }

    /// Issues at most one due prefetch.
    pub async fn pump_prefetch(&mut self) -> PrefetchPump {
        let request = match self.next_prefetch() {
            PrefetchPoll::Idle => return PrefetchPump::Idle,
            PrefetchPoll::Wait { retry_in_ms } => return PrefetchPump::Throttled { retry_in_ms },
            PrefetchPoll::Ready(request) => request,
        };
        let backend = self.host.backend();
        let result = backend
            .fetch_node_children(&request.section, request.backend_parent())
            .await;
        if self.complete_prefetch(&request, result) {
            PrefetchPump::Fetched(request.folder)
        } else {
            PrefetchPump::Failed(request.folder)
        }
    }

    /// Checks a rename against the known siblings and returns the call to issue.
    pub fn prepare_rename(&self, node_id: &NodeId, name: &str) -> Result<RenameRequest, RenameError> {
        if is_draft_id(node_id) {
            return Err(RenameError::Draft(node_id.clone()));
        }
        let node = self
            .store
            .node(node_id)
            .ok_or_else(|| RenameError::NodeNotFound(node_id.clone()))?;
        let name = name.trim();
        if name.is_empty() {
            return Err(RenameError::EmptyName);
        }

        let parent = node.parent_key();
        let label = normalize_label(name);
        let ext = normalize_ext(node.ext.as_deref());
        let duplicate = self.store.child_nodes(&parent).is_some_and(|siblings| {
            siblings.iter().any(|sibling| {
                sibling.node_id != node.node_id
                    && sibling.kind == node.kind
                    && normalize_label(&sibling.label) == label
                    && (node.is_folder() || normalize_ext(sibling.ext.as_deref()) == ext)
            })
        });
        if duplicate {
            return Err(RenameError::DuplicateName(name.to_string()));
        }
        Ok(RenameRequest {
            node_id: node_id.clone(),
            parent,
            name: name.to_string(),
        })
    }

    /// Applies the backend answer to a rename call.
    pub fn complete_rename(
        &mut self,
        request: &RenameRequest,
        result: Result<RenameResult, String>,
    ) -> TreeUpdate<RenameOutcome> {
        match result {
            Ok(_) => {
                if let Err(err) = self.store.rename_node(&request.node_id, &request.name) {
                    warn!(node = %request.node_id, error = %err, "renamed node missing locally");
                }
                info!(node = %request.node_id, name = %request.name, "node renamed");
                self.after_mutation(&[request.parent.clone()]);
                TreeUpdate::new(RenameOutcome::Renamed(request.node_id.clone()))
            }
            Err(message) => {
                warn!(node = %request.node_id, error = %message, "rename failed");
                TreeUpdate::new(RenameOutcome::Failed(message.clone())).with_effect(
                    TreeEffect::OperationFailed {
                        operation: TreeOperation::Rename,
                        node_id: request.node_id.clone(),
                        message,
                    },
                )
            }
        }
    }

    /// Renames a node through the backend.
    pub async fn rename_node(&mut self, node_id: &NodeId, name: &str) -> TreeUpdate<RenameOutcome> {
        let request = match self.prepare_rename(node_id, name) {
            Ok(request) => request,
            Err(err) => return TreeUpdate::new(RenameOutcome::Rejected(err)),
        };
        let backend = self.host.backend();
        let result = backend.rename_node(&request.node_id, &request.name).await;
        self.complete_rename(&request, result)
    }

    /// Expands or collapses a folder in its adapter and in the persisted set.
    ///
    /// Expanding loads the folder's children first.
    pub async fn toggle_expanded(&mut self, folder: &NodeId, expanded: bool) -> Result<(), String> {
        if expanded {
            self.ensure_children_loaded(folder).await?;
        } else if self.store.section_of(folder).is_none() {
            return Err(format!("`{folder}` is not a loaded folder"));
        }
        self.apply_expanded(folder, expanded).await;
        Ok(())
    }

    /// Loads the persisted expanded set of `section` and starts restoring it.
    pub async fn restore_expansion(&mut self, section: &SectionId) -> RestoreStatus {
        let scope = self.scope(section);
        let target = self.expansion.load(&scope).await;
        self.expansion.begin_restore(&scope, target);
        self.poll_expansion_restore(section)
    }

    /// Drives a pending restoration of `section`; call after every render.
    pub fn poll_expansion_restore(&mut self, section: &SectionId) -> RestoreStatus {
        let scope = self.scope(section);
        match self.views.get(section) {
            Some(view) => self.expansion.apply_restore(&scope, view.as_ref()),
            None => self.expansion.restore_status(&scope),
        }
    }

    /// Returns the cached expanded set of `section`.
    pub fn expanded_folders(&self, section: &SectionId) -> Vec<NodeId> {
        self.expansion
            .cached(&self.scope(section))
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    /// Writes expanded sets whose debounce window elapsed.
    pub async fn flush_expansion(&mut self) -> usize {
        let now = self.host.now_ms();
        self.expansion.flush_due(now).await
    }

    /// Writes every pending expanded set now.
    pub async fn flush_all_expansion(&mut self) -> usize {
        let now = self.host.now_ms();
        self.expansion.flush_all(now).await
    }

    /// Drops the expansion read cache so the next read hits the preference store.
    pub fn invalidate_expansion_cache(&mut self) {
        self.expansion.invalidate_cache();
    }

    async fn apply_expanded(&mut self, folder: &NodeId, expanded: bool) {
        let Some(section) = self.store.section_of(folder).cloned() else {
            return;
        };
        let scope = self.scope(&section);
        self.expansion.load(&scope).await;
        let ids = self
            .expansion
            .toggle(&scope, folder, expanded, self.host.now_ms());
        if let Some(view) = self.views.get(&section) {
            view.set_expanded_items(&ids);
        }
    }

    fn view_of(&self, id: &NodeId) -> Option<Rc<dyn TreeViewAdapter>> {
        let section = self.store.section_of(id)?;
        self.views.get(section).cloned()
    }

    fn forget_removed_selection(&mut self) {
        let removed = self
            .selection
            .selected
            .as_ref()
            .is_some_and(|id| self.store.node(id).is_none());
        if removed {
            self.select(None);
        }
    }

    /// Patches the child order of every touched parent, then flushes remaining invalidations.
    fn after_mutation(&mut self, parents: &[NodeId]) {
        for parent in parents {
            self.prefetch_cache.forget(parent);
            if let Some(session) = self.drag.as_mut() {
                session.forget_parent(parent);
            }
            if let Some(view) = self.view_of(parent) {
                bridge::patch_children(&mut self.store, view.as_ref(), parent);
            }
        }
        self.sync_view();
    }
}
