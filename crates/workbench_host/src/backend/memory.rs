//! In-memory authoritative tree backend used by tests and offline composition.

use std::{cell::RefCell, collections::HashMap, rc::Rc};

use super::{
    service::{TreeBackend, TreeBackendFuture},
    types::{compare_siblings, normalize_ext, normalize_label, Node, NodeId, NodeKind, RenameResult, SectionId},
};

/// Extension assigned to created files whose name carries none.
pub const DEFAULT_FILE_EXT: &str = "sql";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// Backend operation names used for call accounting and failure injection.
pub enum BackendOp {
    /// `fetch_node_children`.
    FetchChildren,
    /// `create_folder`.
    CreateFolder,
    /// `create_file`.
    CreateFile,
    /// `move_node`.
    Move,
    /// `rename_node`.
    Rename,
}

#[derive(Debug, Default)]
struct MemoryTreeInner {
    nodes: HashMap<NodeId, Node>,
    next_id: u64,
    calls: Vec<(BackendOp, Option<NodeId>)>,
    failures: HashMap<BackendOp, String>,
}

impl MemoryTreeInner {
    fn record(&mut self, op: BackendOp, subject: Option<&NodeId>) -> Result<(), String> {
        self.calls.push((op, subject.cloned()));
        match self.failures.remove(&op) {
            Some(message) => Err(message),
            None => Ok(()),
        }
    }

    fn children_of(&self, section: &SectionId, parent: Option<&NodeId>) -> Vec<Node> {
        let mut children: Vec<Node> = self
            .nodes
            .values()
            .filter(|node| &node.section == section && node.parent_node_id.as_ref() == parent)
            .cloned()
            .collect();
        children.sort_by(compare_siblings);
        children
    }

    fn parent_level(&self, section: &SectionId, parent: Option<&NodeId>) -> Result<u32, String> {
        let Some(parent) = parent else {
            return Ok(0);
        };
        match self.nodes.get(parent) {
            Some(node) if &node.section != section => {
                Err(format!("folder `{parent}` belongs to another section"))
            }
            Some(node) if node.is_folder() => Ok(node.level),
            Some(_) => Err(format!("`{parent}` is not a folder")),
            None => Err(format!("folder `{parent}` not found")),
        }
    }

    fn ensure_unique(
        &self,
        section: &SectionId,
        parent: Option<&NodeId>,
        kind: NodeKind,
        label: &str,
        ext: Option<&str>,
        ignore: Option<&NodeId>,
    ) -> Result<(), String> {
        let label = normalize_label(label);
        let ext = normalize_ext(ext);
        let clash = self.children_of(section, parent).into_iter().any(|sibling| {
            Some(&sibling.node_id) != ignore
                && sibling.kind == kind
                && normalize_label(&sibling.label) == label
                && (kind.is_folder() || normalize_ext(sibling.ext.as_deref()) == ext)
        });
        if clash {
            Err(format!("an entry named `{label}` already exists"))
        } else {
            Ok(())
        }
    }

    fn next_node_id(&mut self) -> NodeId {
        self.next_id += 1;
        NodeId(format!("node-{}", self.next_id))
    }

    fn relevel_subtree(&mut self, root: &NodeId, level: u32) {
        let mut pending = vec![(root.clone(), level)];
        while let Some((id, level)) = pending.pop() {
            if let Some(node) = self.nodes.get_mut(&id) {
                node.level = level;
            }
            pending.extend(
                self.nodes
                    .values()
                    .filter(|node| node.parent_node_id.as_ref() == Some(&id))
                    .map(|node| (node.node_id.clone(), level + 1)),
            );
        }
    }
}

#[derive(Debug, Clone, Default)]
/// In-memory tree backend with call accounting and one-shot failure injection.
pub struct MemoryTreeBackend {
    inner: Rc<RefCell<MemoryTreeInner>>,
}

impl MemoryTreeBackend {
    /// Seeds a node as-is.
    pub fn insert(&self, node: Node) {
        self.inner
            .borrow_mut()
            .nodes
            .insert(node.node_id.clone(), node);
    }

    /// Returns a stored node.
    pub fn node(&self, node_id: &NodeId) -> Option<Node> {
        self.inner.borrow().nodes.get(node_id).cloned()
    }

    /// Makes the next call of `op` fail with `message`.
    pub fn fail_next(&self, op: BackendOp, message: impl Into<String>) {
        self.inner.borrow_mut().failures.insert(op, message.into());
    }

    /// Returns how often `op` was called.
    pub fn call_count(&self, op: BackendOp) -> usize {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter(|(called, _)| *called == op)
            .count()
    }

    /// Returns the subjects `op` was called with, in call order.
    pub fn calls(&self, op: BackendOp) -> Vec<Option<NodeId>> {
        self.inner
            .borrow()
            .calls
            .iter()
            .filter(|(called, _)| *called == op)
            .map(|(_, subject)| subject.clone())
            .collect()
    }

    fn create(
        &self,
        section: &SectionId,
        parent: Option<&NodeId>,
        kind: NodeKind,
        name: &str,
        data_document_id: Option<&str>,
    ) -> Result<Node, String> {
        let mut inner = self.inner.borrow_mut();
        let op = if kind.is_folder() {
            BackendOp::CreateFolder
        } else {
            BackendOp::CreateFile
        };
        inner.record(op, parent)?;

        let name = name.trim();
        if name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        let level = inner.parent_level(section, parent)? + 1;
        let (label, ext) = match kind {
            NodeKind::Folder => (name.to_string(), None),
            NodeKind::File => match name.rsplit_once('.') {
                Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
                    (stem.to_string(), Some(ext.to_string()))
                }
                _ => (name.to_string(), Some(DEFAULT_FILE_EXT.to_string())),
            },
        };
        inner.ensure_unique(section, parent, kind, &label, ext.as_deref(), None)?;

        let node_id = inner.next_node_id();
        let seq = inner.next_id;
        let node = match ext {
            None => Node::folder(node_id.clone(), parent.cloned(), section.clone(), label, level)
                .with_mount_id(format!("folder-{seq}")),
            Some(ext) => Node::file(
                node_id.clone(),
                parent.cloned(),
                section.clone(),
                label,
                ext,
                level,
            )
            .with_mount_id(
                data_document_id
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("doc-{seq}")),
            ),
        };
        inner.nodes.insert(node_id, node.clone());
        Ok(node)
    }

    fn apply_move(&self, node_id: &NodeId, new_parent: Option<&NodeId>) -> Result<(), String> {
        let mut inner = self.inner.borrow_mut();
        inner.record(BackendOp::Move, Some(node_id))?;

        let node = inner
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| format!("node `{node_id}` not found"))?;
        let parent_level = inner.parent_level(&node.section, new_parent)?;

        let mut cursor = new_parent.cloned();
        while let Some(id) = cursor {
            if &id == node_id {
                return Err("cannot move a folder into its own subtree".to_string());
            }
            cursor = inner.nodes.get(&id).and_then(|n| n.parent_node_id.clone());
        }
        inner.ensure_unique(
            &node.section,
            new_parent,
            node.kind,
            &node.label,
            node.ext.as_deref(),
            Some(node_id),
        )?;

        if let Some(stored) = inner.nodes.get_mut(node_id) {
            stored.parent_node_id = new_parent.cloned();
        }
        inner.relevel_subtree(node_id, parent_level + 1);
        Ok(())
    }

    fn apply_rename(&self, node_id: &NodeId, name: &str) -> Result<RenameResult, String> {
        let mut inner = self.inner.borrow_mut();
        inner.record(BackendOp::Rename, Some(node_id))?;

        let name = name.trim();
        if name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        let node = inner
            .nodes
            .get(node_id)
            .cloned()
            .ok_or_else(|| format!("node `{node_id}` not found"))?;
        inner.ensure_unique(
            &node.section,
            node.parent_node_id.as_ref(),
            node.kind,
            name,
            node.ext.as_deref(),
            Some(node_id),
        )?;
        if let Some(stored) = inner.nodes.get_mut(node_id) {
            stored.label = name.to_string();
            stored.sort_key = name.to_string();
        }
        Ok(RenameResult {
            parent_id: node.parent_node_id,
        })
    }
}

impl TreeBackend for MemoryTreeBackend {
    fn fetch_node_children<'a>(
        &'a self,
        section: &'a SectionId,
        parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<Vec<Node>, String>> {
        Box::pin(async move {
            let mut inner = self.inner.borrow_mut();
            inner.record(BackendOp::FetchChildren, parent)?;
            Ok(inner.children_of(section, parent))
        })
    }

    fn create_folder<'a>(
        &'a self,
        section: &'a SectionId,
        parent: Option<&'a NodeId>,
        name: &'a str,
    ) -> TreeBackendFuture<'a, Result<Node, String>> {
        Box::pin(async move { self.create(section, parent, NodeKind::Folder, name, None) })
    }

    fn create_file<'a>(
        &'a self,
        section: &'a SectionId,
        data_document_id: Option<&'a str>,
        name: &'a str,
        parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<Node, String>> {
        Box::pin(async move {
            self.create(section, parent, NodeKind::File, name, data_document_id)
        })
    }

    fn move_node<'a>(
        &'a self,
        node_id: &'a NodeId,
        new_parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<(), String>> {
        Box::pin(async move { self.apply_move(node_id, new_parent) })
    }

    fn rename_node<'a>(
        &'a self,
        node_id: &'a NodeId,
        name: &'a str,
    ) -> TreeBackendFuture<'a, Result<RenameResult, String>> {
        Box::pin(async move { self.apply_rename(node_id, name) })
    }
}
