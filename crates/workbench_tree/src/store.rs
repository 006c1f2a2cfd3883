//! Normalized node records plus the ordered children index per parent.

use std::collections::HashMap;

use thiserror::Error;
use workbench_host::{compare_siblings, normalize_ext, normalize_label, Node, NodeId, SectionId};

use crate::invalidation::InvalidationQueue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Load state of one parent's children.
pub enum Children<'a> {
    /// Never loaded; distinct from an empty listing.
    Unknown,
    /// Loaded, possibly empty, in display order.
    Loaded(&'a [NodeId]),
}

impl<'a> Children<'a> {
    /// Returns the loaded ids, if any.
    pub fn loaded(self) -> Option<&'a [NodeId]> {
        match self {
            Self::Unknown => None,
            Self::Loaded(ids) => Some(ids),
        }
    }

    /// Returns `true` when the children have been loaded.
    pub fn is_known(self) -> bool {
        matches!(self, Self::Loaded(_))
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Store mutation errors for operations that reference unknown state.
pub enum StoreError {
    /// The node id is not in the store.
    #[error("node `{0}` not found")]
    NodeNotFound(NodeId),
    /// The parent is neither a registered section root nor a stored folder.
    #[error("parent `{0}` not found")]
    ParentNotFound(NodeId),
    /// The parent exists but is a file.
    #[error("`{0}` is not a folder")]
    NotAFolder(NodeId),
    /// The parent's children were never loaded, so an index is meaningless.
    #[error("children of `{0}` are not loaded")]
    ChildrenUnknown(NodeId),
    /// The destination lies inside the moved node's own subtree.
    #[error("cannot move `{0}` into its own subtree")]
    Cycle(NodeId),
    /// The node would land in a different section.
    #[error("`{0}` cannot leave its section")]
    CrossSection(NodeId),
}

#[derive(Debug, Clone, Default)]
/// Authoritative client-side copy of the tree.
///
/// All mutations are synchronous. Structural changes enqueue the affected parents and
/// label/metadata changes enqueue the affected items on the [`InvalidationQueue`].
pub struct NodeStore {
    nodes: HashMap<NodeId, Node>,
    children: HashMap<NodeId, Vec<NodeId>>,
    roots: HashMap<NodeId, SectionId>,
    invalidations: InvalidationQueue,
}

impl NodeStore {
    /// Registers the synthetic root of `section` and returns its id.
    pub fn add_section(&mut self, section: SectionId) -> NodeId {
        let root = NodeId::section_root(&section);
        self.roots.insert(root.clone(), section);
        root
    }

    /// Returns the root id of `section`.
    pub fn section_root(section: &SectionId) -> NodeId {
        NodeId::section_root(section)
    }

    /// Returns `true` when `id` is a registered section root.
    pub fn is_root(&self, id: &NodeId) -> bool {
        self.roots.contains_key(id)
    }

    /// Returns a stored node. Section roots are not stored nodes.
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Returns the level of a node or root (roots are level 0).
    pub fn level_of(&self, id: &NodeId) -> Option<u32> {
        if self.is_root(id) {
            return Some(0);
        }
        self.nodes.get(id).map(|node| node.level)
    }

    /// Returns the section of a node or root.
    pub fn section_of(&self, id: &NodeId) -> Option<&SectionId> {
        self.roots
            .get(id)
            .or_else(|| self.nodes.get(id).map(|node| &node.section))
    }

    /// Returns `true` when `id` can contain children (root or stored folder).
    pub fn is_container(&self, id: &NodeId) -> bool {
        self.is_root(id) || self.nodes.get(id).is_some_and(Node::is_folder)
    }

    /// Returns the load state of `parent`'s children.
    pub fn children(&self, parent: &NodeId) -> Children<'_> {
        match self.children.get(parent) {
            Some(ids) => Children::Loaded(ids),
            None => Children::Unknown,
        }
    }

    /// Returns the loaded child records of `parent`.
    pub fn child_nodes(&self, parent: &NodeId) -> Option<Vec<&Node>> {
        let ids = self.children(parent).loaded()?;
        Some(ids.iter().filter_map(|id| self.nodes.get(id)).collect())
    }

    /// Returns the pending adapter invalidations.
    pub fn invalidations(&self) -> &InvalidationQueue {
        &self.invalidations
    }

    /// Mutable access to the pending adapter invalidations.
    pub fn invalidations_mut(&mut self) -> &mut InvalidationQueue {
        &mut self.invalidations
    }

    /// Inserts or replaces a node record.
    ///
    /// A new node whose parent's children are loaded joins that listing at its sorted position.
    /// A replaced node whose parent changed is moved.
    pub fn upsert_node(&mut self, mut node: Node) -> Result<(), StoreError> {
        let parent = node.parent_key();
        if let Some(level) = self.level_of(&parent) {
            node.level = level + 1;
        }

        let Some(existing) = self.nodes.get(&node.node_id).cloned() else {
            let id = node.node_id.clone();
            let loaded = self.children.contains_key(&parent);
            self.nodes.insert(id.clone(), node);
            if loaded {
                let index = self.sorted_insert_index_for(&parent, &id);
                self.attach(&parent, id, index);
            }
            return Ok(());
        };

        if existing.parent_key() != parent {
            let id = node.node_id.clone();
            let label = node.label.clone();
            self.move_node(&id, &parent)?;
            if existing.label != label {
                self.rename_node(&id, &label)?;
            }
            return Ok(());
        }

        let reorder = existing.sort_key != node.sort_key || existing.kind != node.kind;
        let id = node.node_id.clone();
        if existing != node {
            self.invalidations.push_item(id.clone());
        }
        self.nodes.insert(id.clone(), node);
        if reorder {
            self.resort(&parent);
        }
        Ok(())
    }

    /// Inserts `node` as a child of `parent` at `index` (clamped to the listing length).
    ///
    /// The node's parent, section and level are normalized to the destination.
    pub fn insert_child_at_index(
        &mut self,
        parent: &NodeId,
        mut node: Node,
        index: usize,
    ) -> Result<(), StoreError> {
        let (section, level) = self.container(parent)?;
        if !self.children.contains_key(parent) {
            return Err(StoreError::ChildrenUnknown(parent.clone()));
        }
        if let Some(existing) = self.nodes.get(&node.node_id) {
            let previous = existing.parent_key();
            self.detach(&previous, &node.node_id.clone());
        }

        node.parent_node_id = (!self.is_root(parent)).then(|| parent.clone());
        node.section = section;
        node.level = level + 1;
        let id = node.node_id.clone();
        self.nodes.insert(id.clone(), node);
        self.attach(parent, id, index);
        Ok(())
    }

    /// Inserts `node` under `parent` at its folders-first, name-sorted position.
    pub fn insert_child_sorted(&mut self, parent: &NodeId, node: Node) -> Result<usize, StoreError> {
        let index = self.sorted_insert_index(parent, &node);
        self.insert_child_at_index(parent, node, index)?;
        Ok(index)
    }

    /// Removes `id` (and every known descendant) from `parent`.
    pub fn remove_node(&mut self, parent: &NodeId, id: &NodeId) -> Result<Node, StoreError> {
        let node = self
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
        self.detach(parent, id);

        let mut pending = vec![id.clone()];
        while let Some(current) = pending.pop() {
            self.nodes.remove(&current);
            if let Some(children) = self.children.remove(&current) {
                pending.extend(children);
            }
        }
        Ok(node)
    }

    /// Replaces the listing of `parent` with `nodes`, sorted folders-first by name.
    ///
    /// Previously listed children missing from `nodes` are dropped with their subtrees, and so
    /// are stored nodes that link to `parent` without being part of the listing.
    pub fn load_children(&mut self, parent: &NodeId, nodes: Vec<Node>) -> Result<(), StoreError> {
        let (section, level) = self.container(parent)?;
        let parent_node_id = (!self.is_root(parent)).then(|| parent.clone());

        let mut nodes = nodes;
        for node in &mut nodes {
            node.parent_node_id = parent_node_id.clone();
            node.section = section.clone();
            node.level = level + 1;
        }
        nodes.sort_by(compare_siblings);

        let incoming: Vec<NodeId> = nodes.iter().map(|node| node.node_id.clone()).collect();
        let mut stale: Vec<NodeId> = self
            .children
            .get(parent)
            .cloned()
            .unwrap_or_default();
        stale.extend(
            self.nodes
                .values()
                .filter(|node| &node.parent_key() == parent)
                .map(|node| node.node_id.clone()),
        );
        stale.retain(|id| !incoming.contains(id));
        for id in stale {
            // an id reachable twice is already gone on the second pass
            if self.nodes.contains_key(&id) {
                let _ = self.remove_node(parent, &id);
            }
        }

        for node in nodes {
            let id = node.node_id.clone();
            match self.nodes.get(&id) {
                Some(existing) if existing == &node => {}
                Some(existing) => {
                    let previous = existing.parent_key();
                    if &previous != parent {
                        self.detach(&previous, &id);
                    }
                    self.invalidations.push_item(id.clone());
                    self.nodes.insert(id.clone(), node);
                    self.relevel_children(&id);
                }
                None => {
                    self.nodes.insert(id, node);
                }
            }
        }
        self.children.insert(parent.clone(), incoming);
        self.invalidations.push_parent(parent.clone());
        Ok(())
    }

    /// Moves `id` under `new_parent`, re-leveling every known descendant.
    pub fn move_node(&mut self, id: &NodeId, new_parent: &NodeId) -> Result<(), StoreError> {
        let node = self
            .nodes
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
        let (section, level) = self.container(new_parent)?;
        if section != node.section {
            return Err(StoreError::CrossSection(id.clone()));
        }
        if self.is_same_or_descendant(new_parent, id) {
            return Err(StoreError::Cycle(id.clone()));
        }

        let previous = node.parent_key();
        self.detach(&previous, id);
        if let Some(stored) = self.nodes.get_mut(id) {
            stored.parent_node_id = (!self.roots.contains_key(new_parent)).then(|| new_parent.clone());
            stored.level = level + 1;
        }
        self.invalidations.push_item(id.clone());
        self.relevel_children(id);

        if self.children.contains_key(new_parent) {
            let index = self.sorted_insert_index_for(new_parent, id);
            self.attach(new_parent, id.clone(), index);
        }
        Ok(())
    }

    /// Changes the label (and sort key) of `id`, re-sorting its siblings.
    pub fn rename_node(&mut self, id: &NodeId, label: &str) -> Result<(), StoreError> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| StoreError::NodeNotFound(id.clone()))?;
        node.label = label.to_string();
        node.sort_key = label.to_string();
        let parent = node.parent_key();
        self.invalidations.push_item(id.clone());
        self.resort(&parent);
        Ok(())
    }

    /// Returns the folders-first, name-sorted index `node` would take under `parent`.
    ///
    /// Returns `0` when the children are unknown.
    pub fn sorted_insert_index(&self, parent: &NodeId, node: &Node) -> usize {
        let Some(ids) = self.children(parent).loaded() else {
            return 0;
        };
        ids.iter()
            .filter(|id| **id != node.node_id)
            .filter_map(|id| self.nodes.get(id))
            .take_while(|sibling| compare_siblings(sibling, node).is_lt())
            .count()
    }

    /// Returns the index right after the last folder child of `parent`.
    pub fn folder_boundary(&self, parent: &NodeId) -> usize {
        self.children(parent)
            .loaded()
            .map(|ids| {
                ids.iter()
                    .take_while(|id| self.nodes.get(*id).is_some_and(Node::is_folder))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Returns the position of `id` in `parent`'s listing.
    pub fn index_of(&self, parent: &NodeId, id: &NodeId) -> Option<usize> {
        self.children(parent)
            .loaded()?
            .iter()
            .position(|child| child == id)
    }

    /// Returns `true` when `candidate` is `ancestor` or lies below it in the known tree.
    pub fn is_same_or_descendant(&self, candidate: &NodeId, ancestor: &NodeId) -> bool {
        let mut cursor = Some(candidate.clone());
        while let Some(id) = cursor {
            if &id == ancestor {
                return true;
            }
            cursor = self.nodes.get(&id).and_then(|node| node.parent_node_id.clone());
        }
        false
    }

    /// Checks the level, parent-link and name-uniqueness invariants over the whole store.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violation found.
    pub fn verify_invariants(&self) -> Result<(), String> {
        for node in self.nodes.values() {
            let parent = node.parent_key();
            if let Some(ids) = self.children.get(&parent) {
                if !ids.contains(&node.node_id) {
                    return Err(format!(
                        "`{}` links to `{parent}` but is missing from its listing",
                        node.node_id
                    ));
                }
            }
            if let Some(level) = self.level_of(&parent) {
                if node.level != level + 1 {
                    return Err(format!(
                        "`{}` has level {} under parent level {level}",
                        node.node_id, node.level
                    ));
                }
            }
        }
        for (parent, ids) in &self.children {
            let mut seen = std::collections::HashSet::new();
            for id in ids {
                let node = self
                    .nodes
                    .get(id)
                    .ok_or_else(|| format!("`{parent}` lists missing child `{id}`"))?;
                if &node.parent_key() != parent {
                    return Err(format!("`{id}` is listed under `{parent}` but links elsewhere"));
                }
                if node.label.is_empty() {
                    continue;
                }
                let key = (
                    node.kind,
                    normalize_label(&node.label),
                    if node.is_folder() {
                        String::new()
                    } else {
                        normalize_ext(node.ext.as_deref())
                    },
                );
                if !seen.insert(key) {
                    return Err(format!("duplicate name `{}` under `{parent}`", node.label));
                }
            }
        }
        Ok(())
    }

    fn container(&self, id: &NodeId) -> Result<(SectionId, u32), StoreError> {
        if let Some(section) = self.roots.get(id) {
            return Ok((section.clone(), 0));
        }
        match self.nodes.get(id) {
            Some(node) if node.is_folder() => Ok((node.section.clone(), node.level)),
            Some(_) => Err(StoreError::NotAFolder(id.clone())),
            None => Err(StoreError::ParentNotFound(id.clone())),
        }
    }

    fn sorted_insert_index_for(&self, parent: &NodeId, id: &NodeId) -> usize {
        match self.nodes.get(id) {
            Some(node) => self.sorted_insert_index(parent, node),
            None => 0,
        }
    }

    fn attach(&mut self, parent: &NodeId, id: NodeId, index: usize) {
        let Some(ids) = self.children.get_mut(parent) else {
            return;
        };
        ids.retain(|child| child != &id);
        let index = index.min(ids.len());
        ids.insert(index, id);
        self.invalidations.push_parent(parent.clone());
    }

    fn detach(&mut self, parent: &NodeId, id: &NodeId) {
        if let Some(ids) = self.children.get_mut(parent) {
            let before = ids.len();
            ids.retain(|child| child != id);
            if ids.len() != before {
                self.invalidations.push_parent(parent.clone());
            }
        }
    }

    fn resort(&mut self, parent: &NodeId) {
        let Some(ids) = self.children.get(parent) else {
            return;
        };
        let mut sorted: Vec<&Node> = ids.iter().filter_map(|id| self.nodes.get(id)).collect();
        sorted.sort_by(|a, b| compare_siblings(a, b));
        let sorted: Vec<NodeId> = sorted.into_iter().map(|node| node.node_id.clone()).collect();
        if &sorted != ids {
            self.children.insert(parent.clone(), sorted);
            self.invalidations.push_parent(parent.clone());
        }
    }

    fn relevel_children(&mut self, id: &NodeId) {
        let mut pending = vec![id.clone()];
        while let Some(current) = pending.pop() {
            let Some(level) = self.nodes.get(&current).map(|node| node.level) else {
                continue;
            };
            let Some(children) = self.children.get(&current).cloned() else {
                continue;
            };
            for child in children {
                if let Some(node) = self.nodes.get_mut(&child) {
                    if node.level != level + 1 {
                        node.level = level + 1;
                        self.invalidations.push_item(child.clone());
                    }
                    pending.push(child);
                }
            }
        }
    }
}
