//! Contract for the third-party tree-rendering library and its internal row cache.

use std::{
    cell::RefCell,
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use crate::backend::types::NodeId;

/// Cache operations the core pushes into the rendering library.
///
/// The adapter keeps its own item and child-order caches and never observes the authoritative
/// store on its own; every change must be pushed through these calls.
pub trait TreeViewAdapter {
    /// Returns `true` when the adapter currently holds an item instance for `id`.
    fn has_item(&self, id: &NodeId) -> bool;

    /// Drops cached label/metadata for `id`, forcing a re-read on next render.
    fn invalidate_item_data(&self, id: &NodeId);

    /// Drops the cached child order of `id`, forcing a re-read on next render.
    fn invalidate_children_ids(&self, id: &NodeId);

    /// Replaces the cached child order of `id` without triggering a fetch.
    fn update_cached_children_ids(&self, id: &NodeId, children: &[NodeId]);

    /// Returns the ids the adapter currently renders as expanded.
    fn expanded_items(&self) -> Vec<NodeId>;

    /// Replaces the expanded id set.
    fn set_expanded_items(&self, ids: &[NodeId]);

    /// Replaces the selected id set.
    fn set_selected_items(&self, ids: &[NodeId]);
}

#[derive(Debug, Clone, Copy, Default)]
/// Adapter that renders nothing; used when no tree widget is mounted.
pub struct NoopTreeView;

impl TreeViewAdapter for NoopTreeView {
    fn has_item(&self, _id: &NodeId) -> bool {
        false
    }

    fn invalidate_item_data(&self, _id: &NodeId) {}

    fn invalidate_children_ids(&self, _id: &NodeId) {}

    fn update_cached_children_ids(&self, _id: &NodeId, _children: &[NodeId]) {}

    fn expanded_items(&self) -> Vec<NodeId> {
        Vec::new()
    }

    fn set_expanded_items(&self, _ids: &[NodeId]) {}

    fn set_selected_items(&self, _ids: &[NodeId]) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// One operation received by a [`RecordingTreeView`].
pub enum ViewOp {
    /// `invalidate_item_data`.
    InvalidateItem(NodeId),
    /// `invalidate_children_ids`.
    InvalidateChildren(NodeId),
    /// `update_cached_children_ids`.
    UpdateChildren(NodeId, Vec<NodeId>),
    /// `set_expanded_items`.
    SetExpanded(Vec<NodeId>),
    /// `set_selected_items`.
    SetSelected(Vec<NodeId>),
}

#[derive(Debug, Default)]
struct RecordingInner {
    items: BTreeSet<NodeId>,
    children: HashMap<NodeId, Vec<NodeId>>,
    expanded: Vec<NodeId>,
    selected: Vec<NodeId>,
    ops: Vec<ViewOp>,
    ignore_expansion: bool,
}

#[derive(Debug, Clone, Default)]
/// In-memory adapter that mirrors the cache state and records every call.
pub struct RecordingTreeView {
    inner: Rc<RefCell<RecordingInner>>,
}

impl RecordingTreeView {
    /// Registers item instances as if the widget had rendered them.
    pub fn mount_items<I: IntoIterator<Item = NodeId>>(&self, ids: I) {
        self.inner.borrow_mut().items.extend(ids);
    }

    /// Makes `set_expanded_items` a no-op, simulating a widget that has not applied the state yet.
    pub fn ignore_expansion(&self, ignore: bool) {
        self.inner.borrow_mut().ignore_expansion = ignore;
    }

    /// Returns the cached child order for `id`, if any.
    pub fn cached_children(&self, id: &NodeId) -> Option<Vec<NodeId>> {
        self.inner.borrow().children.get(id).cloned()
    }

    /// Returns the current selection.
    pub fn selected(&self) -> Vec<NodeId> {
        self.inner.borrow().selected.clone()
    }

    /// Returns recorded operations in call order.
    pub fn ops(&self) -> Vec<ViewOp> {
        self.inner.borrow().ops.clone()
    }

    /// Clears the operation log.
    pub fn clear_ops(&self) {
        self.inner.borrow_mut().ops.clear();
    }
}

impl TreeViewAdapter for RecordingTreeView {
    fn has_item(&self, id: &NodeId) -> bool {
        let inner = self.inner.borrow();
        inner.items.contains(id) || inner.children.contains_key(id)
    }

    fn invalidate_item_data(&self, id: &NodeId) {
        self.inner
            .borrow_mut()
            .ops
            .push(ViewOp::InvalidateItem(id.clone()));
    }

    fn invalidate_children_ids(&self, id: &NodeId) {
        let mut inner = self.inner.borrow_mut();
        inner.children.remove(id);
        inner.ops.push(ViewOp::InvalidateChildren(id.clone()));
    }

    fn update_cached_children_ids(&self, id: &NodeId, children: &[NodeId]) {
        let mut inner = self.inner.borrow_mut();
        inner.items.extend(children.iter().cloned());
        inner.children.insert(id.clone(), children.to_vec());
        inner
            .ops
            .push(ViewOp::UpdateChildren(id.clone(), children.to_vec()));
    }

    fn expanded_items(&self) -> Vec<NodeId> {
        self.inner.borrow().expanded.clone()
    }

    fn set_expanded_items(&self, ids: &[NodeId]) {
        let mut inner = self.inner.borrow_mut();
        inner.ops.push(ViewOp::SetExpanded(ids.to_vec()));
        if !inner.ignore_expansion {
            inner.expanded = ids.to_vec();
        }
    }

    fn set_selected_items(&self, ids: &[NodeId]) {
        let mut inner = self.inner.borrow_mut();
        inner.selected = ids.to_vec();
        inner.ops.push(ViewOp::SetSelected(ids.to_vec()));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn recording_view_tracks_child_cache_and_ops() {
        let view = RecordingTreeView::default();
        let view_obj: &dyn TreeViewAdapter = &view;
        let parent = NodeId::new("f1");
        let child = NodeId::new("f2");

        assert!(!view_obj.has_item(&child));
        view_obj.update_cached_children_ids(&parent, std::slice::from_ref(&child));
        assert!(view_obj.has_item(&child));
        assert_eq!(view.cached_children(&parent), Some(vec![child.clone()]));

        view_obj.invalidate_children_ids(&parent);
        assert_eq!(view.cached_children(&parent), None);
        assert_eq!(
            view.ops(),
            vec![
                ViewOp::UpdateChildren(parent.clone(), vec![child]),
                ViewOp::InvalidateChildren(parent),
            ]
        );
    }

    #[test]
    fn ignored_expansion_is_recorded_but_not_applied() {
        let view = RecordingTreeView::default();
        view.ignore_expansion(true);
        view.set_expanded_items(&[NodeId::new("f1")]);
        assert!(view.expanded_items().is_empty());
        view.ignore_expansion(false);
        view.set_expanded_items(&[NodeId::new("f1")]);
        assert_eq!(view.expanded_items(), vec![NodeId::new("f1")]);
    }
}
