//! Pending cache-refresh work for the rendering adapter.

use std::collections::BTreeSet;

use workbench_host::NodeId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Ids whose cached presentation must be refreshed in the rendering adapter.
///
/// `items` holds nodes whose label/metadata changed; `parents` holds nodes whose child order
/// changed. Consumers snapshot the queue, process the snapshot and then clear exactly that
/// snapshot, so entries appended in between survive.
pub struct InvalidationQueue {
    items: BTreeSet<NodeId>,
    parents: BTreeSet<NodeId>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
/// Snapshot of an [`InvalidationQueue`] handed to a consumer.
pub struct InvalidationBatch {
    /// Nodes whose data changed.
    pub items: Vec<NodeId>,
    /// Nodes whose child order changed.
    pub parents: Vec<NodeId>,
}

impl InvalidationBatch {
    /// Returns `true` when the batch carries no work.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.parents.is_empty()
    }
}

impl InvalidationQueue {
    /// Queues a data refresh for `id`.
    pub fn push_item(&mut self, id: NodeId) {
        self.items.insert(id);
    }

    /// Queues a child-order refresh for `id`.
    pub fn push_parent(&mut self, id: NodeId) {
        self.parents.insert(id);
    }

    /// Returns `true` when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.parents.is_empty()
    }

    /// Returns `true` when a child-order refresh for `id` is pending.
    pub fn has_parent(&self, id: &NodeId) -> bool {
        self.parents.contains(id)
    }

    /// Returns `true` when a data refresh for `id` is pending.
    pub fn has_item(&self, id: &NodeId) -> bool {
        self.items.contains(id)
    }

    /// Copies the pending work without clearing it.
    pub fn snapshot(&self) -> InvalidationBatch {
        InvalidationBatch {
            items: self.items.iter().cloned().collect(),
            parents: self.parents.iter().cloned().collect(),
        }
    }

    /// Removes exactly the ids contained in `processed`.
    pub fn clear_processed(&mut self, processed: &InvalidationBatch) {
        for id in &processed.items {
            self.items.remove(id);
        }
        for id in &processed.parents {
            self.parents.remove(id);
        }
    }

    /// Marks a single child-order refresh as done.
    pub fn clear_parent(&mut self, id: &NodeId) {
        self.parents.remove(id);
    }
}
