//! Pushes node store changes into the rendering adapter's cache.
//!
//! The adapter never observes the store by itself. Everything it must re-read is pushed here,
//! either as an invalidation (the adapter re-reads lazily on the next render) or as a direct
//! child-order patch (no re-read, and therefore no implicit background fetch mid-mutation).

use tracing::trace;
use workbench_host::{NodeId, TreeViewAdapter};

use crate::{invalidation::InvalidationBatch, store::NodeStore};

/// Drains the store's invalidation queue into every section's adapter.
///
/// Only the snapshot taken at the start is cleared afterwards, so invalidations enqueued while
/// the adapters are being driven stay pending for the next run. An id is only pushed to adapters
/// that hold an instance of it; removed nodes have no section left to route by.
pub fn sync(store: &mut NodeStore, views: &[&dyn TreeViewAdapter]) -> InvalidationBatch {
    let batch = store.invalidations().snapshot();
    if batch.is_empty() {
        return batch;
    }

    for view in views {
        for id in &batch.items {
            if view.has_item(id) {
                view.invalidate_item_data(id);
            }
        }
        for id in &batch.parents {
            if view.has_item(id) {
                view.invalidate_children_ids(id);
            }
        }
    }
    trace!(
        items = batch.items.len(),
        parents = batch.parents.len(),
        "tree view invalidated"
    );

    store.invalidations_mut().clear_processed(&batch);
    batch
}

/// Writes the store's current child order of `parent` straight into the adapter cache.
///
/// The pending child-order invalidation for `parent` is consumed, because the adapter now holds
/// exactly what the store holds. Unknown children are left alone.
pub fn patch_children(store: &mut NodeStore, view: &dyn TreeViewAdapter, parent: &NodeId) {
    let Some(ids) = store.children(parent).loaded().map(<[NodeId]>::to_vec) else {
        return;
    };
    view.update_cached_children_ids(parent, &ids);
    store.invalidations_mut().clear_parent(parent);
}

/// Seeds the adapter with a folder whose children were just loaded.
///
/// The child order is patched in and the folder row itself is invalidated so its expandable
/// state re-renders.
pub fn prime_children(store: &mut NodeStore, view: &dyn TreeViewAdapter, parent: &NodeId) {
    patch_children(store, view, parent);
    if !parent.is_section_root() && view.has_item(parent) {
        view.invalidate_item_data(parent);
    }
}
