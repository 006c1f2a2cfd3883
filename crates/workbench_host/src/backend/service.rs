//! Tree backend service contracts.

use std::{future::Future, pin::Pin};

use super::types::{Node, NodeId, RenameResult, SectionId};

/// Object-safe boxed future used by [`TreeBackend`] async methods.
pub type TreeBackendFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Remote store holding the authoritative folder/file hierarchy.
///
/// Client-side validation is advisory only; implementations are the final arbiter for name
/// collisions and invalid moves and report them as `Err`.
pub trait TreeBackend {
    /// Lists the children of `parent` (`None` lists the section root).
    fn fetch_node_children<'a>(
        &'a self,
        section: &'a SectionId,
        parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<Vec<Node>, String>>;

    /// Creates a folder under `parent` and returns the stored node.
    fn create_folder<'a>(
        &'a self,
        section: &'a SectionId,
        parent: Option<&'a NodeId>,
        name: &'a str,
    ) -> TreeBackendFuture<'a, Result<Node, String>>;

    /// Creates a file for `data_document_id` (a fresh document when `None`) under `parent`.
    fn create_file<'a>(
        &'a self,
        section: &'a SectionId,
        data_document_id: Option<&'a str>,
        name: &'a str,
        parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<Node, String>>;

    /// Moves `node_id` under `new_parent` (`None` moves it to the section root).
    fn move_node<'a>(
        &'a self,
        node_id: &'a NodeId,
        new_parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<(), String>>;

    /// Renames `node_id`.
    fn rename_node<'a>(
        &'a self,
        node_id: &'a NodeId,
        name: &'a str,
    ) -> TreeBackendFuture<'a, Result<RenameResult, String>>;
}

#[derive(Debug, Clone, Copy, Default)]
/// No-op backend for unsupported targets and baseline tests.
pub struct NoopTreeBackend;

impl NoopTreeBackend {
    fn unsupported_error(op: &str) -> String {
        format!("tree backend unavailable: {op}")
    }
}

impl TreeBackend for NoopTreeBackend {
    fn fetch_node_children<'a>(
        &'a self,
        _section: &'a SectionId,
        _parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<Vec<Node>, String>> {
        Box::pin(async { Ok(Vec::new()) })
    }

    fn create_folder<'a>(
        &'a self,
        _section: &'a SectionId,
        _parent: Option<&'a NodeId>,
        _name: &'a str,
    ) -> TreeBackendFuture<'a, Result<Node, String>> {
        Box::pin(async { Err(Self::unsupported_error("create_folder")) })
    }

    fn create_file<'a>(
        &'a self,
        _section: &'a SectionId,
        _data_document_id: Option<&'a str>,
        _name: &'a str,
        _parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<Node, String>> {
        Box::pin(async { Err(Self::unsupported_error("create_file")) })
    }

    fn move_node<'a>(
        &'a self,
        _node_id: &'a NodeId,
        _new_parent: Option<&'a NodeId>,
    ) -> TreeBackendFuture<'a, Result<(), String>> {
        Box::pin(async { Err(Self::unsupported_error("move_node")) })
    }

    fn rename_node<'a>(
        &'a self,
        _node_id: &'a NodeId,
        _name: &'a str,
    ) -> TreeBackendFuture<'a, Result<RenameResult, String>> {
        Box::pin(async { Err(Self::unsupported_error("rename_node")) })
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn noop_tree_backend_lists_nothing_and_rejects_mutations() {
        let backend = NoopTreeBackend;
        let backend_obj: &dyn TreeBackend = &backend;
        let section = SectionId::new("saved");

        let children = block_on(backend_obj.fetch_node_children(&section, None)).expect("list");
        assert!(children.is_empty());

        let err = block_on(backend_obj.create_folder(&section, None, "Reports"))
            .expect_err("create should fail");
        assert!(err.contains("create_folder"));
        let err = block_on(backend_obj.move_node(&NodeId::new("a"), None))
            .expect_err("move should fail");
        assert!(err.contains("move_node"));
    }
}
