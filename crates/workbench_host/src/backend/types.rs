//! Tree node data types shared across the backend contract, adapters and the core engine.

use std::{cmp::Ordering, fmt};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// Client-side identity of a tree node.
pub struct NodeId(pub String);

impl NodeId {
    /// Wraps any string-like value as a node id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the id of the synthetic root of `section`.
    pub fn section_root(section: &SectionId) -> Self {
        Self(format!("{SECTION_ROOT_PREFIX}{}", section.0))
    }

    /// Returns `true` when this id names a synthetic section root.
    pub fn is_section_root(&self) -> bool {
        self.0.starts_with(SECTION_ROOT_PREFIX)
    }

    /// Returns the raw id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for NodeId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

const SECTION_ROOT_PREFIX: &str = "section-root:";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
/// One independent tree instance (for example saved vs. unsaved queries).
pub struct SectionId(pub String);

impl SectionId {
    /// Wraps any string-like value as a section id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the raw id text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Tree node kind.
pub enum NodeKind {
    /// Container node.
    Folder,
    /// Leaf node backed by a query document.
    File,
}

impl NodeKind {
    /// Returns `true` for folders.
    pub const fn is_folder(self) -> bool {
        matches!(self, Self::Folder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// One folder or file entry of the hierarchy.
pub struct Node {
    /// Client-side identity.
    pub node_id: NodeId,
    /// Parent folder, `None` when the node sits directly under its section root.
    pub parent_node_id: Option<NodeId>,
    /// Section (tree instance) the node belongs to.
    pub section: SectionId,
    /// Folder or file.
    pub kind: NodeKind,
    /// Display label.
    pub label: String,
    /// Key used for name ordering among siblings of the same kind.
    pub sort_key: String,
    /// Backend-facing identity (for files, the data document id).
    pub mount_id: Option<String>,
    /// Depth below the section root; direct children of the root are level 1.
    pub level: u32,
    /// File extension (files only).
    pub ext: Option<String>,
}

impl Node {
    /// Builds a folder node with `sort_key` derived from `label`.
    pub fn folder(
        node_id: impl Into<NodeId>,
        parent_node_id: Option<NodeId>,
        section: SectionId,
        label: impl Into<String>,
        level: u32,
    ) -> Self {
        let label = label.into();
        Self {
            node_id: node_id.into(),
            parent_node_id,
            section,
            kind: NodeKind::Folder,
            sort_key: label.clone(),
            label,
            mount_id: None,
            level,
            ext: None,
        }
    }

    /// Builds a file node with `sort_key` derived from `label`.
    pub fn file(
        node_id: impl Into<NodeId>,
        parent_node_id: Option<NodeId>,
        section: SectionId,
        label: impl Into<String>,
        ext: impl Into<String>,
        level: u32,
    ) -> Self {
        let label = label.into();
        Self {
            node_id: node_id.into(),
            parent_node_id,
            section,
            kind: NodeKind::File,
            sort_key: label.clone(),
            label,
            mount_id: None,
            level,
            ext: Some(ext.into()),
        }
    }

    /// Sets the backend mount id.
    pub fn with_mount_id(mut self, mount_id: impl Into<String>) -> Self {
        self.mount_id = Some(mount_id.into());
        self
    }

    /// Returns `true` for folders.
    pub fn is_folder(&self) -> bool {
        self.kind.is_folder()
    }

    /// Returns the id of the parent, resolving `None` to the section root id.
    pub fn parent_key(&self) -> NodeId {
        self.parent_node_id
            .clone()
            .unwrap_or_else(|| NodeId::section_root(&self.section))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
/// Result payload of a successful rename.
pub struct RenameResult {
    /// Parent folder of the renamed node, `None` for the section root.
    pub parent_id: Option<NodeId>,
}

/// Lowercases and trims a label for uniqueness comparisons.
pub fn normalize_label(label: &str) -> String {
    label.trim().to_lowercase()
}

/// Normalizes a file extension for uniqueness comparisons (`".SQL"` and `"sql"` are equal).
pub fn normalize_ext(ext: Option<&str>) -> String {
    ext.map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
        .unwrap_or_default()
}

/// Orders siblings folders-first, then by case-insensitive sort key, then by id.
pub fn compare_siblings(a: &Node, b: &Node) -> Ordering {
    let kind_rank = |node: &Node| if node.is_folder() { 0 } else { 1 };
    kind_rank(a)
        .cmp(&kind_rank(b))
        .then_with(|| a.sort_key.to_lowercase().cmp(&b.sort_key.to_lowercase()))
        .then_with(|| a.node_id.cmp(&b.node_id))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn node_kind_serde_values_are_kebab_case() {
        assert_eq!(
            serde_json::to_string(&NodeKind::Folder).expect("serialize"),
            "\"folder\""
        );
        let kind: NodeKind = serde_json::from_str("\"file\"").expect("deserialize");
        assert_eq!(kind, NodeKind::File);
    }

    #[test]
    fn section_root_ids_are_recognizable() {
        let section = SectionId::new("saved");
        let root = NodeId::section_root(&section);
        assert!(root.is_section_root());
        assert!(!NodeId::new("folder-1").is_section_root());

        let node = Node::folder("f1", None, section.clone(), "Reports", 1);
        assert_eq!(node.parent_key(), root);
    }

    #[test]
    fn siblings_sort_folders_first_then_by_name() {
        let section = SectionId::new("saved");
        let mut nodes = vec![
            Node::file("q1", None, section.clone(), "q1", "sql", 1),
            Node::folder("beta", None, section.clone(), "beta", 1),
            Node::folder("alpha", None, section.clone(), "Alpha", 1),
        ];
        nodes.sort_by(compare_siblings);
        let ids: Vec<&str> = nodes.iter().map(|n| n.node_id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "beta", "q1"]);
    }

    #[test]
    fn label_and_ext_normalization_ignore_case_and_padding() {
        assert_eq!(normalize_label("  Monthly Report "), "monthly report");
        assert_eq!(normalize_ext(Some(".SQL")), "sql");
        assert_eq!(normalize_ext(Some("sql")), "sql");
        assert_eq!(normalize_ext(None), "");
    }
}
