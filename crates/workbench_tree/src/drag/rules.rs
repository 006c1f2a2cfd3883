//! Drop-target resolution and the kind-specific base rules.

use serde::{Deserialize, Serialize};
use workbench_host::{Node, NodeId, NodeKind, SectionId};

use crate::store::NodeStore;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
/// Where the pointer currently is during a drag gesture.
pub enum DropTarget {
    /// The empty area of a section, i.e. its synthetic root.
    Root(SectionId),
    /// Directly on a row.
    Onto(NodeId),
    /// On the gap next to a row; the row's parent is the destination.
    Between(NodeId),
}

impl DropTarget {
    /// Returns the row id the target refers to, or the root id for [`DropTarget::Root`].
    pub fn anchor(&self) -> NodeId {
        match self {
            Self::Root(section) => NodeId::section_root(section),
            Self::Onto(id) | Self::Between(id) => id.clone(),
        }
    }

    fn relation(&self) -> DropRelation {
        match self {
            Self::Root(_) | Self::Onto(_) => DropRelation::Onto,
            Self::Between(_) => DropRelation::Between,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
/// Why a drop was refused.
pub enum RejectReason {
    /// Dragged node or target is not in the store.
    UnknownNode,
    /// Target lives in another section.
    CrossSection,
    /// Destination is the dragged node's current parent.
    SameParent,
    /// Dropping a folder onto itself.
    IntoSelf,
    /// Target type cannot receive drops (drafts, root gaps).
    InvalidTarget,
    /// Destination lies inside the dragged folder's subtree.
    Cycle,
    /// Resulting nesting would exceed the maximum depth.
    DepthLimit,
    /// A same-kind sibling with the same normalized name exists.
    DuplicateName,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
/// Outcome of validating one drop target.
pub enum DropVerdict {
    /// The drop is permitted (possibly optimistically).
    Allow,
    /// The drop is refused.
    Reject(RejectReason),
}

impl DropVerdict {
    /// Returns `true` for [`DropVerdict::Allow`].
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DropRelation {
    Onto,
    Between,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetKind {
    Root,
    Folder,
    File,
    Draft,
    Dragged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BaseRule {
    /// The target itself is the destination.
    Accept,
    /// The target's parent is the destination.
    Parent,
    Reject(RejectReason),
}

/// `(dragged kind (None = any), target kind, relation) -> rule`, first match wins.
const BASE_RULES: &[(Option<NodeKind>, TargetKind, DropRelation, BaseRule)] = &[
    (None, TargetKind::Draft, DropRelation::Onto, BaseRule::Reject(RejectReason::InvalidTarget)),
    (None, TargetKind::Draft, DropRelation::Between, BaseRule::Reject(RejectReason::InvalidTarget)),
    (Some(NodeKind::Folder), TargetKind::Dragged, DropRelation::Onto, BaseRule::Reject(RejectReason::IntoSelf)),
    (Some(NodeKind::File), TargetKind::Dragged, DropRelation::Onto, BaseRule::Parent),
    (None, TargetKind::Dragged, DropRelation::Between, BaseRule::Parent),
    (None, TargetKind::Root, DropRelation::Onto, BaseRule::Accept),
    (None, TargetKind::Root, DropRelation::Between, BaseRule::Reject(RejectReason::InvalidTarget)),
    (None, TargetKind::Folder, DropRelation::Onto, BaseRule::Accept),
    (None, TargetKind::Folder, DropRelation::Between, BaseRule::Parent),
    (None, TargetKind::File, DropRelation::Onto, BaseRule::Parent),
    (None, TargetKind::File, DropRelation::Between, BaseRule::Parent),
];

fn base_rule(dragged: NodeKind, target: TargetKind, relation: DropRelation) -> BaseRule {
    BASE_RULES
        .iter()
        .find(|(kind, t, r, _)| kind.map_or(true, |kind| kind == dragged) && *t == target && *r == relation)
        .map(|(_, _, _, rule)| *rule)
        .unwrap_or(BaseRule::Reject(RejectReason::InvalidTarget))
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// A target mapped onto the folder that would receive the dragged node.
pub struct ResolvedTarget {
    /// Section of the target.
    pub section: SectionId,
    /// Destination parent, when the base rule yields one.
    pub parent: Option<NodeId>,
    /// Base-rule rejection, reported after the same-parent check.
    pub rejection: Option<RejectReason>,
}

/// Returns `true` for ids of uncommitted draft nodes.
pub fn is_draft_id(id: &NodeId) -> bool {
    id.as_str().starts_with(DRAFT_ID_PREFIX)
}

/// Prefix of every draft node id.
pub const DRAFT_ID_PREFIX: &str = "draft:";

/// Resolves `target` for `dragged` against the store.
///
/// Fails with [`RejectReason::UnknownNode`] when the target row is not in the store.
pub fn resolve_target(
    store: &NodeStore,
    dragged: &Node,
    target: &DropTarget,
) -> Result<ResolvedTarget, RejectReason> {
    let anchor = target.anchor();
    let section = store
        .section_of(&anchor)
        .cloned()
        .ok_or(RejectReason::UnknownNode)?;

    let target_kind = if anchor == dragged.node_id {
        TargetKind::Dragged
    } else if store.is_root(&anchor) {
        TargetKind::Root
    } else if is_draft_id(&anchor) {
        TargetKind::Draft
    } else {
        match store.node(&anchor).map(|node| node.kind) {
            Some(NodeKind::Folder) => TargetKind::Folder,
            Some(NodeKind::File) => TargetKind::File,
            None => return Err(RejectReason::UnknownNode),
        }
    };

    let (parent, rejection) = match base_rule(dragged.kind, target_kind, target.relation()) {
        BaseRule::Accept => (Some(anchor), None),
        BaseRule::Parent => {
            let parent = store
                .node(&anchor)
                .map(Node::parent_key)
                .ok_or(RejectReason::UnknownNode)?;
            (Some(parent), None)
        }
        BaseRule::Reject(reason) => (None, Some(reason)),
    };

    Ok(ResolvedTarget {
        section,
        parent,
        rejection,
    })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn fixture() -> (NodeStore, SectionId) {
        let section = SectionId::new("saved");
        let mut store = NodeStore::default();
        let root = store.add_section(section.clone());
        store
            .load_children(
                &root,
                vec![
                    Node::folder("reports", None, section.clone(), "Reports", 1),
                    Node::folder("archive", None, section.clone(), "Archive", 1),
                    Node::file("q1", None, section.clone(), "q1", "sql", 1),
                ],
            )
            .expect("load");
        (store, section)
    }

    #[test]
    fn onto_folder_targets_folder_and_between_targets_parent() {
        let (store, section) = fixture();
        let dragged = store.node(&NodeId::new("q1")).expect("q1").clone();

        let onto = resolve_target(&store, &dragged, &DropTarget::Onto(NodeId::new("reports")))
            .expect("resolve");
        assert_eq!(onto.parent, Some(NodeId::new("reports")));

        let between = resolve_target(&store, &dragged, &DropTarget::Between(NodeId::new("reports")))
            .expect("resolve");
        assert_eq!(between.parent, Some(NodeId::section_root(&section)));
    }

    #[test]
    fn folder_onto_itself_is_rejected_by_the_table() {
        let (store, _) = fixture();
        let dragged = store.node(&NodeId::new("reports")).expect("reports").clone();
        let resolved = resolve_target(&store, &dragged, &DropTarget::Onto(NodeId::new("reports")))
            .expect("resolve");
        assert_eq!(resolved.parent, None);
        assert_eq!(resolved.rejection, Some(RejectReason::IntoSelf));
    }

    #[test]
    fn drafts_and_unknown_rows_are_not_targets() {
        let (mut store, section) = fixture();
        let root = NodeId::section_root(&section);
        store
            .insert_child_at_index(&root, Node::folder("draft:1", None, section, "", 1), 0)
            .expect("insert draft");
        let dragged = store.node(&NodeId::new("q1")).expect("q1").clone();
        let resolved = resolve_target(&store, &dragged, &DropTarget::Onto(NodeId::new("draft:1")))
            .expect("resolve");
        assert_eq!(resolved.rejection, Some(RejectReason::InvalidTarget));

        let err = resolve_target(&store, &dragged, &DropTarget::Onto(NodeId::new("ghost")));
        assert_eq!(err, Err(RejectReason::UnknownNode));
    }
}
