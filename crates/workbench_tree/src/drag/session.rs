//! Per-gesture drop validation with incremental subtree exploration.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::{debug, trace};
use workbench_host::{normalize_ext, normalize_label, Node, NodeId};

use super::{
    prefetch::{PrefetchCache, PrefetchQueue},
    rules::{resolve_target, DropTarget, DropVerdict, RejectReason},
};
use crate::{config::TreeConfig, store::NodeStore};

/// Shared state a validation tick reads and feeds.
pub struct ValidationContext<'a> {
    /// Authoritative tree.
    pub store: &'a NodeStore,
    /// Listings prefetched outside the store.
    pub cache: &'a PrefetchCache,
    /// Throttled prefetch requests.
    pub queue: &'a mut PrefetchQueue,
    /// Depth limit and exploration budgets.
    pub config: &'a TreeConfig,
}

#[derive(Debug, Clone, Default)]
struct ChildNames {
    folders: HashSet<String>,
    files: HashSet<(String, String)>,
}

impl ChildNames {
    fn from_nodes<'n>(nodes: impl IntoIterator<Item = &'n Node>) -> Self {
        let mut names = Self::default();
        for node in nodes {
            // drafts have no name yet
            if node.label.trim().is_empty() {
                continue;
            }
            let label = normalize_label(&node.label);
            if node.is_folder() {
                names.folders.insert(label);
            } else {
                names.files.insert((label, normalize_ext(node.ext.as_deref())));
            }
        }
        names
    }

    fn contains(&self, node: &Node) -> bool {
        let label = normalize_label(&node.label);
        if node.is_folder() {
            self.folders.contains(&label)
        } else {
            self.files
                .contains(&(label, normalize_ext(node.ext.as_deref())))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AncestorWalk {
    Clear,
    Cycle,
}

#[derive(Debug, Clone)]
struct SubtreeExploration {
    frontier: VecDeque<(NodeId, u32)>,
    visited: HashSet<NodeId>,
    missing: HashMap<NodeId, u32>,
    baseline_level: u32,
    deepest_level: u32,
    budget_remaining: usize,
    complete: bool,
}

impl SubtreeExploration {
    fn seed(root: &Node, budget: usize) -> Self {
        Self {
            frontier: VecDeque::from([(root.node_id.clone(), root.level)]),
            visited: HashSet::from([root.node_id.clone()]),
            missing: HashMap::new(),
            baseline_level: root.level,
            deepest_level: root.level,
            budget_remaining: budget,
            complete: false,
        }
    }

    fn height(&self) -> u32 {
        self.deepest_level.saturating_sub(self.baseline_level)
    }
}

fn known_children<'c>(
    store: &'c NodeStore,
    cache: &'c PrefetchCache,
    folder: &NodeId,
) -> Option<Vec<&'c Node>> {
    store
        .child_nodes(folder)
        .or_else(|| cache.get(folder).map(|nodes| nodes.iter().collect()))
}

fn walk_ancestors(store: &NodeStore, dragged: &NodeId, start: &NodeId) -> Option<AncestorWalk> {
    let mut cursor = start.clone();
    loop {
        if &cursor == dragged {
            return Some(AncestorWalk::Cycle);
        }
        if store.is_root(&cursor) {
            return Some(AncestorWalk::Clear);
        }
        cursor = store.node(&cursor)?.parent_key();
    }
}

#[derive(Debug, Clone)]
/// Validation state for one drag gesture.
///
/// Everything cached here (sibling names, ancestor walks, subtree exploration) lives exactly as
/// long as the gesture. Listings fetched on behalf of the session land in the shared
/// [`PrefetchCache`], which outlives it.
pub struct DragSession {
    id: String,
    dragged: Node,
    child_names: HashMap<NodeId, ChildNames>,
    ancestor_walks: HashMap<NodeId, AncestorWalk>,
    requested: HashSet<NodeId>,
    exploration: Option<SubtreeExploration>,
}

impl DragSession {
    /// Starts a session for `dragged`.
    pub fn new(id: impl Into<String>, dragged: Node) -> Self {
        Self {
            id: id.into(),
            dragged,
            child_names: HashMap::new(),
            ancestor_walks: HashMap::new(),
            requested: HashSet::new(),
            exploration: None,
        }
    }

    /// Returns the gesture id supplied by the drag source.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the node record captured when the gesture started.
    pub fn dragged(&self) -> &Node {
        &self.dragged
    }

    /// Returns the deepest descendant level discovered so far below a dragged folder.
    pub fn deepest_known_level(&self) -> Option<u32> {
        self.exploration.as_ref().map(|exp| exp.deepest_level)
    }

    /// Returns `true` while some folder of the dragged subtree has unknown children.
    pub fn has_unexplored_folders(&self) -> bool {
        self.exploration
            .as_ref()
            .is_some_and(|exp| !exp.missing.is_empty() || !exp.frontier.is_empty())
    }

    /// Returns the exploration prefetches this session may still issue.
    pub fn prefetch_budget_remaining(&self) -> Option<usize> {
        self.exploration.as_ref().map(|exp| exp.budget_remaining)
    }

    /// Validates dropping the dragged node on `target`.
    ///
    /// Each call first advances subtree exploration by one bounded tick. Checks then run in
    /// order: section isolation, no-op move, base rules, ancestry, depth, duplicate names.
    /// Unknown information never rejects; it allows and schedules a prefetch instead.
    pub fn evaluate(&mut self, target: &DropTarget, ctx: &mut ValidationContext<'_>) -> DropVerdict {
        self.explore(ctx);
        let verdict = self.check(target, ctx);
        trace!(session = %self.id, ?target, ?verdict, "drop evaluated");
        verdict
    }

    /// Records that the listing of `folder` is now available (in the store or the cache).
    pub fn on_children_available(&mut self, folder: &NodeId) {
        self.child_names.remove(folder);
        if let Some(exp) = self.exploration.as_mut() {
            if let Some(level) = exp.missing.remove(folder) {
                exp.frontier.push_back((folder.clone(), level));
            }
        }
    }

    /// Drops cached facts about `parent` after the store changed under the session.
    pub fn forget_parent(&mut self, parent: &NodeId) {
        self.child_names.remove(parent);
        self.ancestor_walks.clear();
    }

    fn check(&mut self, target: &DropTarget, ctx: &mut ValidationContext<'_>) -> DropVerdict {
        let resolved = match resolve_target(ctx.store, &self.dragged, target) {
            Ok(resolved) => resolved,
            Err(reason) => return DropVerdict::Reject(reason),
        };
        if resolved.section != self.dragged.section {
            return DropVerdict::Reject(RejectReason::CrossSection);
        }
        if resolved.parent.as_ref() == Some(&self.dragged.parent_key()) {
            return DropVerdict::Reject(RejectReason::SameParent);
        }
        let Some(destination) = resolved.parent else {
            return DropVerdict::Reject(resolved.rejection.unwrap_or(RejectReason::InvalidTarget));
        };

        if self.dragged.is_folder() && self.walk(ctx.store, &destination) == Some(AncestorWalk::Cycle) {
            return DropVerdict::Reject(RejectReason::Cycle);
        }

        let Some(destination_level) = ctx.store.level_of(&destination) else {
            return DropVerdict::Reject(RejectReason::UnknownNode);
        };
        let new_level = destination_level + 1;
        if new_level > ctx.config.max_depth {
            return DropVerdict::Reject(RejectReason::DepthLimit);
        }
        let height = self.exploration.as_ref().map_or(0, SubtreeExploration::height);
        if new_level + height > ctx.config.max_depth {
            return DropVerdict::Reject(RejectReason::DepthLimit);
        }

        if !self.child_names.contains_key(&destination) {
            match known_children(ctx.store, ctx.cache, &destination) {
                Some(children) => {
                    self.child_names
                        .insert(destination.clone(), ChildNames::from_nodes(children));
                }
                None => {
                    if self.requested.insert(destination.clone()) {
                        debug!(
                            session = %self.id,
                            folder = %destination,
                            "destination listing requested"
                        );
                        ctx.queue.enqueue(destination, resolved.section);
                    }
                    return DropVerdict::Allow;
                }
            }
        }
        let duplicate = self
            .child_names
            .get(&destination)
            .is_some_and(|names| names.contains(&self.dragged));
        if duplicate {
            DropVerdict::Reject(RejectReason::DuplicateName)
        } else {
            DropVerdict::Allow
        }
    }

    fn walk(&mut self, store: &NodeStore, destination: &NodeId) -> Option<AncestorWalk> {
        if let Some(walk) = self.ancestor_walks.get(destination) {
            return Some(*walk);
        }
        // an incomplete chain is retried on the next tick
        let walk = walk_ancestors(store, &self.dragged.node_id, destination)?;
        self.ancestor_walks.insert(destination.clone(), walk);
        Some(walk)
    }

    fn explore(&mut self, ctx: &mut ValidationContext<'_>) {
        if !self.dragged.is_folder() {
            return;
        }
        let exp = self
            .exploration
            .get_or_insert_with(|| SubtreeExploration::seed(&self.dragged, ctx.config.prefetch_budget));

        let recovered: Vec<(NodeId, u32)> = exp
            .missing
            .iter()
            .filter(|(folder, _)| known_children(ctx.store, ctx.cache, folder).is_some())
            .map(|(folder, level)| (folder.clone(), *level))
            .collect();
        for (folder, level) in recovered {
            exp.missing.remove(&folder);
            exp.frontier.push_back((folder, level));
        }

        let mut budget = ctx.config.explore_per_tick;
        while budget > 0 {
            let Some((folder, level)) = exp.frontier.pop_front() else {
                break;
            };
            budget -= 1;

            let Some(children) = known_children(ctx.store, ctx.cache, &folder) else {
                exp.missing.insert(folder.clone(), level);
                if exp.budget_remaining > 0 && self.requested.insert(folder.clone()) {
                    exp.budget_remaining -= 1;
                    debug!(session = %self.id, folder = %folder, "subtree listing requested");
                    ctx.queue.enqueue(folder, self.dragged.section.clone());
                }
                continue;
            };
            if !children.is_empty() {
                exp.deepest_level = exp.deepest_level.max(level + 1);
            }
            for child in children {
                if child.is_folder() && exp.visited.insert(child.node_id.clone()) {
                    exp.frontier.push_back((child.node_id.clone(), level + 1));
                }
            }
        }

        if !exp.complete && exp.frontier.is_empty() && exp.missing.is_empty() {
            exp.complete = true;
            debug!(
                session = %self.id,
                deepest = exp.deepest_level,
                "dragged subtree fully explored"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use workbench_host::SectionId;

    use super::*;
    use crate::drag::prefetch::PrefetchPoll;

    struct Fixture {
        store: NodeStore,
        cache: PrefetchCache,
        queue: PrefetchQueue,
        config: TreeConfig,
        section: SectionId,
    }

    impl Fixture {
        fn new() -> Self {
            let section = SectionId::new("saved");
            let mut store = NodeStore::default();
            let root = store.add_section(section.clone());
            store
                .load_children(
                    &root,
                    vec![
                        Node::folder("a", None, section.clone(), "A", 1),
                        Node::folder("b", None, section.clone(), "B", 1),
                        Node::file("q", None, section.clone(), "Q", "sql", 1),
                    ],
                )
                .expect("load root");
            Self {
                store,
                cache: PrefetchCache::default(),
                queue: PrefetchQueue::new(0),
                config: TreeConfig::default(),
                section,
            }
        }

        fn load(&mut self, parent: &str, nodes: Vec<Node>) {
            self.store
                .load_children(&NodeId::new(parent), nodes)
                .expect("load");
        }

        fn session(&self, id: &str) -> DragSession {
            let node = self.store.node(&NodeId::new(id)).expect("dragged").clone();
            DragSession::new("drag-1", node)
        }

        fn evaluate(&mut self, session: &mut DragSession, target: DropTarget) -> DropVerdict {
            let mut ctx = ValidationContext {
                store: &self.store,
                cache: &self.cache,
                queue: &mut self.queue,
                config: &self.config,
            };
            session.evaluate(&target, &mut ctx)
        }

        fn drain_queue(&mut self) -> Vec<NodeId> {
            let mut folders = Vec::new();
            while let PrefetchPoll::Ready(request) = self.queue.poll(0) {
                self.queue.complete(&request.folder);
                folders.push(request.folder);
            }
            folders
        }
    }

    fn onto(id: &str) -> DropTarget {
        DropTarget::Onto(NodeId::new(id))
    }

    #[test]
    fn same_parent_and_self_targets_are_rejected() {
        let mut fx = Fixture::new();
        fx.load("a", vec![]);
        let mut session = fx.session("a");

        assert_eq!(
            fx.evaluate(&mut session, DropTarget::Root(fx.section.clone())),
            DropVerdict::Reject(RejectReason::SameParent)
        );
        assert_eq!(
            fx.evaluate(&mut session, onto("a")),
            DropVerdict::Reject(RejectReason::IntoSelf)
        );
        assert_eq!(
            fx.evaluate(&mut session, DropTarget::Between(NodeId::new("q"))),
            DropVerdict::Reject(RejectReason::SameParent)
        );
    }

    #[test]
    fn dropping_a_folder_into_its_descendant_is_a_cycle() {
        let mut fx = Fixture::new();
        let section = fx.section.clone();
        fx.load("a", vec![Node::folder("a1", Some("a".into()), section.clone(), "A1", 2)]);
        fx.load("a1", vec![Node::folder("a2", Some("a1".into()), section, "A2", 3)]);
        let mut session = fx.session("a");

        assert_eq!(
            fx.evaluate(&mut session, onto("a2")),
            DropVerdict::Reject(RejectReason::Cycle)
        );
        assert_eq!(
            fx.evaluate(&mut session, DropTarget::Between(NodeId::new("a2"))),
            DropVerdict::Reject(RejectReason::Cycle)
        );
    }

    #[test]
    fn cross_section_targets_are_rejected() {
        let mut fx = Fixture::new();
        let other = SectionId::new("unsaved");
        let other_root = fx.store.add_section(other.clone());
        fx.store
            .load_children(&other_root, vec![Node::folder("x", None, other.clone(), "X", 1)])
            .expect("load other");
        let mut session = fx.session("q");

        assert_eq!(
            fx.evaluate(&mut session, onto("x")),
            DropVerdict::Reject(RejectReason::CrossSection)
        );
        assert_eq!(
            fx.evaluate(&mut session, DropTarget::Root(other)),
            DropVerdict::Reject(RejectReason::CrossSection)
        );
    }

    #[test]
    fn unknown_destination_children_allow_and_prefetch_once() {
        let mut fx = Fixture::new();
        let mut session = fx.session("q");

        assert_eq!(fx.evaluate(&mut session, onto("b")), DropVerdict::Allow);
        assert_eq!(fx.evaluate(&mut session, onto("b")), DropVerdict::Allow);
        assert_eq!(fx.drain_queue(), vec![NodeId::new("b")]);

        let section = fx.section.clone();
        fx.cache.insert(
            NodeId::new("b"),
            vec![Node::file("b-q", Some("b".into()), section, "q", "SQL", 2)],
        );
        session.on_children_available(&NodeId::new("b"));
        assert_eq!(
            fx.evaluate(&mut session, onto("b")),
            DropVerdict::Reject(RejectReason::DuplicateName)
        );
    }

    #[test]
    fn duplicate_names_compare_by_kind_and_normalized_name() {
        let mut fx = Fixture::new();
        let section = fx.section.clone();
        fx.load(
            "b",
            vec![
                Node::folder("b-a", Some("b".into()), section.clone(), "  a ", 2),
                Node::file("b-q", Some("b".into()), section, "q", "txt", 2),
            ],
        );
        fx.load("a", vec![]);

        let mut folder = fx.session("a");
        assert_eq!(
            fx.evaluate(&mut folder, onto("b")),
            DropVerdict::Reject(RejectReason::DuplicateName)
        );

        let mut file = fx.session("q");
        assert_eq!(fx.evaluate(&mut file, onto("b")), DropVerdict::Allow);
    }

    #[test]
    fn depth_limit_counts_the_explored_subtree_height() {
        let mut fx = Fixture::new();
        let section = fx.section.clone();
        fx.load("b", vec![Node::folder("b1", Some("b".into()), section.clone(), "B1", 2)]);
        fx.load("b1", vec![]);
        fx.load("a", vec![Node::folder("a1", Some("a".into()), section.clone(), "A1", 2)]);
        fx.load("a1", vec![Node::folder("a2", Some("a1".into()), section, "A2", 3)]);
        fx.load("a2", vec![]);
        let mut session = fx.session("a");

        // a (height 2) under b1 (level 2) would reach level 5
        assert_eq!(
            fx.evaluate(&mut session, onto("b1")),
            DropVerdict::Reject(RejectReason::DepthLimit)
        );
        assert_eq!(session.deepest_known_level(), Some(3));
        assert_eq!(fx.evaluate(&mut session, onto("b")), DropVerdict::Allow);
    }

    #[test]
    fn unexplored_subtree_allows_until_depth_is_discovered() {
        let mut fx = Fixture::new();
        let section = fx.section.clone();
        fx.load("b", vec![Node::folder("b1", Some("b".into()), section.clone(), "B1", 2)]);
        fx.load("b1", vec![]);
        let mut session = fx.session("a");

        assert_eq!(fx.evaluate(&mut session, onto("b1")), DropVerdict::Allow);
        assert!(session.has_unexplored_folders());
        assert_eq!(fx.drain_queue(), vec![NodeId::new("a")]);

        fx.cache.insert(
            NodeId::new("a"),
            vec![Node::folder("a1", Some("a".into()), section.clone(), "A1", 2)],
        );
        session.on_children_available(&NodeId::new("a"));
        assert_eq!(fx.evaluate(&mut session, onto("b1")), DropVerdict::Allow);
        assert_eq!(fx.drain_queue(), vec![NodeId::new("a1")]);

        fx.cache.insert(
            NodeId::new("a1"),
            vec![Node::folder("a2", Some("a1".into()), section, "A2", 3)],
        );
        session.on_children_available(&NodeId::new("a1"));
        assert_eq!(
            fx.evaluate(&mut session, onto("b1")),
            DropVerdict::Reject(RejectReason::DepthLimit)
        );
    }

    #[test]
    fn exploration_respects_the_prefetch_budget() {
        let mut fx = Fixture::new();
        fx.config.prefetch_budget = 1;
        let section = fx.section.clone();
        fx.load(
            "a",
            vec![
                Node::folder("a1", Some("a".into()), section.clone(), "A1", 2),
                Node::folder("a2", Some("a".into()), section, "A2", 2),
            ],
        );
        let mut session = fx.session("a");

        fx.evaluate(&mut session, onto("b"));
        // b itself is requested by the duplicate check, outside the exploration budget
        assert_eq!(fx.drain_queue(), vec![NodeId::new("a1"), NodeId::new("b")]);
        assert_eq!(session.prefetch_budget_remaining(), Some(0));
    }

    #[test]
    fn files_deeper_than_the_limit_are_rejected() {
        let mut fx = Fixture::new();
        fx.config.max_depth = 1;
        fx.load("b", vec![]);
        let mut session = fx.session("q");
        assert_eq!(
            fx.evaluate(&mut session, onto("b")),
            DropVerdict::Reject(RejectReason::DepthLimit)
        );
    }
}
