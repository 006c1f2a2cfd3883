#![allow(dead_code)]

use std::rc::Rc;

use futures::executor::block_on;
use workbench_host::{
    ManualClock, MemoryPrefsStore, MemoryTreeBackend, Node, NodeId, RecordingTreeView, SectionId,
};
use workbench_tree::{PrefetchPump, TreeConfig, Workbench, WorkbenchHost};

pub const WORKSPACE: &str = "ws-1";

pub fn section() -> SectionId {
    SectionId::new("saved")
}

pub fn id(raw: &str) -> NodeId {
    NodeId::new(raw)
}

pub fn folder(node_id: &str, parent: Option<&str>, label: &str, level: u32) -> Node {
    Node::folder(node_id, parent.map(id), section(), label, level)
}

pub fn file(node_id: &str, parent: Option<&str>, label: &str, level: u32) -> Node {
    Node::file(node_id, parent.map(id), section(), label, "sql", level)
}

pub struct Harness {
    pub backend: MemoryTreeBackend,
    pub prefs: MemoryPrefsStore,
    pub clock: ManualClock,
    pub view: RecordingTreeView,
    pub root: NodeId,
    pub workbench: Workbench,
}

impl Harness {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self::with_parts(nodes, TreeConfig::default(), MemoryPrefsStore::default())
    }

    pub fn with_parts(nodes: Vec<Node>, config: TreeConfig, prefs: MemoryPrefsStore) -> Self {
        let backend = MemoryTreeBackend::default();
        for node in nodes {
            backend.insert(node);
        }
        let clock = ManualClock::starting_at(10_000);
        let host = WorkbenchHost::new(
            Rc::new(backend.clone()),
            Rc::new(prefs.clone()),
            Rc::new(clock.clone()),
        );
        let mut workbench = Workbench::new(host, config, WORKSPACE);
        let view = RecordingTreeView::default();
        let root = workbench.add_section(section(), Rc::new(view.clone()));
        block_on(workbench.ensure_children_loaded(&root)).expect("load root");
        Self {
            backend,
            prefs,
            clock,
            view,
            root,
            workbench,
        }
    }

    pub fn load(&mut self, folder: &str) {
        block_on(self.workbench.ensure_children_loaded(&id(folder))).expect("load folder");
    }

    pub fn children(&self, parent: &NodeId) -> Vec<NodeId> {
        self.workbench
            .store()
            .children(parent)
            .loaded()
            .map(<[NodeId]>::to_vec)
            .unwrap_or_default()
    }

    pub fn level(&self, node: &str) -> Option<u32> {
        self.workbench.store().level_of(&id(node))
    }

    /// Runs one prefetch after letting the throttle interval pass.
    pub fn pump(&mut self) -> PrefetchPump {
        self.clock.advance(self.workbench.config().prefetch_interval_ms);
        block_on(self.workbench.pump_prefetch())
    }
}
