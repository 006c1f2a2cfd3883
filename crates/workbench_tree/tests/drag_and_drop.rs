mod support;

use std::rc::Rc;

use futures::executor::block_on;
use pretty_assertions::assert_eq;
use support::{file, folder, id, section, Harness};
use workbench_host::{BackendOp, Node, RecordingTreeView, SectionId, TreeBackend};
use workbench_tree::{
    drag::PrefetchPoll,
    DraftOutcome, DropOutcome, DropTarget, DropVerdict, PrefetchPump, RejectReason, TreeEffect,
    TreeOperation,
};

fn onto(node: &str) -> DropTarget {
    DropTarget::Onto(id(node))
}

#[test]
fn duplicate_file_is_allowed_until_the_destination_listing_arrives() {
    let mut h = Harness::new(vec![
        folder("reports", None, "Reports", 1),
        file("a", None, "a", 1),
        file("reports-a", Some("reports"), "A", 2),
    ]);

    assert!(h.workbench.begin_drag("drag-1", &id("a")));
    assert!(h.workbench.can_drop(&onto("reports")));
    assert!(h.workbench.can_drop(&onto("reports")));
    assert_eq!(h.workbench.pending_prefetches(), 1);

    assert_eq!(h.pump(), PrefetchPump::Fetched(id("reports")));
    assert!(!h.workbench.can_drop(&onto("reports")));
    assert_eq!(
        h.workbench.evaluate_drop(&onto("reports")),
        DropVerdict::Reject(RejectReason::DuplicateName)
    );
    assert_eq!(h.pump(), PrefetchPump::Idle);

    h.workbench.end_drag();
    assert!(h.workbench.drag_session().is_none());

    // the prefetched listing is consumed instead of fetching again
    h.load("reports");
    assert_eq!(h.backend.call_count(BackendOp::FetchChildren), 2);
    assert_eq!(h.children(&id("reports")), vec![id("reports-a")]);
}

#[test]
fn duplicate_file_is_rejected_immediately_when_children_are_known() {
    let mut h = Harness::new(vec![
        folder("reports", None, "Reports", 1),
        file("a", None, "a", 1),
        file("reports-a", Some("reports"), "a", 2),
    ]);
    h.load("reports");

    h.workbench.begin_drag("drag-1", &id("a"));
    assert!(!h.workbench.can_drop(&onto("reports")));
    assert!(!h.workbench.can_drop(&DropTarget::Between(id("reports-a"))));
    assert_eq!(h.workbench.pending_prefetches(), 0);
}

#[test]
fn deep_subtree_is_allowed_optimistically_then_rejected_once_explored() {
    let mut h = Harness::new(vec![
        folder("d", None, "Dragged", 1),
        folder("d1", Some("d"), "D1", 2),
        folder("d2", Some("d1"), "D2", 3),
        folder("t1", None, "T1", 1),
        folder("t2", Some("t1"), "T2", 2),
        folder("t3", Some("t2"), "T3", 3),
    ]);
    h.load("t1");
    h.load("t2");
    h.load("t3");

    h.workbench.begin_drag("drag-1", &id("d"));
    assert!(h.workbench.can_drop(&onto("t3")));

    let mut pumps = 0;
    while h.pump() != PrefetchPump::Idle {
        pumps += 1;
        h.workbench.can_drop(&onto("t3"));
        assert!(pumps < 10, "exploration did not settle");
    }

    assert_eq!(
        h.workbench.evaluate_drop(&onto("t3")),
        DropVerdict::Reject(RejectReason::DepthLimit)
    );
    let session = h.workbench.drag_session().expect("session");
    assert_eq!(session.deepest_known_level(), Some(3));
    assert!(!session.has_unexplored_folders());
    // level 2 + subtree height 2 fits exactly
    assert!(h.workbench.can_drop(&onto("t1")));
}

#[test]
fn known_deep_subtree_is_rejected_on_the_first_tick() {
    let mut h = Harness::new(vec![
        folder("d", None, "Dragged", 1),
        folder("d1", Some("d"), "D1", 2),
        folder("d2", Some("d1"), "D2", 3),
        folder("t1", None, "T1", 1),
        folder("t2", Some("t1"), "T2", 2),
        folder("t3", Some("t2"), "T3", 3),
    ]);
    for folder in ["d", "d1", "d2", "t1", "t2", "t3"] {
        h.load(folder);
    }

    h.workbench.begin_drag("drag-1", &id("d"));
    assert_eq!(
        h.workbench.evaluate_drop(&onto("t3")),
        DropVerdict::Reject(RejectReason::DepthLimit)
    );
}

#[test]
fn moving_into_own_subtree_and_same_parent_never_reach_the_backend() {
    let mut h = Harness::new(vec![
        folder("x", None, "X", 1),
        folder("x1", Some("x"), "X1", 2),
        file("q", None, "q", 1),
    ]);
    h.load("x");
    h.load("x1");

    h.workbench.begin_drag("drag-1", &id("x"));
    assert_eq!(
        h.workbench.evaluate_drop(&onto("x1")),
        DropVerdict::Reject(RejectReason::Cycle)
    );
    let update = block_on(h.workbench.on_drop(&onto("x1")));
    assert_eq!(update.outcome, DropOutcome::Rejected(RejectReason::Cycle));
    assert!(h.workbench.drag_session().is_none());

    h.workbench.begin_drag("drag-2", &id("q"));
    let update = block_on(h.workbench.on_drop(&DropTarget::Root(section())));
    assert_eq!(update.outcome, DropOutcome::Rejected(RejectReason::SameParent));
    assert_eq!(h.backend.call_count(BackendOp::Move), 0);
}

#[test]
fn drop_applies_the_move_after_backend_success() {
    let mut h = Harness::new(vec![
        folder("archive", None, "Archive", 1),
        file("a", None, "a", 1),
    ]);
    h.load("archive");
    h.view.clear_ops();

    h.workbench.begin_drag("drag-1", &id("a"));
    let update = block_on(h.workbench.on_drop(&onto("archive")));

    assert_eq!(
        update.outcome,
        DropOutcome::Moved {
            node_id: id("a"),
            parent: id("archive"),
        }
    );
    assert_eq!(h.backend.calls(BackendOp::Move), vec![Some(id("a"))]);
    assert_eq!(h.children(&h.root), vec![id("archive")]);
    assert_eq!(h.children(&id("archive")), vec![id("a")]);
    assert_eq!(h.level("a"), Some(2));
    assert_eq!(
        h.backend.node(&id("a")).and_then(|node| node.parent_node_id),
        Some(id("archive"))
    );
    assert_eq!(h.view.cached_children(&h.root), Some(vec![id("archive")]));
    assert_eq!(h.view.cached_children(&id("archive")), Some(vec![id("a")]));
    assert!(h.workbench.store().verify_invariants().is_ok());
    assert!(h.workbench.drag_session().is_none());
}

#[test]
fn failed_move_leaves_the_store_untouched() {
    let mut h = Harness::new(vec![
        folder("archive", None, "Archive", 1),
        file("a", None, "a", 1),
    ]);
    h.load("archive");
    h.backend.fail_next(BackendOp::Move, "conflict");

    h.workbench.begin_drag("drag-1", &id("a"));
    let update = block_on(h.workbench.on_drop(&onto("archive")));

    assert_eq!(update.outcome, DropOutcome::Failed("conflict".into()));
    assert_eq!(
        update.effects,
        vec![TreeEffect::OperationFailed {
            operation: TreeOperation::Move,
            node_id: id("a"),
            message: "conflict".into(),
        }]
    );
    assert_eq!(h.children(&h.root), vec![id("archive"), id("a")]);
    assert!(h.children(&id("archive")).is_empty());
    assert_eq!(h.level("a"), Some(1));
}

#[test]
fn moved_folder_subtree_is_releveled() {
    let mut h = Harness::new(vec![
        folder("src", None, "Src", 1),
        folder("src-sub", Some("src"), "Sub", 2),
        file("src-sub-q", Some("src-sub"), "q", 3),
        folder("dst", None, "Dst", 1),
    ]);
    for folder in ["src", "src-sub", "dst"] {
        h.load(folder);
    }

    h.workbench.begin_drag("drag-1", &id("src"));
    let update = block_on(h.workbench.on_drop(&onto("dst")));
    assert!(matches!(update.outcome, DropOutcome::Moved { .. }));
    assert_eq!(h.level("src"), Some(2));
    assert_eq!(h.level("src-sub"), Some(3));
    assert_eq!(h.level("src-sub-q"), Some(4));
    assert!(h.workbench.store().verify_invariants().is_ok());
}

#[test]
fn other_sections_are_never_drop_targets() {
    let mut h = Harness::new(vec![file("a", None, "a", 1)]);
    let unsaved = SectionId::new("unsaved");
    h.backend.insert(Node::folder("u1", None, unsaved.clone(), "U1", 1));
    let other_root = h
        .workbench
        .add_section(unsaved.clone(), Rc::new(RecordingTreeView::default()));
    block_on(h.workbench.ensure_children_loaded(&other_root)).expect("load other root");

    h.workbench.begin_drag("drag-1", &id("a"));
    assert_eq!(
        h.workbench.evaluate_drop(&onto("u1")),
        DropVerdict::Reject(RejectReason::CrossSection)
    );
    assert!(!h.workbench.can_drop(&DropTarget::Root(unsaved)));
}

#[test]
fn new_session_id_resets_pending_work() {
    let mut h = Harness::new(vec![
        folder("b", None, "B", 1),
        folder("c", None, "C", 1),
        file("a", None, "a", 1),
    ]);

    h.workbench.begin_drag("drag-1", &id("a"));
    h.workbench.can_drop(&onto("b"));
    h.workbench.can_drop(&onto("c"));
    assert_eq!(h.workbench.pending_prefetches(), 2);

    // same id continues the gesture
    assert!(h.workbench.begin_drag("drag-1", &id("a")));
    assert_eq!(h.workbench.pending_prefetches(), 2);

    assert!(h.workbench.begin_drag("drag-2", &id("a")));
    assert_eq!(h.workbench.pending_prefetches(), 0);
    assert_eq!(h.workbench.drag_session().map(|s| s.id()), Some("drag-2"));
}

#[test]
fn prefetches_are_throttled() {
    let mut h = Harness::new(vec![
        folder("b", None, "B", 1),
        folder("c", None, "C", 1),
        file("a", None, "a", 1),
    ]);
    h.workbench.begin_drag("drag-1", &id("a"));
    h.workbench.can_drop(&onto("b"));
    h.workbench.can_drop(&onto("c"));

    assert_eq!(block_on(h.workbench.pump_prefetch()), PrefetchPump::Fetched(id("b")));
    assert_eq!(
        block_on(h.workbench.pump_prefetch()),
        PrefetchPump::Throttled { retry_in_ms: 150 }
    );
    h.clock.advance(150);
    assert_eq!(block_on(h.workbench.pump_prefetch()), PrefetchPump::Fetched(id("c")));
}

#[test]
fn drafts_cannot_be_dragged() {
    let mut h = Harness::new(vec![file("a", None, "a", 1)]);
    h.workbench.focus_section(Some(section()));
    let update = block_on(h.workbench.create_folder_draft(&section()));
    let draft = match update.outcome {
        DraftOutcome::Created(draft) => draft,
        other => panic!("draft not created: {other:?}"),
    };

    assert!(!h.workbench.begin_drag("drag-1", &draft));
    assert!(h.workbench.begin_drag("drag-1", &id("a")));
    assert_eq!(
        h.workbench.evaluate_drop(&onto(draft.as_str())),
        DropVerdict::Reject(RejectReason::InvalidTarget)
    );
}

#[test]
fn listing_fetched_before_a_move_never_reaches_the_store() {
    let mut h = Harness::new(vec![
        folder("archive", None, "Archive", 1),
        file("a", None, "a", 1),
    ]);
    h.workbench.begin_drag("drag-1", &id("a"));
    assert!(h.workbench.can_drop(&onto("archive")));
    let request = match h.workbench.next_prefetch() {
        PrefetchPoll::Ready(request) => request,
        other => panic!("prefetch not released: {other:?}"),
    };
    let listed_before_move = block_on(
        h.backend
            .fetch_node_children(&request.section, request.backend_parent()),
    );

    let update = block_on(h.workbench.on_drop(&onto("archive")));
    assert!(matches!(update.outcome, DropOutcome::Moved { .. }));
    h.workbench.complete_prefetch(&request, listed_before_move);
    assert_eq!(h.workbench.prefetch_cache().get(&id("archive")), None);

    h.load("archive");
    assert_eq!(h.children(&id("archive")), vec![id("a")]);
    assert_eq!(h.level("a"), Some(2));
    assert!(h.workbench.store().verify_invariants().is_ok());
}

#[test]
fn finishing_a_move_keeps_a_newer_gesture_alive() {
    let mut h = Harness::new(vec![
        folder("archive", None, "Archive", 1),
        folder("c", None, "C", 1),
        file("a", None, "a", 1),
        file("b", None, "b", 1),
    ]);
    h.load("archive");

    h.workbench.begin_drag("drag-1", &id("a"));
    let request = h.workbench.prepare_drop(&onto("archive")).expect("valid drop");
    assert_eq!(request.session_id, "drag-1");

    assert!(h.workbench.begin_drag("drag-2", &id("b")));
    assert!(h.workbench.can_drop(&onto("c")));
    assert_eq!(h.workbench.pending_prefetches(), 1);

    let result = block_on(h.backend.move_node(&request.node_id, request.backend_parent()));
    let update = h.workbench.complete_drop(&request, result);

    assert!(matches!(update.outcome, DropOutcome::Moved { .. }));
    assert_eq!(h.children(&id("archive")), vec![id("a")]);
    assert_eq!(h.workbench.drag_session().map(|s| s.id()), Some("drag-2"));
    assert_eq!(h.workbench.pending_prefetches(), 1);
}
