//! Throttled prefetch queue and the folder-children cache it fills.

use std::collections::{HashMap, HashSet, VecDeque};

use workbench_host::{Node, NodeId, SectionId};

#[derive(Debug, Clone, PartialEq, Eq)]
/// One children listing to fetch.
pub struct PrefetchRequest {
    /// Folder (or section root) whose children are wanted.
    pub folder: NodeId,
    /// Section the folder belongs to.
    pub section: SectionId,
}

impl PrefetchRequest {
    /// Returns the parent argument for the backend (`None` for a section root).
    pub fn backend_parent(&self) -> Option<&NodeId> {
        (!self.folder.is_section_root()).then_some(&self.folder)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Next action for the prefetch driver.
pub enum PrefetchPoll {
    /// Nothing queued.
    Idle,
    /// A request is queued but the minimum interval has not elapsed.
    Wait {
        /// Milliseconds until the next request may start.
        retry_in_ms: u64,
    },
    /// Issue this listing request now.
    Ready(PrefetchRequest),
}

#[derive(Debug, Clone)]
/// FIFO of folders awaiting a children listing, released one at a time with a minimum spacing.
///
/// A folder is queued at most once until its request completes.
pub struct PrefetchQueue {
    interval_ms: u64,
    pending: VecDeque<PrefetchRequest>,
    queued: HashSet<NodeId>,
    in_flight: HashSet<NodeId>,
    last_issued_at: Option<u64>,
}

impl PrefetchQueue {
    /// Creates a queue releasing at most one request per `interval_ms`.
    pub fn new(interval_ms: u64) -> Self {
        Self {
            interval_ms,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            in_flight: HashSet::new(),
            last_issued_at: None,
        }
    }

    /// Queues a listing of `folder` unless one is already queued or in flight.
    ///
    /// Returns `true` when queued.
    pub fn enqueue(&mut self, folder: NodeId, section: SectionId) -> bool {
        if self.in_flight.contains(&folder) || !self.queued.insert(folder.clone()) {
            return false;
        }
        self.pending.push_back(PrefetchRequest { folder, section });
        true
    }

    /// Releases the next folder when the interval allows it.
    pub fn poll(&mut self, now_ms: u64) -> PrefetchPoll {
        if self.pending.is_empty() {
            return PrefetchPoll::Idle;
        }
        if let Some(last) = self.last_issued_at {
            let ready_at = last.saturating_add(self.interval_ms);
            if now_ms < ready_at {
                return PrefetchPoll::Wait {
                    retry_in_ms: ready_at - now_ms,
                };
            }
        }
        let Some(request) = self.pending.pop_front() else {
            return PrefetchPoll::Idle;
        };
        self.queued.remove(&request.folder);
        self.in_flight.insert(request.folder.clone());
        self.last_issued_at = Some(now_ms);
        PrefetchPoll::Ready(request)
    }

    /// Marks the request for `folder` as finished.
    pub fn complete(&mut self, folder: &NodeId) {
        self.in_flight.remove(folder);
    }

    /// Drops every queued (not yet issued) request. In-flight requests are unaffected.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
        self.queued.clear();
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` when no request is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns `true` when `folder` is queued or in flight.
    pub fn contains(&self, folder: &NodeId) -> bool {
        self.queued.contains(folder) || self.in_flight.contains(folder)
    }
}

#[derive(Debug, Clone, Default)]
/// Children listings fetched during drag gestures, keyed by folder id.
///
/// Entries outlive the session that requested them; the tree store consumes them when the
/// folder is later opened. A listing is only accepted when no local mutation touched the folder
/// between issuing the request and its answer.
pub struct PrefetchCache {
    children: HashMap<NodeId, Vec<Node>>,
    issued: HashSet<NodeId>,
}

impl PrefetchCache {
    /// Stores the listing of `folder`.
    pub fn insert(&mut self, folder: NodeId, children: Vec<Node>) {
        self.children.insert(folder, children);
    }

    /// Records that a listing request for `folder` was sent.
    pub fn issue(&mut self, folder: &NodeId) {
        self.issued.insert(folder.clone());
    }

    /// Stores the answer to an issued request. Returns `false` when the request was revoked by
    /// [`forget`](Self::forget) while in flight, in which case the listing is discarded.
    pub fn accept(&mut self, folder: NodeId, children: Vec<Node>) -> bool {
        if !self.issued.remove(&folder) {
            return false;
        }
        self.insert(folder, children);
        true
    }

    /// Drops the issue record of a request that failed.
    pub fn abandon(&mut self, folder: &NodeId) {
        self.issued.remove(folder);
    }

    /// Returns the cached listing of `folder`.
    pub fn get(&self, folder: &NodeId) -> Option<&[Node]> {
        self.children.get(folder).map(Vec::as_slice)
    }

    /// Removes and returns the cached listing of `folder`.
    pub fn take(&mut self, folder: &NodeId) -> Option<Vec<Node>> {
        self.children.remove(folder)
    }

    /// Forgets the listing of `folder` and revokes any request for it still in flight.
    pub fn forget(&mut self, folder: &NodeId) {
        self.children.remove(folder);
        self.issued.remove(folder);
    }
}
