//! Drag-and-drop move validation.
//!
//! [`rules`] maps a pointer target onto a destination folder, [`session`] runs the per-gesture
//! checks with incremental subtree exploration, and [`prefetch`] throttles the listings those
//! checks ask for.

pub mod prefetch;
pub mod rules;
pub mod session;

pub use prefetch::{PrefetchCache, PrefetchPoll, PrefetchQueue, PrefetchRequest};
pub use rules::{
    is_draft_id, resolve_target, DropTarget, DropVerdict, RejectReason, ResolvedTarget,
    DRAFT_ID_PREFIX,
};
pub use session::{DragSession, ValidationContext};
