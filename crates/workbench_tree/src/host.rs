//! Service bundle the workbench runs its side effects through.

use std::rc::Rc;

use workbench_host::{Clock, NoopPrefsStore, NoopTreeBackend, PrefsStore, SystemClock, TreeBackend};

#[derive(Clone)]
/// Host service handles shared by every tree section of one workbench.
pub struct WorkbenchHost {
    backend: Rc<dyn TreeBackend>,
    prefs: Rc<dyn PrefsStore>,
    clock: Rc<dyn Clock>,
}

impl Default for WorkbenchHost {
    fn default() -> Self {
        Self {
            backend: Rc::new(NoopTreeBackend),
            prefs: Rc::new(NoopPrefsStore),
            clock: Rc::new(SystemClock),
        }
    }
}

impl WorkbenchHost {
    /// Bundles explicit service implementations.
    pub fn new(
        backend: Rc<dyn TreeBackend>,
        prefs: Rc<dyn PrefsStore>,
        clock: Rc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            prefs,
            clock,
        }
    }

    /// Returns the tree backend service.
    pub fn backend(&self) -> Rc<dyn TreeBackend> {
        self.backend.clone()
    }

    /// Returns the preference store.
    pub fn prefs_store(&self) -> Rc<dyn PrefsStore> {
        self.prefs.clone()
    }

    /// Returns the clock.
    pub fn clock(&self) -> Rc<dyn Clock> {
        self.clock.clone()
    }

    /// Reads the clock.
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use workbench_host::ManualClock;

    use super::*;

    #[test]
    fn clones_share_one_clock() {
        let clock = ManualClock::starting_at(5_000);
        let host = WorkbenchHost::new(
            Rc::new(NoopTreeBackend),
            Rc::new(NoopPrefsStore),
            Rc::new(clock.clone()),
        );
        let copy = host.clone();

        clock.advance(250);
        assert_eq!(host.now_ms(), 5_250);
        assert_eq!(copy.clock().now_ms(), 5_250);
    }
}
