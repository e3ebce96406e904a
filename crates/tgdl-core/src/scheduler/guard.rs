//! RAII guard that gives a batch's slot back when dropped.

use std::sync::Arc;

use super::Shared;
use crate::registry::TaskId;

/// Releases the slot and starts a drain when dropped, also when the
/// executor panics.
pub(super) struct SlotGuard {
    pub(super) shared: Arc<Shared>,
    pub(super) tasks: Vec<TaskId>,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.shared.queue().release(&self.tasks);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let shared = Arc::clone(&self.shared);
            handle.spawn(async move {
                super::drain(&shared).await;
            });
        }
    }
}
