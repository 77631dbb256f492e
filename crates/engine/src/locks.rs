use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

use tripweave_core::NodeId;

/// Process-wide advisory lock set over node ids, orthogonal to the
/// document's own per-node `locked` flag. Cloned handles share state; the
/// engine consults it before every mutating operation.
#[derive(Clone, Default)]
pub struct LockManager {
    inner: Arc<Mutex<HashSet<NodeId>>>,
}

impl LockManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn set(&self) -> MutexGuard<'_, HashSet<NodeId>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Lock a node. Returns false if it was already locked.
    pub fn lock(&self, id: NodeId) -> bool {
        self.set().insert(id)
    }

    /// Unlock a node. Returns false if it was not locked.
    pub fn unlock(&self, id: &NodeId) -> bool {
        self.set().remove(id)
    }

    pub fn is_locked(&self, id: &NodeId) -> bool {
        self.set().contains(id)
    }

    pub fn locked_count(&self) -> usize {
        self.set().len()
    }
}
