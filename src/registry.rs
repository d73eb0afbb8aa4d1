use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

/// Lifecycle phase of one container's pipeline. `Ended` and `Failed` are
/// terminal; a pipeline that reached either is about to leave the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Starting,
    Relaying,
    Ended,
    Failed,
}

/// The authoritative map from container id to its live pipeline. Discovery
/// is the only inserter; each pipeline removes its own entry on its
/// terminal transition. The map itself is never handed out.
#[derive(Debug, Default)]
pub struct Registry {
    inner: Mutex<HashMap<String, Phase>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim a container id. Returns false when a pipeline already owns it,
    /// which makes discovery idempotent across ticks.
    pub fn try_insert(&self, id: &str) -> bool {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if inner.contains_key(id) {
            return false;
        }
        inner.insert(id.to_string(), Phase::Starting);
        true
    }

    pub fn set_phase(&self, id: &str, phase: Phase) {
        let mut inner = self.inner.lock().expect("registry lock poisoned");
        if let Some(entry) = inner.get_mut(id) {
            *entry = phase;
        }
    }

    pub fn phase(&self, id: &str) -> Option<Phase> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .get(id)
            .copied()
    }

    pub fn remove(&self, id: &str) {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .contains_key(id)
    }

    pub fn ids(&self) -> HashSet<String> {
        self.inner
            .lock()
            .expect("registry lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
