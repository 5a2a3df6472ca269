//! State shared between the responder and the admin bot.

use std::sync::{Arc, PoisonError, RwLock};

use otvet_core::{Blacklist, BlacklistError};
use tracing::info;

/// Holder of the current blacklist snapshot.
///
/// Readers take an `Arc` to the snapshot and never block writers for longer
/// than the pointer swap. Edits derive a new snapshot from the current one
/// under the write lock, so two concurrent `/block` commands cannot lose
/// each other's update.
#[derive(Debug, Clone, Default)]
pub struct BlacklistHandle {
    current: Arc<RwLock<Arc<Blacklist>>>,
}

impl BlacklistHandle {
    pub fn new(initial: Blacklist) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(initial))),
        }
    }

    pub fn snapshot(&self) -> Arc<Blacklist> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Block `username`, returning the new snapshot.
    pub fn add(&self, username: &str) -> Result<Arc<Blacklist>, BlacklistError> {
        self.update(|current| current.with_added(username))
    }

    /// Unblock `username`, returning the new snapshot.
    pub fn remove(&self, username: &str) -> Result<Arc<Blacklist>, BlacklistError> {
        self.update(|current| current.without(username))
    }

    fn update<F>(&self, derive: F) -> Result<Arc<Blacklist>, BlacklistError>
    where
        F: FnOnce(&Blacklist) -> Result<Blacklist, BlacklistError>,
    {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let current: &Blacklist = &guard;
        let next = Arc::new(derive(current)?);
        *guard = Arc::clone(&next);
        info!(entries = next.len(), "blacklist updated");
        Ok(next)
    }
}
