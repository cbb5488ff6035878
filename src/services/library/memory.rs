use tokio::sync::watch;

use crate::{
    error::AppResult,
    services::library::{IdSet, LibraryStore},
};

/// In-process library; the snapshot channels are the only state
pub struct MemoryStore {
    favorites_tx: watch::Sender<IdSet>,
    blocked_tx: watch::Sender<IdSet>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_state(IdSet::new(), IdSet::new())
    }

    pub fn with_state(favorites: IdSet, blocked: IdSet) -> Self {
        let (favorites_tx, _) = watch::channel(favorites);
        let (blocked_tx, _) = watch::channel(blocked);
        Self {
            favorites_tx,
            blocked_tx,
        }
    }

    /// Inserts into a set, publishing only if it changed
    fn insert(tx: &watch::Sender<IdSet>, id: &str) -> bool {
        tx.send_if_modified(|set| set.insert(id.to_string()))
    }

    fn remove(tx: &watch::Sender<IdSet>, id: &str) -> bool {
        tx.send_if_modified(|set| set.remove(id))
    }
}

#[async_trait::async_trait]
impl LibraryStore for MemoryStore {
    fn favorites(&self) -> watch::Receiver<IdSet> {
        self.favorites_tx.subscribe()
    }

    fn blocked(&self) -> watch::Receiver<IdSet> {
        self.blocked_tx.subscribe()
    }

    async fn add_favorite(&self, id: &str) -> AppResult<()> {
        if Self::insert(&self.favorites_tx, id) {
            tracing::debug!(item_id = %id, "Favorite added");
        }
        Ok(())
    }

    async fn remove_favorite(&self, id: &str) -> AppResult<()> {
        if Self::remove(&self.favorites_tx, id) {
            tracing::debug!(item_id = %id, "Favorite removed");
        }
        Ok(())
    }

    async fn add_blocked(&self, id: &str) -> AppResult<()> {
        if Self::insert(&self.blocked_tx, id) {
            tracing::debug!(item_id = %id, "Book blocked");
        }
        Ok(())
    }
}
