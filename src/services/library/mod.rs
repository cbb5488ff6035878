//! Favorites and blocked-books store
//!
//! The store owns both id sets. Consumers read them as `watch` channels of
//! complete snapshots and compute their own deltas; writes go through the
//! store, which commits and then publishes the new snapshot.
use std::collections::HashSet;

use tokio::sync::watch;

use crate::{error::AppResult, models::BookId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// A complete snapshot of one of the store's id sets
pub type IdSet = HashSet<BookId>;

#[async_trait::async_trait]
pub trait LibraryStore: Send + Sync {
    /// Snapshot stream of favorite book ids
    fn favorites(&self) -> watch::Receiver<IdSet>;

    /// Snapshot stream of blocked book ids
    fn blocked(&self) -> watch::Receiver<IdSet>;

    async fn add_favorite(&self, id: &str) -> AppResult<()>;

    async fn remove_favorite(&self, id: &str) -> AppResult<()>;

    /// Blocks are permanent; there is no way to lift one
    async fn add_blocked(&self, id: &str) -> AppResult<()>;
}
