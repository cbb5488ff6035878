//! Test doubles shared by the engine and search controller tests
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{watch, Notify};

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookId},
    services::{
        catalog::CatalogClient,
        library::{IdSet, LibraryStore, MemoryStore},
    },
};

/// Catalog with scripted search results and per-id gates that hold a lookup
/// until the test releases it
#[derive(Default)]
pub struct ScriptedCatalog {
    books: HashMap<BookId, Book>,
    searches: HashMap<String, Vec<BookId>>,
    failing_searches: Vec<String>,
    gates: Mutex<HashMap<BookId, Arc<Notify>>>,
    search_log: Mutex<Vec<String>>,
    lookup_log: Mutex<Vec<BookId>>,
}

impl ScriptedCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_book(mut self, id: &str, similar: &[&str]) -> Self {
        let book = Book::new(id, format!("Book {}", id)).with_similar(similar.iter().copied());
        self.books.insert(id.to_string(), book);
        self
    }

    pub fn with_search(mut self, query: &str, ids: &[&str]) -> Self {
        self.searches.insert(
            query.to_string(),
            ids.iter().map(|id| id.to_string()).collect(),
        );
        self
    }

    pub fn with_failing_search(mut self, query: &str) -> Self {
        self.failing_searches.push(query.to_string());
        self
    }

    /// Holds every lookup of `id` until [`release`](Self::release) is called
    pub fn gate(&self, id: &str) {
        self.gates
            .lock()
            .unwrap()
            .insert(id.to_string(), Arc::new(Notify::new()));
    }

    pub fn release(&self, id: &str) {
        if let Some(gate) = self.gates.lock().unwrap().remove(id) {
            gate.notify_one();
        }
    }

    pub fn searches(&self) -> Vec<String> {
        self.search_log.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<BookId> {
        self.lookup_log.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl CatalogClient for ScriptedCatalog {
    async fn search(&self, query: &str) -> AppResult<Vec<BookId>> {
        self.search_log.lock().unwrap().push(query.to_string());
        if self.failing_searches.iter().any(|q| q == query) {
            return Err(AppError::ExternalApi("scripted failure".to_string()));
        }
        Ok(self.searches.get(query).cloned().unwrap_or_default())
    }

    async fn get_item(&self, id: &str) -> AppResult<Option<Book>> {
        self.lookup_log.lock().unwrap().push(id.to_string());
        let gate = self.gates.lock().unwrap().get(id).cloned();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Ok(self.books.get(id).cloned())
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// In-memory store that yields before every write, like a store with I/O would
#[derive(Default)]
pub struct YieldingStore {
    inner: MemoryStore,
}

impl YieldingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl LibraryStore for YieldingStore {
    fn favorites(&self) -> watch::Receiver<IdSet> {
        self.inner.favorites()
    }

    fn blocked(&self) -> watch::Receiver<IdSet> {
        self.inner.blocked()
    }

    async fn add_favorite(&self, id: &str) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.inner.add_favorite(id).await
    }

    async fn remove_favorite(&self, id: &str) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.inner.remove_favorite(id).await
    }

    async fn add_blocked(&self, id: &str) -> AppResult<()> {
        tokio::task::yield_now().await;
        self.inner.add_blocked(id).await
    }
}

/// Lets every runnable task finish; relies on paused tokio time
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Waits until the channel's current value satisfies `predicate`
pub async fn wait_for<T, F>(rx: &mut watch::Receiver<T>, predicate: F)
where
    F: Fn(&T) -> bool,
{
    loop {
        if predicate(&rx.borrow_and_update()) {
            return;
        }
        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("timed out waiting for snapshot")
            .expect("sender dropped");
    }
}
