use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;

use crate::{
    models::{BookId, Recommendation},
    services::{
        attribution::{AttributionTable, EntrySnapshot},
        catalog::{resolve_book, CatalogClient},
        library::{IdSet, LibraryStore},
    },
};

/// Keeps a ranked list of books similar to the user's favorites.
///
/// Every favorite contributes the catalog's similar books of that favorite;
/// a book recommended by several favorites ranks higher. The engine reacts to
/// favorite and blocked snapshots from the [`LibraryStore`], and all table
/// mutations happen under one lock so late catalog lookups can re-check the
/// blocked set atomically with their write.
#[derive(Clone)]
pub struct RecommendationEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    catalog: Arc<dyn CatalogClient>,
    store: Arc<dyn LibraryStore>,
    /// Read-only view of the store's current blocked set
    blocked_view: watch::Receiver<IdSet>,
    state: Mutex<EngineState>,
    /// Serializes toggles so the read of the favorite set and the write
    /// that flips it happen as one step
    toggles: Mutex<()>,
    ranked_tx: watch::Sender<Vec<Recommendation>>,
}

#[derive(Default)]
struct EngineState {
    table: AttributionTable,
    /// Favorite snapshot as of the last applied step
    applied_favorites: IdSet,
    /// Last blocked snapshot seen, only used to diff
    seen_blocked: IdSet,
}

impl RecommendationEngine {
    pub fn new(catalog: Arc<dyn CatalogClient>, store: Arc<dyn LibraryStore>) -> Self {
        let blocked_view = store.blocked();
        let seen_blocked = blocked_view.borrow().clone();
        let (ranked_tx, _) = watch::channel(Vec::new());

        Self {
            inner: Arc::new(EngineInner {
                catalog,
                store,
                blocked_view,
                state: Mutex::new(EngineState {
                    seen_blocked,
                    ..EngineState::default()
                }),
                toggles: Mutex::new(()),
                ranked_tx,
            }),
        }
    }

    /// Spawns the task that applies store snapshots in the order received.
    ///
    /// The current favorites are applied first, as a change from the empty set.
    pub fn start(&self) -> JoinHandle<()> {
        let engine = self.clone();
        let mut favorites_rx = self.inner.store.favorites();
        let mut blocked_rx = self.inner.store.blocked();

        tokio::spawn(async move {
            let initial = favorites_rx.borrow_and_update().clone();
            engine.on_favorite_set_changed(initial).await;

            loop {
                tokio::select! {
                    changed = favorites_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = favorites_rx.borrow_and_update().clone();
                        engine.on_favorite_set_changed(snapshot).await;
                    }
                    changed = blocked_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = blocked_rx.borrow_and_update().clone();
                        engine.on_blocked_set_changed(snapshot).await;
                    }
                }
            }

            tracing::info!("Library store closed, recommendation engine stopped");
        })
    }

    /// Applies a favorite snapshot: contracts removed favorites right away
    /// and spawns an expansion for each added one.
    ///
    /// Expansions rejoin the engine once their source lookup returns and
    /// only apply while the source is still a favorite, so a hung lookup
    /// never holds back later snapshots.
    pub async fn on_favorite_set_changed(&self, favorites: IdSet) {
        let mut state = self.inner.state.lock().await;

        let mut added: Vec<BookId> = favorites
            .difference(&state.applied_favorites)
            .cloned()
            .collect();
        let mut removed: Vec<BookId> = state
            .applied_favorites
            .difference(&favorites)
            .cloned()
            .collect();
        added.sort();
        removed.sort();

        if added.is_empty() && removed.is_empty() {
            return;
        }

        tracing::debug!(
            added = added.len(),
            removed = removed.len(),
            "Applying favorite set change"
        );

        for source_id in &removed {
            self.contract(&mut state, source_id);
        }
        state.applied_favorites = favorites;
        if !removed.is_empty() {
            self.publish(&state);
        }
        drop(state);

        for source_id in added {
            self.spawn_expansion(source_id);
        }
    }

    /// Deletes entries for books blocked since the last snapshot
    pub async fn on_blocked_set_changed(&self, blocked: IdSet) {
        let mut state = self.inner.state.lock().await;

        let newly_blocked: Vec<BookId> = blocked.difference(&state.seen_blocked).cloned().collect();
        let mut changed = false;
        for item_id in &newly_blocked {
            if state.table.remove(item_id) {
                tracing::info!(item_id = %item_id, "Dropped recommendation blocked elsewhere");
                changed = true;
            }
        }
        state.seen_blocked = blocked;

        if changed {
            self.publish(&state);
        }
    }

    /// Removes a recommendation for good and records the block in the store.
    ///
    /// The store commit happens under the engine lock, so an in-flight lookup
    /// for `item_id` can only complete after the blocked set includes it.
    pub async fn block(&self, item_id: &str) {
        let mut state = self.inner.state.lock().await;

        let removed = state.table.remove(item_id);
        if let Err(e) = self.inner.store.add_blocked(item_id).await {
            tracing::error!(item_id = %item_id, error = %e, "Failed to persist blocked book");
        }

        tracing::info!(item_id = %item_id, removed, "Book blocked");

        if removed {
            self.publish(&state);
        }
    }

    /// Adds or removes a favorite through the store.
    ///
    /// The store's snapshot drives the actual expand/contract. Returns whether
    /// the book is a favorite afterwards.
    pub async fn toggle_favorite(&self, item_id: &str) -> bool {
        let _toggle = self.inner.toggles.lock().await;
        let is_favorite = self.inner.store.favorites().borrow().contains(item_id);

        let result = if is_favorite {
            self.inner.store.remove_favorite(item_id).await
        } else {
            self.inner.store.add_favorite(item_id).await
        };

        if let Err(e) = result {
            tracing::error!(item_id = %item_id, error = %e, "Failed to toggle favorite");
        }

        self.inner.store.favorites().borrow().contains(item_id)
    }

    /// Full ranked list, favorites included
    pub fn recommendations(&self) -> Vec<Recommendation> {
        self.inner.ranked_tx.borrow().clone()
    }

    /// Ranked list without books that are currently favorites
    pub async fn visible_recommendations(&self) -> Vec<Recommendation> {
        let state = self.inner.state.lock().await;
        state
            .table
            .ranked()
            .into_iter()
            .filter(|r| !state.applied_favorites.contains(&r.book.id))
            .collect()
    }

    /// Every attribution entry, pending ones included, in ranked order
    pub async fn entries(&self) -> Vec<EntrySnapshot> {
        self.inner.state.lock().await.table.snapshot()
    }

    /// The favorite snapshot the table currently reflects
    pub async fn favorite_ids(&self) -> IdSet {
        self.inner.state.lock().await.applied_favorites.clone()
    }

    /// Stream of the full ranked list, republished after every table change
    pub fn subscribe(&self) -> watch::Receiver<Vec<Recommendation>> {
        self.inner.ranked_tx.subscribe()
    }

    fn expand(&self, state: &mut EngineState, source_id: &str, candidates: Vec<BookId>) {
        let blocked = self.inner.blocked_view.borrow();
        let mut created = Vec::new();

        for candidate in candidates {
            if blocked.contains(&candidate) {
                continue;
            }
            if state.table.attribute(&candidate, source_id) {
                created.push(candidate);
            }
        }
        drop(blocked);

        tracing::debug!(
            source_id = %source_id,
            new_entries = created.len(),
            "Expanded favorite"
        );

        for item_id in created {
            self.spawn_fetch(item_id);
        }
    }

    fn contract(&self, state: &mut EngineState, source_id: &str) {
        let orphaned = state.table.detach_source(source_id);
        tracing::debug!(
            source_id = %source_id,
            deleted = orphaned.len(),
            "Contracted favorite"
        );
    }

    fn spawn_expansion(&self, source_id: BookId) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.complete_expansion(source_id).await;
        });
    }

    async fn complete_expansion(&self, source_id: BookId) {
        let candidates = resolve_book(self.inner.catalog.as_ref(), &source_id)
            .await
            .map(|book| book.similar_item_ids)
            .unwrap_or_default();

        let mut state = self.inner.state.lock().await;

        // The favorite may have been removed while the lookup was in flight.
        if !state.applied_favorites.contains(&source_id) {
            tracing::debug!(source_id = %source_id, "Discarded expansion for dropped favorite");
            return;
        }

        self.expand(&mut state, &source_id, candidates);
        self.publish(&state);
    }

    fn spawn_fetch(&self, item_id: BookId) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.complete_fetch(item_id).await;
        });
    }

    async fn complete_fetch(&self, item_id: BookId) {
        let book = resolve_book(self.inner.catalog.as_ref(), &item_id).await;

        let mut state = self.inner.state.lock().await;

        // The block may have landed while the lookup was in flight.
        let now_blocked = self.inner.blocked_view.borrow().contains(&item_id);
        if now_blocked {
            if state.table.remove(&item_id) {
                tracing::debug!(item_id = %item_id, "Discarded lookup for blocked book");
                self.publish(&state);
            }
            return;
        }

        match book {
            Some(book) => {
                if state.table.resolve(&item_id, book) {
                    self.publish(&state);
                } else {
                    tracing::debug!(item_id = %item_id, "Discarded lookup for dropped entry");
                }
            }
            None => {
                tracing::debug!(item_id = %item_id, "Recommendation left pending");
            }
        }
    }

    fn publish(&self, state: &EngineState) {
        self.inner.ranked_tx.send_replace(state.table.ranked());
    }
}
