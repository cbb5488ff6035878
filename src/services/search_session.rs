use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::{
    models::{Book, BookId},
    services::{
        catalog::{resolve_book, CatalogClient},
        library::IdSet,
    },
};

/// Cancellation token for one search session
///
/// Cancellation is cooperative: work checks the token before applying a result.
#[derive(Clone, Debug)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Where the current search session stands
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SearchPhase {
    Idle,
    Debouncing {
        query: String,
    },
    Searching {
        query: String,
    },
    Resolving {
        query: String,
        pending_ids: Vec<BookId>,
    },
}

struct SessionState {
    token: CancellationToken,
    generation: u64,
    query: String,
    phase: SearchPhase,
    pending_ids: Vec<BookId>,
    /// Resolved records for the current session, in resolution order
    results: Vec<Book>,
    /// Last favorite snapshot, used only to filter what is shown
    favorites: IdSet,
}

/// Turns a stream of typed queries into one settled catalog search.
///
/// Each new query cancels the previous session and clears the results right
/// away. After the debounce delay the catalog is searched and every candidate
/// is fetched concurrently; a record is only kept if its session is still the
/// current one and its id is still pending.
#[derive(Clone)]
pub struct SearchController {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    catalog: Arc<dyn CatalogClient>,
    delay: Option<Duration>,
    state: Mutex<SessionState>,
    results_tx: watch::Sender<Vec<Book>>,
}

impl SearchController {
    pub fn new(catalog: Arc<dyn CatalogClient>, delay: Option<Duration>) -> Self {
        let (results_tx, _) = watch::channel(Vec::new());

        Self {
            inner: Arc::new(ControllerInner {
                catalog,
                delay,
                state: Mutex::new(SessionState {
                    token: CancellationToken::new(),
                    generation: 0,
                    query: String::new(),
                    phase: SearchPhase::Idle,
                    pending_ids: Vec::new(),
                    results: Vec::new(),
                    favorites: IdSet::new(),
                }),
                results_tx,
            }),
        }
    }

    /// Spawns the task that keeps the favorite filter up to date
    pub fn watch_favorites(&self, mut favorites_rx: watch::Receiver<IdSet>) -> JoinHandle<()> {
        let controller = self.clone();
        tokio::spawn(async move {
            let initial = favorites_rx.borrow_and_update().clone();
            controller.on_favorite_set_changed(initial);

            while favorites_rx.changed().await.is_ok() {
                let snapshot = favorites_rx.borrow_and_update().clone();
                controller.on_favorite_set_changed(snapshot);
            }

            tracing::info!("Library store closed, search favorites filter stopped");
        })
    }

    /// Starts a new search session for `text`, superseding any current one.
    ///
    /// Must be called from within a Tokio runtime. Results are cleared before
    /// this returns; an empty query ends in `Idle` without a catalog call.
    pub fn set_query(&self, text: impl Into<String>) {
        let query = text.into();

        let (token, generation) = {
            let mut state = self.lock();
            state.token.cancel();
            let token = CancellationToken::new();
            state.token = token.clone();
            state.generation += 1;
            state.query = query.clone();
            state.pending_ids.clear();
            state.results.clear();

            if query.trim().is_empty() {
                state.phase = SearchPhase::Idle;
                self.publish(&state);
                tracing::debug!(generation = state.generation, "Search cleared");
                return;
            }

            state.phase = match self.inner.delay {
                Some(_) => SearchPhase::Debouncing {
                    query: query.clone(),
                },
                None => SearchPhase::Searching {
                    query: query.clone(),
                },
            };
            self.publish(&state);
            (token, state.generation)
        };

        let controller = self.clone();
        tokio::spawn(async move {
            controller.run_session(query, token, generation).await;
        });
    }

    pub fn query(&self) -> String {
        self.lock().query.clone()
    }

    pub fn phase(&self) -> SearchPhase {
        self.lock().phase.clone()
    }

    /// Current results without books that are favorites
    pub fn results(&self) -> Vec<Book> {
        self.inner.results_tx.borrow().clone()
    }

    /// Stream of the visible result set
    pub fn subscribe(&self) -> watch::Receiver<Vec<Book>> {
        self.inner.results_tx.subscribe()
    }

    /// Refreshes the favorite filter; session state is untouched
    pub fn on_favorite_set_changed(&self, favorites: IdSet) {
        let mut state = self.lock();
        state.favorites = favorites;
        self.publish(&state);
    }

    async fn run_session(&self, query: String, token: CancellationToken, generation: u64) {
        if let Some(delay) = self.inner.delay {
            tokio::time::sleep(delay).await;

            let mut state = self.lock();
            if token.is_cancelled() {
                tracing::debug!(generation, "Search superseded while debouncing");
                return;
            }
            state.phase = SearchPhase::Searching {
                query: query.clone(),
            };
        }

        let ids = match self.inner.catalog.search(&query).await {
            Ok(ids) => ids,
            Err(e) => {
                tracing::warn!(query = %query, generation, error = %e, "Catalog search failed");
                let mut state = self.lock();
                if !token.is_cancelled() {
                    state.phase = SearchPhase::Idle;
                }
                return;
            }
        };

        let pending_ids = {
            let mut state = self.lock();
            if token.is_cancelled() {
                tracing::debug!(generation, "Search superseded before results arrived");
                return;
            }
            let mut pending_ids: Vec<BookId> = Vec::with_capacity(ids.len());
            for id in ids {
                if !pending_ids.contains(&id) {
                    pending_ids.push(id);
                }
            }
            state.pending_ids = pending_ids.clone();
            state.phase = SearchPhase::Resolving {
                query: query.clone(),
                pending_ids: pending_ids.clone(),
            };
            pending_ids
        };

        tracing::info!(
            query = %query,
            generation,
            candidates = pending_ids.len(),
            "Search resolving candidates"
        );

        for id in pending_ids {
            let controller = self.clone();
            let token = token.clone();
            tokio::spawn(async move {
                controller.complete_fetch(id, token).await;
            });
        }
    }

    async fn complete_fetch(&self, id: BookId, token: CancellationToken) {
        if token.is_cancelled() {
            return;
        }

        let Some(book) = resolve_book(self.inner.catalog.as_ref(), &id).await else {
            return;
        };

        let mut state = self.lock();
        // A newer query may have replaced the session during the lookup.
        if token.is_cancelled() || !state.pending_ids.contains(&id) {
            tracing::debug!(item_id = %id, "Discarded stale search result");
            return;
        }
        if state.results.iter().any(|b| b.id == book.id) {
            return;
        }
        state.results.push(book);
        self.publish(&state);
    }

    fn publish(&self, state: &SessionState) {
        let visible: Vec<Book> = state
            .results
            .iter()
            .filter(|book| !state.favorites.contains(&book.id))
            .cloned()
            .collect();
        self.inner.results_tx.send_replace(visible);
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::catalog::MockCatalogClient;
    use crate::services::testing::{settle, ScriptedCatalog};

    const DELAY: Duration = Duration::from_millis(300);

    fn result_ids(controller: &SearchController) -> Vec<String> {
        controller.results().into_iter().map(|b| b.id).collect()
    }

    fn catalog() -> ScriptedCatalog {
        ScriptedCatalog::new()
            .with_book("1", &[])
            .with_book("2", &[])
            .with_book("3", &[])
            .with_search("Tol", &["1", "2"])
            .with_search("Dune", &["3"])
    }

    #[test]
    fn test_cancellation_token() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_coalesces_typing() {
        let searched = Arc::new(std::sync::Mutex::new(Vec::<String>::new()));
        let log = searched.clone();

        let mut mock = MockCatalogClient::new();
        mock.expect_search().returning(move |query| {
            log.lock().unwrap().push(query.to_string());
            Ok(vec!["1".to_string()])
        });
        mock.expect_get_item()
            .returning(|id| Ok(Some(Book::new(id, "The Hobbit"))));
        mock.expect_name().return_const("mock");

        let controller = SearchController::new(Arc::new(mock), Some(DELAY));
        controller.set_query("T");
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_query("To");
        tokio::time::sleep(Duration::from_millis(100)).await;
        controller.set_query("Tol");
        tokio::time::sleep(DELAY * 2).await;

        assert_eq!(*searched.lock().unwrap(), vec!["Tol".to_string()]);
        assert_eq!(result_ids(&controller), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_phases_follow_session() {
        let catalog = catalog();
        catalog.gate("2");
        let catalog = Arc::new(catalog);
        let controller = SearchController::new(catalog.clone(), Some(DELAY));

        assert_eq!(controller.phase(), SearchPhase::Idle);

        controller.set_query("Tol");
        assert_eq!(
            controller.phase(),
            SearchPhase::Debouncing {
                query: "Tol".to_string()
            }
        );

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(
            controller.phase(),
            SearchPhase::Resolving {
                query: "Tol".to_string(),
                pending_ids: vec!["1".to_string(), "2".to_string()],
            }
        );
        assert_eq!(result_ids(&controller), vec!["1"]);

        catalog.release("2");
        settle().await;
        assert_eq!(result_ids(&controller), vec!["1", "2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_results_never_appear() {
        let catalog = catalog();
        catalog.gate("1");
        catalog.gate("2");
        let catalog = Arc::new(catalog);
        let controller = SearchController::new(catalog.clone(), None);

        controller.set_query("Tol");
        settle().await;
        assert!(result_ids(&controller).is_empty());

        controller.set_query("Dune");
        catalog.release("1");
        catalog.release("2");
        settle().await;

        assert_eq!(result_ids(&controller), vec!["3"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_query_clears_results_immediately() {
        let controller = SearchController::new(Arc::new(catalog()), Some(DELAY));
        controller.set_query("Tol");
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(result_ids(&controller).len(), 2);

        controller.set_query("Dune");
        assert!(result_ids(&controller).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_query_short_circuits() {
        let catalog = Arc::new(catalog());
        let controller = SearchController::new(catalog.clone(), Some(DELAY));
        controller.set_query("Tol");
        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(catalog.searches(), vec!["Tol"]);

        controller.set_query("");
        assert!(result_ids(&controller).is_empty());
        assert_eq!(controller.phase(), SearchPhase::Idle);

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(catalog.searches(), vec!["Tol"]);
        assert!(result_ids(&controller).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clearing_during_debounce_cancels_search() {
        let catalog = Arc::new(catalog());
        let controller = SearchController::new(catalog.clone(), Some(DELAY));

        controller.set_query("Tol");
        controller.set_query("   ");
        tokio::time::sleep(DELAY * 2).await;

        assert!(catalog.searches().is_empty());
        assert_eq!(controller.phase(), SearchPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_search_ends_idle() {
        let catalog = Arc::new(catalog().with_failing_search("boom"));
        let controller = SearchController::new(catalog, None);

        controller.set_query("boom");
        settle().await;

        assert_eq!(controller.phase(), SearchPhase::Idle);
        assert!(result_ids(&controller).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_candidates_are_fetched_once() {
        let catalog = Arc::new(catalog().with_search("dup", &["1", "1", "2"]));
        let controller = SearchController::new(catalog.clone(), None);

        controller.set_query("dup");
        settle().await;

        assert_eq!(result_ids(&controller), vec!["1", "2"]);
        assert_eq!(catalog.lookups().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_candidates_are_absent() {
        let catalog = Arc::new(catalog().with_search("ghost", &["1", "missing"]));
        let controller = SearchController::new(catalog, None);

        controller.set_query("ghost");
        settle().await;

        assert_eq!(result_ids(&controller), vec!["1"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_favorites_are_filtered_at_display_time() {
        let controller = SearchController::new(Arc::new(catalog()), None);
        controller.set_query("Tol");
        settle().await;
        assert_eq!(result_ids(&controller), vec!["1", "2"]);

        controller.on_favorite_set_changed(IdSet::from(["1".to_string()]));
        assert_eq!(result_ids(&controller), vec!["2"]);

        controller.on_favorite_set_changed(IdSet::new());
        assert_eq!(result_ids(&controller), vec!["1", "2"]);
    }
}
