use std::sync::Arc;
use std::time::Duration;

use crate::services::{
    catalog::CatalogClient, library::LibraryStore, recommendations::RecommendationEngine,
    search_session::SearchController,
};

/// Shared application state
///
/// Both core components share one catalog and follow the same store.
#[derive(Clone)]
pub struct AppState {
    pub engine: RecommendationEngine,
    pub search: SearchController,
    pub store: Arc<dyn LibraryStore>,
}

impl AppState {
    /// Builds the engine and search controller and starts their store listeners.
    ///
    /// Must be called from within a Tokio runtime. The listeners run until the
    /// store's snapshot channels close.
    pub fn start(
        catalog: Arc<dyn CatalogClient>,
        store: Arc<dyn LibraryStore>,
        search_debounce: Option<Duration>,
    ) -> Self {
        let engine = RecommendationEngine::new(catalog.clone(), store.clone());
        engine.start();

        let search = SearchController::new(catalog, search_debounce);
        search.watch_favorites(store.favorites());

        tracing::info!(
            debounce_ms = search_debounce.map(|d| d.as_millis() as u64).unwrap_or(0),
            "Recommendation engine and search controller started"
        );

        Self {
            engine,
            search,
            store,
        }
    }
}
