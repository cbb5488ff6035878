use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};

use super::handlers;
use super::AppState;

/// Creates the main API router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes())
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_id_middleware))
                .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id)),
        )
        .with_state(state)
}

/// API routes under /api/v1
fn api_routes() -> Router<AppState> {
    Router::new()
        // Recommendations
        .route("/recommendations", get(handlers::get_recommendations))
        .route("/recommendations/events", get(handlers::recommendation_events))
        .route(
            "/recommendations/:id/block",
            post(handlers::block_recommendation),
        )
        // Favorites
        .route("/favorites", get(handlers::get_favorites))
        .route("/favorites/:id/toggle", post(handlers::toggle_favorite))
        // Search
        .route(
            "/search",
            get(handlers::get_search).put(handlers::set_query),
        )
        .route("/search/events", get(handlers::search_events))
}
