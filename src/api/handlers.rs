use std::convert::Infallible;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::sse::{Event, KeepAlive, Sse},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio_stream::{wrappers::WatchStream, Stream, StreamExt};

use crate::{
    error::{AppError, AppResult},
    middleware::request_id::RequestId,
    models::{Book, BookId, Recommendation},
    services::search_session::SearchPhase,
};

use super::AppState;

// Request/Response types

#[derive(Debug, Deserialize)]
pub struct SetQueryRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub query: String,
    pub phase: SearchPhase,
    pub results: Vec<Book>,
}

#[derive(Debug, Serialize)]
pub struct FavoriteResponse {
    pub id: BookId,
    pub favorite: bool,
}

fn validate_id(id: &str) -> AppResult<&str> {
    let id = id.trim();
    if id.is_empty() {
        return Err(AppError::InvalidInput("Book id cannot be empty".to_string()));
    }
    Ok(id)
}

fn search_response(state: &AppState) -> SearchResponse {
    SearchResponse {
        query: state.search.query(),
        phase: state.search.phase(),
        results: state.search.results(),
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Ranked recommendations, favorites excluded
pub async fn get_recommendations(State(state): State<AppState>) -> Json<Vec<Recommendation>> {
    Json(state.engine.visible_recommendations().await)
}

/// Server-sent stream of the ranked recommendations
pub async fn recommendation_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let favorites = state.store.favorites();
    let stream = WatchStream::new(state.engine.subscribe()).map(move |ranked| {
        let visible: Vec<Recommendation> = {
            let current = favorites.borrow();
            ranked
                .into_iter()
                .filter(|r| !current.contains(&r.book.id))
                .collect()
        };
        Event::default().event("recommendations").json_data(visible)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// Hides a recommendation permanently
pub async fn block_recommendation(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    let id = validate_id(&id)?;
    tracing::info!(request_id = %request_id, item_id = %id, "Blocking recommendation");

    state.engine.block(id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// Current favorite ids, sorted
pub async fn get_favorites(State(state): State<AppState>) -> Json<Vec<BookId>> {
    let mut ids: Vec<BookId> = state.store.favorites().borrow().iter().cloned().collect();
    ids.sort();
    Json(ids)
}

/// Flips a book's favorite status
pub async fn toggle_favorite(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(id): Path<String>,
) -> AppResult<Json<FavoriteResponse>> {
    let id = validate_id(&id)?;
    let favorite = state.engine.toggle_favorite(id).await;

    tracing::info!(request_id = %request_id, item_id = %id, favorite, "Favorite toggled");

    Ok(Json(FavoriteResponse {
        id: id.to_string(),
        favorite,
    }))
}

/// Replaces the search query; results settle asynchronously
pub async fn set_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(request): Json<SetQueryRequest>,
) -> (StatusCode, Json<SearchResponse>) {
    tracing::debug!(request_id = %request_id, query = %request.query, "Search query updated");

    state.search.set_query(request.query);
    (StatusCode::ACCEPTED, Json(search_response(&state)))
}

/// Current search session and its visible results
pub async fn get_search(State(state): State<AppState>) -> Json<SearchResponse> {
    Json(search_response(&state))
}

/// Server-sent stream of the visible search results
pub async fn search_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = WatchStream::new(state.search.subscribe()).filter_map(|results| {
        match Event::default().event("results").json_data(results) {
            Ok(event) => Some(Ok(event)),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode search results event");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
