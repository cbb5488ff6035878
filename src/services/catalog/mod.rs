//! Book catalog abstraction
//!
//! The catalog resolves free-text queries to ordered candidate ids and ids to
//! full book records. Both the recommendation engine and the search controller
//! share one catalog instance.
use crate::{
    error::AppResult,
    models::{Book, BookId},
};

pub mod http;
pub mod memory;

pub use http::HttpCatalog;
pub use memory::InMemoryCatalog;

/// Trait for book catalog backends
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// Search for books by free text
    ///
    /// Returns candidate ids in relevance order; an unmatched query yields an empty list.
    async fn search(&self, query: &str) -> AppResult<Vec<BookId>>;

    /// Fetch a full book record, `None` if the catalog does not know the id
    async fn get_item(&self, id: &str) -> AppResult<Option<Book>>;

    /// Catalog name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Looks up a book, folding catalog errors into absence
pub async fn resolve_book(catalog: &dyn CatalogClient, id: &str) -> Option<Book> {
    match catalog.get_item(id).await {
        Ok(Some(book)) => Some(book),
        Ok(None) => {
            tracing::debug!(item_id = %id, catalog = catalog.name(), "Book not found in catalog");
            None
        }
        Err(e) => {
            tracing::warn!(item_id = %id, catalog = catalog.name(), error = %e, "Book lookup failed");
            None
        }
    }
}
