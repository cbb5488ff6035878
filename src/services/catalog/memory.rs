use std::collections::HashMap;
use std::path::Path;

use crate::{
    error::{AppError, AppResult},
    models::{Book, BookId},
    services::catalog::CatalogClient,
};

/// Catalog backed by an in-process map of records
///
/// Search is a case-insensitive substring match over titles and authors,
/// ordered by title and then id so results are deterministic.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    books: HashMap<BookId, Book>,
}

impl InMemoryCatalog {
    pub fn new<I>(books: I) -> Self
    where
        I: IntoIterator<Item = Book>,
    {
        Self {
            books: books.into_iter().map(|b| (b.id.clone(), b)).collect(),
        }
    }

    /// Loads a JSON array of book records
    pub async fn from_file(path: &Path) -> AppResult<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            AppError::Internal(format!("Failed to read catalog {}: {}", path.display(), e))
        })?;
        let books: Vec<Book> = serde_json::from_str(&raw).map_err(|e| {
            AppError::InvalidInput(format!("Invalid catalog {}: {}", path.display(), e))
        })?;

        tracing::info!(path = %path.display(), books = books.len(), "Loaded catalog file");

        Ok(Self::new(books))
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    fn matches(book: &Book, needle: &str) -> bool {
        book.title.to_lowercase().contains(needle)
            || book
                .authors
                .iter()
                .any(|author| author.to_lowercase().contains(needle))
    }
}

#[async_trait::async_trait]
impl CatalogClient for InMemoryCatalog {
    async fn search(&self, query: &str) -> AppResult<Vec<BookId>> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let mut hits: Vec<&Book> = self
            .books
            .values()
            .filter(|book| Self::matches(book, &needle))
            .collect();
        hits.sort_by(|a, b| a.title.cmp(&b.title).then_with(|| a.id.cmp(&b.id)));

        Ok(hits.into_iter().map(|book| book.id.clone()).collect())
    }

    async fn get_item(&self, id: &str) -> AppResult<Option<Book>> {
        Ok(self.books.get(id).cloned())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
