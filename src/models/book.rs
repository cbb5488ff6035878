use serde::{Deserialize, Serialize};
use url::Url;

/// Catalog identifier of a book
pub type BookId = String;

/// A book record as returned by the catalog
///
/// Records are immutable once built; identity is the `id` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Book {
    pub id: BookId,
    #[serde(default)]
    pub authors: Vec<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: Option<Url>,
    #[serde(default)]
    pub rating: Option<f32>,
    /// Books the catalog considers similar to this one
    #[serde(default)]
    pub similar_item_ids: Vec<BookId>,
}

impl PartialEq for Book {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Book {}

impl std::hash::Hash for Book {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Book {
    /// Creates a bare record with no metadata beyond id and title
    pub fn new(id: impl Into<BookId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            authors: Vec::new(),
            title: title.into(),
            description: String::new(),
            image_url: None,
            rating: None,
            similar_item_ids: Vec::new(),
        }
    }

    pub fn with_authors<I, S>(mut self, authors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.authors = authors.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_similar<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<BookId>,
    {
        self.similar_item_ids = ids.into_iter().map(Into::into).collect();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_book_identity_is_id() {
        let a = Book::new("b1", "Dune");
        let mut b = Book::new("b1", "Dune (Deluxe)");
        b.rating = Some(4.5);
        assert_eq!(a, b);
        assert_ne!(a, Book::new("b2", "Dune"));
    }

    #[test]
    fn test_book_deserialization_with_defaults() {
        let json = r#"{
            "id": "OL45804W",
            "title": "Fantastic Mr Fox",
            "image_url": "https://covers.example.org/OL45804W.jpg",
            "similar_item_ids": ["OL1W", "OL2W"]
        }"#;

        let book: Book = serde_json::from_str(json).unwrap();
        assert_eq!(book.id, "OL45804W");
        assert!(book.authors.is_empty());
        assert_eq!(book.description, "");
        assert_eq!(
            book.image_url.as_ref().map(Url::as_str),
            Some("https://covers.example.org/OL45804W.jpg")
        );
        assert_eq!(book.rating, None);
        assert_eq!(book.similar_item_ids, vec!["OL1W", "OL2W"]);
    }

    #[test]
    fn test_book_rejects_invalid_image_url() {
        let json = r#"{"id": "x", "title": "X", "image_url": "not a url"}"#;
        assert!(serde_json::from_str::<Book>(json).is_err());
    }

    #[test]
    fn test_builders() {
        let book = Book::new("b1", "Dune")
            .with_authors(["Frank Herbert"])
            .with_similar(["b2", "b3"]);
        assert_eq!(book.authors, vec!["Frank Herbert"]);
        assert_eq!(book.similar_item_ids, vec!["b2", "b3"]);
    }
}
