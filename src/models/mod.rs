pub mod book;
pub mod recommendation;

pub use book::{Book, BookId};
pub use recommendation::Recommendation;
