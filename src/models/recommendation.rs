use serde::{Deserialize, Serialize};

use super::Book;

/// A ranked recommendation with the number of favorites behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub book: Book,
    pub source_count: usize,
}
