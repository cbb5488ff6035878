pub mod attribution;
pub mod catalog;
pub mod library;
pub mod ranking;
pub mod recommendations;
pub mod search_session;

#[cfg(test)]
pub(crate) mod testing;

pub use recommendations::RecommendationEngine;
pub use search_session::SearchController;
