//! Book recommendations from favorites, and search-as-you-type over a catalog.
pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod services;
