//! Local caching of API results.
//!
//! Recommendation summaries are cached per artist, and the last search is
//! kept so the search page can be restored at startup. Data is stored as
//! JSON and considered stale after 60 minutes.

pub mod manager;

pub use manager::{CacheManager, CachedData, LastSearch};
