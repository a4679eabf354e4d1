//! Data models for Rec'd entities.
//!
//! - `Artist`: a search hit
//! - `RecommendationSummary`, `Recommendation`: what an artist is listening to

pub mod artist;

pub use artist::{Artist, ArtistSearchResponse, Recommendation, RecommendationSummary};
