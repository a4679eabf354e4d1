//! REST API client module for the Rec'd service.
//!
//! This module provides the `ApiClient` for logging in, signing up,
//! searching artists and fetching recommendation summaries.
//!
//! Auth endpoints return a bearer token; the recommendations endpoint
//! additionally requires the user's API key in the `X-Api-Key` header.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
