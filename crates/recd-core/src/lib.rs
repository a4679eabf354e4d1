//! Core library for Rec'd.
//!
//! Rec'd lets visitors search for musical artists and read LLM-derived
//! summaries of what those artists are listening to. The summaries are
//! gated behind a login and a per-feature API key. This crate holds the
//! framework-independent pieces of that flow:
//!
//! - [`auth`]: session store, identity provider seam, token storage
//! - [`forms`]: login and signup forms with local validation and redirects
//! - [`gate`]: access decisions for locked features
//! - [`boundary`]: render-time error boundary
//! - [`api`]: HTTP client for the Rec'd API
//! - [`cache`]: on-disk cache of recommendation summaries

pub mod api;
pub mod auth;
pub mod boundary;
pub mod cache;
pub mod config;
pub mod forms;
pub mod gate;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError};
pub use auth::{
    AuthError, Credentials, Identity, IdentityProvider, Session, SessionData, SessionStore,
    SignupFields, TokenStorage, UserId,
};
pub use boundary::{ErrorBoundary, ErrorReporter, ErrorSnapshot, RenderError, Rendered};
pub use config::Config;
pub use gate::{decide, AccessDecision, Feature, FeatureKeys};
