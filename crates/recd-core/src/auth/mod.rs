//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: token-based session with expiry
//! - `SessionStore`: process-wide owner of the current session
//! - `IdentityProvider`: the seam to whatever accepts credentials
//! - `TokenStorage`: key-value persistence for the session token
//!
//! Sessions are persisted through a `TokenStorage` backend so they survive
//! a restart, and expire after 12 hours unless the provider says otherwise.

pub mod credentials;
pub mod provider;
pub mod session;
pub mod storage;
pub mod store;

pub use credentials::{Credentials, SignupFields};
pub use provider::{AuthError, Identity, IdentityProvider};
pub use session::{Session, SessionData, UserId};
pub use storage::{FileTokenStorage, KeyringTokenStorage, MemoryTokenStorage, TokenStorage};
pub use store::SessionStore;
