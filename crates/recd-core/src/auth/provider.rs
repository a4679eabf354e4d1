use std::future::Future;

use chrono::{DateTime, Utc};
use thiserror::Error;

use super::{Credentials, SignupFields, UserId};

/// Why an auth attempt failed. Returned to the form and shown inline.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Unable to reach the server: {0}")]
    NetworkError(String),

    #[error("{0}")]
    Rejected(String),

    #[error("Unexpected response from server: {0}")]
    Unexpected(String),
}

impl AuthError {
    /// Message suitable for display under a form.
    pub fn user_message(&self) -> String {
        match self {
            AuthError::InvalidCredentials => "Invalid email or password".to_string(),
            AuthError::NetworkError(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            AuthError::Rejected(reason) => reason.clone(),
            AuthError::Unexpected(_) => "Something went wrong. Please try again.".to_string(),
        }
    }
}

/// What an identity provider hands back for accepted credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Anything that can turn credentials into an [`Identity`].
///
/// Implementations report failure as an [`AuthError`] value; transport
/// problems become `NetworkError`, rejected pairs `InvalidCredentials`.
pub trait IdentityProvider: Send + Sync {
    fn login(
        &self,
        credentials: &Credentials,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;

    fn signup(
        &self,
        fields: &SignupFields,
    ) -> impl Future<Output = Result<Identity, AuthError>> + Send;
}
