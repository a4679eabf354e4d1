use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::Identity;

/// Session lifetime in hours when the provider does not send an expiry.
const DEFAULT_SESSION_HOURS: i64 = 12;

/// Buffer time before expiry to report that a refresh is due (10 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 10;

/// Account identifier issued by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated identity together with its bearer token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionData {
    pub user_id: UserId,
    pub email: String,
    pub display_name: Option<String>,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl fmt::Debug for SessionData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionData")
            .field("user_id", &self.user_id)
            .field("email", &self.email)
            .field("display_name", &self.display_name)
            .field("token", &"<redacted>")
            .field("created_at", &self.created_at)
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl SessionData {
    /// Build session data from a freshly issued identity.
    pub fn from_identity(identity: Identity) -> Self {
        let created_at = Utc::now();
        let expires_at = identity
            .expires_at
            .unwrap_or_else(|| created_at + Duration::hours(DEFAULT_SESSION_HOURS));

        Self {
            user_id: identity.user_id,
            email: identity.email,
            display_name: identity.display_name,
            token: identity.token,
            created_at,
            expires_at,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Check if the session will expire soon and should be refreshed
    pub fn needs_refresh(&self) -> bool {
        let refresh_at = self.expires_at - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES);
        Utc::now() > refresh_at
    }

    pub fn time_until_expiry(&self) -> Duration {
        self.expires_at - Utc::now()
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.time_until_expiry().num_minutes().max(0)
    }
}

/// The current session of a client: either authenticated or anonymous.
///
/// Identity and token live together in [`SessionData`], so a session can
/// never carry one without the other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    data: Option<SessionData>,
}

impl Session {
    pub fn anonymous() -> Self {
        Self { data: None }
    }

    pub fn authenticated(data: SessionData) -> Self {
        Self { data: Some(data) }
    }

    pub fn data(&self) -> Option<&SessionData> {
        self.data.as_ref()
    }

    /// True when an identity is present, whether or not it has expired.
    pub fn is_present(&self) -> bool {
        self.data.is_some()
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }

    /// Get the user ID if session exists
    pub fn user_id(&self) -> Option<&UserId> {
        self.data.as_ref().map(|d| &d.user_id)
    }

    /// Get the bearer token if session exists
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.data.as_ref().map(|d| d.expires_at)
    }

    /// Name to greet the user with: display name, falling back to email.
    pub fn greeting_name(&self) -> Option<&str> {
        self.data
            .as_ref()
            .map(|d| d.display_name.as_deref().unwrap_or(d.email.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(expires_at: Option<DateTime<Utc>>) -> Identity {
        Identity {
            user_id: UserId::new("u-1"),
            email: "fan@example.com".to_string(),
            display_name: None,
            token: "tok".to_string(),
            expires_at,
        }
    }

    #[test]
    fn test_default_expiry_applied() {
        let data = SessionData::from_identity(identity(None));
        let lifetime = data.expires_at - data.created_at;
        assert_eq!(lifetime, Duration::hours(DEFAULT_SESSION_HOURS));
        assert!(!data.is_expired());
        assert!(!data.needs_refresh());
    }

    #[test]
    fn test_provider_expiry_respected() {
        let expires = Utc::now() + Duration::minutes(5);
        let data = SessionData::from_identity(identity(Some(expires)));
        assert_eq!(data.expires_at, expires);
        assert!(data.needs_refresh());
        assert!(data.minutes_until_expiry() <= 5);
    }

    #[test]
    fn test_expired_session_is_invalid_but_present() {
        let data = SessionData::from_identity(identity(Some(Utc::now() - Duration::minutes(1))));
        assert!(data.is_expired());
        assert_eq!(data.minutes_until_expiry(), 0);

        let session = Session::authenticated(data);
        assert!(session.is_present());
        assert!(!session.is_valid());
    }

    #[test]
    fn test_anonymous_session_has_no_identity_or_token() {
        let session = Session::anonymous();
        assert!(!session.is_present());
        assert!(session.user_id().is_none());
        assert!(session.token().is_none());
        assert!(session.expires_at().is_none());
    }

    #[test]
    fn test_greeting_name_falls_back_to_email() {
        let mut data = SessionData::from_identity(identity(None));
        assert_eq!(
            Session::authenticated(data.clone()).greeting_name(),
            Some("fan@example.com")
        );
        data.display_name = Some("Fan".to_string());
        assert_eq!(Session::authenticated(data).greeting_name(), Some("Fan"));
    }

    #[test]
    fn test_debug_redacts_token() {
        let data = SessionData::from_identity(identity(None));
        let rendered = format!("{:?}", data);
        assert!(!rendered.contains("\"tok\""));
        assert!(rendered.contains("<redacted>"));
    }
}
