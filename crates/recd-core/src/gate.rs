//! Access decisions for locked features.
//!
//! A feature is shown when its unlock key is present. Otherwise the user
//! is asked to log in first (for features tied to an identity) or to enter
//! the key.

use std::fmt;
use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::info;

use crate::auth::{Session, TokenStorage};

/// Keys shorter than this are rejected before they are stored.
const MIN_UNLOCK_KEY_LENGTH: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Feature {
    /// LLM-derived "what they're listening to" summaries.
    Recommendations,
}

impl Feature {
    pub fn slug(&self) -> &'static str {
        match self {
            Feature::Recommendations => "recommendations",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Feature::Recommendations => "Recommendations",
        }
    }

    /// Whether the feature asks for a login before its key.
    pub fn requires_identity(&self) -> bool {
        match self {
            Feature::Recommendations => true,
        }
    }

    /// Decide access for this feature.
    pub fn decide(&self, session: &Session, unlocked: bool) -> AccessDecision {
        if self.requires_identity() {
            decide(session, unlocked)
        } else if unlocked {
            AccessDecision::Granted
        } else {
            AccessDecision::LockedNeedsKey
        }
    }

    fn storage_key(&self) -> String {
        format!("unlock.{}", self.slug())
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessDecision {
    Granted,
    LockedNeedsKey,
    LockedNeedsAuth,
}

/// Access rule for an identity-first feature.
///
/// An unlocked feature is always granted; otherwise a missing session
/// outranks a missing key.
pub fn decide(session: &Session, feature_unlocked: bool) -> AccessDecision {
    if feature_unlocked {
        AccessDecision::Granted
    } else if !session.is_present() {
        AccessDecision::LockedNeedsAuth
    } else {
        AccessDecision::LockedNeedsKey
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UnlockKeyError {
    #[error("Key is required")]
    Empty,

    #[error("Key must be at least 16 characters")]
    TooShort,

    #[error("Key must not contain spaces")]
    Whitespace,
}

/// Check the shape of an unlock key and return it trimmed.
pub fn validate_unlock_key(key: &str) -> Result<&str, UnlockKeyError> {
    let key = key.trim();
    if key.is_empty() {
        Err(UnlockKeyError::Empty)
    } else if key.chars().any(char::is_whitespace) {
        Err(UnlockKeyError::Whitespace)
    } else if key.chars().count() < MIN_UNLOCK_KEY_LENGTH {
        Err(UnlockKeyError::TooShort)
    } else {
        Ok(key)
    }
}

/// Per-feature unlock keys, kept in token storage.
#[derive(Clone)]
pub struct FeatureKeys {
    storage: Arc<dyn TokenStorage>,
}

impl FeatureKeys {
    pub fn new(storage: Arc<dyn TokenStorage>) -> Self {
        Self { storage }
    }

    pub fn key(&self, feature: Feature) -> Result<Option<String>> {
        self.storage.get(&feature.storage_key())
    }

    /// Unreadable storage counts as locked.
    pub fn is_unlocked(&self, feature: Feature) -> bool {
        matches!(self.key(feature), Ok(Some(_)))
    }

    /// Validate and store `key`. Returns `Ok(Err(_))` for a malformed key.
    pub fn unlock(&self, feature: Feature, key: &str) -> Result<Result<(), UnlockKeyError>> {
        let key = match validate_unlock_key(key) {
            Ok(key) => key,
            Err(e) => return Ok(Err(e)),
        };
        self.storage.set(&feature.storage_key(), key)?;
        info!(feature = feature.slug(), "Feature unlocked");
        Ok(Ok(()))
    }

    pub fn lock(&self, feature: Feature) -> Result<()> {
        self.storage.remove(&feature.storage_key())?;
        info!(feature = feature.slug(), "Feature locked");
        Ok(())
    }
}
