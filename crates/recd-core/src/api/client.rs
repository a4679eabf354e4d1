//! API client for communicating with the Rec'd REST API.
//!
//! This module provides the `ApiClient` struct, which doubles as the
//! [`IdentityProvider`] for the session store.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{header, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{AuthError, Credentials, Identity, IdentityProvider, SignupFields, UserId};
use crate::models::{Artist, ArtistSearchResponse, RecommendationSummary};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Header carrying the user's key for premium endpoints.
const API_KEY_HEADER: &str = "X-Api-Key";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct SignupRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
    #[serde(rename = "expiresAt", default)]
    expires_at: Option<DateTime<Utc>>,
    user: AuthUser,
}

#[derive(Debug, Deserialize)]
struct AuthUser {
    id: String,
    email: String,
    #[serde(default)]
    name: Option<String>,
}

impl AuthResponse {
    fn into_identity(self) -> Identity {
        Identity {
            user_id: UserId::new(self.user.id),
            email: self.user.email,
            display_name: self.user.name.filter(|n| !n.trim().is_empty()),
            token: self.token,
            expires_at: self.expires_at,
        }
    }
}

/// API client for the Rec'd service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client against `base_url` (no trailing slash needed)
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Search artists by name. Public endpoint; no token required.
    pub async fn search_artists(&self, query: &str) -> Result<Vec<Artist>, ApiError> {
        let url = format!(
            "{}?q={}",
            self.url("/artists/search"),
            urlencoding::encode(query.trim())
        );
        let response: ArtistSearchResponse = self.get(&url, |req| req).await?;
        debug!(query = query, count = response.artists.len(), "Artist search complete");
        Ok(response.artists)
    }

    /// Fetch the recommendation summary for an artist.
    pub async fn fetch_recommendations(
        &self,
        artist_id: &str,
        token: &str,
        api_key: &str,
    ) -> Result<RecommendationSummary, ApiError> {
        let url = self.url(&format!(
            "/artists/{}/recommendations",
            urlencoding::encode(artist_id)
        ));
        self.get(&url, |req| req.bearer_auth(token).header(API_KEY_HEADER, api_key))
            .await
    }

    async fn post_auth<B: Serialize>(&self, path: &str, body: &B) -> Result<Identity, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .header(header::ACCEPT, "application/json")
            .json(body)
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let auth: AuthResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("auth response: {}", e)))?;
        Ok(auth.into_identity())
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T, F>(&self, url: &str, decorate: F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Fn(RequestBuilder) -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let request = self
                .client
                .get(url)
                .header(header::ACCEPT, "application/json");
            let response = decorate(request).send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response
                        .json()
                        .await
                        .map_err(|e| ApiError::InvalidResponse(format!("{}: {}", url, e)));
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }
}

impl IdentityProvider for ApiClient {
    async fn login(&self, credentials: &Credentials) -> Result<Identity, AuthError> {
        let body = LoginRequest {
            email: &credentials.email,
            password: &credentials.password,
        };
        self.post_auth("/auth/login", &body).await.map_err(|e| {
            warn!(error = %e, "Login request failed");
            AuthError::from(e)
        })
    }

    async fn signup(&self, fields: &SignupFields) -> Result<Identity, AuthError> {
        let body = SignupRequest {
            name: fields.display_name.trim(),
            email: fields.email.trim(),
            password: &fields.password,
        };
        self.post_auth("/auth/signup", &body).await.map_err(|e| {
            warn!(error = %e, "Signup request failed");
            AuthError::from(e)
        })
    }
}
