//! Application state management for Rec'd.
//!
//! This module contains the core `App` struct that owns UI state, the shared
//! session store, and the channel background tasks report back on.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use recd_core::api::{ApiClient, ApiError};
use recd_core::auth::{AuthError, Session, SessionStore};
use recd_core::cache::{CacheManager, CachedData};
use recd_core::config::Config;
use recd_core::forms::{
    query_param, split_path, Field, LoginForm, Navigator, RedirectTarget, SignupForm,
    SubmitError, ROOT_PATH,
};
use recd_core::gate::{AccessDecision, Feature, FeatureKeys};
use recd_core::models::{Artist, RecommendationSummary};

// ============================================================================
// Constants
// ============================================================================

/// Buffer size for the background task message channel.
const CHANNEL_BUFFER_SIZE: usize = 32;

/// Maximum length of the search box.
const MAX_QUERY_LENGTH: usize = 100;

/// Maximum length of the unlock key input.
const MAX_UNLOCK_KEY_LENGTH: usize = 256;

// ============================================================================
// Routing
// ============================================================================

/// A page of the application, resolved from a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Page {
    Search,
    Login,
    Signup,
    Results { artist_id: String },
}

impl Page {
    /// Resolve a path such as `/results?artist=42`. Unknown paths land on search.
    pub fn from_path(path: &str) -> Self {
        let (route, _) = split_path(path);
        match route {
            "/login" => Page::Login,
            "/signup" => Page::Signup,
            "/results" => match query_param(path, "artist") {
                Some(artist_id) if !artist_id.is_empty() => Page::Results { artist_id },
                _ => Page::Search,
            },
            _ => Page::Search,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Page::Search => "Search",
            Page::Login => "Log in",
            Page::Signup => "Sign up",
            Page::Results { .. } => "Results",
        }
    }

    pub fn results_path(artist_id: &str) -> String {
        format!("/results?artist={}", urlencoding::encode(artist_id))
    }
}

/// Overall application state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Normal,
    EditingSearch,
    EditingUnlockKey,
    ShowingHelp,
    ConfirmingQuit,
    Quitting,
}

// ============================================================================
// Background Task Results
// ============================================================================

/// Messages sent from spawned tasks back to the UI loop.
pub enum AppEvent {
    SearchResults {
        query: String,
        result: Result<Vec<Artist>, ApiError>,
    },
    Recommendations {
        artist_id: String,
        result: Result<RecommendationSummary, ApiError>,
    },
    LoginFinished {
        result: Result<Session, AuthError>,
        redirect: Option<String>,
    },
    SignupFinished {
        result: Result<Session, AuthError>,
        redirect: Option<String>,
    },
}

/// Navigator for form submissions on spawned tasks. It holds the redirect
/// so it travels back to the UI loop with the submission's result.
#[derive(Debug, Default)]
pub struct DeferredNavigator {
    path: Option<String>,
}

impl Navigator for DeferredNavigator {
    fn navigate(&mut self, path: &str) {
        self.path = Some(path.to_string());
    }
}

/// State of the recommendation panel for one artist.
#[derive(Debug, Clone, Default)]
pub struct RecommendationsView {
    pub summary: Option<CachedData<RecommendationSummary>>,
    pub loading: bool,
    pub error: Option<String>,
}

// ============================================================================
// Main Application Struct
// ============================================================================

pub struct App {
    // Core services
    pub config: Config,
    pub store: Arc<SessionStore<ApiClient>>,
    pub keys: FeatureKeys,
    pub cache: CacheManager,

    // Routing
    pub state: AppState,
    pub page: Page,
    pub current_path: String,
    /// Bumped whenever the page subtree is mounted afresh
    pub mount_generation: u64,
    /// Set by the UI loop after each draw
    pub page_failed: bool,

    /// Session snapshot taken once per tick
    pub session: Session,

    // Search page
    pub search_query: String,
    pub last_query: Option<String>,
    pub artists: Vec<Artist>,
    pub search_selection: usize,
    /// Artist shown on the results page, kept apart from later searches
    pub opened_artist: Option<Artist>,
    pub searching: bool,
    pub search_age: Option<String>,

    // Auth pages
    pub login_form: LoginForm,
    pub login_focus: usize,
    pub signup_form: SignupForm,
    pub signup_focus: usize,

    // Results page
    pub unlock_input: String,
    pub unlock_error: Option<String>,
    pub recommendations: HashMap<String, RecommendationsView>,

    // Background task channel
    events_rx: mpsc::Receiver<AppEvent>,
    events_tx: mpsc::Sender<AppEvent>,

    pub status_message: Option<String>,
}

impl App {
    pub fn new(
        config: Config,
        store: Arc<SessionStore<ApiClient>>,
        cache: CacheManager,
    ) -> Self {
        let keys = FeatureKeys::new(store.storage());
        let (tx, rx) = mpsc::channel(CHANNEL_BUFFER_SIZE);
        let session = store.current_session();

        let login_form = LoginForm::new(RedirectTarget::root())
            .with_email(config.last_email.clone().unwrap_or_default());

        let mut app = Self {
            config,
            store,
            keys,
            cache,

            state: AppState::Normal,
            page: Page::Search,
            current_path: ROOT_PATH.to_string(),
            mount_generation: 0,
            page_failed: false,

            session,

            search_query: String::new(),
            last_query: None,
            artists: Vec::new(),
            search_selection: 0,
            opened_artist: None,
            searching: false,
            search_age: None,

            login_form,
            login_focus: 0,
            signup_form: SignupForm::default(),
            signup_focus: 0,

            unlock_input: String::new(),
            unlock_error: None,
            recommendations: HashMap::new(),

            events_rx: rx,
            events_tx: tx,

            status_message: None,
        };
        app.load_from_cache();
        app
    }

    /// Restore the last search so the first screen is not empty.
    fn load_from_cache(&mut self) {
        match self.cache.load_last_search() {
            Ok(Some(cached)) => {
                self.search_age = Some(cached.age_display());
                self.search_query = cached.data.query.clone();
                self.last_query = Some(cached.data.query);
                self.artists = cached.data.artists;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Failed to load cached search"),
        }
    }

    // =========================================================================
    // Session & Access
    // =========================================================================

    /// Re-read the session; expiry is noticed here.
    pub fn refresh_session(&mut self) {
        let was_present = self.session.is_present();
        self.session = self.store.current_session();
        if was_present && !self.session.is_present() {
            self.status_message = Some("Session ended. Log in again to continue.".to_string());
        }
    }

    pub fn access(&self, feature: Feature) -> AccessDecision {
        feature.decide(&self.session, self.keys.is_unlocked(feature))
    }

    pub fn logout(&mut self) {
        self.store.logout();
        self.session = Session::anonymous();
        self.recommendations.clear();
        if let Err(e) = self.cache.clear_recommendations() {
            warn!(error = %e, "Failed to clear cached recommendations");
        }
        self.status_message = Some("Logged out".to_string());
        self.remount();
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    pub fn navigate(&mut self, path: &str) {
        let page = Page::from_path(path);
        debug!(path, page = page.title(), "Navigating");

        match page {
            Page::Login => {
                let redirect = RedirectTarget::from_query(path);
                let email = self.config.last_email.clone().unwrap_or_default();
                self.login_form = LoginForm::new(redirect).with_email(email);
                self.login_focus = if self.login_form.value(Field::Email).is_empty() { 0 } else { 1 };
            }
            Page::Signup => {
                self.signup_form = SignupForm::new(RedirectTarget::from_query(path));
                self.signup_focus = 0;
            }
            Page::Results { ref artist_id } => {
                let opened = self.artist(artist_id).cloned().or_else(|| {
                    self.opened_artist.take().filter(|a| a.id == *artist_id)
                });
                self.opened_artist = opened;
                self.unlock_input.clear();
                self.unlock_error = None;
                self.ensure_recommendations(artist_id, false);
            }
            Page::Search => {}
        }

        self.current_path = if page == Page::Search { ROOT_PATH.to_string() } else { path.to_string() };
        self.page = page;
        self.state = AppState::Normal;
        self.remount();
    }

    /// Send the user to log in, coming back to the current page afterwards.
    pub fn go_to_login(&mut self) {
        let path = RedirectTarget::login_path_for(&self.current_path);
        self.navigate(&path);
    }

    pub fn go_to_signup(&mut self) {
        let path = RedirectTarget::signup_path_for(&self.current_path);
        self.navigate(&path);
    }

    /// Swap between login and signup, keeping the redirect target.
    pub fn switch_auth_page(&mut self) {
        let path = match self.page {
            Page::Login => {
                RedirectTarget::signup_path_for(self.login_form.redirect().as_str())
            }
            Page::Signup => {
                RedirectTarget::login_path_for(self.signup_form.redirect().as_str())
            }
            _ => return,
        };
        self.navigate(&path);
    }

    /// Give the page a fresh error boundary on the next draw.
    pub fn remount(&mut self) {
        self.mount_generation = self.mount_generation.wrapping_add(1);
        self.page_failed = false;
    }

    pub fn selected_artist(&self) -> Option<&Artist> {
        self.artists.get(self.search_selection)
    }

    pub fn artist(&self, artist_id: &str) -> Option<&Artist> {
        self.artists.iter().find(|a| a.id == artist_id)
    }

    /// The artist the results page was opened for.
    pub fn opened_artist(&self, artist_id: &str) -> Option<&Artist> {
        self.opened_artist.as_ref().filter(|a| a.id == artist_id)
    }

    // =========================================================================
    // Search
    // =========================================================================

    pub fn push_query_char(&mut self, c: char) {
        if self.search_query.chars().count() < MAX_QUERY_LENGTH && !c.is_control() {
            self.search_query.push(c);
        }
    }

    pub fn start_search(&mut self) {
        let query = self.search_query.trim().to_string();
        if query.is_empty() {
            self.status_message = Some("Type an artist name to search".to_string());
            return;
        }
        if self.searching {
            return;
        }

        self.searching = true;
        self.status_message = Some(format!("Searching for \"{}\"...", query));

        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let result = store.provider().search_artists(&query).await;
            Self::send_event(&tx, AppEvent::SearchResults { query, result }).await;
        });
    }

    // =========================================================================
    // Recommendations
    // =========================================================================

    /// Show cached recommendations for `artist_id` and fetch fresh ones if
    /// needed. Does nothing unless the feature is granted.
    pub fn ensure_recommendations(&mut self, artist_id: &str, force: bool) {
        if self.access(Feature::Recommendations) != AccessDecision::Granted {
            return;
        }

        let view = self.recommendations.entry(artist_id.to_string()).or_default();
        if view.loading {
            return;
        }
        if view.summary.is_none() {
            match self.cache.load_recommendations(artist_id) {
                Ok(cached) => view.summary = cached,
                Err(e) => debug!(artist_id, error = %e, "Ignoring unreadable cached recommendations"),
            }
        }
        let fresh = view.summary.as_ref().is_some_and(|c| !c.is_stale());
        if fresh && !force {
            return;
        }

        let (token, api_key) = match (self.session.token(), self.keys.key(Feature::Recommendations)) {
            (Some(token), Ok(Some(key))) => (token.to_string(), key),
            (_, Err(e)) => {
                warn!(error = %e, "Failed to read unlock key");
                return;
            }
            _ => return,
        };

        view.loading = true;
        view.error = None;

        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        let artist_id = artist_id.to_string();
        tokio::spawn(async move {
            let result = store
                .provider()
                .fetch_recommendations(&artist_id, &token, &api_key)
                .await;
            Self::send_event(&tx, AppEvent::Recommendations { artist_id, result }).await;
        });
    }

    /// Store the typed unlock key. Returns true when the feature unlocked.
    pub fn submit_unlock_key(&mut self) -> bool {
        match self.keys.unlock(Feature::Recommendations, &self.unlock_input) {
            Ok(Ok(())) => {
                self.unlock_input.clear();
                self.unlock_error = None;
                self.state = AppState::Normal;
                self.status_message = Some("Recommendations unlocked".to_string());
                if let Page::Results { artist_id } = self.page.clone() {
                    self.ensure_recommendations(&artist_id, false);
                }
                true
            }
            Ok(Err(e)) => {
                self.unlock_error = Some(e.to_string());
                false
            }
            Err(e) => {
                warn!(error = %e, "Failed to store unlock key");
                self.unlock_error = Some("Could not save the key".to_string());
                false
            }
        }
    }

    pub fn push_unlock_char(&mut self, c: char) {
        if self.unlock_input.chars().count() < MAX_UNLOCK_KEY_LENGTH && !c.is_control() {
            self.unlock_input.push(c);
        }
    }

    pub fn forget_unlock_key(&mut self) {
        match self.keys.lock(Feature::Recommendations) {
            Ok(()) => self.status_message = Some("Unlock key removed".to_string()),
            Err(e) => warn!(error = %e, "Failed to remove unlock key"),
        }
    }

    // =========================================================================
    // Auth forms
    // =========================================================================

    pub fn submit_login(&mut self) {
        let submission = match self.login_form.begin_submit() {
            Ok(submission) => submission,
            Err(SubmitError::Busy) => return,
            Err(e) => {
                debug!(error = %e, "Login form invalid");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let mut navigator = DeferredNavigator::default();
            let result = submission.run(&*store, &mut navigator).await;
            let redirect = navigator.path;
            Self::send_event(&tx, AppEvent::LoginFinished { result, redirect }).await;
        });
    }

    pub fn submit_signup(&mut self) {
        let submission = match self.signup_form.begin_submit() {
            Ok(submission) => submission,
            Err(SubmitError::Busy) => return,
            Err(e) => {
                debug!(error = %e, "Signup form invalid");
                return;
            }
        };

        let store = Arc::clone(&self.store);
        let tx = self.events_tx.clone();
        tokio::spawn(async move {
            let mut navigator = DeferredNavigator::default();
            let result = submission.run(&*store, &mut navigator).await;
            let redirect = navigator.path;
            Self::send_event(&tx, AppEvent::SignupFinished { result, redirect }).await;
        });
    }

    fn on_authenticated(&mut self, session: &Session) {
        self.session = session.clone();
        if let Some(data) = session.data() {
            self.config.last_email = Some(data.email.clone());
            if let Err(e) = self.config.save() {
                warn!(error = %e, "Failed to save config");
            }
        }
        if let Some(name) = session.greeting_name() {
            self.status_message = Some(format!("Signed in as {}", name));
        }
        if let Page::Results { artist_id } = self.page.clone() {
            self.ensure_recommendations(&artist_id, false);
        }
    }

    // =========================================================================
    // Background tasks
    // =========================================================================

    async fn send_event(tx: &mpsc::Sender<AppEvent>, event: AppEvent) {
        if tx.send(event).await.is_err() {
            debug!("UI loop gone, dropping background result");
        }
    }

    /// Drain completed background work.
    pub fn check_background_tasks(&mut self) {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        for event in events {
            self.process_event(event);
        }
    }

    fn process_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::SearchResults { query, result } => {
                self.searching = false;
                match result {
                    Ok(artists) => {
                        if let Err(e) = self.cache.save_last_search(&query, &artists) {
                            warn!(error = %e, "Failed to cache search results");
                        }
                        self.status_message = Some(format!("{} artists found", artists.len()));
                        self.artists = artists;
                        self.search_selection = 0;
                        self.search_age = None;
                        self.last_query = Some(query);
                    }
                    Err(e) => {
                        warn!(error = %e, "Artist search failed");
                        self.status_message = Some(format!("Search failed: {}", e));
                    }
                }
            }
            AppEvent::Recommendations { artist_id, result } => {
                let view = self.recommendations.entry(artist_id.clone()).or_default();
                view.loading = false;
                match result {
                    Ok(summary) => {
                        if let Err(e) = self.cache.save_recommendations(&summary) {
                            warn!(error = %e, "Failed to cache recommendations");
                        }
                        view.summary = Some(CachedData::new(summary));
                        view.error = None;
                    }
                    Err(ApiError::Unauthorized) => {
                        info!("Token rejected while fetching recommendations");
                        self.logout();
                        self.status_message = Some("Your session has ended. Please log in again.".to_string());
                    }
                    Err(ApiError::AccessDenied(_)) => {
                        view.error = Some("The unlock key was rejected".to_string());
                        self.forget_unlock_key();
                    }
                    Err(e) => {
                        warn!(artist_id = %artist_id, error = %e, "Failed to fetch recommendations");
                        view.error = Some(e.to_string());
                    }
                }
            }
            AppEvent::LoginFinished { result, redirect } => {
                self.login_form.finish(&result);
                if let Ok(ref session) = result {
                    self.on_authenticated(session);
                }
                if let Some(path) = redirect {
                    self.navigate(&path);
                }
            }
            AppEvent::SignupFinished { result, redirect } => {
                self.signup_form.finish(&result);
                if let Ok(ref session) = result {
                    self.on_authenticated(session);
                }
                if let Some(path) = redirect {
                    self.navigate(&path);
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.store.shutdown();
        info!("App shut down");
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use recd_core::auth::{MemoryTokenStorage, SessionStore};

    use super::*;

    /// App against an unreachable API and throwaway storage.
    pub(crate) fn test_app(dir: &tempfile::TempDir) -> App {
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let store = Arc::new(SessionStore::new(api, Arc::new(MemoryTokenStorage::new())));
        let cache = CacheManager::new(dir.path().join("cache")).unwrap();
        App::new(Config::default(), store, cache)
    }

    pub(crate) fn artist(id: &str, name: &str) -> Artist {
        Artist {
            id: id.to_string(),
            name: name.to_string(),
            genres: vec!["indie".to_string()],
            image_url: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{artist, test_app};
    use super::*;

    #[test]
    fn test_page_from_path() {
        assert_eq!(Page::from_path("/"), Page::Search);
        assert_eq!(Page::from_path("/login?redirect=%2Fresults"), Page::Login);
        assert_eq!(Page::from_path("/signup"), Page::Signup);
        assert_eq!(
            Page::from_path("/results?artist=42"),
            Page::Results { artist_id: "42".to_string() }
        );
        assert_eq!(Page::from_path("/results"), Page::Search);
        assert_eq!(Page::from_path("/nowhere"), Page::Search);
    }

    #[test]
    fn test_results_path_round_trips() {
        let path = Page::results_path("a b/c");
        assert_eq!(path, "/results?artist=a%20b%2Fc");
        assert_eq!(
            Page::from_path(&path),
            Page::Results { artist_id: "a b/c".to_string() }
        );
    }

    #[tokio::test]
    async fn test_anonymous_results_page_needs_auth() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/results?artist=42");

        assert_eq!(app.access(Feature::Recommendations), AccessDecision::LockedNeedsAuth);
        assert!(app.recommendations.is_empty());

        app.go_to_login();
        assert_eq!(app.page, Page::Login);
        assert_eq!(app.login_form.redirect().as_str(), "/results?artist=42");
    }

    #[tokio::test]
    async fn test_switch_auth_page_keeps_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/login?redirect=%2Fresults%3Fartist%3D7");

        app.switch_auth_page();
        assert_eq!(app.page, Page::Signup);
        assert_eq!(app.signup_form.redirect().as_str(), "/results?artist=7");

        app.switch_auth_page();
        assert_eq!(app.page, Page::Login);
        assert_eq!(app.login_form.redirect().as_str(), "/results?artist=7");
    }

    #[tokio::test]
    async fn test_navigation_remounts_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        let before = app.mount_generation;
        app.page_failed = true;

        app.navigate("/signup");
        assert_ne!(app.mount_generation, before);
        assert!(!app.page_failed);
    }

    #[tokio::test]
    async fn test_login_redirect_survives_a_full_channel() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/login?redirect=%2Fresults%3Fartist%3D9");

        for _ in 0..CHANNEL_BUFFER_SIZE {
            app.events_tx
                .try_send(AppEvent::SearchResults {
                    query: "x".to_string(),
                    result: Ok(Vec::new()),
                })
                .unwrap();
        }

        let mut navigator = DeferredNavigator::default();
        navigator.navigate("/results?artist=9");
        let tx = app.events_tx.clone();
        let send = tokio::spawn(async move {
            App::send_event(
                &tx,
                AppEvent::LoginFinished {
                    result: Err(AuthError::InvalidCredentials),
                    redirect: navigator.path,
                },
            )
            .await;
        });

        app.check_background_tasks();
        send.await.unwrap();
        app.check_background_tasks();

        assert_eq!(app.page, Page::Results { artist_id: "9".to_string() });
        assert_eq!(app.current_path, "/results?artist=9");
    }

    #[tokio::test]
    async fn test_results_page_keeps_artist_after_new_search() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.artists = vec![artist("42", "Phoebe Bridgers")];
        app.navigate("/results?artist=42");

        app.process_event(AppEvent::SearchResults {
            query: "boy".to_string(),
            result: Ok(vec![artist("7", "Boygenius")]),
        });
        assert!(app.artist("42").is_none());
        assert_eq!(app.opened_artist("42").map(|a| a.name.as_str()), Some("Phoebe Bridgers"));

        // A round trip through login keeps it too.
        app.go_to_login();
        app.navigate("/results?artist=42");
        assert_eq!(app.opened_artist("42").map(|a| a.name.as_str()), Some("Phoebe Bridgers"));
    }

    #[tokio::test]
    async fn test_search_results_are_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.searching = true;

        app.process_event(AppEvent::SearchResults {
            query: "phoebe".to_string(),
            result: Ok(vec![artist("42", "Phoebe Bridgers")]),
        });
        assert!(!app.searching);
        assert_eq!(app.artists.len(), 1);

        let restored = test_app(&dir);
        assert_eq!(restored.last_query.as_deref(), Some("phoebe"));
        assert_eq!(restored.artists[0].name, "Phoebe Bridgers");
    }

    #[tokio::test]
    async fn test_unlock_key_validation_shown_inline() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.unlock_input = "short".to_string();

        assert!(!app.submit_unlock_key());
        assert!(app.unlock_error.is_some());
        assert!(!app.keys.is_unlocked(Feature::Recommendations));

        app.unlock_input = "rk_live_0123456789abcdef".to_string();
        assert!(app.submit_unlock_key());
        assert!(app.keys.is_unlocked(Feature::Recommendations));
        assert!(app.unlock_input.is_empty());
    }

    #[tokio::test]
    async fn test_unlocked_feature_granted_without_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.unlock_input = "rk_live_0123456789abcdef".to_string();
        app.submit_unlock_key();

        assert_eq!(app.access(Feature::Recommendations), AccessDecision::Granted);
    }
}
