//! Rec'd TUI - search for artists and read what they're listening to.
//!
//! A keyboard-driven front end for the Rec'd API. Recommendations are
//! gated behind a login and an unlock key; everything else is public.

mod app;
mod ui;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recd_core::auth::{MemoryTokenStorage, SessionStore, TokenStorage};
use recd_core::boundary::{ErrorBoundary, TracingReporter};
use recd_core::cache::CacheManager;
use recd_core::{ApiClient, Config};

use app::{App, AppState};
use ui::input::handle_input;
use ui::render::render;

// ============================================================================
// Constants
// ============================================================================

/// Timeout for polling terminal events (in milliseconds)
const EVENT_POLL_TIMEOUT_MS: u64 = 100;

/// Prefix of the daily log file in the cache directory
const LOG_FILE_PREFIX: &str = "recd.log";

const USAGE: &str = "\
Usage: recd [OPTIONS]

Options:
  --ephemeral   Keep the session in memory only
  -h, --help    Print this help

Environment:
  RECD_API_URL  Base URL of the Rec'd API
  RUST_LOG      Log filter (default: warn)";

/// Initialize the tracing subscriber. Logs go to a daily file because the
/// terminal belongs to the UI.
fn init_tracing(log_dir: &Path) -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .init();

    guard
}

/// Send panic messages to the log instead of the alternate screen.
fn install_panic_hook() {
    std::panic::set_hook(Box::new(|panic_info| {
        let location = panic_info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_default();
        error!(location = %location, "Panic: {}", panic_info);
    }));
}

/// Restores the terminal when dropped, including on early returns.
struct TerminalGuard;

impl TerminalGuard {
    fn enter() -> Result<Self> {
        enable_raw_mode()?;
        execute!(io::stdout(), EnterAlternateScreen)?;
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!(error = %e, "Failed to disable raw mode");
        }
        if let Err(e) = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show) {
            warn!(error = %e, "Failed to leave alternate screen");
        }
    }
}

struct Options {
    ephemeral: bool,
}

fn parse_args() -> Option<Options> {
    let mut options = Options { ephemeral: false };
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--ephemeral" => options.ephemeral = true,
            "-h" | "--help" => return None,
            other => {
                eprintln!("Unknown option: {}\n\n{}", other, USAGE);
                std::process::exit(2);
            }
        }
    }
    Some(options)
}

fn open_storage(config: &Config, ephemeral: bool) -> Arc<dyn TokenStorage> {
    if ephemeral {
        info!("Using in-memory token storage");
        return Arc::new(MemoryTokenStorage::new());
    }
    match config.token_storage() {
        Ok(storage) => storage,
        Err(e) => {
            warn!(error = %e, "Token storage unavailable, session will not persist");
            Arc::new(MemoryTokenStorage::new())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let Some(options) = parse_args() else {
        println!("{}", USAGE);
        return Ok(());
    };

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: ignoring unreadable config: {}", e);
            Config::default()
        }
    };
    let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
    std::fs::create_dir_all(&cache_dir)?;

    // Initialize logging
    let _log_guard = init_tracing(&cache_dir);
    install_panic_hook();
    info!("Rec'd starting");

    let storage = open_storage(&config, options.ephemeral);
    let api = ApiClient::new(config.api_base_url())?;
    info!(base_url = api.base_url(), "Using API");

    let store = Arc::new(SessionStore::init(api, storage));
    let cache = CacheManager::new(cache_dir)?;
    let mut app = App::new(config, store, cache);

    let result = {
        let _terminal_guard = TerminalGuard::enter()?;
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;
        run_app(&mut terminal, &mut app).await
    };

    app.shutdown();

    if let Err(e) = result {
        error!(error = %e, "UI loop failed");
        eprintln!("Error: {}", e);
    }

    info!("Rec'd shutting down");
    Ok(())
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut boundary = ErrorBoundary::new("page", TracingReporter);
    let mut mounted = app.mount_generation;

    loop {
        // Notice expiry before anything reads the session
        app.refresh_session();

        // A new page or a reload gets a fresh boundary
        if app.mount_generation != mounted {
            boundary = boundary.remount();
            mounted = app.mount_generation;
        }

        // Draw UI
        terminal.draw(|f| render(f, app, &mut boundary))?;
        app.page_failed = boundary.is_failed();

        // Poll for events with timeout to allow background updates
        if event::poll(Duration::from_millis(EVENT_POLL_TIMEOUT_MS))? {
            if let Event::Key(key) = event::read()? {
                // Ctrl+C to quit
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
                    return Ok(());
                }

                // Handle input
                if key.kind == KeyEventKind::Press && handle_input(app, key) {
                    return Ok(());
                }
            }
        }

        // Check for completed background tasks
        app.check_background_tasks();

        // Check if we should quit
        if matches!(app.state, AppState::Quitting) {
            return Ok(());
        }
    }
}
