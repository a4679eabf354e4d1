use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::Style,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use recd_core::boundary::{ErrorBoundary, ErrorReporter, ErrorSnapshot, RenderError, Rendered};
use recd_core::utils::format_remaining;

use crate::app::{App, AppState, Page};

use super::pages::{auth, results, search};
use super::styles;

const LOGO: &str = "  Rec'd";

pub fn render<R: ErrorReporter>(frame: &mut Frame, app: &App, boundary: &mut ErrorBoundary<R>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2), // Title bar
            Constraint::Min(8),    // Page
            Constraint::Length(1), // Status bar
        ])
        .split(frame.area());

    render_title_bar(frame, app, chunks[0]);

    let area = chunks[1];
    if let Rendered::Fallback(snapshot) = boundary.render(|| render_page(frame, app, area)) {
        render_fallback(frame, snapshot, area);
    }

    render_status_bar(frame, app, chunks[2]);

    // Render overlays
    if matches!(app.state, AppState::ShowingHelp) {
        render_help_overlay(frame);
    }

    if matches!(app.state, AppState::ConfirmingQuit) {
        render_quit_overlay(frame);
    }
}

fn render_page(frame: &mut Frame, app: &App, area: Rect) -> Result<(), RenderError> {
    match app.page {
        Page::Search => search::render(frame, app, area),
        Page::Login => auth::render_login(frame, app, area),
        Page::Signup => auth::render_signup(frame, app, area),
        Page::Results { ref artist_id } => results::render(frame, app, artist_id, area),
    }
}

fn render_title_bar(frame: &mut Frame, app: &App, area: Rect) {
    let account = match app.session.data() {
        Some(data) => format!(
            "{} · {} left",
            app.session.greeting_name().unwrap_or_default(),
            format_remaining(data.minutes_until_expiry())
        ),
        None => "Not signed in".to_string(),
    };
    let account_style = if app.session.is_present() {
        styles::success_style()
    } else {
        styles::muted_style()
    };
    let help = "  [?] Help ";
    let right_len = account.chars().count() + help.chars().count();
    let title = format!("{} · {}", LOGO, app.page.title());

    let padding = (area.width as usize)
        .saturating_sub(title.chars().count() + right_len);

    let title_line = Line::from(vec![
        Span::styled(title, styles::title_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(account, account_style),
        Span::styled(help, styles::muted_style()),
    ]);

    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(styles::muted_style());

    frame.render_widget(Paragraph::new(title_line).block(block), area);
}

fn render_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let hint = match (app.page.clone(), app.state) {
        (_, AppState::EditingSearch) => "Enter search · Esc cancel",
        (_, AppState::EditingUnlockKey) => "Enter unlock · Esc cancel",
        (_, _) if app.page_failed => "[r]eload · Esc home",
        (Page::Search, _) => "[/] search · ↑/↓ select · Enter open · [l]ogin · [q]uit",
        (Page::Login, _) | (Page::Signup, _) => "Tab next · Enter submit · Ctrl+S switch · Esc back",
        (Page::Results { .. }, _) => "Esc back · [r]efresh · [k]ey · [l]ogin · [o] logout",
    };

    let left = match app.status_message {
        Some(ref msg) => format!(" {} ", msg),
        None => String::new(),
    };
    let right = format!(" {} ", hint);

    let padding = (area.width as usize)
        .saturating_sub(left.chars().count())
        .saturating_sub(right.chars().count());

    let status_line = Line::from(vec![
        Span::styled(left, styles::muted_style()),
        Span::raw(" ".repeat(padding)),
        Span::styled(right, styles::muted_style()),
    ]);
    frame.render_widget(
        Paragraph::new(status_line).style(styles::status_bar_style()),
        area,
    );
}

fn render_fallback(frame: &mut Frame, snapshot: &ErrorSnapshot, area: Rect) {
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Something went wrong showing this page.",
            styles::error_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Error: ", styles::muted_style()),
            Span::raw(snapshot.error.to_string()),
        ]),
        Line::from(vec![
            Span::styled("  At:    ", styles::muted_style()),
            Span::raw(snapshot.info.occurred_at.format("%H:%M:%S UTC").to_string()),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("  Press ", styles::muted_style()),
            Span::styled("r", styles::help_key_style()),
            Span::styled(" to reload or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to go back to search", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .title(" Error ")
        .title_style(styles::error_style())
        .borders(Borders::ALL)
        .border_style(styles::error_style());

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

fn help_line(key: &'static str, desc: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<10}", key), styles::help_key_style()),
        Span::styled(desc, styles::help_desc_style()),
    ])
}

fn render_help_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(52, 22, frame.area());
    frame.render_widget(Clear, area);

    let version = env!("CARGO_PKG_VERSION");

    let help_text = vec![
        Line::from(Span::styled(LOGO, styles::title_style())),
        Line::from(Span::styled(
            format!("  version {}", version),
            styles::muted_style(),
        )),
        Line::from(""),
        Line::from(Span::styled(" Search", styles::highlight_style())),
        help_line("/", "Type an artist name"),
        help_line("↑/↓", "Select an artist"),
        help_line("Enter", "Open recommendations"),
        Line::from(""),
        Line::from(Span::styled(" Account", styles::highlight_style())),
        help_line("l / s", "Log in / sign up"),
        help_line("o", "Log out"),
        help_line("k", "Enter an unlock key"),
        help_line("x", "Forget the unlock key"),
        Line::from(""),
        help_line("Esc", "Go back"),
        help_line("q", "Quit"),
        Line::from(""),
        Line::from(vec![
            Span::styled("       Press ", styles::muted_style()),
            Span::styled("?", styles::help_key_style()),
            Span::styled(" or ", styles::muted_style()),
            Span::styled("Esc", styles::help_key_style()),
            Span::styled(" to close", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(help_text).block(block), area);
}

fn render_quit_overlay(frame: &mut Frame) {
    let area = centered_rect_fixed(40, 6, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "   Are you sure you want to quit?",
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("   Press ", styles::muted_style()),
            Span::styled("[Y]", styles::help_key_style()),
            Span::styled(" to quit, ", styles::muted_style()),
            Span::styled("[N]", styles::help_key_style()),
            Span::styled(" to cancel", styles::muted_style()),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(styles::border_style(true))
        .style(Style::default());

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Create a centered rectangle with fixed dimensions
pub fn centered_rect_fixed(width: u16, height: u16, r: Rect) -> Rect {
    let x = r.x + (r.width.saturating_sub(width)) / 2;
    let y = r.y + (r.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(r.width), height.min(r.height))
}
