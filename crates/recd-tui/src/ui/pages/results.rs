use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use recd_core::boundary::RenderError;
use recd_core::gate::{AccessDecision, Feature};
use recd_core::utils::{format_date, format_optional, mask_secret};

use crate::app::{App, AppState, RecommendationsView};
use crate::ui::styles;

pub fn render(frame: &mut Frame, app: &App, artist_id: &str, area: Rect) -> Result<(), RenderError> {
    let view = app.recommendations.get(artist_id);
    let artist = app.opened_artist(artist_id);
    let name = match (artist, view.and_then(|v| v.summary.as_ref())) {
        (Some(artist), _) => artist.name.clone(),
        (None, Some(_)) => format!("Artist {}", artist_id),
        (None, None) => {
            return Err(RenderError::msg(format!("No artist with id {}", artist_id)));
        }
    };
    let genres = artist.map(|a| a.genre_line()).unwrap_or_default();

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(4)])
        .split(area);

    let header = vec![
        Line::from(Span::styled(format!(" {}", name), styles::title_style())),
        Line::from(Span::styled(format!(" {}", genres), styles::muted_style())),
    ];
    frame.render_widget(
        Paragraph::new(header).block(Block::default().borders(Borders::ALL).border_style(styles::muted_style())),
        chunks[0],
    );

    let feature = Feature::Recommendations;
    let lines = match app.access(feature) {
        AccessDecision::LockedNeedsAuth => auth_prompt(&name),
        AccessDecision::LockedNeedsKey => key_prompt(app),
        AccessDecision::Granted => summary_lines(app, view),
    };

    let block = Block::default()
        .title(format!(" {} ", feature.display_name()))
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        chunks[1],
    );
    Ok(())
}

fn auth_prompt(name: &str) -> Vec<Line<'static>> {
    vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("  Log in to see what {} is listening to.", name),
            styles::highlight_style(),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("  [l]", styles::help_key_style()),
            Span::styled(" Log in    ", styles::help_desc_style()),
            Span::styled("[s]", styles::help_key_style()),
            Span::styled(" Sign up", styles::help_desc_style()),
        ]),
    ]
}

fn key_prompt(app: &App) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled(
            "  Recommendations need an API key.",
            styles::highlight_style(),
        )),
        Line::from(""),
    ];

    if app.state == AppState::EditingUnlockKey {
        lines.push(Line::from(vec![
            Span::styled("  Key: [", styles::muted_style()),
            Span::styled(format!("{}▌", mask_secret(&app.unlock_input)), styles::field_style(true)),
            Span::styled("]", styles::muted_style()),
        ]));
    } else {
        lines.push(Line::from(vec![
            Span::styled("  [k]", styles::help_key_style()),
            Span::styled(" Enter your key", styles::help_desc_style()),
        ]));
    }

    if let Some(ref err) = app.unlock_error {
        lines.push(Line::from(Span::styled(format!("  {}", err), styles::error_style())));
    }
    lines
}

fn summary_lines(app: &App, view: Option<&RecommendationsView>) -> Vec<Line<'static>> {
    if !app.session.is_present() {
        return vec![
            Line::from(""),
            Line::from(Span::styled(
                "  Your key is saved. Log in to load recommendations.",
                styles::muted_style(),
            )),
        ];
    }

    let mut lines = vec![Line::from("")];
    let Some(view) = view else {
        lines.push(Line::from(Span::styled(
            "  Press r to load recommendations.",
            styles::muted_style(),
        )));
        return lines;
    };

    match view.summary {
        Some(ref cached) => {
            let summary = &cached.data;
            lines.push(Line::from(format!("  {}", summary.summary)));
            lines.push(Line::from(""));

            for rec in &summary.recommendations {
                lines.push(Line::from(vec![
                    Span::styled("  • ", styles::highlight_style()),
                    Span::styled(rec.title(), styles::list_item_style()),
                ]));
                if let Some(ref reason) = rec.reason {
                    lines.push(Line::from(Span::styled(format!("    {}", reason), styles::muted_style())));
                }
            }

            lines.push(Line::from(""));
            let generated = summary
                .generated_at
                .as_ref()
                .map(format_date);
            lines.push(Line::from(Span::styled(
                format!(
                    "  Generated {} · fetched {}",
                    format_optional(generated.as_deref(), "recently"),
                    cached.age_display()
                ),
                styles::muted_style(),
            )));
        }
        None if view.loading => {
            lines.push(Line::from(Span::styled("  Loading...", styles::muted_style())));
        }
        None => {}
    }

    if view.loading && view.summary.is_some() {
        lines.push(Line::from(Span::styled("  Refreshing...", styles::muted_style())));
    }
    if let Some(ref err) = view.error {
        lines.push(Line::from(Span::styled(format!("  {}", err), styles::error_style())));
    }
    if view.summary.is_none() && !view.loading && view.error.is_none() {
        lines.push(Line::from(Span::styled(
            "  Press r to load recommendations.",
            styles::muted_style(),
        )));
    }

    lines
}
