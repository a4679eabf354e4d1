use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use recd_core::boundary::RenderError;
use recd_core::utils::truncate_string;

use crate::app::{App, AppState};
use crate::ui::styles;

const NAME_WIDTH: usize = 32;

pub fn render(frame: &mut Frame, app: &App, area: Rect) -> Result<(), RenderError> {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(area);

    render_search_box(frame, app, chunks[0]);
    render_results(frame, app, chunks[1]);
    Ok(())
}

fn render_search_box(frame: &mut Frame, app: &App, area: Rect) {
    let editing = app.state == AppState::EditingSearch;
    let cursor = if editing { "▌" } else { "" };

    let line = if app.search_query.is_empty() && !editing {
        Line::from(Span::styled(
            " Press / to search for an artist",
            styles::muted_style(),
        ))
    } else {
        Line::from(vec![
            Span::styled(" ", styles::search_style()),
            Span::styled(format!("{}{}", app.search_query, cursor), styles::search_style()),
        ])
    };

    let block = Block::default()
        .title(" Artist ")
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(editing));

    frame.render_widget(Paragraph::new(line).block(block), area);
}

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let mut title = match app.last_query {
        Some(ref query) => format!(" Results for \"{}\" ({}) ", query, app.artists.len()),
        None => " Results ".to_string(),
    };
    if let Some(ref age) = app.search_age {
        title.push_str(&format!("· cached {} ", age));
    }
    if app.searching {
        title.push_str("· searching... ");
    }

    let block = Block::default()
        .title(title)
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(app.state == AppState::Normal));

    if app.artists.is_empty() {
        let hint = if app.last_query.is_some() {
            "  No artists matched."
        } else {
            "  Search results will show up here."
        };
        let paragraph = Paragraph::new(Line::from(Span::styled(hint, styles::muted_style())))
            .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .artists
        .iter()
        .enumerate()
        .map(|(i, artist)| {
            let line = Line::from(vec![
                Span::raw(format!(
                    " {:<width$} ",
                    truncate_string(&artist.name, NAME_WIDTH),
                    width = NAME_WIDTH
                )),
                Span::styled(artist.genre_line(), styles::muted_style()),
            ]);

            let style = if i == app.search_selection {
                styles::selected_style()
            } else {
                styles::list_item_style()
            };

            ListItem::new(line).style(style)
        })
        .collect();

    let list = List::new(items).block(block);

    let mut state = ListState::default();
    state.select(Some(app.search_selection));

    frame.render_stateful_widget(list, area, &mut state);
}
