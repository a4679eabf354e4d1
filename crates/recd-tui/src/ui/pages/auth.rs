use ratatui::{
    layout::Rect,
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};

use recd_core::boundary::RenderError;
use recd_core::forms::{Field, FormErrors, LoginForm, SignupForm};

use crate::app::App;
use crate::ui::render::centered_rect_fixed;
use crate::ui::styles;

/// Visible width of a text field
const FIELD_WIDTH: usize = 28;

const FORM_WIDTH: u16 = 52;

pub fn render_login(frame: &mut Frame, app: &App, area: Rect) -> Result<(), RenderError> {
    let form = &app.login_form;
    let lines = form_lines(
        &LoginForm::FIELDS,
        |field| form.value(field),
        form.errors(),
        app.login_focus,
        form.is_submitting(),
        "Log in",
        "No account yet? Ctrl+S to sign up",
    );
    render_form(frame, area, " Log in ", lines);
    Ok(())
}

pub fn render_signup(frame: &mut Frame, app: &App, area: Rect) -> Result<(), RenderError> {
    let form = &app.signup_form;
    let lines = form_lines(
        &SignupForm::FIELDS,
        |field| form.value(field),
        form.errors(),
        app.signup_focus,
        form.is_submitting(),
        "Create account",
        "Already registered? Ctrl+S to log in",
    );
    render_form(frame, area, " Sign up ", lines);
    Ok(())
}

fn render_form(frame: &mut Frame, area: Rect, title: &str, lines: Vec<Line<'static>>) {
    let height = lines.len() as u16 + 2;
    let area = centered_rect_fixed(FORM_WIDTH, height, area);
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(title.to_string())
        .title_style(styles::title_style())
        .borders(Borders::ALL)
        .border_style(styles::border_style(true));

    frame.render_widget(
        Paragraph::new(lines).block(block).wrap(Wrap { trim: false }),
        area,
    );
}

/// Field rows with inline errors, the submit button and any auth error.
fn form_lines<'a>(
    fields: &[Field],
    value: impl Fn(Field) -> &'a str,
    errors: &FormErrors,
    focus: usize,
    submitting: bool,
    button: &str,
    footer: &str,
) -> Vec<Line<'static>> {
    let mut lines = vec![Line::from("")];

    for (i, field) in fields.iter().copied().enumerate() {
        let focused = focus == i;
        let raw = value(field);
        let shown = if field.is_secret() {
            "*".repeat(raw.chars().count())
        } else {
            raw.to_string()
        };
        // Keep the tail visible while typing past the box width
        let skip = shown.chars().count().saturating_sub(FIELD_WIDTH);
        let visible: String = shown.chars().skip(skip).collect();
        let cursor = if focused { "▌" } else { "" };

        lines.push(Line::from(vec![
            Span::styled(format!("  {:>16}: [", field.label()), styles::muted_style()),
            Span::styled(
                format!("{:<width$}", format!("{}{}", visible, cursor), width = FIELD_WIDTH),
                styles::field_style(focused),
            ),
            Span::styled("]", styles::muted_style()),
        ]));

        if let Some(err) = errors.field(field) {
            lines.push(Line::from(Span::styled(
                format!("{:>20}{}", "", err),
                styles::error_style(),
            )));
        }
    }

    lines.push(Line::from(""));
    let button_focused = focus == fields.len();
    let label = if submitting {
        "Working...".to_string()
    } else if button_focused {
        format!("▶ {} ◀", button)
    } else {
        button.to_string()
    };
    lines.push(Line::from(vec![
        Span::raw(format!("{:>18}[ ", "")),
        Span::styled(label, styles::field_style(button_focused)),
        Span::raw(" ]"),
    ]));

    if let Some(err) = errors.auth() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("  {}", err.user_message()),
            styles::error_style(),
        )));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        format!("  {}", footer),
        styles::muted_style(),
    )));
    lines
}

#[cfg(test)]
mod tests {
    use recd_core::auth::AuthError;

    use super::*;

    fn text(lines: &[Line]) -> String {
        lines
            .iter()
            .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_secret_fields_are_masked() {
        let mut form = LoginForm::default().with_email("fan@example.com");
        for c in "hunter22".chars() {
            form.push_char(Field::Password, c);
        }
        let lines = form_lines(
            &LoginForm::FIELDS,
            |f| form.value(f),
            form.errors(),
            1,
            false,
            "Log in",
            "",
        );
        let rendered = text(&lines);
        assert!(rendered.contains("fan@example.com"));
        assert!(rendered.contains("********"));
        assert!(!rendered.contains("hunter22"));
    }

    #[test]
    fn test_errors_shown_inline() {
        let mut form = LoginForm::default().with_email("nope");
        assert!(form.begin_submit().is_err());
        form.finish(&Err(AuthError::InvalidCredentials));

        let lines = form_lines(
            &LoginForm::FIELDS,
            |f| form.value(f),
            form.errors(),
            0,
            false,
            "Log in",
            "",
        );
        let rendered = text(&lines);
        assert!(rendered.contains("Enter a valid email address"));
        assert!(rendered.contains("Password is required"));
        assert!(rendered.contains(&AuthError::InvalidCredentials.user_message()));
    }
}
