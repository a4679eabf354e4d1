//! Keyboard input handling for the TUI.
//!
//! This module handles all keyboard events and translates them into
//! application state changes.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use recd_core::forms::{Field, LoginForm, SignupForm};
use recd_core::gate::{AccessDecision, Feature};

use crate::app::{App, AppState, Page};

/// The parts of a form the key handler needs.
trait FormInput {
    fn fields(&self) -> &'static [Field];
    fn push_char(&mut self, field: Field, c: char) -> bool;
    fn pop_char(&mut self, field: Field);
}

impl FormInput for LoginForm {
    fn fields(&self) -> &'static [Field] {
        &LoginForm::FIELDS
    }
    fn push_char(&mut self, field: Field, c: char) -> bool {
        LoginForm::push_char(self, field, c)
    }
    fn pop_char(&mut self, field: Field) {
        LoginForm::pop_char(self, field)
    }
}

impl FormInput for SignupForm {
    fn fields(&self) -> &'static [Field] {
        &SignupForm::FIELDS
    }
    fn push_char(&mut self, field: Field, c: char) -> bool {
        SignupForm::push_char(self, field, c)
    }
    fn pop_char(&mut self, field: Field) {
        SignupForm::pop_char(self, field)
    }
}

enum FormAction {
    None,
    Submit,
    Back,
    Switch,
}

/// Handle keyboard input. Returns true if the app should quit.
pub fn handle_input(app: &mut App, key: KeyEvent) -> bool {
    match app.state {
        AppState::ShowingHelp => {
            if matches!(key.code, KeyCode::Esc | KeyCode::Char('?') | KeyCode::Char('q')) {
                app.state = AppState::Normal;
            }
            false
        }
        AppState::ConfirmingQuit => match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
                app.state = AppState::Quitting;
                true
            }
            KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
                app.state = AppState::Normal;
                false
            }
            _ => false,
        },
        AppState::EditingSearch => {
            handle_search_input(app, key);
            false
        }
        AppState::EditingUnlockKey => {
            handle_unlock_input(app, key);
            false
        }
        AppState::Quitting => true,
        AppState::Normal => handle_page_input(app, key),
    }
}

fn handle_page_input(app: &mut App, key: KeyEvent) -> bool {
    if app.page_failed {
        match key.code {
            KeyCode::Char('r') => app.remount(),
            KeyCode::Esc => app.navigate("/"),
            KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
            _ => {}
        }
        return false;
    }

    match app.page.clone() {
        Page::Login => {
            let action = handle_form_input(&mut app.login_form, &mut app.login_focus, key);
            match action {
                FormAction::Submit => app.submit_login(),
                FormAction::Back => {
                    let back = app.login_form.redirect().as_str().to_string();
                    app.navigate(&back);
                }
                FormAction::Switch => app.switch_auth_page(),
                FormAction::None => {}
            }
            false
        }
        Page::Signup => {
            let action = handle_form_input(&mut app.signup_form, &mut app.signup_focus, key);
            match action {
                FormAction::Submit => app.submit_signup(),
                FormAction::Back => {
                    let back = app.signup_form.redirect().as_str().to_string();
                    app.navigate(&back);
                }
                FormAction::Switch => app.switch_auth_page(),
                FormAction::None => {}
            }
            false
        }
        Page::Search => {
            handle_search_page(app, key);
            false
        }
        Page::Results { artist_id } => {
            handle_results_page(app, &artist_id, key);
            false
        }
    }
}

/// Keys shared by the search and results pages. Returns true if handled.
fn handle_common_keys(app: &mut App, key: KeyEvent) -> bool {
    match key.code {
        KeyCode::Char('?') => app.state = AppState::ShowingHelp,
        KeyCode::Char('q') => app.state = AppState::ConfirmingQuit,
        KeyCode::Char('l') if !app.session.is_present() => app.go_to_login(),
        KeyCode::Char('s') if !app.session.is_present() => app.go_to_signup(),
        KeyCode::Char('o') if app.session.is_present() => app.logout(),
        KeyCode::Char('x') => app.forget_unlock_key(),
        _ => return false,
    }
    true
}

fn handle_search_page(app: &mut App, key: KeyEvent) {
    if handle_common_keys(app, key) {
        return;
    }
    match key.code {
        KeyCode::Char('/') => app.state = AppState::EditingSearch,
        KeyCode::Up | KeyCode::Char('k') => {
            app.search_selection = app.search_selection.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            if app.search_selection + 1 < app.artists.len() {
                app.search_selection += 1;
            }
        }
        KeyCode::Enter => {
            if let Some(artist) = app.selected_artist() {
                let path = Page::results_path(&artist.id);
                app.navigate(&path);
            }
        }
        _ => {}
    }
}

fn handle_results_page(app: &mut App, artist_id: &str, key: KeyEvent) {
    if handle_common_keys(app, key) {
        return;
    }
    match key.code {
        KeyCode::Esc | KeyCode::Backspace => app.navigate("/"),
        KeyCode::Char('r') => app.ensure_recommendations(artist_id, true),
        KeyCode::Char('k') => {
            if app.access(Feature::Recommendations) == AccessDecision::LockedNeedsKey {
                app.unlock_error = None;
                app.state = AppState::EditingUnlockKey;
            }
        }
        _ => {}
    }
}

fn handle_search_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => app.state = AppState::Normal,
        KeyCode::Enter => {
            app.state = AppState::Normal;
            app.start_search();
        }
        KeyCode::Backspace => {
            app.search_query.pop();
        }
        KeyCode::Char(c) => app.push_query_char(c),
        _ => {}
    }
}

fn handle_unlock_input(app: &mut App, key: KeyEvent) {
    match key.code {
        KeyCode::Esc => {
            app.unlock_input.clear();
            app.unlock_error = None;
            app.state = AppState::Normal;
        }
        KeyCode::Enter => {
            app.submit_unlock_key();
        }
        KeyCode::Backspace => {
            app.unlock_input.pop();
        }
        KeyCode::Char(c) => app.push_unlock_char(c),
        _ => {}
    }
}

/// Field navigation and editing. `focus` ranges over the fields plus the
/// submit button after them.
fn handle_form_input<F: FormInput>(form: &mut F, focus: &mut usize, key: KeyEvent) -> FormAction {
    let fields = form.fields();
    let stops = fields.len() + 1;

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('s') => FormAction::Switch,
            _ => FormAction::None,
        };
    }

    match key.code {
        KeyCode::Esc => return FormAction::Back,
        KeyCode::Tab | KeyCode::Down => *focus = (*focus + 1) % stops,
        KeyCode::BackTab | KeyCode::Up => *focus = (*focus + stops - 1) % stops,
        KeyCode::Enter => {
            if *focus + 1 < fields.len() {
                *focus += 1;
            } else {
                return FormAction::Submit;
            }
        }
        KeyCode::Backspace => {
            if let Some(&field) = fields.get(*focus) {
                form.pop_char(field);
            }
        }
        KeyCode::Char(c) => {
            if let Some(&field) = fields.get(*focus) {
                form.push_char(field, c);
            }
        }
        _ => {}
    }
    FormAction::None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::testing::{artist, test_app};

    fn press(app: &mut App, code: KeyCode) -> bool {
        handle_input(app, KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_form_focus_cycles_through_button() {
        let mut form = LoginForm::default();
        let mut focus = 0;
        let tab = KeyEvent::new(KeyCode::Tab, KeyModifiers::NONE);
        let back = KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT);

        handle_form_input(&mut form, &mut focus, tab);
        assert_eq!(focus, 1);
        handle_form_input(&mut form, &mut focus, tab);
        assert_eq!(focus, 2);
        handle_form_input(&mut form, &mut focus, tab);
        assert_eq!(focus, 0);
        handle_form_input(&mut form, &mut focus, back);
        assert_eq!(focus, 2);
    }

    #[test]
    fn test_typing_goes_to_focused_field() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/login");

        type_str(&mut app, "fan@example.com");
        press(&mut app, KeyCode::Tab);
        type_str(&mut app, "pw");
        press(&mut app, KeyCode::Backspace);

        assert_eq!(app.login_form.value(Field::Email), "fan@example.com");
        assert_eq!(app.login_form.value(Field::Password), "p");
    }

    #[test]
    fn test_invalid_login_submit_stays_on_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/login?redirect=%2Fresults%3Fartist%3D42");

        type_str(&mut app, "not-an-email");
        press(&mut app, KeyCode::Enter);
        press(&mut app, KeyCode::Enter);

        assert_eq!(app.page, Page::Login);
        assert!(!app.login_form.is_submitting());
        assert!(app.login_form.errors().field(Field::Email).is_some());
    }

    #[test]
    fn test_escape_from_login_returns_to_redirect() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.artists = vec![artist("42", "Phoebe Bridgers")];
        app.navigate("/login?redirect=%2Fresults%3Fartist%3D42");

        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::Results { artist_id: "42".to_string() });
    }

    #[test]
    fn test_ctrl_s_switches_auth_page() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/login");

        handle_input(&mut app, KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL));
        assert_eq!(app.page, Page::Signup);
    }

    #[test]
    fn test_search_selection_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.artists = vec![artist("1", "A"), artist("2", "B")];

        press(&mut app, KeyCode::Down);
        press(&mut app, KeyCode::Down);
        assert_eq!(app.search_selection, 1);

        press(&mut app, KeyCode::Enter);
        assert_eq!(app.page, Page::Results { artist_id: "2".to_string() });

        press(&mut app, KeyCode::Char('l'));
        assert_eq!(app.page, Page::Login);
        assert_eq!(app.login_form.redirect().as_str(), "/results?artist=2");
    }

    #[test]
    fn test_failed_page_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);
        app.navigate("/results?artist=missing");
        app.page_failed = true;
        let generation = app.mount_generation;

        press(&mut app, KeyCode::Char('k'));
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Char('r'));
        assert_ne!(app.mount_generation, generation);
        assert!(!app.page_failed);

        app.page_failed = true;
        press(&mut app, KeyCode::Esc);
        assert_eq!(app.page, Page::Search);
    }

    #[test]
    fn test_quit_needs_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let mut app = test_app(&dir);

        assert!(!press(&mut app, KeyCode::Char('q')));
        assert_eq!(app.state, AppState::ConfirmingQuit);
        assert!(!press(&mut app, KeyCode::Char('n')));
        assert_eq!(app.state, AppState::Normal);

        press(&mut app, KeyCode::Char('q'));
        assert!(press(&mut app, KeyCode::Char('y')));
    }
}
