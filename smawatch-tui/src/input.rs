//! Keyboard input dispatch: login screen, then overlays, then dashboard keys.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::app::{AppState, Overlay, Screen, ADJUST_STEP};

pub fn handle_key(app: &mut AppState, key: KeyEvent) {
    // Only handle key press events (Windows sends both Press and Release).
    if key.kind != KeyEventKind::Press {
        return;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        app.running = false;
        return;
    }

    match app.screen {
        Screen::Login => handle_login_key(app, key),
        Screen::Dashboard => {
            if app.overlay != Overlay::None {
                handle_overlay_key(app, key);
            } else {
                handle_dashboard_key(app, key);
            }
        }
    }
}

fn handle_login_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Enter => app.submit_login(),
        KeyCode::Esc => app.running = false,
        KeyCode::Backspace => {
            app.login.input.pop();
        }
        KeyCode::Char(c) => {
            app.login.input.push(c);
            app.login.error = None;
        }
        _ => {}
    }
}

fn handle_overlay_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q') => app.overlay = Overlay::None,
        KeyCode::Char('?') if app.overlay == Overlay::Help => app.overlay = Overlay::None,
        KeyCode::Char('s') if app.overlay == Overlay::Skipped => app.overlay = Overlay::None,
        _ => {}
    }
}

fn handle_dashboard_key(app: &mut AppState, key: KeyEvent) {
    match key.code {
        KeyCode::Char('q') => app.running = false,
        KeyCode::Char('?') => app.overlay = Overlay::Help,
        KeyCode::Char('s') => {
            if app.skipped.is_empty() {
                app.set_status("No skipped tickers");
            } else {
                app.overlay = Overlay::Skipped;
            }
        }

        // Data
        KeyCode::Char('r') => app.request_run(false),
        KeyCode::Char('R') => app.request_run(true),
        KeyCode::Char('x') => app.export(),
        KeyCode::Char('l') => app.logout(),

        // Table
        KeyCode::Char('j') | KeyCode::Down => app.cursor_down(),
        KeyCode::Char('k') | KeyCode::Up => app.cursor_up(),
        KeyCode::Char('g') | KeyCode::Home => app.cursor_top(),
        KeyCode::Char('G') | KeyCode::End => app.cursor_bottom(),

        // Thresholds
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_overbought(ADJUST_STEP),
        KeyCode::Char('-') => app.adjust_overbought(-ADJUST_STEP),
        KeyCode::Char('>') => app.adjust_oversold(ADJUST_STEP),
        KeyCode::Char('<') => app.adjust_oversold(-ADJUST_STEP),

        // Bounds
        KeyCode::Char(']') => app.adjust_upper(ADJUST_STEP),
        KeyCode::Char('[') => app.adjust_upper(-ADJUST_STEP),
        KeyCode::Char('}') => app.adjust_lower(ADJUST_STEP),
        KeyCode::Char('{') => app.adjust_lower(-ADJUST_STEP),
        KeyCode::Char('0') => app.reset_bounds(),
        _ => {}
    }
}
