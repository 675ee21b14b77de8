//! Top-level UI layout: login or dashboard, status bar, overlays on top.

pub mod dashboard;
pub mod login;
pub mod overlays;
pub mod status_bar;

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;

use crate::app::{AppState, Overlay, Screen};

/// Draw the entire UI.
pub fn draw(f: &mut Frame, app: &mut AppState) {
    // Split: main area + 1-line status bar.
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(f.area());

    let main_area = chunks[0];
    let status_area = chunks[1];

    match app.screen {
        Screen::Login => login::render(f, main_area, app),
        Screen::Dashboard => dashboard::render(f, main_area, app),
    }

    status_bar::render(f, status_area, app);

    if app.screen == Screen::Dashboard {
        match app.overlay {
            Overlay::Help => overlays::render_help(f, main_area),
            Overlay::Skipped => overlays::render_skipped(f, main_area, app),
            Overlay::None => {}
        }
    }
}

/// Compute a centered rect for overlays.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Signed percent with two decimals, e.g. `+12.50%`.
pub fn fmt_pct(fraction: f64) -> String {
    format!("{:+.2}%", fraction * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::EXPORT_FILE;
    use crate::test_helpers::row;
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use smawatch_core::classify::Thresholds;
    use smawatch_core::data::ConstituentList;
    use smawatch_runner::config::AccessConfig;
    use smawatch_runner::{BatchReport, IndexReport};
    use std::path::PathBuf;
    use std::sync::mpsc;

    fn app(code: Option<&str>) -> AppState {
        let (cmd_tx, _cmd_rx) = mpsc::channel();
        let (_resp_tx, resp_rx) = mpsc::channel();
        AppState::new(
            cmd_tx,
            resp_rx,
            AccessConfig {
                code: code.map(String::from),
            },
            Thresholds::default(),
            PathBuf::from(EXPORT_FILE),
        )
    }

    fn screen_text(terminal: &Terminal<TestBackend>) -> String {
        let buffer = terminal.backend().buffer();
        buffer.content().iter().map(|c| c.symbol()).collect()
    }

    #[test]
    fn centered_rect_sits_inside_area() {
        let area = Rect::new(0, 0, 100, 50);
        let popup = centered_rect(60, 40, area);
        assert_eq!(popup.width, 60);
        assert_eq!(popup.height, 20);
        assert_eq!(popup.x, 20);
        assert_eq!(popup.y, 15);
    }

    #[test]
    fn pct_is_signed() {
        assert_eq!(fmt_pct(0.125), "+12.50%");
        assert_eq!(fmt_pct(-0.3), "-30.00%");
    }

    #[test]
    fn login_screen_masks_the_code() {
        let mut app = app(Some("secret"));
        app.login.input = "secret".into();
        let mut terminal = Terminal::new(TestBackend::new(80, 24)).unwrap();
        terminal.draw(|f| draw(f, &mut app)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("Access code"));
        assert!(!text.contains("secret"));
    }

    #[test]
    fn dashboard_renders_rows_and_views() {
        let mut app = app(None);
        app.apply_report(IndexReport {
            constituents: ConstituentList::new(Vec::new()),
            batch: BatchReport::default(),
            rows: vec![row("CHEAP", -0.45), row("FLAT", 0.02), row("HOT", 0.8)],
        });
        let mut terminal = Terminal::new(TestBackend::new(140, 40)).unwrap();
        terminal.draw(|f| draw(f, &mut app)).unwrap();

        let text = screen_text(&terminal);
        assert!(text.contains("CHEAP"));
        assert!(text.contains("HOT"));
        assert!(text.contains("+80.00%"));
        assert!(text.contains("Above"));
        assert!(text.contains("Below"));
    }

    #[test]
    fn help_overlay_draws_over_dashboard() {
        let mut app = app(None);
        app.overlay = Overlay::Help;
        let mut terminal = Terminal::new(TestBackend::new(120, 40)).unwrap();
        terminal.draw(|f| draw(f, &mut app)).unwrap();
        assert!(screen_text(&terminal).contains("Keys"));
    }
}
