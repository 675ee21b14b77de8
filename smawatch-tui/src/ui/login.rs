//! Access-code screen.

use ratatui::layout::{Alignment, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::app::AppState;
use crate::theme;
use crate::ui::centered_rect;

pub fn render(f: &mut Frame, area: Rect, app: &AppState) {
    let popup = centered_rect(50, 40, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(true))
        .title(" S&P 500 200-week SMA ")
        .title_style(theme::panel_title(true));

    let masked = "•".repeat(app.login.input.chars().count());
    let mut lines = vec![
        Line::from(""),
        Line::from(Span::styled("Access code", theme::accent_bold())),
        Line::from(""),
        Line::from(vec![
            Span::styled("> ", theme::muted()),
            Span::styled(masked, theme::text()),
            Span::styled("_", theme::accent()),
        ]),
        Line::from(""),
    ];
    if let Some(err) = &app.login.error {
        lines.push(Line::from(Span::styled(err.as_str(), theme::negative())));
    }

    let para = Paragraph::new(lines)
        .block(block)
        .alignment(Alignment::Center);
    f.render_widget(para, popup);
}
