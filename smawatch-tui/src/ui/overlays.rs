//! Overlay widgets: key help and the skipped-ticker list.

use ratatui::layout::Rect;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};
use ratatui::Frame;

use crate::app::AppState;
use crate::theme;
use crate::ui::centered_rect;

const KEYS: &[(&str, &str)] = &[
    ("r", "refresh (cached data is reused while fresh)"),
    ("R", "refetch everything, even fresh entries"),
    ("x", "export the rows inside the bounds to CSV"),
    ("+ / -", "raise / lower the overbought threshold"),
    ("> / <", "raise / lower the oversold threshold"),
    ("] / [", "raise / lower the upper bound"),
    ("} / {", "raise / lower the lower bound"),
    ("0", "reset bounds to the full range"),
    ("j k g G", "move through the table"),
    ("s", "list skipped tickers"),
    ("l", "log out"),
    ("q", "quit"),
];

pub fn render_help(f: &mut Frame, area: Rect) {
    let popup = centered_rect(60, 60, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::accent())
        .title(" Keys [Esc]close ")
        .title_style(theme::accent_bold());

    let mut lines = vec![Line::from("")];
    for (key, what) in KEYS {
        lines.push(Line::from(vec![
            Span::styled(format!("  {key:<9}"), theme::accent_bold()),
            Span::styled(*what, theme::muted()),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Thresholds and bounds move in 5-point steps.",
        theme::neutral(),
    )));

    f.render_widget(Paragraph::new(lines).block(block), popup);
}

pub fn render_skipped(f: &mut Frame, area: Rect, app: &AppState) {
    let popup = centered_rect(80, 70, area);
    f.render_widget(Clear, popup);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::warning())
        .title(format!(" Skipped tickers ({}) [Esc]close ", app.skipped.len()))
        .title_style(theme::warning());

    let lines: Vec<Line> = app
        .skipped
        .iter()
        .map(|s| {
            let style = if s.reason.is_omission() {
                theme::muted()
            } else {
                theme::negative()
            };
            Line::from(vec![
                Span::styled(format!("{:<7}", s.ticker), theme::text()),
                Span::styled(format!("{:<22}", s.reason.kind()), style),
                Span::styled(s.reason.to_string(), theme::secondary()),
            ])
        })
        .collect();

    let para = Paragraph::new(lines).block(block).wrap(Wrap { trim: true });
    f.render_widget(para, popup);
}
