//! Dashboard: summary header, deviation table, distribution chart and the
//! above/below threshold views.

use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::Modifier;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Cell, Gauge, Paragraph, Row, Table};
use ratatui::Frame;

use smawatch_runner::report::DashboardRow;

use crate::app::AppState;
use crate::theme;
use crate::ui::fmt_pct;

/// Lower edges of the distribution buckets, as fractions.
const BUCKET_EDGES: [f64; 10] = [-0.4, -0.3, -0.2, -0.1, 0.0, 0.1, 0.2, 0.3, 0.4, 0.5];

pub fn render(f: &mut Frame, area: Rect, app: &mut AppState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(4), Constraint::Min(6)])
        .split(area);
    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(chunks[1]);
    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(12),
            Constraint::Min(4),
            Constraint::Min(4),
        ])
        .split(body[1]);

    let filtered = app.filtered_rows();
    render_header(f, chunks[0], app, &filtered);

    if filtered.is_empty() {
        render_placeholder(f, body[0], app);
    } else {
        // Borders plus the header row.
        let height = body[0].height.saturating_sub(3) as usize;
        app.scroll_to_cursor(height);
        render_table(f, body[0], app, &filtered, height);
    }

    render_distribution(f, side[0], &filtered);

    let above = app.above_rows(&filtered);
    let below = app.below_rows(&filtered);
    render_view(
        f,
        side[1],
        &format!(" Above +{:.0}% ({}) ", app.thresholds.overbought * 100.0, above.len()),
        &above,
    );
    render_view(
        f,
        side[2],
        &format!(" Below -{:.0}% ({}) ", app.thresholds.oversold * 100.0, below.len()),
        &below,
    );
}

fn render_header(f: &mut Frame, area: Rect, app: &AppState, filtered: &[DashboardRow]) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(true))
        .title(" S&P 500 vs 200-week SMA ")
        .title_style(theme::panel_title(true));

    let sep = || Span::styled(" · ", theme::muted());

    let mut first = vec![Span::styled(
        format!("{} analysed of {}", app.rows.len(), app.constituent_count),
        theme::accent(),
    )];
    if !app.skipped.is_empty() {
        first.push(sep());
        first.push(Span::styled(
            format!("{} skipped [s]", app.skipped.len()),
            theme::warning(),
        ));
    }
    if let Some(as_of) = app.rows.iter().map(|r| r.as_of).max() {
        first.push(sep());
        first.push(Span::styled(format!("as of {as_of}"), theme::secondary()));
    }
    if let Some(at) = app.loaded_at {
        first.push(sep());
        first.push(Span::styled(format!("loaded {}", at.format("%H:%M")), theme::secondary()));
    }
    if !app.cache_label.is_empty() {
        first.push(sep());
        first.push(Span::styled(format!("cache {}", app.cache_label), theme::muted()));
    }
    if app.load.in_progress {
        first.push(sep());
        first.push(Span::styled(
            format!(
                "refreshing {}/{} {} ({} failed)",
                app.load.done,
                app.load.total,
                app.load.current.as_deref().unwrap_or(""),
                app.load.failures
            ),
            theme::warning(),
        ));
    }

    let counts = AppState::label_counts(filtered);
    let mut second = vec![
        Span::styled(
            format!("Overbought ≥ +{:.0}%", app.thresholds.overbought * 100.0),
            theme::negative(),
        ),
        sep(),
        Span::styled(
            format!("Oversold ≤ -{:.0}%", app.thresholds.oversold * 100.0),
            theme::positive(),
        ),
    ];
    if let Some((lower, upper)) = app.bounds() {
        second.push(sep());
        second.push(Span::styled(
            format!("bounds [{}, {}]", fmt_pct(lower), fmt_pct(upper)),
            theme::text(),
        ));
        second.push(sep());
        second.push(Span::styled(
            format!(
                "{} shown: {} overbought, {} neutral, {} oversold",
                filtered.len(),
                counts.overbought,
                counts.neutral,
                counts.oversold
            ),
            theme::secondary(),
        ));
    }

    let para = Paragraph::new(vec![Line::from(first), Line::from(second)]).block(block);
    f.render_widget(para, area);
}

fn render_placeholder(f: &mut Frame, area: Rect, app: &AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(false))
        .title(" Tickers ");

    if app.load.in_progress {
        let ratio = if app.load.total == 0 {
            0.0
        } else {
            (app.load.done as f64 / app.load.total as f64).clamp(0.0, 1.0)
        };
        let gauge = Gauge::default()
            .block(block)
            .gauge_style(theme::accent())
            .ratio(ratio)
            .label(format!("{}/{} tickers", app.load.done, app.load.total));
        f.render_widget(gauge, area);
        return;
    }

    let hint = if app.rows.is_empty() {
        "No data loaded. Press r to load the index."
    } else {
        "No tickers inside the bounds. Press 0 to reset them."
    };
    let para = Paragraph::new(vec![Line::from(""), Line::from(Span::styled(hint, theme::muted()))])
        .block(block);
    f.render_widget(para, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &AppState, rows: &[DashboardRow], height: usize) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(true))
        .title(format!(" Tickers ({}) [j/k] ", rows.len()))
        .title_style(theme::panel_title(true));

    let header = Row::new(
        ["Ticker", "Company", "Sector", "Close", "SMA 200w", "Dev %", "Label"].map(Cell::from),
    )
    .style(theme::accent_bold());

    let body: Vec<Row> = rows
        .iter()
        .enumerate()
        .skip(app.scroll_offset)
        .take(height)
        .map(|(i, r)| {
            let style = if i == app.cursor {
                theme::accent().add_modifier(Modifier::REVERSED)
            } else {
                theme::text()
            };
            Row::new(vec![
                Cell::from(r.ticker.clone()),
                Cell::from(r.company.clone()),
                Cell::from(r.sector.clone()),
                Cell::from(format!("{:>9.2}", r.close)),
                Cell::from(format!("{:>9.2}", r.sma)),
                Cell::from(Span::styled(
                    format!("{:>9}", fmt_pct(r.deviation)),
                    theme::deviation_style(r.deviation),
                )),
                Cell::from(Span::styled(
                    r.classification.label(),
                    theme::label_style(r.classification),
                )),
            ])
            .style(style)
        })
        .collect();

    let widths = [
        Constraint::Length(6),
        Constraint::Min(14),
        Constraint::Length(22),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(9),
        Constraint::Length(10),
    ];
    let table = Table::new(body, widths)
        .header(header)
        .block(block)
        .column_spacing(1);
    f.render_widget(table, area);
}

/// One bar of the deviation distribution.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub label: String,
    pub count: u64,
    /// Representative deviation, for colouring.
    pub mid: f64,
}

/// Count rows per 10-point deviation bucket, open-ended at both sides.
pub fn distribution(rows: &[DashboardRow]) -> Vec<Bucket> {
    let mut counts = [0u64; BUCKET_EDGES.len() + 1];
    for r in rows {
        let idx = BUCKET_EDGES.iter().filter(|&&edge| r.deviation >= edge).count();
        counts[idx] += 1;
    }

    counts
        .iter()
        .enumerate()
        .map(|(i, &count)| {
            let (label, mid) = match i {
                0 => (format!("<{:.0}", BUCKET_EDGES[0] * 100.0), BUCKET_EDGES[0] - 0.05),
                i if i == BUCKET_EDGES.len() => {
                    let last = BUCKET_EDGES[i - 1];
                    (format!("{:.0}+", last * 100.0), last + 0.05)
                }
                i => {
                    let lower = BUCKET_EDGES[i - 1];
                    (format!("{:.0}", lower * 100.0), lower + 0.05)
                }
            };
            Bucket { label, count, mid }
        })
        .collect()
}

fn render_distribution(f: &mut Frame, area: Rect, rows: &[DashboardRow]) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(false))
        .title(" Deviation % distribution ")
        .title_style(theme::panel_title(false));

    let buckets = distribution(rows);
    let bars: Vec<Bar> = buckets
        .iter()
        .map(|b| {
            Bar::default()
                .value(b.count)
                .label(Line::from(b.label.clone()))
                .style(theme::deviation_style(b.mid))
        })
        .collect();

    let inner_width = area.width.saturating_sub(2);
    let slots = buckets.len() as u16;
    let bar_width = (inner_width.saturating_sub(slots) / slots).max(1);

    let chart = BarChart::default()
        .block(block)
        .data(BarGroup::default().bars(&bars))
        .bar_width(bar_width)
        .bar_gap(1)
        .value_style(theme::text().add_modifier(Modifier::BOLD));
    f.render_widget(chart, area);
}

fn render_view(f: &mut Frame, area: Rect, title: &str, rows: &[DashboardRow]) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(theme::panel_border(false))
        .title(title.to_string())
        .title_style(theme::panel_title(false));

    let lines: Vec<Line> = if rows.is_empty() {
        vec![Line::from(Span::styled("none", theme::muted()))]
    } else {
        rows.iter()
            .map(|r| {
                Line::from(vec![
                    Span::styled(format!("{:<6}", r.ticker), theme::text()),
                    Span::styled(
                        format!("{:>9} ", fmt_pct(r.deviation)),
                        theme::deviation_style(r.deviation),
                    ),
                    Span::styled(r.company.as_str(), theme::secondary()),
                ])
            })
            .collect()
    };
    f.render_widget(Paragraph::new(lines).block(block), area);
}
