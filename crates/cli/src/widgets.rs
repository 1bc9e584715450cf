use ratatui::Frame;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style, Stylize};
use ratatui::symbols;
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Axis, Block, Borders, Chart, Clear, Dataset, Gauge, GraphType, Paragraph, Wrap,
};
use unicode_width::UnicodeWidthStr;

use voltsight_core::types::{BatteryHealth, DashboardSnapshot, InstallOffer, NetworkState};

use crate::tui::App;

const SPINNER: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

const INSTALL_QUESTION: &str = "Install a desktop launcher for voltsight?";
const INSTALL_ANSWERS: &str = "[y] install   [n/Esc] not now";

pub fn draw(f: &mut Frame, app: &App) {
    let snap = &app.snapshot;
    let banner_h = if snap.network == NetworkState::Offline { 1 } else { 0 };
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(banner_h),
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(8),
            Constraint::Length(1),
        ])
        .split(f.area());

    if banner_h > 0 {
        draw_offline_banner(f, chunks[0]);
    }
    draw_gauge(f, snap, chunks[1]);
    draw_cards(f, snap, chunks[2]);

    let middle = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(chunks[3]);
    draw_history(f, snap, middle[0]);
    draw_insight(f, app, middle[1]);
    draw_footer(f, app, chunks[4]);

    if snap.install_offer == InstallOffer::Prompting {
        draw_install_prompt(f, f.area());
    }
}

fn level_color(level: u8) -> Color {
    match level {
        0..=19 => Color::Red,
        20..=49 => Color::Yellow,
        _ => Color::Green,
    }
}

fn draw_offline_banner(f: &mut Frame, area: Rect) {
    let para = Paragraph::new(" OFFLINE: insights paused until the connection returns ")
        .style(Style::default().fg(Color::Black).bg(Color::Red).add_modifier(Modifier::BOLD))
        .alignment(Alignment::Center);
    f.render_widget(para, area);
}

fn draw_gauge(f: &mut Frame, snap: &DashboardSnapshot, area: Rect) {
    let stats = &snap.stats;
    let direction = if stats.charging { "charging" } else { "on battery" };
    let mut label = format!("{}%  {direction}", stats.level);
    if !snap.telemetry_available {
        label.push_str("  (no battery detected)");
    }
    let gauge = Gauge::default()
        .block(Block::default().borders(Borders::ALL).title(" voltsight "))
        .gauge_style(Style::default().fg(level_color(stats.level)))
        .percent(u16::from(stats.level))
        .label(label);
    f.render_widget(gauge, area);
}

fn draw_cards(f: &mut Frame, snap: &DashboardSnapshot, area: Rect) {
    let stats = &snap.stats;
    let health_color = match stats.health {
        BatteryHealth::Good => Color::Green,
        BatteryHealth::Fair => Color::Yellow,
        BatteryHealth::Poor => Color::Red,
    };
    let time_title = if stats.charging { " Time to full " } else { " Time left " };
    let cards = [
        (" Temperature ", format!("{:.1} °C", stats.temperature), Color::Cyan),
        (" Voltage ", format!("{:.2} V", stats.voltage), Color::Magenta),
        (" Health ", stats.health.as_str().to_owned(), health_color),
        (time_title, stats.time_remaining().to_string(), Color::White),
    ];
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Ratio(1, 4); 4])
        .split(area);
    for ((title, value, color), col) in cards.into_iter().zip(cols.iter()) {
        let para = Paragraph::new(Span::styled(value, Style::default().fg(color).bold()))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL).title(title));
        f.render_widget(para, *col);
    }
}

fn draw_history(f: &mut Frame, snap: &DashboardSnapshot, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title(" Level history ");
    if snap.history.is_empty() {
        let para = Paragraph::new("collecting samples...".dim()).block(block);
        f.render_widget(para, area);
        return;
    }

    let points: Vec<(f64, f64)> = snap
        .history
        .iter()
        .enumerate()
        .map(|(i, s)| (i as f64, f64::from(s.level)))
        .collect();
    let x_max = (points.len().saturating_sub(1)).max(1) as f64;
    let first = snap.history.first().map(|s| s.time.clone()).unwrap_or_default();
    let last = snap.history.last().map(|s| s.time.clone()).unwrap_or_default();

    let dataset = Dataset::default()
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(level_color(snap.stats.level)))
        .data(&points);
    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, x_max])
                .labels(vec![Line::from(first), Line::from(last)]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(Color::DarkGray))
                .bounds([0.0, 100.0])
                .labels(vec![Line::from("0"), Line::from("50"), Line::from("100")]),
        );
    f.render_widget(chart, area);
}

fn insight_lines(app: &App) -> Vec<Line<'static>> {
    let snap = &app.snapshot;
    let mut lines: Vec<Line<'static>> = Vec::new();
    if !snap.insight_enabled {
        lines.push(Line::from("Insights disabled.".dim()));
        lines.push(Line::from(
            "Set VOLTSIGHT_LLM_MODEL and VOLTSIGHT_LLM_API_KEY to enable.".dim(),
        ));
        return lines;
    }
    if snap.loading {
        let frame = SPINNER[app.anim_frame % SPINNER.len()];
        lines.push(Line::from(format!("{frame} analyzing...").dim()));
    }
    match &snap.insight {
        Some(insight) => {
            lines.push(Line::from(insight.status.clone().bold()));
            lines.push(Line::default());
            lines.push(Line::from(insight.recommendation.clone()));
            lines.push(Line::from(vec![
                "Estimated life: ".dim(),
                Span::raw(insight.estimated_life_remaining.clone()),
            ]));
            lines.push(Line::default());
            for tip in &insight.optimization_tips {
                lines.push(Line::from(vec!["• ".fg(Color::Cyan), Span::raw(tip.clone())]));
            }
            if let Some(at) = snap.insight_updated_at {
                lines.push(Line::default());
                lines.push(Line::from(format!("updated {}", at.format("%H:%M:%S")).dim()));
            }
        }
        None if !snap.loading => lines.push(Line::from("No insight yet.".dim())),
        None => {}
    }
    lines
}

fn draw_insight(f: &mut Frame, app: &App, area: Rect) {
    let para = Paragraph::new(insight_lines(app))
        .block(Block::default().borders(Borders::ALL).title(" AI insight "))
        .wrap(Wrap { trim: true });
    f.render_widget(para, area);
}

fn draw_footer(f: &mut Frame, app: &App, area: Rect) {
    let key_style = |enabled: bool| {
        if enabled {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        }
    };
    let snap = &app.snapshot;
    let mut spans = vec![
        Span::styled(" a", key_style(snap.can_analyze())),
        Span::raw(" deep analysis  "),
    ];
    if snap.install_offer == InstallOffer::Deferred {
        spans.push(Span::styled("i", key_style(true)));
        spans.push(Span::raw(" install launcher  "));
    }
    spans.push(Span::styled("q", key_style(true)));
    spans.push(Span::raw(" quit"));
    if let Some(notice) = app.notice {
        spans.push(Span::raw("  |  "));
        spans.push(notice.fg(Color::LightRed));
    }
    let para = Paragraph::new(Line::from(spans)).style(Style::default().fg(Color::Gray));
    f.render_widget(para, area);
}

/// Rect of `width` x `height` centered in `area`, clamped to it.
fn centered(area: Rect, width: u16, height: u16) -> Rect {
    let w = width.min(area.width);
    let h = height.min(area.height);
    Rect::new(area.x + (area.width - w) / 2, area.y + (area.height - h) / 2, w, h)
}

fn draw_install_prompt(f: &mut Frame, area: Rect) {
    let text_w = INSTALL_QUESTION.width().max(INSTALL_ANSWERS.width()) as u16;
    let popup = centered(area, text_w + 4, 5);
    let para = Paragraph::new(vec![
        Line::from(INSTALL_QUESTION),
        Line::default(),
        Line::from(INSTALL_ANSWERS.fg(Color::Yellow)),
    ])
    .alignment(Alignment::Center)
    .block(Block::default().borders(Borders::ALL).title(" Install "));
    f.render_widget(Clear, popup);
    f.render_widget(para, popup);
}
