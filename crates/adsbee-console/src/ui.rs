//! Rendering. Normal layout is log region, status separator, input line;
//! Help and Stats are centered boxes painted over the log region.

use adsbee_core::{Overlay, Tag};
use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::App;

const OVERLAY_WIDTH: u16 = 58;

pub fn render(frame: &mut ratatui::Frame, app: &App) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),
            Constraint::Length(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    render_log(frame, app, layout[0]);
    frame.render_widget(
        Paragraph::new(separator_line(app, layout[1].width))
            .style(Style::default().fg(Color::Cyan)),
        layout[1],
    );
    render_input(frame, app, layout[2]);

    match app.state.overlay {
        Overlay::Help => render_help_overlay(frame, layout[0]),
        Overlay::Stats => render_stats_overlay(frame, app, layout[0]),
        Overlay::None => {}
    }
}

fn tag_color(tag: Tag) -> Option<Color> {
    match tag {
        Tag::Error => Some(Color::Red),
        Tag::Warning => Some(Color::Yellow),
        Tag::Chatter => Some(Color::Cyan),
        Tag::Info => Some(Color::Blue),
        Tag::Sent => Some(Color::Green),
        Tag::System => Some(Color::Magenta),
        Tag::Plain => None,
    }
}

fn render_log(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let visible = app.state.visible_len();
    let height = area.height as usize;
    let skip = visible.saturating_sub(height);

    let lines: Vec<Line> = app
        .state
        .scrollback
        .iter()
        .take(visible)
        .skip(skip)
        .map(|entry| {
            let mut spans = vec![Span::styled(
                format!("[{}] ", entry.stamp),
                Style::default().add_modifier(Modifier::DIM),
            )];
            let label = entry.tag.label();
            match tag_color(entry.tag) {
                Some(color) => spans.push(Span::styled(
                    format!("{label} "),
                    Style::default().fg(color),
                )),
                None => spans.push(Span::raw(format!("{label} "))),
            }
            spans.push(Span::raw(entry.text.clone()));
            Line::from(spans)
        })
        .collect();

    frame.render_widget(Paragraph::new(Text::from(lines)), area);
}

/// Status separator: host plus active mode flags and the filter count,
/// centered in a rule of box-drawing dashes.
pub fn separator_line(app: &App, width: u16) -> String {
    let mut status = Vec::new();
    if !app.connected {
        status.push("DISCONNECTED".to_string());
    }
    if app.state.paused {
        status.push("PAUSED".to_string());
    }
    if app.state.debug_mode {
        status.push("DEBUG".to_string());
    }
    if app.state.decode_mode && app.annotator.is_some() {
        status.push("DECODE".to_string());
    }
    if app.state.filters.is_empty() {
        status.push("No Filters".to_string());
    } else {
        status.push(format!("Filters: {}", app.state.filters.len()));
    }

    let text = format!(" {} | {} ", app.host, status.join(" | "));
    let width = width as usize;
    if text.len() >= width {
        return text;
    }
    let left = (width - text.len()) / 2;
    let right = width - left - text.len();
    format!("{}{}{}", "─".repeat(left), text, "─".repeat(right))
}

fn render_input(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let mut spans = vec![
        Span::styled("> ", Style::default().fg(Color::Green)),
        Span::raw(app.state.input.clone()),
    ];

    match app.state.suggestion_cursor() {
        Some((index, candidates)) => {
            if let Some(suffix) = candidates
                .get(index)
                .and_then(|c| c.strip_prefix(app.state.input.as_str()))
            {
                if !suffix.is_empty() {
                    spans.push(Span::styled(
                        suffix.to_string(),
                        Style::default().add_modifier(Modifier::DIM),
                    ));
                }
            }
            if candidates.len() > 1 {
                spans.push(Span::styled(
                    format!(" [{}/{}]", index + 1, candidates.len()),
                    Style::default().add_modifier(Modifier::DIM),
                ));
            }
        }
        None => {
            spans.push(Span::styled(
                "   [F1/? Help] [F2 Stats] [Tab]",
                Style::default().add_modifier(Modifier::DIM),
            ));
        }
    }

    frame.render_widget(Paragraph::new(Line::from(spans)), area);
    let cursor_x = area.x + 2 + app.state.input.chars().count() as u16;
    frame.set_cursor(cursor_x.min(area.right().saturating_sub(1)), area.y);
}

fn render_help_overlay(frame: &mut ratatui::Frame, area: Rect) {
    let lines = vec![
        Line::from(""),
        Line::from(" KEYS"),
        Line::from("   F1          toggle this help (? on empty line)"),
        Line::from("   F2          show/hide statistics"),
        Line::from("   Ctrl+C      exit monitor"),
        Line::from("   Ctrl+L      clear screen"),
        Line::from("   Ctrl+P      pause/resume output"),
        Line::from("   Ctrl+D      toggle debug mode (ignore filters)"),
        Line::from("   Ctrl+X      toggle hex decoding (ICAO/types)"),
        Line::from("   Up/Down     command history"),
        Line::from("   Tab         cycle completions"),
        Line::from(""),
        Line::from(" FILTERS"),
        Line::from("   /f <pattern>   add filter"),
        Line::from("   /rf <pattern>  remove filter"),
        Line::from("   /lf            list filters"),
        Line::from("   /cf            clear all filters"),
        Line::from(""),
        Line::from(" DEVICE COMMANDS"),
        Line::from("   AT+FEED?           list feeds"),
        Line::from("   AT+FEEDPROTOCOL?   show protocols"),
        Line::from("   AT+MQTTFMT=0,JSON  set MQTT format"),
        Line::from("   AT+SETTINGS=SAVE   save settings"),
        Line::from("   AT+REBOOT          reboot device"),
    ];
    render_overlay_box(frame, area, "ADSBee Monitor Help", lines, Color::Black);
}

fn render_stats_overlay(frame: &mut ratatui::Frame, app: &App, area: Rect) {
    let stats = &app.state.stats;
    let runtime = Local::now().signed_duration_since(stats.started);
    let secs = runtime.num_seconds().max(0);
    let lines = vec![
        Line::from(""),
        Line::from(format!(
            "  Runtime:           {:02}:{:02}:{:02}",
            secs / 3600,
            (secs % 3600) / 60,
            secs % 60
        )),
        Line::from(format!("  Total messages:    {}", stats.total)),
        Line::from(format!("  Commands sent:     {}", stats.commands_sent)),
        Line::from(format!("  Displayed matches: {}", stats.filtered)),
        Line::from(format!("  Duplicate packets: {}", stats.duplicates)),
        Line::from(format!("  Decode failures:   {}", stats.decode_failures)),
        Line::from(format!("  Bit errors fixed:  {}", stats.bit_errors)),
        Line::from(format!("  Feed/MQTT chatter: {}", stats.chatter)),
        Line::from(format!("  Unique aircraft:   {}", stats.unique_icaos())),
        Line::from(""),
        Line::from("  Press F2 to close"),
    ];
    render_overlay_box(frame, area, "Statistics", lines, Color::Blue);
}

fn render_overlay_box(
    frame: &mut ratatui::Frame,
    area: Rect,
    title: &str,
    lines: Vec<Line>,
    bg: Color,
) {
    let height = lines.len() as u16 + 2;
    let boxed = centered_box(OVERLAY_WIDTH, height, area);
    frame.render_widget(Clear, boxed);
    frame.render_widget(
        Paragraph::new(Text::from(lines))
            .style(Style::default().fg(Color::White).bg(bg))
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(Span::styled(
                        title.to_string(),
                        Style::default().add_modifier(Modifier::BOLD),
                    )),
            ),
        boxed,
    );
}

fn centered_box(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    Rect {
        x: area.x + (area.width - width) / 2,
        y: area.y + (area.height - height) / 2,
        width,
        height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn test_app() -> App {
        let (outbound, _rx) = mpsc::channel(8);
        App::new("192.168.1.73".to_string(), outbound, None, None)
    }

    #[test]
    fn separator_reports_flags_and_filter_count() {
        let mut app = test_app();
        app.state.add_filter("MQTT");
        app.state.debug_mode = true;

        let line = separator_line(&app, 80);
        assert!(line.contains("192.168.1.73"));
        assert!(line.contains("DEBUG"));
        assert!(line.contains("Filters: 1"));
        assert!(!line.contains("PAUSED"));
    }

    #[test]
    fn separator_without_filters_says_so() {
        let app = test_app();
        assert!(separator_line(&app, 80).contains("No Filters"));
    }

    #[test]
    fn centered_box_clamps_to_small_areas() {
        let area = Rect {
            x: 0,
            y: 0,
            width: 20,
            height: 5,
        };
        let boxed = centered_box(58, 30, area);
        assert!(boxed.width <= area.width);
        assert!(boxed.height <= area.height);
    }
}
