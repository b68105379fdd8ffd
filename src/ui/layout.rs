use crate::app::{rate_for, to_mbps, App, AppView, Panel};
use probespeed::{Direction, ProbeResult, ProbeState, SettingsField};
use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

// Color Palette - Elegant & Minimal
const ACCENT: Color = Color::Rgb(100, 149, 237);      // Cornflower blue
const SUCCESS: Color = Color::Rgb(134, 194, 156);     // Soft green
const INFO: Color = Color::Rgb(147, 180, 220);        // Soft blue
const WARN: Color = Color::Rgb(220, 180, 130);        // Soft amber
const ERROR: Color = Color::Rgb(220, 120, 120);       // Soft red
const TEXT_PRIMARY: Color = Color::Rgb(230, 230, 230);
const TEXT_SECONDARY: Color = Color::Rgb(160, 160, 160);
const TEXT_MUTED: Color = Color::Rgb(100, 100, 100);
const BORDER: Color = Color::Rgb(60, 60, 65);
const BORDER_ACTIVE: Color = Color::Rgb(100, 100, 110);

pub fn draw_ui(frame: &mut Frame, app: &App) {
    let area = frame.area();

    match app.view {
        AppView::Main => draw_main_view(frame, area, app),
        AppView::Settings => draw_settings_view(frame, area, app),
    }
}

fn draw_main_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(8),
        Constraint::Length(1),
        Constraint::Length(1),
    ])
    .split(area);

    draw_header(frame, chunks[0], app);

    let panels = Layout::horizontal([Constraint::Ratio(1, 2), Constraint::Ratio(1, 2)]).split(chunks[1]);

    draw_probe_panel(frame, panels[0], app, Direction::Download, SUCCESS);
    draw_probe_panel(frame, panels[1], app, Direction::Upload, INFO);

    draw_message(frame, chunks[2], app);
    draw_help(frame, chunks[3], app);
}

fn draw_header(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::horizontal([
        Constraint::Length(12),
        Constraint::Min(10),
        Constraint::Length(12),
    ])
    .split(inner);

    // Title
    let title = Paragraph::new("probespeed")
        .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD));
    frame.render_widget(title, chunks[0]);

    // Current probe
    let status = match (&app.request, app.status.state) {
        (_, ProbeState::Undefined) | (None, _) => "Ready".to_string(),
        (Some(request), ProbeState::Running) => format!("Running {} · {}", request.direction, request.url),
        (Some(request), _) => format!("Last {} · {}", request.direction, request.url),
    };

    let status_text = Paragraph::new(status)
        .style(Style::default().fg(state_color(app.status.state)))
        .alignment(Alignment::Center);
    frame.render_widget(status_text, chunks[1]);

    frame.render_widget(
        Paragraph::new(Span::styled(
            app.status.state.name(),
            Style::default().fg(state_color(app.status.state)).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Right),
        chunks[2],
    );
}

fn draw_probe_panel(frame: &mut Frame, area: Rect, app: &App, direction: Direction, color: Color) {
    let selected = app.selected_panel
        == match direction {
            Direction::Download => Panel::Download,
            Direction::Upload => Panel::Upload,
        };
    let border_color = if selected { BORDER_ACTIVE } else { BORDER };
    let title = match direction {
        Direction::Download => " Download ",
        Direction::Upload => " Upload ",
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(Span::styled(
            title,
            Style::default().fg(if selected { color } else { TEXT_SECONDARY }),
        ));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::vertical([
        Constraint::Length(2),
        Constraint::Length(1),
        Constraint::Min(3),
    ])
    .split(inner);

    let running_here = app.is_running()
        && app.request.as_ref().map(|r| r.direction) == Some(direction);
    let last = app.last_result(direction);

    // Rate value
    let value = if running_here {
        "measuring…".to_string()
    } else {
        last.map(|r| format_speed(to_mbps(rate_for(direction, r))))
            .unwrap_or_else(|| "—".to_string())
    };
    frame.render_widget(
        Paragraph::new(value)
            .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD))
            .alignment(Alignment::Center),
        chunks[0],
    );

    // Details of the last probe
    if let Some(result) = last {
        frame.render_widget(
            Paragraph::new(details_line(result)).alignment(Alignment::Center),
            chunks[1],
        );
    }

    let samples = app.samples(direction);
    if !samples.is_empty() {
        draw_chart(frame, chunks[2], &samples, color, "Mbps");
    }
}

fn details_line(result: &ProbeResult) -> Line<'static> {
    Line::from(vec![
        Span::styled(result.state.name(), Style::default().fg(state_color(result.state))),
        Span::styled("  ·  ", Style::default().fg(TEXT_MUTED)),
        Span::styled(format_bytes(result.payload_size), Style::default().fg(TEXT_SECONDARY)),
        Span::styled("  ·  ", Style::default().fg(TEXT_MUTED)),
        Span::styled(
            format!("{:.2} s", result.total_transfer_time),
            Style::default().fg(TEXT_SECONDARY),
        ),
    ])
}

fn draw_chart(frame: &mut Frame, area: Rect, data: &[f64], color: Color, unit: &str) {
    if data.is_empty() || area.width < 10 || area.height < 3 {
        return;
    }

    let (min_val, max_val) = get_data_range(data);
    let range = (max_val - min_val).max(0.1);
    let y_min = (min_val - range * 0.1).max(0.0);
    let y_max = max_val + range * 0.1;

    let points: Vec<(f64, f64)> = data
        .iter()
        .enumerate()
        .map(|(i, &v)| (i as f64, v))
        .collect();

    let avg = data.iter().sum::<f64>() / data.len() as f64;
    let avg_line: Vec<(f64, f64)> = vec![(0.0, avg), (data.len() as f64, avg)];

    let datasets = vec![
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(color))
            .data(&points),
        Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(TEXT_MUTED))
            .data(&avg_line),
    ];

    let y_labels = vec![
        Span::styled(format!("{:.0}", y_min), Style::default().fg(TEXT_MUTED)),
        Span::styled(format!("{:.0} {}", y_max, unit), Style::default().fg(TEXT_MUTED)),
    ];

    let chart = Chart::new(datasets)
        .x_axis(
            Axis::default()
                .style(Style::default().fg(BORDER))
                .bounds([0.0, data.len() as f64]),
        )
        .y_axis(
            Axis::default()
                .style(Style::default().fg(BORDER))
                .bounds([y_min, y_max])
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

// Settings
fn draw_settings_view(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Min(10),
        Constraint::Length(1),
    ])
    .split(area);

    // Header
    let header_block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(BORDER));
    let header_inner = header_block.inner(chunks[0]);
    frame.render_widget(header_block, chunks[0]);

    frame.render_widget(
        Paragraph::new("Settings")
            .style(Style::default().fg(TEXT_PRIMARY).add_modifier(Modifier::BOLD)),
        header_inner,
    );

    let content_area = Layout::horizontal([
        Constraint::Length(2),
        Constraint::Min(30),
        Constraint::Length(2),
    ])
    .split(chunks[1])[1];

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(BORDER));
    let inner = block.inner(content_area);
    frame.render_widget(block, content_area);

    let rows = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Length(2),
        Constraint::Length(2),
        Constraint::Min(0),
    ])
    .split(inner);

    draw_setting_row(
        frame,
        rows[0],
        "Upload size",
        &format!("{:.1} MB", app.settings.upload_size_mb()),
        app.selected_setting == SettingsField::UploadSize,
    );

    draw_setting_row(
        frame,
        rows[1],
        "Download budget",
        &format!("{:.1} MB", app.settings.download_budget_mb()),
        app.selected_setting == SettingsField::DownloadBudget,
    );

    draw_setting_row(frame, rows[2], "Upload URL", &app.settings.upload_url, false);
    draw_setting_row(frame, rows[3], "Download URL", &app.settings.download_url, false);

    // Help
    let help = "↑↓ select · ←→ adjust · enter done";
    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        chunks[2],
    );
}

fn draw_setting_row(frame: &mut Frame, area: Rect, label: &str, value: &str, selected: bool) {
    let chunks = Layout::horizontal([
        Constraint::Length(18),
        Constraint::Min(10),
    ])
    .split(area);

    let label_style = if selected {
        Style::default().fg(ACCENT)
    } else {
        Style::default().fg(TEXT_SECONDARY)
    };

    frame.render_widget(
        Paragraph::new(format!(" {}", label)).style(label_style),
        chunks[0],
    );

    let value_text = if selected {
        format!("< {} >", value)
    } else {
        value.to_string()
    };

    let value_style = if selected {
        Style::default().fg(TEXT_PRIMARY)
    } else {
        Style::default().fg(TEXT_MUTED)
    };

    frame.render_widget(Paragraph::new(value_text).style(value_style), chunks[1]);
}

fn draw_message(frame: &mut Frame, area: Rect, app: &App) {
    if let Some(message) = &app.message {
        frame.render_widget(
            Paragraph::new(message.as_str())
                .style(Style::default().fg(WARN))
                .alignment(Alignment::Center),
            area,
        );
    }
}

fn draw_help(frame: &mut Frame, area: Rect, app: &App) {
    let help = if app.is_running() {
        "probe running · q quit"
    } else {
        "d download · u upload · enter start selected · c cleanup · s settings · q quit"
    };

    frame.render_widget(
        Paragraph::new(help)
            .style(Style::default().fg(TEXT_MUTED))
            .alignment(Alignment::Center),
        area,
    );
}

// Helpers
fn state_color(state: ProbeState) -> Color {
    match state {
        ProbeState::Undefined => TEXT_MUTED,
        ProbeState::Running => WARN,
        ProbeState::Finished => ACCENT,
        ProbeState::Error => ERROR,
    }
}

fn get_data_range(data: &[f64]) -> (f64, f64) {
    let min = data.iter().cloned().fold(f64::MAX, f64::min);
    let max = data.iter().cloned().fold(f64::MIN, f64::max);
    (if min == f64::MAX { 0.0 } else { min }, if max == f64::MIN { 0.0 } else { max })
}

fn format_speed(mbps: f64) -> String {
    if mbps >= 1000.0 {
        format!("{:.1} Gbps", mbps / 1000.0)
    } else if mbps >= 1.0 {
        format!("{:.1} Mbps", mbps)
    } else if mbps > 0.0 {
        format!("{:.0} Kbps", mbps * 1000.0)
    } else {
        "—".to_string()
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_000_000 {
        format!("{:.1} MB", bytes as f64 / 1_000_000.0)
    } else if bytes >= 1_000 {
        format!("{:.1} kB", bytes as f64 / 1_000.0)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_speed_units() {
        assert_eq!(format_speed(0.0), "—");
        assert_eq!(format_speed(0.5), "500 Kbps");
        assert_eq!(format_speed(94.26), "94.3 Mbps");
        assert_eq!(format_speed(2500.0), "2.5 Gbps");
    }

    #[test]
    fn test_format_bytes_units() {
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(1_500), "1.5 kB");
        assert_eq!(format_bytes(20_000_000), "20.0 MB");
    }
}
