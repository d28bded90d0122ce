// src/ui/widgets/log_view.rs

use crate::app::{App, AppState, Focus};
use ratatui::{
    prelude::*,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation},
};
use sitepulse_rs::core::events::LogLevel;

fn level_style(level: LogLevel) -> Style {
    match level {
        LogLevel::Info => Style::default(),
        LogLevel::Success => Style::default().fg(Color::Green),
        LogLevel::Warning => Style::default().fg(Color::Yellow),
        LogLevel::Error => Style::default().fg(Color::Red),
    }
}

/// Renders the live terminal: every log event of the scan, newest at the bottom.
///
/// The view follows the tail until the user scrolls up; the latest progress message is
/// pinned below the log while a scan runs.
pub fn render_log_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let border_style = if app.focus == Focus::Logs {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let block = Block::default()
        .title("Live Terminal (scroll with ↑ ↓)")
        .borders(Borders::ALL)
        .border_style(border_style);

    let inner_area = block.inner(area);
    frame.render_widget(block, area);

    if app.logs.is_empty() && app.state == AppState::Idle {
        frame.render_widget(
            Paragraph::new("Scan output will appear here...").alignment(Alignment::Center),
            inner_area,
        );
        return;
    }

    let show_progress = app.state == AppState::Scanning && app.progress.is_some();
    let log_height = inner_area.height.saturating_sub(u16::from(show_progress)) as usize;

    let log_lines: Vec<Line> = app
        .logs
        .iter()
        .map(|line| {
            Line::from(vec![
                Span::styled(line.local_time(), Style::default().fg(Color::DarkGray)),
                Span::styled(format!(" [{}] ", line.phase), Style::default().fg(Color::Blue)),
                Span::styled(line.message.as_str(), level_style(line.level)),
            ])
        })
        .collect();

    // Keep the scroll line at the bottom edge of the view.
    let offset = (app.log_scroll + 1).saturating_sub(log_height);
    let log_paragraph = Paragraph::new(log_lines).scroll((offset as u16, 0));
    let log_area = Rect {
        height: log_height as u16,
        ..inner_area
    };
    frame.render_widget(log_paragraph, log_area);

    if let (true, Some(progress)) = (show_progress, &app.progress) {
        let progress_area = Rect {
            y: inner_area.y + log_height as u16,
            height: 1,
            ..inner_area
        };
        let line = Line::from(vec![
            Span::styled(format!("{:>3}% ", progress.percent), Style::default().fg(Color::Cyan).bold()),
            Span::styled(format!("[{}] ", progress.phase), Style::default().fg(Color::Blue)),
            Span::raw(progress.message.as_str()),
        ]);
        frame.render_widget(Paragraph::new(line), progress_area);
    }

    app.log_scroll_state = app.log_scroll_state.content_length(app.logs.len());
    let scrollbar = Scrollbar::new(ScrollbarOrientation::VerticalRight).thumb_symbol("■");
    frame.render_stateful_widget(scrollbar, area, &mut app.log_scroll_state);
}
