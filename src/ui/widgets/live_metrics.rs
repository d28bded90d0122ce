// src/ui/widgets/live_metrics.rs

use crate::app::App;
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

fn row(label: &str, value: String) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{label:<14}"), Style::default().fg(Color::DarkGray)),
        Span::styled(value, Style::default().bold()),
    ])
}

/// Renders the latest load-tier snapshot reported by the performance module.
pub fn render_live_metrics(frame: &mut Frame, app: &App, area: Rect) {
    let block = Block::default().borders(Borders::ALL).title("Live Metrics");

    let Some(metrics) = &app.live_metrics else {
        let p = Paragraph::new("Waiting for load test...")
            .alignment(Alignment::Center)
            .block(block);
        frame.render_widget(p, area);
        return;
    };

    let error_style = match metrics.error_rate {
        rate if rate > 20.0 => Style::default().fg(Color::Red),
        rate if rate > 5.0 => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::Green),
    };

    let lines = vec![
        row("Active users", metrics.active_users.to_string()),
        row("Requests", metrics.total_requests.to_string()),
        row("Avg", format!("{:.0} ms", metrics.avg_response_time)),
        row("p50 / p95", format!("{:.0} / {:.0} ms", metrics.p50, metrics.p95)),
        row("p99", format!("{:.0} ms", metrics.p99)),
        row("Throughput", format!("{:.1} req/s", metrics.throughput)),
        Line::from(vec![
            Span::styled(format!("{:<14}", "Error rate"), Style::default().fg(Color::DarkGray)),
            Span::styled(format!("{:.1}%", metrics.error_rate), error_style.bold()),
        ]),
    ];
    frame.render_widget(Paragraph::new(lines).block(block), area);
}
