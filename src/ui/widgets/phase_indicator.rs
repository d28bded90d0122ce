// src/ui/widgets/phase_indicator.rs

use crate::app::{App, PhaseState, SPINNER_CHARS};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph},
};

/// Renders the five modules in run order with their current mark.
pub fn render_phase_indicator(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = Vec::new();
    for (index, phase) in app.phases.iter().enumerate() {
        if index > 0 {
            spans.push(Span::styled("  →  ", Style::default().fg(Color::DarkGray)));
        }
        let (mark, style) = match phase.state {
            PhaseState::Pending => ("·".to_string(), Style::default().fg(Color::DarkGray)),
            PhaseState::Running => (
                SPINNER_CHARS[app.spinner_frame].to_string(),
                Style::default().fg(Color::Cyan).bold(),
            ),
            PhaseState::Done => ("✓".to_string(), Style::default().fg(Color::Green)),
            PhaseState::Failed => ("✗".to_string(), Style::default().fg(Color::Red)),
        };
        spans.push(Span::styled(format!("{mark} {}", phase.module.title()), style));
        if let Some(grade) = phase.grade {
            spans.push(Span::styled(format!(" ({grade})"), Style::default().fg(Color::DarkGray)));
        }
    }

    let block = Block::default().borders(Borders::ALL).title("Phases");
    frame.render_widget(
        Paragraph::new(Line::from(spans)).alignment(Alignment::Center).block(block),
        area,
    );
}
