// src/ui/layout.rs

use ratatui::layout::{Constraint, Direction, Layout, Rect};

/// Areas of the application's user interface, computed once per frame.
pub struct AppLayout {
    pub input: Rect,
    pub phases: Rect,
    pub terminal: Rect,
    pub findings: Rect,
    pub metrics: Rect,
    pub summary: Rect,
    pub footer: Rect,
}

/// Splits the frame into the input bar, the phase indicator, a content area and the
/// footer. The content area holds the live terminal above the findings on the left,
/// and the live metrics above the summary on the right.
///
/// The findings panel only takes space once a scan has finished.
pub fn create_layout(frame_size: Rect, show_findings: bool) -> AppLayout {
    let main_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(frame_size);

    let content_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(main_chunks[2]);

    let left_constraints = if show_findings {
        [Constraint::Percentage(40), Constraint::Percentage(60)]
    } else {
        [Constraint::Percentage(100), Constraint::Percentage(0)]
    };
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(left_constraints)
        .split(content_chunks[0]);

    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(11), Constraint::Min(0)])
        .split(content_chunks[1]);

    AppLayout {
        input: main_chunks[0],
        phases: main_chunks[1],
        terminal: left_chunks[0],
        findings: if show_findings { left_chunks[1] } else { Rect::default() },
        metrics: right_chunks[0],
        summary: right_chunks[1],
        footer: main_chunks[3],
    }
}
