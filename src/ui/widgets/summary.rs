// src/ui/widgets/summary.rs

use crate::app::{App, AppState, PhaseState};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, Gauge, Paragraph},
};

fn score_color(score: u8) -> Color {
    if score >= 80 {
        Color::Green
    } else if score >= 50 {
        Color::Yellow
    } else {
        Color::Red
    }
}

/// Renders the per-module scores and, once the scan is over, the overall score.
pub fn render_summary(frame: &mut Frame, app: &App, area: Rect) {
    let title = match &app.report {
        Some(report) => format!("Summary - {}", report.scan.target.host_str().unwrap_or_default()),
        None => "Summary".to_string(),
    };
    let summary_container = Block::default().borders(Borders::ALL).title(title);
    frame.render_widget(summary_container, area);

    let summary_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3), // Score & rating
            Constraint::Length(1), // Gauge
            Constraint::Length(1), // Spacer
            Constraint::Length(6), // Modules
            Constraint::Length(1), // Spacer
            Constraint::Min(0),    // Issues
        ])
        .split(area);

    // --- Score & Rating Section ---
    match (app.state, app.overall_score()) {
        (AppState::Finished, Some(score)) => {
            let rating_text = match score {
                90..=100 => "Excellent",
                75..=89 => "Good",
                50..=74 => "Needs Improvement",
                _ => "Poor",
            };
            let mut lines = vec![
                Line::from("Overall Score".bold()),
                Line::from(format!("{score}/100 ({rating_text})")).style(Style::default().fg(score_color(score))),
            ];
            if let Some(summary) = &app.summary {
                let mut note = summary
                    .duration_seconds
                    .map(|seconds| format!("in {seconds}s"))
                    .unwrap_or_default();
                if summary.report_generating {
                    note.push_str(" - report queued");
                }
                lines.push(Line::from(note).style(Style::default().fg(Color::DarkGray)));
            }
            frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), summary_chunks[0]);

            let gauge = Gauge::default()
                .percent(u16::from(score))
                .label("")
                .style(Style::default().fg(score_color(score)));
            frame.render_widget(gauge, summary_chunks[1]);
        }
        (AppState::Scanning, _) => {
            let done = app.phases.iter().filter(|p| p.state != PhaseState::Pending).count();
            frame.render_widget(
                Paragraph::new(format!("Scanning... {done}/{} modules", app.phases.len())).alignment(Alignment::Center),
                summary_chunks[0],
            );
        }
        _ => {}
    }

    // --- Modules Section ---
    let module_lines: Vec<Line> = app
        .phases
        .iter()
        .map(|phase| {
            let result = match (phase.state, phase.score, phase.grade) {
                (PhaseState::Done, Some(score), Some(grade)) => {
                    Span::styled(format!("{score:>3}  {grade}"), Style::default().fg(score_color(score)))
                }
                (PhaseState::Failed, ..) => Span::styled("failed", Style::default().fg(Color::Red)),
                (PhaseState::Running, ..) => Span::styled("running", Style::default().fg(Color::Cyan)),
                _ => Span::styled("-", Style::default().fg(Color::DarkGray)),
            };
            Line::from(vec![Span::raw(format!("{:<13}", phase.module.title())), result])
        })
        .collect();
    frame.render_widget(
        Paragraph::new(module_lines).block(Block::default().title("MODULES".bold())),
        summary_chunks[3],
    );

    // --- Issue Details Section ---
    let issues = app.total_issues();
    let details_text = Text::from(vec![
        Line::from(vec![
            Span::raw("Critical: "),
            Span::styled(issues.critical.to_string(), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::raw("High:     "),
            Span::styled(issues.high.to_string(), Style::default().fg(Color::LightRed)),
        ]),
        Line::from(vec![
            Span::raw("Medium:   "),
            Span::styled(issues.medium.to_string(), Style::default().fg(Color::Yellow)),
        ]),
        Line::from(vec![
            Span::raw("Low:      "),
            Span::styled(issues.low.to_string(), Style::default().fg(Color::Cyan)),
        ]),
    ]);
    frame.render_widget(
        Paragraph::new(details_text).block(Block::default().title("ISSUES FOUND".bold())),
        summary_chunks[5],
    );
}
