// src/ui/widgets/analysis_view.rs

use crate::app::{App, Focus};
use ratatui::{
    prelude::*,
    text::Line,
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
};
use sitepulse_rs::core::knowledge_base::{self, FindingCategory};
use sitepulse_rs::core::models::Severity;

fn severity_style(severity: Severity) -> Style {
    match severity {
        Severity::Critical => Style::default().fg(Color::Red).bold(),
        Severity::High => Style::default().fg(Color::LightRed),
        Severity::Medium => Style::default().fg(Color::Yellow),
        Severity::Low => Style::default().fg(Color::Cyan),
        Severity::Info => Style::default().fg(Color::DarkGray),
    }
}

/// Renders the findings of the finished scan with the knowledge-base explanation of
/// the selected one.
pub fn render_analysis_view(frame: &mut Frame, app: &mut App, area: Rect) {
    let border_style = if app.focus == Focus::Findings {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let main_block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!("Findings ({}) (Navigate with ↑ ↓)", app.findings.len()));

    let inner_area = main_block.inner(area);
    frame.render_widget(main_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Min(0)])
        .split(inner_area);

    let items: Vec<ListItem> = app
        .findings
        .iter()
        .map(|(module, finding)| {
            let title = knowledge_base::get_finding_detail(&finding.code).map_or(finding.code.as_str(), |d| d.title);
            let mut spans = vec![
                Span::styled(
                    format!("{} ", FindingCategory::from(*module).tag()),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(format!("{:<8} ", finding.severity), severity_style(finding.severity)),
                Span::raw(title),
            ];
            if let Some(detail) = &finding.detail {
                spans.push(Span::styled(format!("  {detail}"), Style::default().fg(Color::DarkGray)));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let findings_list = List::new(items).highlight_style(Style::new().bg(Color::DarkGray).add_modifier(Modifier::BOLD));
    frame.render_stateful_widget(findings_list, chunks[0], &mut app.analysis_list_state);

    let detail_block = Block::default().borders(Borders::TOP).title("Details");
    let selected = app
        .selected_finding()
        .and_then(|(_, finding)| knowledge_base::get_finding_detail(&finding.code));
    match selected {
        Some(detail) => {
            let text = vec![
                Line::from(detail.title.bold()),
                Line::from(format!("{}", detail.category)).style(Style::default().fg(Color::DarkGray)),
                Line::from(""),
                Line::from("WHAT IT IS:".yellow().bold()),
                Line::from(detail.description),
                Line::from(""),
                Line::from("HOW TO FIX:".yellow().bold()),
                Line::from(detail.remediation),
            ];
            let p = Paragraph::new(text).wrap(Wrap { trim: true }).block(detail_block);
            frame.render_widget(p, chunks[1]);
        }
        None => render_placeholder_details(frame, app, detail_block, chunks[1]),
    }
}

fn render_placeholder_details(frame: &mut Frame, app: &App, block: Block, area: Rect) {
    let placeholder_text = if app.findings.is_empty() {
        Text::from(vec![
            Line::from(""),
            Line::from("✓ NO ISSUES FOUND".bold().fg(Color::Green)),
            Line::from(""),
            Line::from("None of the completed modules reported a finding."),
        ])
    } else {
        Text::from("Select an item above to see details.")
    };

    let p = Paragraph::new(placeholder_text).alignment(Alignment::Center).block(block);
    frame.render_widget(p, area);
}
