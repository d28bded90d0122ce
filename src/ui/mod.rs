// src/ui/mod.rs

use crate::app::{App, AppState};
use ratatui::prelude::*;

mod layout;
mod widgets;

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let layout = layout::create_layout(area, app.state == AppState::Finished);

    widgets::input::render_input(frame, app, layout.input);
    widgets::phase_indicator::render_phase_indicator(frame, app, layout.phases);
    widgets::log_view::render_log_view(frame, app, layout.terminal);
    if app.state == AppState::Finished {
        widgets::analysis_view::render_analysis_view(frame, app, layout.findings);
    }
    widgets::live_metrics::render_live_metrics(frame, app, layout.metrics);
    widgets::summary::render_summary(frame, app, layout.summary);
    widgets::footer::render_footer(frame, app, layout.footer);

    if app.show_disclaimer {
        widgets::disclaimer_popup::render_disclaimer_popup(frame, area);
    }
}
