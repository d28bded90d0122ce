// src/ui/widgets/mod.rs

pub mod analysis_view; // Findings list with knowledge-base details.
pub mod disclaimer_popup;
pub mod footer;
pub mod input;
pub mod live_metrics; // Load tier metrics while the performance module runs.
pub mod log_view; // The live terminal.
pub mod phase_indicator;
pub mod summary;
