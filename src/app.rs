// src/app.rs

use chrono::{DateTime, Local, Utc};
use ratatui::widgets::{ListState, ScrollbarState};
use strum::IntoEnumIterator;

use sitepulse_rs::core::events::{LiveMetrics, LogLevel, ProgressEvent};
use sitepulse_rs::core::models::{AnalysisFinding, Grade, IssueCounts, ModuleKind, ScanReport};
use sitepulse_rs::core::orchestrator::ORCHESTRATOR_PHASE;

pub const SPINNER_CHARS: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Lines kept in the live terminal before the oldest are dropped.
const MAX_LOG_LINES: usize = 2000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    Idle,
    Success(String),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Scanning,
    Finished,
}

/// Which scrollable panel receives Up/Down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    Logs,
    Findings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseState {
    Pending,
    Running,
    Done,
    Failed,
}

#[derive(Debug, Clone)]
pub struct PhaseEntry {
    pub module: ModuleKind,
    pub state: PhaseState,
    pub score: Option<u8>,
    pub grade: Option<Grade>,
    pub issues: IssueCounts,
}

#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub phase: String,
    pub level: LogLevel,
    pub message: String,
}

impl LogLine {
    pub fn local_time(&self) -> String {
        self.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string()
    }
}

/// Latest progress message of the running phase.
#[derive(Debug, Clone, Default)]
pub struct ProgressLine {
    pub phase: String,
    pub percent: u8,
    pub message: String,
}

/// Outcome of the finished scan as announced by its final event.
#[derive(Debug, Clone, Default)]
pub struct ScanSummary {
    pub overall_score: u8,
    pub duration_seconds: Option<u64>,
    pub report_generating: bool,
}

pub struct App {
    pub should_quit: bool,
    pub show_disclaimer: bool,
    pub state: AppState,
    pub input: String,
    pub input_error: Option<String>,
    pub scan_id: Option<String>,
    pub phases: Vec<PhaseEntry>,
    pub logs: Vec<LogLine>,
    pub log_scroll: usize,
    pub follow_logs: bool,
    pub log_scroll_state: ScrollbarState,
    pub progress: Option<ProgressLine>,
    pub live_metrics: Option<LiveMetrics>,
    pub summary: Option<ScanSummary>,
    pub report: Option<ScanReport>,
    pub findings: Vec<(ModuleKind, AnalysisFinding)>,
    pub analysis_list_state: ListState,
    pub focus: Focus,
    pub export_status: ExportStatus,
    pub spinner_frame: usize,
}

impl App {
    pub fn new() -> Self {
        Self {
            should_quit: false,
            show_disclaimer: true,
            state: AppState::Idle,
            input: String::new(),
            input_error: None,
            scan_id: None,
            phases: fresh_phases(),
            logs: Vec::new(),
            log_scroll: 0,
            follow_logs: true,
            log_scroll_state: ScrollbarState::default(),
            progress: None,
            live_metrics: None,
            summary: None,
            report: None,
            findings: Vec::new(),
            analysis_list_state: ListState::default(),
            focus: Focus::Logs,
            export_status: ExportStatus::Idle,
            spinner_frame: 0,
        }
    }

    /// Switches to the scanning view for a freshly queued scan.
    pub fn start_scan(&mut self, scan_id: String) {
        self.reset_results();
        self.scan_id = Some(scan_id);
        self.input_error = None;
        self.state = AppState::Scanning;
    }

    /// Folds one progress event into the view state. Returns `true` once the scan
    /// has reached a terminal state.
    pub fn apply_event(&mut self, event: ProgressEvent) -> bool {
        match event {
            ProgressEvent::Log {
                phase,
                level,
                message,
                timestamp,
            } => {
                if level == LogLevel::Error && message.starts_with("Module failed") {
                    self.mark_phase(&phase, PhaseState::Failed);
                }
                // The orchestrator only reports an error when it aborts the scan, and no
                // scan_complete follows.
                let aborted = level == LogLevel::Error && phase == ORCHESTRATOR_PHASE;
                self.push_log(LogLine {
                    timestamp,
                    phase,
                    level,
                    message,
                });
                if aborted {
                    self.abort_scan();
                    return true;
                }
            }
            ProgressEvent::Progress {
                phase,
                progress_percent,
                message,
                live_metrics,
                ..
            } => {
                if live_metrics.is_some() {
                    self.live_metrics = live_metrics;
                }
                self.progress = Some(ProgressLine {
                    phase,
                    percent: progress_percent,
                    message,
                });
            }
            ProgressEvent::PhaseChange { phase, .. } => {
                // A phase still running when the next starts never completed.
                for entry in self.phases.iter_mut().filter(|p| p.state == PhaseState::Running) {
                    entry.state = PhaseState::Failed;
                }
                self.mark_phase(&phase, PhaseState::Running);
                self.progress = None;
            }
            ProgressEvent::ModuleComplete {
                phase,
                score,
                grade,
                issues_count,
            } => {
                if let Some(entry) = self.phase_mut(&phase) {
                    entry.state = PhaseState::Done;
                    entry.score = Some(score);
                    entry.grade = Some(grade);
                    entry.issues = issues_count;
                }
            }
            ProgressEvent::ScanComplete {
                overall_score,
                duration_seconds,
                report_generating,
            } => {
                for entry in self.phases.iter_mut().filter(|p| p.state == PhaseState::Running) {
                    entry.state = PhaseState::Failed;
                }
                self.summary = Some(ScanSummary {
                    overall_score,
                    duration_seconds,
                    report_generating,
                });
                self.progress = None;
                self.state = AppState::Finished;
                self.focus = Focus::Findings;
                return true;
            }
        }
        false
    }

    /// Ends a scan that stopped without announcing its outcome.
    pub fn abort_scan(&mut self) {
        for entry in self.phases.iter_mut().filter(|p| p.state == PhaseState::Running) {
            entry.state = PhaseState::Failed;
        }
        self.progress = None;
        self.state = AppState::Finished;
        self.focus = Focus::Findings;
    }

    /// Loads the stored report of the finished scan for the findings view.
    pub fn load_report(&mut self, report: ScanReport) {
        self.findings = report
            .modules
            .iter()
            .flat_map(|result| result.analysis().into_iter().map(move |finding| (result.module, finding)))
            .collect();
        self.findings.sort_by_key(|(_, finding)| finding.severity);
        self.analysis_list_state
            .select(if self.findings.is_empty() { None } else { Some(0) });
        self.report = Some(report);
    }

    pub fn overall_score(&self) -> Option<u8> {
        self.summary.as_ref().map(|s| s.overall_score)
    }

    pub fn total_issues(&self) -> IssueCounts {
        self.phases.iter().fold(IssueCounts::default(), |mut acc, p| {
            acc.critical += p.issues.critical;
            acc.high += p.issues.high;
            acc.medium += p.issues.medium;
            acc.low += p.issues.low;
            acc
        })
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Logs => Focus::Findings,
            Focus::Findings => Focus::Logs,
        };
    }

    pub fn scroll_up(&mut self) {
        match self.focus {
            Focus::Logs => {
                self.follow_logs = false;
                self.log_scroll = self.log_scroll.saturating_sub(1);
                self.log_scroll_state = self.log_scroll_state.position(self.log_scroll);
            }
            Focus::Findings => self.analysis_list_state.select_previous(),
        }
    }

    pub fn scroll_down(&mut self) {
        match self.focus {
            Focus::Logs => {
                let last = self.logs.len().saturating_sub(1);
                self.log_scroll = (self.log_scroll + 1).min(last);
                self.follow_logs = self.log_scroll == last;
                self.log_scroll_state = self.log_scroll_state.position(self.log_scroll);
            }
            Focus::Findings => {
                if !self.findings.is_empty() {
                    self.analysis_list_state.select_next();
                }
            }
        }
    }

    pub fn selected_finding(&self) -> Option<&(ModuleKind, AnalysisFinding)> {
        self.analysis_list_state
            .selected()
            .and_then(|index| self.findings.get(index.min(self.findings.len().saturating_sub(1))))
    }

    pub fn on_tick(&mut self) {
        if self.state == AppState::Scanning {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_CHARS.len();
        }
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
    }

    pub fn reset(&mut self) {
        self.reset_results();
        self.state = AppState::Idle;
        self.input = String::new();
        self.input_error = None;
        self.scan_id = None;
    }

    fn reset_results(&mut self) {
        self.phases = fresh_phases();
        self.logs.clear();
        self.log_scroll = 0;
        self.follow_logs = true;
        self.log_scroll_state = ScrollbarState::default();
        self.progress = None;
        self.live_metrics = None;
        self.summary = None;
        self.report = None;
        self.findings.clear();
        self.analysis_list_state = ListState::default();
        self.focus = Focus::Logs;
        self.export_status = ExportStatus::Idle;
    }

    fn push_log(&mut self, line: LogLine) {
        self.logs.push(line);
        if self.logs.len() > MAX_LOG_LINES {
            let overflow = self.logs.len() - MAX_LOG_LINES;
            self.logs.drain(..overflow);
            self.log_scroll = self.log_scroll.saturating_sub(overflow);
        }
        if self.follow_logs {
            self.log_scroll = self.logs.len().saturating_sub(1);
        }
        self.log_scroll_state = self
            .log_scroll_state
            .content_length(self.logs.len())
            .position(self.log_scroll);
    }

    fn phase_mut(&mut self, phase: &str) -> Option<&mut PhaseEntry> {
        if phase == ORCHESTRATOR_PHASE {
            return None;
        }
        self.phases.iter_mut().find(|p| p.module.as_ref() == phase)
    }

    fn mark_phase(&mut self, phase: &str, state: PhaseState) {
        if let Some(entry) = self.phase_mut(phase) {
            entry.state = state;
        }
    }
}

fn fresh_phases() -> Vec<PhaseEntry> {
    ModuleKind::iter()
        .map(|module| PhaseEntry {
            module,
            state: PhaseState::Pending,
            score: None,
            grade: None,
            issues: IssueCounts::default(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sitepulse_rs::core::events::PhaseStatus;
    use sitepulse_rs::core::models::{ModuleResult, ScanRequest, ScanState, Severity};

    fn phase_change(phase: &str, index: usize) -> ProgressEvent {
        ProgressEvent::PhaseChange {
            phase: phase.into(),
            phase_index: index,
            total_phases: 5,
            status: PhaseStatus::Running,
        }
    }

    fn complete(phase: &str, score: u8) -> ProgressEvent {
        ProgressEvent::ModuleComplete {
            phase: phase.into(),
            score,
            grade: Grade::from_score(score),
            issues_count: IssueCounts { critical: 0, high: 1, medium: 0, low: 2 },
        }
    }

    #[test]
    fn phases_track_running_done_and_failed() {
        let mut app = App::new();
        app.start_scan("s1".into());

        app.apply_event(phase_change("dns", 1));
        assert_eq!(app.phases[0].state, PhaseState::Running);
        app.apply_event(complete("dns", 80));
        assert_eq!(app.phases[0].state, PhaseState::Done);
        assert_eq!(app.phases[0].score, Some(80));

        app.apply_event(phase_change("ssl", 2));
        app.apply_event(ProgressEvent::log("ssl", LogLevel::Error, "Module failed: boom"));
        assert_eq!(app.phases[1].state, PhaseState::Failed);

        app.apply_event(phase_change("performance", 3));
        let finished = app.apply_event(ProgressEvent::ScanComplete {
            overall_score: 80,
            duration_seconds: Some(12),
            report_generating: true,
        });
        assert!(finished);
        assert_eq!(app.state, AppState::Finished);
        assert_eq!(app.phases[2].state, PhaseState::Failed);
        assert_eq!(app.phases[3].state, PhaseState::Pending);
        assert_eq!(app.overall_score(), Some(80));
        assert_eq!(app.total_issues().low, 2);
    }

    #[test]
    fn orchestrator_logs_do_not_touch_phases() {
        let mut app = App::new();
        app.start_scan("s1".into());
        let finished = app.apply_event(ProgressEvent::log(ORCHESTRATOR_PHASE, LogLevel::Warning, "Module failed"));
        assert!(!finished);
        assert!(app.phases.iter().all(|p| p.state == PhaseState::Pending));
        assert_eq!(app.logs.len(), 1);
        assert_eq!(app.state, AppState::Scanning);
    }

    #[test]
    fn orchestrator_error_ends_the_scan_without_summary() {
        let mut app = App::new();
        app.start_scan("s1".into());
        app.apply_event(phase_change("dns", 1));
        app.apply_event(ProgressEvent::progress("dns", 40, "resolving", None));

        let finished = app.apply_event(ProgressEvent::log(
            ORCHESTRATOR_PHASE,
            LogLevel::Error,
            "Critical orchestration failure.",
        ));

        assert!(finished);
        assert_eq!(app.state, AppState::Finished);
        assert_eq!(app.phases[0].state, PhaseState::Failed);
        assert!(app.progress.is_none());
        assert!(app.overall_score().is_none());
        assert_eq!(app.logs.last().map(|l| l.message.as_str()), Some("Critical orchestration failure."));
    }

    #[test]
    fn live_metrics_survive_plain_progress() {
        let mut app = App::new();
        let metrics = LiveMetrics {
            active_users: 50,
            total_requests: 400,
            ..Default::default()
        };
        app.apply_event(ProgressEvent::progress("performance", 10, "tick", Some(metrics.clone())));
        app.apply_event(ProgressEvent::progress("performance", 20, "no metrics", None));
        assert_eq!(app.live_metrics, Some(metrics));
        assert_eq!(app.progress.as_ref().map(|p| p.percent), Some(20));
    }

    #[test]
    fn log_scroll_follows_tail_until_user_scrolls() {
        let mut app = App::new();
        for i in 0..5 {
            app.apply_event(ProgressEvent::log("dns", LogLevel::Info, format!("line {i}")));
        }
        assert_eq!(app.log_scroll, 4);

        app.scroll_up();
        app.apply_event(ProgressEvent::log("dns", LogLevel::Info, "line 5"));
        assert_eq!(app.log_scroll, 3);

        app.scroll_down();
        app.scroll_down();
        assert!(app.follow_logs);
    }

    #[test]
    fn report_findings_sorted_by_severity() {
        let mut app = App::new();
        let request = ScanRequest::with_id("s1", "example.com").unwrap();
        let raw = |findings: Vec<AnalysisFinding>| serde_json::json!({ "analysis": findings });
        let report = ScanReport {
            scan: ScanState::new(&request),
            modules: vec![
                ModuleResult {
                    scan_id: "s1".into(),
                    module: ModuleKind::Seo,
                    score: 70,
                    grade: Grade::B,
                    raw_findings: raw(vec![AnalysisFinding::new(Severity::Low, "SEO_CANONICAL_MISSING")]),
                    issue_counts: IssueCounts::default(),
                    created_at: Utc::now(),
                },
                ModuleResult {
                    scan_id: "s1".into(),
                    module: ModuleKind::Ssl,
                    score: 50,
                    grade: Grade::D,
                    raw_findings: raw(vec![AnalysisFinding::new(Severity::Critical, "TLS_CERT_INVALID")]),
                    issue_counts: IssueCounts::default(),
                    created_at: Utc::now(),
                },
            ],
        };

        app.load_report(report);
        assert_eq!(app.findings.len(), 2);
        assert_eq!(app.findings[0].0, ModuleKind::Ssl);
        assert_eq!(app.selected_finding().map(|(_, f)| f.code.as_str()), Some("TLS_CERT_INVALID"));
    }

    #[test]
    fn reset_returns_to_idle() {
        let mut app = App::new();
        app.input = "example.com".into();
        app.start_scan("s1".into());
        app.apply_event(phase_change("dns", 1));
        app.reset();
        assert_eq!(app.state, AppState::Idle);
        assert!(app.input.is_empty());
        assert!(app.phases.iter().all(|p| p.state == PhaseState::Pending));
    }
}
