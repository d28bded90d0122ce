// src/main.rs

use color_eyre::eyre::Result;
use crossterm::{
    ExecutableCommand,
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::io::{Stdout, stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{error, info, warn};

use sitepulse_rs::config::ScanConfig;
use sitepulse_rs::core::events::ProgressEvent;
use sitepulse_rs::core::export::{default_export_dir, export_scan};
use sitepulse_rs::core::jobs::{JobQueue, Worker};
use sitepulse_rs::core::models::ScanRequest;
use sitepulse_rs::core::orchestrator::Orchestrator;
use sitepulse_rs::core::scanner::default_scanners;
use sitepulse_rs::core::sink::SinkRegistry;
use sitepulse_rs::core::store::MemoryStore;
use sitepulse_rs::logging::initialize_logging;

mod app;
mod ui;

use app::{App, AppState, ExportStatus};

/// Handles shared by the event loop.
struct Services {
    registry: Arc<SinkRegistry>,
    store: Arc<MemoryStore>,
    queue: JobQueue,
    export_dir: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let log_path = initialize_logging()?;
    let config = Arc::new(ScanConfig::from_env()?);
    info!(log = %log_path.display(), tiers = config.load_tiers.len(), "Starting up.");

    // --- Engine ---
    let registry = Arc::new(SinkRegistry::new());
    let store = Arc::new(MemoryStore::new());
    let orchestrator = Arc::new(Orchestrator::new(
        default_scanners(config.clone()),
        store.clone(),
        registry.clone(),
    ));
    let (queue, jobs) = JobQueue::new();
    let (report_tx, mut report_rx) = mpsc::unbounded_channel();
    tokio::spawn(Worker::new(orchestrator, Arc::new(queue.clone()), report_tx).run(jobs));

    let services = Services {
        registry,
        store,
        queue,
        export_dir: default_export_dir(),
    };

    // --- Terminal ---
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    enable_raw_mode()?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut app = App::new();
    let outcome = run_app(&mut terminal, &mut app, &services, &mut report_rx).await;

    stdout().execute(LeaveAlternateScreen)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    info!("Shutting down.");
    outcome
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    app: &mut App,
    services: &Services,
    reports: &mut mpsc::UnboundedReceiver<String>,
) -> Result<()> {
    let mut events: Option<mpsc::UnboundedReceiver<ProgressEvent>> = None;

    while !app.should_quit {
        terminal.draw(|frame| ui::render(app, frame))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    handle_key(app, key.code, services, &mut events).await;
                }
            }
        }

        drain_progress(app, services, &mut events).await;

        // Report jobs of completed scans.
        while let Ok(scan_id) = reports.try_recv() {
            info!(scan_id = %scan_id, "Generating report.");
            let status = export(services, &scan_id).await;
            if app.scan_id.as_deref() == Some(scan_id.as_str()) {
                app.export_status = status;
            }
        }

        app.on_tick();
    }
    Ok(())
}

/// Applies every event queued for the current scan.
async fn drain_progress(
    app: &mut App,
    services: &Services,
    events: &mut Option<mpsc::UnboundedReceiver<ProgressEvent>>,
) {
    let Some(rx) = events.as_mut() else {
        return;
    };

    let mut finished = false;
    loop {
        match rx.try_recv() {
            Ok(event) => finished |= app.apply_event(event),
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                warn!("Progress stream closed before the scan finished.");
                if app.state == AppState::Scanning {
                    app.abort_scan();
                }
                finished = true;
                break;
            }
        }
    }

    if finished {
        *events = None;
        if let Some(scan_id) = app.scan_id.clone() {
            services.registry.unregister(&scan_id).await;
            if let Some(report) = services.store.report(&scan_id).await {
                app.load_report(report);
            }
        }
    }
}

async fn handle_key(
    app: &mut App,
    key_code: KeyCode,
    services: &Services,
    events: &mut Option<mpsc::UnboundedReceiver<ProgressEvent>>,
) {
    if app.show_disclaimer {
        match key_code {
            KeyCode::Enter => app.show_disclaimer = false,
            KeyCode::Char('q') | KeyCode::Char('Q') => app.quit(),
            _ => {}
        }
        return;
    }

    match app.state {
        AppState::Idle => match key_code {
            KeyCode::Char('q') | KeyCode::Char('Q') if app.input.is_empty() => app.quit(),
            KeyCode::Char(c) => app.input.push(c),
            KeyCode::Backspace => {
                app.input.pop();
            }
            KeyCode::Esc => app.input.clear(),
            KeyCode::Enter => start_scan(app, services, events).await,
            _ => {}
        },
        AppState::Scanning => match key_code {
            KeyCode::Char('q') | KeyCode::Char('Q') => app.quit(),
            KeyCode::Up => app.scroll_up(),
            KeyCode::Down => app.scroll_down(),
            _ => {}
        },
        AppState::Finished => match key_code {
            KeyCode::Char('q') | KeyCode::Char('Q') => app.quit(),
            KeyCode::Char('n') | KeyCode::Char('N') => app.reset(),
            KeyCode::Char('e') | KeyCode::Char('E') => {
                if let Some(scan_id) = app.scan_id.clone() {
                    app.export_status = export(services, &scan_id).await;
                }
            }
            KeyCode::Tab => app.toggle_focus(),
            KeyCode::Up => app.scroll_up(),
            KeyCode::Down => app.scroll_down(),
            _ => {}
        },
    }
}

/// Registers the progress destination first so no event of the new scan is missed.
async fn start_scan(
    app: &mut App,
    services: &Services,
    events: &mut Option<mpsc::UnboundedReceiver<ProgressEvent>>,
) {
    let request = match ScanRequest::new(&app.input) {
        Ok(request) => request,
        Err(e) => {
            app.input_error = Some(e.to_string());
            return;
        }
    };

    let scan_id = request.scan_id.clone();
    let rx = services.registry.register(&scan_id).await;
    match services.queue.submit_scan(request) {
        Ok(()) => {
            info!(scan_id = %scan_id, target = %app.input, "Scan queued.");
            *events = Some(rx);
            app.start_scan(scan_id);
        }
        Err(e) => {
            services.registry.unregister(&scan_id).await;
            app.input_error = Some(e.to_string());
        }
    }
}

async fn export(services: &Services, scan_id: &str) -> ExportStatus {
    match export_scan(&services.store, scan_id, &services.export_dir).await {
        Ok(path) => ExportStatus::Success(path.display().to_string()),
        Err(e) => {
            error!(scan_id, error = %e, "Report export failed.");
            ExportStatus::Error(e.to_string())
        }
    }
}
