// src/core/export.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::core::error::ExportError;
use crate::core::models::ScanReport;
use crate::core::store::MemoryStore;
use crate::logging::get_data_dir;

/// Default location of exported reports inside the application data directory.
pub fn default_export_dir() -> PathBuf {
    get_data_dir().join("reports")
}

/// Writes `report` as pretty JSON to `<dir>/scan-<id>.json` and returns the path.
pub fn export_report(report: &ScanReport, dir: &Path) -> Result<PathBuf, ExportError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(format!("scan-{}.json", report.scan.scan_id));
    let json = serde_json::to_string_pretty(report)?;
    fs::write(&path, json)?;
    info!(path = %path.display(), modules = report.modules.len(), "Report exported.");
    Ok(path)
}

/// Exports the stored report of `scan_id`.
pub async fn export_scan(store: &MemoryStore, scan_id: &str, dir: &Path) -> Result<PathBuf, ExportError> {
    let report = store
        .report(scan_id)
        .await
        .ok_or_else(|| ExportError::UnknownScan(scan_id.to_string()))?;
    export_report(&report, dir)
}
