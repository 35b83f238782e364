use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::simulation::monte_carlo::MonteCarloSummary;
use crate::simulation::pacing::PacingBoundResult;
use crate::simulation::report::SimulationReport;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Serialize)]
struct ExportedReport<'a> {
    #[serde(flatten)]
    report: &'a SimulationReport,
    pacing: &'a [PacingBoundResult],
}

/// Writes a report and its pacing results as pretty JSON.
pub fn save_report_json(
    report: &SimulationReport,
    pacing: &[PacingBoundResult],
    path: &Path,
) -> Result<PathBuf, ExportError> {
    let encoded = serde_json::to_string_pretty(&ExportedReport { report, pacing })?;
    write_atomic(path, encoded.as_bytes())?;
    info!(path = %path.display(), "Exported report");
    Ok(path.to_path_buf())
}

/// Writes a Monte Carlo summary (without per-run reports) as pretty JSON.
pub fn save_monte_carlo_json(summary: &MonteCarloSummary, path: &Path) -> Result<PathBuf, ExportError> {
    let encoded = serde_json::to_string_pretty(summary)?;
    write_atomic(path, encoded.as_bytes())?;
    info!(path = %path.display(), runs = summary.runs, "Exported Monte Carlo summary");
    Ok(path.to_path_buf())
}

/// Writes to a temporary sibling, then renames over the target so a partial
/// write never leaves a truncated file behind.
fn write_atomic(path: &Path, data: &[u8]) -> Result<(), ExportError> {
    let io_err = |source| ExportError::Io { path: path.to_path_buf(), source };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report.json".to_string());
    let tmp = path.with_file_name(format!(".{}.tmp", filename));

    if let Err(e) = fs::write(&tmp, data) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(e));
    }
    Ok(())
}
