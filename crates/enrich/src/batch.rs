use crate::record::DownloadCounts;
use anyhow::Result;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const IMAGE_REPORT: &str = "image-download-report.json";
pub const MATERIAL_REPORT: &str = "material-download-report.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub status: &'static str,
    pub downloaded: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub generated_at: String,
    pub total_files: usize,
    pub processed_files: usize,
    pub total_downloaded: usize,
    pub total_failed: usize,
    pub files: Vec<FileOutcome>,
}

pub fn timestamp() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| OffsetDateTime::now_utc().unix_timestamp().to_string())
}

/// Runs `process` over every file, pausing `delay` between files. A failing
/// file is recorded and the batch moves on.
pub fn run_batch(
    files: &[PathBuf],
    delay: Duration,
    mut process: impl FnMut(&Path) -> Result<DownloadCounts>,
) -> BatchReport {
    let mut report = BatchReport {
        generated_at: timestamp(),
        total_files: files.len(),
        processed_files: 0,
        total_downloaded: 0,
        total_failed: 0,
        files: Vec::with_capacity(files.len()),
    };

    for (idx, path) in files.iter().enumerate() {
        if idx > 0 && !delay.is_zero() {
            std::thread::sleep(delay);
        }
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!("[{}/{}] {filename}", idx + 1, files.len());

        match process(path) {
            Ok(counts) => {
                report.processed_files += 1;
                report.total_downloaded += counts.downloaded;
                report.total_failed += counts.failed;
                report.files.push(FileOutcome {
                    filename,
                    status: "success",
                    downloaded: counts.downloaded,
                    failed: counts.failed,
                    error: None,
                });
            }
            Err(err) => {
                tracing::error!("{filename}: {err:#}");
                report.files.push(FileOutcome {
                    filename,
                    status: "error",
                    downloaded: 0,
                    failed: 0,
                    error: Some(format!("{err:#}")),
                });
            }
        }
    }
    report
}

pub fn write_report(report: &BatchReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(report)?)?;
    Ok(())
}
