use anyhow::{Context, Result, bail};
use archive_core::config::{Config, FetchConfig, ProjectPaths};
use archive_core::schema::Meeting;
use archive_core::structured::{read_json_file, read_structured_xml, write_record};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Where downloads land and how they are referenced from records.
#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub images_dir: PathBuf,
    pub materials_dir: PathBuf,
    pub image_prefix: String,
    pub material_prefix: String,
    pub fetch: FetchConfig,
}

impl EnrichSettings {
    pub fn new(paths: &ProjectPaths, config: &Config) -> Self {
        Self {
            images_dir: paths.images_dir.clone(),
            materials_dir: paths.materials_dir.clone(),
            image_prefix: config.paths.image_prefix.trim_end_matches('/').to_string(),
            material_prefix: config.paths.material_prefix.trim_end_matches('/').to_string(),
            fetch: config.fetch.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DownloadCounts {
    pub downloaded: usize,
    pub failed: usize,
}

/// Loads a structured record from `.json` or `.xml`.
pub fn load_record(path: &Path) -> Result<Meeting> {
    let meeting = match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => read_json_file(path)?,
        Some("xml") => read_structured_xml(path)?,
        _ => bail!("{} is neither a .json nor an .xml record", path.display()),
    };
    Ok(meeting)
}

/// Rewrites the JSON record and regenerates its XML twin when one exists.
pub fn save_record(meeting: &Meeting, json_path: &Path, xml_path: Option<&Path>) -> Result<()> {
    let xml_path = xml_path.filter(|path| path.exists());
    write_record(meeting, json_path, xml_path)
        .with_context(|| format!("failed to update {}", json_path.display()))?;
    if let Some(xml_path) = xml_path {
        tracing::info!("regenerated {}", xml_path.display());
    }
    Ok(())
}
