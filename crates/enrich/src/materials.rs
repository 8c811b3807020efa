use crate::fetch::{Fetch, material_timeout};
use crate::record::{DownloadCounts, EnrichSettings, save_record};
use anyhow::{Context, Result};
use archive_core::schema::Meeting;
use archive_core::structured::read_json_file;
use archive_core::text::sanitize_filename;
use reqwest::Url;
use std::fs;
use std::path::Path;

/// Target file name for a downloadable material. URLs without a usable file
/// name get `material_<topic>_<index>.<ext>`.
pub fn material_file_name(url: &str, topic_id: u32, index: usize) -> String {
    let from_url = Url::parse(url)
        .ok()
        .and_then(|parsed| {
            parsed
                .path_segments()
                .and_then(|mut segments| segments.next_back().map(str::to_string))
        })
        .filter(|name| name.contains('.'));

    let name = from_url.unwrap_or_else(|| {
        let ext = if url.to_lowercase().contains(".pdf") {
            "pdf"
        } else {
            "ppt"
        };
        format!("material_{topic_id}_{index}.{ext}")
    });
    sanitize_filename(&name)
}

pub fn has_downloadable_materials(meeting: &Meeting) -> bool {
    meeting
        .topics
        .iter()
        .flat_map(|topic| &topic.materials)
        .any(|material| material.is_downloadable())
}

/// Downloads slides and document files, setting `local_path` on success.
pub fn enrich_materials(
    meeting: &mut Meeting,
    fetcher: &dyn Fetch,
    settings: &EnrichSettings,
) -> Result<DownloadCounts> {
    fs::create_dir_all(&settings.materials_dir)?;
    let timeout = material_timeout(&settings.fetch);
    let mut counts = DownloadCounts::default();

    for topic in &mut meeting.topics {
        let topic_id = topic.id;
        for (index, material) in topic.materials.iter_mut().enumerate() {
            if !material.is_downloadable() {
                continue;
            }

            let file_name = material_file_name(&material.url, topic_id, index);
            let target = settings.materials_dir.join(&file_name);

            let saved = fetcher.fetch(&material.url, timeout).and_then(|body| {
                fs::write(&target, &body)
                    .with_context(|| format!("failed to write {}", target.display()))?;
                Ok(body.len())
            });
            match saved {
                Ok(bytes) => {
                    tracing::info!("saved '{}' to {} ({bytes} bytes)", material.label, target.display());
                    material.local_path = Some(format!("{}/{file_name}", settings.material_prefix));
                    counts.downloaded += 1;
                }
                Err(err) => {
                    tracing::warn!("download failed for '{}': {err:#}", material.label);
                    counts.failed += 1;
                }
            }
        }
    }
    Ok(counts)
}

pub fn process_materials_file(
    json_path: &Path,
    xml_path: Option<&Path>,
    fetcher: &dyn Fetch,
    settings: &EnrichSettings,
) -> Result<DownloadCounts> {
    let mut meeting = read_json_file(json_path)
        .with_context(|| format!("failed to load {}", json_path.display()))?;
    if !has_downloadable_materials(&meeting) {
        tracing::info!("{}: no downloadable materials", json_path.display());
        return Ok(DownloadCounts::default());
    }

    let counts = enrich_materials(&mut meeting, fetcher, settings)?;
    if counts.downloaded > 0 {
        save_record(&meeting, json_path, xml_path)?;
    }
    Ok(counts)
}

pub fn file_has_downloadable_materials(json_path: &Path) -> bool {
    read_json_file(json_path)
        .map(|meeting| has_downloadable_materials(&meeting))
        .unwrap_or_else(|err| {
            tracing::warn!("skipping {}: {err}", json_path.display());
            false
        })
}
