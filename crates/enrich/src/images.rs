//! Speaker photo discovery on the live page and local download.

use crate::fetch::{Fetch, page_timeout};
use crate::page::Page;
use crate::record::{DownloadCounts, EnrichSettings, save_record};
use anyhow::{Context, Result, bail};
use archive_core::schema::Meeting;
use archive_core::structured::read_json_file;
use archive_core::text::slugify;
use reqwest::Url;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::Path;

pub const MAX_ANCESTOR_LEVELS: usize = 5;
const DEFAULT_EXTENSION: &str = ".jpg";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStrategy {
    FileName,
    Proximity,
    AttachmentClass,
}

impl fmt::Display for ImageStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            ImageStrategy::FileName => "file name",
            ImageStrategy::Proximity => "nearby text",
            ImageStrategy::AttachmentClass => "attachment class",
        };
        write!(f, "{value}")
    }
}

/// An `<img>` whose source mentions the speaker's name.
pub fn find_by_file_name(page: &Page, name: &str) -> Option<String> {
    let lowered = name.to_lowercase();
    let parts: Vec<&str> = lowered.split_whitespace().collect();
    let compact = lowered.replace(['.', ','], "");
    let underscored = compact.replace(' ', "_");
    let dashed = compact.replace(' ', "-");

    page.images().into_iter().find_map(|img| {
        let src = img.attr("src").filter(|src| !src.is_empty())?;
        let lowered_src = src.to_lowercase();
        let by_parts = parts.len() >= 2
            && parts.first().is_some_and(|first| lowered_src.contains(first))
            && parts.last().is_some_and(|last| lowered_src.contains(last));
        (lowered_src.contains(&underscored) || lowered_src.contains(&dashed) || by_parts)
            .then(|| src.to_string())
    })
}

/// WordPress marks inserted attachments with a `wp-image-<id>` class.
pub fn find_by_attachment_class(page: &Page, photo_id: &str) -> Option<String> {
    let class_name = format!("wp-image-{photo_id}");
    page.images().into_iter().find_map(|img| {
        let classes = img.attr("class")?;
        if !classes.split_whitespace().any(|class| class == class_name) {
            return None;
        }
        img.attr("src")
            .filter(|src| !src.is_empty())
            .or_else(|| img.attr("data-src").filter(|src| !src.is_empty()))
            .map(str::to_string)
    })
}

pub fn find_speaker_image(page: &Page, name: &str, photo_id: &str) -> Option<(String, ImageStrategy)> {
    if let Some(src) = find_by_file_name(page, name) {
        return Some((src, ImageStrategy::FileName));
    }
    if let Some(src) = page.image_near_text(name, MAX_ANCESTOR_LEVELS) {
        return Some((src, ImageStrategy::Proximity));
    }
    find_by_attachment_class(page, photo_id).map(|src| (src, ImageStrategy::AttachmentClass))
}

/// Absolute form of `src`, resolved against the page it was found on.
pub fn resolve_url(page_url: &str, src: &str) -> String {
    Url::parse(page_url)
        .and_then(|base| base.join(src))
        .map(|url| url.to_string())
        .unwrap_or_else(|_| src.to_string())
}

fn extension_of(url: &str) -> Option<String> {
    let path = Url::parse(url)
        .map(|url| url.path().to_string())
        .unwrap_or_else(|_| url.split(['?', '#']).next().unwrap_or_default().to_string());
    let ext = Path::new(&path).extension()?.to_str()?;
    Some(format!(".{ext}"))
}

/// `<speaker-slug>_<photo id><ext>`
pub fn image_file_name(name: &str, photo_id: &str, url: &str) -> String {
    let ext = extension_of(url).unwrap_or_else(|| DEFAULT_EXTENSION.to_string());
    format!("{}_{photo_id}{ext}", slugify(name))
}

pub fn download_to(fetcher: &dyn Fetch, url: &str, target: &Path, settings: &EnrichSettings) -> Result<u64> {
    let body = fetcher.fetch(url, page_timeout(&settings.fetch))?;
    fs::write(target, &body).with_context(|| format!("failed to write {}", target.display()))?;
    Ok(body.len() as u64)
}

/// Finds and downloads a photo for every speaker with a photo id, setting
/// `photo_local_path` on success. Each photo id is fetched at most once.
pub fn enrich_images(
    meeting: &mut Meeting,
    page: &Page,
    fetcher: &dyn Fetch,
    settings: &EnrichSettings,
) -> Result<DownloadCounts> {
    fs::create_dir_all(&settings.images_dir)?;
    let page_url = meeting.metadata.link.clone();
    let mut counts = DownloadCounts::default();
    let mut done: HashMap<String, Option<String>> = HashMap::new();

    for topic in &mut meeting.topics {
        for speaker in &mut topic.speakers {
            if speaker.photo_id.is_empty() {
                continue;
            }
            if let Some(local) = done.get(&speaker.photo_id) {
                if local.is_some() {
                    speaker.photo_local_path = local.clone();
                }
                continue;
            }

            let Some((src, strategy)) = find_speaker_image(page, &speaker.name, &speaker.photo_id) else {
                tracing::warn!("no image found for {} (photo {})", speaker.name, speaker.photo_id);
                done.insert(speaker.photo_id.clone(), None);
                continue;
            };

            let url = resolve_url(&page_url, &src);
            let file_name = image_file_name(&speaker.name, &speaker.photo_id, &url);
            let target = settings.images_dir.join(&file_name);
            tracing::debug!("image for {} found by {strategy}: {url}", speaker.name);

            let local = match download_to(fetcher, &url, &target, settings) {
                Ok(bytes) => {
                    tracing::info!("saved {} ({bytes} bytes)", target.display());
                    counts.downloaded += 1;
                    let local = format!("{}/{file_name}", settings.image_prefix);
                    speaker.photo_local_path = Some(local.clone());
                    Some(local)
                }
                Err(err) => {
                    tracing::warn!("download failed for {}: {err:#}", speaker.name);
                    counts.failed += 1;
                    None
                }
            };
            done.insert(speaker.photo_id.clone(), local);
        }
    }
    Ok(counts)
}

/// Fetches the record's live page once and downloads speaker photos.
pub fn process_images_file(
    json_path: &Path,
    xml_path: Option<&Path>,
    fetcher: &dyn Fetch,
    settings: &EnrichSettings,
) -> Result<DownloadCounts> {
    let mut meeting = read_json_file(json_path)
        .with_context(|| format!("failed to load {}", json_path.display()))?;
    if !meeting.has_photo_ids() {
        tracing::info!("{}: no speakers with photo ids", json_path.display());
        return Ok(DownloadCounts::default());
    }
    if meeting.metadata.link.is_empty() {
        bail!("{} has no page link", json_path.display());
    }

    let html = fetcher.fetch_text(&meeting.metadata.link, page_timeout(&settings.fetch))?;
    let page = Page::parse(&html);
    let counts = enrich_images(&mut meeting, &page, fetcher, settings)?;

    if counts.downloaded > 0 {
        save_record(&meeting, json_path, xml_path)?;
    }
    Ok(counts)
}

pub fn has_photo_ids(json_path: &Path) -> bool {
    read_json_file(json_path)
        .map(|meeting| meeting.has_photo_ids())
        .unwrap_or_else(|err| {
            tracing::warn!("skipping {}: {err}", json_path.display());
            false
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> Page {
        Page::parse(html)
    }

    #[test]
    fn file_name_strategy_accepts_name_variants() {
        let p = page(
            r#"<img src="https://x.org/a.png"><img src="https://x.org/uploads/Mary-Ann_Lee-300x300.jpg">"#,
        );
        assert_eq!(
            find_by_file_name(&p, "Mary-Ann Lee").as_deref(),
            Some("https://x.org/uploads/Mary-Ann_Lee-300x300.jpg")
        );
        let p = page(r#"<img src="/uploads/headshot_john_q_doe.png">"#);
        assert_eq!(
            find_by_file_name(&p, "John Q. Doe").as_deref(),
            Some("/uploads/headshot_john_q_doe.png")
        );
        assert_eq!(find_by_file_name(&p, "Jane"), None);
    }

    #[test]
    fn attachment_class_uses_data_src_fallback() {
        let p = page(r#"<img class="lazy wp-image-501" data-src="https://x.org/lazy.jpg"><img class="wp-image-5011" src="https://x.org/other.jpg">"#);
        assert_eq!(
            find_by_attachment_class(&p, "501").as_deref(),
            Some("https://x.org/lazy.jpg")
        );
    }

    #[test]
    fn strategies_run_in_order() {
        let p = page(
            r#"<div><img src="https://x.org/p1.jpg"><span>Gatis Roze</span></div><img class="wp-image-9" src="https://x.org/p2.jpg">"#,
        );
        assert_eq!(
            find_speaker_image(&p, "Gatis Roze", "9"),
            Some(("https://x.org/p1.jpg".to_string(), ImageStrategy::Proximity))
        );
        assert_eq!(
            find_speaker_image(&p, "Nobody Here", "9"),
            Some(("https://x.org/p2.jpg".to_string(), ImageStrategy::AttachmentClass))
        );
    }

    #[test]
    fn file_names_keep_extension_and_resolve_relative_urls() {
        assert_eq!(
            image_file_name("José Ortiz", "77", "https://x.org/i/photo.PNG?ver=2"),
            "jose-ortiz_77.PNG"
        );
        assert_eq!(image_file_name("Al Ng", "3", "https://x.org/avatar"), "al-ng_3.jpg");
        assert_eq!(
            resolve_url("https://x.org/2021/04/archive/", "/wp-content/a.jpg"),
            "https://x.org/wp-content/a.jpg"
        );
    }
}
