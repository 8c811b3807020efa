use anyhow::Result;
use archive_core::schema::{Meeting, Topic};
use archive_core::structured::read_json_file;
use archive_core::text::{slugify, truncate_chars};
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

const DESCRIPTION_LIMIT: usize = 200;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Frontmatter<'a> {
    title: &'a str,
    date: &'a str,
    slug: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    event_date: &'a str,
    archive_status: &'static str,
    speakers: Vec<SpeakerEntry<'a>>,
    topics: Vec<TopicEntry<'a>>,
    archive_materials: Vec<MaterialEntry<'a>>,
}

#[derive(Debug, Serialize)]
struct SpeakerEntry<'a> {
    name: &'a str,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    photo: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TopicEntry<'a> {
    number: u32,
    title: &'a str,
    speakers: Vec<&'a str>,
    key_points: &'a [String],
    #[serde(skip_serializing_if = "str::is_empty")]
    description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MaterialEntry<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    label: &'a str,
    url: &'a str,
    topic: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    local_path: Option<&'a str>,
}

/// Page slug: the WordPress post name, else the slugified title.
pub fn slug_for(meeting: &Meeting) -> String {
    let metadata = &meeting.metadata;
    if !metadata.post_name.trim().is_empty() {
        return metadata.post_name.trim().to_string();
    }
    let slug = slugify(&metadata.title);
    if slug.is_empty() {
        metadata.post_id.clone()
    } else {
        slug
    }
}

fn short_description(meeting: &Meeting) -> Option<String> {
    let description = meeting
        .topics
        .iter()
        .map(|topic| topic.presentation.description.trim())
        .find(|description| !description.is_empty())?;
    let truncated = truncate_chars(description, DESCRIPTION_LIMIT);
    if truncated.len() < description.len() {
        Some(format!("{}...", truncated.trim_end()))
    } else {
        Some(truncated.to_string())
    }
}

fn frontmatter(meeting: &Meeting) -> Frontmatter<'_> {
    let mut seen = HashSet::new();
    let speakers = meeting
        .topics
        .iter()
        .flat_map(|topic| &topic.speakers)
        .filter(|speaker| seen.insert((speaker.name.as_str(), speaker.title.as_str())))
        .map(|speaker| SpeakerEntry {
            name: &speaker.name,
            title: &speaker.title,
            photo: speaker.photo_local_path.as_deref(),
        })
        .collect();

    let topics = meeting
        .topics
        .iter()
        .map(|topic| TopicEntry {
            number: topic.id,
            title: &topic.presentation.title,
            speakers: topic.speakers.iter().map(|speaker| speaker.name.as_str()).collect(),
            key_points: &topic.presentation.learning_outcomes,
            description: &topic.presentation.description,
        })
        .collect();

    let archive_materials = meeting
        .topics
        .iter()
        .flat_map(|topic| topic.materials.iter().map(move |material| (topic.id, material)))
        .map(|(topic, material)| MaterialEntry {
            kind: material.kind.as_str(),
            label: &material.label,
            url: &material.url,
            topic,
            local_path: material.local_path.as_deref(),
        })
        .collect();

    Frontmatter {
        title: &meeting.metadata.title,
        date: &meeting.metadata.post_date,
        slug: slug_for(meeting),
        description: short_description(meeting),
        event_date: &meeting.event.date,
        archive_status: "archived",
        speakers,
        topics,
        archive_materials,
    }
}

fn render_topic(md: &mut String, topic: &Topic) {
    let title = if topic.presentation.title.is_empty() {
        "Untitled presentation"
    } else {
        topic.presentation.title.as_str()
    };
    md.push_str(&format!("## Topic {}: {}\n\n", topic.id, title));

    if !topic.speakers.is_empty() {
        let names: Vec<&str> = topic.speakers.iter().map(|s| s.name.as_str()).collect();
        md.push_str(&format!("**Speakers:** {}\n\n", names.join(", ")));
    }
    if !topic.presentation.description.is_empty() {
        md.push_str(&topic.presentation.description);
        md.push_str("\n\n");
    }
    if !topic.presentation.learning_outcomes.is_empty() {
        md.push_str("### Key points\n");
        for point in topic.presentation.learning_outcomes.iter().filter(|point| !point.is_empty()) {
            md.push_str(&format!("- {point}\n"));
        }
        md.push('\n');
    }
    if !topic.materials.is_empty() {
        md.push_str("### Materials\n");
        for material in &topic.materials {
            let target = material.local_path.as_deref().unwrap_or(&material.url);
            md.push_str(&format!("- [{}]({}) ({})\n", material.label, target, material.kind));
        }
        md.push('\n');
    }
}

pub fn render_markdown(meeting: &Meeting) -> Result<String> {
    let yaml = serde_yaml::to_string(&frontmatter(meeting))?;

    let mut md = String::new();
    md.push_str("---\n");
    md.push_str(&yaml);
    md.push_str("---\n\n");

    md.push_str(&format!("# {}\n\n", meeting.metadata.title));
    if meeting.topics.is_empty() {
        md.push_str("_No topics found._\n");
    }
    for topic in &meeting.topics {
        render_topic(&mut md, topic);
    }
    Ok(md)
}

pub fn write_meeting_page(content_dir: &Path, meeting: &Meeting) -> Result<PathBuf> {
    let path = content_dir.join(format!("{}.md", slug_for(meeting)));
    fs::write(&path, render_markdown(meeting)?)?;
    Ok(path)
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub written: Vec<PathBuf>,
    pub failed: usize,
}

/// Renders every structured JSON record; a bad record is logged and skipped.
pub fn render_records(json_files: &[PathBuf], content_dir: &Path) -> Result<RenderSummary> {
    fs::create_dir_all(content_dir)?;
    let mut summary = RenderSummary::default();

    for json_path in json_files {
        let page = read_json_file(json_path)
            .map_err(anyhow::Error::from)
            .and_then(|meeting| write_meeting_page(content_dir, &meeting));
        match page {
            Ok(path) => {
                tracing::info!("rendered {}", path.display());
                summary.written.push(path);
            }
            Err(err) => {
                tracing::error!("failed to render {}: {err:#}", json_path.display());
                summary.failed += 1;
            }
        }
    }
    Ok(summary)
}
