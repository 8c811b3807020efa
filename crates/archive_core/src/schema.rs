use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

pub const ARCHIVED: &str = "ARCHIVED";
pub const UNKNOWN_DATE: &str = "Unknown";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Meeting {
    pub metadata: MeetingMetadata,
    #[serde(default)]
    pub custom_fields: Vec<CustomField>,
    #[serde(default)]
    pub event: Event,
    #[serde(default)]
    pub topics: Vec<Topic>,
}

impl Meeting {
    pub fn speaker_count(&self) -> usize {
        self.topics.iter().map(|topic| topic.speakers.len()).sum()
    }

    pub fn material_count(&self) -> usize {
        self.topics.iter().map(|topic| topic.materials.len()).sum()
    }

    pub fn has_photo_ids(&self) -> bool {
        self.topics
            .iter()
            .flat_map(|topic| &topic.speakers)
            .any(|speaker| !speaker.photo_id.is_empty())
    }

    pub fn speaker_names(&self) -> Vec<&str> {
        self.topics
            .iter()
            .flat_map(|topic| &topic.speakers)
            .map(|speaker| speaker.name.as_str())
            .collect()
    }

    pub fn material_urls(&self) -> Vec<&str> {
        self.topics
            .iter()
            .flat_map(|topic| &topic.materials)
            .map(|material| material.url.as_str())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct MeetingMetadata {
    pub title: String,
    pub link: String,      // live page, used by enrichment and verification
    pub post_id: String,
    pub post_name: String, // WordPress slug
    pub post_date: String, // "YYYY-MM-DD HH:MM:SS" as exported
    pub category: String,
    pub creator: String,
}

impl MeetingMetadata {
    pub fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("title", &self.title),
            ("link", &self.link),
            ("post_id", &self.post_id),
            ("post_name", &self.post_name),
            ("post_date", &self.post_date),
            ("category", &self.category),
            ("creator", &self.creator),
        ]
    }

    /// Returns false for keys outside the metadata block.
    pub fn set(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "title" => &mut self.title,
            "link" => &mut self.link,
            "post_id" => &mut self.post_id,
            "post_name" => &mut self.post_name,
            "post_date" => &mut self.post_date,
            "category" => &mut self.category,
            "creator" => &mut self.creator,
            _ => return false,
        };
        *slot = value;
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CustomField {
    pub meta_key: String,
    pub meta_value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Event {
    pub date: String,   // e.g. "Saturday, April 17, 2021"
    pub status: String, // always ARCHIVED for migrated posts
}

impl Default for Event {
    fn default() -> Self {
        Self {
            date: UNKNOWN_DATE.to_string(),
            status: ARCHIVED.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Topic {
    pub id: u32, // 1-based, follows the order of TOPIC markers
    #[serde(default)]
    pub speakers: Vec<Speaker>,
    #[serde(default)]
    pub presentation: Presentation,
    #[serde(default)]
    pub materials: Vec<Material>,
}

impl Topic {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Speaker {
    pub name: String,
    pub title: String,
    pub bio: String,
    pub photo_id: String, // WordPress attachment id
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_local_path: Option<String>,
}

impl Speaker {
    /// Name fragments long enough to identify a speaker inside free text.
    pub fn name_fragments(&self) -> impl Iterator<Item = &str> {
        self.name.split_whitespace().filter(|part| part.chars().count() > 3)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Presentation {
    pub title: String,
    pub description: String,
    pub learning_outcomes: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Material {
    #[serde(rename = "type")]
    pub kind: MaterialKind,
    pub url: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<String>,
}

impl Material {
    pub fn new(kind: MaterialKind, url: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            label: label.into(),
            local_path: None,
        }
    }

    /// URL with trailing slashes removed, used to de-duplicate buttons.
    pub fn normalized_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    pub fn is_downloadable(&self) -> bool {
        let url = self.url.to_lowercase();
        self.kind == MaterialKind::Slides || url.contains(".pdf") || url.contains(".ppt")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    Slides,
    Recording,
    Document,
}

impl MaterialKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MaterialKind::Slides => "slides",
            MaterialKind::Recording => "recording",
            MaterialKind::Document => "document",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "slides" => Some(MaterialKind::Slides),
            "recording" => Some(MaterialKind::Recording),
            "document" => Some(MaterialKind::Document),
            _ => None,
        }
    }

    /// Classifies a button by its label and link target.
    pub fn classify(label: &str, url: &str) -> Self {
        const SLIDE_EXTENSIONS: &[&str] = &[".pdf", ".ppt", ".pptx"];
        const DOCUMENT_EXTENSIONS: &[&str] = &[".doc", ".docx", ".xls", ".xlsx", ".txt", ".csv"];

        let label = label.to_lowercase();
        let path = url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .trim_end_matches('/')
            .to_lowercase();

        if label.contains("slides") || SLIDE_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            MaterialKind::Slides
        } else if DOCUMENT_EXTENSIONS.iter().any(|ext| path.ends_with(ext)) {
            MaterialKind::Document
        } else {
            MaterialKind::Recording
        }
    }
}

impl fmt::Display for MaterialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_slides_by_label_or_extension() {
        assert_eq!(
            MaterialKind::classify("View Slides", "https://example.org/watch"),
            MaterialKind::Slides
        );
        assert_eq!(
            MaterialKind::classify("Handout", "https://example.org/deck.PDF"),
            MaterialKind::Slides
        );
    }

    #[test]
    fn classify_documents_and_recordings() {
        assert_eq!(
            MaterialKind::classify("Spreadsheet", "https://example.org/model.xlsx?dl=1"),
            MaterialKind::Document
        );
        assert_eq!(
            MaterialKind::classify("Watch Recording", "https://youtu.be/abc"),
            MaterialKind::Recording
        );
        assert_eq!(
            MaterialKind::classify("Discussion", "https://community.example.org/t/1"),
            MaterialKind::Recording
        );
    }

    #[test]
    fn material_type_serializes_as_lowercase_tag() {
        let material = Material::new(MaterialKind::Slides, "https://x.org/a.pdf", "Slides");
        let json = serde_json::to_value(&material).unwrap();
        assert_eq!(json["type"], "slides");
        assert!(json.get("local_path").is_none());
    }

    #[test]
    fn metadata_set_rejects_unknown_keys() {
        let mut metadata = MeetingMetadata::default();
        assert!(metadata.set("post_id", "14812".to_string()));
        assert!(!metadata.set("status", "x".to_string()));
        assert_eq!(metadata.post_id, "14812");
    }
}
