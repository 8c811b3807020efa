use anyhow::Result;
use archive_core::config::files_with_extension;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PageFrontmatter {
    title: Option<String>,
    date: Option<String>,
    description: Option<String>,
    speakers: Vec<serde_yaml::Value>,
    topics: Vec<serde_yaml::Value>,
    archive_materials: Vec<serde_yaml::Value>,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ValidationReport {
    pub total_files: usize,
    pub has_frontmatter: usize,
    pub has_title: usize,
    pub has_date: usize,
    pub has_description: usize,
    pub has_speakers: usize,
    pub has_topics: usize,
    pub has_materials: usize,
    pub total_speakers: usize,
    pub total_topics: usize,
    pub total_materials: usize,
    pub issues: Vec<String>,
}

fn average(total: usize, files: usize) -> f64 {
    if files == 0 {
        0.0
    } else {
        total as f64 / files as f64
    }
}

impl ValidationReport {
    pub fn avg_speakers(&self) -> f64 {
        average(self.total_speakers, self.has_speakers)
    }

    pub fn avg_topics(&self) -> f64 {
        average(self.total_topics, self.has_topics)
    }

    pub fn avg_materials(&self) -> f64 {
        average(self.total_materials, self.has_materials)
    }

    pub fn percent(&self, count: usize) -> usize {
        if self.total_files == 0 {
            0
        } else {
            100 * count / self.total_files
        }
    }

    /// Checks one page and folds the result into the report.
    pub fn check_page(&mut self, name: &str, content: &str) {
        self.total_files += 1;

        let Some(rest) = content.strip_prefix("---\n") else {
            self.issues.push(format!("{name}: No frontmatter"));
            return;
        };
        self.has_frontmatter += 1;

        let Some(end) = rest.find("\n---") else {
            self.issues.push(format!("{name}: Malformed frontmatter"));
            return;
        };
        let page: PageFrontmatter = match serde_yaml::from_str(&rest[..end]) {
            Ok(page) => page,
            Err(err) => {
                self.issues.push(format!("{name}: Malformed frontmatter ({err})"));
                return;
            }
        };

        let present = |field: &Option<String>| field.as_deref().is_some_and(|v| !v.trim().is_empty());
        if present(&page.title) {
            self.has_title += 1;
        } else {
            self.issues.push(format!("{name}: Missing title"));
        }
        if present(&page.date) {
            self.has_date += 1;
        }
        if present(&page.description) {
            self.has_description += 1;
        }

        if !page.speakers.is_empty() {
            self.has_speakers += 1;
            self.total_speakers += page.speakers.len();
        }
        if !page.topics.is_empty() {
            self.has_topics += 1;
            self.total_topics += page.topics.len();
        }
        if !page.archive_materials.is_empty() {
            self.has_materials += 1;
            self.total_materials += page.archive_materials.len();
        }
    }
}

pub fn validate_dir(content_dir: &Path) -> Result<ValidationReport> {
    let mut report = ValidationReport::default();
    for path in files_with_extension(content_dir, "md")? {
        let content = fs::read_to_string(&path)?;
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        report.check_page(&name, &content);
    }
    Ok(report)
}
