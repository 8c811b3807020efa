//! Compares an extracted record against the live page it came from.

use crate::batch::timestamp;
use crate::fetch::{Fetch, page_timeout};
use crate::page::Page;
use crate::record::load_record;
use anyhow::{Result, bail};
use archive_core::config::FetchConfig;
use archive_core::schema::{Meeting, Topic};
use regex::Regex;
use serde::Serialize;
use std::path::Path;
use std::sync::LazyLock;

static TOPIC_HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bTOPIC\s+\d+").expect("valid topic heading regex"));

pub const TITLE_THRESHOLD: f64 = 0.7;
pub const URL_THRESHOLD: f64 = 0.9;
const MATERIAL_LINK_HINTS: &[&str] = &["youtube.com", "youtu.be", ".pdf", "community"];

pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Case-insensitive similarity in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a = a.trim().to_lowercase();
    let b = b.trim().to_lowercase();
    let longest = a.chars().count().max(b.chars().count());
    if longest == 0 {
        return 1.0;
    }
    1.0 - levenshtein(&a, &b) as f64 / longest as f64
}

pub fn is_material_link(href: &str) -> bool {
    let lowered = href.to_lowercase();
    MATERIAL_LINK_HINTS.iter().any(|hint| lowered.contains(hint))
}

/// What the live page exposes for comparison.
#[derive(Debug, Clone, Default)]
pub struct PageSummary {
    pub text: String,
    pub headings: Vec<String>,
    pub topic_headings: usize,
    pub material_links: Vec<String>,
}

impl PageSummary {
    pub fn from_page(page: &Page) -> Self {
        let headings = page.headings(&["h1", "h2", "h3", "h4"]);
        let topic_headings = page
            .headings(&["h2", "h3"])
            .iter()
            .filter(|heading| TOPIC_HEADING_RE.is_match(heading))
            .count();
        let material_links = page
            .links()
            .into_iter()
            .filter(|href| is_material_link(href))
            .collect();
        Self {
            text: page.text().to_lowercase(),
            headings,
            topic_headings,
            material_links,
        }
    }

    fn has_link(&self, url: &str) -> bool {
        let wanted = url.trim().trim_end_matches('/');
        self.material_links.iter().any(|href| {
            let href = href.trim_end_matches('/');
            href == wanted || similarity(href, wanted) >= URL_THRESHOLD
        })
    }

    fn best_title_score(&self, title: &str) -> f64 {
        let lowered = title.to_lowercase();
        self.headings
            .iter()
            .map(|heading| {
                if heading.to_lowercase().contains(&lowered) {
                    1.0
                } else {
                    similarity(heading, title)
                }
            })
            .fold(0.0, f64::max)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicCheck {
    pub topic_id: u32,
    pub speakers_found: bool,
    pub missing_speakers: Vec<String>,
    pub title_similarity: f64,
    pub title_score: f64,
    pub materials_expected: usize,
    pub materials_found: usize,
    pub materials_score: f64,
}

impl TopicCheck {
    pub fn score(&self) -> f64 {
        let speaker = if self.speakers_found { 1.0 } else { 0.0 };
        speaker + self.title_score + self.materials_score
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerificationReport {
    pub file: String,
    pub url: String,
    pub checked_at: String,
    pub expected_topics: usize,
    pub page_topics: usize,
    pub topic_count_match: bool,
    pub topics: Vec<TopicCheck>,
    pub accuracy: f64,
    pub warnings: Vec<String>,
}

fn check_topic(topic: &Topic, page: &PageSummary, warnings: &mut Vec<String>) -> TopicCheck {
    let missing_speakers: Vec<String> = topic
        .speakers
        .iter()
        .filter(|speaker| !page.text.contains(&speaker.name.to_lowercase()))
        .map(|speaker| speaker.name.clone())
        .collect();
    if topic.speakers.is_empty() {
        warnings.push(format!("topic {} has no speakers", topic.id));
    }
    for name in &missing_speakers {
        warnings.push(format!("topic {}: speaker '{name}' not found on page", topic.id));
    }

    let title = topic.presentation.title.trim();
    let (title_similarity, title_score) = if title.is_empty() {
        warnings.push(format!("topic {} has no title", topic.id));
        (0.0, 0.5)
    } else {
        let best = page.best_title_score(title);
        if best < TITLE_THRESHOLD {
            warnings.push(format!("topic {}: title '{title}' best match {best:.2}", topic.id));
        }
        (best, if best >= TITLE_THRESHOLD { 1.0 } else { 0.0 })
    };

    let materials_expected = topic.materials.len();
    let materials_found = topic
        .materials
        .iter()
        .filter(|material| page.has_link(&material.url))
        .count();
    let materials_score = match (materials_expected, materials_found) {
        (0, _) => 1.0,
        (expected, found) if found == expected => 1.0,
        (_, 0) => 0.0,
        _ => 0.7,
    };
    if materials_found < materials_expected {
        warnings.push(format!(
            "topic {}: {materials_found}/{materials_expected} materials linked on page",
            topic.id
        ));
    }

    TopicCheck {
        topic_id: topic.id,
        speakers_found: missing_speakers.is_empty(),
        missing_speakers,
        title_similarity,
        title_score,
        materials_expected,
        materials_found,
        materials_score,
    }
}

pub fn verify_meeting(meeting: &Meeting, page: &PageSummary) -> VerificationReport {
    let mut warnings = Vec::new();
    let topics: Vec<TopicCheck> = meeting
        .topics
        .iter()
        .map(|topic| check_topic(topic, page, &mut warnings))
        .collect();

    let expected_topics = meeting.topics.len();
    let topic_count_match = expected_topics == page.topic_headings;
    if !topic_count_match {
        warnings.push(format!(
            "record has {expected_topics} topics, page shows {}",
            page.topic_headings
        ));
    }

    let accuracy = if topics.is_empty() {
        0.0
    } else {
        let total: f64 = topics.iter().map(TopicCheck::score).sum();
        total / (3.0 * topics.len() as f64) * 100.0
    };

    VerificationReport {
        file: String::new(),
        url: meeting.metadata.link.clone(),
        checked_at: timestamp(),
        expected_topics,
        page_topics: page.topic_headings,
        topic_count_match,
        topics,
        accuracy,
        warnings,
    }
}

/// Loads a record, fetches its live page once and scores the extraction.
pub fn verify_record(path: &Path, fetcher: &dyn Fetch, config: &FetchConfig) -> Result<VerificationReport> {
    let meeting = load_record(path)?;
    if meeting.metadata.link.is_empty() {
        bail!("{} has no page link to verify against", path.display());
    }

    let html = fetcher.fetch_text(&meeting.metadata.link, page_timeout(config))?;
    let page = PageSummary::from_page(&Page::parse(&html));
    let mut report = verify_meeting(&meeting, &page);
    report.file = path.display().to_string();
    tracing::info!("{}: accuracy {:.1}%", report.file, report.accuracy);
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archive_core::schema::{Material, MaterialKind, Speaker};

    #[test]
    fn similarity_is_case_insensitive() {
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("Market Update", "market update"), 1.0);
        assert!(similarity("Market Update", "Market Updates") > 0.9);
        assert!(similarity("abc", "xyz") < 0.1);
    }

    fn topic(id: u32, speaker: &str, title: &str, urls: &[&str]) -> Topic {
        let mut topic = Topic::new(id);
        topic.speakers.push(Speaker {
            name: speaker.to_string(),
            ..Speaker::default()
        });
        topic.presentation.title = title.to_string();
        topic.materials = urls
            .iter()
            .map(|url| Material::new(MaterialKind::Recording, *url, "Recording"))
            .collect();
        topic
    }

    #[test]
    fn scores_each_check_per_topic() {
        let html = r#"<h2>TOPIC 1</h2><h3>Reading the Market</h3><p>Presented by Gatis Roze</p>
<a href="https://youtu.be/one/">video</a><a href="https://example.org/about">about</a>
<h2>TOPIC 2</h2><h3>Options Basics</h3><p>Jane Smith</p>"#;
        let page = PageSummary::from_page(&Page::parse(html));
        assert_eq!(page.topic_headings, 2);
        assert_eq!(page.material_links, vec!["https://youtu.be/one/".to_string()]);

        let meeting = Meeting {
            topics: vec![
                topic(1, "Gatis Roze", "Reading the market", &["https://youtu.be/one"]),
                topic(2, "Someone Else", "Unrelated", &["https://youtu.be/two", "https://x.org/a.pdf"]),
            ],
            ..Meeting::default()
        };
        let report = verify_meeting(&meeting, &page);

        assert!(report.topic_count_match);
        let first = &report.topics[0];
        assert!(first.speakers_found);
        assert_eq!(first.title_score, 1.0);
        assert_eq!(first.materials_score, 1.0);

        let second = &report.topics[1];
        assert_eq!(second.missing_speakers, vec!["Someone Else".to_string()]);
        assert_eq!(second.title_score, 0.0);
        assert_eq!(second.materials_score, 0.0);

        assert!((report.accuracy - 50.0).abs() < 1e-9);
        assert!(!report.warnings.is_empty());
    }

    #[test]
    fn empty_title_earns_half_credit() {
        let page = PageSummary::from_page(&Page::parse("<h2>TOPIC 1</h2><p>Ann Lee</p>"));
        let meeting = Meeting {
            topics: vec![topic(1, "Ann Lee", "", &[])],
            ..Meeting::default()
        };
        let report = verify_meeting(&meeting, &page);
        assert_eq!(report.topics[0].title_score, 0.5);
        assert!((report.accuracy - 2.5 / 3.0 * 100.0).abs() < 1e-9);
    }
}
