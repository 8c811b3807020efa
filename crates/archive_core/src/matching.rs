//! Assigns archive materials listed outside any topic section to the most
//! plausible topic.

use crate::extract::material_from_button;
use crate::schema::{Material, Topic};
use crate::shortcode::{BUTTON, find_shortcodes};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

static PART_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bpart\s*(\d+)").expect("part regex"));
const JOINT_HINTS: &[&str] = &["duo", "joint"];

/// Heuristics in priority order; the first that matches wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    PartNumber,
    JointSession,
    FullName,
    FirstName,
    Position,
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            MatchStrategy::PartNumber => "part number",
            MatchStrategy::JointSession => "joint session",
            MatchStrategy::FullName => "full speaker name",
            MatchStrategy::FirstName => "unique first name",
            MatchStrategy::Position => "position",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    pub url: String,
    pub topic_id: u32,
    pub strategy: MatchStrategy,
}

/// Topic index named by an explicit `part N` label, if it exists.
pub fn part_number_topic(label: &str, topic_count: usize) -> Option<usize> {
    let lowered = label.to_lowercase();
    let caps = PART_RE.captures(&lowered)?;
    let part: usize = caps[1].parse().ok()?;
    (1..=topic_count).contains(&part).then(|| part - 1)
}

/// Picks a topic index for the material at `index` of `total` unassigned ones.
pub fn match_material(
    label: &str,
    index: usize,
    total: usize,
    topics: &[Topic],
) -> Option<(usize, MatchStrategy)> {
    if topics.is_empty() {
        return None;
    }
    let lowered = label.to_lowercase();

    if let Some(topic) = part_number_topic(label, topics.len()) {
        return Some((topic, MatchStrategy::PartNumber));
    }

    if JOINT_HINTS.iter().any(|hint| lowered.contains(hint)) {
        return Some((topics.len() - 1, MatchStrategy::JointSession));
    }

    let full_name = topics.iter().position(|topic| {
        topic.speakers.iter().any(|speaker| {
            let name = speaker.name.trim().to_lowercase();
            !name.is_empty() && lowered.contains(&name)
        })
    });
    if let Some(topic) = full_name {
        return Some((topic, MatchStrategy::FullName));
    }

    let first_names = unique_first_names(topics);
    let first_name = topics.iter().enumerate().find_map(|(idx, topic)| {
        topic
            .speakers
            .iter()
            .filter_map(|speaker| first_name_of(&speaker.name))
            .filter(|first| first_names.contains(first))
            .any(|first| lowered.contains(&first))
            .then_some(idx)
    });
    if let Some(topic) = first_name {
        return Some((topic, MatchStrategy::FirstName));
    }

    if total > 0 && total % topics.len() == 0 {
        let per_topic = total / topics.len();
        let topic = index / per_topic;
        if topic < topics.len() {
            return Some((topic, MatchStrategy::Position));
        }
    }

    None
}

fn first_name_of(name: &str) -> Option<String> {
    let parts: Vec<&str> = name.split_whitespace().collect();
    if parts.len() < 2 {
        return None;
    }
    let first = parts[0].to_lowercase();
    (first.chars().count() > 4).then_some(first)
}

/// Usable first names that belong to exactly one speaker in the meeting.
fn unique_first_names(topics: &[Topic]) -> HashSet<String> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for speaker in topics.iter().flat_map(|topic| &topic.speakers) {
        if let Some(first) = first_name_of(&speaker.name) {
            *counts.entry(first).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(name, _)| name)
        .collect()
}

/// Moves section materials whose label names a different `part N` topic.
pub fn reconcile_part_labels(topics: &mut [Topic]) {
    let topic_count = topics.len();
    let mut moved: Vec<(usize, Material)> = Vec::new();

    for (idx, topic) in topics.iter_mut().enumerate() {
        let (keep, relocate): (Vec<Material>, Vec<Material>) =
            topic.materials.drain(..).partition(|material| {
                part_number_topic(&material.label, topic_count).is_none_or(|target| target == idx)
            });
        topic.materials = keep;
        for material in relocate {
            if let Some(target) = part_number_topic(&material.label, topic_count) {
                moved.push((target, material));
            }
        }
    }

    for (target, material) in moved {
        tracing::debug!("moving '{}' to topic {}", material.label, target + 1);
        topics[target].materials.push(material);
    }
}

/// Buttons anywhere in `content` not already captured by a topic section.
pub fn unassigned_materials(content: &str, topics: &[Topic]) -> Vec<Material> {
    let mut seen: HashSet<String> = topics
        .iter()
        .flat_map(|topic| &topic.materials)
        .map(|material| material.normalized_url().to_string())
        .collect();

    find_shortcodes(BUTTON, content)
        .iter()
        .filter_map(material_from_button)
        .filter(|material| seen.insert(material.normalized_url().to_string()))
        .collect()
}

pub fn assign_materials(materials: Vec<Material>, topics: &mut [Topic]) -> Vec<Assignment> {
    let total = materials.len();
    let mut assignments = Vec::new();

    for (index, material) in materials.into_iter().enumerate() {
        match match_material(&material.label, index, total, topics) {
            Some((topic, strategy)) => {
                tracing::debug!(
                    "'{}' -> topic {} by {strategy}",
                    material.label,
                    topics[topic].id
                );
                assignments.push(Assignment {
                    url: material.url.clone(),
                    topic_id: topics[topic].id,
                    strategy,
                });
                topics[topic].materials.push(material);
            }
            None => tracing::warn!("no topic matches material '{}'", material.label),
        }
    }
    assignments
}

pub fn assign_trailing_materials(content: &str, topics: &mut [Topic]) -> Vec<Assignment> {
    let materials = unassigned_materials(content, topics);
    assign_materials(materials, topics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MaterialKind, Speaker};

    fn topic(id: u32, names: &[&str]) -> Topic {
        Topic {
            id,
            speakers: names
                .iter()
                .map(|name| Speaker {
                    name: name.to_string(),
                    ..Speaker::default()
                })
                .collect(),
            ..Topic::default()
        }
    }

    fn strategy(label: &str, topics: &[Topic]) -> Option<(usize, MatchStrategy)> {
        match_material(label, 0, 1, topics)
    }

    #[test]
    fn part_label_wins_over_speaker_name() {
        let topics = vec![topic(1, &["Grayson Roze"]), topic(2, &["Gatis Roze"])];
        assert_eq!(
            strategy("Grayson Roze Part 2 Slides", &topics),
            Some((1, MatchStrategy::PartNumber))
        );
    }

    #[test]
    fn part_out_of_range_falls_through() {
        let topics = vec![topic(1, &[]), topic(2, &[])];
        assert_eq!(match_material("Part 7", 0, 3, &topics), None);
    }

    #[test]
    fn joint_label_goes_to_last_topic() {
        let topics = vec![topic(1, &[]), topic(2, &[]), topic(3, &[])];
        assert_eq!(
            strategy("Duo Presentation Recording", &topics),
            Some((2, MatchStrategy::JointSession))
        );
        assert_ne!(
            strategy("Individual Recording", &topics).map(|(_, s)| s),
            Some(MatchStrategy::JointSession)
        );
    }

    #[test]
    fn joint_hint_matches_inside_words() {
        let topics = vec![topic(1, &[]), topic(2, &[])];
        assert_eq!(
            strategy("Jointly presented recording", &topics),
            Some((1, MatchStrategy::JointSession))
        );
        assert_eq!(
            strategy("Duo_Recording", &topics),
            Some((1, MatchStrategy::JointSession))
        );
    }

    #[test]
    fn full_name_then_unique_first_name() {
        let topics = vec![topic(1, &["Grayson Roze"]), topic(2, &["Gatis Roze"])];
        assert_eq!(
            strategy("gatis roze recording", &topics),
            Some((1, MatchStrategy::FullName))
        );
        assert_eq!(
            strategy("Grayson's Recording", &topics),
            Some((0, MatchStrategy::FirstName))
        );
    }

    #[test]
    fn shared_first_name_is_not_used() {
        let topics = vec![topic(1, &["Chris Adams"]), topic(2, &["Chris Brown"])];
        assert_eq!(strategy("Chris Slides", &topics), None);
        let topics = vec![topic(1, &["Alexander Adams"]), topic(2, &["Alexander Brown"])];
        assert_eq!(strategy("Alexander Slides", &topics), None);
    }

    #[test]
    fn positional_fallback_requires_exact_multiple() {
        let topics = vec![topic(1, &[]), topic(2, &[])];
        assert_eq!(
            match_material("Recording", 3, 4, &topics),
            Some((1, MatchStrategy::Position))
        );
        assert_eq!(match_material("Recording", 2, 3, &topics), None);
    }

    #[test]
    fn already_captured_urls_are_skipped() {
        let mut topics = vec![topic(1, &[])];
        topics[0].materials.push(Material::new(
            MaterialKind::Recording,
            "https://youtu.be/a/",
            "Watch",
        ));
        let content = r#"[dfd_button button_text="Watch" buttom_link_src="url:https%3A%2F%2Fyoutu.be%2Fa|"][dfd_button button_text="Part 1 Slides" buttom_link_src="url:https%3A%2F%2Fx.org%2Fs.pdf|"]"#;
        let materials = unassigned_materials(content, &topics);
        assert_eq!(materials.len(), 1);
        assert_eq!(materials[0].url, "https://x.org/s.pdf");

        let assignments = assign_materials(materials, &mut topics);
        assert_eq!(assignments[0].topic_id, 1);
        assert_eq!(topics[0].materials.len(), 2);
    }

    #[test]
    fn section_material_with_foreign_part_label_moves() {
        let mut topics = vec![topic(1, &[]), topic(2, &[])];
        topics[1]
            .materials
            .push(Material::new(MaterialKind::Slides, "https://x.org/p1.pdf", "Part 1 Slides"));
        topics[1]
            .materials
            .push(Material::new(MaterialKind::Slides, "https://x.org/p2.pdf", "Part 2 Slides"));
        reconcile_part_labels(&mut topics);
        assert_eq!(topics[0].materials.len(), 1);
        assert_eq!(topics[0].materials[0].url, "https://x.org/p1.pdf");
        assert_eq!(topics[1].materials.len(), 1);
    }
}
