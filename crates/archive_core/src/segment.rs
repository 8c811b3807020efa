//! Splits a post body into one section per `TOPIC N` heading.

use crate::schema::UNKNOWN_DATE;
use crate::shortcode::TEAM_MEMBER;
use regex::Regex;
use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

pub const MATERIALS_SENTINEL: &str = "ARCHIVE MATERIALS";

static TOPIC_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\[dfd_heading[^\]]*\]\s*TOPIC\s+(\d+)\s*\[/dfd_heading\]").expect("marker regex")
});
static EVENT_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(Monday|Tuesday|Wednesday|Thursday|Friday|Saturday|Sunday),\s+[A-Za-z]+\s+\d{1,2},\s+\d{4}",
    )
    .expect("event date regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicMarker {
    pub label: u32, // number printed in the heading
    pub span: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicSection<'a> {
    pub id: u32,    // position, 1-based
    pub label: u32, // printed number, may disagree with `id` in sloppy posts
    pub body: &'a str,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Segmentation<'a> {
    pub sections: Vec<TopicSection<'a>>,
    pub preamble: &'a str, // content before the first marker
    pub implicit: bool,    // no markers; whole content treated as topic 1
}

pub fn find_topic_markers(content: &str) -> Vec<TopicMarker> {
    TOPIC_MARKER_RE
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps[1].parse().ok()?;
            Some(TopicMarker {
                label,
                span: whole.range(),
            })
        })
        .collect()
}

pub fn segment_topics(content: &str) -> Segmentation<'_> {
    let markers = find_topic_markers(content);

    if markers.is_empty() {
        if content.contains(&format!("[{TEAM_MEMBER}")) {
            return Segmentation {
                sections: vec![TopicSection {
                    id: 1,
                    label: 1,
                    body: content,
                }],
                preamble: "",
                implicit: true,
            };
        }
        return Segmentation::default();
    }

    let mut sections = Vec::with_capacity(markers.len());
    for (idx, marker) in markers.iter().enumerate() {
        let start = marker.span.end;
        let end = match markers.get(idx + 1) {
            Some(next) => next.span.start,
            None => content[start..]
                .find(MATERIALS_SENTINEL)
                .map(|offset| start + offset)
                .unwrap_or(content.len()),
        };
        let id = idx as u32 + 1;
        if marker.label != id {
            tracing::warn!(
                "TOPIC {} heading found in position {id}; numbering by position",
                marker.label
            );
        }
        sections.push(TopicSection {
            id,
            label: marker.label,
            body: &content[start..end],
        });
    }

    Segmentation {
        sections,
        preamble: &content[..markers[0].span.start],
        implicit: false,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    NumberedTopics,
    TopicsWithSubtitle,
    SingleProgram,
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            Layout::NumberedTopics => "numbered topics",
            Layout::TopicsWithSubtitle => "topics with subtitle",
            Layout::SingleProgram => "single program",
        };
        write!(f, "{value}")
    }
}

pub fn detect_layout(content: &str) -> Layout {
    if TOPIC_MARKER_RE.is_match(content) {
        Layout::NumberedTopics
    } else if content.contains("TOPICS") && content.contains("subtitle=") {
        Layout::TopicsWithSubtitle
    } else {
        Layout::SingleProgram
    }
}

/// First `Weekday, Month D, YYYY` in the content.
pub fn extract_event_date(content: &str) -> String {
    EVENT_DATE_RE
        .find(content)
        .map(|m| crate::text::collapse_whitespace(m.as_str()))
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}
