//! Builds meeting records out of post content.

use crate::matching::{assign_trailing_materials, reconcile_part_labels};
use crate::schema::{CustomField, Event, Material, MaterialKind, Meeting, MeetingMetadata, Presentation, Speaker, Topic};
use crate::segment::{MATERIALS_SENTINEL, detect_layout, extract_event_date, segment_topics};
use crate::shortcode::{
    BUTTON, COLUMN_TEXT, HEADING, ICON_LIST, Shortcode, TEAM_MEMBER, decode_learning_outcomes,
    decode_link_param, find_shortcodes, first_shortcode,
};
use crate::text::html_to_text;
use crate::wxr::Post;
use crate::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

const KEPT_CUSTOM_FIELDS: &[&str] = &["_thumbnail_id", "stunnig_headers_bg_img"];
const DESCRIPTION_BOILERPLATE: &[&str] = &["You will learn", MATERIALS_SENTINEL];
const BIO_KEYWORDS: &[&str] = &[
    "founded",
    "formerly",
    "worked",
    "holds",
    "phd",
    "mba",
    "experience",
    "graduated",
    "retired",
    "educated",
];

static SUBHEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<(?:h2|h4)[^>]*>(.*?)</(?:h2|h4)>").expect("subheading regex"));

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TopicParts {
    pub speakers: Vec<Speaker>,
    pub presentation: Presentation,
    pub materials: Vec<Material>,
}

pub fn extract_meeting(post: &Post) -> Result<Meeting> {
    if post.content.trim().is_empty() {
        return Err(Error::MissingContent(post.post_id.clone()));
    }

    let metadata = MeetingMetadata {
        title: post.title.clone(),
        link: post.link.clone(),
        post_id: post.post_id.clone(),
        post_name: post.post_name.clone(),
        post_date: post.post_date.clone(),
        category: post.category.clone(),
        creator: post.creator.clone(),
    };

    let custom_fields = post
        .meta
        .iter()
        .filter(|meta| KEPT_CUSTOM_FIELDS.contains(&meta.key.as_str()))
        .map(|meta| CustomField {
            meta_key: meta.key.clone(),
            meta_value: meta.value.clone(),
        })
        .collect();

    tracing::debug!("post {} uses {} layout", post.post_id, detect_layout(&post.content));

    Ok(Meeting {
        metadata,
        custom_fields,
        event: Event {
            date: extract_event_date(&post.content),
            ..Event::default()
        },
        topics: extract_topics(&post.content),
    })
}

pub fn extract_topics(content: &str) -> Vec<Topic> {
    let segmentation = segment_topics(content);
    if segmentation.sections.is_empty() {
        return Vec::new();
    }

    if segmentation.implicit {
        tracing::warn!("no TOPIC markers found; treating the whole post as one topic");
        let parts = extract_topic(content);
        return vec![Topic {
            id: 1,
            speakers: parts.speakers,
            presentation: parts.presentation,
            materials: parts.materials,
        }];
    }

    let shared_speaker = preamble_speaker(segmentation.preamble);

    let mut topics: Vec<Topic> = segmentation
        .sections
        .iter()
        .map(|section| {
            let parts = extract_topic(section.body);
            let speakers = match &shared_speaker {
                Some(speaker) if section.id == 1 => vec![speaker.clone()],
                Some(_) => Vec::new(),
                None => parts.speakers,
            };
            Topic {
                id: section.id,
                speakers,
                presentation: parts.presentation,
                materials: parts.materials,
            }
        })
        .collect();

    reconcile_part_labels(&mut topics);
    assign_trailing_materials(content, &mut topics);
    topics
}

/// Speaker listed above the first TOPIC heading, with the longest nearby
/// bio that mentions them.
pub fn preamble_speaker(preamble: &str) -> Option<Speaker> {
    let shortcode = first_shortcode(TEAM_MEMBER, preamble)?;
    let mut speaker = speaker_from_shortcode(&shortcode);
    if speaker.name.is_empty() {
        return None;
    }

    let bio = find_shortcodes(COLUMN_TEXT, preamble)
        .iter()
        .map(Shortcode::inner_text)
        .find(|text| {
            text.chars().count() > 100 && speaker.name_fragments().any(|part| text.contains(part))
        });
    if let Some(bio) = bio {
        speaker.bio = bio;
    }
    Some(speaker)
}

pub fn extract_topic(section: &str) -> TopicParts {
    let mut speakers: Vec<Speaker> = Vec::new();
    for shortcode in find_shortcodes(TEAM_MEMBER, section) {
        let speaker = speaker_from_shortcode(&shortcode);
        if speaker.name.is_empty() {
            tracing::warn!("skipping team member without a name at byte {}", shortcode.start);
            continue;
        }
        speakers.push(speaker);
    }

    let column_texts = find_shortcodes(COLUMN_TEXT, section);
    let icon_list = find_shortcodes(ICON_LIST, section)
        .into_iter()
        .find(|list| list.attr("list_fields").is_some());

    let learning_outcomes = icon_list
        .as_ref()
        .and_then(|list| list.attr("list_fields"))
        .map(decode_learning_outcomes)
        .unwrap_or_default();

    if !speakers.is_empty() {
        let list_end = icon_list.as_ref().map(|list| list.end).unwrap_or(0);
        let candidates = column_texts
            .iter()
            .filter(|block| block.start >= list_end)
            .map(Shortcode::inner_text)
            .filter(|text| is_bio_like(text))
            .collect();
        assign_bios(&mut speakers, candidates);
    }

    TopicParts {
        speakers,
        presentation: Presentation {
            title: presentation_title(section),
            description: presentation_description(&column_texts),
            learning_outcomes,
        },
        materials: materials_in(section),
    }
}

pub fn speaker_from_shortcode(shortcode: &Shortcode) -> Speaker {
    Speaker {
        name: shortcode.attr_text("team_member_name"),
        title: shortcode.attr_text("team_member_job_position"),
        bio: shortcode.attr_text("team_member_description"),
        photo_id: shortcode.attr_text("team_member_photo"),
        photo_local_path: None,
    }
}

fn presentation_title(section: &str) -> String {
    let from_heading = find_shortcodes(HEADING, section)
        .iter()
        .filter(|heading| !heading.inner_html().contains("TOPIC"))
        .map(Shortcode::inner_text)
        .find(|text| text.chars().count() > 10);

    from_heading
        .or_else(|| {
            SUBHEADING_RE
                .captures(section)
                .map(|caps| html_to_text(&caps[1]))
        })
        .unwrap_or_default()
}

fn presentation_description(column_texts: &[Shortcode]) -> String {
    column_texts
        .iter()
        .filter(|block| {
            let html = block.inner_html();
            !DESCRIPTION_BOILERPLATE.iter().any(|phrase| html.contains(phrase))
        })
        .map(Shortcode::inner_text)
        .find(|text| text.chars().count() > 20)
        .unwrap_or_default()
}

fn is_bio_like(text: &str) -> bool {
    if text.chars().count() <= 50 {
        return false;
    }
    let lowered = text.to_lowercase();
    BIO_KEYWORDS.iter().any(|keyword| lowered.contains(keyword))
}

/// Attributes each bio to at most one speaker: first by name fragment, then
/// leftovers to bio-less speakers in encounter order.
pub fn assign_bios(speakers: &mut [Speaker], mut candidates: Vec<String>) {
    for speaker in speakers.iter_mut() {
        let found = candidates
            .iter()
            .position(|bio| speaker.name_fragments().any(|part| bio.contains(part)));
        if let Some(pos) = found {
            speaker.bio = candidates.remove(pos);
        }
    }

    let without_bio = speakers.iter_mut().filter(|speaker| speaker.bio.is_empty());
    for (speaker, bio) in without_bio.zip(candidates) {
        speaker.bio = bio;
    }
}

pub fn materials_in(section: &str) -> Vec<Material> {
    find_shortcodes(BUTTON, section)
        .iter()
        .filter_map(material_from_button)
        .collect()
}

/// Material for a link button, or None for donation and link-less buttons.
pub fn material_from_button(button: &Shortcode) -> Option<Material> {
    let label = button.attr_text("button_text");
    if label.is_empty() {
        return None;
    }

    let link = button
        .attr("buttom_link_src")
        .or_else(|| button.attr("button_link_src"))?;
    let url = decode_link_param(link).remove("url").unwrap_or_default();
    if url.is_empty() {
        tracing::warn!("button '{label}' has no link target");
        return None;
    }

    if is_donation(&label, &url) {
        return None;
    }

    Some(Material::new(MaterialKind::classify(&label, &url), url, label))
}

fn is_donation(label: &str, url: &str) -> bool {
    label.to_lowercase().contains("donat") || url.to_lowercase().contains("donat")
}
