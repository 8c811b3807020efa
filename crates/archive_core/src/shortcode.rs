//! Parser for the bracketed theme shortcodes embedded in post content.
//!
//! Parsing is best-effort: malformed markup yields fewer matches, never an error.

use crate::text::{decode_entities, html_to_text};
use percent_encoding::percent_decode_str;
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::LazyLock;

pub const HEADING: &str = "dfd_heading";
pub const TEAM_MEMBER: &str = "dfd_new_team_member";
pub const BUTTON: &str = "dfd_button";
pub const ICON_LIST: &str = "dfd_icon_list";
pub const COLUMN_TEXT: &str = "vc_column_text";

static ATTR_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\w+)\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s\]"']+))"#).expect("attribute regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shortcode {
    pub name: String,
    pub attrs: Vec<(String, String)>,
    pub inner: Option<String>, // None when no closing tag follows
    pub start: usize,          // byte offset of the opening '['
    pub open_end: usize,       // byte offset just past the opening tag
    pub end: usize,            // byte offset just past the closing tag, or open_end
}

impl Shortcode {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value.as_str())
    }

    /// Attribute value with HTML entities decoded, or an empty string.
    pub fn attr_text(&self, key: &str) -> String {
        self.attr(key)
            .map(|value| decode_entities(value).trim().to_string())
            .unwrap_or_default()
    }

    pub fn inner_html(&self) -> &str {
        self.inner.as_deref().unwrap_or_default()
    }

    pub fn inner_text(&self) -> String {
        html_to_text(self.inner_html())
    }
}

/// Attribute pairs in source order. A repeated key keeps its first position and
/// takes the last value.
pub fn parse_attributes(raw: &str) -> Vec<(String, String)> {
    let mut attrs: Vec<(String, String)> = Vec::new();
    for caps in ATTR_RE.captures_iter(raw) {
        let key = caps[1].to_string();
        let value = caps
            .get(2)
            .or_else(|| caps.get(3))
            .or_else(|| caps.get(4))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        match attrs.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => attrs.push((key, value)),
        }
    }
    attrs
}

/// Every occurrence of `[name ...]` in `text`, in source order.
pub fn find_shortcodes(name: &str, text: &str) -> Vec<Shortcode> {
    let Ok(open_re) = Regex::new(&format!(r"\[{}(\s[^\]]*)?\]", regex::escape(name))) else {
        return Vec::new();
    };
    let close_tag = format!("[/{name}]");
    let openings: Vec<_> = open_re.captures_iter(text).collect();

    let mut shortcodes = Vec::with_capacity(openings.len());
    for (idx, caps) in openings.iter().enumerate() {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let attrs = caps
            .get(1)
            .map(|raw| parse_attributes(raw.as_str()))
            .unwrap_or_default();
        let next_open = openings
            .get(idx + 1)
            .and_then(|next| next.get(0))
            .map(|next| next.start())
            .unwrap_or(text.len());

        let open_end = whole.end();
        let closing = text[open_end..]
            .find(&close_tag)
            .map(|offset| open_end + offset)
            .filter(|close_start| *close_start <= next_open);

        let (inner, end) = match closing {
            Some(close_start) => (
                Some(text[open_end..close_start].to_string()),
                close_start + close_tag.len(),
            ),
            None => (None, open_end),
        };

        shortcodes.push(Shortcode {
            name: name.to_string(),
            attrs,
            inner,
            start: whole.start(),
            open_end,
            end,
        });
    }
    shortcodes
}

pub fn first_shortcode(name: &str, text: &str) -> Option<Shortcode> {
    find_shortcodes(name, text).into_iter().next()
}

/// Decodes a Visual Composer link parameter such as
/// `url:https%3A%2F%2Fexample.org|title:Slides|target:_blank`.
pub fn decode_link_param(param: &str) -> HashMap<String, String> {
    let decoded = percent_decode_str(param).decode_utf8_lossy();
    decoded
        .split('|')
        .filter_map(|part| part.split_once(':'))
        .map(|(key, value)| {
            (
                key.trim().to_string(),
                decode_entities(value.trim()).into_owned(),
            )
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct IconListItem {
    #[serde(default)]
    text_content: Option<String>,
}

/// Learning outcomes stored as percent-encoded JSON in an icon list's
/// `list_fields` attribute, one per list item. Literal `\n` sequences are
/// removed. Malformed input yields an empty list.
pub fn decode_learning_outcomes(list_fields: &str) -> Vec<String> {
    let decoded = percent_decode_str(list_fields).decode_utf8_lossy();
    match serde_json::from_str::<Vec<IconListItem>>(&decoded) {
        Ok(items) => items
            .into_iter()
            .map(|item| html_to_text(&item.text_content.unwrap_or_default().replace("\\n", "")))
            .collect(),
        Err(err) => {
            tracing::debug!("ignoring malformed list_fields: {err}");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attributes_accept_quoted_and_bare_values() {
        let attrs = parse_attributes(r#" a="one two" b=bare c='single' a="again""#);
        assert_eq!(
            attrs,
            vec![
                ("a".to_string(), "again".to_string()),
                ("b".to_string(), "bare".to_string()),
                ("c".to_string(), "single".to_string()),
            ]
        );
    }

    #[test]
    fn finds_enclosing_and_self_closing_occurrences() {
        let text = r#"[dfd_heading style="x"]TOPIC 1[/dfd_heading][dfd_button button_text="Go"][dfd_heading]Title[/dfd_heading]"#;
        let headings = find_shortcodes(HEADING, text);
        assert_eq!(headings.len(), 2);
        assert_eq!(headings[0].inner.as_deref(), Some("TOPIC 1"));
        assert_eq!(headings[0].attr("style"), Some("x"));
        assert_eq!(headings[1].inner.as_deref(), Some("Title"));

        let buttons = find_shortcodes(BUTTON, text);
        assert_eq!(buttons.len(), 1);
        assert_eq!(buttons[0].inner, None);
        assert_eq!(buttons[0].end, buttons[0].open_end);
        assert_eq!(buttons[0].attr("button_text"), Some("Go"));
    }

    #[test]
    fn does_not_match_longer_names_or_closing_tags() {
        let text = "[dfd_heading_line a=1][/dfd_heading]";
        assert!(find_shortcodes(HEADING, text).is_empty());
    }

    #[test]
    fn unterminated_markup_yields_nothing() {
        assert!(find_shortcodes(BUTTON, r#"[dfd_button button_text="Go""#).is_empty());
        assert!(find_shortcodes(BUTTON, "").is_empty());
    }

    #[test]
    fn closing_tag_belongs_to_nearest_opening() {
        let text = "[vc_column_text]one[vc_column_text]two[/vc_column_text]";
        let blocks = find_shortcodes(COLUMN_TEXT, text);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].inner, None);
        assert_eq!(blocks[1].inner.as_deref(), Some("two"));
    }

    #[test]
    fn link_param_is_percent_decoded() {
        let parts = decode_link_param("url:https%3A%2F%2Fyoutu.be%2Fabc|title:Watch%20Now|target:%20_blank|");
        assert_eq!(parts.get("url").map(String::as_str), Some("https://youtu.be/abc"));
        assert_eq!(parts.get("title").map(String::as_str), Some("Watch Now"));
        assert_eq!(parts.get("target").map(String::as_str), Some("_blank"));
    }

    #[test]
    fn learning_outcomes_decode_and_tolerate_garbage() {
        let encoded = "%5B%7B%22text_content%22%3A%22How%20to%20screen%5Cnstocks%22%7D%2C%7B%22icon%22%3A%22x%22%7D%5D";
        assert_eq!(decode_learning_outcomes(encoded), vec!["How to screen stocks", ""]);
        assert!(decode_learning_outcomes("%5Bnot-json").is_empty());
    }

    #[test]
    fn learning_outcomes_drop_literal_newline_escapes_and_keep_every_item() {
        let raw = r#"[{"text_content":" Risk\\nmanagement "},{"text_content":""},{"text_content":"Exits"}]"#;
        assert_eq!(decode_learning_outcomes(raw), vec!["Riskmanagement", "", "Exits"]);
    }
}
