//! Text helpers shared by the extractors and renderers.

use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").expect("tag regex"));
static SHORTCODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[/?(?:vc|dfd)_[a-z_]*[^\]]*\]").expect("shortcode regex"));
static NON_SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^\w\s-]").expect("slug regex"));
static SEPARATOR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-\s_]+").expect("separator regex"));

/// Strips tags and nested shortcodes, decodes entities and collapses whitespace.
pub fn html_to_text(html: &str) -> String {
    let without_tags = TAG_RE.replace_all(html, "");
    let without_shortcodes = SHORTCODE_RE.replace_all(&without_tags, "");
    collapse_whitespace(&decode_entities(&without_shortcodes))
}

pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Decodes named and numeric HTML character references.
pub fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(amp) = rest.find('&') {
        result.push_str(&rest[..amp]);
        let tail = &rest[amp + 1..];
        let decoded = tail
            .find(';')
            .filter(|end| *end > 0 && *end <= 10)
            .and_then(|end| decode_entity(&tail[..end]).map(|c| (c, end)));

        match decoded {
            Some((c, end)) => {
                result.push(c);
                rest = &tail[end + 1..];
            }
            None => {
                result.push('&');
                rest = tail;
            }
        }
    }
    result.push_str(rest);
    Cow::Owned(result)
}

fn decode_entity(entity: &str) -> Option<char> {
    let named = match entity {
        "lt" => '<',
        "gt" => '>',
        "amp" => '&',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{00A0}',
        "ndash" => '\u{2013}',
        "mdash" => '\u{2014}',
        "lsquo" => '\u{2018}',
        "rsquo" => '\u{2019}',
        "ldquo" => '\u{201C}',
        "rdquo" => '\u{201D}',
        "hellip" => '\u{2026}',
        "copy" => '\u{00A9}',
        "reg" => '\u{00AE}',
        "trade" => '\u{2122}',
        s if s.starts_with("#x") || s.starts_with("#X") => {
            return u32::from_str_radix(&s[2..], 16).ok().and_then(char::from_u32);
        }
        s if s.starts_with('#') => return s[1..].parse().ok().and_then(char::from_u32),
        _ => return None,
    };
    Some(named)
}

/// Lowercase, ASCII-transliterated, dash-separated slug.
pub fn slugify(text: &str) -> String {
    let ascii = deunicode::deunicode(text).to_lowercase();
    let cleaned = NON_SLUG_RE.replace_all(ascii.trim(), "");
    SEPARATOR_RE
        .replace_all(&cleaned, "-")
        .trim_matches('-')
        .to_string()
}

/// Replaces characters that are unsafe in file names and caps the length.
pub fn sanitize_filename(name: &str) -> String {
    const MAX_STEM: usize = 200;

    let replaced: String = name
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '/' | '\\' | '|' | '?' | '*' => '-',
            c => c,
        })
        .collect();
    let trimmed = replaced.trim_matches(|c| c == '.' || c == ' ');

    match trimmed.rsplit_once('.') {
        Some((stem, ext)) if stem.chars().count() > MAX_STEM => {
            format!("{}.{ext}", truncate_chars(stem, MAX_STEM))
        }
        None if trimmed.chars().count() > MAX_STEM => truncate_chars(trimmed, MAX_STEM).to_string(),
        _ => trimmed.to_string(),
    }
}

pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
