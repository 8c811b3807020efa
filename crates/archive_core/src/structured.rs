//! Structured meeting records as pretty JSON and as a hand-readable XML tree.

use crate::schema::{CustomField, Material, MaterialKind, Meeting, Speaker, Topic};
use crate::wxr::{element_name, text_value, write_text_element};
use crate::{Error, Result};
use quick_xml::events::{BytesEnd, BytesStart, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;

const MATERIAL_STATUS: &str = "not_validated";

pub fn to_json(meeting: &Meeting) -> Result<String> {
    Ok(serde_json::to_string_pretty(meeting)?)
}

pub fn from_json(json: &str) -> Result<Meeting> {
    Ok(serde_json::from_str(json)?)
}

pub fn read_json_file(path: &Path) -> Result<Meeting> {
    let json = std::fs::read_to_string(path)?;
    from_json(&json)
}

/// Writes the JSON record and, when `xml_path` is given, its XML twin.
pub fn write_record(meeting: &Meeting, json_path: &Path, xml_path: Option<&Path>) -> Result<()> {
    std::fs::write(json_path, to_json(meeting)?)?;
    if let Some(xml_path) = xml_path {
        std::fs::write(xml_path, to_xml(meeting)?)?;
    }
    Ok(())
}

fn start<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    Ok(())
}

fn end<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<()> {
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

pub fn to_xml(meeting: &Meeting) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    start(&mut writer, "meeting")?;

    start(&mut writer, "metadata")?;
    for (key, value) in meeting.metadata.entries() {
        write_text_element(&mut writer, key, value)?;
    }
    end(&mut writer, "metadata")?;

    start(&mut writer, "custom_fields")?;
    for field in &meeting.custom_fields {
        start(&mut writer, "field")?;
        write_text_element(&mut writer, "meta_key", &field.meta_key)?;
        write_text_element(&mut writer, "meta_value", &field.meta_value)?;
        end(&mut writer, "field")?;
    }
    end(&mut writer, "custom_fields")?;

    start(&mut writer, "event")?;
    write_text_element(&mut writer, "date", &meeting.event.date)?;
    write_text_element(&mut writer, "status", &meeting.event.status)?;
    end(&mut writer, "event")?;

    start(&mut writer, "topics")?;
    for topic in &meeting.topics {
        write_topic(&mut writer, topic)?;
    }
    end(&mut writer, "topics")?;

    end(&mut writer, "meeting")?;

    let body = String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned();
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n"))
}

fn write_topic<W: std::io::Write>(writer: &mut Writer<W>, topic: &Topic) -> Result<()> {
    let id = topic.id.to_string();
    let mut element = BytesStart::new("topic");
    element.push_attribute(("id", id.as_str()));
    writer.write_event(Event::Start(element))?;

    start(writer, "speakers")?;
    for speaker in &topic.speakers {
        start(writer, "speaker")?;
        write_text_element(writer, "name", &speaker.name)?;
        write_text_element(writer, "title", &speaker.title)?;
        write_text_element(writer, "photo_id", &speaker.photo_id)?;
        if let Some(path) = &speaker.photo_local_path {
            write_text_element(writer, "photo_local_path", path)?;
        }
        write_text_element(writer, "bio", &speaker.bio)?;
        end(writer, "speaker")?;
    }
    end(writer, "speakers")?;

    let presentation = &topic.presentation;
    start(writer, "presentation")?;
    write_text_element(writer, "title", &presentation.title)?;
    if !presentation.description.is_empty() {
        write_text_element(writer, "description", &presentation.description)?;
    }
    if !presentation.learning_outcomes.is_empty() {
        start(writer, "learning_outcomes")?;
        for outcome in &presentation.learning_outcomes {
            write_text_element(writer, "outcome", outcome)?;
        }
        end(writer, "learning_outcomes")?;
    }
    end(writer, "presentation")?;

    start(writer, "materials")?;
    for material in &topic.materials {
        let tag = material.kind.as_str();
        start(writer, tag)?;
        write_text_element(writer, "url", &material.url)?;
        write_text_element(writer, "label", &material.label)?;
        write_text_element(writer, "status", MATERIAL_STATUS)?;
        if let Some(path) = &material.local_path {
            write_text_element(writer, "local_path", path)?;
        }
        end(writer, tag)?;
    }
    end(writer, "materials")?;

    end(writer, "topic")
}

#[derive(Default)]
struct RecordBuilder {
    meeting: Meeting,
    stack: Vec<String>,
    text: String,
    saw_root: bool,
}

impl RecordBuilder {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<()> {
        let name = element_name(e.name().as_ref());
        if self.stack.is_empty() {
            if name != "meeting" {
                return Err(Error::InvalidRecord(format!("unexpected root <{name}>")));
            }
            self.saw_root = true;
        }

        let parent = self.stack.last().map(String::as_str).unwrap_or_default();
        let topic = self.meeting.topics.last_mut();
        match (parent, name.as_str()) {
            ("custom_fields", "field") => self.meeting.custom_fields.push(CustomField::default()),
            ("topics", "topic") => {
                let id = match e.try_get_attribute("id")? {
                    Some(attr) => {
                        let raw = attr.unescape_value()?;
                        raw.trim()
                            .parse()
                            .map_err(|_| Error::InvalidRecord(format!("bad topic id '{raw}'")))?
                    }
                    None => self.meeting.topics.len() as u32 + 1,
                };
                self.meeting.topics.push(Topic::new(id));
            }
            ("speakers", "speaker") => {
                if let Some(topic) = topic {
                    topic.speakers.push(Speaker::default());
                }
            }
            ("materials", tag) => {
                if let (Some(topic), Some(kind)) = (topic, MaterialKind::from_tag(tag)) {
                    topic.materials.push(Material::new(kind, "", ""));
                }
            }
            _ => {}
        }

        self.stack.push(name);
        self.text.clear();
        Ok(())
    }

    fn close(&mut self) {
        let Some(name) = self.stack.pop() else {
            return;
        };
        let value = std::mem::take(&mut self.text);
        let parent = self.stack.last().map(String::as_str).unwrap_or_default();
        let meeting = &mut self.meeting;
        let topic = meeting.topics.last_mut();

        match (parent, name.as_str()) {
            ("metadata", key) => {
                if !meeting.metadata.set(key, value) {
                    tracing::warn!("ignoring unknown metadata element <{key}>");
                }
            }
            ("field", key) => {
                if let Some(field) = meeting.custom_fields.last_mut() {
                    match key {
                        "meta_key" => field.meta_key = value,
                        "meta_value" => field.meta_value = value,
                        _ => {}
                    }
                }
            }
            ("event", "date") => meeting.event.date = value,
            ("event", "status") => meeting.event.status = value,
            ("speaker", key) => {
                if let Some(speaker) = topic.and_then(|topic| topic.speakers.last_mut()) {
                    match key {
                        "name" => speaker.name = value,
                        "title" => speaker.title = value,
                        "bio" => speaker.bio = value,
                        "photo_id" => speaker.photo_id = value,
                        "photo_local_path" => speaker.photo_local_path = Some(value),
                        _ => {}
                    }
                }
            }
            ("presentation", key) => {
                if let Some(topic) = topic {
                    match key {
                        "title" => topic.presentation.title = value,
                        "description" => topic.presentation.description = value,
                        _ => {}
                    }
                }
            }
            ("learning_outcomes", "outcome") => {
                if let Some(topic) = topic {
                    topic.presentation.learning_outcomes.push(value);
                }
            }
            (tag, key) if MaterialKind::from_tag(tag).is_some() => {
                if let Some(material) = topic.and_then(|topic| topic.materials.last_mut()) {
                    match key {
                        "url" => material.url = value,
                        "label" => material.label = value,
                        "local_path" => material.local_path = Some(value),
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
}

/// Parses the XML produced by [`to_xml`] back into a record.
pub fn from_xml(xml: &str) -> Result<Meeting> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);
    let mut builder = RecordBuilder::default();

    loop {
        match reader.read_event()? {
            Event::Start(e) => builder.open(&e)?,
            Event::Empty(e) => {
                builder.open(&e)?;
                builder.close();
            }
            Event::Text(e) => builder.text.push_str(&text_value(&e)),
            Event::CData(e) => builder
                .text
                .push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => builder.close(),
            Event::Eof => break,
            _ => {}
        }
    }

    if !builder.saw_root {
        return Err(Error::InvalidRecord("missing <meeting> root".to_string()));
    }
    Ok(builder.meeting)
}

pub fn read_structured_xml(path: &Path) -> Result<Meeting> {
    let xml = std::fs::read_to_string(path)?;
    from_xml(&xml)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{MeetingMetadata, Presentation};

    fn sample() -> Meeting {
        Meeting {
            metadata: MeetingMetadata {
                title: "APRIL 2021 MEETING ARCHIVE".to_string(),
                post_id: "14812".to_string(),
                ..MeetingMetadata::default()
            },
            custom_fields: vec![CustomField {
                meta_key: "_thumbnail_id".to_string(),
                meta_value: "15001".to_string(),
            }],
            topics: vec![Topic {
                id: 1,
                speakers: vec![Speaker {
                    name: "Jane Smith".to_string(),
                    title: "Analyst & Author".to_string(),
                    photo_id: "15020".to_string(),
                    photo_local_path: Some("jane-smith_15020.jpg".to_string()),
                    ..Speaker::default()
                }],
                presentation: Presentation {
                    title: "Dividends <for> Retirees".to_string(),
                    description: String::new(),
                    learning_outcomes: vec!["Screen stocks".to_string()],
                },
                materials: vec![Material::new(
                    MaterialKind::Slides,
                    "https://example.org/deck.pdf?a=1&b=2",
                    "Slides",
                )],
            }],
            ..Meeting::default()
        }
    }

    #[test]
    fn xml_matches_record_layout() {
        let xml = to_xml(&sample()).unwrap();
        assert!(xml.contains(r#"<topic id="1">"#));
        assert!(xml.contains("<status>not_validated</status>"));
        assert!(xml.contains("<slides>"));
        assert!(!xml.contains("<description>"));
        assert!(xml.contains("<photo_local_path>jane-smith_15020.jpg</photo_local_path>"));
    }

    #[test]
    fn xml_reads_back_into_the_same_record() {
        let meeting = sample();
        let parsed = from_xml(&to_xml(&meeting).unwrap()).unwrap();
        assert_eq!(parsed, meeting);
    }

    #[test]
    fn rejects_foreign_documents() {
        assert!(matches!(
            from_xml("<rss><channel/></rss>"),
            Err(Error::InvalidRecord(_))
        ));
        assert!(from_xml("").is_err());
    }

    #[test]
    fn missing_topic_id_falls_back_to_position() {
        let xml = "<meeting><topics><topic/><topic><speakers><speaker><name>A B</name></speaker></speakers></topic></topics></meeting>";
        let meeting = from_xml(xml).unwrap();
        assert_eq!(meeting.topics.len(), 2);
        assert_eq!(meeting.topics[1].id, 2);
        assert_eq!(meeting.topics[1].speakers[0].name, "A B");
    }
}
