//! WordPress eXtended RSS (WXR) reading and single-item writing.

use crate::text::{decode_entities, slugify};
use crate::Result;
use quick_xml::events::{BytesCData, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;
use std::path::Path;

const NAMESPACES: &[(&str, &str)] = &[
    ("xmlns:excerpt", "http://wordpress.org/export/1.2/excerpt/"),
    ("xmlns:content", "http://purl.org/rss/1.0/modules/content/"),
    ("xmlns:dc", "http://purl.org/dc/elements/1.1/"),
    ("xmlns:wp", "http://wordpress.org/export/1.2/"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PostMeta {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Post {
    pub title: String,
    pub link: String,
    pub post_id: String,
    pub post_name: String,
    pub post_date: String,
    pub post_date_gmt: String,
    pub post_type: String,
    pub category: String, // first category only
    pub creator: String,
    pub description: String,
    pub content: String, // content:encoded
    pub meta: Vec<PostMeta>,
}

impl Post {
    pub fn is_archive(&self) -> bool {
        self.title.to_uppercase().contains("ARCHIVE") && self.post_type == "post"
    }

    /// `<title-slug>-<post id>`, the name used for per-post files.
    pub fn file_stem(&self) -> String {
        let id = if self.post_id.is_empty() {
            "unknown"
        } else {
            self.post_id.as_str()
        };
        format!("{}-{id}", slugify(&self.title))
    }

    fn set_field(&mut self, element: &str, value: String) {
        let slot = match element {
            "title" => &mut self.title,
            "link" => &mut self.link,
            "description" => &mut self.description,
            "dc:creator" => &mut self.creator,
            "content:encoded" => &mut self.content,
            "wp:post_id" => &mut self.post_id,
            "wp:post_name" => &mut self.post_name,
            "wp:post_date" => &mut self.post_date,
            "wp:post_date_gmt" => &mut self.post_date_gmt,
            "wp:post_type" => &mut self.post_type,
            "category" if self.category.is_empty() => &mut self.category,
            _ => return,
        };
        *slot = value;
    }

    fn fields(&self) -> [(&'static str, &str); 10] {
        [
            ("title", &self.title),
            ("link", &self.link),
            ("dc:creator", &self.creator),
            ("description", &self.description),
            ("wp:post_id", &self.post_id),
            ("wp:post_date", &self.post_date),
            ("wp:post_date_gmt", &self.post_date_gmt),
            ("wp:post_name", &self.post_name),
            ("wp:post_type", &self.post_type),
            ("category", &self.category),
        ]
    }
}

pub(crate) fn element_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

pub(crate) fn text_value(e: &BytesText<'_>) -> String {
    match e.unescape() {
        Ok(text) => text.into_owned(),
        // HTML entities such as &nbsp; are not known to the XML unescaper
        Err(_) => decode_entities(&String::from_utf8_lossy(e)).into_owned(),
    }
}

/// Every `<item>` in the document, wherever it is nested.
pub fn read_posts(xml: &str) -> Result<Vec<Post>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut posts = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current: Option<Post> = None;
    let mut meta: Option<PostMeta> = None;
    let mut text = String::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = element_name(e.name().as_ref());
                match name.as_str() {
                    "item" => current = Some(Post::default()),
                    "wp:postmeta" if current.is_some() => meta = Some(PostMeta::default()),
                    _ => {}
                }
                stack.push(name);
                text.clear();
            }
            Event::Text(e) => text.push_str(&text_value(&e)),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(&e.into_inner())),
            Event::End(_) => {
                let Some(name) = stack.pop() else {
                    continue;
                };
                let value = std::mem::take(&mut text);
                if name == "item" {
                    if let Some(post) = current.take() {
                        posts.push(post);
                    }
                    continue;
                }
                let Some(post) = current.as_mut() else {
                    continue;
                };
                let parent = stack.last().map(String::as_str).unwrap_or_default();
                match (parent, name.as_str()) {
                    ("item", "wp:postmeta") => {
                        if let Some(entry) = meta.take() {
                            post.meta.push(entry);
                        }
                    }
                    ("wp:postmeta", "wp:meta_key") => {
                        if let Some(entry) = meta.as_mut() {
                            entry.key = value;
                        }
                    }
                    ("wp:postmeta", "wp:meta_value") => {
                        if let Some(entry) = meta.as_mut() {
                            entry.value = value;
                        }
                    }
                    ("item", field) => post.set_field(field, value),
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(posts)
}

pub fn read_post_file(path: &Path) -> Result<Vec<Post>> {
    let xml = std::fs::read_to_string(path)?;
    read_posts(&xml)
}

pub(crate) fn write_text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(value)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_cdata_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    if value.contains("]]>") {
        writer.write_event(Event::Text(BytesText::new(value)))?;
    } else {
        writer.write_event(Event::CData(BytesCData::new(value)))?;
    }
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// A standalone document holding a single `<item>`, readable by [`read_posts`].
pub fn write_item(post: &Post) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    let mut item = BytesStart::new("item");
    for (key, value) in NAMESPACES {
        item.push_attribute((*key, *value));
    }
    writer.write_event(Event::Start(item))?;

    for (name, value) in post.fields() {
        if !value.is_empty() {
            write_text_element(&mut writer, name, value)?;
        }
    }
    write_cdata_element(&mut writer, "content:encoded", &post.content)?;

    for entry in &post.meta {
        writer.write_event(Event::Start(BytesStart::new("wp:postmeta")))?;
        write_text_element(&mut writer, "wp:meta_key", &entry.key)?;
        write_cdata_element(&mut writer, "wp:meta_value", &entry.value)?;
        writer.write_event(Event::End(BytesEnd::new("wp:postmeta")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("item")))?;

    let body = String::from_utf8_lossy(&writer.into_inner().into_inner()).into_owned();
    Ok(format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{body}\n"))
}
