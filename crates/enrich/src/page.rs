//! Owned view of a fetched HTML page, built from the `tl` DOM.

use archive_core::text::{collapse_whitespace, decode_entities};

const IGNORED_ELEMENTS: &[&str] = &["script", "style", "noscript"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageNode {
    Element {
        name: String,
        attrs: Vec<(String, String)>,
        children: Vec<PageNode>,
    },
    Text(String),
}

impl PageNode {
    pub fn name(&self) -> Option<&str> {
        match self {
            PageNode::Element { name, .. } => Some(name),
            PageNode::Text(_) => None,
        }
    }

    pub fn attr(&self, key: &str) -> Option<&str> {
        match self {
            PageNode::Element { attrs, .. } => attrs
                .iter()
                .find(|(name, _)| name == key)
                .map(|(_, value)| value.as_str()),
            PageNode::Text(_) => None,
        }
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        match self {
            PageNode::Text(text) => out.push(text.clone()),
            PageNode::Element { children, .. } => {
                for child in children {
                    child.collect_text(out);
                }
            }
        }
    }

    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        collapse_whitespace(&parts.join(" "))
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PageNode)) {
        visit(self);
        if let PageNode::Element { children, .. } = self {
            for child in children {
                child.walk(visit);
            }
        }
    }

    /// `src` of the first `<img>` in this subtree, if it has one.
    fn first_image_src(&self) -> Option<&str> {
        let mut first = None;
        self.walk(&mut |node| {
            if first.is_none() && node.name() == Some("img") {
                first = Some(node);
            }
        });
        first?.attr("src").filter(|src| !src.is_empty())
    }
}

fn convert(handle: tl::NodeHandle, parser: &tl::Parser) -> Option<PageNode> {
    let node = handle.get(parser)?;

    match node {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            if IGNORED_ELEMENTS.contains(&name.as_str()) {
                return None;
            }

            let mut attrs = Vec::new();
            for (key, value) in tag.attributes().iter() {
                let key: &str = key.as_ref();
                let value = value.map(|v| decode_entities(&v).into_owned()).unwrap_or_default();
                attrs.push((key.to_lowercase(), value));
            }
            if !attrs.iter().any(|(key, _)| key == "class") {
                if let Some(class) = tag.attributes().class() {
                    attrs.push(("class".to_string(), class.as_utf8_str().into_owned()));
                }
            }

            let children = tag
                .children()
                .top()
                .iter()
                .filter_map(|child| convert(*child, parser))
                .collect();

            Some(PageNode::Element {
                name,
                attrs,
                children,
            })
        }
        tl::Node::Raw(bytes) => {
            let text = bytes.as_utf8_str();
            if text.trim().is_empty() {
                None
            } else {
                Some(PageNode::Text(decode_entities(&text).into_owned()))
            }
        }
        tl::Node::Comment(_) => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    pub nodes: Vec<PageNode>,
}

impl Page {
    pub fn parse(html: &str) -> Self {
        let Ok(dom) = tl::parse(html, tl::ParserOptions::default()) else {
            tracing::warn!("page could not be parsed as HTML; keeping it as text");
            return Self {
                nodes: vec![PageNode::Text(html.to_string())],
            };
        };

        let parser = dom.parser();
        let nodes = dom
            .children()
            .iter()
            .filter_map(|handle| convert(*handle, parser))
            .collect();
        Self { nodes }
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a PageNode)) {
        for node in &self.nodes {
            node.walk(visit);
        }
    }

    pub fn elements(&self, names: &[&str]) -> Vec<&PageNode> {
        let mut found = Vec::new();
        self.walk(&mut |node| {
            if node.name().is_some_and(|name| names.contains(&name)) {
                found.push(node);
            }
        });
        found
    }

    pub fn images(&self) -> Vec<&PageNode> {
        self.elements(&["img"])
    }

    /// Every non-empty `href` in document order.
    pub fn links(&self) -> Vec<String> {
        self.elements(&["a"])
            .into_iter()
            .filter_map(|link| link.attr("href"))
            .map(|href| href.trim().to_string())
            .filter(|href| !href.is_empty())
            .collect()
    }

    pub fn headings(&self, levels: &[&str]) -> Vec<String> {
        self.elements(levels)
            .into_iter()
            .map(PageNode::text)
            .filter(|text| !text.is_empty())
            .collect()
    }

    pub fn text(&self) -> String {
        let mut parts = Vec::new();
        for node in &self.nodes {
            node.collect_text(&mut parts);
        }
        collapse_whitespace(&parts.join(" "))
    }

    /// First image within `max_levels` ancestors of a text node mentioning
    /// `needle` (case-insensitive).
    pub fn image_near_text(&self, needle: &str, max_levels: usize) -> Option<String> {
        let needle = needle.to_lowercase();
        if needle.trim().is_empty() {
            return None;
        }
        let mut ancestors = Vec::new();
        self.nodes
            .iter()
            .find_map(|node| image_near(node, &mut ancestors, &needle, max_levels))
    }
}

fn image_near<'a>(
    node: &'a PageNode,
    ancestors: &mut Vec<&'a PageNode>,
    needle: &str,
    max_levels: usize,
) -> Option<String> {
    match node {
        PageNode::Text(text) => {
            if !text.to_lowercase().contains(needle) {
                return None;
            }
            ancestors
                .iter()
                .rev()
                .take(max_levels)
                .find_map(|ancestor| ancestor.first_image_src())
                .map(str::to_string)
        }
        PageNode::Element { children, .. } => {
            ancestors.push(node);
            let mut found = None;
            for child in children {
                found = image_near(child, ancestors, needle, max_levels);
                if found.is_some() {
                    break;
                }
            }
            ancestors.pop();
            found
        }
    }
}
