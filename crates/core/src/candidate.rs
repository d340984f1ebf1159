//! Candidate subtrees for screenshot matching.
//!
//! A candidate is a top-level block of the page body: a landmark element
//! (`header`, `nav`, `section`, ...) or a generic `div` that is not merely a
//! wrapper around other blocks. Wrappers are descended into so that a
//! `<div id="app">` around the whole page never shadows its sections.

use std::collections::{BTreeMap, BTreeSet};

use crate::parse::{Document, Element};

/// Landmark tags that always stand for a page block.
const LANDMARK_TAGS: &[&str] = &["header", "nav", "main", "section", "article", "aside", "footer", "form"];

/// Tags that never form a block on their own and are not descended into.
const SKIPPED_TAGS: &[&str] = &["script", "style", "noscript", "template", "link", "meta", "svg", "br", "hr"];

/// Maximum wrapper nesting followed below `<body>`.
const MAX_WRAPPER_DEPTH: usize = 8;

/// A top-level DOM subtree with the coarse features used for scoring.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Selector matching exactly this element in its document.
    pub selector: String,
    /// Lowercase tag name.
    pub tag_name: String,
    pub id: Option<String>,
    pub classes: Vec<String>,
    /// Position among all candidates in document order.
    pub order: usize,
    /// Visible text, whitespace collapsed.
    pub text: String,
    /// Number of `<img>`, `<picture>` and `<video>` elements inside.
    pub image_count: usize,
    /// Number of `<a>` elements inside.
    pub link_count: usize,
    /// Tag name frequencies of all descendants.
    pub tag_counts: BTreeMap<String, usize>,
}

impl Candidate {
    fn from_element(doc: &Document, element: &Element<'_>, order: usize) -> Self {
        let mut tag_counts = BTreeMap::new();
        for descendant in element.select("*").unwrap_or_default() {
            *tag_counts.entry(descendant.tag_name()).or_insert(0) += 1;
        }

        Self {
            selector: unique_selector(doc, element),
            tag_name: element.tag_name(),
            id: element.id().map(str::to_string),
            classes: element.classes().into_iter().map(str::to_string).collect(),
            order,
            text: element.text(),
            image_count: count_tags(&tag_counts, &["img", "picture", "video"]),
            link_count: count_tags(&tag_counts, &["a"]),
            tag_counts,
        }
    }

    /// Approximate visible text length in characters.
    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Lowercase tokens naming this element: tag, id and class parts.
    ///
    /// `class="hero-banner"` contributes `hero` and `banner`.
    pub fn name_tokens(&self) -> BTreeSet<String> {
        let mut tokens = BTreeSet::new();
        tokens.insert(self.tag_name.clone());
        for name in self.id.iter().chain(self.classes.iter()) {
            tokens.extend(tokenize(name));
        }
        tokens
    }

    /// Words describing the candidate: its visible text plus its name tokens.
    pub fn context_words(&self) -> BTreeSet<String> {
        let mut words = tokenize(&self.text);
        words.extend(self.name_tokens());
        words
    }

    /// Whether the tag or a name token marks page chrome (header, nav, footer).
    pub fn is_chrome(&self) -> bool {
        const CHROME: &[&str] = &["header", "nav", "navbar", "navigation", "menu", "footer", "topbar"];
        self.name_tokens().iter().any(|t| CHROME.contains(&t.as_str()))
    }
}

fn count_tags(tag_counts: &BTreeMap<String, usize>, tags: &[&str]) -> usize {
    tags.iter().map(|t| tag_counts.get(*t).copied().unwrap_or(0)).sum()
}

/// Lowercase alphanumeric tokens of `text`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Collects the top-level candidate blocks of a document's body.
pub fn collect_candidates(doc: &Document) -> Vec<Candidate> {
    let Some(body) = doc.body() else {
        return Vec::new();
    };

    let mut elements = Vec::new();
    collect_from(&body, 0, &mut elements);

    elements
        .iter()
        .enumerate()
        .map(|(order, element)| Candidate::from_element(doc, element, order))
        .collect()
}

fn collect_from<'a>(parent: &Element<'a>, depth: usize, out: &mut Vec<Element<'a>>) {
    for child in parent.children() {
        let tag = child.tag_name();
        if SKIPPED_TAGS.contains(&tag.as_str()) {
            continue;
        }

        let is_block = tag == "div" || LANDMARK_TAGS.contains(&tag.as_str());
        if is_block && !(depth < MAX_WRAPPER_DEPTH && is_wrapper(&child)) {
            if has_content(&child) {
                out.push(child);
            }
        } else if depth < MAX_WRAPPER_DEPTH {
            collect_from(&child, depth + 1, out);
        }
    }
}

/// A wrapper only groups other blocks and carries no text of its own.
///
/// Only `main` and `div` qualify. A wrapper contains a landmark child, or it
/// is the only meaningful child of its parent and holds several blocks.
fn is_wrapper(element: &Element<'_>) -> bool {
    let tag = element.tag_name();
    if (tag != "div" && tag != "main") || element.has_direct_text() {
        return false;
    }

    let children = element.children();
    let blocks: Vec<String> = children
        .iter()
        .map(|c| c.tag_name())
        .filter(|t| t == "div" || LANDMARK_TAGS.contains(&t.as_str()))
        .collect();

    if blocks.iter().any(|t| t != "div") {
        return true;
    }

    let only_child = element.parent().is_some_and(|p| {
        p.children()
            .iter()
            .filter(|c| !SKIPPED_TAGS.contains(&c.tag_name().as_str()))
            .count()
            == 1
    });
    only_child && blocks.len() >= 2
}

fn has_content(element: &Element<'_>) -> bool {
    !element.text().is_empty() || element.select("img, picture, video, svg").is_ok_and(|v| !v.is_empty())
}

fn is_css_ident(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '-' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Builds a selector that matches exactly `element` in `doc`.
///
/// Tries `#id`, then `tag.class...`, then falls back to a
/// `:nth-of-type` path from `body`.
pub fn unique_selector(doc: &Document, element: &Element<'_>) -> String {
    let tag = element.tag_name();

    if let Some(id) = element.id()
        && is_css_ident(id)
    {
        let selector = format!("#{id}");
        if doc.count(&selector) == 1 {
            return selector;
        }
    }

    let classes: Vec<&str> = element.classes().into_iter().filter(|c| is_css_ident(c)).collect();
    if !classes.is_empty() {
        let selector = format!("{tag}.{}", classes.join("."));
        if doc.count(&selector) == 1 {
            return selector;
        }
    }

    nth_of_type_path(element)
}

fn nth_of_type_path(element: &Element<'_>) -> String {
    let mut parts = Vec::new();
    let mut current = Some(*element);

    while let Some(el) = current {
        let tag = el.tag_name();
        if tag == "body" || tag == "html" {
            break;
        }
        parts.push(format!("{tag}:nth-of-type({})", el.nth_of_type()));
        current = el.parent();
    }

    parts.push("body".to_string());
    parts.reverse();
    parts.join(" > ")
}
