// src/services/article.rs

//! Article page extraction: metadata, readable text, archived images.

use std::collections::BTreeMap;
use std::sync::Arc;

use scraper::{ElementRef, Html, Node};

use crate::models::GenericNode;
use crate::services::merge::split_namespace;
use crate::storage::ObjectArchive;

/// Subtrees that never contribute to the readable text.
const DROPPED_TAGS: &[&str] = &[
    "head", "header", "nav", "aside", "footer", "script", "noscript", "style", "meta", "button",
    "source", "img", "path", "svg", "form", "embed", "menu", "iframe",
];

const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".gif", ".png", ".bmp", ".tiff"];

/// What one article page yields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    pub html: String,
    pub text: String,
    /// `<meta>` values split on `:`, plus the page `title`
    pub meta: GenericNode,
}

/// Everything read from the DOM; built before any await point.
struct PageParts {
    entries: BTreeMap<String, String>,
    title: Option<String>,
    text: String,
}

/// Extracts metadata and text from fetched article pages.
#[derive(Default, Clone)]
pub struct ArticleExtractor {
    archive: Option<Arc<dyn ObjectArchive>>,
}

impl ArticleExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extractor that archives image references found in page metadata.
    pub fn with_archive(archive: Option<Arc<dyn ObjectArchive>>) -> Self {
        Self { archive }
    }

    /// Extract a fetched page, already decoded to text.
    pub async fn extract(&self, url: &str, html: &str) -> ExtractedPage {
        let html = html.to_string();
        let PageParts {
            mut entries,
            title,
            text,
        } = read_page(&html);

        if let Some(archive) = &self.archive {
            for value in entries.values_mut() {
                if !looks_like_image(value.as_str()) {
                    continue;
                }
                match archive.archive(value.as_str()).await {
                    Ok(reference) => *value = reference,
                    Err(e) => log::warn!("Keeping remote image {} for {}: {}", value, url, e),
                }
            }
        }

        let meta = split_namespace(
            entries
                .into_iter()
                .map(|(key, value)| (key, GenericNode::from(value))),
        );
        let meta = match (meta, title) {
            (GenericNode::Mapping(mut map), Some(title)) => {
                map.insert("title".into(), title.into());
                GenericNode::Mapping(map)
            }
            (meta, _) => meta,
        };

        ExtractedPage { html, text, meta }
    }
}

fn looks_like_image(value: &str) -> bool {
    let value = value.to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| value.contains(ext))
}

fn read_page(html: &str) -> PageParts {
    let document = Html::parse_document(html);
    let elements = || document.root_element().descendants().filter_map(ElementRef::wrap);

    // Later tags overwrite earlier ones with the same key
    let mut entries = BTreeMap::new();
    for meta in elements().filter(|e| e.value().name() == "meta") {
        let Some(content) = meta.value().attr("content") else {
            continue;
        };
        for attr in ["property", "name"] {
            if let Some(key) = meta.value().attr(attr) {
                entries.insert(key.to_string(), content.to_string());
            }
        }
    }

    // Only the document title; `<title>` also appears inside inline SVG
    let title = elements()
        .find(|e| e.value().name() == "head")
        .and_then(|head| {
            head.children()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "title")
        })
        .map(|e| e.text().collect::<String>().trim().to_string());

    let scope = elements()
        .find(|e| e.value().name() == "article")
        .or_else(|| elements().find(|e| e.value().name() == "body"))
        .unwrap_or_else(|| document.root_element());
    let mut raw = String::new();
    collect_text(scope, &mut raw);

    PageParts {
        entries,
        title,
        text: readable_lines(&raw),
    }
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) if DROPPED_TAGS.contains(&el.name()) => {}
            Node::Element(_) => {
                if let Some(child) = ElementRef::wrap(child) {
                    collect_text(child, out);
                }
            }
            _ => {}
        }
    }
}

/// One trimmed phrase per line; double spaces split headlines apart.
fn readable_lines(raw: &str) -> String {
    raw.lines()
        .flat_map(|line| line.trim().split("  "))
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
