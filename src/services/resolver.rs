// src/services/resolver.rs

//! Canonical record inference from a generic document tree.
//!
//! Values the page states directly (`meta.og.*`, `meta.article.*`, ...) are
//! taken as they are. Every canonical field still missing afterwards is
//! filled from the first fallback path that resolves in full.

use std::collections::BTreeMap;

use crate::models::{
    ArticleMeta, Author, CONTENT_KEY, CanonicalRecord, GenericNode, HarvestMeta, NodeMap,
    OpenGraph,
};
use crate::services::merge::merge;
use crate::utils::time::to_epoch;

/// Page metadata namespaces copied into the record as found.
const CANONICAL_NAMESPACES: &[&str] = &["og", "article", "music", "video", "book", "profile"];

/// A canonical field and the tree paths it may be filled from, best first.
struct FallbackChain {
    field: &'static [&'static str],
    sources: &'static [&'static [&'static str]],
}

const CHAINS: &[FallbackChain] = &[
    FallbackChain {
        field: &["og", "title"],
        sources: &[
            &["meta", "twitter", "title"],
            &["rss", "item", "title"],
            &["meta", "title"],
        ],
    },
    FallbackChain {
        field: &["og", "image"],
        sources: &[&["meta", "twitter", "image"], &["rss", "channel", "image"]],
    },
    FallbackChain {
        field: &["og", "description"],
        sources: &[
            &["meta", "twitter", "description"],
            &["meta", "description"],
            &["rss", "item", "description"],
        ],
    },
    FallbackChain {
        field: &["og", "site_name"],
        sources: &[&["rss", "channel", "title"]],
    },
    FallbackChain {
        field: &["article", "published_time"],
        sources: &[&["rss", "item", "pubDate"], &["rss", "item", "dc", "date"]],
    },
    FallbackChain {
        field: &["article", "modified_time"],
        sources: &[&["meta", "og", "updated_time"], &["sitemap", "lastmod"]],
    },
    FallbackChain {
        field: &["article", "author"],
        sources: &[&["meta", "article", "author"], &["rss", "item", "dc", "creator"]],
    },
    FallbackChain {
        field: &["article", "tag"],
        sources: &[&["rss", "item", "category"], &["meta", "keywords"]],
    },
];

const OG_FIELDS: &[&str] = &["url", "title", "image", "description", "site_name"];
const ARTICLE_FIELDS: &[&str] = &["published_time", "modified_time", "author", "tag"];

/// Build the canonical record for a generic tree.
///
/// `og.url` always comes from the tree's top-level `url`.
pub fn resolve(tree: &GenericNode, outlet: &str) -> CanonicalRecord {
    let url = tree
        .get("url")
        .and_then(GenericNode::text)
        .unwrap_or_default()
        .to_string();
    let inferred = infer(tree, &url);
    project(inferred, url, outlet)
}

/// Flatten a tag value into a list of strings.
///
/// - `"a, b,c"` → `["a", "b", "c"]`
/// - `{content: "x"}` → `["x"]`
/// - `[{content: "a"}, "b"]` → `["a", "b"]`
pub fn normalize_tags(node: &GenericNode) -> Vec<String> {
    let tags: Vec<String> = match node {
        GenericNode::Scalar(s) => s.split(',').map(|t| t.trim().to_string()).collect(),
        GenericNode::Mapping(map) => match map.get(CONTENT_KEY) {
            Some(content) => content.text().map(str::to_string).into_iter().collect(),
            None => map.keys().cloned().collect(),
        },
        GenericNode::Sequence(items) => items
            .iter()
            .filter_map(|item| item.text().map(|t| t.trim().to_string()))
            .collect(),
    };
    tags.into_iter().filter(|t| !t.is_empty()).collect()
}

/// First source path that resolves in full.
fn first_present<'a>(tree: &'a GenericNode, sources: &[&[&str]]) -> Option<&'a GenericNode> {
    sources.iter().find_map(|&path| tree.lookup(path))
}

fn infer(tree: &GenericNode, url: &str) -> GenericNode {
    let mut direct = NodeMap::new();
    if let Some(meta) = tree.get("meta") {
        for ns in CANONICAL_NAMESPACES {
            if let Some(value) = meta.get(ns) {
                direct.insert(ns.to_string(), value.clone());
            }
        }
    }

    let og = direct.remove("og").unwrap_or_default();
    let mut og = match og {
        GenericNode::Mapping(map) => map,
        other => NodeMap::from([(CONTENT_KEY.to_string(), other)]),
    };
    og.insert("url".into(), url.into());
    direct.insert("og".into(), GenericNode::Mapping(og));

    CHAINS
        .iter()
        .fold(GenericNode::Mapping(direct), |acc, chain| {
            if acc.lookup(chain.field).is_some() {
                return acc;
            }
            match first_present(tree, chain.sources) {
                Some(value) => merge(acc, &GenericNode::nest(chain.field, value.clone())),
                None => acc,
            }
        })
}

fn project(inferred: GenericNode, url: String, outlet: &str) -> CanonicalRecord {
    let GenericNode::Mapping(mut sections) = inferred else {
        return CanonicalRecord {
            og: OpenGraph {
                url,
                ..Default::default()
            },
            wa: HarvestMeta {
                outlet: outlet.to_string(),
                publish_time: None,
            },
            ..Default::default()
        };
    };

    let mut extensions = BTreeMap::new();

    let og_section = sections.remove("og").unwrap_or_default();
    let text_of = |key: &str| {
        og_section
            .get(key)
            .and_then(GenericNode::text)
            .map(str::to_string)
    };
    let og = OpenGraph {
        url,
        title: text_of("title"),
        image: text_of("image"),
        description: text_of("description"),
        site_name: text_of("site_name"),
    };
    if let Some(rest) = leftovers(&og_section, OG_FIELDS) {
        extensions.insert("og".to_string(), rest);
    }

    let article_section = sections.remove("article").unwrap_or_default();
    let article = ArticleMeta {
        published_time: article_section
            .get("published_time")
            .and_then(GenericNode::text)
            .map(str::to_string),
        modified_time: article_section
            .get("modified_time")
            .and_then(GenericNode::text)
            .map(str::to_string),
        author: article_section.get("author").and_then(author_of),
        tag: article_section
            .get("tag")
            .map(normalize_tags)
            .unwrap_or_default(),
    };
    if let Some(rest) = leftovers(&article_section, ARTICLE_FIELDS) {
        extensions.insert("article".to_string(), rest);
    }

    // Unparseable published time leaves the epoch absent, no fallback
    let publish_time = match (&article.published_time, &article.modified_time) {
        (Some(published), _) => to_epoch(published),
        (None, Some(modified)) => to_epoch(modified),
        (None, None) => None,
    };
    if publish_time.is_none() && article.published_time.is_some() {
        log::debug!(
            "Unparseable published_time {:?} for {}",
            article.published_time,
            og.url
        );
    }

    extensions.extend(sections);

    CanonicalRecord {
        og,
        article,
        wa: HarvestMeta {
            outlet: outlet.to_string(),
            publish_time,
        },
        extensions,
    }
}

fn author_of(node: &GenericNode) -> Option<Author> {
    node.get("username")
        .and_then(GenericNode::text)
        .or_else(|| node.text())
        .map(|username| Author {
            username: username.trim().to_string(),
        })
}

/// Section entries with no fixed field, if any.
fn leftovers(section: &GenericNode, fixed: &[&str]) -> Option<GenericNode> {
    match section {
        GenericNode::Mapping(map) => {
            let rest: NodeMap = map
                .iter()
                .filter(|(k, _)| !fixed.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            (!rest.is_empty()).then_some(GenericNode::Mapping(rest))
        }
        other if other.is_empty() => None,
        other => Some(other.clone()),
    }
}
