// src/services/aggregator.rs

//! Feed classification and per-item extraction.
//!
//! A fetched feed is classified by its root element:
//!
//! - `<urlset>` → sitemap, one candidate per `<url>` with a `<loc>`
//! - `<rss>`, `<rdf:RDF>` → feed, one candidate per `<item>` with a `<link>`
//!
//! Anything else yields no candidates.

use std::collections::HashSet;

use crate::error::ParseError;
use crate::models::{Candidate, CrawlProvenance, GenericNode, NodeMap};
use crate::services::merge::{merge, split_namespace};
use crate::services::parser::{self, Dialect, Element};
use crate::utils::time::to_epoch;

/// Kind of aggregator document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedKind {
    Sitemap,
    Feed,
}

impl FeedKind {
    /// Classify a root element name, case-insensitively.
    pub fn classify(root: &str) -> Option<Self> {
        match root.to_ascii_lowercase().as_str() {
            "urlset" => Some(Self::Sitemap),
            "rss" | "rdf" => Some(Self::Feed),
            _ => None,
        }
    }
}

/// Extract candidates from a fetched sitemap or feed.
///
/// Never fails; a document that cannot be classified is logged and yields
/// nothing.
pub fn dispatch(markup: &str, provenance: &CrawlProvenance) -> Vec<Candidate> {
    match try_dispatch(markup, provenance) {
        Ok(candidates) => candidates,
        Err(e) => {
            log::warn!("No candidates from {}: {}", provenance.source_url, e);
            Vec::new()
        }
    }
}

/// Like [`dispatch`], but reports why a document produced nothing.
pub fn try_dispatch(
    markup: &str,
    provenance: &CrawlProvenance,
) -> Result<Vec<Candidate>, ParseError> {
    let (kind, root) = locate_root(markup)?;
    let candidates = match kind {
        FeedKind::Sitemap => extract_sitemap(&root, provenance),
        FeedKind::Feed => extract_feed(&root, provenance)?,
    };
    log::debug!(
        "{:?} {} yielded {} candidate(s)",
        kind,
        provenance.source_url,
        candidates.len()
    );
    Ok(candidates)
}

/// Find the aggregator root, falling back to a lenient HTML read for
/// documents the XML reader gives up on.
fn locate_root(markup: &str) -> Result<(FeedKind, Element), ParseError> {
    let xml_root = parser::read_document(markup, Dialect::Xml);
    if let Some(root) = &xml_root {
        if let Some(kind) = FeedKind::classify(&root.name) {
            return Ok((kind, root.clone()));
        }
    }

    if let Some(html_root) = parser::read_document(markup, Dialect::Html) {
        for name in ["urlset", "rss", "rdf"] {
            if let Some(found) = html_root.find(name) {
                if let Some(kind) = FeedKind::classify(&found.name) {
                    return Ok((kind, found.clone()));
                }
            }
        }
    }

    match xml_root {
        Some(root) => Err(ParseError::UnknownSchema { root: root.name }),
        None => Err(ParseError::EmptyDocument),
    }
}

fn extract_sitemap(root: &Element, provenance: &CrawlProvenance) -> Vec<Candidate> {
    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for url in root.find_all("url") {
        let Some(loc) = url.child("loc").map(Element::all_text) else {
            continue;
        };
        if loc.is_empty() || !seen.insert(loc.clone()) {
            continue;
        }

        let mut sitemap = into_map(parser::tree_of(url));
        if let Some(epoch) = sitemap
            .get("lastmod")
            .and_then(GenericNode::text)
            .and_then(to_epoch)
        {
            sitemap.insert("lastmod_time".into(), epoch.to_string().into());
        }

        let tree = GenericNode::mapping([
            ("url", GenericNode::from(loc.as_str())),
            ("sitemap", GenericNode::Mapping(sitemap)),
        ]);
        candidates.push(Candidate {
            key: loc,
            tree,
            provenance: provenance.clone(),
        });
    }
    candidates
}

fn extract_feed(
    root: &Element,
    provenance: &CrawlProvenance,
) -> Result<Vec<Candidate>, ParseError> {
    let items = root.find_all("item");

    // Shared by every item: root attributes, then the channel minus its items
    let attrs = split_namespace(
        root.attrs
            .iter()
            .map(|(k, v)| (k.as_str(), GenericNode::from(v.as_str()))),
    );
    let channel = root
        .find("channel")
        .map(|c| parser::tree_of(&c.without("item")))
        .ok_or_else(|| ParseError::MissingElement {
            element: "channel".into(),
        });
    let channel = match channel {
        Ok(channel) => channel,
        // RSS requires a channel; RDF feeds without one still carry items
        Err(e) if items.is_empty() => return Err(e),
        Err(_) => GenericNode::empty(),
    };

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();

    for item in items {
        let Some(link) = item.child("link").map(Element::all_text) else {
            continue;
        };
        if link.is_empty() || !seen.insert(link.clone()) {
            continue;
        }

        let mut item_tree = into_map(parser::tree_of(item));
        if let Some(epoch) = item_tree
            .get("pubDate")
            .and_then(GenericNode::text)
            .and_then(to_epoch)
        {
            item_tree.insert("pubDate_time".into(), epoch.to_string().into());
        }

        let shared = GenericNode::mapping([
            ("channel", channel.clone()),
            ("item", GenericNode::Mapping(item_tree)),
        ]);
        let rss = merge(shared, &attrs);

        let tree = GenericNode::mapping([("url", GenericNode::from(link.as_str())), ("rss", rss)]);
        candidates.push(Candidate {
            key: link,
            tree,
            provenance: provenance.clone(),
        });
    }
    Ok(candidates)
}

fn into_map(node: GenericNode) -> NodeMap {
    match node {
        GenericNode::Mapping(map) => map,
        other => {
            let mut map = NodeMap::new();
            map.insert(crate::models::CONTENT_KEY.to_string(), other);
            map
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prov() -> CrawlProvenance {
        CrawlProvenance::new(1_600_000_000, "https://example.com/feed")
    }

    fn s(v: &str) -> GenericNode {
        GenericNode::from(v)
    }

    const SITEMAP: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"
        xmlns:news="http://www.google.com/schemas/sitemap-news/0.9">
  <url>
    <loc>http://x/1</loc>
    <lastmod>2020-01-01T00:00:00Z</lastmod>
    <news:news><news:title>First</news:title></news:news>
  </url>
  <url><lastmod>2020-01-02</lastmod></url>
  <url><loc>http://x/2</loc></url>
</urlset>"#;

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0" xmlns:dc="http://purl.org/dc/elements/1.1/">
  <channel>
    <title>Example News</title>
    <link>http://x/</link>
    <image><url>http://x/logo.png</url><title>Example</title></image>
    <item>
      <title>One</title>
      <link>http://x/a</link>
      <pubDate>Wed, 01 Jan 2020 00:00:00 GMT</pubDate>
      <dc:creator>Jane</dc:creator>
      <category>Politics</category>
      <category>World</category>
    </item>
    <item>
      <title>No link here</title>
    </item>
    <item>
      <title>Two</title>
      <link>http://x/b</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn test_classify() {
        assert_eq!(FeedKind::classify("urlset"), Some(FeedKind::Sitemap));
        assert_eq!(FeedKind::classify("RSS"), Some(FeedKind::Feed));
        assert_eq!(FeedKind::classify("RDF"), Some(FeedKind::Feed));
        assert_eq!(FeedKind::classify("rdf"), Some(FeedKind::Feed));
        assert_eq!(FeedKind::classify("html"), None);
    }

    #[test]
    fn test_sitemap_extraction() {
        let candidates = dispatch(SITEMAP, &prov());
        assert_eq!(candidates.len(), 2);

        let first = &candidates[0];
        assert_eq!(first.key, "http://x/1");
        assert_eq!(first.tree.get("url"), Some(&s("http://x/1")));
        assert_eq!(
            first.tree.lookup(&["sitemap", "lastmod_time"]),
            Some(&s("1577836800"))
        );
        assert_eq!(
            first.tree.lookup(&["sitemap", "news", "news", "title"]),
            Some(&s("First"))
        );
        assert_eq!(first.provenance, prov());
        assert_eq!(candidates[1].key, "http://x/2");
    }

    #[test]
    fn test_empty_sitemap() {
        let markup = r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9"></urlset>"#;
        assert_eq!(try_dispatch(markup, &prov()), Ok(Vec::new()));
    }

    #[test]
    fn test_rss_extraction_skips_items_without_link() {
        let candidates = dispatch(RSS, &prov());
        let keys: Vec<&str> = candidates.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["http://x/a", "http://x/b"]);

        let tree = &candidates[0].tree;
        assert_eq!(tree.lookup(&["rss", "version"]), Some(&s("2.0")));
        assert_eq!(tree.lookup(&["rss", "item", "title"]), Some(&s("One")));
        assert_eq!(tree.lookup(&["rss", "item", "dc", "creator"]), Some(&s("Jane")));
        assert_eq!(
            tree.lookup(&["rss", "item", "pubDate_time"]),
            Some(&s("1577836800"))
        );
        assert_eq!(
            tree.lookup(&["rss", "channel", "title"]),
            Some(&s("Example News"))
        );
        assert_eq!(
            tree.lookup(&["rss", "channel", "image", "url"]),
            Some(&s("http://x/logo.png"))
        );
        // Channel metadata does not pick up item content
        assert_eq!(tree.lookup(&["rss", "channel", "item"]), None);
    }

    #[test]
    fn test_atom_link_does_not_hide_item_link() {
        let markup = r#"<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom">
  <channel>
    <atom:link href="http://x/feed" rel="self"/>
    <title>T</title>
    <item>
      <atom:link href="http://x/a" rel="self"/>
      <link>http://x/a</link>
      <title>A</title>
    </item>
  </channel>
</rss>"#;
        let candidates = dispatch(markup, &prov());
        let keys: Vec<&str> = candidates.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["http://x/a"]);
        assert_eq!(
            candidates[0].tree.lookup(&["rss", "item", "atom", "link", "rel"]),
            Some(&s("self"))
        );
    }

    #[test]
    fn test_rdf_items_outside_channel() {
        let markup = r#"<rdf:RDF xmlns:rdf="http://www.w3.org/1999/02/22-rdf-syntax-ns#"
                 xmlns="http://purl.org/rss/1.0/">
  <channel><title>RDF Feed</title></channel>
  <item><title>A</title><link>http://x/rdf-a</link></item>
</rdf:RDF>"#;
        let candidates = dispatch(markup, &prov());
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].key, "http://x/rdf-a");
        assert_eq!(
            candidates[0].tree.lookup(&["rss", "channel", "title"]),
            Some(&s("RDF Feed"))
        );
    }

    #[test]
    fn test_unknown_schema_yields_nothing() {
        let result = try_dispatch("<feed><entry/></feed>", &prov());
        assert_eq!(
            result,
            Err(ParseError::UnknownSchema {
                root: "feed".into()
            })
        );
        assert!(dispatch("<feed><entry/></feed>", &prov()).is_empty());
        assert!(dispatch("", &prov()).is_empty());
    }

    #[test]
    fn test_rss_without_channel_or_items() {
        assert_eq!(
            try_dispatch("<rss version=\"2.0\"></rss>", &prov()),
            Err(ParseError::MissingElement {
                element: "channel".into()
            })
        );
    }
}
