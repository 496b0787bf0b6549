// src/services/parser.rs

//! Markup to generic tree conversion.
//!
//! Parsing happens in two steps. A dialect reader turns the raw markup into a
//! lightweight [`Element`] tree, tolerating whatever it can; the tree builder
//! then walks that tree into a [`GenericNode`]:
//!
//! - unprefixed tags become ordinary keys, prefixed tags are nested under
//!   their namespace prefix (`dc:creator` → `dc.creator`)
//! - an element with child elements maps to the tree of its children, any
//!   inline text around them is dropped
//! - a leaf with attributes maps to `{attr: value, ..., content: text}`,
//!   a bare leaf to its trimmed text
//! - repeated sibling tags collect into a sequence in document order
//!
//! Nothing here fails: markup without a usable root produces an empty mapping.

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use scraper::{ElementRef, Html, Node};

use crate::models::{CONTENT_KEY, GenericNode, NodeMap};
use crate::services::merge::merge;

/// Markup flavour of the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Sitemaps, RSS and RDF feeds
    Xml,
    /// Web pages; lenient, names are lowercased
    Html,
}

/// A parsed markup element.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub prefix: Option<String>,
    pub name: String,
    pub attrs: Vec<(String, String)>,
    /// Text directly inside the element
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    /// First descendant (or self) with the given local name.
    pub fn find(&self, name: &str) -> Option<&Element> {
        if self.name.eq_ignore_ascii_case(name) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(name))
    }

    /// All descendants with the given local name, in document order.
    pub fn find_all<'a>(&'a self, name: &str) -> Vec<&'a Element> {
        let mut found = Vec::new();
        for child in &self.children {
            child.collect_named(name, &mut found);
        }
        found
    }

    fn collect_named<'a>(&'a self, name: &str, found: &mut Vec<&'a Element>) {
        if self.name.eq_ignore_ascii_case(name) {
            found.push(self);
            // Nested elements of the same name belong to this one
            return;
        }
        for child in &self.children {
            child.collect_named(name, found);
        }
    }

    /// Direct unprefixed child with the given name.
    ///
    /// `<atom:link>` is not a `link`; prefixed tags live under their own
    /// namespace in the tree as well.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children
            .iter()
            .find(|c| c.prefix.is_none() && c.name.eq_ignore_ascii_case(name))
    }

    /// Copy of this element with every descendant named `name` removed.
    pub fn without(&self, name: &str) -> Element {
        Element {
            prefix: self.prefix.clone(),
            name: self.name.clone(),
            attrs: self.attrs.clone(),
            text: self.text.clone(),
            children: self
                .children
                .iter()
                .filter(|c| !c.name.eq_ignore_ascii_case(name))
                .map(|c| c.without(name))
                .collect(),
        }
    }

    /// Trimmed text of this element and all descendants.
    pub fn all_text(&self) -> String {
        let mut out = String::new();
        self.push_text(&mut out);
        out.trim().to_string()
    }

    fn push_text(&self, out: &mut String) {
        out.push_str(&self.text);
        for child in &self.children {
            child.push_text(out);
        }
    }
}

/// Parse markup into a generic tree keyed by the root element's name.
pub fn parse(markup: &str, dialect: Dialect) -> GenericNode {
    match read_document(markup, dialect) {
        Some(root) => build_tree(std::slice::from_ref(&root)),
        None => GenericNode::empty(),
    }
}

/// Read markup into an element tree; `None` when no element survives.
pub fn read_document(markup: &str, dialect: Dialect) -> Option<Element> {
    match dialect {
        Dialect::Xml => read_xml(markup),
        Dialect::Html => read_html(markup),
    }
}

/// Generic tree of an element's children.
pub fn tree_of(element: &Element) -> GenericNode {
    build_tree(&element.children)
}

/// Build the mapping for a list of sibling elements.
pub fn build_tree(elements: &[Element]) -> GenericNode {
    // Unprefixed tags collect in `plain` and are flattened into the result
    let mut plain = NodeMap::new();
    let mut namespaced: Vec<(String, NodeMap)> = Vec::new();

    for element in elements {
        let value = element_value(element);
        let bucket = match element.prefix.as_deref() {
            None => &mut plain,
            Some(prefix) => match namespaced.iter().position(|(p, _)| p == prefix) {
                Some(idx) => &mut namespaced[idx].1,
                None => {
                    namespaced.push((prefix.to_string(), NodeMap::new()));
                    let last = namespaced.len() - 1;
                    &mut namespaced[last].1
                }
            },
        };
        GenericNode::push_child(bucket, &element.name, value);
    }

    let nested: NodeMap = namespaced
        .into_iter()
        .map(|(prefix, map)| (prefix, GenericNode::Mapping(map)))
        .collect();
    merge(GenericNode::Mapping(nested), &GenericNode::Mapping(plain))
}

fn element_value(element: &Element) -> GenericNode {
    if !element.children.is_empty() {
        let tree = build_tree(&element.children);
        return match element.prefix.as_deref() {
            Some(prefix) => hoist_namespace(tree, prefix),
            None => tree,
        };
    }

    let text = element.text.trim().to_string();
    if element.attrs.is_empty() {
        return GenericNode::Scalar(text);
    }

    let mut map: NodeMap = element
        .attrs
        .iter()
        .map(|(k, v)| (k.clone(), GenericNode::Scalar(v.clone())))
        .collect();
    map.insert(CONTENT_KEY.to_string(), GenericNode::Scalar(text));
    GenericNode::Mapping(map)
}

/// `<image:image><image:loc/></image:image>` should read as `image.loc`,
/// not `image.image.loc`: lift the repeated namespace into the value.
fn hoist_namespace(tree: GenericNode, prefix: &str) -> GenericNode {
    match tree {
        GenericNode::Mapping(mut map) => match map.remove(prefix) {
            Some(inner @ GenericNode::Mapping(_)) => merge(inner, &GenericNode::Mapping(map)),
            Some(other) => {
                map.insert(prefix.to_string(), other);
                GenericNode::Mapping(map)
            }
            None => GenericNode::Mapping(map),
        },
        other => other,
    }
}

// --- XML dialect ---

fn read_xml(markup: &str) -> Option<Element> {
    let mut reader = Reader::from_str(markup);
    reader.config_mut().trim_text(true);
    reader.config_mut().check_end_names = false;

    // Synthetic holder so stray top-level content has a parent
    let mut stack: Vec<Element> = vec![Element::default()];

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => stack.push(start_element(&e)),
            Ok(Event::Empty(e)) => {
                let element = start_element(&e);
                attach(&mut stack, element);
            }
            Ok(Event::End(_)) => {
                if stack.len() > 1 {
                    if let Some(element) = stack.pop() {
                        attach(&mut stack, element);
                    }
                }
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map(|c| c.into_owned())
                    .unwrap_or_else(|_| String::from_utf8_lossy(&t).into_owned());
                push_text(&mut stack, &text);
            }
            Ok(Event::CData(c)) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                push_text(&mut stack, &text);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                log::debug!(
                    "XML error at byte {}: {}; keeping what was read",
                    reader.buffer_position(),
                    e
                );
                break;
            }
        }
    }

    // Close anything left open by truncated markup
    while stack.len() > 1 {
        if let Some(element) = stack.pop() {
            attach(&mut stack, element);
        }
    }

    stack.pop().and_then(|holder| holder.children.into_iter().next())
}

fn start_element(e: &BytesStart<'_>) -> Element {
    let qname = e.name();
    let prefix = qname
        .prefix()
        .map(|p| String::from_utf8_lossy(p.as_ref()).into_owned());
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();

    let attrs = e
        .attributes()
        .with_checks(false)
        .filter_map(|a| a.ok())
        .map(|a| {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = a
                .unescape_value()
                .map(|v| v.into_owned())
                .unwrap_or_else(|_| String::from_utf8_lossy(&a.value).into_owned());
            (key, value)
        })
        .collect();

    Element {
        prefix,
        name,
        attrs,
        ..Element::default()
    }
}

fn attach(stack: &mut [Element], element: Element) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(element);
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    if let Some(current) = stack.last_mut() {
        current.text.push_str(text);
    }
}

// --- HTML dialect ---

fn read_html(markup: &str) -> Option<Element> {
    let document = Html::parse_document(markup);
    Some(html_element(document.root_element()))
}

fn html_element(element: ElementRef<'_>) -> Element {
    let raw = element.value().name();
    // html5ever keeps `dc:creator` as a single local name
    let (prefix, name) = match raw.split_once(':') {
        Some((p, n)) if !p.is_empty() && !n.is_empty() => (Some(p.to_string()), n.to_string()),
        _ => (None, raw.to_string()),
    };

    let mut out = Element {
        prefix,
        name,
        attrs: element
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        ..Element::default()
    };

    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.text.push_str(text),
            Node::Element(_) => {
                if let Some(child_ref) = ElementRef::wrap(child) {
                    out.children.push(html_element(child_ref));
                }
            }
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> GenericNode {
        GenericNode::from(v)
    }

    #[test]
    fn test_leaf_text_and_attributes() {
        let tree = parse(
            r#"<item><title> Hello </title><enclosure url="http://x/a.mp3" length="10"/></item>"#,
            Dialect::Xml,
        );
        assert_eq!(tree.lookup(&["item", "title"]), Some(&s("Hello")));
        assert_eq!(
            tree.lookup(&["item", "enclosure", "url"]),
            Some(&s("http://x/a.mp3"))
        );
        assert_eq!(
            tree.lookup(&["item", "enclosure", "content"]),
            Some(&s(""))
        );
    }

    #[test]
    fn test_namespaces_nest_and_default_flattens() {
        let tree = parse(
            r#"<item xmlns:dc="http://purl.org/dc/elements/1.1/">
                 <title>T</title>
                 <dc:creator>Jane</dc:creator>
                 <dc:date>2020-01-01</dc:date>
               </item>"#,
            Dialect::Xml,
        );
        assert_eq!(tree.lookup(&["item", "title"]), Some(&s("T")));
        assert_eq!(tree.lookup(&["item", "dc", "creator"]), Some(&s("Jane")));
        assert_eq!(tree.lookup(&["item", "dc", "date"]), Some(&s("2020-01-01")));
        assert_eq!(tree.lookup(&["item", "creator"]), None);
    }

    #[test]
    fn test_duplicate_siblings_become_sequence() {
        let tree = parse(
            r#"<item><category>a</category><category term="b">b</category><category>c</category></item>"#,
            Dialect::Xml,
        );
        assert_eq!(
            tree.lookup(&["item", "category"]),
            Some(&GenericNode::Sequence(vec![
                s("a"),
                GenericNode::mapping([("term", "b"), ("content", "b")]),
                s("c"),
            ]))
        );
    }

    #[test]
    fn test_inline_text_around_children_is_dropped() {
        let tree = parse("<a>before<b>inner</b>after</a>", Dialect::Xml);
        assert_eq!(tree, GenericNode::mapping([("a", GenericNode::mapping([("b", "inner")]))]));
    }

    #[test]
    fn test_repeated_namespace_is_hoisted() {
        let tree = parse(
            r#"<url xmlns:image="http://www.google.com/schemas/sitemap-image/1.1">
                 <loc>http://x/1</loc>
                 <image:image><image:loc>http://x/1.png</image:loc></image:image>
               </url>"#,
            Dialect::Xml,
        );
        assert_eq!(
            tree.lookup(&["url", "image", "image", "loc"]),
            Some(&s("http://x/1.png"))
        );
    }

    #[test]
    fn test_cdata_and_entities() {
        let tree = parse(
            "<item><description><![CDATA[<p>Hi</p>]]></description><title>A &amp; B</title></item>",
            Dialect::Xml,
        );
        assert_eq!(tree.lookup(&["item", "description"]), Some(&s("<p>Hi</p>")));
        assert_eq!(tree.lookup(&["item", "title"]), Some(&s("A & B")));
    }

    #[test]
    fn test_malformed_never_fails() {
        assert_eq!(parse("", Dialect::Xml), GenericNode::empty());
        assert_eq!(parse("just text", Dialect::Xml), GenericNode::empty());

        let truncated = parse("<rss><channel><title>T</title><item><link>L", Dialect::Xml);
        assert_eq!(
            truncated.lookup(&["rss", "channel", "title"]),
            Some(&s("T"))
        );

        let mismatched = parse("<a><b>x</c></a>", Dialect::Xml);
        assert!(mismatched.get("a").is_some());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let markup = r#"<rss version="2.0"><channel><title>T</title>
            <item><title>1</title><category>x</category><category>y</category></item>
            <item><title>2</title></item></channel></rss>"#;
        assert_eq!(parse(markup, Dialect::Xml), parse(markup, Dialect::Xml));
    }

    #[test]
    fn test_html_dialect() {
        let tree = parse(
            "<html><head><title>Page</title></head><body><p>x</p></body></html>",
            Dialect::Html,
        );
        assert_eq!(tree.lookup(&["html", "head", "title"]), Some(&s("Page")));
        assert_eq!(tree.lookup(&["html", "body", "p"]), Some(&s("x")));
    }

    #[test]
    fn test_element_helpers() {
        let root = read_document(
            "<rss><channel><title>T</title><item><link>A</link></item><item><link>B</link></item></channel></rss>",
            Dialect::Xml,
        )
        .unwrap();
        assert_eq!(root.find_all("item").len(), 2);
        let channel = root.find("channel").unwrap().without("item");
        assert!(channel.child("item").is_none());
        assert_eq!(channel.child("title").unwrap().all_text(), "T");
    }

    #[test]
    fn test_child_ignores_prefixed_tags() {
        let item = read_document(
            r#"<item xmlns:atom="http://www.w3.org/2005/Atom"><atom:link href="http://x/a" rel="self"/><link>http://x/a</link></item>"#,
            Dialect::Xml,
        )
        .unwrap();
        let link = item.child("link").unwrap();
        assert_eq!(link.prefix, None);
        assert_eq!(link.all_text(), "http://x/a");
    }
}
