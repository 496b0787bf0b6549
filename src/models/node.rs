// src/models/node.rs

//! Schema-agnostic document tree.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Key holding a leaf's text once the leaf has been promoted to a mapping.
pub const CONTENT_KEY: &str = "content";

/// Mapping representation used by [`GenericNode::Mapping`].
pub type NodeMap = BTreeMap<String, GenericNode>;

/// A parsed markup value: text, repeated siblings, or named children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum GenericNode {
    Scalar(String),
    Sequence(Vec<GenericNode>),
    Mapping(NodeMap),
}

impl Default for GenericNode {
    fn default() -> Self {
        Self::Mapping(NodeMap::new())
    }
}

impl From<&str> for GenericNode {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for GenericNode {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<NodeMap> for GenericNode {
    fn from(value: NodeMap) -> Self {
        Self::Mapping(value)
    }
}

impl GenericNode {
    /// An empty mapping.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a mapping from key/value pairs.
    pub fn mapping<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<GenericNode>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Nest `value` under `path`, outermost key first.
    ///
    /// `nest(&["og", "title"], v)` yields `{og: {title: v}}`.
    pub fn nest<S: AsRef<str>>(path: &[S], value: GenericNode) -> Self {
        path.iter().rev().fold(value, |inner, key| {
            let mut map = NodeMap::new();
            map.insert(key.as_ref().to_string(), inner);
            Self::Mapping(map)
        })
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Scalar(s) => s.is_empty(),
            Self::Sequence(items) => items.is_empty(),
            Self::Mapping(map) => map.is_empty(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&NodeMap> {
        match self {
            Self::Mapping(map) => Some(map),
            _ => None,
        }
    }

    /// Child of a mapping.
    pub fn get(&self, key: &str) -> Option<&GenericNode> {
        self.as_map().and_then(|map| map.get(key))
    }

    /// Follow a full key chain; `None` as soon as one key is missing.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&GenericNode> {
        path.iter()
            .try_fold(self, |node, key| node.get(key.as_ref()))
    }

    /// Text carried by this node, if any.
    ///
    /// Scalars are their own text, mappings answer with `content` (or `url`
    /// for image-like blocks), sequences with their first textual element.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s.as_str()),
            Self::Mapping(map) => map
                .get(CONTENT_KEY)
                .or_else(|| map.get("url"))
                .and_then(GenericNode::text),
            Self::Sequence(items) => items.iter().find_map(GenericNode::text),
        }
    }

    /// Insert a child, promoting an existing value to a sequence on collision.
    ///
    /// Repeated sibling tags keep their encounter order.
    pub fn push_child(map: &mut NodeMap, key: &str, value: GenericNode) {
        match map.get_mut(key) {
            None => {
                map.insert(key.to_string(), value);
            }
            Some(Self::Sequence(items)) => items.push(value),
            Some(existing) => {
                let first = std::mem::replace(existing, Self::Sequence(Vec::with_capacity(2)));
                if let Self::Sequence(items) = existing {
                    items.push(first);
                    items.push(value);
                }
            }
        }
    }
}
