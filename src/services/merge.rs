// src/services/merge.rs

//! Deep merge of generic trees under a fixed conflict policy.
//!
//! | target  | source  | resolution                              |
//! |---------|---------|-----------------------------------------|
//! | mapping | mapping | recurse                                 |
//! | mapping | other   | source becomes `{content: source}`      |
//! | other   | mapping | target becomes `{content: target}`      |
//! | other   | other   | equal: no-op, unequal: target kept      |
//! | absent  | any     | copied in                               |
//!
//! Sequences count as "other": they are never merged element-wise.
//! Merging the same source twice is a no-op after the first time.

use crate::models::{CONTENT_KEY, GenericNode, NodeMap};

/// Merge `source` into `target` and return the result.
pub fn merge(target: GenericNode, source: &GenericNode) -> GenericNode {
    let mut path = Vec::new();
    merge_at(target, source, &mut path)
}

/// Turn `a:b:c` style keys into nested mappings, merging as it goes.
///
/// `{"og:image": u, "og:image:width": w}` becomes
/// `{og: {image: {content: u, width: w}}}`.
pub fn split_namespace<I, K>(entries: I) -> GenericNode
where
    I: IntoIterator<Item = (K, GenericNode)>,
    K: AsRef<str>,
{
    entries
        .into_iter()
        .fold(GenericNode::empty(), |acc, (key, value)| {
            let parts: Vec<&str> = key.as_ref().split(':').collect();
            merge(acc, &GenericNode::nest(&parts, value))
        })
}

fn merge_at(target: GenericNode, source: &GenericNode, path: &mut Vec<String>) -> GenericNode {
    match (target, source) {
        (GenericNode::Mapping(mut map), GenericNode::Mapping(incoming)) => {
            merge_maps(&mut map, incoming, path);
            GenericNode::Mapping(map)
        }
        (GenericNode::Mapping(mut map), other) => {
            let wrapped = wrap_content(other.clone());
            merge_maps(&mut map, &wrapped, path);
            GenericNode::Mapping(map)
        }
        (other, GenericNode::Mapping(incoming)) => {
            let mut map = wrap_content(other);
            merge_maps(&mut map, incoming, path);
            GenericNode::Mapping(map)
        }
        (kept, incoming) => {
            if &kept != incoming {
                log::debug!(
                    "Merge conflict at {:?}: keeping existing value, discarding {:?}",
                    path.join("."),
                    incoming
                );
            }
            kept
        }
    }
}

fn merge_maps(target: &mut NodeMap, source: &NodeMap, path: &mut Vec<String>) {
    for (key, incoming) in source {
        match target.remove(key) {
            Some(existing) => {
                path.push(key.clone());
                let merged = merge_at(existing, incoming, path);
                path.pop();
                target.insert(key.clone(), merged);
            }
            None => {
                target.insert(key.clone(), incoming.clone());
            }
        }
    }
}

fn wrap_content(value: GenericNode) -> NodeMap {
    let mut map = NodeMap::new();
    map.insert(CONTENT_KEY.to_string(), value);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> GenericNode {
        GenericNode::from(v)
    }

    fn samples() -> Vec<GenericNode> {
        vec![
            GenericNode::empty(),
            s("x"),
            s("y"),
            GenericNode::Sequence(vec![s("a"), s("b")]),
            GenericNode::mapping([("content", "x")]),
            GenericNode::mapping([("title", "T"), ("link", "L")]),
            GenericNode::mapping([(
                "title",
                GenericNode::mapping([("content", "T"), ("lang", "en")]),
            )]),
            GenericNode::mapping([(
                "title",
                GenericNode::Sequence(vec![s("T1"), s("T2")]),
            )]),
            GenericNode::nest(&["og", "image", "width"], s("640")),
            GenericNode::nest(&["og", "image"], s("http://x/a.png")),
        ]
    }

    #[test]
    fn test_absent_key_copied_in() {
        let merged = merge(
            GenericNode::mapping([("a", "1")]),
            &GenericNode::mapping([("b", "2")]),
        );
        assert_eq!(merged, GenericNode::mapping([("a", "1"), ("b", "2")]));
    }

    #[test]
    fn test_scalar_conflict_keeps_target() {
        let merged = merge(
            GenericNode::mapping([("title", "first")]),
            &GenericNode::mapping([("title", "second")]),
        );
        assert_eq!(merged, GenericNode::mapping([("title", "first")]));
    }

    #[test]
    fn test_scalar_into_mapping_wraps_source() {
        let merged = merge(
            GenericNode::mapping([("image", GenericNode::mapping([("width", "640")]))]),
            &GenericNode::mapping([("image", "http://x/a.png")]),
        );
        assert_eq!(
            merged.lookup(&["image", "content"]),
            Some(&s("http://x/a.png"))
        );
        assert_eq!(merged.lookup(&["image", "width"]), Some(&s("640")));
    }

    #[test]
    fn test_mapping_into_scalar_wraps_target() {
        let merged = merge(
            GenericNode::mapping([("image", "http://x/a.png")]),
            &GenericNode::mapping([("image", GenericNode::mapping([("width", "640")]))]),
        );
        assert_eq!(
            merged.lookup(&["image", "content"]),
            Some(&s("http://x/a.png"))
        );
        assert_eq!(merged.lookup(&["image", "width"]), Some(&s("640")));
    }

    #[test]
    fn test_sequences_are_opaque() {
        let merged = merge(
            GenericNode::mapping([("tag", GenericNode::Sequence(vec![s("a")]))]),
            &GenericNode::mapping([("tag", GenericNode::Sequence(vec![s("b")]))]),
        );
        assert_eq!(
            merged,
            GenericNode::mapping([("tag", GenericNode::Sequence(vec![s("a")]))])
        );
    }

    #[test]
    fn test_merge_is_total_and_idempotent() {
        for a in samples() {
            for b in samples() {
                let once = merge(a.clone(), &b);
                let twice = merge(once.clone(), &b);
                assert_eq!(once, twice, "merge not idempotent for {:?} <- {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_split_namespace() {
        let meta = split_namespace(vec![
            ("og:image", s("http://x/a.png")),
            ("og:image:width", s("640")),
            ("twitter:title", s("Tw")),
            ("description", s("plain")),
        ]);
        assert_eq!(
            meta.lookup(&["og", "image", "content"]),
            Some(&s("http://x/a.png"))
        );
        assert_eq!(meta.lookup(&["og", "image", "width"]), Some(&s("640")));
        assert_eq!(meta.lookup(&["twitter", "title"]), Some(&s("Tw")));
        assert_eq!(meta.get("description"), Some(&s("plain")));
    }
}
