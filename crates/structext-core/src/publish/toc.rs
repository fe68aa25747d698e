// SPDX-License-Identifier: AGPL-3.0-or-later
//! Table of contents generation
//!
//! TOC nodes are built in the store, detached from the document. Every
//! listed source node gets a `tocid` anchor as a side effect, unless it
//! already has one.

use crate::ast::{NodeId, PropValue, Props};
use crate::builder::Content;
use crate::props;
use crate::store::{flag, DocumentStore};

/// Build a `toc0` node listing the `toc`-flagged nodes at or below `nodes`.
///
/// Levels are counted from 1 at the highest flagged nodes. Levels up to
/// `toc_start` are spliced into their parent without a wrapper, deeper ones
/// become `toc<level - toc_start>` nodes, and nothing below `toc_stop` is
/// visited. With a `book`, only nodes of that book or flagged `core` are
/// considered. Returns `None` for an empty window or an empty result.
pub fn generate_toc(
    store: &mut DocumentStore,
    nodes: &[NodeId],
    toc_start: u32,
    toc_stop: u32,
    book: Option<&str>,
    order_by: &[&str],
) -> Option<NodeId> {
    if toc_stop <= toc_start {
        return None;
    }
    let candidates = match book {
        Some(book) => {
            let in_book = |p: &Props| {
                p.get("book").and_then(PropValue::as_str) == Some(book) || flag(p, "core")
            };
            store.query(Some(nodes), Some(&in_book), &[])
        }
        None => nodes.to_vec(),
    };
    let is_toc = |p: &Props| flag(p, "toc");
    let top = store.query(Some(&candidates), Some(&is_toc), order_by);

    let content = toc_nodes(store, toc_start, toc_stop, 0, &top);
    if content.is_empty() {
        return None;
    }
    let toc = store.create_with(
        props! { "form" => "toc0" },
        Content::Group(content.into_iter().map(Content::Node).collect()),
    );
    Some(toc)
}

fn toc_nodes(
    store: &mut DocumentStore,
    toc_start: u32,
    toc_stop: u32,
    level: u32,
    nodes: &[NodeId],
) -> Vec<NodeId> {
    let level = level + 1;
    let mut out = Vec::new();
    for &node in nodes {
        if store.is_empty_node(node) {
            continue;
        }
        let tocid = match store.prop(node, "tocid", false) {
            Some(tocid) => tocid.to_string(),
            None => {
                let tocid = store.next_toc_id();
                store.set_prop(node, "tocid", tocid.as_str());
                tocid
            }
        };

        let mut content = Vec::new();
        if level < toc_stop {
            let children = store.children(node).to_vec();
            let is_toc = |p: &Props| flag(p, "toc");
            let sub = store.query(Some(&children), Some(&is_toc), &[]);
            if !sub.is_empty() {
                content = toc_nodes(store, toc_start, toc_stop, level, &sub);
            }
        }

        if level > toc_start {
            let mut props = props! {
                "form" => format!("toc{}", level - toc_start),
                "toclink" => tocid,
            };
            if let Some(heading) = store.prop(node, "heading", false).cloned() {
                props.insert("tocheading".to_string(), heading);
            }
            let group = Content::Group(content.into_iter().map(Content::Node).collect());
            out.push(store.create_with(props, group));
        } else {
            out.extend(content);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Form;
    use pretty_assertions::assert_eq;

    fn outline(store: &mut DocumentStore) -> NodeId {
        store.parse_text("!One\nbody\n!!One.A\nbody\n!!One.B\n!Two\nbody\n!!Two.A\nbody")
    }

    fn headings(store: &DocumentStore, ids: &[NodeId]) -> Vec<String> {
        ids.iter()
            .filter_map(|id| store.prop(*id, "tocheading", false))
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_two_level_toc() {
        let mut store = DocumentStore::new();
        let root = outline(&mut store);
        let children = store.children(root).to_vec();
        let toc = generate_toc(&mut store, &children, 0, 2, None, &[]).unwrap();

        assert_eq!(store.node(toc).form(), Form::Toc(0));
        let top = store.children(toc).to_vec();
        assert_eq!(headings(&store, &top), vec!["One", "Two"]);
        assert!(top.iter().all(|id| store.node(*id).form() == Form::Toc(1)));

        // One.B has no body and is left out.
        let under_one = store.children(top[0]).to_vec();
        assert_eq!(headings(&store, &under_one), vec!["One.A"]);
        assert_eq!(store.node(under_one[0]).form(), Form::Toc(2));
    }

    #[test]
    fn test_anchors_set_on_sources() {
        let mut store = DocumentStore::new();
        let root = outline(&mut store);
        let children = store.children(root).to_vec();
        let toc = generate_toc(&mut store, &children, 0, 1, None, &[]).unwrap();
        let top = store.children(toc).to_vec();
        assert!(store.children(top[0]).is_empty());
        assert_eq!(store.prop(children[0], "tocid", false), Some(&PropValue::from("tocitem1")));
        assert_eq!(store.prop(top[1], "toclink", false), Some(&PropValue::from("tocitem2")));

        // A second run keeps the anchors already assigned.
        generate_toc(&mut store, &children, 0, 1, None, &[]);
        assert_eq!(store.prop(children[0], "tocid", false), Some(&PropValue::from("tocitem1")));
        assert_eq!(store.prop(children[1], "tocid", false), Some(&PropValue::from("tocitem2")));
    }

    #[test]
    fn test_start_level_is_spliced() {
        let mut store = DocumentStore::new();
        let root = outline(&mut store);
        let children = store.children(root).to_vec();
        let toc = generate_toc(&mut store, &children, 1, 2, None, &[]).unwrap();
        let entries = store.children(toc).to_vec();
        assert_eq!(headings(&store, &entries), vec!["One.A", "Two.A"]);
        assert!(entries.iter().all(|id| store.node(*id).form() == Form::Toc(1)));
    }

    #[test]
    fn test_empty_window_or_result() {
        let mut store = DocumentStore::new();
        let root = outline(&mut store);
        let children = store.children(root).to_vec();
        assert_eq!(generate_toc(&mut store, &children, 2, 2, None, &[]), None);

        let plain = store.parse_text("just text");
        let children = store.children(plain).to_vec();
        assert_eq!(generate_toc(&mut store, &children, 0, 2, None, &[]), None);
    }

    #[test]
    fn test_book_filter_keeps_core() {
        let mut store = DocumentStore::new();
        let a = store.create(props! { "book" => "a", "toc" => true, "heading" => "A", "text" => "x" });
        let b = store.create(props! { "book" => "b", "toc" => true, "heading" => "B", "text" => "x" });
        let core = store.create(props! { "core" => true, "toc" => true, "heading" => "Core", "text" => "x" });
        let toc = generate_toc(&mut store, &[a, b, core], 0, 1, Some("a"), &["heading"]).unwrap();
        let entries = store.children(toc).to_vec();
        assert_eq!(headings(&store, &entries), vec!["A", "Core"]);
    }
}
