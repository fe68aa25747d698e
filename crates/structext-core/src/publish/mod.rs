// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document publishing
//!
//! A depth-first walk over a subtree that drives a [`Publisher`] through
//! begin/end callbacks while the [`PublishContext`] tracks one level per
//! node.

mod context;
mod toc;

pub use context::{At, Level, PublishContext};
pub use toc::generate_toc;

use crate::ast::NodeId;
use crate::store::DocumentStore;
use crate::traits::{OutputFormat, PublishConfig, Publisher, PublisherRegistry, Result};
use std::io::Write;

/// Publish the subtree under `root` to `out`.
///
/// The document title is the root's `title`, else its `heading`, else
/// `document`. Output already written stays written when a publisher
/// fails part way.
///
/// Anchors assigned for a table of contents stay on their nodes, so
/// publishing the same tree again yields the same ids. The TOC nodes
/// themselves are discarded after use.
pub fn publish(
    store: &mut DocumentStore,
    root: NodeId,
    publisher: &mut dyn Publisher,
    out: &mut dyn Write,
    config: &PublishConfig,
) -> Result<()> {
    let title = ["title", "heading"]
        .iter()
        .find_map(|name| store.prop(root, name, false))
        .map(ToString::to_string)
        .unwrap_or_else(|| "document".to_string());
    tracing::debug!(node = %root, format = %publisher.format(), %title, "publishing");

    let mut cx = PublishContext::new(store, out, root, config);
    publisher.doc_begin(&mut cx, &title, config.style)?;
    publish_node(&mut cx, publisher, root)?;
    publisher.doc_end(&mut cx)?;
    cx.flush()
}

/// Publish with a built-in publisher into a string
pub fn publish_to_string(
    store: &mut DocumentStore,
    root: NodeId,
    format: OutputFormat,
    config: &PublishConfig,
) -> Result<String> {
    let mut publisher = PublisherRegistry::with_builtin().create(format, config)?;
    let mut out = Vec::new();
    publish(store, root, publisher.as_mut(), &mut out, config)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

/// Walk one node: push its level, begin, children, end, pop
pub(crate) fn publish_node(
    cx: &mut PublishContext<'_>,
    publisher: &mut dyn Publisher,
    id: NodeId,
) -> Result<()> {
    let children = cx.store().children(id).to_vec();
    cx.push_node(id);

    publisher.node_begin(cx)?;
    for child in children {
        publish_node(cx, publisher, child)?;
    }
    publisher.node_end(cx)?;

    cx.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Form;
    use crate::traits::StyleVariant;
    use pretty_assertions::assert_eq;

    /// Records the callback sequence
    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl Publisher for Recorder {
        fn format(&self) -> OutputFormat {
            OutputFormat::Text
        }

        fn doc_begin(&mut self, _cx: &mut PublishContext<'_>, title: &str, _style: StyleVariant) -> Result<()> {
            self.events.push(format!("doc {title}"));
            Ok(())
        }

        fn doc_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
            self.events.push(format!("end depth={}", cx.depth()));
            Ok(())
        }

        fn node_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
            let label = cx
                .prop_str("heading", At::HERE)
                .or_else(|| cx.prop_str("text", At::HERE))
                .unwrap_or("-")
                .to_string();
            self.events.push(format!("+{label}/{}", cx.breadth(0)));
            if cx.form(0) == Form::None && cx.has_prop("heading", At::HERE) {
                cx.feed_toc(self)?;
            }
            Ok(())
        }

        fn node_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
            self.events.push(format!("-{}", cx.depth()));
            Ok(())
        }
    }

    #[test]
    fn test_traversal_order_and_title() {
        let mut store = DocumentStore::new();
        let root = store.parse_text("!Top\ntext");
        store.set_prop(root, "title", "Guide");
        let mut recorder = Recorder::default();
        let config = PublishConfig {
            toc_stop: 0,
            ..PublishConfig::default()
        };
        publish(&mut store, root, &mut recorder, &mut std::io::sink(), &config).unwrap();
        assert_eq!(
            recorder.events,
            vec!["doc Guide", "+-/1", "+Top/1", "+text/0", "-4", "-3", "-2", "end depth=1"]
        );
    }

    #[test]
    fn test_heading_title_and_toc_feed() {
        let mut store = DocumentStore::new();
        let root = store.parse_text("!Top\ntext");
        let section = store.children(root)[0];
        let mut recorder = Recorder::default();
        publish(&mut store, section, &mut recorder, &mut std::io::sink(), &PublishConfig::default()).unwrap();
        assert_eq!(recorder.events[0], "doc Top");
        // The section's own children carry no toc flag, so no toc nodes.
        assert!(!recorder.events.iter().any(|e| e.starts_with("+-/")));

        let mut recorder = Recorder::default();
        publish(&mut store, root, &mut recorder, &mut std::io::sink(), &PublishConfig::default()).unwrap();
        assert_eq!(recorder.events[0], "doc document");
        // toc0 and one toc1 entry are published after the heading begins.
        assert_eq!(&recorder.events[2..5], &["+Top/1", "+-/1", "+-/0"]);
        assert_eq!(store.prop(section, "tocid", false).map(ToString::to_string).as_deref(), Some("tocitem1"));
    }

    #[test]
    fn test_publish_to_string_text() {
        let mut store = DocumentStore::new();
        let root = store.parse_text("hello");
        let out = publish_to_string(&mut store, root, OutputFormat::Text, &PublishConfig::default()).unwrap();
        assert_eq!(out, "\nhello\n\n");
    }
}
