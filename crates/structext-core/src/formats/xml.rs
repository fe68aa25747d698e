// SPDX-License-Identifier: AGPL-3.0-or-later
//! Generic XML dump of the document tree
//!
//! Every node becomes a `<node>` element carrying its properties as
//! attributes; text goes into the element body.

use crate::ast::Props;
use crate::publish::{At, PublishContext};
use crate::textutil::format_plain;
use crate::traits::{OutputFormat, Publisher, Result, StyleVariant};
use quick_xml::escape::escape;

/// Attributes written first, in this order
const LEADING_ATTRIBUTES: [&str; 2] = ["form", "heading"];

/// XML publisher
#[derive(Debug, Default)]
pub struct XmlPublisher {
    depth: usize,
    new_line: bool,
}

impl XmlPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&mut self, cx: &mut PublishContext<'_>, chunk: &str) -> Result<()> {
        let mut new_line = self.new_line;
        let chunk = match chunk.strip_suffix('\n') {
            Some(stripped) => {
                self.new_line = true;
                stripped
            }
            None => {
                self.new_line = false;
                chunk
            }
        };
        for line in chunk.split('\n') {
            if new_line {
                cx.write("\n")?;
                cx.write(&"  ".repeat(self.depth))?;
            } else {
                new_line = true;
            }
            cx.write(line)?;
        }
        cx.flush()
    }
}

/// `name="value"` pairs, leading attributes first and the rest sorted.
/// Text is the element body and never an attribute.
fn attributes(props: &Props) -> String {
    let mut names: Vec<&str> = props
        .keys()
        .map(String::as_str)
        .filter(|name| *name != "text" && !LEADING_ATTRIBUTES.contains(name))
        .collect();
    names.sort_unstable();

    LEADING_ATTRIBUTES
        .iter()
        .copied()
        .filter(|name| props.contains_key(*name))
        .chain(names)
        .filter_map(|name| props.get(name).map(|value| (name, value.to_string())))
        .map(|(name, value)| format!(" {name}=\"{}\"", escape(value.as_str())))
        .collect()
}

impl Publisher for XmlPublisher {
    fn format(&self) -> OutputFormat {
        OutputFormat::Xml
    }

    fn doc_begin(&mut self, cx: &mut PublishContext<'_>, _title: &str, _style: StyleVariant) -> Result<()> {
        self.write(cx, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n")
    }

    fn doc_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        self.write(cx, "")
    }

    fn node_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let props = cx.all_props(At::HERE);
        let text = props.get("text").map(ToString::to_string);
        let leaf = cx.breadth(0) == 0 && text.is_none();

        let close = if leaf { "/>\n" } else { ">\n" };
        self.write(cx, &format!("<node{}{close}", attributes(&props)))?;
        self.depth += 1;

        if let Some(text) = text {
            let indent = "  ".repeat(self.depth);
            for line in format_plain(&escape(text.as_str()), &indent, 0) {
                cx.write("\n")?;
                cx.write(&line)?;
            }
            cx.flush()?;
        }
        Ok(())
    }

    fn node_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        self.depth -= 1;
        if cx.breadth(0) > 0 || cx.has_prop("text", At::HERE) {
            self.write(cx, "</node>\n")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Content;
    use crate::props;
    use crate::publish::publish_to_string;
    use crate::store::DocumentStore;
    use crate::traits::PublishConfig;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_attribute_order() {
        let props = props! {
            "zeta" => "z",
            "text" => "skipped",
            "heading" => "H",
            "alpha" => true,
            "form" => "block",
        };
        assert_eq!(
            attributes(&props),
            " form=\"block\" heading=\"H\" alpha=\"true\" zeta=\"z\""
        );
    }

    #[test]
    fn test_attribute_values_escaped() {
        let props = props! { "title" => "a \"b\" & <c>" };
        assert_eq!(attributes(&props), " title=\"a &quot;b&quot; &amp; &lt;c&gt;\"");
    }

    #[test]
    fn test_nested_document() {
        let mut store = DocumentStore::new();
        let child = store.create(props! { "text" => "hi" });
        let root = store.create_with(props! { "title" => "T" }, Content::Node(child));
        let out = publish_to_string(&mut store, root, OutputFormat::Xml, &PublishConfig::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<node title=\"T\">\n  <node>\n    hi\n  </node>\n</node>\n"
        );
    }

    #[test]
    fn test_empty_node_is_self_closing() {
        let mut store = DocumentStore::new();
        let leaf = store.create(props! { "form" => "block" });
        let root = store.create_with(props! {}, Content::Node(leaf));
        let out = publish_to_string(&mut store, root, OutputFormat::Xml, &PublishConfig::default()).unwrap();
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<node>\n  <node form=\"block\"/>\n</node>\n"
        );
    }
}
