// SPDX-License-Identifier: AGPL-3.0-or-later
//! Structured text parser
//!
//! Line-oriented markup:
//!
//! - `!`, `!!`, … open nested sections
//! - `*` / `#` runs start bullet / numbered list items, deeper runs nest
//! - `|` lines are table rows; a trailing `|` closes the row
//! - `"""` or `'''` fence verbatim text
//! - `{{{ … }}}` runs macro code
//! - a leading `+` continues the previous heading, item or row
//!
//! Everything else is running text, split into blocks by blank lines.

mod blocks;
pub mod inline;

use crate::ast::NodeId;
use crate::props;
use crate::store::DocumentStore;
use crate::textutil::format_plain;
use blocks::{Block, ListLevel};

pub use inline::{build_fragment, expand, expand_to_string, Token};

/// Builds nodes from structured text into a document store
#[derive(Debug, Default)]
pub struct Parser {
    /// Open sections, outermost first
    sections: Vec<NodeId>,
    block: Option<Block>,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `text` below `top`, or below a new formless node.
    ///
    /// The result is collected with [`Parser::take`].
    pub fn parse(&mut self, store: &mut DocumentStore, text: &str, top: Option<NodeId>) {
        let top = top.unwrap_or_else(|| store.create(props! {}));
        self.sections = vec![top];

        for line in text.lines() {
            let mut pending = Some(line.to_string());
            while let Some(line) = pending.take() {
                match self.block.as_mut() {
                    None => {
                        if line.trim().is_empty() {
                            break;
                        }
                        let (block, rest) = Block::start(&line);
                        self.block = Some(block);
                        pending = rest;
                    }
                    Some(block) => {
                        pending = block.feed(&line);
                        if pending.is_some() {
                            self.flush(store);
                        }
                    }
                }
            }
        }
        self.flush(store);
    }

    /// The top node of the last parse
    pub fn take(&mut self) -> Option<NodeId> {
        let top = self.sections.first().copied();
        self.sections.clear();
        self.block = None;
        top
    }

    fn section(&self) -> Option<NodeId> {
        self.sections.last().copied()
    }

    /// Turn the open block into nodes under the innermost section
    fn flush(&mut self, store: &mut DocumentStore) {
        let Some(block) = self.block.take() else {
            return;
        };
        let Some(section) = self.section() else {
            return;
        };
        tracing::debug!(block = block.kind(), "flushing block");

        match block {
            Block::Text(text) => {
                let text = text.trim();
                if !text.is_empty() {
                    let node = build_fragment(store, text, props! { "form" => "block" });
                    store.add(section, node);
                }
            }
            Block::Heading { level, text } => {
                self.sections.truncate(level.max(1));
                let heading = expand_to_string(text.trim(), store.scope());
                if !heading.is_empty() {
                    let parent = self.section().unwrap_or(section);
                    let node = store.create(props! { "heading" => heading, "toc" => true });
                    store.add(parent, node);
                    self.sections.push(node);
                }
            }
            Block::List(list) => {
                if let Some(root) = list.root {
                    let node = emit_list(store, &root);
                    store.add(section, node);
                }
            }
            Block::Table(table) => {
                if let Some(node) = emit_table(store, table.rows) {
                    store.add(section, node);
                }
            }
            Block::Plaintext { text, .. } => {
                let text = format_plain(&text, "", 0).join("\n");
                if !text.is_empty() {
                    let node = store.create(props! { "form" => "plaintext", "text" => text });
                    store.add(section, node);
                }
            }
            Block::Exec { code, .. } => {
                let code = code.trim();
                if !code.is_empty() {
                    if let Err(e) = store.scope_mut().execute(code) {
                        tracing::warn!(error = %e, code, "macro block failed");
                    }
                }
            }
        }
    }
}

fn emit_list(store: &mut DocumentStore, level: &ListLevel) -> NodeId {
    let list = store.create(props! { "form" => "list", "style" => level.style.name() });
    for entry in &level.items {
        let item = if entry.sublist.is_some() && entry.text.trim().is_empty() {
            store.create(props! { "form" => "item" })
        } else {
            build_fragment(store, &entry.text, props! { "form" => "item" })
        };
        if let Some(sublist) = &entry.sublist {
            let nested = emit_list(store, sublist);
            store.add(item, nested);
        }
        store.add(list, item);
    }
    list
}

fn emit_table(store: &mut DocumentStore, mut rows: Vec<Vec<String>>) -> Option<NodeId> {
    let has_headers = rows.first()?.first()?.starts_with('!');
    let table = if has_headers {
        let headers: Vec<String> = rows
            .remove(0)
            .iter()
            .map(|h| {
                let h = h.trim();
                expand_to_string(h.strip_prefix('!').unwrap_or(h), store.scope())
            })
            .collect();
        store.create(props! { "form" => "table", "headers" => headers })
    } else {
        store.create(props! { "form" => "table" })
    };

    for cells in rows {
        let row = store.create(props! { "form" => "row" });
        for cell in cells {
            let node = build_fragment(store, &cell, props! { "form" => "cell" });
            store.add(row, node);
        }
        store.add(table, row);
    }
    Some(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Form, PropValue};
    use pretty_assertions::assert_eq;

    fn parse(store: &mut DocumentStore, text: &str) -> NodeId {
        let mut parser = Parser::new();
        parser.parse(store, text, None);
        parser.take().unwrap()
    }

    fn text(store: &DocumentStore, id: NodeId) -> Option<String> {
        store.node(id).text().map(str::to_string)
    }

    #[test]
    fn test_heading_then_text() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "!Title\n\nSome *bold* text");
        let sections = store.children(top).to_vec();
        assert_eq!(sections.len(), 1);
        let section = sections[0];
        assert_eq!(store.prop(section, "heading", false), Some(&PropValue::from("Title")));
        assert_eq!(store.prop(section, "toc", false), Some(&PropValue::Bool(true)));
        let body = store.children(section).to_vec();
        assert_eq!(body.len(), 1);
        assert_eq!(store.node(body[0]).form(), Form::Block);
        assert_eq!(text(&store, body[0]).as_deref(), Some("Some *bold* text"));
    }

    #[test]
    fn test_nested_headings() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "!One\n!!Two\n!!!Three\n!!!!Four");
        let mut node = top;
        for (depth, heading) in ["One", "Two", "Three", "Four"].iter().enumerate() {
            let children = store.children(node).to_vec();
            assert_eq!(children.len(), 1);
            node = children[0];
            assert_eq!(store.prop(node, "heading", false), Some(&PropValue::from(*heading)));
            assert_eq!(store.lineage(node).len(), depth + 2);
        }
    }

    #[test]
    fn test_heading_truncates_sections() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "!A\n!!B\n!C\ntext");
        let sections = store.children(top).to_vec();
        assert_eq!(sections.len(), 2);
        assert_eq!(store.children(sections[0]).len(), 1);
        let c_body = store.children(sections[1]).to_vec();
        assert_eq!(text(&store, c_body[0]).as_deref(), Some("text"));
    }

    #[test]
    fn test_nested_bullet_list() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "* a\n* b\n** c");
        let lists = store.children(top).to_vec();
        assert_eq!(lists.len(), 1);
        let list = lists[0];
        assert_eq!(store.node(list).form(), Form::List);
        assert_eq!(store.prop(list, "style", false), Some(&PropValue::from("bullet")));

        let items = store.children(list).to_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(text(&store, items[0]).as_deref(), Some("a"));
        assert_eq!(text(&store, items[1]).as_deref(), Some("b"));

        let nested = store.children(items[1]).to_vec();
        assert_eq!(nested.len(), 1);
        assert_eq!(store.node(nested[0]).form(), Form::List);
        assert_eq!(store.prop(nested[0], "style", false), Some(&PropValue::from("bullet")));
        let inner = store.children(nested[0]).to_vec();
        assert_eq!(inner.len(), 1);
        assert_eq!(text(&store, inner[0]).as_deref(), Some("c"));
    }

    #[test]
    fn test_link_alone() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "[[http://x]]");
        let nodes = store.children(top).to_vec();
        assert_eq!(nodes.len(), 1);
        let link = store.node(nodes[0]);
        assert_eq!(link.form(), Form::Link);
        assert_eq!(link.props.get("url"), Some(&PropValue::from("http://x")));
        assert_eq!(link.text(), Some("http://x"));
        assert!(link.children.is_empty());
    }

    #[test]
    fn test_table_with_headers() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "|!Name|!Value|\n|a|1|\n|b|[[L=u]]|");
        let table = store.children(top)[0];
        assert_eq!(store.node(table).form(), Form::Table);
        assert_eq!(
            store.prop(table, "headers", false),
            Some(&PropValue::from(vec!["Name".to_string(), "Value".to_string()]))
        );
        let rows = store.children(table).to_vec();
        assert_eq!(rows.len(), 2);
        let cells = store.children(rows[1]).to_vec();
        assert_eq!(store.node(cells[0]).form(), Form::Cell);
        assert_eq!(text(&store, cells[0]).as_deref(), Some("b"));
        let link = store.children(cells[1])[0];
        assert_eq!(store.node(link).form(), Form::Link);
    }

    #[test]
    fn test_plaintext_is_dedented_and_not_expanded() {
        let mut store = DocumentStore::new();
        store.scope_mut().globals.set("x", "X");
        let top = parse(&mut store, "'''\n    {{x}}\n      b\n\n'''\nafter {{x}}");
        let nodes = store.children(top).to_vec();
        assert_eq!(nodes.len(), 2);
        assert_eq!(store.node(nodes[0]).form(), Form::Plaintext);
        assert_eq!(text(&store, nodes[0]).as_deref(), Some("{{x}}\n  b"));
        assert_eq!(text(&store, nodes[1]).as_deref(), Some("after X"));
    }

    #[test]
    fn test_exec_block_sets_locals() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "{{{\nwho = 'you'\n}}}\nHello {{who}}");
        let nodes = store.children(top).to_vec();
        assert_eq!(nodes.len(), 1);
        assert_eq!(text(&store, nodes[0]).as_deref(), Some("Hello you"));
    }

    #[test]
    fn test_exec_failure_does_not_abort() {
        let mut store = DocumentStore::new();
        let top = parse(&mut store, "{{{ not valid }}}\nstill here");
        let nodes = store.children(top).to_vec();
        assert_eq!(text(&store, nodes[0]).as_deref(), Some("still here"));
    }

    #[test]
    fn test_parse_into_given_top() {
        let mut store = DocumentStore::new();
        let top = store.create(props! { "title" => "Doc" });
        let mut parser = Parser::new();
        parser.parse(&mut store, "one\n\ntwo", Some(top));
        assert_eq!(parser.take(), Some(top));
        assert_eq!(store.children(top).len(), 2);
        assert_eq!(parser.take(), None);
    }
}
