// SPDX-License-Identifier: AGPL-3.0-or-later
//! Caller-owned document store
//!
//! The store is the arena every node lives in, the ordered registry of
//! top-level nodes, the set of property names ever assigned, the macro scope
//! and the table-of-contents anchor counter. Nodes detached by wrapper
//! collapsing stay in the arena unreferenced until the store is dropped.

use crate::ast::{Form, Node, NodeId, PropValue, Props, INTERNAL_PROPS};
use crate::builder::Content;
use crate::eval::{Evaluator, MacroScope};
use crate::parser::Parser;
use crate::traits::Result;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Node filter used by [`DocumentStore::query`] and [`DocumentStore::select`]
pub type Filter<'a> = &'a dyn Fn(&Props) -> bool;

/// True when `name` is set to a truthy value
pub fn flag(props: &Props, name: &str) -> bool {
    props.get(name).is_some_and(PropValue::is_truthy)
}

/// Props holding only a `form` entry, empty for [`Form::None`]
pub fn form_props(form: &Form) -> Props {
    let mut props = Props::new();
    if let Some(name) = form.name() {
        props.insert("form".to_string(), PropValue::Text(name));
    }
    props
}

#[derive(Debug, Default)]
pub struct DocumentStore {
    nodes: Vec<Node>,
    registry: Vec<NodeId>,
    prop_names: BTreeSet<String>,
    scope: MacroScope,
    toc_counter: u32,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store whose macros run through a host evaluator
    pub fn with_evaluator(evaluator: Box<dyn Evaluator>) -> Self {
        Self {
            scope: MacroScope::new(evaluator),
            ..Self::default()
        }
    }

    pub fn scope(&self) -> &MacroScope {
        &self.scope
    }

    pub fn scope_mut(&mut self) -> &mut MacroScope {
        &mut self.scope
    }

    /// Number of nodes in the arena, detached ones included
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Drop nodes created after the arena held `len` of them.
    ///
    /// Only for detached scratch trees: nothing older may refer to them.
    pub(crate) fn truncate(&mut self, len: usize) {
        debug_assert!(self.registry.iter().all(|id| id.index() < len));
        self.nodes.truncate(len);
    }

    /// Parse structured text into a new formless top node
    pub fn parse_text(&mut self, text: &str) -> NodeId {
        let mut parser = Parser::new();
        parser.parse(self, text, None);
        parser.take().unwrap_or_else(|| self.create(Props::new()))
    }

    // --- construction -------------------------------------------------------

    pub fn create(&mut self, props: Props) -> NodeId {
        self.prop_names.extend(props.keys().cloned());
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(props));
        id
    }

    /// Create a node and add content to it.
    ///
    /// Containers (`list`, `table`, `row`) wrap every item of a group in
    /// their child form, unless one of the items already is a node of that
    /// form. In that case the group is taken as pre-structured.
    pub fn create_with(&mut self, props: Props, content: impl Into<Content>) -> NodeId {
        let id = self.create(props);
        let content = content.into();
        if content.is_empty() {
            return id;
        }
        let content = match (self.nodes[id.index()].form().auto_wrap_child(), content) {
            (Some(child_form), Content::Group(items)) => {
                let explicit = items.iter().any(
                    |item| matches!(item, Content::Node(n) if self.node(*n).form() == child_form),
                );
                if explicit {
                    Content::Group(items)
                } else {
                    let wrapped = items
                        .into_iter()
                        .map(|item| Content::Node(self.create_with(form_props(&child_form), item)))
                        .collect();
                    Content::Group(wrapped)
                }
            }
            (_, content) => content,
        };
        self.add(id, content);
        id
    }

    /// Add content below `parent`, then collapse redundant wrappers.
    ///
    /// Text is parsed as structured text. A nested group becomes an
    /// anonymous node.
    pub fn add(&mut self, parent: NodeId, content: impl Into<Content>) {
        let items = match content.into() {
            Content::Group(items) => items,
            other => vec![other],
        };
        for item in items {
            if item.is_empty() {
                continue;
            }
            let child = match item {
                Content::Node(id) => id,
                Content::Text(text) => self.parse_text(&text),
                group @ Content::Group(_) => self.create_with(Props::new(), group),
            };
            self.append(parent, child);
        }
        self.optimize(parent);
    }

    /// Attach `child` as the last child of `parent`, detaching it from any
    /// previous parent first
    pub fn append(&mut self, parent: NodeId, child: NodeId) {
        if let Some(old) = self.nodes[child.index()].parent.take() {
            self.nodes[old.index()].children.retain(|c| *c != child);
        }
        self.nodes[child.index()].parent = Some(parent);
        self.nodes[parent.index()].children.push(child);
    }

    /// Collapse single block children into a formed parent.
    ///
    /// Repeats while the node has exactly one child, that child is a block
    /// (or formless) and the two share no property other than `form`. The
    /// child's props and children move up and the parent keeps its form. The
    /// emptied child keeps its parent link so it is never registered as a
    /// top-level node.
    fn optimize(&mut self, id: NodeId) {
        let Some(form) = self.nodes[id.index()].props.get("form").cloned() else {
            return;
        };
        if self.nodes[id.index()].form() == Form::None {
            return;
        }
        loop {
            let node = &self.nodes[id.index()];
            let [child] = node.children[..] else {
                break;
            };
            let child_node = &self.nodes[child.index()];
            if !child_node.form().is_block_like() {
                break;
            }
            let overlap = node
                .props
                .keys()
                .filter(|k| k.as_str() != "form")
                .any(|k| child_node.props.contains_key(k));
            if overlap {
                break;
            }

            let child_props = std::mem::take(&mut self.nodes[child.index()].props);
            let grandchildren = std::mem::take(&mut self.nodes[child.index()].children);
            for gc in &grandchildren {
                self.nodes[gc.index()].parent = Some(id);
            }
            let node = &mut self.nodes[id.index()];
            node.props.extend(child_props);
            node.props.insert("form".to_string(), form.clone());
            node.children = grandchildren;
        }
    }

    // --- access ---------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.index()].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn props(&self, id: NodeId) -> &Props {
        &self.nodes[id.index()].props
    }

    /// Property lookup, walking up through the parents when `inherit` is set
    pub fn prop(&self, id: NodeId, name: &str, inherit: bool) -> Option<&PropValue> {
        if !inherit {
            return self.nodes[id.index()].props.get(name);
        }
        self.ancestors(id)
            .into_iter()
            .find_map(|a| self.nodes[a.index()].props.get(name))
    }

    pub fn set_prop(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<PropValue>) {
        let name = name.into();
        self.prop_names.insert(name.clone());
        self.nodes[id.index()].props.insert(name, value.into());
    }

    /// Bulk update where a `None` value deletes the property
    pub fn set_props<I, K>(&mut self, id: NodeId, props: I)
    where
        I: IntoIterator<Item = (K, Option<PropValue>)>,
        K: Into<String>,
    {
        for (name, value) in props {
            match value {
                Some(value) => self.set_prop(id, name, value),
                None => {
                    let name: String = name.into();
                    self.remove_prop(id, &name);
                }
            }
        }
    }

    pub fn remove_prop(&mut self, id: NodeId, name: &str) -> Option<PropValue> {
        self.nodes[id.index()].props.shift_remove(name)
    }

    pub fn is_empty_node(&self, id: NodeId) -> bool {
        self.nodes[id.index()].is_empty()
    }

    /// The node itself followed by its parents, nearest first
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = vec![id];
        let mut cur = self.nodes[id.index()].parent;
        while let Some(p) = cur {
            out.push(p);
            cur = self.nodes[p.index()].parent;
        }
        out
    }

    /// Root-first path down to the node itself
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = self.ancestors(id);
        out.reverse();
        out
    }

    // --- registry and queries -------------------------------------------------

    /// Add a top-level node to the registry
    pub fn register(&mut self, id: NodeId) {
        tracing::debug!(node = %id, "registering top-level node");
        self.registry.push(id);
    }

    pub fn registered(&self) -> &[NodeId] {
        &self.registry
    }

    /// Highest matching nodes, optionally sorted by inherited props.
    ///
    /// `nodes` defaults to the registry.
    pub fn query(&self, nodes: Option<&[NodeId]>, filter: Option<Filter<'_>>, order_by: &[&str]) -> Vec<NodeId> {
        let nodes = nodes.unwrap_or(&self.registry);
        let mut out = self.select(nodes, filter, 0);
        if !order_by.is_empty() {
            out.sort_by(|a, b| {
                order_by
                    .iter()
                    .map(|key| compare_values(self.prop(*a, key, true), self.prop(*b, key, true)))
                    .find(|o| o.is_ne())
                    .unwrap_or(Ordering::Equal)
            });
        }
        out
    }

    /// Collect matching nodes, descending only into nodes that do not match.
    ///
    /// Stops once `count_max` nodes are found when it is non-zero.
    pub fn select(&self, nodes: &[NodeId], filter: Option<Filter<'_>>, count_max: usize) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.select_into(nodes, filter, count_max, &mut out);
        out
    }

    fn select_into(&self, nodes: &[NodeId], filter: Option<Filter<'_>>, count_max: usize, out: &mut Vec<NodeId>) {
        for &id in nodes {
            if filter.map_or(true, |f| f(&self.nodes[id.index()].props)) {
                out.push(id);
            } else {
                self.select_into(&self.nodes[id.index()].children, filter, count_max, out);
            }
            if count_max > 0 && out.len() >= count_max {
                out.truncate(count_max);
                break;
            }
        }
    }

    /// Sorted property names that are not internal
    pub fn keywords(&self) -> Vec<String> {
        self.prop_names
            .iter()
            .filter(|name| !INTERNAL_PROPS.contains(&name.as_str()))
            .cloned()
            .collect()
    }

    /// Next table-of-contents anchor id, unique for the store's lifetime
    pub(crate) fn next_toc_id(&mut self) -> String {
        self.toc_counter += 1;
        format!("tocitem{}", self.toc_counter)
    }

    /// JSON dump of a subtree
    pub fn to_json(&self, id: NodeId) -> Result<serde_json::Value> {
        let node = &self.nodes[id.index()];
        let mut object = serde_json::Map::new();
        object.insert("props".to_string(), serde_json::to_value(&node.props)?);
        if !node.children.is_empty() {
            let children = node
                .children
                .iter()
                .map(|c| self.to_json(*c))
                .collect::<Result<Vec<_>>>()?;
            object.insert("children".to_string(), serde_json::Value::Array(children));
        }
        Ok(serde_json::Value::Object(object))
    }
}

/// Ordering for `order_by`, missing values first
fn compare_values(a: Option<&PropValue>, b: Option<&PropValue>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(PropValue::Int(x)), Some(PropValue::Int(y))) => x.cmp(y),
        (Some(PropValue::Bool(x)), Some(PropValue::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::props;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_collapse_single_block_child() {
        let mut store = DocumentStore::new();
        let inner = store.create(props! { "form" => "block", "text" => "hello" });
        let item = store.create_with(props! { "form" => "item" }, inner);
        let node = store.node(item);
        assert_eq!(node.form(), Form::Item);
        assert_eq!(node.text(), Some("hello"));
        assert!(node.children.is_empty());
    }

    #[test]
    fn test_collapse_chain_and_reparent() {
        let mut store = DocumentStore::new();
        let leaf_a = store.create(props! { "text" => "a" });
        let leaf_b = store.create(props! { "text" => "b" });
        let inner = store.create_with(props! {}, vec![leaf_a, leaf_b]);
        let middle = store.create_with(props! { "form" => "block" }, inner);
        let outer = store.create_with(props! { "form" => "plaintext" }, middle);
        assert_eq!(store.children(outer), &[leaf_a, leaf_b]);
        assert_eq!(store.parent(leaf_a), Some(outer));
        assert_eq!(store.node(outer).form(), Form::Plaintext);
    }

    #[test]
    fn test_no_collapse_on_overlap_or_form() {
        let mut store = DocumentStore::new();
        let child = store.create(props! { "text" => "x" });
        let parent = store.create_with(props! { "form" => "item", "text" => "y" }, child);
        assert_eq!(store.children(parent), &[child]);

        let link = store.create(props! { "form" => "link", "url" => "u" });
        let cell = store.create_with(props! { "form" => "cell" }, link);
        assert_eq!(store.children(cell), &[link]);

        let bare = store.create(props! { "text" => "x" });
        let formless = store.create_with(props! {}, bare);
        assert_eq!(store.children(formless), &[bare]);
    }

    #[test]
    fn test_auto_wrap_strings() {
        let mut store = DocumentStore::new();
        let list = store.create_with(
            props! { "form" => "list", "style" => "bullet" },
            vec!["one", "two"],
        );
        let items = store.children(list).to_vec();
        assert_eq!(items.len(), 2);
        assert_eq!(store.node(items[0]).form(), Form::Item);
        assert_eq!(store.node(items[0]).text(), Some("one"));
        assert_eq!(store.node(items[1]).text(), Some("two"));
    }

    #[test]
    fn test_auto_wrap_skipped_for_explicit_items() {
        let mut store = DocumentStore::new();
        let item = store.create(props! { "form" => "item", "text" => "explicit" });
        let list = store.create_with(
            props! { "form" => "list" },
            vec![Content::Node(item), Content::from("raw")],
        );
        let children = store.children(list).to_vec();
        assert_eq!(children[0], item);
        // The raw string is added as parsed text, not wrapped in an item.
        assert_eq!(store.node(children[1]).form(), Form::None);
    }

    #[test]
    fn test_append_keeps_single_parent() {
        let mut store = DocumentStore::new();
        let a = store.create(props! {});
        let b = store.create(props! {});
        let c = store.create(props! {});
        store.append(a, c);
        store.append(b, c);
        assert!(store.children(a).is_empty());
        assert_eq!(store.children(b), &[c]);
        assert_eq!(store.lineage(c), vec![b, c]);
    }

    #[test]
    fn test_props_and_inheritance() {
        let mut store = DocumentStore::new();
        let root = store.create(props! { "book" => "guide" });
        let child = store.create(props! { "text" => "t" });
        store.append(root, child);
        assert_eq!(store.prop(child, "book", false), None);
        assert_eq!(store.prop(child, "book", true), Some(&PropValue::from("guide")));

        store.set_props(child, [("text", None), ("owner", Some(PropValue::from("me")))]);
        assert_eq!(store.node(child).text(), None);
        assert!(store.is_empty_node(child));
        assert_eq!(store.keywords(), vec!["owner".to_string()]);
    }

    #[test]
    fn test_query_select_order() {
        let mut store = DocumentStore::new();
        let b = store.create(props! { "toc" => true, "heading" => "b" });
        let a = store.create(props! { "toc" => true, "heading" => "a" });
        let inner = store.create(props! { "toc" => true, "heading" => "inner" });
        let wrapper = store.create(props! {});
        store.append(wrapper, inner);
        store.register(b);
        store.register(a);
        store.register(wrapper);

        let toc = |p: &Props| flag(p, "toc");
        assert_eq!(store.query(None, Some(&toc), &[]), vec![b, a, inner]);
        assert_eq!(store.query(None, Some(&toc), &["heading"]), vec![a, b, inner]);
        assert_eq!(store.select(store.registered(), Some(&toc), 2), vec![b, a]);
        assert_eq!(store.query(None, None, &[]).len(), 3);
    }

    #[test]
    fn test_toc_ids_monotonic() {
        let mut store = DocumentStore::new();
        assert_eq!(store.next_toc_id(), "tocitem1");
        assert_eq!(store.next_toc_id(), "tocitem2");
    }

    #[test]
    fn test_to_json() {
        let mut store = DocumentStore::new();
        let leaf = store.create(props! { "text" => "x" });
        let root = store.create_with(props! { "heading" => "H" }, leaf);
        let json = store.to_json(root).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "props": {"heading": "H"},
                "children": [{"props": {"text": "x"}}]
            })
        );
    }
}
