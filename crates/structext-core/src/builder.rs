// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document building API
//!
//! A [`Registrar`] borrows the store for one load unit, builds nodes through
//! the typed operations below and finally registers every top-level result
//! under a book name.

use crate::ast::{Form, NodeId, PropValue, Props};
use crate::props;
use crate::store::{form_props, DocumentStore, Filter};
use crate::traits::{Error, Result};

/// Content handed to the builder
#[derive(Debug, Clone, PartialEq)]
pub enum Content {
    Node(NodeId),
    /// Parsed as structured text when added to a node
    Text(String),
    Group(Vec<Content>),
}

impl Content {
    pub fn empty() -> Self {
        Self::Group(Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Node(_) => false,
            Self::Text(s) => s.is_empty(),
            Self::Group(items) => items.is_empty(),
        }
    }

    /// The node, when the content is exactly one node
    fn single_node(&self) -> Option<NodeId> {
        match self {
            Self::Node(id) => Some(*id),
            Self::Group(items) => match items.as_slice() {
                [Self::Node(id)] => Some(*id),
                _ => None,
            },
            Self::Text(_) => None,
        }
    }

    fn into_items(self) -> Vec<Content> {
        match self {
            Self::Group(items) => items,
            other => vec![other],
        }
    }
}

impl Default for Content {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<NodeId> for Content {
    fn from(id: NodeId) -> Self {
        Self::Node(id)
    }
}

impl From<&str> for Content {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for Content {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl<T: Into<Content>> From<Vec<T>> for Content {
    fn from(items: Vec<T>) -> Self {
        Self::Group(items.into_iter().map(Into::into).collect())
    }
}

/// Builder scoped to one load unit
pub struct Registrar<'s> {
    store: &'s mut DocumentStore,
    book: String,
    pending: Vec<NodeId>,
}

impl<'s> Registrar<'s> {
    pub fn new(store: &'s mut DocumentStore, book: impl Into<String>) -> Self {
        Self {
            store,
            book: book.into(),
            pending: Vec::new(),
        }
    }

    /// The store being built into
    pub fn store(&mut self) -> &mut DocumentStore {
        self.store
    }

    /// Nodes built so far and not yet registered
    pub fn pending(&self) -> &[NodeId] {
        &self.pending
    }

    // --- document building --------------------------------------------------

    pub fn block(&mut self, content: impl Into<Content>, props: Props) -> NodeId {
        self.wrap_nodes(&[Form::Block], content.into(), props)
    }

    /// Table of rows, each row a group of cells
    pub fn table(&mut self, headers: Vec<String>, content: impl Into<Content>) -> NodeId {
        let props = if headers.is_empty() {
            Props::new()
        } else {
            props! { "headers" => headers }
        };
        self.wrap_nodes(&[Form::Table, Form::Row, Form::Cell], content.into(), props)
    }

    /// List with `bullet`, `number` or no decoration
    pub fn list(&mut self, style: Option<&str>, content: impl Into<Content>) -> Result<NodeId> {
        let style = style.map(str::to_lowercase).unwrap_or_default();
        let props = match style.as_str() {
            "" => Props::new(),
            "bullet" | "number" => props! { "style" => style },
            _ => return Err(Error::InvalidListStyle(style)),
        };
        Ok(self.wrap_nodes(&[Form::List, Form::Item], content.into(), props))
    }

    pub fn link(&mut self, url: &str, text: Option<&str>) -> NodeId {
        let mut props = props! { "form" => "link", "url" => url };
        if let Some(text) = text {
            props.insert("text".to_string(), PropValue::from(text));
        }
        let id = self.store.create(props);
        self.pending.push(id);
        id
    }

    pub fn plain(&mut self, content: impl Into<Content>) -> NodeId {
        self.wrap_nodes(&[Form::Plaintext], content.into(), Props::new())
    }

    /// Section listed in the table of contents
    pub fn section(&mut self, heading: &str, content: impl Into<Content>, props: Props) -> NodeId {
        let mut all = props! { "heading" => heading, "toc" => true };
        all.extend(props);
        self.wrap_nodes(&[], content.into(), all)
    }

    // --- registration ---------------------------------------------------------

    /// Wrap every parentless pending node in a new node, which becomes the
    /// only pending node
    pub fn wrap(&mut self, props: Props) -> NodeId {
        let top: Vec<Content> = self
            .pending
            .iter()
            .filter(|id| self.store.parent(**id).is_none())
            .map(|id| Content::Node(*id))
            .collect();
        let id = self.store.create_with(props, Content::Group(top));
        self.pending = vec![id];
        id
    }

    /// Queue externally built nodes for registration
    pub fn add(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        self.pending.extend(nodes);
    }

    /// Commit parentless pending nodes to the store registry under the book
    /// name
    pub fn register(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if self.book.is_empty() {
            return;
        }
        let mut count = 0;
        for id in pending {
            if self.store.parent(id).is_none() {
                self.store.set_prop(id, "book", self.book.as_str());
                self.store.register(id);
                count += 1;
            }
        }
        tracing::debug!(book = %self.book, count, "registered nodes");
    }

    pub fn query(&self, nodes: Option<&[NodeId]>, filter: Option<Filter<'_>>, order_by: &[&str]) -> Vec<NodeId> {
        self.store.query(nodes, filter, order_by)
    }

    pub fn select(&self, nodes: &[NodeId], filter: Option<Filter<'_>>, count_max: usize) -> Vec<NodeId> {
        self.store.select(nodes, filter, count_max)
    }

    /// Sorted user-visible property names
    pub fn keywords(&self) -> Vec<String> {
        self.store.keywords()
    }

    /// The registrar is a builder, not an operation
    pub fn invoke(&self) -> Result<()> {
        Err(Error::RegistrarNotCallable)
    }

    // --- internals ------------------------------------------------------------

    /// Wrap content in nested forms, `forms[0]` outermost.
    ///
    /// A lone node is reused when no form is requested, it has no form or it
    /// already has the requested one.
    fn wrap_nodes(&mut self, forms: &[Form], content: Content, props: Props) -> NodeId {
        if let Some(id) = content.single_node() {
            let form = self.store.node(id).form();
            if forms.is_empty() || form == Form::None || forms[0] == form {
                self.store
                    .set_props(id, props.into_iter().map(|(k, v)| (k, Some(v))));
                return id;
            }
        }

        let inner = forms.get(1..).unwrap_or(&[]);
        let children = self.prepare_nodes(inner, content.into_items(), true);
        let mut all = forms.first().map(form_props).unwrap_or_default();
        all.extend(props);
        let id = self.store.create_with(all, nodes_content(children));
        self.pending.push(id);
        id
    }

    /// Build the children for `forms[0]` from raw items; deeper forms apply
    /// to each item's own parts
    fn prepare_nodes(&mut self, forms: &[Form], items: Vec<Content>, major: bool) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(items.len());
        for item in items {
            let node = match item {
                Content::Node(id) => match forms.first() {
                    Some(form) if self.store.node(id).form() != *form => {
                        self.store.create_with(form_props(form), id)
                    }
                    _ => id,
                },
                Content::Text(text) if forms.len() <= 1 => {
                    let mut props = forms.first().map(form_props).unwrap_or_default();
                    props.insert("text".to_string(), PropValue::Text(text));
                    self.store.create(props)
                }
                other => {
                    let props = forms.first().map(form_props).unwrap_or_default();
                    let content = if forms.len() > 1 {
                        let parts = self.prepare_nodes(&forms[1..], other.into_items(), false);
                        nodes_content(parts)
                    } else {
                        other
                    };
                    self.store.create_with(props, content)
                }
            };
            nodes.push(node);
            if major {
                self.pending.push(node);
            }
        }
        nodes
    }
}

fn nodes_content(ids: Vec<NodeId>) -> Content {
    Content::Group(ids.into_iter().map(Content::Node).collect())
}
