// SPDX-License-Identifier: AGPL-3.0-or-later
//! Document tree model
//!
//! Nodes are generic property bags. The `form` property decides how a node is
//! built and published; everything else is free-form and inherited down the
//! tree on lookup. Nodes live in a [`crate::store::DocumentStore`] arena and
//! refer to each other by [`NodeId`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Property names that are never reported as user keywords
pub const INTERNAL_PROPS: [&str; 10] = [
    "book",
    "form",
    "headers",
    "heading",
    "style",
    "text",
    "toc",
    "tocheading",
    "tocid",
    "toclink",
];

/// Handle to a node inside a document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Bool(bool),
    Int(i64),
    Text(String),
    List(Vec<String>),
    /// Anything else a host wants to hang on a node
    Opaque(serde_json::Value),
}

impl PropValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Loose truth test used by `where` filters
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Bool(b) => *b,
            Self::Int(n) => *n != 0,
            Self::Text(s) => !s.is_empty(),
            Self::List(items) => !items.is_empty(),
            Self::Opaque(v) => !matches!(v, serde_json::Value::Null | serde_json::Value::Bool(false)),
        }
    }
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(", ")),
            Self::Opaque(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for PropValue {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<String> for PropValue {
    fn from(s: String) -> Self {
        Self::Text(s)
    }
}

impl From<bool> for PropValue {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for PropValue {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<Vec<String>> for PropValue {
    fn from(items: Vec<String>) -> Self {
        Self::List(items)
    }
}

impl From<serde_json::Value> for PropValue {
    fn from(v: serde_json::Value) -> Self {
        Self::Opaque(v)
    }
}

/// Insertion-ordered property map
pub type Props = IndexMap<String, PropValue>;

/// Build a [`Props`] map from name/value pairs
#[macro_export]
macro_rules! props {
    () => { $crate::ast::Props::new() };
    ($($name:expr => $value:expr),+ $(,)?) => {{
        let mut props = $crate::ast::Props::new();
        $(props.insert(String::from($name), $crate::ast::PropValue::from($value));)+
        props
    }};
}

/// Structural role of a node, read from its `form` property
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Form {
    /// No `form` property
    None,
    Block,
    List,
    Item,
    Table,
    Row,
    Cell,
    Link,
    Plaintext,
    /// Generated table-of-contents node, `toc0` being the container
    Toc(u32),
    Other(String),
}

impl Form {
    /// Parse a form name
    pub fn from_name(name: &str) -> Self {
        match name {
            "" => Self::None,
            "block" => Self::Block,
            "list" => Self::List,
            "item" => Self::Item,
            "table" => Self::Table,
            "row" => Self::Row,
            "cell" => Self::Cell,
            "link" => Self::Link,
            "plaintext" => Self::Plaintext,
            other => match other.strip_prefix("toc").map(str::parse::<u32>) {
                Some(Ok(level)) => Self::Toc(level),
                _ => Self::Other(other.to_string()),
            },
        }
    }

    /// Form of a property map
    pub fn of(props: &Props) -> Self {
        props
            .get("form")
            .and_then(PropValue::as_str)
            .map(Self::from_name)
            .unwrap_or(Self::None)
    }

    /// Canonical property value, `None` for a formless node
    pub fn name(&self) -> Option<String> {
        let name = match self {
            Self::None => return None,
            Self::Block => "block",
            Self::List => "list",
            Self::Item => "item",
            Self::Table => "table",
            Self::Row => "row",
            Self::Cell => "cell",
            Self::Link => "link",
            Self::Plaintext => "plaintext",
            Self::Toc(level) => return Some(format!("toc{level}")),
            Self::Other(name) => name.as_str(),
        };
        Some(name.to_string())
    }

    /// Form given to raw children of a container
    pub fn auto_wrap_child(&self) -> Option<Form> {
        match self {
            Self::List => Some(Self::Item),
            Self::Table => Some(Self::Row),
            Self::Row => Some(Self::Cell),
            _ => None,
        }
    }

    /// Formless nodes count as blocks when collapsing wrappers
    pub fn is_block_like(&self) -> bool {
        matches!(self, Self::Block | Self::None)
    }
}

impl fmt::Display for Form {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name().as_deref().unwrap_or(""))
    }
}

/// One node of the document tree
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub props: Props,
    pub children: Vec<NodeId>,
    /// Back-reference used for inheritance and ancestry walks only
    pub parent: Option<NodeId>,
}

impl Node {
    pub fn new(props: Props) -> Self {
        Self {
            props,
            children: Vec::new(),
            parent: None,
        }
    }

    pub fn form(&self) -> Form {
        Form::of(&self.props)
    }

    /// Text property as a string slice, when it is one
    pub fn text(&self) -> Option<&str> {
        self.props.get("text").and_then(PropValue::as_str)
    }

    /// A node with no children and no text
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && !self.props.contains_key("text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_form_names() {
        for name in ["block", "list", "item", "table", "row", "cell", "link", "plaintext", "toc3"] {
            assert_eq!(Form::from_name(name).name().as_deref(), Some(name));
        }
        assert_eq!(Form::from_name("toc12"), Form::Toc(12));
        assert_eq!(Form::from_name("tocx"), Form::Other("tocx".to_string()));
        assert_eq!(Form::from_name(""), Form::None);
        assert_eq!(Form::None.name(), None);
    }

    #[test]
    fn test_auto_wrap_child() {
        assert_eq!(Form::List.auto_wrap_child(), Some(Form::Item));
        assert_eq!(Form::Table.auto_wrap_child(), Some(Form::Row));
        assert_eq!(Form::Row.auto_wrap_child(), Some(Form::Cell));
        assert_eq!(Form::Cell.auto_wrap_child(), None);
    }

    #[test]
    fn test_prop_display() {
        assert_eq!(PropValue::from("abc").to_string(), "abc");
        assert_eq!(PropValue::Bool(true).to_string(), "true");
        assert_eq!(PropValue::Int(-3).to_string(), "-3");
        let list = PropValue::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(list.to_string(), "a, b");
        let opaque = PropValue::from(serde_json::json!({"k": 1}));
        assert_eq!(opaque.to_string(), r#"{"k":1}"#);
    }

    #[test]
    fn test_props_macro_and_form_of() {
        let props = props! { "form" => "list", "style" => "bullet" };
        assert_eq!(Form::of(&props), Form::List);
        assert_eq!(props.keys().collect::<Vec<_>>(), vec!["form", "style"]);
        assert_eq!(Form::of(&props! {}), Form::None);
    }

    #[test]
    fn test_prop_json_shape() {
        let props = props! { "text" => "x", "toc" => true, "n" => 2i64 };
        let json = serde_json::to_string(&props).unwrap();
        assert_eq!(json, r#"{"text":"x","toc":true,"n":2}"#);
        let back: Props = serde_json::from_str(&json).unwrap();
        assert_eq!(back, props);
    }

    #[test]
    fn test_truthy() {
        assert!(PropValue::Bool(true).is_truthy());
        assert!(!PropValue::from("").is_truthy());
        assert!(!PropValue::Opaque(serde_json::Value::Null).is_truthy());
    }
}
