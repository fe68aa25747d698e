// SPDX-License-Identifier: AGPL-3.0-or-later
//! Publishing state stack
//!
//! One [`Level`] per node being published, below a base level that belongs
//! to the document itself. Publishers read node properties from the levels
//! and keep their own scratch values in each level's cache.

use super::publish_node;
use super::toc::generate_toc;
use crate::ast::{Form, NodeId, PropValue, Props};
use crate::store::DocumentStore;
use crate::textutil::is_text_value;
use crate::traits::{PublishConfig, Publisher, Result};
use std::collections::HashMap;
use std::io::Write;

/// Level addressing for lookups.
///
/// `level` counts outward from the current node, 0 being the node itself.
/// With `inherit` set the search continues outward until a level has the
/// value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct At {
    pub level: usize,
    pub inherit: bool,
}

impl At {
    /// The current node only
    pub const HERE: Self = Self::up(0);

    /// The current node, then its ancestors
    pub const INHERIT: Self = Self::HERE.inherited();

    pub const fn up(level: usize) -> Self {
        Self {
            level,
            inherit: false,
        }
    }

    pub const fn inherited(self) -> Self {
        Self {
            level: self.level,
            inherit: true,
        }
    }
}

/// State for one node on the publishing stack
#[derive(Debug, Default)]
pub struct Level {
    /// Node published at this level; `None` for the base level
    pub node: Option<NodeId>,
    pub props: Props,
    /// Child count
    pub breadth: usize,
    cache: HashMap<&'static str, PropValue>,
}

impl Level {
    fn new(node: Option<NodeId>, props: Props, breadth: usize) -> Self {
        Self {
            node,
            props,
            breadth,
            cache: HashMap::new(),
        }
    }
}

pub struct PublishContext<'a> {
    store: &'a mut DocumentStore,
    out: &'a mut dyn Write,
    root: NodeId,
    toc_start: u32,
    toc_stop: u32,
    levels: Vec<Level>,
}

impl<'a> PublishContext<'a> {
    pub fn new(
        store: &'a mut DocumentStore,
        out: &'a mut dyn Write,
        root: NodeId,
        config: &PublishConfig,
    ) -> Self {
        Self {
            store,
            out,
            root,
            toc_start: config.toc_start,
            toc_stop: config.toc_stop,
            levels: vec![Level::default()],
        }
    }

    pub fn store(&self) -> &DocumentStore {
        self.store
    }

    /// The node `publish` was called on
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub(crate) fn push(&mut self, props: Props, breadth: usize) {
        self.levels.push(Level::new(None, props, breadth));
    }

    /// Push the level for a store node, snapshotting its props
    pub(crate) fn push_node(&mut self, id: NodeId) {
        let props = self.store.props(id).clone();
        let breadth = self.store.children(id).len();
        self.levels.push(Level::new(Some(id), props, breadth));
    }

    pub(crate) fn pop(&mut self) -> Option<Level> {
        self.levels.pop()
    }

    pub fn write(&mut self, s: &str) -> Result<()> {
        self.out.write_all(s.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    /// Number of levels, the base level included
    pub fn depth(&self) -> usize {
        self.levels.len()
    }

    /// Child count of the node `level` steps out
    pub fn breadth(&self, level: usize) -> usize {
        self.levels[self.index(level)].breadth
    }

    fn index(&self, level: usize) -> usize {
        assert!(
            level < self.levels.len(),
            "level {level} is outside a stack of {}",
            self.levels.len()
        );
        self.levels.len() - 1 - level
    }

    /// Levels searched for `at`, nearest first
    fn search(&self, at: At) -> impl Iterator<Item = usize> {
        let start = self.index(at.level);
        let stop = if at.inherit { 0 } else { start };
        (stop..=start).rev()
    }

    // --- properties ---------------------------------------------------------

    pub fn prop(&self, name: &str, at: At) -> Option<&PropValue> {
        self.search(at).find_map(|i| self.levels[i].props.get(name))
    }

    pub fn prop_str(&self, name: &str, at: At) -> Option<&str> {
        self.prop(name, at).and_then(PropValue::as_str)
    }

    pub fn has_prop(&self, name: &str, at: At) -> bool {
        self.prop(name, at).is_some()
    }

    /// Form of the node at `level`
    pub fn form(&self, level: usize) -> Form {
        Form::of(&self.levels[self.index(level)].props)
    }

    /// Every value of a property from `level` outward, nearest first.
    ///
    /// Empty when `level` is past the base level.
    pub fn props_stack(&self, name: &str, level: usize) -> Vec<&PropValue> {
        if level >= self.levels.len() {
            return Vec::new();
        }
        self.search(At::up(level).inherited())
            .filter_map(|i| self.levels[i].props.get(name))
            .collect()
    }

    /// Properties of one level, or merged outward with the nearest value
    /// winning
    pub fn all_props(&self, at: At) -> Props {
        let mut props = Props::new();
        for i in self.search(at) {
            for (key, value) in &self.levels[i].props {
                if !props.contains_key(key) {
                    props.insert(key.clone(), value.clone());
                }
            }
        }
        props
    }

    // --- cache ----------------------------------------------------------------

    fn find_cache(&self, name: &str, at: At) -> Option<usize> {
        self.search(at).find(|i| self.levels[*i].cache.contains_key(name))
    }

    pub fn cache(&self, name: &str, at: At) -> Option<&PropValue> {
        self.find_cache(name, at)
            .and_then(|i| self.levels[i].cache.get(name))
    }

    pub fn cache_str(&self, name: &str, at: At) -> Option<&str> {
        self.cache(name, at).and_then(PropValue::as_str)
    }

    pub fn cache_int(&self, name: &str, at: At) -> Option<i64> {
        self.cache(name, at).and_then(PropValue::as_int)
    }

    pub fn has_cache(&self, name: &str, at: At) -> bool {
        self.cache(name, at).is_some()
    }

    /// Set a value; an inheriting set overwrites the nearest existing entry
    /// and falls back to the addressed level
    pub fn set_cache(&mut self, name: &'static str, value: impl Into<PropValue>, at: At) {
        let i = self
            .find_cache(name, at)
            .unwrap_or_else(|| self.index(at.level));
        self.levels[i].cache.insert(name, value.into());
    }

    /// Read and clear
    pub fn take_cache(&mut self, name: &str, at: At) -> Option<PropValue> {
        let i = self.find_cache(name, at)?;
        self.levels[i].cache.remove(name)
    }

    /// Return the counter and increment it, starting from 0
    pub fn cache_increment(&mut self, name: &'static str, at: At) -> i64 {
        match self.find_cache(name, at) {
            Some(i) => {
                let value = self.levels[i].cache.get(name).and_then(PropValue::as_int).unwrap_or(0);
                self.levels[i].cache.insert(name, PropValue::Int(value + 1));
                value
            }
            None => {
                let i = self.index(at.level);
                self.levels[i].cache.insert(name, PropValue::Int(1));
                0
            }
        }
    }

    pub fn append_cache_string(&mut self, name: &'static str, s: &str, at: At) {
        let mut value = self.cache_str(name, at).unwrap_or_default().to_string();
        value.push_str(s);
        self.set_cache(name, value, at);
    }

    /// Copy a property into the cache under the same name
    pub fn cache_prop(&mut self, name: &'static str, at: At) {
        if let Some(value) = self.prop(name, at).cloned() {
            self.set_cache(name, value, at);
        }
    }

    /// Every cached value from `level` outward, nearest first
    pub fn cache_stack(&self, name: &str, level: usize) -> Vec<&PropValue> {
        self.search(At::up(level).inherited())
            .filter_map(|i| self.levels[i].cache.get(name))
            .collect()
    }

    /// Move cached text from the current level to its parent.
    ///
    /// Appended to any text the parent already holds, joined by `sep` with
    /// the whitespace at the seam trimmed. Returns false when there is no
    /// parent or no non-empty text to move.
    pub fn consolidate_cache_text(&mut self, name: &'static str, sep: &str) -> bool {
        let n = self.levels.len();
        if n < 2 {
            return false;
        }
        match self.levels[n - 1].cache.get(name) {
            Some(value) if is_text_value(value) && value.is_truthy() => {}
            _ => return false,
        }
        let Some(PropValue::Text(text)) = self.levels[n - 1].cache.remove(name) else {
            return false;
        };
        let joined = match self.levels[n - 2].cache.get(name).and_then(PropValue::as_str) {
            Some(up) if !up.is_empty() => {
                format!("{}{sep}{}", up.trim_end(), text.trim_start())
            }
            _ => text,
        };
        self.levels[n - 2].cache.insert(name, PropValue::Text(joined));
        true
    }

    // --- table of contents ----------------------------------------------------

    /// Generate the table of contents for the published root and publish it
    /// in place with `publisher`.
    ///
    /// Anchors assigned to nodes already on the stack are copied into their
    /// levels. The TOC nodes are dropped from the store once published.
    pub fn feed_toc(&mut self, publisher: &mut dyn Publisher) -> Result<()> {
        if self.toc_stop <= self.toc_start {
            return Ok(());
        }
        let mark = self.store.len();
        let nodes = self.store.children(self.root).to_vec();
        let toc = generate_toc(self.store, &nodes, self.toc_start, self.toc_stop, None, &[]);
        self.refresh_anchors();
        if let Some(toc) = toc {
            tracing::debug!(node = %toc, "publishing table of contents");
            let result = publish_node(self, publisher, toc);
            self.store.truncate(mark);
            result?;
        }
        Ok(())
    }

    fn refresh_anchors(&mut self) {
        for level in &mut self.levels {
            let Some(node) = level.node else {
                continue;
            };
            if level.props.contains_key("tocid") {
                continue;
            }
            if let Some(tocid) = self.store.prop(node, "tocid", false) {
                level.props.insert("tocid".to_string(), tocid.clone());
            }
        }
    }
}
