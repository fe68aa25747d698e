// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inline expansion of `{{macro}}` and `[[label = url]]` references
//!
//! Both forms are single-line and refuse tripled delimiters, so `{{{…}}}`
//! and `[[[…]]]` pass through as text. Macro output is merged into the
//! surrounding text and never re-scanned.

use crate::ast::{Form, NodeId, Props};
use crate::builder::Content;
use crate::eval::MacroScope;
use crate::props;
use crate::store::DocumentStore;
use regex::Regex;
use std::ops::Range;
use std::sync::LazyLock;

/// `[ label = ] url` inside a link reference; the url holds no `]`
static LINK_BODY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[ \t]*(?:([^=]*?)[ \t]*=)?[ \t]*([^\]]*?)[ \t]*$").expect("link body pattern")
});

/// One piece of an expanded fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Text(String),
    Link { label: Option<String>, url: String },
}

impl Token {
    /// Text shown for the token
    pub fn display_text(&self) -> &str {
        match self {
            Self::Text(s) => s,
            Self::Link { label, url } => label.as_deref().unwrap_or(url),
        }
    }
}

/// A delimited reference found in a fragment
#[derive(Debug, Clone)]
struct Reference {
    start: usize,
    end: usize,
    body: Range<usize>,
}

/// Find the first `oo…cc` reference at or after `from`.
///
/// The opening pair must not touch a third `open` on either side, the
/// closing pair must not be followed by a third `close`, and the body may
/// not cross a newline.
fn find_reference(s: &str, from: usize, open: u8, close: u8) -> Option<Reference> {
    let bytes = s.as_bytes();
    let mut i = from;
    while i + 4 <= bytes.len() {
        let opens = bytes[i] == open
            && bytes[i + 1] == open
            && (i == 0 || bytes[i - 1] != open)
            && bytes[i + 2] != open;
        if opens {
            let body = i + 2;
            let mut j = body;
            while j + 2 <= bytes.len() && bytes[j] != b'\n' {
                if bytes[j] == close && bytes[j + 1] == close && bytes.get(j + 2) != Some(&close) {
                    return Some(Reference {
                        start: i,
                        end: j + 2,
                        body: body..j,
                    });
                }
                j += 1;
            }
        }
        i += 1;
    }
    None
}

/// Find the first link reference at or after `from` with a valid body
fn find_link(s: &str, from: usize) -> Option<Reference> {
    let mut from = from;
    loop {
        let link = find_reference(s, from, b'[', b']')?;
        if LINK_BODY_RE.is_match(&s[link.body.clone()]) {
            return Some(link);
        }
        from = link.start + 1;
    }
}

fn evaluate_macro(expr: &str, scope: &MacroScope) -> String {
    let expr = expr.trim_matches([' ', '\t']);
    match scope.evaluate(expr) {
        Ok(value) => value,
        Err(e) => format!("{{{{ERROR: {e} in \"{expr}\"}}}}"),
    }
}

/// Expand macros only
pub fn expand_macros(s: &str, scope: &MacroScope) -> String {
    let mut out = String::new();
    let mut pos = 0;
    while let Some(m) = find_reference(s, pos, b'{', b'}') {
        out.push_str(&s[pos..m.start]);
        out.push_str(&evaluate_macro(&s[m.body], scope));
        pos = m.end;
    }
    out.push_str(&s[pos..]);
    out
}

fn parse_link(body: &str, scope: &MacroScope) -> Token {
    let (label, url) = match LINK_BODY_RE.captures(body) {
        Some(caps) => (
            caps.get(1).map(|m| m.as_str()),
            caps.get(2).map_or("", |m| m.as_str()),
        ),
        None => (None, body.trim()),
    };
    Token::Link {
        label: label
            .map(|l| expand_macros(l, scope))
            .filter(|l| !l.is_empty()),
        url: expand_macros(url, scope),
    }
}

/// Split a fragment into text and link tokens, evaluating macros.
///
/// The leftmost reference wins. Adjacent text, including macro output,
/// coalesces into one token.
pub fn expand(s: &str, scope: &MacroScope) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut pos = 0;
    let mut next_macro = find_reference(s, 0, b'{', b'}');
    let mut next_link = find_link(s, 0);

    while pos < s.len() {
        if next_macro.as_ref().is_some_and(|m| m.start < pos) {
            next_macro = find_reference(s, pos, b'{', b'}');
        }
        if next_link.as_ref().is_some_and(|l| l.start < pos) {
            next_link = find_link(s, pos);
        }

        let macro_first = match (&next_macro, &next_link) {
            (Some(m), Some(l)) => m.start < l.start,
            (Some(_), None) => true,
            _ => false,
        };
        if macro_first {
            if let Some(m) = &next_macro {
                text.push_str(&s[pos..m.start]);
                text.push_str(&evaluate_macro(&s[m.body.clone()], scope));
                pos = m.end;
            }
        } else if let Some(l) = &next_link {
            text.push_str(&s[pos..l.start]);
            if !text.is_empty() {
                tokens.push(Token::Text(std::mem::take(&mut text)));
            }
            tokens.push(parse_link(&s[l.body.clone()], scope));
            pos = l.end;
        } else {
            text.push_str(&s[pos..]);
            pos = s.len();
        }
    }
    if !text.is_empty() {
        tokens.push(Token::Text(text));
    }
    tokens
}

/// Expand a fragment to flat text; links contribute their label or url
pub fn expand_to_string(s: &str, scope: &MacroScope) -> String {
    expand(s, scope).iter().map(Token::display_text).collect()
}

fn link_props(label: Option<String>, url: String) -> Props {
    let text = label.unwrap_or_else(|| url.clone());
    props! { "form" => "link", "url" => url, "text" => text }
}

/// Build the node for an expanded fragment.
///
/// A lone text token becomes the `text` of a node carrying `props`. A lone
/// link in a block or formless fragment turns the fragment itself into a
/// link. Anything else is a node with `props` holding one child per token.
pub fn build_fragment(store: &mut DocumentStore, s: &str, props: Props) -> NodeId {
    let mut tokens: Vec<Token> = expand(s, store.scope())
        .into_iter()
        .filter(|t| !matches!(t, Token::Text(text) if text.trim().is_empty()))
        .collect();

    match tokens.as_mut_slice() {
        [Token::Text(text)] => {
            let mut all = props! { "text" => std::mem::take(text) };
            all.extend(props);
            store.create(all)
        }
        [Token::Link { label, url }] if Form::of(&props).is_block_like() => {
            let mut all = props;
            all.extend(link_props(label.take(), std::mem::take(url)));
            store.create(all)
        }
        _ => {
            let children: Vec<Content> = tokens
                .into_iter()
                .map(|token| {
                    let child = match token {
                        Token::Text(text) => props! { "text" => text },
                        Token::Link { label, url } => link_props(label, url),
                    };
                    Content::Node(store.create(child))
                })
                .collect();
            store.create_with(props, Content::Group(children))
        }
    }
}
