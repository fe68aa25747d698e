// SPDX-License-Identifier: AGPL-3.0-or-later
//! Plain text publisher
//!
//! Text is collected in the level caches and written when a node that owns
//! text ends. Each level may request blank lines before its output; requests
//! coalesce by maximum.

use crate::ast::{Form, PropValue};
use crate::publish::{At, PublishContext};
use crate::textutil::{display_width, format_plain, word_wrap};
use crate::traits::{OutputFormat, Publisher, Result, StyleVariant};
use regex::Regex;
use std::sync::LazyLock;

/// `scheme:` at the start of a url
static URL_SCHEME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").expect("url scheme pattern"));

const INDENT: &str = "  ";
const BULLET_PREFIX: &str = "* ";
const TABLE_BORDER: &str = "- ";
/// Blanks before each table line
const TABLE_INDENT: usize = 1;

/// Box drawn around a heading
#[derive(Debug, Clone, Copy)]
struct Frame {
    top_left: &'static str,
    top: &'static str,
    top_right: &'static str,
    left: &'static str,
    right: &'static str,
    bottom_left: &'static str,
    bottom: &'static str,
    bottom_right: &'static str,
}

impl Frame {
    /// Frames with a top line want two blank lines before them
    fn is_boxed(&self) -> bool {
        !self.top.is_empty()
    }

    fn rule(left: &str, fill: &str, right: &str, width: usize) -> String {
        let n = width.saturating_sub(display_width(left) + display_width(right));
        let mut rule = left.to_string();
        if !fill.is_empty() && n > 0 {
            rule.extend(fill.chars().cycle().take(n));
        }
        rule.push_str(right);
        rule
    }

    fn build(&self, s: &str) -> String {
        let middle = format!("{}{s}{}", self.left, self.right);
        let width = display_width(&middle);
        let top = Self::rule(self.top_left, self.top, self.top_right, width);
        let bottom = Self::rule(self.bottom_left, self.bottom, self.bottom_right, width);

        let mut out = top;
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&middle);
        if !bottom.is_empty() {
            out.push('\n');
            out.push_str(&bottom);
        }
        out
    }
}

/// Heading frames by section depth; the last one covers everything deeper
const HEADING_FRAMES: [Frame; 4] = [
    Frame {
        top_left: "+",
        top: "=",
        top_right: "+",
        left: "| ",
        right: " |",
        bottom_left: "+",
        bottom: "=",
        bottom_right: "+",
    },
    Frame {
        top_left: "",
        top: "-",
        top_right: "",
        left: " ",
        right: " ",
        bottom_left: "",
        bottom: "-",
        bottom_right: "",
    },
    Frame {
        top_left: "",
        top: "",
        top_right: "",
        left: "",
        right: "",
        bottom_left: "",
        bottom: "-",
        bottom_right: "",
    },
    Frame {
        top_left: "",
        top: "",
        top_right: "",
        left: "= ",
        right: " =",
        bottom_left: "",
        bottom: "",
        bottom_right: "",
    },
];

/// Table collected cell by cell until its node ends
#[derive(Debug, Default)]
struct PendingTable {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl PendingTable {
    /// Column widths: header plus its dashes, or the widest cell
    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| display_width(h) + 2).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate() {
                if i >= widths.len() {
                    widths.push(1);
                }
                widths[i] = widths[i].max(display_width(cell));
            }
        }
        widths
    }

    /// Lay out the table; returns the lines and the content width
    fn layout(&self, max_width: usize) -> (Vec<String>, usize) {
        let widths = self.widths();
        let total: usize = widths.iter().sum();

        if total <= max_width {
            let mut lines = Vec::new();
            if !self.headers.is_empty() {
                let headers: Vec<String> = self.headers.iter().map(|h| format!("-{h}-")).collect();
                lines.push(columns(&headers, &widths));
            }
            lines.extend(self.rows.iter().map(|row| columns(row, &widths)));
            return (lines, total);
        }

        let mut lines: Vec<String> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, h)| format!("{}-{h}-", INDENT.repeat(i)))
            .collect();
        for row in &self.rows {
            lines.extend(
                row.iter()
                    .enumerate()
                    .map(|(i, cell)| format!("{}{cell}", INDENT.repeat(i))),
            );
        }
        let width = lines.iter().map(|l| display_width(l)).max().unwrap_or(0);
        (lines, width)
    }
}

/// Place cells at their column offsets, two blanks between columns
fn columns(cells: &[String], widths: &[usize]) -> String {
    let mut line = String::new();
    let mut line_width = 0;
    let mut pos = 0;
    for (cell, width) in cells.iter().zip(widths) {
        if pos > line_width {
            line.push_str(&" ".repeat(pos - line_width));
            line_width = pos;
        }
        line.push_str(cell);
        line_width += display_width(cell);
        pos += width + 2;
    }
    line
}

/// `- - -` border covering `width` columns that never ends on a blank
fn table_border(width: usize) -> String {
    let mut border: String = TABLE_BORDER.chars().cycle().take(width).collect();
    if border.is_empty() || border.ends_with(' ') {
        border.push_str(TABLE_BORDER);
    }
    border
}

fn digits(n: usize) -> usize {
    n.max(1).to_string().len()
}

/// Text publisher
#[derive(Debug)]
pub struct TextPublisher {
    width: usize,
    flushes: usize,
    /// Set while the document consists of nothing but verbatim text
    plaintext_doc: bool,
    tables: Vec<PendingTable>,
}

impl TextPublisher {
    pub fn new() -> Self {
        Self::with_width(80)
    }

    /// Publisher wrapping at `width` columns
    pub fn with_width(width: usize) -> Self {
        Self {
            width,
            flushes: 0,
            plaintext_doc: false,
            tables: Vec::new(),
        }
    }

    fn set_gap_before(cx: &mut PublishContext<'_>, gap: i64, at: At) {
        if gap > cx.cache_int("gapBefore", at).unwrap_or(0) {
            cx.set_cache("gapBefore", gap, at);
        }
    }

    // --- node starts ----------------------------------------------------------

    fn block_begin(cx: &mut PublishContext<'_>) {
        if cx.has_prop("text", At::HERE) || cx.has_prop("heading", At::HERE) {
            Self::set_gap_before(cx, 1, At::HERE);
        }
    }

    fn list_begin(cx: &mut PublishContext<'_>) {
        if cx.form(1) == Form::Item {
            cx.append_cache_string("indent", INDENT, At::HERE);
        } else {
            Self::set_gap_before(cx, 1, At::HERE);
        }
    }

    fn item_begin(cx: &mut PublishContext<'_>) {
        let style = cx.prop_str("style", At::INHERIT).map(str::to_string);
        match style.as_deref() {
            Some("bullet") => cx.set_cache("prefix", BULLET_PREFIX, At::HERE),
            Some("number") => {
                let n = cx.cache_increment("nItem", At::up(1)) + 1;
                let width = digits(cx.breadth(1));
                cx.set_cache("prefix", format!("{n:>width$}: "), At::HERE);
            }
            _ => {}
        }
    }

    fn table_begin(&mut self, cx: &PublishContext<'_>) {
        let headers = cx
            .prop("headers", At::HERE)
            .and_then(PropValue::as_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        self.tables.push(PendingTable {
            headers,
            rows: Vec::new(),
        });
    }

    fn row_begin(&mut self) {
        if let Some(table) = self.tables.last_mut() {
            table.rows.push(Vec::new());
        }
    }

    fn cell_begin(&mut self) {
        if let Some(row) = self.tables.last_mut().and_then(|t| t.rows.last_mut()) {
            row.push(String::new());
        }
    }

    fn plaintext_begin(&mut self, cx: &mut PublishContext<'_>) {
        if self.flushes == 0 && !cx.has_prop("heading", At::INHERIT) {
            self.plaintext_doc = true;
        } else {
            cx.append_cache_string("indent", INDENT, At::INHERIT);
            Self::set_gap_before(cx, 1, At::HERE);
        }
    }

    fn link_begin(cx: &mut PublishContext<'_>) {
        let url = cx.prop("url", At::HERE).map(ToString::to_string).unwrap_or_default();
        let text = match cx.prop_str("text", At::HERE) {
            None | Some("") => url,
            Some(label) if URL_SCHEME_RE.is_match(&url) => format!("{label} ({url})"),
            Some(label) => label.to_string(),
        };
        cx.set_cache("text", text, At::HERE);
    }

    // --- node ends ------------------------------------------------------------

    fn table_end(&mut self, cx: &mut PublishContext<'_>) {
        let Some(table) = self.tables.pop() else {
            unreachable!("table end without a pending table");
        };
        let (lines, width) = table.layout(self.width);
        Self::set_gap_before(cx, 1, At::INHERIT);
        if lines.is_empty() {
            return;
        }
        let columns = table.widths().len();
        let border = table_border(width + columns.saturating_sub(1) * 2 + 2 * TABLE_INDENT);
        cx.set_cache("borderTop", border.as_str(), At::HERE);
        cx.set_cache("borderBottom", border, At::HERE);
        cx.set_cache("text", lines.join("\n"), At::HERE);
        cx.set_cache("plaintext", true, At::HERE);
        cx.set_cache("indentInside", " ".repeat(TABLE_INDENT), At::HERE);
    }

    fn cell_end(&mut self, cx: &mut PublishContext<'_>) {
        let Some(text) = cx.take_cache("text", At::HERE) else {
            return;
        };
        if let Some(cell) = self
            .tables
            .last_mut()
            .and_then(|t| t.rows.last_mut())
            .and_then(|r| r.last_mut())
        {
            cell.push_str(&text.to_string().replace('\n', " "));
        }
    }

    // --- text flow ------------------------------------------------------------

    /// Hand the current level's text and heading to the parent
    fn consolidate_text(cx: &mut PublishContext<'_>) {
        cx.consolidate_cache_text("heading", "\n");
        if cx.prop_str("form", At::up(1).inherited()) == Some("plaintext") {
            let text = cx.cache_str("text", At::HERE).unwrap_or_default();
            let text = format_plain(text, "", 0).join("\n");
            cx.set_cache("text", text, At::HERE);
            cx.consolidate_cache_text("text", "\n\n");
        } else {
            cx.consolidate_cache_text("text", "\n");
        }
        if let Some(gap) = cx.take_cache("gapBefore", At::HERE).and_then(|g| g.as_int()) {
            Self::set_gap_before(cx, gap, At::up(1));
        }
    }

    /// Write everything cached from the outermost level inward
    fn flush_pending(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let mut gap = if self.flushes == 0 && !self.plaintext_doc { 1 } else { 0 };
        self.flushes += 1;

        for level in (0..cx.depth()).rev() {
            let at = At::up(level);
            if let Some(requested) = cx.take_cache("gapBefore", at).and_then(|g| g.as_int()) {
                gap = gap.max(requested);
            }
            let mut indent = cx.cache_str("indent", at.inherited()).unwrap_or_default().to_string();
            let indent_inside = cx
                .cache_str("indentInside", at.inherited())
                .unwrap_or_default()
                .to_string();

            if let Some(heading) = cx.take_cache("heading", at).filter(PropValue::is_truthy) {
                let depth = cx.props_stack("heading", level + 1).len();
                let frame = &HEADING_FRAMES[depth.min(HEADING_FRAMES.len() - 1)];
                gap = gap.max(if frame.is_boxed() { 2 } else { 1 });
                write_line(cx, gap, &indent, &frame.build(&heading.to_string()))?;
                gap = 1;
            }

            if let Some(border) = cx.take_cache("borderTop", at) {
                let border = border.to_string();
                if !border.is_empty() {
                    write_line(cx, gap, &indent, &border)?;
                    gap = 0;
                }
            }

            indent.push_str(&indent_inside);
            let text = cx.take_cache("text", at).map(|t| t.to_string()).unwrap_or_default();
            if text.is_empty() {
                continue;
            }
            let verbatim = cx.prop_str("form", at.inherited()) == Some("plaintext")
                || cx.cache("plaintext", At::HERE).is_some_and(PropValue::is_truthy);
            if verbatim {
                for line in format_plain(&text, &indent, 0) {
                    write_line(cx, gap, "", &line)?;
                    gap = 0;
                }
                Self::set_gap_before(cx, 1, at.inherited());
            } else {
                let prefix = cx.cache_str("prefix", at.inherited()).unwrap_or_default().to_string();
                for line in word_wrap(&text, &indent, &prefix, self.width) {
                    write_line(cx, gap, "", &line)?;
                    gap = 0;
                }
            }
        }
        Ok(())
    }
}

impl Default for TextPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Write a line after `gap` blank lines.
///
/// Newlines already leading `s` count towards the gap, and nothing is added
/// for an empty `s`.
fn write_line(cx: &mut PublishContext<'_>, gap: i64, indent: &str, s: &str) -> Result<()> {
    let mut gap = gap;
    let mut chars = s.chars().peekable();
    while gap > 0 && chars.peek().is_some() {
        if chars.peek() == Some(&'\n') {
            chars.next();
        } else {
            cx.write("\n")?;
        }
        gap -= 1;
    }
    cx.write(indent)?;
    cx.write(s)?;
    cx.write("\n")
}

impl Publisher for TextPublisher {
    fn format(&self) -> OutputFormat {
        OutputFormat::Text
    }

    fn doc_begin(&mut self, _cx: &mut PublishContext<'_>, _title: &str, _style: StyleVariant) -> Result<()> {
        Ok(())
    }

    fn doc_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        if !self.plaintext_doc {
            cx.write("\n")?;
        }
        Ok(())
    }

    fn node_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let form = cx.form(0);
        cx.cache_prop("text", At::HERE);
        cx.cache_prop("heading", At::HERE);

        match form {
            Form::Block => Self::block_begin(cx),
            Form::List => Self::list_begin(cx),
            Form::Item => Self::item_begin(cx),
            Form::Table => self.table_begin(cx),
            Form::Row => self.row_begin(),
            Form::Cell => self.cell_begin(),
            Form::Plaintext => self.plaintext_begin(cx),
            Form::Link => Self::link_begin(cx),
            _ => {}
        }

        // A change of form between siblings separates them by a blank line
        let name = form.to_string();
        let previous = cx.cache_str("formPrev", At::up(1)).map(str::to_string);
        if previous.as_deref() != Some(name.as_str()) {
            if previous.is_some() {
                Self::set_gap_before(cx, 1, At::HERE);
            }
            cx.set_cache("formPrev", name, At::up(1));
        }

        if matches!(form, Form::None | Form::Link) && cx.has_cache("text", At::HERE) && cx.depth() > 1 {
            Self::consolidate_text(cx);
        }
        Ok(())
    }

    fn node_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let form = cx.form(0);
        match form {
            Form::Block | Form::List => Self::set_gap_before(cx, 1, At::INHERIT),
            Form::Table => self.table_end(cx),
            Form::Cell => self.cell_end(cx),
            _ => {}
        }

        if cx.has_cache("text", At::HERE) || cx.has_cache("heading", At::HERE) {
            if self.plaintext_doc && !matches!(form, Form::None | Form::Plaintext) {
                self.plaintext_doc = false;
            }
            self.flush_pending(cx)?;
        }

        if let Some(border) = cx.take_cache("borderBottom", At::HERE) {
            let indent = cx.cache_str("indent", At::INHERIT).unwrap_or_default().to_string();
            cx.write(&format!("{indent}{border}\n"))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::Registrar;
    use crate::props;
    use crate::publish::publish;
    use crate::store::DocumentStore;
    use crate::traits::PublishConfig;
    use pretty_assertions::assert_eq;

    fn render(store: &mut DocumentStore, root: crate::ast::NodeId) -> String {
        let mut out = Vec::new();
        let mut publisher = TextPublisher::new();
        publish(store, root, &mut publisher, &mut out, &PublishConfig::default()).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn render_text(text: &str) -> String {
        let mut store = DocumentStore::new();
        let root = store.parse_text(text);
        render(&mut store, root)
    }

    #[test]
    fn test_frames() {
        assert_eq!(HEADING_FRAMES[0].build("Title"), "+=======+\n| Title |\n+=======+");
        assert_eq!(HEADING_FRAMES[1].build("Sub"), "-----\n Sub \n-----");
        assert_eq!(HEADING_FRAMES[2].build("Low"), "Low\n---");
        assert_eq!(HEADING_FRAMES[3].build("Deep"), "= Deep =");
    }

    #[test]
    fn test_section_with_text() {
        assert_eq!(
            render_text("!Title\n\nSome *bold* text"),
            "\n\n+=======+\n| Title |\n+=======+\n\nSome *bold* text\n\n"
        );
    }

    #[test]
    fn test_nested_heading_frames() {
        let out = render_text("!One\nbody\n!!Two\nmore");
        assert_eq!(
            out,
            "\n\n+=====+\n| One |\n+=====+\n\nbody\n\n\n-----\n Two \n-----\n\nmore\n\n"
        );
    }

    #[test]
    fn test_bullet_list() {
        assert_eq!(render_text("* a\n* b\n** c"), "\n* a\n* b\n  * c\n\n");
    }

    #[test]
    fn test_numbered_list_pads_numbers() {
        let items: Vec<String> = (1..=10).map(|i| format!("# i{i}")).collect();
        let out = render_text(&items.join("\n"));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1], " 1: i1");
        assert_eq!(lines[10], "10: i10");
    }

    #[test]
    fn test_links() {
        assert_eq!(render_text("see [[Docs=http://x.org]] now"), "\nsee Docs (http://x.org) now\n\n");
        assert_eq!(render_text("[[Home=/index]]"), "\nHome\n\n");
    }

    #[test]
    fn test_gap_requests_coalesce_by_maximum() {
        let mut store = DocumentStore::new();
        let root = store.create(props! {});
        let mut out = Vec::new();
        let mut cx = PublishContext::new(&mut store, &mut out, root, &PublishConfig::default());
        cx.push(props! {}, 0);
        TextPublisher::set_gap_before(&mut cx, 1, At::HERE);
        TextPublisher::set_gap_before(&mut cx, 2, At::HERE);
        TextPublisher::set_gap_before(&mut cx, 1, At::HERE);
        assert_eq!(cx.cache_int("gapBefore", At::HERE), Some(2));
    }

    #[test]
    fn test_heading_after_block_gets_two_blank_lines() {
        let out = render_text("intro\n!Title\nbody");
        assert!(out.starts_with("\nintro\n\n\n+=======+"), "{out:?}");
    }

    fn table_with_widths(a: usize, b: usize) -> String {
        let mut store = DocumentStore::new();
        let mut reg = Registrar::new(&mut store, "");
        let table = reg.table(Vec::new(), vec![vec!["x".repeat(a), "y".repeat(b)]]);
        render(&mut store, table)
    }

    #[test]
    fn test_table_fits_at_line_width() {
        let out = table_with_widths(40, 40);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[2], format!(" {}  {}", "x".repeat(40), "y".repeat(40)));
        assert_eq!(lines[1], lines[3]);
        assert_eq!(lines[1], "- ".repeat(43));
    }

    #[test]
    fn test_table_falls_back_past_line_width() {
        let out = table_with_widths(41, 40);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[2], format!(" {}", "x".repeat(41)));
        assert_eq!(lines[3], format!("   {}", "y".repeat(40)));
    }

    #[test]
    fn test_table_with_headers() {
        let out = render_text("|!Name|!Value|\n|a|1|");
        assert_eq!(out, "\n- - - - - - - - -\n -Name-  -Value-\n a       1\n- - - - - - - - -\n\n");
    }

    #[test]
    fn test_plaintext_document() {
        assert_eq!(render_text("'''\n  code\n    more\n'''"), "code\n  more\n");
    }

    #[test]
    fn test_plaintext_after_text_is_indented() {
        assert_eq!(render_text("intro\n'''\ncode\n'''"), "\nintro\n\n  code\n\n");
    }
}
