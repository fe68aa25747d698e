// SPDX-License-Identifier: AGPL-3.0-or-later
//! Block classification and line feeding
//!
//! A block consumes lines until it sees one it does not want and hands that
//! line back. Turning a finished block into nodes is the parser's job.

/// Plaintext fences
const PLAINTEXT_FENCES: [&str; 2] = ["\"\"\"", "'''"];

const EXEC_OPEN: &str = "{{{";
const EXEC_CLOSE: &str = "}}}";

/// True when a line opens a non-text block
pub(crate) fn is_block_start(line: &str) -> bool {
    let s = line.trim_start();
    s.starts_with(['!', '#', '*', '|'])
        || PLAINTEXT_FENCES.iter().any(|f| s.starts_with(f))
        || s.starts_with(EXEC_OPEN)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ListStyle {
    Bullet,
    Number,
}

impl ListStyle {
    pub(crate) fn name(self) -> &'static str {
        match self {
            Self::Bullet => "bullet",
            Self::Number => "number",
        }
    }
}

/// One item; a deeper item hangs its list off the last item above it
#[derive(Debug, Default)]
pub(crate) struct ListEntry {
    pub text: String,
    pub sublist: Option<ListLevel>,
}

#[derive(Debug)]
pub(crate) struct ListLevel {
    pub style: ListStyle,
    pub items: Vec<ListEntry>,
}

impl ListLevel {
    fn new(style: ListStyle) -> Self {
        Self {
            style,
            items: Vec::new(),
        }
    }

    /// Add an item `depth` levels down, 1 being this level
    fn add(&mut self, depth: usize, style: ListStyle, text: String) {
        if depth <= 1 {
            self.items.push(ListEntry {
                text,
                sublist: None,
            });
            return;
        }
        if self.items.is_empty() {
            self.items.push(ListEntry::default());
        }
        if let Some(host) = self.items.last_mut() {
            host.sublist
                .get_or_insert_with(|| ListLevel::new(style))
                .add(depth - 1, style, text);
        }
    }

    fn last_entry_mut(&mut self, depth: usize) -> Option<&mut ListEntry> {
        if depth <= 1 {
            return self.items.last_mut();
        }
        self.items
            .last_mut()?
            .sublist
            .as_mut()?
            .last_entry_mut(depth - 1)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ListBlock {
    pub root: Option<ListLevel>,
    last_depth: usize,
}

impl ListBlock {
    fn feed(&mut self, line: &str) -> Option<String> {
        let s = line.trim();
        if let Some(rest) = s.strip_prefix('+') {
            if let Some(root) = self.root.as_mut() {
                let rest = rest.trim();
                if let Some(entry) = root.last_entry_mut(self.last_depth) {
                    if !rest.is_empty() {
                        if !entry.text.is_empty() {
                            entry.text.push(' ');
                        }
                        entry.text.push_str(rest);
                    }
                }
                return None;
            }
        }

        let depth = s.chars().take_while(|c| matches!(c, '*' | '#')).count();
        let style = match s.chars().next() {
            Some('*') if depth > 0 => ListStyle::Bullet,
            Some('#') if depth > 0 => ListStyle::Number,
            _ => return Some(line.to_string()),
        };
        let text = s[depth..].trim_start().to_string();
        self.root
            .get_or_insert_with(|| ListLevel::new(style))
            .add(depth, style, text);
        self.last_depth = depth;
        None
    }
}

#[derive(Debug, Default)]
pub(crate) struct TableBlock {
    pub rows: Vec<Vec<String>>,
    last_row_closed: bool,
}

fn split_cells(s: &str, skip_first: bool, closed: bool) -> Vec<String> {
    let mut cells: Vec<String> = s.split('|').map(|c| c.trim().to_string()).collect();
    if closed {
        cells.pop();
    }
    if skip_first && !cells.is_empty() {
        cells.remove(0);
    }
    cells
}

impl TableBlock {
    fn feed(&mut self, line: &str) -> Option<String> {
        let s = line.trim();
        if s.is_empty() {
            return None;
        }
        let closed = s.ends_with('|');

        if let (Some(rest), Some(row)) = (s.strip_prefix('+'), self.rows.last_mut()) {
            if !rest.is_empty() {
                let cells = split_cells(rest, false, closed);
                if let Some((first, others)) = cells.split_first() {
                    match row.last_mut() {
                        Some(last) if !self.last_row_closed => {
                            if !last.is_empty() {
                                last.push(' ');
                            }
                            last.push_str(first);
                            row.extend(others.iter().cloned());
                        }
                        _ => row.extend(cells.iter().cloned()),
                    }
                }
                self.last_row_closed = closed;
            }
            return None;
        }

        if !s.starts_with('|') {
            return Some(line.to_string());
        }
        let cells = split_cells(s, true, closed);
        if !cells.is_empty() {
            self.rows.push(cells);
        }
        self.last_row_closed = closed;
        None
    }
}

/// A block being scanned
#[derive(Debug)]
pub(crate) enum Block {
    Text(String),
    Heading { level: usize, text: String },
    List(ListBlock),
    Table(TableBlock),
    Plaintext {
        text: String,
        fence: &'static str,
        closed: bool,
    },
    Exec { code: String, closed: bool },
}

impl Block {
    /// Open the block a line starts, in precedence order.
    ///
    /// Exec and plaintext blocks may close on their opening line; whatever
    /// follows the terminator is returned for re-classification.
    pub(crate) fn start(line: &str) -> (Self, Option<String>) {
        let s = line.trim();

        if let Some(rest) = s.strip_prefix(EXEC_OPEN) {
            let mut block = Self::Exec {
                code: String::new(),
                closed: false,
            };
            let rest = block.feed(rest);
            return (block, rest);
        }

        if let Some(fence) = PLAINTEXT_FENCES.into_iter().find(|f| s.starts_with(f)) {
            let mut block = Self::Plaintext {
                text: String::new(),
                fence,
                closed: false,
            };
            let rest = block.feed(&s[fence.len()..]);
            return (block, rest);
        }

        let level = s.chars().take_while(|c| *c == '!').count();
        if level > 0 {
            let block = Self::Heading {
                level,
                text: s[level..].trim_start().to_string(),
            };
            return (block, None);
        }

        if s.starts_with(['*', '#']) {
            let mut list = ListBlock::default();
            list.feed(line);
            return (Self::List(list), None);
        }

        if s.starts_with('|') {
            let mut table = TableBlock::default();
            table.feed(line);
            return (Self::Table(table), None);
        }

        (Self::Text(s.to_string()), None)
    }

    /// Feed the next line; `Some` hands a line back and ends the block
    pub(crate) fn feed(&mut self, line: &str) -> Option<String> {
        match self {
            Self::Text(text) => {
                if is_block_start(line) || line.trim().is_empty() {
                    return Some(line.to_string());
                }
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(line.trim());
                None
            }
            Self::Heading { text, .. } => {
                let Some(rest) = line.trim().strip_prefix('+') else {
                    return Some(line.to_string());
                };
                let rest = rest.trim();
                if !rest.is_empty() {
                    if !text.is_empty() {
                        text.push(' ');
                    }
                    text.push_str(rest);
                }
                None
            }
            Self::List(list) => list.feed(line),
            Self::Table(table) => table.feed(line),
            Self::Plaintext {
                text,
                fence,
                closed,
            } => feed_fenced(text, closed, fence, line, true),
            Self::Exec { code, closed } => feed_fenced(code, closed, EXEC_CLOSE, line, false),
        }
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Self::Text(_) => "text",
            Self::Heading { .. } => "heading",
            Self::List(_) => "list",
            Self::Table(_) => "table",
            Self::Plaintext { .. } => "plaintext",
            Self::Exec { .. } => "exec",
        }
    }
}

/// Collect lines up to a terminator, which may sit anywhere in a line
fn feed_fenced(
    buf: &mut String,
    closed: &mut bool,
    terminator: &str,
    line: &str,
    keep_blank: bool,
) -> Option<String> {
    if *closed {
        return Some(line.to_string());
    }
    let (part, rest) = match line.find(terminator) {
        Some(i) => (&line[..i], Some(line[i + terminator.len()..].to_string())),
        None => (line, None),
    };
    if keep_blank || !part.is_empty() {
        if !buf.is_empty() {
            buf.push('\n');
        }
        buf.push_str(part);
    }
    if rest.is_some() {
        *closed = true;
    }
    rest
}
