// SPDX-License-Identifier: AGPL-3.0-or-later
//! Text layout helpers shared by the publishers
//!
//! Widths are measured in extended grapheme clusters. Separator rules only
//! know about ASCII punctuation.

use crate::ast::PropValue;
use unicode_segmentation::UnicodeSegmentation;

/// Punctuation that wants a blank after it when text follows.
const TRAILING_PUNCTUATION: &str = ".!?,;:)}]";

/// Punctuation that wants a blank before it.
const OPENING_PUNCTUATION: &str = "'\"`({[#*$";

/// Display width of a string in grapheme clusters
pub fn display_width(s: &str) -> usize {
    s.graphemes(true).count()
}

fn wants_space_before(c: char) -> bool {
    c.is_alphanumeric() || OPENING_PUNCTUATION.contains(c)
}

fn wants_space_after(c: char) -> bool {
    c.is_alphanumeric() || TRAILING_PUNCTUATION.contains(c)
}

/// Greedy word wrap.
///
/// The first line starts with `indent` + `prefix`; continuation lines are
/// padded with blanks to the same column. Whitespace runs in `text` are
/// discarded and single blanks are re-inserted only where a word boundary
/// needs one, so re-wrapping already wrapped text is stable. A word that
/// cannot fit on any line is emitted whole on a line of its own.
pub fn word_wrap(text: &str, indent: &str, prefix: &str, width: usize) -> Vec<String> {
    let mut line = format!("{indent}{prefix}");
    let start_width = display_width(&line);
    let line_start = " ".repeat(start_width);
    let mut line_width = start_width;
    let mut lines = Vec::new();

    for word in text
        .split(|c: char| matches!(c, ' ' | '\t' | '\r' | '\n'))
        .filter(|w| !w.is_empty())
    {
        let word_width = display_width(word);

        if line_width > start_width && line_width + word_width >= width {
            lines.push(std::mem::replace(&mut line, line_start.clone()));
            line.push_str(word);
            line_width = start_width + word_width;
            continue;
        }

        if line_width > start_width {
            let last = line.chars().next_back();
            let first = word.chars().next();
            if let (Some(last), Some(first)) = (last, first) {
                if wants_space_after(last) && wants_space_before(first) {
                    line.push(' ');
                    line_width += 1;
                }
            }
        }
        line.push_str(word);
        line_width += word_width;
    }

    if line_width > start_width {
        lines.push(line);
    }
    lines
}

fn leading_whitespace(line: &str) -> usize {
    line.chars().take_while(|c| c.is_whitespace()).count()
}

/// Dedent and indent a verbatim block.
///
/// Leading and trailing blank lines are dropped and the common indentation
/// of the non-blank lines is removed. Interior blank lines come back empty.
/// With a non-zero `width`, long lines are cut into `width`-sized pieces with
/// a trailing `\` on every piece but the last.
pub fn format_plain(text: &str, indent: &str, width: usize) -> Vec<String> {
    let lines: Vec<&str> = text.split('\n').collect();
    let Some(first) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return Vec::new();
    };

    let trim = lines[first..]
        .iter()
        .filter(|l| !l.trim().is_empty())
        .map(|l| leading_whitespace(l))
        .min()
        .unwrap_or(0);
    let room = width.saturating_sub(display_width(indent)).max(1);

    let mut out = Vec::new();
    let mut blanks = 0;
    for line in &lines[first..] {
        if line.trim().is_empty() {
            blanks += 1;
            continue;
        }
        out.extend(std::iter::repeat(String::new()).take(blanks));
        blanks = 0;

        let body: Vec<char> = line.chars().skip(trim).collect();
        if width == 0 || body.len() <= room {
            out.push(format!("{indent}{}", body.iter().collect::<String>()));
            continue;
        }
        let mut pieces = body.chunks(room).peekable();
        while let Some(piece) = pieces.next() {
            let piece: String = piece.iter().collect();
            if pieces.peek().is_some() {
                out.push(format!("{indent}{piece}\\"));
            } else {
                out.push(format!("{indent}{piece}"));
            }
        }
    }
    out
}

/// True when a property value is a plain string
pub fn is_text_value(value: &PropValue) -> bool {
    matches!(value, PropValue::Text(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wrap_joins_whitespace_runs() {
        let lines = word_wrap("alpha   beta\n\tgamma", "", "", 80);
        assert_eq!(lines, vec!["alpha beta gamma"]);
    }

    #[test]
    fn test_wrap_hanging_prefix() {
        let text = "one two three four five six seven eight nine ten";
        let lines = word_wrap(text, "  ", "* ", 20);
        assert_eq!(
            lines,
            vec!["  * one two three", "    four five six", "    seven eight", "    nine ten"]
        );
    }

    #[test]
    fn test_wrap_keeps_punctuation_attached() {
        // A newline between a word and a comma must not turn into a blank.
        let lines = word_wrap("hello\n, world\n(see) it", "", "", 80);
        assert_eq!(lines, vec!["hello, world (see) it"]);
    }

    #[test]
    fn test_wrap_long_word_alone() {
        let long = "x".repeat(30);
        let lines = word_wrap(&format!("a {long} b"), "", "", 10);
        assert_eq!(lines, vec!["a".to_string(), long, "b".to_string()]);
    }

    #[test]
    fn test_wrap_empty() {
        assert!(word_wrap("   ", "  ", "* ", 80).is_empty());
    }

    #[test]
    fn test_plain_dedent() {
        let lines = format_plain("\n\n    a\n      b\n\n    c\n\n  \n", "", 0);
        assert_eq!(lines, vec!["a", "  b", "", "c"]);
    }

    #[test]
    fn test_plain_indent_and_cut() {
        let lines = format_plain("abcdefghij", "  ", 6);
        assert_eq!(lines, vec!["  abcd\\", "  efgh\\", "  ij"]);
    }

    #[test]
    fn test_plain_all_blank() {
        assert!(format_plain(" \n\t\n", "", 0).is_empty());
    }

    #[test]
    fn test_is_text_value() {
        assert!(is_text_value(&PropValue::from("x")));
        assert!(!is_text_value(&PropValue::Bool(true)));
    }
}
