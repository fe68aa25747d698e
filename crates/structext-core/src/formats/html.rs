// SPDX-License-Identifier: AGPL-3.0-or-later
//! XHTML publisher with an embedded stylesheet
//!
//! The table of contents is written just before the first heading, once
//! every listed section has its anchor.

use crate::ast::{Form, PropValue};
use crate::publish::{At, PublishContext};
use crate::textutil::{format_plain, word_wrap};
use crate::traits::{OutputFormat, Publisher, Result, StyleVariant};
use html_escape::{encode_double_quoted_attribute, encode_text};

/// Wrap width for running text and verbatim blocks
const WRAP_WIDTH: usize = 80;

const HEAD_START: &str = r#"<!DOCTYPE html PUBLIC "-//W3C//DTD XHTML 1.0 Transitional//EN"
        "http://www.w3.org/TR/xhtml1/DTD/xhtml1-transitional.dtd">

<html xmlns="http://www.w3.org/1999/xhtml" xml:lang="en" lang="en">

<head>

<meta http-equiv="content-type" content="text/html;charset=utf-8" />

"#;

const CSS_DEFAULT: &str = r#"
* {
    font-size: 12pt;
}

.h1bar {
    background-color: #aaaaff;
    margin-top: 32px;
    margin-bottom: 12px;
    padding: 4px;
    width: 100%;
    height: auto;
    border-spacing: 0;
    border-collapse: collapse;
}

.h1barheading {
    font-size: 16pt;
    font-weight: bold;
    margin: 0px;
    padding: 4px;
}

.h1bartopcell {
    text-align: right;
}

.h1bartoplink {
    font-size: 11pt;
    text-indent: 1em;
    padding: 2px;
}

.h2bar {
    background-color: #e8e8ff;
    margin-top: 32px;
    margin-bottom: 12px;
    padding: 2px;
    width: 100%;
    height: auto;
    border-spacing: 0;
    border-collapse: collapse;
}

.h2barheading {
    font-size: 14pt;
    font-weight: bold;
    margin: 0px;
    padding: 2px;
}

.h2bartopcell {
    text-align: right;
}

.h2bartoplink {
    font-size: 11pt;
    text-indent: 1em;
    padding: 2px;
}

.heading1 {
    background-color: #aaaaff;
    font-size: 16pt;
    font-weight: bold;
    margin: 32px 0px 12px 0px;
    padding: 4px;
}

.heading2 {
    background-color: #e8e8ff;
    font-size: 14pt;
    font-weight: bold;
    margin: 32px 0px 12px 0px;
    padding: 2px;
}

.heading3 {
    border-bottom: 1px solid gray;
    width: auto;
    font-size: 13pt;
    font-weight: bold;
    margin: 24px 0px 12px 0px;
    padding: 0;
}

.heading4 {
    font-size: 12pt;
    font-weight: bold;
    margin: 12px 0px 6px 0px;
    padding: 0;
}

.heading5 {
    font-size: 12pt;
    font-style: italic;
    margin: 8px 0px 4px 0px;
    padding: 0;
}

.heading6 {
    font-size: 11pt;
    font-style: italic;
    margin: 8px 0px 4px 0px;
    padding: 0;
}

.gentable {
    border: 1px solid gray;
    margin-bottom: 8px;
    border-spacing: 0;
    border-collapse: collapse;
}

.genheader {
    border: 1px solid gray;
    background-color: #F2F2FF;
    padding: 2px 4px;
}

.gencell {
    border: 1px solid gray;
    padding: 2px 4px;
}

ol {
    margin: 0px 0px 0px -8px;
}

ol li {
    list-style-type: decimal;
}

pre {
    background-color: #eeeeee;
    font-size: 10pt;
}

.tocblock {
    border: 1px solid gray;
    background-color: #eeeeff;
    padding: 10px;
    margin: 20px;
}

.toc1 {
    padding-top: 10px;
    font-weight: bold;
}

.toc2 {
    padding-left: 16px;
}

.toc3 {
    padding-left: 32px;
}

.toc4 {
    padding-left: 48px;
}

.block {
    padding-top: 6px;
    padding-bottom: 6px;
}
"#;

const CSS_SMALL: &str = r#"
* {
    font-size: 10pt;
}

.h1bar {
    background-color: #aaaaff;
    margin-top: 32px;
    margin-bottom: 12px;
    padding: 4px;
    width: 100%;
    height: auto;
    border-spacing: 0;
    border-collapse: collapse;
}

.h1barheading {
    font-size: 14pt;
    font-weight: bold;
    margin: 0px;
    padding: 4px;
}

.h1bartopcell {
    text-align: right;
}

.h1bartoplink {
    font-size: 9pt;
    text-indent: 1em;
    padding: 2px;
}

.h2bar {
    background-color: #e8e8ff;
    margin-top: 32px;
    margin-bottom: 12px;
    padding: 2px;
    width: 100%;
    height: auto;
    border-spacing: 0;
    border-collapse: collapse;
}

.h2barheading {
    font-size: 12pt;
    font-weight: bold;
    margin: 0px;
    padding: 2px;
}

.h2bartopcell {
    text-align: right;
}

.h2bartoplink {
    font-size: 9pt;
    text-indent: 1em;
    padding: 2px;
}

.heading1 {
    background-color: #aaaaff;
    font-size: 14pt;
    font-weight: bold;
    margin: 32px 0px 12px 0px;
    padding: 4px;
}

.heading2 {
    background-color: #e8e8ff;
    font-size: 12pt;
    font-weight: bold;
    margin: 32px 0px 12px 0px;
    padding: 2px;
}

.heading3 {
    border-bottom: 1px solid gray;
    width: auto;
    font-size: 11pt;
    font-weight: bold;
    margin: 24px 0px 12px 0px;
    padding: 0;
}

.heading4 {
    font-size: 10pt;
    font-weight: bold;
    margin: 12px 0px 6px 0px;
    padding: 0;
}

.heading5 {
    font-size: 10pt;
    font-style: italic;
    margin: 8px 0px 4px 0px;
    padding: 0;
}

.heading6 {
    font-size: 9pt;
    font-style: italic;
    margin: 8px 0px 4px 0px;
    padding: 0;
}

.gentable {
    border: 1px solid gray;
    margin-bottom: 8px;
    border-spacing: 0;
    border-collapse: collapse;
}

.genheader {
    border: 1px solid gray;
    background-color: #F2F2FF;
    padding: 2px 4px;
}

.gencell {
    border: 1px solid gray;
    padding: 2px 4px;
}

ol {
    margin: 0px 0px 0px -8px;
}

ol li {
    list-style-type: decimal;
}

pre {
    background-color: #eeeeee;
    font-size: 9pt;
}

.tocblock {
    border: 1px solid gray;
    background-color: #eeeeff;
    padding: 10px;
    margin: 20px;
}

.toc1 {
    padding-top: 10px;
    font-weight: bold;
}

.toc2 {
    padding-left: 16px;
}

.toc3 {
    padding-left: 32px;
}

.toc4 {
    padding-left: 48px;
}

.block {
    padding-top: 6px;
    padding-bottom: 6px;
}
"#;

/// Print media hide the navigation aids; shared by both variants
const CSS_PRINT: &str = r#"
.h1bartoplink {
    display: none;
}

.h2bartoplink {
    display: none;
}

.tocblock {
    display: none;
}
"#;

fn stylesheet(style: StyleVariant) -> &'static str {
    match style {
        StyleVariant::Default => CSS_DEFAULT,
        StyleVariant::Small => CSS_SMALL,
    }
}

/// HTML publisher
#[derive(Debug)]
pub struct HtmlPublisher {
    /// Indent depth of written lines
    depth: usize,
    /// Heading nesting
    heading_level: usize,
    /// The last chunk ended a line
    new_line: bool,
    /// Open plaintext nodes
    plaintext: usize,
    toc_pending: bool,
}

impl HtmlPublisher {
    pub fn new() -> Self {
        Self {
            depth: 0,
            heading_level: 0,
            new_line: false,
            plaintext: 0,
            toc_pending: true,
        }
    }

    /// Write markup, indenting every line that follows a newline.
    ///
    /// A trailing newline is held back until the next write so the
    /// following line is indented at the depth current then.
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

    fn heading(&mut self, cx: &mut PublishContext<'_>, heading: &str, tocid: Option<&str>) -> Result<()> {
        let heading = encode_text(heading);
        self.heading_level += 1;
        let n = self.heading_level;
        if tocid.is_some() && n <= 2 {
            self.write(
                cx,
                &format!(
                    "<table class=\"h{n}bar\"><tr><td><h{n} class=\"h{n}barheading\">{heading}</h{n}></td>\
                     <td class=\"h{n}bartopcell\"><a href=\"#toc\" class=\"h{n}bartoplink\">Top</a></td></tr></table>\n"
                ),
            )
        } else {
            self.write(cx, &format!("<h{n} class=\"heading{n}\">{heading}</h{n}>\n"))
        }
    }

    fn table_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        self.write(cx, "<table class=\"gentable\">\n")?;
        let headers = cx
            .prop("headers", At::HERE)
            .and_then(PropValue::as_list)
            .map(<[String]>::to_vec)
            .unwrap_or_default();
        if headers.is_empty() {
            return Ok(());
        }
        self.depth += 1;
        self.write(cx, "<tr class=\"genrow\">\n")?;
        self.depth += 1;
        for header in &headers {
            self.write(cx, &format!("<th class=\"genheader\">{}</th>\n", encode_text(header)))?;
        }
        self.depth -= 1;
        self.write(cx, "</tr>\n")?;
        self.depth -= 1;
        Ok(())
    }

    fn list_tag(cx: &PublishContext<'_>, at: At) -> (&'static str, &'static str) {
        match cx.prop_str("style", at) {
            Some("bullet") => ("<ul>\n", "</ul>\n"),
            Some("number") => ("<ol>\n", "</ol>\n"),
            _ => ("<div>\n", "</div>\n"),
        }
    }

    fn item_tag(cx: &PublishContext<'_>) -> (&'static str, &'static str) {
        match cx.prop_str("style", At::INHERIT) {
            Some("bullet" | "number") => ("<li>\n", "</li>\n"),
            _ => ("<div>\n", "</div>\n"),
        }
    }

    fn link_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let url = cx.prop("url", At::HERE).map(ToString::to_string).unwrap_or_default();
        self.write(cx, &format!("<a href=\"{}\">", encode_double_quoted_attribute(&url)))?;
        if !cx.has_cache("text", At::HERE) {
            cx.set_cache("text", url, At::HERE);
        }
        cx.set_cache("newLine", false, At::HERE);
        Ok(())
    }

    fn toc_begin(&mut self, cx: &mut PublishContext<'_>, level: u32) -> Result<()> {
        if level == 0 {
            return self.write(cx, "<div id=\"toc\" class=\"tocblock\">\n");
        }
        let heading = cx
            .prop("tocheading", At::HERE)
            .map(ToString::to_string)
            .unwrap_or_default();
        let heading = encode_text(&heading);
        let entry = match cx.prop("toclink", At::HERE) {
            Some(link) => format!(
                "<a href=\"#{}\">{heading}</a>",
                encode_double_quoted_attribute(&link.to_string())
            ),
            None => heading.into_owned(),
        };
        self.write(cx, &format!("<div class=\"toc{level}\">{entry}</div>\n"))
    }

    /// Write the node's cached text
    fn text(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let Some(text) = cx.cache("text", At::HERE).map(ToString::to_string) else {
            return Ok(());
        };
        let text = encode_text(&text);
        if self.plaintext > 0 {
            cx.write("\n<pre>")?;
            for line in format_plain(&text, "", WRAP_WIDTH) {
                cx.write("\n")?;
                cx.write(&line)?;
            }
            cx.write("</pre>\n")?;
        } else if cx.cache("newLine", At::HERE).map_or(true, PropValue::is_truthy) {
            let indent = "  ".repeat(self.depth);
            for line in word_wrap(&text, &indent, "", WRAP_WIDTH) {
                cx.write("\n")?;
                cx.write(&line)?;
            }
        } else {
            cx.write(&text)?;
        }
        cx.flush()
    }
}

impl Default for HtmlPublisher {
    fn default() -> Self {
        Self::new()
    }
}

/// Toc forms carry their level; anything else starting with `toc` is a
/// malformed tree
fn check_form(form: &Form) {
    if let Form::Other(name) = form {
        assert!(!name.starts_with("toc"), "malformed table of contents form {name:?}");
    }
}

impl Publisher for HtmlPublisher {
    fn format(&self) -> OutputFormat {
        OutputFormat::Html
    }

    fn doc_begin(&mut self, cx: &mut PublishContext<'_>, title: &str, style: StyleVariant) -> Result<()> {
        let head = format!(
            "{HEAD_START}<title>{}</title>\n\n\
             <style type=\"text/css\">{}</style>\n\n\
             <style type=\"text/css\" media=\"print\">{CSS_PRINT}</style>\n\n\
             </head>\n\n<body>\n\n",
            encode_text(title),
            stylesheet(style),
        );
        self.write(cx, &head)
    }

    fn doc_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        self.write(cx, "\n</body>\n</html>")?;
        cx.write("\n")
    }

    fn node_begin(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let form = cx.form(0);
        check_form(&form);
        let heading = cx
            .prop("heading", At::HERE)
            .filter(|h| h.is_truthy())
            .map(ToString::to_string);
        if heading.is_some() && self.toc_pending {
            self.toc_pending = false;
            cx.feed_toc(self)?;
        }
        let tocid = cx
            .prop("tocid", At::HERE)
            .filter(|t| t.is_truthy())
            .map(ToString::to_string);

        if let Some(tocid) = &tocid {
            self.write(cx, &format!("<span id=\"{}\">\n", encode_double_quoted_attribute(tocid)))?;
        }
        if let Some(heading) = &heading {
            self.heading(cx, heading, tocid.as_deref())?;
        }
        cx.cache_prop("text", At::HERE);
        cx.set_cache("newLine", true, At::HERE);

        match form {
            Form::Table => self.table_begin(cx)?,
            Form::List => {
                let (open, _) = Self::list_tag(cx, At::HERE);
                self.write(cx, open)?;
            }
            Form::Item => {
                let (open, _) = Self::item_tag(cx);
                self.write(cx, open)?;
            }
            Form::Row => self.write(cx, "<tr>\n")?,
            Form::Cell => self.write(cx, "<td class=\"gencell\">\n")?,
            Form::Plaintext => self.plaintext += 1,
            Form::Link => self.link_begin(cx)?,
            Form::Block => self.write(cx, "<div class=\"block\">\n")?,
            Form::Toc(level) => self.toc_begin(cx, level)?,
            _ => {}
        }

        self.text(cx)?;
        self.depth += 1;
        Ok(())
    }

    fn node_end(&mut self, cx: &mut PublishContext<'_>) -> Result<()> {
        let form = cx.form(0);
        if cx.prop("heading", At::HERE).is_some_and(PropValue::is_truthy) {
            self.heading_level -= 1;
        }
        self.depth -= 1;

        match form {
            Form::Table => self.write(cx, "</table>\n")?,
            Form::List => {
                let (_, close) = Self::list_tag(cx, At::HERE);
                self.write(cx, close)?;
            }
            Form::Item => {
                let (_, close) = Self::item_tag(cx);
                self.write(cx, close)?;
            }
            Form::Row => self.write(cx, "</tr>\n")?,
            Form::Cell => self.write(cx, "</td>\n")?,
            Form::Plaintext => self.plaintext -= 1,
            Form::Link => self.write(cx, "</a>\n")?,
            Form::Block => self.write(cx, "</div>\n")?,
            Form::Toc(0) => self.write(cx, "</div>\n")?,
            _ => {}
        }

        if cx.has_prop("tocid", At::HERE) {
            self.write(cx, "</span>\n")?;
        }
        Ok(())
    }
}
