//! Typed render tree produced by the markdown pipeline.
//!
//! The tree is UI-agnostic: the DOM, a TUI, or any other toolkit is just a
//! walker over these nodes. [`to_html`] is the reference walker and emits
//! the same restricted markup the widget injects into its panel.

use crate::encoding::{decode_component, encode_component};
use crate::render::sanitize::unescape_html;

/// Inline content run inside a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Inline {
    /// HTML-escaped text run.
    Text(String),
    /// Single-backtick code span.
    Code(String),
    Bold(Vec<Inline>),
    Italic(Vec<Inline>),
    /// `[text](http(s)://url)` link.
    Link { text: String, href: String },
    /// Typesetting target restored from a math placeholder.
    Math(MathNode),
    LineBreak,
}

/// A deferred typesetting target.
#[derive(Debug, Clone, PartialEq)]
pub struct MathNode {
    /// Display (block) vs inline rendering mode.
    pub display: bool,
    /// Percent-encoded, HTML-escaped math source.
    pub tex_encoded: String,
    /// Engine output, filled in by the typesetter.
    pub rendered: Option<String>,
}

impl MathNode {
    pub fn new(escaped_tex: &str, display: bool) -> Self {
        Self {
            display,
            tex_encoded: encode_component(escaped_tex),
            rendered: None,
        }
    }

    /// Recover the original math source: percent-decode, then HTML-unescape.
    pub fn source(&self) -> String {
        unescape_html(&decode_component(&self.tex_encoded))
    }
}

/// Block-level node.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Vec<Inline>),
    Heading { level: u8, content: Vec<Inline> },
    /// Fenced code block; `language` is a display attribute only.
    CodeBlock { language: Option<String>, code: String },
    UnorderedList(Vec<Vec<Inline>>),
    OrderedList(Vec<Vec<Inline>>),
    Blockquote(Vec<Inline>),
    Table { headers: Vec<Vec<Inline>>, rows: Vec<Vec<Vec<Inline>>> },
    MathBlock(MathNode),
}

/// Render a block tree to the widget's restricted HTML fragment.
pub fn to_html(blocks: &[Block]) -> String {
    let mut out = String::new();
    for block in blocks {
        block_html(block, &mut out);
    }
    out
}

fn block_html(block: &Block, out: &mut String) {
    match block {
        Block::Paragraph(content) => {
            out.push_str("<p>");
            inlines_html(content, out);
            out.push_str("</p>");
        }
        Block::Heading { level, content } => {
            out.push_str(&format!("<h{level}>"));
            inlines_html(content, out);
            out.push_str(&format!("</h{level}>"));
        }
        Block::CodeBlock { language, code } => {
            out.push_str("<pre><button class=\"cbw-copybtn\" data-copy>Copy</button>");
            out.push_str(&format!(
                "<code class=\"cbw-code\" data-lang=\"{}\">{}</code></pre>",
                language.as_deref().unwrap_or(""),
                code
            ));
        }
        Block::UnorderedList(items) => {
            out.push_str("<ul>");
            for item in items {
                out.push_str("<li>");
                inlines_html(item, out);
                out.push_str("</li>");
            }
            out.push_str("</ul>");
        }
        Block::OrderedList(items) => {
            out.push_str("<ol>");
            for item in items {
                out.push_str("<li>");
                inlines_html(item, out);
                out.push_str("</li>");
            }
            out.push_str("</ol>");
        }
        Block::Blockquote(content) => {
            out.push_str("<blockquote>");
            inlines_html(content, out);
            out.push_str("</blockquote>");
        }
        Block::Table { headers, rows } => {
            out.push_str("<table class=\"cbw-table\"><thead><tr>");
            for cell in headers {
                out.push_str("<th>");
                inlines_html(cell, out);
                out.push_str("</th>");
            }
            out.push_str("</tr></thead><tbody>");
            for row in rows {
                out.push_str("<tr>");
                for cell in row {
                    out.push_str("<td>");
                    inlines_html(cell, out);
                    out.push_str("</td>");
                }
                out.push_str("</tr>");
            }
            out.push_str("</tbody></table>");
        }
        Block::MathBlock(node) => math_html(node, out),
    }
}

fn inlines_html(content: &[Inline], out: &mut String) {
    for inline in content {
        match inline {
            Inline::Text(text) => out.push_str(text),
            Inline::Code(code) => out.push_str(&format!("<code>{code}</code>")),
            Inline::Bold(children) => {
                out.push_str("<strong>");
                inlines_html(children, out);
                out.push_str("</strong>");
            }
            Inline::Italic(children) => {
                out.push_str("<em>");
                inlines_html(children, out);
                out.push_str("</em>");
            }
            Inline::Link { text, href } => {
                // New browsing context, no opener/referrer leakage.
                out.push_str(&format!(
                    "<a href=\"{href}\" target=\"_blank\" rel=\"noopener noreferrer\">{text}</a>"
                ));
            }
            Inline::Math(node) => math_html(node, out),
            Inline::LineBreak => out.push_str("<br/>"),
        }
    }
}

fn math_html(node: &MathNode, out: &mut String) {
    let display = if node.display { "1" } else { "0" };
    out.push_str(&format!(
        "<span class=\"cbw-math\" data-display=\"{display}\" data-tex=\"{}\">{}</span>",
        node.tex_encoded,
        node.rendered.as_deref().unwrap_or("")
    ));
}
