//! Markdown subset renderer.
//!
//! Turns raw assistant text into a typed block tree in a fixed order:
//! escape HTML, pull out math spans, pull out fenced code, then assemble
//! blocks chunk by chunk and parse inline runs last. Math and code are
//! tokenized up front so no later stage can rewrite their contents.
//!
//! The grammar is deliberately small: headings, fenced code, unordered and
//! ordered lists, blockquotes, pipe tables, inline code, bold, italic,
//! absolute http(s) links, and the math forms handled by [`extract_math`].
//! Anything else renders as literal text. Rendering is pure and
//! deterministic.

use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::render::math::{self, MathStore, extract_math};
use crate::render::node::{Block, Inline, MathNode};
use crate::render::sanitize::escape_html;

static FENCE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"```(\w*)\n([\s\S]*?)```").unwrap());
static CODE_TOKEN_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@@CODE_(\d+)@@\s*$").unwrap());
static BLOCK_MATH_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@@MATH_BLOCK_(\d+)@@\s*$").unwrap());

static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
static UL_ITEM_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[\t ]*[-*]\s+(.*)$").unwrap());
static OL_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\t ]*\d+\.\s+(.*)$").unwrap());
// Text is escaped before block assembly, so the quote marker is the entity.
static QUOTE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^&gt;\s?(.*)$").unwrap());
static TABLE_DELIM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*\|?[\s:\-|]+\|?\s*$").unwrap());

static CODE_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"`([^`]+)`").unwrap());
static LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\((https?://[^)\s]+)\)").unwrap());
static BOLD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*\*([^*]+)\*\*").unwrap());
static ITALIC_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\*([^*]+)\*").unwrap());

/// Render raw assistant text into a block tree.
pub fn render(raw: &str) -> Vec<Block> {
    let escaped = escape_html(raw);
    let (text, math_store) = extract_math(&escaped);
    let (text, code_store) = extract_fences(&text);

    let mut blocks = Vec::new();
    for chunk in split_chunks(&text) {
        assemble_chunk(&chunk, &math_store, &code_store, &mut blocks);
    }
    blocks
}

/// [`render`] followed by the reference HTML walker.
pub fn render_html(raw: &str) -> String {
    crate::render::node::to_html(&render(raw))
}

struct CodeStore {
    blocks: Vec<(Option<String>, String)>,
}

/// Replace fenced code blocks with `@@CODE_n@@` tokens. One trailing
/// newline before the closing fence is dropped from the captured body.
fn extract_fences(text: &str) -> (String, CodeStore) {
    let mut store = CodeStore { blocks: Vec::new() };
    let out = FENCE_RE.replace_all(text, |caps: &Captures| {
        let language = match &caps[1] {
            "" => None,
            lang => Some(lang.to_string()),
        };
        let code = caps[2].strip_suffix('\n').unwrap_or(&caps[2]).to_string();
        store.blocks.push((language, code));
        format!("@@CODE_{}@@", store.blocks.len() - 1)
    });
    (out.into_owned(), store)
}

/// Split on blank lines into paragraph-level chunks of lines.
fn split_chunks(text: &str) -> Vec<Vec<String>> {
    let mut chunks = Vec::new();
    let mut current: Vec<String> = Vec::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(line.to_string());
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn assemble_chunk(
    lines: &[String],
    math_store: &MathStore,
    code_store: &CodeStore,
    blocks: &mut Vec<Block>,
) {
    let mut i = 0;
    while i < lines.len() {
        let line = &lines[i];

        if let Some(caps) = CODE_TOKEN_LINE_RE.captures(line) {
            if let Some((language, code)) = caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|id| code_store.blocks.get(id))
            {
                blocks.push(Block::CodeBlock {
                    language: language.clone(),
                    // Math runs first over the whole text, so a fence can
                    // contain placeholders; put the literal spans back.
                    code: restore_math_tokens(code, math_store),
                });
            }
            i += 1;
            continue;
        }

        if let Some(caps) = BLOCK_MATH_LINE_RE.captures(line) {
            if let Some(tex) = caps[1]
                .parse::<usize>()
                .ok()
                .and_then(|id| math_store.block(id))
            {
                blocks.push(Block::MathBlock(MathNode::new(tex, true)));
            }
            i += 1;
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            blocks.push(Block::Heading {
                level: caps[1].len() as u8,
                content: parse_inlines(&caps[2], math_store),
            });
            i += 1;
            continue;
        }

        // Tables need a header row followed by a delimiter row.
        if line.trim_start().starts_with('|')
            && i + 1 < lines.len()
            && is_table_delimiter(&lines[i + 1])
        {
            let headers: Vec<Vec<Inline>> = split_row(line)
                .iter()
                .map(|cell| parse_inlines(cell, math_store))
                .collect();
            let width = headers.len();
            let mut rows = Vec::new();
            i += 2;
            while i < lines.len() && lines[i].trim_start().starts_with('|') {
                let mut cells = split_row(&lines[i]);
                cells.resize(width, String::new());
                rows.push(
                    cells
                        .iter()
                        .map(|cell| parse_inlines(cell, math_store))
                        .collect(),
                );
                i += 1;
            }
            blocks.push(Block::Table { headers, rows });
            continue;
        }

        if UL_ITEM_RE.is_match(line) {
            let mut items = Vec::new();
            while i < lines.len() {
                let Some(caps) = UL_ITEM_RE.captures(&lines[i]) else { break };
                items.push(parse_inlines(&caps[1], math_store));
                i += 1;
            }
            blocks.push(Block::UnorderedList(items));
            continue;
        }

        if OL_ITEM_RE.is_match(line) {
            let mut items = Vec::new();
            while i < lines.len() {
                let Some(caps) = OL_ITEM_RE.captures(&lines[i]) else { break };
                items.push(parse_inlines(&caps[1], math_store));
                i += 1;
            }
            blocks.push(Block::OrderedList(items));
            continue;
        }

        if QUOTE_RE.is_match(line) {
            let mut content = Vec::new();
            while i < lines.len() {
                let Some(caps) = QUOTE_RE.captures(&lines[i]) else { break };
                if !content.is_empty() {
                    content.push(Inline::LineBreak);
                }
                content.extend(parse_inlines(&caps[1], math_store));
                i += 1;
            }
            blocks.push(Block::Blockquote(content));
            continue;
        }

        // Plain lines accumulate into a paragraph until the next structural
        // line or the end of the chunk.
        let starts_table = |j: usize| {
            lines[j].trim_start().starts_with('|')
                && j + 1 < lines.len()
                && is_table_delimiter(&lines[j + 1])
        };
        let mut content = Vec::new();
        while i < lines.len() && !is_structural(&lines[i]) && !starts_table(i) {
            if !content.is_empty() {
                content.push(Inline::LineBreak);
            }
            content.extend(parse_inlines(&lines[i], math_store));
            i += 1;
        }
        blocks.push(Block::Paragraph(content));
    }
}

fn is_structural(line: &str) -> bool {
    CODE_TOKEN_LINE_RE.is_match(line)
        || BLOCK_MATH_LINE_RE.is_match(line)
        || HEADING_RE.is_match(line)
        || UL_ITEM_RE.is_match(line)
        || OL_ITEM_RE.is_match(line)
        || QUOTE_RE.is_match(line)
}

fn is_table_delimiter(line: &str) -> bool {
    line.contains('-') && TABLE_DELIM_RE.is_match(line)
}

/// Undo math placeholders, restoring the original delimited spans.
fn restore_math_tokens(text: &str, store: &MathStore) -> String {
    math::MATH_TOKEN_RE
        .replace_all(text, |caps: &Captures| {
            let id: usize = caps[2].parse().unwrap_or(usize::MAX);
            let raw = if &caps[1] == "BLOCK" {
                store.block_raw(id)
            } else {
                store.inline_raw(id)
            };
            raw.map(str::to_string)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// Split a `| a | b |` row into trimmed cell strings. Leading and trailing
/// empty cells from the outer pipes are dropped.
fn split_row(line: &str) -> Vec<String> {
    let trimmed = line.trim();
    let trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    trimmed.split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Parse an inline run. Math tokens bind tightest, then code spans, then
/// bold, then italic, then links.
fn parse_inlines(text: &str, store: &MathStore) -> Vec<Inline> {
    let mut out = Vec::new();
    let mut last = 0;
    for caps in math::MATH_TOKEN_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        parse_code(&text[last..m.start()], &mut out);
        let display = &caps[1] == "BLOCK";
        let id: usize = caps[2].parse().unwrap_or(usize::MAX);
        let tex = if display { store.block(id) } else { store.inline(id) };
        match tex {
            Some(tex) => out.push(Inline::Math(MathNode::new(tex, display))),
            None => out.push(Inline::Text(m.as_str().to_string())),
        }
        last = m.end();
    }
    parse_code(&text[last..], &mut out);
    out
}

fn parse_code(text: &str, out: &mut Vec<Inline>) {
    let mut last = 0;
    for caps in CODE_SPAN_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        parse_bold(&text[last..m.start()], out);
        out.push(Inline::Code(caps[1].to_string()));
        last = m.end();
    }
    parse_bold(&text[last..], out);
}

fn parse_bold(text: &str, out: &mut Vec<Inline>) {
    let mut last = 0;
    for caps in BOLD_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        parse_italic(&text[last..m.start()], out);
        let mut inner = Vec::new();
        parse_italic(&caps[1], &mut inner);
        out.push(Inline::Bold(inner));
        last = m.end();
    }
    parse_italic(&text[last..], out);
}

fn parse_italic(text: &str, out: &mut Vec<Inline>) {
    let mut last = 0;
    for caps in ITALIC_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        parse_links(&text[last..m.start()], out);
        let mut inner = Vec::new();
        parse_links(&caps[1], &mut inner);
        out.push(Inline::Italic(inner));
        last = m.end();
    }
    parse_links(&text[last..], out);
}

fn parse_links(text: &str, out: &mut Vec<Inline>) {
    let mut last = 0;
    for caps in LINK_RE.captures_iter(text) {
        let m = caps.get(0).unwrap();
        push_text(&text[last..m.start()], out);
        out.push(Inline::Link {
            text: caps[1].to_string(),
            href: caps[2].to_string(),
        });
        last = m.end();
    }
    push_text(&text[last..], out);
}

fn push_text(text: &str, out: &mut Vec<Inline>) {
    if !text.is_empty() {
        out.push(Inline::Text(text.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> Inline {
        Inline::Text(s.to_string())
    }

    #[test]
    fn test_plain_paragraph() {
        let blocks = render("hello world");
        assert_eq!(blocks, vec![Block::Paragraph(vec![text("hello world")])]);
    }

    #[test]
    fn test_blank_line_splits_paragraphs() {
        let blocks = render("one\n\ntwo");
        assert_eq!(
            blocks,
            vec![
                Block::Paragraph(vec![text("one")]),
                Block::Paragraph(vec![text("two")]),
            ]
        );
    }

    #[test]
    fn test_single_newline_is_line_break() {
        let blocks = render("one\ntwo");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("one"),
                Inline::LineBreak,
                text("two"),
            ])]
        );
    }

    #[test]
    fn test_heading_levels() {
        let blocks = render("# Title\n\n### Sub");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, content: vec![text("Title")] },
                Block::Heading { level: 3, content: vec![text("Sub")] },
            ]
        );
    }

    #[test]
    fn test_seven_hashes_not_a_heading() {
        let blocks = render("####### too deep");
        assert_eq!(blocks, vec![Block::Paragraph(vec![text("####### too deep")])]);
    }

    #[test]
    fn test_fenced_code_verbatim() {
        let blocks = render("```rust\nlet x = 1;\nlet y = 2;\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: Some("rust".into()),
                code: "let x = 1;\nlet y = 2;".into(),
            }]
        );
    }

    #[test]
    fn test_fence_without_language() {
        let blocks = render("```\nplain\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock { language: None, code: "plain".into() }]
        );
    }

    #[test]
    fn test_code_block_content_not_reparsed() {
        // Markdown syntax inside a fence stays literal.
        let blocks = render("```\n**not bold** $x$ # not a heading\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: None,
                code: "**not bold** $x$ # not a heading".into(),
            }]
        );
    }

    #[test]
    fn test_block_math_in_fence_stays_literal() {
        let blocks = render("```\n$$E = mc^2$$ and \\(p\\)\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock {
                language: None,
                code: "$$E = mc^2$$ and \\(p\\)".into(),
            }]
        );
    }

    #[test]
    fn test_code_block_escapes_html() {
        let blocks = render("```\n<b>\n```");
        assert_eq!(
            blocks,
            vec![Block::CodeBlock { language: None, code: "&lt;b&gt;".into() }]
        );
    }

    #[test]
    fn test_unordered_list() {
        let blocks = render("- one\n- two\n* three");
        assert_eq!(
            blocks,
            vec![Block::UnorderedList(vec![
                vec![text("one")],
                vec![text("two")],
                vec![text("three")],
            ])]
        );
    }

    #[test]
    fn test_ordered_list() {
        let blocks = render("1. first\n2. second");
        assert_eq!(
            blocks,
            vec![Block::OrderedList(vec![
                vec![text("first")],
                vec![text("second")],
            ])]
        );
    }

    #[test]
    fn test_blockquote_lines_joined() {
        let blocks = render("> a\n> b");
        assert_eq!(
            blocks,
            vec![Block::Blockquote(vec![
                text("a"),
                Inline::LineBreak,
                text("b"),
            ])]
        );
    }

    #[test]
    fn test_inline_code_bold_italic() {
        let blocks = render("use `foo()` with **bold** and *italic*");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("use "),
                Inline::Code("foo()".into()),
                text(" with "),
                Inline::Bold(vec![text("bold")]),
                text(" and "),
                Inline::Italic(vec![text("italic")]),
            ])]
        );
    }

    #[test]
    fn test_bold_cannot_nest_italic() {
        // Bold content excludes asterisks, so the inner emphasis wins and
        // the outer double markers fall apart into literal stars.
        let blocks = render("**a *b* c**");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("*"),
                Inline::Italic(vec![text("a ")]),
                text("b"),
                Inline::Italic(vec![text(" c")]),
                text("*"),
            ])]
        );
    }

    #[test]
    fn test_bold_containing_link() {
        let blocks = render("**see [docs](https://example.org)**");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![Inline::Bold(vec![
                text("see "),
                Inline::Link {
                    text: "docs".into(),
                    href: "https://example.org".into(),
                },
            ])])]
        );
    }

    #[test]
    fn test_absolute_link() {
        let blocks = render("see [docs](https://example.org/a) here");
        assert_eq!(
            blocks,
            vec![Block::Paragraph(vec![
                text("see "),
                Inline::Link {
                    text: "docs".into(),
                    href: "https://example.org/a".into(),
                },
                text(" here"),
            ])]
        );
    }

    #[test]
    fn test_relative_link_stays_literal() {
        let blocks = render("[docs](/local/path)");
        assert_eq!(blocks, vec![Block::Paragraph(vec![text("[docs](/local/path)")])]);
    }

    #[test]
    fn test_inline_math_in_paragraph() {
        let blocks = render("the root is $x = 2$ exactly");
        let Block::Paragraph(content) = &blocks[0] else {
            panic!("expected paragraph");
        };
        assert_eq!(content[0], text("the root is "));
        let Inline::Math(node) = &content[1] else {
            panic!("expected math node");
        };
        assert!(!node.display);
        assert_eq!(node.source(), "x = 2");
        assert_eq!(content[2], text(" exactly"));
    }

    #[test]
    fn test_block_math_on_own_line() {
        let blocks = render("intro\n\n$$E = mc^2$$\n\noutro");
        let Block::MathBlock(node) = &blocks[1] else {
            panic!("expected math block, got {:?}", blocks[1]);
        };
        assert!(node.display);
        assert_eq!(node.source(), "E = mc^2");
    }

    #[test]
    fn test_math_survives_escaping() {
        let blocks = render("$f'(x) < 0$");
        let Block::Paragraph(content) = &blocks[0] else {
            panic!("expected paragraph");
        };
        let Inline::Math(node) = &content[0] else {
            panic!("expected math node");
        };
        assert_eq!(node.source(), "f'(x) < 0");
    }

    #[test]
    fn test_math_inside_list_item() {
        let blocks = render("- value $a+b$ here");
        let Block::UnorderedList(items) = &blocks[0] else {
            panic!("expected list");
        };
        assert!(matches!(items[0][1], Inline::Math(_)));
    }

    #[test]
    fn test_table_well_formed() {
        let blocks = render("| a | b |\n|---|---|\n| 1 | 2 |\n| 3 | 4 |");
        assert_eq!(
            blocks,
            vec![Block::Table {
                headers: vec![vec![text("a")], vec![text("b")]],
                rows: vec![
                    vec![vec![text("1")], vec![text("2")]],
                    vec![vec![text("3")], vec![text("4")]],
                ],
            }]
        );
    }

    #[test]
    fn test_table_ragged_rows_normalized() {
        // Short rows pad with empty cells, long rows truncate.
        let blocks = render("| a | b |\n|---|---|\n| 1 |\n| 2 | 3 | 4 |");
        let Block::Table { headers, rows } = &blocks[0] else {
            panic!("expected table");
        };
        assert_eq!(headers.len(), 2);
        assert_eq!(rows[0], vec![vec![text("1")], vec![]]);
        assert_eq!(rows[1], vec![vec![text("2")], vec![text("3")]]);
    }

    #[test]
    fn test_pipe_lines_without_delimiter_not_a_table() {
        let blocks = render("| just | text |");
        assert_eq!(blocks, vec![Block::Paragraph(vec![text("| just | text |")])]);
    }

    #[test]
    fn test_html_injection_neutralized() {
        let html = render_html("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn test_heading_then_paragraph_same_chunk() {
        let blocks = render("# Title\nbody line");
        assert_eq!(
            blocks,
            vec![
                Block::Heading { level: 1, content: vec![text("Title")] },
                Block::Paragraph(vec![text("body line")]),
            ]
        );
    }

    #[test]
    fn test_deterministic() {
        let input = "# H\n\n- a $x$\n- b\n\n```py\nprint(1)\n```\n\n| c |\n|---|\n| d |";
        assert_eq!(render_html(input), render_html(input));
        assert_eq!(render(input), render(input));
    }

    #[test]
    fn test_mixed_document_end_to_end() {
        let input = "### Forces\n\nNewton: $F = ma$\n\n> remember\n\n1. apply\n2. solve";
        let blocks = render(input);
        assert_eq!(blocks.len(), 4);
        assert!(matches!(blocks[0], Block::Heading { level: 3, .. }));
        assert!(matches!(blocks[1], Block::Paragraph(_)));
        assert!(matches!(blocks[2], Block::Blockquote(_)));
        assert!(matches!(blocks[3], Block::OrderedList(_)));
    }

    #[test]
    fn test_empty_input() {
        assert!(render("").is_empty());
        assert_eq!(render_html(""), "");
    }
}
