//! Math span extraction.
//!
//! Supports:
//! - Block math: `$$...$$`, `\[...\]`
//! - Inline math: `$...$` (no newline, escaped `\$` ignored), `\(...\)`
//!
//! Extraction runs on already-escaped text, before any other markdown
//! transformation, and swaps every span for a placeholder token so the
//! list/blockquote/paragraph logic can never split or rewrite math source.
//! The tokens contain no markdown-significant characters. Restoration
//! happens at the end of the pipeline, when the block parser maps each
//! token back to a typed math node.

use std::sync::LazyLock;

use regex::{Captures, Regex};

static BLOCK_DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\$([\s\S]+?)\$\$").unwrap());
static BLOCK_BRACKET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\[([\s\S]+?)\\\]").unwrap());
static INLINE_DOLLAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(^|[^\\])\$([^\n$]+?)\$").unwrap());
static INLINE_PAREN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\\(([\s\S]+?)\\\)").unwrap());

/// Token pattern the block parser scans for when restoring math nodes.
pub static MATH_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@MATH_(BLOCK|INLINE)_(\d+)@@").unwrap());

/// One extracted span: the math source and the delimited text it replaced.
#[derive(Debug, Clone, PartialEq)]
struct Span {
    tex: String,
    raw: String,
}

/// Extracted math spans, indexed by the placeholder ids embedded in the text.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct MathStore {
    blocks: Vec<Span>,
    inlines: Vec<Span>,
}

impl MathStore {
    pub fn block(&self, id: usize) -> Option<&str> {
        self.blocks.get(id).map(|s| s.tex.as_str())
    }

    pub fn inline(&self, id: usize) -> Option<&str> {
        self.inlines.get(id).map(|s| s.tex.as_str())
    }

    /// The original delimited text of a block span, for contexts such as
    /// code blocks where the placeholder must be undone verbatim.
    pub fn block_raw(&self, id: usize) -> Option<&str> {
        self.blocks.get(id).map(|s| s.raw.as_str())
    }

    pub fn inline_raw(&self, id: usize) -> Option<&str> {
        self.inlines.get(id).map(|s| s.raw.as_str())
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn inline_count(&self) -> usize {
        self.inlines.len()
    }
}

pub fn block_token(id: usize) -> String {
    format!("@@MATH_BLOCK_{id}@@")
}

pub fn inline_token(id: usize) -> String {
    format!("@@MATH_INLINE_{id}@@")
}

/// Replace every math span in `text` with a placeholder token.
///
/// `text` must already be HTML-escaped. Unclosed delimiters never match and
/// are left as literal text. Block forms are matched before inline forms so
/// `$$...$$` is never misread as two inline spans.
pub fn extract_math(text: &str) -> (String, MathStore) {
    let mut store = MathStore::default();

    let out = BLOCK_DOLLAR_RE.replace_all(text, |caps: &Captures| {
        store.blocks.push(Span {
            tex: caps[1].to_string(),
            raw: caps[0].to_string(),
        });
        block_token(store.blocks.len() - 1)
    });
    let out = BLOCK_BRACKET_RE.replace_all(&out, |caps: &Captures| {
        store.blocks.push(Span {
            tex: caps[1].to_string(),
            raw: caps[0].to_string(),
        });
        block_token(store.blocks.len() - 1)
    });
    let out = INLINE_DOLLAR_RE.replace_all(&out, |caps: &Captures| {
        store.inlines.push(Span {
            tex: caps[2].to_string(),
            raw: format!("${}$", &caps[2]),
        });
        format!("{}{}", &caps[1], inline_token(store.inlines.len() - 1))
    });
    let out = INLINE_PAREN_RE.replace_all(&out, |caps: &Captures| {
        store.inlines.push(Span {
            tex: caps[1].to_string(),
            raw: caps[0].to_string(),
        });
        inline_token(store.inlines.len() - 1)
    });

    (out.into_owned(), store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_double_dollar() {
        let (text, store) = extract_math("before\n$$x^2 + y^2$$\nafter");
        assert_eq!(text, "before\n@@MATH_BLOCK_0@@\nafter");
        assert_eq!(store.block(0), Some("x^2 + y^2"));
    }

    #[test]
    fn test_block_bracket_form() {
        let (text, store) = extract_math(r"\[E = mc^2\]");
        assert_eq!(text, "@@MATH_BLOCK_0@@");
        assert_eq!(store.block(0), Some("E = mc^2"));
    }

    #[test]
    fn test_inline_single_dollar() {
        let (text, store) = extract_math("the value $x$ here");
        assert_eq!(text, "the value @@MATH_INLINE_0@@ here");
        assert_eq!(store.inline(0), Some("x"));
    }

    #[test]
    fn test_inline_at_start_of_text() {
        let (text, store) = extract_math("$a$ first");
        assert_eq!(text, "@@MATH_INLINE_0@@ first");
        assert_eq!(store.inline(0), Some("a"));
    }

    #[test]
    fn test_inline_paren_form() {
        let (text, store) = extract_math(r"see \(a + b\) there");
        assert_eq!(text, "see @@MATH_INLINE_0@@ there");
        assert_eq!(store.inline(0), Some("a + b"));
    }

    #[test]
    fn test_escaped_dollar_not_matched() {
        let (text, store) = extract_math(r"price \$5 each");
        assert_eq!(text, r"price \$5 each");
        assert_eq!(store.inline_count(), 0);
    }

    #[test]
    fn test_inline_does_not_span_newline() {
        let (text, store) = extract_math("a $x\ny$ b");
        assert_eq!(text, "a $x\ny$ b");
        assert_eq!(store.inline_count(), 0);
    }

    #[test]
    fn test_unclosed_block_left_literal() {
        let (text, store) = extract_math("$$unclosed forever");
        // A lone `$$` cannot pair up, so nothing is extracted.
        assert_eq!(text, "$$unclosed forever");
        assert_eq!(store.block_count(), 0);
    }

    #[test]
    fn test_multiline_block_content() {
        let (text, store) = extract_math("$$\na = b\nc = d\n$$");
        assert_eq!(text, "@@MATH_BLOCK_0@@");
        assert_eq!(store.block(0), Some("\na = b\nc = d\n"));
    }

    #[test]
    fn test_multiple_spans_keep_order() {
        let (text, store) = extract_math("$a$ then $$B$$ then $c$");
        assert_eq!(
            text,
            "@@MATH_INLINE_0@@ then @@MATH_BLOCK_0@@ then @@MATH_INLINE_1@@"
        );
        assert_eq!(store.inline(0), Some("a"));
        assert_eq!(store.block(0), Some("B"));
        assert_eq!(store.inline(1), Some("c"));
    }

    #[test]
    fn test_escaped_text_source_preserved() {
        // Extraction runs after HTML escaping, so entities stay intact.
        let (_, store) = extract_math("$f&#039;(x) &lt; 0$");
        assert_eq!(store.inline(0), Some("f&#039;(x) &lt; 0"));
    }

    #[test]
    fn test_raw_spans_keep_delimiters() {
        let (_, store) = extract_math(r"$$B$$ and $i$ and \(p\) and \[br\]");
        assert_eq!(store.block_raw(0), Some("$$B$$"));
        assert_eq!(store.block_raw(1), Some(r"\[br\]"));
        assert_eq!(store.inline_raw(0), Some("$i$"));
        assert_eq!(store.inline_raw(1), Some(r"\(p\)"));
    }

    #[test]
    fn test_token_regex_matches_both_kinds() {
        assert!(MATH_TOKEN_RE.is_match(&block_token(3)));
        assert!(MATH_TOKEN_RE.is_match(&inline_token(12)));
        assert!(!MATH_TOKEN_RE.is_match("@@MATH_BLOCK_x@@"));
    }
}
