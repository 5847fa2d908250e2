//! HTML escaping for untrusted message text.
//!
//! Escaping runs exactly once, on the raw text, before any markup is
//! injected by the markdown pipeline. Unescaping exists only so math source
//! can be handed to the typesetting engine in its original form.

/// Escape the five HTML-sensitive characters.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(c),
        }
    }
    out
}

/// Reverse [`escape_html`]. Accepts both `&#039;` and the shorter `&#39;`
/// apostrophe form. `&amp;` is decoded last so double-escaped input is not
/// collapsed further than one level.
pub fn unescape_html(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escapes_all_sensitive_characters() {
        assert_eq!(
            escape_html(r#"<b>"a" & 'b'</b>"#),
            "&lt;b&gt;&quot;a&quot; &amp; &#039;b&#039;&lt;/b&gt;"
        );
    }

    #[test]
    fn test_plain_text_unchanged() {
        assert_eq!(escape_html("hello world"), "hello world");
    }

    #[test]
    fn test_unescape_round_trip() {
        let raw = r#"f'(x) < g(x) && "q" > 'p'"#;
        assert_eq!(unescape_html(&escape_html(raw)), raw);
    }

    #[test]
    fn test_unescape_short_apostrophe_entity() {
        assert_eq!(unescape_html("it&#39;s"), "it's");
    }

    #[test]
    fn test_script_tag_neutralized() {
        let escaped = escape_html("<script>alert(1)</script>");
        assert!(!escaped.contains('<'));
        assert!(!escaped.contains('>'));
    }

    #[test]
    fn test_double_escape_decodes_one_level() {
        // Escaping twice then unescaping once must return the singly
        // escaped form, not the raw text.
        let once = escape_html("<a>");
        let twice = escape_html(&once);
        assert_eq!(unescape_html(&twice), once);
    }
}
