//! Markup stripping for feed-supplied HTML fragments.

const RENDER_WIDTH: usize = 400;

/// Strip all markup from an HTML fragment, returning plain text.
///
/// Total: a fragment the HTML parser rejects comes back unmodified rather
/// than failing. Whitespace is collapsed to single spaces.
pub fn strip_markup(html: &str) -> String {
    let text = html2text::from_read(html.as_bytes(), RENDER_WIDTH)
        .unwrap_or_else(|_| html.to_string());
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags() {
        let stripped = strip_markup("<p>The <b>new</b> abstract, with a <a href=\"x\">link</a>.</p>");
        assert!(!stripped.contains('<'));
        assert!(stripped.contains("new"));
        assert!(stripped.contains("abstract"));
    }

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(strip_markup("Just some text."), "Just some text.");
    }

    #[test]
    fn collapses_whitespace() {
        assert_eq!(strip_markup("one\n  two\t three"), "one two three");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(strip_markup(""), "");
    }
}
