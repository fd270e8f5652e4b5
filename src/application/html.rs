//! HTML cleaning for newsletter bodies.
//!
//! Turns an email's HTML into a preview line and a plain-text body.

use scraper::{Html, Node, Selector};

/// Preview and plain-text body extracted from HTML.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanedHtml {
    /// Content of the `x-preheader` meta tag.
    pub preview: String,
    /// Visible text, one trimmed text node per paragraph.
    pub body: String,
}

/// Extract the preheader and the visible text of an HTML document.
///
/// Text inside `<script>` and `<style>` is dropped; remaining text nodes are
/// trimmed, empty ones skipped, and the rest joined by blank lines.
#[must_use]
pub fn clean_html(html: &str) -> CleanedHtml {
    if html.trim().is_empty() {
        return CleanedHtml::default();
    }

    let document = Html::parse_document(html);

    let preview = Selector::parse(r#"meta[name="x-preheader"]"#)
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .find_map(|meta| meta.value().attr("content"))
                .map(|content| content.trim().to_string())
        })
        .unwrap_or_default();

    let mut chunks: Vec<&str> = Vec::new();
    for node in document.tree.root().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            matches!(ancestor.value(), Node::Element(el) if matches!(el.name(), "script" | "style"))
        });
        if hidden {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed);
        }
    }

    CleanedHtml {
        preview,
        body: chunks.join("\n\n"),
    }
}
