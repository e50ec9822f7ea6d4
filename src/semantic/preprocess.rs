//! Content preprocessing for embedding and rating input.
//!
//! 1. Trim whitespace
//! 2. Empty body means nothing to embed, whatever the title
//! 3. Optionally prefix the title
//! 4. Truncate to max length with ellipsis

/// Ellipsis suffix when content is truncated
const TRUNCATION_SUFFIX: &str = "...";

/// Build the text sent to the embedding model for one note.
///
/// Returns an empty string when the body has no content, so the caller
/// can skip the note instead of embedding a bare title.
pub fn embedding_input(title: &str, body: &str, include_title: bool, max_chars: usize) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }

    let title = title.trim();
    let content = if include_title && !title.is_empty() {
        format!("{}\n\n{}", title, body)
    } else {
        body.to_string()
    };

    truncate_content(&content, max_chars)
}

/// Truncate content to `max_chars` characters, adding ellipsis if truncated.
pub fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let keep = max_chars.saturating_sub(TRUNCATION_SUFFIX.len());
    let truncated: String = content.chars().take(keep).collect();

    format!("{}{}", truncated, TRUNCATION_SUFFIX)
}
