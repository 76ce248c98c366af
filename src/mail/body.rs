//! Text helpers for mail bodies.

/// Marker appended to abbreviated text.
pub const ABBREVIATION_MARKER: &str = "...";

/// Abbreviate `text` to at most `max_chars` characters.
///
/// Text that already fits is returned unchanged. Longer text is cut to
/// `max_chars - 3` characters followed by `...`, so the result is exactly
/// `max_chars` long. Lengths count chars, never splitting one.
pub fn abbreviate(text: &str, max_chars: usize) -> String {
    let marker_len = ABBREVIATION_MARKER.chars().count();
    if text.chars().nth(max_chars).is_none() {
        return text.to_string();
    }
    if max_chars <= marker_len {
        return ABBREVIATION_MARKER.chars().take(max_chars).collect();
    }
    let cut = text
        .char_indices()
        .nth(max_chars - marker_len)
        .map_or(text.len(), |(idx, _)| idx);
    let mut out = String::with_capacity(cut + ABBREVIATION_MARKER.len());
    out.push_str(&text[..cut]);
    out.push_str(ABBREVIATION_MARKER);
    out
}

/// Strip HTML tags from content (basic).
pub fn strip_html(html: &str) -> String {
    let mut result = String::new();
    let mut in_tag = false;
    for ch in html.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(ch),
            _ => {}
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}
