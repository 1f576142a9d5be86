/// Marker prepended to excerpts that were cut.
pub const TRUNCATION_MARKER: &str = "...";

/// Keep at most `max_bytes` of `text`, preferring its tail.
///
/// Encoders print the actual error last, so the tail is the useful part. The cut always lands on
/// a char boundary; the marker counts towards the bound.
pub fn excerpt_tail(text: &str, max_bytes: usize) -> String {
    let text = text.trim();
    if text.len() <= max_bytes {
        return text.to_string();
    }
    if max_bytes <= TRUNCATION_MARKER.len() {
        return TRUNCATION_MARKER[..max_bytes].to_string();
    }

    let budget = max_bytes - TRUNCATION_MARKER.len();
    let mut start = text.len() - budget;
    while !text.is_char_boundary(start) {
        start += 1;
    }

    let mut out = String::with_capacity(max_bytes);
    out.push_str(TRUNCATION_MARKER);
    out.push_str(&text[start..]);
    out
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/diag.rs"]
mod tests;
