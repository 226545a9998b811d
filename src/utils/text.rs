pub fn truncate_utf8_prefix(value: &str, max_bytes: usize) -> String {
    if value.len() <= max_bytes {
        return value.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !value.is_char_boundary(end) {
        end -= 1;
    }
    value[..end].to_string()
}

/// Single-line excerpt for log meta: newlines become ` | `, long text ends in `...`.
pub fn preview(value: &str, max_bytes: usize) -> String {
    let flattened = value.trim().replace('\n', " | ");
    if flattened.is_empty() {
        return "(none)".to_string();
    }
    if flattened.len() <= max_bytes {
        return flattened;
    }
    format!("{}...", truncate_utf8_prefix(&flattened, max_bytes.saturating_sub(3)))
}

/// Escapes text for XML character data and attribute values.
pub fn escape_xml(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}
