//! Report text helpers (HTML escaping, field value rendering).

use chrono::NaiveDateTime;

/// Escape Telegram HTML special characters as numeric character references.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '<' | '>' | '&' => {
                out.push_str("&#");
                out.push_str(&(c as u32).to_string());
                out.push(';');
            }
            _ => out.push(c),
        }
    }
    out
}

/// Render a stored timestamp for the report body.
pub fn format_timestamp(t: NaiveDateTime) -> String {
    t.format("%Y-%m-%d %H:%M").to_string()
}

/// Nullable timestamp column; absent values show as the literal `NULL`.
pub fn format_nullable_timestamp(t: Option<NaiveDateTime>) -> String {
    match t {
        Some(t) => format_timestamp(t),
        None => "NULL".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup_as_numeric_references() {
        assert_eq!(escape_html("<spam> & co"), "&#60;spam&#62; &#38; co");
        assert_eq!(escape_html("plain text"), "plain text");
    }

    #[test]
    fn timestamps_render_to_the_minute() {
        let t = NaiveDateTime::parse_from_str("2024-01-02 03:04:55", "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(format_timestamp(t), "2024-01-02 03:04");
        assert_eq!(format_nullable_timestamp(Some(t)), "2024-01-02 03:04");
        assert_eq!(format_nullable_timestamp(None), "NULL");
    }
}
