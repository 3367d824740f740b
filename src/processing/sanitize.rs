//! Helpers for normalizing extracted text and request values.

/// Normalize whitespace and trim; optionally drop non-ASCII characters.
///
/// Runs containing two or more line breaks become a paragraph break (`"\n\n"`); every other
/// whitespace run becomes a single space.
pub fn clean_text(text: &str, strip_non_ascii: bool) -> String {
    let mut cleaned = String::with_capacity(text.len());
    let mut pending: Option<usize> = None;

    for ch in text.chars() {
        if ch.is_whitespace() {
            let breaks = pending.get_or_insert(0);
            if ch == '\n' {
                *breaks += 1;
            }
            continue;
        }
        if strip_non_ascii && !ch.is_ascii() {
            continue;
        }
        if let Some(breaks) = pending.take() {
            if !cleaned.is_empty() {
                cleaned.push_str(if breaks >= 2 { "\n\n" } else { " " });
            }
        }
        cleaned.push(ch);
    }

    cleaned
}

/// Sanitize arbitrary string input by trimming whitespace and dropping empties.
pub(crate) fn sanitize_string(value: Option<String>) -> Option<String> {
    value.and_then(|input| {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_whitespace_and_trims() {
        assert_eq!(
            clean_text("  Hello,\n  world\t again  ", false),
            "Hello, world again"
        );
    }

    #[test]
    fn keeps_paragraph_breaks() {
        assert_eq!(
            clean_text("First line\nwraps here.\n \n\n\nNext  paragraph.\r\n\r\nLast.\n", false),
            "First line wraps here.\n\nNext paragraph.\n\nLast."
        );
    }

    #[test]
    fn strips_non_ascii_when_requested() {
        assert_eq!(clean_text("naïve café ☕ menu", true), "nave caf menu");
        assert_eq!(clean_text("naïve café", false), "naïve café");
    }

    #[test]
    fn whitespace_only_input_becomes_empty() {
        assert!(clean_text(" \n\t ", false).is_empty());
    }

    #[test]
    fn sanitize_string_drops_blank_values() {
        assert_eq!(sanitize_string(Some("  ".into())), None);
        assert_eq!(sanitize_string(Some(" x ".into())).as_deref(), Some("x"));
        assert_eq!(sanitize_string(None), None);
    }
}
