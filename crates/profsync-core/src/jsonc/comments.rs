use super::{scan, ItemKind};

/// Remove every comment from a JSONC document
///
/// A line left holding only whitespace is dropped together with its line
/// break; a trailing comment takes its leading blanks with it.
#[must_use]
pub fn strip_comments(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut spans: Vec<(usize, usize)> = Vec::new();

    for item in scan(text) {
        if !item.kind.is_comment() {
            continue;
        }

        let mut from = item.start;
        while from > 0 && matches!(bytes[from - 1], b' ' | b'\t') {
            from -= 1;
        }
        let mut until = item.end;
        while until < bytes.len() && matches!(bytes[until], b' ' | b'\t') {
            until += 1;
        }

        let own_line = from == 0 || bytes[from - 1] == b'\n';
        let at_line_end = until == bytes.len() || matches!(bytes[until], b'\r' | b'\n');

        if own_line && at_line_end {
            if bytes.get(until) == Some(&b'\r') {
                until += 1;
            }
            if bytes.get(until) == Some(&b'\n') {
                until += 1;
            }
            spans.push((from, until));
        } else if item.kind == ItemKind::LineComment {
            spans.push((from, item.end));
        } else {
            spans.push((item.start, item.end));
        }
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (from, until) in spans {
        let from = from.max(cursor);
        out.push_str(&text[cursor..from]);
        cursor = until.max(cursor);
    }
    out.push_str(&text[cursor..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_full_line_comments() {
        let text = "{\n  // editor metadata\n  \"a\": 1\n}\n";
        assert_eq!(strip_comments(text), "{\n  \"a\": 1\n}\n");
    }

    #[test]
    fn test_strip_trailing_comment() {
        let text = "{\n  \"a\": 1, // note\n  \"b\": 2\n}";
        assert_eq!(strip_comments(text), "{\n  \"a\": 1,\n  \"b\": 2\n}");
    }

    #[test]
    fn test_strip_inline_block_comment() {
        let text = "{\"a\": /* x */ 1}";
        assert_eq!(strip_comments(text), "{\"a\":  1}");
    }

    #[test]
    fn test_strip_keeps_urls_in_strings() {
        let text = "{\"url\": \"http://example.com\"}";
        assert_eq!(strip_comments(text), text);
    }

    #[test]
    fn test_strip_multiline_block() {
        let text = "{\r\n  /* one\r\n     two */\r\n  \"a\": 1\r\n}";
        assert_eq!(strip_comments(text), "{\r\n  \"a\": 1\r\n}");
    }
}
