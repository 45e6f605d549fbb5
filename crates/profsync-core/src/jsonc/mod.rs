//! JSON-with-comments text surgery
//!
//! Settings and keybindings files are edited by byte offset over a single
//! token stream instead of being parsed into a tree and re-serialized, so
//! comments, ordering and whitespace survive untouched outside the edited
//! spans.

mod comments;
pub mod preprocess;
mod properties;

pub use comments::strip_comments;
pub use preprocess::{preprocess, TemplateVars};
pub use properties::{extract_properties, filter_json, insert_properties, remove_properties};

/// Syntactic element of a JSONC document, with its byte span
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Item {
    pub kind: ItemKind,
    pub start: usize,
    pub end: usize,
    /// Number of containers enclosing this item (the root object's braces are at 0)
    pub depth: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ItemKind {
    ObjectBegin,
    ObjectEnd,
    ArrayBegin,
    ArrayEnd,
    /// Object key, already unescaped
    Property(String),
    /// String, number, boolean or null in value position
    Value,
    Colon,
    Comma,
    LineComment,
    BlockComment,
}

impl ItemKind {
    pub(crate) fn is_comment(&self) -> bool {
        matches!(self, Self::LineComment | Self::BlockComment)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Container {
    Object { expect_key: bool },
    Array,
}

/// Walk the document once and classify every token
pub(crate) fn scan(text: &str) -> Vec<Item> {
    let bytes = text.as_bytes();
    let mut items = Vec::new();
    let mut stack: Vec<Container> = Vec::new();
    let mut pos = 0;

    while pos < bytes.len() {
        let b = bytes[pos];
        let start = pos;
        let depth = stack.len();

        match b {
            b' ' | b'\t' | b'\r' | b'\n' => {
                pos += 1;
            }
            b'{' => {
                pos += 1;
                mark_value_consumed(&mut stack);
                items.push(Item { kind: ItemKind::ObjectBegin, start, end: pos, depth });
                stack.push(Container::Object { expect_key: true });
            }
            b'[' => {
                pos += 1;
                mark_value_consumed(&mut stack);
                items.push(Item { kind: ItemKind::ArrayBegin, start, end: pos, depth });
                stack.push(Container::Array);
            }
            b'}' | b']' => {
                pos += 1;
                stack.pop();
                let kind = if b == b'}' { ItemKind::ObjectEnd } else { ItemKind::ArrayEnd };
                items.push(Item { kind, start, end: pos, depth: stack.len() });
            }
            b':' => {
                pos += 1;
                items.push(Item { kind: ItemKind::Colon, start, end: pos, depth });
            }
            b',' => {
                pos += 1;
                if let Some(Container::Object { expect_key }) = stack.last_mut() {
                    *expect_key = true;
                }
                items.push(Item { kind: ItemKind::Comma, start, end: pos, depth });
            }
            b'"' => {
                pos = skip_string(bytes, pos);
                let kind = match stack.last_mut() {
                    Some(Container::Object { expect_key }) if *expect_key => {
                        *expect_key = false;
                        ItemKind::Property(unquote(&text[start..pos]))
                    }
                    _ => ItemKind::Value,
                };
                items.push(Item { kind, start, end: pos, depth });
            }
            b'/' if bytes.get(pos + 1) == Some(&b'/') => {
                while pos < bytes.len() && bytes[pos] != b'\n' && bytes[pos] != b'\r' {
                    pos += 1;
                }
                items.push(Item { kind: ItemKind::LineComment, start, end: pos, depth });
            }
            b'/' if bytes.get(pos + 1) == Some(&b'*') => {
                pos += 2;
                while pos < bytes.len() && !(bytes[pos] == b'*' && bytes.get(pos + 1) == Some(&b'/')) {
                    pos += 1;
                }
                pos = (pos + 2).min(bytes.len());
                items.push(Item { kind: ItemKind::BlockComment, start, end: pos, depth });
            }
            _ => {
                pos += 1;
                while pos < bytes.len() && !is_delimiter(bytes[pos]) {
                    pos += 1;
                }
                items.push(Item { kind: ItemKind::Value, start, end: pos, depth });
            }
        }
    }

    items
}

fn mark_value_consumed(stack: &mut [Container]) {
    if let Some(Container::Object { expect_key }) = stack.last_mut() {
        *expect_key = false;
    }
}

fn is_delimiter(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'\t' | b'\r' | b'\n' | b'{' | b'}' | b'[' | b']' | b':' | b',' | b'"' | b'/'
    )
}

fn skip_string(bytes: &[u8], mut pos: usize) -> usize {
    pos += 1;
    while pos < bytes.len() {
        match bytes[pos] {
            b'\\' => pos += 2,
            b'"' => return pos + 1,
            _ => pos += 1,
        }
    }
    bytes.len()
}

fn unquote(raw: &str) -> String {
    if raw.contains('\\') {
        if let Ok(value) = serde_json::from_str::<String>(raw) {
            return value;
        }
    }
    raw.trim_start_matches('"').trim_end_matches('"').to_string()
}

/// Most frequent line ending of the document, `\n` when there is none
#[must_use]
pub fn detect_newline(text: &str) -> &'static str {
    let crlf = text.matches("\r\n").count();
    let lf = text.matches('\n').count() - crlf;
    if crlf > lf {
        "\r\n"
    } else {
        "\n"
    }
}
