//! Extract, remove and insert top-level properties

use super::{detect_newline, scan, Item, ItemKind};

/// Line comment that marks the following property as machine-local
const IGNORE_DIRECTIVE: &str = "#ignore";

/// Collect the source text of every top-level property named in `names`
///
/// Properties preceded by a `// #ignore` comment are collected too, comment
/// included. Each slice keeps its indentation and trailing comma and is
/// followed by the document's newline.
#[must_use]
pub fn extract_properties(text: &str, names: &[String]) -> String {
    if names.is_empty() && !text.contains(IGNORE_DIRECTIVE) {
        return String::new();
    }

    let newline = detect_newline(text);
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut matching = false;

    for item in scan(text) {
        if item.depth != 1 {
            continue;
        }

        match &item.kind {
            ItemKind::LineComment if is_ignore_directive(&text[item.start..item.end]) => {
                if !matching {
                    spans.push((back_over_blanks(text, item.start), item.end));
                    matching = true;
                }
            }
            ItemKind::Property(name) if !matching && names.contains(name) => {
                spans.push((back_over_blanks(text, item.start), item.end));
                matching = true;
            }
            ItemKind::Comma if matching => {
                extend_last(&mut spans, item.end);
                matching = false;
            }
            kind if matching && !kind.is_comment() => extend_last(&mut spans, item.end),
            _ => {}
        }
    }

    let mut result = String::new();
    for (from, until) in spans {
        result.push_str(&text[from..until]);
        result.push_str(newline);
    }
    result
}

/// Remove every top-level property named in `names`
///
/// The trailing separator is removed with the property, together with the
/// blanks up to and including the end of its line, so the remaining lines
/// keep their layout.
#[must_use]
pub fn remove_properties(text: &str, names: &[String]) -> String {
    excise(text, names, true)
}

/// Remove every top-level property named in `names`, leaving surrounding blanks
#[must_use]
pub fn filter_json(text: &str, names: &[String]) -> String {
    excise(text, names, false)
}

/// Insert a block produced by [`extract_properties`] before the root object's closing brace
///
/// A separating comma is added after the last member when the object is
/// non-empty and not already comma-terminated.
#[must_use]
pub fn insert_properties(text: &str, block: &str) -> String {
    let block = block.trim_end();
    let block = block.strip_suffix(',').unwrap_or(block).trim_end();
    if block.trim().is_empty() {
        return text.to_string();
    }

    let items = scan(text);
    let Some(close_idx) = root_close(&items) else {
        return text.to_string();
    };
    let close = &items[close_idx];
    let Some(last) = items[..close_idx].iter().rev().find(|i| !i.kind.is_comment()) else {
        return text.to_string();
    };

    let newline = detect_newline(text);
    let needs_comma = !matches!(last.kind, ItemKind::ObjectBegin | ItemKind::Comma);

    let mut out = String::with_capacity(text.len() + block.len() + 4);
    if needs_comma {
        out.push_str(&text[..last.end]);
        out.push(',');
        out.push_str(&text[last.end..close.start]);
    } else {
        out.push_str(&text[..close.start]);
    }
    if !out.ends_with('\n') {
        out.push_str(newline);
    }
    out.push_str(block);
    out.push_str(newline);
    out.push_str(&text[close.start..]);
    out
}

fn excise(text: &str, names: &[String], trim_blanks: bool) -> String {
    if names.is_empty() && !text.contains(IGNORE_DIRECTIVE) {
        return text.to_string();
    }

    let bytes = text.as_bytes();
    let mut spans: Vec<(usize, usize)> = Vec::new();
    let mut matching = false;

    for item in scan(text) {
        if item.kind == ItemKind::ObjectEnd && item.depth == 0 {
            if matching && trim_blanks {
                extend_last(&mut spans, item.start);
            }
            matching = false;
            continue;
        }
        if item.depth != 1 {
            continue;
        }

        let starts = !matching
            && match &item.kind {
                ItemKind::LineComment => is_ignore_directive(&text[item.start..item.end]),
                ItemKind::Property(name) => names.contains(name),
                _ => false,
            };
        if starts {
            let from = if trim_blanks {
                back_over_blanks(text, item.start)
            } else {
                item.start
            };
            spans.push((from, item.end));
            matching = true;
            continue;
        }

        match &item.kind {
            ItemKind::Comma if matching => {
                let mut until = item.end;
                if trim_blanks {
                    while until < bytes.len() && matches!(bytes[until], b' ' | b'\t') {
                        until += 1;
                    }
                    if bytes.get(until) == Some(&b'\r') && bytes.get(until + 1) == Some(&b'\n') {
                        until += 2;
                    } else if bytes.get(until) == Some(&b'\n') {
                        until += 1;
                    }
                }
                extend_last(&mut spans, until);
                matching = false;
            }
            kind if matching && !kind.is_comment() => extend_last(&mut spans, item.end),
            _ => {}
        }
    }

    if spans.is_empty() {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (from, until) in spans {
        let from = from.max(cursor);
        out.push_str(&text[cursor..from]);
        cursor = until.max(cursor);
    }
    out.push_str(&text[cursor..]);

    drop_dangling_comma(&out)
}

/// Remove a comma left directly before the root object's closing brace
fn drop_dangling_comma(text: &str) -> String {
    let items = scan(text);
    let Some(close_idx) = root_close(&items) else {
        return text.to_string();
    };

    match items[..close_idx].iter().rev().find(|i| !i.kind.is_comment()) {
        Some(item) if item.kind == ItemKind::Comma && item.depth == 1 => {
            format!("{}{}", &text[..item.start], &text[item.end..])
        }
        _ => text.to_string(),
    }
}

fn root_close(items: &[Item]) -> Option<usize> {
    items
        .iter()
        .position(|i| i.kind == ItemKind::ObjectEnd && i.depth == 0)
}

fn extend_last(spans: &mut [(usize, usize)], until: usize) {
    if let Some(last) = spans.last_mut() {
        last.1 = last.1.max(until);
    }
}

fn back_over_blanks(text: &str, mut offset: usize) -> usize {
    let bytes = text.as_bytes();
    while offset > 0 && matches!(bytes[offset - 1], b' ' | b'\t') {
        offset -= 1;
    }
    offset
}

fn is_ignore_directive(comment: &str) -> bool {
    comment
        .strip_prefix("//")
        .is_some_and(|rest| rest.trim_start().starts_with(IGNORE_DIRECTIVE))
}
