//! Conditional directives and variable substitution for stored JSONC files
//!
//! A stored file may carry blocks guarded by comment directives:
//!
//! ```jsonc
//! {
//!     // #if os = "mac" && version >= 1.80
//!     "editor.fontSize": 14,
//!     // #else
//!     "editor.fontSize": 12,
//!     // #endif
//!     "window.title": "{{profile}} on {{host}}"
//! }
//! ```
//!
//! Lines of inactive branches and the directive lines themselves are
//! dropped; `{{name}}` placeholders of known variables are replaced in the
//! remaining lines.

use crate::error::{SyncError, SyncResult};
use regex::{Captures, Regex};
use semver::Version;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Variables available to directives and placeholders
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    pub host: String,
    pub profile: String,
    /// `mac`, `linux` or `windows`
    pub os: String,
    /// Lowercased editor application name
    pub editor: String,
    pub version: String,
    pub editor_storage: String,
    pub global_storage: String,
    pub user_storage: String,
    /// Process environment, consulted last
    pub env: BTreeMap<String, String>,
}

impl TemplateVars {
    /// Operating system name as used in directives
    #[must_use]
    pub fn current_os() -> &'static str {
        if cfg!(target_os = "windows") {
            "windows"
        } else if cfg!(target_os = "macos") {
            "mac"
        } else {
            "linux"
        }
    }

    /// Look up a variable by its template name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        let value = match name {
            "host" | "hostname" => &self.host,
            "profile" => &self.profile,
            "os" => &self.os,
            "editor" => &self.editor,
            "version" => &self.version,
            "editorStorage" => &self.editor_storage,
            "globalStorage" => &self.global_storage,
            "userStorage" => &self.user_storage,
            _ => return self.env.get(name).map(String::as_str),
        };
        Some(value.as_str())
    }
}

#[derive(Debug, Clone, Copy)]
struct Frame {
    /// Whether the enclosing block is emitting lines
    parent_active: bool,
    /// Whether a branch of this block has already been taken
    taken: bool,
    active: bool,
}

enum Directive<'a> {
    If(&'a str),
    Elif(&'a str),
    Else,
    Endif,
}

/// Evaluate directives and substitute placeholders
///
/// # Errors
/// Returns a template error on an unbalanced block or a malformed condition
pub fn preprocess(text: &str, vars: &TemplateVars) -> SyncResult<String> {
    let mut out = String::with_capacity(text.len());
    let mut stack: Vec<Frame> = Vec::new();

    for (index, line) in text.split_inclusive('\n').enumerate() {
        let active = stack.last().map_or(true, |frame| frame.active);

        match parse_directive(line) {
            Some(Directive::If(condition)) => {
                let matched = active && evaluate(condition, vars)?;
                stack.push(Frame {
                    parent_active: active,
                    taken: matched,
                    active: matched,
                });
            }
            Some(Directive::Elif(condition)) => {
                let frame = stack.last_mut().ok_or_else(|| unbalanced("#elif", index))?;
                let matched = frame.parent_active && !frame.taken && evaluate(condition, vars)?;
                frame.active = matched;
                frame.taken |= matched;
            }
            Some(Directive::Else) => {
                let frame = stack.last_mut().ok_or_else(|| unbalanced("#else", index))?;
                frame.active = frame.parent_active && !frame.taken;
                frame.taken = true;
            }
            Some(Directive::Endif) => {
                stack.pop().ok_or_else(|| unbalanced("#endif", index))?;
            }
            None if active => out.push_str(&substitute(line, vars)),
            None => {}
        }
    }

    if stack.is_empty() {
        Ok(out)
    } else {
        Err(SyncError::Template("missing #endif".to_string()))
    }
}

fn unbalanced(directive: &str, index: usize) -> SyncError {
    SyncError::Template(format!("{directive} without #if on line {}", index + 1))
}

fn parse_directive(line: &str) -> Option<Directive<'_>> {
    let body = line.trim().strip_prefix("//")?.trim_start();
    let body = body.strip_prefix('#')?;

    if let Some(condition) = body.strip_prefix("if ") {
        Some(Directive::If(condition.trim()))
    } else if let Some(condition) = body.strip_prefix("elif ") {
        Some(Directive::Elif(condition.trim()))
    } else if body.trim_end() == "else" {
        Some(Directive::Else)
    } else if body.trim_end() == "endif" {
        Some(Directive::Endif)
    } else {
        None
    }
}

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([\w.]+)\s*\}\}").expect("valid regex"))
}

fn comparison_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*([\w.]+)\s*(==|!=|<=|>=|=|<|>)\s*("[^"]*"|'[^']*'|[^\s]+)\s*$"#)
            .expect("valid regex")
    })
}

/// Replace `{{name}}` with the JSON-escaped value of known variables
fn substitute(line: &str, vars: &TemplateVars) -> String {
    placeholder_re()
        .replace_all(line, |caps: &Captures<'_>| match vars.get(&caps[1]) {
            Some(value) => escape(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

fn escape(value: &str) -> String {
    let quoted = serde_json::Value::String(value.to_string()).to_string();
    quoted[1..quoted.len() - 1].to_string()
}

fn evaluate(condition: &str, vars: &TemplateVars) -> SyncResult<bool> {
    for alternative in condition.split("||") {
        let mut all = true;
        for term in alternative.split("&&") {
            if !compare(term, vars)? {
                all = false;
                break;
            }
        }
        if all {
            return Ok(true);
        }
    }
    Ok(false)
}

fn compare(term: &str, vars: &TemplateVars) -> SyncResult<bool> {
    let caps = comparison_re()
        .captures(term)
        .ok_or_else(|| SyncError::Template(format!("malformed condition: {}", term.trim())))?;

    let name = &caps[1];
    let operator = &caps[2];
    let literal = caps[3].trim_matches(|c| c == '"' || c == '\'');
    let value = vars.get(name).unwrap_or_default();

    let ordering = if name == "version" {
        match (lenient_version(value), lenient_version(literal)) {
            (Some(left), Some(right)) => left.cmp(&right),
            _ => value.cmp(literal),
        }
    } else if let (Ok(left), Ok(right)) = (value.parse::<f64>(), literal.parse::<f64>()) {
        left.partial_cmp(&right).unwrap_or(Ordering::Equal)
    } else {
        value.cmp(literal)
    };

    Ok(match operator {
        "=" | "==" => ordering == Ordering::Equal,
        "!=" => ordering != Ordering::Equal,
        "<" => ordering == Ordering::Less,
        "<=" => ordering != Ordering::Greater,
        ">" => ordering == Ordering::Greater,
        _ => ordering != Ordering::Less,
    })
}

/// Parse `1.80`, `1.80.2` or `1.80.2-insider` as a semantic version
fn lenient_version(text: &str) -> Option<Version> {
    let core = text.split(['-', '+', ' ']).next()?;
    let mut parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 {
        return None;
    }
    while parts.len() < 3 {
        parts.push("0");
    }
    Version::parse(&parts.join(".")).ok()
}
