//! Placeholder formatter for commit messages and host names
//!
//! Supports `{{name}}` and `{{name|date:<styles>[:<locales>]}}` where
//! `styles` is `iso` or a `date[,time]` pair of `full`, `long`, `medium`,
//! `short`.

use chrono::{DateTime, Local, Locale, SecondsFormat, Utc};
use regex::{Captures, Regex};
use std::collections::HashMap;
use std::sync::OnceLock;

/// Value bound to a placeholder name
#[derive(Debug, Clone)]
pub enum FormatValue {
    Text(String),
    Date(DateTime<Utc>),
}

impl From<&str> for FormatValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FormatValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for FormatValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

pub type FormatVars = HashMap<String, FormatValue>;

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\{\{([A-Za-z]+)(?:\|([a-z]+)(?::([a-z,]+))?(?::([A-Za-z_,\-]+))?)?\}\}")
            .expect("valid regex")
    })
}

/// Replace every placeholder of `template` with its bound value
///
/// Unbound names render as an empty string.
#[must_use]
pub fn format(template: &str, vars: &FormatVars) -> String {
    placeholder_re()
        .replace_all(template, |caps: &Captures<'_>| {
            let value = vars.get(&caps[1]);
            match (value, caps.get(2).map(|m| m.as_str())) {
                (Some(FormatValue::Date(date)), Some("date")) => format_date(
                    date,
                    caps.get(3).map(|m| m.as_str()),
                    caps.get(4).map(|m| m.as_str()),
                ),
                (Some(FormatValue::Date(date)), _) => date.to_rfc2822(),
                (Some(FormatValue::Text(text)), _) => text.clone(),
                (None, _) => String::new(),
            }
        })
        .into_owned()
}

fn format_date(date: &DateTime<Utc>, styles: Option<&str>, locales: Option<&str>) -> String {
    let Some(styles) = styles else {
        return date.to_rfc2822();
    };
    if styles == "iso" {
        return date.to_rfc3339_opts(SecondsFormat::Millis, true);
    }

    let mut parts = styles.split(',');
    let date_style = parts.next().and_then(date_pattern);
    let time_style = parts
        .next()
        .or_else(|| styles.split(',').next())
        .and_then(time_pattern);

    let pattern = match (date_style, time_style) {
        (Some(d), Some(t)) => format!("{d} {t}"),
        (Some(d), None) => d.to_string(),
        (None, Some(t)) => t.to_string(),
        (None, None) => return date.to_rfc2822(),
    };

    let locale = resolve_locale(locales);
    date.with_timezone(&Local)
        .format_localized(&pattern, locale)
        .to_string()
}

fn date_pattern(style: &str) -> Option<&'static str> {
    match style {
        "full" => Some("%A %-d %B %Y"),
        "long" => Some("%-d %B %Y"),
        "medium" => Some("%-d %b %Y"),
        "short" => Some("%x"),
        _ => None,
    }
}

fn time_pattern(style: &str) -> Option<&'static str> {
    match style {
        "full" | "long" => Some("%H:%M:%S %Z"),
        "medium" => Some("%X"),
        "short" => Some("%H:%M"),
        _ => None,
    }
}

/// First locale of a comma list that chrono knows, trying `fr` then `fr_FR`
fn resolve_locale(locales: Option<&str>) -> Locale {
    for name in locales.unwrap_or_default().split(',').filter(|n| !n.is_empty()) {
        let name = name.replace('-', "_");
        if let Ok(locale) = Locale::try_from(name.as_str()) {
            return locale;
        }
        let regional = format!("{name}_{}", name.to_uppercase());
        if let Ok(locale) = Locale::try_from(regional.as_str()) {
            return locale;
        }
    }
    Locale::POSIX
}

/// Render the configured host name template
///
/// An empty template yields an empty host name.
#[must_use]
pub fn render_hostname(template: &str) -> String {
    if template.is_empty() {
        return String::new();
    }

    let mut vars = FormatVars::new();
    vars.insert("hostname".to_string(), system_hostname().into());
    vars.insert("username".to_string(), system_username().into());
    format(template, &vars)
}

/// Host name of this machine, empty when it cannot be determined
#[must_use]
pub fn system_hostname() -> String {
    for key in ["HOSTNAME", "COMPUTERNAME"] {
        if let Ok(value) = std::env::var(key) {
            if !value.trim().is_empty() {
                return value.trim().to_string();
            }
        }
    }

    if let Ok(value) = std::fs::read_to_string("/etc/hostname") {
        if !value.trim().is_empty() {
            return value.trim().to_string();
        }
    }

    std::process::Command::new("hostname")
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .unwrap_or_default()
}

fn system_username() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_default()
}
