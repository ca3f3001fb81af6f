//! Script literal rendering
//!
//! Values from node configs are never spliced into generated text raw;
//! they go through these helpers so quotes and newlines in user input
//! cannot break the script.

use std::fmt::Display;

/// A double-quoted string literal
pub(crate) fn string(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\x{:02x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

pub(crate) fn optional_string(value: Option<&str>) -> String {
    value.map(string).unwrap_or_else(none)
}

pub(crate) fn string_list(values: &[String]) -> String {
    let items: Vec<String> = values.iter().map(|v| string(v)).collect();
    format!("[{}]", items.join(", "))
}

pub(crate) fn boolean(value: bool) -> String {
    if value { "True" } else { "False" }.to_string()
}

pub(crate) fn number<T: Display>(value: T) -> String {
    value.to_string()
}

pub(crate) fn optional_number<T: Display>(value: Option<T>) -> String {
    value.map(number).unwrap_or_else(none)
}

pub(crate) fn none() -> String {
    "None".to_string()
}
