//! Response rendering - content sniffing by parse attempt, never by header

use std::fmt::Write;

use crate::constants::NO_RESPONSE_MESSAGE;
use crate::models::ApiResponse;
use crate::pipeline::xml::{self, Element};

/// Which strategy produced a rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyFormat {
    Markup,
    Structured,
    Plain,
}

/// Full rendering: header block followed by the pretty-printed body
pub fn render(response: Option<&ApiResponse>) -> String {
    let Some(response) = response else {
        return NO_RESPONSE_MESSAGE.to_string();
    };
    let (_, body) = pretty_body(&response.text());
    format!("{}{}", header_block(response), body)
}

pub fn header_block(response: &ApiResponse) -> String {
    format!(
        "Status Code: {} {}\nTime: {}\nURL: {}\n{}\n\n",
        response.status,
        response.reason,
        response.received_at.format("%Y-%m-%d %H:%M:%S"),
        response.url,
        "-".repeat(80)
    )
}

/// Try markup, then structured data, then fall back to the text itself
pub fn pretty_body(text: &str) -> (BodyFormat, String) {
    if let Some(rendered) = try_markup(text) {
        return (BodyFormat::Markup, rendered);
    }
    if let Some(rendered) = try_structured(text) {
        return (BodyFormat::Structured, rendered);
    }
    (BodyFormat::Plain, text.to_string())
}

fn try_markup(text: &str) -> Option<String> {
    let root = xml::parse(text).ok()?;
    let mut out = String::new();
    write_element(&mut out, &root, 0);
    Some(out)
}

fn try_structured(text: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(text).ok()?;
    serde_json::to_string_pretty(&value).ok()
}

fn write_element(out: &mut String, element: &Element, level: usize) {
    let indent = "  ".repeat(level);

    let _ = write!(out, "{}<{}", indent, element.name);
    for (key, value) in &element.attributes {
        let _ = write!(out, " {}=\"{}\"", key, value);
    }
    out.push_str(">\n");

    let text = element.text.trim();
    if !text.is_empty() {
        let _ = writeln!(out, "{}  {}", indent, text);
    }

    for child in &element.children {
        write_element(out, child, level + 1);
    }

    let _ = writeln!(out, "{}</{}>", indent, element.name);
}
