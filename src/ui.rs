use ratatui::{prelude::*, widgets::*};

use crate::pipeline::SortDirection;

/// Renders tabs
pub fn render_tabs<'a>(titles: &[&'a str], selected: usize) -> Tabs<'a> {
    let titles: Vec<Line> = titles.iter().map(|t| Line::from(*t)).collect();

    Tabs::new(titles)
        .select(selected)
        .style(Style::default().fg(Color::DarkGray))
        .highlight_style(Style::default().fg(Color::Yellow).bold())
        .divider("|")
}

/// Colors the raw pane: header block, markup tags and JSON keys
pub fn highlight_output(text: &str) -> Vec<Line<'static>> {
    let mut in_header = text.starts_with("Status Code:");

    text.lines()
        .map(|line| {
            if in_header {
                if line.starts_with("---") {
                    in_header = false;
                    return Line::styled(line.to_string(), Style::default().fg(Color::DarkGray));
                }
                return Line::styled(line.to_string(), Style::default().fg(Color::Cyan));
            }
            highlight_line(line)
        })
        .collect()
}

fn highlight_line(line: &str) -> Line<'static> {
    let trimmed = line.trim_start();
    let indent = &line[..line.len() - trimmed.len()];

    if trimmed.starts_with('<') && trimmed.ends_with('>') {
        return highlight_tag(indent, trimmed);
    }

    // "key": value
    if trimmed.starts_with('"') {
        if let Some(end) = trimmed[1..].find("\":").map(|i| i + 2) {
            let (key, rest) = trimmed.split_at(end);
            return Line::from(vec![
                Span::raw(indent.to_string()),
                Span::styled(key.to_string(), Style::default().fg(Color::Cyan)),
                Span::styled(rest.to_string(), value_style(rest)),
            ]);
        }
    }

    Line::raw(line.to_string())
}

fn highlight_tag(indent: &str, tag: &str) -> Line<'static> {
    let tag_style = Style::default().fg(Color::Yellow);
    let Some(space) = tag.find(' ') else {
        return Line::from(vec![
            Span::raw(indent.to_string()),
            Span::styled(tag.to_string(), tag_style),
        ]);
    };

    let (name, rest) = tag.split_at(space);
    let attrs = &rest[..rest.len() - 1];
    Line::from(vec![
        Span::raw(indent.to_string()),
        Span::styled(name.to_string(), tag_style),
        Span::styled(attrs.to_string(), Style::default().fg(Color::Green)),
        Span::styled(">", tag_style),
    ])
}

fn value_style(rest: &str) -> Style {
    let value = rest.trim_start_matches(':').trim().trim_end_matches(',');
    match value {
        "true" | "false" | "null" => Style::default().fg(Color::Magenta),
        v if v.starts_with('"') => Style::default().fg(Color::Green),
        v if v.parse::<f64>().is_ok() => Style::default().fg(Color::Yellow),
        _ => Style::default(),
    }
}

/// Column heading with a sort marker when it was the last sorted column
pub fn column_title(column: &str, last_sort: Option<&(String, SortDirection)>) -> String {
    match last_sort {
        Some((sorted, SortDirection::Ascending)) if sorted == column => format!("{} ▲", column),
        Some((sorted, SortDirection::Descending)) if sorted == column => format!("{} ▼", column),
        _ => column.to_string(),
    }
}

/// Status code color
pub fn status_color(code: u16) -> Color {
    match code {
        200..=299 => Color::Green,
        300..=399 => Color::Cyan,
        400..=499 => Color::Red,
        500..=599 => Color::Magenta,
        _ => Color::Yellow,
    }
}

/// Method color
pub fn method_color(method: &str) -> Color {
    match method {
        "GET" => Color::Green,
        "POST" => Color::Yellow,
        "PUT" => Color::Blue,
        "DELETE" => Color::Red,
        _ => Color::White,
    }
}
