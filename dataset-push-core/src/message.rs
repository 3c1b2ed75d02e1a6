//! Commit message rendering.

use chrono::{DateTime, Local, TimeZone};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Renders `template` for `filename` at the current local time.
pub fn render_commit_message(template: &str, filename: &str) -> String {
    render_commit_message_at(template, filename, &Local::now())
}

/// Substitutes `{filename}` and `{timestamp}`; other text is kept verbatim.
pub fn render_commit_message_at<Tz>(template: &str, filename: &str, at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
{
    let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
    let mut out = String::with_capacity(template.len() + filename.len() + timestamp.len());
    let mut rest = template;
    // Single pass: substituted values are never scanned again.
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        if let Some(after) = tail.strip_prefix("{filename}") {
            out.push_str(filename);
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{timestamp}") {
            out.push_str(&timestamp);
            rest = after;
        } else {
            out.push('{');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
