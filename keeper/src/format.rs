//! Terminal rendering of watches and history for the CLI.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::types::{Attempt, AttemptStatus, HistoryEntry, Watch, WatchId};

/// Maximum display columns of a URL shown in the watch table.
const WATCH_URL_WIDTH: usize = 46;

/// Maximum display columns of a name shown in the watch table.
const WATCH_NAME_WIDTH: usize = 40;

/// Maximum display columns of a URL shown in a history line.
const HISTORY_URL_WIDTH: usize = 50;

/// Maximum display columns of a title shown in a history line.
const HISTORY_TITLE_WIDTH: usize = 28;

/// Coarse relative time: `just now`, `12m ago`, `3h ago`.
#[must_use]
pub fn time_ago(timestamp: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - timestamp).num_minutes();
    if minutes < 1 {
        "just now".to_string()
    } else if minutes < 60 {
        format!("{minutes}m ago")
    } else {
        format!("{}h ago", minutes / 60)
    }
}

/// Terminal columns taken by `s`. CJK characters and most emoji take two.
#[must_use]
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Pads `s` with spaces to at least `min_width` display columns.
#[must_use]
pub fn pad(s: &str, min_width: usize) -> String {
    let width = display_width(s);
    if width >= min_width {
        s.to_string()
    } else {
        format!("{s}{}", " ".repeat(min_width - width))
    }
}

/// Longest prefix of `s` fitting in `max` display columns.
fn take_width(s: &str, max: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in s.char_indices() {
        used += ch.width().unwrap_or(0);
        if used > max {
            return &s[..idx];
        }
    }
    s
}

/// Strips the `http://` or `https://` scheme and cuts to `max` columns.
#[must_use]
pub fn short_url(url: &str, max: usize) -> String {
    let bare = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    take_width(bare, max).to_string()
}

/// Cuts to `max` display columns, marking the cut with `…`.
#[must_use]
pub fn truncate(s: &str, max: usize) -> String {
    if display_width(s) <= max {
        return s.to_string();
    }
    let mut out = take_width(s, max.saturating_sub(1)).to_string();
    out.push('…');
    out
}

fn status_label(status: AttemptStatus) -> &'static str {
    match status {
        AttemptStatus::Refreshed => "refreshed",
        AttemptStatus::Skipped => "tab was active",
        AttemptStatus::Locked => "locked",
    }
}

/// Label for a watch's last attempt, e.g. `refreshed 5m ago`.
#[must_use]
pub fn attempt_label(attempt: Option<&Attempt>, now: DateTime<Utc>) -> String {
    match attempt {
        Some(attempt) => format!(
            "{} {}",
            status_label(attempt.status),
            time_ago(attempt.timestamp, now)
        ),
        None => "-".to_string(),
    }
}

/// Renders the watch list as an aligned table.
#[must_use]
pub fn watch_table(watches: &BTreeMap<WatchId, Watch>, now: DateTime<Utc>) -> String {
    if watches.is_empty() {
        return "No watches.".to_string();
    }

    let header = ["ID", "Name", "Every", "Refreshes", "Last attempt", "URL"];
    let rows: Vec<[String; 6]> = watches
        .values()
        .map(|w| {
            let url = short_url(&w.url, WATCH_URL_WIDTH);
            [
                w.id.to_string(),
                truncate(w.name_or(&url), WATCH_NAME_WIDTH),
                format!("{}m", w.interval_minutes),
                w.refresh_count.to_string(),
                attempt_label(w.last_attempt.as_ref(), now),
                url,
            ]
        })
        .collect();

    let mut widths = header.map(display_width);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(cell));
        }
    }

    let render = |cells: &[&str]| -> String {
        cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| pad(cell, width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![render(&header)];
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        lines.push(render(&cells));
    }
    lines.join("\n")
}

/// Renders history newest first, one entry per line.
#[must_use]
pub fn history_lines(history: &[HistoryEntry], now: DateTime<Utc>) -> String {
    if history.is_empty() {
        return "No refreshes yet.".to_string();
    }

    let noun = if history.len() == 1 { "refresh" } else { "refreshes" };
    let mut lines = vec![format!("{} {noun} logged", history.len())];
    for entry in history.iter().rev() {
        let mut line = format!(
            "{:<9} {:<15} {}",
            time_ago(entry.timestamp, now),
            status_label(entry.status),
            short_url(&entry.url, HISTORY_URL_WIDTH)
        );
        if !entry.title.is_empty() {
            line.push_str("  ");
            line.push_str(&truncate(&entry.title, HISTORY_TITLE_WIDTH));
        }
        lines.push(line);
    }
    lines.join("\n")
}
