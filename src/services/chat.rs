use serde_json::Value;

use crate::api::{ApiError, ChatBackend, QueryReply};
use crate::services::settings::InputMode;

/// Banner text shown when a message could not be delivered.
pub const SEND_FAILED_MESSAGE: &str = "Failed to send message. Please try again.";

const COLUMN_SEPARATOR: &str = " | ";

/// Trim user input; `None` means there is nothing to send.
pub fn prepare_input(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Why a submission was turned away. The draft is kept in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitBlocked {
    Empty,
    Busy,
    NotConnected,
}

/// Decide whether a draft can go out now. On success the trimmed text is
/// returned and the caller may clear the entry.
pub fn accept_submission(raw: &str, sending: bool, connected: bool) -> Result<String, SubmitBlocked> {
    if sending {
        return Err(SubmitBlocked::Busy);
    }
    let text = prepare_input(raw).ok_or(SubmitBlocked::Empty)?;
    if !connected {
        return Err(SubmitBlocked::NotConnected);
    }
    Ok(text)
}

/// Send `text` to the endpoint matching `mode` and return the assistant text
/// to display.
pub async fn dispatch(
    backend: &dyn ChatBackend,
    mode: InputMode,
    text: &str,
) -> Result<String, ApiError> {
    match mode {
        InputMode::Chat => backend.send_message(text).await,
        InputMode::Query => {
            let reply = backend.process_input(text).await?;
            Ok(compose_query_reply(&reply))
        }
    }
}

/// Response text followed by the result rows as a fenced table.
pub fn compose_query_reply(reply: &QueryReply) -> String {
    let mut out = reply.response.trim().to_string();

    if let Some(rows) = &reply.rows {
        if !out.is_empty() {
            out.push_str("\n\n");
        }
        if rows.is_empty() {
            out.push_str("_No matching rows._");
        } else {
            out.push_str("```\n");
            out.push_str(&format_rows(rows));
            out.push_str("\n```");
        }
    }

    out
}

/// Render result rows as an aligned plain-text table.
///
/// Object rows get a header built from their keys (first-seen order across
/// all rows), array rows are laid out positionally without a header, and any
/// other value becomes a single cell.
pub fn format_rows(rows: &[Value]) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let objects = rows.iter().all(Value::is_object);

    let mut header: Option<Vec<String>> = None;
    let body: Vec<Vec<String>> = if objects {
        let mut columns: Vec<String> = Vec::new();
        for row in rows {
            if let Value::Object(map) = row {
                for key in map.keys() {
                    if !columns.iter().any(|c| c == key) {
                        columns.push(key.clone());
                    }
                }
            }
        }
        let body = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|col| row.get(col).map(cell_text).unwrap_or_default())
                    .collect()
            })
            .collect();
        header = Some(columns);
        body
    } else {
        rows.iter()
            .map(|row| match row {
                Value::Array(cells) => cells.iter().map(cell_text).collect(),
                other => vec![cell_text(other)],
            })
            .collect()
    };

    let column_count = header
        .as_ref()
        .map(Vec::len)
        .into_iter()
        .chain(body.iter().map(Vec::len))
        .max()
        .unwrap_or(0);

    let mut widths = vec![0usize; column_count];
    for line in header.iter().chain(body.iter()) {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut lines = Vec::with_capacity(body.len() + 2);
    if let Some(header) = &header {
        lines.push(render_line(header, &widths));
        lines.push(
            widths
                .iter()
                .map(|w| "-".repeat(*w))
                .collect::<Vec<_>>()
                .join("-+-"),
        );
    }
    for row in &body {
        lines.push(render_line(row, &widths));
    }

    lines.join("\n")
}

fn render_line(cells: &[String], widths: &[usize]) -> String {
    // Trailing empty cells are dropped so rows don't end in a bare separator.
    let used = cells
        .iter()
        .rposition(|c| !c.is_empty())
        .map_or(0, |i| i + 1);
    let padded: Vec<String> = widths
        .iter()
        .take(used)
        .enumerate()
        .map(|(i, width)| {
            let cell = cells.get(i).map(String::as_str).unwrap_or("");
            let pad = width.saturating_sub(cell.chars().count());
            format!("{}{}", cell, " ".repeat(pad))
        })
        .collect();
    padded.join(COLUMN_SEPARATOR).trim_end().to_string()
}

fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
