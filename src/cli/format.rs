//! Tabular output for CLI display.
//!
//! Each view declares its columns once as a list of header/accessor
//! pairs; rendering pads every column to its widest cell. Truncation
//! is opt-in per column and counts characters, not bytes.

use std::iter::repeat_n;

use crate::model::{Bug, Issue};

/// One column of a table view.
pub(super) struct Column<T> {
    pub header: &'static str,
    pub value: fn(&T) -> String,
    pub truncate: Option<usize>,
}

/// Columns for plain bug views.
pub(super) fn bug_columns() -> Vec<Column<Bug>> {
    vec![
        Column {
            header: "ID",
            value: |b| b.id.to_string(),
            truncate: None,
        },
        Column {
            header: "STATUS",
            value: |b| b.status.clone(),
            truncate: None,
        },
        Column {
            header: "ASSIGNEE",
            value: |b| b.assigned_to.clone(),
            truncate: None,
        },
        Column {
            header: "SUMMARY",
            value: |b| b.summary.clone(),
            truncate: Some(50),
        },
        Column {
            header: "PRIORITY",
            value: |b| b.priority.clone(),
            truncate: None,
        },
        Column {
            header: "SEVERITY",
            value: |b| b.severity.clone(),
            truncate: None,
        },
    ]
}

/// Bug columns plus the derived backport target, for the candidate
/// list. A bug whose whiteboard names no target still needs a decision,
/// so the gap is flagged rather than left blank.
pub(super) fn backport_columns() -> Vec<Column<Bug>> {
    let mut columns = bug_columns();
    columns.push(Column {
        header: "BACKPORT",
        value: |b| match b.backport_target() {
            Some(target) => target.to_string(),
            None => "⚠️".to_string(),
        },
        truncate: None,
    });
    columns
}

/// Columns for issue views.
pub(super) fn issue_columns() -> Vec<Column<Issue>> {
    vec![
        Column {
            header: "KEY",
            value: |i| i.key.clone(),
            truncate: None,
        },
        Column {
            header: "TYPE",
            value: |i| i.kind.clone(),
            truncate: None,
        },
        Column {
            header: "STATUS",
            value: |i| i.status.clone().unwrap_or_default(),
            truncate: None,
        },
        Column {
            header: "PRIORITY",
            value: |i| i.priority.clone().unwrap_or_default(),
            truncate: None,
        },
        Column {
            header: "SUMMARY",
            value: |i| i.summary.clone(),
            truncate: Some(50),
        },
    ]
}

/// Renders rows under a header line.
pub(super) fn render<T>(columns: &[Column<T>], rows: &[T]) -> String {
    let mut table: Vec<Vec<String>> = Vec::with_capacity(rows.len() + 1);
    table.push(columns.iter().map(|c| c.header.to_string()).collect());
    for row in rows {
        table.push(
            columns
                .iter()
                .map(|c| {
                    let cell = (c.value)(row);
                    match c.truncate {
                        Some(max) => truncate(&cell, max),
                        None => cell,
                    }
                })
                .collect(),
        );
    }

    let mut widths = vec![0usize; columns.len()];
    for line in &table {
        for (i, cell) in line.iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count());
        }
    }

    let mut out = String::new();
    for line in &table {
        for (i, cell) in line.iter().enumerate() {
            out.push_str(cell);
            if i + 1 < line.len() {
                let pad = widths[i] - cell.chars().count();
                out.extend(repeat_n(' ', pad + 2));
            }
        }
        out.push('\n');
    }
    out
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}
