//! Aggregation of collected rows into a multi-sheet workbook
//!
//! Each task becomes one sheet. The sheet header is the union of the keys
//! seen across that task's rows, in first-seen order, so the first row's
//! column order wins and columns introduced by later rows are appended.
//! Tasks that produced no rows still get a sheet with [`DEFAULT_COLUMNS`].
//!
//! Sheet titles must satisfy the spreadsheet format's naming rules (no
//! `[]:*?/\`, at most 31 characters, unique ignoring case);
//! [`sanitize_sheet_title`] and the builder's de-duplication enforce them.

mod xlsx;

use crate::types::{RemoteTask, ResultRow, TaskResultSet};
use std::collections::HashSet;

/// Header used for a task that returned no rows
pub const DEFAULT_COLUMNS: [&str; 5] = ["id", "title", "companyName", "location", "jobUrl"];

/// Longest sheet title the format accepts, in characters
pub const MAX_SHEET_TITLE_CHARS: usize = 31;

/// MIME type of the generated file
pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const FORBIDDEN_TITLE_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// One worksheet: a header row followed by rows aligned to it
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    /// Sanitized, unique title
    pub title: String,
    /// Column names
    pub header: Vec<String>,
    /// Cell text, each row exactly `header.len()` long
    pub rows: Vec<Vec<String>>,
}

/// Ordered collection of sheets
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    /// Sheets in task order
    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    /// True when no sheet was added
    pub fn is_empty(&self) -> bool {
        self.sheets.is_empty()
    }

    /// Total data rows across all sheets (headers excluded)
    pub fn row_count(&self) -> usize {
        self.sheets.iter().map(|s| s.rows.len()).sum()
    }
}

/// Builds a [`Workbook`] one task at a time
#[derive(Debug, Default)]
pub struct AggregationBuilder {
    sheets: Vec<Sheet>,
    used_titles: HashSet<String>,
}

impl AggregationBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a workbook from collected result sets, one sheet per set
    pub fn from_results(results: &[TaskResultSet]) -> Workbook {
        let mut builder = Self::new();
        for result in results {
            builder.add_task(&result.task, &result.rows);
        }
        builder.build()
    }

    /// Append a sheet for `task`
    ///
    /// The fallback title uses the 1-based position of the task in the
    /// workbook.
    pub fn add_task(&mut self, task: &RemoteTask, rows: &[ResultRow]) -> &mut Self {
        let index = self.sheets.len() + 1;
        let title = self.unique_title(sanitize_sheet_title(task.name.as_deref(), index));

        let header = column_union(rows);
        let rows = rows
            .iter()
            .map(|row| header.iter().map(|column| row.cell(column)).collect())
            .collect();

        self.sheets.push(Sheet {
            title,
            header,
            rows,
        });
        self
    }

    /// Finish building
    pub fn build(self) -> Workbook {
        Workbook {
            sheets: self.sheets,
        }
    }

    fn unique_title(&mut self, base: String) -> String {
        if self.used_titles.insert(base.to_lowercase()) {
            return base;
        }

        let mut n = 2;
        loop {
            let suffix = format!(" ({n})");
            let room = MAX_SHEET_TITLE_CHARS - suffix.chars().count();
            let stem: String = base.chars().take(room).collect();
            let candidate = format!("{}{suffix}", stem.trim_end());
            if self.used_titles.insert(candidate.to_lowercase()) {
                return candidate;
            }
            n += 1;
        }
    }
}

/// Union of row keys in first-seen order; [`DEFAULT_COLUMNS`] when there are no rows
pub fn column_union(rows: &[ResultRow]) -> Vec<String> {
    if rows.is_empty() {
        return DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
    }

    let mut seen = HashSet::new();
    let mut header = Vec::new();
    for key in rows.iter().flat_map(ResultRow::keys) {
        if seen.insert(key) {
            header.push(key.to_string());
        }
    }
    header
}

/// Make a task name usable as a sheet title
///
/// Removes `[]:*?/\`, trims surrounding whitespace and truncates to
/// [`MAX_SHEET_TITLE_CHARS`] characters. An absent or empty result falls back
/// to `Task_<index>`.
pub fn sanitize_sheet_title(name: Option<&str>, index: usize) -> String {
    let cleaned: String = name
        .unwrap_or_default()
        .chars()
        .filter(|c| !FORBIDDEN_TITLE_CHARS.contains(c))
        .collect();
    let title: String = cleaned.trim().chars().take(MAX_SHEET_TITLE_CHARS).collect();

    if title.is_empty() {
        format!("Task_{index}")
    } else {
        title
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
