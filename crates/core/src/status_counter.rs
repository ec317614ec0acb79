//! Attendance-style status counting over line-oriented tables.
//!
//! Extracted spreadsheets and PDFs usually come through as text where columns
//! are separated by a tab or by two or more spaces. The counter looks for a
//! header cell that names a status column, then tallies the values found in
//! that column on every following line.

use crate::error::QueryError;
use crate::metadata::has_counting_intent;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use tracing::debug;

const HEADER_SCAN_LINES: usize = 15;

const HEADER_KEYWORDS: [&str; 8] = [
    "status",
    "attendance",
    "remark",
    "sts",
    "att",
    "day",
    "present",
    "absent",
];

static CELL_DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s{2,}|\t").expect("cell delimiter regex is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCategory {
    Present,
    Absent,
    Holiday,
    Leave,
}

impl StatusCategory {
    /// Maps a table cell to its category.
    pub fn from_cell(cell: &str) -> Option<Self> {
        match cell.trim().to_lowercase().as_str() {
            "p" | "present" | "pres" => Some(StatusCategory::Present),
            "a" | "absent" => Some(StatusCategory::Absent),
            "h" | "holiday" => Some(StatusCategory::Holiday),
            "l" | "leave" | "leaves" => Some(StatusCategory::Leave),
            _ => None,
        }
    }

    /// Maps a word from the user's question to the category it asks about.
    fn from_query_token(token: &str) -> Option<Self> {
        match token {
            "p" | "present" => Some(StatusCategory::Present),
            "a" | "absent" => Some(StatusCategory::Absent),
            "h" | "holiday" | "holidays" => Some(StatusCategory::Holiday),
            "l" | "leave" | "leaves" => Some(StatusCategory::Leave),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        match self {
            StatusCategory::Present => 0,
            StatusCategory::Absent => 1,
            StatusCategory::Holiday => 2,
            StatusCategory::Leave => 3,
        }
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StatusCategory::Present => "Present",
            StatusCategory::Absent => "Absent",
            StatusCategory::Holiday => "Holiday",
            StatusCategory::Leave => "Leave",
        };
        f.write_str(label)
    }
}

/// Where the status values live: the header line and the column within it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusColumn {
    pub header_row: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    counts: [usize; 4],
}

impl StatusTally {
    pub fn get(&self, category: StatusCategory) -> usize {
        self.counts[category.slot()]
    }

    fn increment(&mut self, category: StatusCategory) {
        self.counts[category.slot()] += 1;
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

pub fn split_cells(line: &str) -> Vec<&str> {
    CELL_DELIMITER_RE.split(line).collect()
}

/// Status categories named in `query`, in first-mention order without repeats.
///
/// Single-letter codes such as `p` or `a` only count when the query names no
/// status by its full word, so the article in "took a leave" is not Absent.
pub fn requested_categories(query: &str) -> Vec<StatusCategory> {
    let lowered = query.to_lowercase();
    let mentions = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter_map(|token| {
            StatusCategory::from_query_token(token).map(|category| (category, token.len() == 1))
        })
        .collect::<Vec<_>>();
    let has_full_word = mentions.iter().any(|(_, is_letter)| !is_letter);

    let mut requested = Vec::new();
    for (category, is_letter) in mentions {
        if has_full_word && is_letter {
            continue;
        }
        if !requested.contains(&category) {
            requested.push(category);
        }
    }
    requested
}

/// Finds the first of the leading lines with a cell that names a status column.
pub fn locate_status_column(lines: &[&str]) -> Result<StatusColumn, QueryError> {
    for (header_row, line) in lines.iter().take(HEADER_SCAN_LINES).enumerate() {
        let hit = split_cells(line).into_iter().position(|cell| {
            let cell = cell.to_lowercase();
            HEADER_KEYWORDS.iter().any(|keyword| cell.contains(keyword))
        });
        if let Some(column) = hit {
            return Ok(StatusColumn { header_row, column });
        }
    }
    Err(QueryError::MalformedTable)
}

/// Counts recognised status values below the header. Lines too short to reach
/// the status column, and cells that are not a known status, are skipped.
pub fn tally(lines: &[&str], status_column: &StatusColumn) -> StatusTally {
    let mut tally = StatusTally::default();
    for line in lines.iter().skip(status_column.header_row + 1) {
        let cells = split_cells(line);
        let Some(cell) = cells.get(status_column.column) else {
            continue;
        };
        if let Some(category) = StatusCategory::from_cell(cell) {
            tally.increment(category);
        }
    }
    tally
}

/// Answers "how many present/absent/..." questions from a status column.
///
/// `None` means the query is not a status count, no status column was found,
/// or none of the requested categories occur; in every case the caller should
/// fall back to general retrieval rather than report zero.
pub fn count_statuses(query: &str, full_text: &str) -> Option<String> {
    if !has_counting_intent(query) {
        return None;
    }
    let requested = requested_categories(query);
    if requested.is_empty() {
        return None;
    }

    let lines = full_text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();

    let status_column = match locate_status_column(&lines) {
        Ok(found) => found,
        Err(error) => {
            debug!(%error, "status count skipped");
            return None;
        }
    };

    let tally = tally(&lines, &status_column);
    debug!(
        header_row = status_column.header_row,
        column = status_column.column,
        total = tally.total(),
        "status column tallied"
    );

    let parts = requested
        .into_iter()
        .filter(|category| tally.get(*category) > 0)
        .map(|category| format!("{category}: {}", tally.get(category)))
        .collect::<Vec<_>>();

    if parts.is_empty() {
        return None;
    }

    Some(format!("Status summary:\n{}", parts.join("\n")))
}
