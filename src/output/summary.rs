//! Per-project run summary, rendered with prettytable-rs

use prettytable::{format, Cell, Row, Table};

use crate::output::CsvOutcome;
use crate::report::ProjectSummary;

const HEADERS: [&str; 4] = ["Project", "Commits", "Rows", "Status"];

/// Render a compact table of what each project contributed
pub fn format_summary_table(summaries: &[ProjectSummary]) -> String {
    if summaries.is_empty() {
        return String::new();
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.add_row(Row::new(HEADERS.iter().map(|h| Cell::new(h)).collect()));

    for summary in summaries {
        let status = match &summary.repository_error {
            Some(error) => format!("skipped: {}", error),
            None => "ok".to_string(),
        };
        table.add_row(Row::new(vec![
            Cell::new(&summary.project),
            Cell::new(&summary.commits.to_string()),
            Cell::new(&summary.rows.to_string()),
            Cell::new(&status),
        ]));
    }

    // Indent to sit under the totals line
    table
        .to_string()
        .lines()
        .map(|line| format!("  {}\n", line))
        .collect()
}

/// One-line totals for the end of a run
pub fn format_totals(row_count: usize, outcome: &CsvOutcome) -> String {
    let mut totals = format!(
        "Rows: {} | Written: {} | Bytes: {}",
        row_count,
        outcome.rows_written,
        crate::cli::size_parser::format_byte_size(outcome.bytes_written)
    );
    if outcome.truncated {
        totals.push_str(&format!(" | Truncated: {} rows dropped", outcome.rows_dropped));
    }
    totals
}
