//! Report output: CSV rows and the run summary

pub mod csv;
pub mod summary;

pub use csv::{CsvExporter, CsvOutcome, DEFAULT_CSV_BYTE_LIMIT};
pub use summary::{format_summary_table, format_totals};
