//! CSV export for compliance rows
//!
//! Rows are written as they arrive from the stream. Once the configured byte
//! limit would be exceeded the exporter stops writing and reports the output
//! as truncated instead of failing the run.

use std::io::{self, Write};

use log::{debug, warn};
use serde::Serialize;

use crate::report::CsvRow;

/// Default cap on the size of a generated CSV (15 MB)
pub const DEFAULT_CSV_BYTE_LIMIT: usize = 15 * 1024 * 1024;

const DELIMITER: char = ',';
const QUOTE: char = '"';

/// What the exporter produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CsvOutcome {
    pub rows_written: usize,
    pub rows_dropped: usize,
    pub bytes_written: usize,
    pub truncated: bool,
}

pub struct CsvExporter<W: Write> {
    writer: W,
    byte_limit: Option<usize>,
    bytes_written: usize,
    rows_written: usize,
    rows_dropped: usize,
    truncated: bool,
}

impl<W: Write> CsvExporter<W> {
    /// Create an exporter and write the header line
    pub fn new(writer: W, byte_limit: Option<usize>) -> io::Result<Self> {
        let mut exporter = Self {
            writer,
            byte_limit,
            bytes_written: 0,
            rows_written: 0,
            rows_dropped: 0,
            truncated: false,
        };

        let header = encode_record(CsvRow::HEADERS.iter().copied());
        exporter.writer.write_all(header.as_bytes())?;
        exporter.bytes_written += header.len();
        Ok(exporter)
    }

    pub fn write_row(&mut self, row: &CsvRow<'_>) -> io::Result<()> {
        if self.truncated {
            self.rows_dropped += 1;
            return Ok(());
        }

        let record = row.to_record();
        let line = encode_record(record.iter().map(String::as_str));

        if let Some(limit) = self.byte_limit {
            if self.bytes_written + line.len() > limit {
                warn!(
                    "CSV byte limit of {} reached after {} rows, remaining rows are dropped",
                    limit, self.rows_written
                );
                self.truncated = true;
                self.rows_dropped += 1;
                return Ok(());
            }
        }

        self.writer.write_all(line.as_bytes())?;
        self.bytes_written += line.len();
        self.rows_written += 1;
        Ok(())
    }

    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Flush and hand back the totals along with the writer
    pub fn finish(mut self) -> io::Result<(CsvOutcome, W)> {
        self.writer.flush()?;
        let outcome = CsvOutcome {
            rows_written: self.rows_written,
            rows_dropped: self.rows_dropped,
            bytes_written: self.bytes_written,
            truncated: self.truncated,
        };
        debug!("CSV export finished: {:?}", outcome);
        Ok((outcome, self.writer))
    }
}

fn encode_record<'a>(fields: impl Iterator<Item = &'a str>) -> String {
    let mut line = String::new();
    for (i, field) in fields.enumerate() {
        if i > 0 {
            line.push(DELIMITER);
        }
        line.push_str(&escape_field(field));
    }
    line.push('\n');
    line
}

/// Quote fields that need it and defuse spreadsheet formulas
fn escape_field(field: &str) -> String {
    let sanitized = if field.starts_with(['=', '+', '-', '@', '\t', '\r']) {
        format!("'{}", field)
    } else {
        field.to_string()
    };

    if sanitized.contains([DELIMITER, QUOTE, '\n', '\r']) {
        format!("{q}{}{q}", sanitized.replace(QUOTE, "\"\""), q = QUOTE)
    } else {
        sanitized
    }
}
