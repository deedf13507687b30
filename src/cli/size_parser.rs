//! Byte size parsing for the CSV output limit
//!
//! Accepts a plain byte count or a number with a binary unit suffix
//! (K, M, G with an optional B / iB), e.g. "15MB", "512K", "0.5G".

use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SizeParseError {
    #[error("Invalid size format: {input}. Expected format like '15MB', '512K', '1048576'")]
    InvalidFormat { input: String },

    #[error("Invalid size unit: {unit}. Supported units: B, K, M, G (with optional 'B' or 'iB' suffix)")]
    InvalidUnit { unit: String },

    #[error("Size too large: {input}")]
    TooLarge { input: String },
}

/// Parse a size string into bytes
pub fn parse_byte_size(input: &str) -> Result<usize, SizeParseError> {
    let normalized = input.trim().to_uppercase();
    let invalid = || SizeParseError::InvalidFormat { input: input.to_string() };

    let split = normalized
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(normalized.len());
    let (number, unit) = normalized.split_at(split);
    if number.is_empty() {
        return Err(invalid());
    }

    let value: f64 = number.parse().map_err(|_| invalid())?;
    let multiplier: u64 = match unit.trim() {
        "" | "B" | "BYTES" => 1,
        "K" | "KB" | "KIB" => 1 << 10,
        "M" | "MB" | "MIB" => 1 << 20,
        "G" | "GB" | "GIB" => 1 << 30,
        other => return Err(SizeParseError::InvalidUnit { unit: other.to_string() }),
    };

    let bytes = value * multiplier as f64;
    if !bytes.is_finite() || bytes > usize::MAX as f64 {
        return Err(SizeParseError::TooLarge { input: input.to_string() });
    }
    Ok(bytes as usize)
}

/// Render a byte count with the largest whole unit
pub fn format_byte_size(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 || size.fract() == 0.0 {
        format!("{:.0} {}", size, UNITS[unit])
    } else {
        format!("{:.1} {}", size, UNITS[unit])
    }
}
