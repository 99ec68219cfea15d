//! Human-readable size parsing for `max_body_size`.
//!
//! Multipliers are decimal (k = 1000), with or without a trailing `b`,
//! case-insensitive. A bare number is a byte count.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size {input:?}: {reason}")]
pub struct SizeParseError {
    pub input: String,
    pub reason: &'static str,
}

/// Parse "10MB", "1.5k", "512" into a byte count.
pub fn parse_human_size(input: &str) -> Result<u64, SizeParseError> {
    let err = |reason| SizeParseError {
        input: input.to_string(),
        reason,
    };

    let trimmed = input.trim();
    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);

    if number.is_empty() {
        return Err(err("missing number"));
    }
    let value: f64 = number.parse().map_err(|_| err("malformed number"))?;

    let unit = unit.trim().to_ascii_lowercase();
    let multiplier: f64 = match unit.strip_suffix('b').unwrap_or(&unit) {
        "" => 1.0,
        "k" => 1e3,
        "m" => 1e6,
        "g" => 1e9,
        "t" => 1e12,
        "p" => 1e15,
        _ => return Err(err("unknown unit")),
    };
    let bytes = value * multiplier;
    if !bytes.is_finite() || bytes > u64::MAX as f64 {
        return Err(err("out of range"));
    }
    Ok(bytes as u64)
}
