// src/process/utils.rs
use std::borrow::Cow;

/// Trim whitespace and strip outer quotes if present.
pub fn clean_str(raw: &str) -> &str {
    let trimmed = raw.trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim()
    } else {
        trimmed
    }
}

/// Blank and whitespace-only cells are missing values.
pub fn is_blank(raw: &str) -> bool {
    clean_str(raw).is_empty()
}

/// Decode a raw CSV field: UTF-8 when valid, otherwise Latin-1, which maps
/// every byte to the code point of the same value.
pub fn decode_field(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(_) => Cow::Owned(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Coerce a cell to a number; blanks and non-numeric residue are `None`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Integer-valued codes such as `"09"`, `"9"` or `"9.0"`.
pub fn parse_code(raw: &str) -> Option<i64> {
    let v = parse_numeric(raw)?;
    if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
        Some(v as i64)
    } else {
        None
    }
}

/// Canonical form used for join-key matching: numbers compare by value,
/// anything else by its trimmed text.
pub fn normalize_key(raw: &str) -> String {
    match parse_numeric(raw) {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => format!("{}", v),
        None => clean_str(raw).to_string(),
    }
}
