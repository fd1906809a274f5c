//! Amounts are carried internally as integer minor units (exponent 2) so that
//! markup arithmetic stays exact; the provider and the public API both speak
//! decimal strings.

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MoneyError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

/// Parse a decimal string like "430.00" or "430" into minor units (43000).
/// At most two fractional digits are accepted.
pub fn parse_minor(amount: &str) -> Result<i64, MoneyError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(MoneyError::InvalidAmount(amount.to_string()));
    }

    let (sign, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, trimmed),
    };

    let (whole, frac) = match digits.split_once('.') {
        Some((w, f)) => (w, f),
        None => (digits, ""),
    };

    if whole.is_empty() || frac.len() > 2 {
        return Err(MoneyError::InvalidAmount(amount.to_string()));
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(MoneyError::InvalidAmount(amount.to_string()));
    }

    let whole: i64 = whole
        .parse()
        .map_err(|_| MoneyError::InvalidAmount(amount.to_string()))?;
    let frac_minor: i64 = match frac.len() {
        0 => 0,
        1 => frac.parse::<i64>().map_err(|_| MoneyError::InvalidAmount(amount.to_string()))? * 10,
        _ => frac.parse().map_err(|_| MoneyError::InvalidAmount(amount.to_string()))?,
    };

    whole
        .checked_mul(100)
        .and_then(|w| w.checked_add(frac_minor))
        .map(|v| sign * v)
        .ok_or_else(|| MoneyError::InvalidAmount(amount.to_string()))
}

/// Format minor units back to a two-decimal string (43000 -> "430.00").
pub fn format_minor(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}
