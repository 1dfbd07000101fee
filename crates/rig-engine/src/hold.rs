//! Hold duration parsing
//!
//! Accepts the compact duration syntax operators are used to from other
//! tools: a sequence of decimal numbers, each with an optional fraction and a
//! unit, e.g. `300ms`, `1.5s`, `1m30s`, `2h`. A bare `0` is allowed. Units are
//! `ns`, `us` (or `µs`), `ms`, `s`, `m` and `h`.
//!
//! `Duration`'s `Debug` output (`1.5s`, `300ms`, `10µs`) parses back to the
//! same value, so it doubles as the display format.

use std::time::Duration;

use crate::error::ValidationError;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Parse an operator-entered hold duration, rejecting negative values
pub fn parse_hold(text: &str) -> Result<Duration, ValidationError> {
    let invalid = || ValidationError::InvalidDuration(text.to_string());

    let trimmed = text.trim();
    let (negative, mut rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    if rest == "0" {
        return Ok(Duration::ZERO);
    }
    if rest.is_empty() {
        return Err(invalid());
    }

    let mut total: u128 = 0;
    while !rest.is_empty() {
        let int_len = leading_digits(rest);
        let int_part = &rest[..int_len];
        rest = &rest[int_len..];

        let mut frac_part = "";
        if let Some(after_dot) = rest.strip_prefix('.') {
            let frac_len = leading_digits(after_dot);
            frac_part = &after_dot[..frac_len];
            rest = &after_dot[frac_len..];
        }
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        let scale: u128 = match unit {
            "ns" => 1,
            "us" | "µs" | "μs" => 1_000,
            "ms" => 1_000_000,
            "s" => NANOS_PER_SEC,
            "m" => 60 * NANOS_PER_SEC,
            "h" => 3600 * NANOS_PER_SEC,
            _ => return Err(invalid()),
        };

        let whole = if int_part.is_empty() {
            0
        } else {
            int_part.parse::<u128>().map_err(|_| invalid())?
        };

        // Digits past nanosecond resolution of the largest unit cannot matter
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        let frac = if frac_digits.is_empty() {
            0
        } else {
            let value = frac_digits.parse::<u128>().map_err(|_| invalid())?;
            value * scale / 10u128.pow(frac_digits.len() as u32)
        };

        total = whole
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac))
            .and_then(|v| v.checked_add(total))
            .filter(|v| *v <= u64::MAX as u128)
            .ok_or_else(invalid)?;
    }

    if negative && total > 0 {
        return Err(ValidationError::NegativeDuration(text.to_string()));
    }

    Ok(Duration::new(
        (total / NANOS_PER_SEC) as u64,
        (total % NANOS_PER_SEC) as u32,
    ))
}

fn leading_digits(s: &str) -> usize {
    s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len())
}
