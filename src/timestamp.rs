//! Acquisition timestamp decoding
//!
//! LIF headers store acquisition times as hexadecimal numbers, one per channel, in a
//! whitespace separated `TimeStampList`. The numbers are Windows FILETIME values
//! (100 ns ticks since 1601-01-01 UTC). They are decoded with hex-float literal rules
//! (`[sign][0x]digits[.digits][p±exp]`) so fractional or exponent forms also parse.

use chrono::{DateTime, Utc};

/// FILETIME ticks between 1601-01-01 and 1970-01-01.
const FILETIME_UNIX_EPOCH: f64 = 116_444_736_000_000_000.0;

/// FILETIME ticks per second.
const TICKS_PER_SECOND: f64 = 10_000_000.0;

/// Parse a hexadecimal floating point literal.
///
/// Accepts `1d3`, `0x1d3`, `-0x1.8p3`, `ff.8`. Returns `None` for anything without
/// at least one hex digit or with trailing garbage.
pub fn parse_hex_float(text: &str) -> Option<f64> {
    let text = text.trim();
    let (negative, rest) = match text.as_bytes().first()? {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };
    let rest = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
        .unwrap_or(rest);

    let (mantissa_text, exponent) = match rest.find(['p', 'P']) {
        Some(idx) => (&rest[..idx], rest[idx + 1..].parse::<i32>().ok()?),
        None => (rest, 0),
    };

    let (int_part, frac_part) = match mantissa_text.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (mantissa_text, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    // u128 keeps FILETIME-sized integers exact until the final conversion
    let mut mantissa: u128 = 0;
    let mut overflow_shift: i32 = 0;
    let mut digits = 0usize;
    for c in int_part.chars().chain(frac_part.chars()) {
        let d = c.to_digit(16)?;
        digits += 1;
        match mantissa.checked_mul(16) {
            Some(m) => mantissa = m + u128::from(d),
            None => overflow_shift = overflow_shift.saturating_add(4),
        }
    }
    if digits == 0 {
        return None;
    }

    let frac_bits = i32::try_from(frac_part.len()).ok()?.checked_mul(4)?;
    let scale = exponent
        .checked_add(overflow_shift)?
        .checked_sub(frac_bits)?;
    let value = (mantissa as f64) * 2f64.powi(scale);
    Some(if negative { -value } else { value })
}

/// Convert FILETIME ticks to a UTC timestamp.
pub fn filetime_to_datetime(ticks: f64) -> Option<DateTime<Utc>> {
    if !ticks.is_finite() {
        return None;
    }
    let unix_ticks = ticks - FILETIME_UNIX_EPOCH;
    let secs = (unix_ticks / TICKS_PER_SECOND).floor();
    let nanos = ((unix_ticks - secs * TICKS_PER_SECOND) * 100.0).round();
    DateTime::<Utc>::from_timestamp(secs as i64, (nanos as u32).min(999_999_999))
}

/// Combine the two 32-bit halves of a FILETIME.
pub fn filetime_from_parts(high: u32, low: u32) -> f64 {
    ((u64::from(high) << 32) | u64::from(low)) as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_plain_hex_integer() {
        assert_eq!(parse_hex_float("ff"), Some(255.0));
        assert_eq!(parse_hex_float("0x10"), Some(16.0));
        assert_eq!(parse_hex_float("  1A  "), Some(26.0));
    }

    #[test]
    fn test_fraction_and_exponent() {
        assert_eq!(parse_hex_float("0x1.8p3"), Some(12.0));
        assert_eq!(parse_hex_float("-0x.8"), Some(-0.5));
        assert_eq!(parse_hex_float("1p-1"), Some(0.5));
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(parse_hex_float(""), None);
        assert_eq!(parse_hex_float("0x"), None);
        assert_eq!(parse_hex_float("12g4"), None);
        assert_eq!(parse_hex_float("."), None);
        assert_eq!(parse_hex_float("1p"), None);
        assert_eq!(parse_hex_float("0.1p-2147483648"), None);
        assert_eq!(parse_hex_float("1p2147483647"), Some(f64::INFINITY));
    }

    #[test]
    fn test_filetime_sized_values_are_exact() {
        // 2020-01-01T00:00:00Z
        let ticks = 132_223_104_000_000_000u64;
        let hex = format!("{ticks:x}");
        assert_eq!(parse_hex_float(&hex), Some(ticks as f64));

        let dt = filetime_to_datetime(ticks as f64).unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2020, 1, 1));
        assert_eq!((dt.hour(), dt.minute(), dt.second()), (0, 0, 0));
    }

    #[test]
    fn test_filetime_from_parts() {
        assert_eq!(filetime_from_parts(1, 0), 4_294_967_296.0);
        assert_eq!(filetime_from_parts(0, 7), 7.0);
    }
}
