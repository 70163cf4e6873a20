//! Engineering units and SI prefix handling.

/// Decimal exponents recognized after the numeric part of a value.
///
/// `MEG` comes first so that it wins over `M`.
const SCALE_SUFFIXES: &[(&str, i32)] = &[
    ("MEG", 6),
    ("T", 12),
    ("G", 9),
    ("K", 3),
    ("M", -3),
    ("U", -6),
    ("N", -9),
    ("P", -12),
    ("F", -15),
];

/// One thousandth of an inch in meters.
const MIL: f64 = 25.4e-6;

/// Parse a SPICE-style value with optional SI suffix.
///
/// Supported suffixes:
/// - T (tera, 1e12)
/// - G (giga, 1e9)
/// - MEG (mega, 1e6)
/// - K (kilo, 1e3)
/// - M (milli, 1e-3)
/// - MIL (1/1000 inch, 25.4e-6)
/// - U (micro, 1e-6)
/// - N (nano, 1e-9)
/// - P (pico, 1e-12)
/// - F (femto, 1e-15)
///
/// Letters following the scale factor are unit names and are ignored, as
/// are unit letters with no scale factor (`10uF`, `5V`, `1kOhm`).
pub fn parse_value(s: &str) -> Option<f64> {
    let s = s.trim().to_uppercase();

    // Rust accepts "inf" and "nan"; SPICE does not.
    if !s.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '+' | '-' | '.')) {
        return None;
    }

    if let Ok(v) = s.parse::<f64>() {
        return Some(v);
    }

    let num_end = numeric_prefix_len(&s);
    if num_end == 0 {
        return None;
    }

    let (num_str, suffix) = s.split_at(num_end);
    let value: f64 = num_str.parse().ok()?;

    if !suffix.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }

    if suffix.starts_with("MIL") {
        return Some(value * MIL);
    }

    match SCALE_SUFFIXES.iter().find(|(prefix, _)| suffix.starts_with(prefix)) {
        // Re-parse with the exponent so 10u is exactly 1e-5.
        Some((_, exp)) if !num_str.contains('E') => format!("{}E{}", num_str, exp).parse().ok(),
        Some((_, exp)) => Some(value * 10f64.powi(*exp)),
        None => Some(value),
    }
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` run.
fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
        i += 1;
    }
    if i == digits_start {
        return 0;
    }
    // Exponent only if digits follow, so "1F" stays femto.
    if i < bytes.len() && bytes[i] == b'E' {
        let mut j = i + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < bytes.len() && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            i = j;
        }
    }
    i
}
