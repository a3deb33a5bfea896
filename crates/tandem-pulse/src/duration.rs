//! Human-readable duration parsing (`"30s"`, `"15m"`, `"4h"`).

use tandem_core::TandemError;

/// Parse a duration string into whole seconds.
///
/// The string must be one or more ASCII digits followed by exactly one unit
/// suffix: `s` (seconds), `m` (minutes) or `h` (hours).
///
/// # Errors
///
/// Returns [`TandemError::Format`] when the suffix is missing or unknown,
/// the prefix is empty or not purely numeric, or the scaled value overflows.
///
/// # Examples
///
/// ```
/// use tandem_pulse::duration::parse_duration;
///
/// assert_eq!(parse_duration("30s").unwrap(), 30);
/// assert_eq!(parse_duration("2m").unwrap(), 120);
/// assert_eq!(parse_duration("4h").unwrap(), 14_400);
/// assert!(parse_duration("3d").is_err());
/// ```
pub fn parse_duration(input: &str) -> Result<i64, TandemError> {
    let format_error = || TandemError::Format(input.to_string());

    let unit = input.chars().last().ok_or_else(format_error)?;
    let scale: i64 = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        _ => return Err(format_error()),
    };

    let digits = &input[..input.len() - unit.len_utf8()];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format_error());
    }

    let value: i64 = digits.parse().map_err(|_| format_error())?;
    value.checked_mul(scale).ok_or_else(format_error)
}
