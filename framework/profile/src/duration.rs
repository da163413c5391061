use std::time::Duration;

/// Longest duration a single parsed value can express, 30 days.
pub const MAX_DURATION_SECS: u64 = 30 * 24 * 60 * 60;

/// How to read a duration that has no `m` or `s` suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BareUnit {
    Minutes,
    Seconds,
}

/// Parse a duration expression such as `2m`, `90s` or a bare `3` into whole seconds.
///
/// A bare number is read as minutes, matching how `DURATION` is written. The result is never less
/// than 1 second and never more than [MAX_DURATION_SECS]. Missing, empty or unparseable input returns `fallback` unchanged.
pub fn parse_seconds(input: Option<&str>, fallback: u64) -> u64 {
    parse_seconds_as(input, fallback, BareUnit::Minutes)
}

/// Like [parse_seconds] but with an explicit unit for bare numbers.
pub fn parse_seconds_as(input: Option<&str>, fallback: u64, bare: BareUnit) -> u64 {
    let Some(raw) = input.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback;
    };

    let (number, scale) = if let Some(prefix) = raw.strip_suffix('m') {
        (prefix, 60)
    } else if let Some(prefix) = raw.strip_suffix('s') {
        (prefix, 1)
    } else {
        match bare {
            BareUnit::Minutes => (raw, 60),
            BareUnit::Seconds => (raw, 1),
        }
    };

    match parse_int_prefix(number) {
        Some(n) => n.saturating_mul(scale).clamp(1, MAX_DURATION_SECS as i64) as u64,
        None => fallback,
    }
}

/// Convenience wrapper around [parse_seconds] returning a [Duration].
pub fn parse_duration(input: Option<&str>, fallback: Duration) -> Duration {
    Duration::from_secs(parse_seconds(input, fallback.as_secs()))
}

/// Read the leading integer of `input`, ignoring anything after it.
///
/// `"20"`, `" 20 "` and `"20rps"` all give 20. Returns `None` when there are no leading digits.
pub fn parse_int_prefix(input: &str) -> Option<i64> {
    let s = input.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };

    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return None;
    }

    // Saturate rather than fail on absurdly long inputs.
    let value = digits[..end].parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -value } else { value })
}

/// Format whole seconds the way stage durations are written, e.g. `120s`.
pub fn format_seconds(duration: Duration) -> String {
    format!("{}s", duration.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_suffix_is_scaled() {
        assert_eq!(120, parse_seconds(Some("2m"), 600));
        assert_eq!(60, parse_seconds(Some("1m"), 600));
    }

    #[test]
    fn second_suffix_is_kept() {
        assert_eq!(90, parse_seconds(Some("90s"), 600));
        assert_eq!(1, parse_seconds(Some("1s"), 600));
    }

    #[test]
    fn missing_input_returns_fallback_exactly() {
        assert_eq!(600, parse_seconds(None, 600));
        assert_eq!(7, parse_seconds(Some(""), 7));
        assert_eq!(7, parse_seconds(Some("   "), 7));
    }

    #[test]
    fn bare_number_follows_caller_unit() {
        assert_eq!(180, parse_seconds(Some("3"), 600));
        assert_eq!(3, parse_seconds_as(Some("3"), 600, BareUnit::Seconds));
    }

    #[test]
    fn garbage_degrades_to_fallback() {
        assert_eq!(600, parse_seconds(Some("soon"), 600));
        assert_eq!(600, parse_seconds(Some("m"), 600));
        assert_eq!(600, parse_seconds(Some("xs"), 600));
    }

    #[test]
    fn never_below_one_second() {
        assert_eq!(1, parse_seconds(Some("0s"), 600));
        assert_eq!(1, parse_seconds(Some("-5m"), 600));
    }

    #[test]
    fn oversized_values_are_capped() {
        assert_eq!(
            MAX_DURATION_SECS,
            parse_seconds(Some("99999999999999999999m"), 600)
        );
        assert_eq!(
            MAX_DURATION_SECS,
            parse_seconds_as(Some("9223372036854775807"), 600, BareUnit::Seconds)
        );
    }

    #[test]
    fn trailing_text_after_number_is_ignored() {
        assert_eq!(Some(20), parse_int_prefix("20rps"));
        assert_eq!(Some(1), parse_int_prefix("1.5"));
        assert_eq!(Some(-3), parse_int_prefix(" -3"));
        assert_eq!(None, parse_int_prefix("abc"));
        assert_eq!(None, parse_int_prefix("-"));
    }

    #[test]
    fn duration_wrapper() {
        assert_eq!(
            Duration::from_secs(30),
            parse_duration(Some("30s"), Duration::from_secs(5))
        );
        assert_eq!(
            Duration::from_secs(5),
            parse_duration(None, Duration::from_secs(5))
        );
        assert_eq!("120s", format_seconds(Duration::from_secs(120)));
    }
}
