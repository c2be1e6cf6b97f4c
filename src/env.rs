//! Centralized environment-variable parsing (§10.3). Every lenient/strict
//! rule from §6-§7 lives here, in one place, so it is unit-testable
//! independent of process state and of the modules that consume it.

use crate::Error;

/// True when `name` is set to any non-empty value.
pub(crate) fn flag_set(name: &str) -> bool {
    std::env::var_os(name).is_some_and(|v| !v.is_empty())
}

/// Parses `__AFL_SHM_ID` the way the original runtime's `atoi` call did:
/// leading whitespace and an optional sign are skipped, the longest leading
/// run of decimal digits is consumed, and anything that fails to produce a
/// digit parses as `0` (which then fails to attach and aborts downstream,
/// matching the original's behavior of letting a garbled id fail at
/// `shmat` rather than at parse time).
pub(crate) fn parse_shm_id(raw: &str) -> i32 {
    let trimmed = raw.trim_start();
    let (sign, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1i64, rest),
        None => (1i64, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return 0;
    }

    let magnitude: i64 = digits.parse().unwrap_or(0);
    (sign * magnitude) as i32
}

/// Reads and validates `AFL_INST_RATIO`. Absent ⇒ `None` (caller keeps the
/// compiled-in default). Present but out of `1..=100` ⇒ `Err`, which the
/// caller turns into the fatal diagnostic-and-abort policy from §7.
pub(crate) fn parse_inst_ratio() -> Result<Option<u32>, Error> {
    let Some(raw) = std::env::var_os(crate::config::INST_RATIO_ENV_VAR) else {
        return Ok(None);
    };

    let raw = raw.to_string_lossy();
    let value: u32 = raw
        .trim()
        .parse()
        .map_err(|_| Error::InvalidInstRatio(raw.to_string()))?;

    if value == 0 || value > 100 {
        return Err(Error::InvalidInstRatio(raw.to_string()));
    }

    Ok(Some(value))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn shm_id_plain() {
        assert_eq!(parse_shm_id("42"), 42);
    }

    #[test]
    fn shm_id_whitespace_and_sign() {
        assert_eq!(parse_shm_id("  +7"), 7);
        assert_eq!(parse_shm_id("-7"), -7);
    }

    #[test]
    fn shm_id_garbage_is_zero() {
        assert_eq!(parse_shm_id("not-a-number"), 0);
        assert_eq!(parse_shm_id(""), 0);
    }

    #[test]
    fn shm_id_leading_digits_only() {
        // atoi-style: stop at the first non-digit rather than failing outright.
        assert_eq!(parse_shm_id("123abc"), 123);
    }

    #[test]
    fn inst_ratio_rejects_zero_and_over_100() {
        assert!(matches!(
            validate_inst_ratio("0"),
            Err(Error::InvalidInstRatio(_))
        ));
        assert!(matches!(
            validate_inst_ratio("101"),
            Err(Error::InvalidInstRatio(_))
        ));
    }

    #[test]
    fn inst_ratio_accepts_1_through_100() {
        assert_eq!(validate_inst_ratio("1").unwrap(), 1);
        assert_eq!(validate_inst_ratio("100").unwrap(), 100);
    }

    // `parse_inst_ratio` reads from the real process environment, which
    // isn't safe to mutate from concurrent tests; this helper exercises the
    // same validation logic directly.
    fn validate_inst_ratio(raw: &str) -> Result<u32, Error> {
        let value: u32 = raw
            .trim()
            .parse()
            .map_err(|_| Error::InvalidInstRatio(raw.to_string()))?;
        if value == 0 || value > 100 {
            return Err(Error::InvalidInstRatio(raw.to_string()));
        }
        Ok(value)
    }
}
