use std::str::FromStr;
use std::time::Duration;

use crate::ConfigLoadError;

/// Read `name`, treating unset and blank values alike.
pub fn non_blank_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

/// Parse a raw environment value, naming the variable on failure.
pub fn parse_value<T>(
    name: &'static str,
    raw: &str,
) -> Result<T, ConfigLoadError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse()
        .map_err(|err: T::Err| ConfigLoadError::InvalidEnvValue {
            name,
            value: raw.to_string(),
            reason: err.to_string(),
        })
}

/// Parse a humantime duration such as `5s` or `1m 30s`.
pub fn parse_duration(
    name: &'static str,
    raw: &str,
) -> Result<Duration, ConfigLoadError> {
    humantime::parse_duration(raw.trim()).map_err(|err| {
        ConfigLoadError::InvalidEnvValue {
            name,
            value: raw.to_string(),
            reason: err.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbers_and_durations() {
        assert_eq!(parse_value::<u32>("N", " 12 ").ok(), Some(12));
        assert_eq!(
            parse_duration("D", "1m 30s").ok(),
            Some(Duration::from_secs(90))
        );
    }

    #[test]
    fn reports_the_offending_variable() {
        let err = parse_value::<u16>("DATABASE_PORT", "abc").unwrap_err();
        assert!(matches!(
            err,
            ConfigLoadError::InvalidEnvValue { name: "DATABASE_PORT", .. }
        ));
        assert!(parse_duration("DATABASE_ACQUIRE_TIMEOUT", "soon").is_err());
    }
}
