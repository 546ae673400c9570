//! Duration parsing for spec fields.
//!
//! Two wire formats appear across the CR schemas (spec.md §6.1): Go-style
//! shorthand (`30s`, `5m`, `1h`) for scaling/health-check fields, and
//! ISO-8601 (`PT30S`) for broker/DLQ fields. [`Duration`] parses either and
//! normalizes to a [`std::time::Duration`].
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::{fmt, str::FromStr, time};

/// A duration accepted from either Go-style shorthand or ISO-8601.
#[derive(Copy, Clone, PartialEq, Eq, Default)]
pub struct Duration(time::Duration);

#[derive(Debug, thiserror::Error, Eq, PartialEq)]
#[non_exhaustive]
pub enum ParseError {
    #[error("invalid unit: {}", EXPECTED_UNITS)]
    InvalidUnit,
    #[error("missing a unit: {}", EXPECTED_UNITS)]
    NoUnit,
    #[error("invalid floating-point number: {0}")]
    NotANumber(#[from] std::num::ParseFloatError),
    #[error("invalid ISO-8601 duration")]
    InvalidIso8601,
    #[error("empty duration string")]
    Empty,
}

const EXPECTED_UNITS: &str = "expected one of 'ns', 'us', 'ms', 's', 'm', or 'h'";

impl From<time::Duration> for Duration {
    fn from(duration: time::Duration) -> Self {
        Self(duration)
    }
}

impl From<Duration> for time::Duration {
    fn from(Duration(duration): Duration) -> Self {
        duration
    }
}

impl Duration {
    pub fn as_std(&self) -> time::Duration {
        self.0
    }
}

impl fmt::Debug for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl fmt::Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0, f)
    }
}

impl FromStr for Duration {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ParseError::Empty);
        }
        if let Some(rest) = s.strip_prefix('P') {
            return parse_iso8601(rest).map(Duration);
        }
        parse_shorthand(s).map(Duration)
    }
}

fn parse_shorthand(mut s: &str) -> Result<time::Duration, ParseError> {
    let mut total = time::Duration::default();
    let mut saw_unit = false;
    while !s.is_empty() {
        let num_end = s
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or(ParseError::NoUnit)?;
        if num_end == 0 {
            return Err(ParseError::NoUnit);
        }
        let (num_str, rest) = s.split_at(num_end);
        let value: f64 = num_str.parse()?;
        let (unit_len, secs_per_unit) = if rest.starts_with("ns") {
            (2, 1e-9)
        } else if rest.starts_with("us") {
            (2, 1e-6)
        } else if rest.starts_with("ms") {
            (2, 1e-3)
        } else if rest.starts_with('s') {
            (1, 1.0)
        } else if rest.starts_with('m') {
            (1, 60.0)
        } else if rest.starts_with('h') {
            (1, 3600.0)
        } else {
            return Err(ParseError::InvalidUnit);
        };
        total += time::Duration::from_secs_f64(value * secs_per_unit);
        s = &rest[unit_len..];
        saw_unit = true;
    }
    if !saw_unit {
        return Err(ParseError::NoUnit);
    }
    Ok(total)
}

/// Minimal ISO-8601 duration parser: `PT#H#M#S` (the only form produced or
/// consumed by the broker/DLQ schema fields in spec.md §6.1).
fn parse_iso8601(s: &str) -> Result<time::Duration, ParseError> {
    let s = s.strip_prefix('T').ok_or(ParseError::InvalidIso8601)?;
    let mut total = time::Duration::default();
    let mut buf = String::new();
    let mut saw_component = false;
    for c in s.chars() {
        match c {
            '0'..='9' | '.' => buf.push(c),
            'H' | 'M' | 'S' => {
                let value: f64 = buf.parse().map_err(|_| ParseError::InvalidIso8601)?;
                buf.clear();
                let secs = match c {
                    'H' => value * 3600.0,
                    'M' => value * 60.0,
                    'S' => value,
                    _ => unreachable!(),
                };
                total += time::Duration::from_secs_f64(secs);
                saw_component = true;
            }
            _ => return Err(ParseError::InvalidIso8601),
        }
    }
    if !buf.is_empty() || !saw_component {
        return Err(ParseError::InvalidIso8601);
    }
    Ok(total)
}

impl Serialize for Duration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}s", self.0.as_secs_f64()))
    }
}

impl<'de> Deserialize<'de> for Duration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

impl schemars::JsonSchema for Duration {
    fn schema_name() -> String {
        "Duration".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_shorthand_seconds() {
        assert_eq!(Duration::from_str("30s").unwrap().as_std(), time::Duration::from_secs(30));
    }

    #[test]
    fn parses_shorthand_compound() {
        assert_eq!(
            Duration::from_str("1h30m").unwrap().as_std(),
            time::Duration::from_secs(5400)
        );
    }

    #[test]
    fn parses_iso8601() {
        assert_eq!(Duration::from_str("PT30S").unwrap().as_std(), time::Duration::from_secs(30));
        assert_eq!(
            Duration::from_str("PT1H30M").unwrap().as_std(),
            time::Duration::from_secs(5400)
        );
    }

    #[test]
    fn rejects_missing_unit() {
        assert_eq!(Duration::from_str("30").unwrap_err(), ParseError::NoUnit);
    }

    #[test]
    fn rejects_empty() {
        assert_eq!(Duration::from_str("").unwrap_err(), ParseError::Empty);
    }

    #[test]
    fn roundtrips_through_json() {
        let d: Duration = "5m".parse().unwrap();
        let json = serde_json::to_string(&d).unwrap();
        let back: Duration = serde_json::from_str(&json).unwrap();
        assert_eq!(d, back);
    }
}
