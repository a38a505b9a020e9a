use std::time::Duration;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::many1,
    sequence::{pair, tuple},
    IResult,
};

use crate::error::DurationError;

/// Parse durations written like `10s`, `1m30s`, `1.5h` or `250ms`.
pub fn parse_duration(input: &str) -> Result<Duration, DurationError> {
    if input.is_empty() {
        return Err(DurationError::Empty);
    }
    let (_, segments) = all_consuming(many1(segment))(input).map_err(|_| DurationError::Invalid(input.to_string()))?;
    segments.into_iter().try_fold(Duration::ZERO, |acc, (value, unit)| {
        let nanos = (value * unit.nanos()).round();
        if !nanos.is_finite() || nanos >= u64::MAX as f64 {
            return Err(DurationError::Overflow(input.to_string()));
        }
        acc.checked_add(Duration::from_nanos(nanos as u64)).ok_or_else(|| DurationError::Overflow(input.to_string()))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Hour,
    Minute,
    Second,
    Milli,
    Micro,
    Nano,
}
impl Unit {
    fn nanos(self) -> f64 {
        match self {
            Unit::Hour => 3_600e9,
            Unit::Minute => 60e9,
            Unit::Second => 1e9,
            Unit::Milli => 1e6,
            Unit::Micro => 1e3,
            Unit::Nano => 1.,
        }
    }
}

fn number(input: &str) -> IResult<&str, f64> {
    map_res(recognize(pair(digit1, opt(pair(char('.'), digit1)))), str::parse)(input)
}

fn unit(input: &str) -> IResult<&str, Unit> {
    // `ms` must be tried before `m`
    alt((
        map(tag("ms"), |_| Unit::Milli),
        map(alt((tag("us"), tag("µs"))), |_| Unit::Micro),
        map(tag("ns"), |_| Unit::Nano),
        map(tag("h"), |_| Unit::Hour),
        map(tag("m"), |_| Unit::Minute),
        map(tag("s"), |_| Unit::Second),
    ))(input)
}

fn segment(input: &str) -> IResult<&str, (f64, Unit)> {
    tuple((number, unit))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_unit() {
        assert_eq!(parse_duration("10s"), Ok(Duration::from_secs(10)));
        assert_eq!(parse_duration("500ms"), Ok(Duration::from_millis(500)));
        assert_eq!(parse_duration("2h"), Ok(Duration::from_secs(7200)));
        assert_eq!(parse_duration("3m"), Ok(Duration::from_secs(180)));
        assert_eq!(parse_duration("40us"), Ok(Duration::from_micros(40)));
        assert_eq!(parse_duration("40µs"), Ok(Duration::from_micros(40)));
        assert_eq!(parse_duration("7ns"), Ok(Duration::from_nanos(7)));
    }

    #[test]
    fn test_parse_compound() {
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("1h1m1s"), Ok(Duration::from_secs(3661)));
        assert_eq!(parse_duration("1s500ms"), Ok(Duration::from_millis(1500)));
    }

    #[test]
    fn test_parse_fraction() {
        assert_eq!(parse_duration("1.5s"), Ok(Duration::from_millis(1500)));
        assert_eq!(parse_duration("0.5m"), Ok(Duration::from_secs(30)));
    }

    #[test]
    fn test_parse_invalid() {
        assert_eq!(parse_duration(""), Err(DurationError::Empty));
        assert_eq!(parse_duration("10"), Err(DurationError::Invalid("10".to_string())));
        assert_eq!(parse_duration("s"), Err(DurationError::Invalid("s".to_string())));
        assert_eq!(parse_duration("10 s"), Err(DurationError::Invalid("10 s".to_string())));
        assert_eq!(parse_duration("10d"), Err(DurationError::Invalid("10d".to_string())));
        assert_eq!(parse_duration("-1s"), Err(DurationError::Invalid("-1s".to_string())));
    }
}
