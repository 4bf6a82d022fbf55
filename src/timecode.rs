use std::fmt;
use std::str::FromStr;

use nom::bytes::complete::{take_while1, take_while_m_n};
use nom::character::complete::{char, space0};
use nom::combinator::{all_consuming, map_res, verify};
use nom::IResult;
use thiserror::Error;

/// A single `HH:MM:SS,mmm` value that failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed timestamp: '{0}'")]
pub struct MalformedTimestamp(pub String);

/// How frame offsets are turned into wall-clock timestamps when writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precision {
    /// Keep milliseconds.
    #[default]
    Millisecond,
    /// Truncate to whole seconds. Matches files written by older versions of the tool,
    /// which never carried sub-second information.
    WholeSecond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Timestamp {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub millis: u32,
}

impl Timestamp {
    pub fn from_millis(total: u64) -> Self {
        let total_secs = total / 1000;
        Timestamp {
            hours: (total_secs / 3600) as u32,
            minutes: ((total_secs % 3600) / 60) as u32,
            seconds: (total_secs % 60) as u32,
            millis: (total % 1000) as u32,
        }
    }

    pub fn total_millis(&self) -> u64 {
        u64::from(self.millis)
            + u64::from(self.seconds) * 1000
            + u64::from(self.minutes) * 60 * 1000
            + u64::from(self.hours) * 60 * 60 * 1000
    }

    /// Wall-clock time of frame `offset`. The division is exact integer arithmetic,
    /// which is the real-valued quotient truncated to the millisecond.
    pub fn from_frame(offset: usize, sample_rate: u32, precision: Precision) -> Self {
        let millis = offset as u64 * 1000 / u64::from(sample_rate);
        match precision {
            Precision::Millisecond => Timestamp::from_millis(millis),
            Precision::WholeSecond => Timestamp::from_millis(millis - millis % 1000),
        }
    }

    /// First frame at or before this timestamp.
    pub fn to_frame(&self, sample_rate: u32) -> usize {
        (self.total_millis() * u64::from(sample_rate) / 1000) as usize
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02},{:03}",
            self.hours, self.minutes, self.seconds, self.millis
        )
    }
}

impl FromStr for Timestamp {
    type Err = MalformedTimestamp;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        all_consuming(timestamp)(s)
            .map(|(_, ts)| ts)
            .map_err(|_| MalformedTimestamp(s.to_string()))
    }
}

/// Parses a `start --> end` line. The arrow may have any number of dashes and any
/// amount of surrounding blanks; the timestamps themselves are fixed-width.
pub fn parse_time_range(line: &str) -> Result<(Timestamp, Timestamp), MalformedTimestamp> {
    all_consuming(time_range)(line)
        .map(|(_, range)| range)
        .map_err(|_| MalformedTimestamp(line.to_string()))
}

fn time_range(input: &str) -> IResult<&str, (Timestamp, Timestamp)> {
    let (input, start) = timestamp(input)?;
    let (input, _) = arrow(input)?;
    let (input, end) = timestamp(input)?;
    let (input, _) = space0(input)?;

    Ok((input, (start, end)))
}

fn arrow(input: &str) -> IResult<&str, ()> {
    let (input, _) = space0(input)?;
    let (input, _) = take_while1(|c: char| c == '-')(input)?;
    let (input, _) = char('>')(input)?;
    let (input, _) = space0(input)?;

    Ok((input, ()))
}

fn fixed_digits<'a>(width: usize) -> impl FnMut(&'a str) -> IResult<&'a str, u32> {
    map_res(
        take_while_m_n(width, width, |c: char| c.is_ascii_digit()),
        |s: &str| s.parse::<u32>(),
    )
}

fn timestamp(input: &str) -> IResult<&str, Timestamp> {
    let (input, hours) = fixed_digits(2)(input)?;
    let (input, _) = char(':')(input)?;
    let (input, minutes) = verify(fixed_digits(2), |m: &u32| *m < 60)(input)?;
    let (input, _) = char(':')(input)?;
    let (input, seconds) = verify(fixed_digits(2), |s: &u32| *s < 60)(input)?;
    let (input, _) = char(',')(input)?;
    let (input, millis) = fixed_digits(3)(input)?;

    Ok((
        input,
        Timestamp {
            hours,
            minutes,
            seconds,
            millis,
        },
    ))
}
