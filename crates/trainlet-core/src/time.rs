//! Wall-clock time limits in SLURM notation

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TrainletError;

/// Wall-clock limit for a job, kept at minute granularity
///
/// Parses the forms SLURM accepts for `--time`: `M`, `HH:MM`, `HH:MM:SS`,
/// `D-HH`, `D-HH:MM` and `D-HH:MM:SS`. Seconds round up to the next minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeLimit {
    minutes: u64,
}

impl TimeLimit {
    pub fn from_minutes(minutes: u64) -> Self {
        Self { minutes }
    }

    pub fn minutes(&self) -> u64 {
        self.minutes
    }

    pub fn is_zero(&self) -> bool {
        self.minutes == 0
    }
}

fn parse_component(s: &str, input: &str) -> Result<u64, TrainletError> {
    s.trim().parse::<u64>().map_err(|_| {
        TrainletError::configuration("timeLimit", format!("invalid time limit '{}'", input))
    })
}

impl FromStr for TimeLimit {
    type Err = TrainletError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let s = input.trim();
        if s.is_empty() {
            return Err(TrainletError::configuration(
                "timeLimit",
                "time limit is empty",
            ));
        }

        let (days, rest) = match s.split_once('-') {
            Some((d, rest)) => (Some(parse_component(d, input)?), rest),
            None => (None, s),
        };

        let parts: Vec<u64> = rest
            .split(':')
            .map(|p| parse_component(p, input))
            .collect::<Result<_, _>>()?;

        let (hours, minutes, seconds) = match (days, parts.as_slice()) {
            // bare minutes
            (None, [m]) => (0, *m, 0),
            (None, [h, m]) => (*h, *m, 0),
            (None, [h, m, sec]) => (*h, *m, *sec),
            (Some(_), [h]) => (*h, 0, 0),
            (Some(_), [h, m]) => (*h, *m, 0),
            (Some(_), [h, m, sec]) => (*h, *m, *sec),
            _ => {
                return Err(TrainletError::configuration(
                    "timeLimit",
                    format!("invalid time limit '{}'", input),
                ))
            }
        };

        let total = days
            .unwrap_or(0)
            .saturating_mul(24 * 60)
            .saturating_add(hours.saturating_mul(60))
            .saturating_add(minutes)
            .saturating_add(seconds.div_ceil(60));

        Ok(Self { minutes: total })
    }
}

impl TryFrom<String> for TimeLimit {
    type Error = TrainletError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimeLimit> for String {
    fn from(limit: TimeLimit) -> Self {
        limit.to_string()
    }
}

impl fmt::Display for TimeLimit {
    /// Always rendered as `D-HH:MM`
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let days = self.minutes / (24 * 60);
        let hours = (self.minutes / 60) % 24;
        let minutes = self.minutes % 60;
        write!(f, "{}-{:02}:{:02}", days, hours, minutes)
    }
}
