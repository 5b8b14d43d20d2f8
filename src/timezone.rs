// src/timezone.rs
use chrono::{LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::error::{Result, TipPoolError};

/// Source and target zone of the POS clock conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimezoneConversion {
    pub source: Tz,
    pub target: Tz,
}

impl TimezoneConversion {
    pub fn parse(source: &str, target: &str) -> Result<Self> {
        Ok(Self {
            source: parse_tz(source)?,
            target: parse_tz(target)?,
        })
    }

    pub fn apply(&self, timestamp: NaiveDateTime) -> Result<NaiveDateTime> {
        convert_timezone(timestamp, self.source, self.target)
    }
}

pub fn parse_tz(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TipPoolError::UnknownTimezone(name.to_string()))
}

/// Reads `timestamp` as wall-clock time in `source` and returns the wall
/// clock in `target`. Fall-back ambiguity resolves to the earlier instant;
/// spring-forward gaps are an error.
pub fn convert_timezone(timestamp: NaiveDateTime, source: Tz, target: Tz) -> Result<NaiveDateTime> {
    let instant = match source.from_local_datetime(&timestamp) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            return Err(TipPoolError::NonexistentLocalTime {
                timestamp: timestamp.to_string(),
                zone: source.name().to_string(),
            })
        }
    };
    Ok(instant.with_timezone(&target).naive_local())
}
