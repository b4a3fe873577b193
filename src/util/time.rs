//! Time-of-day values used by the `between` / `unless_between` windows.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveTime, Offset, Timelike, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hour and minute within a day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay {
    hour: u8,
    minute: u8,
}

impl TimeOfDay {
    /// Build a time of day, rejecting out-of-range values.
    pub fn new(hour: u8, minute: u8) -> Result<Self, String> {
        if hour > 23 {
            return Err(format!("hour {hour} out of range (0-23)"));
        }
        if minute > 59 {
            return Err(format!("minute {minute} out of range (0-59)"));
        }
        Ok(Self { hour, minute })
    }

    /// Hour component.
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute component.
    pub const fn minute(self) -> u8 {
        self.minute
    }

    /// Minutes since midnight.
    pub fn minutes(self) -> u16 {
        u16::from(self.hour) * 60 + u16::from(self.minute)
    }

    /// Truncate a wall-clock time to a `TimeOfDay`.
    pub fn from_naive(time: NaiveTime) -> Self {
        // chrono guarantees hour < 24 and minute < 60
        Self {
            hour: u8::try_from(time.hour()).unwrap_or(0),
            minute: u8::try_from(time.minute()).unwrap_or(0),
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for TimeOfDay {
    type Err = String;

    /// Accepts `"9"`, `"09"`, `"9:00"` or `"13:30"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (hour, minute) = s.split_once(':').unwrap_or((s, "0"));
        let hour = hour
            .parse::<u8>()
            .map_err(|_| format!("invalid hour in time `{s}`"))?;
        let minute = minute
            .parse::<u8>()
            .map_err(|_| format!("invalid minute in time `{s}`"))?;
        Self::new(hour, minute)
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Hour(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Hour(hour) => Self::new(hour, 0),
            Raw::Text(text) => text.parse(),
        }
        .map_err(serde::de::Error::custom)
    }
}

/// A task timezone: an IANA zone or a fixed UTC offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Named zone with its DST rules, e.g. `America/New_York`.
    Named(Tz),
    /// Fixed offset such as `+02:00`.
    Fixed(FixedOffset),
}

impl Zone {
    /// Wall-clock time at `now` in this zone.
    pub fn time_at(self, now: DateTime<Utc>) -> NaiveTime {
        match self {
            Self::Named(tz) => now.with_timezone(&tz).time(),
            Self::Fixed(offset) => now.with_timezone(&offset).time(),
        }
    }
}

/// Parse a task timezone.
///
/// Accepts IANA names (`Europe/Paris`, `UTC`), `Z` and explicit offsets such
/// as `+02:00`.
pub fn parse_zone(timezone: &str) -> Result<Zone, String> {
    let timezone = timezone.trim();
    if let Ok(tz) = timezone.parse::<Tz>() {
        return Ok(Zone::Named(tz));
    }
    match timezone {
        "utc" | "Z" => Ok(Zone::Fixed(Utc.fix())),
        other => other
            .parse::<FixedOffset>()
            .map(Zone::Fixed)
            .map_err(|_| format!("unsupported timezone `{other}`")),
    }
}

/// Wall-clock time of day at `now` in the given timezone (UTC when absent).
pub fn local_time_of_day(now: DateTime<Utc>, timezone: Option<&str>) -> Result<TimeOfDay, String> {
    let time = match timezone {
        Some(tz) => parse_zone(tz)?.time_at(now),
        None => now.time(),
    };
    Ok(TimeOfDay::from_naive(time))
}
