use std::fmt::Display;
use std::ops::{Add, AddAssign, Sub};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use serde::{Deserialize, Serialize};

pub const SECONDS_IN_DAY: i32 = 24 * 60 * 60;

/// A point in time on a service day, in seconds elapsed since the nominal
/// start of that day. Values above 86_400 are legal and mean the trip runs
/// past midnight into the next calendar day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceDayTime(u32);

impl From<u32> for ServiceDayTime {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl ServiceDayTime {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_hms(hours: u32, minutes: u32, seconds: u32) -> Self {
        Self(hours * 3600 + minutes * 60 + seconds)
    }

    pub const fn as_seconds(&self) -> u32 {
        self.0
    }

    /// Parses a `HH:MM:SS` string. Hours above 24 are accepted, minutes and
    /// seconds are not.
    pub fn parse(time: &str) -> Option<Self> {
        let mut split = time.split(':');
        let hours: u32 = split.next()?.parse().ok()?;
        let minutes: u32 = split.next()?.parse().ok()?;
        let seconds: u32 = split.next()?.parse().ok()?;
        if split.next().is_some() || minutes > 59 || seconds > 59 {
            return None;
        }
        Some(Self::from_hms(hours, minutes, seconds))
    }
}

impl Display for ServiceDayTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let h = self.0 / 3600;
        let m = (self.0 % 3600) / 60;
        let s = self.0 % 60;
        write!(f, "{:02}:{:02}:{:02}", h, m, s)
    }
}

impl Add<Duration> for ServiceDayTime {
    type Output = Self;

    fn add(self, rhs: Duration) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

/// A duration in whole seconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Duration(u32);

impl From<u32> for Duration {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl Duration {
    pub const fn from_seconds(secs: u32) -> Self {
        Self(secs)
    }

    pub const fn from_minutes(minutes: u32) -> Self {
        Self(minutes * 60)
    }

    pub const fn from_hours(hours: u32) -> Self {
        Self(hours * 60 * 60)
    }

    pub const fn as_seconds(&self) -> u32 {
        self.0
    }
}

impl Add for Duration {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Duration {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0
    }
}

impl Sub for Duration {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

/// Seconds relative to the midnight of a reference date. All times inside a
/// query are normalized to this form before comparison, so trips from
/// adjacent service days order correctly against each other.
pub fn to_timestamp(datetime: NaiveDateTime, reference_date: NaiveDate) -> i32 {
    let midnight = reference_date.and_time(chrono::NaiveTime::MIN);
    (datetime - midnight).num_seconds() as i32
}

/// Converts a reference-relative timestamp back into a date time.
pub fn from_timestamp(timestamp: i32, reference_date: NaiveDate) -> NaiveDateTime {
    let midnight = reference_date.and_time(chrono::NaiveTime::MIN);
    midnight + TimeDelta::seconds(i64::from(timestamp))
}
