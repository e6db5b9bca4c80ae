use std::sync::Arc;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::shared::{Coordinate, Duration, ServiceDayTime};

/// Travel mode of a route, the coarse GTFS route type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TravelMode {
    Bus,
    Tram,
    Rail,
    Subway,
    Ship,
    AerialLift,
    Funicular,
}

impl TravelMode {
    pub const ALL: [TravelMode; 7] = [
        TravelMode::Bus,
        TravelMode::Tram,
        TravelMode::Rail,
        TravelMode::Subway,
        TravelMode::Ship,
        TravelMode::AerialLift,
        TravelMode::Funicular,
    ];

    const fn bit(self) -> u8 {
        match self {
            TravelMode::Bus => 0,
            TravelMode::Tram => 1,
            TravelMode::Rail => 2,
            TravelMode::Subway => 3,
            TravelMode::Ship => 4,
            TravelMode::AerialLift => 5,
            TravelMode::Funicular => 6,
        }
    }
}

/// A set of travel modes, stored as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelModeSet(u8);

impl TravelModeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn all() -> Self {
        Self((1 << TravelMode::ALL.len()) - 1)
    }

    pub const fn of(modes: &[TravelMode]) -> Self {
        let mut mask = 0;
        let mut i = 0;
        while i < modes.len() {
            mask |= 1 << modes[i].bit();
            i += 1;
        }
        Self(mask)
    }

    pub fn insert(&mut self, mode: TravelMode) {
        self.0 |= 1 << mode.bit();
    }

    pub const fn contains(&self, mode: TravelMode) -> bool {
        self.0 & (1 << mode.bit()) != 0
    }

    pub const fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether this set actually restricts anything. An empty set is treated
    /// as "no restriction", requesting nothing is not a meaningful filter.
    pub const fn is_restricting(&self) -> bool {
        !self.is_empty() && self.len() < TravelMode::ALL.len()
    }
}

impl Default for TravelModeSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Wheelchair accessibility of a stop or trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accessibility {
    #[default]
    Unknown,
    Accessible,
    NotAccessible,
}

/// Bike transport information of a trip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BikeAllowance {
    #[default]
    Unknown,
    Allowed,
    NotAllowed,
}

/// Kind of a declared transfer. Only minimum-time transfers take part in the
/// compiled network, the other kinds carry semantics the routing model does
/// not express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferKind {
    Recommended,
    Timed,
    MinimumTime,
    NotPossible,
}

/// A stop of the schedule. Forms a two-level hierarchy: a station parent with
/// platform children.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub coordinate: Coordinate,
    pub parent_id: Option<Arc<str>>,
    pub children: Vec<Arc<str>>,
    pub transfers: Vec<Transfer>,
    pub wheelchair_boarding: Accessibility,
}

/// A directed transfer declared on its source stop.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub to_stop_id: Arc<str>,
    pub kind: TransferKind,
    pub min_transfer_time: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct Route {
    pub id: Arc<str>,
    pub name: Arc<str>,
    pub mode: TravelMode,
    pub trips: Vec<Arc<str>>,
}

#[derive(Debug, Clone)]
pub struct Trip {
    pub id: Arc<str>,
    pub route_id: Arc<str>,
    pub calendar_id: Arc<str>,
    pub stop_times: Vec<StopTime>,
    pub wheelchair_accessible: Accessibility,
    pub bikes_allowed: BikeAllowance,
}

#[derive(Debug, Clone)]
pub struct StopTime {
    pub stop_id: Arc<str>,
    pub arrival: ServiceDayTime,
    pub departure: ServiceDayTime,
}

/// Exception to a weekly calendar pattern on a single date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExceptionKind {
    Added,
    Removed,
}

/// A service calendar: a weekly pattern valid between two dates, plus
/// day-level exceptions.
#[derive(Debug, Clone)]
pub struct Calendar {
    pub id: Arc<str>,
    pub(crate) weekdays: [bool; 7],
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub(crate) exceptions: std::collections::HashMap<NaiveDate, ExceptionKind>,
}

impl Calendar {
    /// Whether the service operates on `date`. A pure function of the
    /// calendar and the date, which is what makes per-date activation masks
    /// cacheable.
    pub fn is_service_available(&self, date: NaiveDate) -> bool {
        if date < self.start_date || date > self.end_date {
            return false;
        }
        if let Some(exception) = self.exceptions.get(&date) {
            return *exception == ExceptionKind::Added;
        }
        self.weekdays[date.weekday().num_days_from_monday() as usize]
    }
}

pub(crate) fn weekday_flags(weekdays: &[Weekday]) -> [bool; 7] {
    let mut flags = [false; 7];
    for weekday in weekdays {
        flags[weekday.num_days_from_monday() as usize] = true;
    }
    flags
}
