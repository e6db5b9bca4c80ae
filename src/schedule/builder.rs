use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, Weekday};
use tracing::info;

use super::models::*;
use super::{Error, Schedule};
use crate::shared::{Coordinate, Duration, ServiceDayTime};

/// Validating builder for a [`Schedule`].
///
/// Every cross-reference is checked at insertion time and reported with the
/// offending id, a built schedule is guaranteed internally consistent.
#[derive(Debug, Default)]
pub struct ScheduleBuilder {
    stops: HashMap<Arc<str>, Stop>,
    routes: HashMap<Arc<str>, Route>,
    trips: HashMap<Arc<str>, Trip>,
    calendars: HashMap<Arc<str>, Calendar>,
}

impl ScheduleBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_calendar(
        &mut self,
        id: &str,
        weekdays: &[Weekday],
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<&mut Self, Error> {
        if self.calendars.contains_key(id) {
            return Err(Error::DuplicateCalendar(id.to_string()));
        }
        let id: Arc<str> = id.into();
        self.calendars.insert(
            id.clone(),
            Calendar {
                id,
                weekdays: weekday_flags(weekdays),
                start_date,
                end_date,
                exceptions: HashMap::new(),
            },
        );
        Ok(self)
    }

    pub fn add_calendar_date(
        &mut self,
        calendar_id: &str,
        date: NaiveDate,
        kind: ExceptionKind,
    ) -> Result<&mut Self, Error> {
        let calendar = self
            .calendars
            .get_mut(calendar_id)
            .ok_or_else(|| Error::UnknownCalendar(calendar_id.to_string()))?;
        calendar.exceptions.insert(date, kind);
        Ok(self)
    }

    pub fn add_stop(
        &mut self,
        id: &str,
        name: &str,
        coordinate: Coordinate,
    ) -> Result<&mut Self, Error> {
        self.insert_stop(id, name, coordinate, None)
    }

    /// Adds a platform stop below a station parent. The parent must exist.
    pub fn add_child_stop(
        &mut self,
        id: &str,
        name: &str,
        coordinate: Coordinate,
        parent_id: &str,
    ) -> Result<&mut Self, Error> {
        if !self.stops.contains_key(parent_id) {
            return Err(Error::UnknownParent(parent_id.to_string()));
        }
        self.insert_stop(id, name, coordinate, Some(parent_id.into()))
    }

    fn insert_stop(
        &mut self,
        id: &str,
        name: &str,
        coordinate: Coordinate,
        parent_id: Option<Arc<str>>,
    ) -> Result<&mut Self, Error> {
        if self.stops.contains_key(id) {
            return Err(Error::DuplicateStop(id.to_string()));
        }
        let id: Arc<str> = id.into();
        if let Some(parent_id) = &parent_id {
            // checked above, the parent is present
            if let Some(parent) = self.stops.get_mut(parent_id.as_ref()) {
                parent.children.push(id.clone());
            }
        }
        self.stops.insert(
            id.clone(),
            Stop {
                id,
                name: name.into(),
                coordinate,
                parent_id,
                children: Vec::new(),
                transfers: Vec::new(),
                wheelchair_boarding: Accessibility::Unknown,
            },
        );
        Ok(self)
    }

    pub fn set_stop_accessibility(
        &mut self,
        stop_id: &str,
        accessibility: Accessibility,
    ) -> Result<&mut Self, Error> {
        let stop = self
            .stops
            .get_mut(stop_id)
            .ok_or_else(|| Error::UnknownStop(stop_id.to_string()))?;
        stop.wheelchair_boarding = accessibility;
        Ok(self)
    }

    pub fn add_route(&mut self, id: &str, name: &str, mode: TravelMode) -> Result<&mut Self, Error> {
        if self.routes.contains_key(id) {
            return Err(Error::DuplicateRoute(id.to_string()));
        }
        let id: Arc<str> = id.into();
        self.routes.insert(
            id.clone(),
            Route {
                id,
                name: name.into(),
                mode,
                trips: Vec::new(),
            },
        );
        Ok(self)
    }

    pub fn add_trip(
        &mut self,
        id: &str,
        route_id: &str,
        calendar_id: &str,
    ) -> Result<&mut Self, Error> {
        if self.trips.contains_key(id) {
            return Err(Error::DuplicateTrip(id.to_string()));
        }
        if !self.calendars.contains_key(calendar_id) {
            return Err(Error::UnknownCalendar(calendar_id.to_string()));
        }
        let route = self
            .routes
            .get_mut(route_id)
            .ok_or_else(|| Error::UnknownRoute(route_id.to_string()))?;

        let id: Arc<str> = id.into();
        route.trips.push(id.clone());
        self.trips.insert(
            id.clone(),
            Trip {
                id,
                route_id: route.id.clone(),
                calendar_id: self.calendars[calendar_id].id.clone(),
                stop_times: Vec::new(),
                wheelchair_accessible: Accessibility::Unknown,
                bikes_allowed: BikeAllowance::Unknown,
            },
        );
        Ok(self)
    }

    pub fn set_trip_accessibility(
        &mut self,
        trip_id: &str,
        wheelchair: Accessibility,
        bikes: BikeAllowance,
    ) -> Result<&mut Self, Error> {
        let trip = self
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| Error::UnknownTrip(trip_id.to_string()))?;
        trip.wheelchair_accessible = wheelchair;
        trip.bikes_allowed = bikes;
        Ok(self)
    }

    /// Appends a stop time to a trip. Arrival must not precede the previous
    /// stop's departure, and departure must not precede arrival.
    pub fn add_stop_time(
        &mut self,
        trip_id: &str,
        stop_id: &str,
        arrival: ServiceDayTime,
        departure: ServiceDayTime,
    ) -> Result<&mut Self, Error> {
        let stop = self
            .stops
            .get(stop_id)
            .ok_or_else(|| Error::UnknownStop(stop_id.to_string()))?;
        let stop_id = stop.id.clone();
        let trip = self
            .trips
            .get_mut(trip_id)
            .ok_or_else(|| Error::UnknownTrip(trip_id.to_string()))?;

        let ordered = arrival <= departure
            && trip
                .stop_times
                .last()
                .is_none_or(|previous| previous.departure <= arrival);
        if !ordered {
            return Err(Error::StopTimeOutOfOrder {
                trip: trip_id.to_string(),
                stop: stop_id.to_string(),
            });
        }

        trip.stop_times.push(StopTime {
            stop_id,
            arrival,
            departure,
        });
        Ok(self)
    }

    /// Declares a transfer from one stop to another.
    pub fn add_transfer(
        &mut self,
        from_stop_id: &str,
        to_stop_id: &str,
        kind: TransferKind,
        min_transfer_time: Option<Duration>,
    ) -> Result<&mut Self, Error> {
        let to_stop_id = self
            .stops
            .get(to_stop_id)
            .ok_or_else(|| Error::UnknownStop(to_stop_id.to_string()))?
            .id
            .clone();
        let from = self
            .stops
            .get_mut(from_stop_id)
            .ok_or_else(|| Error::UnknownStop(from_stop_id.to_string()))?;
        from.transfers.push(Transfer {
            to_stop_id,
            kind,
            min_transfer_time,
        });
        Ok(self)
    }

    pub fn build(self) -> Schedule {
        info!(
            stops = self.stops.len(),
            routes = self.routes.len(),
            trips = self.trips.len(),
            calendars = self.calendars.len(),
            "built schedule"
        );
        Schedule {
            stops: self.stops,
            routes: self.routes,
            trips: self.trips,
            calendars: self.calendars,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base_builder() -> ScheduleBuilder {
        let mut builder = ScheduleBuilder::new();
        builder
            .add_calendar("always", &[Weekday::Mon], date(2024, 1, 1), date(2024, 12, 31))
            .unwrap();
        builder
            .add_stop("A", "Alpha", Coordinate::new(0.0, 0.0))
            .unwrap();
        builder
            .add_route("R1", "One", TravelMode::Bus)
            .unwrap();
        builder
    }

    #[test]
    fn trip_with_unknown_route_is_rejected() {
        let mut builder = base_builder();
        let err = builder.add_trip("T1", "missing", "always").unwrap_err();
        assert!(matches!(err, Error::UnknownRoute(id) if id == "missing"));
    }

    #[test]
    fn trip_with_unknown_calendar_is_rejected() {
        let mut builder = base_builder();
        let err = builder.add_trip("T1", "R1", "missing").unwrap_err();
        assert!(matches!(err, Error::UnknownCalendar(id) if id == "missing"));
    }

    #[test]
    fn stop_time_with_unknown_stop_is_rejected() {
        let mut builder = base_builder();
        builder.add_trip("T1", "R1", "always").unwrap();
        let err = builder
            .add_stop_time(
                "T1",
                "missing",
                ServiceDayTime::from_seconds(0),
                ServiceDayTime::from_seconds(0),
            )
            .unwrap_err();
        assert!(matches!(err, Error::UnknownStop(id) if id == "missing"));
    }

    #[test]
    fn stop_times_must_be_ordered() {
        let mut builder = base_builder();
        builder
            .add_stop("B", "Beta", Coordinate::new(0.0, 1.0))
            .unwrap();
        builder.add_trip("T1", "R1", "always").unwrap();
        builder
            .add_stop_time(
                "T1",
                "A",
                ServiceDayTime::from_seconds(100),
                ServiceDayTime::from_seconds(120),
            )
            .unwrap();
        let err = builder
            .add_stop_time(
                "T1",
                "B",
                ServiceDayTime::from_seconds(60),
                ServiceDayTime::from_seconds(80),
            )
            .unwrap_err();
        assert!(matches!(err, Error::StopTimeOutOfOrder { .. }));
    }

    #[test]
    fn child_stop_requires_parent() {
        let mut builder = base_builder();
        let err = builder
            .add_child_stop("A1", "Alpha 1", Coordinate::new(0.0, 0.0), "missing")
            .unwrap_err();
        assert!(matches!(err, Error::UnknownParent(id) if id == "missing"));

        builder
            .add_child_stop("A1", "Alpha 1", Coordinate::new(0.0, 0.0), "A")
            .unwrap();
        let schedule = builder.build();
        assert_eq!(schedule.stop("A").unwrap().children, vec!["A1".into()]);
        assert_eq!(
            schedule.stop("A1").unwrap().parent_id,
            Some("A".into())
        );
    }

    #[test]
    fn accessibility_falls_back_to_parent() {
        let mut builder = base_builder();
        builder
            .set_stop_accessibility("A", Accessibility::Accessible)
            .unwrap();
        builder
            .add_child_stop("A1", "Alpha 1", Coordinate::new(0.0, 0.0), "A")
            .unwrap();
        let schedule = builder.build();

        let child = schedule.stop("A1").unwrap();
        assert_eq!(child.wheelchair_boarding, Accessibility::Unknown);
        assert_eq!(schedule.stop_accessibility(child), Accessibility::Accessible);
    }
}
