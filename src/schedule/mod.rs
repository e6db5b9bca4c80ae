//! The schedule object graph consumed by the network compiler.
//!
//! The graph is supplied by an external schedule provider (file readers,
//! feeds) and is expected to be internally consistent once built: the
//! [`ScheduleBuilder`] rejects dangling references at construction time, so
//! downstream code can index without re-checking.

use std::collections::HashMap;
use std::sync::Arc;

mod builder;
mod models;

pub use builder::*;
pub use models::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("stop {0} already exists")]
    DuplicateStop(String),
    #[error("route {0} already exists")]
    DuplicateRoute(String),
    #[error("trip {0} already exists")]
    DuplicateTrip(String),
    #[error("calendar {0} already exists")]
    DuplicateCalendar(String),
    #[error("unknown stop {0}")]
    UnknownStop(String),
    #[error("unknown parent stop {0}")]
    UnknownParent(String),
    #[error("unknown route {0}")]
    UnknownRoute(String),
    #[error("unknown calendar {0}")]
    UnknownCalendar(String),
    #[error("unknown trip {0}")]
    UnknownTrip(String),
    #[error("stop time of trip {trip} at stop {stop} breaks the temporal order")]
    StopTimeOutOfOrder { trip: String, stop: String },
}

/// An immutable public transit schedule: stops, routes, trips, calendars and
/// declared transfers. Lookup tables are by id, all ids are interned
/// `Arc<str>`.
#[derive(Debug, Clone, Default)]
pub struct Schedule {
    pub(crate) stops: HashMap<Arc<str>, Stop>,
    pub(crate) routes: HashMap<Arc<str>, Route>,
    pub(crate) trips: HashMap<Arc<str>, Trip>,
    pub(crate) calendars: HashMap<Arc<str>, Calendar>,
}

impl Schedule {
    pub fn builder() -> ScheduleBuilder {
        ScheduleBuilder::new()
    }

    pub fn stops(&self) -> &HashMap<Arc<str>, Stop> {
        &self.stops
    }

    pub fn routes(&self) -> &HashMap<Arc<str>, Route> {
        &self.routes
    }

    pub fn trips(&self) -> &HashMap<Arc<str>, Trip> {
        &self.trips
    }

    pub fn calendars(&self) -> &HashMap<Arc<str>, Calendar> {
        &self.calendars
    }

    pub fn stop(&self, id: &str) -> Option<&Stop> {
        self.stops.get(id)
    }

    pub fn route(&self, id: &str) -> Option<&Route> {
        self.routes.get(id)
    }

    pub fn trip(&self, id: &str) -> Option<&Trip> {
        self.trips.get(id)
    }

    pub fn calendar(&self, id: &str) -> Option<&Calendar> {
        self.calendars.get(id)
    }

    /// Wheelchair accessibility of a stop, falling back to the parent stop
    /// when the stop itself does not declare it.
    pub fn stop_accessibility(&self, stop: &Stop) -> Accessibility {
        if stop.wheelchair_boarding != Accessibility::Unknown {
            return stop.wheelchair_boarding;
        }
        stop.parent_id
            .as_deref()
            .and_then(|parent_id| self.stops.get(parent_id))
            .map(|parent| parent.wheelchair_boarding)
            .unwrap_or(Accessibility::Unknown)
    }
}
