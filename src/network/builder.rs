use std::collections::HashMap;
use std::sync::Arc;

use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use super::{Network, Route, RouteStop, Stop, StopTime, Transfer};

#[derive(Error, Debug)]
pub enum Error {
    #[error("stop {0} already exists")]
    DuplicateStop(String),
    #[error("route {0} already exists")]
    DuplicateRoute(String),
    #[error("trip {0} already exists")]
    DuplicateTrip(String),
    #[error("unknown stop {0}")]
    UnknownStop(String),
    #[error("unknown route {0}")]
    UnknownRoute(String),
    #[error("unknown trip {0}")]
    UnknownTrip(String),
    #[error("stop {stop} does not match position {position} of route {route}")]
    StopSequenceMismatch {
        route: String,
        stop: String,
        position: usize,
    },
    #[error("stop time at position {position} of trip {trip} already set")]
    DuplicateStopTime { trip: String, position: usize },
    #[error("stop time at position {position} of trip {trip} breaks the temporal order")]
    StopTimeOutOfOrder { trip: String, position: usize },
    #[error("stop time at position {position} of trip {trip} missing")]
    StopTimeMissing { trip: String, position: usize },
    #[error("stop {0} is not served by any route")]
    UnservedStop(String),
}

/// Builds the flattened [`Network`] arrays and validates the sub-route
/// invariants on the way:
///
/// - all stops of a route are known before the route is added,
/// - every trip of a route visits exactly the route's stop sequence,
/// - stop-time chains are temporally ordered along the sequence,
/// - trips end up sorted by their first departure,
/// - every stop is served by at least one route.
#[derive(Debug)]
pub struct NetworkBuilder {
    default_same_stop_transfer_time: u32,
    stop_lookup: HashMap<Arc<str>, usize>,
    stop_order: Vec<Arc<str>>,
    route_builders: HashMap<Arc<str>, RouteBuilder>,
    transfers: HashMap<usize, HashMap<usize, u32>>,
    same_stop_transfer_times: HashMap<usize, u32>,
    stop_routes: HashMap<usize, Vec<Arc<str>>>,
    stop_time_count: usize,
    route_stop_count: usize,
}

impl NetworkBuilder {
    pub fn new(default_same_stop_transfer_time: u32) -> Self {
        Self {
            default_same_stop_transfer_time,
            stop_lookup: HashMap::new(),
            stop_order: Vec::new(),
            route_builders: HashMap::new(),
            transfers: HashMap::new(),
            same_stop_transfer_times: HashMap::new(),
            stop_routes: HashMap::new(),
            stop_time_count: 0,
            route_stop_count: 0,
        }
    }

    pub fn add_stop(&mut self, id: &str) -> Result<&mut Self, Error> {
        if self.stop_lookup.contains_key(id) {
            return Err(Error::DuplicateStop(id.to_string()));
        }
        debug!(stop = id, "adding stop");
        let id: Arc<str> = id.into();
        let idx = self.stop_order.len();
        self.stop_lookup.insert(id.clone(), idx);
        self.stop_routes.insert(idx, Vec::new());
        self.stop_order.push(id);
        Ok(self)
    }

    pub fn add_route(&mut self, id: &str, stop_ids: &[&str]) -> Result<&mut Self, Error> {
        if self.route_builders.contains_key(id) {
            return Err(Error::DuplicateRoute(id.to_string()));
        }
        let mut sequence = Vec::with_capacity(stop_ids.len());
        for stop_id in stop_ids {
            let stop_idx = *self
                .stop_lookup
                .get(*stop_id)
                .ok_or_else(|| Error::UnknownStop(stop_id.to_string()))?;
            let stop_id = self.stop_order[stop_idx].clone();
            sequence.push((stop_id, stop_idx));
        }
        debug!(route = id, stops = stop_ids.len(), "adding route");
        let id: Arc<str> = id.into();
        for (_, stop_idx) in &sequence {
            let serving = self.stop_routes.entry(*stop_idx).or_default();
            if !serving.contains(&id) {
                serving.push(id.clone());
            }
        }
        self.route_stop_count += sequence.len();
        self.route_builders
            .insert(id.clone(), RouteBuilder::new(id, sequence));
        Ok(self)
    }

    pub fn add_trip(&mut self, trip_id: &str, route_id: &str) -> Result<&mut Self, Error> {
        self.route_builder(route_id)?.add_trip(trip_id)?;
        Ok(self)
    }

    pub fn add_stop_time(
        &mut self,
        route_id: &str,
        trip_id: &str,
        position: usize,
        stop_id: &str,
        stop_time: StopTime,
    ) -> Result<&mut Self, Error> {
        self.route_builder(route_id)?
            .add_stop_time(trip_id, position, stop_id, stop_time)?;
        self.stop_time_count += 1;
        Ok(self)
    }

    /// Adds a footpath transfer. A later call for the same (source, target)
    /// pair overwrites the earlier duration, which is what the compiler's
    /// precedence tiers rely on. A transfer onto the same stop sets the
    /// stop's same-stop transfer time instead of creating an edge.
    pub fn add_transfer(
        &mut self,
        source_stop_id: &str,
        target_stop_id: &str,
        duration: u32,
    ) -> Result<&mut Self, Error> {
        let source_idx = *self
            .stop_lookup
            .get(source_stop_id)
            .ok_or_else(|| Error::UnknownStop(source_stop_id.to_string()))?;
        let target_idx = *self
            .stop_lookup
            .get(target_stop_id)
            .ok_or_else(|| Error::UnknownStop(target_stop_id.to_string()))?;

        if source_idx == target_idx {
            self.same_stop_transfer_times.insert(source_idx, duration);
            return Ok(self);
        }

        self.transfers
            .entry(source_idx)
            .or_default()
            .insert(target_idx, duration);
        Ok(self)
    }

    pub fn build(self) -> Result<Network, Error> {
        info!(
            stops = self.stop_order.len(),
            routes = self.route_builders.len(),
            route_stops = self.route_stop_count,
            stop_times = self.stop_time_count,
            "building network"
        );

        // validate and sort each route's trips, then order routes by id so
        // indices are stable between identical builds
        let mut containers = self
            .route_builders
            .into_par_iter()
            .map(|(_, route_builder)| route_builder.build())
            .collect::<Result<Vec<_>, _>>()?;
        containers.sort_by(|a, b| a.id.cmp(&b.id));

        let mut route_lookup = HashMap::with_capacity(containers.len());
        for (route_idx, container) in containers.iter().enumerate() {
            route_lookup.insert(container.id.clone(), route_idx);
        }

        // stop context arrays
        let mut stops = Vec::with_capacity(self.stop_order.len());
        let mut stop_routes = Vec::new();
        let mut transfers = Vec::new();
        for (stop_idx, stop_id) in self.stop_order.iter().enumerate() {
            let serving = self
                .stop_routes
                .get(&stop_idx)
                .filter(|serving| !serving.is_empty())
                .ok_or_else(|| Error::UnservedStop(stop_id.to_string()))?;

            let stop_route_idx = stop_routes.len() as u32;
            for route_id in serving {
                stop_routes.push(route_lookup[route_id] as u32);
            }

            let transfer_idx = transfers.len() as u32;
            let mut outgoing: Vec<(usize, u32)> = self
                .transfers
                .get(&stop_idx)
                .map(|map| map.iter().map(|(target, duration)| (*target, *duration)).collect())
                .unwrap_or_default();
            outgoing.sort_by_key(|(target, _)| *target);
            let transfer_count = outgoing.len() as u32;
            for (target_stop_idx, duration) in outgoing {
                transfers.push(Transfer {
                    target_stop_idx: target_stop_idx as u32,
                    duration,
                });
            }

            stops.push(Stop {
                id: stop_id.clone(),
                stop_route_idx,
                route_count: serving.len() as u32,
                same_stop_transfer_time: *self
                    .same_stop_transfer_times
                    .get(&stop_idx)
                    .unwrap_or(&self.default_same_stop_transfer_time),
                transfer_idx,
                transfer_count,
            });
        }

        // route traversal arrays
        let mut routes = Vec::with_capacity(containers.len());
        let mut route_stops = Vec::with_capacity(self.route_stop_count);
        let mut stop_times = Vec::with_capacity(self.stop_time_count);
        for (route_idx, container) in containers.into_iter().enumerate() {
            routes.push(Route {
                id: container.id,
                first_route_stop_idx: route_stops.len() as u32,
                stop_count: container.stop_sequence.len() as u32,
                first_stop_time_idx: stop_times.len() as u32,
                trip_count: container.trips.len() as u32,
                trip_ids: container
                    .trips
                    .iter()
                    .map(|(trip_id, _)| trip_id.clone())
                    .collect(),
            });
            for (_, stop_idx) in &container.stop_sequence {
                route_stops.push(RouteStop {
                    stop_idx: *stop_idx as u32,
                    route_idx: route_idx as u32,
                });
            }
            for (_, row) in container.trips {
                stop_times.extend(row);
            }
        }

        Ok(Network {
            stops: stops.into(),
            routes: routes.into(),
            route_stops: route_stops.into(),
            stop_times: stop_times.into(),
            stop_routes: stop_routes.into(),
            transfers: transfers.into(),
            stop_lookup: self.stop_lookup,
            route_lookup,
        })
    }

    fn route_builder(&mut self, route_id: &str) -> Result<&mut RouteBuilder, Error> {
        self.route_builders
            .get_mut(route_id)
            .ok_or_else(|| Error::UnknownRoute(route_id.to_string()))
    }
}

/// Collects and validates the trips of one sub-route.
#[derive(Debug)]
struct RouteBuilder {
    id: Arc<str>,
    stop_sequence: Vec<(Arc<str>, usize)>,
    trip_lookup: HashMap<Arc<str>, usize>,
    trips: Vec<(Arc<str>, Vec<Option<StopTime>>)>,
}

struct RouteContainer {
    id: Arc<str>,
    stop_sequence: Vec<(Arc<str>, usize)>,
    trips: Vec<(Arc<str>, Vec<StopTime>)>,
}

impl RouteBuilder {
    fn new(id: Arc<str>, stop_sequence: Vec<(Arc<str>, usize)>) -> Self {
        Self {
            id,
            stop_sequence,
            trip_lookup: HashMap::new(),
            trips: Vec::new(),
        }
    }

    fn add_trip(&mut self, trip_id: &str) -> Result<(), Error> {
        if self.trip_lookup.contains_key(trip_id) {
            return Err(Error::DuplicateTrip(trip_id.to_string()));
        }
        let trip_id: Arc<str> = trip_id.into();
        self.trip_lookup.insert(trip_id.clone(), self.trips.len());
        self.trips
            .push((trip_id, vec![None; self.stop_sequence.len()]));
        Ok(())
    }

    fn add_stop_time(
        &mut self,
        trip_id: &str,
        position: usize,
        stop_id: &str,
        stop_time: StopTime,
    ) -> Result<(), Error> {
        if position >= self.stop_sequence.len() {
            return Err(Error::StopSequenceMismatch {
                route: self.id.to_string(),
                stop: stop_id.to_string(),
                position,
            });
        }
        if self.stop_sequence[position].0.as_ref() != stop_id {
            return Err(Error::StopSequenceMismatch {
                route: self.id.to_string(),
                stop: stop_id.to_string(),
                position,
            });
        }

        let trip_offset = *self
            .trip_lookup
            .get(trip_id)
            .ok_or_else(|| Error::UnknownTrip(trip_id.to_string()))?;
        let row = &mut self.trips[trip_offset].1;

        if row[position].is_some() {
            return Err(Error::DuplicateStopTime {
                trip: trip_id.to_string(),
                position,
            });
        }

        let ordered_with_previous = position == 0
            || row[position - 1].is_none_or(|previous| previous.departure <= stop_time.arrival);
        let ordered_with_next = position + 1 >= row.len()
            || row[position + 1].is_none_or(|next| stop_time.departure <= next.arrival);
        if stop_time.arrival > stop_time.departure || !ordered_with_previous || !ordered_with_next {
            return Err(Error::StopTimeOutOfOrder {
                trip: trip_id.to_string(),
                position,
            });
        }

        row[position] = Some(stop_time);
        Ok(())
    }

    fn build(self) -> Result<RouteContainer, Error> {
        let mut trips = Vec::with_capacity(self.trips.len());
        for (trip_id, row) in self.trips {
            let mut complete = Vec::with_capacity(row.len());
            for (position, stop_time) in row.into_iter().enumerate() {
                complete.push(stop_time.ok_or_else(|| Error::StopTimeMissing {
                    trip: trip_id.to_string(),
                    position,
                })?);
            }
            trips.push((trip_id, complete));
        }
        trips.sort_by_key(|(_, row)| row[0].departure);

        Ok(RouteContainer {
            id: self.id,
            stop_sequence: self.stop_sequence,
            trips,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stop_time(arrival: u32, departure: u32) -> StopTime {
        StopTime { arrival, departure }
    }

    fn builder_with_stops(stops: &[&str]) -> NetworkBuilder {
        let mut builder = NetworkBuilder::new(120);
        for stop in stops {
            builder.add_stop(stop).unwrap();
        }
        builder
    }

    #[test]
    fn route_with_unknown_stop_is_rejected() {
        let mut builder = builder_with_stops(&["A"]);
        let err = builder.add_route("R1", &["A", "B"]).unwrap_err();
        assert!(matches!(err, Error::UnknownStop(id) if id == "B"));
    }

    #[test]
    fn stop_time_must_match_sequence_position() {
        let mut builder = builder_with_stops(&["A", "B"]);
        builder.add_route("R1", &["A", "B"]).unwrap();
        builder.add_trip("T1", "R1").unwrap();
        let err = builder
            .add_stop_time("R1", "T1", 0, "B", stop_time(0, 0))
            .unwrap_err();
        assert!(matches!(err, Error::StopSequenceMismatch { .. }));
    }

    #[test]
    fn stop_times_must_be_temporally_ordered() {
        let mut builder = builder_with_stops(&["A", "B"]);
        builder.add_route("R1", &["A", "B"]).unwrap();
        builder.add_trip("T1", "R1").unwrap();
        builder
            .add_stop_time("R1", "T1", 0, "A", stop_time(100, 120))
            .unwrap();
        let err = builder
            .add_stop_time("R1", "T1", 1, "B", stop_time(60, 90))
            .unwrap_err();
        assert!(matches!(err, Error::StopTimeOutOfOrder { .. }));
    }

    #[test]
    fn incomplete_trip_fails_the_build() {
        let mut builder = builder_with_stops(&["A", "B"]);
        builder.add_route("R1", &["A", "B"]).unwrap();
        builder.add_trip("T1", "R1").unwrap();
        builder
            .add_stop_time("R1", "T1", 0, "A", stop_time(0, 0))
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::StopTimeMissing { .. }));
    }

    #[test]
    fn unserved_stop_fails_the_build() {
        let mut builder = builder_with_stops(&["A", "B", "C"]);
        builder.add_route("R1", &["A", "B"]).unwrap();
        builder.add_trip("T1", "R1").unwrap();
        builder
            .add_stop_time("R1", "T1", 0, "A", stop_time(0, 0))
            .unwrap();
        builder
            .add_stop_time("R1", "T1", 1, "B", stop_time(60, 60))
            .unwrap();
        let err = builder.build().unwrap_err();
        assert!(matches!(err, Error::UnservedStop(id) if id == "C"));
    }

    #[test]
    fn trips_are_sorted_by_departure() {
        let mut builder = builder_with_stops(&["A", "B"]);
        builder.add_route("R1", &["A", "B"]).unwrap();
        builder.add_trip("late", "R1").unwrap();
        builder
            .add_stop_time("R1", "late", 0, "A", stop_time(600, 600))
            .unwrap();
        builder
            .add_stop_time("R1", "late", 1, "B", stop_time(660, 660))
            .unwrap();
        builder.add_trip("early", "R1").unwrap();
        builder
            .add_stop_time("R1", "early", 0, "A", stop_time(0, 0))
            .unwrap();
        builder
            .add_stop_time("R1", "early", 1, "B", stop_time(60, 60))
            .unwrap();

        let network = builder.build().unwrap();
        let route_idx = network.route_idx("R1").unwrap();
        assert_eq!(network.route_trip_ids(route_idx)[0].as_ref(), "early");
        assert_eq!(network.route_trip_ids(route_idx)[1].as_ref(), "late");
        assert_eq!(network.trip_stop_times(route_idx, 0)[0].departure, 0);
        assert_eq!(network.trip_stop_times(route_idx, 1)[0].departure, 600);
    }

    #[test]
    fn empty_builder_builds_an_empty_network() {
        let network = NetworkBuilder::new(120).build().unwrap();
        assert_eq!(network.stop_count(), 0);
        assert_eq!(network.route_count(), 0);
    }

    #[test]
    fn transfer_overwrite_keeps_last_duration() {
        let mut builder = builder_with_stops(&["A", "B"]);
        builder.add_route("R1", &["A", "B"]).unwrap();
        builder.add_trip("T1", "R1").unwrap();
        builder
            .add_stop_time("R1", "T1", 0, "A", stop_time(0, 0))
            .unwrap();
        builder
            .add_stop_time("R1", "T1", 1, "B", stop_time(60, 60))
            .unwrap();
        builder.add_transfer("A", "B", 400).unwrap();
        builder.add_transfer("A", "B", 90).unwrap();
        builder.add_transfer("A", "A", 30).unwrap();

        let network = builder.build().unwrap();
        let stop_idx = network.stop_idx("A").unwrap();
        let transfers = network.transfers_of_stop(stop_idx);
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].duration, 90);
        assert_eq!(network.stop(stop_idx).same_stop_transfer_time, 30);
    }
}
