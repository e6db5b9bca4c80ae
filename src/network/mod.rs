//! The flattened network model: immutable, index-addressed arrays compiled
//! from a schedule.
//!
//! A [`Network`] is built once per schedule version and then shared
//! read-only across all concurrent queries, typically behind an `Arc`. A
//! schedule update compiles a fresh network and swaps the whole object; it
//! never mutates one in place, so in-flight queries keep a consistent view.

use std::collections::HashMap;
use std::sync::Arc;

mod builder;

pub use builder::*;

/// A stop of the network, with offsets into the serving-routes and transfer
/// arrays.
#[derive(Debug, Clone)]
pub struct Stop {
    pub id: Arc<str>,
    pub(crate) stop_route_idx: u32,
    pub(crate) route_count: u32,
    /// Seconds needed to change trips without leaving this stop.
    pub same_stop_transfer_time: u32,
    pub(crate) transfer_idx: u32,
    pub(crate) transfer_count: u32,
}

/// A sub-route: a fixed ordered stop sequence with a trip × stop matrix of
/// stop times.
#[derive(Debug, Clone)]
pub struct Route {
    pub id: Arc<str>,
    pub(crate) first_route_stop_idx: u32,
    pub(crate) stop_count: u32,
    pub(crate) first_stop_time_idx: u32,
    pub(crate) trip_count: u32,
    /// Trip ids, in the row order of the stop-time matrix (sorted by first
    /// departure).
    pub trip_ids: Box<[Arc<str>]>,
}

impl Route {
    pub fn stop_count(&self) -> usize {
        self.stop_count as usize
    }

    pub fn trip_count(&self) -> usize {
        self.trip_count as usize
    }
}

/// One position of a route's stop sequence.
#[derive(Debug, Clone, Copy)]
pub struct RouteStop {
    pub stop_idx: u32,
    pub route_idx: u32,
}

/// Arrival and departure at one stop of one trip, in seconds since the
/// service-day start. Values above 86_400 mean the trip runs past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopTime {
    pub arrival: u32,
    pub departure: u32,
}

/// A directed footpath edge, stored grouped by source stop.
#[derive(Debug, Clone, Copy)]
pub struct Transfer {
    pub target_stop_idx: u32,
    pub duration: u32,
}

/// The compiled transit network. Read-only once built; every accessor is
/// O(1) array or hash indexing.
#[derive(Debug, Default)]
pub struct Network {
    pub(crate) stops: Box<[Stop]>,
    pub(crate) routes: Box<[Route]>,
    pub(crate) route_stops: Box<[RouteStop]>,
    pub(crate) stop_times: Box<[StopTime]>,
    pub(crate) stop_routes: Box<[u32]>,
    pub(crate) transfers: Box<[Transfer]>,
    pub(crate) stop_lookup: HashMap<Arc<str>, usize>,
    pub(crate) route_lookup: HashMap<Arc<str>, usize>,
}

impl Network {
    pub fn builder(default_same_stop_transfer_time: u32) -> NetworkBuilder {
        NetworkBuilder::new(default_same_stop_transfer_time)
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    pub fn route_count(&self) -> usize {
        self.routes.len()
    }

    pub fn stops(&self) -> &[Stop] {
        &self.stops
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn stop(&self, stop_idx: usize) -> &Stop {
        &self.stops[stop_idx]
    }

    pub fn route(&self, route_idx: usize) -> &Route {
        &self.routes[route_idx]
    }

    pub fn stop_idx(&self, stop_id: &str) -> Option<usize> {
        self.stop_lookup.get(stop_id).copied()
    }

    pub fn route_idx(&self, route_id: &str) -> Option<usize> {
        self.route_lookup.get(route_id).copied()
    }

    /// The ordered stop sequence of a sub-route.
    pub fn route_stop_sequence(&self, route_idx: usize) -> &[RouteStop] {
        let route = &self.routes[route_idx];
        let first = route.first_route_stop_idx as usize;
        &self.route_stops[first..first + route.stop_count as usize]
    }

    /// The stop-time row of one trip of a sub-route.
    pub fn trip_stop_times(&self, route_idx: usize, trip_offset: usize) -> &[StopTime] {
        let route = &self.routes[route_idx];
        let first = route.first_stop_time_idx as usize + trip_offset * route.stop_count as usize;
        &self.stop_times[first..first + route.stop_count as usize]
    }

    pub fn stop_time(&self, route_idx: usize, trip_offset: usize, stop_offset: usize) -> StopTime {
        let route = &self.routes[route_idx];
        self.stop_times
            [route.first_stop_time_idx as usize + trip_offset * route.stop_count as usize + stop_offset]
    }

    /// Indices of the sub-routes serving a stop.
    pub fn routes_of_stop(&self, stop_idx: usize) -> &[u32] {
        let stop = &self.stops[stop_idx];
        let first = stop.stop_route_idx as usize;
        &self.stop_routes[first..first + stop.route_count as usize]
    }

    /// Outgoing footpath transfers of a stop.
    pub fn transfers_of_stop(&self, stop_idx: usize) -> &[Transfer] {
        let stop = &self.stops[stop_idx];
        let first = stop.transfer_idx as usize;
        &self.transfers[first..first + stop.transfer_count as usize]
    }

    /// Offset of a stop within a sub-route's sequence, or `None` if the
    /// route does not serve the stop.
    pub fn stop_offset_in_route(&self, route_idx: usize, stop_idx: usize) -> Option<usize> {
        self.route_stop_sequence(route_idx)
            .iter()
            .position(|route_stop| route_stop.stop_idx as usize == stop_idx)
    }

    /// Trip ids per route, in matrix row order. Used to line up activation
    /// masks with stop-time rows.
    pub fn route_trip_ids(&self, route_idx: usize) -> &[Arc<str>] {
        &self.routes[route_idx].trip_ids
    }
}
