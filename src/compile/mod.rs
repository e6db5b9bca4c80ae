//! Compiles a [`Schedule`] into the flattened [`Network`] model.
//!
//! Each schedule route is partitioned into sub-routes with a fixed stop
//! sequence, every trip becomes a row of its sub-route's stop-time matrix,
//! and footpath transfers are derived in three precedence tiers:
//!
//! 1. generated transfers from the configured [`TransferGenerator`]s,
//! 2. transfers propagated along the stop hierarchy (parent to child, child
//!    to parent, and fan-out to the destination's children),
//! 3. transfers declared in the schedule, applied last so they always win.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::info;

mod partition;
mod transfer;

pub use partition::*;
pub use transfer::*;

use thiserror::Error;

use crate::network::{Network, NetworkBuilder, StopTime};
use crate::schedule::{Schedule, Stop, TransferKind};
use crate::shared::Duration;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Network(#[from] crate::network::Error),
    #[error("trip {0} not found in schedule")]
    UnknownTrip(String),
    #[error("calendar {calendar} referenced by trip {trip} not found in schedule")]
    UnknownCalendar { calendar: String, trip: String },
}

/// Schedule-to-network compiler. Runs once per schedule version; the
/// resulting [`Network`] is immutable and shared across queries.
pub struct NetworkCompiler<'a> {
    schedule: &'a Schedule,
    transfer_generators: Vec<Box<dyn TransferGenerator>>,
    default_same_stop_transfer_time: u32,
}

impl<'a> NetworkCompiler<'a> {
    pub fn new(schedule: &'a Schedule) -> Self {
        Self {
            schedule,
            transfer_generators: Vec::new(),
            default_same_stop_transfer_time: 120,
        }
    }

    /// Generators are listed highest-priority first: for the same stop pair
    /// an earlier generator overwrites a later one, and schedule-declared
    /// transfers overwrite all of them.
    pub fn with_transfer_generators(mut self, generators: Vec<Box<dyn TransferGenerator>>) -> Self {
        self.transfer_generators = generators;
        self
    }

    pub fn with_default_same_stop_transfer_time(mut self, seconds: u32) -> Self {
        self.default_same_stop_transfer_time = seconds;
        self
    }

    pub fn compile(&self) -> Result<Network, Error> {
        info!(
            trips = self.schedule.trips().len(),
            routes = self.schedule.routes().len(),
            "compiling schedule into network"
        );

        let mut builder = NetworkBuilder::new(self.default_same_stop_transfer_time);
        let mut added_stops: Vec<Arc<str>> = Vec::new();
        let mut added_lookup: HashSet<Arc<str>> = HashSet::new();

        // deterministic route order: ids sorted, sub-routes in first-seen order
        let mut route_ids: Vec<&Arc<str>> = self.schedule.routes().keys().collect();
        route_ids.sort();

        for route_id in route_ids {
            let route = &self.schedule.routes()[route_id];
            for sub_route in partition_route(self.schedule, route) {
                self.add_sub_route(&sub_route, &mut builder, &mut added_stops, &mut added_lookup)?;
            }
        }

        self.derive_transfers(&mut builder, &added_stops, &added_lookup)?;

        Ok(builder.build()?)
    }

    fn add_sub_route(
        &self,
        sub_route: &SubRoute,
        builder: &mut NetworkBuilder,
        added_stops: &mut Vec<Arc<str>>,
        added_lookup: &mut HashSet<Arc<str>>,
    ) -> Result<(), Error> {
        for stop_id in &sub_route.stop_sequence {
            if added_lookup.insert(stop_id.clone()) {
                builder.add_stop(stop_id)?;
                added_stops.push(stop_id.clone());
            }
        }

        let stop_ids: Vec<&str> = sub_route
            .stop_sequence
            .iter()
            .map(|stop_id| stop_id.as_ref())
            .collect();
        builder.add_route(&sub_route.id, &stop_ids)?;

        for trip_id in &sub_route.trip_ids {
            let trip = self
                .schedule
                .trip(trip_id)
                .ok_or_else(|| Error::UnknownTrip(trip_id.to_string()))?;
            if self.schedule.calendar(&trip.calendar_id).is_none() {
                return Err(Error::UnknownCalendar {
                    calendar: trip.calendar_id.to_string(),
                    trip: trip_id.to_string(),
                });
            }

            builder.add_trip(trip_id, &sub_route.id)?;
            for (position, stop_time) in trip.stop_times.iter().enumerate() {
                builder.add_stop_time(
                    &sub_route.id,
                    trip_id,
                    position,
                    &stop_time.stop_id,
                    StopTime {
                        arrival: stop_time.arrival.as_seconds(),
                        departure: stop_time.departure.as_seconds(),
                    },
                )?;
            }
        }
        Ok(())
    }

    /// Applies all transfer tiers in precedence order. The hierarchy
    /// propagation runs as a worklist over explicit stop ids: every network
    /// stop enters the list once, and since processing a stop never grows
    /// the stop set, draining the list reaches the fixed point.
    fn derive_transfers(
        &self,
        builder: &mut NetworkBuilder,
        added_stops: &[Arc<str>],
        added_lookup: &HashSet<Arc<str>>,
    ) -> Result<(), Error> {
        // tier 1: generated transfers, lowest priority first so later
        // generators overwrite earlier ones
        let stops: Vec<&Stop> = added_stops
            .iter()
            .filter_map(|stop_id| self.schedule.stop(stop_id))
            .collect();
        for generator in self.transfer_generators.iter().rev() {
            for transfer in generator.generate(&stops) {
                if added_lookup.contains(&transfer.from_stop_id)
                    && added_lookup.contains(&transfer.to_stop_id)
                {
                    builder.add_transfer(
                        &transfer.from_stop_id,
                        &transfer.to_stop_id,
                        transfer.duration.as_seconds(),
                    )?;
                }
            }
        }

        // tier 2: hierarchy-derived transfers
        let mut worklist: VecDeque<&Arc<str>> = added_stops.iter().collect();
        while let Some(stop_id) = worklist.pop_front() {
            let Some(stop) = self.schedule.stop(stop_id) else {
                continue;
            };

            // a child inherits its parent's transfers
            if let Some(parent_id) = &stop.parent_id
                && let Some(parent) = self.schedule.stop(parent_id)
            {
                self.apply_transfers_from(stop, parent, builder, added_lookup)?;
            }

            // a parent inherits each child's transfers
            for child_id in &stop.children {
                if let Some(child) = self.schedule.stop(child_id) {
                    self.apply_transfers_from(stop, child, builder, added_lookup)?;
                }
            }

            // fan a stop's own declared transfers out to the destination's
            // children, so any platform of the target station is reachable
            for (to_stop_id, duration) in declared_transfers(stop) {
                let Some(to_stop) = self.schedule.stop(&to_stop_id) else {
                    continue;
                };
                for child_id in &to_stop.children {
                    if added_lookup.contains(child_id) {
                        builder.add_transfer(&stop.id, child_id, duration.as_seconds())?;
                    }
                }
            }
        }

        // tier 3: schedule-declared transfers win every tie
        for stop_id in added_stops {
            let Some(stop) = self.schedule.stop(stop_id) else {
                continue;
            };
            for (to_stop_id, duration) in declared_transfers(stop) {
                if added_lookup.contains(&to_stop_id) {
                    builder.add_transfer(&stop.id, &to_stop_id, duration.as_seconds())?;
                }
            }
        }

        Ok(())
    }

    /// Copies every transfer reachable from `provider` onto `consumer`:
    /// explicit transfers of the provider plus derived edges onto the
    /// destinations' children, explicit declarations winning.
    fn apply_transfers_from(
        &self,
        consumer: &Stop,
        provider: &Stop,
        builder: &mut NetworkBuilder,
        added_lookup: &HashSet<Arc<str>>,
    ) -> Result<(), Error> {
        let mut derived: HashMap<Arc<str>, Duration> = HashMap::new();
        let mut explicit: Vec<(Arc<str>, Duration)> = Vec::new();

        for (to_stop_id, duration) in declared_transfers(provider) {
            let Some(to_stop) = self.schedule.stop(&to_stop_id) else {
                continue;
            };
            if added_lookup.contains(&to_stop_id) {
                explicit.push((to_stop_id.clone(), duration));
            }
            for child_id in &to_stop.children {
                if added_lookup.contains(child_id) {
                    derived.insert(child_id.clone(), duration);
                }
            }
        }
        for (to_stop_id, duration) in explicit {
            derived.insert(to_stop_id, duration);
        }

        for (to_stop_id, duration) in derived {
            builder.add_transfer(&consumer.id, &to_stop_id, duration.as_seconds())?;
        }
        Ok(())
    }
}

/// The minimum-time transfers declared on a stop. Other transfer kinds carry
/// semantics the routing model does not express and are skipped.
fn declared_transfers(stop: &Stop) -> impl Iterator<Item = (Arc<str>, Duration)> + '_ {
    stop.transfers.iter().filter_map(|transfer| {
        if transfer.kind == TransferKind::MinimumTime
            && let Some(duration) = transfer.min_transfer_time
        {
            Some((transfer.to_stop_id.clone(), duration))
        } else {
            None
        }
    })
}
