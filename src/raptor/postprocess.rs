use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::warn;

use super::config::TimeType;
use super::connection::{Connection, Leg, LegKind};
use super::state::{Label, LabelKind, QueryState, unreached};
use crate::network::Network;
use crate::shared::from_timestamp;

/// Turns the per-round labels of a finished query into user-facing
/// connections.
pub(crate) struct Postprocessor<'a> {
    network: &'a Network,
    time_type: TimeType,
    reference_date: NaiveDate,
}

impl<'a> Postprocessor<'a> {
    pub fn new(network: &'a Network, time_type: TimeType, reference_date: NaiveDate) -> Self {
        Self {
            network,
            time_type,
            reference_date,
        }
    }

    /// Reconstructs the Pareto-optimal connections to the target stops: per
    /// round (= number of trips) the best target label, kept only when it
    /// strictly improves on all rounds with fewer trips.
    pub fn reconstruct_pareto(
        &self,
        state: &QueryState,
        target_stops: &[(usize, i32)],
    ) -> Vec<Connection> {
        let mut connections = Vec::new();
        let mut best_time = unreached(self.time_type);

        for round in 0..state.round_count() {
            let mut best_label_ref = None;

            for (stop_idx, walk_duration) in target_stops {
                let Some(label_ref) = state.label_ref(round, *stop_idx) else {
                    continue;
                };
                let label = state.resolve(label_ref);
                match self.time_type {
                    TimeType::Departure => {
                        let actual_arrival = label.target_time + walk_duration;
                        if actual_arrival < best_time {
                            best_label_ref = Some(label_ref);
                            best_time = actual_arrival;
                        }
                    }
                    TimeType::Arrival => {
                        let actual_departure = label.target_time - walk_duration;
                        if actual_departure > best_time {
                            best_label_ref = Some(label_ref);
                            best_time = actual_departure;
                        }
                    }
                }
            }

            let Some(label_ref) = best_label_ref else {
                continue;
            };
            if let Some(connection) = self.reconstruct_connection(state, label_ref) {
                connections.push(connection);
            }
        }

        connections
    }

    /// Reconstructs, per reachable stop, the best connection from the
    /// sources. Stops only reached by their own initial label are skipped.
    pub fn reconstruct_isolines(&self, state: &QueryState) -> HashMap<String, Connection> {
        let mut isolines = HashMap::new();
        for stop_idx in 0..self.network.stop_count() {
            let Some(label_ref) = self.best_label_for_stop(state, stop_idx) else {
                continue;
            };
            if state.resolve(label_ref).kind == LabelKind::Initial {
                continue;
            }
            if let Some(connection) = self.reconstruct_connection(state, label_ref) {
                isolines.insert(self.network.stop(stop_idx).id.to_string(), connection);
            }
        }
        isolines
    }

    /// The label with the best target time over all rounds of a stop.
    fn best_label_for_stop(&self, state: &QueryState, stop_idx: usize) -> Option<u32> {
        let mut best: Option<u32> = None;
        for round in 0..state.round_count() {
            let Some(label_ref) = state.label_ref(round, stop_idx) else {
                continue;
            };
            let improved = match best {
                None => true,
                Some(best_ref) => {
                    let best_time = state.resolve(best_ref).target_time;
                    let time = state.resolve(label_ref).target_time;
                    match self.time_type {
                        TimeType::Departure => time < best_time,
                        TimeType::Arrival => time > best_time,
                    }
                }
            };
            if improved {
                best = Some(label_ref);
            }
        }
        best
    }

    fn reconstruct_connection(&self, state: &QueryState, label_ref: u32) -> Option<Connection> {
        // collect the chain target-first, back to the initial label
        let mut chain: Vec<Label> = Vec::new();
        let mut current = *state.resolve(label_ref);
        while current.kind != LabelKind::Initial {
            chain.push(current);
            let previous_ref = current.previous?;
            current = *state.resolve(previous_ref);
        }
        if chain.is_empty() {
            return None;
        }

        self.maybe_combine_labels(&mut chain, state, true);
        self.maybe_combine_labels(&mut chain, state, false);

        let mut legs = Vec::with_capacity(chain.len());
        for label in &chain {
            let previous_ref = label.previous?;
            let previous_stop_idx = state.resolve(previous_ref).stop_idx as usize;
            let stop_idx = label.stop_idx as usize;

            let (from_stop_idx, to_stop_idx, departure_ts, arrival_ts) = match self.time_type {
                TimeType::Departure => (
                    previous_stop_idx,
                    stop_idx,
                    label.source_time,
                    label.target_time,
                ),
                TimeType::Arrival => (
                    stop_idx,
                    previous_stop_idx,
                    label.target_time,
                    label.source_time,
                ),
            };

            let kind = match label.kind {
                LabelKind::Route => {
                    let route = self.network.route(label.route_or_transfer_idx as usize);
                    LegKind::Route {
                        route_id: route.id.clone(),
                        trip_id: route.trip_ids[label.trip_offset as usize].clone(),
                    }
                }
                LabelKind::Transfer => LegKind::WalkTransfer,
                LabelKind::Initial => return None,
            };

            legs.push(Leg {
                from_stop_id: self.network.stop(from_stop_idx).id.clone(),
                to_stop_id: self.network.stop(to_stop_idx).id.clone(),
                departure_time: from_timestamp(departure_ts, self.reference_date),
                arrival_time: from_timestamp(arrival_ts, self.reference_date),
                kind,
            });
        }

        let connection = Connection::from_legs(legs);
        if connection.is_none() {
            warn!("discarding connection with inconsistent legs");
        }
        connection
    }

    /// Tries to merge a transfer label next to a route label into the route
    /// label when the route's trip also covers the transfer's stop at least
    /// as well.
    ///
    /// `from_target == true` looks at the two labels closest to the target:
    /// a trailing transfer can hide a direct route arrival when the
    /// same-stop change time made the walk compare better during routing.
    /// `from_target == false` looks at the connection's first two legs: a
    /// footpath relaxed at the requested time followed by a much later trip
    /// wastes travel time if the trip also serves the source stop. When the
    /// leading pair cannot be merged, the source transfer is instead shifted
    /// in time to remove the idle gap before the first trip. Neither
    /// operation changes the connection's anchor times.
    fn maybe_combine_labels(&self, chain: &mut Vec<Label>, state: &QueryState, from_target: bool) {
        if chain.len() < 2 {
            return;
        }

        let transfer_idx = if from_target { 0 } else { chain.len() - 1 };
        let route_idx = if from_target { 1 } else { chain.len() - 2 };
        let transfer_label = chain[transfer_idx];
        let route_label = chain[route_idx];

        if transfer_label.kind != LabelKind::Transfer || route_label.kind != LabelKind::Route {
            return;
        }

        let stop_idx = if from_target {
            transfer_label.stop_idx as usize
        } else {
            let Some(previous_ref) = transfer_label.previous else {
                return;
            };
            state.resolve(previous_ref).stop_idx as usize
        };

        let stop_time = self.trip_stop_time_at(
            stop_idx,
            route_label.route_or_transfer_idx as usize,
            route_label.trip_offset as usize,
            route_label.day_offset,
        );

        let usable = stop_time.filter(|(arrival, departure)| {
            if from_target {
                self.can_be_target(*arrival, *departure, &route_label, &transfer_label)
            } else {
                self.can_be_source(*arrival, *departure, &route_label, &transfer_label)
            }
        });
        let Some((arrival, departure)) = usable else {
            if !from_target {
                shift_source_transfer(chain, transfer_idx, &transfer_label, &route_label);
            }
            return;
        };

        let is_departure = self.time_type == TimeType::Departure;
        let direction = if is_departure { 1 } else { -1 };
        let route_time = match (from_target, is_departure) {
            (true, true) => arrival,
            (true, false) => departure,
            (false, true) => departure,
            (false, false) => arrival,
        };
        let reference_time = if from_target {
            direction * transfer_label.target_time
        } else {
            direction * transfer_label.source_time
        };

        let not_improving = if from_target {
            direction * route_time > reference_time
        } else {
            direction * route_time < reference_time
        };
        if not_improving {
            return;
        }

        if from_target {
            let combined = Label {
                source_time: route_label.source_time,
                target_time: route_time,
                stop_idx: transfer_label.stop_idx,
                previous: route_label.previous,
                ..route_label
            };
            chain.drain(0..2);
            chain.insert(0, combined);
        } else {
            let combined = Label {
                source_time: route_time,
                target_time: route_label.target_time,
                stop_idx: route_label.stop_idx,
                previous: transfer_label.previous,
                ..route_label
            };
            chain.truncate(chain.len() - 2);
            chain.push(combined);
        }
    }

    fn can_be_source(
        &self,
        arrival: i32,
        departure: i32,
        route_label: &Label,
        transfer_label: &Label,
    ) -> bool {
        match self.time_type {
            TimeType::Departure => {
                departure <= route_label.target_time && departure >= transfer_label.source_time
            }
            TimeType::Arrival => {
                arrival >= route_label.target_time && arrival <= transfer_label.source_time
            }
        }
    }

    fn can_be_target(
        &self,
        arrival: i32,
        departure: i32,
        route_label: &Label,
        transfer_label: &Label,
    ) -> bool {
        match self.time_type {
            TimeType::Departure => {
                arrival >= route_label.source_time && arrival <= transfer_label.target_time
            }
            TimeType::Arrival => {
                departure <= route_label.source_time && departure >= transfer_label.target_time
            }
        }
    }

    /// The normalized (arrival, departure) of a trip at a stop, or `None` if
    /// the trip does not serve the stop.
    fn trip_stop_time_at(
        &self,
        stop_idx: usize,
        route_idx: usize,
        trip_offset: usize,
        day_offset: i32,
    ) -> Option<(i32, i32)> {
        let stop_offset = self.network.stop_offset_in_route(route_idx, stop_idx)?;
        let stop_time = self.network.stop_time(route_idx, trip_offset, stop_offset);
        Some((
            day_offset + stop_time.arrival as i32,
            day_offset + stop_time.departure as i32,
        ))
    }
}

/// Shifts a leading source transfer in time so it ends exactly when the
/// first trip leaves, removing idle waiting from the travel time.
fn shift_source_transfer(
    chain: &mut [Label],
    transfer_idx: usize,
    transfer_label: &Label,
    route_label: &Label,
) {
    let idle_time = route_label.source_time - transfer_label.target_time;
    if idle_time != 0 {
        chain[transfer_idx] = Label {
            source_time: transfer_label.source_time + idle_time,
            target_time: transfer_label.target_time + idle_time,
            ..*transfer_label
        };
    }
}
