use tracing::trace;

use super::config::TimeType;
use super::mask::ActiveDay;
use super::state::{Label, LabelKind, QueryState, unreached};
use crate::network::Network;

/// Scans the routes passing marked stops, once per round.
///
/// All trip times are normalized before comparison: the raw service-day stop
/// time plus the day offset of the service day the trip row belongs to. The
/// scan direction and the "first boardable trip" rule flip with the time
/// type, everything else is shared between directions.
pub(crate) struct RouteScanner<'a> {
    network: &'a Network,
    days: &'a [ActiveDay],
    min_transfer_duration: i32,
    time_type: TimeType,
}

struct ActiveTrip {
    trip_offset: usize,
    day_index: usize,
    entry_time: i32,
    boarding_label: u32,
}

impl<'a> RouteScanner<'a> {
    pub fn new(
        network: &'a Network,
        days: &'a [ActiveDay],
        min_transfer_duration: i32,
        time_type: TimeType,
    ) -> Self {
        Self {
            network,
            days,
            min_transfer_duration,
            time_type,
        }
    }

    /// Scans all routes serving stops marked for this round, updating labels
    /// and marking improved stops for the next round.
    pub fn scan(&self, state: &mut QueryState) {
        let mut routes_to_scan = vec![false; self.network.route_count()];
        for stop_idx in state.marked_this_round() {
            for route_idx in self.network.routes_of_stop(stop_idx) {
                routes_to_scan[*route_idx as usize] = true;
            }
        }

        for route_idx in 0..routes_to_scan.len() {
            if routes_to_scan[route_idx] {
                self.scan_route(route_idx, state);
            }
        }
    }

    fn scan_route(&self, route_idx: usize, state: &mut QueryState) {
        let round = state.round();
        let last_round = round - 1;
        let forward = self.time_type == TimeType::Departure;
        let route = self.network.route(route_idx);
        let stop_count = route.stop_count();
        trace!(route = route.id.as_ref(), forward, "scanning route");

        let mut active_trip: Option<ActiveTrip> = None;

        let offsets: Box<dyn Iterator<Item = usize>> = if forward {
            Box::new(0..stop_count)
        } else {
            Box::new((0..stop_count).rev())
        };

        for stop_offset in offsets {
            let stop_idx =
                self.network.route_stop_sequence(route_idx)[stop_offset].stop_idx as usize;
            let best_stop_time = state.best_time(stop_idx);

            match &active_trip {
                None => {
                    if !self.can_enter_at_stop(
                        state,
                        best_stop_time,
                        stop_idx,
                        stop_offset,
                        stop_count,
                    ) {
                        continue;
                    }
                }
                Some(trip) => {
                    // riding a trip, check whether alighting here improves
                    if !self.check_if_trip_improves_and_update(
                        trip,
                        route_idx,
                        stop_idx,
                        stop_offset,
                        best_stop_time,
                        round,
                        last_round,
                        state,
                    ) {
                        continue;
                    }
                }
            }
            active_trip = self.find_boardable_trip(route_idx, stop_idx, stop_offset, last_round, state);
        }
    }

    /// Whether a trip can be boarded at this stop in this round: the stop
    /// must have been reached, improved in the previous round, and must not
    /// be the terminal stop of the scan direction.
    fn can_enter_at_stop(
        &self,
        state: &QueryState,
        stop_time: i32,
        stop_idx: usize,
        stop_offset: usize,
        stop_count: usize,
    ) -> bool {
        if stop_time == unreached(self.time_type) {
            return false;
        }
        if !state.is_marked_this_round(stop_idx) {
            // already scanned in an earlier round without improvement
            return false;
        }
        match self.time_type {
            TimeType::Departure => stop_offset + 1 != stop_count,
            TimeType::Arrival => stop_offset != 0,
        }
    }

    /// Updates the stop's label if riding the active trip improves its best
    /// time. Returns whether a different (earlier/later) trip could still be
    /// boarded at this stop within this round.
    #[allow(clippy::too_many_arguments)]
    fn check_if_trip_improves_and_update(
        &self,
        trip: &ActiveTrip,
        route_idx: usize,
        stop_idx: usize,
        stop_offset: usize,
        best_stop_time: i32,
        round: usize,
        last_round: usize,
        state: &mut QueryState,
    ) -> bool {
        let day = &self.days[trip.day_index];
        let stop_time = self.network.stop_time(route_idx, trip.trip_offset, stop_offset);
        let arrival = day.day_offset + stop_time.arrival as i32;
        let departure = day.day_offset + stop_time.departure as i32;

        let (ride_time, improved) = match self.time_type {
            TimeType::Departure => (arrival, arrival < best_stop_time),
            TimeType::Arrival => (departure, departure > best_stop_time),
        };

        if improved {
            state.set_best_time(stop_idx, ride_time);
            let label = Label {
                source_time: trip.entry_time,
                target_time: ride_time,
                kind: LabelKind::Route,
                route_or_transfer_idx: route_idx as u32,
                trip_offset: trip.trip_offset as u32,
                day_offset: day.day_offset,
                stop_idx: stop_idx as u32,
                previous: Some(trip.boarding_label),
            };
            state.set_label(round, stop_idx, label);
            state.mark(stop_idx);
            return false;
        }

        // reaching this stop was not an improvement; an earlier/later trip
        // is only worth looking for if the previous round reached the stop
        // better than this trip does
        let previous = state.label(last_round, stop_idx);
        match self.time_type {
            TimeType::Departure => {
                !previous.is_none_or(|previous| previous.target_time >= arrival)
            }
            TimeType::Arrival => {
                !previous.is_none_or(|previous| previous.target_time <= departure)
            }
        }
    }

    /// Finds the first boardable trip at this stop over the whole scan
    /// window: the earliest active trip departing at or after the reference
    /// time (departure direction), or the latest active trip arriving at or
    /// before it (arrival direction). A same-stop transfer penalty applies
    /// when the stop was reached by a route in the previous round.
    fn find_boardable_trip(
        &self,
        route_idx: usize,
        stop_idx: usize,
        stop_offset: usize,
        last_round: usize,
        state: &QueryState,
    ) -> Option<ActiveTrip> {
        let boarding_label = state.label_ref(last_round, stop_idx)?;
        let previous = state.resolve(boarding_label);
        let route = self.network.route(route_idx);

        let mut reference_time = previous.target_time;
        if previous.kind == LabelKind::Route {
            let change_time = (self.network.stop(stop_idx).same_stop_transfer_time as i32)
                .max(self.min_transfer_duration);
            reference_time += match self.time_type {
                TimeType::Departure => change_time,
                TimeType::Arrival => -change_time,
            };
        }

        let mut best: Option<ActiveTrip> = None;
        for (day_index, day) in self.days.iter().enumerate() {
            let route_mask = &day.mask.route_masks[route_idx];
            if !route_mask.has_active_trips() {
                continue;
            }
            // the whole service day is out of reach of the reference time
            match self.time_type {
                TimeType::Departure => {
                    if day.day_offset + route_mask.latest < reference_time {
                        continue;
                    }
                }
                TimeType::Arrival => {
                    if day.day_offset + route_mask.earliest > reference_time {
                        continue;
                    }
                }
            }

            let candidate = match self.time_type {
                TimeType::Departure => self.first_departure_in_day(
                    route_idx,
                    route.trip_count(),
                    stop_offset,
                    day_index,
                    reference_time,
                ),
                TimeType::Arrival => self.last_arrival_in_day(
                    route_idx,
                    route.trip_count(),
                    stop_offset,
                    day_index,
                    reference_time,
                ),
            };

            if let Some((trip_offset, entry_time)) = candidate {
                let better = match (&best, self.time_type) {
                    (None, _) => true,
                    (Some(best), TimeType::Departure) => entry_time < best.entry_time,
                    (Some(best), TimeType::Arrival) => entry_time > best.entry_time,
                };
                if better {
                    best = Some(ActiveTrip {
                        trip_offset,
                        day_index,
                        entry_time,
                        boarding_label,
                    });
                }
            }
        }
        best
    }

    fn first_departure_in_day(
        &self,
        route_idx: usize,
        trip_count: usize,
        stop_offset: usize,
        day_index: usize,
        reference_time: i32,
    ) -> Option<(usize, i32)> {
        let day = &self.days[day_index];
        for trip_offset in 0..trip_count {
            if !day.mask.route_masks[route_idx].active[trip_offset] {
                continue;
            }
            let departure = day.day_offset
                + self.network.stop_time(route_idx, trip_offset, stop_offset).departure as i32;
            if departure >= reference_time {
                return Some((trip_offset, departure));
            }
        }
        None
    }

    fn last_arrival_in_day(
        &self,
        route_idx: usize,
        trip_count: usize,
        stop_offset: usize,
        day_index: usize,
        reference_time: i32,
    ) -> Option<(usize, i32)> {
        let day = &self.days[day_index];
        for trip_offset in (0..trip_count).rev() {
            if !day.mask.route_masks[route_idx].active[trip_offset] {
                continue;
            }
            let arrival = day.day_offset
                + self.network.stop_time(route_idx, trip_offset, stop_offset).arrival as i32;
            if arrival <= reference_time {
                return Some((trip_offset, arrival));
            }
        }
        None
    }
}
