use std::collections::BTreeSet;

use tracing::{debug, trace};

use super::config::{QueryConfig, TimeType};
use super::mask::ActiveDay;
use super::relaxer::FootpathRelaxer;
use super::scanner::RouteScanner;
use super::state::{INFINITY, Label, LabelKind, NO_INDEX, QueryState, unreached};
use crate::network::Network;

/// One routing request against the network. Coordinates source seeding,
/// route scanning, footpath relaxation and pruning in rounds; each round
/// adds at most one trip to a connection, which is what makes the collected
/// labels a Pareto frontier in (target time, number of legs).
pub(crate) struct Query<'a> {
    network: &'a Network,
    days: &'a [ActiveDay],
    source_stop_indices: Vec<usize>,
    source_times: Vec<i32>,
    target_stops: Vec<(usize, i32)>,
    config: &'a QueryConfig,
    time_type: TimeType,
    raptor_range: Option<i32>,
    state: QueryState,
}

impl<'a> Query<'a> {
    pub fn new(
        network: &'a Network,
        days: &'a [ActiveDay],
        source_stop_indices: Vec<usize>,
        source_times: Vec<i32>,
        target_stops: Vec<(usize, i32)>,
        config: &'a QueryConfig,
        time_type: TimeType,
        raptor_range: Option<i32>,
    ) -> Self {
        debug_assert_eq!(source_stop_indices.len(), source_times.len());
        let state = QueryState::new(network.stop_count(), time_type);
        Self {
            network,
            days,
            source_stop_indices,
            source_times,
            target_stops,
            config,
            time_type,
            raptor_range,
            state,
        }
    }

    /// Runs the search and returns the filled query state.
    pub fn run(mut self) -> QueryState {
        let min_transfer = self.config.minimum_transfer_duration.as_seconds() as i32;
        let max_walk = self
            .config
            .maximum_walking_duration
            .map(|duration| duration.as_seconds() as i32)
            .unwrap_or(INFINITY);

        let relaxer = FootpathRelaxer::new(self.network, min_transfer, max_walk, self.time_type);
        let scanner = RouteScanner::new(self.network, self.days, min_transfer, self.time_type);

        let spawns = self.spawn_times();
        debug!(spawns = spawns.len(), "running query");

        for (run, spawn_times) in spawns.into_iter().enumerate() {
            if run > 0 {
                self.state.reset_rounds();
            }
            let cutoff = self.cutoff_time(&spawn_times);
            self.initialize(&spawn_times);
            relaxer.relax_initial(&self.source_stop_indices, &mut self.state);
            self.remove_suboptimal_labels(0, cutoff);

            while self.state.has_marked_stops() && self.transfers_within_limit() {
                self.state.add_new_round();
                let round = self.state.round();
                scanner.scan(&mut self.state);
                let improved = self.state.marked_next_round_snapshot();
                relaxer.relax(round, &improved, &mut self.state);
                self.remove_suboptimal_labels(round, cutoff);
            }
        }

        self.state
    }

    fn transfers_within_limit(&self) -> bool {
        match self.config.maximum_transfers {
            // the round about to run adds trip number round; transfers made
            // so far are one less
            Some(maximum) => self.state.round() <= maximum,
            None => true,
        }
    }

    /// The source times of every round-loop run. Without a range this is the
    /// requested times once. With a range, one run per actual trip departure
    /// (or arrival) at the source stops inside the window, latest first for
    /// departure queries so later spawns survive unless strictly dominated.
    fn spawn_times(&self) -> Vec<Vec<i32>> {
        let Some(range) = self.raptor_range.filter(|range| *range > 0) else {
            return vec![self.source_times.clone()];
        };

        let mut times: BTreeSet<i32> = BTreeSet::new();
        for (i, stop_idx) in self.source_stop_indices.iter().enumerate() {
            let requested = self.source_times[i];
            let (window_start, window_end) = match self.time_type {
                TimeType::Departure => (requested, requested + range),
                TimeType::Arrival => (requested - range, requested),
            };
            self.collect_trip_times_at_stop(*stop_idx, window_start, window_end, &mut times);
        }

        if times.is_empty() {
            return vec![self.source_times.clone()];
        }

        let ordered: Vec<i32> = match self.time_type {
            // latest spawn first
            TimeType::Departure => times.into_iter().rev().collect(),
            // earliest spawn first
            TimeType::Arrival => times.into_iter().collect(),
        };

        ordered
            .into_iter()
            .map(|spawn| {
                self.source_times
                    .iter()
                    .map(|requested| match self.time_type {
                        TimeType::Departure => spawn.max(*requested),
                        TimeType::Arrival => spawn.min(*requested),
                    })
                    .collect()
            })
            .collect()
    }

    /// Collects the normalized departure (or arrival) times of active trips
    /// at a stop within the window.
    fn collect_trip_times_at_stop(
        &self,
        stop_idx: usize,
        window_start: i32,
        window_end: i32,
        times: &mut BTreeSet<i32>,
    ) {
        for route_idx in self.network.routes_of_stop(stop_idx) {
            let route_idx = *route_idx as usize;
            let Some(stop_offset) = self.network.stop_offset_in_route(route_idx, stop_idx) else {
                continue;
            };
            let trip_count = self.network.route(route_idx).trip_count();
            for day in self.days {
                for trip_offset in 0..trip_count {
                    if !day.mask.route_masks[route_idx].active[trip_offset] {
                        continue;
                    }
                    let stop_time = self.network.stop_time(route_idx, trip_offset, stop_offset);
                    let time = match self.time_type {
                        TimeType::Departure => day.day_offset + stop_time.departure as i32,
                        TimeType::Arrival => day.day_offset + stop_time.arrival as i32,
                    };
                    if time >= window_start && time <= window_end {
                        times.insert(time);
                    }
                }
            }
        }
    }

    /// Seeds the source stops for one run: an initial label and, where it
    /// improves, the best time; all sources are marked for the first round.
    fn initialize(&mut self, spawn_times: &[i32]) {
        trace!("initializing source stop labels");
        for (i, stop_idx) in self.source_stop_indices.iter().enumerate() {
            let stop_idx = *stop_idx;
            let target_time = spawn_times[i];

            let label = Label {
                source_time: target_time,
                target_time,
                kind: LabelKind::Initial,
                route_or_transfer_idx: NO_INDEX,
                trip_offset: NO_INDEX,
                day_offset: 0,
                stop_idx: stop_idx as u32,
                previous: None,
            };
            self.state.set_label(0, stop_idx, label);

            let improves = match self.time_type {
                TimeType::Departure => target_time < self.state.best_time(stop_idx),
                TimeType::Arrival => target_time > self.state.best_time(stop_idx),
            };
            if improves {
                self.state.set_best_time(stop_idx, target_time);
            }
            self.state.mark(stop_idx);
        }
    }

    /// Unmarks stops whose round label cannot lead to a better connection
    /// than the best target time known so far (including the walk to the
    /// target and the travel time cutoff).
    fn remove_suboptimal_labels(&mut self, round: usize, cutoff: i32) {
        let best_target_time = self.best_time_for_target_stops(cutoff);
        if best_target_time == INFINITY || best_target_time == -INFINITY {
            return;
        }

        for stop_idx in self.state.marked_next_round_snapshot() {
            let Some(label) = self.state.label(round, stop_idx) else {
                continue;
            };
            let suboptimal = match self.time_type {
                TimeType::Departure => label.target_time > best_target_time,
                TimeType::Arrival => label.target_time < best_target_time,
            };
            if suboptimal {
                self.state.clear_label(round, stop_idx);
                self.state.unmark(stop_idx);
            }
        }
    }

    /// The best time over all target stops, after adding each target's walk
    /// duration, bounded by the travel time cutoff.
    fn best_time_for_target_stops(&self, cutoff: i32) -> i32 {
        let mut best = cutoff;
        for (stop_idx, walk_duration) in &self.target_stops {
            let stop_best = self.state.best_time(*stop_idx);
            if stop_best == unreached(self.time_type) {
                continue;
            }
            best = match self.time_type {
                TimeType::Departure => best.min(stop_best + walk_duration),
                TimeType::Arrival => best.max(stop_best - walk_duration),
            };
        }
        best
    }

    /// The latest allowed arrival (or earliest allowed departure) of this
    /// run. Stops reached beyond it are not expanded further.
    fn cutoff_time(&self, spawn_times: &[i32]) -> i32 {
        let Some(maximum_travel_time) = self.config.maximum_travel_time else {
            return unreached(self.time_type);
        };
        let maximum = maximum_travel_time.as_seconds() as i32;
        match self.time_type {
            TimeType::Departure => {
                let earliest = spawn_times.iter().min().copied().unwrap_or(0);
                earliest + maximum
            }
            TimeType::Arrival => {
                let latest = spawn_times.iter().max().copied().unwrap_or(0);
                latest - maximum
            }
        }
    }
}
