//! Shared test fixture: a small grid network in the spirit of
//!
//! ```text
//!                      M
//!                      |
//!        I ---- J ---- K ---- L
//!        |             |
//!        |             N ---- O ---- P ---- Q
//!        |             #
//! A ---- B ---- C ---- D ---- E ---- F ---- G
//!        |
//!        H
//! ```
//!
//! Routes (each also added in reverse direction):
//! - R1: A, B, C, D, E, F, G
//! - R2: H, B, I, J, K, L
//! - R3: M, K, N, O, P, Q
//! - R5: A, B, C, D, E, F, P, O, N, K, J, I, B, H (self intersecting)
//!
//! Trips run on a fixed headway between the service day start and end hours,
//! with a constant travel time between stops and a constant dwell time.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use fahrplan::network::{Network, StopTime};
use fahrplan::raptor::{
    Connection, FullServiceMask, QueryConfig, Router, RouterConfig, TimeType,
};
use fahrplan::shared::Duration;

pub const REFERENCE_YMD: (i32, u32, u32) = (2021, 1, 1);

pub fn reference_date() -> NaiveDate {
    let (y, m, d) = REFERENCE_YMD;
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Time of day on the reference date.
pub fn at(hour: u32, minute: u32) -> NaiveDateTime {
    reference_date().and_hms_opt(hour, minute, 0).unwrap()
}

pub struct TestRoute {
    pub id: &'static str,
    pub stops: Vec<&'static str>,
    pub first_departure_offset: u32,
    pub headway: u32,
    pub travel_time: u32,
    pub dwell_time: u32,
}

impl TestRoute {
    pub fn new(id: &'static str, stops: Vec<&'static str>) -> Self {
        Self {
            id,
            stops,
            first_departure_offset: 0,
            headway: 15,
            travel_time: 5,
            dwell_time: 1,
        }
    }

    pub fn with_times(
        mut self,
        first_departure_offset: u32,
        headway: u32,
        travel_time: u32,
        dwell_time: u32,
    ) -> Self {
        self.first_departure_offset = first_departure_offset;
        self.headway = headway;
        self.travel_time = travel_time;
        self.dwell_time = dwell_time;
        self
    }
}

pub struct TestNetworkBuilder {
    routes: Vec<TestRoute>,
    transfers: Vec<(&'static str, &'static str, u32)>,
    service_day_start_hour: u32,
    service_day_end_hour: u32,
    same_stop_transfer_time: u32,
    days_to_scan: usize,
    raptor_range: Option<u32>,
}

impl Default for TestNetworkBuilder {
    fn default() -> Self {
        Self {
            routes: Vec::new(),
            transfers: Vec::new(),
            service_day_start_hour: 5,
            service_day_end_hour: 25,
            same_stop_transfer_time: 120,
            days_to_scan: 1,
            raptor_range: None,
        }
    }
}

impl TestNetworkBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn with_route_1_ag(self) -> Self {
        self.with_route(TestRoute::new("R1", vec!["A", "B", "C", "D", "E", "F", "G"]))
    }

    pub fn with_route_2_hl(self) -> Self {
        self.with_route(TestRoute::new("R2", vec!["H", "B", "I", "J", "K", "L"]))
    }

    pub fn with_route_3_mq(self) -> Self {
        self.with_route(TestRoute::new("R3", vec!["M", "K", "N", "O", "P", "Q"]))
    }

    pub fn with_route_5_self_intersecting(self) -> Self {
        self.with_route(TestRoute::new(
            "R5",
            vec![
                "A", "B", "C", "D", "E", "F", "P", "O", "N", "K", "J", "I", "B", "H",
            ],
        ))
    }

    pub fn with_route(mut self, route: TestRoute) -> Self {
        self.routes.push(route);
        self
    }

    /// Bidirectional transfer, duration in minutes.
    pub fn with_transfer(mut self, from: &'static str, to: &'static str, minutes: u32) -> Self {
        self.transfers.push((from, to, minutes));
        self
    }

    pub fn with_same_stop_transfer_time(mut self, seconds: u32) -> Self {
        self.same_stop_transfer_time = seconds;
        self
    }

    pub fn with_days_to_scan(mut self, days: usize) -> Self {
        self.days_to_scan = days;
        self
    }

    pub fn with_raptor_range(mut self, seconds: u32) -> Self {
        self.raptor_range = Some(seconds);
        self
    }

    pub fn build_network(&self) -> Network {
        let mut builder = Network::builder(self.same_stop_transfer_time);
        let mut added: Vec<&str> = Vec::new();

        for route in &self.routes {
            for stop in route.stops.iter().copied() {
                if !added.contains(&stop) {
                    builder.add_stop(stop).unwrap();
                    added.push(stop);
                }
            }

            let forward_id = format!("{}-F", route.id);
            let reverse_id = format!("{}-R", route.id);
            let reversed: Vec<&str> = route.stops.iter().rev().copied().collect();
            builder.add_route(&forward_id, &route.stops).unwrap();
            builder.add_route(&reverse_id, &reversed).unwrap();

            let day_start = self.service_day_start_hour * 3600 + route.first_departure_offset * 60;
            let day_end = self.service_day_end_hour * 3600;
            let mut departure = day_start;
            let mut trip_count = 0;
            while departure < day_end {
                let forward_trip = format!("{}-F-{trip_count}", route.id);
                let reverse_trip = format!("{}-R-{trip_count}", route.id);
                builder.add_trip(&forward_trip, &forward_id).unwrap();
                builder.add_trip(&reverse_trip, &reverse_id).unwrap();

                let mut arrival = departure;
                let mut leave = departure;
                for position in 0..route.stops.len() {
                    if position + 1 == route.stops.len() {
                        leave = arrival;
                    }
                    let stop_time = StopTime {
                        arrival,
                        departure: leave,
                    };
                    builder
                        .add_stop_time(
                            &forward_id,
                            &forward_trip,
                            position,
                            route.stops[position],
                            stop_time,
                        )
                        .unwrap();
                    builder
                        .add_stop_time(
                            &reverse_id,
                            &reverse_trip,
                            position,
                            reversed[position],
                            stop_time,
                        )
                        .unwrap();
                    arrival = leave + route.travel_time * 60;
                    leave = arrival + route.dwell_time * 60;
                }

                departure += route.headway * 60;
                trip_count += 1;
            }
        }

        for (from, to, minutes) in self.transfers.iter().copied() {
            for stop in [from, to] {
                if !added.contains(&stop) {
                    builder.add_stop(stop).unwrap();
                    added.push(stop);
                }
            }
            builder.add_transfer(from, to, minutes * 60).unwrap();
            builder.add_transfer(to, from, minutes * 60).unwrap();
        }

        builder.build().unwrap()
    }

    pub fn build(&self) -> Router {
        let config = RouterConfig {
            days_to_scan: self.days_to_scan,
            default_same_stop_transfer_time: self.same_stop_transfer_time,
            raptor_range: self.raptor_range.map(Duration::from_seconds),
            ..Default::default()
        };
        Router::new(Arc::new(self.build_network()), config, Arc::new(FullServiceMask)).unwrap()
    }
}

pub fn single_departure(stop: &str, time: NaiveDateTime) -> HashMap<String, NaiveDateTime> {
    HashMap::from([(stop.to_string(), time)])
}

pub fn single_target(stop: &str) -> HashMap<String, Duration> {
    HashMap::from([(stop.to_string(), Duration::from_seconds(0))])
}

pub fn earliest_arrival(
    router: &Router,
    from: &str,
    to: &str,
    departure: NaiveDateTime,
) -> Vec<Connection> {
    router
        .route_earliest_arrival(
            &single_departure(from, departure),
            &single_target(to),
            &QueryConfig::new(),
        )
        .unwrap()
}

pub fn latest_departure(
    router: &Router,
    from: &str,
    to: &str,
    arrival: NaiveDateTime,
) -> Vec<Connection> {
    router
        .route_latest_departure(
            &single_target(from),
            &single_departure(to, arrival),
            &QueryConfig::new(),
        )
        .unwrap()
}

/// Checks the result invariants: legs are contiguous in stops and times, and
/// the list is a Pareto frontier where more route legs buy a strictly better
/// target time.
pub fn assert_pareto_and_contiguous(connections: &[Connection], time_type: TimeType) {
    for connection in connections {
        for pair in connection.legs().windows(2) {
            assert_eq!(pair[0].to_stop_id, pair[1].from_stop_id);
            assert!(pair[0].arrival_time <= pair[1].departure_time);
        }
    }
    for pair in connections.windows(2) {
        let legs_before = pair[0].route_legs().count();
        let legs_after = pair[1].route_legs().count();
        assert!(legs_before < legs_after, "route legs must strictly increase");
        match time_type {
            TimeType::Departure => {
                assert!(pair[1].arrival_time() < pair[0].arrival_time())
            }
            TimeType::Arrival => {
                assert!(pair[1].departure_time() > pair[0].departure_time())
            }
        }
    }
}
