use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::schedule::{Route, Schedule};

/// A sub-route: the trips of one schedule route that share an identical
/// ordered stop sequence.
#[derive(Debug)]
pub struct SubRoute {
    pub id: Arc<str>,
    pub route_id: Arc<str>,
    pub stop_sequence: Vec<Arc<str>>,
    pub trip_ids: Vec<Arc<str>>,
}

/// Splits a route's trips into sub-routes by stop sequence.
///
/// GTFS does not guarantee a canonical stop order per route, so the sequence
/// of the first trip observed for a group is authoritative. If a feed's trips
/// disagree on order within one logical line, the partition depends on trip
/// declaration order. Known fragility, kept on purpose.
pub fn partition_route(schedule: &Schedule, route: &Route) -> Vec<SubRoute> {
    let mut sequence_lookup: HashMap<String, usize> = HashMap::new();
    let mut sub_routes: Vec<SubRoute> = Vec::new();

    for trip_id in &route.trips {
        let Some(trip) = schedule.trip(trip_id) else {
            continue;
        };
        let key = trip
            .stop_times
            .iter()
            .map(|stop_time| stop_time.stop_id.as_ref())
            .collect::<Vec<_>>()
            .join("-");

        let sub_route_idx = *sequence_lookup.entry(key).or_insert_with(|| {
            let idx = sub_routes.len();
            sub_routes.push(SubRoute {
                id: format!("{}_sr{}", route.id, idx + 1).into(),
                route_id: route.id.clone(),
                stop_sequence: trip
                    .stop_times
                    .iter()
                    .map(|stop_time| stop_time.stop_id.clone())
                    .collect(),
                trip_ids: Vec::new(),
            });
            idx
        });
        sub_routes[sub_route_idx].trip_ids.push(trip.id.clone());
    }

    debug!(
        route = route.id.as_ref(),
        sub_routes = sub_routes.len(),
        "partitioned route"
    );
    sub_routes
}
