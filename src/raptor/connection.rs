use std::sync::Arc;

use chrono::NaiveDateTime;
use serde::Serialize;

/// Kind of a leg within a connection.
#[derive(Debug, Clone, Serialize)]
pub enum LegKind {
    /// Riding a trip of a route.
    Route {
        route_id: Arc<str>,
        trip_id: Arc<str>,
    },
    /// Walking a footpath transfer between two stops.
    WalkTransfer,
}

impl LegKind {
    pub fn is_route(&self) -> bool {
        matches!(self, LegKind::Route { .. })
    }
}

/// A part of a connection traveled without changing vehicle or mode.
#[derive(Debug, Clone, Serialize)]
pub struct Leg {
    pub from_stop_id: Arc<str>,
    pub to_stop_id: Arc<str>,
    pub departure_time: NaiveDateTime,
    pub arrival_time: NaiveDateTime,
    pub kind: LegKind,
}

/// A sequence of legs from an origin stop to a destination stop.
#[derive(Debug, Clone, Serialize)]
pub struct Connection {
    legs: Vec<Leg>,
}

impl Connection {
    /// Builds a connection from legs, sorting them chronologically and
    /// checking leg contiguity: each leg must start where and not before the
    /// previous one ended. A malformed chain yields `None`; this is the last
    /// line of defense against a broken label chain, not an expected path.
    pub(crate) fn from_legs(mut legs: Vec<Leg>) -> Option<Self> {
        if legs.is_empty() {
            return None;
        }
        legs.sort_by_key(|leg| (leg.departure_time, leg.arrival_time));

        for pair in legs.windows(2) {
            let consistent = pair[0].to_stop_id == pair[1].from_stop_id
                && pair[0].arrival_time <= pair[1].departure_time;
            if !consistent {
                return None;
            }
        }
        for leg in &legs {
            if leg.departure_time > leg.arrival_time {
                return None;
            }
        }

        Some(Self { legs })
    }

    pub fn legs(&self) -> &[Leg] {
        &self.legs
    }

    pub fn departure_time(&self) -> NaiveDateTime {
        self.legs[0].departure_time
    }

    pub fn arrival_time(&self) -> NaiveDateTime {
        self.legs[self.legs.len() - 1].arrival_time
    }

    pub fn from_stop_id(&self) -> &Arc<str> {
        &self.legs[0].from_stop_id
    }

    pub fn to_stop_id(&self) -> &Arc<str> {
        &self.legs[self.legs.len() - 1].to_stop_id
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.arrival_time() - self.departure_time()).num_seconds()
    }

    pub fn route_legs(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter().filter(|leg| leg.kind.is_route())
    }

    pub fn walk_transfers(&self) -> impl Iterator<Item = &Leg> {
        self.legs.iter().filter(|leg| !leg.kind.is_route())
    }

    /// Number of times a vehicle is changed.
    pub fn transfer_count(&self) -> usize {
        self.route_legs().count().saturating_sub(1)
    }

    /// Vehicle changes without a footpath in between.
    pub fn same_stop_transfer_count(&self) -> usize {
        self.legs
            .windows(2)
            .filter(|pair| pair[0].kind.is_route() && pair[1].kind.is_route())
            .count()
    }
}
