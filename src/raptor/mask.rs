use std::sync::Arc;

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

use super::config::QueryConfig;
use crate::cache::{EvictionCache, Strategy};
use crate::network::Network;
use crate::schedule::{Accessibility, BikeAllowance, Schedule};

/// Sentinel for "no active trip", used in per-route time bounds.
pub(crate) const NO_TRIP: i32 = i32::MIN;

#[derive(Error, Debug)]
pub enum MaskError {
    #[error("trip {0} of the network is unknown to the mask provider")]
    UnknownTrip(String),
    #[error("calendar {calendar} of trip {trip} is unknown to the mask provider")]
    UnknownCalendar { calendar: String, trip: String },
}

/// Which trips of each sub-route run on one date. `route_masks` is aligned
/// with the network's route indices, each inner slice with the route's trip
/// rows.
#[derive(Debug, Clone)]
pub struct DayMask {
    pub service_key: String,
    pub date: NaiveDate,
    pub route_masks: Vec<Box<[bool]>>,
}

/// Resolves per-date trip activation for the router.
///
/// Both operations must be pure functions of the date (plus query filters),
/// which is what makes their results cacheable. Implementations are shared
/// across concurrent queries.
pub trait TripMaskProvider: Send + Sync {
    /// Canonical, order-independent key identifying the set of services
    /// active on `date`. Dates with the same key share one activation mask.
    fn service_key(&self, date: NaiveDate) -> String;

    /// The per-route trip masks for `date` under the given query filters.
    fn day_mask(
        &self,
        date: NaiveDate,
        network: &Network,
        query: &QueryConfig,
    ) -> Result<DayMask, MaskError>;

    /// Drops any memoized state. Called when the schedule (and with it the
    /// network) is replaced.
    fn invalidate(&self) {}
}

/// Mask provider that marks every trip active on every date. Useful for
/// networks without calendar information and for tests.
pub struct FullServiceMask;

impl TripMaskProvider for FullServiceMask {
    fn service_key(&self, _date: NaiveDate) -> String {
        "full-service".to_string()
    }

    fn day_mask(
        &self,
        date: NaiveDate,
        network: &Network,
        _query: &QueryConfig,
    ) -> Result<DayMask, MaskError> {
        let route_masks = network
            .routes()
            .iter()
            .map(|route| vec![true; route.trip_count()].into_boxed_slice())
            .collect();
        Ok(DayMask {
            service_key: self.service_key(date),
            date,
            route_masks,
        })
    }
}

/// Mask provider backed by the schedule's calendars.
///
/// The service key per date is memoized in its own cache, sized a multiple
/// of the mask cache: distinct active-calendar combinations are far fewer
/// than possible query dates, so keeping more keys resident saves the
/// expensive mask computations behind them.
pub struct ScheduleTripMaskProvider {
    schedule: Arc<Schedule>,
    service_keys: EvictionCache<NaiveDate, String>,
}

impl ScheduleTripMaskProvider {
    const SERVICE_KEY_CACHE_FACTOR: usize = 20;
    const SERVICE_KEY_CACHE_MAX: usize = 365;

    pub fn new(schedule: Arc<Schedule>, mask_cache_size: usize, strategy: Strategy) -> Self {
        let capacity =
            (mask_cache_size * Self::SERVICE_KEY_CACHE_FACTOR).min(Self::SERVICE_KEY_CACHE_MAX);
        Self {
            schedule,
            service_keys: EvictionCache::new(capacity, strategy),
        }
    }
}

impl TripMaskProvider for ScheduleTripMaskProvider {
    fn service_key(&self, date: NaiveDate) -> String {
        let key = self.service_keys.compute_if_absent(date, || {
            let mut active: Vec<&str> = self
                .schedule
                .calendars()
                .values()
                .filter(|calendar| calendar.is_service_available(date))
                .map(|calendar| calendar.id.as_ref())
                .collect();
            active.sort_unstable();
            active.join(",")
        });
        key.as_ref().clone()
    }

    fn day_mask(
        &self,
        date: NaiveDate,
        network: &Network,
        query: &QueryConfig,
    ) -> Result<DayMask, MaskError> {
        debug!(%date, "building day trip mask");
        let mut route_masks = Vec::with_capacity(network.route_count());

        for route_idx in 0..network.route_count() {
            let trip_ids = network.route_trip_ids(route_idx);
            let mut mask = vec![false; trip_ids.len()].into_boxed_slice();

            // travel mode is a property of the whole route, checking the
            // first trip short-circuits the rest
            if query.allowed_travel_modes.is_restricting()
                && let Some(first_trip_id) = trip_ids.first()
            {
                let trip = self
                    .schedule
                    .trip(first_trip_id)
                    .ok_or_else(|| MaskError::UnknownTrip(first_trip_id.to_string()))?;
                let mode = self
                    .schedule
                    .route(&trip.route_id)
                    .map(|route| route.mode);
                if let Some(mode) = mode
                    && !query.allowed_travel_modes.contains(mode)
                {
                    route_masks.push(mask);
                    continue;
                }
            }

            for (trip_offset, trip_id) in trip_ids.iter().enumerate() {
                let trip = self
                    .schedule
                    .trip(trip_id)
                    .ok_or_else(|| MaskError::UnknownTrip(trip_id.to_string()))?;
                let calendar = self.schedule.calendar(&trip.calendar_id).ok_or_else(|| {
                    MaskError::UnknownCalendar {
                        calendar: trip.calendar_id.to_string(),
                        trip: trip_id.to_string(),
                    }
                })?;

                if !calendar.is_service_available(date) {
                    continue;
                }
                if query.wheelchair_accessible
                    && trip.wheelchair_accessible != Accessibility::Accessible
                {
                    continue;
                }
                if query.bike_accessible && trip.bikes_allowed != BikeAllowance::Allowed {
                    continue;
                }
                mask[trip_offset] = true;
            }

            route_masks.push(mask);
        }

        Ok(DayMask {
            service_key: self.service_key(date),
            date,
            route_masks,
        })
    }

    fn invalidate(&self) {
        self.service_keys.clear();
    }
}

/// A day mask enriched with per-route time bounds, the form the scanner
/// consumes. Cached by the router per (service key, query filters).
#[derive(Debug)]
pub(crate) struct TripMask {
    pub route_masks: Vec<RouteMask>,
}

#[derive(Debug)]
pub(crate) struct RouteMask {
    pub active: Box<[bool]>,
    /// Earliest arrival of any active trip on the route, `NO_TRIP` if none.
    pub earliest: i32,
    /// Latest departure of any active trip on the route, `NO_TRIP` if none.
    pub latest: i32,
}

impl RouteMask {
    pub fn has_active_trips(&self) -> bool {
        self.earliest != NO_TRIP
    }
}

impl TripMask {
    /// Computes the scan bounds of every route from the raw activation bits.
    pub(crate) fn build(network: &Network, day_mask: &DayMask) -> Self {
        let mut route_masks = Vec::with_capacity(network.route_count());
        for (route_idx, active) in day_mask.route_masks.iter().enumerate() {
            let mut earliest = NO_TRIP;
            let mut latest = NO_TRIP;
            for (trip_offset, trip_active) in active.iter().enumerate() {
                if !trip_active {
                    continue;
                }
                let row = network.trip_stop_times(route_idx, trip_offset);
                if let (Some(first), Some(last)) = (row.first(), row.last()) {
                    if earliest == NO_TRIP || (first.arrival as i32) < earliest {
                        earliest = first.arrival as i32;
                    }
                    if latest == NO_TRIP || (last.departure as i32) > latest {
                        latest = last.departure as i32;
                    }
                }
            }
            route_masks.push(RouteMask {
                active: active.clone(),
                earliest,
                latest,
            });
        }
        Self { route_masks }
    }
}

/// One service day inside a query's scan window: the mask plus the offset of
/// that day relative to the reference date, in seconds.
#[derive(Clone)]
pub(crate) struct ActiveDay {
    pub day_offset: i32,
    pub mask: Arc<TripMask>,
}
