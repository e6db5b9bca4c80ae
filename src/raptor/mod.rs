//! The round-based query engine.
//!
//! A [`Router`] is instantiated once against a compiled network and shared
//! across concurrent requests; every query allocates its own working state
//! and never mutates the shared data. Routing runs in rounds, each round
//! adding at most one trip to a connection, so the labels collected over all
//! rounds form a Pareto frontier in (target time, number of transfers).

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Days, NaiveDate, NaiveDateTime};
use thiserror::Error;
use tracing::debug;

mod config;
mod connection;
mod mask;
mod postprocess;
mod query;
mod relaxer;
mod scanner;
mod state;

pub use config::*;
pub use connection::*;
pub use mask::{DayMask, FullServiceMask, MaskError, ScheduleTripMaskProvider, TripMaskProvider};

use crate::cache::EvictionCache;
use crate::network::Network;
use crate::shared::{Duration, SECONDS_IN_DAY, to_timestamp};
use mask::{ActiveDay, TripMask};
use postprocess::Postprocessor;
use query::Query;

/// Source stop times in one query must not spread further than this.
const MAX_SOURCE_TIME_SPREAD: i64 = 24 * 60 * 60;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid stop input: {0}")]
    InvalidStop(String),
    #[error("invalid time input: {0}")]
    InvalidTime(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("query option not supported by this router: {0}")]
    UnsupportedOption(&'static str),
    #[error("trip activation mask failed: {0}")]
    Mask(#[from] MaskError),
}

/// The public routing interface over a compiled [`Network`].
pub struct Router {
    network: Arc<Network>,
    config: RouterConfig,
    mask_provider: Arc<dyn TripMaskProvider>,
    mask_cache: EvictionCache<String, TripMask>,
}

impl Router {
    pub fn new(
        network: Arc<Network>,
        config: RouterConfig,
        mask_provider: Arc<dyn TripMaskProvider>,
    ) -> Result<Self, Error> {
        config.validate()?;
        let mask_cache = EvictionCache::new(config.mask_cache_size, config.cache_strategy);
        Ok(Self {
            network,
            config,
            mask_provider,
            mask_cache,
        })
    }

    pub fn network(&self) -> &Arc<Network> {
        &self.network
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Warms the activation mask cache for a date, e.g. ahead of expected
    /// load.
    pub fn prepare_masks_for_date(&self, date: NaiveDate) -> Result<(), Error> {
        self.mask_for_date(date)?;
        Ok(())
    }

    /// Drops all cached activation state. Callers swap in a new router for a
    /// new schedule; this exists for providers whose backing data changed in
    /// place.
    pub fn invalidate_caches(&self) {
        self.mask_cache.clear();
        self.mask_provider.invalidate();
    }

    /// Routes the earliest arrival from the departure stops (with their
    /// departure times) to the arrival stops (with their walk duration to
    /// the final destination).
    ///
    /// Returns the Pareto-optimal connections ordered by number of trips;
    /// an empty list means no transit path exists, which is a valid result.
    pub fn route_earliest_arrival(
        &self,
        departure_stops: &HashMap<String, NaiveDateTime>,
        arrival_stops: &HashMap<String, Duration>,
        query: &QueryConfig,
    ) -> Result<Vec<Connection>, Error> {
        check_non_empty(departure_stops, "departure")?;
        check_non_empty(arrival_stops, "arrival")?;
        debug!(
            sources = departure_stops.len(),
            targets = arrival_stops.len(),
            "routing earliest arrival"
        );
        self.route_connections(departure_stops, arrival_stops, TimeType::Departure, query)
    }

    /// Routes the latest departure from the departure stops (with their walk
    /// duration from the origin) to the arrival stops (with their arrival
    /// times). Executed as a time-reversed search of the same algorithm.
    pub fn route_latest_departure(
        &self,
        departure_stops: &HashMap<String, Duration>,
        arrival_stops: &HashMap<String, NaiveDateTime>,
        query: &QueryConfig,
    ) -> Result<Vec<Connection>, Error> {
        check_non_empty(departure_stops, "departure")?;
        check_non_empty(arrival_stops, "arrival")?;
        debug!(
            sources = arrival_stops.len(),
            targets = departure_stops.len(),
            "routing latest departure"
        );
        self.route_connections(arrival_stops, departure_stops, TimeType::Arrival, query)
    }

    /// Routes the best connection to every reachable stop from the source
    /// stops, in the given time direction.
    pub fn route_isolines(
        &self,
        source_stops: &HashMap<String, NaiveDateTime>,
        time_type: TimeType,
        query: &QueryConfig,
    ) -> Result<HashMap<String, Connection>, Error> {
        check_non_empty(source_stops, "source")?;
        self.check_supported_filters(query)?;
        query.validate()?;
        validate_source_times(source_stops)?;

        let reference_date = reference_date_time(source_stops, time_type).date();
        let sources = self.validate_stops(source_stops, |datetime| {
            to_timestamp(*datetime, reference_date)
        })?;
        let days = self.scan_window(reference_date, query)?;

        let (source_stop_indices, source_times): (Vec<_>, Vec<_>) = sources.into_iter().unzip();
        let state = Query::new(
            &self.network,
            &days,
            source_stop_indices,
            source_times,
            Vec::new(),
            query,
            time_type,
            self.raptor_range_seconds(),
        )
        .run();

        Ok(Postprocessor::new(&self.network, time_type, reference_date).reconstruct_isolines(&state))
    }

    /// Source stops carry times, target stops walk durations; for arrival
    /// queries the search spawns at the arrival side and runs backwards.
    fn route_connections(
        &self,
        source_stops: &HashMap<String, NaiveDateTime>,
        target_stops: &HashMap<String, Duration>,
        time_type: TimeType,
        query: &QueryConfig,
    ) -> Result<Vec<Connection>, Error> {
        self.check_supported_filters(query)?;
        query.validate()?;
        validate_source_times(source_stops)?;
        check_disjoint(source_stops, target_stops)?;

        let reference_date = reference_date_time(source_stops, time_type).date();
        let sources = self.validate_stops(source_stops, |datetime| {
            to_timestamp(*datetime, reference_date)
        })?;
        let targets = self.validate_stops(target_stops, |walk| walk.as_seconds() as i32)?;
        let days = self.scan_window(reference_date, query)?;

        let (source_stop_indices, source_times): (Vec<_>, Vec<_>) = sources.into_iter().unzip();
        let state = Query::new(
            &self.network,
            &days,
            source_stop_indices,
            source_times,
            targets.clone(),
            query,
            time_type,
            self.raptor_range_seconds(),
        )
        .run();

        Ok(Postprocessor::new(&self.network, time_type, reference_date)
            .reconstruct_pareto(&state, &targets))
    }

    /// Maps stop ids to indices. Unknown ids are dropped with a note as long
    /// as at least one valid stop remains.
    fn validate_stops<V, F: Fn(&V) -> i32>(
        &self,
        stops: &HashMap<String, V>,
        to_value: F,
    ) -> Result<Vec<(usize, i32)>, Error> {
        let mut validated = Vec::with_capacity(stops.len());
        for (stop_id, value) in stops {
            match self.network.stop_idx(stop_id) {
                Some(stop_idx) => validated.push((stop_idx, to_value(value))),
                None => debug!(stop = stop_id.as_str(), "stop not found, dropping from query"),
            }
        }
        if validated.is_empty() {
            return Err(Error::InvalidStop("no valid stops provided".into()));
        }
        // deterministic order regardless of map iteration
        validated.sort_by_key(|(stop_idx, _)| *stop_idx);
        Ok(validated)
    }

    /// Resolves the activation masks of every service day in the scan
    /// window. One day scans only the reference date; larger windows include
    /// the previous day, so overnight trips that started yesterday are
    /// found, and the following days.
    fn scan_window(
        &self,
        reference_date: NaiveDate,
        query: &QueryConfig,
    ) -> Result<Vec<ActiveDay>, Error> {
        let day_offsets: Vec<i64> = if self.config.days_to_scan == 1 {
            vec![0]
        } else {
            (-1..self.config.days_to_scan as i64 - 1).collect()
        };

        let mut days = Vec::with_capacity(day_offsets.len());
        for day_offset in day_offsets {
            let date = if day_offset < 0 {
                reference_date.checked_sub_days(Days::new(day_offset.unsigned_abs()))
            } else {
                reference_date.checked_add_days(Days::new(day_offset as u64))
            };
            let Some(date) = date else {
                continue;
            };
            days.push(ActiveDay {
                day_offset: day_offset as i32 * SECONDS_IN_DAY,
                mask: self.mask_for_date_with_query(date, query)?,
            });
        }
        Ok(days)
    }

    fn mask_for_date(&self, date: NaiveDate) -> Result<Arc<TripMask>, Error> {
        self.mask_for_date_with_query(date, &QueryConfig::new())
    }

    /// The activation mask of one date, memoized by service key and query
    /// filters. Dates sharing the same active calendars share one entry. A
    /// failing mask computation propagates and leaves no cache entry behind.
    fn mask_for_date_with_query(
        &self,
        date: NaiveDate,
        query: &QueryConfig,
    ) -> Result<Arc<TripMask>, Error> {
        let service_key = self.mask_provider.service_key(date);
        let cache_key = format!("{}|{}", service_key, query.filter_fingerprint());
        let mask = self.mask_cache.try_compute_if_absent(cache_key, || {
            let day_mask = self.mask_provider.day_mask(date, &self.network, query)?;
            Ok::<_, MaskError>(TripMask::build(&self.network, &day_mask))
        })?;
        Ok(mask)
    }

    fn raptor_range_seconds(&self) -> Option<i32> {
        self.config
            .raptor_range
            .map(|range| range.as_seconds() as i32)
    }

    fn check_supported_filters(&self, query: &QueryConfig) -> Result<(), Error> {
        let features = &self.config.features;
        if query.wheelchair_accessible && !features.accessibility {
            return Err(Error::UnsupportedOption("wheelchair accessibility filter"));
        }
        if query.bike_accessible && !features.bikes {
            return Err(Error::UnsupportedOption("bike transport filter"));
        }
        if query.allowed_travel_modes.is_restricting() && !features.travel_modes {
            return Err(Error::UnsupportedOption("travel mode filter"));
        }
        Ok(())
    }
}

fn check_non_empty<V>(stops: &HashMap<String, V>, side: &str) -> Result<(), Error> {
    if stops.is_empty() {
        return Err(Error::InvalidStop(format!("{side} stops must not be empty")));
    }
    Ok(())
}

fn check_disjoint<A, B>(
    source_stops: &HashMap<String, A>,
    target_stops: &HashMap<String, B>,
) -> Result<(), Error> {
    if source_stops.keys().any(|id| target_stops.contains_key(id)) {
        return Err(Error::InvalidStop(
            "source and target stops must not overlap".into(),
        ));
    }
    Ok(())
}

fn validate_source_times(source_stops: &HashMap<String, NaiveDateTime>) -> Result<(), Error> {
    let min = source_stops.values().min();
    let max = source_stops.values().max();
    if let (Some(min), Some(max)) = (min, max)
        && (*max - *min).num_seconds() > MAX_SOURCE_TIME_SPREAD
    {
        return Err(Error::InvalidTime(
            "source stop times must lie within 24 hours of each other".into(),
        ));
    }
    Ok(())
}

/// The reference instant of a query: the earliest departure or the latest
/// arrival over the source stops. All times are normalized to seconds
/// relative to this instant's date.
fn reference_date_time(
    source_stops: &HashMap<String, NaiveDateTime>,
    time_type: TimeType,
) -> NaiveDateTime {
    let times = source_stops.values();
    match time_type {
        TimeType::Departure => times.min().copied().unwrap_or_default(),
        TimeType::Arrival => times.max().copied().unwrap_or_default(),
    }
}
