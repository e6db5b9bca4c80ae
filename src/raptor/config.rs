use serde::{Deserialize, Serialize};

use crate::cache::Strategy;
use crate::schedule::TravelModeSet;
use crate::shared::Duration;

/// Direction of a query: route for the earliest arrival after a departure
/// time, or for the latest departure before an arrival time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeType {
    Departure,
    Arrival,
}

/// The routing features a router instance declares support for. Requesting a
/// filter the router does not support is a configuration error, not a silent
/// no-op.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RoutingFeatures {
    pub accessibility: bool,
    pub bikes: bool,
    pub travel_modes: bool,
}

impl Default for RoutingFeatures {
    fn default() -> Self {
        Self {
            accessibility: true,
            bikes: true,
            travel_modes: true,
        }
    }
}

/// Static configuration of a [`super::Router`], fixed at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Number of service days the engine resolves activation masks for. One
    /// scans only the reference date; larger values extend the window by the
    /// previous day (overnight trips) and the following days.
    pub days_to_scan: usize,
    /// Fallback same-stop transfer time in seconds, used for stops without a
    /// declared transfer onto themselves.
    pub default_same_stop_transfer_time: u32,
    /// Re-runs the round loop for every source departure within this range
    /// to surface connections that trade a later departure for a better
    /// itinerary. `None` disables the extension.
    pub raptor_range: Option<Duration>,
    /// Capacity of the per-service-key activation mask cache.
    pub mask_cache_size: usize,
    pub cache_strategy: Strategy,
    pub features: RoutingFeatures,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            days_to_scan: 1,
            default_same_stop_transfer_time: 120,
            raptor_range: None,
            mask_cache_size: 5,
            cache_strategy: Strategy::Lru,
            features: RoutingFeatures::default(),
        }
    }
}

impl RouterConfig {
    pub(crate) fn validate(&self) -> Result<(), super::Error> {
        if self.days_to_scan == 0 {
            return Err(super::Error::InvalidConfig(
                "days to scan must be greater than zero".into(),
            ));
        }
        if self.mask_cache_size == 0 {
            return Err(super::Error::InvalidConfig(
                "mask cache size must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Per-query options. Defaults mean "unrestricted".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryConfig {
    pub maximum_walking_duration: Option<Duration>,
    pub minimum_transfer_duration: Duration,
    pub maximum_transfers: Option<usize>,
    pub maximum_travel_time: Option<Duration>,
    pub wheelchair_accessible: bool,
    pub bike_accessible: bool,
    pub allowed_travel_modes: TravelModeSet,
}

impl QueryConfig {
    pub fn new() -> Self {
        Self {
            allowed_travel_modes: TravelModeSet::all(),
            ..Default::default()
        }
    }

    /// Stable fingerprint of the filter-relevant fields, part of the mask
    /// cache key.
    pub(crate) fn filter_fingerprint(&self) -> String {
        format!(
            "{}|{}|{:?}",
            self.wheelchair_accessible, self.bike_accessible, self.allowed_travel_modes
        )
    }

    pub(crate) fn validate(&self) -> Result<(), super::Error> {
        if self.maximum_travel_time == Some(Duration::from_seconds(0)) {
            return Err(super::Error::InvalidConfig(
                "maximum travel time must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
