//! A round-based public transit routing engine for GTFS schedules.
//!
//! The crate compiles a schedule object graph into a flat, index-addressed
//! network model and answers earliest-arrival, latest-departure and isoline
//! queries over it:
//!
//! - [`schedule`] holds the consumed schedule graph (stops, routes, trips,
//!   calendars, declared transfers) with a validating builder.
//! - [`compile`] partitions routes into fixed-sequence sub-routes, derives
//!   footpath transfers and emits the network model.
//! - [`network`] is the immutable flattened model shared by all queries.
//! - [`raptor`] runs the round-based search and reconstructs Pareto-optimal
//!   connections; per-date trip activation is resolved through a cached
//!   [`raptor::TripMaskProvider`].
//! - [`cache`] and [`shared`] carry the supporting value types.
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use fahrplan::compile::NetworkCompiler;
//! use fahrplan::raptor::{QueryConfig, Router, RouterConfig, ScheduleTripMaskProvider};
//! use fahrplan::schedule::Schedule;
//!
//! # fn run(schedule: Schedule) -> Result<(), Box<dyn std::error::Error>> {
//! let schedule = Arc::new(schedule);
//! let network = Arc::new(NetworkCompiler::new(&schedule).compile()?);
//! let config = RouterConfig::default();
//! let masks = Arc::new(ScheduleTripMaskProvider::new(
//!     schedule.clone(),
//!     config.mask_cache_size,
//!     config.cache_strategy,
//! ));
//! let router = Router::new(network, config, masks)?;
//!
//! let departures = HashMap::from([(
//!     "A".to_string(),
//!     "2021-01-01T08:00:00".parse()?,
//! )]);
//! let arrivals = HashMap::from([("G".to_string(), 0u32.into())]);
//! let connections =
//!     router.route_earliest_arrival(&departures, &arrivals, &QueryConfig::new())?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod compile;
pub mod network;
pub mod raptor;
pub mod schedule;
pub mod shared;
