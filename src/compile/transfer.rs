use std::sync::Arc;

use rayon::prelude::*;
use tracing::info;

use crate::schedule::Stop;
use crate::shared::{Coordinate, Duration};

/// A generated minimum-time footpath between two stops.
#[derive(Debug, Clone)]
pub struct MinimumTimeTransfer {
    pub from_stop_id: Arc<str>,
    pub to_stop_id: Arc<str>,
    pub duration: Duration,
}

/// A strategy producing synthetic transfers for the stops of a network.
///
/// The compiler applies generators lowest-priority first, so of two
/// generators producing the same stop pair the one listed earlier wins, and
/// schedule-declared transfers win over all generated ones.
pub trait TransferGenerator: Send + Sync {
    fn generate(&self, stops: &[&Stop]) -> Vec<MinimumTimeTransfer>;
}

/// Estimates the walking duration between two coordinates. Implementations
/// (beeline, street network) live outside this crate.
pub trait WalkEstimator: Send + Sync {
    fn walk_duration(&self, from: &Coordinate, to: &Coordinate) -> Duration;
}

/// Range lookup over stop positions. Implementations (k-d tree or similar)
/// live outside this crate.
pub trait SpatialStopIndex: Send + Sync {
    /// Ids of the stops within `radius` meters around `origin`.
    fn stops_within(&self, origin: &Coordinate, radius: f64) -> Vec<Arc<str>>;
}

/// Gives every stop a transfer onto itself, which the network builder turns
/// into the stop's same-stop transfer time.
pub struct SameStopTransferGenerator {
    transfer_time: Duration,
}

impl SameStopTransferGenerator {
    pub fn new(transfer_time: Duration) -> Self {
        Self { transfer_time }
    }
}

impl TransferGenerator for SameStopTransferGenerator {
    fn generate(&self, stops: &[&Stop]) -> Vec<MinimumTimeTransfer> {
        info!(stops = stops.len(), "generating same stop transfers");
        stops
            .iter()
            .map(|stop| MinimumTimeTransfer {
                from_stop_id: stop.id.clone(),
                to_stop_id: stop.id.clone(),
                duration: self.transfer_time,
            })
            .collect()
    }
}

/// Connects all stops that share a station parent with a fixed duration, in
/// both directions, including the parent itself.
pub struct SameStationTransferGenerator {
    transfer_time: Duration,
}

impl SameStationTransferGenerator {
    pub fn new(transfer_time: Duration) -> Self {
        Self { transfer_time }
    }
}

impl TransferGenerator for SameStationTransferGenerator {
    fn generate(&self, stops: &[&Stop]) -> Vec<MinimumTimeTransfer> {
        info!(stops = stops.len(), "generating same station transfers");
        let mut transfers = Vec::new();
        for stop in stops {
            for other in stops {
                if stop.id == other.id {
                    continue;
                }
                let same_station = stop.parent_id == Some(other.id.clone())
                    || other.parent_id == Some(stop.id.clone())
                    || (stop.parent_id.is_some() && stop.parent_id == other.parent_id);
                if same_station {
                    transfers.push(MinimumTimeTransfer {
                        from_stop_id: stop.id.clone(),
                        to_stop_id: other.id.clone(),
                        duration: self.transfer_time,
                    });
                }
            }
        }
        transfers
    }
}

/// Generates walk transfers between stops within a search radius, using a
/// spatial index for the candidate lookup and a walk estimator for the
/// durations.
pub struct WalkTransferGenerator {
    estimator: Arc<dyn WalkEstimator>,
    spatial_index: Arc<dyn SpatialStopIndex>,
    /// Floor for every generated transfer, accounts for vehicle access and
    /// egress even when stops are next to each other.
    minimum_transfer_time: Duration,
    access_egress_time: Duration,
    search_radius: f64,
}

impl WalkTransferGenerator {
    pub fn new(
        estimator: Arc<dyn WalkEstimator>,
        spatial_index: Arc<dyn SpatialStopIndex>,
        minimum_transfer_time: Duration,
        access_egress_time: Duration,
        search_radius: f64,
    ) -> Self {
        Self {
            estimator,
            spatial_index,
            minimum_transfer_time,
            access_egress_time,
            search_radius,
        }
    }
}

impl TransferGenerator for WalkTransferGenerator {
    fn generate(&self, stops: &[&Stop]) -> Vec<MinimumTimeTransfer> {
        info!(
            stops = stops.len(),
            radius = self.search_radius,
            "generating walk transfers"
        );
        let known: std::collections::HashMap<&str, &Stop> =
            stops.iter().map(|stop| (stop.id.as_ref(), *stop)).collect();

        let transfers: Vec<MinimumTimeTransfer> = stops
            .par_iter()
            .flat_map_iter(|from| {
                let nearby = self
                    .spatial_index
                    .stops_within(&from.coordinate, self.search_radius);
                nearby
                    .into_iter()
                    .filter(|to_id| to_id.as_ref() != from.id.as_ref())
                    .filter_map(|to_id| known.get(to_id.as_ref()).copied())
                    .map(|to| {
                        let walk = self.estimator.walk_duration(&from.coordinate, &to.coordinate);
                        let duration = (walk
                            + self.access_egress_time
                            + self.access_egress_time)
                            .max(self.minimum_transfer_time);
                        MinimumTimeTransfer {
                            from_stop_id: from.id.clone(),
                            to_stop_id: to.id.clone(),
                            duration,
                        }
                    })
                    .collect::<Vec<_>>()
                    .into_iter()
            })
            .collect();

        info!(transfers = transfers.len(), "generated walk transfers");
        transfers
    }
}
