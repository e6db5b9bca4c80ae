use tracing::trace;

use super::config::TimeType;
use super::state::{Label, LabelKind, NO_INDEX, QueryState};
use crate::network::Network;

/// Relaxes footpath transfers from improved stops, once per round after
/// route scanning.
pub(crate) struct FootpathRelaxer<'a> {
    network: &'a Network,
    /// Rest period added on top of the walk time of every transfer.
    min_transfer_duration: i32,
    /// Transfers longer than this never relax.
    max_walking_duration: i32,
    time_type: TimeType,
}

impl<'a> FootpathRelaxer<'a> {
    pub fn new(
        network: &'a Network,
        min_transfer_duration: i32,
        max_walking_duration: i32,
        time_type: TimeType,
    ) -> Self {
        Self {
            network,
            min_transfer_duration,
            max_walking_duration,
            time_type,
        }
    }

    /// Relaxes footpaths from all source stops at round zero.
    pub fn relax_initial(&self, source_stop_indices: &[usize], state: &mut QueryState) {
        trace!("relaxing footpaths from source stops");
        for stop_idx in source_stop_indices {
            self.expand_footpaths(*stop_idx, 0, state);
        }
    }

    /// Relaxes footpaths from every stop in `stop_indices` for the round.
    pub fn relax(&self, round: usize, stop_indices: &[usize], state: &mut QueryState) {
        trace!(round, "relaxing footpaths");
        for stop_idx in stop_indices {
            self.expand_footpaths(*stop_idx, round, state);
        }
    }

    fn expand_footpaths(&self, stop_idx: usize, round: usize, state: &mut QueryState) {
        let stop = self.network.stop(stop_idx);
        if stop.transfer_count == 0 {
            return;
        }

        // never chain a footpath onto a footpath of the same round
        let Some(previous_ref) = state.label_ref(round, stop_idx) else {
            return;
        };
        let previous = state.resolve(previous_ref);
        if previous.kind == LabelKind::Transfer {
            return;
        }
        let source_time = previous.target_time;

        let direction = match self.time_type {
            TimeType::Departure => 1,
            TimeType::Arrival => -1,
        };

        let first = stop.transfer_idx as usize;
        for transfer_idx in first..first + stop.transfer_count as usize {
            let transfer = self.network.transfers[transfer_idx];
            let duration = transfer.duration as i32;
            if duration > self.max_walking_duration {
                continue;
            }
            let target_stop_idx = transfer.target_stop_idx as usize;
            let target_stop = self.network.stop(target_stop_idx);

            let target_time = source_time + direction * (duration + self.min_transfer_duration);

            // deduct the same-stop change time so the comparison against
            // route target times (which do not include it yet) stays fair
            let comparable_time =
                target_time - direction * target_stop.same_stop_transfer_time as i32;

            if comparable_time * direction >= state.best_time(target_stop_idx) * direction {
                continue;
            }

            state.set_best_time(target_stop_idx, comparable_time);
            let label = Label {
                source_time,
                target_time,
                kind: LabelKind::Transfer,
                route_or_transfer_idx: transfer_idx as u32,
                trip_offset: NO_INDEX,
                day_offset: 0,
                stop_idx: target_stop_idx as u32,
                previous: Some(previous_ref),
            };
            state.set_label(round, target_stop_idx, label);
            state.mark(target_stop_idx);
        }
    }
}
