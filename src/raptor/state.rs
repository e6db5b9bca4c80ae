use super::config::TimeType;

pub(crate) const INFINITY: i32 = i32::MAX;
pub(crate) const NO_INDEX: u32 = u32::MAX;

/// Kind of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LabelKind {
    /// First label of a connection, no previous label.
    Initial,
    /// Reached with a public transit trip.
    Route,
    /// Reached over a footpath transfer (not a same-stop transfer).
    Transfer,
}

/// One step of a connection. Labels live in the query's arena; `previous`
/// points back into that arena, never across queries.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Label {
    /// Time the step starts at, relative to the reference-date midnight.
    pub source_time: i32,
    /// Time the step reaches its stop at.
    pub target_time: i32,
    pub kind: LabelKind,
    /// Route index for route labels, transfer array index for transfer
    /// labels, `NO_INDEX` otherwise.
    pub route_or_transfer_idx: u32,
    /// Trip row within the route, route labels only.
    pub trip_offset: u32,
    /// Service-day offset of the boarded trip in seconds, route labels only.
    /// Raw stop times plus this offset compare against label times.
    pub day_offset: i32,
    /// The stop this label reaches.
    pub stop_idx: u32,
    /// Arena index of the label this one was reached from.
    pub previous: Option<u32>,
}

/// Per-query working state: the label arena, the best label per stop and
/// round, the global best time per stop, and the marked-stop masks driving
/// the next round. Dropped with the query.
pub(crate) struct QueryState {
    stop_count: usize,
    arena: Vec<Label>,
    rounds: Vec<Box<[Option<u32>]>>,
    best_times: Vec<i32>,
    marked_this_round: Box<[bool]>,
    marked_next_round: Box<[bool]>,
    round: usize,
}

impl QueryState {
    pub fn new(stop_count: usize, time_type: TimeType) -> Self {
        Self {
            stop_count,
            arena: Vec::new(),
            rounds: vec![vec![None; stop_count].into_boxed_slice()],
            best_times: vec![unreached(time_type); stop_count],
            marked_this_round: vec![false; stop_count].into_boxed_slice(),
            marked_next_round: vec![false; stop_count].into_boxed_slice(),
            round: 0,
        }
    }

    pub fn round(&self) -> usize {
        self.round
    }

    pub fn round_count(&self) -> usize {
        self.rounds.len()
    }

    /// Restarts the round counter and marks for a re-run of the round loop
    /// (range extension). Labels, arena and best times stay.
    pub fn reset_rounds(&mut self) {
        self.round = 0;
        self.marked_this_round.fill(false);
        self.marked_next_round.fill(false);
    }

    /// Moves to the next round: the stops marked for next become this
    /// round's work set. A label layer is only appended when the round was
    /// never reached before, range-extension re-runs revisit existing
    /// layers.
    pub fn add_new_round(&mut self) {
        std::mem::swap(&mut self.marked_this_round, &mut self.marked_next_round);
        self.marked_next_round.fill(false);
        self.round += 1;
        if self.round >= self.rounds.len() {
            self.rounds
                .push(vec![None; self.stop_count].into_boxed_slice());
        }
    }

    pub fn label(&self, round: usize, stop_idx: usize) -> Option<&Label> {
        self.rounds[round][stop_idx].map(|label_ref| &self.arena[label_ref as usize])
    }

    pub fn label_ref(&self, round: usize, stop_idx: usize) -> Option<u32> {
        self.rounds[round][stop_idx]
    }

    pub fn resolve(&self, label_ref: u32) -> &Label {
        &self.arena[label_ref as usize]
    }

    /// Stores a label in the arena and makes it the best label of the stop
    /// for the round. Returns the arena index.
    pub fn set_label(&mut self, round: usize, stop_idx: usize, label: Label) -> u32 {
        let label_ref = self.arena.len() as u32;
        self.arena.push(label);
        self.rounds[round][stop_idx] = Some(label_ref);
        label_ref
    }

    pub fn clear_label(&mut self, round: usize, stop_idx: usize) {
        self.rounds[round][stop_idx] = None;
    }

    /// The comparable best time of a stop. Transfer labels store it with the
    /// same-stop transfer time already deducted, so it compares correctly
    /// against route target times.
    pub fn best_time(&self, stop_idx: usize) -> i32 {
        self.best_times[stop_idx]
    }

    pub fn set_best_time(&mut self, stop_idx: usize, time: i32) {
        self.best_times[stop_idx] = time;
    }

    pub fn is_marked_this_round(&self, stop_idx: usize) -> bool {
        self.marked_this_round[stop_idx]
    }

    pub fn mark(&mut self, stop_idx: usize) {
        self.marked_next_round[stop_idx] = true;
    }

    pub fn unmark(&mut self, stop_idx: usize) {
        self.marked_next_round[stop_idx] = false;
    }

    pub fn has_marked_stops(&self) -> bool {
        self.marked_next_round.iter().any(|marked| *marked)
    }

    pub fn marked_this_round(&self) -> impl Iterator<Item = usize> + '_ {
        self.marked_this_round
            .iter()
            .enumerate()
            .filter_map(|(stop_idx, marked)| marked.then_some(stop_idx))
    }

    pub fn marked_next_round_snapshot(&self) -> Vec<usize> {
        self.marked_next_round
            .iter()
            .enumerate()
            .filter_map(|(stop_idx, marked)| marked.then_some(stop_idx))
            .collect()
    }
}

/// The "not reached yet" time for the search direction.
pub(crate) fn unreached(time_type: TimeType) -> i32 {
    match time_type {
        TimeType::Departure => INFINITY,
        TimeType::Arrival => -INFINITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(target_time: i32, stop_idx: u32) -> Label {
        Label {
            source_time: 0,
            target_time,
            kind: LabelKind::Route,
            route_or_transfer_idx: 0,
            trip_offset: 0,
            day_offset: 0,
            stop_idx,
            previous: None,
        }
    }

    #[test]
    fn rounds_grow_but_are_reused_after_reset() {
        let mut state = QueryState::new(3, TimeType::Departure);
        assert_eq!(state.round_count(), 1);
        state.add_new_round();
        state.add_new_round();
        assert_eq!(state.round_count(), 3);
        assert_eq!(state.round(), 2);

        state.reset_rounds();
        assert_eq!(state.round(), 0);
        state.add_new_round();
        assert_eq!(state.round_count(), 3);
    }

    #[test]
    fn marks_move_to_this_round_on_round_change() {
        let mut state = QueryState::new(3, TimeType::Departure);
        state.mark(1);
        assert!(!state.is_marked_this_round(1));
        assert!(state.has_marked_stops());
        state.add_new_round();
        assert!(state.is_marked_this_round(1));
        assert!(!state.has_marked_stops());
    }

    #[test]
    fn labels_survive_a_round_reset() {
        let mut state = QueryState::new(1, TimeType::Departure);
        state.set_label(0, 0, label(100, 0));
        state.add_new_round();
        state.set_label(1, 0, label(50, 0));
        state.reset_rounds();
        assert_eq!(state.label(1, 0).unwrap().target_time, 50);
    }
}
