mod common;

use common::*;
use fahrplan::raptor::TimeType;

/// Route 1 runs every 15 minutes, route 2 every 30 minutes with a 15 minute
/// offset. The fastest change at B only works when leaving A at 08:15, which
/// only the range extension finds; a plain search boards the 08:00 trip and
/// waits at B.
fn range_fixture(range_seconds: Option<u32>) -> fahrplan::raptor::Router {
    let mut builder = TestNetworkBuilder::new()
        .with_route(TestRoute::new("R1", vec!["A", "B", "C", "D", "E", "F", "G"]).with_times(0, 15, 5, 1))
        .with_route(TestRoute::new("R2", vec!["H", "B", "I", "J", "K", "L"]).with_times(15, 30, 5, 1))
        .with_same_stop_transfer_time(0);
    if let Some(range) = range_seconds {
        builder = builder.with_raptor_range(range);
    }
    builder.build()
}

#[test]
fn range_extension_finds_the_later_tighter_departure() {
    let router = range_fixture(Some(1800));
    let connections = earliest_arrival(&router, "A", "I", at(8, 0));

    assert_eq!(connections.len(), 1);
    let connection = &connections[0];
    // A 08:15 -> B 08:20, B 08:21 -> I 08:26
    assert_eq!(connection.departure_time(), at(8, 15));
    assert_eq!(connection.arrival_time(), at(8, 26));
    assert_pareto_and_contiguous(&connections, TimeType::Departure);
}

#[test]
fn plain_search_departs_at_the_requested_time() {
    let router = range_fixture(None);
    let connections = earliest_arrival(&router, "A", "I", at(8, 0));

    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].departure_time(), at(8, 0));
    assert_eq!(connections[0].arrival_time(), at(8, 26));
}

#[test]
fn range_shorter_than_the_headway_changes_nothing() {
    let router = range_fixture(Some(600));
    let connections = earliest_arrival(&router, "A", "I", at(8, 0));

    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].departure_time(), at(8, 0));
    assert_eq!(connections[0].arrival_time(), at(8, 26));
}

#[test]
fn range_extension_in_arrival_direction() {
    // mirrored setup: route 1 every 30 minutes with offset, route 2 every 15
    let router = TestNetworkBuilder::new()
        .with_route(TestRoute::new("R1", vec!["A", "B", "C", "D", "E", "F", "G"]).with_times(15, 30, 5, 1))
        .with_route(TestRoute::new("R2", vec!["H", "B", "I", "J", "K", "L"]).with_times(0, 15, 5, 1))
        .with_same_stop_transfer_time(0)
        .with_raptor_range(1800)
        .build();

    let connections = latest_departure(&router, "A", "I", at(8, 41));

    // the best tradeoff arrives at 08:26 instead of burning the whole
    // window: A 08:15 -> B 08:20, B 08:21 -> I 08:26
    assert_eq!(connections.len(), 1);
    assert_eq!(connections[0].arrival_time(), at(8, 26));
    assert_eq!(connections[0].departure_time(), at(8, 15));
}

#[test]
fn range_extension_shifts_a_leading_walk() {
    let router = TestNetworkBuilder::new()
        .with_route(TestRoute::new("R1", vec!["A", "B", "C", "D", "E", "F", "G"]).with_times(0, 15, 5, 1))
        .with_route(TestRoute::new("R2", vec!["H", "B", "I", "J", "K", "L"]).with_times(0, 30, 5, 1))
        .with_route_3_mq()
        .with_transfer("N", "A", 15)
        .with_same_stop_transfer_time(0)
        .with_raptor_range(1800)
        .build();

    // walking N -> A takes 15 minutes; the connection worth taking walks at
    // 08:15, boards route 1 at 08:30 and route 2 at B at 08:36
    let connections = earliest_arrival(&router, "N", "I", at(8, 0));

    assert!(!connections.is_empty());
    let connection = &connections[0];
    assert_eq!(connection.legs().len(), 3);
    assert_eq!(connection.walk_transfers().count(), 1);
    assert_eq!(connection.departure_time(), at(8, 15));
    assert_eq!(connection.arrival_time(), at(8, 41));
}
