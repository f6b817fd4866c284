// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::status::RpcStatus;

fn task() -> TaskData {
    TaskData::new(TaskId::new(), ScenarioId::new(), "import_road_osm", "user1")
}

#[test]
fn status_moves_forward_only() {
    let mut data = task();
    assert_eq!(data.status(), TaskStatus::Inactive);

    data.set_waiting();
    assert_eq!(data.status(), TaskStatus::Waiting);

    data.set_in_progress();
    assert_eq!(data.status(), TaskStatus::InProgress);

    // A later waiting step must not move the task back
    data.set_waiting();
    assert_eq!(data.status(), TaskStatus::InProgress);
}

#[test]
fn failed_absorbs_close() {
    let mut data = task();
    data.set_in_progress();
    data.set_failed(Some("heartbeat timeout"));
    assert_eq!(data.status(), TaskStatus::Failed);
    assert_eq!(data.message, "heartbeat timeout");

    // Scenario root still reports closed afterwards; failure sticks
    data.set_closed();
    assert_eq!(data.status(), TaskStatus::Failed);
}

#[test]
fn completed_ignores_late_failure() {
    let mut data = task();
    data.set_in_progress();
    data.set_closed();
    assert_eq!(data.status(), TaskStatus::Completed);

    data.set_failed(None);
    assert_eq!(data.status(), TaskStatus::Completed);
}

#[test]
fn records_are_ordered_and_addressable() {
    let mut data = task();
    let first = RequestId::new();
    let second = RequestId::new();
    data.push_request(RpcRecord::new(first, "consumer_A", RpcStatus::Waiting, ""));
    data.push_request(RpcRecord::new(second, "consumer_B", RpcStatus::Waiting, ""));

    assert_eq!(data.requests.len(), 2);
    assert_eq!(data.requests[0].uuid, first);
    assert_eq!(data.record(second).map(|r| r.routing_key.as_str()), Some("consumer_B"));

    data.record_mut(first).unwrap().set_completed();
    assert!(data.record(first).unwrap().is_terminal());
}
