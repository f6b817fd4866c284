// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn request() -> CloseRequest {
    CloseRequest::new(TaskId::new(), RequestId::new(), "road_osm_import", "user1")
}

#[test]
fn starts_waiting() {
    let req = request();
    assert_eq!(req.status(), RpcStatus::Waiting);
    assert_eq!(req.message, "waiting");
    assert!(!req.terminate_requested());
}

#[test]
fn escalation_keeps_in_progress_status() {
    let mut req = request();
    req.set_in_progress();
    req.set_terminate_requested();
    assert!(req.terminate_requested());
    assert_eq!(req.status(), RpcStatus::InProgress);
    assert_eq!(req.message, "terminating");
}

#[test]
fn completion_is_final() {
    let mut req = request();
    req.set_in_progress();
    req.set_completed();
    assert_eq!(req.status(), RpcStatus::Completed);
    assert_eq!(req.progress, 1.0);

    req.set_failed();
    assert_eq!(req.status(), RpcStatus::Completed);

    req.set_terminate_requested();
    assert!(!req.terminate_requested(), "terminal close must not escalate");
}

#[test]
fn failure_is_final() {
    let mut req = request();
    req.set_failed();
    assert_eq!(req.status(), RpcStatus::Failed);

    req.set_completed();
    assert_eq!(req.status(), RpcStatus::Failed);
}
