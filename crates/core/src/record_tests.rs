// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn waiting_record() -> RpcRecord {
    RpcRecord::new(RequestId::new(), "consumer_A", RpcStatus::Waiting, "the request has been sent")
}

#[test]
fn progress_is_monotone() {
    let mut rpc = waiting_record();
    rpc.set_progress(0.4);
    assert_eq!(rpc.progress(), 0.4);

    // Lower values are ignored
    rpc.set_progress(0.2);
    assert_eq!(rpc.progress(), 0.4);

    rpc.set_progress(0.9);
    assert_eq!(rpc.progress(), 0.9);
}

#[test]
fn progress_is_clamped() {
    let mut rpc = waiting_record();
    rpc.set_progress(7.5);
    assert_eq!(rpc.progress(), 1.0);

    let mut rpc = waiting_record();
    rpc.set_progress(-1.0);
    assert_eq!(rpc.progress(), 0.0);
}

#[test]
fn first_reply_moves_waiting_to_in_progress() {
    let mut rpc = waiting_record();
    rpc.note_reply();
    assert_eq!(rpc.status(), RpcStatus::InProgress);

    // Terminal states are not resurrected
    rpc.set_completed();
    rpc.note_reply();
    assert_eq!(rpc.status(), RpcStatus::Completed);
}

#[test]
fn completed_sets_full_progress() {
    let mut rpc = waiting_record();
    rpc.set_progress(0.3);
    rpc.set_completed();
    assert_eq!(rpc.status(), RpcStatus::Completed);
    assert_eq!(rpc.progress(), 1.0);
}

#[test]
fn exactly_one_terminal_transition() {
    let mut rpc = waiting_record();
    rpc.set_failed("worker lost");
    assert_eq!(rpc.status(), RpcStatus::Failed);
    assert_eq!(rpc.message, "worker lost");

    rpc.set_completed();
    assert_eq!(rpc.status(), RpcStatus::Failed, "terminal state must not change");

    rpc.set_failed("again");
    assert_eq!(rpc.message, "worker lost", "second failure must be ignored");
}
