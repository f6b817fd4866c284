// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn state_with_slot(key: &SlotKey) -> (PoolState, mpsc::UnboundedReceiver<SlotCmd>) {
    let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
    let mut state = PoolState::default();
    state.slots.insert(key.clone(), SlotShared { current: None, cmd_tx });
    (state, cmd_rx)
}

fn slot_key() -> SlotKey {
    ("consumer_A".to_string(), 0)
}

#[test]
fn open_without_pending_close_proceeds() {
    let key = slot_key();
    let (mut state, _cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();

    assert_eq!(state.note_open(&key, request), None);
    assert!(state.slot_for(request).is_some());
}

#[test]
fn close_before_pickup_aborts_at_opening() {
    let key = slot_key();
    let (mut state, mut cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();

    // Close arrives while the request is still queued: no slot runs it yet
    state.handle_command(Command::close_task(request, "user1"));
    assert!(cmd_rx.try_recv().is_err(), "no worker should be signalled yet");

    // The worker that eventually picks it up is told to abort
    assert_eq!(state.note_open(&key, request), Some("user1".to_string()));
}

#[test]
fn close_for_a_running_task_reaches_its_slot() {
    let key = slot_key();
    let (mut state, mut cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();

    state.note_open(&key, request);
    state.handle_command(Command::close_task(request, "user1"));

    match cmd_rx.try_recv() {
        Ok(SlotCmd::Close { username }) => assert_eq!(username, "user1"),
        other => panic!("expected a close relay, got {other:?}"),
    }
}

#[test]
fn terminate_reaches_only_the_owning_slot() {
    let key = slot_key();
    let other_key = ("consumer_B".to_string(), 0);
    let (mut state, mut cmd_rx) = state_with_slot(&key);
    let (other_tx, mut other_rx) = mpsc::unbounded_channel();
    state.slots.insert(other_key.clone(), SlotShared { current: None, cmd_tx: other_tx });

    let request = RequestId::new();
    state.note_open(&key, request);
    state.handle_command(Command::terminate_task(request, "user1"));

    assert!(matches!(cmd_rx.try_recv(), Ok(SlotCmd::Terminate)));
    assert!(other_rx.try_recv().is_err());
}

#[test]
fn notify_closed_clears_the_pending_close() {
    let key = slot_key();
    let (mut state, _cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();

    state.handle_command(Command::close_task(request, "user1"));
    state.handle_command(Command::notify_task_closed(request, "user1"));

    assert_eq!(state.note_open(&key, request), None, "cleared close must not abort");
}

#[test]
fn task_closed_frees_the_slot() {
    let key = slot_key();
    let (mut state, _cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();

    state.note_open(&key, request);
    state.note_closed(&key);
    assert!(state.slot_for(request).is_none());
}

#[test]
fn crashed_slot_yields_its_inflight_request_once() {
    let key = slot_key();
    let (mut state, _cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();

    state.note_open(&key, request);
    state.handle_command(Command::close_task(request, "user1"));

    assert_eq!(state.take_inflight(&key), Some(request));
    // Pending close is dropped with it and a second take finds nothing
    assert_eq!(state.note_open(&key, request), None);
    state.note_closed(&key);
    assert_eq!(state.take_inflight(&key), None);
}

#[test]
fn reserved_load_log_is_ignored() {
    let key = slot_key();
    let (mut state, mut cmd_rx) = state_with_slot(&key);
    let request = RequestId::new();
    state.note_open(&key, request);

    state.handle_command(Command {
        cmd: CommandCode::LoadLog,
        request_id: request,
        username: "user1".into(),
    });
    assert!(cmd_rx.try_recv().is_err());
}
