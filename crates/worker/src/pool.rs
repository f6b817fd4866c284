// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker-pool supervision.
//!
//! One supervised OS process per (routing key, instance). The supervisor
//! owns each worker's command pipe, relays close commands from the fan-out
//! exchange, kills workers on terminate commands and recreates any process
//! that exits while the pool is running. A worker that dies mid-task gets a
//! synthetic failed reply published on its behalf so the scheduler can
//! finish its bookkeeping.

use crate::pipe::CommandPipe;
use crate::registry::HandlerCatalog;
use crate::WorkerError;
use atlas_broker::{topology, BrokerAdapter, ConsumeSpec};
use atlas_core::RequestId;
use atlas_wire::{Command, CommandCode, PipeMsg, Reply};
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::process::{Child, Command as WorkerCommand};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// How long a freshly spawned worker gets to connect its control pipe.
const ACCEPT_TIMEOUT: Duration = Duration::from_secs(10);
/// Grace between SIGTERM and SIGKILL during shutdown.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub amqp_url: String,
    /// Directory for per-worker control sockets.
    pub socket_dir: PathBuf,
    /// Delay before a dead worker process is recreated.
    pub restart_delay: Duration,
    /// (routing key, instance count) pairs.
    pub consumers: Vec<(String, usize)>,
}

type SlotKey = (String, usize);

#[derive(Debug)]
enum SlotCmd {
    Close { username: String },
    Terminate,
}

struct SlotShared {
    current: Option<RequestId>,
    cmd_tx: mpsc::UnboundedSender<SlotCmd>,
}

/// Cross-task bookkeeping: which request runs where, and which requests
/// have an outstanding close that arrived before any worker picked them up.
#[derive(Default)]
struct PoolState {
    pending_closes: HashMap<RequestId, String>,
    slots: HashMap<SlotKey, SlotShared>,
}

impl PoolState {
    /// A worker announced a task. Records it as in-flight and returns the
    /// username of a pending close, if the task was cancelled while queued.
    fn note_open(&mut self, slot: &SlotKey, request_id: RequestId) -> Option<String> {
        if let Some(shared) = self.slots.get_mut(slot) {
            shared.current = Some(request_id);
        }
        self.pending_closes.get(&request_id).cloned()
    }

    fn note_closed(&mut self, slot: &SlotKey) {
        if let Some(shared) = self.slots.get_mut(slot) {
            shared.current = None;
        }
    }

    /// The slot currently running a request.
    fn slot_for(&self, request_id: RequestId) -> Option<&SlotShared> {
        self.slots.values().find(|shared| shared.current == Some(request_id))
    }

    /// Take the in-flight request of a slot whose process died.
    fn take_inflight(&mut self, slot: &SlotKey) -> Option<RequestId> {
        let request_id = self.slots.get_mut(slot)?.current.take()?;
        self.pending_closes.remove(&request_id);
        Some(request_id)
    }

    fn handle_command(&mut self, command: Command) {
        match command.cmd {
            CommandCode::CloseTask => {
                self.pending_closes.insert(command.request_id, command.username.clone());
                if let Some(shared) = self.slot_for(command.request_id) {
                    let _ = shared.cmd_tx.send(SlotCmd::Close { username: command.username });
                }
            }
            CommandCode::TerminateTask => {
                if let Some(shared) = self.slot_for(command.request_id) {
                    let _ = shared.cmd_tx.send(SlotCmd::Terminate);
                } else {
                    tracing::warn!(
                        request = %command.request_id.short(),
                        "terminate for a request no worker is running"
                    );
                }
            }
            CommandCode::NotifyTaskClosed => {
                self.pending_closes.remove(&command.request_id);
            }
            CommandCode::Ok | CommandCode::LoadLog => {
                tracing::debug!(cmd = %command.cmd, "ignoring control message");
            }
        }
    }
}

/// Spawns and supervises the worker processes of one `--consumers` list.
pub struct PoolSupervisor {
    shutdown: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl PoolSupervisor {
    /// Validate routing keys, connect the broker, spawn every worker slot
    /// and the command consumer.
    pub async fn start(
        config: PoolConfig,
        catalog: &HandlerCatalog,
    ) -> Result<Self, WorkerError> {
        for (routing_key, _) in &config.consumers {
            if !catalog.contains(routing_key) {
                return Err(WorkerError::UnknownRoutingKey(routing_key.clone()));
            }
        }
        std::fs::create_dir_all(&config.socket_dir)?;

        let adapter = BrokerAdapter::connect(&config.amqp_url).await?;
        let state = Arc::new(Mutex::new(PoolState::default()));
        let shutdown = CancellationToken::new();
        let mut tasks = Vec::new();

        for (routing_key, count) in &config.consumers {
            for instance in 0..*count {
                let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
                state.lock().slots.insert(
                    (routing_key.clone(), instance),
                    SlotShared { current: None, cmd_tx },
                );
                let slot = SlotRunner {
                    key: (routing_key.clone(), instance),
                    amqp_url: config.amqp_url.clone(),
                    socket_dir: config.socket_dir.clone(),
                    restart_delay: config.restart_delay,
                    adapter: adapter.clone(),
                    state: Arc::clone(&state),
                    shutdown: shutdown.clone(),
                };
                tasks.push(tokio::spawn(slot.run(cmd_rx)));
            }
        }

        let cmd_stream = adapter.consume(ConsumeSpec::CommandQueue, "pool-supervisor").await?;
        tasks.push(tokio::spawn(command_loop(
            cmd_stream,
            adapter.clone(),
            Arc::clone(&state),
            shutdown.clone(),
        )));

        tracing::info!(
            slots = state.lock().slots.len(),
            "worker pool started"
        );
        Ok(Self { shutdown, tasks })
    }

    /// Stop every worker: SIGTERM, wait, SIGKILL survivors.
    pub async fn stop(self, timeout: Duration) {
        self.shutdown.cancel();
        for task in self.tasks {
            if tokio::time::timeout(timeout, task).await.is_err() {
                tracing::warn!("pool task did not stop in time");
            }
        }
    }
}

async fn command_loop(
    mut stream: atlas_broker::MessageStream,
    adapter: BrokerAdapter,
    state: Arc<Mutex<PoolState>>,
    shutdown: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            delivery = stream.next() => match delivery {
                Some(Ok(message)) => match Command::decode(&message.body) {
                    Ok(command) => state.lock().handle_command(command),
                    Err(err) => tracing::warn!(error = %err, "malformed control message"),
                },
                Some(Err(err)) => tracing::warn!(error = %err, "command delivery failed"),
                None => {
                    tracing::warn!("command stream ended, re-consuming");
                    tokio::time::sleep(Duration::from_secs(2)).await;
                    match adapter.consume(ConsumeSpec::CommandQueue, "pool-supervisor").await {
                        Ok(new_stream) => stream = new_stream,
                        Err(err) => tracing::error!(error = %err, "re-consume failed"),
                    }
                }
            },
        }
    }
}

/// Supervision loop of one worker slot.
struct SlotRunner {
    key: SlotKey,
    amqp_url: String,
    socket_dir: PathBuf,
    restart_delay: Duration,
    adapter: BrokerAdapter,
    state: Arc<Mutex<PoolState>>,
    shutdown: CancellationToken,
}

impl SlotRunner {
    async fn run(self, mut cmd_rx: mpsc::UnboundedReceiver<SlotCmd>) {
        let socket_path = self
            .socket_dir
            .join(format!("atlas-worker-{}-{}.sock", self.key.0, self.key.1));

        loop {
            if self.shutdown.is_cancelled() {
                return;
            }

            let Some((mut child, pipe)) = self.spawn_and_accept(&socket_path).await else {
                tokio::time::sleep(self.restart_delay).await;
                continue;
            };

            tracing::info!(
                routing_key = %self.key.0,
                instance = self.key.1,
                pid = child.id(),
                "worker process started"
            );

            self.serve(&mut child, &pipe, &mut cmd_rx).await;

            if self.shutdown.is_cancelled() {
                stop_child(&mut child).await;
                return;
            }

            // The process died while the pool is running: fail its in-flight
            // request so the scheduler can tear the step down, then restart.
            let inflight_request_id = self.state.lock().take_inflight(&self.key);
            if let Some(request_id) = inflight_request_id {
                let reply = Reply::failed(request_id, "worker process terminated");
                if let Err(err) = self
                    .adapter
                    .publish(
                        topology::EXCHANGE,
                        topology::REPLY_ROUTING_KEY,
                        request_id,
                        None,
                        &reply.encode(),
                    )
                    .await
                {
                    tracing::error!(
                        request = %request_id.short(),
                        error = %err,
                        "failed to publish synthetic reply"
                    );
                }
            }

            tracing::warn!(
                routing_key = %self.key.0,
                instance = self.key.1,
                delay = ?self.restart_delay,
                "worker process exited, restarting"
            );
            tokio::time::sleep(self.restart_delay).await;
        }
    }

    /// Bind the control socket, spawn the process, await its connection.
    async fn spawn_and_accept(&self, socket_path: &Path) -> Option<(Child, Arc<CommandPipe>)> {
        let (routing_key, instance) = (self.key.0.as_str(), self.key.1);
        let _ = std::fs::remove_file(socket_path);

        let listener = match UnixListener::bind(socket_path) {
            Ok(listener) => listener,
            Err(err) => {
                tracing::error!(error = %err, path = %socket_path.display(), "bind failed");
                return None;
            }
        };

        let mut child = match spawn_worker(routing_key, instance, &self.amqp_url, socket_path) {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(error = %err, routing_key, "worker spawn failed");
                return None;
            }
        };

        match tokio::time::timeout(ACCEPT_TIMEOUT, listener.accept()).await {
            Ok(Ok((stream, _))) => Some((child, Arc::new(CommandPipe::new(stream)))),
            _ => {
                tracing::error!(routing_key, instance, "worker did not open its control pipe");
                let _ = child.kill().await;
                None
            }
        }
    }

    /// Relay pipe and command traffic until the child exits or shutdown.
    async fn serve(
        &self,
        child: &mut Child,
        pipe: &Arc<CommandPipe>,
        cmd_rx: &mut mpsc::UnboundedReceiver<SlotCmd>,
    ) {
        // Signals go via the pid: the Child handle stays borrowed by the
        // wait() future for the whole select
        let pid = child.id();
        let mut pipe_open = true;
        loop {
            tokio::select! {
                status = child.wait() => {
                    tracing::info!(key = ?self.key, ?status, "worker process exited");
                    return;
                }
                Some(cmd) = cmd_rx.recv() => match cmd {
                    SlotCmd::Close { username } => {
                        if pipe_open {
                            let _ = pipe.send(&PipeMsg::CloseTask { username }).await;
                        }
                    }
                    SlotCmd::Terminate => {
                        tracing::warn!(key = ?self.key, "terminating worker process");
                        if let Some(pid) = pid {
                            let _ = kill(Pid::from_raw(pid as i32), Signal::SIGKILL);
                        }
                    }
                },
                msg = pipe.recv(), if pipe_open => match msg {
                    Some(PipeMsg::OpenTask { request_id }) => {
                        let pending = self.state.lock().note_open(&self.key, request_id);
                        let answer = match pending {
                            Some(username) => PipeMsg::CloseTask { username },
                            None => PipeMsg::Ok,
                        };
                        let _ = pipe.send(&answer).await;
                    }
                    Some(PipeMsg::TaskClosed { request_id }) => {
                        tracing::debug!(request = %request_id.short(), "task closed");
                        self.state.lock().note_closed(&self.key);
                        let _ = pipe.send(&PipeMsg::Ok).await;
                    }
                    Some(other) => {
                        tracing::debug!(?other, "unexpected pipe message");
                    }
                    None => {
                        // Pipe gone but the process may still be shutting
                        // down; keep waiting for the exit status.
                        pipe_open = false;
                    }
                },
                _ = self.shutdown.cancelled() => return,
            }
        }
    }
}

fn spawn_worker(
    routing_key: &str,
    instance: usize,
    amqp_url: &str,
    socket_path: &Path,
) -> std::io::Result<Child> {
    let exe = std::env::current_exe()?;
    WorkerCommand::new(exe)
        .arg("worker")
        .arg("--routing-key")
        .arg(routing_key)
        .arg("--instance")
        .arg(instance.to_string())
        .arg("--amqp-url")
        .arg(amqp_url)
        .arg("--control-socket")
        .arg(socket_path)
        .kill_on_drop(true)
        .spawn()
}

/// SIGTERM, grace period, SIGKILL.
async fn stop_child(child: &mut Child) {
    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
    if tokio::time::timeout(STOP_GRACE, child.wait()).await.is_err() {
        tracing::warn!("worker ignored SIGTERM, killing");
        let _ = child.kill().await;
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
