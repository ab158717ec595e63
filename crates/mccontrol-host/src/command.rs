//! Host command queue.
//!
//! HTTP handlers never mutate host state. They submit a [`HostCommand`] to a
//! bounded queue consumed by one [`HostLoop`], the only owner of the
//! [`HostModel`]. After each command the loop publishes a fresh
//! [`HostSnapshot`] for readers.
//!
//! ```text
//! handler A ──┐
//! handler B ──┼──► HostQueue (mpsc) ──► HostLoop ──► watch<HostSnapshot> ──► WorldView
//! sampler   ──┘                           │
//!                                         └──► host-state.json
//! ```
//!
//! Delivery is FIFO and at-most-once. Every accepted command carries a ticket
//! (strictly increasing, in queue order); `HostSnapshot::last_applied` is the
//! ticket of the newest applied command. Commands still queued when the loop
//! stops are dropped, and submitting after that fails with
//! [`HostError::LoopClosed`].

use crate::error::{HostError, HostResult};
use crate::logs::LogHub;
use crate::model::HostModel;
use crate::view::{HostSnapshot, WorldView};
use mccontrol_core::{ListEntry, PlayerAction};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// A mutation of host state.
#[derive(Debug, Clone, PartialEq)]
pub enum HostCommand {
    Player { uuid: String, action: PlayerAction },
    WhitelistAdd(ListEntry),
    WhitelistRemove { uuid: String },
    BanAdd(ListEntry),
    BanRemove { uuid: String },
    OpAdd(ListEntry),
    OpRemove { uuid: String },
    /// A console command line, with or without a leading slash.
    Console { command: String },
    /// A chat message from the server; a leading `/` runs it as a command.
    Chat { message: String },
    UpdateProperties(BTreeMap<String, Value>),
    UpdateGameRules(BTreeMap<String, Value>),
    PlayerJoined(ListEntry),
    PlayerLeft { uuid: String },
    PlayerChat { uuid: String, message: String },
    Shutdown,
}

impl HostCommand {
    fn label(&self) -> &'static str {
        match self {
            HostCommand::Player { .. } => "player",
            HostCommand::WhitelistAdd(_) => "whitelist_add",
            HostCommand::WhitelistRemove { .. } => "whitelist_remove",
            HostCommand::BanAdd(_) => "ban_add",
            HostCommand::BanRemove { .. } => "ban_remove",
            HostCommand::OpAdd(_) => "op_add",
            HostCommand::OpRemove { .. } => "op_remove",
            HostCommand::Console { .. } => "console",
            HostCommand::Chat { .. } => "chat",
            HostCommand::UpdateProperties(_) => "update_properties",
            HostCommand::UpdateGameRules(_) => "update_gamerules",
            HostCommand::PlayerJoined(_) => "player_joined",
            HostCommand::PlayerLeft { .. } => "player_left",
            HostCommand::PlayerChat { .. } => "player_chat",
            HostCommand::Shutdown => "shutdown",
        }
    }
}

#[derive(Debug)]
struct Envelope {
    ticket: u64,
    command: HostCommand,
}

/// Cloneable submit handle.
#[derive(Clone)]
pub struct HostQueue {
    tx: mpsc::Sender<Envelope>,
    next_ticket: Arc<Mutex<u64>>,
}

impl HostQueue {
    /// Queue a command and return its ticket. Waits for queue space when the
    /// queue is full.
    pub async fn submit(&self, command: HostCommand) -> HostResult<u64> {
        let permit = self.tx.reserve().await.map_err(|_| HostError::LoopClosed)?;

        // Ticket assignment and enqueue happen under one lock so ticket order
        // is queue order.
        let mut next = self
            .next_ticket
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *next += 1;
        let ticket = *next;
        debug!(ticket, command = command.label(), "host command queued");
        permit.send(Envelope { ticket, command });
        Ok(ticket)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// The single owner of host state.
pub struct HostLoop {
    rx: mpsc::Receiver<Envelope>,
    model: HostModel,
    logs: Arc<LogHub>,
    state_path: Option<PathBuf>,
    state_tx: watch::Sender<HostSnapshot>,
    last_applied: u64,
}

/// Build the queue, the read view and the loop around `model`.
///
/// `state_path`, when set, receives the model as JSON after every applied
/// mutation.
pub fn host_channel(
    model: HostModel,
    logs: Arc<LogHub>,
    state_path: Option<PathBuf>,
    capacity: usize,
) -> (HostQueue, WorldView, HostLoop) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (state_tx, state_rx) = watch::channel(HostSnapshot::new(model.clone()));

    let queue = HostQueue {
        tx,
        next_ticket: Arc::new(Mutex::new(0)),
    };
    let view = WorldView::new(state_rx);
    let host_loop = HostLoop {
        rx,
        model,
        logs,
        state_path,
        state_tx,
        last_applied: 0,
    };
    (queue, view, host_loop)
}

impl HostLoop {
    /// Apply commands until `Shutdown` is applied or every queue handle is
    /// dropped.
    pub async fn run(mut self) {
        info!("host loop started");

        while let Some(Envelope { ticket, command }) = self.rx.recv().await {
            let label = command.label();
            let applied = self.model.apply(command, &self.logs);
            self.last_applied = self.last_applied.max(ticket);
            debug!(ticket, command = label, changed = applied.changed, "host command applied");

            if applied.changed {
                self.persist().await;
            }
            let stopping = applied.stop;
            self.publish(stopping);
            if stopping {
                info!(ticket, "host loop received shutdown");
                break;
            }
        }

        // Anything still queued is dropped with the receiver.
        self.rx.close();
        self.publish(true);
        self.logs.flush_or_log();
        info!("host loop stopped");
    }

    fn publish(&self, stopping: bool) {
        let snapshot = HostSnapshot {
            model: Arc::new(self.model.clone()),
            last_applied: self.last_applied,
            stopping,
        };
        self.state_tx.send_replace(snapshot);
    }

    async fn persist(&self) {
        let Some(path) = &self.state_path else {
            return;
        };
        let json = match serde_json::to_string_pretty(&self.model) {
            Ok(json) => json,
            Err(e) => {
                error!(error = %e, "failed to serialize host state");
                return;
            }
        };
        if let Some(dir) = path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(dir).await {
                error!(path = %dir.display(), error = %e, "failed to create host state dir");
                return;
            }
        }
        if let Err(e) = tokio::fs::write(path, json).await {
            error!(path = %path.display(), error = %e, "failed to save host state");
        }
    }
}
