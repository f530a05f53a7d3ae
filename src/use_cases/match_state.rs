//! Shared, lock-protected state for one in-progress match. Owned jointly by
//! the match supervisor, the reconnect watcher, and the session registry
//! (which needs to inspect and rebind a disconnected slot on reconnect).

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize};
use std::time::Instant;

use tokio::sync::{Mutex, Notify};

use crate::domain::Board;
use crate::interface_adapters::endpoint::Endpoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Placement,
    Play,
    Terminated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    /// Normal win: all of the loser's ships sunk. `winner` is a slot index.
    Win { winner: usize },
    /// The opponent timed out on their turn, or their reconnect window expired.
    Forfeit { winner: usize },
    /// `quit` was sent voluntarily.
    VoluntaryQuit { winner: usize },
    /// Both players' reconnect windows elapsed before either rejoined.
    BothDisconnected,
}

impl TerminationReason {
    pub fn winner(&self) -> Option<usize> {
        match self {
            TerminationReason::Win { winner }
            | TerminationReason::Forfeit { winner }
            | TerminationReason::VoluntaryQuit { winner } => Some(*winner),
            TerminationReason::BothDisconnected => None,
        }
    }
}

/// One player's seat in a match: identity, current endpoint (swappable across
/// a reconnect), board, and disconnect bookkeeping.
pub struct PlayerSlot {
    pub name: String,
    pub endpoint: Mutex<Arc<Endpoint>>,
    pub board: Mutex<Board>,
    pub connected: AtomicBool,
    pub disconnected_at: Mutex<Option<Instant>>,
    /// Notified once the session registry rebinds this slot to a fresh endpoint.
    pub rebind_notify: Notify,
}

impl PlayerSlot {
    fn new(name: String, endpoint: Arc<Endpoint>) -> Self {
        Self {
            name,
            endpoint: Mutex::new(endpoint),
            board: Mutex::new(Board::new()),
            connected: AtomicBool::new(true),
            disconnected_at: Mutex::new(None),
            rebind_notify: Notify::new(),
        }
    }

    pub async fn current_endpoint(&self) -> Arc<Endpoint> {
        self.endpoint.lock().await.clone()
    }
}

pub struct MatchState {
    pub players: [PlayerSlot; 2],
    pub phase: Mutex<Phase>,
    pub turn: AtomicUsize,
    pub moves: AtomicU32,
    pub placed_count: AtomicUsize,
    /// Notified once both players finish placement.
    pub both_placed: Notify,
    pub termination: Mutex<Option<TerminationReason>>,
    /// Notified once `termination` is set; wakes every blocked recv across both slots.
    pub terminate_notify: Notify,
}

impl MatchState {
    pub fn new(
        name_a: String,
        endpoint_a: Arc<Endpoint>,
        name_b: String,
        endpoint_b: Arc<Endpoint>,
    ) -> Arc<Self> {
        Arc::new(Self {
            players: [PlayerSlot::new(name_a, endpoint_a), PlayerSlot::new(name_b, endpoint_b)],
            phase: Mutex::new(Phase::Placement),
            turn: AtomicUsize::new(0),
            moves: AtomicU32::new(0),
            placed_count: AtomicUsize::new(0),
            both_placed: Notify::new(),
            termination: Mutex::new(None),
            terminate_notify: Notify::new(),
        })
    }

    pub fn slot_for(&self, name: &str) -> Option<usize> {
        self.players.iter().position(|p| p.name == name)
    }

    pub fn other(slot: usize) -> usize {
        1 - slot
    }

    /// Idempotently raises termination; the first caller's reason sticks.
    pub async fn terminate(&self, reason: TerminationReason) {
        let mut guard = self.termination.lock().await;
        if guard.is_none() {
            *guard = Some(reason);
            *self.phase.lock().await = Phase::Terminated;
            drop(guard);
            self.terminate_notify.notify_waiters();
        }
    }

    pub async fn termination_reason(&self) -> Option<TerminationReason> {
        *self.termination.lock().await
    }

    pub async fn is_terminated(&self) -> bool {
        matches!(*self.phase.lock().await, Phase::Terminated)
    }
}
