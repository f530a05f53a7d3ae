//! Lobby: the FIFO queue of authenticated, idle connections and the periodic
//! pairing loop that hands the head two off to a Match Supervisor task.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::sleep;

use crate::frameworks::config::Config;
use crate::interface_adapters::endpoint::Endpoint;
use crate::use_cases::match_state::MatchState;
use crate::use_cases::match_supervisor;
use crate::use_cases::registry::SessionRegistry;

/// Cadence of the pairing loop itself, distinct from the configurable
/// announcement lead time before a paired match actually starts.
const PAIRING_TICK: Duration = Duration::from_millis(500);

struct QueueEntry {
    name: String,
    endpoint: Arc<Endpoint>,
}

pub struct Lobby {
    queue: Mutex<VecDeque<QueueEntry>>,
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
}

impl Lobby {
    pub fn new(registry: Arc<SessionRegistry>, config: Arc<Config>) -> Arc<Self> {
        Arc::new(Self {
            queue: Mutex::new(VecDeque::new()),
            registry,
            config,
        })
    }

    /// Appends a freshly authenticated connection to the tail of the queue.
    pub async fn enqueue_fresh(&self, name: String, endpoint: Arc<Endpoint>) {
        self.push(name, endpoint, false).await;
    }

    /// Inserts a match's winner at the head, ahead of anyone already waiting.
    pub async fn enqueue_winner(&self, name: String, endpoint: Arc<Endpoint>) {
        self.push(name, endpoint, true).await;
    }

    async fn push(&self, name: String, endpoint: Arc<Endpoint>, at_head: bool) {
        let position = {
            let mut queue = self.queue.lock().await;
            if at_head {
                queue.push_front(QueueEntry { name, endpoint: endpoint.clone() });
            } else {
                queue.push_back(QueueEntry { name, endpoint: endpoint.clone() });
            }
            queue.len()
        };

        if position == 1 {
            let _ = endpoint.send_game("Waiting for another player to join...").await;
        } else {
            let _ = endpoint
                .send_game(&format!("[LOBBY] You are position {position} in the queue."))
                .await;
        }
    }

    /// Spawns the periodic pairing loop as a process-lifetime background task.
    pub fn spawn_pairing_loop(self: Arc<Self>) {
        tokio::spawn(async move {
            loop {
                sleep(PAIRING_TICK).await;
                Self::pairing_tick(&self).await;
            }
        });
    }

    async fn pairing_tick(self: &Arc<Self>) {
        self.prune_closed().await;

        let head_two = {
            let queue = self.queue.lock().await;
            if queue.len() < 2 {
                return;
            }
            (
                queue[0].name.clone(),
                queue[0].endpoint.clone(),
                queue[1].name.clone(),
                queue[1].endpoint.clone(),
            )
        };
        let (name_a, endpoint_a, name_b, endpoint_b) = head_two;

        let lead = self.config.lobby_lead;
        let notice = format!(
            "[LOBBY] next match: {name_a} vs {name_b} starting in {} s",
            lead.as_secs()
        );
        let _ = endpoint_a.send_game(&notice).await;
        let _ = endpoint_b.send_game(&notice).await;
        self.broadcast_positions().await;

        sleep(lead).await;

        if endpoint_a.is_closed() || endpoint_b.is_closed() {
            // One of the two vanished during the lead time; the next tick's
            // prune drops it and re-pairs from whatever remains.
            return;
        }

        let mut queue = self.queue.lock().await;
        // Something else (a just-finished match's winner) may have jumped
        // the queue during the lead-time sleep; if the head no longer
        // matches what we announced, back off and let the next tick re-pair.
        if queue.len() < 2 || queue[0].name != name_a || queue[1].name != name_b {
            return;
        }
        queue.pop_front();
        queue.pop_front();
        drop(queue);

        let match_state = MatchState::new(name_a.clone(), endpoint_a, name_b.clone(), endpoint_b);
        self.registry.attach_match(&name_a, match_state.clone()).await;
        self.registry.attach_match(&name_b, match_state.clone()).await;

        let registry = self.registry.clone();
        let config = self.config.clone();
        let lobby = self.clone();
        tokio::spawn(async move {
            match_supervisor::run(match_state, lobby, registry, config).await;
        });
    }

    async fn prune_closed(&self) {
        let mut queue = self.queue.lock().await;
        queue.retain(|entry| !entry.endpoint.is_closed());
    }

    async fn broadcast_positions(&self) {
        let queue = self.queue.lock().await;
        for (index, entry) in queue.iter().enumerate() {
            let _ = entry
                .endpoint
                .send_game(&format!("[LOBBY] You are position {} in the queue.", index + 1))
                .await;
        }
    }
}
