//! Session Registry: process-wide mapping from display name to the live
//! connection using it, plus each name's match association. This codebase
//! folds the Broadcast Sink's membership into the same map rather than
//! keeping a second parallel set, since the registry is already the single
//! source of truth for "who is currently connected" (see `broadcast`).

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use tokio::sync::Mutex;

use crate::interface_adapters::endpoint::Endpoint;
use crate::use_cases::match_state::MatchState;

struct SessionEntry {
    endpoint: Arc<Endpoint>,
    match_ref: Option<Arc<MatchState>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// A brand new session, or the prior holder of this name is gone.
    Fresh,
    /// This name was mid-reconnect-window in a live match; the slot rebound.
    Reconnected,
    /// The name is live and not expecting a reconnect.
    NameInUse,
}

#[derive(Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<String, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name` to `endpoint`. A name with no live holder always
    /// succeeds as fresh. A name whose match is reconnect-pending for that
    /// slot rebinds atomically. A name that is genuinely live elsewhere and
    /// not expecting a reconnect is rejected with `NameInUse`.
    pub async fn register(&self, name: &str, endpoint: Arc<Endpoint>) -> RegisterOutcome {
        let prior = {
            let sessions = self.sessions.lock().await;
            sessions
                .get(name)
                .map(|entry| (entry.endpoint.clone(), entry.match_ref.clone()))
        };

        if let Some((prior_endpoint, match_ref)) = prior {
            // A reconnect-pending slot takes priority over the prior
            // endpoint's own closed/open state: the prior connection is
            // invariably already closed by the time its slot goes into the
            // reconnect window (that's what triggered the window), so
            // gating this check on `!prior_endpoint.is_closed()` would make
            // it unreachable for the exact case it exists to handle.
            if let Some(match_ref) = &match_ref {
                if let Some(slot) = match_ref.slot_for(name) {
                    let disconnected = !match_ref.players[slot].connected.load(Ordering::Acquire);
                    if disconnected && !match_ref.is_terminated().await {
                        *match_ref.players[slot].endpoint.lock().await = endpoint.clone();
                        match_ref.players[slot].connected.store(true, Ordering::Release);
                        *match_ref.players[slot].disconnected_at.lock().await = None;
                        endpoint.set_display_name(name.to_string());

                        let mut sessions = self.sessions.lock().await;
                        sessions.insert(
                            name.to_string(),
                            SessionEntry {
                                endpoint,
                                match_ref: Some(match_ref.clone()),
                            },
                        );
                        drop(sessions);

                        match_ref.players[slot].rebind_notify.notify_waiters();
                        return RegisterOutcome::Reconnected;
                    }
                }
            }

            if !prior_endpoint.is_closed() {
                return RegisterOutcome::NameInUse;
            }
        }

        endpoint.set_display_name(name.to_string());
        let mut sessions = self.sessions.lock().await;
        sessions.insert(
            name.to_string(),
            SessionEntry {
                endpoint,
                match_ref: None,
            },
        );
        RegisterOutcome::Fresh
    }

    /// Removes `endpoint`'s entry, but only if it is still the registered
    /// holder of its name (a newer session under the same name must not be
    /// evicted by a stale connection's teardown) and its match, if any, is
    /// not sitting in a reconnect window. A slot with a reconnect-pending
    /// match keeps its name -> match_ref association live so the next
    /// `register` under this name finds it and rebinds instead of starting
    /// a fresh session the original match's watcher then times out.
    pub async fn deregister(&self, endpoint: &Arc<Endpoint>) {
        let Some(name) = endpoint.display_name() else {
            return;
        };

        let match_ref = {
            let sessions = self.sessions.lock().await;
            match sessions.get(&name) {
                Some(entry) if Arc::ptr_eq(&entry.endpoint, endpoint) => entry.match_ref.clone(),
                _ => return,
            }
        };

        if let Some(match_ref) = match_ref {
            if !match_ref.is_terminated().await {
                return;
            }
        }

        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get(&name) {
            if Arc::ptr_eq(&entry.endpoint, endpoint) {
                sessions.remove(&name);
            }
        }
    }

    /// Associates `name` with `match_ref`, called once the Lobby pairs it
    /// into a match so a later reconnect attempt can find it.
    pub async fn attach_match(&self, name: &str, match_ref: Arc<MatchState>) {
        let mut sessions = self.sessions.lock().await;
        if let Some(entry) = sessions.get_mut(name) {
            entry.match_ref = Some(match_ref);
        }
    }

    /// Clears the match association for both names once a match terminates.
    /// The session entry (name -> endpoint) itself survives so the player
    /// can requeue or start a fresh session under the same name.
    pub async fn detach_match(&self, name_a: &str, name_b: &str) {
        let mut sessions = self.sessions.lock().await;
        for name in [name_a, name_b] {
            if let Some(entry) = sessions.get_mut(name) {
                entry.match_ref = None;
            }
        }
    }

    /// Frames a CHAT packet `"<sender>: <text>"` and fans it out to every
    /// currently registered endpoint. A send failure silently evicts that
    /// endpoint. Never holds the registry lock across the actual sends.
    pub async fn broadcast(&self, sender_name: &str, text: &str) {
        let message = format!("{sender_name}: {text}");
        let snapshot: Vec<(String, Arc<Endpoint>)> = {
            let sessions = self.sessions.lock().await;
            sessions
                .iter()
                .map(|(name, entry)| (name.clone(), entry.endpoint.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (name, endpoint) in snapshot {
            if endpoint.send_chat(&message).await.is_err() {
                dead.push(name);
            }
        }

        if !dead.is_empty() {
            let mut sessions = self.sessions.lock().await;
            for name in dead {
                sessions.remove(&name);
            }
        }
    }
}
