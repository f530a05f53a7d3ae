//! Per-connection front door: authenticates the first GAME packet as a
//! `USERNAME` command, then dispatches into a practice session, the Lobby
//! queue, or rebinds onto a pending match's reconnect slot.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpStream;

use crate::frameworks::config::Config;
use crate::interface_adapters::endpoint::Endpoint;
use crate::interface_adapters::protocol::{self, ClientCommand};
use crate::use_cases::lobby::Lobby;
use crate::use_cases::practice;
use crate::use_cases::registry::{RegisterOutcome, SessionRegistry};

enum Authenticated {
    /// A fresh name, parked in the Lobby queue.
    Fresh { name: String },
    /// A fresh name that asked for single-player practice instead.
    Solo { name: String },
    /// A name mid-reconnect-window; the match slot is already rebound and
    /// the Match Supervisor picks the new endpoint up on its own.
    Reconnected,
}

pub async fn handle(
    stream: TcpStream,
    peer_addr: SocketAddr,
    registry: Arc<SessionRegistry>,
    lobby: Arc<Lobby>,
    config: Arc<Config>,
) {
    let endpoint = Endpoint::spawn(stream, peer_addr, config.cipher.clone(), registry.clone());

    match authenticate(&endpoint, &registry).await {
        Some(Authenticated::Solo { name }) => {
            let _ = endpoint.send_game("SOLO_OK").await;
            practice::run(name, endpoint, &config).await;
        }
        Some(Authenticated::Fresh { name }) => {
            let _ = endpoint.send_game("WELCOME").await;
            lobby.enqueue_fresh(name, endpoint).await;
        }
        Some(Authenticated::Reconnected) => {
            let _ = endpoint.send_game("RECONNECTED").await;
        }
        None => endpoint.close(),
    }
}

/// Reads GAME packets until a valid `USERNAME` is accepted, or the
/// connection drops first. A name collision without a pending reconnect
/// slot is reported back and the client gets another attempt.
async fn authenticate(endpoint: &Arc<Endpoint>, registry: &SessionRegistry) -> Option<Authenticated> {
    loop {
        let text = endpoint.recv_game().await.ok()?;
        match protocol::parse_command(&text) {
            Ok(ClientCommand::Username { name, solo }) => {
                match registry.register(&name, endpoint.clone()).await {
                    RegisterOutcome::Fresh if solo => return Some(Authenticated::Solo { name }),
                    RegisterOutcome::Fresh => return Some(Authenticated::Fresh { name }),
                    RegisterOutcome::Reconnected => return Some(Authenticated::Reconnected),
                    RegisterOutcome::NameInUse => {
                        let _ = endpoint.send_game("ERROR name already in use").await;
                    }
                }
            }
            Ok(_) => {
                let _ = endpoint.send_game("ERROR expected USERNAME <name>").await;
            }
            Err(err) => {
                let _ = endpoint.send_game(&format!("ERROR {err}")).await;
            }
        }
    }
}
