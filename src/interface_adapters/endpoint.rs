//! Connection Endpoint: one live client socket wrapped as a cancellable,
//! single-reader/single-writer handle. Serializes sends behind a mutex, runs
//! one receive loop per connection, and demultiplexes CHAT packets off the
//! GAME-receive path into the session registry's broadcast sink.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::sync::{Mutex as AsyncMutex, Notify, mpsc};

use crate::interface_adapters::codec::{self, PacketType};
use crate::interface_adapters::crypto::FrameCipher;
use crate::use_cases::registry::SessionRegistry;

/// Depth of the GAME-payload queue between the receive loop and `recv_game`.
/// One connection's control-plane traffic is strictly request/response, so a
/// small bound is enough to absorb a burst without ever blocking the reader.
const GAME_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum RecvError {
    #[error("peer gone")]
    PeerGone,
    #[error("cancelled")]
    Cancelled,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("peer gone")]
pub struct SendError;

pub struct Endpoint {
    peer_addr: SocketAddr,
    send_seq: AtomicU32,
    write_half: AsyncMutex<OwnedWriteHalf>,
    cipher: Option<FrameCipher>,
    game_rx: AsyncMutex<mpsc::Receiver<String>>,
    cancel: Notify,
    cancelled: AtomicBool,
    name: StdMutex<Option<String>>,
}

impl Endpoint {
    /// Splits the socket, spawns the receive loop, and returns the handle.
    /// `registry` is where arriving CHAT packets get broadcast.
    pub fn spawn(
        stream: TcpStream,
        peer_addr: SocketAddr,
        cipher: Option<FrameCipher>,
        registry: Arc<SessionRegistry>,
    ) -> Arc<Self> {
        let (read_half, write_half) = stream.into_split();
        let (game_tx, game_rx) = mpsc::channel(GAME_CHANNEL_CAPACITY);

        let endpoint = Arc::new(Self {
            peer_addr,
            send_seq: AtomicU32::new(0),
            write_half: AsyncMutex::new(write_half),
            cipher,
            game_rx: AsyncMutex::new(game_rx),
            cancel: Notify::new(),
            cancelled: AtomicBool::new(false),
            name: StdMutex::new(None),
        });

        tokio::spawn(Self::receive_loop(
            endpoint.clone(),
            read_half,
            game_tx,
            registry,
        ));
        endpoint
    }

    async fn receive_loop(
        self: Arc<Self>,
        mut read_half: OwnedReadHalf,
        game_tx: mpsc::Sender<String>,
        registry: Arc<SessionRegistry>,
    ) {
        loop {
            let frame = tokio::select! {
                biased;
                _ = self.cancel.notified() => break,
                result = codec::read_frame(&mut read_half) => result,
            };

            let frame = match frame {
                Ok(frame) => frame,
                Err(error) => {
                    tracing::debug!(peer = %self.peer_addr, %error, "connection closed while reading");
                    break;
                }
            };

            let (_, raw_type, payload) = match codec::parse(&frame, self.cipher.as_ref()) {
                Ok(parsed) => parsed,
                Err(error) => {
                    tracing::warn!(peer = %self.peer_addr, %error, "dropping connection: malformed frame");
                    break;
                }
            };

            let text = match String::from_utf8(payload) {
                Ok(text) => text,
                Err(_) => {
                    tracing::warn!(peer = %self.peer_addr, "dropping connection: non-utf8 payload");
                    break;
                }
            };

            match codec::packet_type_of(raw_type) {
                Some(PacketType::Game) => {
                    if game_tx.send(text).await.is_err() {
                        break;
                    }
                }
                Some(PacketType::Chat) => {
                    let sender = self.display_name().unwrap_or_else(|| "?".to_string());
                    registry.broadcast(&sender, &text).await;
                }
                None => {
                    tracing::warn!(peer = %self.peer_addr, raw_type, "ignoring unknown packet type");
                }
            }
        }

        self.mark_closed();
        registry.deregister(&self).await;
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn display_name(&self) -> Option<String> {
        self.name.lock().expect("endpoint name lock poisoned").clone()
    }

    pub fn set_display_name(&self, name: String) {
        *self.name.lock().expect("endpoint name lock poisoned") = Some(name);
    }

    /// Returns the next GAME payload, or fails with `PeerGone`/`Cancelled`.
    /// Any CHAT packets arriving between calls are handled transparently by
    /// the receive loop; they never reach this method.
    pub async fn recv_game(&self) -> Result<String, RecvError> {
        if self.cancelled.load(Ordering::Acquire) {
            return Err(RecvError::Cancelled);
        }
        let mut rx = self.game_rx.lock().await;
        tokio::select! {
            biased;
            _ = self.cancel.notified() => Err(RecvError::Cancelled),
            received = rx.recv() => received.ok_or(RecvError::PeerGone),
        }
    }

    pub async fn send_game(&self, text: &str) -> Result<(), SendError> {
        self.send(PacketType::Game, text).await
    }

    pub async fn send_chat(&self, text: &str) -> Result<(), SendError> {
        self.send(PacketType::Chat, text).await
    }

    async fn send(&self, packet_type: PacketType, text: &str) -> Result<(), SendError> {
        let seq = self.send_seq.fetch_add(1, Ordering::AcqRel);
        let frame = codec::build(seq, packet_type, text.as_bytes(), self.cipher.as_ref());
        let mut write_half = self.write_half.lock().await;
        write_half.write_all(&frame).await.map_err(|_| SendError)?;
        write_half.flush().await.map_err(|_| SendError)
    }

    pub fn is_closed(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Signals the receive loop to exit and unblocks any in-flight `recv_game`.
    pub fn close(&self) {
        self.mark_closed();
    }

    fn mark_closed(&self) {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
            self.cancel.notify_waiters();
        }
    }
}

