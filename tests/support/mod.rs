// Shared primitives for one-time server bootstrapping and a tiny protocol
// client, used across the integration tests in this directory.
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, OnceLock,
    },
    time::Duration,
};

use battleship_server::domain::SHIP_CATALOG;
use battleship_server::interface_adapters::codec::{self, PacketType};
use battleship_server::Config;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

static SERVER_ADDR: OnceLock<String> = OnceLock::new();
static SERVER_READY: OnceLock<()> = OnceLock::new();
static NAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Short, test-friendly overrides of the runtime config so turn timeouts,
/// reconnect windows, and the lobby lead time don't make the suite slow.
fn test_config(bind_addr: std::net::SocketAddr) -> Config {
    Config {
        bind_addr,
        turn_timeout: Duration::from_millis(400),
        reconnect_window: Duration::from_millis(500),
        lobby_lead: Duration::from_millis(50),
        cipher: None,
    }
}

/// Ensures a background server is listening and returns its address.
pub fn ensure_server() -> &'static str {
    SERVER_READY.get_or_init(|| {
        let published_addr = Arc::new(OnceLock::<String>::new());
        let published_addr_thread = Arc::clone(&published_addr);
        std::thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("test runtime");
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
                    .await
                    .expect("bind ephemeral test port");
                let addr = listener.local_addr().expect("get local addr");
                let _ = published_addr_thread.set(addr.to_string());
                battleship_server::run(listener, test_config(addr))
                    .await
                    .expect("server failed");
            });
        });
        wait_for_readiness(published_addr);
    });

    SERVER_ADDR.get().expect("server addr should be initialized").as_str()
}

fn wait_for_readiness(published_addr: Arc<OnceLock<String>>) {
    let addr = loop {
        if let Some(addr) = published_addr.get() {
            break addr.clone();
        }
        std::thread::sleep(Duration::from_millis(10));
    };
    let _ = SERVER_ADDR.set(addr.clone());

    for _ in 0..100 {
        if std::net::TcpStream::connect(&addr).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(20));
    }
    panic!("server did not become ready in time");
}

/// A process-unique player name so tests never collide in the shared
/// Session Registry of the one background server they all share.
pub fn unique_name(prefix: &str) -> String {
    let n = NAME_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{prefix}{n}")
}

/// A minimal framed client used to drive the protocol from tests.
pub struct TestClient {
    read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    send_seq: u32,
}

impl TestClient {
    pub async fn connect() -> Self {
        let addr = ensure_server();
        let stream = TcpStream::connect(addr).await.expect("connect to test server");
        let (read_half, write_half) = stream.into_split();
        Self { read_half, write_half, send_seq: 0 }
    }

    pub async fn send_game(&mut self, text: &str) {
        self.send(PacketType::Game, text).await;
    }

    pub async fn send_chat(&mut self, text: &str) {
        self.send(PacketType::Chat, text).await;
    }

    async fn send(&mut self, packet_type: PacketType, text: &str) {
        let frame = codec::build(self.send_seq, packet_type, text.as_bytes(), None);
        self.send_seq += 1;
        self.write_half.write_all(&frame).await.expect("write frame");
        self.write_half.flush().await.expect("flush frame");
    }

    /// Reads one frame and returns its payload as text, regardless of type.
    pub async fn recv_any(&mut self) -> String {
        let frame = codec::read_frame(&mut self.read_half).await.expect("read frame");
        let (_, _, payload) = codec::parse(&frame, None).expect("parse frame");
        String::from_utf8(payload).expect("utf8 payload")
    }

    /// Reads frames, skipping CHAT packets, until the next GAME payload.
    pub async fn recv_game(&mut self) -> String {
        loop {
            let frame = codec::read_frame(&mut self.read_half).await.expect("read frame");
            let (_, raw_type, payload) = codec::parse(&frame, None).expect("parse frame");
            if raw_type == PacketType::Game as u8 {
                return String::from_utf8(payload).expect("utf8 payload");
            }
        }
    }

    /// Reads frames, skipping GAME packets, until the next CHAT payload.
    pub async fn recv_chat(&mut self) -> String {
        loop {
            let frame = codec::read_frame(&mut self.read_half).await.expect("read frame");
            let (_, raw_type, payload) = codec::parse(&frame, None).expect("parse frame");
            if raw_type == PacketType::Chat as u8 {
                return String::from_utf8(payload).expect("utf8 payload");
            }
        }
    }

    /// Reads GAME frames until one starting with `prefix` is seen, returning it.
    pub async fn recv_game_until(&mut self, prefix: &str) -> String {
        loop {
            let text = self.recv_game().await;
            if text.starts_with(prefix) {
                return text;
            }
        }
    }
}

/// Drives one client through ship placement using a fixed, deterministic
/// layout: ship `i` (in catalog order) goes horizontally on row `'A' + i`
/// starting at column 1. Every client placed this way has ships confined to
/// rows A-E, leaving rows F-J free for filler shots that never hit anything.
pub async fn place_all_ships(client: &mut TestClient) {
    for (i, (name, _)) in SHIP_CATALOG.into_iter().enumerate() {
        client.recv_game_until("Placing your").await;
        let row = (b'A' + i as u8) as char;
        client.send_game(&format!("PLACE {row}1 H {name}")).await;
        let response = client.recv_game().await;
        assert!(response.starts_with("PLACED"), "expected PLACED, got {response}");
    }
}

/// The coordinates of `name`'s ships under the `place_all_ships` layout.
pub fn ship_cells() -> Vec<String> {
    let mut cells = Vec::new();
    for (i, (_, len)) in SHIP_CATALOG.into_iter().enumerate() {
        let row = (b'A' + i as u8) as char;
        for col in 1..=len {
            cells.push(format!("{row}{col}"));
        }
    }
    cells
}

/// Coordinates guaranteed empty under the `place_all_ships` layout (rows F-J).
pub fn filler_cells() -> impl Iterator<Item = String> {
    ('F'..='J').flat_map(|row| (1..=10).map(move |col| format!("{row}{col}")))
}
