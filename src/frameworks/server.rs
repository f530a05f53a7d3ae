//! Framework bootstrap: logging, configuration, and the TCP accept loop.

use std::io::Result;
use std::sync::Arc;

use tokio::net::TcpListener;

use crate::frameworks::config::Config;
use crate::interface_adapters::connection;
use crate::use_cases::lobby::Lobby;
use crate::use_cases::registry::SessionRegistry;

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = matches!(std::env::var("LOG_FORMAT").as_deref(), Ok("json"));
    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .json()
            .with_current_span(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }

    std::panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::capture();
        tracing::error!(%info, ?backtrace, "panic");
    }));
}

pub async fn run(listener: TcpListener, config: Config) -> Result<()> {
    let address = listener.local_addr()?;
    let config = Arc::new(config);
    let registry = Arc::new(SessionRegistry::new());
    let lobby = Lobby::new(registry.clone(), config.clone());
    lobby.clone().spawn_pairing_loop();

    tracing::info!(%address, encrypted = config.cipher.is_some(), "listening");

    loop {
        let (stream, peer_addr) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(error) => {
                tracing::warn!(%error, "failed to accept connection");
                continue;
            }
        };
        tracing::debug!(%peer_addr, "accepted connection");

        tokio::spawn(connection::handle(
            stream,
            peer_addr,
            registry.clone(),
            lobby.clone(),
            config.clone(),
        ));
    }
}

pub async fn run_with_config() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = Config::from_env().map_err(std::io::Error::other)?;
    let listener = TcpListener::bind(config.bind_addr).await.inspect_err(|error| {
        tracing::error!(bind_addr = %config.bind_addr, %error, "failed to bind");
    })?;

    run(listener, config).await
}
