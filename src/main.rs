#[tokio::main]
async fn main() {
    if let Err(error) = battleship_server::run_with_config().await {
        tracing::error!(%error, "server exited");
        std::process::exit(1);
    }
}
