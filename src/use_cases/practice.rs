//! Single-Player Practice Session: a supervisor-free path through the same
//! Board and GAME-grammar machinery used in multiplayer, played against a
//! non-networked opponent board. No Session Registry match entry, no
//! reconnect window, no Lobby involvement — a disconnect here is just a
//! plain connection teardown.

use std::sync::Arc;

use crate::domain::{self, Board};
use crate::frameworks::config::Config;
use crate::interface_adapters::endpoint::Endpoint;
use crate::interface_adapters::protocol::{self, ClientCommand};

/// Drives `endpoint` through one practice match. Returns once the session
/// ends, whether by win, loss, quit, timeout, or disconnect.
pub async fn run(name: String, endpoint: Arc<Endpoint>, config: &Config) {
    tracing::info!(player = %name, "practice session started");

    let mut player_board = Board::new();
    let mut opponent_board = Board::new();
    opponent_board.place_all_randomly();

    let _ = endpoint.send_game("PLACE_SHIPS").await;
    if run_placement(&endpoint, &mut player_board).await.is_none() {
        return;
    }

    let _ = endpoint.send_game("ALL_SHIPS_PLACED").await;
    run_play(&name, &endpoint, &mut player_board, &mut opponent_board, config).await;
}

/// Drives ship placement; returns `None` on quit or disconnect.
async fn run_placement(endpoint: &Endpoint, board: &mut Board) -> Option<()> {
    while !board.placement_complete() {
        let ship_name = board.next_expected_ship().expect("placement not yet complete");
        let ship_len = domain::SHIP_CATALOG
            .into_iter()
            .find(|(name, _)| *name == ship_name)
            .map(|(_, len)| len)
            .expect("catalog name is authoritative");

        let _ = endpoint
            .send_game(&format!("Placing your {ship_name} (size {ship_len})."))
            .await;

        let text = endpoint.recv_game().await.ok()?;
        match protocol::parse_command(&text) {
            Ok(ClientCommand::Place {
                coord,
                orientation,
                ship_name: requested,
            }) => {
                if !requested.eq_ignore_ascii_case(ship_name) {
                    let _ = endpoint
                        .send_game(&format!("ERROR expected {ship_name}, got {requested}"))
                        .await;
                    continue;
                }
                match board.place_ship(ship_name, coord, orientation, ship_len) {
                    Ok(()) => { let _ = endpoint.send_game("PLACED").await; }
                    Err(err) => { let _ = endpoint.send_game(&format!("ERROR {err}")).await; }
                }
            }
            Ok(ClientCommand::Quit) => {
                let _ = endpoint.send_game("BYE").await;
                return None;
            }
            Ok(_) => {
                let _ = endpoint.send_game("ERROR expected a PLACE command").await;
            }
            Err(err) => {
                let _ = endpoint.send_game(&format!("ERROR {err}")).await;
            }
        }
    }
    Some(())
}

async fn run_play(
    name: &str,
    endpoint: &Endpoint,
    player_board: &mut Board,
    opponent_board: &mut Board,
    config: &Config,
) {
    let mut moves = 0u32;
    loop {
        let own_view = protocol::format_own_board(player_board);
        let grid_view = protocol::format_grid(opponent_board);
        let _ = endpoint.send_game(&own_view).await;
        let _ = endpoint.send_game(&grid_view).await;
        let _ = endpoint.send_game("READY").await;
        let _ = endpoint
            .send_game(&format!(
                "You have {} seconds to make your move.",
                config.turn_timeout.as_secs()
            ))
            .await;

        // Same per-turn clock as multiplayer play: a human playing practice
        // gets no more time to answer than one facing a live opponent.
        let text = tokio::select! {
            biased;
            received = endpoint.recv_game() => match received {
                Ok(text) => text,
                Err(_) => {
                    tracing::debug!(player = %name, "practice session ended: disconnected");
                    return;
                }
            },
            _ = tokio::time::sleep(config.turn_timeout) => {
                let _ = endpoint.send_game("TIMEOUT. You forfeited the game.").await;
                tracing::info!(player = %name, "practice session timed out");
                return;
            }
        };

        match protocol::parse_command(&text) {
            Ok(ClientCommand::Quit) => {
                let _ = endpoint.send_game("BYE").await;
                return;
            }
            Ok(ClientCommand::Fire(coord)) => {
                let result = opponent_board.fire(coord);
                if result.outcome == domain::FireOutcome::AlreadyShot {
                    let _ = endpoint.send_game("RESULT ALREADY_SHOT").await;
                    continue;
                }
                moves += 1;
                let _ = endpoint
                    .send_game(&protocol::format_fire_result(result.outcome, result.ship_name.as_deref()))
                    .await;

                if opponent_board.all_sunk() {
                    let _ = endpoint.send_game(&format!("WIN {moves}")).await;
                    tracing::info!(player = %name, moves, "practice session won");
                    return;
                }
            }
            Ok(_) => {
                let _ = endpoint.send_game("ERROR expected FIRE <coord> or quit").await;
                continue;
            }
            Err(err) => {
                let _ = endpoint.send_game(&format!("ERROR {err}")).await;
                continue;
            }
        }

        // Computer's turn: fires once against an unvisited cell and reports
        // it with the same RESULT vocabulary used for the human's shots.
        let Some(coord) = player_board.random_unfired_cell() else {
            // Every cell has been fired upon without a full sink — cannot
            // happen once ships are fully placed, but guards against a stuck
            // loop if it somehow does.
            let _ = endpoint.send_game("LOSE").await;
            return;
        };
        let result = player_board.fire(coord);
        let _ = endpoint.send_game(&format!("OPPONENT_FIRE {coord}")).await;
        let _ = endpoint
            .send_game(&protocol::format_fire_result(result.outcome, result.ship_name.as_deref()))
            .await;

        if player_board.all_sunk() {
            let _ = endpoint.send_game("LOSE").await;
            tracing::info!(player = %name, "practice session lost");
            return;
        }
    }
}
