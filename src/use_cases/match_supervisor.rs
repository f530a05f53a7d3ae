//! Match Supervisor: drives one match's state machine from placement through
//! play to termination, including the disconnect/reconnect window and the
//! requeue back into the Lobby. The hardest single component in this
//! codebase, since it's the only one juggling two independent connections,
//! a shared turn clock, and a reconnect window all at once.

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crate::domain::{self, FireOutcome};
use crate::frameworks::config::Config;
use crate::interface_adapters::endpoint::{Endpoint, RecvError};
use crate::interface_adapters::protocol::{self, ClientCommand};
use crate::use_cases::lobby::Lobby;
use crate::use_cases::match_state::{MatchState, TerminationReason};
use crate::use_cases::registry::SessionRegistry;

/// Background watcher poll interval for reconnect-window expiry. Short
/// enough that a slot's window closes within a few hundred milliseconds of
/// its deadline rather than the watcher's next otherwise-idle wakeup.
const WATCHER_TICK: Duration = Duration::from_millis(400);

enum SlotRead {
    Text(String),
    Terminated(TerminationReason),
}

enum RaceEvent {
    Text(String),
    PeerGone,
    TimedOut,
    Terminated,
}

pub async fn run(
    match_state: Arc<MatchState>,
    lobby: Arc<Lobby>,
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
) {
    let name_a = match_state.players[0].name.clone();
    let name_b = match_state.players[1].name.clone();
    tracing::info!(a = %name_a, b = %name_b, "match started");

    send_to(&match_state, 0, "WELCOME PLAYER 1").await;
    send_to(&match_state, 1, "WELCOME PLAYER 2").await;
    send_to(&match_state, 0, "PLACE_SHIPS").await;
    send_to(&match_state, 1, "PLACE_SHIPS").await;

    let watcher = tokio::spawn(reconnect_watcher(match_state.clone(), config.clone()));

    tokio::join!(
        placement_for(&match_state, 0, &config),
        placement_for(&match_state, 1, &config),
    );

    if !match_state.is_terminated().await {
        run_play(&match_state, &registry, &config).await;
    }

    watcher.abort();
    finalize(&match_state, &lobby, &registry).await;
}

async fn send_to(match_state: &MatchState, slot: usize, text: &str) {
    let endpoint = match_state.players[slot].current_endpoint().await;
    let _ = endpoint.send_game(text).await;
}

/// One cancellable attempt at reading a slot's next GAME payload: races the
/// match's terminate signal, the per-turn deadline (when given), and the
/// endpoint's own recv against each other.
async fn race_once(match_state: &MatchState, endpoint: &Endpoint, deadline: Option<Duration>) -> RaceEvent {
    tokio::select! {
        biased;
        _ = match_state.terminate_notify.notified() => RaceEvent::Terminated,
        result = endpoint.recv_game() => match result {
            Ok(text) => RaceEvent::Text(text),
            Err(RecvError::Cancelled) => RaceEvent::Terminated,
            Err(RecvError::PeerGone) => RaceEvent::PeerGone,
        },
        _ = tokio::time::sleep(deadline.unwrap_or_default()), if deadline.is_some() => RaceEvent::TimedOut,
    }
}

/// Reads the next GAME payload for `slot`, transparently riding out a
/// disconnect: marks the slot, waits for either a rebind or the match's
/// termination, then retries against whichever endpoint is now bound.
async fn recv_with_reconnect(
    match_state: &MatchState,
    slot: usize,
    deadline: Option<Duration>,
    config: &Config,
) -> SlotRead {
    loop {
        let endpoint = match_state.players[slot].current_endpoint().await;
        match race_once(match_state, &endpoint, deadline).await {
            RaceEvent::Text(text) => return SlotRead::Text(text),
            RaceEvent::Terminated => {
                let reason = match_state
                    .termination_reason()
                    .await
                    .unwrap_or(TerminationReason::BothDisconnected);
                return SlotRead::Terminated(reason);
            }
            RaceEvent::TimedOut => {
                let winner = MatchState::other(slot);
                match_state.terminate(TerminationReason::Forfeit { winner }).await;
                send_to(match_state, slot, "TIMEOUT. You forfeited the game.").await;
                send_to(match_state, winner, "OPPONENT_TIMEOUT. You win!").await;
                return SlotRead::Terminated(TerminationReason::Forfeit { winner });
            }
            RaceEvent::PeerGone => {
                mark_disconnected(match_state, slot, config).await;

                // Register interest before rechecking, per `Notify`'s
                // documented guarantee: a `notified()` call made before a
                // `notify_waiters()` call is never missed, even unpolled.
                let rebind = match_state.players[slot].rebind_notify.notified();
                let terminate = match_state.terminate_notify.notified();
                if match_state.players[slot].connected.load(Ordering::Acquire) {
                    continue; // a reconnect already won the race
                }
                tokio::select! {
                    biased;
                    _ = terminate => {
                        let reason = match_state
                            .termination_reason()
                            .await
                            .unwrap_or(TerminationReason::BothDisconnected);
                        return SlotRead::Terminated(reason);
                    }
                    _ = rebind => {}
                }
            }
        }
    }
}

async fn mark_disconnected(match_state: &MatchState, slot: usize, config: &Config) {
    let was_connected = match_state.players[slot]
        .connected
        .swap(false, Ordering::AcqRel);
    if !was_connected {
        return;
    }
    *match_state.players[slot].disconnected_at.lock().await = Some(Instant::now());
    tracing::info!(player = %match_state.players[slot].name, "player disconnected, opening reconnect window");

    let other = MatchState::other(slot);
    send_to(
        match_state,
        other,
        &format!(
            "INFO: Opponent disconnected. Waiting up to {} seconds...",
            config.reconnect_window.as_secs()
        ),
    )
    .await;
}

/// Polls both slots' disconnect timestamps and terminates the match once a
/// reconnect window elapses, per slot, independently.
async fn reconnect_watcher(match_state: Arc<MatchState>, config: Arc<Config>) {
    let mut interval = tokio::time::interval(WATCHER_TICK);
    loop {
        interval.tick().await;
        if match_state.is_terminated().await {
            return;
        }
        for slot in 0..2 {
            let disconnected_at = *match_state.players[slot].disconnected_at.lock().await;
            let Some(since) = disconnected_at else { continue };
            if since.elapsed() < config.reconnect_window {
                continue;
            }

            let other = MatchState::other(slot);
            let other_connected = match_state.players[other].connected.load(Ordering::Acquire);
            if other_connected {
                match_state
                    .terminate(TerminationReason::Forfeit { winner: other })
                    .await;
                send_to(&match_state, other, "OPPONENT_TIMEOUT. You win!").await;
            } else {
                match_state.terminate(TerminationReason::BothDisconnected).await;
            }
            return;
        }
    }
}

async fn placement_for(match_state: &MatchState, slot: usize, config: &Config) {
    loop {
        if match_state.is_terminated().await {
            return;
        }
        let complete = match_state.players[slot].board.lock().await.placement_complete();
        if complete {
            break;
        }

        let ship_name = match_state.players[slot]
            .board
            .lock()
            .await
            .next_expected_ship()
            .expect("placement not yet complete");
        let ship_len = domain::SHIP_CATALOG
            .into_iter()
            .find(|(name, _)| *name == ship_name)
            .map(|(_, len)| len)
            .expect("catalog name is authoritative");

        send_to(
            match_state,
            slot,
            &format!("Placing your {ship_name} (size {ship_len})."),
        )
        .await;

        let SlotRead::Text(text) = recv_with_reconnect(match_state, slot, None, config).await else {
            return;
        };

        match protocol::parse_command(&text) {
            Ok(ClientCommand::Place {
                coord,
                orientation,
                ship_name: requested,
            }) => {
                if !requested.eq_ignore_ascii_case(ship_name) {
                    send_to(
                        match_state,
                        slot,
                        &format!("ERROR expected {ship_name}, got {requested}"),
                    )
                    .await;
                    continue;
                }
                let outcome = {
                    let mut board = match_state.players[slot].board.lock().await;
                    board.place_ship(ship_name, coord, orientation, ship_len)
                };
                match outcome {
                    Ok(()) => send_to(match_state, slot, "PLACED").await,
                    Err(err) => send_to(match_state, slot, &format!("ERROR {err}")).await,
                }
            }
            Ok(ClientCommand::Quit) => {
                let winner = MatchState::other(slot);
                match_state
                    .terminate(TerminationReason::VoluntaryQuit { winner })
                    .await;
                send_to(match_state, slot, "BYE").await;
                send_to(match_state, winner, "OPPONENT_QUIT").await;
                return;
            }
            Ok(_) => send_to(match_state, slot, "ERROR expected a PLACE command").await,
            Err(err) => send_to(match_state, slot, &format!("ERROR {err}")).await,
        }
    }

    let placed = match_state.placed_count.fetch_add(1, Ordering::AcqRel) + 1;
    if placed < 2 {
        send_to(match_state, slot, "WAITING_FOR_OPPONENT_TO_FINISH_PLACING_SHIPS").await;
        let notified = match_state.both_placed.notified();
        let terminated = match_state.terminate_notify.notified();
        tokio::select! {
            biased;
            _ = terminated => {}
            _ = notified => {}
        }
    } else {
        match_state.both_placed.notify_waiters();
    }

    if !match_state.is_terminated().await {
        send_to(match_state, slot, "ALL_SHIPS_PLACED").await;
    }
}

async fn run_play(match_state: &MatchState, registry: &SessionRegistry, config: &Config) {
    loop {
        if match_state.is_terminated().await {
            return;
        }

        let active = match_state.turn.load(Ordering::Acquire);
        let opponent = MatchState::other(active);

        let (own_view, grid_view) = {
            let active_board = match_state.players[active].board.lock().await;
            let opp_board = match_state.players[opponent].board.lock().await;
            (
                protocol::format_own_board(&active_board),
                protocol::format_grid(&opp_board),
            )
        };
        send_to(match_state, active, &own_view).await;
        send_to(match_state, active, &grid_view).await;
        send_to(match_state, active, "READY").await;
        send_to(match_state, opponent, "WAITING").await;
        send_to(
            match_state,
            active,
            &format!(
                "You have {} seconds to make your move.",
                config.turn_timeout.as_secs()
            ),
        )
        .await;

        let SlotRead::Text(text) =
            recv_with_reconnect(match_state, active, Some(config.turn_timeout), config).await
        else {
            return;
        };

        match protocol::parse_command(&text) {
            Ok(ClientCommand::Quit) => {
                match_state
                    .terminate(TerminationReason::VoluntaryQuit { winner: opponent })
                    .await;
                send_to(match_state, active, "BYE").await;
                send_to(match_state, opponent, "OPPONENT_QUIT").await;
                return;
            }
            Ok(ClientCommand::Fire(coord)) => {
                let result = {
                    let mut opp_board = match_state.players[opponent].board.lock().await;
                    opp_board.fire(coord)
                };

                if result.outcome == FireOutcome::AlreadyShot {
                    send_to(match_state, active, "RESULT ALREADY_SHOT").await;
                    continue;
                }

                match_state.moves.fetch_add(1, Ordering::AcqRel);
                send_to(
                    match_state,
                    active,
                    &protocol::format_fire_result(result.outcome, result.ship_name.as_deref()),
                )
                .await;
                let opponent_notice =
                    protocol::format_opponent_notice(result.outcome, result.ship_name.as_deref());
                if !opponent_notice.is_empty() {
                    send_to(match_state, opponent, &opponent_notice).await;
                }

                registry
                    .broadcast(
                        "SYSTEM",
                        &format!(
                            "{} fired at {coord} - {:?}",
                            match_state.players[active].name, result.outcome
                        ),
                    )
                    .await;

                let opponent_sunk = match_state.players[opponent].board.lock().await.all_sunk();
                if opponent_sunk {
                    let moves = match_state.moves.load(Ordering::Acquire);
                    match_state.terminate(TerminationReason::Win { winner: active }).await;
                    send_to(match_state, active, &format!("WIN {moves}")).await;
                    send_to(match_state, opponent, "LOSE").await;
                    return;
                }

                match_state.turn.store(opponent, Ordering::Release);
            }
            Ok(_) => {
                send_to(match_state, active, "ERROR expected FIRE <coord> or quit").await;
            }
            Err(err) => {
                send_to(match_state, active, &format!("ERROR {err}")).await;
            }
        }
    }
}

async fn finalize(match_state: &MatchState, lobby: &Lobby, registry: &SessionRegistry) {
    let name_a = match_state.players[0].name.clone();
    let name_b = match_state.players[1].name.clone();
    registry.detach_match(&name_a, &name_b).await;

    let reason = match_state.termination_reason().await;
    tracing::info!(a = %name_a, b = %name_b, ?reason, "match ended");

    match reason {
        Some(TerminationReason::Win { winner }) => {
            let loser = MatchState::other(winner);
            requeue_if_connected(match_state, lobby, winner, true).await;
            requeue_if_connected(match_state, lobby, loser, false).await;
        }
        Some(TerminationReason::Forfeit { winner }) | Some(TerminationReason::VoluntaryQuit { winner }) => {
            requeue_if_connected(match_state, lobby, winner, true).await;
        }
        Some(TerminationReason::BothDisconnected) | None => {}
    }
}

async fn requeue_if_connected(match_state: &MatchState, lobby: &Lobby, slot: usize, as_winner: bool) {
    if !match_state.players[slot].connected.load(Ordering::Acquire) {
        return;
    }
    let endpoint = match_state.players[slot].current_endpoint().await;
    if endpoint.is_closed() {
        return;
    }
    let name = match_state.players[slot].name.clone();
    if as_winner {
        lobby.enqueue_winner(name, endpoint).await;
    } else {
        lobby.enqueue_fresh(name, endpoint).await;
    }
}
