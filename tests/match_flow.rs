mod support;

use support::{filler_cells, place_all_ships, ship_cells, unique_name, TestClient};

/// Two players queue, place ships, and play to completion: the first player
/// to finish the Lobby queue sinks the full catalog and wins; the loser is
/// notified and the moves-to-win count is reported to the winner.
#[tokio::test]
async fn clean_two_player_match_ends_in_a_win() {
    let name_a = unique_name("alice");
    let name_b = unique_name("bob");

    let mut a = TestClient::connect().await;
    let mut b = TestClient::connect().await;

    a.send_game(&format!("USERNAME {name_a}")).await;
    assert_eq!(a.recv_game().await, "WELCOME");
    b.send_game(&format!("USERNAME {name_b}")).await;
    assert_eq!(b.recv_game().await, "WELCOME");

    place_all_ships(&mut a).await;
    place_all_ships(&mut b).await;
    a.recv_game_until("ALL_SHIPS_PLACED").await;
    b.recv_game_until("ALL_SHIPS_PLACED").await;

    let shots = ship_cells();
    let mut filler = filler_cells();

    for (index, coord) in shots.iter().enumerate() {
        a.recv_game_until("READY").await;
        a.send_game(&format!("FIRE {coord}")).await;
        let result = a.recv_game_until("RESULT").await;
        assert!(result.contains("HIT"), "expected a hit on {coord}, got {result}");

        if index + 1 == shots.len() {
            let win = a.recv_game_until("WIN").await;
            assert!(win.starts_with("WIN "), "expected WIN, got {win}");
            assert_eq!(b.recv_game_until("LOSE").await, "LOSE");
            return;
        }

        b.recv_game_until("READY").await;
        b.send_game(&format!("FIRE {}", filler.next().expect("enough filler shots"))).await;
        b.recv_game_until("RESULT").await;
    }
}

/// Firing twice at the same cell is reported as `ALREADY_SHOT` and does not
/// consume the turn or count as a move.
#[tokio::test]
async fn refiring_the_same_cell_does_not_advance_the_turn() {
    let name_a = unique_name("carol");
    let name_b = unique_name("dave");

    let mut a = TestClient::connect().await;
    let mut b = TestClient::connect().await;
    a.send_game(&format!("USERNAME {name_a}")).await;
    a.recv_game().await;
    b.send_game(&format!("USERNAME {name_b}")).await;
    b.recv_game().await;

    place_all_ships(&mut a).await;
    place_all_ships(&mut b).await;
    a.recv_game_until("ALL_SHIPS_PLACED").await;
    b.recv_game_until("ALL_SHIPS_PLACED").await;

    a.recv_game_until("READY").await;
    a.send_game("FIRE A1").await;
    assert!(a.recv_game_until("RESULT").await.contains("HIT"));

    // Same coordinate again: still A's turn, reported as ALREADY_SHOT.
    a.send_game("FIRE A1").await;
    assert_eq!(a.recv_game_until("RESULT").await, "RESULT ALREADY_SHOT");
}

/// An unrecognized FIRE coordinate is rejected without tearing down the
/// connection or consuming the turn.
#[tokio::test]
async fn invalid_fire_coordinate_is_rejected_without_ending_the_turn() {
    let name_a = unique_name("erin");
    let name_b = unique_name("frank");

    let mut a = TestClient::connect().await;
    let mut b = TestClient::connect().await;
    a.send_game(&format!("USERNAME {name_a}")).await;
    a.recv_game().await;
    b.send_game(&format!("USERNAME {name_b}")).await;
    b.recv_game().await;

    place_all_ships(&mut a).await;
    place_all_ships(&mut b).await;
    a.recv_game_until("ALL_SHIPS_PLACED").await;
    b.recv_game_until("ALL_SHIPS_PLACED").await;

    a.recv_game_until("READY").await;
    a.send_game("FIRE Z99").await;
    assert!(a.recv_game_until("ERROR").await.starts_with("ERROR"));

    // The turn is still A's: a legal shot now succeeds normally.
    a.send_game("FIRE A1").await;
    assert!(a.recv_game_until("RESULT").await.contains("HIT"));
}

/// Chat sent while queued in the Lobby reaches every connected player,
/// including ones not involved in the chat.
#[tokio::test]
async fn chat_is_broadcast_to_every_connected_player() {
    let name_a = unique_name("gina");
    let name_b = unique_name("hank");

    let mut a = TestClient::connect().await;
    let mut b = TestClient::connect().await;
    a.send_game(&format!("USERNAME {name_a}")).await;
    a.recv_game().await;
    b.send_game(&format!("USERNAME {name_b}")).await;
    b.recv_game().await;

    a.send_chat("hello from a").await;
    let heard = b.recv_chat().await;
    assert_eq!(heard, format!("{name_a}: hello from a"));
}
