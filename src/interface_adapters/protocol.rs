//! GAME payload grammar: parses the client's textual command tokens and
//! renders the server's textual responses. Wire framing (seq/type/checksum)
//! lives in `codec`; this module only knows about the payload bytes.

use std::fmt;

use crate::domain::{Coord, Orientation};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// `USERNAME <name>` joins the Lobby; `USERNAME <name> SOLO` starts a
    /// practice session instead. Every connection sends a `USERNAME` packet
    /// as its first move regardless of mode, so riding the optional `SOLO`
    /// suffix on that packet picks the mode for free instead of spending a
    /// whole extra round-trip on a separate mode-select exchange.
    Username { name: String, solo: bool },
    Place {
        coord: Coord,
        orientation: Orientation,
        ship_name: String,
    },
    Fire(Coord),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand,
    BadCoordinate(String),
    BadOrientation,
    MissingUsername,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::UnknownCommand => write!(f, "unknown command"),
            CommandError::BadCoordinate(reason) => write!(f, "{reason}"),
            CommandError::BadOrientation => write!(f, "orientation must be H or V"),
            CommandError::MissingUsername => write!(f, "USERNAME requires a name"),
        }
    }
}

/// Parses one GAME payload line into a client command.
pub fn parse_command(text: &str) -> Result<ClientCommand, CommandError> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("quit") {
        return Ok(ClientCommand::Quit);
    }

    let mut parts = text.split_whitespace();
    let keyword = parts.next().unwrap_or("").to_ascii_uppercase();

    match keyword.as_str() {
        "USERNAME" => {
            let name = parts.next().ok_or(CommandError::MissingUsername)?;
            let solo = parts
                .next()
                .is_some_and(|tok| tok.eq_ignore_ascii_case("solo"));
            Ok(ClientCommand::Username {
                name: name.to_string(),
                solo,
            })
        }
        "PLACE" => {
            let coord_tok = parts.next().ok_or(CommandError::UnknownCommand)?;
            let orientation_tok = parts.next().ok_or(CommandError::UnknownCommand)?;
            let ship_tok = parts.next().ok_or(CommandError::UnknownCommand)?;

            let coord = Coord::parse(coord_tok).map_err(|e| CommandError::BadCoordinate(e.to_string()))?;
            let orientation =
                Orientation::parse(orientation_tok).ok_or(CommandError::BadOrientation)?;

            Ok(ClientCommand::Place {
                coord,
                orientation,
                ship_name: ship_tok.to_ascii_uppercase(),
            })
        }
        "FIRE" => {
            let coord_tok = parts.next().ok_or(CommandError::UnknownCommand)?;
            let coord =
                Coord::parse(coord_tok).map_err(|e| CommandError::BadCoordinate(e.to_string()))?;
            Ok(ClientCommand::Fire(coord))
        }
        _ => Err(CommandError::UnknownCommand),
    }
}

/// Strips a leading `chat ` prefix from a client-typed line, if present.
/// The caller uses this to decide whether a line should travel as a CHAT
/// frame instead of a GAME frame.
pub fn strip_chat_prefix(text: &str) -> Option<&str> {
    text.strip_prefix("chat ").or_else(|| text.strip_prefix("CHAT "))
}

pub fn format_fire_result(outcome: crate::domain::FireOutcome, ship_name: Option<&str>) -> String {
    use crate::domain::FireOutcome::*;
    match outcome {
        Hit => "RESULT HIT".to_string(),
        HitSunk => format!(
            "RESULT HIT SUNK {}",
            ship_name.unwrap_or_default().to_ascii_uppercase()
        ),
        Miss => "RESULT MISS".to_string(),
        AlreadyShot => "RESULT ALREADY_SHOT".to_string(),
    }
}

/// Renders the `OWN_BOARD` view packet body: header token, the board's own
/// rendering (ships, hits, misses), terminated by the render's trailing blank line.
pub fn format_own_board(board: &crate::domain::Board) -> String {
    format!("OWN_BOARD\n{}", board.render_own())
}

/// Renders the `GRID` view packet body: header token plus the opponent-facing
/// rendering (ships hidden).
pub fn format_grid(board: &crate::domain::Board) -> String {
    format!("GRID\n{}", board.render_opponent())
}

pub fn format_opponent_notice(outcome: crate::domain::FireOutcome, ship_name: Option<&str>) -> String {
    use crate::domain::FireOutcome::*;
    match outcome {
        Hit => "YOUR_SHIP_HIT".to_string(),
        HitSunk => format!(
            "YOUR_SHIP_SUNK {}",
            ship_name.unwrap_or_default().to_ascii_uppercase()
        ),
        Miss => "OPPONENT_MISS".to_string(),
        AlreadyShot => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Coord;

    #[test]
    fn parses_username() {
        assert_eq!(
            parse_command("USERNAME ada").unwrap(),
            ClientCommand::Username {
                name: "ada".to_string(),
                solo: false,
            }
        );
    }

    #[test]
    fn parses_solo_username() {
        assert_eq!(
            parse_command("USERNAME ada solo").unwrap(),
            ClientCommand::Username {
                name: "ada".to_string(),
                solo: true,
            }
        );
    }

    #[test]
    fn parses_place_case_insensitively() {
        let cmd = parse_command("place b5 h destroyer").unwrap();
        assert_eq!(
            cmd,
            ClientCommand::Place {
                coord: Coord::parse("B5").unwrap(),
                orientation: Orientation::Horizontal,
                ship_name: "DESTROYER".to_string(),
            }
        );
    }

    #[test]
    fn parses_fire() {
        assert_eq!(
            parse_command("FIRE C10").unwrap(),
            ClientCommand::Fire(Coord::parse("C10").unwrap())
        );
    }

    #[test]
    fn parses_quit_case_insensitively() {
        assert_eq!(parse_command("QUIT").unwrap(), ClientCommand::Quit);
        assert_eq!(parse_command("quit").unwrap(), ClientCommand::Quit);
    }

    #[test]
    fn rejects_bad_fire_coordinate() {
        assert!(matches!(
            parse_command("FIRE Z9"),
            Err(CommandError::BadCoordinate(_))
        ));
    }

    #[test]
    fn rejects_unknown_command() {
        assert_eq!(parse_command("DANCE"), Err(CommandError::UnknownCommand));
    }

    #[test]
    fn strips_chat_prefix() {
        assert_eq!(strip_chat_prefix("chat hello there"), Some("hello there"));
        assert_eq!(strip_chat_prefix("FIRE A1"), None);
    }
}
