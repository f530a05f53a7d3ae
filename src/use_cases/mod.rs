// Use cases layer: application workflows for the Battleship server.

pub mod lobby;
pub mod match_state;
pub mod match_supervisor;
pub mod practice;
pub mod registry;
