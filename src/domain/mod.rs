// Domain layer: board geometry, ship catalog and fire-resolution rules.

pub mod board;

pub use board::{
    Board, Coord, CoordError, FireOutcome, FireResult, Orientation, PlaceError, PlacedShip,
    BOARD_SIZE, SHIP_CATALOG,
};
