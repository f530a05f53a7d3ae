// Board geometry, ship catalog, placement and fire resolution.

use std::fmt;

use rand::Rng;

pub const BOARD_SIZE: usize = 10;

/// Ship catalog in placement order: (name, length).
pub const SHIP_CATALOG: [(&str, usize); 5] = [
    ("Carrier", 5),
    ("Battleship", 4),
    ("Cruiser", 3),
    ("Submarine", 3),
    ("Destroyer", 2),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    Horizontal,
    Vertical,
}

impl Orientation {
    pub fn parse(token: &str) -> Option<Self> {
        match token.to_ascii_uppercase().as_str() {
            "H" => Some(Orientation::Horizontal),
            "V" => Some(Orientation::Vertical),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub row: usize,
    pub col: usize,
}

impl Coord {
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// Parses protocol coordinates like "B5" or "J10" into zero-based (row, col).
    pub fn parse(token: &str) -> Result<Self, CoordError> {
        let token = token.trim();
        if token.len() < 2 {
            return Err(CoordError::TooShort);
        }
        let mut chars = token.chars();
        let row_letter = chars.next().expect("len checked above");
        let col_digits: String = chars.collect();

        if !row_letter.is_ascii_alphabetic() || !col_digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(CoordError::BadFormat);
        }

        let row = (row_letter.to_ascii_uppercase() as u8 - b'A') as usize;
        let col: usize = col_digits
            .parse::<usize>()
            .map_err(|_| CoordError::BadFormat)?;
        if col == 0 {
            return Err(CoordError::OutOfBounds);
        }
        let col = col - 1;

        if row >= BOARD_SIZE || col >= BOARD_SIZE {
            return Err(CoordError::OutOfBounds);
        }

        Ok(Coord { row, col })
    }
}

impl fmt::Display for Coord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let row_letter = (b'A' + self.row as u8) as char;
        write!(f, "{row_letter}{}", self.col + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordError {
    TooShort,
    BadFormat,
    OutOfBounds,
}

impl fmt::Display for CoordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoordError::TooShort => write!(f, "coordinate too short"),
            CoordError::BadFormat => write!(f, "invalid coordinate format"),
            CoordError::OutOfBounds => write!(f, "coordinate out of bounds"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Ship,
    Hit,
    Miss,
}

#[derive(Debug, Clone)]
pub struct PlacedShip {
    pub name: String,
    pub cells: Vec<Coord>,
    pub remaining: Vec<Coord>,
}

impl PlacedShip {
    fn is_sunk(&self) -> bool {
        self.remaining.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceError {
    OutOfBounds,
    Overlap,
}

impl fmt::Display for PlaceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceError::OutOfBounds => write!(f, "placement out of bounds"),
            PlaceError::Overlap => write!(f, "placement overlaps an existing ship"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Hit,
    HitSunk,
    Miss,
    AlreadyShot,
}

#[derive(Debug, Clone)]
pub struct FireResult {
    pub outcome: FireOutcome,
    pub ship_name: Option<String>,
}

/// One player's 10x10 grid: ship placements plus hit/miss bookkeeping.
///
/// `grid` holds the ground truth (used for the own-board view); `shots_against`
/// tracks only hit/miss markers so the opponent view never reveals ship cells.
#[derive(Debug, Clone)]
pub struct Board {
    grid: [[Cell; BOARD_SIZE]; BOARD_SIZE],
    pub ships: Vec<PlacedShip>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            grid: [[Cell::Empty; BOARD_SIZE]; BOARD_SIZE],
            ships: Vec::new(),
        }
    }

    fn cells_for(
        &self,
        start: Coord,
        orientation: Orientation,
        length: usize,
    ) -> Result<Vec<Coord>, PlaceError> {
        let mut cells = Vec::with_capacity(length);
        for i in 0..length {
            let (row, col) = match orientation {
                Orientation::Horizontal => (start.row, start.col + i),
                Orientation::Vertical => (start.row + i, start.col),
            };
            if row >= BOARD_SIZE || col >= BOARD_SIZE {
                return Err(PlaceError::OutOfBounds);
            }
            cells.push(Coord::new(row, col));
        }
        Ok(cells)
    }

    /// Validates and places a ship. Placement is atomic: either every cell is
    /// claimed or none is.
    pub fn place_ship(
        &mut self,
        name: &str,
        start: Coord,
        orientation: Orientation,
        length: usize,
    ) -> Result<(), PlaceError> {
        let cells = self.cells_for(start, orientation, length)?;
        if cells
            .iter()
            .any(|c| self.grid[c.row][c.col] != Cell::Empty)
        {
            return Err(PlaceError::Overlap);
        }

        for c in &cells {
            self.grid[c.row][c.col] = Cell::Ship;
        }

        self.ships.push(PlacedShip {
            name: name.to_string(),
            cells: cells.clone(),
            remaining: cells,
        });
        Ok(())
    }

    pub fn placement_complete(&self) -> bool {
        self.ships.len() == SHIP_CATALOG.len()
    }

    /// The ship name the next PLACE command is expected to target, if any remain.
    pub fn next_expected_ship(&self) -> Option<&'static str> {
        SHIP_CATALOG.get(self.ships.len()).map(|(name, _)| *name)
    }

    pub fn fire(&mut self, at: Coord) -> FireResult {
        match self.grid[at.row][at.col] {
            Cell::Hit | Cell::Miss => FireResult {
                outcome: FireOutcome::AlreadyShot,
                ship_name: None,
            },
            Cell::Empty => {
                self.grid[at.row][at.col] = Cell::Miss;
                FireResult {
                    outcome: FireOutcome::Miss,
                    ship_name: None,
                }
            }
            Cell::Ship => {
                self.grid[at.row][at.col] = Cell::Hit;
                let ship = self
                    .ships
                    .iter_mut()
                    .find(|s| s.cells.contains(&at))
                    .expect("ship cell must belong to a placed ship");
                ship.remaining.retain(|&c| c != at);
                if ship.is_sunk() {
                    FireResult {
                        outcome: FireOutcome::HitSunk,
                        ship_name: Some(ship.name.clone()),
                    }
                } else {
                    FireResult {
                        outcome: FireOutcome::Hit,
                        ship_name: None,
                    }
                }
            }
        }
    }

    pub fn all_sunk(&self) -> bool {
        self.placement_complete() && self.ships.iter().all(|s| s.is_sunk())
    }

    /// Places the full catalog at uniformly random positions and orientations,
    /// retrying each ship until it lands without overlap. Used for the
    /// practice opponent's board, which is never placed interactively.
    pub fn place_all_randomly(&mut self) {
        let mut rng = rand::thread_rng();
        for (name, length) in SHIP_CATALOG {
            loop {
                let orientation = if rng.gen_bool(0.5) {
                    Orientation::Horizontal
                } else {
                    Orientation::Vertical
                };
                let (max_row, max_col) = match orientation {
                    Orientation::Horizontal => (BOARD_SIZE - 1, BOARD_SIZE - length),
                    Orientation::Vertical => (BOARD_SIZE - length, BOARD_SIZE - 1),
                };
                let start = Coord::new(rng.gen_range(0..=max_row), rng.gen_range(0..=max_col));
                if self.place_ship(name, start, orientation, length).is_ok() {
                    break;
                }
            }
        }
    }

    /// Picks uniformly among cells this board has not yet been fired upon.
    /// Used by the practice opponent, which has no network round-trip to
    /// wait on and simply needs a legal next shot.
    pub fn random_unfired_cell(&self) -> Option<Coord> {
        let candidates: Vec<Coord> = (0..BOARD_SIZE)
            .flat_map(|row| (0..BOARD_SIZE).map(move |col| Coord::new(row, col)))
            .filter(|c| !matches!(self.grid[c.row][c.col], Cell::Hit | Cell::Miss))
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let index = rand::thread_rng().gen_range(0..candidates.len());
        Some(candidates[index])
    }

    pub fn hits_taken(&self) -> usize {
        self.ships
            .iter()
            .map(|s| s.cells.len() - s.remaining.len())
            .sum()
    }

    /// Renders the own-board view: ships, hits and misses all visible.
    pub fn render_own(&self) -> String {
        self.render(true)
    }

    /// Renders the opponent view: only hit/miss markers, ships hidden.
    pub fn render_opponent(&self) -> String {
        self.render(false)
    }

    fn render(&self, reveal_ships: bool) -> String {
        let mut out = String::new();
        out.push_str("  ");
        for col in 1..=BOARD_SIZE {
            out.push_str(&format!("{col:>3}"));
        }
        out.push('\n');

        for row in 0..BOARD_SIZE {
            let row_letter = (b'A' + row as u8) as char;
            out.push_str(&format!("{row_letter} "));
            for col in 0..BOARD_SIZE {
                let symbol = match self.grid[row][col] {
                    Cell::Hit => 'X',
                    Cell::Miss => 'o',
                    Cell::Ship if reveal_ships => 'S',
                    _ => '.',
                };
                out.push_str(&format!("{symbol:>3}"));
            }
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One ship per row keeps every length (up to 5) well within a 10-wide
    // board; packing all five onto a single row would need 21 columns.
    fn place_all(board: &mut Board) {
        for (row, (name, len)) in SHIP_CATALOG.into_iter().enumerate() {
            board
                .place_ship(name, Coord::new(row, 0), Orientation::Horizontal, len)
                .unwrap();
        }
    }

    #[test]
    fn parses_coordinates() {
        assert_eq!(Coord::parse("A1").unwrap(), Coord::new(0, 0));
        assert_eq!(Coord::parse("c10").unwrap(), Coord::new(2, 9));
        assert!(Coord::parse("Z9").is_err());
        assert!(Coord::parse("A").is_err());
        assert!(Coord::parse("11").is_err());
    }

    #[test]
    fn placement_is_atomic_on_overlap() {
        let mut board = Board::new();
        board
            .place_ship("Destroyer", Coord::new(0, 0), Orientation::Horizontal, 2)
            .unwrap();
        let err = board
            .place_ship("Submarine", Coord::new(0, 1), Orientation::Vertical, 3)
            .unwrap_err();
        assert_eq!(err, PlaceError::Overlap);
        // Only the destroyer's two cells should be occupied.
        assert_eq!(board.ships.len(), 1);
    }

    #[test]
    fn total_occupied_cells_equals_seventeen_once_fully_placed() {
        let mut board = Board::new();
        place_all(&mut board);
        let occupied: usize = board.ships.iter().map(|s| s.cells.len()).sum();
        assert_eq!(occupied, 17);
        assert!(board.placement_complete());
    }

    #[test]
    fn fire_resolution_hit_sunk_miss_already_shot() {
        let mut board = Board::new();
        board
            .place_ship("Destroyer", Coord::new(0, 0), Orientation::Horizontal, 2)
            .unwrap();

        let miss = board.fire(Coord::new(5, 5));
        assert_eq!(miss.outcome, FireOutcome::Miss);

        let hit = board.fire(Coord::new(0, 0));
        assert_eq!(hit.outcome, FireOutcome::Hit);

        let sunk = board.fire(Coord::new(0, 1));
        assert_eq!(sunk.outcome, FireOutcome::HitSunk);
        assert_eq!(sunk.ship_name.as_deref(), Some("Destroyer"));

        let already = board.fire(Coord::new(0, 0));
        assert_eq!(already.outcome, FireOutcome::AlreadyShot);
    }

    #[test]
    fn all_sunk_requires_full_placement_and_every_ship_destroyed() {
        let mut board = Board::new();
        assert!(!board.all_sunk());
        place_all(&mut board);
        assert!(!board.all_sunk());

        for (row, (_, len)) in SHIP_CATALOG.into_iter().enumerate() {
            for col in 0..len {
                board.fire(Coord::new(row, col));
            }
        }
        assert!(board.all_sunk());
    }

    #[test]
    fn opponent_view_never_reveals_ship_cells() {
        let mut board = Board::new();
        place_all(&mut board);
        let view = board.render_opponent();
        assert!(!view.contains('S'));
    }

    #[test]
    fn random_placement_always_completes_with_no_overlap() {
        for _ in 0..20 {
            let mut board = Board::new();
            board.place_all_randomly();
            assert!(board.placement_complete());
            let occupied: usize = board.ships.iter().map(|s| s.cells.len()).sum();
            assert_eq!(occupied, 17);
        }
    }

    #[test]
    fn random_unfired_cell_excludes_already_fired_cells() {
        let mut board = Board::new();
        place_all(&mut board);
        let only_remaining = Coord::new(BOARD_SIZE - 1, BOARD_SIZE - 1);
        for row in 0..BOARD_SIZE {
            for col in 0..BOARD_SIZE {
                let coord = Coord::new(row, col);
                if coord != only_remaining {
                    board.fire(coord);
                }
            }
        }
        assert_eq!(board.random_unfired_cell(), Some(only_remaining));
        board.fire(only_remaining);
        assert_eq!(board.random_unfired_cell(), None);
    }
}
