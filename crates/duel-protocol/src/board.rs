//! Board occupancy and game outcome, derived from the move log.

use serde::{Deserialize, Serialize};

use crate::error::DuelProtocolError;
use crate::types::{Coordinates, Move, MoveType, BOARD_SIZE};

const N: usize = BOARD_SIZE as usize;

/// Every winning line, as `(x, y)` triples.
const LINES: [[(u8, u8); 3]; 8] = [
    // Rows
    [(0, 0), (1, 0), (2, 0)],
    [(0, 1), (1, 1), (2, 1)],
    [(0, 2), (1, 2), (2, 2)],
    // Columns
    [(0, 0), (0, 1), (0, 2)],
    [(1, 0), (1, 1), (1, 2)],
    [(2, 0), (2, 1), (2, 2)],
    // Diagonals
    [(0, 0), (1, 1), (2, 2)],
    [(2, 0), (1, 1), (0, 2)],
];

/// Result of a game as seen from the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Win(MoveType),
    Draw,
    Undecided,
}

/// Cell grid rebuilt from committed moves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Board {
    cells: [[Option<MoveType>; N]; N],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replay a move log. Moves that would overwrite a cell are skipped.
    pub fn from_moves(moves: &[Move]) -> Self {
        let mut board = Self::new();
        for m in moves {
            if let Err(e) = board.place(m.move_type, m.coordinates) {
                tracing::warn!("board replay skipped move {m:?}: {e}");
            }
        }
        board
    }

    pub fn get(&self, at: Coordinates) -> Option<MoveType> {
        if !at.is_on_board() {
            return None;
        }
        self.cells[at.x as usize][at.y as usize]
    }

    pub fn is_free(&self, at: Coordinates) -> bool {
        at.is_on_board() && self.get(at).is_none()
    }

    /// Occupy a cell. Never overwrites.
    pub fn place(&mut self, move_type: MoveType, at: Coordinates) -> Result<(), DuelProtocolError> {
        if !at.is_on_board() {
            return Err(DuelProtocolError::OffBoard { coordinates: at });
        }
        let cell = &mut self.cells[at.x as usize][at.y as usize];
        if cell.is_some() {
            return Err(DuelProtocolError::CellOccupied { coordinates: at });
        }
        *cell = Some(move_type);
        Ok(())
    }

    /// Free cells in row-major order.
    pub fn free_cells(&self) -> Vec<Coordinates> {
        let mut free = Vec::new();
        for y in 0..BOARD_SIZE {
            for x in 0..BOARD_SIZE {
                let at = Coordinates::new(x, y);
                if self.is_free(at) {
                    free.push(at);
                }
            }
        }
        free
    }

    pub fn winner(&self) -> Option<MoveType> {
        for line in LINES {
            let [a, b, c] = line.map(|(x, y)| self.get(Coordinates::new(x, y)));
            if a.is_some() && a == b && a == c {
                return a;
            }
        }
        None
    }

    pub fn outcome(&self) -> Outcome {
        match self.winner() {
            Some(winner) => Outcome::Win(winner),
            None if self.free_cells().is_empty() => Outcome::Draw,
            None => Outcome::Undecided,
        }
    }

    pub fn is_over(&self) -> bool {
        self.outcome() != Outcome::Undecided
    }

    /// Rows of `X`, `O` and `.` for logs and snapshots.
    pub fn render(&self) -> Vec<String> {
        (0..BOARD_SIZE)
            .map(|y| {
                (0..BOARD_SIZE)
                    .map(|x| {
                        self.get(Coordinates::new(x, y))
                            .map(MoveType::symbol)
                            .unwrap_or('.')
                    })
                    .collect::<String>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PeerId;

    fn mv(sender: &str, move_type: MoveType, x: u8, y: u8) -> Move {
        Move::new(PeerId::new(sender), move_type, Coordinates::new(x, y))
    }

    #[test]
    fn empty_board_is_undecided() {
        let board = Board::new();
        assert_eq!(board.outcome(), Outcome::Undecided);
        assert_eq!(board.free_cells().len(), 9);
    }

    #[test]
    fn place_refuses_occupied_and_off_board() {
        let mut board = Board::new();
        board.place(MoveType::First, Coordinates::new(1, 1)).unwrap();
        assert!(matches!(
            board.place(MoveType::Second, Coordinates::new(1, 1)),
            Err(DuelProtocolError::CellOccupied { .. })
        ));
        assert!(matches!(
            board.place(MoveType::Second, Coordinates::new(0, 5)),
            Err(DuelProtocolError::OffBoard { .. })
        ));
        assert_eq!(board.get(Coordinates::new(1, 1)), Some(MoveType::First));
    }

    #[test]
    fn column_win() {
        let board = Board::from_moves(&[
            mv("a", MoveType::First, 0, 0),
            mv("b", MoveType::Second, 1, 0),
            mv("a", MoveType::First, 0, 1),
            mv("b", MoveType::Second, 1, 1),
            mv("a", MoveType::First, 0, 2),
        ]);
        assert_eq!(board.outcome(), Outcome::Win(MoveType::First));
        assert!(board.is_over());
    }

    #[test]
    fn anti_diagonal_win() {
        let board = Board::from_moves(&[
            mv("b", MoveType::Second, 2, 0),
            mv("b", MoveType::Second, 1, 1),
            mv("b", MoveType::Second, 0, 2),
        ]);
        assert_eq!(board.winner(), Some(MoveType::Second));
    }

    #[test]
    fn full_board_without_line_is_draw() {
        // X O X
        // X O O
        // O X X
        let f = MoveType::First;
        let s = MoveType::Second;
        let board = Board::from_moves(&[
            mv("a", f, 0, 0),
            mv("b", s, 1, 0),
            mv("a", f, 2, 0),
            mv("b", s, 1, 1),
            mv("a", f, 0, 1),
            mv("b", s, 2, 1),
            mv("a", f, 1, 2),
            mv("b", s, 0, 2),
            mv("a", f, 2, 2),
        ]);
        assert_eq!(board.outcome(), Outcome::Draw);
        assert_eq!(board.render(), vec!["XOX", "XOO", "OXX"]);
    }

    #[test]
    fn replay_skips_double_occupancy() {
        let board = Board::from_moves(&[
            mv("a", MoveType::First, 2, 2),
            mv("b", MoveType::Second, 2, 2),
        ]);
        assert_eq!(board.get(Coordinates::new(2, 2)), Some(MoveType::First));
        assert_eq!(board.free_cells().len(), 8);
    }
}
