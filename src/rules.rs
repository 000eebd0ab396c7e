//! Pure move validation and outcome evaluation. No I/O here: these functions
//! compute candidate next states, the store decides whether they land.

use crate::store::MatchPatch;
use crate::types::{Board, Match, MatchPhase, SeatSymbol};

/// The eight winning triples: rows, then columns, then diagonals. Checked in
/// this order; the first complete triple decides.
pub const WIN_LINES: [[usize; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

/// Why a move intent was refused before touching the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejection {
    #[error("the match is not active")]
    NotActive,
    #[error("not your turn")]
    NotYourTurn,
    #[error("that cell is already taken")]
    CellOccupied,
    #[error("cell index {0} is outside the board")]
    OutOfRange(usize),
}

/// Check whether `seat` may place at `cell` given the current row.
pub fn validate_move(row: &Match, seat: SeatSymbol, cell: usize) -> Result<(), MoveRejection> {
    if row.phase != MatchPhase::Active {
        return Err(MoveRejection::NotActive);
    }
    if row.current_turn != seat {
        return Err(MoveRejection::NotYourTurn);
    }
    if cell >= row.board.len() {
        return Err(MoveRejection::OutOfRange(cell));
    }
    if row.board[cell].is_some() {
        return Err(MoveRejection::CellOccupied);
    }
    Ok(())
}

/// The winning symbol, if any line is complete.
pub fn evaluate_outcome(board: &Board) -> Option<SeatSymbol> {
    WIN_LINES.iter().find_map(|&[a, b, c]| match (board[a], board[b], board[c]) {
        (Some(s), Some(t), Some(u)) if s == t && t == u => Some(s),
        _ => None,
    })
}

/// A board is drawn when it is full and no line is complete.
pub fn is_draw(board: &Board) -> bool {
    board.iter().all(|cell| cell.is_some()) && evaluate_outcome(board).is_none()
}

/// Candidate next state for a validated move: the new board, the flipped
/// turn, and the terminal evaluation, as one unit. Callers must have run
/// [`validate_move`] first.
pub fn apply_move(row: &Match, seat: SeatSymbol, cell: usize) -> MatchPatch {
    let mut board = row.board;
    board[cell] = Some(seat);

    let winner_symbol = evaluate_outcome(&board);
    let finished = winner_symbol.is_some() || is_draw(&board);

    MatchPatch::Move {
        board,
        current_turn: seat.opponent(),
        phase: if finished {
            MatchPhase::Finished
        } else {
            MatchPhase::Active
        },
        winner: winner_symbol.and_then(|s| row.player_for(s).cloned()),
        winner_symbol,
    }
}
