use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque ID types for type safety
pub type MatchId = String;
pub type PlayerId = String;

/// One of the two seats in a match, identified by its symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SeatSymbol {
    X,
    O,
}

impl SeatSymbol {
    /// The other seat.
    pub fn opponent(self) -> Self {
        match self {
            SeatSymbol::X => SeatSymbol::O,
            SeatSymbol::O => SeatSymbol::X,
        }
    }
}

impl fmt::Display for SeatSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatSymbol::X => write!(f, "X"),
            SeatSymbol::O => write!(f, "O"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPhase {
    /// Created, O seat still open.
    Waiting,
    /// Both seats taken, moves being played.
    Active,
    /// Won or drawn. The row never changes again.
    Finished,
}

/// One cell of the board: empty, or claimed by a seat. A claimed cell never
/// clears.
pub type Cell = Option<SeatSymbol>;

/// Row-major 3x3 board, always exactly nine cells.
pub type Board = [Cell; 9];

pub const EMPTY_BOARD: Board = [None; 9];

/// One match row, as stored by the match store. The store copy is the
/// authority; everything a client holds is a cache of this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub id: MatchId,
    pub name: String,
    pub player_x: PlayerId,
    /// Empty until a join succeeds, then immutable.
    pub player_o: Option<PlayerId>,
    /// Which seat moves next. Only meaningful while `phase` is `Active`.
    pub current_turn: SeatSymbol,
    pub board: Board,
    pub phase: MatchPhase,
    /// Winning player, set on a decided finish; stays empty on a draw.
    pub winner: Option<PlayerId>,
    pub winner_symbol: Option<SeatSymbol>,
    /// Bumped by the store on every accepted update.
    pub version: u64,
    pub created_at: DateTime<Utc>,
}

impl Match {
    /// Which seat the given player holds, if any.
    pub fn seat_of(&self, player: &str) -> Option<SeatSymbol> {
        if self.player_x == player {
            Some(SeatSymbol::X)
        } else if self.player_o.as_deref() == Some(player) {
            Some(SeatSymbol::O)
        } else {
            None
        }
    }

    /// The player holding the given seat, if the seat is taken.
    pub fn player_for(&self, seat: SeatSymbol) -> Option<&PlayerId> {
        match seat {
            SeatSymbol::X => Some(&self.player_x),
            SeatSymbol::O => self.player_o.as_ref(),
        }
    }
}

/// Fields a caller supplies when creating a match; the store fills in the
/// rest (id, empty board, `Waiting` phase, timestamps).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMatch {
    pub name: String,
    pub player_x: PlayerId,
}

/// What the find-a-game list shows for one open match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchSummary {
    pub id: MatchId,
    pub name: String,
    pub player_x: PlayerId,
    pub created_at: DateTime<Utc>,
}

/// Display identity for a player. Authentication lives outside this crate;
/// profiles only give leaderboard rows a name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: PlayerId,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    pub user_id: PlayerId,
    pub username: String,
    pub wins: u32,
    pub losses: u32,
    pub draws: u32,
    pub total_games: u32,
}

impl LeaderboardEntry {
    /// Win percentage, rounded, 0 for players with no finished games.
    pub fn win_rate(&self) -> u32 {
        if self.total_games == 0 {
            return 0;
        }
        (self.wins * 100 + self.total_games / 2) / self.total_games
    }
}
