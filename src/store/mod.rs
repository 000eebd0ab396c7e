//! The match store: the single authority for shared state. Clients never
//! mutate a match locally without a store write backing it, and every racy
//! transition is decided by a conditional update evaluated store-side.

mod http;
mod memory;

pub use http::HttpStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{
    Board, LeaderboardEntry, Match, MatchPhase, MatchSummary, NewMatch, PlayerId, Profile,
    SeatSymbol,
};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can come back from a store call
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,

    /// The guard on a conditional update did not hold against the stored
    /// row. Expected under contention; never retried automatically.
    #[error("conditional update failed")]
    ConditionFailed,

    #[error("store request failed: {0}")]
    Transport(String),
}

/// Predicate a conditional update is gated on, evaluated against the
/// currently stored row atomically with the update itself. The check never
/// happens client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum UpdateGuard {
    /// The O seat is still open.
    SeatOpen,
    /// Turn and board still equal the caller's snapshot.
    BoardUnchanged {
        current_turn: SeatSymbol,
        board: Board,
    },
}

/// The fields one update replaces. Each variant changes as a single unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum MatchPatch {
    /// Claim the open O seat and activate the match.
    Join { player_o: PlayerId },
    /// One accepted move: board, turn and terminal fields together.
    Move {
        board: Board,
        current_turn: SeatSymbol,
        phase: MatchPhase,
        winner: Option<PlayerId>,
        winner_symbol: Option<SeatSymbol>,
    },
}

/// Body of a conditional update request, shared by the HTTP client and the
/// service handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub guard: UpdateGuard,
    pub patch: MatchPatch,
}

/// Body of a profile registration request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub username: String,
}

/// The remote store surface the client core is written against. One
/// implementation owns the rows in process ([`MemoryStore`]), one speaks to
/// the service over HTTP ([`HttpStore`]); the session and lobby code cannot
/// tell them apart.
#[async_trait]
pub trait MatchStore: Send + Sync {
    /// Point read of one match.
    async fn get_match(&self, id: &str) -> StoreResult<Match>;

    /// Insert a fresh `Waiting` match and return the created row.
    async fn insert_match(&self, new: NewMatch) -> StoreResult<Match>;

    /// Apply `patch` iff `guard` holds against the stored row at write time,
    /// returning the post-update row. `ConditionFailed` means the caller
    /// lost a race; the row is untouched.
    async fn update_match(
        &self,
        id: &str,
        guard: UpdateGuard,
        patch: MatchPatch,
    ) -> StoreResult<Match>;

    /// Open matches someone else created, newest first.
    async fn list_waiting(&self, excluding: &str) -> StoreResult<Vec<MatchSummary>>;

    /// Register a display identity.
    async fn create_profile(&self, username: &str) -> StoreResult<Profile>;

    async fn get_profile(&self, id: &str) -> StoreResult<Profile>;

    /// Top players by wins.
    async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<LeaderboardEntry>>;
}
