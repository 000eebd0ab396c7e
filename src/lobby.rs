//! Creating and joining matches. The open O seat is handed out by a
//! compare-and-swap update at the store; nothing read beforehand decides the
//! race, local checks only save a doomed round trip.

use std::sync::Arc;

use crate::store::{MatchPatch, MatchStore, StoreError, StoreResult, UpdateGuard};
use crate::types::{LeaderboardEntry, Match, MatchSummary, NewMatch, PlayerId};

/// Why a join attempt did not get the seat
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// Someone else claimed the seat first. No mutation happened; the caller
    /// must not assume it joined.
    #[error("someone already took the open seat")]
    AlreadyJoined,

    #[error("you cannot join a match you created")]
    OwnMatch,

    #[error("match not found")]
    NotFound,

    #[error("another request for this match is still in flight")]
    WriteInFlight,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for JoinError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed => JoinError::AlreadyJoined,
            StoreError::NotFound => JoinError::NotFound,
            other => JoinError::Store(other),
        }
    }
}

/// Local refusals before the remote claim. Purely an optimization: the
/// seat-open guard at the store is what actually decides who joins.
pub(crate) fn check_joinable(row: &Match, player: &str) -> Result<(), JoinError> {
    if row.player_x == player {
        return Err(JoinError::OwnMatch);
    }
    if row.player_o.is_some() {
        return Err(JoinError::AlreadyJoined);
    }
    Ok(())
}

/// The arbitrated seat claim: a conditional update that succeeds for at most
/// one caller. The returned row is the post-claim state and must seed the
/// winner's mirror directly.
pub(crate) async fn claim_open_seat(
    store: &dyn MatchStore,
    match_id: &str,
    player: &str,
) -> Result<Match, JoinError> {
    let updated = store
        .update_match(
            match_id,
            UpdateGuard::SeatOpen,
            MatchPatch::Join {
                player_o: player.to_string(),
            },
        )
        .await?;
    tracing::info!("{} joined match {}", player, match_id);
    Ok(updated)
}

/// Caller-facing lobby operations for one signed-in player.
pub struct Lobby {
    store: Arc<dyn MatchStore>,
    player: PlayerId,
}

impl Lobby {
    pub fn new(store: Arc<dyn MatchStore>, player: PlayerId) -> Self {
        Self { store, player }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    /// Create a match and wait for an opponent. Store failures surface
    /// verbatim; there is no retry.
    pub async fn create_match(&self, name: &str) -> StoreResult<Match> {
        let row = self
            .store
            .insert_match(NewMatch {
                name: name.trim().to_string(),
                player_x: self.player.clone(),
            })
            .await?;
        tracing::info!("created match {} ({})", row.id, row.name);
        Ok(row)
    }

    /// Join an open match from the lobby list. On success the returned row
    /// is the post-claim state; seed the session from it, never from a
    /// follow-up read.
    pub async fn join_match(&self, match_id: &str) -> Result<Match, JoinError> {
        let row = self.store.get_match(match_id).await?;
        check_joinable(&row, &self.player)?;
        claim_open_seat(self.store.as_ref(), match_id, &self.player).await
    }

    /// Open matches other players are waiting on, newest first.
    pub async fn waiting_matches(&self) -> StoreResult<Vec<MatchSummary>> {
        self.store.list_waiting(&self.player).await
    }

    /// Top players by wins.
    pub async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        self.store.leaderboard(limit).await
    }
}
