use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{MatchPatch, MatchStore, StoreError, StoreResult, UpdateGuard};
use crate::types::{
    LeaderboardEntry, Match, MatchId, MatchPhase, MatchSummary, NewMatch, PlayerId, Profile,
    SeatSymbol, EMPTY_BOARD,
};

/// Per-player running totals behind the leaderboard.
#[derive(Debug, Clone, Copy, Default)]
struct Standing {
    wins: u32,
    losses: u32,
    draws: u32,
    total_games: u32,
}

/// In-process store. Guard evaluation and patch application happen under a
/// single write lock, so a conditional update is one indivisible step no
/// matter how many clients race it.
#[derive(Default)]
pub struct MemoryStore {
    matches: RwLock<HashMap<MatchId, Match>>,
    profiles: RwLock<HashMap<PlayerId, Profile>>,
    standings: RwLock<HashMap<PlayerId, Standing>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a finished match into the standings. Called exactly once per
    /// match: a `Finished` row refuses all further updates.
    async fn record_result(&self, row: &Match) {
        let Some(player_o) = row.player_o.clone() else {
            return;
        };
        let mut standings = self.standings.write().await;
        match &row.winner {
            Some(winner) => {
                let loser = if *winner == row.player_x {
                    player_o
                } else {
                    row.player_x.clone()
                };
                let won = standings.entry(winner.clone()).or_default();
                won.wins += 1;
                won.total_games += 1;
                let lost = standings.entry(loser).or_default();
                lost.losses += 1;
                lost.total_games += 1;
            }
            None => {
                for player in [row.player_x.clone(), player_o] {
                    let drew = standings.entry(player).or_default();
                    drew.draws += 1;
                    drew.total_games += 1;
                }
            }
        }
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get_match(&self, id: &str) -> StoreResult<Match> {
        self.matches
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn insert_match(&self, new: NewMatch) -> StoreResult<Match> {
        let row = Match {
            id: ulid::Ulid::new().to_string(),
            name: new.name,
            player_x: new.player_x,
            player_o: None,
            current_turn: SeatSymbol::X,
            board: EMPTY_BOARD,
            phase: MatchPhase::Waiting,
            winner: None,
            winner_symbol: None,
            version: 1,
            created_at: chrono::Utc::now(),
        };
        self.matches
            .write()
            .await
            .insert(row.id.clone(), row.clone());
        tracing::debug!("inserted match {} ({})", row.id, row.name);
        Ok(row)
    }

    async fn update_match(
        &self,
        id: &str,
        guard: UpdateGuard,
        patch: MatchPatch,
    ) -> StoreResult<Match> {
        let updated = {
            let mut matches = self.matches.write().await;
            let row = matches.get_mut(id).ok_or(StoreError::NotFound)?;

            // Finished rows are immutable.
            if row.phase == MatchPhase::Finished {
                return Err(StoreError::ConditionFailed);
            }

            let holds = match &guard {
                UpdateGuard::SeatOpen => row.player_o.is_none(),
                UpdateGuard::BoardUnchanged {
                    current_turn,
                    board,
                } => row.current_turn == *current_turn && row.board == *board,
            };
            if !holds {
                return Err(StoreError::ConditionFailed);
            }

            match patch {
                MatchPatch::Join { player_o } => {
                    row.player_o = Some(player_o);
                    row.phase = MatchPhase::Active;
                }
                MatchPatch::Move {
                    board,
                    current_turn,
                    phase,
                    winner,
                    winner_symbol,
                } => {
                    row.board = board;
                    row.current_turn = current_turn;
                    row.phase = phase;
                    row.winner = winner;
                    row.winner_symbol = winner_symbol;
                }
            }
            row.version += 1;
            row.clone()
        };

        if updated.phase == MatchPhase::Finished {
            self.record_result(&updated).await;
        }
        Ok(updated)
    }

    async fn list_waiting(&self, excluding: &str) -> StoreResult<Vec<MatchSummary>> {
        let matches = self.matches.read().await;
        let mut open: Vec<MatchSummary> = matches
            .values()
            .filter(|m| {
                m.phase == MatchPhase::Waiting && m.player_o.is_none() && m.player_x != excluding
            })
            .map(|m| MatchSummary {
                id: m.id.clone(),
                name: m.name.clone(),
                player_x: m.player_x.clone(),
                created_at: m.created_at,
            })
            .collect();
        open.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(open)
    }

    async fn create_profile(&self, username: &str) -> StoreResult<Profile> {
        let profile = Profile {
            id: ulid::Ulid::new().to_string(),
            username: username.trim().to_string(),
        };
        self.profiles
            .write()
            .await
            .insert(profile.id.clone(), profile.clone());
        Ok(profile)
    }

    async fn get_profile(&self, id: &str) -> StoreResult<Profile> {
        self.profiles
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
        let standings = self.standings.read().await;
        let profiles = self.profiles.read().await;
        let mut entries: Vec<LeaderboardEntry> = standings
            .iter()
            .map(|(player, standing)| LeaderboardEntry {
                user_id: player.clone(),
                username: profiles
                    .get(player)
                    .map(|p| p.username.clone())
                    .unwrap_or_else(|| player.clone()),
                wins: standing.wins,
                losses: standing.losses,
                draws: standing.draws,
                total_games: standing.total_games,
            })
            .collect();
        entries.sort_by(|a, b| b.wins.cmp(&a.wins).then(a.username.cmp(&b.username)));
        entries.truncate(limit);
        Ok(entries)
    }
}
