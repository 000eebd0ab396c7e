//! Client-side synchronizer for one match: a local mirror of the stored row,
//! kept fresh by a fixed-interval poll and by the results of this client's
//! own writes. The mirror is always a cache; the store decides every race.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Mutex};

use crate::lobby::{self, JoinError};
use crate::rules::{self, MoveRejection};
use crate::store::{MatchStore, StoreError, UpdateGuard};
use crate::types::{Match, MatchId, MatchPhase, PlayerId, SeatSymbol};

/// How often the background poller re-reads the match.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Errors surfaced by session operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// A previous local write (or a refresh) has not resolved yet. The
    /// intent is dropped, never queued.
    #[error("another request for this match is still in flight")]
    WriteInFlight,

    #[error(transparent)]
    Rejected(#[from] MoveRejection),

    /// The stored row moved on before this write landed. The mirror is left
    /// untouched; the next poll reconciles it.
    #[error("the stored match changed before the write landed")]
    ConditionFailed,

    #[error("you are not seated in this match")]
    NotSeated,

    /// The match id does not exist; the caller should abandon the session.
    #[error("match not found")]
    NotFound,

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for SessionError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::ConditionFailed => SessionError::ConditionFailed,
            StoreError::NotFound => SessionError::NotFound,
            other => SessionError::Store(other),
        }
    }
}

/// Mirror of exactly one match for one player.
///
/// All mutation intents and the periodic refresh funnel through a single
/// write gate, so this client never races itself. It can still race the
/// opponent's client; those races are settled by the store's conditional
/// updates, not here.
pub struct MatchSession {
    store: Arc<dyn MatchStore>,
    player: PlayerId,
    match_id: MatchId,
    mirror: watch::Sender<Match>,
    write_gate: Mutex<()>,
}

impl MatchSession {
    /// Load the match and start mirroring it. `NotFound` means the caller
    /// should give up on this id and return to the lobby.
    pub async fn open(
        store: Arc<dyn MatchStore>,
        match_id: &str,
        player: PlayerId,
    ) -> Result<Self, SessionError> {
        let row = store.get_match(match_id).await?;
        Ok(Self::adopt(store, row, player))
    }

    /// Mirror a row a write already returned. The join path must seed its
    /// session this way: a follow-up plain read could still observe stale
    /// seat data.
    pub fn adopt(store: Arc<dyn MatchStore>, row: Match, player: PlayerId) -> Self {
        let match_id = row.id.clone();
        let (mirror, _) = watch::channel(row);
        Self {
            store,
            player,
            match_id,
            mirror,
            write_gate: Mutex::new(()),
        }
    }

    pub fn match_id(&self) -> &str {
        &self.match_id
    }

    /// Current mirror contents.
    pub fn snapshot(&self) -> Match {
        self.mirror.borrow().clone()
    }

    /// Which seat this player holds, according to the mirror.
    pub fn seat(&self) -> Option<SeatSymbol> {
        self.mirror.borrow().seat_of(&self.player)
    }

    /// Watch the mirror. Receivers are only woken when the row actually
    /// changed; dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> watch::Receiver<Match> {
        self.mirror.subscribe()
    }

    /// Re-read the match and adopt the result.
    ///
    /// A no-op while a write is in flight, and the gate is held for the
    /// duration of the read so no write can interleave with it. Read
    /// failures are logged and swallowed; the next poll tries again. An
    /// unchanged row does not wake watchers.
    pub async fn refresh(&self) {
        let Ok(_gate) = self.write_gate.try_lock() else {
            return;
        };
        match self.store.get_match(&self.match_id).await {
            Ok(row) => self.reconcile(row),
            Err(err) => {
                tracing::warn!("refresh of match {} failed: {}", self.match_id, err);
            }
        }
    }

    /// Try to place this player's symbol at `cell` (0..9, row-major).
    ///
    /// The store write is conditioned on turn and board still matching the
    /// mirror snapshot, so a stale mirror loses with [`SessionError::ConditionFailed`]
    /// instead of clobbering a move it has not seen. On success the returned
    /// row becomes the mirror; on any failure the mirror is untouched and
    /// nothing is retried.
    pub async fn attempt_move(&self, cell: usize) -> Result<Match, SessionError> {
        let Ok(_gate) = self.write_gate.try_lock() else {
            return Err(SessionError::WriteInFlight);
        };

        let snapshot = self.snapshot();
        let seat = snapshot
            .seat_of(&self.player)
            .ok_or(SessionError::NotSeated)?;
        rules::validate_move(&snapshot, seat, cell)?;

        let patch = rules::apply_move(&snapshot, seat, cell);
        let guard = UpdateGuard::BoardUnchanged {
            current_turn: snapshot.current_turn,
            board: snapshot.board,
        };
        let updated = self
            .store
            .update_match(&self.match_id, guard, patch)
            .await?;
        self.reconcile(updated.clone());
        Ok(updated)
    }

    /// Claim the open O seat from inside the session (the board-screen join
    /// button). Same arbitration as [`crate::lobby::Lobby::join_match`], but
    /// gated like any other local write, and the mirror adopts the returned
    /// row directly.
    pub async fn join(&self) -> Result<Match, JoinError> {
        let Ok(_gate) = self.write_gate.try_lock() else {
            return Err(JoinError::WriteInFlight);
        };

        let snapshot = self.snapshot();
        lobby::check_joinable(&snapshot, &self.player)?;
        let updated = lobby::claim_open_seat(self.store.as_ref(), &self.match_id, &self.player).await?;
        self.reconcile(updated.clone());
        Ok(updated)
    }

    /// Replace the mirror wholesale, waking watchers only on a real change.
    fn reconcile(&self, row: Match) {
        self.mirror.send_if_modified(|current| {
            if *current == row {
                false
            } else {
                *current = row;
                true
            }
        });
    }
}

/// Handle for the background poller. Dropping it aborts the polling task, so
/// teardown happens on every exit path of the owning view.
pub struct PollerHandle {
    task: tokio::task::JoinHandle<()>,
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn the fixed-interval refresh loop for a session. Refreshing is
/// skipped, not cancelled, once the match is finished; nothing else needs
/// the cadence, so the cheap sleep loop stays.
pub fn spawn_poller(session: Arc<MatchSession>, interval: Duration) -> PollerHandle {
    let task = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;

            if session.snapshot().phase == MatchPhase::Finished {
                continue;
            }
            session.refresh().await;
        }
    });
    PollerHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{
        MatchPatch, MemoryStore, StoreResult, UpdateGuard,
    };
    use crate::types::{
        LeaderboardEntry, MatchSummary, NewMatch, Profile,
    };
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::sync::Notify;

    /// Store wrapper whose `update_match` parks until released, and which
    /// counts point reads. Lets tests observe the session mid-write.
    struct StallingStore {
        inner: MemoryStore,
        entered_update: AtomicBool,
        release_update: Notify,
        reads: AtomicUsize,
    }

    impl StallingStore {
        fn new() -> Self {
            Self {
                inner: MemoryStore::new(),
                entered_update: AtomicBool::new(false),
                release_update: Notify::new(),
                reads: AtomicUsize::new(0),
            }
        }

        /// The wrapped store, for test setup that should bypass stalling.
        fn inner(&self) -> &dyn MatchStore {
            &self.inner
        }
    }

    #[async_trait]
    impl MatchStore for StallingStore {
        async fn get_match(&self, id: &str) -> StoreResult<Match> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            self.inner.get_match(id).await
        }

        async fn insert_match(&self, new: NewMatch) -> StoreResult<Match> {
            self.inner.insert_match(new).await
        }

        async fn update_match(
            &self,
            id: &str,
            guard: UpdateGuard,
            patch: MatchPatch,
        ) -> StoreResult<Match> {
            self.entered_update.store(true, Ordering::SeqCst);
            self.release_update.notified().await;
            self.inner.update_match(id, guard, patch).await
        }

        async fn list_waiting(&self, excluding: &str) -> StoreResult<Vec<MatchSummary>> {
            self.inner.list_waiting(excluding).await
        }

        async fn create_profile(&self, username: &str) -> StoreResult<Profile> {
            self.inner.create_profile(username).await
        }

        async fn get_profile(&self, id: &str) -> StoreResult<Profile> {
            self.inner.get_profile(id).await
        }

        async fn leaderboard(&self, limit: usize) -> StoreResult<Vec<LeaderboardEntry>> {
            self.inner.leaderboard(limit).await
        }
    }

    async fn active_match_on(store: &dyn MatchStore) -> Match {
        let row = store
            .insert_match(NewMatch {
                name: "test".to_string(),
                player_x: "alice".to_string(),
            })
            .await
            .unwrap();
        store
            .update_match(
                &row.id,
                UpdateGuard::SeatOpen,
                MatchPatch::Join {
                    player_o: "bob".to_string(),
                },
            )
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn refresh_is_a_no_op_while_a_write_is_in_flight() {
        let store = Arc::new(StallingStore::new());
        let row = active_match_on(store.inner()).await;

        let session = Arc::new(MatchSession::adopt(
            store.clone() as Arc<dyn MatchStore>,
            row,
            "alice".to_string(),
        ));

        let mover = session.clone();
        let pending = tokio::spawn(async move { mover.attempt_move(0).await });

        // Wait until the write is parked inside the store.
        while !store.entered_update.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }

        let reads_before = store.reads.load(Ordering::SeqCst);
        let board_before = session.snapshot().board;
        session.refresh().await;
        assert_eq!(
            store.reads.load(Ordering::SeqCst),
            reads_before,
            "refresh must not read while a write is in flight"
        );
        assert_eq!(session.snapshot().board, board_before);

        // A second move intent is dropped, not queued.
        assert!(matches!(
            session.attempt_move(4).await,
            Err(SessionError::WriteInFlight)
        ));

        store.release_update.notify_one();
        let moved = pending.await.unwrap().unwrap();
        assert_eq!(moved.board[0], Some(SeatSymbol::X));
        assert_eq!(session.snapshot(), moved);
    }

    #[tokio::test]
    async fn identical_remote_row_does_not_wake_watchers() {
        let store = Arc::new(MemoryStore::new());
        let row = active_match_on(store.as_ref()).await;
        let session =
            MatchSession::adopt(store.clone() as Arc<dyn MatchStore>, row.clone(), "alice".to_string());

        let mut watcher = session.subscribe();
        watcher.borrow_and_update();

        session.refresh().await;
        assert!(
            !watcher.has_changed().unwrap(),
            "an unchanged row must not notify"
        );

        // A real remote change does notify.
        store
            .update_match(
                &row.id,
                UpdateGuard::BoardUnchanged {
                    current_turn: row.current_turn,
                    board: row.board,
                },
                MatchPatch::Move {
                    board: {
                        let mut b = row.board;
                        b[0] = Some(SeatSymbol::X);
                        b
                    },
                    current_turn: SeatSymbol::O,
                    phase: MatchPhase::Active,
                    winner: None,
                    winner_symbol: None,
                },
            )
            .await
            .unwrap();
        session.refresh().await;
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().board[0], Some(SeatSymbol::X));
    }

    #[tokio::test]
    async fn stale_mirror_loses_with_condition_failed() {
        let store = Arc::new(MemoryStore::new());
        let row = active_match_on(store.as_ref()).await;

        // The same player in two windows: both mirrors start identical.
        let first = MatchSession::adopt(
            store.clone() as Arc<dyn MatchStore>,
            row.clone(),
            "alice".to_string(),
        );
        let second = MatchSession::adopt(
            store.clone() as Arc<dyn MatchStore>,
            row,
            "alice".to_string(),
        );

        first.attempt_move(0).await.unwrap();

        // The second window's mirror never saw that move; its conditioned
        // write must lose rather than overwrite the board.
        let stale = second.attempt_move(4).await;
        assert!(matches!(stale, Err(SessionError::ConditionFailed)));
        assert_eq!(second.snapshot().board, crate::types::EMPTY_BOARD);

        // The poll path reconciles the stale mirror.
        second.refresh().await;
        assert_eq!(second.snapshot().board[0], Some(SeatSymbol::X));
    }

    #[tokio::test]
    async fn local_rejections_never_touch_the_store() {
        let store = Arc::new(StallingStore::new());
        let row = active_match_on(store.inner()).await;
        let session = MatchSession::adopt(
            store.clone() as Arc<dyn MatchStore>,
            row,
            "bob".to_string(),
        );

        // Bob holds O and it is X's turn: rejected before any store call,
        // so the stalling update is never entered.
        assert!(matches!(
            session.attempt_move(0).await,
            Err(SessionError::Rejected(MoveRejection::NotYourTurn))
        ));
        assert!(!store.entered_update.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn open_surfaces_not_found() {
        let store = Arc::new(MemoryStore::new());
        let missing = MatchSession::open(
            store as Arc<dyn MatchStore>,
            "no-such-match",
            "alice".to_string(),
        )
        .await;
        assert!(matches!(missing, Err(SessionError::NotFound)));
    }

    #[tokio::test]
    async fn poller_stops_when_the_handle_drops() {
        let store = Arc::new(StallingStore::new());
        let row = active_match_on(store.inner()).await;
        let session = Arc::new(MatchSession::adopt(
            store.clone() as Arc<dyn MatchStore>,
            row,
            "alice".to_string(),
        ));

        let handle = spawn_poller(session, Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(35)).await;
        let polled = store.reads.load(Ordering::SeqCst);
        assert!(polled > 0, "poller should have refreshed at least once");

        drop(handle);
        tokio::time::sleep(Duration::from_millis(35)).await;
        assert_eq!(
            store.reads.load(Ordering::SeqCst),
            polled,
            "no refresh may run after teardown"
        );
    }
}
