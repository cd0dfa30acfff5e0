//! Coordinator behaviour against the in-memory store, including writers racing on one game.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use codenames_sync::{
    config::{AppConfig, ConsistencyMode},
    dao::{
        game_store::{
            GameStore, GameStream, Revision, Versioned, WriteCondition, memory::MemoryGameStore,
        },
        models::{
            Board, CardColor, CardResult, GameDocument, GameHistoryEntry, GameStatus,
            GameSummaryEntity, GuessRecord, Phase, PlayerId, Role, Team, WinReason,
        },
        patch::Patch,
        storage::{StorageError, StorageResult},
    },
    error::ServiceError,
    services::sync_coordinator::{SyncCoordinator, SyncPolicy},
    state::{board::BoardGenerator, state_machine::Round},
};
use futures::{StreamExt, future::BoxFuture};
use serde_json::json;
use tokio::sync::Barrier;

/// Red starts: slots 0-8 red, 9-16 blue, 17-23 neutral, 24 assassin.
fn fixed_board() -> Board {
    let mut color_map = vec![CardColor::Red; 9];
    color_map.extend(vec![CardColor::Blue; 8]);
    color_map.extend(vec![CardColor::Neutral; 7]);
    color_map.push(CardColor::Assassin);
    Board {
        words: (0..25).map(|i| format!("WORD{i}")).collect(),
        color_map,
    }
}

fn boards() -> Arc<BoardGenerator> {
    Arc::new(BoardGenerator::new(AppConfig::default().vocabulary().clone()).unwrap())
}

fn coordinator(store: Arc<dyn GameStore>, mode: ConsistencyMode) -> SyncCoordinator {
    SyncCoordinator::new(
        store,
        SyncPolicy {
            mode,
            max_attempts: 5,
        },
        boards(),
    )
}

struct Table {
    code: String,
    red_spy: PlayerId,
    red_ops: [PlayerId; 2],
    blue_spy: PlayerId,
    blue_op: PlayerId,
}

/// Seat five players, start, then swap the random deal for [`fixed_board`] with red starting.
async fn started_table(store: &Arc<dyn GameStore>, sync: &SyncCoordinator) -> Table {
    let created = sync.create_game("Ada").await.unwrap();
    let code = created.code.clone();
    let red_spy = created.player_id;
    let red_op = sync.join_game(&code, None, "Bob").await.unwrap().value;
    let red_op2 = sync.join_game(&code, None, "Bea").await.unwrap().value;
    let blue_spy = sync.join_game(&code, None, "Cy").await.unwrap().value;
    let blue_op = sync.join_game(&code, None, "Di").await.unwrap().value;
    for (id, team, role) in [
        (red_spy, Team::Red, Role::Spymaster),
        (red_op, Team::Red, Role::Operative),
        (red_op2, Team::Red, Role::Operative),
        (blue_spy, Team::Blue, Role::Spymaster),
        (blue_op, Team::Blue, Role::Operative),
    ] {
        sync.assign_team(&code, id, team, role).await.unwrap();
    }
    sync.start_game(&code, red_spy).await.unwrap();

    let Versioned { document, .. } = store.load_game(code.clone()).await.unwrap().unwrap();
    let mut rigged = document.clone();
    rigged.starting_team = Some(Team::Red);
    Round::deal(fixed_board(), Team::Red).store_into(&mut rigged);
    let patch = Patch::diff(&document, &rigged).unwrap();
    store
        .update_game(code.clone(), patch, WriteCondition::None)
        .await
        .unwrap();

    Table {
        code,
        red_spy,
        red_ops: [red_op, red_op2],
        blue_spy,
        blue_op,
    }
}

#[tokio::test]
async fn red_reveals_all_nine_cards_across_rounds_and_wins() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);
    let table = started_table(&store, &sync).await;
    let code = table.code.as_str();
    let red_op = table.red_ops[0];

    // Red: clue for 3 grants 4 guesses, all correct.
    sync.give_clue(code, table.red_spy, "ocean", 3.0).await.unwrap();
    for index in 0..3 {
        let doc = sync.reveal_card(code, red_op, index).await.unwrap().document;
        let state = doc.game_state.unwrap();
        assert_eq!(state.phase, Phase::Guess);
        assert_eq!(state.current_turn, Team::Red);
    }
    let doc = sync.reveal_card(code, red_op, 3).await.unwrap().document;
    let state = doc.game_state.unwrap();
    assert_eq!(state.current_turn, Team::Blue);
    assert_eq!(state.phase, Phase::Clue);
    assert_eq!(state.guesses_remaining, 0);

    // Blue passes straight away.
    sync.give_clue(code, table.blue_spy, "river", 1.0).await.unwrap();
    sync.end_guessing(code, table.blue_op).await.unwrap();

    // Red: clue for 2 grants 3 guesses.
    sync.give_clue(code, table.red_spy, "forest", 2.0).await.unwrap();
    for index in 4..7 {
        sync.reveal_card(code, red_op, index).await.unwrap();
    }

    sync.give_clue(code, table.blue_spy, "desert", 1.0).await.unwrap();
    sync.end_guessing(code, table.blue_op).await.unwrap();

    // Red: unlimited clue, last two cards.
    sync.give_clue(code, table.red_spy, "planet", 0.0).await.unwrap();
    sync.reveal_card(code, red_op, 7).await.unwrap();
    let finished = sync.reveal_card(code, red_op, 8).await.unwrap().document;

    assert_eq!(finished.status, GameStatus::Finished);
    assert!(finished.finished_at.is_some());
    let state = finished.game_state.as_ref().unwrap();
    assert_eq!(state.winner, Some(Team::Red));
    assert_eq!(state.win_reason, Some(WinReason::AllRevealed));
    assert_eq!(state.red_revealed, 9);
    assert_eq!(finished.clue_log.len(), 5);
    assert_eq!(
        finished.clue_log[1].guesses,
        vec![GuessRecord::Passed { passed: true }]
    );

    // The stored document agrees with what the writer decided.
    let stored = sync.snapshot(code).await.unwrap();
    assert_eq!(stored.game_state, finished.game_state);
    assert_eq!(stored.clue_log, finished.clue_log);
    assert_eq!(stored.status, GameStatus::Finished);

    let err = sync.reveal_card(code, red_op, 20).await.unwrap_err();
    assert!(matches!(err, ServiceError::GameAlreadyFinished { .. }));

    let history = sync.list_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    let record = &history[0];
    assert_eq!(record.game_id, code);
    assert_eq!(record.winner, Team::Red);
    assert_eq!(record.win_reason, WinReason::AllRevealed);
    assert_eq!(record.created_by, "Ada");
    assert_eq!(record.players.len(), 5);
    assert_eq!(record.players[&table.blue_spy].role, Some(Role::Spymaster));
    assert_eq!(Some(record.finished_at), finished.finished_at);
}

#[tokio::test]
async fn assassin_hands_the_win_to_the_other_team() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);
    let table = started_table(&store, &sync).await;

    sync.give_clue(&table.code, table.red_spy, "ocean", 9.0)
        .await
        .unwrap();
    let committed = sync
        .reveal_card(&table.code, table.red_ops[0], 24)
        .await
        .unwrap();

    let state = committed.document.game_state.unwrap();
    assert_eq!(state.winner, Some(Team::Blue));
    assert_eq!(state.win_reason, Some(WinReason::Assassin));
    assert_eq!(committed.document.status, GameStatus::Finished);

    let rematch = sync.rematch(&table.code).await.unwrap().document;
    assert_eq!(rematch.status, GameStatus::Playing);
    assert!(rematch.clue_log.is_empty());
    assert_eq!(rematch.game_state.unwrap().winner, None);
    assert_eq!(rematch.players.len(), 5);

    // The record of the first game survives the rematch.
    let history = sync.list_history(10).await.unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].winner, Team::Blue);
    assert_eq!(history[0].win_reason, WinReason::Assassin);
}

#[tokio::test]
async fn history_lists_latest_finish_first() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);

    let mut codes = Vec::new();
    for _ in 0..3 {
        let table = started_table(&store, &sync).await;
        sync.give_clue(&table.code, table.red_spy, "ocean", 1.0)
            .await
            .unwrap();
        sync.reveal_card(&table.code, table.red_ops[0], 24)
            .await
            .unwrap();
        codes.push(table.code);
        // Finish times are stored in milliseconds.
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    }

    let listed: Vec<String> = sync
        .list_history(2)
        .await
        .unwrap()
        .into_iter()
        .map(|record: GameHistoryEntry| record.game_id)
        .collect();
    assert_eq!(listed, vec![codes[2].clone(), codes[1].clone()]);
    assert_eq!(sync.list_history(10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn games_in_progress_leave_no_history() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);
    let table = started_table(&store, &sync).await;
    sync.give_clue(&table.code, table.red_spy, "ocean", 2.0)
        .await
        .unwrap();
    sync.reveal_card(&table.code, table.red_ops[0], 0)
        .await
        .unwrap();

    assert!(sync.list_history(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn short_reveal_flags_from_another_writer_are_reported_as_corrupt() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);
    let table = started_table(&store, &sync).await;
    sync.give_clue(&table.code, table.red_spy, "ocean", 2.0)
        .await
        .unwrap();

    let mut patch = Patch::new();
    patch.set("gameState/revealedCards", json!([false, false]));
    store
        .update_game(table.code.clone(), patch, WriteCondition::None)
        .await
        .unwrap();
    let before = store.load_game(table.code.clone()).await.unwrap().unwrap();

    for index in [1, 10] {
        let err = sync
            .reveal_card(&table.code, table.red_ops[0], index)
            .await
            .unwrap_err();
        assert!(
            matches!(err, ServiceError::Unavailable(StorageError::Corrupt { .. })),
            "unexpected {err:?}"
        );
        assert!(!err.is_retryable());
    }

    let after = store.load_game(table.code.clone()).await.unwrap().unwrap();
    assert_eq!(before.revision, after.revision);
}

#[tokio::test]
async fn revealing_a_revealed_card_changes_nothing() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::BestEffort);
    let table = started_table(&store, &sync).await;

    sync.give_clue(&table.code, table.red_spy, "ocean", 3.0)
        .await
        .unwrap();
    sync.reveal_card(&table.code, table.red_ops[0], 0)
        .await
        .unwrap();
    let before = store.load_game(table.code.clone()).await.unwrap().unwrap();

    let err = sync
        .reveal_card(&table.code, table.red_ops[1], 0)
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::CardAlreadyRevealed { index: 0 }));

    let after = store.load_game(table.code.clone()).await.unwrap().unwrap();
    assert_eq!(before.revision, after.revision);
    assert_eq!(before.document, after.document);
}

/// Holds the first `armed` loads until that many readers have the same snapshot.
struct LockstepStore {
    inner: Arc<dyn GameStore>,
    armed: Arc<AtomicUsize>,
    barrier: Arc<Barrier>,
}

impl LockstepStore {
    fn new(inner: Arc<dyn GameStore>) -> Self {
        Self {
            inner,
            armed: Arc::new(AtomicUsize::new(0)),
            barrier: Arc::new(Barrier::new(2)),
        }
    }

    fn arm(&self) {
        self.armed.store(2, Ordering::SeqCst);
    }
}

impl GameStore for LockstepStore {
    fn create_game(&self, document: GameDocument) -> BoxFuture<'static, StorageResult<Revision>> {
        self.inner.create_game(document)
    }

    fn load_game(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameDocument>>>> {
        let inner = self.inner.clone();
        let armed = self.armed.clone();
        let barrier = self.barrier.clone();
        Box::pin(async move {
            let snapshot = inner.load_game(code).await?;
            let hold = armed
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if hold {
                barrier.wait().await;
            }
            Ok(snapshot)
        })
    }

    fn update_game(
        &self,
        code: String,
        patch: Patch,
        condition: WriteCondition,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        self.inner.update_game(code, patch, condition)
    }

    fn watch_game(&self, code: String) -> GameStream {
        self.inner.watch_game(code)
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameSummaryEntity>>> {
        self.inner.list_games()
    }

    fn save_history(&self, entry: GameHistoryEntry) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_history(entry)
    }

    fn list_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameHistoryEntry>>> {
        self.inner.list_history(limit)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

async fn racing_table(mode: ConsistencyMode) -> (Arc<LockstepStore>, SyncCoordinator, Table) {
    let memory: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let lockstep = Arc::new(LockstepStore::new(memory.clone()));
    let sync = coordinator(lockstep.clone(), mode);
    let table = started_table(&memory, &sync).await;
    (lockstep, sync, table)
}

#[tokio::test]
async fn concurrent_reveals_of_one_card_yield_one_success_under_compare_and_swap() {
    let (lockstep, sync, table) = racing_table(ConsistencyMode::CompareAndSwap).await;
    sync.give_clue(&table.code, table.red_spy, "ocean", 3.0)
        .await
        .unwrap();

    lockstep.arm();
    let (first, second) = tokio::join!(
        sync.reveal_card(&table.code, table.red_ops[0], 5),
        sync.reveal_card(&table.code, table.red_ops[1], 5),
    );

    let results = [first, second];
    let successes = results.iter().filter(|result| result.is_ok()).count();
    let already = results
        .iter()
        .filter(|result| matches!(result, Err(ServiceError::CardAlreadyRevealed { index: 5 })))
        .count();
    assert_eq!((successes, already), (1, 1));

    let document = sync.snapshot(&table.code).await.unwrap();
    let state = document.game_state.unwrap();
    assert_eq!(state.red_revealed, 1);
    assert_eq!(state.guesses_remaining, 3);
    assert_eq!(document.clue_log[0].guesses.len(), 1);
}

#[tokio::test]
async fn best_effort_lets_both_racers_write_the_same_reveal() {
    let (lockstep, sync, table) = racing_table(ConsistencyMode::BestEffort).await;
    sync.give_clue(&table.code, table.red_spy, "ocean", 3.0)
        .await
        .unwrap();

    lockstep.arm();
    let (first, second) = tokio::join!(
        sync.reveal_card(&table.code, table.red_ops[0], 5),
        sync.reveal_card(&table.code, table.red_ops[1], 5),
    );
    assert!(first.is_ok());
    assert!(second.is_ok());

    // Both writers decided from the same snapshot, so per-path writes converge.
    let document = sync.snapshot(&table.code).await.unwrap();
    let state = document.game_state.unwrap();
    assert!(state.revealed_cards[5]);
    assert_eq!(state.red_revealed, 1);
    assert_eq!(document.clue_log[0].guesses.len(), 1);
}

#[tokio::test]
async fn best_effort_racers_on_different_cards_both_land_and_counters_drift() {
    let (lockstep, sync, table) = racing_table(ConsistencyMode::BestEffort).await;
    // A clue for 3 grants 4 guesses.
    sync.give_clue(&table.code, table.red_spy, "ocean", 3.0)
        .await
        .unwrap();

    lockstep.arm();
    let (first, second) = tokio::join!(
        sync.reveal_card(&table.code, table.red_ops[0], 1),
        sync.reveal_card(&table.code, table.red_ops[1], 2),
    );
    assert_eq!(first.unwrap().value.outcome.result, CardResult::Correct);
    assert_eq!(second.unwrap().value.outcome.result, CardResult::Correct);

    // Both flags land since they live on different paths. The counters and the guess log
    // were computed from the same snapshot, so the later write replaces the earlier one.
    let document = sync.snapshot(&table.code).await.unwrap();
    let state = document.game_state.unwrap();
    assert!(state.revealed_cards[1]);
    assert!(state.revealed_cards[2]);
    assert_eq!(state.revealed_cards.iter().filter(|shown| **shown).count(), 2);
    assert_eq!(state.red_revealed, 1);
    assert_eq!(state.guesses_remaining, 3);
    assert_eq!(state.phase, Phase::Guess);
    assert_eq!(document.clue_log[0].guesses.len(), 1);
}

#[tokio::test]
async fn compare_and_swap_stops_racers_from_overspending_guesses() {
    let (lockstep, sync, table) = racing_table(ConsistencyMode::CompareAndSwap).await;
    // One clue for 1 grants 2 guesses; spend one, then race for the last.
    sync.give_clue(&table.code, table.red_spy, "ocean", 1.0)
        .await
        .unwrap();
    sync.reveal_card(&table.code, table.red_ops[0], 0)
        .await
        .unwrap();

    lockstep.arm();
    let (first, second) = tokio::join!(
        sync.reveal_card(&table.code, table.red_ops[0], 1),
        sync.reveal_card(&table.code, table.red_ops[1], 2),
    );

    let results = [first, second];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(
        results
            .iter()
            .any(|r| matches!(r, Err(ServiceError::NotYourTurn { .. })))
    );

    let state = sync.snapshot(&table.code).await.unwrap().game_state.unwrap();
    assert_eq!(state.red_revealed, 2);
    assert_eq!(state.current_turn, Team::Blue);
    assert_eq!(state.phase, Phase::Clue);
}

/// Every conditional write loses.
struct AlwaysConflicting {
    inner: MemoryGameStore,
    writes: Arc<AtomicUsize>,
}

impl GameStore for AlwaysConflicting {
    fn create_game(&self, document: GameDocument) -> BoxFuture<'static, StorageResult<Revision>> {
        self.inner.create_game(document)
    }

    fn load_game(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameDocument>>>> {
        self.inner.load_game(code)
    }

    fn update_game(
        &self,
        code: String,
        _patch: Patch,
        _condition: WriteCondition,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move { Err(StorageError::Conflict { code }) })
    }

    fn watch_game(&self, code: String) -> GameStream {
        self.inner.watch_game(code)
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameSummaryEntity>>> {
        self.inner.list_games()
    }

    fn save_history(&self, entry: GameHistoryEntry) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.save_history(entry)
    }

    fn list_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameHistoryEntry>>> {
        self.inner.list_history(limit)
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.health_check()
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.try_reconnect()
    }
}

#[tokio::test]
async fn persistent_conflicts_end_in_retryable_contention() {
    let writes = Arc::new(AtomicUsize::new(0));
    let store = Arc::new(AlwaysConflicting {
        inner: MemoryGameStore::new(),
        writes: writes.clone(),
    });
    let sync = SyncCoordinator::new(
        store,
        SyncPolicy {
            mode: ConsistencyMode::CompareAndSwap,
            max_attempts: 3,
        },
        boards(),
    );
    let created = sync.create_game("Ada").await.unwrap();

    let err = sync
        .join_game(&created.code, None, "Bob")
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::WriteContention { attempts: 3, .. }));
    assert!(err.is_retryable());
    assert_eq!(writes.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn subscribers_see_every_writer() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let writer_a = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);
    let writer_b = coordinator(store.clone(), ConsistencyMode::BestEffort);
    let created = writer_a.create_game("Ada").await.unwrap();

    let mut updates = writer_a.subscribe(&created.code);
    let initial = updates.next().await.unwrap().unwrap();
    assert_eq!(initial.players.len(), 1);

    writer_b.join_game(&created.code, None, "Bob").await.unwrap();
    let next = updates.next().await.unwrap().unwrap();
    assert_eq!(next.players.len(), 2);

    writer_a
        .assign_team(&created.code, created.player_id, Team::Red, Role::Spymaster)
        .await
        .unwrap();
    let seated = updates.next().await.unwrap().unwrap();
    assert_eq!(
        seated.players[&created.player_id].role,
        Some(Role::Spymaster)
    );
}

#[tokio::test]
async fn reveal_reports_classification() {
    let store: Arc<dyn GameStore> = Arc::new(MemoryGameStore::new());
    let sync = coordinator(store.clone(), ConsistencyMode::CompareAndSwap);
    let table = started_table(&store, &sync).await;
    sync.give_clue(&table.code, table.red_spy, "ocean", 2.0)
        .await
        .unwrap();

    let committed = sync
        .reveal_card(&table.code, table.red_ops[0], 20)
        .await
        .unwrap();
    assert_eq!(committed.value.index, 20);
    assert_eq!(committed.value.outcome.result, CardResult::Neutral);
    assert_eq!(committed.value.outcome.color, CardColor::Neutral);
    let state = committed.document.game_state.unwrap();
    assert_eq!(state.current_turn, Team::Blue);
}
