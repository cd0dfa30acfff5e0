//! Read-decide-write coordination of every game operation against the shared document.
//!
//! Each writer loads a fresh snapshot, lets the pure rules in [`crate::state`] decide the next
//! document, diffs both into a minimal [`Patch`] and writes it. Several writers may run this loop
//! against the same game at the same time; the configured [`ConsistencyMode`] decides whether a
//! lost race is detected (compare-and-swap) or resolved per path (best effort).

use std::{sync::Arc, time::SystemTime};

use futures::{StreamExt, stream::BoxStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    config::{AppConfig, ConsistencyMode},
    dao::{
        game_store::{GameStore, Versioned, WriteCondition},
        models::{
            Board, GameDocument, GameHistoryEntry, GameStatus, GameSummaryEntity, Player, PlayerId,
            Role, Team,
        },
        patch::Patch,
        storage::StorageError,
    },
    error::ServiceError,
    state::{
        board::{BoardGenerator, random_starting_team},
        lobby::{
            can_start_game, generate_code, generate_display_name, spymaster_of,
            validate_player_name,
        },
        guess::{GuessOutcome, resolve_guess},
        state_machine::{Round, TurnEffect, TurnError, TurnEvent, apply},
    },
};

/// Fresh codes tried before giving up on creating a game.
const MAX_CODE_ATTEMPTS: u32 = 8;

/// Stream of documents delivered to a subscriber, one per committed write.
pub type DocumentStream = BoxStream<'static, Result<GameDocument, ServiceError>>;

/// How writes are guarded and how often a lost race is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncPolicy {
    /// Write guard.
    pub mode: ConsistencyMode,
    /// Read-decide-write cycles attempted per operation.
    pub max_attempts: u32,
}

impl SyncPolicy {
    /// Policy described by the runtime configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            mode: config.consistency(),
            max_attempts: config.max_write_attempts().max(1),
        }
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Result of a committed operation: what the rules decided plus the document that was written.
#[derive(Debug, Clone)]
pub struct Committed<T> {
    /// Operation-specific outcome.
    pub value: T,
    /// Document as decided by this writer. Other writers may already have moved on.
    pub document: GameDocument,
}

/// A freshly created game and its host.
#[derive(Debug, Clone)]
pub struct CreatedGame {
    /// Public game code.
    pub code: String,
    /// Player id handed to the host.
    pub player_id: PlayerId,
    /// Stored document.
    pub document: GameDocument,
}

/// A card turned over by a committed reveal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealedCard {
    /// Slot index.
    pub index: usize,
    /// Classification for the revealing team and the card's colour.
    pub outcome: GuessOutcome,
}

/// Applies game operations to the shared store. Cheap to clone.
#[derive(Clone)]
pub struct SyncCoordinator {
    store: Arc<dyn GameStore>,
    policy: SyncPolicy,
    boards: Arc<BoardGenerator>,
}

impl SyncCoordinator {
    /// Coordinator writing to `store` under `policy`.
    pub fn new(store: Arc<dyn GameStore>, policy: SyncPolicy, boards: Arc<BoardGenerator>) -> Self {
        Self {
            store,
            policy,
            boards,
        }
    }

    /// Write guard in use.
    pub fn policy(&self) -> SyncPolicy {
        self.policy
    }

    /// Create a game in setup with `host_name` as its only player.
    pub async fn create_game(&self, host_name: &str) -> Result<CreatedGame, ServiceError> {
        let host_name = validate_player_name(host_name)?;
        let mut last_code = String::new();

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let (code, display_name) = {
                let mut rng = rand::rng();
                (generate_code(&mut rng), generate_display_name(&mut rng))
            };
            let player_id = Uuid::new_v4();
            let host = Player::new(host_name.clone(), SystemTime::now());
            let document = GameDocument::new(code.clone(), display_name, player_id, host);

            match self.store.create_game(document.clone()).await {
                Ok(revision) => {
                    info!(code = %code, player = %player_id, revision = %revision, "game created");
                    return Ok(CreatedGame {
                        code,
                        player_id,
                        document,
                    });
                }
                Err(StorageError::AlreadyExists { code }) => {
                    warn!(code = %code, attempt, "game code already taken; drawing another");
                    last_code = code;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::WriteContention {
            code: last_code,
            attempts: MAX_CODE_ATTEMPTS,
        })
    }

    /// Join `code` as a new player, or come back as `player_id`.
    pub async fn join_game(
        &self,
        code: &str,
        player_id: Option<PlayerId>,
        name: &str,
    ) -> Result<Committed<PlayerId>, ServiceError> {
        let name = validate_player_name(name)?;
        let fresh_id = Uuid::new_v4();

        let committed = self
            .mutate(code, |document| {
                if document.status == GameStatus::Finished {
                    return Err(ServiceError::GameAlreadyFinished {
                        code: document.code.clone(),
                    });
                }

                if let Some(id) = player_id {
                    if let Some(player) = document.players.get_mut(&id) {
                        player.is_active = true;
                        player.name = name.clone();
                        return Ok(id);
                    }
                }

                if document.status != GameStatus::Setup {
                    return Err(ServiceError::CannotJoinInProgress {
                        code: document.code.clone(),
                    });
                }

                let id = player_id.unwrap_or(fresh_id);
                document
                    .players
                    .insert(id, Player::new(name.clone(), SystemTime::now()));
                Ok(id)
            })
            .await?;

        info!(code, player = %committed.value, "player joined");
        Ok(committed)
    }

    /// Mark `player_id` inactive; the record stays so the player can come back.
    pub async fn leave_game(
        &self,
        code: &str,
        player_id: PlayerId,
    ) -> Result<Committed<()>, ServiceError> {
        let committed = self
            .mutate(code, |document| {
                player_mut(document, player_id)?.is_active = false;
                Ok(())
            })
            .await?;
        info!(code, player = %player_id, "player left");
        Ok(committed)
    }

    /// Seat `player_id` as `role` in `team`. Only possible before the round starts.
    pub async fn assign_team(
        &self,
        code: &str,
        player_id: PlayerId,
        team: Team,
        role: Role,
    ) -> Result<Committed<()>, ServiceError> {
        self.mutate(code, |document| {
            require_setup(document, "teams can only change during setup")?;
            player_mut(document, player_id)?;

            if role == Role::Spymaster {
                let holder = spymaster_of(document.active_players(), team);
                if matches!(holder, Some((id, _)) if id != player_id) {
                    return Err(ServiceError::SpymasterTaken { team });
                }
            }

            let player = player_mut(document, player_id)?;
            player.team = Some(team);
            player.role = Some(role);
            Ok(())
        })
        .await
    }

    /// Deal a board and start the first round once every seat rule passes.
    pub async fn start_game(
        &self,
        code: &str,
        player_id: PlayerId,
    ) -> Result<Committed<Team>, ServiceError> {
        let (starting_team, board) = self.deal();

        let committed = self
            .mutate(code, |document| {
                if !document.players.contains_key(&player_id) {
                    return Err(ServiceError::UnknownPlayer { player: player_id });
                }
                require_setup(document, "game has already started")?;
                can_start_game(document.players.values())?;
                begin_round(document, starting_team, board.clone());
                Ok(starting_team)
            })
            .await?;

        info!(code, starting_team = %starting_team, "game started");
        Ok(committed)
    }

    /// Record a clue from the active team's spymaster.
    pub async fn give_clue(
        &self,
        code: &str,
        player_id: PlayerId,
        word: &str,
        number: f64,
    ) -> Result<Committed<TurnEffect>, ServiceError> {
        let committed = self
            .mutate(code, |document| {
                let round = require_round(document)?;
                let author = seated_actor(document, player_id, round.state.current_turn, Role::Spymaster)?;
                let transition = apply(
                    &round,
                    TurnEvent::GiveClue {
                        word: word.to_owned(),
                        number,
                        author,
                    },
                )?;
                transition.round.store_into(document);
                Ok(transition.effect)
            })
            .await?;

        if let TurnEffect::ClueGiven {
            team,
            word,
            guesses,
        } = &committed.value
        {
            info!(code, team = %team, word = %word, guesses, "clue given");
        }
        Ok(committed)
    }

    /// Reveal the card at `index` for the active team.
    ///
    /// The slot is re-checked on every fresh snapshot before anything is decided, so a card that
    /// another writer turned over in the meantime aborts the operation without a write.
    pub async fn reveal_card(
        &self,
        code: &str,
        player_id: PlayerId,
        index: usize,
    ) -> Result<Committed<RevealedCard>, ServiceError> {
        let committed = self
            .mutate(code, |document| {
                let already_revealed = document
                    .game_state
                    .as_ref()
                    .and_then(|state| state.revealed_cards.get(index))
                    .copied()
                    .unwrap_or(false);
                if already_revealed {
                    error!(
                        code = %document.code,
                        player = %player_id,
                        index,
                        "card already revealed; aborting reveal"
                    );
                    return Err(ServiceError::CardAlreadyRevealed { index });
                }

                let round = require_round(document)?;
                let team = round.state.current_turn;
                seated_actor(document, player_id, team, Role::Operative)?;
                let outcome = resolve_guess(
                    index,
                    &round.board.color_map,
                    &round.state.revealed_cards,
                    team,
                )
                .map_err(TurnError::from)?;
                let transition = apply(&round, TurnEvent::RevealCard { index })?;

                if let Some(victory) = transition.victory() {
                    document.status = GameStatus::Finished;
                    document.finished_at = Some(SystemTime::now());
                    debug!(
                        code = %document.code,
                        winner = %victory.winner,
                        reason = ?victory.reason,
                        "reveal decides the round"
                    );
                }
                transition.round.store_into(document);
                Ok(RevealedCard { index, outcome })
            })
            .await?;

        // Finished games are refused above, so a finished result was finished by this reveal.
        if let Some(entry) = GameHistoryEntry::from_finished(&committed.document) {
            info!(code, winner = %entry.winner, reason = ?entry.win_reason, "game finished");
            if let Err(err) = self.store.save_history(entry).await {
                warn!(code, error = %err, "failed to record game history");
            }
        }
        Ok(committed)
    }

    /// Stop guessing and hand the turn over.
    pub async fn end_guessing(
        &self,
        code: &str,
        player_id: PlayerId,
    ) -> Result<Committed<TurnEffect>, ServiceError> {
        self.mutate(code, |document| {
            let round = require_round(document)?;
            seated_actor(document, player_id, round.state.current_turn, Role::Operative)?;
            let transition = apply(&round, TurnEvent::EndGuessing)?;
            transition.round.store_into(document);
            Ok(transition.effect)
        })
        .await
    }

    /// Back to setup: the round is discarded and every player loses their seat.
    pub async fn reset_for_new_game(&self, code: &str) -> Result<Committed<()>, ServiceError> {
        let committed = self
            .mutate(code, |document| {
                document.status = GameStatus::Setup;
                document.started_at = None;
                document.finished_at = None;
                document.starting_team = None;
                document.board = None;
                document.game_state = None;
                document.clue_log.clear();
                for player in document.players.values_mut() {
                    player.team = None;
                    player.role = None;
                }
                Ok(())
            })
            .await?;
        info!(code, "game reset to setup");
        Ok(committed)
    }

    /// Deal a new board to the same seats after a finished round.
    pub async fn rematch(&self, code: &str) -> Result<Committed<Team>, ServiceError> {
        let (starting_team, board) = self.deal();

        let committed = self
            .mutate(code, |document| {
                if document.status != GameStatus::Finished {
                    return Err(ServiceError::WrongPhase(
                        "a rematch needs a finished game".into(),
                    ));
                }
                begin_round(document, starting_team, board.clone());
                Ok(starting_team)
            })
            .await?;

        info!(code, starting_team = %starting_team, "rematch started");
        Ok(committed)
    }

    /// Latest stored document.
    pub async fn snapshot(&self, code: &str) -> Result<GameDocument, ServiceError> {
        Ok(self.load(code).await?.document)
    }

    /// Every stored game, newest first.
    pub async fn list_games(&self) -> Result<Vec<GameSummaryEntity>, ServiceError> {
        Ok(self.store.list_games().await?)
    }

    /// Finished games, most recent first, at most `limit` of them.
    pub async fn list_history(&self, limit: usize) -> Result<Vec<GameHistoryEntry>, ServiceError> {
        Ok(self.store.list_history(limit).await?)
    }

    /// Current document followed by one document per committed write, from any writer.
    ///
    /// Dropping the stream unsubscribes.
    pub fn subscribe(&self, code: &str) -> DocumentStream {
        self.store
            .watch_game(code.to_owned())
            .map(|item| {
                item.map(|versioned| versioned.document)
                    .map_err(ServiceError::from)
            })
            .boxed()
    }

    async fn load(&self, code: &str) -> Result<Versioned<GameDocument>, ServiceError> {
        self.store
            .load_game(code.to_owned())
            .await?
            .ok_or_else(|| ServiceError::GameNotFound {
                code: code.to_owned(),
            })
    }

    /// Random starting team and a board dealt for it.
    fn deal(&self) -> (Team, Board) {
        let mut rng = rand::rng();
        let starting_team = random_starting_team(&mut rng);
        let board = self.boards.generate(starting_team, &mut rng);
        (starting_team, board)
    }

    /// Run one read-decide-write cycle, repeating it when a guarded write loses a race.
    async fn mutate<T, F>(&self, code: &str, mut decide: F) -> Result<Committed<T>, ServiceError>
    where
        F: FnMut(&mut GameDocument) -> Result<T, ServiceError>,
    {
        let attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=attempts {
            let Versioned {
                revision,
                document: before,
            } = self.load(code).await?;

            let mut after = before.clone();
            let value = decide(&mut after)?;

            let patch = Patch::diff(&before, &after)
                .map_err(|err| ServiceError::Unavailable(StorageError::corrupt(code, err)))?;
            if patch.is_empty() {
                debug!(code, attempt, "nothing to write");
                return Ok(Committed {
                    value,
                    document: after,
                });
            }

            let condition = match self.policy.mode {
                ConsistencyMode::BestEffort => WriteCondition::None,
                ConsistencyMode::CompareAndSwap => WriteCondition::Revision(revision),
            };
            debug!(code, attempt, writes = patch.len(), "writing patch");

            match self
                .store
                .update_game(code.to_owned(), patch, condition)
                .await
            {
                Ok(_) => {
                    return Ok(Committed {
                        value,
                        document: after,
                    });
                }
                Err(StorageError::Conflict { .. }) => {
                    warn!(code, attempt, "concurrent write detected; re-reading game");
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(ServiceError::WriteContention {
            code: code.to_owned(),
            attempts,
        })
    }
}

fn require_setup(document: &GameDocument, reason: &str) -> Result<(), ServiceError> {
    match document.status {
        GameStatus::Setup => Ok(()),
        GameStatus::Finished => Err(ServiceError::GameAlreadyFinished {
            code: document.code.clone(),
        }),
        GameStatus::Playing => Err(ServiceError::WrongPhase(reason.to_owned())),
    }
}

/// The running round, or why there is none.
fn require_round(document: &GameDocument) -> Result<Round, ServiceError> {
    match document.status {
        GameStatus::Finished => Err(ServiceError::GameAlreadyFinished {
            code: document.code.clone(),
        }),
        GameStatus::Setup => Err(ServiceError::WrongPhase("game has not started".into())),
        GameStatus::Playing => match Round::from_document(document) {
            Ok(Some(round)) => Ok(round),
            Ok(None) => Err(ServiceError::WrongPhase("no board has been dealt".into())),
            Err(malformed) => Err(ServiceError::Unavailable(StorageError::corrupt(
                &document.code,
                malformed,
            ))),
        },
    }
}

fn player_mut(document: &mut GameDocument, player_id: PlayerId) -> Result<&mut Player, ServiceError> {
    document
        .players
        .get_mut(&player_id)
        .ok_or(ServiceError::UnknownPlayer { player: player_id })
}

/// Name of `player_id` if it may act as `role` for `team` right now.
fn seated_actor(
    document: &GameDocument,
    player_id: PlayerId,
    team: Team,
    role: Role,
) -> Result<String, ServiceError> {
    let player = document
        .players
        .get(&player_id)
        .ok_or(ServiceError::UnknownPlayer { player: player_id })?;
    if player.seated_as(team, role) {
        Ok(player.name.clone())
    } else {
        Err(ServiceError::NotYourTurn { player: player_id })
    }
}

fn begin_round(document: &mut GameDocument, starting_team: Team, board: Board) {
    document.status = GameStatus::Playing;
    document.started_at = Some(SystemTime::now());
    document.finished_at = None;
    document.starting_team = Some(starting_team);
    Round::deal(board, starting_team).store_into(document);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::{game_store::memory::MemoryGameStore, models::Phase};

    fn coordinator(mode: ConsistencyMode) -> SyncCoordinator {
        let config = AppConfig::default().with_consistency(mode);
        let boards = BoardGenerator::new(config.vocabulary().clone()).unwrap();
        SyncCoordinator::new(
            Arc::new(MemoryGameStore::new()),
            SyncPolicy::from_config(&config),
            Arc::new(boards),
        )
    }

    async fn seated_game(sync: &SyncCoordinator) -> (String, [PlayerId; 4]) {
        let created = sync.create_game("Ada").await.unwrap();
        let code = created.code.clone();
        let red_spy = created.player_id;
        let red_op = sync.join_game(&code, None, "Bob").await.unwrap().value;
        let blue_spy = sync.join_game(&code, None, "Cy").await.unwrap().value;
        let blue_op = sync.join_game(&code, None, "Di").await.unwrap().value;
        for (id, team, role) in [
            (red_spy, Team::Red, Role::Spymaster),
            (red_op, Team::Red, Role::Operative),
            (blue_spy, Team::Blue, Role::Spymaster),
            (blue_op, Team::Blue, Role::Operative),
        ] {
            sync.assign_team(&code, id, team, role).await.unwrap();
        }
        (code, [red_spy, red_op, blue_spy, blue_op])
    }

    #[tokio::test]
    async fn create_game_seats_host_as_unassigned_player() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let created = sync.create_game("  Ada ").await.unwrap();

        let document = sync.snapshot(&created.code).await.unwrap();
        assert_eq!(document.status, GameStatus::Setup);
        assert_eq!(document.host_id, created.player_id);
        let host = &document.players[&created.player_id];
        assert_eq!(host.name, "Ada");
        assert!(host.is_active);
        assert_eq!(host.team, None);
    }

    #[tokio::test]
    async fn create_game_rejects_blank_name() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let err = sync.create_game("   ").await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidName(_)));
    }

    #[tokio::test]
    async fn start_game_deals_board_and_fresh_state() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let (code, [host, ..]) = seated_game(&sync).await;

        let starting = sync.start_game(&code, host).await.unwrap().value;
        let document = sync.snapshot(&code).await.unwrap();

        assert_eq!(document.status, GameStatus::Playing);
        assert_eq!(document.starting_team, Some(starting));
        assert!(document.started_at.is_some());
        let state = document.game_state.unwrap();
        assert_eq!(state.current_turn, starting);
        assert_eq!(state.phase, Phase::Clue);
        assert_eq!(state.total_for(starting), 9);
        assert_eq!(state.total_for(starting.other()), 8);
        assert!(state.revealed_cards.iter().all(|revealed| !revealed));
        assert!(document.clue_log.is_empty());
    }

    #[tokio::test]
    async fn start_game_lists_missing_seats() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let created = sync.create_game("Ada").await.unwrap();
        sync.assign_team(&created.code, created.player_id, Team::Red, Role::Spymaster)
            .await
            .unwrap();

        let err = sync
            .start_game(&created.code, created.player_id)
            .await
            .unwrap_err();
        let rejection = match err {
            ServiceError::CannotStart(rejection) => rejection,
            other => panic!("expected CannotStart, got {other:?}"),
        };
        assert_eq!(
            rejection.reasons,
            vec!["Blue team needs at least 1 player".to_owned()]
        );
    }

    #[tokio::test]
    async fn second_spymaster_is_refused() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let (code, [_, red_op, ..]) = seated_game(&sync).await;

        let err = sync
            .assign_team(&code, red_op, Team::Red, Role::Spymaster)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::SpymasterTaken { team: Team::Red }));
    }

    #[tokio::test]
    async fn operative_cannot_give_clue() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let (code, [host, red_op, _, blue_op]) = seated_game(&sync).await;
        let starting = sync.start_game(&code, host).await.unwrap().value;
        let operative = if starting == Team::Red { red_op } else { blue_op };

        let err = sync
            .give_clue(&code, operative, "ocean", 2.0)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotYourTurn { .. }));
    }

    #[tokio::test]
    async fn reveal_during_clue_phase_is_wrong_phase() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let (code, [host, red_op, _, blue_op]) = seated_game(&sync).await;
        let starting = sync.start_game(&code, host).await.unwrap().value;
        let operative = if starting == Team::Red { red_op } else { blue_op };

        let err = sync.reveal_card(&code, operative, 0).await.unwrap_err();
        assert!(matches!(err, ServiceError::WrongPhase(_)));
    }

    #[tokio::test]
    async fn new_player_cannot_join_running_game_but_known_player_can_return() {
        let sync = coordinator(ConsistencyMode::BestEffort);
        let (code, [host, red_op, ..]) = seated_game(&sync).await;
        sync.start_game(&code, host).await.unwrap();
        sync.leave_game(&code, red_op).await.unwrap();

        let err = sync.join_game(&code, None, "Eve").await.unwrap_err();
        assert!(matches!(err, ServiceError::CannotJoinInProgress { .. }));

        let back = sync
            .join_game(&code, Some(red_op), "Bobby")
            .await
            .unwrap();
        assert_eq!(back.value, red_op);
        let player = &back.document.players[&red_op];
        assert!(player.is_active);
        assert_eq!(player.name, "Bobby");
        assert_eq!(player.team, Some(Team::Red));
    }

    #[tokio::test]
    async fn reset_unseats_everybody() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let (code, [host, ..]) = seated_game(&sync).await;
        sync.start_game(&code, host).await.unwrap();

        let reset = sync.reset_for_new_game(&code).await.unwrap().document;
        assert_eq!(reset.status, GameStatus::Setup);
        assert!(reset.board.is_none());
        assert!(reset.game_state.is_none());
        assert!(reset.starting_team.is_none());
        assert!(reset.players.values().all(|p| p.team.is_none() && p.role.is_none()));
    }

    #[tokio::test]
    async fn rematch_requires_finished_game() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let (code, [host, ..]) = seated_game(&sync).await;
        sync.start_game(&code, host).await.unwrap();

        let err = sync.rematch(&code).await.unwrap_err();
        assert!(matches!(err, ServiceError::WrongPhase(_)));
    }

    #[tokio::test]
    async fn unknown_game_is_not_found() {
        let sync = coordinator(ConsistencyMode::CompareAndSwap);
        let err = sync.join_game("NOPE22", None, "Ada").await.unwrap_err();
        assert!(matches!(err, ServiceError::GameNotFound { .. }));
    }
}
