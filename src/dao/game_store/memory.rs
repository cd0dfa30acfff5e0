//! In-process document store, used by default and by the test suite.
//!
//! Documents are kept as raw JSON so patches go through exactly the same path-addressed
//! application as in the remote backends. Every committed write bumps a revision counter and
//! pushes the decoded snapshot to the game's broadcast channel.

use std::sync::Arc;

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::dao::{
    game_store::{GameStore, GameStream, Revision, Versioned, WriteCondition},
    models::{GameDocument, GameHistoryEntry, GameSummaryEntity},
    patch::Patch,
    storage::{StorageError, StorageResult},
};

const CHANNEL_CAPACITY: usize = 32;

/// Shared-memory [`GameStore`]; clones share the same games.
#[derive(Clone, Default)]
pub struct MemoryGameStore {
    games: Arc<DashMap<String, StoredGame>>,
    history: Arc<DashMap<String, GameHistoryEntry>>,
}

struct StoredGame {
    body: Value,
    revision: u64,
    notifier: broadcast::Sender<Versioned<GameDocument>>,
}

impl StoredGame {
    fn decode(&self, code: &str) -> StorageResult<Versioned<GameDocument>> {
        let document = serde_json::from_value(self.body.clone())
            .map_err(|err| StorageError::corrupt(code, err))?;
        Ok(Versioned {
            revision: Revision::from(self.revision),
            document,
        })
    }
}

impl MemoryGameStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, document: GameDocument) -> StorageResult<Revision> {
        let body =
            serde_json::to_value(&document).map_err(|err| StorageError::corrupt(&document.code, err))?;
        match self.games.entry(document.code.clone()) {
            Entry::Occupied(_) => Err(StorageError::AlreadyExists {
                code: document.code,
            }),
            Entry::Vacant(slot) => {
                let (notifier, _) = broadcast::channel(CHANNEL_CAPACITY);
                slot.insert(StoredGame {
                    body,
                    revision: 1,
                    notifier,
                });
                Ok(Revision::from(1))
            }
        }
    }

    fn snapshot(&self, code: &str) -> StorageResult<Option<Versioned<GameDocument>>> {
        self.games
            .get(code)
            .map(|stored| stored.decode(code))
            .transpose()
    }

    fn apply(
        &self,
        code: &str,
        patch: &Patch,
        condition: &WriteCondition,
    ) -> StorageResult<Revision> {
        let mut stored = self
            .games
            .get_mut(code)
            .ok_or_else(|| StorageError::NotFound { code: code.into() })?;

        if let WriteCondition::Revision(expected) = condition {
            if *expected != Revision::from(stored.revision) {
                return Err(StorageError::Conflict { code: code.into() });
            }
        }

        let mut body = stored.body.clone();
        patch.apply_to(&mut body);
        // Reject writes that would leave an undecodable document behind.
        let document: GameDocument = serde_json::from_value(body.clone())
            .map_err(|err| StorageError::corrupt(code, err))?;

        stored.body = body;
        stored.revision += 1;
        let revision = Revision::from(stored.revision);
        // No receivers simply means nobody is watching.
        let _ = stored.notifier.send(Versioned {
            revision: revision.clone(),
            document,
        });
        Ok(revision)
    }

    fn subscribe(
        &self,
        code: &str,
    ) -> StorageResult<(
        Versioned<GameDocument>,
        broadcast::Receiver<Versioned<GameDocument>>,
    )> {
        let stored = self
            .games
            .get(code)
            .ok_or_else(|| StorageError::NotFound { code: code.into() })?;
        Ok((stored.decode(code)?, stored.notifier.subscribe()))
    }
}

impl GameStore for MemoryGameStore {
    fn create_game(&self, document: GameDocument) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.insert(document) })
    }

    fn load_game(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameDocument>>>> {
        let store = self.clone();
        Box::pin(async move { store.snapshot(&code) })
    }

    fn update_game(
        &self,
        code: String,
        patch: Patch,
        condition: WriteCondition,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.apply(&code, &patch, &condition) })
    }

    fn watch_game(&self, code: String) -> GameStream {
        let store = self.clone();
        Box::pin(async_stream::stream! {
            let (initial, mut receiver) = match store.subscribe(&code) {
                Ok(subscription) => subscription,
                Err(err) => {
                    yield Err(err);
                    return;
                }
            };
            yield Ok(initial);

            loop {
                match receiver.recv().await {
                    Ok(snapshot) => yield Ok(snapshot),
                    Err(RecvError::Lagged(skipped)) => {
                        // Every message is a full snapshot, so skipping intermediates is harmless.
                        debug!(code = %code, skipped, "watcher lagged behind");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameSummaryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut summaries = Vec::with_capacity(store.games.len());
            for entry in store.games.iter() {
                let snapshot = entry.value().decode(entry.key())?;
                summaries.push(GameSummaryEntity::from(&snapshot.document));
            }
            summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(summaries)
        })
    }

    fn save_history(&self, entry: GameHistoryEntry) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.history.insert(entry.game_id.clone(), entry);
            Ok(())
        })
    }

    fn list_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameHistoryEntry>>> {
        let store = self.clone();
        Box::pin(async move {
            let mut entries: Vec<GameHistoryEntry> =
                store.history.iter().map(|entry| entry.value().clone()).collect();
            entries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
            entries.truncate(limit);
            Ok(entries)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use futures::StreamExt;
    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::{GameStatus, Player, Team, WinReason};

    fn game(code: &str) -> GameDocument {
        GameDocument::new(
            code,
            "FALCON",
            Uuid::new_v4(),
            Player::new("Host", SystemTime::now()),
        )
    }

    fn status_patch(status: &str) -> Patch {
        let mut patch = Patch::new();
        patch.set("status", json!(status));
        patch
    }

    #[tokio::test]
    async fn create_then_load_round_trips() {
        let store = MemoryGameStore::new();
        let revision = store.create_game(game("AAAAAA")).await.unwrap();

        let loaded = store.load_game("AAAAAA".into()).await.unwrap().unwrap();
        assert_eq!(loaded.revision, revision);
        assert_eq!(loaded.document.display_name, "FALCON");
        assert!(store.load_game("ZZZZZZ".into()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_codes_are_rejected() {
        let store = MemoryGameStore::new();
        store.create_game(game("AAAAAA")).await.unwrap();
        let err = store.create_game(game("AAAAAA")).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn stale_revision_conflicts_but_unconditional_write_lands() {
        let store = MemoryGameStore::new();
        let first = store.create_game(game("AAAAAA")).await.unwrap();

        store
            .update_game(
                "AAAAAA".into(),
                status_patch("playing"),
                WriteCondition::Revision(first.clone()),
            )
            .await
            .unwrap();

        let err = store
            .update_game(
                "AAAAAA".into(),
                status_patch("finished"),
                WriteCondition::Revision(first),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Conflict { .. }));

        store
            .update_game("AAAAAA".into(), status_patch("finished"), WriteCondition::None)
            .await
            .unwrap();
        let loaded = store.load_game("AAAAAA".into()).await.unwrap().unwrap();
        assert_eq!(loaded.document.status, GameStatus::Finished);
    }

    #[tokio::test]
    async fn undecodable_writes_are_not_committed() {
        let store = MemoryGameStore::new();
        store.create_game(game("AAAAAA")).await.unwrap();

        let err = store
            .update_game("AAAAAA".into(), status_patch("paused"), WriteCondition::None)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));

        let loaded = store.load_game("AAAAAA".into()).await.unwrap().unwrap();
        assert_eq!(loaded.document.status, GameStatus::Setup);
        assert_eq!(loaded.revision, Revision::from(1));
    }

    #[tokio::test]
    async fn watchers_see_initial_snapshot_then_every_write() {
        let store = MemoryGameStore::new();
        store.create_game(game("AAAAAA")).await.unwrap();

        let mut stream = store.watch_game("AAAAAA".into());
        let initial = stream.next().await.unwrap().unwrap();
        assert_eq!(initial.document.status, GameStatus::Setup);

        store
            .update_game("AAAAAA".into(), status_patch("playing"), WriteCondition::None)
            .await
            .unwrap();
        let pushed = stream.next().await.unwrap().unwrap();
        assert_eq!(pushed.document.status, GameStatus::Playing);
        assert_eq!(pushed.revision, Revision::from(2));
    }

    #[tokio::test]
    async fn watching_an_unknown_game_yields_not_found() {
        let store = MemoryGameStore::new();
        let mut stream = store.watch_game("NOPE22".into());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
        assert!(stream.next().await.is_none());
    }

    fn finished(code: &str, finished_secs: u64) -> GameHistoryEntry {
        GameHistoryEntry {
            game_id: code.into(),
            finished_at: SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(finished_secs),
            duration_ms: 1_000,
            display_name: "FALCON".into(),
            winner: Team::Blue,
            win_reason: WinReason::AllRevealed,
            created_by: "Host".into(),
            players: Default::default(),
        }
    }

    #[tokio::test]
    async fn history_lists_latest_finish_first_and_replaces_per_code() {
        let store = MemoryGameStore::new();
        store.save_history(finished("AAAAAA", 10)).await.unwrap();
        store.save_history(finished("BBBBBB", 30)).await.unwrap();
        store.save_history(finished("CCCCCC", 20)).await.unwrap();
        // A rematch of the same code overwrites its record.
        store.save_history(finished("AAAAAA", 40)).await.unwrap();

        let codes: Vec<String> = store
            .list_history(10)
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.game_id)
            .collect();
        assert_eq!(codes, vec!["AAAAAA", "BBBBBB", "CCCCCC"]);

        assert_eq!(store.list_history(2).await.unwrap().len(), 2);
    }
}
