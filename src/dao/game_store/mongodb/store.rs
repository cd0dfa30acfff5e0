use std::sync::Arc;

use futures::{TryStreamExt, future::BoxFuture};
use mongodb::{
    Collection, Database, IndexModel,
    bson::{Document, doc},
    options::{IndexOptions, ReturnDocument},
};
use tokio::{
    sync::RwLock,
    time::{MissedTickBehavior, interval},
};

use super::{
    config::MongoConfig,
    connection::establish_connection,
    error::{MongoDaoError, MongoResult, is_duplicate_key},
    models::{
        REVISION_FIELD, code_filter, from_stored, history_from_stored, history_to_stored,
        stored_revision, to_stored, update_from_patch,
    },
};
use crate::dao::{
    game_store::{GameStore, GameStream, Revision, Versioned, WriteCondition},
    models::{GameDocument, GameHistoryEntry, GameSummaryEntity},
    patch::Patch,
    storage::{StorageError, StorageResult},
};

const GAME_COLLECTION_NAME: &str = "games";
const HISTORY_COLLECTION_NAME: &str = "history";

/// [`GameStore`] backed by one MongoDB document per game.
#[derive(Clone)]
pub struct MongoGameStore {
    inner: Arc<MongoInner>,
}

struct MongoInner {
    state: RwLock<MongoState>,
    config: MongoConfig,
}

struct MongoState {
    database: Database,
}

impl MongoInner {
    async fn ping(&self) -> MongoResult<()> {
        let database = {
            let guard = self.state.read().await;
            guard.database.clone()
        };

        database
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|source| MongoDaoError::HealthPing { source })?;
        Ok(())
    }

    async fn reconnect(&self) -> MongoResult<()> {
        let (_client, database) =
            establish_connection(&self.config.options, &self.config.database_name).await?;
        let mut guard = self.state.write().await;
        guard.database = database;
        Ok(())
    }
}

impl MongoGameStore {
    /// Establish a connection to MongoDB and ensure indexes are present.
    pub async fn connect(config: MongoConfig) -> MongoResult<Self> {
        let (_client, database) =
            establish_connection(&config.options, &config.database_name).await?;

        let inner = Arc::new(MongoInner {
            state: RwLock::new(MongoState { database }),
            config,
        });

        let store = Self { inner };
        store.ensure_indexes().await?;
        Ok(store)
    }

    async fn ensure_indexes(&self) -> MongoResult<()> {
        let collection = self.collection().await;
        let index = IndexModel::builder()
            .keys(doc! {"createdAt": -1})
            .options(
                IndexOptions::builder()
                    .name(Some("game_created_idx".to_owned()))
                    .build(),
            )
            .build();

        collection
            .create_index(index)
            .await
            .map_err(|source| MongoDaoError::EnsureIndex {
                collection: GAME_COLLECTION_NAME,
                index: "createdAt",
                source,
            })?;

        Ok(())
    }

    async fn collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(GAME_COLLECTION_NAME)
    }

    async fn history_collection(&self) -> Collection<Document> {
        let guard = self.inner.state.read().await;
        guard.database.collection::<Document>(HISTORY_COLLECTION_NAME)
    }

    async fn insert(&self, document: GameDocument) -> StorageResult<Revision> {
        let stored = to_stored(&document)?;
        let collection = self.collection().await;
        match collection.insert_one(stored).await {
            Ok(_) => Ok(Revision::new("1")),
            Err(err) if is_duplicate_key(&err) => Err(StorageError::AlreadyExists {
                code: document.code,
            }),
            Err(source) => Err(MongoDaoError::InsertGame {
                code: document.code,
                source,
            }
            .into()),
        }
    }

    async fn current_revision(&self, code: &str) -> MongoResult<Option<i64>> {
        let collection = self.collection().await;
        let stored = collection
            .find_one(code_filter(code))
            .projection(doc! { REVISION_FIELD: 1 })
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                code: code.to_owned(),
                source,
            })?;
        Ok(stored.as_ref().map(stored_revision))
    }

    async fn load(&self, code: &str) -> StorageResult<Option<Versioned<GameDocument>>> {
        let collection = self.collection().await;
        let stored = collection
            .find_one(code_filter(code))
            .await
            .map_err(|source| MongoDaoError::LoadGame {
                code: code.to_owned(),
                source,
            })?;

        match stored {
            Some(stored) => from_stored(code, stored)
                .map(Some)
                .map_err(|err| StorageError::corrupt(code, err)),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        code: &str,
        patch: &Patch,
        condition: &WriteCondition,
    ) -> StorageResult<Revision> {
        let update = update_from_patch(code, patch)?;
        let mut filter = code_filter(code);
        if let WriteCondition::Revision(expected) = condition {
            let expected: i64 =
                expected
                    .as_str()
                    .parse()
                    .map_err(|_| MongoDaoError::InvalidRevision {
                        code: code.to_owned(),
                        revision: expected.to_string(),
                    })?;
            filter.insert(REVISION_FIELD, expected);
        }

        let collection = self.collection().await;
        let updated = collection
            .find_one_and_update(filter, update)
            .projection(doc! { REVISION_FIELD: 1 })
            .return_document(ReturnDocument::After)
            .await
            .map_err(|source| MongoDaoError::UpdateGame {
                code: code.to_owned(),
                source,
            })?;

        match updated {
            Some(stored) => Ok(Revision::new(stored_revision(&stored).to_string())),
            None => match self.current_revision(code).await? {
                Some(_) => Err(StorageError::Conflict { code: code.into() }),
                None => Err(StorageError::NotFound { code: code.into() }),
            },
        }
    }

    async fn list(&self) -> StorageResult<Vec<GameSummaryEntity>> {
        let collection = self.collection().await;
        let stored: Vec<Document> = collection
            .find(doc! {})
            .sort(doc! { "createdAt": -1 })
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListGames { source })?;

        let mut summaries = Vec::with_capacity(stored.len());
        for document in stored {
            let code = document.get_str("_id").unwrap_or_default().to_owned();
            let snapshot =
                from_stored(&code, document).map_err(|err| StorageError::corrupt(&code, err))?;
            summaries.push(GameSummaryEntity::from(&snapshot.document));
        }
        Ok(summaries)
    }

    async fn store_history(&self, entry: GameHistoryEntry) -> StorageResult<()> {
        let stored = history_to_stored(&entry)?;
        let collection = self.history_collection().await;
        collection
            .replace_one(code_filter(&entry.game_id), stored)
            .upsert(true)
            .await
            .map_err(|source| MongoDaoError::SaveHistory {
                code: entry.game_id.clone(),
                source,
            })?;
        Ok(())
    }

    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameHistoryEntry>> {
        // A zero limit means "no limit" to the server.
        if limit == 0 {
            return Ok(Vec::new());
        }
        let collection = self.history_collection().await;
        let stored: Vec<Document> = collection
            .find(doc! {})
            .sort(doc! { "finishedAt": -1 })
            .limit(i64::try_from(limit).unwrap_or(i64::MAX))
            .await
            .map_err(|source| MongoDaoError::ListHistory { source })?
            .try_collect()
            .await
            .map_err(|source| MongoDaoError::ListHistory { source })?;

        let mut entries = Vec::with_capacity(stored.len());
        for document in stored {
            let code = document.get_str("_id").unwrap_or_default().to_owned();
            let entry =
                history_from_stored(document).map_err(|err| StorageError::corrupt(&code, err))?;
            entries.push(entry);
        }
        Ok(entries)
    }
}

impl GameStore for MongoGameStore {
    fn create_game(&self, document: GameDocument) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.insert(document).await })
    }

    fn load_game(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameDocument>>>> {
        let store = self.clone();
        Box::pin(async move { store.load(&code).await })
    }

    fn update_game(
        &self,
        code: String,
        patch: Patch,
        condition: WriteCondition,
    ) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.update(&code, &patch, &condition).await })
    }

    fn watch_game(&self, code: String) -> GameStream {
        let store = self.clone();
        Box::pin(async_stream::stream! {
            let mut ticker = interval(store.inner.config.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            let mut last_seen: Option<i64> = None;

            loop {
                ticker.tick().await;
                let revision = match store.current_revision(&code).await {
                    Ok(Some(revision)) => revision,
                    Ok(None) => {
                        yield Err(StorageError::NotFound { code: code.clone() });
                        break;
                    }
                    Err(err) => {
                        yield Err(err.into());
                        break;
                    }
                };
                if last_seen == Some(revision) {
                    continue;
                }

                match store.load(&code).await {
                    Ok(Some(snapshot)) => {
                        last_seen = snapshot.revision.as_str().parse().ok();
                        yield Ok(snapshot);
                    }
                    Ok(None) => {
                        yield Err(StorageError::NotFound { code: code.clone() });
                        break;
                    }
                    Err(err) => {
                        yield Err(err);
                        break;
                    }
                }
            }
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameSummaryEntity>>> {
        let store = self.clone();
        Box::pin(async move { store.list().await })
    }

    fn save_history(&self, entry: GameHistoryEntry) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.store_history(entry).await })
    }

    fn list_history(
        &self,
        limit: usize,
    ) -> BoxFuture<'static, StorageResult<Vec<GameHistoryEntry>>> {
        let store = self.clone();
        Box::pin(async move { store.recent_history(limit).await })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.inner.reconnect().await.map_err(Into::into) })
    }
}
