use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, json};
use tracing::debug;

use crate::dao::{
    game_store::{GameStore, GameStream, Revision, Versioned, WriteCondition},
    models::{GameDocument, GameHistoryEntry, GameSummaryEntity},
    patch::Patch,
    storage::{StorageError, StorageResult},
};

use super::{
    config::CouchConfig,
    error::{CouchDaoError, CouchResult},
    models::{
        AllDocsResponse, ChangesResponse, CouchGameDocument, CouchHistoryDocument, END_SUFFIX,
        GAME_PREFIX, HISTORY_PREFIX, PutResponse, RevisionOnly, game_doc_id, history_doc_id,
    },
};

/// Re-read/re-apply rounds for unconditional writes that keep hitting a moved `_rev`.
const LAST_WRITE_WINS_ATTEMPTS: u32 = 8;
const CHANGES: &str = "_changes";

/// Result of a PUT against a document.
enum PutOutcome {
    Stored(String),
    Conflict,
}

/// [`GameStore`] backed by a CouchDB database, one document per game.
#[derive(Clone)]
pub struct CouchGameStore {
    client: Client,
    base_url: Arc<str>,
    database: Arc<str>,
    auth: Option<(Arc<str>, Arc<str>)>,
    longpoll_timeout_ms: u64,
}

impl CouchGameStore {
    /// Establish a connection to CouchDB and ensure the database exists.
    pub async fn connect(config: CouchConfig) -> CouchResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| CouchDaoError::ClientBuilder { source })?;

        let base_url = Arc::<str>::from(config.base_url.trim_end_matches('/'));
        let database = Arc::<str>::from(config.database);
        let auth = config
            .username
            .zip(config.password)
            .map(|(u, p)| (Arc::<str>::from(u), Arc::<str>::from(p)));

        let store = Self {
            client,
            base_url,
            database,
            auth,
            longpoll_timeout_ms: config.longpoll_timeout_ms,
        };

        store.ensure_database().await?;
        Ok(store)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        if let Some((ref user, ref pass)) = self.auth {
            builder.basic_auth(user.as_ref(), Some(pass.as_ref()))
        } else {
            builder
        }
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}/{}/{}", self.base_url, self.database, path);
        self.authorize(self.client.request(method, url))
    }

    fn database_url(&self) -> String {
        format!("{}/{}", self.base_url, self.database)
    }

    async fn ensure_database(&self) -> CouchResult<()> {
        let database = self.database.to_string();
        let url = self.database_url();

        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|source| CouchDaoError::DatabaseQuery {
                database: database.clone(),
                source,
            })?;

        match response.status() {
            StatusCode::OK => Ok(()),
            StatusCode::NOT_FOUND => {
                let create = self
                    .authorize(self.client.put(&url))
                    .send()
                    .await
                    .map_err(|source| CouchDaoError::DatabaseCreate {
                        database: database.clone(),
                        source,
                    })?;
                // 412 means another gateway created it first.
                if create.status().is_success() || create.status() == StatusCode::PRECONDITION_FAILED
                {
                    Ok(())
                } else {
                    Err(CouchDaoError::DatabaseStatus {
                        database,
                        status: create.status(),
                    })
                }
            }
            other => Err(CouchDaoError::DatabaseStatus {
                database,
                status: other,
            }),
        }
    }

    async fn get_document<T>(&self, doc_id: &str) -> CouchResult<Option<T>>
    where
        T: DeserializeOwned,
    {
        let response = self
            .request(Method::GET, doc_id)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                response.json::<T>().await.map(Some).map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn put_document<T>(&self, doc_id: &str, document: &T) -> CouchResult<PutOutcome>
    where
        T: ?Sized + Serialize,
    {
        let response = self
            .request(Method::PUT, doc_id)
            .json(document)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: doc_id.to_string(),
                source,
            })?;

        match response.status() {
            StatusCode::CONFLICT => Ok(PutOutcome::Conflict),
            status if status.is_success() => {
                let created = response.json::<PutResponse>().await.map_err(|source| {
                    CouchDaoError::DecodeResponse {
                        path: doc_id.to_string(),
                        source,
                    }
                })?;
                Ok(PutOutcome::Stored(created.rev))
            }
            other => Err(CouchDaoError::RequestStatus {
                path: doc_id.to_string(),
                status: other,
            }),
        }
    }

    async fn list_documents<T>(&self, prefix: &str) -> CouchResult<Vec<T>>
    where
        T: DeserializeOwned,
    {
        const ALL_DOCS: &str = "_all_docs";
        let query = [
            ("include_docs", "true".to_string()),
            ("startkey", format!("\"{}\"", prefix)),
            ("endkey", format!("\"{}{}\"", prefix, END_SUFFIX)),
        ];

        let response = self
            .request(Method::GET, ALL_DOCS)
            .query(&query)
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: ALL_DOCS.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: ALL_DOCS.to_string(),
                status: response.status(),
            });
        }

        let payload = response.json::<AllDocsResponse>().await.map_err(|source| {
            CouchDaoError::DecodeResponse {
                path: ALL_DOCS.to_string(),
                source,
            }
        })?;

        let mut documents = Vec::new();
        for row in payload.rows {
            if let Some(doc) = row.doc {
                let parsed = from_value(doc).map_err(|source| CouchDaoError::DeserializeValue {
                    path: ALL_DOCS.to_string(),
                    source,
                })?;
                documents.push(parsed);
            }
        }

        Ok(documents)
    }

    /// Query the changes feed for a single document.
    ///
    /// Without `since` the normal feed returns the latest revision and the sequence to resume
    /// from; with it, the request long-polls until the next change or the timeout.
    async fn changes(&self, doc_id: &str, since: Option<&str>) -> CouchResult<ChangesResponse> {
        let mut query = vec![
            ("filter", "_doc_ids".to_string()),
            ("include_docs", "true".to_string()),
        ];
        if let Some(since) = since {
            query.push(("feed", "longpoll".to_string()));
            query.push(("since", since.to_string()));
            query.push(("timeout", self.longpoll_timeout_ms.to_string()));
        }

        let response = self
            .request(Method::POST, CHANGES)
            .query(&query)
            .json(&json!({ "doc_ids": [doc_id] }))
            .send()
            .await
            .map_err(|source| CouchDaoError::RequestSend {
                path: CHANGES.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(CouchDaoError::RequestStatus {
                path: CHANGES.to_string(),
                status: response.status(),
            });
        }

        response
            .json::<ChangesResponse>()
            .await
            .map_err(|source| CouchDaoError::DecodeResponse {
                path: CHANGES.to_string(),
                source,
            })
    }

    async fn load(&self, code: &str) -> StorageResult<Option<Versioned<GameDocument>>> {
        let doc_id = game_doc_id(code);
        match self.get_document::<CouchGameDocument>(&doc_id).await? {
            Some(stored) => stored
                .into_versioned()
                .map(Some)
                .map_err(|err| StorageError::corrupt(code, err)),
            None => Ok(None),
        }
    }

    async fn create(&self, document: GameDocument) -> StorageResult<Revision> {
        let stored = CouchGameDocument::from_game(&document)?;
        match self.put_document(&stored.id, &stored).await? {
            PutOutcome::Stored(rev) => Ok(Revision::new(rev)),
            PutOutcome::Conflict => Err(StorageError::AlreadyExists {
                code: document.code,
            }),
        }
    }

    async fn update(
        &self,
        code: &str,
        patch: &Patch,
        condition: &WriteCondition,
    ) -> StorageResult<Revision> {
        let doc_id = game_doc_id(code);

        for attempt in 1..=LAST_WRITE_WINS_ATTEMPTS {
            let current = self
                .get_document::<CouchGameDocument>(&doc_id)
                .await?
                .ok_or_else(|| StorageError::NotFound { code: code.into() })?;

            if let WriteCondition::Revision(expected) = condition {
                if current.rev.as_deref() != Some(expected.as_str()) {
                    return Err(StorageError::Conflict { code: code.into() });
                }
            }

            let mut body = Value::Object(current.body);
            patch.apply_to(&mut body);
            if let Err(err) = from_value::<GameDocument>(body.clone()) {
                return Err(StorageError::corrupt(code, err));
            }
            let Value::Object(body) = body else {
                return Err(StorageError::corrupt(code, "document root is not an object"));
            };

            let next = CouchGameDocument {
                id: doc_id.clone(),
                rev: current.rev,
                body,
            };
            match self.put_document(&doc_id, &next).await? {
                PutOutcome::Stored(rev) => return Ok(Revision::new(rev)),
                PutOutcome::Conflict => {
                    if matches!(condition, WriteCondition::Revision(_)) {
                        return Err(StorageError::Conflict { code: code.into() });
                    }
                    // Another writer moved `_rev` between our read and write; re-apply the
                    // same paths on top of theirs.
                    debug!(code, attempt, "CouchDB revision moved; re-applying writes");
                }
            }
        }

        Err(StorageError::Conflict { code: code.into() })
    }

    async fn store_history(&self, entry: GameHistoryEntry) -> StorageResult<()> {
        let doc_id = history_doc_id(&entry.game_id);
        let code = entry.game_id.clone();
        let mut stored = CouchHistoryDocument {
            id: doc_id.clone(),
            rev: None,
            entry,
        };

        for attempt in 1..=LAST_WRITE_WINS_ATTEMPTS {
            stored.rev = self
                .get_document::<RevisionOnly>(&doc_id)
                .await?
                .map(|current| current.rev);
            match self.put_document(&doc_id, &stored).await? {
                PutOutcome::Stored(_) => return Ok(()),
                PutOutcome::Conflict => {
                    debug!(code = %code, attempt, "history record moved; writing again");
                }
            }
        }

        Err(StorageError::Conflict { code })
    }

    async fn recent_history(&self, limit: usize) -> StorageResult<Vec<GameHistoryEntry>> {
        let mut entries: Vec<GameHistoryEntry> = self
            .list_documents::<CouchHistoryDocument>(HISTORY_PREFIX)
            .await?
            .into_iter()
            .map(|stored| stored.entry)
            .collect();
        entries.sort_by(|a, b| b.finished_at.cmp(&a.finished_at));
        entries.truncate(limit);
        Ok(entries)
    }
}

impl GameStore for CouchGameStore {
    fn create_game(&self, document: GameDocument) -> BoxFuture<'static, StorageResult<Revision>> {
        let store = self.clone();
        Box::pin(async move { store.create(document).await })
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
            let doc_id = game_doc_id(&code);
            let mut since: Option<String> = None;
            let mut last_revision: Option<Revision> = None;

            loop {
                let response = match store.changes(&doc_id, since.as_deref()).await {
                    Ok(response) => response,
                    Err(err) => {
                        yield Err(err.into());
                        break;
                    }
                };

                if since.is_none() && response.results.is_empty() {
                    yield Err(StorageError::NotFound { code: code.clone() });
                    break;
                }

                for row in response.results.iter() {
                    if row.deleted {
                        yield Err(StorageError::NotFound { code: code.clone() });
                        return;
                    }
                    let Some(doc) = row.doc.clone() else {
                        continue;
                    };
                    let snapshot = from_value::<CouchGameDocument>(doc)
                        .map_err(|source| CouchDaoError::DeserializeValue {
                            path: doc_id.clone(),
                            source,
                        })
                        .and_then(CouchGameDocument::into_versioned)
                        .map_err(|err| StorageError::corrupt(code.clone(), err));
                    match snapshot {
                        Ok(snapshot) if last_revision.as_ref() == Some(&snapshot.revision) => {}
                        Ok(snapshot) => {
                            last_revision = Some(snapshot.revision.clone());
                            yield Ok(snapshot);
                        }
                        Err(err) => yield Err(err),
                    }
                }

                since = Some(response.resume_token());
            }
        })
    }

    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameSummaryEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            let docs = store
                .list_documents::<CouchGameDocument>(GAME_PREFIX)
                .await?;
            let mut summaries = Vec::with_capacity(docs.len());
            for doc in docs {
                let id = doc.id.clone();
                let snapshot = doc
                    .into_versioned()
                    .map_err(|err| StorageError::corrupt(id, err))?;
                summaries.push(GameSummaryEntity::from(&snapshot.document));
            }
            summaries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            Ok(summaries)
        })
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
        Box::pin(async move {
            let url = store.database_url();
            let response = store
                .authorize(store.client.get(&url))
                .send()
                .await
                .map_err(|source| CouchDaoError::RequestSend {
                    path: url.clone(),
                    source,
                })?;

            if response.status().is_success() {
                Ok(())
            } else {
                Err(CouchDaoError::RequestStatus {
                    path: url,
                    status: response.status(),
                }
                .into())
            }
        })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ensure_database().await.map_err(Into::into) })
    }
}
