#[cfg(feature = "couch-store")]
pub mod couchdb;
pub mod memory;
#[cfg(feature = "mongo-store")]
pub mod mongodb;

use std::fmt;

use futures::{future::BoxFuture, stream::BoxStream};

use crate::dao::{
    models::{GameDocument, GameHistoryEntry, GameSummaryEntity},
    patch::Patch,
    storage::StorageResult,
};

/// Opaque revision token of a stored document. Backends choose the representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Revision(String);

impl Revision {
    /// Wrap a backend revision token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Raw token.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for Revision {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A document together with the revision it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    /// Revision the value was read at.
    pub revision: Revision,
    /// The value.
    pub document: T,
}

/// Guard attached to an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteCondition {
    /// Apply the writes whatever happened since the read; each path is last-write-wins.
    None,
    /// Apply the writes only if the document is still at this revision.
    Revision(Revision),
}

/// Stream of full snapshots pushed after every committed write.
pub type GameStream = BoxStream<'static, StorageResult<Versioned<GameDocument>>>;

/// Abstraction over the shared document store holding every game.
pub trait GameStore: Send + Sync {
    /// Insert a brand-new document; fails with `AlreadyExists` if the code is taken.
    fn create_game(&self, document: GameDocument) -> BoxFuture<'static, StorageResult<Revision>>;
    /// Read the current document, if any.
    fn load_game(
        &self,
        code: String,
    ) -> BoxFuture<'static, StorageResult<Option<Versioned<GameDocument>>>>;
    /// Apply `patch` to the stored document and return the new revision.
    fn update_game(
        &self,
        code: String,
        patch: Patch,
        condition: WriteCondition,
    ) -> BoxFuture<'static, StorageResult<Revision>>;
    /// Current snapshot followed by one snapshot per committed write, from any writer.
    fn watch_game(&self, code: String) -> GameStream;
    /// Lobby listing of every stored game.
    fn list_games(&self) -> BoxFuture<'static, StorageResult<Vec<GameSummaryEntity>>>;
    /// Store the record of a finished game, replacing an earlier record for the same code.
    fn save_history(&self, entry: GameHistoryEntry) -> BoxFuture<'static, StorageResult<()>>;
    /// Finished games, most recent first, at most `limit` of them.
    fn list_history(&self, limit: usize)
    -> BoxFuture<'static, StorageResult<Vec<GameHistoryEntry>>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the backend connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
