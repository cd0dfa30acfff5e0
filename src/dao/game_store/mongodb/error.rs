use mongodb::{
    bson,
    error::{Error as MongoError, ErrorKind, WriteFailure},
};
use thiserror::Error;

/// Result alias for MongoDB data-access operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY: i32 = 11000;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Required environment variable is missing.
    #[error("missing MongoDB environment variable `{var}`")]
    MissingEnvVar {
        /// Name of the variable.
        var: &'static str,
    },
    /// Connection string did not parse.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// Offending URI.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Driver client could not be built.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Server never answered the startup ping.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Attempts made.
        attempts: u32,
        /// Last driver error.
        #[source]
        source: MongoError,
    },
    /// Periodic ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Insert of a new game failed.
    #[error("failed to insert game `{code}`")]
    InsertGame {
        /// Game code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a game failed.
    #[error("failed to load game `{code}`")]
    LoadGame {
        /// Game code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Updating a game failed.
    #[error("failed to update game `{code}`")]
    UpdateGame {
        /// Game code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing games failed.
    #[error("failed to list games")]
    ListGames {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a history record failed.
    #[error("failed to save history of game `{code}`")]
    SaveHistory {
        /// Game code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Listing history records failed.
    #[error("failed to list game history")]
    ListHistory {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// A value could not be converted to BSON.
    #[error("failed to encode game `{code}` as BSON")]
    Encode {
        /// Game code.
        code: String,
        /// Encoder error.
        #[source]
        source: bson::ser::Error,
    },
    /// A stored document did not decode into a game.
    #[error("failed to decode game `{code}` from BSON")]
    Decode {
        /// Game code.
        code: String,
        /// Decoder error.
        #[source]
        source: bson::de::Error,
    },
    /// A revision token handed back by a caller is not one of ours.
    #[error("revision `{revision}` of game `{code}` is not a MongoDB revision")]
    InvalidRevision {
        /// Game code.
        code: String,
        /// Offending token.
        revision: String,
    },
}

/// Whether a driver error is a unique-index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error)) if write_error.code == DUPLICATE_KEY
    )
}
