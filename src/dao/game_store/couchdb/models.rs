use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dao::{
    game_store::{Revision, Versioned},
    models::{GameDocument, GameHistoryEntry},
};

use super::error::{CouchDaoError, CouchResult};

pub const GAME_PREFIX: &str = "game::";
pub const END_SUFFIX: &str = "\u{ffff}";

/// CouchDB document id for a game code.
pub fn game_doc_id(code: &str) -> String {
    format!("{GAME_PREFIX}{code}")
}

pub const HISTORY_PREFIX: &str = "history::";

/// CouchDB document id for the history record of a game code.
pub fn history_doc_id(code: &str) -> String {
    format!("{HISTORY_PREFIX}{code}")
}

#[derive(Debug, Deserialize)]
pub struct AllDocsResponse {
    pub rows: Vec<AllDocsRow>,
}

#[derive(Debug, Deserialize)]
pub struct AllDocsRow {
    #[serde(default)]
    pub doc: Option<Value>,
}

#[derive(Debug, Deserialize)]
pub struct PutResponse {
    pub rev: String,
}

#[derive(Debug, Deserialize)]
pub struct ChangesResponse {
    #[serde(default)]
    pub results: Vec<ChangeRow>,
    pub last_seq: Value,
}

impl ChangesResponse {
    /// Sequence token to resume the feed from. CouchDB 1.x sends numbers, later versions strings.
    pub fn resume_token(&self) -> String {
        match &self.last_seq {
            Value::String(token) => token.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ChangeRow {
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub doc: Option<Value>,
}

/// Only the revision of a stored document.
#[derive(Debug, Deserialize)]
pub struct RevisionOnly {
    #[serde(rename = "_rev")]
    pub rev: String,
}

/// History record as stored in CouchDB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchHistoryDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub entry: GameHistoryEntry,
}

/// A game as stored in CouchDB: the shared body plus CouchDB bookkeeping.
///
/// The body is kept as raw JSON so field-path patches apply to exactly what is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchGameDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl CouchGameDocument {
    /// Fresh document without a revision, ready for a first PUT.
    pub fn from_game(document: &GameDocument) -> CouchResult<Self> {
        let id = game_doc_id(&document.code);
        let body = match serde_json::to_value(document) {
            Ok(Value::Object(body)) => body,
            Ok(_) => Map::new(),
            Err(source) => return Err(CouchDaoError::DeserializeValue { path: id, source }),
        };
        Ok(Self {
            id,
            rev: None,
            body,
        })
    }

    /// Decode the body into a typed snapshot at the stored revision.
    pub fn into_versioned(self) -> CouchResult<Versioned<GameDocument>> {
        let revision = self
            .rev
            .map(Revision::new)
            .ok_or_else(|| CouchDaoError::MissingRevision {
                doc_id: self.id.clone(),
            })?;
        let document = serde_json::from_value(Value::Object(self.body))
            .map_err(|source| CouchDaoError::DeserializeValue {
                path: self.id,
                source,
            })?;
        Ok(Versioned { revision, document })
    }
}

#[cfg(test)]
mod tests {
    use std::time::SystemTime;

    use serde_json::json;
    use uuid::Uuid;

    use super::*;
    use crate::dao::models::{Player, Team, WinReason};

    #[test]
    fn couch_fields_stay_outside_the_body() {
        let game = GameDocument::new(
            "QWERTY",
            "RAVEN",
            Uuid::nil(),
            Player::new("Ada", SystemTime::UNIX_EPOCH),
        );
        let mut stored = CouchGameDocument::from_game(&game).unwrap();
        stored.rev = Some("1-abc".into());

        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["_id"], "game::QWERTY");
        assert_eq!(value["_rev"], "1-abc");
        assert_eq!(value["displayName"], "RAVEN");

        let decoded: CouchGameDocument = serde_json::from_value(value).unwrap();
        assert!(!decoded.body.contains_key("_rev"));
        let versioned = decoded.into_versioned().unwrap();
        assert_eq!(versioned.revision.as_str(), "1-abc");
        assert_eq!(versioned.document, game);
    }

    #[test]
    fn history_records_live_under_their_own_prefix() {
        let stored = CouchHistoryDocument {
            id: history_doc_id("QWERTY"),
            rev: None,
            entry: GameHistoryEntry {
                game_id: "QWERTY".into(),
                finished_at: SystemTime::UNIX_EPOCH,
                duration_ms: 5,
                display_name: "RAVEN".into(),
                winner: Team::Red,
                win_reason: WinReason::Assassin,
                created_by: "Ada".into(),
                players: Default::default(),
            },
        };

        let value = serde_json::to_value(&stored).unwrap();
        assert_eq!(value["_id"], "history::QWERTY");
        assert!(value.get("_rev").is_none());
        assert_eq!(value["winner"], "red");

        let decoded: CouchHistoryDocument = serde_json::from_value(value).unwrap();
        assert_eq!(decoded.entry, stored.entry);
    }

    #[test]
    fn resume_token_accepts_numeric_sequences() {
        let response: ChangesResponse =
            serde_json::from_value(json!({"results": [], "last_seq": 42})).unwrap();
        assert_eq!(response.resume_token(), "42");

        let response: ChangesResponse =
            serde_json::from_value(json!({"results": [], "last_seq": "7-g1AAAA"})).unwrap();
        assert_eq!(response.resume_token(), "7-g1AAAA");
    }
}
