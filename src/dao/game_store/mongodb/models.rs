use mongodb::bson::{Bson, Document, doc, from_document, to_bson, to_document};

use crate::dao::{
    game_store::{Revision, Versioned},
    models::{GameDocument, GameHistoryEntry},
    patch::{PATH_SEPARATOR, Patch},
};

use super::error::{MongoDaoError, MongoResult};

/// Field carrying the per-document revision counter.
pub const REVISION_FIELD: &str = "_rev";

/// Filter selecting the game stored under `code`.
pub fn code_filter(code: &str) -> Document {
    doc! { "_id": code }
}

/// Read the revision counter of a stored document; legacy documents without one read as 0.
pub fn stored_revision(stored: &Document) -> i64 {
    match stored.get(REVISION_FIELD) {
        Some(Bson::Int64(value)) => *value,
        Some(Bson::Int32(value)) => i64::from(*value),
        _ => 0,
    }
}

/// BSON document for a first insert, at revision 1.
pub fn to_stored(document: &GameDocument) -> MongoResult<Document> {
    let mut stored = to_document(document).map_err(|source| MongoDaoError::Encode {
        code: document.code.clone(),
        source,
    })?;
    stored.insert("_id", document.code.as_str());
    stored.insert(REVISION_FIELD, 1_i64);
    Ok(stored)
}

/// Decode a stored BSON document; `_id` and `_rev` are ignored by the game model.
pub fn from_stored(code: &str, stored: Document) -> MongoResult<Versioned<GameDocument>> {
    let revision = Revision::new(stored_revision(&stored).to_string());
    let document = from_document(stored).map_err(|source| MongoDaoError::Decode {
        code: code.to_owned(),
        source,
    })?;
    Ok(Versioned { revision, document })
}

/// BSON history record keyed by game code, so a rematch replaces the previous record.
pub fn history_to_stored(entry: &GameHistoryEntry) -> MongoResult<Document> {
    let mut stored = to_document(entry).map_err(|source| MongoDaoError::Encode {
        code: entry.game_id.clone(),
        source,
    })?;
    stored.insert("_id", entry.game_id.as_str());
    Ok(stored)
}

/// Decode a stored history record.
pub fn history_from_stored(stored: Document) -> MongoResult<GameHistoryEntry> {
    let code = stored.get_str("_id").unwrap_or_default().to_owned();
    from_document(stored).map_err(|source| MongoDaoError::Decode { code, source })
}

/// Translate a [`Patch`] into one atomic update: `$set`/`$unset` on dotted paths plus a
/// revision bump.
pub fn update_from_patch(code: &str, patch: &Patch) -> MongoResult<Document> {
    let mut set = Document::new();
    let mut unset = Document::new();

    for (path, value) in patch.iter() {
        let key = path.replace(PATH_SEPARATOR, ".");
        if value.is_null() {
            unset.insert(key, "");
        } else {
            let value = to_bson(value).map_err(|source| MongoDaoError::Encode {
                code: code.to_owned(),
                source,
            })?;
            set.insert(key, value);
        }
    }

    let mut update = doc! { "$inc": { REVISION_FIELD: 1_i64 } };
    if !set.is_empty() {
        update.insert("$set", set);
    }
    if !unset.is_empty() {
        update.insert("$unset", unset);
    }
    Ok(update)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn patches_become_dotted_set_and_unset() {
        let mut patch = Patch::new();
        patch.set("gameState/revealedCards/3", json!(true));
        patch.set("gameState/currentClue", json!(null));

        let update = update_from_patch("ABCDEF", &patch).unwrap();
        assert_eq!(
            update.get_document("$set").unwrap(),
            &doc! { "gameState.revealedCards.3": true }
        );
        assert!(
            update
                .get_document("$unset")
                .unwrap()
                .contains_key("gameState.currentClue")
        );
        assert_eq!(
            update.get_document("$inc").unwrap(),
            &doc! { "_rev": 1_i64 }
        );
    }

    #[test]
    fn missing_revision_reads_as_zero() {
        assert_eq!(stored_revision(&doc! { "_id": "X" }), 0);
        assert_eq!(stored_revision(&doc! { "_rev": 4 }), 4);
    }
}
