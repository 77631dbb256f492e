use rusqlite::{Connection, OptionalExtension, params};

use tripweave_core::{Itinerary, ItineraryId, RevisionRecord};

use crate::error::StoreError;
use crate::traits::DocumentStore;

/// SQLite-backed document and revision store. Documents and revision
/// records are msgpack blobs; version and owner columns are duplicated
/// out of the blob for conditional writes and queries.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    fn stored_version(&self, id: ItineraryId) -> Result<Option<u64>, StoreError> {
        let version: Option<i64> = self
            .conn
            .query_row(
                "SELECT version FROM documents WHERE itinerary_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.map(|v| v as u64))
    }
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    rmp_serde::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    rmp_serde::from_slice(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl DocumentStore for SqliteStore {
    fn get(&self, id: ItineraryId) -> Result<Option<Itinerary>, StoreError> {
        let blob: Option<Vec<u8>> = self
            .conn
            .query_row(
                "SELECT doc FROM documents WHERE itinerary_id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        match blob {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&mut self, doc: &Itinerary) -> Result<(), StoreError> {
        let blob = encode(doc)?;
        self.conn.execute(
            "INSERT INTO documents (itinerary_id, version, owner_id, doc)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (itinerary_id) DO UPDATE SET
                 version = excluded.version,
                 owner_id = excluded.owner_id,
                 doc = excluded.doc,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)",
            params![
                doc.id.to_string(),
                doc.version as i64,
                doc.owner_id,
                blob
            ],
        )?;
        Ok(())
    }

    fn put_if_version(&mut self, doc: &Itinerary, expected: u64) -> Result<(), StoreError> {
        let blob = encode(doc)?;
        let changed = self.conn.execute(
            "UPDATE documents SET
                 version = ?1,
                 owner_id = ?2,
                 doc = ?3,
                 updated_at = CAST(unixepoch('now','subsec') * 1000 AS INTEGER)
             WHERE itinerary_id = ?4 AND version = ?5",
            params![
                doc.version as i64,
                doc.owner_id,
                blob,
                doc.id.to_string(),
                expected as i64
            ],
        )?;
        if changed == 1 {
            return Ok(());
        }
        match self.stored_version(doc.id)? {
            Some(found) => Err(StoreError::VersionMismatch { expected, found }),
            None => Err(StoreError::NotFound(doc.id.to_string())),
        }
    }

    fn get_revision(
        &self,
        id: ItineraryId,
        version: u64,
    ) -> Result<Option<(RevisionRecord, Itinerary)>, StoreError> {
        let row: Option<(Vec<u8>, Vec<u8>)> = self
            .conn
            .query_row(
                "SELECT record, snapshot FROM revisions
                 WHERE itinerary_id = ?1 AND version = ?2",
                params![id.to_string(), version as i64],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            Some((record_bytes, snapshot_bytes)) => Ok(Some((
                decode(&record_bytes)?,
                decode(&snapshot_bytes)?,
            ))),
            None => Ok(None),
        }
    }

    fn put_revision(
        &mut self,
        record: &RevisionRecord,
        snapshot: &Itinerary,
    ) -> Result<(), StoreError> {
        let record_bytes = encode(record)?;
        let snapshot_bytes = encode(snapshot)?;
        let result = self.conn.execute(
            "INSERT INTO revisions (itinerary_id, version, revision_id, record, snapshot)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                record.itinerary_id.to_string(),
                record.from_version as i64,
                record.id.to_string(),
                record_bytes,
                snapshot_bytes
            ],
        );
        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StoreError::RevisionExists {
                    version: record.from_version,
                })
            }
            Err(e) => Err(StoreError::Sqlite(e)),
        }
    }

    fn revisions_since(
        &self,
        id: ItineraryId,
        base_version: u64,
    ) -> Result<Vec<RevisionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT record FROM revisions
             WHERE itinerary_id = ?1 AND version >= ?2
             ORDER BY version ASC",
        )?;
        let rows = stmt.query_map(params![id.to_string(), base_version as i64], |row| {
            row.get::<_, Vec<u8>>(0)
        })?;
        let mut records = Vec::new();
        for row in rows {
            records.push(decode(&row?)?);
        }
        Ok(records)
    }

    fn list_revisions(&self, id: ItineraryId) -> Result<Vec<RevisionRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT record FROM revisions
             WHERE itinerary_id = ?1
             ORDER BY version DESC",
        )?;
        let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, Vec<u8>>(0))?;
        let mut records = Vec::new();
        for row in rows {
            records.push(decode(&row?)?);
        }
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tripweave_core::{Day, Node, RevisionId};

    fn doc() -> Itinerary {
        let mut it = Itinerary::new(ItineraryId::new(), "owner-1", Utc::now());
        let mut day = Day::new(1);
        day.nodes.push(Node::new("n1", "activity", "Museum"));
        day.rebuild_chain_edges();
        it.days.push(day);
        it
    }

    fn revision(it: &Itinerary) -> RevisionRecord {
        RevisionRecord {
            id: RevisionId::new(),
            itinerary_id: it.id,
            from_version: it.version,
            to_version: it.version + 1,
            created_at: Utc::now(),
            agent: Some("test".into()),
            reason: None,
            owner_id: it.owner_id.clone(),
            details: Vec::new(),
        }
    }

    #[test]
    fn put_get_roundtrip() -> Result<(), StoreError> {
        let mut store = SqliteStore::open_in_memory()?;
        let it = doc();
        store.put(&it)?;
        let loaded = store.get(it.id)?.unwrap();
        assert_eq!(loaded, it);
        assert!(store.get(ItineraryId::new())?.is_none());
        Ok(())
    }

    #[test]
    fn conditional_put_detects_racing_writer() -> Result<(), StoreError> {
        let mut store = SqliteStore::open_in_memory()?;
        let mut it = doc();
        store.put(&it)?;

        it.version = 2;
        store.put_if_version(&it, 1)?;

        // Same expected version again: the row moved to 2 underneath us.
        it.version = 3;
        let err = store.put_if_version(&it, 1).unwrap_err();
        assert!(matches!(
            err,
            StoreError::VersionMismatch { expected: 1, found: 2 }
        ));
        Ok(())
    }

    #[test]
    fn conditional_put_on_missing_document() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let it = doc();
        let err = store.put_if_version(&it, 1).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn revisions_are_append_only() -> Result<(), StoreError> {
        let mut store = SqliteStore::open_in_memory()?;
        let it = doc();
        let rec = revision(&it);
        store.put_revision(&rec, &it)?;

        let dup = revision(&it);
        let err = store.put_revision(&dup, &it).unwrap_err();
        assert!(matches!(err, StoreError::RevisionExists { version: 1 }));

        let (loaded, snapshot) = store.get_revision(it.id, 1)?.unwrap();
        assert_eq!(loaded, rec);
        assert_eq!(snapshot, it);
        Ok(())
    }

    #[test]
    fn revision_listing_and_since() -> Result<(), StoreError> {
        let mut store = SqliteStore::open_in_memory()?;
        let mut it = doc();
        for _ in 0..3 {
            let rec = revision(&it);
            store.put_revision(&rec, &it)?;
            it.version += 1;
        }

        let newest_first = store.list_revisions(it.id)?;
        assert_eq!(newest_first.len(), 3);
        assert_eq!(newest_first[0].from_version, 3);
        assert_eq!(newest_first[2].from_version, 1);

        let since = store.revisions_since(it.id, 2)?;
        assert_eq!(since.len(), 2);
        assert_eq!(since[0].from_version, 2);
        Ok(())
    }

    #[test]
    fn on_disk_store_reopens() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("itineraries.db");
        let path = path.to_str().unwrap();

        let it = doc();
        {
            let mut store = SqliteStore::open(path)?;
            store.put(&it)?;
        }
        let store = SqliteStore::open(path)?;
        assert_eq!(store.get(it.id)?.unwrap(), it);
        Ok(())
    }
}
