// Copyright 2025 Fernando Borretti
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SQLite-backed storage for the persisted collections.

use std::path::Path;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use studyloop_core::store::KeyValueStore;
use studyloop_core::store::StoreKey;

use crate::error::Context;
use crate::error::Fallible;

const UPSERT: &str = "INSERT INTO store (user, kind, value) VALUES (?1, ?2, ?3)
     ON CONFLICT (user, kind) DO UPDATE SET value = excluded.value";

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open the database at `path`, creating the file and schema if needed.
    pub fn open(path: &Path) -> Fallible<Self> {
        let conn = Connection::open(path)
            .context(&format!("failed to open database {}", path.display()))?;
        let store = SqliteStore { conn };
        store.migrate()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Fallible<Self> {
        let conn = Connection::open_in_memory().context("failed to open database")?;
        let store = SqliteStore { conn };
        store.migrate()?;
        Ok(store)
    }

    fn migrate(&self) -> Fallible<()> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS store (
                    user  TEXT NOT NULL,
                    kind  TEXT NOT NULL,
                    value BLOB NOT NULL,
                    PRIMARY KEY (user, kind)
                );",
            )
            .context("failed to create schema")
    }
}

impl KeyValueStore for SqliteStore {
    fn read(&self, key: &StoreKey) -> Fallible<Option<Vec<u8>>> {
        self.conn
            .query_row(
                "SELECT value FROM store WHERE user = ?1 AND kind = ?2",
                params![key.user, key.kind.as_str()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()
            .context(&format!("failed to read {key}"))
    }

    fn write(&mut self, key: &StoreKey, value: &[u8]) -> Fallible<()> {
        self.conn
            .execute(UPSERT, params![key.user, key.kind.as_str(), value])
            .context(&format!("failed to write {key}"))?;
        Ok(())
    }

    fn write_all(&mut self, entries: &[(StoreKey, Vec<u8>)]) -> Fallible<()> {
        let tx = self
            .conn
            .transaction()
            .context("failed to begin transaction")?;
        {
            let mut stmt = tx.prepare(UPSERT).context("failed to prepare write")?;
            for (key, value) in entries {
                stmt.execute(params![key.user, key.kind.as_str(), value])
                    .context(&format!("failed to write {key}"))?;
            }
        }
        tx.commit().context("failed to commit transaction")
    }
}

#[cfg(test)]
mod tests {
    use studyloop_core::Library;
    use studyloop_core::NewCard;
    use studyloop_core::Timestamp;
    use studyloop_core::store::CollectionKind;
    use studyloop_core::types::card::CardKind;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_read_missing_key() -> Fallible<()> {
        let store = SqliteStore::open_in_memory()?;
        let key = StoreKey::new("ana", CollectionKind::Cards);
        assert_eq!(store.read(&key)?, None);
        Ok(())
    }

    #[test]
    fn test_write_overwrites() -> Fallible<()> {
        let mut store = SqliteStore::open_in_memory()?;
        let key = StoreKey::new("ana", CollectionKind::Stats);
        store.write(&key, b"one")?;
        store.write(&key, b"two")?;
        assert_eq!(store.read(&key)?, Some(b"two".to_vec()));
        let other = StoreKey::new("bo", CollectionKind::Stats);
        assert_eq!(store.read(&other)?, None);
        Ok(())
    }

    #[test]
    fn test_write_all_rolls_back_on_failure() -> Fallible<()> {
        let mut store = SqliteStore::open_in_memory()?;
        let cards = StoreKey::new("ana", CollectionKind::Cards);
        let stats = StoreKey::new("ana", CollectionKind::Stats);
        store.write_all(&[(cards.clone(), b"v1".to_vec()), (stats.clone(), b"v1".to_vec())])?;
        store
            .conn
            .execute_batch(
                "CREATE TRIGGER reject_stats BEFORE UPDATE ON store
                 WHEN NEW.kind = 'stats'
                 BEGIN SELECT RAISE(ABORT, 'stats rejected'); END;",
            )
            .context("failed to create trigger")?;

        let result =
            store.write_all(&[(cards.clone(), b"v2".to_vec()), (stats.clone(), b"v2".to_vec())]);
        assert!(result.is_err());
        assert_eq!(store.read(&cards)?, Some(b"v1".to_vec()));
        assert_eq!(store.read(&stats)?, Some(b"v1".to_vec()));
        Ok(())
    }

    #[test]
    fn test_library_survives_reopen() -> Fallible<()> {
        let dir = tempdir()?;
        let path = dir.path().join("studyloop.db");
        let now = Timestamp::try_from("2024-03-01T12:30:00.250".to_string())?;
        let mut library = Library::default();
        library.import(
            "geo",
            "Geography",
            "",
            vec![NewCard {
                prompt: "Capital of Peru?".to_string(),
                answer: "Lima".to_string(),
                kind: CardKind::OpenResponse,
                difficulty: Default::default(),
                explanation: None,
                options: vec![],
                pairs: vec![],
            }],
            now,
        );
        {
            let mut store = SqliteStore::open(&path)?;
            library.save(&mut store, "ana")?;
        }
        let store = SqliteStore::open(&path)?;
        let loaded = Library::load(&store, "ana")?;
        assert_eq!(loaded, library);
        assert_eq!(loaded.cards[0].next_due, now);
        Ok(())
    }
}
