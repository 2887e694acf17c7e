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

//! The persistence collaborator: an opaque keyed byte store.

use std::collections::HashMap;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::error::Fallible;
use crate::types::aliases::UserId;

/// Which whole collection a key refers to.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum CollectionKind {
    Cards,
    Decks,
    Stats,
}

impl CollectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionKind::Cards => "cards",
            CollectionKind::Decks => "decks",
            CollectionKind::Stats => "stats",
        }
    }
}

#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StoreKey {
    pub user: UserId,
    pub kind: CollectionKind,
}

impl StoreKey {
    pub fn new(user: &str, kind: CollectionKind) -> Self {
        StoreKey {
            user: user.to_string(),
            kind,
        }
    }
}

impl Display for StoreKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.user, self.kind.as_str())
    }
}

/// Whole-value reads and writes; the last write wins.
pub trait KeyValueStore {
    fn read(&self, key: &StoreKey) -> Fallible<Option<Vec<u8>>>;
    fn write(&mut self, key: &StoreKey, value: &[u8]) -> Fallible<()>;
    /// Write every entry or none of them.
    fn write_all(&mut self, entries: &[(StoreKey, Vec<u8>)]) -> Fallible<()>;
}

#[derive(Default)]
pub struct MemoryStore {
    entries: HashMap<StoreKey, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &StoreKey) -> Fallible<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &StoreKey, value: &[u8]) -> Fallible<()> {
        self.entries.insert(key.clone(), value.to_vec());
        Ok(())
    }

    fn write_all(&mut self, entries: &[(StoreKey, Vec<u8>)]) -> Fallible<()> {
        for (key, value) in entries {
            self.entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_last_write_wins() -> Fallible<()> {
        let mut store = MemoryStore::new();
        let key = StoreKey::new("ana", CollectionKind::Stats);
        assert_eq!(store.read(&key)?, None);
        store.write(&key, b"one")?;
        store.write(&key, b"two")?;
        assert_eq!(store.read(&key)?, Some(b"two".to_vec()));
        assert_eq!(store.read(&StoreKey::new("bo", CollectionKind::Stats))?, None);
        Ok(())
    }

    #[test]
    fn test_memory_store_write_all() -> Fallible<()> {
        let mut store = MemoryStore::new();
        let cards = StoreKey::new("ana", CollectionKind::Cards);
        let stats = StoreKey::new("ana", CollectionKind::Stats);
        store.write(&cards, b"old")?;
        store.write_all(&[(cards.clone(), b"new".to_vec()), (stats.clone(), b"s".to_vec())])?;
        assert_eq!(store.read(&cards)?, Some(b"new".to_vec()));
        assert_eq!(store.read(&stats)?, Some(b"s".to_vec()));
        Ok(())
    }

    #[test]
    fn test_key_display() {
        assert_eq!(
            StoreKey::new("ana", CollectionKind::Cards).to_string(),
            "ana/cards"
        );
    }
}
