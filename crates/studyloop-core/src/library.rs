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

//! The persisted state of one user: every card, deck and the global stats.

use std::collections::HashSet;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::aggregate::GlobalStats;
use crate::aggregate::SessionOutcome;
use crate::aggregate::SessionReport;
use crate::aggregate::aggregate;
use crate::aggregate::cards_mastered;
use crate::aggregate::deck_mastery;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::store::CollectionKind;
use crate::store::KeyValueStore;
use crate::store::StoreKey;
use crate::types::card::Card;
use crate::types::card::NewCard;
use crate::types::card_id::CardId;
use crate::types::deck::Deck;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Library {
    pub cards: Vec<Card>,
    pub decks: Vec<Deck>,
    pub stats: GlobalStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ImportSummary {
    pub added: usize,
    pub duplicates: usize,
}

fn read_collection<T: DeserializeOwned + Default>(
    store: &impl KeyValueStore,
    key: &StoreKey,
) -> Fallible<T> {
    match store.read(key)? {
        Some(bytes) => Ok(serde_json::from_slice(&bytes)?),
        None => Ok(T::default()),
    }
}

fn encode<T: Serialize>(
    user: &str,
    kind: CollectionKind,
    value: &T,
) -> Fallible<(StoreKey, Vec<u8>)> {
    Ok((StoreKey::new(user, kind), serde_json::to_vec(value)?))
}

impl Library {
    pub fn load(store: &impl KeyValueStore, user: &str) -> Fallible<Self> {
        Ok(Library {
            cards: read_collection(store, &StoreKey::new(user, CollectionKind::Cards))?,
            decks: read_collection(store, &StoreKey::new(user, CollectionKind::Decks))?,
            stats: read_collection(store, &StoreKey::new(user, CollectionKind::Stats))?,
        })
    }

    /// Write all three collections in one batch, so a failure leaves the
    /// store as it was.
    pub fn save(&self, store: &mut impl KeyValueStore, user: &str) -> Fallible<()> {
        let entries = [
            encode(user, CollectionKind::Cards, &self.cards)?,
            encode(user, CollectionKind::Decks, &self.decks)?,
            encode(user, CollectionKind::Stats, &self.stats)?,
        ];
        store.write_all(&entries)
    }

    pub fn deck(&self, id: &str) -> Option<&Deck> {
        self.decks.iter().find(|d| d.id == id)
    }

    pub fn deck_cards(&self, id: &str) -> Vec<Card> {
        self.cards
            .iter()
            .filter(|c| c.deck_id == id)
            .cloned()
            .collect()
    }

    /// Add provider cards to a deck, creating the deck if needed. Cards whose
    /// content is already in the deck are skipped.
    pub fn import(
        &mut self,
        deck_id: &str,
        title: &str,
        description: &str,
        new_cards: Vec<NewCard>,
        now: Timestamp,
    ) -> ImportSummary {
        if self.deck(deck_id).is_none() {
            self.decks.push(Deck::new(deck_id, title, description, now));
        }
        let mut known: HashSet<CardId> = self
            .cards
            .iter()
            .filter(|c| c.deck_id == deck_id)
            .map(|c| c.id)
            .collect();
        let mut summary = ImportSummary {
            added: 0,
            duplicates: 0,
        };
        for new in new_cards {
            if known.insert(new.id_in(deck_id)) {
                self.cards.push(Card::ingest(new, deck_id, now));
                summary.added += 1;
            } else {
                summary.duplicates += 1;
            }
        }
        self.refresh_deck(deck_id);
        summary
    }

    /// Delete a deck and its cards. Returns the number of cards removed, or
    /// `None` if there is no such deck.
    pub fn remove_deck(&mut self, deck_id: &str) -> Option<usize> {
        self.deck(deck_id)?;
        self.decks.retain(|d| d.id != deck_id);
        let before = self.cards.len();
        self.cards.retain(|c| c.deck_id != deck_id);
        self.stats.cards_mastered = cards_mastered(&self.cards);
        Some(before - self.cards.len())
    }

    /// Compute the state after a session without touching `self` or the
    /// store.
    pub fn prepare_commit(&self, outcome: &SessionOutcome, now: Timestamp) -> PendingCommit {
        let agg = aggregate(&self.cards, &self.decks, &self.stats, outcome, now);
        PendingCommit {
            library: Library {
                cards: agg.cards,
                decks: agg.decks,
                stats: agg.stats,
            },
            report: agg.report,
        }
    }

    /// Write a pending commit. On failure the pending commit is handed back
    /// so the write can be retried, and `self` is left unchanged.
    pub fn commit(
        &mut self,
        pending: PendingCommit,
        store: &mut impl KeyValueStore,
        user: &str,
    ) -> Result<SessionReport, CommitError> {
        if let Err(error) = pending.library.save(store, user) {
            log::warn!("failed to persist session results: {error}");
            return Err(CommitError { error, pending });
        }
        let PendingCommit { library, report } = pending;
        *self = library;
        Ok(report)
    }

    fn refresh_deck(&mut self, deck_id: &str) {
        let total = self.cards.iter().filter(|c| c.deck_id == deck_id).count();
        let mastery = deck_mastery(&self.cards, deck_id);
        if let Some(deck) = self.decks.iter_mut().find(|d| d.id == deck_id) {
            deck.total_cards = total;
            deck.mastery_level = mastery;
        }
    }
}

/// Session results that have been computed but not yet written.
#[derive(Clone, Debug, PartialEq)]
pub struct PendingCommit {
    library: Library,
    report: SessionReport,
}

impl PendingCommit {
    pub fn report(&self) -> &SessionReport {
        &self.report
    }
}

/// A failed write, carrying the results so they are not lost.
#[derive(Debug)]
pub struct CommitError {
    pub error: ErrorReport,
    pub pending: PendingCommit,
}

impl Display for CommitError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "could not save session results: {}", self.error)
    }
}

impl Error for CommitError {}

impl From<CommitError> for ErrorReport {
    fn from(value: CommitError) -> Self {
        ErrorReport::new(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::SessionResults;
    use crate::error::fail;
    use crate::store::MemoryStore;
    use crate::types::card::CardKind;
    use crate::types::rating::Rating;

    fn ts(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    fn new_cards(n: usize) -> Vec<NewCard> {
        (0..n)
            .map(|i| NewCard {
                prompt: format!("Q{i}"),
                answer: format!("A{i}"),
                kind: CardKind::OpenResponse,
                difficulty: Default::default(),
                explanation: None,
                options: vec![],
                pairs: vec![],
            })
            .collect()
    }

    /// Fails the first `failures` writes.
    struct FlakyStore {
        inner: MemoryStore,
        failures: usize,
    }

    impl KeyValueStore for FlakyStore {
        fn read(&self, key: &StoreKey) -> Fallible<Option<Vec<u8>>> {
            self.inner.read(key)
        }

        fn write(&mut self, key: &StoreKey, value: &[u8]) -> Fallible<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return fail("disk full");
            }
            self.inner.write(key, value)
        }

        fn write_all(&mut self, entries: &[(StoreKey, Vec<u8>)]) -> Fallible<()> {
            if self.failures > 0 {
                self.failures -= 1;
                return fail("disk full");
            }
            self.inner.write_all(entries)
        }
    }

    /// Rejects any write touching `rejected`; a rejected batch applies
    /// nothing.
    struct RejectingStore {
        inner: MemoryStore,
        rejected: Option<CollectionKind>,
    }

    impl KeyValueStore for RejectingStore {
        fn read(&self, key: &StoreKey) -> Fallible<Option<Vec<u8>>> {
            self.inner.read(key)
        }

        fn write(&mut self, key: &StoreKey, value: &[u8]) -> Fallible<()> {
            if Some(key.kind) == self.rejected {
                return fail("stats table is read-only");
            }
            self.inner.write(key, value)
        }

        fn write_all(&mut self, entries: &[(StoreKey, Vec<u8>)]) -> Fallible<()> {
            if entries.iter().any(|(key, _)| Some(key.kind) == self.rejected) {
                return fail("stats table is read-only");
            }
            self.inner.write_all(entries)
        }
    }

    fn outcome(library: &Library, rating: Rating) -> SessionOutcome {
        let mut results = SessionResults::default();
        for card in &library.cards {
            results.record(card.id, rating);
        }
        SessionOutcome {
            deck_id: "bio".to_string(),
            started_at: ts("2024-02-01T09:00:00.000"),
            results,
        }
    }

    #[test]
    fn test_load_empty_store() -> Fallible<()> {
        let library = Library::load(&MemoryStore::new(), "ana")?;
        assert_eq!(library, Library::default());
        Ok(())
    }

    #[test]
    fn test_import_skips_duplicates() {
        let mut library = Library::default();
        let now = ts("2024-02-01T08:00:00.000");
        let first = library.import("bio", "Biology", "", new_cards(3), now);
        assert_eq!(first, ImportSummary { added: 3, duplicates: 0 });
        let second = library.import("bio", "Biology", "", new_cards(4), now);
        assert_eq!(second, ImportSummary { added: 1, duplicates: 3 });
        assert_eq!(library.decks.len(), 1);
        assert_eq!(library.deck("bio").map(|d| d.total_cards), Some(4));
    }

    #[test]
    fn test_save_and_reload_roundtrip() -> Fallible<()> {
        let mut store = MemoryStore::new();
        let mut library = Library::default();
        library.import("bio", "Biology", "cells", new_cards(2), ts("2024-02-01T08:00:00.000"));
        let pending = library.prepare_commit(
            &outcome(&library, Rating::GOOD),
            ts("2024-02-01T10:00:00.000"),
        );
        library.commit(pending, &mut store, "ana")?;
        let reloaded = Library::load(&store, "ana")?;
        assert_eq!(reloaded, library);
        for (a, b) in reloaded.cards.iter().zip(library.cards.iter()) {
            assert_eq!(a.schedule, b.schedule);
            assert_eq!(a.next_due, b.next_due);
        }
        assert!(Library::load(&store, "bo")?.cards.is_empty());
        Ok(())
    }

    #[test]
    fn test_failed_commit_can_be_retried() -> Fallible<()> {
        let mut store = FlakyStore {
            inner: MemoryStore::new(),
            failures: 1,
        };
        let mut library = Library::default();
        library.import("bio", "Biology", "", new_cards(2), ts("2024-02-01T08:00:00.000"));
        let before = library.clone();
        let pending = library.prepare_commit(
            &outcome(&library, Rating::PERFECT),
            ts("2024-02-01T10:00:00.000"),
        );
        let expected = pending.clone();

        let err = library
            .commit(pending, &mut store, "ana")
            .expect_err("first write fails");
        assert_eq!(library, before);
        assert_eq!(err.pending, expected);
        assert_eq!(err.pending.report().xp_gained, 100);

        let report = library.commit(err.pending, &mut store, "ana")?;
        assert_eq!(report.deck_mastery, 100);
        assert_eq!(library.stats.total_xp, 100);
        assert_eq!(Library::load(&store, "ana")?, library);
        Ok(())
    }

    #[test]
    fn test_failed_commit_leaves_store_untouched() -> Fallible<()> {
        let mut store = RejectingStore {
            inner: MemoryStore::new(),
            rejected: None,
        };
        let mut library = Library::default();
        library.import("bio", "Biology", "", new_cards(2), ts("2024-02-01T08:00:00.000"));
        library.save(&mut store, "ana")?;
        let before = library.clone();

        store.rejected = Some(CollectionKind::Stats);
        let pending = library.prepare_commit(
            &outcome(&library, Rating::PERFECT),
            ts("2024-02-01T10:00:00.000"),
        );
        assert!(library.commit(pending, &mut store, "ana").is_err());

        let stored = Library::load(&store, "ana")?;
        assert_eq!(stored, before);
        assert_eq!(stored.cards[0].schedule.repetition, 0);
        assert_eq!(stored.deck("bio").map(|d| d.mastery_level), Some(0));
        Ok(())
    }

    #[test]
    fn test_remove_deck() {
        let mut library = Library::default();
        let now = ts("2024-02-01T08:00:00.000");
        library.import("bio", "Biology", "", new_cards(2), now);
        library.import("chem", "Chemistry", "", new_cards(3), now);
        assert_eq!(library.remove_deck("bio"), Some(2));
        assert_eq!(library.remove_deck("bio"), None);
        assert_eq!(library.cards.len(), 3);
        assert!(library.deck("chem").is_some());
    }
}
