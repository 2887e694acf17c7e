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

//! Folding a finished session into long-term card state and statistics.

use std::collections::BTreeMap;

use chrono::Duration;
use serde::Deserialize;
use serde::Serialize;

use crate::sm2::review;
use crate::types::aliases::DeckId;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::deck::Deck;
use crate::types::rating::Rating;
use crate::types::timestamp::Timestamp;

/// Experience awarded per rating point.
const XP_PER_POINT: u64 = 10;

/// A study streak continues if the previous session ended less than this
/// many hours ago.
const STREAK_WINDOW_HOURS: i64 = 48;

/// The last rating recorded for each card in a session.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionResults {
    ratings: BTreeMap<CardId, Rating>,
}

impl SessionResults {
    /// Record a rating, replacing any earlier one for the same card.
    pub fn record(&mut self, id: CardId, rating: Rating) {
        self.ratings.insert(id, rating);
    }

    pub fn get(&self, id: CardId) -> Option<Rating> {
        self.ratings.get(&id).copied()
    }

    pub fn len(&self) -> usize {
        self.ratings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (CardId, Rating)> + '_ {
        self.ratings.iter().map(|(id, r)| (*id, *r))
    }

    pub fn xp(&self) -> u64 {
        self.ratings
            .values()
            .map(|r| r.value() as u64 * XP_PER_POINT)
            .sum()
    }

    pub fn average_score(&self) -> f64 {
        if self.ratings.is_empty() {
            return 0.0;
        }
        let total: f64 = self.ratings.values().map(|r| f64::from(*r)).sum();
        total / self.ratings.len() as f64
    }
}

/// Everything the aggregator needs from a completed session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub deck_id: DeckId,
    pub started_at: Timestamp,
    pub results: SessionResults,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalStats {
    /// Consecutive study days.
    pub streak: u32,
    pub last_study: Option<Timestamp>,
    pub total_xp: u64,
    /// Cards across all decks with an interval of at least one day.
    pub cards_mastered: usize,
}

/// The single update applied to global stats after a session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StatsTransaction {
    pub studied_at: Timestamp,
    pub xp_delta: u64,
    pub cards_mastered: usize,
}

impl GlobalStats {
    /// Fold one session into the stats.
    ///
    /// Timestamps are local wall-clock times, so the streak window is
    /// measured on the wall clock: across a daylight-saving change it spans
    /// one hour more or less of real time.
    pub fn apply(&self, tx: &StatsTransaction) -> GlobalStats {
        let continues = self
            .last_study
            .is_some_and(|last| tx.studied_at.since(last) < Duration::hours(STREAK_WINDOW_HOURS));
        GlobalStats {
            streak: if continues { self.streak + 1 } else { 1 },
            last_study: Some(tx.studied_at),
            total_xp: self.total_xp + tx.xp_delta,
            cards_mastered: tx.cards_mastered,
        }
    }
}

/// Rounded percentage of a deck's cards with an interval of at least a day.
pub fn deck_mastery(cards: &[Card], deck_id: &str) -> u8 {
    let (total, learned) = cards
        .iter()
        .filter(|c| c.deck_id == deck_id)
        .fold((0usize, 0usize), |(total, learned), c| {
            (total + 1, learned + c.is_learned() as usize)
        });
    if total == 0 {
        return 0;
    }
    (100.0 * learned as f64 / total as f64).round() as u8
}

pub fn cards_mastered(cards: &[Card]) -> usize {
    cards.iter().filter(|c| c.is_learned()).count()
}

/// A summary of what a session changed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionReport {
    pub deck_id: DeckId,
    pub cards_reviewed: usize,
    pub average_score: f64,
    pub xp_gained: u64,
    pub deck_mastery: u8,
    pub cards_mastered: usize,
    pub streak: u32,
}

/// The new persisted state after a session.
#[derive(Clone, Debug, PartialEq)]
pub struct Aggregate {
    pub cards: Vec<Card>,
    pub decks: Vec<Deck>,
    pub stats: GlobalStats,
    pub report: SessionReport,
}

/// Apply a session's last ratings to the full card collection and recompute
/// the deck and global statistics. Each rated card is rescheduled once.
pub fn aggregate(
    cards: &[Card],
    decks: &[Deck],
    stats: &GlobalStats,
    outcome: &SessionOutcome,
    now: Timestamp,
) -> Aggregate {
    let mut cards: Vec<Card> = cards.to_vec();
    let mut updated = 0;
    for card in cards.iter_mut() {
        if let Some(rating) = outcome.results.get(card.id) {
            let r = review(card.schedule, rating, now);
            card.schedule = r.schedule;
            card.next_due = r.next_due;
            card.last_review = Some(now);
            updated += 1;
        }
    }
    if updated < outcome.results.len() {
        log::warn!(
            "{} rated cards are no longer in the collection",
            outcome.results.len() - updated
        );
    }

    let mastery = deck_mastery(&cards, &outcome.deck_id);
    let total_cards = cards.iter().filter(|c| c.deck_id == outcome.deck_id).count();
    let decks: Vec<Deck> = decks
        .iter()
        .cloned()
        .map(|mut d| {
            if d.id == outcome.deck_id {
                d.mastery_level = mastery;
                d.total_cards = total_cards;
            }
            d
        })
        .collect();

    let tx = StatsTransaction {
        studied_at: now,
        xp_delta: outcome.results.xp(),
        cards_mastered: cards_mastered(&cards),
    };
    let stats = stats.apply(&tx);
    log::info!(
        "session on deck {}: {updated} cards rescheduled, +{} xp, mastery {mastery}%",
        outcome.deck_id,
        tx.xp_delta
    );
    let report = SessionReport {
        deck_id: outcome.deck_id.clone(),
        cards_reviewed: updated,
        average_score: outcome.results.average_score(),
        xp_gained: tx.xp_delta,
        deck_mastery: mastery,
        cards_mastered: stats.cards_mastered,
        streak: stats.streak,
    };
    Aggregate {
        cards,
        decks,
        stats,
        report,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sm2::SchedulingState;
    use crate::types::card::CardKind;
    use crate::types::card::NewCard;

    fn ts(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    fn card(i: usize, deck: &str) -> Card {
        let new = NewCard {
            prompt: format!("Q{i}"),
            answer: format!("A{i}"),
            kind: CardKind::OpenResponse,
            difficulty: Default::default(),
            explanation: None,
            options: vec![],
            pairs: vec![],
        };
        Card::ingest(new, deck, ts("2024-01-01T08:00:00.000"))
    }

    fn outcome(deck: &str, ratings: &[(CardId, Rating)]) -> SessionOutcome {
        let mut results = SessionResults::default();
        for (id, r) in ratings {
            results.record(*id, *r);
        }
        SessionOutcome {
            deck_id: deck.to_string(),
            started_at: ts("2024-01-02T09:00:00.000"),
            results,
        }
    }

    #[test]
    fn test_results_keep_last_rating() {
        let id = card(0, "d").id;
        let mut results = SessionResults::default();
        results.record(id, Rating::FORGOT);
        results.record(id, Rating::PERFECT);
        assert_eq!(results.len(), 1);
        assert_eq!(results.get(id), Some(Rating::PERFECT));
        assert_eq!(results.xp(), 50);
    }

    #[test]
    fn test_aggregate_reschedules_rated_cards_once() {
        let cards = vec![card(0, "d"), card(1, "d"), card(2, "d"), card(3, "d")];
        let decks = vec![Deck::new("d", "Deck", "", ts("2024-01-01T08:00:00.000"))];
        let now = ts("2024-01-02T10:30:00.000");
        let out = outcome("d", &[(cards[0].id, Rating::PERFECT), (cards[1].id, Rating::FORGOT)]);
        let agg = aggregate(&cards, &decks, &GlobalStats::default(), &out, now);

        let first = &agg.cards[0];
        assert_eq!(first.schedule.interval, 1);
        assert_eq!(first.schedule.repetition, 1);
        assert_eq!(first.next_due, ts("2024-01-03T00:00:00.000"));
        assert_eq!(first.last_review, Some(now));

        let second = &agg.cards[1];
        assert_eq!(second.schedule.interval, 1);
        assert_eq!(second.schedule.repetition, 0);

        assert_eq!(agg.cards[2], cards[2]);
        assert_eq!(agg.report.cards_reviewed, 2);
        assert_eq!(agg.report.xp_gained, 60);
        assert_eq!(agg.report.deck_mastery, 50);
        assert_eq!(agg.decks[0].mastery_level, 50);
        assert_eq!(agg.decks[0].total_cards, 4);
        assert_eq!(agg.stats.cards_mastered, 2);
        assert_eq!(agg.stats.streak, 1);
        assert_eq!(agg.stats.total_xp, 60);
    }

    #[test]
    fn test_mastery_covers_whole_deck() {
        let mut cards: Vec<Card> = (0..3).map(|i| card(i, "d")).collect();
        cards[2].schedule = SchedulingState {
            interval: 6,
            repetition: 2,
            easiness: 2.5,
        };
        cards.push(card(9, "other"));
        let out = outcome("d", &[(cards[0].id, Rating::GOOD)]);
        let agg = aggregate(&cards, &[], &GlobalStats::default(), &out, ts("2024-01-02T10:00:00.000"));
        assert_eq!(agg.report.deck_mastery, 67);
        assert_eq!(agg.report.cards_mastered, 2);
    }

    #[test]
    fn test_cards_mastered_is_recomputed() {
        let cards: Vec<Card> = (0..2).map(|i| card(i, "d")).collect();
        let stale = GlobalStats {
            cards_mastered: 40,
            ..Default::default()
        };
        let out = outcome("d", &[(cards[0].id, Rating::GOOD)]);
        let agg = aggregate(&cards, &[], &stale, &out, ts("2024-01-02T10:00:00.000"));
        assert_eq!(agg.stats.cards_mastered, 1);
    }

    #[test]
    fn test_streak_window() {
        let last = ts("2024-01-01T20:00:00.000");
        let stats = GlobalStats {
            streak: 4,
            last_study: Some(last),
            total_xp: 100,
            cards_mastered: 0,
        };
        let within = StatsTransaction {
            studied_at: ts("2024-01-03T19:59:59.999"),
            xp_delta: 30,
            cards_mastered: 3,
        };
        let next = stats.apply(&within);
        assert_eq!(next.streak, 5);
        assert_eq!(next.total_xp, 130);
        assert_eq!(next.last_study, Some(within.studied_at));

        let too_late = StatsTransaction {
            studied_at: ts("2024-01-03T20:00:00.000"),
            ..within
        };
        assert_eq!(stats.apply(&too_late).streak, 1);
        assert_eq!(GlobalStats::default().apply(&within).streak, 1);
    }

    #[test]
    fn test_streak_window_uses_wall_clock() {
        // The night of 2024-03-10 is one hour short in many time zones; the
        // window still compares the recorded local times directly.
        let stats = GlobalStats {
            streak: 2,
            last_study: Some(ts("2024-03-09T20:00:00.000")),
            total_xp: 0,
            cards_mastered: 0,
        };
        let tx = StatsTransaction {
            studied_at: ts("2024-03-11T19:59:59.999"),
            xp_delta: 0,
            cards_mastered: 0,
        };
        assert_eq!(stats.apply(&tx).streak, 3);
        let tx = StatsTransaction {
            studied_at: ts("2024-03-11T20:00:00.000"),
            ..tx
        };
        assert_eq!(stats.apply(&tx).streak, 1);
    }

    #[test]
    fn test_deck_mastery_empty_deck() {
        assert_eq!(deck_mastery(&[], "d"), 0);
    }
}
