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

use serde::Deserialize;
use serde::Serialize;

use crate::sm2::SchedulingState;
use crate::types::aliases::DeckId;
use crate::types::card_id::CardId;
use crate::types::card_id::Hasher;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardKind {
    /// Free-text answer, graded by an external collaborator.
    OpenResponse,
    /// Pick one of several options.
    Choice,
    /// True or false.
    BooleanJudgment,
    /// Pair each left item with a right item.
    Matching,
}

impl CardKind {
    /// Whether answers to this kind are graded locally.
    pub fn is_objective(self) -> bool {
        !matches!(self, CardKind::OpenResponse)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::OpenResponse => "open_response",
            CardKind::Choice => "choice",
            CardKind::BooleanJudgment => "boolean_judgment",
            CardKind::Matching => "matching",
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    #[default]
    Basic,
    Intermediate,
    Advanced,
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MatchingPair {
    pub left: String,
    pub right: String,
}

/// A card record as handed over by the content provider.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct NewCard {
    pub prompt: String,
    pub answer: String,
    pub kind: CardKind,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub pairs: Vec<MatchingPair>,
}

impl NewCard {
    /// The id a card with this content gets inside `deck_id`.
    pub fn id_in(&self, deck_id: &str) -> CardId {
        let mut hasher = Hasher::new();
        hasher.field(deck_id);
        hasher.field(self.kind.as_str());
        hasher.field(&self.prompt);
        hasher.field(&self.answer);
        for option in &self.options {
            hasher.field(option);
        }
        for pair in &self.pairs {
            hasher.field(&pair.left);
            hasher.field(&pair.right);
        }
        hasher.finalize()
    }
}

#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub deck_id: DeckId,
    pub prompt: String,
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub kind: CardKind,
    pub difficulty: Difficulty,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pairs: Vec<MatchingPair>,
    pub schedule: SchedulingState,
    pub next_due: Timestamp,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_review: Option<Timestamp>,
}

impl Card {
    /// Turn a provider record into a card that is due immediately.
    pub fn ingest(new: NewCard, deck_id: &str, now: Timestamp) -> Self {
        let id = new.id_in(deck_id);
        Card {
            id,
            deck_id: deck_id.to_string(),
            prompt: new.prompt,
            answer: new.answer,
            explanation: new.explanation,
            kind: new.kind,
            difficulty: new.difficulty,
            options: new.options,
            pairs: new.pairs,
            schedule: SchedulingState::default(),
            next_due: now,
            last_review: None,
        }
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        self.next_due <= now
    }

    /// A card counts towards mastery once it has a review interval.
    pub fn is_learned(&self) -> bool {
        self.schedule.interval >= 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Fallible;

    fn ts(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    fn new_card(prompt: &str) -> NewCard {
        NewCard {
            prompt: prompt.to_string(),
            answer: "Paris".to_string(),
            kind: CardKind::Choice,
            difficulty: Difficulty::Basic,
            explanation: None,
            options: vec!["Paris".to_string(), "Rome".to_string()],
            pairs: vec![],
        }
    }

    #[test]
    fn test_ingest_assigns_initial_schedule() {
        let now = ts("2024-03-01T09:30:00.000");
        let card = Card::ingest(new_card("Capital of France?"), "geo", now);
        assert_eq!(card.schedule.interval, 0);
        assert_eq!(card.schedule.repetition, 0);
        assert_eq!(card.schedule.easiness, 2.5);
        assert_eq!(card.next_due, now);
        assert!(card.is_due(now));
        assert!(!card.is_learned());
        assert_eq!(card.last_review, None);
    }

    #[test]
    fn test_id_depends_on_deck_and_content() {
        let a = new_card("Capital of France?");
        let b = new_card("Capital of Italy?");
        assert_eq!(a.id_in("geo"), a.id_in("geo"));
        assert_ne!(a.id_in("geo"), a.id_in("history"));
        assert_ne!(a.id_in("geo"), b.id_in("geo"));
    }

    #[test]
    fn test_card_roundtrip() -> Fallible<()> {
        let mut card = Card::ingest(new_card("Q"), "geo", ts("2024-03-01T09:30:00.000"));
        card.schedule = SchedulingState {
            interval: 6,
            repetition: 2,
            easiness: 2.36,
        };
        card.next_due = ts("2024-03-07T00:00:00.000");
        card.last_review = Some(ts("2024-03-01T10:00:00.123"));
        let json = serde_json::to_string(&card)?;
        let restored: Card = serde_json::from_str(&json)?;
        assert_eq!(restored, card);
        assert!(!restored.is_due(ts("2024-03-06T23:59:59.999")));
        assert!(restored.is_due(ts("2024-03-07T00:00:00.000")));
        Ok(())
    }

    #[test]
    fn test_kind_serialization() -> Fallible<()> {
        assert_eq!(
            serde_json::to_string(&CardKind::BooleanJudgment)?,
            "\"boolean_judgment\""
        );
        assert!(CardKind::Matching.is_objective());
        assert!(!CardKind::OpenResponse.is_objective());
        Ok(())
    }
}
