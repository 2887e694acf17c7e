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

use crate::types::aliases::DeckId;
use crate::types::timestamp::Timestamp;

/// A named collection of cards and its cached aggregate.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Deck {
    pub id: DeckId,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: Timestamp,
    pub total_cards: usize,
    /// Percentage (0-100) of the deck's cards with an interval of at least
    /// one day.
    pub mastery_level: u8,
}

impl Deck {
    pub fn new(id: &str, title: &str, description: &str, created_at: Timestamp) -> Self {
        Deck {
            id: id.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            created_at,
            total_cards: 0,
            mastery_level: 0,
        }
    }
}
