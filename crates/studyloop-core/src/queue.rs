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

//! The short-term loop: which card to show next within one session.

use std::collections::HashSet;
use std::ops::RangeInclusive;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Fallible;
use crate::error::fail;
use crate::mastery::MasteryTracker;
use crate::mastery::Verdict;
use crate::rng::TinyRng;
use crate::rng::sample;
use crate::rng::shuffle;
use crate::session::SessionError;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::rating::Rating;
use crate::types::timestamp::Timestamp;

/// Tunable session sizing and reinsertion offsets.
///
/// Offsets are measured from the head of the queue after the rated card has
/// been removed from it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    /// Below this many due cards, the session is topped up with others.
    pub due_floor: usize,
    /// Size the session is topped up to.
    pub session_size: usize,
    /// Earliest reinsertion offset after a failing rating.
    pub failure_offset_min: usize,
    /// Latest reinsertion offset after a failing rating.
    pub failure_offset_max: usize,
    /// Earliest reinsertion offset after a passing rating. The latest is
    /// always the tail.
    pub pass_offset_min: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            due_floor: 10,
            session_size: 20,
            failure_offset_min: 2,
            failure_offset_max: 3,
            pass_offset_min: 2,
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Fallible<()> {
        if self.session_size == 0 {
            return fail("session_size must be at least 1");
        }
        if self.failure_offset_min == 0 {
            return fail("failure_offset_min must be at least 1");
        }
        if self.failure_offset_max < self.failure_offset_min {
            return fail("failure_offset_max must not be less than failure_offset_min");
        }
        if self.pass_offset_min < self.failure_offset_min {
            return fail("pass_offset_min must not be less than failure_offset_min");
        }
        Ok(())
    }

    /// No reinsertion lands closer to the head than this.
    fn min_gap(&self) -> usize {
        self.failure_offset_min.min(self.pass_offset_min)
    }
}

/// Pick the cards for a new session and put them in a random order.
///
/// Due cards come first in priority. When fewer than `due_floor` are due, the
/// session is topped up to `session_size` with a random sample of the rest.
pub fn select_cards(
    cards: &[Card],
    now: Timestamp,
    config: &SessionConfig,
    rng: &mut TinyRng,
) -> Result<Vec<Card>, SessionError> {
    if cards.is_empty() {
        return Err(SessionError::EmptyDeck);
    }
    let (mut selected, rest): (Vec<Card>, Vec<Card>) =
        cards.iter().cloned().partition(|card| card.is_due(now));
    if selected.len() < config.due_floor {
        let room = config.session_size.saturating_sub(selected.len());
        selected.extend(sample(rest, room, rng));
    }
    if selected.is_empty() {
        selected = sample(cards.to_vec(), config.session_size, rng);
    }
    let mut seen: HashSet<CardId> = HashSet::new();
    selected.retain(|card| seen.insert(card.id));
    Ok(shuffle(selected, rng))
}

/// An ordered sequence of queue entries with bounded insertion.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Sequence {
    entries: Vec<CardId>,
}

impl Sequence {
    pub fn new(entries: Vec<CardId>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn head(&self) -> Option<CardId> {
        self.entries.first().copied()
    }

    pub fn pop_head(&mut self) -> Option<CardId> {
        if self.entries.is_empty() {
            None
        } else {
            Some(self.entries.remove(0))
        }
    }

    pub fn push_tail(&mut self, id: CardId) {
        self.entries.push(id);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CardId> {
        self.entries.iter()
    }

    /// Insert at a position drawn uniformly from `window`, with both ends
    /// clipped to the current length. Returns the position used.
    ///
    /// The window never starts closer to the head than `min_gap`. When the
    /// sequence is shorter than that, the entry goes to the tail.
    pub fn insert_within(
        &mut self,
        id: CardId,
        window: RangeInclusive<usize>,
        min_gap: usize,
        rng: &mut TinyRng,
    ) -> usize {
        let len = self.entries.len();
        let lo = (*window.start()).max(min_gap).min(len);
        let hi = (*window.end()).min(len).max(lo);
        let position = rng.in_range(lo..=hi);
        debug_assert!(position >= min_gap.min(len) && position <= len);
        self.entries.insert(position, id);
        position
    }
}

/// Where a rated card went.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Placement {
    /// Put back at this position.
    Reinserted(usize),
    /// Mastered for this session and not put back.
    Retired,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SkipOutcome {
    Skipped,
    /// The queue holds at most one entry; nothing changed.
    NotSkippable,
}

/// The working set of one session.
pub struct SessionQueue {
    entries: Sequence,
    tracker: MasteryTracker,
    config: SessionConfig,
    rng: TinyRng,
    total_unique: usize,
}

impl SessionQueue {
    /// Build a queue in the given order. Duplicate ids are dropped.
    pub fn new(order: Vec<CardId>, config: SessionConfig, rng: TinyRng) -> Self {
        let mut seen: HashSet<CardId> = HashSet::new();
        let order: Vec<CardId> = order.into_iter().filter(|id| seen.insert(*id)).collect();
        let mut queue = SessionQueue {
            total_unique: order.len(),
            entries: Sequence::new(order),
            tracker: MasteryTracker::new(),
            config,
            rng,
        };
        queue.present_head();
        queue
    }

    /// The card to show, or `None` once the session is complete.
    pub fn current(&self) -> Option<CardId> {
        self.entries.head()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_unique(&self) -> usize {
        self.total_unique
    }

    pub fn tracker(&self) -> &MasteryTracker {
        &self.tracker
    }

    pub fn entries(&self) -> &Sequence {
        &self.entries
    }

    /// Rotate the current entry to the tail.
    pub fn skip(&mut self) -> SkipOutcome {
        if self.entries.len() <= 1 {
            return SkipOutcome::NotSkippable;
        }
        if let Some(id) = self.entries.pop_head() {
            self.entries.push_tail(id);
        }
        self.present_head();
        SkipOutcome::Skipped
    }

    /// Remove the current entry and either put it back further down the
    /// queue or retire it. Returns `None` if the queue was already empty.
    pub fn requeue_after_rating(&mut self, rating: Rating) -> Option<(CardId, Placement)> {
        let id = self.entries.pop_head()?;
        let min_gap = self.config.min_gap();
        let placement = match self.tracker.record(id, rating) {
            Verdict::Failed => {
                let window = self.config.failure_offset_min..=self.config.failure_offset_max;
                let pos = self
                    .entries
                    .insert_within(id, window, min_gap, &mut self.rng);
                Placement::Reinserted(pos)
            }
            Verdict::Improving(_) => {
                let window = self.config.pass_offset_min..=self.entries.len();
                let pos = self
                    .entries
                    .insert_within(id, window, min_gap, &mut self.rng);
                Placement::Reinserted(pos)
            }
            Verdict::Retired => Placement::Retired,
        };
        match placement {
            Placement::Reinserted(pos) => {
                log::debug!("card {} rated {rating}, reinserted at {pos}", id.short())
            }
            Placement::Retired => log::debug!("card {} retired for this session", id.short()),
        }
        self.present_head();
        Some((id, placement))
    }

    /// Share of the session's cards retired so far, as a rounded percentage.
    /// Only an empty queue reports 100.
    pub fn progress_percent(&self) -> u8 {
        if self.entries.is_empty() {
            return 100;
        }
        if self.total_unique == 0 {
            return 0;
        }
        let retired = self.tracker.retired_count() as f64;
        let pct = (100.0 * retired / self.total_unique as f64).round() as u8;
        pct.min(99)
    }

    fn present_head(&mut self) {
        if let Some(id) = self.entries.head() {
            self.tracker.present(id);
        }
    }
}
