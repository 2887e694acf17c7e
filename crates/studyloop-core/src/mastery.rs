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

//! Session-local mastery: how many consecutive passing ratings each card has
//! collected since the session started.

use std::collections::HashMap;

use crate::types::card_id::CardId;
use crate::types::rating::Rating;

/// Consecutive passing ratings needed to retire a card from the session.
pub const MASTERY_THRESHOLD: u32 = 2;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CardProgress {
    /// Not yet shown in this session.
    Unseen,
    /// Shown; holds the current run of passing ratings.
    InProgress(u32),
    /// Mastered for this session. Terminal.
    Retired,
}

/// What the queue should do with a card that was just rated.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Verdict {
    /// The rating failed; the run was reset to zero.
    Failed,
    /// The rating passed but the threshold is not reached yet.
    Improving(u32),
    /// The threshold was reached.
    Retired,
}

#[derive(Default)]
pub struct MasteryTracker {
    progress: HashMap<CardId, CardProgress>,
}

impl MasteryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn progress(&self, id: CardId) -> CardProgress {
        self.progress
            .get(&id)
            .copied()
            .unwrap_or(CardProgress::Unseen)
    }

    /// The current run of passing ratings.
    pub fn successes(&self, id: CardId) -> u32 {
        match self.progress(id) {
            CardProgress::Unseen => 0,
            CardProgress::InProgress(n) => n,
            CardProgress::Retired => MASTERY_THRESHOLD,
        }
    }

    /// Mark a card as shown.
    pub fn present(&mut self, id: CardId) {
        self.progress
            .entry(id)
            .or_insert(CardProgress::InProgress(0));
    }

    pub fn record(&mut self, id: CardId, rating: Rating) -> Verdict {
        let current = match self.progress(id) {
            CardProgress::Retired => return Verdict::Retired,
            CardProgress::Unseen => 0,
            CardProgress::InProgress(n) => n,
        };
        let (next, verdict) = if !rating.is_passing() {
            (CardProgress::InProgress(0), Verdict::Failed)
        } else if current + 1 >= MASTERY_THRESHOLD {
            (CardProgress::Retired, Verdict::Retired)
        } else {
            (
                CardProgress::InProgress(current + 1),
                Verdict::Improving(current + 1),
            )
        };
        self.progress.insert(id, next);
        verdict
    }

    pub fn retired_count(&self) -> usize {
        self.progress
            .values()
            .filter(|p| **p == CardProgress::Retired)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CardId {
        CardId::hash_bytes(s.as_bytes())
    }

    #[test]
    fn test_unseen_until_presented() {
        let mut tracker = MasteryTracker::new();
        assert_eq!(tracker.progress(id("a")), CardProgress::Unseen);
        tracker.present(id("a"));
        assert_eq!(tracker.progress(id("a")), CardProgress::InProgress(0));
    }

    #[test]
    fn test_two_passes_retire() {
        let mut tracker = MasteryTracker::new();
        tracker.present(id("a"));
        assert_eq!(tracker.record(id("a"), Rating::HARD), Verdict::Improving(1));
        assert_eq!(tracker.record(id("a"), Rating::PERFECT), Verdict::Retired);
        assert_eq!(tracker.progress(id("a")), CardProgress::Retired);
        assert_eq!(tracker.retired_count(), 1);
    }

    #[test]
    fn test_failure_resets_run() {
        let mut tracker = MasteryTracker::new();
        tracker.present(id("a"));
        tracker.record(id("a"), Rating::GOOD);
        assert_eq!(tracker.record(id("a"), Rating::FORGOT), Verdict::Failed);
        assert_eq!(tracker.successes(id("a")), 0);
        assert_eq!(tracker.record(id("a"), Rating::GOOD), Verdict::Improving(1));
        assert_eq!(tracker.retired_count(), 0);
    }

    #[test]
    fn test_retired_is_terminal() {
        let mut tracker = MasteryTracker::new();
        tracker.record(id("a"), Rating::GOOD);
        tracker.record(id("a"), Rating::GOOD);
        assert_eq!(tracker.record(id("a"), Rating::BLANK), Verdict::Retired);
        assert_eq!(tracker.progress(id("a")), CardProgress::Retired);
    }

    #[test]
    fn test_present_does_not_reset() {
        let mut tracker = MasteryTracker::new();
        tracker.present(id("a"));
        tracker.record(id("a"), Rating::GOOD);
        tracker.present(id("a"));
        assert_eq!(tracker.successes(id("a")), 1);
    }
}
