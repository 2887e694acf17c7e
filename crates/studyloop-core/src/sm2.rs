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

//! Long-term scheduling: a SuperMemo-2 variant.
//!
//! This module is pure. It only ever sees a card's persisted state and the
//! rating that closes a session, never the in-session counters.

use serde::Deserialize;
use serde::Serialize;

use crate::types::date::Date;
use crate::types::rating::Rating;
use crate::types::timestamp::Timestamp;

/// The easiness factor never drops below this.
pub const MIN_EASINESS: f64 = 1.3;

/// Easiness assigned to freshly ingested cards.
pub const INITIAL_EASINESS: f64 = 2.5;

/// Interval after the first successful review, in days.
const FIRST_INTERVAL: u32 = 1;

/// Interval after the second successful review, in days.
const SECOND_INTERVAL: u32 = 6;

/// Persisted per-card scheduling parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SchedulingState {
    /// Days until the next review.
    pub interval: u32,
    /// Consecutive successful reviews.
    pub repetition: u32,
    /// The easiness factor.
    pub easiness: f64,
}

impl Default for SchedulingState {
    fn default() -> Self {
        SchedulingState {
            interval: 0,
            repetition: 0,
            easiness: INITIAL_EASINESS,
        }
    }
}

/// EF' = EF + (0.1 - (5 - q) * (0.08 + (5 - q) * 0.02)), floored at 1.3.
pub fn new_easiness(easiness: f64, rating: Rating) -> f64 {
    let miss: f64 = 5.0 - f64::from(rating);
    let e = easiness + (0.1 - miss * (0.08 + miss * 0.02));
    e.max(MIN_EASINESS)
}

/// Compute the next scheduling state. The interval grows with the easiness
/// the card had before this review.
pub fn update_schedule(state: SchedulingState, rating: Rating) -> SchedulingState {
    let (interval, repetition) = if rating.is_passing() {
        let interval = match state.repetition {
            0 => FIRST_INTERVAL,
            1 => SECOND_INTERVAL,
            _ => (state.interval as f64 * state.easiness).round() as u32,
        };
        (interval, state.repetition + 1)
    } else {
        (FIRST_INTERVAL, 0)
    };
    SchedulingState {
        interval,
        repetition,
        easiness: new_easiness(state.easiness, rating),
    }
}

/// The start of the day `interval` days after `today`.
pub fn next_due(today: Date, interval: u32) -> Timestamp {
    today.add_days(interval as i64).midnight()
}

/// The outcome of a long-term review.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Review {
    pub schedule: SchedulingState,
    pub next_due: Timestamp,
}

pub fn review(state: SchedulingState, rating: Rating, reviewed_at: Timestamp) -> Review {
    let schedule = update_schedule(state, rating);
    Review {
        schedule,
        next_due: next_due(reviewed_at.date(), schedule.interval),
    }
}

/// The interval, in days, each manually selectable rating would produce.
pub fn preview_intervals(state: SchedulingState) -> [(Rating, u32); 4] {
    Rating::MANUAL.map(|r| (r, update_schedule(state, r).interval))
}
