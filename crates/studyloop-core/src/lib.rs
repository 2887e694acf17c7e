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

//! studyloop-core: scheduling and session logic for the studyloop review
//! system.
//!
//! This library provides the storage-agnostic parts of the system:
//! - SM-2 long-term scheduling
//! - The short-term session queue and mastery tracking
//! - Answer evaluation, with a pluggable grader for open responses
//! - Aggregation of session results into deck and global statistics

pub mod aggregate;
pub mod error;
pub mod evaluate;
pub mod library;
pub mod mastery;
pub mod queue;
pub mod rng;
pub mod session;
pub mod sm2;
pub mod store;
pub mod types;

// Re-exports for convenience
pub use aggregate::{GlobalStats, SessionOutcome, SessionReport};
pub use error::{ErrorReport, Fallible, fail};
pub use evaluate::{Feedback, Grader, GraderVerdict, GradingError, NoGrader, Response};
pub use library::{CommitError, ImportSummary, Library, PendingCommit};
pub use queue::{Placement, SessionConfig, SkipOutcome};
pub use session::{Session, SessionError, Submission};
pub use sm2::SchedulingState;
pub use store::{CollectionKind, KeyValueStore, MemoryStore, StoreKey};
pub use types::card::{Card, CardKind, Difficulty, MatchingPair, NewCard};
pub use types::card_id::CardId;
pub use types::date::Date;
pub use types::deck::Deck;
pub use types::rating::Rating;
pub use types::timestamp::Timestamp;
