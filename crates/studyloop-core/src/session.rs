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

//! The session controller: joins the queue, the evaluator and the result
//! log into the API a front end drives.

use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use crate::aggregate::SessionOutcome;
use crate::aggregate::SessionResults;
use crate::evaluate::Disposition;
use crate::evaluate::Feedback;
use crate::evaluate::Grader;
use crate::evaluate::Response;
use crate::evaluate::disposition;
use crate::evaluate::evaluate;
use crate::evaluate::manual_rating;
use crate::queue::Placement;
use crate::queue::SessionConfig;
use crate::queue::SessionQueue;
use crate::queue::SkipOutcome;
use crate::queue::select_cards;
use crate::rng::TinyRng;
use crate::sm2::preview_intervals;
use crate::types::aliases::DeckId;
use crate::types::card::Card;
use crate::types::card_id::CardId;
use crate::types::rating::Rating;
use crate::types::timestamp::Timestamp;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionError {
    /// The deck has no cards.
    EmptyDeck,
    /// An answer is being graded; the presentation is frozen.
    EvaluationPending,
    /// The current card was already graded and waits for a rating.
    AwaitingRating,
    /// A rating was given before the answer was submitted or revealed.
    NotRevealed,
    /// The queue is empty.
    SessionComplete,
    /// The session still has cards to review.
    SessionIncomplete,
    /// Not one of the manually selectable ratings.
    InvalidManualRating(u8),
    /// The session sizing or reinsertion offsets are out of range.
    InvalidConfig,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::EmptyDeck => write!(f, "the deck has no cards"),
            SessionError::EvaluationPending => write!(f, "an answer is still being evaluated"),
            SessionError::AwaitingRating => write!(f, "the current card is waiting for a rating"),
            SessionError::NotRevealed => write!(f, "answer or reveal the card before rating it"),
            SessionError::SessionComplete => write!(f, "the session is complete"),
            SessionError::SessionIncomplete => write!(f, "the session still has cards left"),
            SessionError::InvalidManualRating(v) => {
                write!(f, "{v} is not a valid rating; pick one of 1, 3, 4, 5")
            }
            SessionError::InvalidConfig => write!(f, "invalid session configuration"),
        }
    }
}

impl Error for SessionError {}

#[derive(Clone, Debug, PartialEq)]
enum Phase {
    /// Waiting for an answer.
    Answering,
    /// The grader has been called and has not returned.
    Evaluating,
    /// The answer is revealed; waiting for a manual rating.
    Revealed {
        response: Option<String>,
        feedback: Option<Feedback>,
    },
}

/// The result of submitting an answer.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// The answer was objectively correct; the card was rated 5 and the
    /// session moved on.
    AutoRated(Feedback),
    /// Show the canonical answer and explanation, then call
    /// [`Session::rate`].
    NeedsRating(Feedback),
}

impl Submission {
    pub fn feedback(&self) -> &Feedback {
        match self {
            Submission::AutoRated(f) | Submission::NeedsRating(f) => f,
        }
    }
}

/// The last card rated, so the front end can show it again.
#[derive(Clone, Debug, PartialEq)]
pub struct ReviewRecord {
    pub card: Card,
    pub response: Option<String>,
    pub feedback: Option<Feedback>,
    pub rating: Rating,
}

/// One study session over a private snapshot of a deck.
pub struct Session {
    deck_id: DeckId,
    started_at: Timestamp,
    cards: HashMap<CardId, Card>,
    queue: SessionQueue,
    results: SessionResults,
    phase: Phase,
    last_review: Option<ReviewRecord>,
}

impl Session {
    /// Select cards from `cards` and shuffle them into a new session.
    pub fn start(
        deck_id: &str,
        cards: &[Card],
        now: Timestamp,
        config: SessionConfig,
        mut rng: TinyRng,
    ) -> Result<Self, SessionError> {
        if let Err(e) = config.validate() {
            log::warn!("refusing to start session: {}", e.message());
            return Err(SessionError::InvalidConfig);
        }
        let selected: Vec<Card> = select_cards(cards, now, &config, &mut rng)?;
        log::info!(
            "starting session on deck {deck_id} with {} of {} cards",
            selected.len(),
            cards.len()
        );
        let order: Vec<CardId> = selected.iter().map(|c| c.id).collect();
        let snapshot: HashMap<CardId, Card> = selected.into_iter().map(|c| (c.id, c)).collect();
        Ok(Session {
            deck_id: deck_id.to_string(),
            started_at: now,
            cards: snapshot,
            queue: SessionQueue::new(order, config, rng),
            results: SessionResults::default(),
            phase: Phase::Answering,
            last_review: None,
        })
    }

    /// The card to show, or `None` once every card is retired.
    pub fn current_card(&self) -> Option<&Card> {
        self.queue.current().and_then(|id| self.cards.get(&id))
    }

    pub fn is_evaluating(&self) -> bool {
        self.phase == Phase::Evaluating
    }

    /// Whether the current card's answer is showing and a rating is due.
    pub fn is_revealed(&self) -> bool {
        matches!(self.phase, Phase::Revealed { .. })
    }

    pub fn progress_percent(&self) -> u8 {
        self.queue.progress_percent()
    }

    /// Consecutive passing ratings the current card has this session.
    pub fn current_streak(&self) -> u32 {
        self.queue
            .current()
            .map(|id| self.queue.tracker().successes(id))
            .unwrap_or(0)
    }

    /// Number of distinct cards in the session.
    pub fn total_cards(&self) -> usize {
        self.queue.total_unique()
    }

    pub fn remaining(&self) -> usize {
        self.queue.len()
    }

    pub fn results(&self) -> &SessionResults {
        &self.results
    }

    pub fn last_review(&self) -> Option<&ReviewRecord> {
        self.last_review.as_ref()
    }

    /// Long-term intervals each manual rating would give the current card.
    pub fn preview(&self) -> Option<[(Rating, u32); 4]> {
        self.current_card().map(|c| preview_intervals(c.schedule))
    }

    /// Grade an answer for the current card. A correct answer to an
    /// objective card is rated 5 automatically; anything else reveals the
    /// card and waits for [`Session::rate`].
    pub async fn submit<G: Grader>(
        &mut self,
        response: Response,
        grader: &G,
    ) -> Result<Submission, SessionError> {
        self.check_can_answer()?;
        let card: Card = match self.current_card() {
            Some(card) => card.clone(),
            None => return Err(SessionError::SessionComplete),
        };
        self.phase = Phase::Evaluating;
        let feedback = evaluate(&card, &response, grader).await;
        let summary = Some(response.summary());
        match disposition(card.kind, &feedback) {
            Disposition::AutoRated(rating) => {
                self.apply_rating(rating, summary, Some(feedback.clone()));
                Ok(Submission::AutoRated(feedback))
            }
            Disposition::NeedsRating => {
                self.phase = Phase::Revealed {
                    response: summary,
                    feedback: Some(feedback.clone()),
                };
                Ok(Submission::NeedsRating(feedback))
            }
        }
    }

    /// Show the answer without submitting one.
    pub fn reveal(&mut self) -> Result<(), SessionError> {
        self.check_can_answer()?;
        if self.queue.is_empty() {
            return Err(SessionError::SessionComplete);
        }
        self.phase = Phase::Revealed {
            response: None,
            feedback: None,
        };
        Ok(())
    }

    /// Record a manual rating (1, 3, 4 or 5) for the current card. The
    /// answer must have been shown first, by [`Session::submit`] or
    /// [`Session::reveal`].
    pub fn rate(&mut self, value: u8) -> Result<Placement, SessionError> {
        if self.phase == Phase::Evaluating {
            return Err(SessionError::EvaluationPending);
        }
        let rating = manual_rating(value)?;
        if self.queue.is_empty() {
            return Err(SessionError::SessionComplete);
        }
        if !self.is_revealed() {
            return Err(SessionError::NotRevealed);
        }
        let (response, feedback) = match std::mem::replace(&mut self.phase, Phase::Answering) {
            Phase::Revealed { response, feedback } => (response, feedback),
            _ => (None, None),
        };
        self.apply_rating(rating, response, feedback)
            .ok_or(SessionError::SessionComplete)
    }

    /// Move the current card to the back of the queue.
    pub fn skip(&mut self) -> Result<SkipOutcome, SessionError> {
        if self.phase == Phase::Evaluating {
            return Err(SessionError::EvaluationPending);
        }
        let outcome = self.queue.skip();
        if outcome == SkipOutcome::Skipped {
            self.phase = Phase::Answering;
        }
        Ok(outcome)
    }

    /// Unfreeze the session after a submission was dropped before the
    /// grader returned.
    pub fn abandon_evaluation(&mut self) {
        if self.phase == Phase::Evaluating {
            log::debug!("abandoning pending evaluation");
            self.phase = Phase::Answering;
        }
    }

    /// The last rating of every card, once the queue is empty.
    pub fn finish(&self) -> Result<SessionOutcome, SessionError> {
        if !self.queue.is_empty() {
            return Err(SessionError::SessionIncomplete);
        }
        Ok(SessionOutcome {
            deck_id: self.deck_id.clone(),
            started_at: self.started_at,
            results: self.results.clone(),
        })
    }

    fn check_can_answer(&self) -> Result<(), SessionError> {
        match self.phase {
            Phase::Answering => Ok(()),
            Phase::Evaluating => Err(SessionError::EvaluationPending),
            Phase::Revealed { .. } => Err(SessionError::AwaitingRating),
        }
    }

    fn apply_rating(
        &mut self,
        rating: Rating,
        response: Option<String>,
        feedback: Option<Feedback>,
    ) -> Option<Placement> {
        let (id, placement) = self.queue.requeue_after_rating(rating)?;
        self.results.record(id, rating);
        if let Some(card) = self.cards.get(&id) {
            self.last_review = Some(ReviewRecord {
                card: card.clone(),
                response,
                feedback,
                rating,
            });
        }
        self.phase = Phase::Answering;
        if self.queue.is_empty() {
            log::info!(
                "session on deck {} complete: {} cards rated",
                self.deck_id,
                self.results.len()
            );
        }
        Some(placement)
    }
}
