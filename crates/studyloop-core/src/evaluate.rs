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

//! Grading submitted answers.
//!
//! Choice, true/false and matching cards are graded here. Open responses go
//! to an external [`Grader`]; when it fails, the session degrades to
//! self-rating instead of erroring.

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;

use serde::Deserialize;
use serde::Serialize;

use crate::session::SessionError;
use crate::types::card::Card;
use crate::types::card::CardKind;
use crate::types::rating::Rating;

pub const UNAVAILABLE_MESSAGE: &str = "evaluation unavailable";

const INVALID_MESSAGE: &str = "invalid response";

/// An answer as submitted by the user.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub enum Response {
    /// Free text, for open-response cards.
    Text(String),
    /// The text of the chosen option.
    Choice(String),
    /// A boolean word such as "true" or "false".
    Boolean(String),
    /// Left item to the right item it was paired with.
    Matching(BTreeMap<String, String>),
}

impl Response {
    /// A plain-text rendering, for the review history.
    pub fn summary(&self) -> String {
        match self {
            Response::Text(s) | Response::Choice(s) | Response::Boolean(s) => s.clone(),
            Response::Matching(pairs) => pairs
                .iter()
                .map(|(l, r)| format!("{l} -> {r}"))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// The uniform result of grading.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct Feedback {
    pub score: Rating,
    pub passed: bool,
    pub message: String,
}

impl Feedback {
    fn new(score: Rating, passed: bool, message: impl Into<String>) -> Self {
        Feedback {
            score,
            passed,
            message: message.into(),
        }
    }

    /// What the session shows when the grader could not be reached.
    pub fn unavailable() -> Self {
        Feedback::new(Rating::BLANK, false, UNAVAILABLE_MESSAGE)
    }

    fn invalid() -> Self {
        Feedback::new(Rating::BLANK, false, INVALID_MESSAGE)
    }
}

/// What the external grader returns for an open response.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct GraderVerdict {
    pub score: u8,
    pub message: String,
    pub passed: bool,
}

#[derive(Debug, PartialEq)]
pub enum GradingError {
    /// The grader could not be reached or failed.
    Unavailable(String),
    /// The grader answered with something unusable.
    Malformed(String),
}

impl Display for GradingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GradingError::Unavailable(msg) => write!(f, "grader unavailable: {msg}"),
            GradingError::Malformed(msg) => write!(f, "malformed grader response: {msg}"),
        }
    }
}

impl Error for GradingError {}

/// Grades free-text answers against the canonical answer.
///
/// Implementations must return score 0 and `passed: false` for an empty
/// submission without doing any I/O.
#[allow(async_fn_in_trait)]
pub trait Grader {
    async fn grade(
        &self,
        prompt: &str,
        answer: &str,
        submitted: &str,
    ) -> Result<GraderVerdict, GradingError>;
}

/// A grader that is never available. Open responses always fall back to
/// self-rating.
pub struct NoGrader;

impl Grader for NoGrader {
    async fn grade(&self, _: &str, _: &str, _: &str) -> Result<GraderVerdict, GradingError> {
        Err(GradingError::Unavailable("no grader configured".to_string()))
    }
}

/// Grade a response. Never fails: collaborator errors and malformed input
/// become zero-score feedback.
pub async fn evaluate<G: Grader>(card: &Card, response: &Response, grader: &G) -> Feedback {
    match (card.kind, response) {
        (CardKind::OpenResponse, Response::Text(text)) => {
            if text.trim().is_empty() {
                return Feedback::unavailable();
            }
            match grader.grade(&card.prompt, &card.answer, text).await {
                Ok(verdict) => from_verdict(verdict),
                Err(e) => {
                    log::warn!("grading card {} failed: {e}", card.id.short());
                    Feedback::unavailable()
                }
            }
        }
        _ => evaluate_objective(card, response),
    }
}

fn from_verdict(verdict: GraderVerdict) -> Feedback {
    let score = Rating::try_from(verdict.score.min(5)).unwrap_or(Rating::BLANK);
    Feedback::new(score, verdict.passed, verdict.message)
}

/// Grade a structured card locally.
pub fn evaluate_objective(card: &Card, response: &Response) -> Feedback {
    let feedback = match (card.kind, response) {
        (CardKind::Choice, Response::Choice(choice)) => grade_choice(&card.answer, choice),
        (CardKind::BooleanJudgment, Response::Boolean(word)) => {
            grade_boolean(&card.answer, word)
        }
        (CardKind::Matching, Response::Matching(submitted)) => grade_matching(card, submitted),
        _ => None,
    };
    feedback.unwrap_or_else(|| {
        log::warn!(
            "response shape does not fit {} card {}",
            card.kind.as_str(),
            card.id.short()
        );
        Feedback::invalid()
    })
}

fn grade_choice(answer: &str, choice: &str) -> Option<Feedback> {
    let choice = choice.trim().to_lowercase();
    if choice.is_empty() {
        return None;
    }
    let canonical = answer.trim().to_lowercase();
    let passed = canonical.contains(&choice) || choice.contains(&canonical);
    Some(if passed {
        Feedback::new(Rating::PERFECT, true, "Correct!")
    } else {
        Feedback::new(
            Rating::FORGOT,
            false,
            format!("Incorrect. The correct answer is: {answer}"),
        )
    })
}

fn grade_boolean(answer: &str, word: &str) -> Option<Feedback> {
    let word = word.trim();
    if word.is_empty() {
        return None;
    }
    Some(if word.eq_ignore_ascii_case(answer.trim()) {
        Feedback::new(Rating::PERFECT, true, "Correct!")
    } else {
        Feedback::new(
            Rating::FORGOT,
            false,
            format!("Incorrect. The statement is {answer}."),
        )
    })
}

fn grade_matching(card: &Card, submitted: &BTreeMap<String, String>) -> Option<Feedback> {
    if card.pairs.is_empty() {
        return None;
    }
    let total = card.pairs.len();
    let correct = card
        .pairs
        .iter()
        .filter(|pair| submitted.get(&pair.left) == Some(&pair.right))
        .count();
    Some(if correct == total {
        Feedback::new(Rating::PERFECT, true, "Perfect! Every pair is correct.")
    } else {
        let score = if correct > 0 {
            Rating::PARTIAL
        } else {
            Rating::BLANK
        };
        Feedback::new(
            score,
            false,
            format!("You matched {correct} of {total} pairs correctly."),
        )
    })
}

/// How a graded card gets its session rating.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Disposition {
    /// Rated automatically; no explanation is shown.
    AutoRated(Rating),
    /// The answer and explanation are shown and the user picks a rating.
    NeedsRating,
}

pub fn disposition(kind: CardKind, feedback: &Feedback) -> Disposition {
    if kind.is_objective() && feedback.passed {
        Disposition::AutoRated(Rating::PERFECT)
    } else {
        Disposition::NeedsRating
    }
}

/// Validate a rating picked by hand.
pub fn manual_rating(value: u8) -> Result<Rating, SessionError> {
    match Rating::try_from(value) {
        Ok(rating) if rating.is_manual() => Ok(rating),
        _ => Err(SessionError::InvalidManualRating(value)),
    }
}
