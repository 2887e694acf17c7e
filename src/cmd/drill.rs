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

//! The interactive terminal session.

use std::collections::BTreeMap;
use std::io::BufRead;
use std::io::Write;

use studyloop_core::Library;
use studyloop_core::SessionOutcome;
use studyloop_core::SessionReport;
use studyloop_core::Timestamp;
use studyloop_core::evaluate::Feedback;
use studyloop_core::evaluate::Grader;
use studyloop_core::evaluate::Response;
use studyloop_core::queue::Placement;
use studyloop_core::queue::SkipOutcome;
use studyloop_core::rng::TinyRng;
use studyloop_core::session::Session;
use studyloop_core::session::SessionError;
use studyloop_core::session::Submission;
use studyloop_core::store::KeyValueStore;
use studyloop_core::types::card::Card;
use studyloop_core::types::card::CardKind;

use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Fallible;
use crate::error::fail;

pub async fn drill<G: Grader>(
    config: &Config,
    deck_id: &str,
    seed: Option<u64>,
    grader: &G,
) -> Fallible<()> {
    let mut store = SqliteStore::open(&config.database)?;
    let mut library = Library::load(&store, &config.user)?;
    if library.deck(deck_id).is_none() {
        return fail(format!("no such deck: {deck_id}"));
    }
    let rng = match seed {
        Some(seed) => TinyRng::from_seed(seed),
        None => TinyRng::from_time(),
    };
    let cards = library.deck_cards(deck_id);
    let session = Session::start(deck_id, &cards, Timestamp::now(), config.session, rng)?;

    let stdin = std::io::stdin();
    let mut input = stdin.lock();
    let stdout = std::io::stdout();
    let mut output = stdout.lock();
    writeln!(
        output,
        "Commands: :skip, :reveal, :prev, :quit. Cards in session: {}.",
        session.total_cards()
    )?;
    let Some(outcome) = run_session(session, grader, &mut input, &mut output).await? else {
        return Ok(());
    };
    let report = commit_with_retry(
        &mut library,
        &mut store,
        &config.user,
        &outcome,
        Timestamp::now(),
        &mut input,
        &mut output,
    )?;
    write_report(&report, &mut output)
}

/// Drive a session until the queue is empty. Returns `None` if the user
/// quits, in which case nothing is recorded.
pub async fn run_session<G: Grader>(
    mut session: Session,
    grader: &G,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Fallible<Option<SessionOutcome>> {
    while let Some(card) = session.current_card().cloned() {
        writeln!(
            output,
            "\n[{}%] {} in queue, streak {}",
            session.progress_percent(),
            session.remaining(),
            session.current_streak()
        )?;
        write_card(&card, output)?;
        let Some(line) = read_line(input, output, &answer_prompt(&card))? else {
            return cancelled(output);
        };
        match line.as_str() {
            ":quit" => return cancelled(output),
            ":skip" => {
                match session.skip()? {
                    SkipOutcome::Skipped => writeln!(output, "Skipped.")?,
                    SkipOutcome::NotSkippable => writeln!(output, "This is the only card left.")?,
                }
                continue;
            }
            ":prev" => {
                write_previous(&session, output)?;
                continue;
            }
            ":reveal" => {
                session.reveal()?;
                write_answer(&card, None, output)?;
            }
            _ => {
                let Some(response) = read_response(&card, &line, input, output)? else {
                    return cancelled(output);
                };
                match session.submit(response, grader).await? {
                    Submission::AutoRated(feedback) => {
                        writeln!(output, "{}", feedback.message)?;
                        continue;
                    }
                    Submission::NeedsRating(feedback) => {
                        write_answer(&card, Some(&feedback), output)?;
                    }
                }
            }
        }
        if !read_rating(&mut session, input, output)? {
            return cancelled(output);
        }
    }
    Ok(Some(session.finish()?))
}

/// Persist the session. A failed write is offered for retry; declining
/// discards the results.
pub fn commit_with_retry(
    library: &mut Library,
    store: &mut impl KeyValueStore,
    user: &str,
    outcome: &SessionOutcome,
    now: Timestamp,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Fallible<SessionReport> {
    let mut pending = library.prepare_commit(outcome, now);
    loop {
        match library.commit(pending, store, user) {
            Ok(report) => return Ok(report),
            Err(err) => {
                writeln!(output, "Could not save results: {}", err.error)?;
                let answer = read_line(input, output, "Retry? [y/N] ")?;
                let retry = matches!(answer.as_deref(), Some("y") | Some("Y") | Some("yes"));
                if !retry {
                    return Err(err.into());
                }
                pending = err.pending;
            }
        }
    }
}

pub fn write_report(report: &SessionReport, output: &mut impl Write) -> Fallible<()> {
    writeln!(output, "\nSession complete.")?;
    writeln!(output, "Cards reviewed: {}", report.cards_reviewed)?;
    writeln!(output, "Average score:  {:.1}", report.average_score)?;
    writeln!(output, "XP gained:      {}", report.xp_gained)?;
    writeln!(output, "Deck mastery:   {}%", report.deck_mastery)?;
    writeln!(output, "Cards mastered: {}", report.cards_mastered)?;
    writeln!(output, "Streak:         {} days", report.streak)?;
    Ok(())
}

fn cancelled(output: &mut impl Write) -> Fallible<Option<SessionOutcome>> {
    writeln!(output, "Session cancelled. Nothing was saved.")?;
    Ok(None)
}

fn read_line(
    input: &mut impl BufRead,
    output: &mut impl Write,
    prompt: &str,
) -> Fallible<Option<String>> {
    write!(output, "{prompt}")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

/// Right-hand matching items in a stable order that does not give away the
/// pairing.
fn matching_targets(card: &Card) -> Vec<&str> {
    let mut targets: Vec<&str> = card.pairs.iter().map(|p| p.right.as_str()).collect();
    targets.sort_unstable();
    targets
}

fn write_card(card: &Card, output: &mut impl Write) -> Fallible<()> {
    writeln!(output, "{}", card.prompt)?;
    match card.kind {
        CardKind::Choice => {
            for (i, option) in card.options.iter().enumerate() {
                writeln!(output, "  {}. {option}", i + 1)?;
            }
        }
        CardKind::BooleanJudgment => writeln!(output, "  (true/false)")?,
        CardKind::Matching => {
            for (i, target) in matching_targets(card).iter().enumerate() {
                writeln!(output, "  {}. {target}", i + 1)?;
            }
        }
        CardKind::OpenResponse => {}
    }
    Ok(())
}

fn answer_prompt(card: &Card) -> String {
    match (card.kind, card.pairs.first()) {
        (CardKind::Matching, Some(pair)) => format!("{} -> ", pair.left),
        _ => "> ".to_string(),
    }
}

/// Accept either the option text or its number.
fn pick<'a>(line: &'a str, items: &[&'a str]) -> &'a str {
    match line.parse::<usize>() {
        Ok(n) if (1..=items.len()).contains(&n) => items[n - 1],
        _ => line,
    }
}

/// Build a response from the first line of input, reading more lines for
/// matching cards. Returns `None` on end of input.
fn read_response(
    card: &Card,
    first: &str,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Fallible<Option<Response>> {
    let response = match card.kind {
        CardKind::OpenResponse => Response::Text(first.to_string()),
        CardKind::BooleanJudgment => Response::Boolean(first.to_string()),
        CardKind::Choice => {
            let options: Vec<&str> = card.options.iter().map(String::as_str).collect();
            Response::Choice(pick(first, &options).to_string())
        }
        CardKind::Matching => {
            let targets = matching_targets(card);
            let mut pairs = BTreeMap::new();
            let mut line = first.to_string();
            for (i, pair) in card.pairs.iter().enumerate() {
                if i > 0 {
                    match read_line(input, output, &format!("{} -> ", pair.left))? {
                        Some(next) => line = next,
                        None => return Ok(None),
                    }
                }
                pairs.insert(pair.left.clone(), pick(&line, &targets).to_string());
            }
            Response::Matching(pairs)
        }
    };
    Ok(Some(response))
}

fn write_answer(card: &Card, feedback: Option<&Feedback>, output: &mut impl Write) -> Fallible<()> {
    if let Some(feedback) = feedback {
        writeln!(output, "{} (score {})", feedback.message, feedback.score)?;
    }
    match card.kind {
        CardKind::Matching => {
            for pair in &card.pairs {
                writeln!(output, "  {} -> {}", pair.left, pair.right)?;
            }
        }
        _ => writeln!(output, "Answer: {}", card.answer)?,
    }
    if let Some(explanation) = &card.explanation {
        writeln!(output, "{explanation}")?;
    }
    Ok(())
}

fn write_previous(session: &Session, output: &mut impl Write) -> Fallible<()> {
    let Some(record) = session.last_review() else {
        writeln!(output, "No card rated yet.")?;
        return Ok(());
    };
    writeln!(output, "Previous: {}", record.card.prompt)?;
    if let Some(response) = &record.response {
        writeln!(output, "You answered: {response}")?;
    }
    write_answer(&record.card, record.feedback.as_ref(), output)?;
    writeln!(output, "Rated: {} ({})", record.rating, record.rating.as_str())?;
    Ok(())
}

/// Ask for a manual rating until a valid one is given. Returns `false` if
/// the user quits instead.
fn read_rating(
    session: &mut Session,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Fallible<bool> {
    if let Some(preview) = session.preview() {
        let choices: Vec<String> = preview
            .iter()
            .map(|(rating, days)| format!("{rating} {} ({days}d)", rating.as_str()))
            .collect();
        writeln!(output, "Rate: {}", choices.join("  "))?;
    }
    loop {
        let Some(line) = read_line(input, output, "rating> ")? else {
            return Ok(false);
        };
        if line == ":quit" {
            return Ok(false);
        }
        let Ok(value) = line.parse::<u8>() else {
            writeln!(output, "Choose 1, 3, 4 or 5.")?;
            continue;
        };
        match session.rate(value) {
            Ok(Placement::Retired) => {
                writeln!(output, "Mastered for this session.")?;
                return Ok(true);
            }
            Ok(Placement::Reinserted(_)) => return Ok(true),
            Err(SessionError::InvalidManualRating(_)) => {
                writeln!(output, "Choose 1, 3, 4 or 5.")?;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
