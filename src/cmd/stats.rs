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

use std::fmt::Display;
use std::fmt::Formatter;
use std::io::Write;

use clap::ValueEnum;
use serde::Serialize;
use studyloop_core::Library;
use studyloop_core::Timestamp;

use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Fallible;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
pub enum StatsFormat {
    Text,
    Json,
}

impl Display for StatsFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Text => write!(f, "text"),
            StatsFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Serialize)]
struct Stats {
    streak: u32,
    last_study: Option<Timestamp>,
    total_xp: u64,
    cards_mastered: usize,
    total_cards: usize,
    decks: Vec<DeckStats>,
}

#[derive(Serialize)]
struct DeckStats {
    id: String,
    title: String,
    total_cards: usize,
    mastery_level: u8,
    due_now: usize,
}

fn collect(library: &Library, now: Timestamp) -> Stats {
    let decks = library
        .decks
        .iter()
        .map(|deck| DeckStats {
            id: deck.id.clone(),
            title: deck.title.clone(),
            total_cards: deck.total_cards,
            mastery_level: deck.mastery_level,
            due_now: library
                .cards
                .iter()
                .filter(|c| c.deck_id == deck.id && c.is_due(now))
                .count(),
        })
        .collect();
    Stats {
        streak: library.stats.streak,
        last_study: library.stats.last_study,
        total_xp: library.stats.total_xp,
        cards_mastered: library.stats.cards_mastered,
        total_cards: library.cards.len(),
        decks,
    }
}

pub fn write_stats(
    library: &Library,
    now: Timestamp,
    format: StatsFormat,
    out: &mut impl Write,
) -> Fallible<()> {
    let stats = collect(library, now);
    match format {
        StatsFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &stats)?;
            writeln!(out)?;
        }
        StatsFormat::Text => {
            writeln!(out, "Streak:         {} days", stats.streak)?;
            match stats.last_study {
                Some(ts) => writeln!(out, "Last studied:   {ts}")?,
                None => writeln!(out, "Last studied:   never")?,
            }
            writeln!(out, "Total XP:       {}", stats.total_xp)?;
            writeln!(
                out,
                "Cards mastered: {} of {}",
                stats.cards_mastered, stats.total_cards
            )?;
            for deck in &stats.decks {
                writeln!(
                    out,
                    "  {:<20} {:>3}% mastered, {} cards, {} due",
                    deck.id, deck.mastery_level, deck.total_cards, deck.due_now
                )?;
            }
        }
    }
    Ok(())
}

pub fn print_stats(config: &Config, format: StatsFormat) -> Fallible<()> {
    let store = SqliteStore::open(&config.database)?;
    let library = Library::load(&store, &config.user)?;
    write_stats(&library, Timestamp::now(), format, &mut std::io::stdout().lock())
}

#[cfg(test)]
mod tests {
    use studyloop_core::NewCard;
    use studyloop_core::types::card::CardKind;

    use super::*;

    fn library(now: Timestamp) -> Library {
        let mut library = Library::default();
        let cards = ["a", "b"]
            .iter()
            .map(|p| NewCard {
                prompt: p.to_string(),
                answer: "x".to_string(),
                kind: CardKind::BooleanJudgment,
                difficulty: Default::default(),
                explanation: None,
                options: vec![],
                pairs: vec![],
            })
            .collect();
        library.import("logic", "Logic", "", cards, now);
        library
    }

    #[test]
    fn test_text_stats() -> Fallible<()> {
        let now = Timestamp::try_from("2024-03-01T12:00:00.000".to_string())?;
        let mut out = Vec::new();
        write_stats(&library(now), now, StatsFormat::Text, &mut out)?;
        let text = String::from_utf8_lossy(&out);
        assert!(text.contains("Last studied:   never"));
        assert!(text.contains("Cards mastered: 0 of 2"));
        assert!(text.contains("0% mastered, 2 cards, 2 due"));
        Ok(())
    }

    #[test]
    fn test_json_stats() -> Fallible<()> {
        let now = Timestamp::try_from("2024-03-01T12:00:00.000".to_string())?;
        let mut out = Vec::new();
        write_stats(&library(now), now, StatsFormat::Json, &mut out)?;
        let value: serde_json::Value = serde_json::from_slice(&out)?;
        assert_eq!(value["total_cards"], 2);
        assert_eq!(value["decks"][0]["id"], "logic");
        assert_eq!(value["decks"][0]["due_now"], 2);
        Ok(())
    }
}
