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

//! Importing provider output: a TOML deck file with a list of cards.
//!
//! ```toml
//! title = "Biology"
//! description = "Cells and organelles"
//!
//! [[cards]]
//! prompt = "Powerhouse of the cell?"
//! answer = "Mitochondria"
//! kind = "choice"
//! options = ["Nucleus", "Mitochondria", "Ribosome"]
//! ```

use std::fs::read_to_string;
use std::path::Path;

use serde::Deserialize;
use studyloop_core::ImportSummary;
use studyloop_core::Library;
use studyloop_core::NewCard;
use studyloop_core::Timestamp;
use studyloop_core::types::card::CardKind;

use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Context;
use crate::error::ErrorReport;
use crate::error::Fallible;
use crate::error::fail;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeckFile {
    pub id: Option<String>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cards: Vec<NewCard>,
}

impl DeckFile {
    pub fn parse(text: &str) -> Fallible<Self> {
        let file: DeckFile = toml::from_str(text).context("failed to parse deck file")?;
        if file.title.trim().is_empty() {
            return fail("deck title must not be empty");
        }
        for (i, card) in file.cards.iter().enumerate() {
            check_card(card)
                .map_err(|e| ErrorReport::new(format!("card {}: {}", i + 1, e.message())))?;
        }
        Ok(file)
    }
}

fn check_card(card: &NewCard) -> Fallible<()> {
    if card.prompt.trim().is_empty() {
        return fail("prompt must not be empty");
    }
    match card.kind {
        CardKind::Matching => {
            if card.pairs.is_empty() {
                return fail("matching card has no pairs");
            }
        }
        CardKind::Choice => {
            if card.options.is_empty() {
                return fail("choice card has no options");
            }
            if card.answer.trim().is_empty() {
                return fail("answer must not be empty");
            }
        }
        CardKind::OpenResponse | CardKind::BooleanJudgment => {
            if card.answer.trim().is_empty() {
                return fail("answer must not be empty");
            }
        }
    }
    Ok(())
}

/// Deck id precedence: the command line, then the file, then the file name.
fn resolve_deck_id(flag: Option<String>, file: &DeckFile, path: &Path) -> Fallible<String> {
    let id = flag
        .or_else(|| file.id.clone())
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()));
    match id {
        Some(id) if !id.trim().is_empty() => Ok(id.trim().to_string()),
        _ => fail("cannot determine a deck id; pass --deck"),
    }
}

pub fn import_deck(
    library: &mut Library,
    deck_id: &str,
    file: DeckFile,
    now: Timestamp,
) -> ImportSummary {
    let summary = library.import(deck_id, &file.title, &file.description, file.cards, now);
    log::info!(
        "imported {} cards into {deck_id} ({} duplicates)",
        summary.added,
        summary.duplicates
    );
    summary
}

pub fn import_file(config: &Config, path: &str, deck: Option<String>) -> Fallible<()> {
    let path = Path::new(path);
    let text = read_to_string(path)?;
    let file = DeckFile::parse(&text)?;
    let deck_id = resolve_deck_id(deck, &file, path)?;

    let mut store = SqliteStore::open(&config.database)?;
    let mut library = Library::load(&store, &config.user)?;
    let summary = import_deck(&mut library, &deck_id, file, Timestamp::now());
    library.save(&mut store, &config.user)?;

    println!(
        "Imported {} cards into deck '{deck_id}' ({} already present).",
        summary.added, summary.duplicates
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const BIOLOGY: &str = r#"
title = "Biology"
description = "Cells"

[[cards]]
prompt = "Powerhouse of the cell?"
answer = "Mitochondria"
kind = "choice"
options = ["Nucleus", "Mitochondria", "Ribosome"]

[[cards]]
prompt = "Cells have walls in plants."
answer = "true"
kind = "boolean_judgment"

[[cards]]
prompt = "Match the organelle to its role."
answer = ""
kind = "matching"
pairs = [
    { left = "Ribosome", right = "Protein synthesis" },
    { left = "Nucleus", right = "Stores DNA" },
]

[[cards]]
prompt = "Describe osmosis."
answer = "Diffusion of water across a membrane"
kind = "open_response"
difficulty = "advanced"
"#;

    fn ts(s: &str) -> Timestamp {
        Timestamp::try_from(s.to_string()).unwrap()
    }

    #[test]
    fn test_parse_deck_file() -> Fallible<()> {
        let file = DeckFile::parse(BIOLOGY)?;
        assert_eq!(file.title, "Biology");
        assert_eq!(file.cards.len(), 4);
        assert_eq!(file.cards[2].pairs.len(), 2);
        Ok(())
    }

    #[test]
    fn test_invalid_cards_rejected() {
        let missing_options = "title = \"T\"\n[[cards]]\nprompt = \"p\"\nanswer = \"a\"\nkind = \"choice\"\n";
        let err = DeckFile::parse(missing_options).unwrap_err();
        assert!(err.message().contains("card 1"));
        assert!(DeckFile::parse("title = \"\"").is_err());
        assert!(DeckFile::parse("title = \"T\"\nauthor = \"x\"").is_err());
    }

    #[test]
    fn test_deck_id_precedence() -> Fallible<()> {
        let mut file = DeckFile::parse(BIOLOGY)?;
        let path = Path::new("decks/bio.toml");
        assert_eq!(resolve_deck_id(None, &file, path)?, "bio");
        file.id = Some("biology-101".to_string());
        assert_eq!(resolve_deck_id(None, &file, path)?, "biology-101");
        assert_eq!(resolve_deck_id(Some("mine".to_string()), &file, path)?, "mine");
        Ok(())
    }

    #[test]
    fn test_reimport_is_idempotent() -> Fallible<()> {
        let mut library = Library::default();
        let now = ts("2024-03-01T12:00:00.000");
        let first = import_deck(&mut library, "bio", DeckFile::parse(BIOLOGY)?, now);
        assert_eq!(first.added, 4);
        let second = import_deck(&mut library, "bio", DeckFile::parse(BIOLOGY)?, now);
        assert_eq!(second.added, 0);
        assert_eq!(second.duplicates, 4);
        assert_eq!(library.cards.len(), 4);
        assert!(library.cards.iter().all(|c| c.is_due(now)));
        Ok(())
    }
}
