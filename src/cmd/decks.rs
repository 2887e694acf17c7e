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

use std::io::Write;

use studyloop_core::Library;

use crate::config::Config;
use crate::db::SqliteStore;
use crate::error::Fallible;
use crate::error::fail;

pub fn write_decks(library: &Library, out: &mut impl Write) -> Fallible<()> {
    if library.decks.is_empty() {
        writeln!(out, "No decks. Use `studyloop import` to add one.")?;
        return Ok(());
    }
    for deck in &library.decks {
        writeln!(
            out,
            "{}\t{}\t{} cards\t{}%",
            deck.id, deck.title, deck.total_cards, deck.mastery_level
        )?;
    }
    Ok(())
}

pub fn list_decks(config: &Config) -> Fallible<()> {
    let store = SqliteStore::open(&config.database)?;
    let library = Library::load(&store, &config.user)?;
    write_decks(&library, &mut std::io::stdout().lock())
}

pub fn delete_deck(config: &Config, deck_id: &str) -> Fallible<()> {
    let mut store = SqliteStore::open(&config.database)?;
    let mut library = Library::load(&store, &config.user)?;
    let Some(removed) = library.remove_deck(deck_id) else {
        return fail(format!("no such deck: {deck_id}"));
    };
    library.save(&mut store, &config.user)?;
    log::info!("deleted deck {deck_id} with {removed} cards");
    println!("Deleted deck '{deck_id}' and {removed} cards.");
    Ok(())
}
