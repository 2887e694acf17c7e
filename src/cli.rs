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

use clap::Parser;
use clap::Subcommand;
use env_logger::Env;
use studyloop_core::evaluate::NoGrader;

use crate::cmd::decks::delete_deck;
use crate::cmd::decks::list_decks;
use crate::cmd::drill::drill;
use crate::cmd::import::import_file;
use crate::cmd::stats::StatsFormat;
use crate::cmd::stats::print_stats;
use crate::config::Config;
use crate::error::Fallible;
use crate::grader::HttpGrader;

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the config file. By default, `studyloop.toml` in the current directory is used if present.
    #[arg(long, global = true)]
    config: Option<String>,
    /// Log debug output.
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a TOML deck file.
    Import {
        /// Path to the deck file.
        file: String,
        /// Deck to import into. By default, the `id` in the file or the file name is used.
        #[arg(long)]
        deck: Option<String>,
    },
    /// Review a deck in the terminal.
    Drill {
        /// The deck to review.
        deck: String,
        /// Seed for the card order. By default, the current time is used.
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Print study statistics.
    Stats {
        /// Which output format to use.
        #[arg(long, default_value_t = StatsFormat::Text)]
        format: StatsFormat,
    },
    /// List all decks.
    Decks,
    /// Delete a deck and all of its cards.
    Delete {
        /// The deck to delete.
        deck: String,
    },
}

pub async fn entrypoint() -> Fallible<()> {
    let cli: Cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
    let config = Config::load(cli.config.as_deref())?;
    match cli.command {
        Command::Import { file, deck } => import_file(&config, &file, deck),
        Command::Drill { deck, seed } => match &config.grader.endpoint {
            Some(endpoint) => drill(&config, &deck, seed, &HttpGrader::new(endpoint)?).await,
            None => drill(&config, &deck, seed, &NoGrader).await,
        },
        Command::Stats { format } => print_stats(&config, format),
        Command::Decks => list_decks(&config),
        Command::Delete { deck } => delete_deck(&config, &deck),
    }
}
