mod clue;
mod config;
mod play;
mod quest;
mod tutorial;

use std::io;

use anyhow::{Context, Result};
use clue::catalog::Catalog;
use clue::definition::ClueDefinition;
use config::QuestConfig;
use play::{Console, Game};

fn main() -> Result<()> {
    // Logs go to stderr. Control verbosity with RUST_LOG:
    //   RUST_LOG=info   quest /play   # clue selection, transitions, scores
    //   RUST_LOG=debug  quest /play   # + rejected answers, feedback scheduling
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let args: Vec<String> = std::env::args().collect();
    let config = QuestConfig::from_args(&args)?;

    let mut catalog = Catalog::builtin();
    for path in &config.extra_clues {
        let clue = ClueDefinition::load(path)?;
        let id = clue.id.clone();
        catalog
            .add(clue)
            .with_context(|| format!("cannot add clue `{id}` from {}", path.display()))?;
    }

    println!("Starting quest");
    println!("  Route          : {}", config.route.path());
    println!("  Feedback delay : {:?}", config.feedback_delay);
    println!("  Clues          : {}", catalog.len());

    let console = Console::new(io::stdin().lock(), io::stdout());
    let mut game = Game::new(console, catalog, &config);
    game.run(config.route)
}
