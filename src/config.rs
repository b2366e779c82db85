use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use log::info;

use crate::clue::DEFAULT_FEEDBACK_DELAY;

/// Top-level screens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Landing,
    Play,
}

impl Route {
    /// `/` redirects to the landing page.
    pub fn resolve(path: &str) -> Result<Self> {
        match path.trim_end_matches('/') {
            "" => {
                info!("Redirecting / to /landing");
                Ok(Route::Landing)
            }
            "/landing" | "landing" => Ok(Route::Landing),
            "/play" | "play" => Ok(Route::Play),
            other => bail!("unknown route `{other}` (expected /, /landing or /play)"),
        }
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Landing => "/landing",
            Route::Play => "/play",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuestConfig {
    /// Screen shown first.
    pub route: Route,
    /// How long "Correct!" stays on screen before moving on.
    pub feedback_delay: Duration,
    /// Additional clue definitions (JSON) to offer next to the built-in ones.
    pub extra_clues: Vec<PathBuf>,
}

impl Default for QuestConfig {
    fn default() -> Self {
        Self {
            route: Route::Landing,
            feedback_delay: DEFAULT_FEEDBACK_DELAY,
            extra_clues: Vec::new(),
        }
    }
}

pub const USAGE: &str = "\
Usage: quest [route] [feedback_ms] [clue.json ...]

  route        /, /landing or /play (default /landing)
  feedback_ms  how long answer feedback stays up (default 1500)
  clue.json    extra clue definitions to add to the menu

Logging: set RUST_LOG=debug for verbose output";

impl QuestConfig {
    /// Parse `args` as passed to the binary, program name first.
    pub fn from_args(args: &[String]) -> Result<Self> {
        let mut config = Self::default();

        if let Some(route) = args.get(1) {
            if route == "-h" || route == "--help" {
                bail!("{USAGE}");
            }
            config.route = Route::resolve(route).context(USAGE)?;
        }
        if let Some(ms) = args.get(2) {
            let ms: u64 = ms
                .parse()
                .with_context(|| format!("feedback_ms must be a number, got `{ms}`"))?;
            config.feedback_delay = Duration::from_millis(ms);
        }
        config.extra_clues = args.iter().skip(3).map(PathBuf::from).collect();

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(items: &[&str]) -> Vec<String> {
        std::iter::once("quest")
            .chain(items.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn test_defaults() {
        let config = QuestConfig::from_args(&args(&[])).unwrap();
        assert_eq!(config, QuestConfig::default());
        assert_eq!(config.feedback_delay, Duration::from_millis(1500));
    }

    #[test]
    fn test_route_resolution() {
        assert_eq!(Route::resolve("/").unwrap(), Route::Landing);
        assert_eq!(Route::resolve("/landing").unwrap(), Route::Landing);
        assert_eq!(Route::resolve("/play/").unwrap(), Route::Play);
        assert!(Route::resolve("/admin").is_err());
        assert_eq!(Route::Play.path(), "/play");
    }

    #[test]
    fn test_full_args() {
        let config = QuestConfig::from_args(&args(&["/play", "0", "a.json", "b.json"])).unwrap();
        assert_eq!(config.route, Route::Play);
        assert_eq!(config.feedback_delay, Duration::ZERO);
        assert_eq!(
            config.extra_clues,
            vec![PathBuf::from("a.json"), PathBuf::from("b.json")]
        );
    }

    #[test]
    fn test_bad_delay() {
        let err = QuestConfig::from_args(&args(&["/", "soon"])).unwrap_err();
        assert!(err.to_string().contains("soon"));
    }
}
