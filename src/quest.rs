use std::collections::BTreeMap;
use std::time::Duration;

use log::{info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;

use crate::clue::definition::{ClueDefinition, ClueId};
use crate::clue::{ClueEngine, ClueError, ClueResult, DEFAULT_FEEDBACK_DELAY};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuestError {
    #[error("a nickname is required to start the quest")]
    EmptyNickname,
    #[error("clue `{0}` is already completed")]
    ClueCompleted(ClueId),
    #[error("clue `{clue}` unlocks after `{missing}`")]
    ClueLocked { clue: ClueId, missing: ClueId },
    #[error("clue `{0}` is still in progress")]
    ClueInProgress(ClueId),
    #[error("no clue is being played")]
    NoActiveClue,
    #[error(transparent)]
    Clue(#[from] ClueError),
}

/// Whether a clue can be picked from the selection menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClueStatus {
    Available,
    Completed(u32),
    Locked(ClueId),
}

/// One play-through, from "start quest" until the player returns to the
/// landing screen.
#[derive(Debug)]
pub struct QuestSession {
    nickname: String,
    event_code: Option<String>,
    /// Final score of every completed clue.
    completed: BTreeMap<ClueId, u32>,
    active: Option<ClueEngine>,
    feedback_delay: Duration,
    has_seen_welcome: bool,
    /// Seeds each clue's option shuffling.
    rng: StdRng,
}

impl QuestSession {
    pub fn start(nickname: &str, event_code: Option<&str>) -> Result<Self, QuestError> {
        let nickname = nickname.trim();
        if nickname.is_empty() {
            return Err(QuestError::EmptyNickname);
        }
        let event_code = event_code
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(String::from);

        info!("Quest started for {nickname} (event code: {event_code:?})");
        Ok(Self {
            nickname: nickname.to_string(),
            event_code,
            completed: BTreeMap::new(),
            active: None,
            feedback_delay: DEFAULT_FEEDBACK_DELAY,
            has_seen_welcome: false,
            rng: StdRng::from_entropy(),
        })
    }

    pub fn with_feedback_delay(mut self, delay: Duration) -> Self {
        self.feedback_delay = delay;
        self
    }

    pub fn nickname(&self) -> &str {
        &self.nickname
    }

    pub fn event_code(&self) -> Option<&str> {
        self.event_code.as_deref()
    }

    /// Sum of the final scores of the completed clues.
    pub fn total_score(&self) -> u32 {
        self.completed.values().sum()
    }

    pub fn is_completed(&self, clue: &ClueId) -> bool {
        self.completed.contains_key(clue)
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn has_seen_welcome(&self) -> bool {
        self.has_seen_welcome
    }

    pub fn mark_welcome_seen(&mut self) {
        self.has_seen_welcome = true;
    }

    pub fn status(&self, clue: &ClueDefinition) -> ClueStatus {
        if let Some(&score) = self.completed.get(&clue.id) {
            return ClueStatus::Completed(score);
        }
        match clue.requires.iter().find(|r| !self.is_completed(r)) {
            Some(missing) => ClueStatus::Locked(missing.clone()),
            None => ClueStatus::Available,
        }
    }

    pub fn active(&self) -> Option<&ClueEngine> {
        self.active.as_ref()
    }

    pub fn active_mut(&mut self) -> Option<&mut ClueEngine> {
        self.active.as_mut()
    }

    pub fn select_clue(&mut self, clue: &ClueDefinition) -> Result<&mut ClueEngine, QuestError> {
        if let Some(active) = &self.active {
            return Err(QuestError::ClueInProgress(active.definition().id.clone()));
        }
        match self.status(clue) {
            ClueStatus::Available => {}
            ClueStatus::Completed(_) => return Err(QuestError::ClueCompleted(clue.id.clone())),
            ClueStatus::Locked(missing) => {
                return Err(QuestError::ClueLocked {
                    clue: clue.id.clone(),
                    missing,
                })
            }
        }

        info!("{} selected clue {}", self.nickname, clue.id);
        let rng = StdRng::seed_from_u64(self.rng.gen());
        let engine = ClueEngine::start(clue.clone(), rng, self.feedback_delay)?;
        Ok(self.active.insert(engine))
    }

    /// Abandon the clue being played; its progress is lost.
    pub fn back_to_selection(&mut self) {
        if let Some(engine) = self.active.take() {
            info!(
                "Left clue {} at step {}",
                engine.definition().id,
                engine.session().step
            );
        }
    }

    /// Record the finished clue and discard its engine.
    pub fn finish_clue(&mut self) -> Result<ClueResult, QuestError> {
        let engine = self.active.as_ref().ok_or(QuestError::NoActiveClue)?;
        let result = engine.finish()?;
        self.active = None;

        if self.completed.insert(result.clue.clone(), result.score).is_some() {
            warn!("Clue {} was already recorded; keeping the latest score", result.clue);
        }
        info!(
            "Clue {} completed with {} points, total {}",
            result.clue,
            result.score,
            self.total_score()
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clue::catalog::{mystery_guest, parents};
    use crate::clue::Verdict;

    fn session() -> QuestSession {
        QuestSession::start("Amina", Some("  "))
            .unwrap()
            .with_feedback_delay(Duration::ZERO)
    }

    fn play_mystery_guest(quest: &mut QuestSession) -> ClueResult {
        let engine = quest.select_clue(&mystery_guest()).unwrap();
        engine.advance().unwrap();
        engine.advance().unwrap();
        for answer in ["bilicsan", "guide"] {
            let Verdict::Correct { ticket, .. } = engine.submit_free_text(answer).unwrap() else {
                panic!("expected correct");
            };
            engine.resolve_feedback(ticket).unwrap();
            engine.advance().unwrap();
        }
        quest.finish_clue().unwrap()
    }

    #[test]
    fn test_start_requires_nickname() {
        assert_eq!(
            QuestSession::start("   ", None).unwrap_err(),
            QuestError::EmptyNickname
        );
        let quest = QuestSession::start(" Amina ", Some(" W-42 ")).unwrap();
        assert_eq!(quest.nickname(), "Amina");
        assert_eq!(quest.event_code(), Some("W-42"));
        assert_eq!(session().event_code(), None);
    }

    #[test]
    fn test_finish_records_score_and_discards_engine() {
        let mut quest = session();
        let result = play_mystery_guest(&mut quest);
        assert_eq!(result.score, 20);
        assert_eq!(quest.total_score(), 20);
        assert_eq!(quest.completed_count(), 1);
        assert!(quest.active().is_none());
        assert!(quest.is_completed(&"mystery-guest".into()));
        assert_eq!(quest.status(&mystery_guest()), ClueStatus::Completed(20));
        assert_eq!(
            quest.select_clue(&mystery_guest()).unwrap_err(),
            QuestError::ClueCompleted("mystery-guest".into())
        );
    }

    #[test]
    fn test_back_to_selection_discards_progress() {
        let mut quest = session();
        quest.select_clue(&parents()).unwrap().choose(&"groom".into()).unwrap();
        assert_eq!(
            quest.select_clue(&mystery_guest()).unwrap_err(),
            QuestError::ClueInProgress("parents".into())
        );

        quest.back_to_selection();
        assert!(quest.active().is_none());
        assert_eq!(quest.total_score(), 0);
        assert_eq!(quest.finish_clue().unwrap_err(), QuestError::NoActiveClue);

        let engine = quest.select_clue(&parents()).unwrap();
        assert_eq!(engine.session().step.as_ref(), "parent-choice");
    }

    #[test]
    fn test_finish_before_terminal_keeps_engine() {
        let mut quest = session();
        quest.select_clue(&parents()).unwrap();
        assert!(matches!(
            quest.finish_clue(),
            Err(QuestError::Clue(ClueError::InvalidTransition { .. }))
        ));
        assert!(quest.active().is_some());
    }

    #[test]
    fn test_requires_gates_selection() {
        let mut finale = parents();
        finale.id = "finale".into();
        finale.requires = vec!["mystery-guest".into()];

        let mut quest = session();
        assert_eq!(
            quest.status(&finale),
            ClueStatus::Locked("mystery-guest".into())
        );
        assert!(matches!(
            quest.select_clue(&finale),
            Err(QuestError::ClueLocked { .. })
        ));

        play_mystery_guest(&mut quest);
        assert_eq!(quest.status(&finale), ClueStatus::Available);
        assert!(quest.select_clue(&finale).is_ok());
    }

    #[test]
    fn test_welcome_shown_once() {
        let mut quest = session();
        assert!(!quest.has_seen_welcome());
        quest.mark_welcome_seen();
        assert!(quest.has_seen_welcome());
    }
}
