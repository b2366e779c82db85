pub mod answer;
pub mod catalog;
pub mod definition;
pub mod progress;
pub mod scoring;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::{debug, info};
use rand::rngs::StdRng;
use thiserror::Error;

use definition::{
    BranchId, ChoiceOption, ClueDefinition, ClueId, DefinitionError, FreeTextQuestion, Next,
    StepId, StepKind, StepSpec,
};

/// How long "Correct!" feedback stays up before the engine moves on.
pub const DEFAULT_FEEDBACK_DELAY: Duration = Duration::from_millis(1500);

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Operations the engine accepts, used to report rejected transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Choose,
    Advance,
    AnswerMultipleChoice,
    SubmitFreeText,
    RequestHint,
    Back,
    Finish,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Action::Choose => "choose",
            Action::Advance => "advance",
            Action::AnswerMultipleChoice => "answer multiple choice",
            Action::SubmitFreeText => "submit free text",
            Action::RequestHint => "request hint",
            Action::Back => "back",
            Action::Finish => "finish",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClueError {
    #[error("cannot {action} on step `{step}`")]
    InvalidTransition { step: StepId, action: Action },
    #[error("step `{0}` is still showing feedback")]
    TransitionPending(StepId),
    #[error("feedback ticket does not belong to this session's pending transition")]
    StaleTicket,
    #[error("step `{step}` has no option `{option}`")]
    UnknownOption { step: StepId, option: String },
    #[error("step `{step}` has no path `{branch}`")]
    UnknownBranch { step: StepId, branch: BranchId },
    #[error("answer is empty")]
    EmptyAnswer,
    #[error("all {0} hints already shown")]
    HintsExhausted(usize),
    #[error("no branch left to continue with")]
    NoBranchLeft,
    #[error("step `{0}` is not defined")]
    UnknownStep(StepId),
    #[error(transparent)]
    Definition(#[from] DefinitionError),
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Live progress through one clue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClueSession {
    pub step: StepId,
    /// Only ever grows.
    pub score: u32,
    pub branch: Option<BranchId>,
    pub completed_branches: BTreeSet<BranchId>,
    /// Hints shown per free-text step, cleared when that step is answered.
    pub question_hints: BTreeMap<StepId, u32>,
    /// Every hint shown during the clue.
    pub total_hints: u32,
    /// Points of each answered part, in order.
    pub awards: Vec<u32>,
}

impl ClueSession {
    fn new(start: StepId) -> Self {
        Self {
            step: start,
            score: 0,
            branch: None,
            completed_branches: BTreeSet::new(),
            question_hints: BTreeMap::new(),
            total_hints: 0,
            awards: Vec::new(),
        }
    }
}

/// Outcome of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Points were added; the engine moves on once the ticket is resolved.
    Correct {
        awarded: u32,
        ticket: FeedbackTicket,
    },
    /// Nothing changed; the player may try again.
    Incorrect,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HintReveal {
    /// 1-based.
    pub number: u32,
    pub of: u32,
    pub text: String,
}

/// Final tally handed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClueResult {
    pub clue: ClueId,
    pub score: u32,
    pub hints_used: u32,
}

// ---------------------------------------------------------------------------
// Pending feedback
// ---------------------------------------------------------------------------

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Handle to one scheduled feedback transition.
///
/// Tickets carry the id of the session that issued them, so a ticket from a
/// discarded or restarted session can never move a live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTicket {
    session: u64,
    seq: u64,
}

#[derive(Debug, Clone)]
struct PendingFeedback {
    ticket: FeedbackTicket,
    target: StepId,
    due: Instant,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Interprets a [`ClueDefinition`] for one play-through of that clue.
pub struct ClueEngine {
    definition: ClueDefinition,
    session: ClueSession,
    session_id: u64,
    next_seq: u64,
    pending: Option<PendingFeedback>,
    feedback_delay: Duration,
    /// Order of the current multiple-choice options, reshuffled on entry.
    options: Vec<ChoiceOption>,
    rng: StdRng,
}

impl fmt::Debug for ClueEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClueEngine")
            .field("clue", &self.definition.id)
            .field("session", &self.session)
            .field("pending", &self.pending)
            .finish()
    }
}

impl ClueEngine {
    /// Begin `definition` at its start step with no score, hints or branch.
    pub fn start(
        definition: ClueDefinition,
        rng: StdRng,
        feedback_delay: Duration,
    ) -> Result<Self, ClueError> {
        definition.validate()?;
        Self::unchecked(definition, rng, feedback_delay)
    }

    fn unchecked(
        definition: ClueDefinition,
        rng: StdRng,
        feedback_delay: Duration,
    ) -> Result<Self, ClueError> {
        let start = definition.start.clone();
        let mut engine = Self {
            session: ClueSession::new(start.clone()),
            definition,
            session_id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
            next_seq: 0,
            pending: None,
            feedback_delay,
            options: Vec::new(),
            rng,
        };
        info!(
            "Clue {} started (session {}) at {}",
            engine.definition.id, engine.session_id, start
        );
        engine.enter(start)?;
        Ok(engine)
    }

    pub fn definition(&self) -> &ClueDefinition {
        &self.definition
    }

    pub fn session(&self) -> &ClueSession {
        &self.session
    }

    pub fn score(&self) -> u32 {
        self.session.score
    }

    pub fn current(&self) -> Result<&StepSpec, ClueError> {
        self.spec(&self.session.step)
    }

    pub fn is_complete(&self) -> bool {
        self.pending.is_none() && self.current().is_ok_and(StepSpec::is_terminal)
    }

    /// Options of the current multiple-choice step, in display order.
    pub fn options(&self) -> &[ChoiceOption] {
        &self.options
    }

    pub fn progress_percentage(&self) -> f64 {
        progress::percentage(&self.definition.progress, &self.session.step)
    }

    // -----------------------------------------------------------------------
    // Transitions
    // -----------------------------------------------------------------------

    /// Pick a path on a path-choice step.
    pub fn choose(&mut self, branch: &BranchId) -> Result<&StepId, ClueError> {
        self.ensure_idle()?;
        let step = self.current()?;
        let StepKind::ChoiceIntro { options } = &step.kind else {
            return Err(self.invalid(Action::Choose));
        };
        let next = options
            .iter()
            .find(|o| &o.branch == branch)
            .map(|o| o.next.clone())
            .ok_or_else(|| ClueError::UnknownBranch {
                step: step.id.clone(),
                branch: branch.clone(),
            })?;

        self.enter(next)?;
        info!("Path chosen: {branch}");
        self.session.branch = Some(branch.clone());
        Ok(&self.session.step)
    }

    /// Confirm a narrative, success or transition screen.
    pub fn advance(&mut self) -> Result<&StepId, ClueError> {
        self.ensure_idle()?;
        let step = self.current()?;
        match &step.kind {
            StepKind::Narrative { next, .. } | StepKind::SuccessInterstitial { next } => {
                let target = self.resolve(next, self.session.branch.as_ref())?;
                self.enter(target)?;
            }
            StepKind::Transition { next } => {
                let branch = self
                    .definition
                    .branches
                    .iter()
                    .find(|b| !self.session.completed_branches.contains(*b))
                    .cloned()
                    .ok_or(ClueError::NoBranchLeft)?;
                let target = self.resolve(next, Some(&branch))?;
                self.enter(target)?;
                info!("Continuing with path: {branch}");
                self.session.branch = Some(branch);
            }
            _ => return Err(self.invalid(Action::Advance)),
        }
        Ok(&self.session.step)
    }

    pub fn answer_multiple_choice(&mut self, option_id: &str) -> Result<Verdict, ClueError> {
        self.ensure_idle()?;
        let step = self.current()?;
        let StepKind::MultipleChoice { award, next, .. } = &step.kind else {
            return Err(self.invalid(Action::AnswerMultipleChoice));
        };
        let correct = answer::is_correct(&self.options, option_id).ok_or_else(|| {
            ClueError::UnknownOption {
                step: step.id.clone(),
                option: option_id.to_string(),
            }
        })?;

        if !correct {
            debug!("Wrong option {option_id} on {}", step.id);
            return Ok(Verdict::Incorrect);
        }

        let (award, next) = (*award, next.clone());
        self.session.score += award;
        self.session.awards.push(award);
        info!(
            "Correct option on {} (+{award}, score {})",
            self.session.step, self.session.score
        );
        let ticket = self.schedule(next);
        Ok(Verdict::Correct {
            awarded: award,
            ticket,
        })
    }

    /// Check a free-text answer, from the question itself or its hint screen.
    pub fn submit_free_text(&mut self, raw: &str) -> Result<Verdict, ClueError> {
        self.ensure_idle()?;
        let question_step = self.question_step(Action::SubmitFreeText)?;
        if answer::is_blank(raw) {
            return Err(ClueError::EmptyAnswer);
        }
        let (question, next) = self.question(&question_step)?;

        if !answer::accepts(&question.accepted, raw) {
            debug!("Rejected answer \"{raw}\" on {question_step}");
            return Ok(Verdict::Incorrect);
        }

        let scoring = question.scoring;
        let closes_branch = matches!(next, Next::BranchDone { .. });
        let target = self.resolve(next, self.session.branch.as_ref())?;

        let hints = self
            .session
            .question_hints
            .remove(&question_step)
            .unwrap_or(0);
        let awarded = scoring.award(hints);
        self.session.score += awarded;
        self.session.awards.push(awarded);
        info!(
            "Accepted answer on {question_step} with {hints} hint(s) (+{awarded}, score {})",
            self.session.score
        );

        if closes_branch {
            if let Some(branch) = self.session.branch.clone() {
                info!("Path {branch} complete");
                self.session.completed_branches.insert(branch);
            }
        }
        let ticket = self.schedule(target);
        Ok(Verdict::Correct { awarded, ticket })
    }

    /// Reveal the next hint for the current question.
    pub fn request_hint(&mut self) -> Result<HintReveal, ClueError> {
        self.ensure_idle()?;
        let (question_step, move_to) = match &self.current()?.kind {
            StepKind::FreeText { question, .. } => {
                (self.session.step.clone(), question.hint_step.clone())
            }
            StepKind::Hint { question } => (question.clone(), None),
            StepKind::Narrative {
                hint_step: Some(hint),
                ..
            } => match &self.spec(hint)?.kind {
                StepKind::Hint { question } => (question.clone(), Some(hint.clone())),
                _ => return Err(self.invalid(Action::RequestHint)),
            },
            _ => return Err(self.invalid(Action::RequestHint)),
        };

        let (question, _) = self.question(&question_step)?;
        let available = question.hints.len();
        let used = self.hints_for(&question_step);
        if used as usize >= available {
            return Err(ClueError::HintsExhausted(available));
        }
        let text = question.hints[used as usize].clone();

        let number = used + 1;
        self.session
            .question_hints
            .insert(question_step.clone(), number);
        self.session.total_hints += 1;
        info!("Hint {number}/{available} shown for {question_step}");

        if let Some(hint) = move_to {
            self.enter(hint)?;
        }
        Ok(HintReveal {
            number,
            of: available as u32,
            text,
        })
    }

    /// Leave a hint screen for its question.
    pub fn back(&mut self) -> Result<&StepId, ClueError> {
        self.ensure_idle()?;
        let StepKind::Hint { question } = &self.current()?.kind else {
            return Err(self.invalid(Action::Back));
        };
        let question = question.clone();
        self.enter(question)?;
        Ok(&self.session.step)
    }

    /// Latest hint shown for the current question, if any.
    pub fn current_hint(&self) -> Option<HintReveal> {
        let step = self.question_step(Action::RequestHint).ok()?;
        let (question, _) = self.question(&step).ok()?;
        let used = self.hints_for(&step);
        let text = question.hints.get(used.checked_sub(1)? as usize)?;
        Some(HintReveal {
            number: used,
            of: question.hints.len() as u32,
            text: text.clone(),
        })
    }

    /// Answer to pre-fill once the player has used up the hints.
    pub fn revealed_answer(&self) -> Option<&str> {
        let step = self.question_step(Action::SubmitFreeText).ok()?;
        let (question, _) = self.question(&step).ok()?;
        if question.scoring.is_revealed(self.hints_for(&step)) {
            question.reveal.as_deref()
        } else {
            None
        }
    }

    pub fn finish(&self) -> Result<ClueResult, ClueError> {
        self.ensure_idle()?;
        if !self.current()?.is_terminal() {
            return Err(self.invalid(Action::Finish));
        }
        info!(
            "Clue {} finished with {} points",
            self.definition.id, self.session.score
        );
        Ok(ClueResult {
            clue: self.definition.id.clone(),
            score: self.session.score,
            hints_used: self.session.total_hints,
        })
    }

    // -----------------------------------------------------------------------
    // Feedback
    // -----------------------------------------------------------------------

    pub fn pending(&self) -> Option<(FeedbackTicket, Instant)> {
        self.pending.as_ref().map(|p| (p.ticket, p.due))
    }

    /// Apply the pending transition named by `ticket`.
    pub fn resolve_feedback(&mut self, ticket: FeedbackTicket) -> Result<&StepId, ClueError> {
        match self.pending.take() {
            Some(pending) if pending.ticket == ticket => {
                self.enter(pending.target)?;
                Ok(&self.session.step)
            }
            other => {
                self.pending = other;
                Err(ClueError::StaleTicket)
            }
        }
    }

    /// Apply the pending transition if it is due at `now`.
    pub fn poll(&mut self, now: Instant) -> Result<Option<&StepId>, ClueError> {
        match self.pending.as_ref() {
            Some(p) if p.due <= now => {
                let ticket = p.ticket;
                self.resolve_feedback(ticket).map(Some)
            }
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn spec(&self, id: &StepId) -> Result<&StepSpec, ClueError> {
        self.definition
            .step(id)
            .ok_or_else(|| ClueError::UnknownStep(id.clone()))
    }

    fn invalid(&self, action: Action) -> ClueError {
        ClueError::InvalidTransition {
            step: self.session.step.clone(),
            action,
        }
    }

    fn ensure_idle(&self) -> Result<(), ClueError> {
        match &self.pending {
            Some(_) => Err(ClueError::TransitionPending(self.session.step.clone())),
            None => Ok(()),
        }
    }

    fn hints_for(&self, question: &StepId) -> u32 {
        self.session
            .question_hints
            .get(question)
            .copied()
            .unwrap_or(0)
    }

    /// The free-text step the current screen answers.
    fn question_step(&self, action: Action) -> Result<StepId, ClueError> {
        match &self.current()?.kind {
            StepKind::FreeText { .. } => Ok(self.session.step.clone()),
            StepKind::Hint { question } => Ok(question.clone()),
            _ => Err(self.invalid(action)),
        }
    }

    fn question(&self, id: &StepId) -> Result<(&FreeTextQuestion, &Next), ClueError> {
        match &self.spec(id)?.kind {
            StepKind::FreeText { question, next } => Ok((question, next)),
            _ => Err(ClueError::UnknownStep(id.clone())),
        }
    }

    /// Target of `next` while on `branch`. A closing branch counts as done.
    fn resolve(&self, next: &Next, branch: Option<&BranchId>) -> Result<StepId, ClueError> {
        match next {
            Next::Step(id) => Ok(id.clone()),
            Next::ByBranch(map) => {
                let branch = branch.ok_or(ClueError::NoBranchLeft)?;
                map.get(branch)
                    .cloned()
                    .ok_or_else(|| ClueError::UnknownBranch {
                        step: self.session.step.clone(),
                        branch: branch.clone(),
                    })
            }
            Next::BranchDone {
                transition,
                complete,
            } => {
                let done = self
                    .definition
                    .branches
                    .iter()
                    .all(|b| self.session.completed_branches.contains(b) || Some(b) == branch);
                Ok(if done { complete } else { transition }.clone())
            }
        }
    }

    fn schedule(&mut self, target: StepId) -> FeedbackTicket {
        let ticket = FeedbackTicket {
            session: self.session_id,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        debug!(
            "Feedback for {} scheduled, {} next in {:?}",
            self.session.step, target, self.feedback_delay
        );
        self.pending = Some(PendingFeedback {
            ticket,
            target,
            due: Instant::now() + self.feedback_delay,
        });
        ticket
    }

    fn enter(&mut self, target: StepId) -> Result<(), ClueError> {
        let kind = self.spec(&target)?.kind.clone();
        info!("Transition: {} -> {}", self.session.step, target);
        self.session.step = target;

        match kind {
            StepKind::MultipleChoice { options, .. } => {
                self.options = answer::shuffled(&options, &mut self.rng);
            }
            StepKind::Terminal => {
                self.options.clear();
                let total = scoring::clue_total(
                    &self.session.awards,
                    self.definition.completion_bonus,
                    self.session.total_hints,
                );
                if total > self.session.score {
                    info!("No hints used: completion bonus +{}", total - self.session.score);
                    self.session.score = total;
                }
            }
            _ => self.options.clear(),
        }
        Ok(())
    }
}
