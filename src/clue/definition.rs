use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::answer;
use super::scoring::{ScoringRule, MULTIPLE_CHOICE_AWARD};

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a step inside one clue (e.g. "groom-father").
    StepId
);
string_id!(
    /// One of the parallel sub-paths of a clue (e.g. "groom", "bride").
    BranchId
);
string_id!(
    /// Identifier of a whole clue (e.g. "parents").
    ClueId
);

// ---------------------------------------------------------------------------
// Steps
// ---------------------------------------------------------------------------

/// A selectable answer of a multiple-choice step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub correct: bool,
}

impl ChoiceOption {
    pub fn new(id: &str, text: &str, correct: bool) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            correct,
        }
    }
}

/// One entry of a path choice: picking it records `branch`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchOption {
    pub branch: BranchId,
    pub label: String,
    pub next: StepId,
}

/// Where a step leads once it is done.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Next {
    Step(StepId),
    /// Depends on the branch the player is currently on.
    ByBranch(BTreeMap<BranchId, StepId>),
    /// Closes the current branch. Goes to `transition` while other branches
    /// remain, to `complete` once every branch is done.
    BranchDone { transition: StepId, complete: StepId },
}

/// A question answered in free text and scored by hints used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeTextQuestion {
    pub prompt: String,
    /// Keywords; the answer is accepted if it contains any of them.
    pub accepted: Vec<String>,
    #[serde(default)]
    pub hints: Vec<String>,
    pub scoring: ScoringRule,
    /// Canonical answer offered to the player once hints are exhausted.
    #[serde(default)]
    pub reveal: Option<String>,
    /// Dedicated hint screen; without one, hints show on the question itself.
    #[serde(default)]
    pub hint_step: Option<StepId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum StepKind {
    ChoiceIntro {
        options: Vec<BranchOption>,
    },
    Narrative {
        next: Next,
        #[serde(default)]
        hint_step: Option<StepId>,
    },
    MultipleChoice {
        prompt: String,
        options: Vec<ChoiceOption>,
        #[serde(default = "multiple_choice_award")]
        award: u32,
        next: StepId,
    },
    SuccessInterstitial {
        next: Next,
    },
    FreeText {
        question: FreeTextQuestion,
        next: Next,
    },
    Hint {
        question: StepId,
    },
    Transition {
        next: Next,
    },
    Terminal,
}

fn multiple_choice_award() -> u32 {
    MULTIPLE_CHOICE_AWARD
}

impl StepKind {
    pub fn name(&self) -> &'static str {
        match self {
            StepKind::ChoiceIntro { .. } => "choice-intro",
            StepKind::Narrative { .. } => "narrative",
            StepKind::MultipleChoice { .. } => "multiple-choice",
            StepKind::SuccessInterstitial { .. } => "success-interstitial",
            StepKind::FreeText { .. } => "free-text",
            StepKind::Hint { .. } => "hint",
            StepKind::Transition { .. } => "transition",
            StepKind::Terminal => "terminal",
        }
    }

    /// Where the step goes once confirmed or answered.
    fn next(&self) -> Option<&Next> {
        match self {
            StepKind::Narrative { next, .. }
            | StepKind::SuccessInterstitial { next }
            | StepKind::FreeText { next, .. }
            | StepKind::Transition { next } => Some(next),
            _ => None,
        }
    }

    /// Every step id this step can lead to.
    fn successors(&self) -> Vec<&StepId> {
        fn of_next(next: &Next) -> Vec<&StepId> {
            match next {
                Next::Step(id) => vec![id],
                Next::ByBranch(map) => map.values().collect(),
                Next::BranchDone {
                    transition,
                    complete,
                } => vec![transition, complete],
            }
        }

        match self {
            StepKind::ChoiceIntro { options } => options.iter().map(|o| &o.next).collect(),
            StepKind::Narrative { next, hint_step } => {
                let mut ids = of_next(next);
                ids.extend(hint_step);
                ids
            }
            StepKind::MultipleChoice { next, .. } => vec![next],
            StepKind::SuccessInterstitial { next } | StepKind::Transition { next } => of_next(next),
            StepKind::FreeText { question, next } => {
                let mut ids = of_next(next);
                ids.extend(&question.hint_step);
                ids
            }
            StepKind::Hint { question } => vec![question],
            StepKind::Terminal => vec![],
        }
    }
}

/// One screen of a clue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepSpec {
    pub id: StepId,
    pub title: String,
    /// Body text shown on the screen.
    #[serde(default)]
    pub text: String,
    #[serde(flatten)]
    pub kind: StepKind,
}

impl StepSpec {
    pub fn new(id: &str, title: &str, text: &str, kind: StepKind) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            text: text.into(),
            kind,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, StepKind::Terminal)
    }
}

// ---------------------------------------------------------------------------
// Clue definition
// ---------------------------------------------------------------------------

/// Static step graph of one clue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClueDefinition {
    pub id: ClueId,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    pub start: StepId,
    /// Branches that must all be completed, in the order they are offered.
    #[serde(default)]
    pub branches: Vec<BranchId>,
    pub steps: Vec<StepSpec>,
    /// Step ordinals for the progress bar, first to last.
    pub progress: Vec<StepId>,
    /// Awarded on completion when no hint was used.
    #[serde(default)]
    pub completion_bonus: u32,
    /// Clues that must be completed before this one can be selected.
    #[serde(default)]
    pub requires: Vec<ClueId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("clue `{0}` is already in the catalog")]
    DuplicateClue(ClueId),
    #[error("clue `{clue}` defines step `{step}` twice")]
    DuplicateStep { clue: ClueId, step: StepId },
    #[error("clue `{clue}` starts at undefined step `{step}`")]
    MissingStart { clue: ClueId, step: StepId },
    #[error("step `{from}` leads to undefined step `{to}`")]
    UnknownSuccessor { from: StepId, to: StepId },
    #[error("step `{step}` refers to undeclared branch `{branch}`")]
    UnknownBranch { step: StepId, branch: BranchId },
    #[error("step `{0}` routes by branch before any path is chosen")]
    BranchBeforeChoice(StepId),
    #[error("step `{0}` closes a branch but the clue declares no branches")]
    NoBranches(StepId),
    #[error("multiple-choice step `{0}` needs exactly one correct option")]
    CorrectOptionCount(StepId),
    #[error("multiple-choice step `{step}` repeats option id `{option}`")]
    DuplicateOption { step: StepId, option: String },
    #[error("free-text step `{0}` accepts no keywords")]
    NoKeywords(StepId),
    #[error("step `{from}` expects `{to}` to be a {expected} step")]
    WrongKind {
        from: StepId,
        to: StepId,
        expected: &'static str,
    },
    #[error("progress table of clue `{clue}` lists undefined step `{step}`")]
    UnknownProgressStep { clue: ClueId, step: StepId },
    #[error("progress table of clue `{0}` must end with its terminal step")]
    ProgressNotTerminal(ClueId),
}

impl ClueDefinition {
    pub fn step(&self, id: &StepId) -> Option<&StepSpec> {
        self.steps.iter().find(|s| &s.id == id)
    }

    /// Parse and validate a definition from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let definition: ClueDefinition =
            serde_json::from_str(json).context("failed to parse clue definition")?;
        definition
            .validate()
            .with_context(|| format!("invalid clue definition `{}`", definition.id))?;
        Ok(definition)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("in {}", path.display()))
    }

    /// Check that the graph only references declared steps and branches.
    pub fn validate(&self) -> std::result::Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(&step.id) {
                return Err(DefinitionError::DuplicateStep {
                    clue: self.id.clone(),
                    step: step.id.clone(),
                });
            }
        }

        if self.step(&self.start).is_none() {
            return Err(DefinitionError::MissingStart {
                clue: self.id.clone(),
                step: self.start.clone(),
            });
        }

        for step in &self.steps {
            for to in step.kind.successors() {
                if self.step(to).is_none() {
                    return Err(DefinitionError::UnknownSuccessor {
                        from: step.id.clone(),
                        to: to.clone(),
                    });
                }
            }
            self.validate_kind(step)?;
        }
        self.check_branch_routing()?;

        for id in &self.progress {
            if self.step(id).is_none() {
                return Err(DefinitionError::UnknownProgressStep {
                    clue: self.id.clone(),
                    step: id.clone(),
                });
            }
        }
        match self.progress.last().and_then(|id| self.step(id)) {
            Some(last) if last.is_terminal() => Ok(()),
            _ => Err(DefinitionError::ProgressNotTerminal(self.id.clone())),
        }
    }

    fn validate_kind(&self, step: &StepSpec) -> std::result::Result<(), DefinitionError> {
        match &step.kind {
            StepKind::ChoiceIntro { options } => {
                for option in options {
                    self.check_branch(&step.id, &option.branch)?;
                }
            }
            StepKind::Narrative { next, hint_step } => {
                self.check_next(&step.id, next)?;
                if let Some(hint) = hint_step {
                    self.expect_kind(&step.id, hint, "hint")?;
                }
            }
            StepKind::MultipleChoice { options, .. } => {
                if options.iter().filter(|o| o.correct).count() != 1 {
                    return Err(DefinitionError::CorrectOptionCount(step.id.clone()));
                }
                let mut ids = HashSet::new();
                for option in options {
                    if !ids.insert(option.id.as_str()) {
                        return Err(DefinitionError::DuplicateOption {
                            step: step.id.clone(),
                            option: option.id.clone(),
                        });
                    }
                }
            }
            StepKind::SuccessInterstitial { next } | StepKind::Transition { next } => {
                self.check_next(&step.id, next)?;
            }
            StepKind::FreeText { question, next } => {
                if !question
                    .accepted
                    .iter()
                    .any(|k| !answer::normalize(k).is_empty())
                {
                    return Err(DefinitionError::NoKeywords(step.id.clone()));
                }
                if let Some(hint) = &question.hint_step {
                    self.expect_kind(&step.id, hint, "hint")?;
                }
                self.check_next(&step.id, next)?;
            }
            StepKind::Hint { question } => {
                self.expect_kind(&step.id, question, "free-text")?;
            }
            StepKind::Terminal => {}
        }
        Ok(())
    }

    fn check_next(&self, from: &StepId, next: &Next) -> std::result::Result<(), DefinitionError> {
        match next {
            Next::Step(_) => Ok(()),
            Next::ByBranch(map) => map
                .keys()
                .try_for_each(|branch| self.check_branch(from, branch)),
            Next::BranchDone { .. } if self.branches.is_empty() => {
                Err(DefinitionError::NoBranches(from.clone()))
            }
            Next::BranchDone { complete, .. } => self.expect_kind(from, complete, "terminal"),
        }
    }

    /// Branch-routed successors are only reachable once a path is set.
    fn check_branch_routing(&self) -> std::result::Result<(), DefinitionError> {
        let mut seen = HashSet::new();
        let mut queue = vec![&self.start];
        while let Some(id) = queue.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(step) = self.step(id) else {
                continue;
            };
            match &step.kind {
                // Both set the branch before moving on.
                StepKind::ChoiceIntro { .. } | StepKind::Transition { .. } => {}
                kind => {
                    if let Some(Next::ByBranch(_)) = kind.next() {
                        return Err(DefinitionError::BranchBeforeChoice(step.id.clone()));
                    }
                    queue.extend(kind.successors());
                }
            }
        }
        Ok(())
    }

    fn check_branch(
        &self,
        step: &StepId,
        branch: &BranchId,
    ) -> std::result::Result<(), DefinitionError> {
        if self.branches.contains(branch) {
            Ok(())
        } else {
            Err(DefinitionError::UnknownBranch {
                step: step.clone(),
                branch: branch.clone(),
            })
        }
    }

    fn expect_kind(
        &self,
        from: &StepId,
        to: &StepId,
        expected: &'static str,
    ) -> std::result::Result<(), DefinitionError> {
        match self.step(to) {
            Some(spec) if spec.kind.name() == expected => Ok(()),
            Some(_) => Err(DefinitionError::WrongKind {
                from: from.clone(),
                to: to.clone(),
                expected,
            }),
            None => Err(DefinitionError::UnknownSuccessor {
                from: from.clone(),
                to: to.clone(),
            }),
        }
    }
}
