use std::collections::BTreeMap;

use super::definition::{
    BranchOption, ChoiceOption, ClueDefinition, ClueId, DefinitionError, FreeTextQuestion, Next,
    StepKind, StepSpec,
};
use super::scoring::{ScoringRule, MULTIPLE_CHOICE_AWARD};

/// Clues on offer in the selection menu, in display order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    clues: Vec<ClueDefinition>,
}

impl Catalog {
    pub fn builtin() -> Self {
        Self {
            clues: vec![mystery_guest(), parents()],
        }
    }

    pub fn add(&mut self, definition: ClueDefinition) -> Result<(), DefinitionError> {
        definition.validate()?;
        if self.get(&definition.id).is_some() {
            return Err(DefinitionError::DuplicateClue(definition.id));
        }
        self.clues.push(definition);
        Ok(())
    }

    pub fn get(&self, id: &ClueId) -> Option<&ClueDefinition> {
        self.clues.iter().find(|c| &c.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClueDefinition> {
        self.clues.iter()
    }

    pub fn len(&self) -> usize {
        self.clues.len()
    }
}

// ---------------------------------------------------------------------------
// Step helpers
// ---------------------------------------------------------------------------

fn to(id: &str) -> Next {
    Next::Step(id.into())
}

fn by_branch(pairs: &[(&str, &str)]) -> Next {
    Next::ByBranch(
        pairs
            .iter()
            .map(|&(branch, step)| (branch.into(), step.into()))
            .collect::<BTreeMap<_, _>>(),
    )
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn quote_choice(id: &str, title: &str, prompt: &str, correct: &str, next: &str) -> StepSpec {
    StepSpec::new(
        id,
        title,
        "Listen carefully and choose the correct quote.",
        StepKind::MultipleChoice {
            prompt: prompt.into(),
            options: vec![
                ChoiceOption::new("a", "War hooy", false),
                ChoiceOption::new("b", "Maxaad Rabtaa?", false),
                ChoiceOption::new("c", correct, true),
            ],
            award: MULTIPLE_CHOICE_AWARD,
            next: next.into(),
        },
    )
}

fn quote_correct(id: &str, parent: &str, next: &str) -> StepSpec {
    StepSpec::new(
        id,
        "Perfect!",
        &format!("You got the correct quote from the {parent}! +1 point earned."),
        StepKind::SuccessInterstitial { next: to(next) },
    )
}

// ---------------------------------------------------------------------------
// Parents' Wisdom
// ---------------------------------------------------------------------------

const PROVERB_SCORING: ScoringRule = ScoringRule::new(10, 1, 1).revealing_after(3);

/// Two families, two proverbs. Both paths must be completed, in either order.
pub fn parents() -> ClueDefinition {
    let proverb_done = || Next::BranchDone {
        transition: "transition".into(),
        complete: "complete".into(),
    };

    let steps = vec![
        StepSpec::new(
            "parent-choice",
            "Choose Your Path",
            "Which set of parents would you like to speak with first?",
            StepKind::ChoiceIntro {
                options: vec![
                    BranchOption {
                        branch: "groom".into(),
                        label: "Groom's Parents - start with the groom's family wisdom".into(),
                        next: "parent-intro".into(),
                    },
                    BranchOption {
                        branch: "bride".into(),
                        label: "Bride's Parents - start with the bride's family wisdom".into(),
                        next: "parent-intro".into(),
                    },
                ],
            },
        ),
        StepSpec::new(
            "parent-intro",
            "Meet the Parents",
            "Each parent holds half of an ancient proverb. Listen carefully to what they say, \
             then piece together their wisdom.",
            StepKind::Narrative {
                next: by_branch(&[("groom", "groom-father"), ("bride", "bride-father")]),
                hint_step: None,
            },
        ),
        quote_choice(
            "groom-father",
            "Groom's Father",
            "What did the groom's father say?",
            "Nin iyo naagtii colna ma aha",
            "groom-father-correct",
        ),
        quote_correct("groom-father-correct", "groom's father", "groom-mother"),
        quote_choice(
            "groom-mother",
            "Groom's Mother",
            "What did the groom's mother say?",
            "Nabadna ma aha",
            "groom-mother-correct",
        ),
        quote_correct("groom-mother-correct", "groom's mother", "groom-proverb-text"),
        StepSpec::new(
            "groom-proverb-text",
            "Groom's Proverb Revealed!",
            "\"Nin iyo naagtii colna ma aha nabadna ma aha\"\n\
             A husband and his wife live together neither at war nor at peace.",
            StepKind::FreeText {
                question: FreeTextQuestion {
                    prompt: "In one word, what does that teach you about healthy relationships?"
                        .into(),
                    accepted: strings(&["balance", "harmony", "patience"]),
                    hints: strings(&[
                        "Think about what keeps relationships stable...",
                        "It's about finding the middle ground between extremes...",
                        "The answer rhymes with 'valance'...",
                    ]),
                    scoring: PROVERB_SCORING,
                    reveal: Some("Balance".into()),
                    hint_step: None,
                },
                next: proverb_done(),
            },
        ),
        quote_choice(
            "bride-father",
            "Bride's Father",
            "What did the bride's father say?",
            "Kor Wayeel",
            "bride-father-correct",
        ),
        quote_correct("bride-father-correct", "bride's father", "bride-mother"),
        quote_choice(
            "bride-mother",
            "Bride's Mother",
            "What did the bride's mother say?",
            "Waa wada-indho",
            "bride-mother-correct",
        ),
        quote_correct("bride-mother-correct", "bride's mother", "bride-proverb-text"),
        StepSpec::new(
            "bride-proverb-text",
            "Bride's Proverb Revealed!",
            "\"Kor waayeel waa wada-indho\"\nAn elder has eyes everywhere.",
            StepKind::FreeText {
                question: FreeTextQuestion {
                    prompt: "What one word describes the gift that elders share even when \
                             they're not there?"
                        .into(),
                    accepted: strings(&["wisdom"]),
                    hints: strings(&[
                        "What do elders share with younger generations?",
                        "It's something gained through experience...",
                        "It starts with 'W' and ends with 'dom'...",
                    ]),
                    scoring: PROVERB_SCORING,
                    reveal: Some("Wisdom".into()),
                    hint_step: None,
                },
                next: proverb_done(),
            },
        ),
        StepSpec::new(
            "transition",
            "Halfway There!",
            "Now it's time to hear from the other parents and discover their proverb too!",
            StepKind::Transition {
                next: by_branch(&[("groom", "groom-father"), ("bride", "bride-father")]),
            },
        ),
        StepSpec::new(
            "complete",
            "Parents Clue Complete!",
            "You've discovered both ancient proverbs!",
            StepKind::Terminal,
        ),
    ];

    let progress = steps.iter().map(|s| s.id.clone()).collect();

    ClueDefinition {
        id: "parents".into(),
        title: "Parents' Wisdom".into(),
        summary: "Collect an ancient proverb from each family.".into(),
        start: "parent-choice".into(),
        branches: vec!["groom".into(), "bride".into()],
        steps,
        progress,
        completion_bonus: 0,
        requires: Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Mystery Guest
// ---------------------------------------------------------------------------

pub const GUEST_LIST: [&str; 10] = [
    "Ahmed Hassan",
    "Fatima Al-Zahra",
    "Omar Sheikh",
    "Sarah Johnson",
    "Bilicsan",
    "Maya Patel",
    "David Chen",
    "Layla Ibrahim",
    "Marcus Williams",
    "Zara Mohamed",
];

/// Find the guest listed without a family name, then work out their role.
pub fn mystery_guest() -> ClueDefinition {
    let steps = vec![
        StepSpec::new(
            "introduction",
            "The Mystery Guest",
            "Among today's guests is someone special. Can you discover who they are and \
             uncover their secret role?",
            StepKind::Narrative {
                next: to("investigation"),
                hint_step: None,
            },
        ),
        StepSpec::new(
            "investigation",
            "Investigation Tools",
            "Look for someone who stands out from the crowd. Check the guest list, or ask \
             for a hint.",
            StepKind::Narrative {
                next: to("guest-list"),
                hint_step: Some("part1-hint".into()),
            },
        ),
        StepSpec::new(
            "guest-list",
            "Wedding Guest List",
            &GUEST_LIST.join("\n"),
            StepKind::FreeText {
                question: FreeTextQuestion {
                    prompt: "Who is the mysterious guest?".into(),
                    accepted: strings(&["bilicsan"]),
                    hints: strings(&[
                        "Look through today's guest list carefully... someone stands out by \
                         having less information than others.",
                        "Check how names are listed - most people have both first and last \
                         names shown.",
                        "Find the person listed with only one name - no family name in sight.",
                    ]),
                    scoring: ScoringRule::new(5, 1, 1),
                    reveal: None,
                    hint_step: Some("part1-hint".into()),
                },
                next: to("part1-success"),
            },
        ),
        StepSpec::new(
            "part1-hint",
            "Detective Hint",
            "-1 point for using this hint.",
            StepKind::Hint {
                question: "guest-list".into(),
            },
        ),
        StepSpec::new(
            "part1-success",
            "Excellent Detective Work!",
            "You found Bilicsan - the mysterious guest! But they have a unique role in \
             today's celebration...",
            StepKind::SuccessInterstitial {
                next: to("role-investigation"),
            },
        ),
        StepSpec::new(
            "role-investigation",
            "The Secret Role",
            "When you speak with Bilicsan, ask about their special job today. Think about \
             someone who helps guide others or shows the way.",
            StepKind::FreeText {
                question: FreeTextQuestion {
                    prompt: "What is Bilicsan's special role?".into(),
                    accepted: strings(&["navigator", "pathfinder", "guide"]),
                    hints: strings(&[
                        "When you ask Bilicsan about their role, listen for how they describe \
                         helping people today.",
                        "Think about someone who helps others find their way or shows the path \
                         forward.",
                        "The answer rhymes with 'aviator' or starts with 'path'...",
                    ]),
                    scoring: ScoringRule::new(10, 2, 2),
                    reveal: None,
                    hint_step: Some("part2-hint".into()),
                },
                next: to("part2-success"),
            },
        ),
        StepSpec::new(
            "part2-hint",
            "Role Hint",
            "-2 points for using this hint.",
            StepKind::Hint {
                question: "role-investigation".into(),
            },
        ),
        StepSpec::new(
            "part2-success",
            "Mystery Solved!",
            "Bilicsan is our celebration navigator - helping guide everyone through this \
             special day.",
            StepKind::SuccessInterstitial {
                next: to("complete"),
            },
        ),
        StepSpec::new(
            "complete",
            "Mystery Guest Complete!",
            "Detective work done.",
            StepKind::Terminal,
        ),
    ];

    let progress = steps.iter().map(|s| s.id.clone()).collect();

    ClueDefinition {
        id: "mystery-guest".into(),
        title: "The Mystery Guest".into(),
        summary: "Find the hidden guest and uncover their secret role.".into(),
        start: "introduction".into(),
        branches: Vec::new(),
        steps,
        progress,
        completion_bonus: 5,
        requires: Vec::new(),
    }
}
