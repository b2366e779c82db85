//! Demo-mode narration layered over the game screens.
//!
//! Screens tag parts of themselves with a target name; tutorial steps point
//! at those names and get spotlighted when the target is on screen, or shown
//! centered when it is not.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::clue::definition::StepId;

// ---------------------------------------------------------------------------
// Named targets
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub name: String,
    /// What the player sees there, e.g. "the guest list".
    pub label: String,
}

/// Targets present on the current screen.
#[derive(Debug, Default)]
pub struct TargetRegistry {
    targets: HashMap<String, Target>,
}

impl TargetRegistry {
    pub fn register_target(&mut self, name: &str, label: &str) -> &Target {
        let target = Target {
            name: name.to_string(),
            label: label.to_string(),
        };
        self.targets.insert(name.to_string(), target);
        &self.targets[name]
    }

    pub fn find_target(&self, name: &str) -> Option<&Target> {
        self.targets.get(name)
    }

    /// Forget everything; called whenever a new screen is drawn.
    pub fn clear(&mut self) {
        self.targets.clear();
    }
}

// ---------------------------------------------------------------------------
// Tutorial steps
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    Top,
    Bottom,
    Right,
    #[default]
    Center,
}

/// One "in real life / in this demo" card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TutorialStep {
    pub id: String,
    pub target: String,
    pub irl_title: String,
    pub irl_description: String,
    pub action_title: String,
    pub action_description: String,
    pub placement: Placement,
    pub spotlight: bool,
}

/// Where a card ends up once its target has been looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Anchor<'a> {
    pub placement: Placement,
    pub spotlight: Option<&'a Target>,
}

/// Anchor `step` on its target; a missing target falls back to the center.
pub fn anchor<'a>(step: &TutorialStep, registry: &'a TargetRegistry) -> Anchor<'a> {
    match registry.find_target(&step.target) {
        Some(target) => Anchor {
            placement: step.placement,
            spotlight: step.spotlight.then_some(target),
        },
        None => {
            debug!("Tutorial target {} not on screen", step.target);
            Anchor {
                placement: Placement::Center,
                spotlight: None,
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Cinematic walkthrough
// ---------------------------------------------------------------------------

/// A linear sequence of cards the player pages through.
#[derive(Debug)]
pub struct Walkthrough {
    steps: Vec<TutorialStep>,
    current: usize,
    active: bool,
}

impl Walkthrough {
    pub fn new(steps: Vec<TutorialStep>) -> Self {
        Self {
            steps,
            current: 0,
            active: false,
        }
    }

    pub fn start(&mut self) {
        self.active = !self.steps.is_empty();
        self.current = 0;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn current(&self) -> Option<&TutorialStep> {
        self.active.then(|| self.steps.get(self.current)).flatten()
    }

    /// 1-based position and total.
    pub fn position(&self) -> (usize, usize) {
        (self.current + 1, self.steps.len())
    }

    pub fn progress(&self) -> f64 {
        if self.steps.is_empty() {
            return 0.0;
        }
        (self.current + 1) as f64 / self.steps.len() as f64 * 100.0
    }

    /// Move on; stepping past the last card closes the walkthrough.
    pub fn next(&mut self) {
        if self.current + 1 < self.steps.len() {
            self.current += 1;
        } else {
            self.active = false;
        }
    }

    pub fn previous(&mut self) {
        self.current = self.current.saturating_sub(1);
    }

    pub fn toggle(&mut self) {
        self.active = !self.active && !self.steps.is_empty();
    }

    pub fn skip(&mut self) {
        self.active = false;
    }

    pub fn close(&mut self) {
        self.active = false;
    }
}

// ---------------------------------------------------------------------------
// Contextual guide
// ---------------------------------------------------------------------------

/// Cards keyed by clue step, each shown at most once.
#[derive(Debug)]
pub struct ContextualGuide {
    overlays: HashMap<StepId, TutorialStep>,
    shown: HashSet<StepId>,
    enabled: bool,
}

impl ContextualGuide {
    pub fn new(overlays: impl IntoIterator<Item = (StepId, TutorialStep)>) -> Self {
        Self {
            overlays: overlays.into_iter().collect(),
            shown: HashSet::new(),
            enabled: true,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn toggle(&mut self) {
        self.enabled = !self.enabled;
    }

    /// Card for `step` the first time it is reached while enabled.
    pub fn on_step(&mut self, step: &StepId) -> Option<&TutorialStep> {
        if !self.enabled || self.shown.contains(step) {
            return None;
        }
        let overlay = self.overlays.get(step)?;
        self.shown.insert(step.clone());
        Some(overlay)
    }
}

// ---------------------------------------------------------------------------
// Content
// ---------------------------------------------------------------------------

fn card(
    id: &str,
    target: &str,
    irl: (&str, &str),
    action: (&str, &str),
    placement: Placement,
    spotlight: bool,
) -> TutorialStep {
    TutorialStep {
        id: id.into(),
        target: target.into(),
        irl_title: irl.0.into(),
        irl_description: irl.1.into(),
        action_title: action.0.into(),
        action_description: action.1.into(),
        placement,
        spotlight,
    }
}

/// Scene-setting shown the first time the clue menu opens.
pub fn welcome() -> Walkthrough {
    Walkthrough::new(vec![
        card(
            "global-intro",
            "body",
            (
                "Welcome to the Event",
                "Guests have just arrived at a wedding. They're scanning a QR code at the \
                 welcome sign to join the interactive quest.",
            ),
            (
                "Demo Introduction",
                "This demo shows how events become live adventures. No real names are used \
                 here - everything is simulated.",
            ),
            Placement::Center,
            false,
        ),
        card(
            "clue-menu",
            "clue-menu",
            (
                "Teams Form",
                "Strangers turn into teammates as they pick their first challenge together.",
            ),
            (
                "Choose Your Adventure",
                "Pick a clue from the menu. Completed clues are marked and can't be replayed.",
            ),
            Placement::Bottom,
            true,
        ),
    ])
}

/// Narration for the Mystery Guest clue.
pub fn mystery_guest_guide() -> ContextualGuide {
    let overlays = [
        (
            "introduction",
            card(
                "person-x-intro",
                "clue-header",
                (
                    "Mystery Guest Announced",
                    "The emcee announces there's a mystery guest hidden among everyone here. \
                     Guests start looking around curiously.",
                ),
                (
                    "Your Mission",
                    "Figure out who Person X is. In real life, guests would need to explore \
                     and deduce.",
                ),
                Placement::Bottom,
                true,
            ),
        ),
        (
            "investigation",
            card(
                "investigation-tools",
                "investigation-tools",
                (
                    "Groups Start Strategizing",
                    "Groups of guests start talking, checking the seating chart, or asking \
                     people around. Some approach staff for hints.",
                ),
                (
                    "Choose Your Approach",
                    "Either get a hint, or open the guest list.",
                ),
                Placement::Center,
                true,
            ),
        ),
        (
            "guest-list",
            card(
                "guest-list-reveal",
                "guest-list-card",
                (
                    "Checking the Guest List",
                    "Guests crowd around the printed guest list, scanning names and looking \
                     for patterns.",
                ),
                (
                    "Scan for Clues",
                    "One name breaks the pattern - Person X is listed without a last name.",
                ),
                Placement::Right,
                true,
            ),
        ),
        (
            "part1-hint",
            card(
                "answer-submission",
                "answer-input",
                (
                    "Team Decision Time",
                    "One person whispers the name to their team, and after a quick \
                     discussion, they lock in their answer.",
                ),
                (
                    "Submit Your Answer",
                    "Type the name and submit. Notice how it stands out from the full names.",
                ),
                Placement::Top,
                true,
            ),
        ),
        (
            "complete",
            card(
                "success-celebration",
                "success-card",
                (
                    "Victory Celebration",
                    "Cheering, high-fives, and laughter fill the air before the next \
                     challenge.",
                ),
                (
                    "Quest Complete!",
                    "You've completed the clue. Continue to keep your adventure going.",
                ),
                Placement::Center,
                true,
            ),
        ),
    ];

    ContextualGuide::new(
        overlays
            .into_iter()
            .map(|(step, overlay)| (StepId::from(step), overlay)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_register_and_find() {
        let mut registry = TargetRegistry::default();
        assert!(registry.find_target("answer-input").is_none());
        let target = registry.register_target("answer-input", "the answer box");
        assert_eq!(target.label, "the answer box");
        assert_eq!(
            registry.find_target("answer-input").map(|t| t.name.as_str()),
            Some("answer-input")
        );
        registry.clear();
        assert!(registry.find_target("answer-input").is_none());
    }

    #[test]
    fn test_anchor_falls_back_to_center() {
        let mut walkthrough = welcome();
        walkthrough.start();
        walkthrough.next();
        let step = walkthrough.current().unwrap().clone();
        assert_eq!(step.placement, Placement::Bottom);

        let mut registry = TargetRegistry::default();
        let anchor_missing = anchor(&step, &registry);
        assert_eq!(anchor_missing.placement, Placement::Center);
        assert_eq!(anchor_missing.spotlight, None);

        registry.register_target("clue-menu", "the clue menu");
        let found = anchor(&step, &registry);
        assert_eq!(found.placement, Placement::Bottom);
        assert_eq!(found.spotlight.map(|t| t.label.as_str()), Some("the clue menu"));
    }

    #[test]
    fn test_anchor_without_spotlight() {
        let mut walkthrough = welcome();
        walkthrough.start();
        let step = walkthrough.current().unwrap().clone();
        let mut registry = TargetRegistry::default();
        registry.register_target("body", "the screen");
        assert_eq!(anchor(&step, &registry).spotlight, None);
    }

    #[test]
    fn test_walkthrough_navigation() {
        let mut w = welcome();
        assert!(w.current().is_none());
        w.start();
        assert_eq!(w.position(), (1, 2));
        assert_eq!(w.progress(), 50.0);
        w.previous();
        assert_eq!(w.position(), (1, 2));
        w.next();
        assert_eq!(w.current().unwrap().id, "clue-menu");
        assert_eq!(w.progress(), 100.0);
        w.next();
        assert!(!w.is_active());

        w.toggle();
        assert!(w.is_active());
        w.skip();
        assert!(!w.is_active());

        let mut empty = Walkthrough::new(Vec::new());
        empty.start();
        assert!(!empty.is_active());
        empty.toggle();
        assert!(!empty.is_active());
    }

    #[test]
    fn test_guide_shows_each_card_once() {
        let mut guide = mystery_guest_guide();
        let intro: StepId = "introduction".into();
        assert_eq!(guide.on_step(&intro).unwrap().id, "person-x-intro");
        assert!(guide.on_step(&intro).is_none());
        assert!(guide.on_step(&"part1-success".into()).is_none());

        guide.toggle();
        assert!(guide.on_step(&"guest-list".into()).is_none());
        guide.toggle();
        assert_eq!(
            guide.on_step(&"guest-list".into()).unwrap().target,
            "guest-list-card"
        );
    }
}
