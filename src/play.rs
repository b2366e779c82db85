use std::fmt::Display;
use std::io::{BufRead, Write};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use log::{debug, info};

use crate::clue::answer;
use crate::clue::catalog::Catalog;
use crate::clue::definition::{ClueId, StepId, StepKind, StepSpec};
use crate::clue::{progress, ClueEngine, ClueError, ClueResult, FeedbackTicket, Verdict};
use crate::config::{QuestConfig, Route};
use crate::quest::{ClueStatus, QuestSession};
use crate::tutorial::{
    self, anchor, ContextualGuide, Placement, TargetRegistry, TutorialStep, Walkthrough,
};

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// Line-oriented terminal; `None` from [`Console::ask`] means input closed.
pub struct Console<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Console<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn say(&mut self, text: impl Display) -> Result<()> {
        writeln!(self.output, "{text}").context("failed to write to terminal")
    }

    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}")?;
        self.output.flush()?;
        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read from terminal")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    fn banner(&mut self, title: &str) -> Result<()> {
        self.say("\n========================================")?;
        self.say(format!("   {title}"))?;
        self.say("========================================")
    }

    #[cfg(test)]
    fn into_output(self) -> W {
        self.output
    }
}

// ---------------------------------------------------------------------------
// Game
// ---------------------------------------------------------------------------

enum Exit {
    Home,
    Quit,
}

enum MenuChoice {
    Clue(usize),
    Home,
    Quit,
}

enum ClueExit {
    Finished,
    Back,
    Quit,
}

/// Everything the screens share for one run of the program.
pub struct Game<R, W> {
    console: Console<R, W>,
    catalog: Catalog,
    feedback_delay: Duration,
    registry: TargetRegistry,
    welcome: Walkthrough,
    demo_mode: bool,
}

impl<R: BufRead, W: Write> Game<R, W> {
    pub fn new(console: Console<R, W>, catalog: Catalog, config: &QuestConfig) -> Self {
        Self {
            console,
            catalog,
            feedback_delay: config.feedback_delay,
            registry: TargetRegistry::default(),
            welcome: tutorial::welcome(),
            demo_mode: true,
        }
    }

    /// Route between the landing page and the quest until the player quits.
    pub fn run(&mut self, mut route: Route) -> Result<()> {
        loop {
            info!("Route: {}", route.path());
            route = match route {
                Route::Landing => {
                    if !self.landing()? {
                        break;
                    }
                    Route::Play
                }
                Route::Play => match self.play_quest()? {
                    Exit::Home => Route::Landing,
                    Exit::Quit => break,
                },
            };
        }
        self.console.say("Thanks for playing!")
    }

    /// Marketing screen; true when the player wants to play.
    fn landing(&mut self) -> Result<bool> {
        self.console.banner("QUEST")?;
        self.console.say("Turn your wedding or event into a live adventure.")?;
        self.console.say(
            "Guests scan a code, team up, and solve clues hidden in the celebration itself.",
        )?;
        loop {
            self.console.say("\n  [p] Play the demo    [q] Quit")?;
            let Some(input) = self.console.ask("> ")? else {
                return Ok(false);
            };
            match input.to_lowercase().as_str() {
                "p" | "play" => return Ok(true),
                "q" | "quit" => return Ok(false),
                _ => {}
            }
        }
    }

    fn onboarding(&mut self) -> Result<Option<QuestSession>> {
        self.console.banner("Welcome to the Quest!")?;
        self.console.say("Enter your details to join the wedding adventure.")?;
        loop {
            let Some(nickname) = self.console.ask("Nickname: ")? else {
                return Ok(None);
            };
            if answer::is_blank(&nickname) {
                self.console.say("(A nickname is required.)")?;
                continue;
            }
            let Some(code) = self.console.ask("Event code (optional): ")? else {
                return Ok(None);
            };
            let quest = QuestSession::start(&nickname, Some(&code))?
                .with_feedback_delay(self.feedback_delay);
            return Ok(Some(quest));
        }
    }

    fn play_quest(&mut self) -> Result<Exit> {
        let Some(mut quest) = self.onboarding()? else {
            return Ok(Exit::Quit);
        };

        loop {
            let index = match self.clue_menu(&mut quest)? {
                MenuChoice::Clue(index) => index,
                MenuChoice::Home => {
                    info!("{} went back to the landing page", quest.nickname());
                    return Ok(Exit::Home);
                }
                MenuChoice::Quit => return Ok(Exit::Quit),
            };
            let Some(clue) = self.catalog.iter().nth(index).cloned() else {
                continue;
            };

            if let Err(e) = quest.select_clue(&clue) {
                self.console.say(format!("({e})"))?;
                continue;
            }

            let mut guide = guide_for(&clue.id);
            if !self.demo_mode {
                guide.toggle();
            }

            match self.play_clue(&mut quest, &mut guide)? {
                ClueExit::Finished => {
                    let result = quest.finish_clue()?;
                    if let Some(exit) = self.clue_complete(&quest, &result)? {
                        return Ok(exit);
                    }
                }
                ClueExit::Back => quest.back_to_selection(),
                ClueExit::Quit => return Ok(Exit::Quit),
            }
        }
    }

    fn clue_menu(&mut self, quest: &mut QuestSession) -> Result<MenuChoice> {
        self.registry.clear();
        self.console.banner("Choose Your Adventure")?;
        let event = quest
            .event_code()
            .map(|code| format!(" | event {code}"))
            .unwrap_or_default();
        self.console.say(format!(
            "Welcome {}! Score: {} points | {}/{} clues completed{event}",
            quest.nickname(),
            quest.total_score(),
            quest.completed_count(),
            self.catalog.len()
        ))?;
        for (i, clue) in self.catalog.iter().enumerate() {
            let status = match quest.status(clue) {
                ClueStatus::Available => String::new(),
                ClueStatus::Completed(score) => format!(" (completed, {score} points)"),
                ClueStatus::Locked(missing) => format!(" (locked until {missing} is solved)"),
            };
            self.console.say(format!("  [{}] {} - {}{status}", i + 1, clue.title, clue.summary))?;
        }
        self.registry.register_target("clue-menu", "the clue menu");

        if !quest.has_seen_welcome() {
            self.welcome.start();
            if !self.walkthrough()? {
                return Ok(MenuChoice::Quit);
            }
            quest.mark_welcome_seen();
        }

        loop {
            self.console.say(
                "\n  [number] Select a clue    [tour] Reopen the tour    [h] Back to landing    \
                 [q] Quit",
            )?;
            let Some(input) = self.console.ask("> ")? else {
                return Ok(MenuChoice::Quit);
            };
            match input.to_lowercase().as_str() {
                "tour" => {
                    self.welcome.toggle();
                    if !self.walkthrough()? {
                        return Ok(MenuChoice::Quit);
                    }
                }
                "h" | "home" => return Ok(MenuChoice::Home),
                "q" | "quit" => return Ok(MenuChoice::Quit),
                n => match n.parse::<usize>() {
                    Ok(n) if (1..=self.catalog.len()).contains(&n) => {
                        return Ok(MenuChoice::Clue(n - 1))
                    }
                    _ => self.console.say("(Pick one of the listed clues.)")?,
                },
            }
        }
    }

    /// `None` to pick another clue.
    fn clue_complete(
        &mut self,
        quest: &QuestSession,
        result: &ClueResult,
    ) -> Result<Option<Exit>> {
        self.console.banner("Quest Complete!")?;
        self.console.say(format!(
            "Congratulations {}! This clue earned {} points.",
            quest.nickname(),
            result.score
        ))?;
        if result.hints_used > 0 {
            self.console.say(format!("Hints used: {}", result.hints_used))?;
        }
        self.console.say(format!("Total: {} Points", quest.total_score()))?;
        loop {
            self.console.say("\n  [t] Try another clue    [h] Back to home")?;
            let Some(input) = self.console.ask("> ")? else {
                return Ok(Some(Exit::Quit));
            };
            match input.to_lowercase().as_str() {
                "t" => return Ok(None),
                "h" | "home" => return Ok(Some(Exit::Home)),
                _ => {}
            }
        }
    }

    /// Page through the welcome tour while it is open. Returns false if input
    /// closed.
    fn walkthrough(&mut self) -> Result<bool> {
        while self.welcome.is_active() {
            let Some(step) = self.welcome.current().cloned() else {
                break;
            };
            let (n, total) = self.welcome.position();
            let counter = format!(
                " {n}/{total}, {}%",
                progress::rounded(self.welcome.progress())
            );
            self.show_card(&step, &counter)?;
            self.console.say("  [Enter] next    [p] previous    [s] skip")?;
            let Some(input) = self.console.ask("> ")? else {
                self.welcome.close();
                return Ok(false);
            };
            match input.to_lowercase().as_str() {
                "p" => self.welcome.previous(),
                "s" => self.welcome.skip(),
                _ => self.welcome.next(),
            }
        }
        Ok(true)
    }

    fn show_card(&mut self, step: &TutorialStep, counter: &str) -> Result<()> {
        let anchored = anchor(step, &self.registry);
        let place = match (anchored.spotlight, anchored.placement) {
            (Some(target), placement) => {
                format!("spotlight on {} ({})", target.label, placement_name(placement))
            }
            (None, placement) => placement_name(placement).to_string(),
        };

        self.console.say(format!("\n  +-- Demo mode{counter} [{place}]"))?;
        self.console.say(format!("  | In real life: {}", step.irl_title))?;
        self.console.say(format!("  |   {}", step.irl_description))?;
        self.console.say(format!("  | In this demo: {}", step.action_title))?;
        self.console.say(format!("  |   {}", step.action_description))?;
        self.console.say("  +--")
    }

    // -----------------------------------------------------------------------
    // Clue screens
    // -----------------------------------------------------------------------

    fn play_clue(
        &mut self,
        quest: &mut QuestSession,
        guide: &mut ContextualGuide,
    ) -> Result<ClueExit> {
        loop {
            let Some(engine) = quest.active() else {
                return Ok(ClueExit::Back);
            };
            let spec = engine.current()?.clone();
            let complete = engine.is_complete();
            self.render_step(engine, &spec)?;
            if let Some(card) = guide.on_step(&spec.id).cloned() {
                self.show_card(&card, "")?;
            }

            let Some(input) = self.console.ask("> ")? else {
                return Ok(ClueExit::Quit);
            };
            match input.to_lowercase().as_str() {
                "back" if !spec.is_terminal() => {
                    self.console.say("<- Back to clue selection")?;
                    return Ok(ClueExit::Back);
                }
                "quit" => return Ok(ClueExit::Quit),
                "demo" => {
                    guide.toggle();
                    self.demo_mode = guide.is_enabled();
                    let state = if self.demo_mode { "on" } else { "off" };
                    self.console.say(format!("(Demo mode {state})"))?;
                    continue;
                }
                _ => {}
            }

            if complete {
                return Ok(ClueExit::Finished);
            }
            let Some(engine) = quest.active_mut() else {
                return Ok(ClueExit::Back);
            };
            if let Err(e) = self.handle_input(engine, &spec, &input) {
                match e.downcast_ref::<ClueError>() {
                    Some(clue_error) => {
                        debug!("Rejected input on {}: {clue_error}", spec.id);
                        self.console.say(format!("({clue_error})"))?;
                    }
                    None => return Err(e),
                }
            }
        }
    }

    fn render_step(&mut self, engine: &ClueEngine, spec: &StepSpec) -> Result<()> {
        self.registry.clear();
        let session = engine.session();
        self.console.banner(&spec.title)?;
        self.console.say(format!(
            "{} | progress {}% | score {}{}",
            engine.definition().title,
            progress::rounded(engine.progress_percentage()),
            engine.score(),
            if session.total_hints > 0 {
                format!(" | hints used {}", session.total_hints)
            } else {
                String::new()
            }
        ))?;
        self.registry.register_target("clue-header", "the clue header");

        if !spec.text.is_empty() {
            self.console.say(format!("\n{}", spec.text))?;
            self.registry.register_target(
                &format!("{}-card", spec.id),
                &format!("the {}", spec.title.to_lowercase()),
            );
        }

        match &spec.kind {
            StepKind::ChoiceIntro { options } => {
                for (i, option) in options.iter().enumerate() {
                    self.console.say(format!("  [{}] {}", i + 1, option.label))?;
                }
            }
            StepKind::Narrative { hint_step, .. } => {
                if hint_step.is_some() {
                    self.registry.register_target("investigation-tools", "the investigation tools");
                    self.console.say("\n  [Enter] continue    [?] get a hint")?;
                } else {
                    self.console.say("\n  [Enter] continue")?;
                }
            }
            StepKind::MultipleChoice { prompt, .. } => {
                self.console.say(format!("\n{prompt}"))?;
                for (letter, option) in ('A'..).zip(engine.options()) {
                    self.console.say(format!("  [{letter}] {}", option.text))?;
                }
                self.registry.register_target("answer-options", "the answer options");
            }
            StepKind::SuccessInterstitial { .. } | StepKind::Transition { .. } => {
                self.registry.register_target("success-card", "the success card");
                self.console.say("\n  [Enter] continue")?;
            }
            StepKind::FreeText { question, .. } => {
                self.console.say(format!("\n{}", question.prompt))?;
                self.render_answer_box(engine, question.hint_step.is_none())?;
            }
            StepKind::Hint { .. } => {
                self.render_answer_box(engine, true)?;
                self.console.say("  [<] back to the question")?;
            }
            StepKind::Terminal => {
                self.registry.register_target("success-card", "the success card");
                self.console.say(format!("\nFinal Score: {} points", engine.score()))?;
                if session.total_hints > 0 {
                    self.console.say(format!("({} hints used)", session.total_hints))?;
                }
                self.console.say("\n  [Enter] Continue to next clue")?;
            }
        }
        Ok(())
    }

    fn render_answer_box(&mut self, engine: &ClueEngine, inline_hints: bool) -> Result<()> {
        if let Some(hint) = engine.current_hint() {
            self.console.say(format!(
                "\n  Hint {}/{}: {}",
                hint.number, hint.of, hint.text
            ))?;
        }
        if inline_hints || engine.current_hint().is_none() {
            self.console.say("  [?] get a hint")?;
        }
        if let Some(reveal) = engine.revealed_answer() {
            self.console.say(format!("  Answer revealed: press Enter to submit \"{reveal}\""))?;
        }
        self.registry.register_target("answer-input", "the answer box");
        self.console.say("  Type your answer, or 'back' to leave the clue.")
    }

    fn handle_input(
        &mut self,
        engine: &mut ClueEngine,
        spec: &StepSpec,
        input: &str,
    ) -> Result<()> {
        match &spec.kind {
            StepKind::ChoiceIntro { options } => {
                let picked = input
                    .parse::<usize>()
                    .ok()
                    .and_then(|n| n.checked_sub(1))
                    .and_then(|i| options.get(i));
                match picked {
                    Some(option) => {
                        engine.choose(&option.branch)?;
                    }
                    None => self.console.say("(Pick one of the listed paths.)")?,
                }
            }
            StepKind::Narrative { .. } if input == "?" => self.show_hint(engine)?,
            StepKind::Narrative { .. }
            | StepKind::SuccessInterstitial { .. }
            | StepKind::Transition { .. } => {
                engine.advance()?;
            }
            StepKind::MultipleChoice { .. } => {
                let Some(option_id) = pick_option(engine, input) else {
                    self.console.say("(Pick one of the listed answers.)")?;
                    return Ok(());
                };
                let verdict = engine.answer_multiple_choice(&option_id)?;
                self.show_verdict(engine, verdict)?;
            }
            StepKind::Hint { .. } if input == "<" => {
                engine.back()?;
            }
            StepKind::FreeText { .. } | StepKind::Hint { .. } => {
                if input == "?" {
                    return self.show_hint(engine);
                }
                let submitted = match engine.revealed_answer() {
                    Some(reveal) if answer::is_blank(input) => reveal.to_string(),
                    _ => input.to_string(),
                };
                let verdict = engine.submit_free_text(&submitted)?;
                self.show_verdict(engine, verdict)?;
            }
            StepKind::Terminal => {}
        }
        Ok(())
    }

    fn show_hint(&mut self, engine: &mut ClueEngine) -> Result<()> {
        let hint = engine.request_hint()?;
        self.console.say(format!(
            "(Hint {}/{} unlocked; it costs points.)",
            hint.number, hint.of
        ))
    }

    fn show_verdict(&mut self, engine: &mut ClueEngine, verdict: Verdict) -> Result<()> {
        match verdict {
            Verdict::Correct { awarded, ticket } => {
                self.console.say(format!("\n  *** Correct! +{awarded} points ***"))?;
                wait_for_feedback(engine, ticket)?;
            }
            Verdict::Incorrect => self.console.say("  Not quite - try again.")?,
        }
        Ok(())
    }
}

/// Hold the feedback on screen until the transition behind `ticket` is due.
fn wait_for_feedback(engine: &mut ClueEngine, ticket: FeedbackTicket) -> Result<()> {
    while let Some((pending, due)) = engine.pending() {
        if pending != ticket {
            break;
        }
        thread::sleep(due.saturating_duration_since(Instant::now()));
        engine.poll(Instant::now())?;
    }
    Ok(())
}

/// Option id for a letter ("b") or the option text itself.
fn pick_option(engine: &ClueEngine, input: &str) -> Option<String> {
    let options = engine.options();
    let mut chars = input.chars();
    if let (Some(letter), None) = (chars.next(), chars.next()) {
        let index = (letter.to_ascii_uppercase() as usize).checked_sub('A' as usize)?;
        return options.get(index).map(|o| o.id.clone());
    }
    let wanted = answer::normalize(input);
    options
        .iter()
        .find(|o| answer::normalize(&o.text) == wanted)
        .map(|o| o.id.clone())
}

fn guide_for(clue: &ClueId) -> ContextualGuide {
    match clue.as_ref() {
        "mystery-guest" => tutorial::mystery_guest_guide(),
        _ => ContextualGuide::new(Vec::<(StepId, TutorialStep)>::new()),
    }
}

fn placement_name(placement: Placement) -> &'static str {
    match placement {
        Placement::Top => "top",
        Placement::Bottom => "bottom",
        Placement::Right => "right",
        Placement::Center => "centered",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::io::Cursor;

    fn play(route: Route, script: &[&str]) -> String {
        let input = Cursor::new(script.join("\n") + "\n");
        let console = Console::new(input, Vec::new());
        let config = QuestConfig {
            route,
            feedback_delay: Duration::ZERO,
            extra_clues: Vec::new(),
        };
        let mut game = Game::new(console, Catalog::builtin(), &config);
        game.run(route).unwrap();
        String::from_utf8(game.console.into_output()).unwrap()
    }

    #[test]
    fn test_landing_quit() {
        let out = play(Route::Landing, &["x", "q"]);
        assert!(out.contains("QUEST"));
        assert!(out.ends_with("Thanks for playing!\n"));
    }

    #[test]
    fn test_mystery_guest_full_run() {
        let out = play(
            Route::Landing,
            &[
                "p", "", "Amina", "W-42", // landing, blank nickname, onboarding
                "", "", // welcome walkthrough
                "1", // mystery guest
                "", "", // introduction, investigation
                "Omar", "bilicsan", "", // wrong, right, success screen
                "Navigator", "", // part 2 + success
                "", // final screen
                "t", "h", // menu again, then landing
                "q",
            ],
        );
        assert!(out.contains("(A nickname is required.)"));
        assert!(out.contains("Score: 0 points | 0/2 clues completed | event W-42"));
        assert!(out.contains("+-- Demo mode 1/2, 50% [centered]"));
        assert!(out.contains("In real life: Welcome to the Event"));
        assert!(out.contains("In real life: Checking the Guest List"));
        assert!(out.contains("spotlight on the wedding guest list"));
        assert!(out.contains("Not quite - try again."));
        assert!(out.contains("Correct! +5 points"));
        assert!(out.contains("Correct! +10 points"));
        assert!(out.contains("Final Score: 20 points"));
        assert!(out.contains("Total: 20 Points"));
        assert!(out.contains("(completed, 20 points)"));
        assert!(out.contains("Score: 20 points | 1/2 clues completed | event W-42"));
        assert!(out.ends_with("Thanks for playing!\n"));
    }

    #[test]
    fn test_parents_hint_reveal_and_back() {
        let out = play(
            Route::Play,
            &[
                "Amina", "", "s", // onboarding, skip walkthrough
                "2", "1", "", // parents, groom path, intro
                "Nin iyo naagtii colna ma aha", "", // father by quote text
                "Nabadna ma aha", "", // mother
                "?", "?", "?", "?", // three hints, fourth refused
                "", // submit the revealed answer
                "back", "q",
            ],
        );
        assert!(out.contains("Correct! +1 points"));
        assert!(out.contains("Hint 3/3: The answer rhymes with 'valance'..."));
        assert!(out.contains("(all 3 hints already shown)"));
        assert!(out.contains("Answer revealed: press Enter to submit \"Balance\""));
        assert!(out.contains("Correct! +1 points ***\n"));
        assert!(out.contains("Halfway There!"));
        assert!(out.contains("<- Back to clue selection"));
        assert!(out.contains("Score: 0 points"));
    }

    #[test]
    fn test_tour_reopens_at_last_card() {
        let out = play(Route::Play, &["Amina", "", "", "", "tour", "", "q"]);
        assert_eq!(out.matches("In real life: Welcome to the Event").count(), 1);
        assert_eq!(out.matches("In real life: Teams Form").count(), 2);
        assert!(out.contains("2/2, 100% [spotlight on the clue menu (bottom)]"));
        assert!(!out.contains("| event"));
    }

    #[test]
    fn test_demo_mode_toggle_hides_cards() {
        let out = play(Route::Play, &["Amina", "", "s", "1", "demo", "", "", "quit"]);
        assert!(out.contains("(Demo mode off)"));
        assert!(out.contains("In real life: Mystery Guest Announced"));
        assert!(!out.contains("In real life: Groups Start Strategizing"));
    }

    #[test]
    fn test_pick_option_by_letter_or_text() {
        let mut engine = ClueEngine::start(
            crate::clue::catalog::parents(),
            StdRng::seed_from_u64(3),
            Duration::ZERO,
        )
        .unwrap();
        engine.choose(&"bride".into()).unwrap();
        engine.advance().unwrap();
        let first = engine.options()[0].id.clone();
        assert_eq!(pick_option(&engine, "a"), Some(first));
        assert_eq!(pick_option(&engine, "  kor WAYEEL "), Some("c".to_string()));
        assert_eq!(pick_option(&engine, "z"), None);
        assert_eq!(pick_option(&engine, "something else"), None);
    }
}
