//! The timeline engine: turns a clock position into the narrative event in
//! effect, fires one-shot triggers, and applies the visitor's seeks, pauses,
//! inputs and choices.
//!
//! The engine never schedules anything itself. The host calls
//! [`TimelineEngine::tick`] on its polling interval and
//! [`TimelineEngine::elapse`] as wall time passes; both must be serialised.

use std::{collections::BTreeMap, time::Duration};

use serde::Serialize;

use crate::{
    clock::ClockSource,
    config::PlaybackConfig,
    experience::{Branching, ChoiceOption, Effect, Ending, Experience, TimelineEvent},
    relay::{Receipt, Submission, SubmissionRelay},
    session::{SessionState, CHOICE_KEY},
    timeline::{derive_active_event, DelayedAction, Scheduler},
    view::{markers, Marker, SessionView},
};

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    Paused,
    /// A choice froze the timeline; an ending may still be pending.
    BranchSelected,
    EndingShown,
}

/// Result of answering or skipping an input prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    Accepted,
    Skipped,
    /// The value was empty after trimming; the prompt stays up.
    Empty,
    /// Skipping was refused because the prompt is required.
    Required,
    /// No input prompt is in effect.
    NoActiveInput,
}

/// Result of picking an option on a choice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoiceOutcome {
    /// Open branching: the session is frozen on this value.
    Branch(String),
    /// The identified ending will be shown after the ending delay.
    Ending(String),
    /// No declared ending matched the captured data; nothing changed.
    Unresolved,
    /// No choice is in effect, a branch is already selected, or the option
    /// does not belong to the active choice.
    Ignored,
}

/// A trigger that fired during an [`TimelineEngine::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiredEffect {
    pub time: f64,
    pub effect: Effect,
}

pub struct TimelineEngine<C> {
    experience: Experience,
    clock: C,
    config: PlaybackConfig,
    state: SessionState,
    phase: Phase,
    scheduler: Scheduler,
    flash_seq: u64,
}

impl<C: ClockSource> TimelineEngine<C> {
    /// Wraps an already validated experience and the clock that plays it.
    pub fn new(experience: Experience, clock: C, config: PlaybackConfig) -> Self {
        Self {
            experience,
            clock,
            config,
            state: SessionState::default(),
            phase: Phase::Idle,
            scheduler: Scheduler::new(),
            flash_seq: 0,
        }
    }

    pub fn experience(&self) -> &Experience {
        &self.experience
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn active_event(&self) -> Option<&TimelineEvent> {
        self.state
            .active
            .and_then(|index| self.experience.timeline.get(index))
    }

    /// Ending that is currently on screen.
    pub fn shown_ending(&self) -> Option<&Ending> {
        if !self.state.ending_shown {
            return None;
        }
        self.state
            .ending
            .as_deref()
            .and_then(|id| self.experience.ending(id))
    }

    /// Media duration once the clock reports it, otherwise the scripted one.
    pub fn duration(&self) -> Option<f64> {
        self.clock
            .duration()
            .filter(|duration| duration.is_finite() && *duration > 0.0)
            .or(self
                .experience
                .metadata
                .duration
                .filter(|duration| duration.is_finite() && *duration >= 0.0))
    }

    /// Begins a fresh session from position zero.
    pub fn start(&mut self) {
        self.reset_session();
        self.clock.set_position(0.0);
        self.clock.play();
        self.phase = Phase::Running;
        tracing::info!(title = %self.experience.metadata.title, "session started");
        self.advance(0.0);
    }

    /// Polls the clock source and advances the timeline. Does nothing unless
    /// the session is running.
    pub fn tick(&mut self) -> Vec<FiredEffect> {
        if self.phase != Phase::Running {
            return Vec::new();
        }
        let position = self.clock.position();
        self.advance(position)
    }

    /// Moves the session to `position` as reported by the clock.
    pub fn advance(&mut self, position: f64) -> Vec<FiredEffect> {
        if self.phase == Phase::Idle || self.state.is_frozen() {
            return Vec::new();
        }

        if !self.state.acknowledging {
            self.rederive(position);
        }
        let fired = self.fire_triggers(position);
        self.state.position = position;
        fired
    }

    /// Jumps to `target`, clamped to the playable range, and re-derives the
    /// active event immediately. Triggers are left to the next tick.
    pub fn seek(&mut self, target: f64) -> f64 {
        let upper = self.duration().unwrap_or(f64::INFINITY);
        let position = if target.is_nan() {
            0.0
        } else {
            target.clamp(0.0, upper)
        };

        self.clock.set_position(position);
        if !self.state.acknowledging {
            self.rederive(position);
        }
        self.state.position = position;
        tracing::debug!(requested = target, position, "seek");
        position
    }

    pub fn pause(&mut self) {
        if self.phase != Phase::Running {
            return;
        }
        self.clock.pause();
        self.state.paused = true;
        self.phase = Phase::Paused;
        tracing::info!(position = self.state.position, "paused");
    }

    /// Continues from the clock's current position.
    pub fn resume(&mut self) {
        if self.phase != Phase::Paused {
            return;
        }
        self.clock.play();
        self.state.paused = false;
        self.phase = Phase::Running;
        tracing::info!(position = self.state.position, "resumed");
    }

    pub fn toggle_pause(&mut self) {
        match self.phase {
            Phase::Running => self.pause(),
            Phase::Paused => self.resume(),
            _ => {}
        }
    }

    /// Ends the session: pending callbacks are dropped, captured data is
    /// cleared and the clock is rewound.
    pub fn stop(&mut self) {
        self.reset_session();
        self.clock.pause();
        self.clock.set_position(0.0);
        self.phase = Phase::Idle;
        tracing::info!("session stopped");
    }

    /// Stores the visitor's answer to the active input prompt.
    pub fn submit_input(&mut self, key: &str, value: &str) -> InputOutcome {
        let Some(TimelineEvent::Input { store_as, .. }) = self.live_event() else {
            tracing::warn!(key, "input submitted with no prompt in effect");
            return InputOutcome::NoActiveInput;
        };

        let value = value.trim();
        if value.is_empty() {
            tracing::warn!(key, "rejected empty input");
            return InputOutcome::Empty;
        }
        if store_as != key {
            tracing::debug!(key, store_as = %store_as, "input stored under caller key");
        }

        self.state.capture(key, value);
        self.acknowledge_input();
        tracing::info!(key, "input captured");
        InputOutcome::Accepted
    }

    /// Dismisses an optional input prompt without storing anything.
    pub fn skip_input(&mut self) -> InputOutcome {
        let Some(TimelineEvent::Input { required, .. }) = self.live_event() else {
            return InputOutcome::NoActiveInput;
        };
        if *required {
            return InputOutcome::Required;
        }

        self.acknowledge_input();
        InputOutcome::Skipped
    }

    /// Picks an option of the active choice and freezes the timeline.
    pub fn select_choice(&mut self, option: &ChoiceOption) -> ChoiceOutcome {
        let Some(TimelineEvent::Choice { options, .. }) = self.live_event() else {
            tracing::warn!(value = %option.value, "choice selected with no choice in effect");
            return ChoiceOutcome::Ignored;
        };
        if !options.iter().any(|candidate| candidate.value == option.value) {
            tracing::warn!(value = %option.value, "option does not belong to the active choice");
            return ChoiceOutcome::Ignored;
        }

        let outcome = match self.experience.metadata.branching {
            Branching::Open => ChoiceOutcome::Branch(option.value.clone()),
            Branching::Endings => {
                let mut captured = self.state.captured.clone();
                captured.insert(CHOICE_KEY.to_string(), option.value.clone());
                match self.resolve_ending(&option.leads_to, &captured) {
                    Some(id) => ChoiceOutcome::Ending(id),
                    None => {
                        tracing::warn!(
                            value = %option.value,
                            leads_to = %option.leads_to,
                            "no ending matches the captured data"
                        );
                        return ChoiceOutcome::Unresolved;
                    }
                }
            }
        };

        self.state.capture(CHOICE_KEY, option.value.clone());
        self.state.selected_branch = Some(option.value.clone());
        self.phase = Phase::BranchSelected;
        if let ChoiceOutcome::Ending(id) = &outcome {
            self.state.ending = Some(id.clone());
            self.scheduler
                .schedule(self.config.ending_delay(), DelayedAction::ShowEnding(id.clone()));
        }
        tracing::info!(value = %option.value, ending = ?self.state.ending, "branch selected");
        outcome
    }

    /// Lets `delta` of wall time pass, running any delayed callbacks that
    /// came due.
    pub fn elapse(&mut self, delta: Duration) {
        for action in self.scheduler.elapse(delta) {
            match action {
                DelayedAction::ClearFlash(seq) => {
                    if self.state.flash == Some(seq) {
                        self.state.flash = None;
                    }
                }
                DelayedAction::ResumeAfterInput => {
                    self.state.acknowledging = false;
                    let position = self.state.position;
                    self.rederive(position);
                }
                DelayedAction::ShowEnding(id) => {
                    if self.state.ending.as_deref() == Some(id.as_str()) {
                        self.state.ending_shown = true;
                        self.phase = Phase::EndingShown;
                        tracing::info!(ending = %id, "ending shown");
                    }
                }
            }
        }
    }

    /// Hands the captured data to `relay`. Failures are logged and otherwise
    /// ignored so the experience can carry on.
    pub fn submit(&self, relay: &dyn SubmissionRelay) -> Option<Receipt> {
        let result = Submission::from_captured(&self.state.captured)
            .and_then(|submission| relay.relay(&submission));
        match result {
            Ok(receipt) => Some(receipt),
            Err(err) => {
                tracing::error!(error = %err, "submission error");
                None
            }
        }
    }

    /// Snapshot for the renderer, with captured values filled into the
    /// active event and ending text.
    pub fn view(&self) -> SessionView {
        SessionView {
            phase: self.phase,
            position: self.state.position,
            duration: self.duration(),
            active: self
                .active_event()
                .map(|event| event.render(&self.state.captured)),
            acknowledging: self.state.acknowledging,
            flash: self.state.flash_active(),
            captured: self.state.captured.clone(),
            selected_branch: self.state.selected_branch.clone(),
            ending: self
                .shown_ending()
                .map(|ending| ending.render(&self.state.captured)),
        }
    }

    /// Scrub bar markers for every timeline event.
    pub fn markers(&self) -> Vec<Marker> {
        markers(&self.experience.timeline, self.duration())
    }

    /// Active event, unless the session has been frozen by a choice.
    fn live_event(&self) -> Option<&TimelineEvent> {
        if self.state.is_frozen() {
            return None;
        }
        self.active_event()
    }

    fn rederive(&mut self, position: f64) {
        let pinned = if self.state.is_frozen() {
            self.state.active
        } else {
            None
        };
        let active = derive_active_event(&self.experience.timeline, position, pinned);
        if active != self.state.active {
            let label = active
                .and_then(|index| self.experience.timeline.get(index))
                .map(TimelineEvent::label);
            tracing::debug!(position, event = ?label, "active event changed");
        }
        self.state.active = active;
    }

    fn fire_triggers(&mut self, position: f64) -> Vec<FiredEffect> {
        let mut fired = Vec::new();
        for trigger in &self.experience.triggers {
            if trigger.time <= position && self.state.fired.insert(trigger.time) {
                fired.push(FiredEffect {
                    time: trigger.time,
                    effect: trigger.effect,
                });
            }
        }

        for effect in &fired {
            match effect.effect {
                Effect::Flash => {
                    self.flash_seq += 1;
                    self.state.flash = Some(self.flash_seq);
                    self.scheduler
                        .schedule(self.config.flash(), DelayedAction::ClearFlash(self.flash_seq));
                }
            }
            tracing::debug!(time = effect.time, effect = ?effect.effect, "trigger fired");
        }
        fired
    }

    fn acknowledge_input(&mut self) {
        self.state.active = None;
        self.state.acknowledging = true;
        self.scheduler
            .schedule(self.config.input_ack(), DelayedAction::ResumeAfterInput);
    }

    /// The target ending if its conditions hold, otherwise the first declared
    /// ending whose conditions do.
    fn resolve_ending(
        &self,
        target: &str,
        captured: &BTreeMap<String, String>,
    ) -> Option<String> {
        self.experience
            .ending(target)
            .filter(|ending| ending.matches(captured))
            .or_else(|| {
                self.experience
                    .endings
                    .iter()
                    .find(|ending| ending.matches(captured))
            })
            .map(|ending| ending.id.clone())
    }

    fn reset_session(&mut self) {
        self.scheduler.clear();
        self.state = SessionState::default();
    }
}

impl<C> std::fmt::Debug for TimelineEngine<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimelineEngine")
            .field("title", &self.experience.metadata.title)
            .field("phase", &self.phase)
            .field("state", &self.state)
            .finish()
    }
}
