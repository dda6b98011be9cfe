//! The narrative director: owns a scenario and one playthrough of it.
//!
//! Wires together the dialogue cursor, effect application, dice checks,
//! cross-scene navigation and scoring. Built via `NarrativeDirector::builder()`.

use rand::Rng;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::core::channel::{EventChannel, HandlerFailure};
use crate::core::config::{ConfigError, DirectorConfig, EndingBand, PenaltyScope};
use crate::core::cursor::{CursorState, DialogueCursor, PlaybackContext, PlaybackError};
use crate::core::effects;
use crate::core::history::{HistoryEntry, PlaybackState};
use crate::core::variables::{VariableSnapshot, VariableStore};
use crate::schema::event::{
    Diagnostic, DiceOutcome, DiceRoll, EndReason, PlaybackEvent, ReferenceError, Severity,
    VariableDelta,
};
use crate::schema::rules::{DiceCheck, EffectOperation};
use crate::schema::scenario::{Choice, Dialogue, Scenario, Scene};

/// The top-level playback engine. One instance per playthrough.
#[derive(Debug)]
pub struct NarrativeDirector {
    scenario: Scenario,
    config: DirectorConfig,
    /// `config.endings`, highest threshold first.
    endings: Vec<EndingBand>,
    initial_variables: BTreeMap<String, f64>,
    cursor: DialogueCursor,
    context: PlaybackContext,
    state: PlaybackState,
}

/// Builder for constructing a `NarrativeDirector`.
#[derive(Default)]
pub struct NarrativeDirectorBuilder {
    scenario: Option<Scenario>,
    config: Option<DirectorConfig>,
    config_path: Option<String>,
    seed: Option<u64>,
    channel: Option<EventChannel>,
    initial_variables: BTreeMap<String, f64>,
}

impl NarrativeDirector {
    pub fn builder() -> NarrativeDirectorBuilder {
        NarrativeDirectorBuilder::default()
    }

    /// Load the configured start scene, or the first scene of the scenario.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        if self.state.ended || self.end_if_depleted() {
            return Ok(());
        }
        let start = self
            .config
            .start_scene
            .clone()
            .or_else(|| self.scenario.first_scene().map(|s| s.id.clone()));
        match start {
            Some(scene_id) => self.load_scene(&scene_id),
            None => {
                warn!("scenario_has_no_scenes");
                self.end(EndReason::ScenarioComplete);
                Ok(())
            }
        }
    }

    /// Switch to a scene by id and show its first visible dialogue.
    ///
    /// An unknown id ends the playthrough with a fatal diagnostic.
    pub fn load_scene(&mut self, scene_id: &str) -> Result<(), PlaybackError> {
        if self.state.ended {
            debug!(scene_id, "load_scene_ignored_after_end");
            return Ok(());
        }
        if self.end_if_depleted() {
            return Ok(());
        }
        let Some(scene) = self.scenario.scene(scene_id).cloned() else {
            self.reference_failure(ReferenceError::MissingScene {
                scene_id: scene_id.to_string(),
            });
            return Ok(());
        };

        info!(scene_id, title = %scene.title, "scene_changed");
        self.state.current_scene_id = Some(scene.id.clone());
        self.context.emit(PlaybackEvent::SceneChanged {
            scene_id: scene.id.clone(),
        });
        self.cursor.load_scene(scene, &mut self.context)?;
        self.sync_state();
        Ok(())
    }

    /// Continue past a dialogue that offers no choices.
    pub fn advance(&mut self) -> Result<(), PlaybackError> {
        if self.state.ended || self.end_if_depleted() {
            return Ok(());
        }
        self.cursor.advance(&mut self.context)?;
        self.sync_state();
        Ok(())
    }

    /// Take a choice: effects, dice check, then navigation.
    ///
    /// Navigation priority is `next_dialogue_id` (in the current scene),
    /// then `next_scene_id`, then the next dialogue. A dice branch for the
    /// rolled outcome replaces the choice's own targets.
    pub fn make_choice(&mut self, choice: &Choice) -> Result<(), PlaybackError> {
        if self.state.ended || self.end_if_depleted() {
            debug!(choice = %choice.text, "choice_ignored_after_end");
            return Ok(());
        }
        if self.cursor.state() == CursorState::Idle {
            warn!(choice = %choice.text, "choice_before_scene_loaded");
            return Ok(());
        }
        effects::validate(&choice.effects)?;

        debug!(choice = %choice.text, "choice_made");
        self.state.record(
            self.cursor.scene_id().map(str::to_string),
            self.cursor.current_dialogue().cloned(),
            choice.clone(),
        );

        self.context.apply_effects(&choice.effects)?;

        let outcome = choice
            .dice_check
            .as_ref()
            .map(|check| self.resolve_dice(check));

        if self.end_if_depleted() {
            return Ok(());
        }

        let branch = match (&choice.dice_check, outcome) {
            (Some(check), Some(DiceOutcome::Success)) => check.success.as_ref(),
            (Some(check), Some(DiceOutcome::Failure)) => check.failure.as_ref(),
            _ => None,
        }
        .filter(|b| !b.is_empty());

        let (next_dialogue, next_scene) = match branch {
            Some(b) => (b.next_dialogue_id.as_deref(), b.next_scene_id.as_deref()),
            None => (
                choice.next_dialogue_id.as_deref(),
                choice.next_scene_id.as_deref(),
            ),
        };
        self.navigate(next_dialogue, next_scene)?;
        self.sync_state();
        Ok(())
    }

    /// Take the `index`-th currently available choice. Returns false when
    /// there is no such choice.
    pub fn choose(&mut self, index: usize) -> Result<bool, PlaybackError> {
        let Some(choice) = self.cursor.available_choices().get(index).cloned() else {
            warn!(index, available = self.cursor.available_choices().len(), "choice_index_out_of_range");
            return Ok(false);
        };
        self.make_choice(&choice)?;
        Ok(true)
    }

    /// Once true, every playback call is a no-op until `reset`.
    pub fn is_ended(&self) -> bool {
        self.state.ended
    }

    /// Rounded mean of the tracked variables; 0 when none are tracked.
    pub fn final_score(&self) -> f64 {
        let tracked = &self.config.tracked_variables;
        if tracked.is_empty() {
            return 0.0;
        }
        let sum: f64 = tracked.iter().map(|v| self.context.variables.get(v)).sum();
        (sum / tracked.len() as f64).round()
    }

    /// The ending band earned by the current score.
    pub fn ending(&self) -> Option<&EndingBand> {
        let score = self.final_score();
        self.endings.iter().find(|band| score >= band.min_score)
    }

    /// Start over: initial variables, empty history, no scene loaded.
    ///
    /// Subscriptions survive. A seeded director draws the same sequence again.
    pub fn reset(&mut self) {
        let channel = std::mem::take(&mut self.context.channel);
        self.context = PlaybackContext::new(
            VariableStore::from_initial(&self.initial_variables),
            channel,
            self.config.seed,
        );
        self.cursor = DialogueCursor::new();
        self.state = PlaybackState::new();
        info!("playback_reset");
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn history(&self) -> &[HistoryEntry] {
        self.state.history()
    }

    pub fn variables(&self) -> &VariableStore {
        &self.context.variables
    }

    pub fn snapshot(&self) -> VariableSnapshot {
        self.context.variables.snapshot()
    }

    /// Subscribe and unsubscribe presentation handlers here.
    pub fn channel_mut(&mut self) -> &mut EventChannel {
        &mut self.context.channel
    }

    /// Handlers that failed since the last `take_handler_failures`.
    pub fn handler_failures(&self) -> &[HandlerFailure] {
        self.context.handler_failures()
    }

    pub fn take_handler_failures(&mut self) -> Vec<HandlerFailure> {
        self.context.take_handler_failures()
    }

    pub fn cursor(&self) -> &DialogueCursor {
        &self.cursor
    }

    pub fn current_scene(&self) -> Option<&Scene> {
        self.cursor.scene()
    }

    pub fn current_dialogue(&self) -> Option<&Dialogue> {
        self.cursor.current_dialogue()
    }

    pub fn available_choices(&self) -> &[Choice] {
        self.cursor.available_choices()
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn config(&self) -> &DirectorConfig {
        &self.config
    }

    fn navigate(
        &mut self,
        dialogue_id: Option<&str>,
        scene_id: Option<&str>,
    ) -> Result<(), PlaybackError> {
        if let Some(dialogue_id) = dialogue_id {
            if let Some(index) = self.cursor.position_of(dialogue_id) {
                debug!(dialogue_id, index, "jump_to_dialogue");
                return self.cursor.jump_to(index, &mut self.context);
            }
            let error = ReferenceError::MissingDialogue {
                scene_id: self.cursor.scene_id().unwrap_or_default().to_string(),
                dialogue_id: dialogue_id.to_string(),
            };
            warn!(error = %error, "next_dialogue_missing_advancing");
            self.context
                .emit(PlaybackEvent::Diagnostic(Diagnostic::new(Severity::Warning, error)));
            return self.step();
        }

        if let Some(scene_id) = scene_id {
            return self.load_scene(scene_id);
        }

        self.step()
    }

    /// Sequential advance, also from a dialogue awaiting a choice.
    fn step(&mut self) -> Result<(), PlaybackError> {
        let next = self.cursor.index() + 1;
        self.cursor.jump_to(next, &mut self.context)
    }

    fn resolve_dice(&mut self, check: &DiceCheck) -> DiceOutcome {
        let sides = check.sides.unwrap_or(self.config.dice.sides).max(1);
        let difficulty = check
            .difficulty
            .unwrap_or(self.config.dice.default_difficulty);
        let roll = self.context.rng().gen_range(1..=sides);
        let outcome = if roll >= difficulty {
            DiceOutcome::Success
        } else {
            DiceOutcome::Failure
        };

        info!(roll, sides, difficulty, outcome = ?outcome, "dice_rolled");
        self.context.emit(PlaybackEvent::DiceRolled(DiceRoll {
            roll,
            sides,
            difficulty,
            outcome,
            stat: check.stat.clone(),
        }));

        if outcome == DiceOutcome::Failure {
            self.apply_dice_penalty(check);
        }
        outcome
    }

    fn apply_dice_penalty(&mut self, check: &DiceCheck) {
        let penalty = &self.config.dice.penalty;
        let targets: Vec<String> = match (penalty.scope, &check.stat) {
            (PenaltyScope::CheckedStat, Some(stat)) => vec![stat.clone()],
            _ => self.config.tracked_variables.clone(),
        };
        if targets.is_empty() {
            return;
        }

        let amount = penalty.amount;
        let deltas = targets
            .into_iter()
            .map(|variable| {
                let before = self.context.variables.get(&variable);
                let after = self.context.variables.modify(&variable, -amount);
                VariableDelta {
                    variable,
                    operation: EffectOperation::Add,
                    delta: after - before,
                    value: after,
                }
            })
            .collect();
        self.context.publish_deltas(deltas);
    }

    /// Apply the depleted-stat policy. Returns true if playback ended.
    fn end_if_depleted(&mut self) -> bool {
        if !self.config.end_on_depleted_stat || !self.stat_depleted() {
            return false;
        }
        info!("tracked_stat_depleted");
        self.cursor.finish();
        self.end(EndReason::StatDepleted);
        true
    }

    fn stat_depleted(&self) -> bool {
        self.config
            .tracked_variables
            .iter()
            .any(|v| self.context.variables.get(v) <= 0.0)
    }

    fn reference_failure(&mut self, error: ReferenceError) {
        warn!(error = %error, "authoring_reference_failure");
        self.cursor.finish();
        self.context
            .emit(PlaybackEvent::Diagnostic(Diagnostic::new(Severity::Fatal, error)));
        self.end(EndReason::ReferenceFailure);
    }

    fn sync_state(&mut self) {
        self.state.current_dialogue_index = self.cursor.index();
        self.state.current_dialogue_id = self.cursor.current_dialogue().and_then(|d| d.id.clone());
        if self.cursor.is_ended() {
            self.end(EndReason::ScenarioComplete);
        }
    }

    fn end(&mut self, reason: EndReason) {
        if self.state.end(reason) {
            info!(reason = ?reason, score = self.final_score(), "playback_ended");
            self.context.emit(PlaybackEvent::PlaybackEnded { reason });
        }
    }
}

impl NarrativeDirectorBuilder {
    pub fn scenario(mut self, scenario: Scenario) -> Self {
        self.scenario = Some(scenario);
        self
    }

    pub fn config(mut self, config: DirectorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Read the configuration from a RON file at build time.
    pub fn config_file(mut self, path: &str) -> Self {
        self.config_path = Some(path.to_string());
        self
    }

    /// Overrides `DirectorConfig::seed`.
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Use a channel that already has handlers subscribed.
    pub fn channel(mut self, channel: EventChannel) -> Self {
        self.channel = Some(channel);
        self
    }

    /// Extra initial values, applied over `DirectorConfig::starting_values`.
    pub fn initial_variables(mut self, values: BTreeMap<String, f64>) -> Self {
        self.initial_variables.extend(values);
        self
    }

    pub fn build(self) -> Result<NarrativeDirector, ConfigError> {
        let mut config = match (self.config, self.config_path) {
            (Some(config), _) => config,
            (None, Some(path)) => DirectorConfig::load_from_ron(Path::new(&path))?,
            (None, None) => DirectorConfig::default(),
        };
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        config.validate()?;

        let mut initial_variables = config.starting_values();
        initial_variables.extend(self.initial_variables);

        let context = PlaybackContext::new(
            VariableStore::from_initial(&initial_variables),
            self.channel.unwrap_or_default(),
            config.seed,
        );

        Ok(NarrativeDirector {
            scenario: self.scenario.unwrap_or_default(),
            endings: config.sorted_endings(),
            config,
            initial_variables,
            cursor: DialogueCursor::new(),
            context,
            state: PlaybackState::new(),
        })
    }
}
