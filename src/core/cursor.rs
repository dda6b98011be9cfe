//! Dialogue cursor: steps through one scene's dialogue list.
//!
//! The cursor owns nothing but its position. The store, the channel and
//! the random source live in a [`PlaybackContext`] passed to every call,
//! so the director can share them with its own rules (dice, scoring).

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::channel::{EmitReport, EventChannel, HandlerFailure};
use crate::core::conditions::{ConditionError, ConditionEvaluator};
use crate::core::effects::{self, EffectError};
use crate::core::variables::VariableStore;
use crate::schema::event::{DialogueShown, PlaybackEvent, VariableDelta};
use crate::schema::rules::{Condition, Effect};
use crate::schema::scenario::{Choice, Dialogue, Scene};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("condition error: {0}")]
    Condition(#[from] ConditionError),
    #[error("effect error: {0}")]
    Effect(#[from] EffectError),
}

/// Runtime collaborators of one playthrough.
#[derive(Debug)]
pub struct PlaybackContext {
    pub variables: VariableStore,
    pub channel: EventChannel,
    rng: StdRng,
    failures: Vec<HandlerFailure>,
}

impl PlaybackContext {
    /// A fixed `seed` makes random effects and dice reproducible.
    pub fn new(variables: VariableStore, channel: EventChannel, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            variables,
            channel,
            rng,
            failures: Vec::new(),
        }
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Emit and keep any handler failures for the host to inspect.
    pub fn emit(&mut self, event: PlaybackEvent) -> EmitReport {
        let report = self.channel.emit(&event);
        self.failures.extend(report.failures.iter().cloned());
        report
    }

    pub fn handler_failures(&self) -> &[HandlerFailure] {
        &self.failures
    }

    pub fn take_handler_failures(&mut self) -> Vec<HandlerFailure> {
        std::mem::take(&mut self.failures)
    }

    pub fn evaluate(&self, conditions: &[Condition]) -> Result<bool, ConditionError> {
        ConditionEvaluator::new(&self.variables).evaluate(conditions)
    }

    /// Validate then apply effects in order, emitting `variables:delta`
    /// followed by `variables:updated`.
    pub fn apply_effects(
        &mut self,
        effects: &[Effect],
    ) -> Result<Vec<VariableDelta>, PlaybackError> {
        effects::validate(effects)?;
        let mut deltas = Vec::with_capacity(effects.len());
        for effect in effects {
            deltas.push(effects::apply(effect, &mut self.variables, &mut self.rng)?);
        }
        self.publish_deltas(deltas.clone());
        Ok(deltas)
    }

    /// Emit `variables:delta` then `variables:updated` with a fresh snapshot.
    pub fn publish_deltas(&mut self, deltas: Vec<VariableDelta>) {
        self.emit(PlaybackEvent::VariablesDelta { deltas });
        let snapshot = self.variables.snapshot();
        self.emit(PlaybackEvent::VariablesUpdated { snapshot });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CursorState {
    /// No scene loaded.
    Idle,
    /// A dialogue without available choices is on screen.
    Showing,
    /// A dialogue is on screen and the player must pick a choice.
    AwaitingChoice,
    /// The scene ran out of dialogues. Terminal until the next `load_scene`.
    Ended,
}

impl Default for CursorState {
    fn default() -> Self {
        Self::Idle
    }
}

#[derive(Debug, Clone, Default)]
pub struct DialogueCursor {
    scene: Option<Scene>,
    index: usize,
    state: CursorState,
    available: Vec<Choice>,
}

impl DialogueCursor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `scene` from its first visible dialogue.
    pub fn load_scene(
        &mut self,
        scene: Scene,
        ctx: &mut PlaybackContext,
    ) -> Result<(), PlaybackError> {
        debug!(scene_id = %scene.id, dialogues = scene.dialogues.len(), "scene_loaded");
        self.scene = Some(scene);
        self.index = 0;
        self.state = CursorState::Showing;
        self.show_current(ctx)
    }

    /// Move past a dialogue that offers no choices.
    pub fn advance(&mut self, ctx: &mut PlaybackContext) -> Result<(), PlaybackError> {
        match self.state {
            CursorState::Showing => self.jump_to(self.index + 1, ctx),
            CursorState::AwaitingChoice => {
                warn!(index = self.index, "advance_ignored_awaiting_choice");
                Ok(())
            }
            CursorState::Idle | CursorState::Ended => Ok(()),
        }
    }

    /// Apply the choice's effects and continue within the current scene.
    ///
    /// `next_dialogue_id` is honoured when it resolves in this scene;
    /// otherwise playback continues with the following dialogue.
    /// `next_scene_id` is left to the director.
    pub fn handle_choice(
        &mut self,
        choice: &Choice,
        ctx: &mut PlaybackContext,
    ) -> Result<(), PlaybackError> {
        if matches!(self.state, CursorState::Idle | CursorState::Ended) {
            debug!(state = ?self.state, "choice_ignored");
            return Ok(());
        }

        ctx.apply_effects(&choice.effects)?;

        let target = match choice.next_dialogue_id.as_deref() {
            Some(id) => self.position_of(id).unwrap_or_else(|| {
                warn!(dialogue_id = id, "next_dialogue_not_found");
                self.index + 1
            }),
            None => self.index + 1,
        };
        if let Some(scene_id) = &choice.next_scene_id {
            debug!(scene_id = %scene_id, "cross_scene_target_ignored_by_cursor");
        }
        self.jump_to(target, ctx)
    }

    /// Show the first visible dialogue at or after `index`.
    pub fn jump_to(
        &mut self,
        index: usize,
        ctx: &mut PlaybackContext,
    ) -> Result<(), PlaybackError> {
        if matches!(self.state, CursorState::Idle | CursorState::Ended) {
            return Ok(());
        }
        self.index = index;
        self.show_current(ctx)
    }

    /// Stop without emitting anything.
    pub fn finish(&mut self) {
        self.state = CursorState::Ended;
        self.available.clear();
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    pub fn is_ended(&self) -> bool {
        self.state == CursorState::Ended
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn scene_id(&self) -> Option<&str> {
        self.scene.as_ref().map(|s| s.id.as_str())
    }

    /// The dialogue on screen, if any.
    pub fn current_dialogue(&self) -> Option<&Dialogue> {
        match self.state {
            CursorState::Showing | CursorState::AwaitingChoice => self
                .scene
                .as_ref()
                .and_then(|s| s.dialogues.get(self.index)),
            CursorState::Idle | CursorState::Ended => None,
        }
    }

    /// Choices currently offered to the player, already filtered.
    pub fn available_choices(&self) -> &[Choice] {
        &self.available
    }

    pub fn position_of(&self, dialogue_id: &str) -> Option<usize> {
        self.scene.as_ref().and_then(|s| s.position_of(dialogue_id))
    }

    fn show_current(&mut self, ctx: &mut PlaybackContext) -> Result<(), PlaybackError> {
        self.available.clear();
        let Some(scene) = self.scene.as_ref() else {
            self.state = CursorState::Idle;
            return Ok(());
        };

        let mut index = self.index;
        while let Some(dialogue) = scene.dialogues.get(index) {
            if !ctx.evaluate(&dialogue.conditions)? {
                debug!(scene_id = %scene.id, index, "dialogue_hidden");
                index += 1;
                continue;
            }

            let mut choices = Vec::new();
            for choice in &dialogue.choices {
                if ctx.evaluate(&choice.conditions)? {
                    choices.push(choice.clone());
                }
            }
            if !dialogue.choices.is_empty() && choices.is_empty() {
                warn!(scene_id = %scene.id, index, "all_choices_filtered");
            }

            ctx.emit(PlaybackEvent::DialogueShow(DialogueShown {
                scene_id: scene.id.clone(),
                dialogue_id: dialogue.id.clone(),
                speaker: dialogue.speaker.clone(),
                text: dialogue.text.clone(),
                stage_directions: dialogue.stage_directions.clone(),
                choices: choices.clone(),
            }));

            self.index = index;
            if choices.is_empty() {
                self.state = CursorState::Showing;
            } else {
                ctx.emit(PlaybackEvent::ChoicesShow {
                    choices: choices.clone(),
                });
                self.available = choices;
                self.state = CursorState::AwaitingChoice;
            }
            return Ok(());
        }

        let scene_id = scene.id.clone();
        self.index = index;
        self.state = CursorState::Ended;
        debug!(scene_id = %scene_id, "scene_complete");
        ctx.emit(PlaybackEvent::SceneComplete { scene_id });
        Ok(())
    }
}
