use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::rules::EffectOperation;
use super::scenario::Choice;
use crate::core::variables::VariableSnapshot;

/// The kind of a [`PlaybackEvent`], used to filter subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    DialogueShow,
    ChoicesShow,
    VariablesDelta,
    VariablesUpdated,
    SceneComplete,
    SceneChanged,
    DiceRolled,
    Diagnostic,
    PlaybackEnded,
}

impl EventKind {
    /// Returns the wire name of this kind (e.g., "dialogue:show").
    pub fn name(&self) -> &'static str {
        match self {
            Self::DialogueShow => "dialogue:show",
            Self::ChoicesShow => "choices:show",
            Self::VariablesDelta => "variables:delta",
            Self::VariablesUpdated => "variables:updated",
            Self::SceneComplete => "scene:complete",
            Self::SceneChanged => "scene:changed",
            Self::DiceRolled => "dice:rolled",
            Self::Diagnostic => "playback:diagnostic",
            Self::PlaybackEnded => "playback:ended",
        }
    }
}

/// Payload of `dialogue:show`. `choices` holds only the available choices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DialogueShown {
    pub scene_id: String,
    pub dialogue_id: Option<String>,
    pub speaker: String,
    pub text: String,
    pub stage_directions: Option<String>,
    pub choices: Vec<Choice>,
}

/// One variable change caused by an effect or a dice penalty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDelta {
    pub variable: String,
    pub operation: EffectOperation,
    /// New value minus old value.
    pub delta: f64,
    /// Value after the change; lets designers audit random draws.
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiceOutcome {
    Success,
    Failure,
}

/// Payload of `dice:rolled`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceRoll {
    pub roll: u32,
    pub sides: u32,
    pub difficulty: u32,
    pub outcome: DiceOutcome,
    pub stat: Option<String>,
}

/// A choice pointed at content that does not exist.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ReferenceError {
    #[error("scene not found: {scene_id}")]
    MissingScene { scene_id: String },
    #[error("dialogue {dialogue_id} not found in scene {scene_id}")]
    MissingDialogue {
        scene_id: String,
        dialogue_id: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Playback recovered (e.g., fell back to the next dialogue).
    Warning,
    /// Playback ended because of the error.
    Fatal,
}

/// Payload of `playback:diagnostic`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub error: ReferenceError,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, error: ReferenceError) -> Self {
        let message = error.to_string();
        Self {
            severity,
            error,
            message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    ScenarioComplete,
    ReferenceFailure,
    StatDepleted,
}

/// Everything the engine tells the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum PlaybackEvent {
    #[serde(rename = "dialogue:show")]
    DialogueShow(DialogueShown),
    #[serde(rename = "choices:show")]
    ChoicesShow { choices: Vec<Choice> },
    #[serde(rename = "variables:delta")]
    VariablesDelta { deltas: Vec<VariableDelta> },
    #[serde(rename = "variables:updated")]
    VariablesUpdated { snapshot: VariableSnapshot },
    #[serde(rename = "scene:complete", rename_all = "camelCase")]
    SceneComplete { scene_id: String },
    #[serde(rename = "scene:changed", rename_all = "camelCase")]
    SceneChanged { scene_id: String },
    #[serde(rename = "dice:rolled")]
    DiceRolled(DiceRoll),
    #[serde(rename = "playback:diagnostic")]
    Diagnostic(Diagnostic),
    #[serde(rename = "playback:ended")]
    PlaybackEnded { reason: EndReason },
}

impl PlaybackEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::DialogueShow(_) => EventKind::DialogueShow,
            Self::ChoicesShow { .. } => EventKind::ChoicesShow,
            Self::VariablesDelta { .. } => EventKind::VariablesDelta,
            Self::VariablesUpdated { .. } => EventKind::VariablesUpdated,
            Self::SceneComplete { .. } => EventKind::SceneComplete,
            Self::SceneChanged { .. } => EventKind::SceneChanged,
            Self::DiceRolled(_) => EventKind::DiceRolled,
            Self::Diagnostic(_) => EventKind::Diagnostic,
            Self::PlaybackEnded { .. } => EventKind::PlaybackEnded,
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind().name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(EventKind::DialogueShow.name(), "dialogue:show");
        assert_eq!(EventKind::ChoicesShow.name(), "choices:show");
        assert_eq!(EventKind::VariablesDelta.name(), "variables:delta");
        assert_eq!(EventKind::SceneComplete.name(), "scene:complete");
        assert_eq!(EventKind::Diagnostic.name(), "playback:diagnostic");
    }

    #[test]
    fn event_wire_format() {
        let event = PlaybackEvent::SceneComplete {
            scene_id: "intro".to_string(),
        };
        assert_eq!(event.kind(), EventKind::SceneComplete);
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"type":"scene:complete","payload":{"sceneId":"intro"}}"#
        );
    }

    #[test]
    fn diagnostic_message_from_error() {
        let diag = Diagnostic::new(
            Severity::Fatal,
            ReferenceError::MissingScene {
                scene_id: "ghost".to_string(),
            },
        );
        assert_eq!(diag.message, "scene not found: ghost");
        let json = serde_json::to_value(&diag).unwrap();
        assert_eq!(json["severity"], "fatal");
        assert_eq!(json["error"]["kind"], "missing_scene");
    }
}
