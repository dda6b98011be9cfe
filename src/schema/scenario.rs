//! Authored scenario documents: scenes, dialogues and choices.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use super::rules::{Condition, DiceCheck, Effect};

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("duplicate scene id: {0}")]
    DuplicateScene(String),
    #[error("duplicate dialogue id {dialogue_id} in scene {scene_id}")]
    DuplicateDialogue {
        scene_id: String,
        dialogue_id: String,
    },
}

/// A player-selectable option carrying effects, gates and navigation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub effects: Vec<Effect>,
    /// Gates availability to the player. Unavailable choices are never offered.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_dialogue_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dice_check: Option<DiceCheck>,
}

impl Choice {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Default::default()
        }
    }
}

/// One authored line, optionally gated and optionally offering choices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Dialogue {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub speaker: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_directions: Option<String>,
    /// Gates whether the dialogue is shown at all.
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

impl Dialogue {
    pub fn new(speaker: &str, text: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            text: text.to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.id = Some(id.to_string());
        self
    }
}

/// A titled, ordered sequence of dialogues. Order is the default progression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub dialogues: Vec<Dialogue>,
}

impl Scene {
    pub fn new(id: &str, dialogues: Vec<Dialogue>) -> Self {
        Self {
            id: id.to_string(),
            dialogues,
            ..Default::default()
        }
    }

    /// Index of the dialogue with the given id.
    pub fn position_of(&self, dialogue_id: &str) -> Option<usize> {
        self.dialogues
            .iter()
            .position(|d| d.id.as_deref() == Some(dialogue_id))
    }
}

#[derive(Debug, Deserialize)]
struct ScenarioDocument {
    scenes: Vec<Scene>,
}

/// The full set of scenes of one story, indexed by scene id.
#[derive(Debug, Clone, Default)]
pub struct Scenario {
    scenes: Vec<Scene>,
    index: FxHashMap<String, usize>,
}

impl Scenario {
    /// Build a scenario, enforcing unique scene ids and unique dialogue ids per scene.
    pub fn new(scenes: Vec<Scene>) -> Result<Scenario, ScenarioError> {
        let mut index = FxHashMap::default();
        for (i, scene) in scenes.iter().enumerate() {
            if index.insert(scene.id.clone(), i).is_some() {
                return Err(ScenarioError::DuplicateScene(scene.id.clone()));
            }

            let mut seen = FxHashSet::default();
            for id in scene.dialogues.iter().filter_map(|d| d.id.as_deref()) {
                if !seen.insert(id) {
                    return Err(ScenarioError::DuplicateDialogue {
                        scene_id: scene.id.clone(),
                        dialogue_id: id.to_string(),
                    });
                }
            }
        }
        Ok(Scenario { scenes, index })
    }

    /// Load a scenario from a JSON file of shape `{ "scenes": [...] }`.
    pub fn load_from_json(path: &Path) -> Result<Scenario, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json(&contents)
    }

    pub fn from_json(input: &str) -> Result<Scenario, ScenarioError> {
        let doc: ScenarioDocument = serde_json::from_str(input)?;
        Self::new(doc.scenes)
    }

    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.index.get(id).map(|&i| &self.scenes[i])
    }

    pub fn first_scene(&self) -> Option<&Scene> {
        self.scenes.first()
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{
        "scenes": [
            {
                "id": "intro",
                "title": "Arrival",
                "dialogues": [
                    { "speaker": "Guide", "text": "Welcome to the city!" },
                    {
                        "id": "ask",
                        "speaker": "Guide",
                        "text": "Where to?",
                        "stageDirections": "points at a map",
                        "choices": [
                            { "text": "The market", "nextSceneId": "market" },
                            { "text": "Stay", "nextDialogueId": "ask",
                              "effects": [{ "variable": "Patience", "operation": "add", "value": -5 }] }
                        ]
                    }
                ]
            },
            { "id": "market", "title": "Market" }
        ]
    }"#;

    #[test]
    fn parse_scenario_document() {
        let scenario = Scenario::from_json(DOC).unwrap();
        assert_eq!(scenario.len(), 2);
        assert_eq!(scenario.first_scene().unwrap().id, "intro");

        let intro = scenario.scene("intro").unwrap();
        assert_eq!(intro.dialogues.len(), 2);
        assert_eq!(intro.dialogues[0].id, None);
        assert_eq!(
            intro.dialogues[1].stage_directions.as_deref(),
            Some("points at a map")
        );
        assert_eq!(intro.position_of("ask"), Some(1));
        assert_eq!(intro.position_of("missing"), None);

        let choices = &intro.dialogues[1].choices;
        assert_eq!(choices[0].next_scene_id.as_deref(), Some("market"));
        assert_eq!(choices[1].effects.len(), 1);

        let market = scenario.scene("market").unwrap();
        assert!(market.dialogues.is_empty());
        assert!(scenario.scene("nowhere").is_none());
    }

    #[test]
    fn duplicate_scene_rejected() {
        let result = Scenario::new(vec![Scene::new("a", vec![]), Scene::new("a", vec![])]);
        assert!(matches!(result, Err(ScenarioError::DuplicateScene(id)) if id == "a"));
    }

    #[test]
    fn duplicate_dialogue_rejected() {
        let scene = Scene::new(
            "a",
            vec![
                Dialogue::new("X", "one").with_id("d1"),
                Dialogue::new("X", "two").with_id("d1"),
            ],
        );
        assert!(matches!(
            Scenario::new(vec![scene]),
            Err(ScenarioError::DuplicateDialogue { .. })
        ));
    }

    #[test]
    fn dialogues_without_ids_do_not_collide() {
        let scene = Scene::new(
            "a",
            vec![Dialogue::new("X", "one"), Dialogue::new("X", "two")],
        );
        assert!(Scenario::new(vec![scene]).is_ok());
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            Scenario::from_json("{ not json"),
            Err(ScenarioError::Json(_))
        ));
    }
}
