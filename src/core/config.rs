//! Director configuration, loadable from RON.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which variables a failed dice check penalizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PenaltyScope {
    /// Every tracked variable.
    AllTracked,
    /// The check's `stat`, falling back to every tracked variable when unset.
    CheckedStat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DicePenalty {
    /// Subtracted (through the clamped `modify`) on failure.
    pub amount: f64,
    pub scope: PenaltyScope,
}

impl Default for DicePenalty {
    fn default() -> Self {
        Self {
            amount: 5.0,
            scope: PenaltyScope::AllTracked,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiceConfig {
    pub sides: u32,
    /// Used when a check does not set its own difficulty.
    pub default_difficulty: u32,
    #[serde(default)]
    pub penalty: DicePenalty,
}

impl Default for DiceConfig {
    fn default() -> Self {
        Self {
            sides: 6,
            default_difficulty: 4,
            penalty: DicePenalty::default(),
        }
    }
}

/// A qualitative ending selected by final score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EndingBand {
    /// Lowest score (inclusive) that earns this ending.
    pub min_score: f64,
    pub title: String,
    pub message: String,
    pub grade: String,
}

impl EndingBand {
    fn new(min_score: f64, title: &str, message: &str, grade: &str) -> Self {
        Self {
            min_score,
            title: title.to_string(),
            message: message.to_string(),
            grade: grade.to_string(),
        }
    }
}

pub fn default_endings() -> Vec<EndingBand> {
    vec![
        EndingBand::new(
            80.0,
            "Outstanding journey!",
            "You showed an exemplary command of every skill.",
            "A+",
        ),
        EndingBand::new(
            60.0,
            "Good journey!",
            "You handled most situations well.",
            "B",
        ),
        EndingBand::new(
            40.0,
            "Average journey",
            "Some skills still need work.",
            "C",
        ),
        EndingBand::new(
            0.0,
            "Difficult journey",
            "A few approaches deserve another look.",
            "D",
        ),
    ]
}

fn default_tracked() -> Vec<String> {
    ["Empathy", "Autonomy", "Confidence"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_tracked_start() -> f64 {
    50.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorConfig {
    /// Variables averaged into the final score and hit by dice penalties.
    #[serde(default = "default_tracked")]
    pub tracked_variables: Vec<String>,
    /// Starting value of every tracked variable not listed in `initial_variables`.
    #[serde(default = "default_tracked_start")]
    pub tracked_start: f64,
    /// Explicit starting values; override `tracked_start`.
    #[serde(default)]
    pub initial_variables: BTreeMap<String, f64>,
    /// Scene `start()` loads; the first scene when unset.
    #[serde(default)]
    pub start_scene: Option<String>,
    /// Fixed seed for dice and random effects; entropy when unset.
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub dice: DiceConfig,
    #[serde(default = "default_endings")]
    pub endings: Vec<EndingBand>,
    /// End the playthrough as soon as a tracked variable reaches 0.
    #[serde(default)]
    pub end_on_depleted_stat: bool,
}

impl Default for DirectorConfig {
    fn default() -> Self {
        Self {
            tracked_variables: default_tracked(),
            tracked_start: default_tracked_start(),
            initial_variables: BTreeMap::new(),
            start_scene: None,
            seed: None,
            dice: DiceConfig::default(),
            endings: default_endings(),
            end_on_depleted_stat: false,
        }
    }
}

impl DirectorConfig {
    /// Load a configuration from a RON file.
    pub fn load_from_ron(path: &Path) -> Result<DirectorConfig, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse_ron(&contents)
    }

    /// Parse and validate a configuration from a RON string.
    pub fn parse_ron(input: &str) -> Result<DirectorConfig, ConfigError> {
        let config: DirectorConfig = ron::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dice.sides == 0 {
            return Err(ConfigError::Invalid("dice must have at least one side".into()));
        }
        if !self.dice.penalty.amount.is_finite() {
            return Err(ConfigError::Invalid("dice penalty must be finite".into()));
        }
        if !self.tracked_start.is_finite() {
            return Err(ConfigError::Invalid("tracked_start must be finite".into()));
        }
        if self.endings.is_empty() {
            return Err(ConfigError::Invalid("at least one ending band is required".into()));
        }
        if let Some(band) = self.endings.iter().find(|b| !b.min_score.is_finite()) {
            return Err(ConfigError::Invalid(format!(
                "ending band '{}' has a non-finite threshold",
                band.title
            )));
        }
        Ok(())
    }

    /// Values written into the store before the first scene: every tracked
    /// variable at `tracked_start`, then `initial_variables` on top.
    pub fn starting_values(&self) -> BTreeMap<String, f64> {
        let mut values: BTreeMap<String, f64> = self
            .tracked_variables
            .iter()
            .map(|name| (name.clone(), self.tracked_start))
            .collect();
        values.extend(self.initial_variables.clone());
        values
    }

    /// Ending bands ordered from the highest threshold down.
    pub fn sorted_endings(&self) -> Vec<EndingBand> {
        let mut bands = self.endings.clone();
        bands.sort_by(|a, b| b.min_score.total_cmp(&a.min_score));
        bands
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_classic_rules() {
        let config = DirectorConfig::default();
        assert_eq!(config.tracked_variables.len(), 3);
        assert_eq!(config.starting_values()["Empathy"], 50.0);
        assert_eq!(config.starting_values().len(), 3);
        assert_eq!(config.dice.sides, 6);
        assert_eq!(config.dice.default_difficulty, 4);
        assert_eq!(config.dice.penalty.amount, 5.0);
        assert_eq!(config.endings.len(), 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_ron_fills_defaults() {
        let config = DirectorConfig::parse_ron(
            r#"(
                tracked_variables: ["Physique", "Mental"],
                initial_variables: { "Physique": 100.0, "Mental": 100.0 },
                seed: Some(42),
                end_on_depleted_stat: true,
            )"#,
        )
        .unwrap();
        assert_eq!(config.tracked_variables, vec!["Physique", "Mental"]);
        assert_eq!(config.seed, Some(42));
        assert!(config.end_on_depleted_stat);
        assert_eq!(config.dice, DiceConfig::default());
        assert_eq!(config.endings, default_endings());
    }

    #[test]
    fn custom_tracked_variables_start_at_tracked_start() {
        let config = DirectorConfig::parse_ron(
            r#"(
                tracked_variables: ["Physique", "Mental"],
                tracked_start: 80.0,
                initial_variables: { "Mental": 20.0, "Gold": 5.0 },
            )"#,
        )
        .unwrap();
        let values = config.starting_values();
        assert_eq!(values["Physique"], 80.0);
        assert_eq!(values["Mental"], 20.0);
        assert_eq!(values["Gold"], 5.0);
        assert!(!values.contains_key("Empathy"));
    }

    #[test]
    fn parse_custom_dice_and_endings() {
        let config = DirectorConfig::parse_ron(
            r#"(
                dice: (
                    sides: 20,
                    default_difficulty: 11,
                    penalty: (amount: 10.0, scope: CheckedStat),
                ),
                endings: [
                    (min_score: 0.0, title: "Lost", message: "Try again.", grade: "F"),
                    (min_score: 50.0, title: "Home", message: "You made it.", grade: "A"),
                ],
            )"#,
        )
        .unwrap();
        assert_eq!(config.dice.sides, 20);
        assert_eq!(config.dice.penalty.scope, PenaltyScope::CheckedStat);
        let sorted = config.sorted_endings();
        assert_eq!(sorted[0].title, "Home");
        assert_eq!(sorted[1].title, "Lost");
    }

    #[test]
    fn invalid_configs_rejected() {
        assert!(matches!(
            DirectorConfig::parse_ron("(dice: (sides: 0, default_difficulty: 1))"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DirectorConfig::parse_ron("(endings: [])"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            DirectorConfig::parse_ron("(tracked_variables: 3)"),
            Err(ConfigError::Ron(_))
        ));
    }

    #[test]
    fn load_fixture_config() {
        let path = std::path::PathBuf::from("tests/fixtures/city_tour.ron");
        let config = DirectorConfig::load_from_ron(&path).unwrap();
        assert_eq!(config.start_scene.as_deref(), Some("intro"));
        assert_eq!(config.tracked_variables, vec!["Courage", "Kindness"]);
    }
}
