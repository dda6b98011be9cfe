//! Rule vocabulary shared by dialogues and choices: conditions, effects and dice checks.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a [`Condition`].
///
/// The set is closed. Anything else found in a document is kept as
/// `Unrecognized` so that evaluation can fail loudly instead of the
/// document silently failing to parse or the gate resolving to `false`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ComparisonOperator {
    Greater,
    GreaterOrEqual,
    Less,
    LessOrEqual,
    Equal,
    NotEqual,
    Unrecognized(String),
}

impl ComparisonOperator {
    /// The authored symbol for this operator (e.g., ">=").
    pub fn symbol(&self) -> &str {
        match self {
            Self::Greater => ">",
            Self::GreaterOrEqual => ">=",
            Self::Less => "<",
            Self::LessOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for ComparisonOperator {
    fn from(raw: String) -> Self {
        match raw.trim() {
            ">" => Self::Greater,
            ">=" => Self::GreaterOrEqual,
            "<" => Self::Less,
            "<=" => Self::LessOrEqual,
            "==" => Self::Equal,
            "!=" => Self::NotEqual,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<ComparisonOperator> for String {
    fn from(op: ComparisonOperator) -> Self {
        op.symbol().to_string()
    }
}

impl fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A read-only predicate over the variable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub variable: String,
    pub operator: ComparisonOperator,
    pub value: f64,
}

impl Condition {
    pub fn new(variable: &str, operator: ComparisonOperator, value: f64) -> Self {
        Self {
            variable: variable.to_string(),
            operator,
            value,
        }
    }
}

/// Mutation applied by an [`Effect`]. Closed like [`ComparisonOperator`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EffectOperation {
    Set,
    Add,
    Multiply,
    Random,
    Unrecognized(String),
}

impl EffectOperation {
    pub fn name(&self) -> &str {
        match self {
            Self::Set => "set",
            Self::Add => "add",
            Self::Multiply => "multiply",
            Self::Random => "random",
            Self::Unrecognized(raw) => raw,
        }
    }
}

impl From<String> for EffectOperation {
    fn from(raw: String) -> Self {
        match raw.trim() {
            "set" => Self::Set,
            "add" => Self::Add,
            "multiply" => Self::Multiply,
            "random" => Self::Random,
            _ => Self::Unrecognized(raw),
        }
    }
}

impl From<EffectOperation> for String {
    fn from(op: EffectOperation) -> Self {
        op.name().to_string()
    }
}

impl fmt::Display for EffectOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A mutation instruction applied to the variable store when a choice is taken.
///
/// `value` is the operand of `set`, `add` and `multiply`. `min`/`max` bound
/// a `random` draw and default to the full variable range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Effect {
    pub variable: String,
    pub operation: EffectOperation,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl Effect {
    pub fn set(variable: &str, value: f64) -> Self {
        Self::with_operand(variable, EffectOperation::Set, value)
    }

    pub fn add(variable: &str, value: f64) -> Self {
        Self::with_operand(variable, EffectOperation::Add, value)
    }

    pub fn multiply(variable: &str, value: f64) -> Self {
        Self::with_operand(variable, EffectOperation::Multiply, value)
    }

    pub fn random(variable: &str, min: f64, max: f64) -> Self {
        Self {
            variable: variable.to_string(),
            operation: EffectOperation::Random,
            value: None,
            min: Some(min),
            max: Some(max),
        }
    }

    fn with_operand(variable: &str, operation: EffectOperation, value: f64) -> Self {
        Self {
            variable: variable.to_string(),
            operation,
            value: Some(value),
            min: None,
            max: None,
        }
    }
}

/// Navigation taken after a dice check resolves one way or the other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceBranch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_scene_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_dialogue_id: Option<String>,
}

impl DiceBranch {
    pub fn is_empty(&self) -> bool {
        self.next_scene_id.is_none() && self.next_dialogue_id.is_none()
    }
}

/// A chance-based pass/fail resolution attached to a choice.
///
/// Unset `difficulty` and `sides` fall back to the director's dice configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceCheck {
    /// Variable the check is "against"; the target of a stat-scoped penalty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stat: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sides: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<DiceBranch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<DiceBranch>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_symbols_parse() {
        let ops: Vec<ComparisonOperator> = [">", ">=", "<", "<=", "==", "!="]
            .iter()
            .map(|s| ComparisonOperator::from(s.to_string()))
            .collect();
        assert_eq!(
            ops,
            vec![
                ComparisonOperator::Greater,
                ComparisonOperator::GreaterOrEqual,
                ComparisonOperator::Less,
                ComparisonOperator::LessOrEqual,
                ComparisonOperator::Equal,
                ComparisonOperator::NotEqual,
            ]
        );
    }

    #[test]
    fn unknown_operator_survives_parsing() {
        let cond: Condition =
            serde_json::from_str(r#"{"variable":"Moral","operator":"=~","value":3}"#).unwrap();
        assert_eq!(
            cond.operator,
            ComparisonOperator::Unrecognized("=~".to_string())
        );
        assert_eq!(cond.operator.to_string(), "=~");
    }

    #[test]
    fn effect_json_shape() {
        let effect: Effect =
            serde_json::from_str(r#"{"variable":"Luck","operation":"random","min":10,"max":20}"#)
                .unwrap();
        assert_eq!(effect.operation, EffectOperation::Random);
        assert_eq!(effect.min, Some(10.0));
        assert_eq!(effect.value, None);

        let json = serde_json::to_string(&Effect::add("Moral", -5.0)).unwrap();
        assert_eq!(json, r#"{"variable":"Moral","operation":"add","value":-5.0}"#);
    }

    #[test]
    fn unknown_operation_survives_parsing() {
        let effect: Effect =
            serde_json::from_str(r#"{"variable":"Moral","operation":"divide","value":2}"#)
                .unwrap();
        assert!(matches!(effect.operation, EffectOperation::Unrecognized(ref s) if s == "divide"));
    }

    #[test]
    fn dice_check_camel_case() {
        let check: DiceCheck = serde_json::from_str(
            r#"{"stat":"Courage","difficulty":5,"failure":{"nextSceneId":"hospital"}}"#,
        )
        .unwrap();
        assert_eq!(check.difficulty, Some(5));
        assert_eq!(check.sides, None);
        let failure = check.failure.unwrap();
        assert_eq!(failure.next_scene_id.as_deref(), Some("hospital"));
        assert!(!failure.is_empty());
        assert!(check.success.is_none());
    }
}
