//! Effect application: how choices mutate the variable store.

use rand::Rng;
use thiserror::Error;
use tracing::debug;

use crate::core::variables::{clamp, VariableStore, VALUE_MAX, VALUE_MIN};
use crate::schema::event::VariableDelta;
use crate::schema::rules::{Effect, EffectOperation};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EffectError {
    #[error("unknown effect operation '{operation}' on {variable}")]
    UnknownOperation { variable: String, operation: String },
    #[error("effect '{operation}' on {variable} has no value")]
    MissingOperand { variable: String, operation: String },
    #[error("random effect on {variable} has an empty range [{min}, {max}]")]
    InvalidRange {
        variable: String,
        min: i64,
        max: i64,
    },
}

/// Check every effect before any is applied, so a bad list never half-applies.
pub fn validate(effects: &[Effect]) -> Result<(), EffectError> {
    for effect in effects {
        match &effect.operation {
            EffectOperation::Set | EffectOperation::Add | EffectOperation::Multiply => {
                operand(effect)?;
            }
            EffectOperation::Random => {
                random_bounds(effect)?;
            }
            EffectOperation::Unrecognized(raw) => {
                return Err(EffectError::UnknownOperation {
                    variable: effect.variable.clone(),
                    operation: raw.clone(),
                })
            }
        }
    }
    Ok(())
}

/// Apply one effect and describe the change.
///
/// `set` and `random` assign, `add` goes through the clamped `modify`,
/// `multiply` rounds to the nearest integer before clamping. Every result
/// lands inside the store's bounds.
pub fn apply<R: Rng>(
    effect: &Effect,
    store: &mut VariableStore,
    rng: &mut R,
) -> Result<VariableDelta, EffectError> {
    let name = effect.variable.as_str();
    let before = store.get(name);

    let after = match &effect.operation {
        EffectOperation::Set => {
            let value = clamp(operand(effect)?);
            store.set(name, value);
            value
        }
        EffectOperation::Add => store.modify(name, operand(effect)?),
        EffectOperation::Multiply => {
            let value = clamp((before * operand(effect)?).round());
            store.set(name, value);
            value
        }
        EffectOperation::Random => {
            let (min, max) = random_bounds(effect)?;
            let drawn = rng.gen_range(min..=max) as f64;
            let value = clamp(drawn);
            store.set(name, value);
            debug!(variable = name, min, max, drawn, "random_effect_drawn");
            value
        }
        EffectOperation::Unrecognized(raw) => {
            return Err(EffectError::UnknownOperation {
                variable: effect.variable.clone(),
                operation: raw.clone(),
            })
        }
    };

    Ok(VariableDelta {
        variable: effect.variable.clone(),
        operation: effect.operation.clone(),
        delta: after - before,
        value: after,
    })
}

fn operand(effect: &Effect) -> Result<f64, EffectError> {
    effect
        .value
        .filter(|v| v.is_finite())
        .ok_or_else(|| EffectError::MissingOperand {
            variable: effect.variable.clone(),
            operation: effect.operation.name().to_string(),
        })
}

/// Integer bounds of a random draw; defaults to the full variable range.
fn random_bounds(effect: &Effect) -> Result<(i64, i64), EffectError> {
    let min = effect.min.unwrap_or(VALUE_MIN).ceil() as i64;
    let max = effect.max.unwrap_or(VALUE_MAX).floor() as i64;
    if min > max {
        return Err(EffectError::InvalidRange {
            variable: effect.variable.clone(),
            min,
            max,
        });
    }
    Ok((min, max))
}
