//! Conjunctive predicate evaluation over the variable store.

use thiserror::Error;

use crate::core::variables::VariableStore;
use crate::schema::rules::{ComparisonOperator, Condition};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("unknown comparison operator '{operator}' in condition on {variable}")]
    UnknownOperator { variable: String, operator: String },
}

/// Reject any condition whose operator is outside the known set.
pub fn validate(conditions: &[Condition]) -> Result<(), ConditionError> {
    for condition in conditions {
        if let ComparisonOperator::Unrecognized(raw) = &condition.operator {
            return Err(ConditionError::UnknownOperator {
                variable: condition.variable.clone(),
                operator: raw.clone(),
            });
        }
    }
    Ok(())
}

/// Evaluates condition lists against a borrowed store. Never mutates it.
#[derive(Debug, Clone, Copy)]
pub struct ConditionEvaluator<'a> {
    store: &'a VariableStore,
}

impl<'a> ConditionEvaluator<'a> {
    pub fn new(store: &'a VariableStore) -> Self {
        Self { store }
    }

    /// True when every condition holds. An empty list is always true.
    ///
    /// Every operator is checked before any comparison runs, so a malformed
    /// condition is reported even when an earlier one is false.
    pub fn evaluate(&self, conditions: &[Condition]) -> Result<bool, ConditionError> {
        validate(conditions)?;
        for condition in conditions {
            if !self.check(condition)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Evaluate a single condition.
    pub fn check(&self, condition: &Condition) -> Result<bool, ConditionError> {
        let current = self.store.get(&condition.variable);
        let target = condition.value;
        let holds = match &condition.operator {
            ComparisonOperator::Greater => current > target,
            ComparisonOperator::GreaterOrEqual => current >= target,
            ComparisonOperator::Less => current < target,
            ComparisonOperator::LessOrEqual => current <= target,
            ComparisonOperator::Equal => current == target,
            ComparisonOperator::NotEqual => current != target,
            ComparisonOperator::Unrecognized(raw) => {
                return Err(ConditionError::UnknownOperator {
                    variable: condition.variable.clone(),
                    operator: raw.clone(),
                })
            }
        };
        Ok(holds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ComparisonOperator::*;

    fn store() -> VariableStore {
        let mut store = VariableStore::new();
        store.set("score", 50.0);
        store
    }

    #[test]
    fn numeric_operators() {
        let store = store();
        let eval = ConditionEvaluator::new(&store);
        let cases = [
            (Greater, 40.0, true),
            (Greater, 50.0, false),
            (GreaterOrEqual, 50.0, true),
            (Less, 60.0, true),
            (LessOrEqual, 49.0, false),
            (Equal, 50.0, true),
            (NotEqual, 100.0, true),
            (NotEqual, 50.0, false),
        ];
        for (op, value, expected) in cases {
            let cond = Condition::new("score", op.clone(), value);
            assert_eq!(eval.check(&cond).unwrap(), expected, "50 {} {}", op, value);
        }
    }

    #[test]
    fn empty_list_is_true() {
        let store = VariableStore::new();
        assert!(ConditionEvaluator::new(&store).evaluate(&[]).unwrap());
    }

    #[test]
    fn conjunction() {
        let store = store();
        let eval = ConditionEvaluator::new(&store);
        let pass = [
            Condition::new("score", Greater, 10.0),
            Condition::new("score", Less, 90.0),
        ];
        let fail = [
            Condition::new("score", Greater, 10.0),
            Condition::new("score", Equal, 0.0),
        ];
        assert!(eval.evaluate(&pass).unwrap());
        assert!(!eval.evaluate(&fail).unwrap());
    }

    #[test]
    fn unknown_variable_compares_as_zero() {
        let store = VariableStore::new();
        let eval = ConditionEvaluator::new(&store);
        assert!(eval
            .check(&Condition::new("ghost", Equal, 0.0))
            .unwrap());
    }

    #[test]
    fn unknown_operator_is_an_error() {
        let store = store();
        let eval = ConditionEvaluator::new(&store);
        let cond = Condition::new("score", Unrecognized("~=".to_string()), 50.0);
        assert_eq!(
            eval.evaluate(&[cond]),
            Err(ConditionError::UnknownOperator {
                variable: "score".to_string(),
                operator: "~=".to_string(),
            })
        );
    }

    #[test]
    fn unknown_operator_after_false_condition_is_still_an_error() {
        let store = store();
        let eval = ConditionEvaluator::new(&store);
        let conditions = [
            Condition::new("score", Greater, 90.0),
            Condition::new("score", Unrecognized("=>".to_string()), 1.0),
        ];
        assert_eq!(
            eval.evaluate(&conditions),
            Err(ConditionError::UnknownOperator {
                variable: "score".to_string(),
                operator: "=>".to_string(),
            })
        );
        assert!(validate(&conditions[..1]).is_ok());
    }

    #[test]
    fn evaluation_is_pure() {
        let store = store();
        let before = store.snapshot();
        let conds = [Condition::new("score", GreaterOrEqual, 50.0)];
        let eval = ConditionEvaluator::new(&store);
        let first = eval.evaluate(&conds).unwrap();
        for _ in 0..10 {
            assert_eq!(eval.evaluate(&conds).unwrap(), first);
        }
        assert_eq!(store.snapshot(), before);
    }
}
