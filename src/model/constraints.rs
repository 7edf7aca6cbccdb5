// Copyright 2025 Cowboy AI, LLC.

use crate::errors::{ConstraintViolation, ConstraintViolationError};
use crate::fragment::ConstraintClass;
use crate::types::{names, Annotation, TypeName};
use serde_json::Value;
use std::sync::Arc;

/// One resolved constraint annotation
#[derive(Debug, Clone)]
pub enum ConstraintModel {
    /// Checked by a constraint class
    Simple {
        /// The annotation instance
        annotation: Annotation,
        /// Implementation
        class: Arc<ConstraintClass>,
    },
    /// Annotation composed of further constraint annotations; valid when all are
    Composite {
        /// The composed annotation instance
        annotation: Annotation,
        /// Constraints it is composed of
        constraints: Vec<ConstraintModel>,
    },
}

impl ConstraintModel {
    /// The annotation this model checks
    pub fn annotation(&self) -> &Annotation {
        match self {
            ConstraintModel::Simple { annotation, .. }
            | ConstraintModel::Composite { annotation, .. } => annotation,
        }
    }

    /// Whether a non-null value passes
    pub fn is_valid(&self, value: &Value) -> bool {
        match self {
            ConstraintModel::Simple { annotation, class } => class.is_valid(annotation, value),
            ConstraintModel::Composite { constraints, .. } => {
                constraints.iter().all(|c| c.is_valid(value))
            }
        }
    }
}

/// Constraints of one parameter or state slot
#[derive(Debug, Clone)]
pub struct ValueConstraintsModel {
    name: String,
    optional: bool,
    constraints: Vec<ConstraintModel>,
}

impl ValueConstraintsModel {
    pub(crate) fn new(name: impl Into<String>, optional: bool, constraints: Vec<ConstraintModel>) -> Self {
        Self {
            name: name.into(),
            optional,
            constraints,
        }
    }

    /// Parameter or state name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether null is accepted
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Resolved constraints in declaration order
    pub fn constraints(&self) -> &[ConstraintModel] {
        &self.constraints
    }

    /// Whether any check applies at all
    pub fn is_constrained(&self) -> bool {
        !self.constraints.is_empty() || !self.optional
    }

    /// Violations of `value`; null is only checked against optionality
    pub fn check(&self, value: &Value) -> Vec<ConstraintViolation> {
        if value.is_null() {
            if self.optional {
                return Vec::new();
            }
            return vec![ConstraintViolation {
                name: self.name.clone(),
                constraint: TypeName::new(names::NOT_OPTIONAL),
                value: Value::Null,
            }];
        }
        self.constraints
            .iter()
            .filter(|c| !c.is_valid(value))
            .map(|c| ConstraintViolation {
                name: self.name.clone(),
                constraint: c.annotation().annotation_type.clone(),
                value: value.clone(),
            })
            .collect()
    }
}

/// Constraints of every parameter of a method
#[derive(Debug, Clone, Default)]
pub struct MethodConstraintsModel {
    parameters: Vec<ValueConstraintsModel>,
}

impl MethodConstraintsModel {
    pub(crate) fn new(parameters: Vec<ValueConstraintsModel>) -> Self {
        Self { parameters }
    }

    /// Per-parameter constraints
    pub fn parameters(&self) -> &[ValueConstraintsModel] {
        &self.parameters
    }

    /// Whether any parameter is checked
    pub fn is_constrained(&self) -> bool {
        self.parameters.iter().any(ValueConstraintsModel::is_constrained)
    }

    /// Validate arguments, stopping at the first parameter that fails
    ///
    /// Missing arguments count as null.
    pub fn check(
        &self,
        composite: &TypeName,
        method: &str,
        args: &[Value],
    ) -> Result<(), ConstraintViolationError> {
        for (i, parameter) in self.parameters.iter().enumerate() {
            if !parameter.is_constrained() {
                continue;
            }
            let value = args.get(i).unwrap_or(&Value::Null);
            let violations = parameter.check(value);
            if !violations.is_empty() {
                return Err(ConstraintViolationError {
                    composite: composite.clone(),
                    member: method.to_string(),
                    violations,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ValueType;
    use serde_json::json;

    fn positive() -> ConstraintModel {
        ConstraintModel::Simple {
            annotation: Annotation::new("Positive"),
            class: Arc::new(ConstraintClass::new(
                "PositiveConstraint",
                "Positive",
                ValueType::Integer,
                |_: &Annotation, v: &Value| v.as_i64().is_some_and(|n| n > 0),
            )),
        }
    }

    #[test]
    fn test_null_checks_only_optionality() {
        let required = ValueConstraintsModel::new("amount", false, vec![positive()]);
        let violations = required.check(&Value::Null);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].constraint, names::NOT_OPTIONAL);

        let optional = ValueConstraintsModel::new("amount", true, vec![positive()]);
        assert!(optional.check(&Value::Null).is_empty());
        assert!(optional.is_constrained());
        assert!(!ValueConstraintsModel::new("x", true, vec![]).is_constrained());
    }

    #[test]
    fn test_composite_constraint_requires_all() {
        let even = ConstraintModel::Simple {
            annotation: Annotation::new("Even"),
            class: Arc::new(ConstraintClass::new(
                "EvenConstraint",
                "Even",
                ValueType::Integer,
                |_: &Annotation, v: &Value| v.as_i64().is_some_and(|n| n % 2 == 0),
            )),
        };
        let composed = ConstraintModel::Composite {
            annotation: Annotation::new("PositiveEven"),
            constraints: vec![positive(), even],
        };
        assert!(composed.is_valid(&json!(4)));
        assert!(!composed.is_valid(&json!(3)));
        assert!(!composed.is_valid(&json!(-2)));
    }

    #[test]
    fn test_method_check_reports_first_failing_parameter() {
        let method = MethodConstraintsModel::new(vec![
            ValueConstraintsModel::new("from", false, vec![]),
            ValueConstraintsModel::new("amount", false, vec![positive()]),
        ]);
        assert!(method.check(&"Account".into(), "transfer", &[json!("a"), json!(5)]).is_ok());

        let err = method
            .check(&"Account".into(), "transfer", &[json!("a"), json!(-5)])
            .unwrap_err();
        let first = err.first().unwrap();
        assert_eq!(first.name, "amount");
        assert_eq!(first.constraint, "Positive");
        assert_eq!(first.value, json!(-5));

        let err = method.check(&"Account".into(), "transfer", &[]).unwrap_err();
        assert_eq!(err.first().unwrap().name, "from");
    }
}
