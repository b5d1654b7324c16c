//! Error types for the host model and the contract library.
//!
//! Uses `thiserror` for structured, matchable error variants. Two disjoint
//! families exist:
//!
//! - [`UsageError`]: programmer mistakes detected while *building* a contract
//!   (malformed argument specs, optional-before-required, ...). These abort
//!   contract construction and never reach a call.
//! - [`RuntimeError`]: everything that can go wrong while *calling* a host
//!   function, including contract violations with full blame attribution.

use thiserror::Error;

use crate::value::Value;
use crate::violation::{ordinal, ContractViolation};

/// Host-model errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Re-linking an object's fallback chain would make it cyclic.
    #[error("prototype cycle: object {object} already appears on the chain of its new prototype")]
    PrototypeCycle { object: crate::id::ObjectId },
}

/// Library misuse detected at contract build time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UsageError {
    /// An argument spec given to `fun`/`method` is not a mapping.
    #[error(
        "{who}: expected an object with exactly one field to specify the name of the {nth} argument, but got {got}",
        nth = ordinal(position + 1)
    )]
    ArgumentSpecNotObject {
        who: String,
        /// Zero-based argument position.
        position: usize,
        got: String,
    },

    /// An argument spec given to `fun`/`method` is a bare contract, so it
    /// carries no name.
    #[error(
        "{who}: expected a one-field object specifying the name and the contract of the {nth} argument, but got a contract {contract}",
        nth = ordinal(position + 1)
    )]
    ArgumentSpecIsContract {
        who: String,
        position: usize,
        contract: String,
    },

    /// An argument spec mapping has zero or several keys.
    #[error(
        "{who}: expected exactly one key to specify the name of the {nth} argument, but got {count}",
        nth = ordinal(position + 1)
    )]
    ArgumentSpecKeyCount {
        who: String,
        position: usize,
        count: usize,
    },

    /// A required argument contract follows an optional one.
    #[error(
        "{who}: the non-optional {nth} argument cannot follow an optional argument",
        nth = ordinal(position + 1)
    )]
    RequiredAfterOptional { who: String, position: usize },

    /// `method` was given something other than a contract for the receiver.
    #[error("method: expected a contract for the `this` argument, but got {got}")]
    ReceiverNotContract { got: String },

    /// `constructs` names prototype fields that the constructor lacks.
    #[error(
        "constructs: some fields present in {owner} prototype contract are missing on the prototype: {fields}",
        fields = missing.join(", ")
    )]
    MissingPrototypeFields { owner: String, missing: Vec<String> },

    /// `constructs` was applied to a function without a prototype object.
    #[error("constructs: expected a constructor with a prototype, but got {got}")]
    NotAConstructor { got: String },
}

/// Errors raised while invoking host functions.
#[derive(Debug, Clone, Error)]
pub enum RuntimeError {
    /// A contract check failed; the violation carries blame and the frame path.
    #[error(transparent)]
    Violation(Box<ContractViolation>),

    /// A deferred usage error surfaced while wrapping a value.
    #[error(transparent)]
    Usage(#[from] UsageError),

    /// A host exception raised by a function body.
    #[error("uncaught exception: {0}")]
    Thrown(Value),

    /// Attempted to call a value that is not a function.
    #[error("{got} is not a function")]
    NotCallable { got: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl RuntimeError {
    /// Returns the contract violation if this error is one.
    pub fn as_violation(&self) -> Option<&ContractViolation> {
        match self {
            RuntimeError::Violation(v) => Some(v),
            _ => None,
        }
    }

    /// Raises a host exception carrying a message string.
    pub fn thrown(message: impl Into<String>) -> Self {
        RuntimeError::Thrown(Value::from(message.into()))
    }
}

impl From<ContractViolation> for RuntimeError {
    fn from(v: ContractViolation) -> Self {
        RuntimeError::Violation(Box::new(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_error_messages_use_ordinals() {
        let err = UsageError::RequiredAfterOptional {
            who: "fun".into(),
            position: 2,
        };
        assert_eq!(
            err.to_string(),
            "fun: the non-optional 3rd argument cannot follow an optional argument"
        );

        let err = UsageError::ArgumentSpecKeyCount {
            who: "method".into(),
            position: 0,
            count: 2,
        };
        assert_eq!(
            err.to_string(),
            "method: expected exactly one key to specify the name of the 1st argument, but got 2"
        );
    }

    #[test]
    fn test_missing_prototype_fields_lists_all_names() {
        let err = UsageError::MissingPrototypeFields {
            owner: "Point's".into(),
            missing: vec!["norm".into(), "scale".into()],
        };
        assert_eq!(
            err.to_string(),
            "constructs: some fields present in Point's prototype contract are missing on the prototype: norm, scale"
        );
    }

    #[test]
    fn test_thrown_renders_value() {
        let err = RuntimeError::thrown("boom");
        assert_eq!(err.to_string(), "uncaught exception: \"boom\"");
        assert!(err.as_violation().is_none());
    }
}
