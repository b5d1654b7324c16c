//! Argument-count validation for function contracts.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Accepted argument counts derived from a function contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Arity {
    /// Non-optional positional contracts.
    pub required: usize,
    /// Optional positional contracts.
    pub optional: usize,
    /// Whether an extra-argument contract takes the overflow.
    pub variadic: bool,
}

/// Why an argument count was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArityMismatch {
    #[error("wrong number of arguments, expected {expected} got {got}")]
    Wrong { expected: usize, got: usize },

    #[error("too few arguments, expected at least {expected} got {got}")]
    TooFew { expected: usize, got: usize },

    #[error("too many arguments, expected at most {expected} got {got}")]
    TooMany { expected: usize, got: usize },
}

impl Arity {
    pub fn new(required: usize, optional: usize, variadic: bool) -> Self {
        Arity {
            required,
            optional,
            variadic,
        }
    }

    /// Checks an actual argument count. Overflow beyond `required + optional`
    /// is only legal for variadic contracts.
    pub fn check(&self, got: usize) -> Result<(), ArityMismatch> {
        let Arity {
            required,
            optional,
            variadic,
        } = *self;

        if optional == 0 && !variadic {
            if got != required {
                return Err(ArityMismatch::Wrong {
                    expected: required,
                    got,
                });
            }
        } else if got < required {
            return Err(ArityMismatch::TooFew {
                expected: required,
                got,
            });
        } else if !variadic && got > required + optional {
            return Err(ArityMismatch::TooMany {
                expected: required + optional,
                got,
            });
        }
        Ok(())
    }
}
