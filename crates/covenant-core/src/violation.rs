//! Structured contract-violation diagnostics.
//!
//! A [`ContractViolation`] records who is at fault ([`Blame`]), where inside
//! the contracted value the failure happened (a path of [`Frame`]s), what was
//! expected, and the full contract for context.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The party held responsible for a violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Blame {
    /// The code that supplied the contracted value (the implementer).
    Callee,
    /// The code that used the contracted value (the client).
    Caller,
}

impl Blame {
    /// Maps the blame context's fault-direction flag to a party.
    pub fn from_flag(blame_me: bool) -> Self {
        if blame_me {
            Blame::Callee
        } else {
            Blame::Caller
        }
    }
}

impl fmt::Display for Blame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Blame::Callee => f.write_str("callee"),
            Blame::Caller => f.write_str("caller"),
        }
    }
}

/// How an argument is identified in a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArgName {
    /// Declared name from `fun`/`method`.
    Named(String),
    /// Zero-based position.
    Index(usize),
}

/// One step of the path from the contracted value to the failing check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Frame {
    Receiver,
    Argument(ArgName),
    ExtraArguments,
    Result,
    Field(String),
    /// Zero-based array element.
    Element(usize),
    /// A prototype method wrapped by a constructor contract.
    Method(String),
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Receiver => f.write_str("the `this` argument"),
            Frame::Argument(ArgName::Named(name)) => write!(f, "argument `{name}`"),
            Frame::Argument(ArgName::Index(i)) => write!(f, "the {} argument", ordinal(i + 1)),
            Frame::ExtraArguments => f.write_str("the extra arguments"),
            Frame::Result => f.write_str("the result"),
            Frame::Field(name) => write!(f, "field `{name}`"),
            Frame::Element(i) => write!(f, "the {} element", ordinal(i + 1)),
            Frame::Method(name) => write!(f, "method `{name}`"),
        }
    }
}

/// English ordinal for a one-based position: `1st`, `2nd`, `11th`, `23rd`.
pub fn ordinal(n: usize) -> String {
    let suffix = match (n % 10, n % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{n}{suffix}")
}

/// A contract violation with full blame attribution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractViolation {
    /// Which party broke the contract.
    pub blame: Blame,
    /// Display name of the contracted value, when known.
    pub thing_name: Option<String>,
    /// Path from the contracted value down to the failing check.
    pub stack: Vec<Frame>,
    /// What went wrong, e.g. `expected Number, but got "x"`.
    pub message: String,
    /// The contract whose check failed.
    pub contract: String,
    /// The root contract the value was wrapped with.
    pub full_contract: String,
}

impl ContractViolation {
    /// Renders the frame path, outermost first.
    pub fn path(&self) -> String {
        self.stack
            .iter()
            .map(|frame| frame.to_string())
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

impl fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.thing_name {
            Some(name) => writeln!(f, "contract violation in `{name}`: {}", self.message)?,
            None => writeln!(f, "contract violation: {}", self.message)?,
        }
        writeln!(f, "  blame: {}", self.blame)?;
        if !self.stack.is_empty() {
            writeln!(f, "  at: {}", self.path())?;
        }
        writeln!(f, "  contract: {}", self.contract)?;
        write!(f, "  full contract: {}", self.full_contract)
    }
}

impl std::error::Error for ContractViolation {}
