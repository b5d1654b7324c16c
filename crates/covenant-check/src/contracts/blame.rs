//! Per-invocation blame tracking.
//!
//! A [`BlameContext`] threads three things through nested checks: the frame
//! path, the display name of the contracted value, and the fault-direction
//! flag. Cloning copies the frame stack, so sibling checks never observe each
//! other's frames.
//!
//! The flag starts out blaming the provider of the contracted value. Checks on
//! inputs run with the flag reversed so that they blame the caller; every
//! reversal is undone on the way out, whether or not the check failed.

use std::fmt;
use std::rc::Rc;

use smallvec::SmallVec;

use covenant_core::error::RuntimeError;
use covenant_core::value::Value;
use covenant_core::violation::{Blame, ContractViolation, Frame};

use crate::config::ContractConfig;

/// The ambient `fail` sink: observes every violation as it is raised.
pub trait FailureSink {
    fn report(&self, violation: &ContractViolation);
}

/// Default sink: logs the violation and lets the error propagate.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl FailureSink for TracingSink {
    fn report(&self, violation: &ContractViolation) {
        tracing::warn!(
            blame = %violation.blame,
            path = %violation.path(),
            contract = %violation.contract,
            "{}",
            violation.message
        );
    }
}

#[derive(Clone)]
pub struct BlameContext {
    stack: SmallVec<[Frame; 4]>,
    thing_name: Option<String>,
    blame_me: bool,
    full_contract: Rc<str>,
    stringify_depth: usize,
    sink: Rc<dyn FailureSink>,
}

impl BlameContext {
    /// Root context for wrapping a value with `full_contract`. The provider
    /// of the value is blamed until a check reverses direction.
    pub fn new(full_contract: &str, thing_name: Option<String>, config: &ContractConfig) -> Self {
        BlameContext {
            stack: SmallVec::new(),
            thing_name,
            blame_me: true,
            full_contract: Rc::from(full_contract),
            stringify_depth: config.stringify_depth,
            sink: Rc::clone(&config.sink),
        }
    }

    pub fn thing_name(&self) -> Option<&str> {
        self.thing_name.as_deref()
    }

    pub fn set_thing_name(&mut self, name: Option<String>) {
        self.thing_name = name;
    }

    /// The party a failure raised right now would blame.
    pub fn blame(&self) -> Blame {
        Blame::from_flag(self.blame_me)
    }

    pub fn stack(&self) -> &[Frame] {
        &self.stack
    }

    /// Runs `f` with the fault direction reversed, restoring it afterwards
    /// regardless of the outcome.
    pub fn reversed<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        self.blame_me = !self.blame_me;
        let result = f(self);
        self.blame_me = !self.blame_me;
        result
    }

    /// Runs a nested check under `frame`, optionally with reversed fault
    /// direction. The frame is popped and the direction restored even when
    /// the check fails.
    pub fn nested<T>(
        &mut self,
        frame: Frame,
        reverse: bool,
        f: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        tracing::trace!(frame = %frame, depth = self.stack.len(), "entering contract frame");
        self.stack.push(frame);
        let result = if reverse { self.reversed(f) } else { f(self) };
        self.stack.pop();
        result
    }

    /// Renders a value for a violation message.
    pub fn render(&self, value: &Value) -> String {
        value.stringify(self.stringify_depth)
    }

    /// Builds a violation at the current position, reports it to the sink
    /// and returns the error to propagate.
    pub fn fail(&self, contract: &dyn fmt::Display, message: impl Into<String>) -> RuntimeError {
        let violation = ContractViolation {
            blame: self.blame(),
            thing_name: self.thing_name.clone(),
            stack: self.stack.to_vec(),
            message: message.into(),
            contract: contract.to_string(),
            full_contract: self.full_contract.to_string(),
        };
        self.sink.report(&violation);
        RuntimeError::from(violation)
    }

    /// Fails with the standard "expected X, but got V" message.
    pub fn fail_expected(&self, contract: &dyn fmt::Display, value: &Value) -> RuntimeError {
        self.fail(
            contract,
            format!("expected {contract}, but got {}", self.render(value)),
        )
    }
}

impl fmt::Debug for BlameContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlameContext")
            .field("stack", &self.stack)
            .field("thing_name", &self.thing_name)
            .field("blame_me", &self.blame_me)
            .field("full_contract", &self.full_contract)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use covenant_core::violation::ArgName;

    #[derive(Default)]
    struct Recording(RefCell<Vec<ContractViolation>>);

    impl FailureSink for Recording {
        fn report(&self, violation: &ContractViolation) {
            self.0.borrow_mut().push(violation.clone());
        }
    }

    fn context_with(sink: Rc<Recording>) -> BlameContext {
        let config = ContractConfig::default().with_sink(sink);
        BlameContext::new("fn(Number -> Number)", Some("f".into()), &config)
    }

    #[test]
    fn test_reversal_is_paired_on_failure() {
        let mut ctx = context_with(Rc::default());
        assert_eq!(ctx.blame(), Blame::Callee);

        let result: Result<(), RuntimeError> = ctx.nested(
            Frame::Argument(ArgName::Index(0)),
            true,
            |ctx| {
                assert_eq!(ctx.blame(), Blame::Caller);
                Err(ctx.fail(&"Number", "nope"))
            },
        );
        assert!(result.is_err());
        assert_eq!(ctx.blame(), Blame::Callee);
        assert!(ctx.stack().is_empty());
    }

    #[test]
    fn test_double_reversal_restores_direction() {
        let mut ctx = context_with(Rc::default());
        ctx.reversed(|ctx| ctx.reversed(|ctx| assert_eq!(ctx.blame(), Blame::Callee)));
        assert_eq!(ctx.blame(), Blame::Callee);
    }

    #[test]
    fn test_clones_do_not_share_frames() {
        let mut outer = context_with(Rc::default());
        let snapshot = outer.clone();
        outer
            .nested(Frame::Result, false, |ctx| {
                assert_eq!(ctx.stack(), &[Frame::Result]);
                Ok(())
            })
            .unwrap();
        outer.stack.push(Frame::Receiver);
        assert!(snapshot.stack().is_empty());
    }

    #[test]
    fn test_fail_reports_to_sink() {
        let sink = Rc::new(Recording::default());
        let mut ctx = context_with(Rc::clone(&sink));
        let err = ctx
            .nested(Frame::Result, false, |ctx| {
                Err::<(), _>(ctx.fail_expected(&"Number", &Value::from("x")))
            })
            .unwrap_err();

        let violation = err.as_violation().unwrap();
        assert_eq!(violation.blame, Blame::Callee);
        assert_eq!(violation.stack, vec![Frame::Result]);
        assert_eq!(violation.message, "expected Number, but got \"x\"");
        assert_eq!(violation.full_contract, "fn(Number -> Number)");
        assert_eq!(sink.0.borrow().len(), 1);
    }
}
