//! Function contracts and the invocation wrapper.
//!
//! A [`FunctionContract`] describes a callable: positional argument
//! contracts (possibly optional), an optional extra-argument contract for
//! the overflow slice, a receiver contract and a result contract. Wrapping a
//! callable produces a proxy that, on every call:
//!
//! 1. derives a fresh [`BlameContext`] from the one captured at wrap time,
//! 2. validates the argument count, blaming the caller,
//! 3. checks the receiver, each positional argument and the extra arguments,
//!    blaming the caller,
//! 4. invokes the target with the checked (possibly wrapped) inputs,
//! 5. checks the result, blaming the callee.
//!
//! Descriptors are immutable; every mutator returns a new descriptor.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use covenant_core::error::RuntimeError;
use covenant_core::value::{Function, Value};
use covenant_core::violation::{ArgName, Frame};

use crate::config::ContractConfig;
use crate::contracts::arity::Arity;
use crate::contracts::blame::BlameContext;
use crate::contracts::check::check_and_wrap;
use crate::contracts::{any, constructor, Contract};

/// Which builder produced a descriptor; decides how it renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureStyle {
    /// `fn(Number, String -> Any)`
    Fn,
    /// `fun({x: Number} -> Any)`
    Fun,
    /// `method(this: T, {x: Number} -> Any)`
    Method,
}

impl SignatureStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            SignatureStyle::Fn => "fn",
            SignatureStyle::Fun => "fun",
            SignatureStyle::Method => "method",
        }
    }
}

/// Immutable description of a callable's expected shape.
#[derive(Clone)]
pub struct FunctionContract {
    style: SignatureStyle,
    argument_contracts: Vec<Contract>,
    extra_argument_contract: Option<Contract>,
    this_contract: Contract,
    result_contract: Contract,
    /// Set by [`constructs`](Self::constructs).
    prototype_fields: Option<IndexMap<String, Contract>>,
}

impl FunctionContract {
    /// Builds a descriptor. Callers go through [`func`](crate::contracts::func),
    /// [`fun`](crate::contracts::fun) or [`method`](crate::contracts::method),
    /// which validate the argument list first.
    pub(crate) fn new(style: SignatureStyle, argument_contracts: Vec<Contract>) -> Self {
        FunctionContract {
            style,
            argument_contracts,
            extra_argument_contract: None,
            this_contract: any(),
            result_contract: any(),
            prototype_fields: None,
        }
    }

    pub(crate) fn with_style(&self, style: SignatureStyle) -> Self {
        FunctionContract {
            style,
            ..self.clone()
        }
    }

    pub fn style(&self) -> SignatureStyle {
        self.style
    }

    pub fn argument_contracts(&self) -> &[Contract] {
        &self.argument_contracts
    }

    pub fn extra_argument_contract(&self) -> Option<&Contract> {
        self.extra_argument_contract.as_ref()
    }

    pub fn this_contract(&self) -> &Contract {
        &self.this_contract
    }

    pub fn result_contract(&self) -> &Contract {
        &self.result_contract
    }

    pub fn prototype_fields(&self) -> Option<&IndexMap<String, Contract>> {
        self.prototype_fields.as_ref()
    }

    /// Accepted argument counts.
    pub fn arity(&self) -> Arity {
        let optional = self
            .argument_contracts
            .iter()
            .filter(|c| c.is_optional())
            .count();
        Arity::new(
            self.argument_contracts.len() - optional,
            optional,
            self.extra_argument_contract.is_some(),
        )
    }

    // -----------------------------------------------------------------------
    // Mutators
    // -----------------------------------------------------------------------

    pub fn returns(&self, contract: Contract) -> Self {
        FunctionContract {
            result_contract: contract,
            ..self.clone()
        }
    }

    pub fn this_arg(&self, contract: Contract) -> Self {
        FunctionContract {
            this_contract: contract,
            ..self.clone()
        }
    }

    /// Accepts arguments beyond the positional ones; `contract` sees them as
    /// a single array.
    pub fn extra_args(&self, contract: Contract) -> Self {
        FunctionContract {
            extra_argument_contract: Some(contract),
            ..self.clone()
        }
    }

    /// Accepts any number of extra arguments without checking them.
    pub fn extra_args_any(&self) -> Self {
        self.extra_args(any())
    }

    /// Turns this into a constructor contract. Each named prototype field is
    /// wrapped with its contract; method contracts whose receiver is left as
    /// `Any` are narrowed to instances of the constructor.
    pub fn constructs<K: Into<String>>(
        &self,
        fields: impl IntoIterator<Item = (K, Contract)>,
    ) -> Self {
        FunctionContract {
            prototype_fields: Some(fields.into_iter().map(|(k, c)| (k.into(), c)).collect()),
            ..self.clone()
        }
    }

    // -----------------------------------------------------------------------
    // Wrapping
    // -----------------------------------------------------------------------

    /// Wraps `target` with the default configuration.
    pub fn wrap(&self, target: &Function) -> Result<Function, RuntimeError> {
        self.wrap_with(target, &ContractConfig::default())
    }

    /// Wraps `target`. Constructor contracts validate the prototype eagerly
    /// and report missing fields as a
    /// [`UsageError`](covenant_core::error::UsageError).
    pub fn wrap_with(
        &self,
        target: &Function,
        config: &ContractConfig,
    ) -> Result<Function, RuntimeError> {
        if let Some(fields) = &self.prototype_fields {
            constructor::validate_prototype(fields, target, None)?;
        }
        let contract = Contract::from(self.clone());
        match contract.wrap_with(Value::Function(target.clone()), None, config)? {
            Value::Function(wrapped) => Ok(wrapped),
            other => Err(RuntimeError::NotCallable {
                got: other.to_string(),
            }),
        }
    }

    /// Dispatch entry: requires a callable, then wraps it.
    pub(crate) fn check_and_wrap(
        &self,
        thing_name: Option<&str>,
        value: Value,
        ctx: &mut BlameContext,
    ) -> Result<Value, RuntimeError> {
        let Value::Function(target) = value else {
            return Err(ctx.fail(
                self,
                format!("expected a function, but got {}", ctx.render(&value)),
            ));
        };
        if let Some(fields) = &self.prototype_fields {
            return constructor::wrap_constructor(self, fields, thing_name, target, ctx)
                .map(Value::Function);
        }
        Ok(Value::Function(self.wrap_function(thing_name, target, ctx)))
    }

    fn wrap_function(
        &self,
        thing_name: Option<&str>,
        target: Function,
        ctx: &BlameContext,
    ) -> Function {
        let base = capture_context(ctx, &target);
        tracing::debug!(
            name = base.thing_name().unwrap_or("(anonymous)"),
            contract = %self,
            "wrapping function"
        );

        let contract = self.clone();
        let own_name = thing_name.map(str::to_string);
        let name = target.name().map(str::to_string);
        let prototype = target.prototype().cloned();

        Function::with_prototype(name, prototype, move |this, args| {
            let mut here = base.clone();
            if let Some(name) = &own_name {
                here.set_thing_name(Some(name.clone()));
            }
            let (this, args) = contract.check_inputs(this, args, &mut here)?;
            let result = target.call(&this, &args)?;
            contract.check_result(result, &mut here)
        })
    }

    /// Arity, receiver, positional and extra-argument checks, all blaming
    /// the caller. Returns the checked receiver and argument list.
    pub(crate) fn check_inputs(
        &self,
        this: &Value,
        args: &[Value],
        ctx: &mut BlameContext,
    ) -> Result<(Value, Vec<Value>), RuntimeError> {
        let arity = self.arity();
        ctx.reversed(|ctx| {
            arity
                .check(args.len())
                .map_err(|mismatch| ctx.fail(self, mismatch.to_string()))
        })?;

        let this = ctx.nested(Frame::Receiver, true, |ctx| {
            check_and_wrap(&self.this_contract, this.clone(), ctx)
        })?;

        let mut checked = Vec::with_capacity(args.len());
        for (i, (contract, arg)) in self.argument_contracts.iter().zip(args).enumerate() {
            let name = match contract.thing_name() {
                Some(name) => ArgName::Named(name.to_string()),
                None => ArgName::Index(i),
            };
            checked.push(ctx.nested(Frame::Argument(name), true, |ctx| {
                check_and_wrap(contract, arg.clone(), ctx)
            })?);
        }

        if let Some(extra) = &self.extra_argument_contract {
            let rest = args
                .get(self.argument_contracts.len()..)
                .unwrap_or_default()
                .to_vec();
            let rest = ctx.nested(Frame::ExtraArguments, true, |ctx| {
                check_and_wrap(extra, Value::array(rest), ctx)
            })?;
            match rest {
                Value::Array(items) => checked.extend(items.iter().cloned()),
                other => checked.push(other),
            }
        }

        Ok((this, checked))
    }

    /// Result check, blaming the callee.
    pub(crate) fn check_result(
        &self,
        result: Value,
        ctx: &mut BlameContext,
    ) -> Result<Value, RuntimeError> {
        ctx.nested(Frame::Result, false, |ctx| {
            check_and_wrap(&self.result_contract, result, ctx)
        })
    }
}

/// Context captured at wrap time; falls back to the target's own name.
pub(crate) fn capture_context(ctx: &BlameContext, target: &Function) -> BlameContext {
    let mut base = ctx.clone();
    if base.thing_name().is_none() {
        base.set_thing_name(target.name().map(str::to_string));
    }
    base
}

impl fmt::Display for FunctionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::with_capacity(self.argument_contracts.len() + 2);
        if !self.this_contract.is_any() {
            parts.push(format!("this: {}", self.this_contract));
        }
        for contract in &self.argument_contracts {
            parts.push(match (self.style, contract.thing_name()) {
                (SignatureStyle::Fn, _) | (_, None) => contract.to_string(),
                (_, Some(name)) => format!("{{{name}: {contract}}}"),
            });
        }
        if let Some(extra) = &self.extra_argument_contract {
            parts.push(format!("...{extra}"));
        }
        write!(
            f,
            "{}({} -> {})",
            self.style.as_str(),
            parts.join(", "),
            self.result_contract
        )
    }
}

impl fmt::Debug for FunctionContract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FunctionContract({self})")
    }
}
