//! The check-and-wrap dispatch primitive and the root wrapping API.
//!
//! [`check_and_wrap`] validates a value against any contract variant and
//! returns the value to use in its place: the same value for flat checks, a
//! wrapped proxy for function contracts, or a copy of a record/array whose
//! members were wrapped.

use covenant_core::error::RuntimeError;
use covenant_core::value::Value;
use covenant_core::violation::Frame;
use indexmap::IndexMap;

use crate::config::ContractConfig;
use crate::contracts::blame::BlameContext;
use crate::contracts::{Contract, ContractKind};

/// Checks `value` against `contract` at the current position of `ctx`.
pub fn check_and_wrap(
    contract: &Contract,
    value: Value,
    ctx: &mut BlameContext,
) -> Result<Value, RuntimeError> {
    if contract.is_optional() && value.is_undefined() {
        return Ok(value);
    }

    match contract.kind() {
        ContractKind::Any => Ok(value),
        ContractKind::Flat { predicate, .. } => {
            if predicate(&value) {
                Ok(value)
            } else {
                Err(ctx.fail_expected(contract, &value))
            }
        }
        ContractKind::Value(expected) => {
            if value.same(expected) {
                Ok(value)
            } else {
                Err(ctx.fail_expected(contract, &value))
            }
        }
        ContractKind::InstanceOf(ctor) => {
            if value.instance_of(ctor) {
                Ok(value)
            } else {
                Err(ctx.fail_expected(contract, &value))
            }
        }
        ContractKind::Record(fields) => check_record(contract, fields, value, ctx),
        ContractKind::Array(element) => check_array(contract, element, value, ctx),
        ContractKind::Function(fc) => fc.check_and_wrap(contract.thing_name(), value, ctx),
    }
}

fn check_record(
    contract: &Contract,
    fields: &IndexMap<String, Contract>,
    value: Value,
    ctx: &mut BlameContext,
) -> Result<Value, RuntimeError> {
    let Value::Object(obj) = &value else {
        return Err(ctx.fail_expected(contract, &value));
    };

    let mut replaced = Vec::new();
    for (name, field_contract) in fields {
        let current = obj.get(name).unwrap_or(Value::Undefined);
        let checked = ctx.nested(Frame::Field(name.clone()), false, |ctx| {
            check_and_wrap(field_contract, current.clone(), ctx)
        })?;
        if !checked.same(&current) {
            replaced.push((name.clone(), checked));
        }
    }

    if replaced.is_empty() {
        return Ok(value);
    }
    let copy = obj.shallow_copy();
    for (name, checked) in replaced {
        copy.set(name, checked);
    }
    Ok(Value::Object(copy))
}

fn check_array(
    contract: &Contract,
    element: &Contract,
    value: Value,
    ctx: &mut BlameContext,
) -> Result<Value, RuntimeError> {
    let Value::Array(items) = &value else {
        return Err(ctx.fail_expected(contract, &value));
    };

    let mut changed = false;
    let mut checked = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let result = ctx.nested(Frame::Element(i), false, |ctx| {
            check_and_wrap(element, item.clone(), ctx)
        })?;
        changed |= !result.same(item);
        checked.push(result);
    }

    Ok(if changed { Value::array(checked) } else { value })
}

impl Contract {
    /// Checks `value` with the default configuration.
    pub fn check(&self, value: Value) -> Result<Value, RuntimeError> {
        self.wrap_with(value, None, &ContractConfig::default())
    }

    /// Wraps `value` under a display name with the default configuration.
    pub fn wrap(&self, value: Value, name: &str) -> Result<Value, RuntimeError> {
        self.wrap_with(value, Some(name), &ContractConfig::default())
    }

    /// Wraps `value` in a fresh root blame context. Disabled configurations
    /// return the value untouched.
    pub fn wrap_with(
        &self,
        value: Value,
        name: Option<&str>,
        config: &ContractConfig,
    ) -> Result<Value, RuntimeError> {
        if !config.enabled {
            tracing::debug!(contract = %self, "contracts disabled, skipping wrap");
            return Ok(value);
        }
        let mut ctx = BlameContext::new(&self.to_string(), name.map(str::to_string), config);
        check_and_wrap(self, value, &mut ctx)
    }
}
