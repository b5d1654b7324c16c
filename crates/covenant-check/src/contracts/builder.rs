//! Builder API: `fn`, `fun` and `method`.
//!
//! All three validate eagerly. A malformed argument spec or a required
//! argument following an optional one is a [`UsageError`] before any call
//! can happen.

use indexmap::IndexMap;

use covenant_core::error::UsageError;
use covenant_core::value::Value;

use crate::contracts::function::{FunctionContract, SignatureStyle};
use crate::contracts::{object, value, Contract};

/// An argument spec as handed to `fun`/`method`: normally a single-entry
/// map from argument name to contract.
#[derive(Debug, Clone)]
pub enum Spec {
    Contract(Contract),
    Map(IndexMap<String, Spec>),
    /// Plain host data.
    Value(Value),
}

impl Spec {
    /// The usual one-entry spec `{name: contract}`.
    pub fn named(name: impl Into<String>, spec: impl Into<Spec>) -> Spec {
        let mut map = IndexMap::new();
        map.insert(name.into(), spec.into());
        Spec::Map(map)
    }

    /// Converts the spec into a contract: contracts pass through, maps and
    /// host objects become record contracts, other host values become
    /// equality contracts.
    pub fn into_contract(self) -> Contract {
        match self {
            Spec::Contract(c) => c,
            Spec::Map(map) => object(map.into_iter().map(|(k, s)| (k, s.into_contract()))),
            Spec::Value(Value::Object(obj)) => object(
                obj.entries()
                    .into_iter()
                    .map(|(k, v)| (k, Spec::Value(v).into_contract())),
            ),
            Spec::Value(v) => value(v),
        }
    }

    /// Splits a one-entry spec into its name and contract spec.
    fn into_single_field(self, who: &str, position: usize) -> Result<(String, Spec), UsageError> {
        let entries: Vec<(String, Spec)> = match self {
            Spec::Contract(c) => {
                return Err(UsageError::ArgumentSpecIsContract {
                    who: who.to_string(),
                    position,
                    contract: c.to_string(),
                })
            }
            Spec::Map(map) => map.into_iter().collect(),
            Spec::Value(Value::Object(obj)) => obj
                .entries()
                .into_iter()
                .map(|(k, v)| (k, Spec::Value(v)))
                .collect(),
            Spec::Value(other) => {
                return Err(UsageError::ArgumentSpecNotObject {
                    who: who.to_string(),
                    position,
                    got: other.to_string(),
                })
            }
        };

        let count = entries.len();
        match <[(String, Spec); 1]>::try_from(entries) {
            Ok([entry]) => Ok(entry),
            Err(_) => Err(UsageError::ArgumentSpecKeyCount {
                who: who.to_string(),
                position,
                count,
            }),
        }
    }
}

impl From<Contract> for Spec {
    fn from(c: Contract) -> Self {
        Spec::Contract(c)
    }
}

impl From<FunctionContract> for Spec {
    fn from(fc: FunctionContract) -> Self {
        Spec::Contract(fc.into())
    }
}

impl From<Value> for Spec {
    fn from(v: Value) -> Self {
        Spec::Value(v)
    }
}

/// Rejects a required contract that follows an optional one.
fn check_optional_ordering(who: &str, contracts: &[Contract]) -> Result<(), UsageError> {
    let mut optionals_only = false;
    for (position, contract) in contracts.iter().enumerate() {
        if optionals_only && !contract.is_optional() {
            return Err(UsageError::RequiredAfterOptional {
                who: who.to_string(),
                position,
            });
        }
        optionals_only |= contract.is_optional();
    }
    Ok(())
}

/// `fn(contract, ...)`: positional, unnamed argument contracts.
#[doc(alias = "fn")]
pub fn func(
    contracts: impl IntoIterator<Item = Contract>,
) -> Result<FunctionContract, UsageError> {
    let contracts: Vec<Contract> = contracts.into_iter().collect();
    check_optional_ordering("fn", &contracts)?;
    Ok(FunctionContract::new(SignatureStyle::Fn, contracts))
}

fn named_arguments(
    who: &str,
    specs: impl IntoIterator<Item = Spec>,
) -> Result<Vec<Contract>, UsageError> {
    let fields = specs
        .into_iter()
        .enumerate()
        .map(|(position, spec)| spec.into_single_field(who, position))
        .collect::<Result<Vec<_>, _>>()?;

    let contracts: Vec<Contract> = fields
        .into_iter()
        .map(|(name, spec)| spec.into_contract().named(name))
        .collect();
    check_optional_ordering(who, &contracts)?;
    Ok(contracts)
}

/// `fun({name: contract}, ...)`: like `fn`, with argument names that show
/// up in signatures and blame paths.
pub fn fun(specs: impl IntoIterator<Item = Spec>) -> Result<FunctionContract, UsageError> {
    let contracts = named_arguments("fun", specs)?;
    Ok(FunctionContract::new(SignatureStyle::Fun, contracts))
}

/// `method(receiver, {name: contract}, ...)`: `fun` with a receiver
/// contract. The receiver must already be a contract.
pub fn method(
    receiver: impl Into<Spec>,
    specs: impl IntoIterator<Item = Spec>,
) -> Result<FunctionContract, UsageError> {
    let receiver = match receiver.into() {
        Spec::Contract(c) => c,
        Spec::Map(map) => {
            return Err(UsageError::ReceiverNotContract {
                got: format!("a map with keys [{}]", map.keys().cloned().collect::<Vec<_>>().join(", ")),
            })
        }
        Spec::Value(v) => return Err(UsageError::ReceiverNotContract { got: v.to_string() }),
    };
    let contracts = named_arguments("method", specs)?;
    Ok(FunctionContract::new(SignatureStyle::Fun, contracts)
        .this_arg(receiver)
        .with_style(SignatureStyle::Method))
}
