//! Contract values: a closed set of variants with one uniform
//! check-and-wrap operation.
//!
//! A [`Contract`] either validates a value and hands it back unchanged
//! (flat, equality, instance-of contracts), or validates its shape and
//! returns a wrapped value that keeps checking later (function contracts,
//! and records/arrays containing them). Violations carry blame attribution
//! and the path from the contracted value to the failing check; see
//! [`blame::BlameContext`].

pub mod arity;
pub mod blame;
pub mod builder;
pub mod check;
pub mod constructor;
pub mod function;

use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use covenant_core::value::{Function, Value};

pub use arity::{Arity, ArityMismatch};
pub use blame::{BlameContext, FailureSink, TracingSink};
pub use builder::{fun, func, method, Spec};
pub use check::check_and_wrap;
pub use function::{FunctionContract, SignatureStyle};

/// Predicate used by flat contracts.
pub type Predicate = dyn Fn(&Value) -> bool;

/// The closed set of contract variants.
pub enum ContractKind {
    /// Accepts anything.
    Any,
    /// Accepts values satisfying a named predicate.
    Flat { name: String, predicate: Rc<Predicate> },
    /// Accepts exactly one value (identity for composites).
    Value(Value),
    /// Accepts instances of a constructor.
    InstanceOf(Function),
    /// Accepts objects whose listed fields satisfy their contracts.
    Record(IndexMap<String, Contract>),
    /// Accepts arrays whose elements all satisfy one contract.
    Array(Contract),
    /// Accepts callables and wraps them.
    Function(FunctionContract),
}

/// A contract: a shared variant plus per-use display name and optionality.
///
/// Cloning is cheap and never copies the variant itself.
#[derive(Clone)]
pub struct Contract {
    kind: Rc<ContractKind>,
    thing_name: Option<String>,
    optional: bool,
}

impl Contract {
    pub fn new(kind: ContractKind) -> Self {
        Contract {
            kind: Rc::new(kind),
            thing_name: None,
            optional: false,
        }
    }

    pub fn kind(&self) -> &ContractKind {
        &self.kind
    }

    /// Display name attached by `fun`/`method` or by [`named`](Self::named).
    pub fn thing_name(&self) -> Option<&str> {
        self.thing_name.as_deref()
    }

    pub fn is_optional(&self) -> bool {
        self.optional
    }

    pub fn is_any(&self) -> bool {
        matches!(*self.kind, ContractKind::Any)
    }

    pub fn as_function(&self) -> Option<&FunctionContract> {
        match &*self.kind {
            ContractKind::Function(fc) => Some(fc),
            _ => None,
        }
    }

    /// Copy of this contract carrying a display name.
    pub fn named(&self, name: impl Into<String>) -> Contract {
        Contract {
            thing_name: Some(name.into()),
            ..self.clone()
        }
    }

    /// Copy of this contract with a transformed function contract. Display
    /// name and optionality are kept; non-function contracts are returned
    /// unchanged.
    pub fn map_function(&self, f: impl FnOnce(&FunctionContract) -> FunctionContract) -> Contract {
        match self.as_function() {
            Some(fc) => Contract {
                kind: Rc::new(ContractKind::Function(f(fc))),
                ..self.clone()
            },
            None => self.clone(),
        }
    }
}

impl From<FunctionContract> for Contract {
    fn from(fc: FunctionContract) -> Self {
        Contract::new(ContractKind::Function(fc))
    }
}

impl fmt::Display for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.optional {
            f.write_str("optional(")?;
        }
        match &*self.kind {
            ContractKind::Any => f.write_str("Any")?,
            ContractKind::Flat { name, .. } => f.write_str(name)?,
            ContractKind::Value(v) => write!(f, "value({v})")?,
            ContractKind::InstanceOf(ctor) => {
                write!(f, "isA({})", ctor.name().unwrap_or("(anonymous)"))?
            }
            ContractKind::Record(fields) => {
                f.write_str("{")?;
                for (i, (name, c)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {c}")?;
                }
                f.write_str("}")?;
            }
            ContractKind::Array(elem) => write!(f, "[{elem}]")?,
            ContractKind::Function(fc) => write!(f, "{fc}")?,
        }
        if self.optional {
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Contract({self})")
    }
}

// ---------------------------------------------------------------------------
// Contract constructors
// ---------------------------------------------------------------------------

pub fn any() -> Contract {
    Contract::new(ContractKind::Any)
}

/// A flat contract from a named predicate.
pub fn pred(name: impl Into<String>, predicate: impl Fn(&Value) -> bool + 'static) -> Contract {
    Contract::new(ContractKind::Flat {
        name: name.into(),
        predicate: Rc::new(predicate),
    })
}

pub fn number() -> Contract {
    pred("Number", |v| matches!(v, Value::Number(_)))
}

pub fn integer() -> Contract {
    pred("Integer", |v| matches!(v, Value::Number(n) if n.fract() == 0.0))
}

pub fn string() -> Contract {
    pred("String", |v| matches!(v, Value::Str(_)))
}

pub fn boolean() -> Contract {
    pred("Boolean", |v| matches!(v, Value::Bool(_)))
}

/// Accepts exactly `expected`.
pub fn value(expected: Value) -> Contract {
    Contract::new(ContractKind::Value(expected))
}

/// Accepts instances of `ctor`.
pub fn is_a(ctor: Function) -> Contract {
    Contract::new(ContractKind::InstanceOf(ctor))
}

pub fn object<K: Into<String>>(fields: impl IntoIterator<Item = (K, Contract)>) -> Contract {
    Contract::new(ContractKind::Record(
        fields.into_iter().map(|(k, c)| (k.into(), c)).collect(),
    ))
}

pub fn array(element: Contract) -> Contract {
    Contract::new(ContractKind::Array(element))
}

/// Marks a contract optional: a missing (`undefined`) value passes, and in
/// argument position the argument may be omitted.
pub fn optional(contract: Contract) -> Contract {
    Contract {
        optional: true,
        ..contract
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_contract_display() {
        assert_eq!(number().to_string(), "Number");
        assert_eq!(optional(string()).to_string(), "optional(String)");
        assert_eq!(array(integer()).to_string(), "[Integer]");
        assert_eq!(value(Value::from(3)).to_string(), "value(3)");
    }

    #[test]
    fn test_record_display_keeps_field_order() {
        let c = object([("y", number()), ("x", string())]);
        assert_eq!(c.to_string(), "{y: Number, x: String}");
    }

    #[test]
    fn test_named_copies_without_mutating() {
        let base = number();
        let named = base.named("count");
        assert_eq!(named.thing_name(), Some("count"));
        assert_eq!(base.thing_name(), None);
        assert!(Rc::ptr_eq(&base.kind, &named.kind));
    }

    #[test]
    fn test_is_a_display_uses_constructor_name() {
        let ctor = Function::new("Point", |_, _| Ok(Value::Undefined));
        assert_eq!(is_a(ctor).to_string(), "isA(Point)");
    }

    #[test]
    fn test_map_function_ignores_non_functions() {
        let c = number().named("n");
        let mapped = c.map_function(|fc| fc.clone());
        assert!(Rc::ptr_eq(&c.kind, &mapped.kind));
    }
}
