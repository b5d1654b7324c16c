//! Higher-order function contracts with blame attribution.
//!
//! Contracts are built with [`contracts::func`], [`contracts::fun`] and
//! [`contracts::method`], refined with `returns`, `this_arg`, `extra_args`
//! and `constructs`, and applied with [`contracts::FunctionContract::wrap`]
//! or [`contracts::Contract::wrap`]. A wrapped function checks its inputs
//! on every call, blaming the caller, and its result, blaming itself.
//!
//! # Modules
//!
//! - [`config`] -- Runtime switches and the violation sink
//! - [`contracts`] -- Contract variants, builders and the wrappers

pub mod config;
pub mod contracts;

pub use config::ContractConfig;
pub use contracts::{
    fun, func, method, Arity, BlameContext, Contract, FailureSink, FunctionContract, Spec,
    TracingSink,
};
