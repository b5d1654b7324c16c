//! Runtime configuration for contract checking.
//!
//! [`ContractConfig::default`] checks everything and reports violations
//! through [`TracingSink`]. [`ContractConfig::from_env`] reads:
//!
//! - `COVENANT_CONTRACTS`: `off`, `0`, `false` or `no` turn wrapping off.
//! - `COVENANT_STRINGIFY_DEPTH`: nesting depth for values in messages.

use std::fmt;
use std::rc::Rc;

use covenant_core::value::DEFAULT_STRINGIFY_DEPTH;

use crate::contracts::blame::{FailureSink, TracingSink};

/// Controls how contracts are applied.
#[derive(Clone)]
pub struct ContractConfig {
    /// When false, `wrap` hands values back untouched. Build-time usage
    /// checks still run.
    pub enabled: bool,
    /// Nesting depth when rendering offending values. Default: 3.
    pub stringify_depth: usize,
    /// Receives every violation before the error unwinds.
    pub sink: Rc<dyn FailureSink>,
}

impl Default for ContractConfig {
    fn default() -> Self {
        ContractConfig {
            enabled: true,
            stringify_depth: DEFAULT_STRINGIFY_DEPTH,
            sink: Rc::new(TracingSink),
        }
    }
}

impl ContractConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ContractConfig::default();
        if let Some(flag) = lookup("COVENANT_CONTRACTS") {
            config.enabled = !matches!(
                flag.trim().to_ascii_lowercase().as_str(),
                "off" | "0" | "false" | "no"
            );
        }
        if let Some(depth) = lookup("COVENANT_STRINGIFY_DEPTH") {
            if let Ok(depth) = depth.trim().parse() {
                config.stringify_depth = depth;
            }
        }
        config
    }

    pub fn with_sink(mut self, sink: Rc<dyn FailureSink>) -> Self {
        self.sink = sink;
        self
    }
}

impl fmt::Debug for ContractConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContractConfig")
            .field("enabled", &self.enabled)
            .field("stringify_depth", &self.stringify_depth)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ContractConfig::default();
        assert!(config.enabled);
        assert_eq!(config.stringify_depth, 3);
    }

    #[test]
    fn test_contracts_can_be_switched_off() {
        for flag in ["off", "0", "FALSE", " no "] {
            let config = ContractConfig::from_lookup(lookup(&[("COVENANT_CONTRACTS", flag)]));
            assert!(!config.enabled, "flag {flag:?} should disable");
        }
        let config = ContractConfig::from_lookup(lookup(&[("COVENANT_CONTRACTS", "on")]));
        assert!(config.enabled);
    }

    #[test]
    fn test_stringify_depth_parsing() {
        let config = ContractConfig::from_lookup(lookup(&[("COVENANT_STRINGIFY_DEPTH", "5")]));
        assert_eq!(config.stringify_depth, 5);
        let config = ContractConfig::from_lookup(lookup(&[("COVENANT_STRINGIFY_DEPTH", "deep")]));
        assert_eq!(config.stringify_depth, 3);
    }
}
