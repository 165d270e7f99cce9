//! Key-value store for macro bindings
//!
//! Macros are the top-level `name = value` bindings. Values stay raw in the
//! store; `%name` references are resolved lazily at lookup time. Direct
//! reference chains (`a = %b`, `b = %c`) resolve transitively here; cycles
//! fail instead of looping. References nested inside lists or dicts are
//! handled by the binder's recursive resolution.

use crate::error::WeftError;
use crate::loader::ConfigSet;
use crate::value::{Origin, RawValue};
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct KeyValueStore {
    values: HashMap<String, (RawValue, Origin)>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the store from a merged config's macro bindings.
    /// Iteration follows declaration order, so the last write wins.
    pub fn from_config(config: &ConfigSet) -> Self {
        let mut store = Self::new();
        for binding in config.bindings() {
            if binding.is_macro() {
                store.set(&binding.param, binding.value.clone(), binding.origin.clone());
            }
        }
        store
    }

    /// Overwrites any previous value for `name`
    pub fn set(&mut self, name: &str, value: RawValue, origin: Origin) {
        self.values.insert(name.to_string(), (value, origin));
    }

    /// Single-step lookup; does not follow reference chains
    pub fn get(&self, name: &str) -> Result<&RawValue, WeftError> {
        self.values
            .get(name)
            .map(|(value, _)| value)
            .ok_or_else(|| WeftError::UnboundKey {
                name: name.to_string(),
            })
    }

    pub fn origin(&self, name: &str) -> Option<&Origin> {
        self.values.get(name).map(|(_, origin)| origin)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Follow direct `%ref` chains until a non-reference value.
    /// Fails with `CyclicReference` instead of looping.
    pub fn resolve_chain(&self, name: &str) -> Result<&RawValue, WeftError> {
        let mut chain = vec![name.to_string()];
        let mut current = self.get(name)?;
        while let RawValue::Ref(next) = current {
            if chain.iter().any(|seen| seen == next) {
                chain.push(next.clone());
                return Err(WeftError::CyclicReference {
                    chain: chain
                        .iter()
                        .map(|n| format!("%{}", n))
                        .collect::<Vec<_>>()
                        .join(" -> "),
                });
            }
            chain.push(next.clone());
            current = self.get(next)?;
        }
        Ok(current)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(|k| k.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn origin(line: usize) -> Origin {
        Origin::new("test.gin", line)
    }

    #[test]
    fn set_overwrites() {
        let mut store = KeyValueStore::new();
        store.set("x", RawValue::Int(1), origin(1));
        store.set("x", RawValue::Int(2), origin(2));
        assert_eq!(store.get("x").unwrap(), &RawValue::Int(2));
        assert_eq!(store.origin("x").unwrap().line, 2);
    }

    #[test]
    fn get_unbound_fails() {
        let store = KeyValueStore::new();
        let err = store.get("missing").unwrap_err();
        assert!(matches!(err, WeftError::UnboundKey { ref name } if name == "missing"));
    }

    #[test]
    fn chain_resolves_transitively() {
        let mut store = KeyValueStore::new();
        store.set("a", RawValue::Ref("b".to_string()), origin(1));
        store.set("b", RawValue::Ref("c".to_string()), origin(2));
        store.set("c", RawValue::Int(7), origin(3));
        assert_eq!(store.resolve_chain("a").unwrap(), &RawValue::Int(7));
    }

    #[test]
    fn chain_cycle_fails() {
        let mut store = KeyValueStore::new();
        store.set("a", RawValue::Ref("b".to_string()), origin(1));
        store.set("b", RawValue::Ref("a".to_string()), origin(2));
        let err = store.resolve_chain("a").unwrap_err();
        match err {
            WeftError::CyclicReference { chain } => {
                assert_eq!(chain, "%a -> %b -> %a");
            }
            other => panic!("expected cycle error, got {:?}", other),
        }
    }

    #[test]
    fn self_reference_fails() {
        let mut store = KeyValueStore::new();
        store.set("a", RawValue::Ref("a".to_string()), origin(1));
        assert!(matches!(
            store.resolve_chain("a").unwrap_err(),
            WeftError::CyclicReference { .. }
        ));
    }

    #[test]
    fn chain_through_unbound_fails() {
        let mut store = KeyValueStore::new();
        store.set("a", RawValue::Ref("missing".to_string()), origin(1));
        assert!(matches!(
            store.resolve_chain("a").unwrap_err(),
            WeftError::UnboundKey { .. }
        ));
    }
}
