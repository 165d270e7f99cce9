//! Object binder
//!
//! `Resolver` ties the pieces together: it gathers the parameter bindings
//! for a constructor, validates them against the declared signature,
//! resolves every value recursively (literal passthrough, `%name` through
//! the key-value store, nested `@Class()` through the singleton registry),
//! and invokes the registered builder with typed argument accessors.
//!
//! The resolver also keeps the operative set: every binding a run actually
//! consumed, renderable afterwards for experiment logs.

use crate::builders::FactoryTable;
use crate::components::Component;
use crate::error::WeftError;
use crate::loader::ConfigSet;
use crate::registry::SingletonRegistry;
use crate::store::KeyValueStore;
use crate::value::{Origin, RawValue};
use dashmap::DashSet;
use std::collections::BTreeMap;
use tracing::debug;

/// A fully resolved parameter value
#[derive(Debug, Clone)]
pub enum Resolved {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Resolved>),
    Dict(BTreeMap<String, Resolved>),
    Object(Component),
}

impl Resolved {
    pub fn type_name(&self) -> &'static str {
        match self {
            Resolved::None => "None",
            Resolved::Bool(_) => "bool",
            Resolved::Int(_) => "int",
            Resolved::Float(_) => "float",
            Resolved::Str(_) => "string",
            Resolved::List(_) => "list",
            Resolved::Dict(_) => "dict",
            Resolved::Object(component) => component.kind(),
        }
    }
}

/// Convert a raw value to JSON for hyperparameter dumps.
/// References and calls render as their document spelling.
pub fn raw_to_json(value: &RawValue) -> serde_json::Value {
    match value {
        RawValue::None => serde_json::Value::Null,
        RawValue::Bool(b) => serde_json::Value::Bool(*b),
        RawValue::Int(i) => serde_json::Value::from(*i),
        RawValue::Float(x) => serde_json::Number::from_f64(*x)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        RawValue::Str(s) => serde_json::Value::String(s.clone()),
        RawValue::List(items) => {
            serde_json::Value::Array(items.iter().map(raw_to_json).collect())
        }
        RawValue::Dict(entries) => serde_json::Value::Object(
            entries
                .iter()
                .map(|(key, value)| (key.clone(), raw_to_json(value)))
                .collect(),
        ),
        RawValue::Ref(_) | RawValue::Call(_) => serde_json::Value::String(value.to_string()),
    }
}

/// One gathered (still unresolved) constructor argument
#[derive(Debug, Clone)]
pub struct RawArg {
    pub value: RawValue,
    pub origin: Origin,
    /// Winning binding key (`Class.param` or `scope/Class.param`)
    pub key: String,
}

/// The raw bindings gathered for one constructor invocation
#[derive(Debug, Clone)]
pub struct RawArgs {
    pub class: String,
    pub values: BTreeMap<String, RawArg>,
}

impl RawArgs {
    pub fn get(&self, param: &str) -> Option<&RawValue> {
        self.values.get(param).map(|arg| &arg.value)
    }

    /// Dict key list for a parameter, if it is bound to a dict literal
    pub fn dict_keys(&self, param: &str) -> Option<Vec<&str>> {
        match self.get(param) {
            Some(RawValue::Dict(entries)) => {
                Some(entries.iter().map(|(key, _)| key.as_str()).collect())
            }
            _ => None,
        }
    }
}

/// Gather the bindings for `(class, scope)`: unscoped first, then the
/// scope's own bindings override per parameter.
pub(crate) fn gather_raw(config: &ConfigSet, class: &str, scope: Option<&str>) -> RawArgs {
    let mut values: BTreeMap<String, RawArg> = BTreeMap::new();
    for binding in config.bindings() {
        if binding.class.as_deref() == Some(class) && binding.scope.is_none() {
            values.insert(
                binding.param.clone(),
                RawArg {
                    value: binding.value.clone(),
                    origin: binding.origin.clone(),
                    key: binding.key(),
                },
            );
        }
    }
    if let Some(scope) = scope {
        for binding in config.bindings() {
            if binding.class.as_deref() == Some(class) && binding.scope.as_deref() == Some(scope) {
                values.insert(
                    binding.param.clone(),
                    RawArg {
                        value: binding.value.clone(),
                        origin: binding.origin.clone(),
                        key: binding.key(),
                    },
                );
            }
        }
    }
    RawArgs {
        class: class.to_string(),
        values,
    }
}

/// Resolved constructor arguments with typed accessors
///
/// Accessors return `ParameterType` / `MissingRequiredParameter` errors
/// naming the class and parameter, so builders stay declarative.
pub struct BoundArgs {
    class: String,
    values: BTreeMap<String, Resolved>,
}

impl BoundArgs {
    pub fn new(class: impl Into<String>, values: BTreeMap<String, Resolved>) -> Self {
        Self {
            class: class.into(),
            values,
        }
    }

    pub fn class(&self) -> &str {
        &self.class
    }

    pub fn get(&self, param: &str) -> Option<&Resolved> {
        self.values.get(param)
    }

    pub fn require(&self, param: &str) -> Result<&Resolved, WeftError> {
        self.values
            .get(param)
            .ok_or_else(|| WeftError::MissingRequiredParameter {
                class: self.class.clone(),
                param: param.to_string(),
            })
    }

    fn type_err(&self, param: &str, expected: &'static str, found: &Resolved) -> WeftError {
        WeftError::ParameterType {
            class: self.class.clone(),
            param: param.to_string(),
            expected,
            found: found.type_name().to_string(),
        }
    }

    pub fn get_bool(&self, param: &str) -> Result<Option<bool>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(self.type_err(param, "bool", other)),
        }
    }

    pub fn get_i64(&self, param: &str) -> Result<Option<i64>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(self.type_err(param, "int", other)),
        }
    }

    /// Int bindings coerce to float - `beta = 1` means `beta = 1.0`
    pub fn get_f64(&self, param: &str) -> Result<Option<f64>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::Float(x)) => Ok(Some(*x)),
            Some(Resolved::Int(i)) => Ok(Some(*i as f64)),
            Some(other) => Err(self.type_err(param, "float", other)),
        }
    }

    pub fn get_str(&self, param: &str) -> Result<Option<&str>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::Str(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(self.type_err(param, "string", other)),
        }
    }

    pub fn require_str(&self, param: &str) -> Result<&str, WeftError> {
        self.require(param)?;
        Ok(self.get_str(param)?.expect("presence checked"))
    }

    pub fn get_f64_list(&self, param: &str) -> Result<Option<Vec<f64>>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Resolved::Float(x) => out.push(*x),
                        Resolved::Int(i) => out.push(*i as f64),
                        other => return Err(self.type_err(param, "list of floats", other)),
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(self.type_err(param, "list of floats", other)),
        }
    }

    pub fn get_str_list(&self, param: &str) -> Result<Option<Vec<String>>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::List(items)) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Resolved::Str(s) => out.push(s.clone()),
                        other => return Err(self.type_err(param, "list of strings", other)),
                    }
                }
                Ok(Some(out))
            }
            Some(other) => Err(self.type_err(param, "list of strings", other)),
        }
    }

    pub fn get_object(&self, param: &str) -> Result<Option<&Component>, WeftError> {
        match self.get(param) {
            None => Ok(None),
            Some(Resolved::Object(component)) => Ok(Some(component)),
            Some(other) => Err(self.type_err(param, "constructed object", other)),
        }
    }

    pub fn require_object(&self, param: &str) -> Result<&Component, WeftError> {
        self.require(param)?;
        Ok(self.get_object(param)?.expect("presence checked"))
    }

    pub fn require_f64_dict(&self, param: &str) -> Result<BTreeMap<String, f64>, WeftError> {
        match self.require(param)? {
            Resolved::Dict(entries) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    match value {
                        Resolved::Float(x) => out.insert(key.clone(), *x),
                        Resolved::Int(i) => out.insert(key.clone(), *i as f64),
                        other => return Err(self.type_err(param, "dict of floats", other)),
                    };
                }
                Ok(out)
            }
            other => Err(self.type_err(param, "dict of floats", other)),
        }
    }

    pub fn require_object_dict(
        &self,
        param: &str,
    ) -> Result<BTreeMap<String, Component>, WeftError> {
        match self.require(param)? {
            Resolved::Dict(entries) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    match value {
                        Resolved::Object(component) => {
                            out.insert(key.clone(), component.clone())
                        }
                        other => {
                            return Err(self.type_err(param, "dict of constructed objects", other))
                        }
                    };
                }
                Ok(out)
            }
            other => Err(self.type_err(param, "dict of constructed objects", other)),
        }
    }
}

/// Resolves a merged configuration into live components
pub struct Resolver {
    config: ConfigSet,
    store: KeyValueStore,
    registry: SingletonRegistry,
    factories: FactoryTable,
    /// Binding keys actually consumed by constructions so far
    operative: DashSet<String>,
}

impl Resolver {
    pub fn new(config: ConfigSet) -> Self {
        Self::with_factories(config, FactoryTable::with_builtins())
    }

    pub fn with_factories(config: ConfigSet, factories: FactoryTable) -> Self {
        let store = KeyValueStore::from_config(&config);
        Self {
            config,
            store,
            registry: SingletonRegistry::new(),
            factories,
            operative: DashSet::new(),
        }
    }

    pub fn config(&self) -> &ConfigSet {
        &self.config
    }

    pub fn store(&self) -> &KeyValueStore {
        &self.store
    }

    pub fn registry(&self) -> &SingletonRegistry {
        &self.registry
    }

    pub fn factories(&self) -> &FactoryTable {
        &self.factories
    }

    /// Construct (or fetch the memoized) `(scope, class)` component
    pub fn construct(&self, class: &str, scope: Option<&str>) -> Result<Component, WeftError> {
        let mut refs = Vec::new();
        self.construct_inner(class, scope, &mut refs)
    }

    fn construct_inner(
        &self,
        class: &str,
        scope: Option<&str>,
        refs: &mut Vec<String>,
    ) -> Result<Component, WeftError> {
        self.registry
            .resolve(scope, class, || self.build(class, scope, refs))
    }

    fn build(
        &self,
        class: &str,
        scope: Option<&str>,
        refs: &mut Vec<String>,
    ) -> Result<Component, WeftError> {
        let spec = self.factories.get(class).ok_or_else(|| {
            WeftError::unknown_constructor(class, &self.factories.suggest(class))
        })?;

        let raw = gather_raw(&self.config, class, scope);

        // Signature checks run on the raw bindings, before any value is
        // resolved, so no construction side effect precedes a rejection.
        for (param, arg) in &raw.values {
            if !spec.declares(param) {
                return Err(WeftError::UnknownParameter {
                    class: class.to_string(),
                    param: param.clone(),
                    origin: arg.origin.clone(),
                });
            }
        }
        for param in spec.params {
            if param.required && !raw.values.contains_key(param.name) {
                return Err(WeftError::MissingRequiredParameter {
                    class: class.to_string(),
                    param: param.name.to_string(),
                });
            }
        }
        if let Some(prevalidate) = spec.prevalidate {
            prevalidate(&raw)?;
        }

        debug!(class, scope = scope.unwrap_or(""), params = raw.values.len(), "binding constructor");

        let mut values = BTreeMap::new();
        for (param, arg) in &raw.values {
            values.insert(param.clone(), self.resolve_value(&arg.value, refs)?);
        }
        for arg in raw.values.values() {
            self.operative.insert(arg.key.clone());
        }

        let args = BoundArgs::new(class, values);
        (spec.build)(&args)
    }

    fn resolve_value(&self, value: &RawValue, refs: &mut Vec<String>) -> Result<Resolved, WeftError> {
        match value {
            RawValue::None => Ok(Resolved::None),
            RawValue::Bool(b) => Ok(Resolved::Bool(*b)),
            RawValue::Int(i) => Ok(Resolved::Int(*i)),
            RawValue::Float(x) => Ok(Resolved::Float(*x)),
            RawValue::Str(s) => Ok(Resolved::Str(s.clone())),
            RawValue::List(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.resolve_value(item, refs)?);
                }
                Ok(Resolved::List(out))
            }
            RawValue::Dict(entries) => {
                let mut out = BTreeMap::new();
                for (key, value) in entries {
                    out.insert(key.clone(), self.resolve_value(value, refs)?);
                }
                Ok(Resolved::Dict(out))
            }
            RawValue::Ref(name) => {
                if refs.iter().any(|seen| seen == name) {
                    refs.push(name.clone());
                    return Err(WeftError::CyclicReference {
                        chain: refs
                            .iter()
                            .map(|n| format!("%{}", n))
                            .collect::<Vec<_>>()
                            .join(" -> "),
                    });
                }
                refs.push(name.clone());
                self.operative.insert(name.clone());
                let raw = self.store.get(name)?;
                let out = self.resolve_value(raw, refs);
                refs.pop();
                out
            }
            RawValue::Call(call) => {
                let component = self.construct_inner(&call.class, call.scope.as_deref(), refs)?;
                Ok(Resolved::Object(component))
            }
        }
    }

    /// Render exactly the bindings consumed so far, in document syntax
    pub fn operative_config(&self) -> String {
        let mut out = String::new();
        for binding in self.config.winners() {
            if self.operative.contains(&binding.key()) {
                out.push_str(&format!("{} = {}\n", binding.key(), binding.value));
            }
        }
        out
    }

    /// Flat JSON map of the merged configuration for hyperparameter logs
    pub fn flat_map(&self) -> BTreeMap<String, serde_json::Value> {
        self.config
            .winners()
            .into_iter()
            .map(|binding| (binding.key(), raw_to_json(&binding.value)))
            .collect()
    }
}
