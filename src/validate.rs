//! Static configuration validation
//!
//! Checks a merged configuration without constructing anything: unbound
//! references, reference cycles, unknown constructors and parameters,
//! missing required parameters at call sites, and composition key-set
//! mismatches. Problems split into errors (resolution would fail) and
//! warnings (suspicious but harmless, e.g. bindings for a class no
//! constructor is registered for).

use crate::binder::gather_raw;
use crate::builders::FactoryTable;
use crate::error::WeftError;
use crate::loader::ConfigSet;
use crate::store::KeyValueStore;
use crate::value::{Origin, RawValue};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// A single validation finding with context
#[derive(Debug)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
    pub origin: Option<Origin>,
    pub suggestion: Option<String>,
}

/// Result of validating a configuration
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    fn push(
        &mut self,
        severity: Severity,
        message: String,
        origin: Option<Origin>,
        suggestion: Option<String>,
    ) {
        // The same defect can be reachable through several bindings;
        // report it once.
        if self
            .findings
            .iter()
            .any(|f| f.message == message && f.origin == origin)
        {
            return;
        }
        self.findings.push(Finding {
            severity,
            message,
            origin,
            suggestion,
        });
    }

    pub fn errors(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings
            .iter()
            .filter(|f| f.severity == Severity::Warning)
    }

    pub fn error_count(&self) -> usize {
        self.errors().count()
    }

    pub fn warning_count(&self) -> usize {
        self.warnings().count()
    }

    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }
}

fn walk_value(value: &RawValue, visit: &mut dyn FnMut(&RawValue)) {
    visit(value);
    match value {
        RawValue::List(items) => {
            for item in items {
                walk_value(item, visit);
            }
        }
        RawValue::Dict(entries) => {
            for (_, item) in entries {
                walk_value(item, visit);
            }
        }
        _ => {}
    }
}

/// Validate a merged configuration against a factory table
pub fn validate(config: &ConfigSet, factories: &FactoryTable) -> ValidationReport {
    let mut report = ValidationReport::default();
    let store = KeyValueStore::from_config(config);

    // Direct reference chains between macros must terminate
    for name in store.names() {
        if let Err(WeftError::CyclicReference { chain }) = store.resolve_chain(name) {
            report.push(
                Severity::Error,
                format!("reference cycle: {}", chain),
                store.origin(name).cloned(),
                Some("break the cycle - a binding cannot resolve through itself".to_string()),
            );
        }
    }

    // Call sites discovered anywhere in bound values
    let mut call_sites: BTreeSet<(Option<String>, String)> = BTreeSet::new();

    for binding in config.bindings() {
        walk_value(&binding.value, &mut |value| match value {
            RawValue::Ref(name) => {
                if !store.contains(name) {
                    report.push(
                        Severity::Error,
                        format!("unbound reference '%{}'", name),
                        Some(binding.origin.clone()),
                        Some(format!("declare '{} = value' before referencing it", name)),
                    );
                }
            }
            RawValue::Call(call) => {
                if factories.contains(&call.class) {
                    call_sites.insert((call.scope.clone(), call.class.clone()));
                } else {
                    let suggestions = factories.suggest(&call.class);
                    let suggestion = (!suggestions.is_empty())
                        .then(|| format!("did you mean {}?", suggestions.join(" or ")));
                    report.push(
                        Severity::Error,
                        format!("unknown constructor '@{}'", call.class),
                        Some(binding.origin.clone()),
                        suggestion,
                    );
                }
            }
            _ => {}
        });

        // Parameter bindings must match a declared signature
        if let Some(class) = binding.class.as_deref() {
            match factories.get(class) {
                Some(spec) => {
                    if !spec.declares(&binding.param) {
                        report.push(
                            Severity::Error,
                            format!("constructor '{}' has no parameter '{}'", class, binding.param),
                            Some(binding.origin.clone()),
                            None,
                        );
                    }
                }
                None => {
                    let suggestions = factories.suggest(class);
                    let suggestion = (!suggestions.is_empty())
                        .then(|| format!("did you mean {}?", suggestions.join(" or ")));
                    report.push(
                        Severity::Warning,
                        format!("no constructor registered for '{}'", class),
                        Some(binding.origin.clone()),
                        suggestion,
                    );
                }
            }
        }
    }

    // Per call site: required parameters and raw pre-validation
    for (scope, class) in &call_sites {
        let spec = factories.get(class).expect("call sites are registered");
        let raw = gather_raw(config, class, scope.as_deref());
        for param in spec.required_params() {
            if !raw.values.contains_key(param) {
                report.push(
                    Severity::Error,
                    format!("constructor '{}' requires parameter '{}'", class, param),
                    None,
                    Some(format!("add '{}.{} = value'", class, param)),
                );
            }
        }
        if let Some(prevalidate) = spec.prevalidate {
            if let Err(err) = prevalidate(&raw) {
                report.push(Severity::Error, err.to_string(), None, None);
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(doc: &str) -> ValidationReport {
        let config = ConfigSet::from_document(doc, "test.gin").unwrap();
        validate(&config, &FactoryTable::with_builtins())
    }

    #[test]
    fn clean_config_is_valid() {
        let r = report(
            "scores = [0.5]\n\
             MockProxy.scores = %scores\n\
             Reward.proxy = @MockProxy()\n",
        );
        assert!(r.is_valid(), "findings: {:?}", r.findings);
        assert_eq!(r.warning_count(), 0);
    }

    #[test]
    fn unbound_reference_is_error() {
        let r = report("MockProxy.scores = %missing\n");
        assert!(!r.is_valid());
        let finding = r.errors().next().unwrap();
        assert!(finding.message.contains("%missing"));
        assert_eq!(finding.origin.as_ref().unwrap().line, 1);
    }

    #[test]
    fn reference_cycle_is_error() {
        let r = report("a = %b\nb = %a\n");
        assert!(!r.is_valid());
        assert!(r.errors().next().unwrap().message.contains("cycle"));
    }

    #[test]
    fn unknown_constructor_in_value_is_error() {
        let r = report("Reward.proxy = @MokProxy()\n");
        assert!(!r.is_valid());
        let finding = r.errors().next().unwrap();
        assert!(finding.message.contains("@MokProxy"));
        assert_eq!(
            finding.suggestion.as_deref(),
            Some("did you mean MockProxy?")
        );
    }

    #[test]
    fn unknown_parameter_is_error() {
        let r = report("Trainer.objectives = 1\n");
        assert!(!r.is_valid());
        assert!(r
            .errors()
            .next()
            .unwrap()
            .message
            .contains("no parameter 'objectives'"));
    }

    #[test]
    fn unregistered_class_is_warning() {
        let r = report("WandbLogger.project = 'demo'\n");
        assert!(r.is_valid());
        assert_eq!(r.warning_count(), 1);
    }

    #[test]
    fn missing_required_param_at_call_site() {
        let r = report("MockProxy.scores = [1.0]\nTrainer.reward = @Reward()\n");
        assert!(!r.is_valid());
        let messages: Vec<&str> = r.errors().map(|f| f.message.as_str()).collect();
        assert!(
            messages
                .iter()
                .any(|m| m.contains("'Reward' requires parameter 'proxy'")),
            "messages: {:?}",
            messages
        );
    }

    #[test]
    fn composition_key_mismatch_detected_statically() {
        let r = report(
            "Reward.proxy = @ComposedProxy()\n\
             ComposedProxy.proxies_dict = {'target': @MockProxy(), 'novelty': @MockProxy()}\n\
             ComposedProxy.weight_dict = {'target': 1.0}\n",
        );
        assert!(!r.is_valid());
        assert!(r
            .errors()
            .any(|f| f.message.contains("WEFT-050")));
    }

    #[test]
    fn duplicate_findings_collapse() {
        let r = report("Reward.proxy = %p\nTrainer.reward = %p\n");
        // '%p' unbound, reported once per origin
        assert_eq!(r.error_count(), 2);
        let r = report("MockProxy.scores = [%q, %q]\n");
        assert_eq!(r.error_count(), 1);
    }
}
