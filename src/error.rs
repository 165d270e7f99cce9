//! Error types with fix suggestions

use crate::value::Origin;
use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

/// All error variants are part of the public API.
/// Every variant is a configuration-time error: none are recoverable by
/// retry, each aborts resolution.
#[derive(Error, Debug)]
pub enum WeftError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Document parsing (WEFT-010)
    // ─────────────────────────────────────────────────────────────
    #[error("WEFT-010: Parse error at {origin}: {detail}")]
    Parse { origin: Origin, detail: String },

    // ─────────────────────────────────────────────────────────────
    // Include resolution (WEFT-020 to WEFT-021)
    // ─────────────────────────────────────────────────────────────
    #[error("WEFT-020: Include '{path}' not found (included from {origin})")]
    IncludeNotFound { path: String, origin: Origin },

    #[error("WEFT-021: Include cycle: {chain}")]
    CyclicInclude { chain: String },

    // ─────────────────────────────────────────────────────────────
    // Key-value store (WEFT-030 to WEFT-031)
    // ─────────────────────────────────────────────────────────────
    #[error("WEFT-030: Unbound key '%{name}'")]
    UnboundKey { name: String },

    #[error("WEFT-031: Reference cycle: {chain}")]
    CyclicReference { chain: String },

    // ─────────────────────────────────────────────────────────────
    // Object binding (WEFT-040 to WEFT-044)
    // ─────────────────────────────────────────────────────────────
    #[error("WEFT-040: Unknown constructor '@{name}'{hint}")]
    UnknownConstructor { name: String, hint: String },

    #[error("WEFT-041: Constructor '{class}' requires parameter '{param}' but no binding provides it")]
    MissingRequiredParameter { class: String, param: String },

    #[error("WEFT-042: Constructor '{class}' has no parameter '{param}' (bound at {origin})")]
    UnknownParameter {
        class: String,
        param: String,
        origin: Origin,
    },

    #[error("WEFT-043: Parameter '{class}.{param}' expects {expected}, got {found}")]
    ParameterType {
        class: String,
        param: String,
        expected: &'static str,
        found: String,
    },

    #[error("WEFT-044: Parameter '{class}.{param}': {reason}")]
    InvalidParameter {
        class: String,
        param: String,
        reason: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Composition (WEFT-050 to WEFT-051)
    // ─────────────────────────────────────────────────────────────
    #[error("WEFT-050: Key sets differ between 'proxies_dict' and 'weight_dict': {detail}")]
    KeySetMismatch { detail: String },

    #[error("WEFT-051: Unknown aggregation '{name}' (known: {known})")]
    UnknownAggregation { name: String, known: String },
}

impl WeftError {
    /// Build an UnknownConstructor error with optional near-miss hint
    pub fn unknown_constructor(name: impl Into<String>, suggestions: &[String]) -> Self {
        let hint = if suggestions.is_empty() {
            String::new()
        } else {
            format!(" - did you mean {}?", suggestions.join(" or "))
        };
        WeftError::UnknownConstructor {
            name: name.into(),
            hint,
        }
    }
}

impl FixSuggestion for WeftError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WeftError::Io(_) => Some("Check file path and permissions"),
            WeftError::Parse { .. } => {
                Some("Check binding syntax: key = value, %ref, @Class() or @scope/Class()")
            }
            WeftError::IncludeNotFound { .. } => {
                Some("Include paths resolve relative to the including file")
            }
            WeftError::CyclicInclude { .. } => {
                Some("Remove the circular include - documents cannot include themselves")
            }
            WeftError::UnboundKey { .. } => {
                Some("Declare the macro (name = value) before referencing it with %name")
            }
            WeftError::CyclicReference { .. } => {
                Some("Break the reference cycle - a binding cannot resolve through itself")
            }
            WeftError::UnknownConstructor { .. } => {
                Some("Register the constructor or check the class name spelling")
            }
            WeftError::MissingRequiredParameter { .. } => {
                Some("Add a binding for the missing parameter (Class.param = value)")
            }
            WeftError::UnknownParameter { .. } => {
                Some("Remove the binding or check the parameter name against the constructor")
            }
            WeftError::ParameterType { .. } => {
                Some("Change the bound value to the expected type")
            }
            WeftError::InvalidParameter { .. } => {
                Some("Adjust the bound value to satisfy the constructor's constraint")
            }
            WeftError::KeySetMismatch { .. } => {
                Some("Use identical keys in proxies_dict and weight_dict")
            }
            WeftError::UnknownAggregation { .. } => {
                Some("Use one of the registered aggregation names")
            }
        }
    }
}
