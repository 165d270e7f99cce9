//! Raw configuration value model
//!
//! `RawValue` is the parsed-but-unresolved form of a bound value: literals
//! pass through, `%name` references and `@Class()` constructor expressions
//! are resolved later by the binder. `Display` renders values back in
//! document syntax so merged configs can be dumped verbatim.

use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;
use std::sync::Arc;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

/// True if `s` is a valid macro/parameter/class-segment identifier
pub fn is_identifier(s: &str) -> bool {
    IDENTIFIER.is_match(s)
}

/// Where a statement came from (file + 1-based line)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    pub file: Arc<str>,
    pub line: usize,
}

impl Origin {
    pub fn new(file: impl Into<Arc<str>>, line: usize) -> Self {
        Self {
            file: file.into(),
            line,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// A constructor expression: `@Class()` or `@scope/Class()`
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorCall {
    pub scope: Option<String>,
    pub class: String,
}

impl fmt::Display for ConstructorCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "@{}/{}()", scope, self.class),
            None => write!(f, "@{}()", self.class),
        }
    }
}

/// A parsed, unresolved value
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// `[...]` lists and `(...)` tuples both parse here
    List(Vec<RawValue>),
    /// `{'key': value, ...}` - declaration order preserved
    Dict(Vec<(String, RawValue)>),
    /// `%name` - lazy reference into the key-value store
    Ref(String),
    /// `@Class()` - lazy constructor call through the singleton registry
    Call(ConstructorCall),
}

impl RawValue {
    /// Short type label for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::None => "None",
            RawValue::Bool(_) => "bool",
            RawValue::Int(_) => "int",
            RawValue::Float(_) => "float",
            RawValue::Str(_) => "string",
            RawValue::List(_) => "list",
            RawValue::Dict(_) => "dict",
            RawValue::Ref(_) => "reference",
            RawValue::Call(_) => "constructor call",
        }
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::None => write!(f, "None"),
            RawValue::Bool(true) => write!(f, "True"),
            RawValue::Bool(false) => write!(f, "False"),
            RawValue::Int(i) => write!(f, "{}", i),
            // {:?} keeps the decimal point so the render round-trips as a float
            RawValue::Float(x) => write!(f, "{:?}", x),
            RawValue::Str(s) => write!(f, "'{}'", escape(s)),
            RawValue::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            RawValue::Dict(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "'{}': {}", escape(key), value)?;
                }
                write!(f, "}}")
            }
            RawValue::Ref(name) => write!(f, "%{}", name),
            RawValue::Call(call) => write!(f, "{}", call),
        }
    }
}

/// One `key = value` statement after parsing
///
/// `class == None` marks a macro binding (`name = value`); otherwise the
/// binding targets `[scope/]class.param`.
#[derive(Debug, Clone)]
pub struct Binding {
    pub scope: Option<String>,
    pub class: Option<String>,
    pub param: String,
    pub value: RawValue,
    pub origin: Origin,
}

impl Binding {
    /// Canonical binding key: `name`, `Class.param` or `scope/Class.param`
    pub fn key(&self) -> String {
        match (&self.scope, &self.class) {
            (Some(scope), Some(class)) => format!("{}/{}.{}", scope, class, self.param),
            (None, Some(class)) => format!("{}.{}", class, self.param),
            _ => self.param.clone(),
        }
    }

    pub fn is_macro(&self) -> bool {
        self.class.is_none()
    }
}
