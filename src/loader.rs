//! Include resolver and merged configuration
//!
//! Loads one or more documents, splices `include` directives depth-first at
//! the point of inclusion, and keeps every binding in declaration order.
//! Later bindings override earlier ones for the same key (last-write-wins);
//! override bindings supplied at invocation time are appended after all
//! files, giving them the highest priority.

use crate::error::WeftError;
use crate::parser::{parse_document, Statement};
use crate::value::Binding;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// An ordered, merged set of bindings from files + overrides
#[derive(Debug, Default)]
pub struct ConfigSet {
    bindings: Vec<Binding>,
}

impl ConfigSet {
    /// Load a single root document and its includes
    pub fn load(path: impl AsRef<Path>) -> Result<Self, WeftError> {
        Self::load_with_bindings(&[path.as_ref().to_path_buf()], &[])
    }

    /// Load documents in order, then apply override bindings last.
    /// Each override string is parsed as a document with a virtual origin.
    pub fn load_with_bindings(paths: &[PathBuf], overrides: &[String]) -> Result<Self, WeftError> {
        let mut bindings = Vec::new();
        let mut stack = Vec::new();
        for path in paths {
            load_file(path, &mut stack, &mut bindings)?;
        }
        for (idx, src) in overrides.iter().enumerate() {
            let name = format!("<override {}>", idx + 1);
            let statements = parse_document(src, &name)?;
            splice(statements, Path::new("."), &mut stack, &mut bindings)?;
        }
        Ok(Self { bindings })
    }

    /// Parse a document from a string (includes resolve against the
    /// current directory). Used by tests and embedding callers.
    pub fn from_document(src: &str, name: &str) -> Result<Self, WeftError> {
        let mut bindings = Vec::new();
        let mut stack = Vec::new();
        let statements = parse_document(src, name)?;
        splice(statements, Path::new("."), &mut stack, &mut bindings)?;
        Ok(Self { bindings })
    }

    /// All bindings in declaration order (includes spliced, overrides last)
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Winning binding per key, in first-declaration order of the key
    pub fn winners(&self) -> Vec<&Binding> {
        let mut order: Vec<String> = Vec::new();
        let mut by_key: HashMap<String, &Binding> = HashMap::new();
        for binding in &self.bindings {
            let key = binding.key();
            if !by_key.contains_key(&key) {
                order.push(key.clone());
            }
            by_key.insert(key, binding);
        }
        order
            .iter()
            .map(|key| by_key[key.as_str()])
            .collect()
    }

    /// Render the merged configuration back in document syntax
    pub fn render(&self) -> String {
        let mut out = String::new();
        for binding in self.winners() {
            out.push_str(&format!("{} = {}\n", binding.key(), binding.value));
        }
        out
    }
}

fn splice(
    statements: Vec<Statement>,
    base: &Path,
    stack: &mut Vec<PathBuf>,
    out: &mut Vec<Binding>,
) -> Result<(), WeftError> {
    for statement in statements {
        match statement {
            Statement::Include { path, origin } => {
                let resolved = base.join(&path);
                if !resolved.is_file() {
                    return Err(WeftError::IncludeNotFound { path, origin });
                }
                load_file(&resolved, stack, out)?;
            }
            Statement::Binding(binding) => out.push(binding),
        }
    }
    Ok(())
}

fn load_file(path: &Path, stack: &mut Vec<PathBuf>, out: &mut Vec<Binding>) -> Result<(), WeftError> {
    // Canonical paths so the same document reached through different
    // relative spellings is still recognized as a cycle.
    let canonical = path.canonicalize()?;
    if stack.contains(&canonical) {
        let chain = stack
            .iter()
            .chain(std::iter::once(&canonical))
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(" -> ");
        return Err(WeftError::CyclicInclude { chain });
    }
    stack.push(canonical);

    let path_display = path.display().to_string();
    debug!(file = %path_display, "loading configuration document");
    let src = fs::read_to_string(path)?;
    let statements = parse_document(&src, &path_display)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    splice(statements, base, stack, out)?;

    stack.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::RawValue;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn winning_value<'a>(config: &'a ConfigSet, key: &str) -> &'a RawValue {
        config
            .winners()
            .into_iter()
            .find(|b| b.key() == key)
            .map(|b| &b.value)
            .unwrap_or_else(|| panic!("no binding for {}", key))
    }

    #[test]
    fn later_binding_wins() {
        let config = ConfigSet::from_document("x = 1\nx = 2\n", "t.gin").unwrap();
        assert_eq!(winning_value(&config, "x"), &RawValue::Int(2));
        assert_eq!(config.winners().len(), 1);
    }

    #[test]
    fn include_order_determines_winner() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.gin", "x = 1\n");
        write(&dir, "b.gin", "x = 2\n");
        let ab = write(&dir, "ab.gin", "include 'a.gin'\ninclude 'b.gin'\n");
        let ba = write(&dir, "ba.gin", "include 'b.gin'\ninclude 'a.gin'\n");

        let config = ConfigSet::load(&ab).unwrap();
        assert_eq!(winning_value(&config, "x"), &RawValue::Int(2));

        let config = ConfigSet::load(&ba).unwrap();
        assert_eq!(winning_value(&config, "x"), &RawValue::Int(1));
    }

    #[test]
    fn root_bindings_override_includes() {
        let dir = TempDir::new().unwrap();
        write(&dir, "base.gin", "Trainer.n_iterations = 10\n");
        let root = write(
            &dir,
            "root.gin",
            "include 'base.gin'\nTrainer.n_iterations = 99\n",
        );
        let config = ConfigSet::load(&root).unwrap();
        assert_eq!(
            winning_value(&config, "Trainer.n_iterations"),
            &RawValue::Int(99)
        );
    }

    #[test]
    fn overrides_apply_last() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.gin", "x = 1\n");
        let config =
            ConfigSet::load_with_bindings(&[root], &["x = 42".to_string()]).unwrap();
        assert_eq!(winning_value(&config, "x"), &RawValue::Int(42));
    }

    #[test]
    fn includes_resolve_relative_to_including_file() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        write(&dir, "sub/leaf.gin", "y = 5\n");
        write(&dir, "sub/mid.gin", "include 'leaf.gin'\n");
        let root = write(&dir, "root.gin", "include 'sub/mid.gin'\n");
        let config = ConfigSet::load(&root).unwrap();
        assert_eq!(winning_value(&config, "y"), &RawValue::Int(5));
    }

    #[test]
    fn missing_include_fails_with_site() {
        let dir = TempDir::new().unwrap();
        let root = write(&dir, "root.gin", "include 'nope.gin'\n");
        let err = ConfigSet::load(&root).unwrap_err();
        match err {
            WeftError::IncludeNotFound { path, origin } => {
                assert_eq!(path, "nope.gin");
                assert_eq!(origin.line, 1);
            }
            other => panic!("expected IncludeNotFound, got {:?}", other),
        }
    }

    #[test]
    fn include_cycle_fails() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.gin", "include 'b.gin'\n");
        write(&dir, "b.gin", "include 'a.gin'\n");
        let err = ConfigSet::load(dir.path().join("a.gin")).unwrap_err();
        match err {
            WeftError::CyclicInclude { chain } => {
                assert!(chain.contains("a.gin"));
                assert!(chain.contains("b.gin"));
            }
            other => panic!("expected CyclicInclude, got {:?}", other),
        }
    }

    #[test]
    fn diamond_reinclude_is_allowed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "shared.gin", "x = 1\n");
        write(&dir, "left.gin", "include 'shared.gin'\n");
        write(&dir, "right.gin", "include 'shared.gin'\nx = 2\n");
        let root = write(&dir, "root.gin", "include 'left.gin'\ninclude 'right.gin'\n");
        let config = ConfigSet::load(&root).unwrap();
        assert_eq!(winning_value(&config, "x"), &RawValue::Int(2));
    }

    #[test]
    fn render_shows_winners_in_declaration_order() {
        let config =
            ConfigSet::from_document("x = 1\nTrainer.beta = 0.5\nx = 2\n", "t.gin").unwrap();
        assert_eq!(config.render(), "x = 2\nTrainer.beta = 0.5\n");
    }
}
