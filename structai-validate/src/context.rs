//! Per-call validation state.
//!
//! A [`ValidationContext`] is created once per validation call and threaded
//! through every nested validator as `&mut`. It tracks the current field
//! path, remembers already-validated sibling values for cross-field rules,
//! and carries the modes that change how absent fields and loose types are
//! treated.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use structai_core::{FieldPath, PathSegment, Value};

/// Whether validation produces input for a typed value or output for
/// serialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Absent omit-if-absent fields are filled with their zero value.
    #[default]
    Validation,
    /// Absent omit-if-absent fields are left out of the output.
    Serialization,
}

/// How loosely raw values are matched against declared types.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionMode {
    /// Only exact kind matches are accepted.
    Strict,
    /// Cross-kind conversions such as `"42"` to `42` are attempted.
    #[default]
    Lax,
}

impl CoercionMode {
    /// Pick the mode from a strict flag.
    #[must_use]
    pub fn from_strict(strict: bool) -> Self {
        if strict {
            Self::Strict
        } else {
            Self::Lax
        }
    }
}

/// Recorded values captured by [`ValidationContext::checkpoint`].
#[derive(Debug, Clone)]
pub struct Checkpoint {
    validated: IndexMap<String, Value>,
}

/// Call-scoped state shared by every validator in one validation call.
#[derive(Debug, Clone)]
pub struct ValidationContext<'raw> {
    raw: &'raw Value,
    validated: IndexMap<String, Value>,
    path: FieldPath,
    mode: ValidationMode,
    coercion: CoercionMode,
}

impl<'raw> ValidationContext<'raw> {
    /// Root context over `raw`, in validation mode with lax coercion.
    #[must_use]
    pub fn root(raw: &'raw Value) -> Self {
        Self {
            raw,
            validated: IndexMap::new(),
            path: FieldPath::root(),
            mode: ValidationMode::default(),
            coercion: CoercionMode::default(),
        }
    }

    /// Set the validation mode.
    #[must_use]
    pub fn with_mode(mut self, mode: ValidationMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the coercion mode.
    #[must_use]
    pub fn with_coercion(mut self, coercion: CoercionMode) -> Self {
        self.coercion = coercion;
        self
    }

    /// The raw root value this call validates.
    #[must_use]
    pub fn raw_root(&self) -> &'raw Value {
        self.raw
    }

    /// Current path.
    #[must_use]
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// Current path rendered as a dotted string.
    #[must_use]
    pub fn path_string(&self) -> String {
        self.path.to_string()
    }

    /// Current validation mode.
    #[must_use]
    pub fn mode(&self) -> ValidationMode {
        self.mode
    }

    /// Current coercion mode.
    #[must_use]
    pub fn coercion(&self) -> CoercionMode {
        self.coercion
    }

    /// Whether strict coercion is active.
    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.coercion == CoercionMode::Strict
    }

    /// Run `f` one level deeper, at `segment`.
    pub fn scoped<R>(
        &mut self,
        segment: impl Into<PathSegment>,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        self.path.push(segment);
        let result = f(self);
        self.path.pop();
        result
    }

    /// Run `f` under a different validation mode.
    pub fn in_mode<R>(&mut self, mode: ValidationMode, f: impl FnOnce(&mut Self) -> R) -> R {
        let previous = std::mem::replace(&mut self.mode, mode);
        let result = f(self);
        self.mode = previous;
        result
    }

    /// Run `f` under a different coercion mode.
    pub fn with_coercion_mode<R>(
        &mut self,
        coercion: CoercionMode,
        f: impl FnOnce(&mut Self) -> R,
    ) -> R {
        let previous = std::mem::replace(&mut self.coercion, coercion);
        let result = f(self);
        self.coercion = previous;
        result
    }

    /// Record the validated value for the current path.
    pub fn record(&mut self, value: Value) {
        self.validated.insert(self.path.to_string(), value);
    }

    /// A previously validated value by rendered path.
    #[must_use]
    pub fn validated(&self, path: &str) -> Option<&Value> {
        self.validated.get(path)
    }

    /// The validated value of a sibling of the current field.
    #[must_use]
    pub fn sibling(&self, name: &str) -> Option<&Value> {
        let parent = self.path.parent().unwrap_or_default();
        self.validated(&parent.child(name).to_string())
    }

    /// Snapshot of the recorded values, for [`rollback`](Self::rollback).
    #[must_use]
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            validated: self.validated.clone(),
        }
    }

    /// Restore the recorded values to `checkpoint`, including entries that
    /// were overwritten since.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.validated = checkpoint.validated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_root_defaults() {
        let raw = Value::Int(7);
        let ctx = ValidationContext::root(&raw);
        assert_eq!(ctx.raw_root(), &Value::Int(7));
        assert_eq!(ctx.mode(), ValidationMode::Validation);
        assert_eq!(ctx.coercion(), CoercionMode::Lax);
        assert!(ctx.path().is_root());
    }

    #[test]
    fn test_scoped_restores_path() {
        let raw = Value::Null;
        let mut ctx = ValidationContext::root(&raw);
        let inner = ctx.scoped("items", |ctx| ctx.scoped(1usize, |ctx| ctx.path_string()));
        assert_eq!(inner, "items[1]");
        assert!(ctx.path().is_root());
    }

    #[test]
    fn test_sibling_lookup() {
        let raw = Value::Null;
        let mut ctx = ValidationContext::root(&raw);
        ctx.scoped("password", |ctx| ctx.record(Value::from("secret")));
        let found = ctx.scoped("confirm", |ctx| ctx.sibling("password").cloned());
        assert_eq!(found, Some(Value::from("secret")));
    }

    #[test]
    fn test_sibling_is_scoped_to_parent() {
        let raw = Value::Null;
        let mut ctx = ValidationContext::root(&raw);
        ctx.scoped("a", |ctx| ctx.record(Value::Int(1)));
        let nested = ctx.scoped("inner", |ctx| ctx.scoped("b", |ctx| ctx.sibling("a").cloned()));
        assert_eq!(nested, None);
    }

    #[test]
    fn test_rollback_restores_overwritten_entries() {
        let raw = Value::Null;
        let mut ctx = ValidationContext::root(&raw);
        ctx.scoped("id", |ctx| ctx.record(Value::Int(1)));

        let checkpoint = ctx.checkpoint();
        ctx.scoped("id", |ctx| ctx.record(Value::from("one")));
        ctx.scoped("extra", |ctx| ctx.record(Value::Bool(true)));
        assert_eq!(ctx.validated("id"), Some(&Value::from("one")));

        ctx.rollback(checkpoint);
        assert_eq!(ctx.validated("id"), Some(&Value::Int(1)));
        assert_eq!(ctx.validated("extra"), None);
    }

    #[test]
    fn test_mode_variants_restore() {
        let raw = Value::Null;
        let mut ctx = ValidationContext::root(&raw);
        let inside = ctx.in_mode(ValidationMode::Serialization, |ctx| ctx.mode());
        assert_eq!(inside, ValidationMode::Serialization);
        assert_eq!(ctx.mode(), ValidationMode::Validation);

        let strict = ctx.with_coercion_mode(CoercionMode::Strict, |ctx| ctx.is_strict());
        assert!(strict);
        assert!(!ctx.is_strict());
    }
}
