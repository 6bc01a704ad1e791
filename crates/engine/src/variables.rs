//! Shared variables and compile-time override scoping.
//!
//! The original system resolved variable overrides by reflecting over task
//! fields at enable time. Here the same behavior is expressed statically: a
//! task stores a [`VarBinding`] per shared field, and the compiler rewrites
//! those bindings through an explicit depth-scoped [`OverrideScope`] while
//! splicing external subtrees. At runtime every lookup goes through the
//! behavior's [`VariableSource`], so an unbound name always falls back to the
//! enclosing tree's own table.

use std::collections::HashMap;

/// A value stored in a behavior's variable table.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SharedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl SharedValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SharedValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            SharedValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            SharedValue::Float(f) => Some(*f),
            SharedValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SharedValue::Str(s) => Some(s),
            _ => None,
        }
    }
}

impl From<bool> for SharedValue {
    fn from(v: bool) -> Self {
        SharedValue::Bool(v)
    }
}

impl From<i64> for SharedValue {
    fn from(v: i64) -> Self {
        SharedValue::Int(v)
    }
}

impl From<f64> for SharedValue {
    fn from(v: f64) -> Self {
        SharedValue::Float(v)
    }
}

impl From<&str> for SharedValue {
    fn from(v: &str) -> Self {
        SharedValue::Str(v.to_owned())
    }
}

/// Name → value lookup owned by the host.
///
/// The interpreter only ever reads and writes through this interface; storage
/// and change notification belong to the implementor.
pub trait VariableSource: Send {
    fn get(&self, name: &str) -> Option<SharedValue>;
    fn set(&mut self, name: &str, value: SharedValue);
    /// Whether the table currently holds `name`.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Plain in-memory variable table.
#[derive(Debug, Default)]
pub struct VariableStore {
    values: HashMap<String, SharedValue>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<SharedValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl VariableSource for VariableStore {
    fn get(&self, name: &str) -> Option<SharedValue> {
        self.values.get(name).cloned()
    }

    fn set(&mut self, name: &str, value: SharedValue) {
        self.values.insert(name.to_owned(), value);
    }

    fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

/// How a task field refers to a shared variable: by name (resolved against
/// the behavior table at runtime) or as an inline constant fixed at compile
/// time.
#[derive(Clone, Debug, PartialEq)]
pub enum VarBinding {
    Name(String),
    Value(SharedValue),
}

impl VarBinding {
    pub fn name(name: impl Into<String>) -> Self {
        VarBinding::Name(name.into())
    }

    pub fn value(value: impl Into<SharedValue>) -> Self {
        VarBinding::Value(value.into())
    }

    /// Reads the bound value through `vars`.
    pub fn get(&self, vars: &dyn VariableSource) -> Option<SharedValue> {
        match self {
            VarBinding::Name(name) => vars.get(name),
            VarBinding::Value(value) => Some(value.clone()),
        }
    }

    /// Writes through to the table; inline constants are silently immutable.
    pub fn set(&self, vars: &mut dyn VariableSource, value: SharedValue) {
        if let VarBinding::Name(name) = self {
            vars.set(name, value);
        }
    }
}

/// An override attached to an external-subtree reference: either pins the
/// named variable to a constant, or re-routes it to a variable of the
/// enclosing scope.
#[derive(Clone, Debug)]
pub struct VariableOverride {
    pub name: String,
    pub value: OverrideValue,
}

#[derive(Clone, Debug)]
pub enum OverrideValue {
    /// Inline the constant.
    Value(SharedValue),
    /// Bind to this name in the enclosing scope (or, failing that, in the
    /// behavior's own table).
    Bind(String),
}

impl VariableOverride {
    pub fn constant(name: impl Into<String>, value: impl Into<SharedValue>) -> Self {
        Self {
            name: name.into(),
            value: OverrideValue::Value(value.into()),
        }
    }

    pub fn alias(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: OverrideValue::Bind(target.into()),
        }
    }
}

#[derive(Clone, Debug)]
struct ScopeEntry {
    name: String,
    resolved: OverrideValue,
    depth: usize,
}

/// Compile-time override scope, implemented as an explicit depth stack.
///
/// A deeper override of the same name shadows the outer one; leaving a depth
/// drops every entry pushed at that depth, restoring whatever was visible
/// before.
#[derive(Debug, Default)]
pub struct OverrideScope {
    entries: Vec<ScopeEntry>,
    depth: usize,
}

impl OverrideScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Enters a splice level and installs its overrides. Alias targets are
    /// chased through the scope as it stood before this level, so a subtree
    /// override can re-route to a grandparent's binding.
    pub fn enter(&mut self, overrides: &[VariableOverride]) {
        self.depth += 1;
        let depth = self.depth;
        for over in overrides {
            let resolved = match &over.value {
                OverrideValue::Value(v) => OverrideValue::Value(v.clone()),
                OverrideValue::Bind(target) => self
                    .lookup(target)
                    .cloned()
                    .unwrap_or_else(|| OverrideValue::Bind(target.clone())),
            };
            self.entries.push(ScopeEntry {
                name: over.name.clone(),
                resolved,
                depth,
            });
        }
    }

    /// Leaves the current splice level, dropping its overrides.
    pub fn exit(&mut self) {
        let depth = self.depth;
        self.entries.retain(|entry| entry.depth != depth);
        self.depth = self.depth.saturating_sub(1);
    }

    /// Innermost visible override for `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<&OverrideValue> {
        self.entries
            .iter()
            .rev()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.resolved)
    }

    /// Rewrites a task's binding through the visible overrides. Bindings with
    /// no override are left alone and resolve against the behavior table at
    /// runtime.
    pub fn rebind(&self, binding: &mut VarBinding) {
        let resolved = match binding {
            VarBinding::Name(name) => self.lookup(name).cloned(),
            VarBinding::Value(_) => None,
        };
        if let Some(over) = resolved {
            *binding = match over {
                OverrideValue::Value(value) => VarBinding::Value(value),
                OverrideValue::Bind(target) => VarBinding::Name(target),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deeper_override_shadows_and_unwinds() {
        let mut scope = OverrideScope::new();
        scope.enter(&[VariableOverride::constant("speed", 1i64)]);
        scope.enter(&[VariableOverride::constant("speed", 2i64)]);

        let mut binding = VarBinding::name("speed");
        scope.rebind(&mut binding);
        assert_eq!(binding, VarBinding::Value(SharedValue::Int(2)));

        scope.exit();
        let mut binding = VarBinding::name("speed");
        scope.rebind(&mut binding);
        assert_eq!(binding, VarBinding::Value(SharedValue::Int(1)));

        scope.exit();
        let mut binding = VarBinding::name("speed");
        scope.rebind(&mut binding);
        assert_eq!(binding, VarBinding::Name("speed".into()));
    }

    #[test]
    fn alias_chases_enclosing_override() {
        let mut scope = OverrideScope::new();
        scope.enter(&[VariableOverride::constant("target", 7i64)]);
        scope.enter(&[VariableOverride::alias("goal", "target")]);

        let mut binding = VarBinding::name("goal");
        scope.rebind(&mut binding);
        assert_eq!(binding, VarBinding::Value(SharedValue::Int(7)));
    }

    #[test]
    fn unresolved_alias_falls_back_to_table_name() {
        let mut scope = OverrideScope::new();
        scope.enter(&[VariableOverride::alias("goal", "enemy")]);

        let mut binding = VarBinding::name("goal");
        scope.rebind(&mut binding);
        assert_eq!(binding, VarBinding::Name("enemy".into()));

        let vars = VariableStore::new().with("enemy", 3i64);
        assert_eq!(binding.get(&vars), Some(SharedValue::Int(3)));
    }
}
