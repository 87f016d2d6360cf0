//! Name → value environment for one render.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::ExpressionError;
use crate::value::Value;

/// Function injected into a context (e.g. a number formatter).
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync>;

/// Variables and functions visible to expressions.
///
/// Built fresh for every render and owned by that render. Loops push a scope
/// for their bindings and pop it when they finish; the base scope is never
/// popped.
pub struct RenderContext {
    scopes: Vec<BTreeMap<String, Value>>,
    functions: BTreeMap<String, NativeFunction>,
}

impl RenderContext {
    pub fn new() -> Self {
        Self {
            scopes: vec![BTreeMap::new()],
            functions: BTreeMap::new(),
        }
    }

    /// Set a variable in the innermost scope.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.into(), value.into());
        }
    }

    /// Look a variable up, innermost scope first.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn register_function<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, ExpressionError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn function(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.get(name)
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    pub fn pop_scope(&mut self) {
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of open scopes, including the base scope.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("scopes", &self.scopes)
            .field("functions", &self.functions.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_scope_shadows_and_pops() {
        let mut ctx = RenderContext::new();
        ctx.insert("x", "outer");
        ctx.push_scope();
        ctx.insert("x", "inner");
        assert_eq!(ctx.get("x"), Some(&Value::from("inner")));
        ctx.pop_scope();
        assert_eq!(ctx.get("x"), Some(&Value::from("outer")));
    }

    #[test]
    fn base_scope_is_never_popped() {
        let mut ctx = RenderContext::new();
        ctx.insert("x", 1i64);
        ctx.pop_scope();
        ctx.pop_scope();
        assert_eq!(ctx.depth(), 1);
        assert!(ctx.contains("x"));
    }
}
