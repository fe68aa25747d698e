// SPDX-License-Identifier: AGPL-3.0-or-later
//! Macro evaluation
//!
//! `{{expr}}` and `{{{code}}}` blocks are handed to an [`Evaluator`] supplied
//! by the host. The core only ships [`SymbolEvaluator`], which resolves names
//! and literals and understands plain `name = value` assignments.

use indexmap::IndexMap;
use serde::Serialize;
use std::fmt;

/// Macro evaluation failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("name '{0}' is not defined")]
    Undefined(String),

    #[error("invalid syntax: {0}")]
    Syntax(String),
}

/// Named string values visible to macros
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SymbolTable {
    symbols: IndexMap<String, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.symbols.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.symbols.insert(name.into(), value.into());
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.symbols.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.symbols.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.symbols.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (k, v) in iter {
            table.set(k, v);
        }
        table
    }
}

/// Injected macro evaluation capability
pub trait Evaluator: Send + Sync {
    /// Evaluate an inline `{{expr}}` to its display string
    fn evaluate(
        &self,
        expr: &str,
        globals: &SymbolTable,
        locals: &SymbolTable,
    ) -> Result<String, EvalError>;

    /// Run a `{{{code}}}` block for its side effects on the symbol tables
    fn execute(
        &self,
        code: &str,
        globals: &mut SymbolTable,
        locals: &mut SymbolTable,
    ) -> Result<(), EvalError>;
}

/// Name and literal evaluator
///
/// Expressions are a quoted string, an integer, or a symbol name looked up in
/// the locals first, then the globals. Code blocks are lines (or `;`
/// separated statements) of `name = expr`, assigned into the locals. Lines
/// starting with `#` are comments.
#[derive(Debug, Clone, Copy, Default)]
pub struct SymbolEvaluator;

impl SymbolEvaluator {
    pub fn new() -> Self {
        Self
    }
}

fn is_symbol_name(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_' || c == '.')
}

fn unquote(s: &str) -> Option<&str> {
    ['"', '\''].into_iter().find_map(|q| {
        s.strip_prefix(q)
            .and_then(|rest| rest.strip_suffix(q))
            .filter(|inner| !inner.contains(q))
    })
}

impl Evaluator for SymbolEvaluator {
    fn evaluate(
        &self,
        expr: &str,
        globals: &SymbolTable,
        locals: &SymbolTable,
    ) -> Result<String, EvalError> {
        let expr = expr.trim();
        if expr.is_empty() {
            return Err(EvalError::Syntax("empty expression".to_string()));
        }
        if let Some(inner) = unquote(expr) {
            return Ok(inner.to_string());
        }
        if let Ok(n) = expr.parse::<i64>() {
            return Ok(n.to_string());
        }
        if !is_symbol_name(expr) {
            return Err(EvalError::Syntax(expr.to_string()));
        }
        locals
            .get(expr)
            .or_else(|| globals.get(expr))
            .map(str::to_string)
            .ok_or_else(|| EvalError::Undefined(expr.to_string()))
    }

    fn execute(
        &self,
        code: &str,
        globals: &mut SymbolTable,
        locals: &mut SymbolTable,
    ) -> Result<(), EvalError> {
        for statement in code.split(['\n', ';']).map(str::trim) {
            if statement.is_empty() || statement.starts_with('#') {
                continue;
            }
            let Some((name, expr)) = statement.split_once('=') else {
                return Err(EvalError::Syntax(statement.to_string()));
            };
            let name = name.trim();
            if !is_symbol_name(name) {
                return Err(EvalError::Syntax(statement.to_string()));
            }
            let value = self.evaluate(expr, globals, locals)?;
            locals.set(name, value);
        }
        Ok(())
    }
}

/// Evaluator plus the global/local symbol tables it runs against
pub struct MacroScope {
    evaluator: Box<dyn Evaluator>,
    pub globals: SymbolTable,
    pub locals: SymbolTable,
}

impl MacroScope {
    pub fn new(evaluator: Box<dyn Evaluator>) -> Self {
        Self {
            evaluator,
            globals: SymbolTable::new(),
            locals: SymbolTable::new(),
        }
    }

    pub fn evaluate(&self, expr: &str) -> Result<String, EvalError> {
        self.evaluator.evaluate(expr, &self.globals, &self.locals)
    }

    pub fn execute(&mut self, code: &str) -> Result<(), EvalError> {
        self.evaluator
            .execute(code, &mut self.globals, &mut self.locals)
    }
}

impl Default for MacroScope {
    fn default() -> Self {
        Self::new(Box::new(SymbolEvaluator::new()))
    }
}

impl fmt::Debug for MacroScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MacroScope")
            .field("globals", &self.globals)
            .field("locals", &self.locals)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn scope() -> MacroScope {
        let mut scope = MacroScope::default();
        scope.globals.set("name", "global");
        scope.globals.set("version", "1.2");
        scope
    }

    #[test]
    fn test_evaluate_literals() {
        let scope = scope();
        assert_eq!(scope.evaluate("'quoted'").unwrap(), "quoted");
        assert_eq!(scope.evaluate("\"dq\"").unwrap(), "dq");
        assert_eq!(scope.evaluate(" 42 ").unwrap(), "42");
    }

    #[test]
    fn test_locals_shadow_globals() {
        let mut scope = scope();
        assert_eq!(scope.evaluate("name").unwrap(), "global");
        scope.execute("name = 'local'").unwrap();
        assert_eq!(scope.evaluate("name").unwrap(), "local");
        assert_eq!(scope.globals.get("name"), Some("global"));
    }

    #[test]
    fn test_execute_statements() {
        let mut scope = scope();
        scope
            .execute("# setup\na = 1; b = version\nc = a")
            .unwrap();
        assert_eq!(scope.locals.get("a"), Some("1"));
        assert_eq!(scope.locals.get("b"), Some("1.2"));
        assert_eq!(scope.locals.get("c"), Some("1"));
    }

    #[test]
    fn test_errors() {
        let mut scope = scope();
        assert_eq!(
            scope.evaluate("missing"),
            Err(EvalError::Undefined("missing".to_string()))
        );
        assert!(matches!(scope.evaluate("1 +"), Err(EvalError::Syntax(_))));
        assert!(matches!(scope.evaluate(""), Err(EvalError::Syntax(_))));
        assert!(matches!(scope.execute("no assignment"), Err(EvalError::Syntax(_))));
    }

    #[test]
    fn test_symbol_table_from_iter() {
        let table: SymbolTable = [("a", "1"), ("b", "2")].into_iter().collect();
        assert_eq!(table.len(), 2);
        assert_eq!(table.iter().map(|(k, _)| k).collect::<Vec<_>>(), vec!["a", "b"]);
    }
}
