//! Parser, safety analyzer and interpreter bundled behind one policy

use crate::ast::Expr;
use crate::error::{FormulaError, FormulaResult};
use crate::evaluator::{EvalLimits, Interpreter, Scope};
use crate::functions::FunctionRegistry;
use crate::parser::{is_identifier, parse_with_max_depth};
use crate::safety::{CapabilityPolicy, Offense, SafetyAnalyzer};
use rowcalc_core::Value;

/// A parsed and analyzed expression
#[derive(Debug, Clone, PartialEq)]
pub struct Compiled {
    pub ast: Expr,
    /// Disallowed references; empty when the expression may be evaluated
    pub offenses: Vec<Offense>,
}

impl Compiled {
    pub fn is_safe(&self) -> bool {
        self.offenses.is_empty()
    }

    /// The disallowed-capability error for this expression, if any
    pub fn disallowed_error(&self) -> Option<FormulaError> {
        if self.is_safe() {
            return None;
        }
        Some(FormulaError::disallowed(
            self.offenses.iter().map(|o| o.name.clone()),
        ))
    }
}

/// Compiles and evaluates expressions under one capability policy
pub struct FormulaEngine {
    analyzer: SafetyAnalyzer,
    registry: FunctionRegistry,
    limits: EvalLimits,
}

impl FormulaEngine {
    pub fn new(policy: CapabilityPolicy, limits: EvalLimits) -> Self {
        Self::with_registry(policy, limits, FunctionRegistry::new())
    }

    pub fn with_registry(
        policy: CapabilityPolicy,
        limits: EvalLimits,
        registry: FunctionRegistry,
    ) -> Self {
        Self {
            analyzer: SafetyAnalyzer::new(policy),
            registry,
            limits,
        }
    }

    pub fn policy(&self) -> &CapabilityPolicy {
        self.analyzer.policy()
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn limits(&self) -> EvalLimits {
        self.limits
    }

    /// Parse and analyze expression text
    ///
    /// Fails only on syntax errors; disallowed references are reported in
    /// [`Compiled::offenses`].
    pub fn compile(&self, text: &str) -> FormulaResult<Compiled> {
        let ast = parse_with_max_depth(text, self.limits.max_depth)?;
        let offenses = self.analyzer.find_disallowed(&ast);
        if !offenses.is_empty() {
            log::debug!(
                "rejected expression {:?}: {} disallowed reference(s)",
                text,
                offenses.len()
            );
        }
        Ok(Compiled { ast, offenses })
    }

    /// Evaluate an AST that has already passed the safety analyzer
    pub fn evaluate(&self, ast: &Expr, scope: &Scope) -> FormulaResult<Value> {
        Interpreter::new(&self.registry, self.limits).evaluate(ast, scope)
    }

    /// Compile, refuse unsafe text, then evaluate
    pub fn eval_expression(&self, text: &str, scope: &Scope) -> FormulaResult<Value> {
        let compiled = self.compile(text)?;
        if let Some(err) = compiled.disallowed_error() {
            return Err(err);
        }
        self.evaluate(&compiled.ast, scope)
    }

    /// Check if a cell may be called `name`: expressions must be able to
    /// reference it, and the name must not shadow a namespace or a denied
    /// global.
    pub fn is_valid_name(&self, name: &str) -> bool {
        is_identifier(name) && !self.policy().is_namespace(name) && !self.policy().is_denied(name)
    }

    /// Free names the expression reads, deduplicated in first-seen order.
    ///
    /// Namespace names known to the policy are not dependencies.
    pub fn free_names(&self, ast: &Expr) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for (name, _) in ast.identifiers() {
            if self.policy().is_namespace(name) || names.iter().any(|n| n == name) {
                continue;
            }
            names.push(name.to_string());
        }
        names
    }

    /// Check if the expression calls a volatile builtin such as `Math.random`
    pub fn is_volatile(&self, ast: &Expr) -> bool {
        if let Expr::Call { callee, .. } = ast {
            if let Expr::Member {
                object, property, ..
            } = callee.as_ref()
            {
                if let Expr::Ident { name, .. } = object.as_ref() {
                    if self
                        .registry
                        .get(name, property)
                        .map_or(false, |def| def.volatile)
                    {
                        return true;
                    }
                }
            }
        }

        let mut volatile = false;
        ast.for_each_child(|child| volatile = volatile || self.is_volatile(child));
        volatile
    }
}

impl Default for FormulaEngine {
    fn default() -> Self {
        Self::new(CapabilityPolicy::default(), EvalLimits::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_compile_reports_offenses() {
        let engine = FormulaEngine::default();
        let compiled = engine.compile("eval('1') + Math.max(1, 2)").unwrap();
        assert!(!compiled.is_safe());
        assert_eq!(
            compiled.disallowed_error().unwrap().to_string(),
            "You are not allowed to use these functions: eval"
        );
        assert!(engine.compile("1 +").is_err());
    }

    #[test]
    fn test_eval_expression() {
        let engine = FormulaEngine::default();
        let mut scope = Scope::new();
        scope.insert("$a".into(), Value::from(4.0));
        assert_eq!(
            engine.eval_expression("Math.max(1, 2)", &scope).unwrap(),
            Value::from(2.0)
        );
        assert_eq!(
            engine.eval_expression("$a * 2", &scope).unwrap(),
            Value::from(8.0)
        );
        assert!(matches!(
            engine.eval_expression("fetch('x')", &scope),
            Err(FormulaError::Disallowed { .. })
        ));
    }

    #[test]
    fn test_is_valid_name() {
        let engine = FormulaEngine::default();
        assert!(engine.is_valid_name("total"));
        assert!(engine.is_valid_name("$Math"));
        assert!(!engine.is_valid_name("Math"));
        assert!(!engine.is_valid_name("fetch"));
        assert!(!engine.is_valid_name("total price"));
        assert!(!engine.is_valid_name("Infinity"));
    }

    #[test]
    fn test_free_names() {
        let engine = FormulaEngine::default();
        let ast = engine
            .compile("$a + b * Math.max($a, c.d) + JSON.parse(e)")
            .unwrap()
            .ast;
        assert_eq!(engine.free_names(&ast), vec!["$a", "b", "c", "e"]);
    }

    #[test]
    fn test_is_volatile() {
        let engine = FormulaEngine::default();
        let volatile = |text: &str| engine.is_volatile(&engine.compile(text).unwrap().ast);
        assert!(volatile("Math.random()"));
        assert!(volatile("1 + [Date.now()][0]"));
        assert!(!volatile("Math.max(1, 2)"));
        assert!(!volatile("Date.parse('2024-01-01')"));
    }
}
