//! Built-in functions, grouped by the namespace expressions reach them through

pub mod array;
pub mod date;
pub mod json;
pub mod math;
pub mod number;
pub mod string;

use crate::error::FormulaResult;
use indexmap::IndexMap;
use rowcalc_core::{Callable, Value};
use std::sync::OnceLock;

/// Function implementation signature
pub type FunctionImpl = fn(&[Value]) -> FormulaResult<Value>;

/// Function definition
pub struct FunctionDef {
    /// Namespace the function is reached through, e.g. `Math`
    pub namespace: &'static str,
    /// Function name within the namespace
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
    /// Result can change between calls with the same arguments
    pub volatile: bool,
}

impl FunctionDef {
    fn new(
        namespace: &'static str,
        name: &'static str,
        min_args: usize,
        max_args: Option<usize>,
        implementation: FunctionImpl,
    ) -> Self {
        Self {
            namespace,
            name,
            min_args,
            max_args,
            implementation,
            volatile: false,
        }
    }

    fn volatile(mut self) -> Self {
        self.volatile = true;
        self
    }
}

/// Function registry
pub struct FunctionRegistry {
    namespaces: IndexMap<&'static str, IndexMap<&'static str, FunctionDef>>,
}

static BUILTINS: OnceLock<FunctionRegistry> = OnceLock::new();

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();

        registry.register_math_functions();
        registry.register_number_functions();
        registry.register_string_functions();
        registry.register_array_functions();
        registry.register_date_functions();
        registry.register_json_functions();

        registry
    }

    /// Create a registry with no functions
    pub fn empty() -> Self {
        Self {
            namespaces: IndexMap::new(),
        }
    }

    /// Shared registry of built-in functions (lazily initialized)
    pub fn builtins() -> &'static FunctionRegistry {
        BUILTINS.get_or_init(FunctionRegistry::new)
    }

    /// Look up a function
    pub fn get(&self, namespace: &str, name: &str) -> Option<&FunctionDef> {
        self.namespaces.get(namespace)?.get(name)
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.namespaces
            .entry(def.namespace)
            .or_default()
            .insert(def.name, def);
    }

    /// Check if `name` is a namespace
    pub fn has_namespace(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    /// Namespace names in registration order
    pub fn namespaces(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.namespaces.keys().copied()
    }

    /// The value a namespace identifier evaluates to: an object of callables
    pub fn namespace_value(&self, name: &str) -> Option<Value> {
        let functions = self.namespaces.get(name)?;
        Some(Value::Object(
            functions
                .values()
                .map(|def| {
                    (
                        def.name.to_string(),
                        Value::Callable(Callable::builtin(def.namespace, def.name)),
                    )
                })
                .collect(),
        ))
    }

    fn register_math_functions(&mut self) {
        use math::*;
        let one = Some(1);
        self.register(FunctionDef::new("Math", "abs", 0, one, fn_abs));
        self.register(FunctionDef::new("Math", "acos", 0, one, fn_acos));
        self.register(FunctionDef::new("Math", "asin", 0, one, fn_asin));
        self.register(FunctionDef::new("Math", "atan", 0, one, fn_atan));
        self.register(FunctionDef::new("Math", "atan2", 0, Some(2), fn_atan2));
        self.register(FunctionDef::new("Math", "ceil", 0, one, fn_ceil));
        self.register(FunctionDef::new("Math", "cos", 0, one, fn_cos));
        self.register(FunctionDef::new("Math", "exp", 0, one, fn_exp));
        self.register(FunctionDef::new("Math", "floor", 0, one, fn_floor));
        self.register(FunctionDef::new("Math", "log", 0, one, fn_log));
        self.register(FunctionDef::new("Math", "max", 0, None, fn_max));
        self.register(FunctionDef::new("Math", "min", 0, None, fn_min));
        self.register(FunctionDef::new("Math", "pow", 0, Some(2), fn_pow));
        self.register(FunctionDef::new("Math", "random", 0, Some(0), fn_random).volatile());
        self.register(FunctionDef::new("Math", "round", 0, one, fn_round));
        self.register(FunctionDef::new("Math", "sin", 0, one, fn_sin));
        self.register(FunctionDef::new("Math", "sqrt", 0, one, fn_sqrt));
        self.register(FunctionDef::new("Math", "tan", 0, one, fn_tan));
    }

    fn register_number_functions(&mut self) {
        use number::*;
        self.register(FunctionDef::new("Number", "isFinite", 0, Some(1), fn_is_finite));
        self.register(FunctionDef::new("Number", "isInteger", 0, Some(1), fn_is_integer));
        self.register(FunctionDef::new("Number", "isNaN", 0, Some(1), fn_is_nan));
        self.register(FunctionDef::new("Number", "parseFloat", 0, Some(1), fn_parse_float));
        self.register(FunctionDef::new("Number", "parseInt", 0, Some(2), fn_parse_int));
    }

    fn register_string_functions(&mut self) {
        use string::*;
        self.register(FunctionDef::new("String", "fromCharCode", 0, None, fn_from_char_code));
        self.register(FunctionDef::new("String", "fromCodePoint", 0, None, fn_from_code_point));
    }

    fn register_array_functions(&mut self) {
        self.register(FunctionDef::new("Array", "isArray", 0, Some(1), array::fn_is_array));
    }

    fn register_date_functions(&mut self) {
        use date::*;
        self.register(FunctionDef::new("Date", "now", 0, Some(0), fn_now).volatile());
        self.register(FunctionDef::new("Date", "parse", 1, Some(1), fn_parse));
        self.register(FunctionDef::new("Date", "UTC", 1, Some(7), fn_utc));
        self.register(FunctionDef::new("Date", "toISOString", 1, Some(1), fn_to_iso_string));
        self.register(FunctionDef::new("Date", "toLocaleString", 1, Some(1), fn_to_locale_string));
        self.register(FunctionDef::new(
            "Date",
            "toLocaleDateString",
            1,
            Some(1),
            fn_to_locale_date_string,
        ));
        self.register(FunctionDef::new(
            "Date",
            "toLocaleTimeString",
            1,
            Some(1),
            fn_to_locale_time_string,
        ));
        self.register(FunctionDef::new("Date", "toString", 1, Some(1), fn_to_string));
        self.register(FunctionDef::new("Date", "valueOf", 1, Some(1), fn_value_of));
    }

    fn register_json_functions(&mut self) {
        self.register(FunctionDef::new("JSON", "parse", 1, Some(1), json::fn_parse));
        self.register(FunctionDef::new("JSON", "stringify", 1, Some(3), json::fn_stringify));
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static ABSENT: Value = Value::Absent;

/// Argument `index`, or absent when the caller passed fewer
pub(crate) fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&ABSENT)
}

/// Numeric coercion of argument `index`
pub(crate) fn number_arg(args: &[Value], index: usize) -> f64 {
    arg(args, index).to_number()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("Math", "max").is_some());
        assert!(registry.get("Math", "constructor").is_none());
        assert!(registry.get("Math", "random").unwrap().volatile);
        assert!(!registry.get("JSON", "parse").unwrap().volatile);
        assert!(registry.has_namespace("Date"));
        assert!(!registry.has_namespace("process"));
    }

    #[test]
    fn test_namespace_value_holds_callables() {
        let value = FunctionRegistry::builtins().namespace_value("JSON").unwrap();
        match value {
            Value::Object(map) => {
                assert_eq!(map.keys().collect::<Vec<_>>(), vec!["parse", "stringify"]);
                assert_eq!(
                    map["parse"],
                    Value::Callable(Callable::builtin("JSON", "parse"))
                );
            }
            other => panic!("Expected object, got {:?}", other),
        }
    }
}
