//! Static capability filter
//!
//! Flags every reference in an expression that reaches outside a
//! [`CapabilityPolicy`]. This is a conservative whitelist over the AST,
//! not a sandbox: it only knows the names it has been told about.

use crate::ast::Expr;
use indexmap::{IndexMap, IndexSet};

/// Names an expression may not use and utility namespaces it may use.
///
/// Immutable once built; construct with [`CapabilityPolicy::default`] or
/// [`CapabilityPolicy::empty`] and the `deny`/`allow` builders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapabilityPolicy {
    denied: IndexSet<String>,
    namespaces: IndexMap<String, IndexSet<String>>,
}

const DEFAULT_DENIED: &[&str] = &[
    // Dynamic code execution
    "eval",
    "Function",
    "import",
    "require",
    // Timers and scheduling
    "setTimeout",
    "setInterval",
    "setImmediate",
    "queueMicrotask",
    // Network and messaging
    "fetch",
    "XMLHttpRequest",
    "WebSocket",
    "Worker",
    "postMessage",
    // Host environment
    "process",
    "window",
    "document",
    "globalThis",
    "self",
    "navigator",
    "location",
    "history",
    // Storage
    "localStorage",
    "sessionStorage",
    "indexedDB",
    // Other capability-granting primitives
    "crypto",
    "atob",
    "btoa",
    "Reflect",
    "Proxy",
];

const DEFAULT_NAMESPACES: &[(&str, &[&str])] = &[
    (
        "Math",
        &[
            "abs", "acos", "asin", "atan", "atan2", "ceil", "cos", "exp", "floor", "log", "max",
            "min", "pow", "random", "round", "sin", "sqrt", "tan",
        ],
    ),
    (
        "Number",
        &["isFinite", "isInteger", "isNaN", "parseFloat", "parseInt"],
    ),
    ("String", &["fromCharCode", "fromCodePoint"]),
    ("Array", &["isArray"]),
    (
        "Date",
        &[
            "now",
            "parse",
            "UTC",
            "toISOString",
            "toLocaleString",
            "toLocaleDateString",
            "toLocaleTimeString",
            "toString",
            "valueOf",
        ],
    ),
    ("JSON", &["parse", "stringify"]),
];

impl CapabilityPolicy {
    /// A policy that denies no names and allows no namespaces
    pub fn empty() -> Self {
        Self {
            denied: IndexSet::new(),
            namespaces: IndexMap::new(),
        }
    }

    /// Add a name to the deny-list
    pub fn deny(mut self, name: impl Into<String>) -> Self {
        self.denied.insert(name.into());
        self
    }

    /// Allow `methods` on `namespace`, adding to any already allowed
    pub fn allow<I, S>(mut self, namespace: impl Into<String>, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.namespaces
            .entry(namespace.into())
            .or_default()
            .extend(methods.into_iter().map(Into::into));
        self
    }

    pub fn is_denied(&self, name: &str) -> bool {
        self.denied.contains(name)
    }

    pub fn is_namespace(&self, name: &str) -> bool {
        self.namespaces.contains_key(name)
    }

    pub fn is_allowed(&self, namespace: &str, method: &str) -> bool {
        self.namespaces
            .get(namespace)
            .map_or(false, |methods| methods.contains(method))
    }

    pub fn denied(&self) -> impl Iterator<Item = &str> {
        self.denied.iter().map(String::as_str)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.keys().map(String::as_str)
    }
}

impl Default for CapabilityPolicy {
    fn default() -> Self {
        let policy = DEFAULT_DENIED
            .iter()
            .fold(Self::empty(), |policy, name| policy.deny(*name));
        DEFAULT_NAMESPACES
            .iter()
            .fold(policy, |policy, (namespace, methods)| {
                policy.allow(*namespace, methods.iter().copied())
            })
    }
}

/// A disallowed reference found in an expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offense {
    /// The reference as written, e.g. `eval` or `Math.constructor`
    pub name: String,
    /// Byte offset of the reference in the source text
    pub position: usize,
}

/// Walks ASTs looking for references outside a policy
#[derive(Debug, Clone, Default)]
pub struct SafetyAnalyzer {
    policy: CapabilityPolicy,
}

impl SafetyAnalyzer {
    pub fn new(policy: CapabilityPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &CapabilityPolicy {
        &self.policy
    }

    /// Every offending reference in source order
    pub fn find_disallowed(&self, expr: &Expr) -> Vec<Offense> {
        let mut offenses = Vec::new();
        self.visit(expr, &mut offenses);
        offenses
    }

    /// Check if the expression is free of offending references
    pub fn is_safe(&self, expr: &Expr) -> bool {
        self.find_disallowed(expr).is_empty()
    }

    fn visit(&self, expr: &Expr, offenses: &mut Vec<Offense>) {
        match expr {
            Expr::Ident { name, span } => {
                if self.policy.is_denied(name) {
                    offenses.push(Offense {
                        name: name.clone(),
                        position: span.start,
                    });
                }
            }

            Expr::Member {
                object,
                property,
                span,
            } => {
                match object.as_ref() {
                    Expr::Ident { name, .. } if self.policy.is_namespace(name) => {
                        if !self.policy.is_allowed(name, property) {
                            offenses.push(Offense {
                                name: format!("{}.{}", name, property),
                                position: span.start,
                            });
                        }
                    }
                    // The denied name itself is reported when the object is visited
                    Expr::Ident { name, .. } if self.policy.is_denied(name) => {}
                    Expr::Ident { name, .. } => offenses.push(Offense {
                        name: format!("{}.{}", name, property),
                        position: span.start,
                    }),
                    _ => offenses.push(Offense {
                        name: format!("(expr).{}", property),
                        position: span.start,
                    }),
                }
                self.visit(object, offenses);
            }

            // The callee goes through the same two rules as any other node
            Expr::Call { callee, args } => {
                self.visit(callee, offenses);
                for arg in args {
                    self.visit(arg, offenses);
                }
            }

            Expr::Empty
            | Expr::Number(_)
            | Expr::Text(_)
            | Expr::Boolean(_)
            | Expr::Null
            | Expr::Undefined
            | Expr::Unary { .. }
            | Expr::Binary { .. }
            | Expr::Logical { .. }
            | Expr::Conditional { .. }
            | Expr::Index { .. }
            | Expr::Array(_)
            | Expr::Object(_) => expr.for_each_child(|child| self.visit(child, offenses)),
        }
    }
}
