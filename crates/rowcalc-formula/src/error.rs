//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during parsing, analysis or evaluation
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    /// Expression text failed to parse
    #[error("Syntax error: {message} (at position {position})")]
    Syntax { message: String, position: usize },

    /// The safety analyzer rejected one or more references
    #[error("You are not allowed to use these functions: {}", names.join(", "))]
    Disallowed { names: Vec<String> },

    /// Free name not present in the scope or the function registry
    #[error("{0} is not defined")]
    UndefinedName(String),

    /// Call target is not a function
    #[error("{0} is not a function")]
    NotCallable(String),

    /// Member or index access on null or undefined
    #[error("Cannot read properties of {target} (reading '{property}')")]
    PropertyOfNothing { target: String, property: String },

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Other evaluation failure
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Expression nests deeper than the configured limit
    #[error("Expression nested too deeply (limit {0})")]
    DepthExceeded(usize),

    /// Evaluation visited more nodes than the configured budget
    #[error("Evaluation exceeded the step budget of {0}")]
    StepBudgetExceeded(usize),

    /// The cell takes part in a reference cycle
    #[error("Circular reference detected")]
    CircularReference,
}

/// Coarse classification of a [`FormulaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Syntax,
    Disallowed,
    Runtime,
    Circular,
}

impl FormulaError {
    /// Create a syntax error at a byte offset
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        FormulaError::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Create a disallowed-capability error, deduplicating names in first-seen order
    pub fn disallowed<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        FormulaError::Disallowed { names: unique }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FormulaError::Syntax { .. } => ErrorKind::Syntax,
            FormulaError::Disallowed { .. } => ErrorKind::Disallowed,
            FormulaError::CircularReference => ErrorKind::Circular,
            _ => ErrorKind::Runtime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disallowed_message() {
        let err = FormulaError::disallowed(["eval", "fetch", "eval", "$a.constructor"]);
        assert_eq!(
            err.to_string(),
            "You are not allowed to use these functions: eval, fetch, $a.constructor"
        );
        assert_eq!(err.kind(), ErrorKind::Disallowed);
    }

    #[test]
    fn test_runtime_messages() {
        assert_eq!(
            FormulaError::NotCallable("x".into()).to_string(),
            "x is not a function"
        );
        assert_eq!(
            FormulaError::PropertyOfNothing {
                target: "null".into(),
                property: "a".into()
            }
            .to_string(),
            "Cannot read properties of null (reading 'a')"
        );
        assert_eq!(FormulaError::UndefinedName("y".into()).kind(), ErrorKind::Runtime);
    }
}
