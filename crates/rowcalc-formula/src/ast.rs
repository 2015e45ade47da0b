//! Expression Abstract Syntax Tree types

/// Byte range of a node in the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Empty source text; evaluates to absent
    Empty,

    // === Literals ===
    Number(f64),
    Text(String),
    Boolean(bool),
    Null,
    /// The `undefined` literal
    Undefined,

    /// Free name reference
    Ident { name: String, span: Span },

    // === Operators ===
    Unary {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// A left-associative run of binary operators at one precedence
    /// level: `first op rest[0] op rest[1] ...`. A right-associative `**`
    /// is a run of one whose operand is itself a `**` run.
    Binary {
        first: Box<Expr>,
        rest: Vec<(BinaryOperator, Expr)>,
    },
    /// A run of one short-circuiting operator (`&&`, `||` or `??`);
    /// always at least two operands
    Logical {
        op: LogicalOperator,
        operands: Vec<Expr>,
    },
    /// `test ? consequent : alternate`
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },

    // === Postfix ===
    /// `object.property`; the span covers the whole access
    Member {
        object: Box<Expr>,
        property: String,
        span: Span,
    },
    /// `object[index]`
    Index {
        object: Box<Expr>,
        index: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },

    // === Compound literals ===
    Array(Vec<Expr>),
    Object(Vec<Property>),
}

/// One `key: value` entry of an object literal
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub key: String,
    pub value: Expr,
    /// Written as `{ key }`
    pub shorthand: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
    TypeOf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Remainder,
    Power,

    // Comparison
    Equal,
    NotEqual,
    StrictEqual,
    StrictNotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
    Nullish,
}

impl Expr {
    /// Build an identifier node
    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Expr::Ident {
            name: name.into(),
            span,
        }
    }

    /// Check if this is the empty expression
    pub fn is_empty(&self) -> bool {
        matches!(self, Expr::Empty)
    }

    /// Call `f` on every direct child node, left to right
    pub fn for_each_child<'a>(&'a self, mut f: impl FnMut(&'a Expr)) {
        match self {
            Expr::Empty
            | Expr::Number(_)
            | Expr::Text(_)
            | Expr::Boolean(_)
            | Expr::Null
            | Expr::Undefined
            | Expr::Ident { .. } => {}
            Expr::Unary { operand, .. } => f(operand),
            Expr::Binary { first, rest } => {
                f(first);
                rest.iter().for_each(|(_, operand)| f(operand));
            }
            Expr::Logical { operands, .. } => operands.iter().for_each(f),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => {
                f(test);
                f(consequent);
                f(alternate);
            }
            Expr::Member { object, .. } => f(object),
            Expr::Index { object, index } => {
                f(object);
                f(index);
            }
            Expr::Call { callee, args } => {
                f(callee);
                args.iter().for_each(f);
            }
            Expr::Array(items) => items.iter().for_each(f),
            Expr::Object(props) => props.iter().for_each(|p| f(&p.value)),
        }
    }

    /// Free identifiers in source order, duplicates included
    pub fn identifiers(&self) -> Vec<(&str, Span)> {
        fn collect<'a>(expr: &'a Expr, out: &mut Vec<(&'a str, Span)>) {
            if let Expr::Ident { name, span } = expr {
                out.push((name.as_str(), *span));
            }
            expr.for_each_child(|child| collect(child, out));
        }

        let mut out = Vec::new();
        collect(self, &mut out);
        out
    }
}
